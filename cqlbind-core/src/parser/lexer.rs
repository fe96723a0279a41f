//! Cursor over a marshal class string
//!
//! Splits `Name(param, param, ...)` descriptors into their top-level pieces
//! without interpreting them. Nested parameter lists are returned verbatim
//! (minus insignificant blanks between a name and its arguments) so the
//! caller can recurse on each one.

use crate::error::{Error, Result};
use nom::{bytes::complete::take_while, IResult};

fn is_identifier_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '-' | '+' | '.' | '_' | '&')
}

fn is_blank(c: char) -> bool {
    matches!(c, ' ' | '\t' | '\n')
}

fn identifier(input: &str) -> IResult<&str, &str> {
    take_while(is_identifier_char)(input)
}

fn blanks(input: &str) -> IResult<&str, &str> {
    take_while(is_blank)(input)
}

pub(crate) struct Lexer<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> Lexer<'a> {
    pub(crate) fn new(input: &'a str) -> Self {
        Self { input, pos: 0 }
    }

    fn rest(&self) -> &'a str {
        &self.input[self.pos..]
    }

    fn consume(&mut self, remaining: &'a str) {
        self.pos = self.input.len() - remaining.len();
    }

    pub(crate) fn is_eos(&self) -> bool {
        self.pos >= self.input.len()
    }

    fn peek(&self) -> Option<u8> {
        self.input.as_bytes().get(self.pos).copied()
    }

    pub(crate) fn error(&self, msg: &str) -> Error {
        Error::parse(format!(
            "{} at index {} of \"{}\"",
            msg, self.pos, self.input
        ))
    }

    pub(crate) fn skip_blank(&mut self) {
        if let Ok((remaining, _)) = blanks(self.rest()) {
            self.consume(remaining);
        }
    }

    /// Skip blanks and at most one comma
    ///
    /// Returns `false` at end of input. A second comma stops the skip and
    /// leaves the cursor on it.
    pub(crate) fn skip_blank_and_comma(&mut self) -> bool {
        let mut comma_found = false;
        while let Some(c) = self.peek() {
            if c == b',' {
                if comma_found {
                    return true;
                }
                comma_found = true;
            } else if !is_blank(c as char) {
                return true;
            }
            self.pos += 1;
        }
        false
    }

    fn read_next_identifier(&mut self) -> &'a str {
        match identifier(self.rest()) {
            Ok((remaining, name)) => {
                self.consume(remaining);
                name
            }
            Err(_) => "",
        }
    }

    /// Skip blanks and read the next identifier (possibly empty)
    pub(crate) fn next_name(&mut self) -> &'a str {
        self.skip_blank();
        self.read_next_identifier()
    }

    /// Consume a single expected character
    pub(crate) fn expect(&mut self, c: u8) -> Result<()> {
        self.skip_blank();
        match self.peek() {
            Some(found) if found == c => {
                self.pos += 1;
                Ok(())
            }
            Some(found) => Err(self.error(&format!(
                "expected '{}' but found '{}'",
                c as char, found as char
            ))),
            None => Err(self.error(&format!("expected '{}' but reached end of input", c as char))),
        }
    }

    /// Fail unless only blanks remain
    pub(crate) fn expect_end(&mut self) -> Result<()> {
        self.skip_blank();
        if self.is_eos() {
            Ok(())
        } else {
            Err(self.error("unexpected trailing input"))
        }
    }

    /// Read a balanced `( ... )` argument list, or nothing
    pub(crate) fn read_raw_arguments(&mut self) -> Result<&'a str> {
        self.skip_blank();

        match self.peek() {
            None | Some(b')') | Some(b',') => return Ok(""),
            Some(b'(') => {}
            Some(found) => {
                return Err(self.error(&format!("expected '(' but found '{}'", found as char)))
            }
        }

        let start = self.pos;
        let mut open = 1usize;
        while open > 0 {
            self.pos += 1;
            match self.peek() {
                None => return Err(self.error("expected ')'")),
                Some(b'(') => open += 1,
                Some(b')') => open -= 1,
                Some(_) => {}
            }
        }

        self.pos += 1;
        Ok(&self.input[start..self.pos])
    }

    /// Read one `Name` or `Name(args)` parameter
    pub(crate) fn read_one(&mut self) -> Result<String> {
        let name = self.next_name();
        if name.is_empty() {
            return Err(self.error("expected a type name"));
        }
        let args = self.read_raw_arguments()?;
        Ok(format!("{}{}", name, args))
    }

    /// Read a `(param, param, ...)` list; end of input yields no params
    pub(crate) fn type_params(&mut self) -> Result<Vec<String>> {
        let mut params = Vec::new();

        self.skip_blank();
        if self.is_eos() {
            return Ok(params);
        }
        self.expect(b'(')?;

        while self.skip_blank_and_comma() {
            if self.peek() == Some(b')') {
                self.pos += 1;
                return Ok(params);
            }
            params.push(self.read_one()?);
        }

        Err(self.error("unexpected end of input"))
    }

    /// Read `name:type` pairs up to and including the closing `)`
    pub(crate) fn name_and_type_params(&mut self) -> Result<Vec<(String, String)>> {
        let mut params = Vec::new();

        while self.skip_blank_and_comma() {
            if self.peek() == Some(b')') {
                self.pos += 1;
                return Ok(params);
            }

            let name = self.read_next_identifier();
            if name.is_empty() {
                return Err(self.error("expected a field name"));
            }
            self.expect(b':')?;
            self.skip_blank();
            let data_type = self.read_one()?;
            params.push((name.to_string(), data_type));
        }

        Err(self.error("unexpected end of input"))
    }

    /// Read the `(name:type, ...)` list of a collection side table
    pub(crate) fn collection_params(&mut self) -> Result<Vec<(String, String)>> {
        self.skip_blank();
        if self.is_eos() {
            return Ok(Vec::new());
        }
        self.expect(b'(')?;
        self.name_and_type_params()
    }
}
