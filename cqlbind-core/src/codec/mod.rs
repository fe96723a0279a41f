//! Value codec
//!
//! Binds application values into wire buffers, validating them against
//! resolved schema types when one is known.
//!
//! ```rust
//! use cqlbind_core::codec::{BindValue, Collection};
//!
//! let mut list = Collection::list(3);
//! for v in [1, 2, 3] {
//!     list.append(v).unwrap();
//! }
//! let v4 = BindValue::from(list.clone()).encode(4).unwrap();
//! let v2 = BindValue::from(list).encode(2).unwrap();
//! assert_eq!(v4.len(), 4 + 4 + 3 * 8);
//! assert_eq!(v2.len(), 4 + 2 + 3 * 6);
//! ```

mod bound;
mod collection;
mod slots;
mod tuple;
mod user_type;
mod value;

pub use bound::BoundValues;
pub use collection::Collection;
pub use tuple::TupleValue;
pub use user_type::UserTypeValue;
pub use value::{BindValue, Decimal};
