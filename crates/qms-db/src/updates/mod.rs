//! Partial-update structs and their builders.
//!
//! `Some(value)` sets a field, `None` leaves it alone. Nullable columns use
//! `Option<Option<T>>` so they can be cleared.

pub mod audit;
pub mod nc;
