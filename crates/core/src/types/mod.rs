//! Type-safe newtype wrappers for domain values.

mod email;
mod id;
mod role;

pub use email::{Email, EmailError};
pub use id::ProductId;
pub use role::Role;
