//! Registries — domain logic over the persistence layer.

pub mod orders;
pub mod users;

pub use orders::OrderRegistry;
pub use users::UserRegistry;
