//! Persistence layer — a backend-agnostic `Storage` trait plus the
//! flat-file backend implementing the registry schema contract.

pub mod flat_file;
pub mod traits;

pub use flat_file::FlatFileStore;
pub use traits::Storage;
