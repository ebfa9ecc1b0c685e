//! Storage layer: traits plus the PostgreSQL and in-memory adapters

pub mod links;
pub mod memory;
pub mod patients;
pub mod store;
pub mod traits;

pub use links::PostgresLinkStore;
pub use memory::MemoryStore;
pub use patients::PostgresPatientDirectory;
pub use store::PostgresVersionStore;
pub use traits::{LinkStore, PatientDirectory, VersionStore};
