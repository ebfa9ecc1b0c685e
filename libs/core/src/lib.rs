//! Record core: versioned resources, patching and patient identity.
//!
//! - [`services::VersionService`] - append-only, optimistically concurrent version ledger
//! - [`services::ResourcePatcher`] - JSON Patch / Merge Patch write workflow
//! - [`services::MatchEngine`] - deterministic weighted patient matching
//! - [`services::LinkGraph`] - directed identity links between patients
//!
//! Storage sits behind the traits in [`db`]; a PostgreSQL adapter and an in-memory adapter are
//! provided. [`Core`] wires everything together:
//!
//! ```rust,ignore
//! let config = vellum_core::Config::load()?;
//! let core = vellum_core::Core::connect(config).await?;
//! let version = core.versions.record_create("Patient", "p1", patient).await?;
//! ```

pub mod config;
pub mod db;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod models;
pub mod services;
pub mod state;

pub use config::Config;
pub use error::{Error, ErrorKind, Result};
pub use state::Core;
