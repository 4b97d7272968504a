//! keel-state — coordination-store persistence for Keel.
//!
//! Everything the scheduler needs to survive a restart goes through the
//! [`Persister`] trait: a hierarchical byte store addressed by
//! slash-delimited paths.
//!
//! # Architecture
//!
//! ```text
//! StateStore / ensure_service_name
//!   └── PersisterCache (optional, process-local)
//!         └── CoordinatedPersister (root prefix, credential, retry)
//!               └── Ensemble (redb node tree with digest ACLs)
//! ```
//!
//! The cache never holds durability authority: writes land in the backing
//! persister before the cache is updated.

pub mod cache;
pub mod coordinated;
pub mod credential;
pub mod ensemble;
pub mod error;
pub mod identity;
pub mod path;
pub mod persister;
pub mod retry;
pub mod store;
pub mod tables;
pub mod types;

pub use cache::{CacheStats, PersisterCache};
pub use coordinated::{CoordinatedPersister, CoordinatedPersisterBuilder};
pub use credential::{Credential, CredentialError};
pub use ensemble::Ensemble;
pub use error::{PersisterError, PersisterResult};
pub use identity::{ensure_service_name, IdentityError, IdentityResult, SERVICE_NAME_NODE};
pub use persister::Persister;
pub use retry::RetryPolicy;
pub use store::StateStore;
pub use types::*;
