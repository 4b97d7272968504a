//! Service identity registration.
//!
//! The canonical service name is written once under the storage root and
//! checked on every later startup. Folder-style names and literal names can
//! escape to the same root (`/a/b` and `a/b`, or a root override shared by
//! two services); the stored name is what tells them apart.

use thiserror::Error;
use tracing::{debug, info};

use crate::error::PersisterError;
use crate::persister::Persister;

/// Node under the storage root holding the UTF-8 service name.
pub const SERVICE_NAME_NODE: &str = "servicename";

#[derive(Debug, Error)]
pub enum IdentityError {
    #[error(
        "collision between similar service names: expected name '{expected}', but stored name is '{stored}'"
    )]
    Collision { expected: String, stored: String },

    #[error("invalid data when fetching service name in 'servicename'")]
    InvalidData,

    #[error("failed to fetch prior service name for validation: {0}")]
    Fetch(#[source] PersisterError),

    #[error("failed to store service name: {0}")]
    Store(#[source] PersisterError),
}

pub type IdentityResult<T> = Result<T, IdentityError>;

/// Register `service_name` on first run, or verify it matches what was stored.
pub fn ensure_service_name<P>(persister: &P, service_name: &str) -> IdentityResult<()>
where
    P: Persister + ?Sized,
{
    match persister.get(SERVICE_NAME_NODE) {
        Ok(bytes) => {
            let stored = decode(bytes)?;
            if stored != service_name {
                return Err(IdentityError::Collision {
                    expected: service_name.to_string(),
                    stored,
                });
            }
            debug!(service = %service_name, "service name verified");
            Ok(())
        }
        Err(PersisterError::NotFound(_)) => {
            // New install, or an upgrade from a version that never stored it.
            persister
                .set(SERVICE_NAME_NODE, service_name.as_bytes())
                .map_err(IdentityError::Store)?;
            info!(service = %service_name, "service name registered");
            Ok(())
        }
        Err(e) => Err(IdentityError::Fetch(e)),
    }
}

fn decode(bytes: Vec<u8>) -> IdentityResult<String> {
    if bytes.is_empty() {
        return Err(IdentityError::InvalidData);
    }
    String::from_utf8(bytes).map_err(|_| IdentityError::InvalidData)
}
