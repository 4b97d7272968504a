//! The `Persister` trait: hierarchical byte storage.
//!
//! Paths are relative to the persister's own root; `"servicename"`,
//! `"/servicename"` and `"servicename/"` all address the same node.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::error::{PersisterError, PersisterResult};

pub trait Persister: Send + Sync {
    /// Fetch the payload at `path`, failing with `NotFound` if absent.
    fn get(&self, path: &str) -> PersisterResult<Vec<u8>>;

    /// Create or replace the payload at `path`. Missing parents are created.
    fn set(&self, path: &str, bytes: &[u8]) -> PersisterResult<()>;

    /// Delete `path` and its whole subtree, failing with `NotFound` if absent.
    fn delete(&self, path: &str) -> PersisterResult<()>;

    /// Names of the direct children of `path`.
    fn children(&self, path: &str) -> PersisterResult<Vec<String>>;

    /// Fetch several paths at once; absent paths map to `None`.
    fn get_many(&self, paths: &[&str]) -> PersisterResult<BTreeMap<String, Option<Vec<u8>>>> {
        let mut out = BTreeMap::new();
        for path in paths {
            let value = match self.get(path) {
                Ok(bytes) => Some(bytes),
                Err(PersisterError::NotFound(_)) => None,
                Err(e) => return Err(e),
            };
            out.insert(path.to_string(), value);
        }
        Ok(out)
    }

    /// Write several paths in order, stopping at the first failure.
    fn set_many(&self, values: &BTreeMap<String, Vec<u8>>) -> PersisterResult<()> {
        for (path, bytes) in values {
            self.set(path, bytes)?;
        }
        Ok(())
    }

    /// Remove everything under this persister's root.
    fn delete_all(&self) -> PersisterResult<()> {
        match self.delete("/") {
            Err(PersisterError::NotFound(_)) => Ok(()),
            other => other,
        }
    }
}

impl<P: Persister + ?Sized> Persister for Arc<P> {
    fn get(&self, path: &str) -> PersisterResult<Vec<u8>> {
        (**self).get(path)
    }

    fn set(&self, path: &str, bytes: &[u8]) -> PersisterResult<()> {
        (**self).set(path, bytes)
    }

    fn delete(&self, path: &str) -> PersisterResult<()> {
        (**self).delete(path)
    }

    fn children(&self, path: &str) -> PersisterResult<Vec<String>> {
        (**self).children(path)
    }
}
