//! Ensemble — the redb-backed node tree behind every coordinated persister.
//!
//! Each operation runs in its own redb transaction, which gives the
//! linearizable per-path behaviour the persister layer relies on. Writing
//! a deep path creates missing parents with empty payloads; deleting a
//! path removes its whole subtree.

use std::path::Path;
use std::sync::Arc;

use redb::{Database, ReadableDatabase, ReadableTable};
use tracing::debug;

use crate::error::{PersisterError, PersisterResult};
use crate::path;
use crate::tables::{ACLS, NODES};

/// Convert any `Display` error into a `PersisterError` variant via a closure factory.
macro_rules! map_err {
    ($variant:ident) => {
        |e| PersisterError::$variant(e.to_string())
    };
}

/// Thread-safe node store shared by every session.
#[derive(Clone)]
pub struct Ensemble {
    db: Arc<Database>,
}

impl Ensemble {
    /// Open (or create) a persistent ensemble store at the given path.
    pub fn open(path: &Path) -> PersisterResult<Self> {
        let db = Database::create(path).map_err(map_err!(Unavailable))?;
        let ensemble = Self { db: Arc::new(db) };
        ensemble.ensure_tables()?;
        debug!(?path, "ensemble store opened");
        Ok(ensemble)
    }

    /// Create an ephemeral in-memory ensemble (for testing).
    pub fn open_in_memory() -> PersisterResult<Self> {
        let backend = redb::backends::InMemoryBackend::new();
        let db = Database::builder()
            .create_with_backend(backend)
            .map_err(map_err!(Unavailable))?;
        let ensemble = Self { db: Arc::new(db) };
        ensemble.ensure_tables()?;
        debug!("in-memory ensemble store opened");
        Ok(ensemble)
    }

    fn ensure_tables(&self) -> PersisterResult<()> {
        let txn = self.db.begin_write().map_err(map_err!(Unavailable))?;
        txn.open_table(NODES).map_err(map_err!(Storage))?;
        txn.open_table(ACLS).map_err(map_err!(Storage))?;
        txn.commit().map_err(map_err!(Unavailable))?;
        Ok(())
    }

    /// Read the payload at a normalized absolute path.
    pub fn read(&self, acl: Option<&str>, node: &str) -> PersisterResult<Vec<u8>> {
        let txn = self.db.begin_read().map_err(map_err!(Unavailable))?;
        let nodes = txn.open_table(NODES).map_err(map_err!(Storage))?;
        let acls = txn.open_table(ACLS).map_err(map_err!(Storage))?;
        let data = match nodes.get(node).map_err(map_err!(Storage))? {
            Some(guard) => guard.value().to_vec(),
            None => return Err(PersisterError::NotFound(node.to_string())),
        };
        check_acl(&acls, node, acl)?;
        Ok(data)
    }

    /// Create or replace the payload at `node`, creating missing parents.
    pub fn write(&self, acl: Option<&str>, node: &str, data: &[u8]) -> PersisterResult<()> {
        if node == "/" {
            return Err(PersisterError::InvalidPath("cannot write the root node".to_string()));
        }
        let txn = self.db.begin_write().map_err(map_err!(Unavailable))?;
        {
            let mut nodes = txn.open_table(NODES).map_err(map_err!(Storage))?;
            let mut acls = txn.open_table(ACLS).map_err(map_err!(Storage))?;

            let mut targets = path::ancestors(node);
            targets.push(node);
            for target in targets {
                let exists = nodes.get(target).map_err(map_err!(Storage))?.is_some();
                if exists {
                    check_acl(&acls, target, acl)?;
                } else {
                    nodes.insert(target, b"".as_slice()).map_err(map_err!(Storage))?;
                    if let Some(digest) = acl {
                        acls.insert(target, digest.as_bytes())
                            .map_err(map_err!(Storage))?;
                    }
                }
            }
            nodes.insert(node, data).map_err(map_err!(Storage))?;
        }
        txn.commit().map_err(map_err!(Unavailable))?;
        debug!(%node, bytes = data.len(), "node written");
        Ok(())
    }

    /// Remove `node` and everything beneath it.
    ///
    /// Removing `/` clears the whole store and never reports `NotFound`.
    pub fn remove(&self, acl: Option<&str>, node: &str) -> PersisterResult<usize> {
        let txn = self.db.begin_write().map_err(map_err!(Unavailable))?;
        let removed;
        {
            let mut nodes = txn.open_table(NODES).map_err(map_err!(Storage))?;
            let mut acls = txn.open_table(ACLS).map_err(map_err!(Storage))?;

            if node != "/" {
                if nodes.get(node).map_err(map_err!(Storage))?.is_none() {
                    return Err(PersisterError::NotFound(node.to_string()));
                }
                check_acl(&acls, node, acl)?;
            }

            let doomed: Vec<String> = nodes
                .iter()
                .map_err(map_err!(Storage))?
                .filter_map(|entry| {
                    let (key, _) = entry.ok()?;
                    let k = key.value().to_string();
                    path::is_within(&k, node).then_some(k)
                })
                .collect();
            for key in &doomed {
                nodes.remove(key.as_str()).map_err(map_err!(Storage))?;
                acls.remove(key.as_str()).map_err(map_err!(Storage))?;
            }
            removed = doomed.len();
        }
        txn.commit().map_err(map_err!(Unavailable))?;
        debug!(%node, removed, "subtree removed");
        Ok(removed)
    }

    /// Names of the direct children of `node`, sorted.
    pub fn children(&self, acl: Option<&str>, node: &str) -> PersisterResult<Vec<String>> {
        let txn = self.db.begin_read().map_err(map_err!(Unavailable))?;
        let nodes = txn.open_table(NODES).map_err(map_err!(Storage))?;
        let acls = txn.open_table(ACLS).map_err(map_err!(Storage))?;
        if node != "/" {
            if nodes.get(node).map_err(map_err!(Storage))?.is_none() {
                return Err(PersisterError::NotFound(node.to_string()));
            }
            check_acl(&acls, node, acl)?;
        }

        let mut names = Vec::new();
        for entry in nodes.iter().map_err(map_err!(Storage))? {
            let (key, _) = entry.map_err(map_err!(Storage))?;
            let key = key.value();
            if path::parent(key) == Some(node) {
                names.push(path::name(key).to_string());
            }
        }
        names.sort();
        Ok(names)
    }
}

fn check_acl<T>(acls: &T, node: &str, acl: Option<&str>) -> PersisterResult<()>
where
    T: ReadableTable<&'static str, &'static [u8]>,
{
    match acls.get(node).map_err(map_err!(Storage))? {
        Some(stored) if Some(stored.value()) != acl.map(str::as_bytes) => {
            Err(PersisterError::AccessDenied(node.to_string()))
        }
        _ => Ok(()),
    }
}
