//! redb table definitions for the ensemble store.
//!
//! Both tables are keyed by the normalized absolute node path.

use redb::TableDefinition;

/// Node payloads keyed by path.
pub const NODES: TableDefinition<&str, &[u8]> = TableDefinition::new("nodes");

/// Digest ACL of the credential that created a node, keyed by path.
/// Nodes without an entry are open to every session.
pub const ACLS: TableDefinition<&str, &[u8]> = TableDefinition::new("acls");
