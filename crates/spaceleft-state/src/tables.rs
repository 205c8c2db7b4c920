//! redb table definitions for the spaceleft state store.
//!
//! Each table uses `&str` keys and `&[u8]` values (JSON-serialized domain types).

use redb::TableDefinition;

/// Job space settings keyed by `{job}`.
pub const JOBS: TableDefinition<&str, &[u8]> = TableDefinition::new("jobs");

/// Build records keyed by `{job}:{number:020}` so keys sort by build number.
pub const BUILDS: TableDefinition<&str, &[u8]> = TableDefinition::new("builds");
