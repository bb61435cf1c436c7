//! Snapshot data model.
//!
//! A snapshot carries one ordered row sequence per [`CollectionKey`]. Rows are
//! typed per collection (see [`snapshot`]) and expose their fields as
//! [`Scalar`] values so cross-collection navigation can compare them.

mod scalar;
mod snapshot;

pub use scalar::{EntityId, Fields, Scalar};
pub use snapshot::{
    ActivityRow, EntityRow, EventRow, IndexRow, LockRow, ProcessRow, RowRef, Snapshot,
    StatementRow, TableRow, VacuumRow,
};

use serde::Deserialize;

/// Entity collections shown as tabs, in tab order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, PartialOrd, Ord, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CollectionKey {
    /// OS processes.
    #[default]
    Prc,
    /// pg_stat_activity sessions.
    Pga,
    /// pg_stat_statements.
    Pgs,
    /// pg_stat_user_tables.
    Pgt,
    /// pg_stat_user_indexes.
    Pgi,
    /// PostgreSQL log events.
    Pge,
    /// pg_locks blocking tree.
    Pgl,
    /// pg_stat_progress_vacuum.
    Pgv,
}

impl CollectionKey {
    pub fn all() -> &'static [CollectionKey] {
        &[
            CollectionKey::Prc,
            CollectionKey::Pga,
            CollectionKey::Pgs,
            CollectionKey::Pgt,
            CollectionKey::Pgi,
            CollectionKey::Pge,
            CollectionKey::Pgl,
            CollectionKey::Pgv,
        ]
    }

    /// Wire/address name of the collection.
    pub fn as_str(&self) -> &'static str {
        match self {
            CollectionKey::Prc => "prc",
            CollectionKey::Pga => "pga",
            CollectionKey::Pgs => "pgs",
            CollectionKey::Pgt => "pgt",
            CollectionKey::Pgi => "pgi",
            CollectionKey::Pge => "pge",
            CollectionKey::Pgl => "pgl",
            CollectionKey::Pgv => "pgv",
        }
    }

    /// Short upper-case label used in the tab bar.
    pub fn label(&self) -> &'static str {
        match self {
            CollectionKey::Prc => "PRC",
            CollectionKey::Pga => "PGA",
            CollectionKey::Pgs => "PGS",
            CollectionKey::Pgt => "PGT",
            CollectionKey::Pgi => "PGI",
            CollectionKey::Pge => "PGE",
            CollectionKey::Pgl => "PGL",
            CollectionKey::Pgv => "PGV",
        }
    }

    pub fn parse(s: &str) -> Option<CollectionKey> {
        Self::all().iter().copied().find(|k| k.as_str() == s)
    }

    /// Tab at a zero-based position; `None` when out of range.
    pub fn from_index(index: usize) -> Option<CollectionKey> {
        Self::all().get(index).copied()
    }

    pub fn index(&self) -> usize {
        Self::all().iter().position(|k| k == self).unwrap_or(0)
    }

    /// Returns the next tab.
    pub fn next(&self) -> CollectionKey {
        let all = Self::all();
        all[(self.index() + 1) % all.len()]
    }

    /// Returns the previous tab.
    pub fn prev(&self) -> CollectionKey {
        let all = Self::all();
        all[(self.index() + all.len() - 1) % all.len()]
    }

    /// Field holding the entity id of rows in this collection.
    pub fn id_field(&self) -> &'static str {
        match self {
            CollectionKey::Prc | CollectionKey::Pga | CollectionKey::Pgl | CollectionKey::Pgv => {
                "pid"
            }
            CollectionKey::Pgs => "queryid",
            CollectionKey::Pgt => "relid",
            CollectionKey::Pgi => "indexrelid",
            CollectionKey::Pge => "event_id",
        }
    }
}

impl std::fmt::Display for CollectionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
