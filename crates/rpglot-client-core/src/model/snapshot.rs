//! Snapshot: one immutable point-in-time bundle of all collections.
//!
//! Mirrors the `ApiSnapshot` JSON payload served by rpglot-web. Each
//! collection has its own row type with a typed entity id; every other field
//! is kept in an open [`Fields`] map so views and drill-downs can address
//! columns by name without the client knowing the full server schema.

use serde::Deserialize;

use super::{CollectionKey, EntityId, Fields, Scalar};

/// Capability shared by all row types.
pub trait EntityRow {
    /// Name of the field carrying the entity id.
    const ID_FIELD: &'static str;

    fn entity_id(&self) -> EntityId;

    /// Remaining (non-id) fields.
    fn fields(&self) -> &Fields;

    /// Looks up a field by name, including the id field.
    fn field(&self, name: &str) -> Option<Scalar> {
        if name == Self::ID_FIELD {
            Some(self.entity_id().into())
        } else {
            self.fields().get(name).cloned()
        }
    }
}

macro_rules! entity_row {
    ($(#[$meta:meta])* $name:ident { $id:ident: $ty:ty }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Default, Deserialize)]
        pub struct $name {
            pub $id: $ty,
            #[serde(flatten)]
            pub fields: Fields,
        }

        impl EntityRow for $name {
            const ID_FIELD: &'static str = stringify!($id);

            fn entity_id(&self) -> EntityId {
                EntityId::from(self.$id)
            }

            fn fields(&self) -> &Fields {
                &self.fields
            }
        }
    };
}

entity_row!(
    /// OS process (`prc`).
    ProcessRow { pid: u32 }
);
entity_row!(
    /// pg_stat_activity backend (`pga`).
    ActivityRow { pid: i32 }
);
entity_row!(
    /// pg_stat_statements entry (`pgs`).
    StatementRow { queryid: i64 }
);
entity_row!(
    /// pg_stat_user_tables entry (`pgt`).
    TableRow { relid: u32 }
);
entity_row!(
    /// pg_stat_user_indexes entry (`pgi`).
    IndexRow { indexrelid: u32 }
);
entity_row!(
    /// PostgreSQL log event (`pge`).
    EventRow { event_id: u64 }
);
entity_row!(
    /// pg_locks blocking tree node (`pgl`).
    LockRow { pid: i32 }
);
entity_row!(
    /// pg_stat_progress_vacuum entry (`pgv`).
    VacuumRow { pid: i32 }
);

/// Borrowed row of any collection.
#[derive(Debug, Clone, Copy)]
pub enum RowRef<'a> {
    Process(&'a ProcessRow),
    Activity(&'a ActivityRow),
    Statement(&'a StatementRow),
    Table(&'a TableRow),
    Index(&'a IndexRow),
    Event(&'a EventRow),
    Lock(&'a LockRow),
    Vacuum(&'a VacuumRow),
}

impl<'a> RowRef<'a> {
    pub fn entity_id(&self) -> EntityId {
        match self {
            RowRef::Process(r) => r.entity_id(),
            RowRef::Activity(r) => r.entity_id(),
            RowRef::Statement(r) => r.entity_id(),
            RowRef::Table(r) => r.entity_id(),
            RowRef::Index(r) => r.entity_id(),
            RowRef::Event(r) => r.entity_id(),
            RowRef::Lock(r) => r.entity_id(),
            RowRef::Vacuum(r) => r.entity_id(),
        }
    }

    pub fn field(&self, name: &str) -> Option<Scalar> {
        match self {
            RowRef::Process(r) => r.field(name),
            RowRef::Activity(r) => r.field(name),
            RowRef::Statement(r) => r.field(name),
            RowRef::Table(r) => r.field(name),
            RowRef::Index(r) => r.field(name),
            RowRef::Event(r) => r.field(name),
            RowRef::Lock(r) => r.field(name),
            RowRef::Vacuum(r) => r.field(name),
        }
    }

    fn parts(&self) -> (&'static str, &'a Fields) {
        match *self {
            RowRef::Process(r) => (ProcessRow::ID_FIELD, &r.fields),
            RowRef::Activity(r) => (ActivityRow::ID_FIELD, &r.fields),
            RowRef::Statement(r) => (StatementRow::ID_FIELD, &r.fields),
            RowRef::Table(r) => (TableRow::ID_FIELD, &r.fields),
            RowRef::Index(r) => (IndexRow::ID_FIELD, &r.fields),
            RowRef::Event(r) => (EventRow::ID_FIELD, &r.fields),
            RowRef::Lock(r) => (LockRow::ID_FIELD, &r.fields),
            RowRef::Vacuum(r) => (VacuumRow::ID_FIELD, &r.fields),
        }
    }

    /// All fields of the row, id field first, then the rest by name.
    pub fn entries(&self) -> Vec<(&'a str, Scalar)> {
        let (id_field, fields) = self.parts();
        let mut out = Vec::with_capacity(fields.len() + 1);
        out.push((id_field, self.entity_id().into()));
        out.extend(fields.iter().map(|(k, v)| (k.as_str(), v.clone())));
        out
    }

    /// Case-insensitive substring match over every field value.
    /// `needle` must already be lower-case.
    pub fn matches_text(&self, needle: &str) -> bool {
        if needle.is_empty() {
            return true;
        }
        if self.entity_id().to_string().contains(needle) {
            return true;
        }
        let (_, fields) = self.parts();
        fields
            .values()
            .any(|v| !v.is_null() && v.to_string().to_lowercase().contains(needle))
    }
}

/// Top-level atomic snapshot.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Snapshot {
    /// Unix timestamp (seconds since epoch).
    pub timestamp: i64,
    /// Timestamp of the previous snapshot (history mode only).
    #[serde(default)]
    pub prev_timestamp: Option<i64>,
    /// Timestamp of the next snapshot (history mode only).
    #[serde(default)]
    pub next_timestamp: Option<i64>,
    #[serde(default)]
    pub prc: Vec<ProcessRow>,
    #[serde(default)]
    pub pga: Vec<ActivityRow>,
    #[serde(default)]
    pub pgs: Vec<StatementRow>,
    #[serde(default)]
    pub pgt: Vec<TableRow>,
    #[serde(default)]
    pub pgi: Vec<IndexRow>,
    #[serde(default)]
    pub pge: Vec<EventRow>,
    #[serde(default)]
    pub pgl: Vec<LockRow>,
    #[serde(default)]
    pub pgv: Vec<VacuumRow>,
}

impl Snapshot {
    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }

    pub fn from_value(value: serde_json::Value) -> Result<Self, serde_json::Error> {
        serde_json::from_value(value)
    }

    /// Rows of one collection in server order.
    pub fn rows(&self, key: CollectionKey) -> Box<dyn Iterator<Item = RowRef<'_>> + '_> {
        match key {
            CollectionKey::Prc => Box::new(self.prc.iter().map(RowRef::Process)),
            CollectionKey::Pga => Box::new(self.pga.iter().map(RowRef::Activity)),
            CollectionKey::Pgs => Box::new(self.pgs.iter().map(RowRef::Statement)),
            CollectionKey::Pgt => Box::new(self.pgt.iter().map(RowRef::Table)),
            CollectionKey::Pgi => Box::new(self.pgi.iter().map(RowRef::Index)),
            CollectionKey::Pge => Box::new(self.pge.iter().map(RowRef::Event)),
            CollectionKey::Pgl => Box::new(self.pgl.iter().map(RowRef::Lock)),
            CollectionKey::Pgv => Box::new(self.pgv.iter().map(RowRef::Vacuum)),
        }
    }

    pub fn row_count(&self, key: CollectionKey) -> usize {
        match key {
            CollectionKey::Prc => self.prc.len(),
            CollectionKey::Pga => self.pga.len(),
            CollectionKey::Pgs => self.pgs.len(),
            CollectionKey::Pgt => self.pgt.len(),
            CollectionKey::Pgi => self.pgi.len(),
            CollectionKey::Pge => self.pge.len(),
            CollectionKey::Pgl => self.pgl.len(),
            CollectionKey::Pgv => self.pgv.len(),
        }
    }

    /// Finds a row by entity id.
    pub fn find(&self, key: CollectionKey, id: &EntityId) -> Option<RowRef<'_>> {
        self.rows(key).find(|row| &row.entity_id() == id)
    }

    /// Finds the first row whose `field` equals `value`.
    pub fn find_by_field(
        &self,
        key: CollectionKey,
        field: &str,
        value: &Scalar,
    ) -> Option<RowRef<'_>> {
        self.rows(key)
            .find(|row| row.field(field).as_ref() == Some(value))
    }
}
