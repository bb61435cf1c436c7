//! Row visibility: free-text filter plus an optional column filter.

use std::fmt;

use crate::model::{CollectionKey, RowRef, Scalar, Snapshot};

/// Column-scoped filter preset by a drill-down (e.g. indexes of one table).
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnFilter {
    pub column: String,
    pub value: Scalar,
}

impl ColumnFilter {
    pub fn new(column: impl Into<String>, value: impl Into<Scalar>) -> Self {
        Self {
            column: column.into(),
            value: value.into(),
        }
    }

    pub fn matches(&self, row: &RowRef<'_>) -> bool {
        row.field(&self.column)
            .is_some_and(|v| scalar_matches(&v, &self.value))
    }
}

impl fmt::Display for ColumnFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.column, self.value)
    }
}

/// Value equality across representations: `42` matches `"42"`. Nulls never match.
pub fn scalar_matches(a: &Scalar, b: &Scalar) -> bool {
    if a.is_null() || b.is_null() {
        return false;
    }
    a == b || a.to_string() == b.to_string()
}

/// Rows of `tab` that pass both filters, in server order.
pub fn visible_rows<'a>(
    snapshot: &'a Snapshot,
    tab: CollectionKey,
    filter_text: &str,
    column_filter: Option<&ColumnFilter>,
) -> Vec<RowRef<'a>> {
    let needle = filter_text.trim().to_lowercase();
    snapshot
        .rows(tab)
        .filter(|row| column_filter.is_none_or(|cf| cf.matches(row)))
        .filter(|row| row.matches_text(&needle))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::EntityId;
    use serde_json::json;

    fn indexes() -> Snapshot {
        Snapshot::from_value(json!({
            "timestamp": 1,
            "pgi": [
                {"indexrelid": 1, "relid": 10, "display_table": "public.orders", "display_name": "orders_pkey"},
                {"indexrelid": 2, "relid": 10, "display_table": "public.orders", "display_name": "orders_created_idx"},
                {"indexrelid": 3, "relid": 20, "display_table": "public.users", "display_name": "users_pkey"}
            ]
        }))
        .unwrap()
    }

    fn ids(rows: &[RowRef<'_>]) -> Vec<EntityId> {
        rows.iter().map(|r| r.entity_id()).collect()
    }

    #[test]
    fn no_filters_keep_server_order() {
        let s = indexes();
        let rows = visible_rows(&s, CollectionKey::Pgi, "", None);
        assert_eq!(ids(&rows), vec![EntityId::Int(1), EntityId::Int(2), EntityId::Int(3)]);
    }

    #[test]
    fn column_filter_and_text_filter_combine() {
        let s = indexes();
        let cf = ColumnFilter::new("display_table", "public.orders");
        let rows = visible_rows(&s, CollectionKey::Pgi, "", Some(&cf));
        assert_eq!(ids(&rows), vec![EntityId::Int(1), EntityId::Int(2)]);

        let rows = visible_rows(&s, CollectionKey::Pgi, " CREATED ", Some(&cf));
        assert_eq!(ids(&rows), vec![EntityId::Int(2)]);
    }

    #[test]
    fn numeric_and_text_forms_match() {
        assert!(scalar_matches(&Scalar::Int(10), &Scalar::from("10")));
        assert!(!scalar_matches(&Scalar::Null, &Scalar::Null));
        let s = indexes();
        let cf = ColumnFilter::new("relid", "20");
        assert_eq!(ids(&visible_rows(&s, CollectionKey::Pgi, "", Some(&cf))), vec![EntityId::Int(3)]);
    }

    #[test]
    fn missing_column_hides_everything() {
        let s = indexes();
        let cf = ColumnFilter::new("schemaname", "public");
        assert!(visible_rows(&s, CollectionKey::Pgi, "", Some(&cf)).is_empty());
        assert_eq!(cf.to_string(), "schemaname=public");
    }
}
