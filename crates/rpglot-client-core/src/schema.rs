//! Server schema: views, entity ids, and drill-down targets per collection.
//!
//! Deserialised from `GET /api/v1/schema`. Only the parts the navigation core
//! needs are modelled; formatting metadata (units, formats, thresholds) is
//! ignored.

use std::collections::{BTreeMap, HashMap};

use serde::Deserialize;

use crate::model::CollectionKey;

/// Operating mode of the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Live,
    History,
}

/// Top-level schema document.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiSchema {
    #[serde(default)]
    pub version: String,
    pub mode: Mode,
    #[serde(default)]
    pub timeline: Option<TimelineInfo>,
    #[serde(default)]
    pub instance: Option<InstanceInfo>,
    /// Tab descriptions keyed by collection name. Unknown keys are ignored.
    #[serde(default)]
    pub tabs: BTreeMap<String, TabSchema>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct TimelineInfo {
    /// First snapshot timestamp (epoch seconds).
    pub start: i64,
    /// Last snapshot timestamp (epoch seconds).
    pub end: i64,
    pub total_snapshots: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct InstanceInfo {
    pub database: String,
    pub pg_version: String,
    #[serde(default)]
    pub is_standby: Option<bool>,
    #[serde(default)]
    pub hostname: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TabSchema {
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Field name used as unique row identifier.
    pub entity_id: String,
    #[serde(default)]
    pub columns: Vec<ColumnSchema>,
    #[serde(default)]
    pub views: Vec<ViewSchema>,
    #[serde(default)]
    pub drill_down: Option<DrillDown>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ColumnSchema {
    pub key: String,
    pub label: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ViewSchema {
    pub key: String,
    pub label: String,
    /// Column keys displayed in this view.
    #[serde(default)]
    pub columns: Vec<String>,
    #[serde(default)]
    pub default: bool,
}

/// Drill-down navigation descriptor. Static configuration, never mutated.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct DrillDown {
    /// Target tab key (e.g. "pgs", "pgi").
    pub target: String,
    /// Field in the SOURCE row supplying the value to look for.
    pub via: String,
    /// Field in the TARGET rows to search by. If absent, the target's entity id.
    #[serde(default)]
    pub target_field: Option<String>,
    #[serde(default)]
    pub description: String,
    /// Field in the SOURCE row whose value becomes a column filter in the target.
    #[serde(default)]
    pub filter_via: Option<String>,
    /// Column in the TARGET collection the column filter applies to.
    #[serde(default)]
    pub filter_target: Option<String>,
}

impl DrillDown {
    pub fn target_tab(&self) -> Option<CollectionKey> {
        CollectionKey::parse(&self.target)
    }
}

/// Schema lookups used by the controller and the renderer.
#[derive(Debug, Clone)]
pub struct Catalog {
    mode: Mode,
    version: String,
    timeline: Option<TimelineInfo>,
    instance: Option<InstanceInfo>,
    tabs: HashMap<CollectionKey, TabSchema>,
}

impl Catalog {
    /// Catalog with no tab metadata; every lookup falls back to built-in defaults.
    pub fn empty(mode: Mode) -> Self {
        Self {
            mode,
            version: String::new(),
            timeline: None,
            instance: None,
            tabs: HashMap::new(),
        }
    }

    pub fn from_schema(schema: ApiSchema) -> Self {
        let mut tabs = HashMap::new();
        for (key, tab) in schema.tabs {
            match CollectionKey::parse(&key) {
                Some(k) => {
                    tabs.insert(k, tab);
                }
                None => tracing::debug!(tab = %key, "ignoring unknown tab in schema"),
            }
        }
        Self {
            mode: schema.mode,
            version: schema.version,
            timeline: schema.timeline,
            instance: schema.instance,
            tabs,
        }
    }

    pub fn with_tab(mut self, key: CollectionKey, tab: TabSchema) -> Self {
        self.tabs.insert(key, tab);
        self
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn timeline(&self) -> Option<&TimelineInfo> {
        self.timeline.as_ref()
    }

    pub fn instance(&self) -> Option<&InstanceInfo> {
        self.instance.as_ref()
    }

    pub fn tab(&self, key: CollectionKey) -> Option<&TabSchema> {
        self.tabs.get(&key)
    }

    /// Entity id field of a collection, from the schema or the built-in default.
    pub fn entity_field(&self, key: CollectionKey) -> &str {
        self.tab(key)
            .map(|t| t.entity_id.as_str())
            .filter(|f| !f.is_empty())
            .unwrap_or_else(|| key.id_field())
    }

    pub fn views(&self, key: CollectionKey) -> &[ViewSchema] {
        self.tab(key).map(|t| t.views.as_slice()).unwrap_or(&[])
    }

    /// The view flagged as default, or the first one.
    pub fn default_view(&self, key: CollectionKey) -> Option<&str> {
        let views = self.views(key);
        views
            .iter()
            .find(|v| v.default)
            .or_else(|| views.first())
            .map(|v| v.key.as_str())
    }

    pub fn has_view(&self, key: CollectionKey, view: &str) -> bool {
        self.views(key).iter().any(|v| v.key == view)
    }

    pub fn drill_down(&self, key: CollectionKey) -> Option<&DrillDown> {
        self.tab(key).and_then(|t| t.drill_down.as_ref())
    }

    /// Column keys to display for a view (`None` = default view). Falls back to
    /// every known column when the view has no explicit list.
    pub fn columns_for(&self, key: CollectionKey, view: Option<&str>) -> Vec<&str> {
        let view_key = view.or_else(|| self.default_view(key));
        if let Some(v) = view_key.and_then(|vk| self.views(key).iter().find(|v| v.key == vk))
            && !v.columns.is_empty()
        {
            return v.columns.iter().map(String::as_str).collect();
        }
        self.tab(key)
            .map(|t| t.columns.iter().map(|c| c.key.as_str()).collect())
            .unwrap_or_default()
    }

    /// Human label of a column, or the key itself.
    pub fn column_label<'a>(&'a self, key: CollectionKey, column: &'a str) -> &'a str {
        self.tab(key)
            .and_then(|t| t.columns.iter().find(|c| c.key == column))
            .map(|c| c.label.as_str())
            .unwrap_or(column)
    }
}
