//! Selection controller: which tab, view, filter and row are active, and
//! cross-collection drill-down.
//!
//! The controller is a synchronous state machine. User commands mutate the
//! selection immediately; [`SelectionController::on_snapshot`] runs the
//! snapshot-reactive passes (liveness, then drill-down resolution) to
//! completion before the next event is handled. Every change that belongs in
//! the shareable address is recorded and handed out once through
//! [`SelectionController::take_address_update`].

mod filter;
mod validation;

pub use filter::{ColumnFilter, scalar_matches, visible_rows};

use std::sync::Arc;

use tracing::{debug, warn};

use crate::address::NavAddress;
use crate::model::{CollectionKey, EntityId, RowRef, Scalar, Snapshot};
use crate::schema::{Catalog, DrillDown, Mode};

/// What is shown and selected.
///
/// Invariant: `detail_open` implies `selected.is_some()`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SelectionState {
    pub active_tab: CollectionKey,
    pub selected: Option<EntityId>,
    pub detail_open: bool,
    /// `None` means the collection's default view.
    pub active_view: Option<String>,
    pub filter_text: String,
    pub column_filter: Option<ColumnFilter>,
}

/// Drill-down waiting for its target row to show up.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingDrillDown {
    pub target_tab: CollectionKey,
    pub target_field: String,
    pub value: Scalar,
    pub filter: Option<ColumnFilter>,
    /// Timestamp of the snapshot current when the request was made.
    pub requested_at: Option<i64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    PendingDrillDown,
}

pub struct SelectionController {
    catalog: Arc<Catalog>,
    state: SelectionState,
    pending: Option<PendingDrillDown>,
    /// Row just navigated to; cleared only by user navigation.
    flash: Option<EntityId>,
    current: Option<Arc<Snapshot>>,
    address: NavAddress,
    address_dirty: bool,
    initial_timestamp: Option<i64>,
}

impl SelectionController {
    /// Seeds the state from a decoded address. Views the tab does not have
    /// are dropped.
    pub fn new(catalog: Arc<Catalog>, seed: NavAddress) -> Self {
        let tab = seed.tab;
        let view = seed.view.filter(|v| catalog.has_view(tab, v));
        let filter_text = seed.filter.unwrap_or_default();
        let initial_timestamp = match catalog.mode() {
            Mode::History => seed.timestamp,
            Mode::Live => None,
        };
        let address = NavAddress {
            tab,
            view: view.clone(),
            filter: Some(filter_text.clone()).filter(|f| !f.is_empty()),
            timestamp: initial_timestamp,
            timestamp_key: seed.timestamp_key,
        };
        debug!(%tab, view = ?view, "selection controller seeded");

        Self {
            catalog,
            state: SelectionState {
                active_tab: tab,
                active_view: view,
                filter_text,
                ..Default::default()
            },
            pending: None,
            flash: None,
            current: None,
            address,
            address_dirty: false,
            initial_timestamp,
        }
    }

    // ------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------

    pub fn state(&self) -> &SelectionState {
        &self.state
    }

    pub fn active_tab(&self) -> CollectionKey {
        self.state.active_tab
    }

    pub fn selected(&self) -> Option<&EntityId> {
        self.state.selected.as_ref()
    }

    pub fn is_detail_open(&self) -> bool {
        self.state.detail_open
    }

    pub fn flash(&self) -> Option<&EntityId> {
        self.flash.as_ref()
    }

    pub fn pending(&self) -> Option<&PendingDrillDown> {
        self.pending.as_ref()
    }

    pub fn phase(&self) -> Phase {
        if self.pending.is_some() {
            Phase::PendingDrillDown
        } else {
            Phase::Idle
        }
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn current(&self) -> Option<&Arc<Snapshot>> {
        self.current.as_ref()
    }

    /// Timestamp to load first in history mode.
    pub fn initial_timestamp(&self) -> Option<i64> {
        self.initial_timestamp
    }

    /// Address as last persisted.
    pub fn address(&self) -> &NavAddress {
        &self.address
    }

    /// Effective view key: the explicit one or the collection default.
    pub fn effective_view(&self) -> Option<&str> {
        self.state
            .active_view
            .as_deref()
            .or_else(|| self.catalog.default_view(self.state.active_tab))
    }

    /// Rows of the active tab after both filters.
    pub fn visible_rows(&self) -> Vec<RowRef<'_>> {
        match &self.current {
            Some(snapshot) => visible_rows(
                snapshot,
                self.state.active_tab,
                &self.state.filter_text,
                self.state.column_filter.as_ref(),
            ),
            None => Vec::new(),
        }
    }

    /// The selected row in the current snapshot.
    pub fn selected_row(&self) -> Option<RowRef<'_>> {
        let id = self.state.selected.as_ref()?;
        self.current.as_ref()?.find(self.state.active_tab, id)
    }

    // ------------------------------------------------------------
    // Address persistence
    // ------------------------------------------------------------

    fn persist(&mut self, update: impl FnOnce(&mut NavAddress)) {
        let before = self.address.clone();
        update(&mut self.address);
        if self.address != before {
            self.address_dirty = true;
        }
    }

    /// Persists a tab switch: `{tab, view: None, filter: None}`.
    fn persist_tab(&mut self, tab: CollectionKey) {
        self.persist(|a| {
            a.tab = tab;
            a.view = None;
            a.filter = None;
        });
    }

    /// The address, once per change.
    pub fn take_address_update(&mut self) -> Option<NavAddress> {
        if self.address_dirty {
            self.address_dirty = false;
            Some(self.address.clone())
        } else {
            None
        }
    }

    /// Records the paused (live) or current (history) timestamp. `None` or 0
    /// removes it.
    pub fn set_timestamp(&mut self, timestamp: Option<i64>) {
        let timestamp = timestamp.filter(|ts| *ts != 0);
        self.persist(|a| a.timestamp = timestamp);
    }

    // ------------------------------------------------------------
    // Commands
    // ------------------------------------------------------------

    /// Switches tab. Clears selection, detail, column filter, filter text,
    /// view and flash. Same tab is a no-op.
    pub fn change_tab(&mut self, tab: CollectionKey) {
        if tab == self.state.active_tab {
            return;
        }
        if self
            .pending
            .as_ref()
            .is_some_and(|p| p.target_tab != tab)
        {
            debug!(%tab, "tab change discards pending drill-down");
            self.pending = None;
        }
        self.enter_tab(tab);
    }

    /// Tab switch without touching the pending request.
    fn enter_tab(&mut self, tab: CollectionKey) {
        debug!(from = %self.state.active_tab, to = %tab, "tab change");
        self.state = SelectionState {
            active_tab: tab,
            ..Default::default()
        };
        self.flash = None;
        self.persist_tab(tab);
    }

    /// Selects a row (or nothing). Opens the detail for a row.
    pub fn select_row(&mut self, id: Option<EntityId>) {
        self.state.detail_open = id.is_some();
        self.state.selected = id;
        self.flash = None;
    }

    pub fn open_detail(&mut self) {
        if self.state.selected.is_some() {
            self.state.detail_open = true;
        }
    }

    pub fn close_detail(&mut self) {
        self.state.detail_open = false;
    }

    pub fn toggle_detail(&mut self) {
        if self.state.detail_open {
            self.close_detail();
        } else {
            self.open_detail();
        }
    }

    pub fn change_view(&mut self, view: Option<String>) {
        let view = view.filter(|v| !v.is_empty());
        self.state.active_view = view.clone();
        self.persist(|a| a.view = view);
    }

    /// Advances to the next view of the active tab. Landing on the default
    /// view stores it as `None`.
    pub fn cycle_view(&mut self) {
        let tab = self.state.active_tab;
        let views = self.catalog.views(tab);
        if views.is_empty() {
            return;
        }
        let current = self.effective_view();
        let idx = views
            .iter()
            .position(|v| Some(v.key.as_str()) == current)
            .map_or(0, |i| (i + 1) % views.len());
        let next = views[idx].key.clone();
        if self.catalog.default_view(tab) == Some(next.as_str()) {
            self.change_view(None);
        } else {
            self.change_view(Some(next));
        }
    }

    /// Sets the free-text filter. Empty text persists as absent.
    pub fn change_filter_text(&mut self, text: impl Into<String>) {
        let text = text.into();
        let persisted = Some(text.clone()).filter(|t| !t.is_empty());
        self.state.filter_text = text;
        self.persist(|a| a.filter = persisted);
    }

    pub fn set_column_filter(&mut self, filter: ColumnFilter) {
        debug!(%filter, "column filter set");
        self.state.column_filter = Some(filter);
    }

    pub fn clear_column_filter(&mut self) {
        self.state.column_filter = None;
    }

    /// Moves the selection by `delta` over the visible rows. With nothing
    /// selected, forward starts at the first row and backward at the last.
    pub fn step_selection(&mut self, delta: isize) {
        let next = {
            let rows = self.visible_rows();
            if rows.is_empty() {
                return;
            }
            let last = rows.len() - 1;
            let pos = self
                .state
                .selected
                .as_ref()
                .and_then(|id| rows.iter().position(|r| &r.entity_id() == id));
            let idx = match pos {
                Some(p) => p.saturating_add_signed(delta).min(last),
                None if delta < 0 => last,
                None => 0,
            };
            rows[idx].entity_id()
        };
        self.state.selected = Some(next);
        self.flash = None;
    }

    pub fn select_first(&mut self) {
        self.select_visible_at(|_| 0);
    }

    pub fn select_last(&mut self) {
        self.select_visible_at(|len| len - 1);
    }

    fn select_visible_at(&mut self, index: impl FnOnce(usize) -> usize) {
        let id = {
            let rows = self.visible_rows();
            if rows.is_empty() {
                return;
            }
            rows[index(rows.len())].entity_id()
        };
        self.state.selected = Some(id);
        self.flash = None;
    }

    /// Starts a drill-down: switches to the target tab at once and resolves
    /// against the current snapshot if the target row is already there.
    /// Otherwise the next snapshot decides. Returns false if the descriptor
    /// names an unknown tab.
    pub fn request_drill_down(
        &mut self,
        descriptor: &DrillDown,
        value: Scalar,
        source_row: RowRef<'_>,
    ) -> bool {
        let Some(target_tab) = descriptor.target_tab() else {
            warn!(target = %descriptor.target, "drill-down to unknown tab ignored");
            return false;
        };
        let target_field = descriptor
            .target_field
            .clone()
            .unwrap_or_else(|| self.catalog.entity_field(target_tab).to_string());
        let filter = match (&descriptor.filter_target, &descriptor.filter_via) {
            (Some(column), Some(via)) => source_row
                .field(via)
                .filter(|v| !v.is_null())
                .map(|v| ColumnFilter::new(column.clone(), v)),
            _ => None,
        };

        debug!(
            %target_tab,
            field = %target_field,
            value = %value,
            "drill-down requested"
        );
        self.pending = Some(PendingDrillDown {
            target_tab,
            target_field,
            value,
            filter,
            requested_at: self.current.as_ref().map(|s| s.timestamp),
        });
        self.enter_tab(target_tab);

        if let Some(snapshot) = self.current.clone() {
            self.resolve_pending(&snapshot, false);
        }
        true
    }

    /// Drill-down from the selected row using the active tab's descriptor.
    pub fn drill_down_selected(&mut self) -> bool {
        let catalog = Arc::clone(&self.catalog);
        let Some(descriptor) = catalog.drill_down(self.state.active_tab) else {
            return false;
        };
        let Some(snapshot) = self.current.clone() else {
            return false;
        };
        let Some(row) = self
            .state
            .selected
            .as_ref()
            .and_then(|id| snapshot.find(self.state.active_tab, id))
        else {
            return false;
        };
        let Some(value) = row.field(&descriptor.via).filter(|v| !v.is_null()) else {
            debug!(via = %descriptor.via, "selected row has no drill-down value");
            return false;
        };
        self.request_drill_down(descriptor, value, row)
    }

    /// New snapshot from the store. Runs liveness, then drill-down
    /// resolution. In history mode the snapshot timestamp becomes part of
    /// the address.
    pub fn on_snapshot(&mut self, snapshot: Arc<Snapshot>) {
        if self.catalog.mode() == Mode::History {
            self.set_timestamp(Some(snapshot.timestamp));
        }
        self.current = Some(Arc::clone(&snapshot));
        self.check_liveness(&snapshot);
        self.resolve_on_arrival(&snapshot);
    }
}
