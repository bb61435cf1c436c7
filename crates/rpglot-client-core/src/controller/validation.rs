//! Snapshot-reactive passes of the selection controller.

use tracing::debug;

use super::{SelectionController, scalar_matches};
use crate::model::Snapshot;

impl SelectionController {
    /// Pass 1: drops a selection whose row is gone from the active
    /// collection. Skipped while a flash is set, since the flash target may
    /// still be resolving.
    pub(super) fn check_liveness(&mut self, snapshot: &Snapshot) {
        if self.flash.is_some() {
            return;
        }
        let Some(id) = &self.state.selected else {
            return;
        };
        if snapshot.find(self.state.active_tab, id).is_none() {
            debug!(tab = %self.state.active_tab, %id, "selected row vanished");
            self.state.selected = None;
            self.state.detail_open = false;
        }
    }

    /// Pass 2: a snapshot arrival decides the pending drill-down, hit or miss.
    pub(super) fn resolve_on_arrival(&mut self, snapshot: &Snapshot) {
        let Some(pending) = &self.pending else {
            return;
        };
        if pending.target_tab != self.state.active_tab {
            debug!(target = %pending.target_tab, "pending drill-down no longer reachable");
            self.pending = None;
            return;
        }
        self.resolve_pending(snapshot, true);
    }

    /// Tries to resolve the pending request against `snapshot`.
    ///
    /// A column filter carried by the request resets the view to the
    /// collection default and is applied first. On a hit the row is
    /// selected, the detail opened and the row flashed. With `last_chance`
    /// a miss discards the request; otherwise it stays pending.
    pub(super) fn resolve_pending(&mut self, snapshot: &Snapshot, last_chance: bool) {
        let Some(pending) = self.pending.take() else {
            return;
        };

        if let Some(filter) = &pending.filter {
            self.state.active_view = None;
            self.state.column_filter = Some(filter.clone());
            self.persist(|a| a.view = None);
        }

        let hit = snapshot
            .rows(pending.target_tab)
            .find(|row| {
                row.field(&pending.target_field)
                    .is_some_and(|v| scalar_matches(&v, &pending.value))
            })
            .map(|row| row.entity_id());

        match hit {
            Some(id) => {
                debug!(tab = %pending.target_tab, %id, ts = snapshot.timestamp, "drill-down resolved");
                self.state.selected = Some(id.clone());
                self.state.detail_open = true;
                self.flash = Some(id);
            }
            None if last_chance => {
                debug!(
                    tab = %pending.target_tab,
                    field = %pending.target_field,
                    value = %pending.value,
                    "drill-down target not found, discarded"
                );
            }
            None => self.pending = Some(pending),
        }
    }
}
