//! rpglot-client-core: navigation and selection core for the rpglot remote client.
//!
//! Provides:
//! - `model`: snapshot data model (collections, typed rows, scalar values)
//! - `schema`: server schema (views, entity ids, drill-down descriptors)
//! - `session`: session context (server address, credentials, auth config)
//! - `store`: snapshot store shared by the controller and the renderer
//! - `address`: shareable navigation address codec
//! - `provider`: live (push) and history (pull) snapshot providers
//! - `controller`: selection and drill-down state machine
//! - `util`: helper utilities (time parsing)
//!
//! With `http` feature (default):
//! - `provider::http`: reqwest transport for both providers
//!
//! With `tui` feature (default):
//! - `tui`: crossterm keyboard layer and terminal event pump

pub mod address;
pub mod controller;
pub mod model;
pub mod provider;
pub mod schema;
pub mod session;
pub mod store;
pub mod util;

#[cfg(feature = "tui")]
pub mod tui;

/// Crate version reported in the user agent and the help popup.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
