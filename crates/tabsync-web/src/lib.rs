#![forbid(unsafe_code)]

//! Browser integration for tabsync.
//!
//! - [`routes`]: the application's static route table (all targets).
//! - `web_storage` (wasm32): `localStorage`/`sessionStorage` as
//!   [`StorageArea`](tabsync_runtime::StorageArea)s.
//! - `window_bridge` (wasm32): forwards native cross-tab `storage` events
//!   into the runtime's [`EventChannel`](tabsync_runtime::EventChannel).
//!
//! A page typically opens its areas, installs one `WindowBridge` on the
//! global channel for its lifetime, and builds bridges with
//! [`use_reactive_storage`](tabsync_runtime::use_reactive_storage).

pub mod routes;

#[cfg(target_arch = "wasm32")]
mod web_storage;
#[cfg(target_arch = "wasm32")]
mod window_bridge;

pub use routes::{Route, RouteError, RouteTable, View, app_routes};
#[cfg(target_arch = "wasm32")]
pub use web_storage::{WebStorage, local_storage, session_storage};
#[cfg(target_arch = "wasm32")]
pub use window_bridge::{WindowBridge, refresh_location, update_storage};
