#![forbid(unsafe_code)]

//! Forwarding of native `storage` events into an [`EventChannel`].
//!
//! Browsers fire `storage` on every *other* tab of the same origin when a
//! tab writes to `localStorage`. [`WindowBridge`] listens for those events
//! and re-dispatches them on the channel, so bridges react to other tabs'
//! writes exactly as they react to local [`update_storage`] calls.

use tabsync_runtime::{EventChannel, StorageError, StorageEvent};
use wasm_bindgen::JsCast;
use wasm_bindgen::closure::Closure;

use crate::web_storage::{area_for, js_error};

/// Window `storage` listener, removed on drop.
pub struct WindowBridge {
    window: web_sys::Window,
    listener: Closure<dyn FnMut(web_sys::StorageEvent)>,
}

impl WindowBridge {
    /// Start forwarding native storage events to `channel`.
    pub fn install(channel: &EventChannel) -> Result<Self, StorageError> {
        let window = current_window()?;
        channel.set_location(window.location().href().map_err(js_error)?);

        let target = channel.clone();
        let listener = Closure::<dyn FnMut(web_sys::StorageEvent)>::new(
            move |native: web_sys::StorageEvent| {
                let event = StorageEvent {
                    key: native.key(),
                    old_value: native.old_value(),
                    new_value: native.new_value(),
                    storage_area: native.storage_area().and_then(|raw| area_for(&raw)),
                    url: native.url(),
                };
                tracing::trace!(key = event.key.as_deref().unwrap_or("<clear>"), "forwarding native storage event");
                target.dispatch(&event);
            },
        );
        window
            .add_event_listener_with_callback("storage", listener.as_ref().unchecked_ref())
            .map_err(js_error)?;
        tracing::debug!("window storage listener installed");
        Ok(Self { window, listener })
    }
}

impl Drop for WindowBridge {
    fn drop(&mut self) {
        match self
            .window
            .remove_event_listener_with_callback("storage", self.listener.as_ref().unchecked_ref())
        {
            Ok(()) => tracing::debug!("window storage listener removed"),
            Err(err) => {
                tracing::debug!(error = %js_error(err), "failed to remove window storage listener");
            }
        }
    }
}

impl std::fmt::Debug for WindowBridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WindowBridge").finish_non_exhaustive()
    }
}

/// Copy `window.location.href` into `channel`'s location.
pub fn refresh_location(channel: &EventChannel) -> Result<(), StorageError> {
    let href = current_window()?.location().href().map_err(js_error)?;
    channel.set_location(href);
    Ok(())
}

/// [`tabsync_runtime::update_storage`] with the event URL taken from the
/// current page location.
pub fn update_storage(
    area: &tabsync_runtime::StorageArea,
    key: &str,
    new_value: &str,
) -> Result<(), StorageError> {
    let channel = EventChannel::global();
    refresh_location(&channel)?;
    channel.update_storage(area, key, new_value)
}

fn current_window() -> Result<web_sys::Window, StorageError> {
    web_sys::window().ok_or_else(|| StorageError::Unavailable("no window in this context".to_string()))
}
