// SPDX-License-Identifier: CEPL-1.0
use crate::RenderSize;
use raw_window_handle::{HasDisplayHandle, HasWindowHandle};

/// What the core needs from the windowing collaborator.
///
/// Resize notifications are a coalesced flag: any number of resizes between
/// two `take_resized` calls read back as a single `true`.
pub trait WindowHost: HasWindowHandle + HasDisplayHandle {
    /// Dispatches pending events without blocking.
    fn poll_events(&mut self);

    /// Blocks until at least one event arrives.
    fn wait_events(&mut self);

    /// Current framebuffer size in physical pixels (not the logical window
    /// size, which differs under DPI scaling).
    fn drawable_size(&self) -> RenderSize;

    /// Returns and clears the pending-resize flag.
    fn take_resized(&mut self) -> bool;

    fn close_requested(&self) -> bool;

    fn set_close_requested(&mut self, requested: bool);
}
