// SPDX-License-Identifier: CEPL-1.0

/// Hooks the driver calls around the backend's lifetime.
///
/// Order: `on_create` once before the first tick, `on_render` once per tick
/// before the frame is drawn, `can_close` whenever the window asks to close,
/// `on_dispose` once after the loop ends and before the backend is torn down.
pub trait Application {
    fn on_create(&mut self);

    fn on_render(&mut self);

    /// Called after a (coalesced) framebuffer resize was observed.
    fn on_resize(&mut self) {}

    /// Returning false keeps the loop alive and clears the close request.
    fn can_close(&mut self) -> bool {
        true
    }

    fn on_dispose(&mut self);
}
