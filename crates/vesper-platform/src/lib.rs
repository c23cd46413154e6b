// SPDX-License-Identifier: CEPL-1.0
//! winit-backed window host. Events are pumped explicitly once per tick so
//! the render loop, not the windowing library, owns the call stack.
#![deny(unsafe_op_in_unsafe_fn)]
use anyhow::{bail, Result};
use raw_window_handle::{
    DisplayHandle, HandleError, HasDisplayHandle, HasWindowHandle, WindowHandle,
};
use std::time::Duration;
use tracing::{debug, info, warn};
use vesper_render::{RenderSize, WindowConfig, WindowHost};

pub use winit;

use winit::{
    application::ApplicationHandler,
    dpi::{LogicalSize, PhysicalPosition, PhysicalSize},
    event::WindowEvent,
    event_loop::{ActiveEventLoop, EventLoop},
    platform::pump_events::{EventLoopExtPumpEvents, PumpStatus},
    window::{Window, WindowId},
};

/// Upper bound on a single pump while waiting for the window to appear.
const STARTUP_PUMP: Duration = Duration::from_millis(16);

struct HostState {
    config: WindowConfig,
    window: Option<Window>,
    create_error: Option<String>,
    resized: bool,
    close_requested: bool,
}

impl HostState {
    fn create_window(&mut self, event_loop: &ActiveEventLoop) {
        let cfg = &self.config;
        let attrs = Window::default_attributes()
            .with_title(cfg.title.clone())
            .with_inner_size(LogicalSize::new(cfg.width, cfg.height))
            .with_resizable(cfg.resizable)
            .with_visible(false);

        let window = match event_loop.create_window(attrs) {
            Ok(w) => w,
            Err(e) => {
                self.create_error = Some(e.to_string());
                return;
            }
        };

        match cfg.position {
            Some([x, y]) => window.set_outer_position(PhysicalPosition::new(x, y)),
            None => match window.current_monitor().or_else(|| window.primary_monitor()) {
                Some(monitor) => {
                    let pos = centered_position(monitor.position(), monitor.size(), window.outer_size());
                    window.set_outer_position(pos);
                }
                None => warn!("no monitor reported; leaving window placement to the compositor"),
            },
        }

        if cfg.visible {
            window.set_visible(true);
        }

        let size = window.inner_size();
        info!(
            "window \"{}\" created ({}x{} px, scale {:.2})",
            cfg.title,
            size.width,
            size.height,
            window.scale_factor()
        );
        self.window = Some(window);
    }
}

impl ApplicationHandler for HostState {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_none() {
            self.create_window(event_loop);
        }
    }

    fn window_event(&mut self, _event_loop: &ActiveEventLoop, window_id: WindowId, event: WindowEvent) {
        if let Some(window) = &self.window {
            if window_id != window.id() {
                return;
            }
        }

        match event {
            WindowEvent::CloseRequested => {
                debug!("CloseRequested");
                self.close_requested = true;
            }
            WindowEvent::Resized(size) => {
                debug!("Resized → {}x{}", size.width, size.height);
                self.resized = true;
            }
            WindowEvent::ScaleFactorChanged { scale_factor, .. } => {
                debug!("ScaleFactorChanged → {scale_factor:.2}");
                self.resized = true;
            }
            _ => {}
        }
    }
}

/// Window host driven by `pump_app_events`.
pub struct WinitHost {
    // Declared before the event loop so the window is dropped first.
    state: HostState,
    event_loop: EventLoop<()>,
}

impl WinitHost {
    /// Creates the event loop and pumps it until the window exists.
    pub fn open(config: &WindowConfig) -> Result<Self> {
        let event_loop = EventLoop::new()?;
        let mut host = WinitHost {
            state: HostState {
                config: config.clone(),
                window: None,
                create_error: None,
                resized: false,
                close_requested: false,
            },
            event_loop,
        };

        while host.state.window.is_none() {
            if let PumpStatus::Exit(code) = host
                .event_loop
                .pump_app_events(Some(STARTUP_PUMP), &mut host.state)
            {
                bail!("event loop exited with {code} before the window was created");
            }
            if let Some(err) = host.state.create_error.take() {
                bail!("create_window: {err}");
            }
        }
        // Creation itself may have queued a Resized; the swapchain is built
        // against the current size anyway.
        host.state.resized = false;
        Ok(host)
    }

    fn pump(&mut self, timeout: Option<Duration>) {
        if let PumpStatus::Exit(code) = self.event_loop.pump_app_events(timeout, &mut self.state) {
            debug!("event loop exit ({code}); treating as close request");
            self.state.close_requested = true;
        }
    }

    fn window(&self) -> Result<&Window, HandleError> {
        self.state.window.as_ref().ok_or(HandleError::Unavailable)
    }
}

impl HasWindowHandle for WinitHost {
    fn window_handle(&self) -> Result<WindowHandle<'_>, HandleError> {
        self.window()?.window_handle()
    }
}

impl HasDisplayHandle for WinitHost {
    fn display_handle(&self) -> Result<DisplayHandle<'_>, HandleError> {
        self.window()?.display_handle()
    }
}

impl WindowHost for WinitHost {
    fn poll_events(&mut self) {
        self.pump(Some(Duration::ZERO));
    }

    fn wait_events(&mut self) {
        self.pump(None);
    }

    fn drawable_size(&self) -> RenderSize {
        match &self.state.window {
            Some(w) => {
                let size = w.inner_size();
                RenderSize::new(size.width, size.height)
            }
            None => RenderSize::default(),
        }
    }

    fn take_resized(&mut self) -> bool {
        std::mem::take(&mut self.state.resized)
    }

    fn close_requested(&self) -> bool {
        self.state.close_requested
    }

    fn set_close_requested(&mut self, requested: bool) {
        self.state.close_requested = requested;
    }
}

/// Top-left corner that centers `window` on a monitor.
fn centered_position(
    monitor_pos: PhysicalPosition<i32>,
    monitor: PhysicalSize<u32>,
    window: PhysicalSize<u32>,
) -> PhysicalPosition<i32> {
    let dx = (monitor.width as i64 - window.width as i64) / 2;
    let dy = (monitor.height as i64 - window.height as i64) / 2;
    PhysicalPosition::new(monitor_pos.x + dx as i32, monitor_pos.y + dy as i32)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn centers_on_primary_monitor() {
        let pos = centered_position(
            PhysicalPosition::new(0, 0),
            PhysicalSize::new(1920, 1080),
            PhysicalSize::new(800, 600),
        );
        assert_eq!(pos, PhysicalPosition::new(560, 240));
    }

    #[test]
    fn centers_relative_to_monitor_origin() {
        let pos = centered_position(
            PhysicalPosition::new(1920, 0),
            PhysicalSize::new(2560, 1440),
            PhysicalSize::new(1280, 720),
        );
        assert_eq!(pos, PhysicalPosition::new(1920 + 640, 360));
    }

    #[test]
    fn oversized_window_goes_negative() {
        let pos = centered_position(
            PhysicalPosition::new(0, 0),
            PhysicalSize::new(800, 600),
            PhysicalSize::new(1000, 700),
        );
        assert_eq!(pos, PhysicalPosition::new(-100, -50));
    }
}
