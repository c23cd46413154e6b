// SPDX-License-Identifier: CEPL-1.0
use crate::{Application, RenderSettings, Renderer, WindowHost};
use anyhow::{Context, Result};
use std::time::{Duration, Instant};
use tracing::{error, info};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RunState {
    Running,
    Stopped,
}

/// Top-level loop: poll events, run the application hook, draw, handle
/// close requests. Single-threaded; the backend is only touched from here.
pub struct RenderLoop {
    state: RunState,
    frame_interval: Option<Duration>,
    next_deadline: Option<Instant>,
    ticks: u64,
    frames_this_second: u32,
    last_fps_instant: Instant,
}

impl RenderLoop {
    /// `max_framerate == 0` leaves pacing to the present mode.
    pub fn new(max_framerate: u32) -> Self {
        let frame_interval = (max_framerate > 0)
            .then(|| Duration::from_nanos(1_000_000_000u64 / max_framerate as u64));
        Self {
            state: RunState::Stopped,
            frame_interval,
            next_deadline: None,
            ticks: 0,
            frames_this_second: 0,
            last_fps_instant: Instant::now(),
        }
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Runs until the application agrees to close. The backend is torn down
    /// before returning, on success and on a fatal frame error alike.
    pub fn run<A, H, R>(
        &mut self,
        app: &mut A,
        host: &mut H,
        renderer: &mut R,
        settings: &RenderSettings,
    ) -> Result<()>
    where
        A: Application + ?Sized,
        H: WindowHost,
        R: Renderer + ?Sized,
    {
        renderer
            .init(&*host, settings)
            .context("render backend init")?;

        app.on_create();
        self.state = RunState::Running;

        while self.state == RunState::Running {
            if let Err(e) = self.tick(app, host, renderer) {
                error!("fatal frame error: {e:#}");
                self.state = RunState::Stopped;
                renderer.shutdown();
                return Err(e);
            }
        }

        app.on_dispose();
        renderer.shutdown();
        info!("render loop stopped after {} ticks", self.ticks);
        Ok(())
    }

    /// One iteration of the loop.
    pub fn tick<A, H, R>(&mut self, app: &mut A, host: &mut H, renderer: &mut R) -> Result<RunState>
    where
        A: Application + ?Sized,
        H: WindowHost,
        R: Renderer + ?Sized,
    {
        host.poll_events();
        if host.take_resized() {
            renderer.notify_resized();
            app.on_resize();
        }

        app.on_render();
        renderer.draw_frame(host)?;
        self.ticks += 1;
        self.count_frame();

        if host.close_requested() {
            if app.can_close() {
                self.state = RunState::Stopped;
            } else {
                info!("close refused by application");
                host.set_close_requested(false);
            }
        }

        if self.state == RunState::Running {
            self.pace();
        }
        Ok(self.state)
    }

    fn count_frame(&mut self) {
        self.frames_this_second = self.frames_this_second.saturating_add(1);
        let now = Instant::now();
        if now.duration_since(self.last_fps_instant).as_secs_f32() >= 1.0 {
            info!("fps ~ {}", self.frames_this_second);
            self.frames_this_second = 0;
            self.last_fps_instant = now;
        }
    }

    fn pace(&mut self) {
        let Some(interval) = self.frame_interval else {
            return;
        };
        let now = Instant::now();
        let deadline = self.next_deadline.unwrap_or(now);
        if deadline > now {
            std::thread::sleep(deadline - now);
        }
        self.next_deadline = Some(deadline.max(now) + interval);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uncapped_has_no_interval() {
        assert!(RenderLoop::new(0).frame_interval.is_none());
        assert_eq!(
            RenderLoop::new(50).frame_interval,
            Some(Duration::from_millis(20))
        );
    }

    #[test]
    fn pacing_spaces_ticks_by_interval() {
        let mut driver = RenderLoop::new(100);
        let start = Instant::now();
        driver.pace();
        driver.pace();
        driver.pace();
        assert!(start.elapsed() >= Duration::from_millis(20));
    }

    #[test]
    fn starts_stopped() {
        let driver = RenderLoop::new(0);
        assert_eq!(driver.state(), RunState::Stopped);
        assert_eq!(driver.ticks(), 0);
    }
}
