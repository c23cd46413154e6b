// SPDX-License-Identifier: CEPL-1.0
use anyhow::{anyhow, Result};
use raw_window_handle::{
    DisplayHandle, HandleError, HasDisplayHandle, HasWindowHandle, WindowHandle,
};
use std::{cell::RefCell, collections::VecDeque, rc::Rc};
use vesper_render::{
    Application, BackendSlot, RenderLoop, RenderSettings, RenderSize, Renderer, RunState,
    WindowHost,
};

type Log = Rc<RefCell<Vec<String>>>;

#[derive(Default, Clone, Copy)]
struct TickEvents {
    resizes: usize,
    close: bool,
}

struct ScriptedHost {
    log: Log,
    script: VecDeque<TickEvents>,
    resized: bool,
    close: bool,
}

impl ScriptedHost {
    fn new(log: &Log, script: impl IntoIterator<Item = TickEvents>) -> Self {
        Self {
            log: log.clone(),
            script: script.into_iter().collect(),
            resized: false,
            close: false,
        }
    }
}

impl HasWindowHandle for ScriptedHost {
    fn window_handle(&self) -> Result<WindowHandle<'_>, HandleError> {
        Err(HandleError::Unavailable)
    }
}

impl HasDisplayHandle for ScriptedHost {
    fn display_handle(&self) -> Result<DisplayHandle<'_>, HandleError> {
        Err(HandleError::Unavailable)
    }
}

impl WindowHost for ScriptedHost {
    fn poll_events(&mut self) {
        self.log.borrow_mut().push("poll".into());
        // An exhausted script behaves like a user closing the window.
        let ev = self.script.pop_front().unwrap_or(TickEvents {
            resizes: 0,
            close: true,
        });
        for _ in 0..ev.resizes {
            self.resized = true;
        }
        self.close |= ev.close;
    }

    fn wait_events(&mut self) {
        self.poll_events();
    }

    fn drawable_size(&self) -> RenderSize {
        RenderSize::new(800, 600)
    }

    fn take_resized(&mut self) -> bool {
        std::mem::take(&mut self.resized)
    }

    fn close_requested(&self) -> bool {
        self.close
    }

    fn set_close_requested(&mut self, requested: bool) {
        self.close = requested;
    }
}

struct FakeBackend;

struct FakeRenderer {
    log: Log,
    slot: BackendSlot<FakeBackend>,
    fail_init: bool,
    fail_draw_at: Option<usize>,
    draws: usize,
}

impl FakeRenderer {
    fn new(log: &Log) -> Self {
        Self {
            log: log.clone(),
            slot: BackendSlot::new(),
            fail_init: false,
            fail_draw_at: None,
            draws: 0,
        }
    }
}

impl Renderer for FakeRenderer {
    fn init(&mut self, _host: &dyn WindowHost, _settings: &RenderSettings) -> Result<()> {
        self.log.borrow_mut().push("init".into());
        let fail = self.fail_init;
        self.slot.init_with(|| {
            if fail {
                Err(anyhow!("no suitable GPU found"))
            } else {
                Ok(FakeBackend)
            }
        })?;
        Ok(())
    }

    fn notify_resized(&mut self) {
        self.log.borrow_mut().push("resized".into());
    }

    fn draw_frame(&mut self, _host: &mut dyn WindowHost) -> Result<()> {
        self.slot.get_mut()?;
        self.draws += 1;
        self.log.borrow_mut().push("draw".into());
        if self.fail_draw_at == Some(self.draws) {
            return Err(anyhow!("queue_submit failed: ERROR_DEVICE_LOST"));
        }
        Ok(())
    }

    fn shutdown(&mut self) {
        if self.slot.take().is_some() {
            self.log.borrow_mut().push("shutdown".into());
        }
    }
}

struct RecordingApp {
    log: Log,
    refusals_left: usize,
}

impl Application for RecordingApp {
    fn on_create(&mut self) {
        self.log.borrow_mut().push("create".into());
    }

    fn on_render(&mut self) {
        self.log.borrow_mut().push("render".into());
    }

    fn on_resize(&mut self) {
        self.log.borrow_mut().push("app_resize".into());
    }

    fn can_close(&mut self) -> bool {
        self.log.borrow_mut().push("can_close".into());
        if self.refusals_left > 0 {
            self.refusals_left -= 1;
            false
        } else {
            true
        }
    }

    fn on_dispose(&mut self) {
        self.log.borrow_mut().push("dispose".into());
    }
}

fn app(log: &Log, refusals: usize) -> RecordingApp {
    RecordingApp {
        log: log.clone(),
        refusals_left: refusals,
    }
}

fn entries(log: &Log) -> Vec<String> {
    log.borrow().clone()
}

#[test]
fn hooks_bracket_the_loop_in_order() {
    let log = Log::default();
    let mut host = ScriptedHost::new(&log, [TickEvents::default()]);
    let mut renderer = FakeRenderer::new(&log);
    let mut app = app(&log, 0);

    let mut driver = RenderLoop::new(0);
    driver
        .run(&mut app, &mut host, &mut renderer, &RenderSettings::default())
        .unwrap();

    assert_eq!(
        entries(&log),
        [
            "init", "create", "poll", "render", "draw", "poll", "render", "draw", "can_close",
            "dispose", "shutdown",
        ]
    );
    assert_eq!(driver.state(), RunState::Stopped);
    assert_eq!(driver.ticks(), 2);
}

#[test]
fn refused_close_clears_the_request_and_keeps_running() {
    let log = Log::default();
    let close = TickEvents {
        resizes: 0,
        close: true,
    };
    let mut host = ScriptedHost::new(&log, [close, TickEvents::default()]);
    let mut renderer = FakeRenderer::new(&log);
    let mut app = app(&log, 1);

    let mut driver = RenderLoop::new(0);
    driver
        .run(&mut app, &mut host, &mut renderer, &RenderSettings::default())
        .unwrap();

    let log = entries(&log);
    assert_eq!(log.iter().filter(|e| *e == "can_close").count(), 2);
    // tick 1 refused, tick 2 had no close event, tick 3 closed for good
    assert_eq!(driver.ticks(), 3);
    assert_eq!(log.last().map(String::as_str), Some("shutdown"));
}

#[test]
fn several_resizes_before_a_tick_notify_once() {
    let log = Log::default();
    let burst = TickEvents {
        resizes: 4,
        close: false,
    };
    let mut host = ScriptedHost::new(&log, [burst]);
    let mut renderer = FakeRenderer::new(&log);
    let mut app = app(&log, 0);

    RenderLoop::new(0)
        .run(&mut app, &mut host, &mut renderer, &RenderSettings::default())
        .unwrap();

    let log = entries(&log);
    assert_eq!(log.iter().filter(|e| *e == "resized").count(), 1);
    let resized = log.iter().position(|e| e == "resized").unwrap();
    let first_draw = log.iter().position(|e| e == "draw").unwrap();
    assert!(resized < first_draw);
    assert_eq!(log[resized + 1], "app_resize");
}

#[test]
fn fatal_draw_error_tears_down_without_dispose() {
    let log = Log::default();
    let mut host = ScriptedHost::new(&log, [TickEvents::default(); 5]);
    let mut renderer = FakeRenderer::new(&log);
    renderer.fail_draw_at = Some(2);
    let mut app = app(&log, 0);

    let err = RenderLoop::new(0)
        .run(&mut app, &mut host, &mut renderer, &RenderSettings::default())
        .unwrap_err();

    assert!(err.to_string().contains("ERROR_DEVICE_LOST"));
    let log = entries(&log);
    assert!(!log.iter().any(|e| e == "dispose"));
    assert_eq!(log.last().map(String::as_str), Some("shutdown"));
}

#[test]
fn failed_init_never_creates_the_application() {
    let log = Log::default();
    let mut host = ScriptedHost::new(&log, []);
    let mut renderer = FakeRenderer::new(&log);
    renderer.fail_init = true;
    let mut app = app(&log, 0);

    let err = RenderLoop::new(0)
        .run(&mut app, &mut host, &mut renderer, &RenderSettings::default())
        .unwrap_err();

    assert!(format!("{err:#}").contains("no suitable GPU"));
    assert_eq!(entries(&log), ["init"]);
}

#[test]
fn double_init_is_an_error() {
    let log = Log::default();
    let host = ScriptedHost::new(&log, []);
    let mut renderer = FakeRenderer::new(&log);
    let settings = RenderSettings::default();

    renderer.init(&host, &settings).unwrap();
    let err = renderer.init(&host, &settings).unwrap_err();
    assert_eq!(
        err.downcast_ref::<vesper_render::RenderError>(),
        Some(&vesper_render::RenderError::AlreadyInitialized)
    );
}
