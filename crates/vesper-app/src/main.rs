// SPDX-License-Identifier: CEPL-1.0
#![deny(unsafe_op_in_unsafe_fn)]
use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use tracing::{debug, error, info, Level};
use vesper_core::init_tracing;
use vesper_platform::WinitHost;
use vesper_render::{AppConfig, Application, PresentMode, RenderLoop};
use vesper_render_vk::VkRenderer;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// TOML config file; a missing file means defaults
    #[arg(long, default_value = "vesper.toml")]
    config: PathBuf,

    /// Enable validation layers and forward their messages to the log
    #[arg(long)]
    debug: bool,

    /// vsync | triple_buffering | immediate | relaxed_vsync
    #[arg(long)]
    present_mode: Option<PresentMode>,

    /// Log level used when RUST_LOG is unset
    #[arg(long, default_value = "info")]
    log: Level,
}

impl Args {
    fn apply(&self, config: &mut AppConfig) {
        if self.debug {
            config.render.debug = true;
        }
        if let Some(mode) = self.present_mode {
            config.render.present_mode = mode;
        }
    }
}

/// Draws the built-in triangle and counts what happened.
#[derive(Default)]
struct TriangleDemo {
    frames: u64,
    resizes: u32,
}

impl Application for TriangleDemo {
    fn on_create(&mut self) {
        info!("triangle demo created");
    }

    fn on_render(&mut self) {
        self.frames += 1;
    }

    fn on_resize(&mut self) {
        self.resizes += 1;
        debug!("resize #{}", self.resizes);
    }

    fn on_dispose(&mut self) {
        info!(
            "triangle demo disposed after {} frames and {} resizes",
            self.frames, self.resizes
        );
    }
}

fn run(args: &Args) -> Result<()> {
    let mut config = AppConfig::load(&args.config)?;
    args.apply(&mut config);
    info!(
        "window \"{}\" {}x{}, present mode {}, debug {}",
        config.window.title,
        config.window.width,
        config.window.height,
        config.render.present_mode,
        config.render.debug
    );

    let mut host = WinitHost::open(&config.window).context("open window")?;
    let mut renderer = VkRenderer::new();
    let mut app = TriangleDemo::default();

    RenderLoop::new(config.window.max_framerate).run(
        &mut app,
        &mut host,
        &mut renderer,
        &config.render,
    )
}

fn main() {
    let args = Args::parse();
    init_tracing(args.log);

    if let Err(e) = run(&args) {
        error!("{e:#}");
        std::process::exit(1);
    }
}
