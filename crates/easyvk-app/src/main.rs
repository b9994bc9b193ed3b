// SPDX-License-Identifier: CEPL-1.0
#![deny(unsafe_op_in_unsafe_fn)]
mod config;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use easyvk_core::{fps_title, init_tracing, FpsClock};
use easyvk_platform::{winit::dpi::PhysicalPosition, WinitWindow};
use easyvk_render::{RenderSize, WindowSystem};
use easyvk_render_vk::{
    vk, ContextBuilder, FrameOutcome, GraphicsContext, QueueCapabilities, TriangleRenderer,
};
use tracing::{error, info, warn};

use config::{load_cfg, AppCfg, RenderCfg};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the TOML config
    #[arg(long, default_value = "easyvk.toml")]
    config: PathBuf,
}

fn main() {
    init_tracing();
    let args = Args::parse();
    let cfg = load_cfg(&args.config);

    let code = match run(&cfg) {
        Ok(()) => 0,
        Err(e) => {
            error!("{e:#}");
            -1
        }
    };
    std::process::exit(code);
}

// STRICT ORDER:
// 1) Instance with the window system's surface extensions
// 2) Surface from this instance
// 3) Physical device whose queues can present to that surface
// 4) Device, then swapchain
fn init_vulkan(window: &WinitWindow, title: &str, render: &RenderCfg) -> Result<GraphicsContext> {
    let mut builder = ContextBuilder::new(title)?;
    builder.use_latest_api_version()?;
    builder.add_window_extensions(window)?;
    let missing = builder.check_instance_extensions(None)?;
    if !missing.is_empty() {
        warn!("instance extensions not available: {missing:?}");
    }

    let mut ctx = builder
        .create_instance(vk::InstanceCreateFlags::empty())
        .context("create instance")?;
    ctx.create_surface(window).context("create surface")?;
    ctx.select_physical_device(QueueCapabilities::GRAPHICS_PRESENT)
        .context("select physical device")?;
    ctx.create_device(vk::DeviceCreateFlags::empty())
        .context("create device")?;
    ctx.create_swapchain(
        render.limit_frame_rate,
        window.size(),
        vk::SwapchainCreateFlagsKHR::empty(),
    )
    .context("create swapchain")?;
    Ok(ctx)
}

fn run(cfg: &AppCfg) -> Result<()> {
    let mut window = WinitWindow::open(cfg.window.to_window_config())?;
    let mut ctx = init_vulkan(&window, &cfg.window.title, &cfg.render)?;
    let mut renderer =
        TriangleRenderer::new(&mut ctx, &cfg.render.shader_paths(), cfg.render.clear_color)
            .context("create triangle renderer")?;

    let looped = render_loop(&mut window, &mut ctx, &mut renderer, &cfg.window.title);
    // Idle on every exit, then renderer resources go before the context
    // that owns the device.
    let idle = ctx.wait_idle();
    drop(renderer);
    looped?;
    idle?;
    info!("shutdown");
    Ok(())
}

fn render_loop(
    window: &mut WinitWindow,
    ctx: &mut GraphicsContext,
    renderer: &mut TriangleRenderer,
    title: &str,
) -> Result<()> {
    let mut fps = FpsClock::default();
    let mut restore = Restore::of(window);

    while !window.should_close() {
        match renderer.draw_frame(ctx, window)? {
            FrameOutcome::Closed => break,
            FrameOutcome::Skipped => continue,
            FrameOutcome::Presented { .. } => {}
        }
        if let Some(rate) = fps.tick() {
            window.set_title(&fps_title(title, rate));
        }
        if window.take_fullscreen_toggle() {
            if window.is_fullscreen() {
                window.make_windowed(restore.position, restore.size);
            } else {
                restore = Restore::of(window).or(restore);
                window.make_fullscreen();
            }
        }
    }
    Ok(())
}

/// Where a fullscreen window goes back to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct Restore {
    position: PhysicalPosition<i32>,
    size: RenderSize,
}

impl Restore {
    fn of(window: &WinitWindow) -> Self {
        Self {
            position: window.outer_position().unwrap_or(PhysicalPosition::new(0, 0)),
            size: window.size(),
        }
    }

    /// Keeps `fallback`'s fields where this one has nothing usable.
    fn or(self, fallback: Self) -> Self {
        Self {
            position: self.position,
            size: if self.size.is_empty() {
                fallback.size
            } else {
                self.size
            },
        }
    }
}
