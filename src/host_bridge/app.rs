use std::path::Path;
use std::time::Duration;

use log::{error, info};

use crate::host_bridge::clock::{Clock, ManualClock, SystemClock};
use crate::host_bridge::config::{BridgeConfig, SCREEN_HEIGHT, SCREEN_WIDTH};
use crate::host_bridge::display::RasterCanvas;
use crate::host_bridge::error::BridgeError;
use crate::host_bridge::guest::Guest;
use crate::host_bridge::imports::HostEnv;
use crate::host_bridge::scheduler::{CycleScheduler, SchedulerState, SchedulerStats};
use crate::host_bridge::session::Session;
use crate::host_bridge::wasm_guest::WasmGuest;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    pub frames: usize,
    /// Scheduler state when the loop ended, before the guest was torn down.
    pub state: SchedulerState,
    pub stats: SchedulerStats,
    /// Logical cells lit on the presentation surface when the run ended.
    pub lit_cells: usize,
}

fn start_session<K: Clock + Send + 'static>(
    config: &BridgeConfig,
    guest_path: &Path,
    rom_path: &Path,
    guest_clock: K,
) -> Result<Session<WasmGuest<RasterCanvas>>, BridgeError> {
    config.validate()?;

    let host = HostEnv::new(RasterCanvas::new(), config, Box::new(guest_clock));
    let guest = WasmGuest::from_file(guest_path, host)?;
    let mut session = Session::start(guest, config)?;
    session.load_rom_file(rom_path)?;
    Ok(session)
}

fn lit_cells<G: Guest<Canvas = RasterCanvas>>(session: &Session<G>) -> usize {
    let host = session.guest().host();
    match host.screen().pixel_size() {
        Some(pixel_size) => host.screen().canvas().lit_pixels() / (pixel_size * pixel_size) as usize,
        None => 0,
    }
}

/// Tears the guest down after `cause` ended the run and hands `cause` back.
fn abort_session<G: Guest, K: Clock>(
    scheduler: &mut CycleScheduler<K>,
    session: Session<G>,
    cause: BridgeError,
) -> BridgeError {
    if let Err(teardown_error) = scheduler.shutdown(session) {
        error!("tearing down guest after '{cause}' failed: {teardown_error}");
    }
    cause
}

/// Runs the scheduler against a simulated clock that advances one frame per opportunity.
pub fn run_bridge_headless(
    config: BridgeConfig,
    guest_path: &Path,
    rom_path: &Path,
    max_frames: usize,
) -> Result<RunReport, BridgeError> {
    if max_frames == 0 {
        return Err(BridgeError::InvalidArgument("max_frames must be > 0"));
    }

    let clock = ManualClock::new();
    let session = start_session(&config, guest_path, rom_path, clock.clone())?;
    run_headless_session(&config, session, clock, max_frames)
}

/// Drives a started session for up to `max_frames` frames. `clock` must be the clock the
/// guest's host imports read. The guest is torn down on every path.
pub fn run_headless_session<G: Guest<Canvas = RasterCanvas>>(
    config: &BridgeConfig,
    mut session: Session<G>,
    clock: ManualClock,
    max_frames: usize,
) -> Result<RunReport, BridgeError> {
    let mut scheduler = CycleScheduler::new(config, clock.clone());
    if let Err(start_error) = config.validate().and_then(|()| scheduler.run()) {
        return Err(abort_session(&mut scheduler, session, start_error));
    }
    let frame_interval = Duration::from_nanos(1_000_000_000 / u64::from(config.target_fps));

    let mut frames = 0;
    while frames < max_frames && scheduler.state() == SchedulerState::Running {
        clock.advance(frame_interval);
        if let Err(cycle_error) = scheduler.on_opportunity(&mut session) {
            return Err(abort_session(&mut scheduler, session, cycle_error));
        }
        frames += 1;
    }

    let report = RunReport {
        frames,
        stats: scheduler.stats(),
        lit_cells: lit_cells(&session),
        state: scheduler.state(),
    };
    scheduler.shutdown(session)?;
    info!(
        "headless finished: frames={} ticks={} repaints={}",
        report.frames, report.stats.ticks, report.stats.repaints
    );
    Ok(report)
}

pub fn run_bridge_app(
    config: BridgeConfig,
    guest_path: &Path,
    rom_path: &Path,
) -> Result<RunReport, BridgeError> {
    use raylib::prelude::{Color, KeyboardKey, RaylibDraw};

    let mut session = start_session(&config, guest_path, rom_path, SystemClock)?;

    let width = (SCREEN_WIDTH as u32 * config.pixel_size) as i32;
    let height = (SCREEN_HEIGHT as u32 * config.pixel_size) as i32;
    let (mut rl, thread) = raylib::init()
        .size(width, height)
        .title("chip8-host-bridge")
        .build();
    rl.set_target_fps(config.target_fps);

    let mut scheduler = CycleScheduler::new(&config, SystemClock);
    if let Err(start_error) = scheduler.run() {
        return Err(abort_session(&mut scheduler, session, start_error));
    }

    let mut frames = 0;
    while !rl.window_should_close() && scheduler.state() == SchedulerState::Running {
        if rl.is_key_pressed(KeyboardKey::KEY_ESCAPE) {
            scheduler.stop();
            break;
        }

        if let Err(cycle_error) = scheduler.on_opportunity(&mut session) {
            return Err(abort_session(&mut scheduler, session, cycle_error));
        }
        frames += 1;

        let canvas = session.guest().host().screen().canvas();
        let pixel_size = session
            .guest()
            .host()
            .screen()
            .pixel_size()
            .unwrap_or(config.pixel_size);

        let mut d = rl.begin_drawing(&thread);
        d.clear_background(Color::WHITE);
        // Sample one host pixel per cell; cells are painted as whole rectangles.
        for y in (0..canvas.height()).step_by(pixel_size as usize) {
            for x in (0..canvas.width()).step_by(pixel_size as usize) {
                if canvas.pixel(x, y).is_some_and(|state| state.is_on()) {
                    d.draw_rectangle(
                        x as i32,
                        y as i32,
                        pixel_size as i32,
                        pixel_size as i32,
                        Color::BLACK,
                    );
                }
            }
        }
    }

    let report = RunReport {
        frames,
        stats: scheduler.stats(),
        lit_cells: lit_cells(&session),
        state: scheduler.state(),
    };
    scheduler.shutdown(session)?;
    Ok(report)
}
