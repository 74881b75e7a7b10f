use std::path::PathBuf;

use clap::Parser;

use chip8_host_bridge::{
    load_pacing_profile, load_protocol_profile, run_bridge_app, run_bridge_headless, BridgeConfig,
    BridgeError,
};

#[derive(Debug, Parser)]
#[command(name = "chip8-host-bridge")]
#[command(about = "Run a WebAssembly CHIP-8 guest with a native display")]
struct Args {
    #[arg(long, default_value = "chip8-wasm.wasm")]
    guest: PathBuf,

    #[arg(long)]
    rom: PathBuf,

    #[arg(long, default_value_t = 60)]
    hz: u32,

    #[arg(long, default_value_t = 6)]
    scale: u32,

    #[arg(long, default_value_t = 60)]
    fps: u32,

    /// Overrides CHIP8_PACING.
    #[arg(long, value_parser = ["frame", "timer"])]
    pacing: Option<String>,

    /// Overrides CHIP8_PROTOCOL.
    #[arg(long, value_parser = ["bulk", "incremental"])]
    protocol: Option<String>,

    #[arg(long)]
    seed: Option<u64>,

    #[arg(long)]
    headless: bool,

    #[arg(long, default_value_t = 600)]
    max_frames: usize,
}

fn main() -> Result<(), BridgeError> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let mut config = BridgeConfig {
        clock_hz: args.hz,
        pixel_size: args.scale,
        target_fps: args.fps,
        seed: args.seed,
        ..BridgeConfig::default()
    };
    config.apply_env_overrides().map_err(|message| {
        log::error!("{message}");
        BridgeError::InvalidArgument("CHIP8_PACING or CHIP8_PROTOCOL")
    })?;
    if let Some(pacing) = &args.pacing {
        config.pacing = load_pacing_profile(pacing)
            .map_err(|_| BridgeError::InvalidArgument("pacing must be frame or timer"))?;
    }
    if let Some(protocol) = &args.protocol {
        config.protocol = load_protocol_profile(protocol)
            .map_err(|_| BridgeError::InvalidArgument("protocol must be bulk or incremental"))?;
    }

    if args.headless {
        let report = run_bridge_headless(config, &args.guest, &args.rom, args.max_frames)?;
        println!(
            "headless finished: frames={} ticks={} repaints={} lit={}",
            report.frames, report.stats.ticks, report.stats.repaints, report.lit_cells
        );
        return Ok(());
    }

    let _report = run_bridge_app(config, &args.guest, &args.rom)?;
    Ok(())
}
