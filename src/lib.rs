pub mod host_bridge;

pub use host_bridge::app::{run_bridge_app, run_bridge_headless, run_headless_session, RunReport};
pub use host_bridge::clock::{Clock, ManualClock, SystemClock};
pub use host_bridge::config::{
    load_pacing_profile, load_protocol_profile, BridgeConfig, DisplayProtocol, Pacing,
    FRAMEBUFFER_BITS, FRAMEBUFFER_BYTES, MAX_PIXEL_SIZE, PROGRAM_START, SCREEN_HEIGHT, SCREEN_WIDTH,
};
pub use host_bridge::display::{Canvas, RasterCanvas, Rect, Screen};
pub use host_bridge::error::BridgeError;
pub use host_bridge::framebuffer::{decode, FramebufferRef, PixelGrid, PixelState};
pub use host_bridge::guest::{Guest, GuestHandle};
pub use host_bridge::imports::HostEnv;
pub use host_bridge::memory::{MemoryView, MemoryViewMut};
pub use host_bridge::scheduler::{CycleScheduler, Opportunity, SchedulerState, SchedulerStats};
pub use host_bridge::session::Session;
pub use host_bridge::staging::{load_rom, release_staging, stage_bytes, StagingBuffer};
pub use host_bridge::wasm_guest::WasmGuest;
