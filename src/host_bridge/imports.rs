use log::{error, info, warn};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::host_bridge::clock::Clock;
use crate::host_bridge::config::{BridgeConfig, DisplayProtocol};
use crate::host_bridge::display::{Canvas, Screen};
use crate::host_bridge::error::BridgeError;
use crate::host_bridge::framebuffer::PixelState;
use crate::host_bridge::memory::MemoryView;

const MAX_RETAINED_REPORTS: usize = 64;

/// Host side of the guest import table.
///
/// Host imports cannot hand errors back to the guest, so failures are reported instead. Every
/// report is logged. Recoverable ones are kept in [`HostEnv::reports`]; the first one that breaks
/// the host/guest contract is parked as the pending fault, which the scheduler picks up once the
/// current guest call returns.
pub struct HostEnv<C: Canvas> {
    screen: Screen<C>,
    clock: Box<dyn Clock + Send>,
    rng: StdRng,
    protocol: DisplayProtocol,
    fault: Option<BridgeError>,
    reports: Vec<BridgeError>,
    report_count: usize,
    ignored_pixels: usize,
}

impl<C: Canvas> HostEnv<C> {
    pub fn new(canvas: C, config: &BridgeConfig, clock: Box<dyn Clock + Send>) -> Self {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        Self {
            screen: Screen::new(canvas),
            clock,
            rng,
            protocol: config.protocol,
            fault: None,
            reports: Vec::new(),
            report_count: 0,
            ignored_pixels: 0,
        }
    }

    /// Milliseconds since the clock's epoch.
    pub fn get_time(&self) -> i64 {
        self.clock.now().as_millis() as i64
    }

    pub fn random_byte(&mut self) -> u8 {
        self.rng.gen::<u8>()
    }

    pub fn log(&mut self, memory: MemoryView<'_>, ptr: i32, len: i32) {
        match memory.read_text(ptr as u32 as usize, len as u32 as usize) {
            Ok(text) => info!(target: "guest", "{text}"),
            Err(error) => self.report(error),
        }
    }

    pub fn log_error(&mut self, memory: MemoryView<'_>, ptr: i32, len: i32) {
        match memory.read_text(ptr as u32 as usize, len as u32 as usize) {
            Ok(text) => error!(target: "guest", "{text}"),
            Err(error) => self.report(error),
        }
    }

    pub fn init_screen(&mut self, pixel_size: i32) {
        let pixel_size = match u32::try_from(pixel_size) {
            Ok(size) => size,
            Err(_) => {
                self.report(BridgeError::InvalidArgument("pixel_size must be > 0"));
                return;
            }
        };
        info!("size of screen: {pixel_size}");
        if let Err(error) = self.screen.init(pixel_size) {
            self.report(error);
        }
    }

    pub fn deinit_screen(&mut self) {
        if let Err(error) = self.screen.deinit() {
            self.report(error);
        }
    }

    pub fn set_pixel(&mut self, state: i32, x: i32, y: i32) {
        if self.protocol == DisplayProtocol::Bulk {
            if self.ignored_pixels == 0 {
                warn!("guest pushed a pixel during a bulk-protocol session; ignoring setPixel");
            }
            self.ignored_pixels += 1;
            return;
        }

        let state = if state == 0 {
            PixelState::Off
        } else {
            PixelState::On
        };
        if let Err(error) = self.screen.paint_pixel(x, y, state) {
            self.report(error);
        }
    }

    pub fn report(&mut self, error: BridgeError) {
        self.report_count += 1;
        if error.is_session_fatal() {
            error!("{error}");
            if self.fault.is_none() {
                self.fault = Some(error);
            }
        } else {
            warn!("{error}");
            if self.reports.len() < MAX_RETAINED_REPORTS {
                self.reports.push(error);
            }
        }
    }

    /// The first contract-breaking error reported since the last call, if any.
    pub fn take_fault(&mut self) -> Option<BridgeError> {
        self.fault.take()
    }

    /// Recoverable reports, oldest first. Only the first few are kept; see `report_count`.
    pub fn reports(&self) -> &[BridgeError] {
        &self.reports
    }

    pub fn report_count(&self) -> usize {
        self.report_count
    }

    pub fn ignored_pixels(&self) -> usize {
        self.ignored_pixels
    }

    pub fn protocol(&self) -> DisplayProtocol {
        self.protocol
    }

    pub fn screen(&self) -> &Screen<C> {
        &self.screen
    }

    pub fn screen_mut(&mut self) -> &mut Screen<C> {
        &mut self.screen
    }
}
