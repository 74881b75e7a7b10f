use log::{debug, warn};

use crate::host_bridge::config::{MAX_PIXEL_SIZE, SCREEN_HEIGHT, SCREEN_WIDTH};
use crate::host_bridge::error::BridgeError;
use crate::host_bridge::framebuffer::{PixelGrid, PixelState};

/// A rectangle in host output coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Rect {
    pub fn for_cell(x: u32, y: u32, pixel_size: u32) -> Self {
        Self {
            x: x.saturating_mul(pixel_size),
            y: y.saturating_mul(pixel_size),
            width: pixel_size,
            height: pixel_size,
        }
    }
}

/// The host paint target behind a [`Screen`].
pub trait Canvas {
    fn allocate(&mut self, width: u32, height: u32);
    fn release(&mut self);
    fn fill_rect(&mut self, rect: Rect, state: PixelState);
}

/// Presentation surface for the 64x32 display, scaled by an integer pixel size.
///
/// The surface exists between `init` and `deinit`. Dropping a screen with a live surface
/// releases it.
pub struct Screen<C: Canvas> {
    canvas: C,
    pixel_size: Option<u32>,
}

impl<C: Canvas> Screen<C> {
    pub fn new(canvas: C) -> Self {
        Self {
            canvas,
            pixel_size: None,
        }
    }

    pub fn init(&mut self, pixel_size: u32) -> Result<(), BridgeError> {
        if pixel_size == 0 {
            return Err(BridgeError::InvalidArgument("pixel_size must be > 0"));
        }
        if pixel_size > MAX_PIXEL_SIZE {
            return Err(BridgeError::InvalidArgument("pixel_size must be <= 64"));
        }
        if self.pixel_size.is_some() {
            warn!("screen initialised twice, replacing the existing surface");
            self.canvas.release();
        }

        let width = SCREEN_WIDTH as u32 * pixel_size;
        let height = SCREEN_HEIGHT as u32 * pixel_size;
        debug!("allocating {width}x{height} screen surface");
        self.canvas.allocate(width, height);
        self.pixel_size = Some(pixel_size);
        Ok(())
    }

    pub fn deinit(&mut self) -> Result<(), BridgeError> {
        if self.pixel_size.take().is_none() {
            return Err(BridgeError::DoubleDeinit("screen"));
        }
        self.canvas.release();
        Ok(())
    }

    pub fn is_active(&self) -> bool {
        self.pixel_size.is_some()
    }

    pub fn pixel_size(&self) -> Option<u32> {
        self.pixel_size
    }

    pub fn paint_full(&mut self, grid: &PixelGrid) -> Result<(), BridgeError> {
        let pixel_size = self.pixel_size.ok_or(BridgeError::NoSurface)?;
        for (x, y, state) in grid.iter() {
            self.canvas
                .fill_rect(Rect::for_cell(x as u32, y as u32, pixel_size), state);
        }
        Ok(())
    }

    /// Signed coordinates: the guest hands them over as raw `i32`.
    pub fn paint_pixel(&mut self, x: i32, y: i32, state: PixelState) -> Result<(), BridgeError> {
        let in_range = (0..SCREEN_WIDTH as i32).contains(&x) && (0..SCREEN_HEIGHT as i32).contains(&y);
        if !in_range {
            return Err(BridgeError::PixelOutOfRange { x, y });
        }
        let pixel_size = self.pixel_size.ok_or(BridgeError::NoSurface)?;
        self.canvas
            .fill_rect(Rect::for_cell(x as u32, y as u32, pixel_size), state);
        Ok(())
    }

    pub fn canvas(&self) -> &C {
        &self.canvas
    }

    pub fn canvas_mut(&mut self) -> &mut C {
        &mut self.canvas
    }
}

impl<C: Canvas> Drop for Screen<C> {
    fn drop(&mut self) {
        if self.pixel_size.take().is_some() {
            self.canvas.release();
        }
    }
}

/// In-memory surface holding one state per host pixel.
#[derive(Debug, Default, Clone)]
pub struct RasterCanvas {
    width: u32,
    height: u32,
    pixels: Vec<PixelState>,
}

impl RasterCanvas {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn is_allocated(&self) -> bool {
        !self.pixels.is_empty()
    }

    pub fn pixel(&self, x: u32, y: u32) -> Option<PixelState> {
        if x >= self.width || y >= self.height {
            return None;
        }
        Some(self.pixels[y as usize * self.width as usize + x as usize])
    }

    pub fn lit_pixels(&self) -> usize {
        self.pixels.iter().filter(|state| state.is_on()).count()
    }
}

impl Canvas for RasterCanvas {
    fn allocate(&mut self, width: u32, height: u32) {
        self.width = width;
        self.height = height;
        self.pixels = vec![PixelState::Off; width as usize * height as usize];
    }

    fn release(&mut self) {
        self.width = 0;
        self.height = 0;
        self.pixels = Vec::new();
    }

    fn fill_rect(&mut self, rect: Rect, state: PixelState) {
        let x_end = rect.x.saturating_add(rect.width).min(self.width);
        let y_end = rect.y.saturating_add(rect.height).min(self.height);
        if rect.x >= x_end {
            return;
        }
        for y in rect.y..y_end {
            let row = y as usize * self.width as usize;
            self.pixels[row + rect.x as usize..row + x_end as usize].fill(state);
        }
    }
}
