use crate::host_bridge::config::{FRAMEBUFFER_BITS, FRAMEBUFFER_BYTES, SCREEN_HEIGHT, SCREEN_WIDTH};
use crate::host_bridge::error::BridgeError;
use crate::host_bridge::memory::MemoryView;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PixelState {
    #[default]
    Off,
    On,
}

impl PixelState {
    pub fn from_bit(bit: u8) -> Self {
        if bit == 0 {
            Self::Off
        } else {
            Self::On
        }
    }

    pub fn is_on(self) -> bool {
        self == Self::On
    }
}

/// One decoded frame, row-major, `SCREEN_WIDTH * SCREEN_HEIGHT` cells.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PixelGrid {
    cells: [PixelState; FRAMEBUFFER_BITS],
}

impl Default for PixelGrid {
    fn default() -> Self {
        Self {
            cells: [PixelState::Off; FRAMEBUFFER_BITS],
        }
    }
}

impl PixelGrid {
    pub fn get(&self, x: usize, y: usize) -> Option<PixelState> {
        if x >= SCREEN_WIDTH || y >= SCREEN_HEIGHT {
            return None;
        }
        Some(self.cells[y * SCREEN_WIDTH + x])
    }

    pub fn set(&mut self, x: usize, y: usize, state: PixelState) {
        if x < SCREEN_WIDTH && y < SCREEN_HEIGHT {
            self.cells[y * SCREEN_WIDTH + x] = state;
        }
    }

    /// Every cell as `(x, y, state)` in bit-index order.
    pub fn iter(&self) -> impl Iterator<Item = (usize, usize, PixelState)> + '_ {
        self.cells
            .iter()
            .enumerate()
            .map(|(index, state)| (index % SCREEN_WIDTH, index / SCREEN_WIDTH, *state))
    }

    pub fn lit_count(&self) -> usize {
        self.cells.iter().filter(|state| state.is_on()).count()
    }
}

/// Where the packed display bitmap lives in guest memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FramebufferRef {
    ptr: u32,
    bit_len: u32,
}

impl FramebufferRef {
    pub fn new(ptr: u32, bit_len: u32) -> Result<Self, BridgeError> {
        if bit_len as usize != FRAMEBUFFER_BITS {
            return Err(BridgeError::FramebufferLayout {
                bits: bit_len,
                expected: FRAMEBUFFER_BITS as u32,
            });
        }
        Ok(Self { ptr, bit_len })
    }

    pub fn ptr(&self) -> u32 {
        self.ptr
    }

    pub fn bit_len(&self) -> u32 {
        self.bit_len
    }
}

pub fn decode(memory: &MemoryView<'_>, framebuffer: FramebufferRef) -> Result<PixelGrid, BridgeError> {
    // One bounds check for the whole bitmap; no partial frames.
    let bytes = memory.read_range(framebuffer.ptr as usize, FRAMEBUFFER_BYTES)?;
    let mut grid = PixelGrid::default();

    for (bit_index, cell) in grid.cells.iter_mut().enumerate() {
        let byte = bytes[bit_index / 8];
        *cell = PixelState::from_bit((byte >> (bit_index % 8)) & 0x1);
    }

    Ok(grid)
}
