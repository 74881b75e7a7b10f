use crate::host_bridge::display::Canvas;
use crate::host_bridge::error::BridgeError;
use crate::host_bridge::imports::HostEnv;
use crate::host_bridge::memory::{MemoryView, MemoryViewMut};

/// Opaque pointer to one emulator instance inside the guest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GuestHandle(u32);

impl GuestHandle {
    /// A null pointer is not a handle.
    pub fn from_raw(raw: u32) -> Option<Self> {
        (raw != 0).then_some(Self(raw))
    }

    pub fn raw(self) -> u32 {
        self.0
    }
}

/// Entry points of a sandboxed CHIP-8 guest plus the host state it calls back into.
///
/// Every call may run guest code, so every call may grow guest memory. Memory views are
/// borrowed from the guest and therefore end before the next call.
pub trait Guest {
    type Canvas: Canvas;

    fn init_emulator(
        &mut self,
        clock_hz: u32,
        display_scale: u32,
    ) -> Result<Option<GuestHandle>, BridgeError>;
    fn deinit_emulator(&mut self, handle: GuestHandle) -> Result<(), BridgeError>;
    /// `true` when the guest accepted the ROM staged by the last `alloc`.
    fn load_rom(
        &mut self,
        handle: GuestHandle,
        load_address: u32,
        length: u32,
    ) -> Result<bool, BridgeError>;
    fn tick(&mut self, handle: GuestHandle) -> Result<(), BridgeError>;
    fn draw_flag(&mut self, handle: GuestHandle) -> Result<bool, BridgeError>;
    fn is_key_pressed(&mut self, handle: GuestHandle, key: u8) -> Result<bool, BridgeError>;
    fn alloc(&mut self, len: u32) -> Result<Option<u32>, BridgeError>;
    fn free(&mut self, ptr: u32) -> Result<(), BridgeError>;
    fn display_mem_ptr(&mut self) -> Result<u32, BridgeError>;
    /// Length of the display buffer in bits.
    fn display_mem_buffer_len(&mut self, handle: GuestHandle) -> Result<u32, BridgeError>;

    /// Asks the guest to push its display through `setPixel`. Guests without a
    /// render entry point return `Ok(false)`.
    fn render(&mut self, _handle: GuestHandle) -> Result<bool, BridgeError> {
        Ok(false)
    }

    fn memory(&self) -> MemoryView<'_>;
    fn memory_mut(&mut self) -> MemoryViewMut<'_>;

    fn host(&self) -> &HostEnv<Self::Canvas>;
    fn host_mut(&mut self) -> &mut HostEnv<Self::Canvas>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_is_not_a_handle() {
        assert_eq!(GuestHandle::from_raw(0), None);
        assert_eq!(GuestHandle::from_raw(0x800).map(GuestHandle::raw), Some(0x800));
    }
}
