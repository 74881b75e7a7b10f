use log::{debug, error, info};

use crate::host_bridge::error::BridgeError;
use crate::host_bridge::guest::{Guest, GuestHandle};

/// Guest-owned scratch memory holding one ROM image.
///
/// Not `Clone`: [`release_staging`] consumes the buffer, so it can be freed at most once.
#[derive(Debug, PartialEq, Eq)]
#[must_use = "a staging buffer must be released with release_staging"]
pub struct StagingBuffer {
    ptr: u32,
    len: u32,
}

impl StagingBuffer {
    pub fn ptr(&self) -> u32 {
        self.ptr
    }

    pub fn len(&self) -> u32 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

/// Allocates guest scratch space for `data` and copies it in.
///
/// On allocation failure nothing is written. If the copy fails the allocation is freed and the
/// copy error is returned, even when the free fails too.
pub fn stage_bytes<G: Guest>(guest: &mut G, data: &[u8]) -> Result<StagingBuffer, BridgeError> {
    let len = u32::try_from(data.len())
        .map_err(|_| BridgeError::AllocationFailed { len: data.len() })?;
    let ptr = guest
        .alloc(len)?
        .ok_or(BridgeError::AllocationFailed { len: data.len() })?;

    let buffer = StagingBuffer { ptr, len };
    if let Err(copy_error) = guest.memory_mut().write_range(ptr as usize, data) {
        if let Err(free_error) = release_staging(guest, buffer) {
            error!("freeing ROM staging buffer failed: {free_error}");
        }
        return Err(copy_error);
    }

    debug!("staged {len} bytes at 0x{ptr:x}");
    Ok(buffer)
}

pub fn release_staging<G: Guest>(guest: &mut G, buffer: StagingBuffer) -> Result<(), BridgeError> {
    guest.free(buffer.ptr)
}

/// Stages `rom`, asks the guest to copy it to `load_address`, and frees the staging buffer on
/// every path.
pub fn load_rom<G: Guest>(
    guest: &mut G,
    handle: GuestHandle,
    load_address: u32,
    rom: &[u8],
) -> Result<(), BridgeError> {
    info!("loading rom: {} bytes at 0x{load_address:03x}", rom.len());
    if rom.is_empty() {
        return Err(BridgeError::LoadFailed { len: 0 });
    }

    let buffer = stage_bytes(guest, rom)?;
    let loaded = guest.load_rom(handle, load_address, buffer.len());
    let released = release_staging(guest, buffer);

    match (loaded, released) {
        (Ok(true), Ok(())) => {
            info!("ROM loaded successfully");
            Ok(())
        }
        (Ok(false), Ok(())) => Err(BridgeError::LoadFailed { len: rom.len() }),
        (Err(load_error), released) => {
            if let Err(free_error) = released {
                error!("freeing ROM staging buffer failed: {free_error}");
            }
            Err(load_error)
        }
        (Ok(_), Err(free_error)) => Err(free_error),
    }
}
