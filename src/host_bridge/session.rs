use std::fs;
use std::path::Path;

use log::{error, info};

use crate::host_bridge::config::{BridgeConfig, KEY_COUNT, PROGRAM_START};
use crate::host_bridge::error::BridgeError;
use crate::host_bridge::framebuffer::{decode, FramebufferRef, PixelGrid};
use crate::host_bridge::guest::{Guest, GuestHandle};
use crate::host_bridge::staging;

/// One running emulator instance.
///
/// `shutdown` consumes the session, so nothing can reach the guest handle after teardown.
/// Dropping a session without `shutdown` destroys the guest instance without running
/// `deinitEmulator`.
pub struct Session<G: Guest> {
    guest: G,
    handle: GuestHandle,
    framebuffer: FramebufferRef,
}

impl<G: Guest> Session<G> {
    pub fn start(mut guest: G, config: &BridgeConfig) -> Result<Self, BridgeError> {
        config.validate()?;

        let handle = guest
            .init_emulator(config.clock_hz, config.pixel_size)?
            .ok_or(BridgeError::InitFailure("initEmulator returned null"))?;

        // Faults raised by imports during initEmulator outrank a bad framebuffer layout.
        let framebuffer = match check_fault(&mut guest)
            .and_then(|()| read_framebuffer_ref(&mut guest, handle))
        {
            Ok(framebuffer) => framebuffer,
            Err(init_error) => {
                error!("{init_error}");
                if let Err(deinit_error) = guest.deinit_emulator(handle) {
                    error!("tearing down guest after failed init: {deinit_error}");
                }
                return Err(init_error);
            }
        };

        info!(
            "emulator initialised: handle=0x{:x} framebuffer=0x{:x}",
            handle.raw(),
            framebuffer.ptr()
        );
        Ok(Self {
            guest,
            handle,
            framebuffer,
        })
    }

    pub fn handle(&self) -> GuestHandle {
        self.handle
    }

    pub fn framebuffer(&self) -> FramebufferRef {
        self.framebuffer
    }

    pub fn guest(&self) -> &G {
        &self.guest
    }

    pub fn guest_mut(&mut self) -> &mut G {
        &mut self.guest
    }

    pub fn load_rom(&mut self, rom: &[u8]) -> Result<(), BridgeError> {
        let loaded = staging::load_rom(&mut self.guest, self.handle, PROGRAM_START, rom);
        match (check_fault(&mut self.guest), loaded) {
            (Err(fault), Err(load_error)) => {
                error!("ROM load also failed: {load_error}");
                Err(fault)
            }
            (Err(fault), Ok(())) => Err(fault),
            (Ok(()), loaded) => loaded,
        }
    }

    pub fn load_rom_file(&mut self, path: &Path) -> Result<(), BridgeError> {
        let rom = fs::read(path)?;
        self.load_rom(&rom)
    }

    pub fn tick(&mut self) -> Result<(), BridgeError> {
        self.guest.tick(self.handle)
    }

    pub fn draw_flag(&mut self) -> Result<bool, BridgeError> {
        self.guest.draw_flag(self.handle)
    }

    pub fn render(&mut self) -> Result<bool, BridgeError> {
        self.guest.render(self.handle)
    }

    pub fn decode_framebuffer(&self) -> Result<PixelGrid, BridgeError> {
        decode(&self.guest.memory(), self.framebuffer)
    }

    /// Keypad keys the guest currently reports as held.
    pub fn pressed_keys(&mut self) -> Result<Vec<u8>, BridgeError> {
        let mut pressed = Vec::new();
        for key in 0..KEY_COUNT {
            if self.guest.is_key_pressed(self.handle, key)? {
                pressed.push(key);
            }
        }
        Ok(pressed)
    }

    /// Tears the guest down and hands it back for inspection.
    pub fn shutdown(self) -> Result<G, BridgeError> {
        let Self {
            mut guest, handle, ..
        } = self;
        info!("deinitialising emulator 0x{:x}", handle.raw());
        guest.deinit_emulator(handle).map(|()| guest)
    }
}

/// Surfaces the session-fatal error an import parked during the last guest call.
pub(crate) fn check_fault<G: Guest>(guest: &mut G) -> Result<(), BridgeError> {
    match guest.host_mut().take_fault() {
        Some(fault) => Err(fault),
        None => Ok(()),
    }
}

fn read_framebuffer_ref<G: Guest>(
    guest: &mut G,
    handle: GuestHandle,
) -> Result<FramebufferRef, BridgeError> {
    let ptr = guest.display_mem_ptr()?;
    let bits = guest.display_mem_buffer_len(handle)?;
    check_fault(guest)?;
    FramebufferRef::new(ptr, bits)
}
