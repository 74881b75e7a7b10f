#![allow(dead_code)]

use chip8_host_bridge::{
    BridgeConfig, BridgeError, Guest, GuestHandle, HostEnv, ManualClock, MemoryView,
    MemoryViewMut, RasterCanvas, FRAMEBUFFER_BYTES,
};

pub const HANDLE: u32 = 0x100;
pub const DISPLAY_PTR: u32 = 0x400;
pub const HEAP_START: u32 = 0x1000;

/// Runs inside a guest entry point. Returning `true` from a tick hook raises the draw flag.
pub type GuestHook = Box<dyn FnMut(&mut [u8], &mut HostEnv<RasterCanvas>) -> bool>;

pub fn hook(
    f: impl FnMut(&mut [u8], &mut HostEnv<RasterCanvas>) -> bool + 'static,
) -> Option<GuestHook> {
    Some(Box::new(f))
}

/// In-process stand-in for a wasm guest. Counts every entry point and lets tests script
/// what `tick` does to memory and to the host.
pub struct FakeGuest {
    pub memory: Vec<u8>,
    pub host: HostEnv<RasterCanvas>,
    pub heap_limit: u32,
    next_alloc: u32,
    last_alloc: Option<(u32, u32)>,
    pub init_returns_null: bool,
    pub display_bits: u32,
    pub reject_roms: bool,
    pub draw_flag: bool,
    pub has_render: bool,
    pub pressed: Vec<u8>,
    pub fail_free: bool,
    pub on_init: Option<GuestHook>,
    pub on_load: Option<GuestHook>,
    pub on_tick: Option<GuestHook>,
    pub on_render: Option<GuestHook>,
    pub on_deinit: Option<GuestHook>,
    pub loaded: Vec<u8>,
    pub calls: Calls,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Calls {
    pub init: usize,
    pub deinit: usize,
    pub alloc: usize,
    pub free: usize,
    pub load: usize,
    pub tick: usize,
    pub draw_flag: usize,
    pub render: usize,
}

impl FakeGuest {
    pub fn new(config: &BridgeConfig, clock: ManualClock) -> Self {
        Self {
            memory: vec![0; 0x2000],
            host: HostEnv::new(RasterCanvas::new(), config, Box::new(clock)),
            heap_limit: 0x2000,
            next_alloc: HEAP_START,
            last_alloc: None,
            init_returns_null: false,
            display_bits: 2048,
            reject_roms: false,
            draw_flag: false,
            has_render: false,
            pressed: Vec::new(),
            fail_free: false,
            on_init: None,
            on_load: None,
            on_tick: None,
            on_render: None,
            on_deinit: None,
            loaded: Vec::new(),
            calls: Calls::default(),
        }
    }

    pub fn with_defaults() -> Self {
        Self::new(&BridgeConfig::default(), ManualClock::new())
    }

    pub fn framebuffer_mut(&mut self) -> &mut [u8] {
        let start = DISPLAY_PTR as usize;
        &mut self.memory[start..start + FRAMEBUFFER_BYTES]
    }

    /// Simulates `memory.grow` by one wasm page.
    pub fn grow(&mut self) {
        let len = self.memory.len();
        self.memory.resize(len + 0x1_0000, 0);
    }
}

impl Guest for FakeGuest {
    type Canvas = RasterCanvas;

    fn init_emulator(
        &mut self,
        _clock_hz: u32,
        display_scale: u32,
    ) -> Result<Option<GuestHandle>, BridgeError> {
        self.calls.init += 1;
        if self.init_returns_null {
            return Ok(None);
        }
        self.host.init_screen(display_scale as i32);
        if let Some(hook) = self.on_init.as_mut() {
            hook(&mut self.memory, &mut self.host);
        }
        Ok(GuestHandle::from_raw(HANDLE))
    }

    fn deinit_emulator(&mut self, _handle: GuestHandle) -> Result<(), BridgeError> {
        self.calls.deinit += 1;
        self.host.deinit_screen();
        if let Some(hook) = self.on_deinit.as_mut() {
            hook(&mut self.memory, &mut self.host);
        }
        Ok(())
    }

    fn load_rom(
        &mut self,
        _handle: GuestHandle,
        _load_address: u32,
        length: u32,
    ) -> Result<bool, BridgeError> {
        self.calls.load += 1;
        if let Some(hook) = self.on_load.as_mut() {
            hook(&mut self.memory, &mut self.host);
        }
        if self.reject_roms {
            return Ok(false);
        }
        let (ptr, len) = self.last_alloc.expect("loadROM without a staged buffer");
        assert_eq!(len, length);
        self.loaded = self.memory[ptr as usize..(ptr + len) as usize].to_vec();
        Ok(true)
    }

    fn tick(&mut self, _handle: GuestHandle) -> Result<(), BridgeError> {
        self.calls.tick += 1;
        if let Some(hook) = self.on_tick.as_mut() {
            self.draw_flag |= hook(&mut self.memory, &mut self.host);
        }
        Ok(())
    }

    fn draw_flag(&mut self, _handle: GuestHandle) -> Result<bool, BridgeError> {
        self.calls.draw_flag += 1;
        Ok(std::mem::take(&mut self.draw_flag))
    }

    fn is_key_pressed(&mut self, _handle: GuestHandle, key: u8) -> Result<bool, BridgeError> {
        Ok(self.pressed.contains(&key))
    }

    fn alloc(&mut self, len: u32) -> Result<Option<u32>, BridgeError> {
        self.calls.alloc += 1;
        if self.next_alloc + len > self.heap_limit {
            return Ok(None);
        }
        let ptr = self.next_alloc;
        self.next_alloc += len;
        self.last_alloc = Some((ptr, len));
        Ok(Some(ptr))
    }

    fn free(&mut self, ptr: u32) -> Result<(), BridgeError> {
        self.calls.free += 1;
        if self.fail_free {
            return Err(BridgeError::GuestTrap {
                entry: "free",
                message: "unreachable".to_owned(),
            });
        }
        assert_eq!(self.last_alloc.map(|(last, _)| last), Some(ptr));
        Ok(())
    }

    fn display_mem_ptr(&mut self) -> Result<u32, BridgeError> {
        Ok(DISPLAY_PTR)
    }

    fn display_mem_buffer_len(&mut self, _handle: GuestHandle) -> Result<u32, BridgeError> {
        Ok(self.display_bits)
    }

    fn render(&mut self, _handle: GuestHandle) -> Result<bool, BridgeError> {
        self.calls.render += 1;
        if let Some(hook) = self.on_render.as_mut() {
            hook(&mut self.memory, &mut self.host);
        }
        Ok(self.has_render)
    }

    fn memory(&self) -> MemoryView<'_> {
        MemoryView::new(&self.memory)
    }

    fn memory_mut(&mut self) -> MemoryViewMut<'_> {
        MemoryViewMut::new(&mut self.memory)
    }

    fn host(&self) -> &HostEnv<RasterCanvas> {
        &self.host
    }

    fn host_mut(&mut self) -> &mut HostEnv<RasterCanvas> {
        &mut self.host
    }
}
