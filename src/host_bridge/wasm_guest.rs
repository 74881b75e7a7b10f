use std::path::Path;

use log::{debug, info};
use wasmtime::{
    Caller, Engine, Extern, Global, Instance, Linker, Memory, Module, Store, TypedFunc, Val,
    WasmParams, WasmResults,
};

use crate::host_bridge::display::Canvas;
use crate::host_bridge::error::BridgeError;
use crate::host_bridge::guest::{Guest, GuestHandle};
use crate::host_bridge::imports::HostEnv;
use crate::host_bridge::memory::{MemoryView, MemoryViewMut};

pub const IMPORT_MODULE: &str = "env";
pub const EXPORT_MEMORY: &str = "memory";

/// A CHIP-8 guest compiled to WebAssembly and run under `wasmtime`.
///
/// ## Guest ABI
///
/// Exports: `memory`, `initEmulator(i32, i32) -> i32`, `deinitEmulator(i32)`,
/// `loadROM(i32, i32, i32) -> i32`, `tick(i32)`, `drawFlag(i32) -> i32`,
/// `isKeyPressed(i32, i32) -> i32`, `alloc(i32) -> i32`, `free(i32)`,
/// `getDisplayMemBufferLen(i32) -> i32`, `displayMemPtr` (an `i32` global, or a function
/// returning one) and optionally `render(i32)`.
///
/// Imports, all from module `env`: `getTime() -> i64`, `randomByte() -> i32`,
/// `log(i32, i32)`, `logError(i32, i32)`, `initScreen(i32)`, `deinitScreen()`,
/// `setPixel(i32, i32, i32)`. Older guest builds import `wasmlog`, `wasmlogerr` and
/// `wasmRand`; those names are linked to the same host functions.
pub struct WasmGuest<C: Canvas + Send + 'static> {
    store: Store<HostEnv<C>>,
    memory: Memory,
    exports: GuestExports,
}

struct GuestExports {
    init_emulator: TypedFunc<(i32, i32), i32>,
    deinit_emulator: TypedFunc<i32, ()>,
    load_rom: TypedFunc<(i32, i32, i32), i32>,
    tick: TypedFunc<i32, ()>,
    draw_flag: TypedFunc<i32, i32>,
    is_key_pressed: TypedFunc<(i32, i32), i32>,
    alloc: TypedFunc<i32, i32>,
    free: TypedFunc<i32, ()>,
    display_mem_buffer_len: TypedFunc<i32, i32>,
    display_mem_ptr: DisplayPtrExport,
    render: Option<TypedFunc<i32, ()>>,
}

enum DisplayPtrExport {
    Global(Global),
    Func(TypedFunc<(), i32>),
}

impl<C: Canvas + Send + 'static> WasmGuest<C> {
    /// Compiles a guest from a `.wasm` binary or `.wat` text file.
    pub fn from_file(path: &Path, host: HostEnv<C>) -> Result<Self, BridgeError> {
        info!("loading guest module {}", path.display());
        let engine = Engine::default();
        let module = Module::from_file(&engine, path).map_err(instantiate_error)?;
        Self::instantiate(&engine, &module, host)
    }

    pub fn from_bytes(bytes: &[u8], host: HostEnv<C>) -> Result<Self, BridgeError> {
        let engine = Engine::default();
        let module = Module::new(&engine, bytes).map_err(instantiate_error)?;
        Self::instantiate(&engine, &module, host)
    }

    fn instantiate(engine: &Engine, module: &Module, host: HostEnv<C>) -> Result<Self, BridgeError> {
        let mut linker = Linker::new(engine);
        link_host_imports(&mut linker).map_err(instantiate_error)?;

        let mut store = Store::new(engine, host);
        let instance = linker
            .instantiate(&mut store, module)
            .map_err(instantiate_error)?;
        let memory = instance
            .get_memory(&mut store, EXPORT_MEMORY)
            .ok_or(BridgeError::MissingExport(EXPORT_MEMORY))?;
        let exports = GuestExports::resolve(&instance, &mut store)?;

        debug!(
            "guest instantiated: {} bytes of linear memory, render export: {}",
            memory.data_size(&store),
            exports.render.is_some()
        );
        Ok(Self {
            store,
            memory,
            exports,
        })
    }
}

impl GuestExports {
    fn resolve<T: 'static>(instance: &Instance, store: &mut Store<T>) -> Result<Self, BridgeError> {
        let display_mem_ptr = match instance.get_global(&mut *store, "displayMemPtr") {
            Some(global) => DisplayPtrExport::Global(global),
            None => DisplayPtrExport::Func(typed(instance, store, "displayMemPtr")?),
        };

        Ok(Self {
            init_emulator: typed(instance, store, "initEmulator")?,
            deinit_emulator: typed(instance, store, "deinitEmulator")?,
            load_rom: typed(instance, store, "loadROM")?,
            tick: typed(instance, store, "tick")?,
            draw_flag: typed(instance, store, "drawFlag")?,
            is_key_pressed: typed(instance, store, "isKeyPressed")?,
            alloc: typed(instance, store, "alloc")?,
            free: typed(instance, store, "free")?,
            display_mem_buffer_len: typed(instance, store, "getDisplayMemBufferLen")?,
            display_mem_ptr,
            render: typed(instance, store, "render").ok(),
        })
    }
}

fn typed<Params, Results, T: 'static>(
    instance: &Instance,
    store: &mut Store<T>,
    name: &'static str,
) -> Result<TypedFunc<Params, Results>, BridgeError>
where
    Params: WasmParams,
    Results: WasmResults,
{
    instance
        .get_typed_func::<Params, Results>(&mut *store, name)
        .map_err(|_| BridgeError::MissingExport(name))
}

fn call<Params, Results, T: 'static>(
    store: &mut Store<T>,
    func: &TypedFunc<Params, Results>,
    entry: &'static str,
    params: Params,
) -> Result<Results, BridgeError>
where
    Params: WasmParams,
    Results: WasmResults,
{
    func.call(&mut *store, params)
        .map_err(|error| BridgeError::GuestTrap {
            entry,
            message: error.to_string(),
        })
}

fn instantiate_error(error: impl std::fmt::Display) -> BridgeError {
    BridgeError::Instantiate(error.to_string())
}

impl<C: Canvas + Send + 'static> Guest for WasmGuest<C> {
    type Canvas = C;

    fn init_emulator(
        &mut self,
        clock_hz: u32,
        display_scale: u32,
    ) -> Result<Option<GuestHandle>, BridgeError> {
        let raw = call(
            &mut self.store,
            &self.exports.init_emulator,
            "initEmulator",
            (clock_hz as i32, display_scale as i32),
        )?;
        Ok(GuestHandle::from_raw(raw as u32))
    }

    fn deinit_emulator(&mut self, handle: GuestHandle) -> Result<(), BridgeError> {
        call(
            &mut self.store,
            &self.exports.deinit_emulator,
            "deinitEmulator",
            handle.raw() as i32,
        )
    }

    fn load_rom(
        &mut self,
        handle: GuestHandle,
        load_address: u32,
        length: u32,
    ) -> Result<bool, BridgeError> {
        let status = call(
            &mut self.store,
            &self.exports.load_rom,
            "loadROM",
            (handle.raw() as i32, load_address as i32, length as i32),
        )?;
        Ok(status == 0)
    }

    fn tick(&mut self, handle: GuestHandle) -> Result<(), BridgeError> {
        call(&mut self.store, &self.exports.tick, "tick", handle.raw() as i32)
    }

    fn draw_flag(&mut self, handle: GuestHandle) -> Result<bool, BridgeError> {
        let flag = call(
            &mut self.store,
            &self.exports.draw_flag,
            "drawFlag",
            handle.raw() as i32,
        )?;
        Ok(flag == 1)
    }

    fn is_key_pressed(&mut self, handle: GuestHandle, key: u8) -> Result<bool, BridgeError> {
        let pressed = call(
            &mut self.store,
            &self.exports.is_key_pressed,
            "isKeyPressed",
            (handle.raw() as i32, i32::from(key)),
        )?;
        Ok(pressed == 1)
    }

    fn alloc(&mut self, len: u32) -> Result<Option<u32>, BridgeError> {
        let ptr = call(&mut self.store, &self.exports.alloc, "alloc", len as i32)?;
        Ok((ptr != 0).then_some(ptr as u32))
    }

    fn free(&mut self, ptr: u32) -> Result<(), BridgeError> {
        call(&mut self.store, &self.exports.free, "free", ptr as i32)
    }

    fn display_mem_ptr(&mut self) -> Result<u32, BridgeError> {
        match &self.exports.display_mem_ptr {
            DisplayPtrExport::Global(global) => match global.get(&mut self.store) {
                Val::I32(ptr) => Ok(ptr as u32),
                _ => Err(BridgeError::MissingExport("displayMemPtr")),
            },
            DisplayPtrExport::Func(func) => {
                let ptr = call(&mut self.store, func, "displayMemPtr", ())?;
                Ok(ptr as u32)
            }
        }
    }

    fn display_mem_buffer_len(&mut self, handle: GuestHandle) -> Result<u32, BridgeError> {
        let bits = call(
            &mut self.store,
            &self.exports.display_mem_buffer_len,
            "getDisplayMemBufferLen",
            handle.raw() as i32,
        )?;
        Ok(bits as u32)
    }

    fn render(&mut self, handle: GuestHandle) -> Result<bool, BridgeError> {
        match &self.exports.render {
            Some(render) => {
                call(&mut self.store, render, "render", handle.raw() as i32)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn memory(&self) -> MemoryView<'_> {
        MemoryView::new(self.memory.data(&self.store))
    }

    fn memory_mut(&mut self) -> MemoryViewMut<'_> {
        MemoryViewMut::new(self.memory.data_mut(&mut self.store))
    }

    fn host(&self) -> &HostEnv<C> {
        self.store.data()
    }

    fn host_mut(&mut self) -> &mut HostEnv<C> {
        self.store.data_mut()
    }
}

fn link_host_imports<C: Canvas + Send + 'static>(
    linker: &mut Linker<HostEnv<C>>,
) -> wasmtime::Result<()> {
    linker.func_wrap(IMPORT_MODULE, "getTime", host_get_time::<C>)?;
    linker.func_wrap(IMPORT_MODULE, "randomByte", host_random_byte::<C>)?;
    linker.func_wrap(IMPORT_MODULE, "wasmRand", host_random_byte::<C>)?;
    linker.func_wrap(IMPORT_MODULE, "log", host_log::<C>)?;
    linker.func_wrap(IMPORT_MODULE, "wasmlog", host_log::<C>)?;
    linker.func_wrap(IMPORT_MODULE, "logError", host_log_error::<C>)?;
    linker.func_wrap(IMPORT_MODULE, "wasmlogerr", host_log_error::<C>)?;
    linker.func_wrap(IMPORT_MODULE, "initScreen", host_init_screen::<C>)?;
    linker.func_wrap(IMPORT_MODULE, "deinitScreen", host_deinit_screen::<C>)?;
    linker.func_wrap(IMPORT_MODULE, "setPixel", host_set_pixel::<C>)?;
    Ok(())
}

fn host_get_time<C: Canvas + Send + 'static>(caller: Caller<'_, HostEnv<C>>) -> i64 {
    caller.data().get_time()
}

fn host_random_byte<C: Canvas + Send + 'static>(mut caller: Caller<'_, HostEnv<C>>) -> i32 {
    i32::from(caller.data_mut().random_byte())
}

fn host_log<C: Canvas + Send + 'static>(mut caller: Caller<'_, HostEnv<C>>, ptr: i32, len: i32) {
    with_guest_memory(&mut caller, |memory, host| host.log(memory, ptr, len));
}

fn host_log_error<C: Canvas + Send + 'static>(
    mut caller: Caller<'_, HostEnv<C>>,
    ptr: i32,
    len: i32,
) {
    with_guest_memory(&mut caller, |memory, host| host.log_error(memory, ptr, len));
}

fn host_init_screen<C: Canvas + Send + 'static>(
    mut caller: Caller<'_, HostEnv<C>>,
    pixel_size: i32,
) {
    caller.data_mut().init_screen(pixel_size);
}

fn host_deinit_screen<C: Canvas + Send + 'static>(mut caller: Caller<'_, HostEnv<C>>) {
    caller.data_mut().deinit_screen();
}

fn host_set_pixel<C: Canvas + Send + 'static>(
    mut caller: Caller<'_, HostEnv<C>>,
    state: i32,
    x: i32,
    y: i32,
) {
    caller.data_mut().set_pixel(state, x, y);
}

/// Resolves the guest's memory export for this call only; growth since the last call is
/// picked up because nothing is cached.
fn with_guest_memory<C: Canvas + Send + 'static>(
    caller: &mut Caller<'_, HostEnv<C>>,
    access: impl FnOnce(MemoryView<'_>, &mut HostEnv<C>),
) {
    match caller.get_export(EXPORT_MEMORY).and_then(Extern::into_memory) {
        Some(memory) => {
            let (bytes, host) = memory.data_and_store_mut(&mut *caller);
            access(MemoryView::new(&*bytes), host);
        }
        None => caller
            .data_mut()
            .report(BridgeError::MissingExport(EXPORT_MEMORY)),
    }
}
