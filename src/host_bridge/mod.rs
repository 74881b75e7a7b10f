pub mod app;
pub mod clock;
pub mod config;
pub mod display;
pub mod error;
pub mod framebuffer;
pub mod guest;
pub mod imports;
pub mod memory;
pub mod scheduler;
pub mod session;
pub mod staging;
pub mod wasm_guest;
