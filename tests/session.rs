mod common;

use std::cell::Cell;
use std::rc::Rc;

use chip8_host_bridge::{
    BridgeConfig, BridgeError, DisplayProtocol, ManualClock, MemoryView, PixelState, Session,
};
use common::{hook, FakeGuest};

#[test]
fn null_handle_is_init_failure() {
    let mut guest = FakeGuest::with_defaults();
    guest.init_returns_null = true;

    let result = Session::start(guest, &BridgeConfig::default());

    assert!(matches!(result, Err(BridgeError::InitFailure(_))));
}

#[test]
fn wrong_framebuffer_length_fails_at_init() {
    let mut guest = FakeGuest::with_defaults();
    guest.display_bits = 64 * 32 * 8;

    match Session::start(guest, &BridgeConfig::default()) {
        Err(error) => {
            assert!(error.is_layout_mismatch());
            assert!(error.is_session_fatal());
        }
        Ok(_) => panic!("expected a layout error"),
    }
}

#[test]
fn invalid_config_never_reaches_the_guest() {
    let config = BridgeConfig {
        pixel_size: 0,
        ..BridgeConfig::default()
    };
    let guest = FakeGuest::new(&config, ManualClock::new());

    assert!(matches!(
        Session::start(guest, &config),
        Err(BridgeError::InvalidArgument(_))
    ));
}

#[test]
fn start_passes_display_scale_to_the_guest() {
    let config = BridgeConfig {
        pixel_size: 6,
        ..BridgeConfig::default()
    };
    let session = Session::start(FakeGuest::new(&config, ManualClock::new()), &config).unwrap();

    let screen = session.guest().host.screen();
    assert_eq!(screen.pixel_size(), Some(6));
    assert_eq!(screen.canvas().width(), 384);
    assert_eq!(screen.canvas().height(), 192);
}

#[test]
fn shutdown_deinitialises_exactly_once() {
    let session = Session::start(FakeGuest::with_defaults(), &BridgeConfig::default()).unwrap();

    let guest = session.shutdown().unwrap();

    assert_eq!(guest.calls.init, 1);
    assert_eq!(guest.calls.deinit, 1);
    assert!(!guest.host.screen().is_active());
    assert!(guest.host.reports().is_empty());
}

#[test]
fn decode_sees_first_byte_as_top_left_pixels() {
    let mut session = Session::start(FakeGuest::with_defaults(), &BridgeConfig::default()).unwrap();
    session.guest_mut().framebuffer_mut()[0] = 0xFF;

    let grid = session.decode_framebuffer().unwrap();

    for x in 0..8 {
        assert_eq!(grid.get(x, 0), Some(PixelState::On));
    }
    assert_eq!(grid.get(8, 0), Some(PixelState::Off));
    assert_eq!(grid.lit_count(), 8);
}

#[test]
fn decode_after_memory_growth_reads_current_memory() {
    let mut session = Session::start(FakeGuest::with_defaults(), &BridgeConfig::default()).unwrap();
    let before = session.decode_framebuffer().unwrap();

    session.guest_mut().grow();
    session.guest_mut().framebuffer_mut()[255] = 0x80;
    let after = session.decode_framebuffer().unwrap();

    assert_eq!(before.lit_count(), 0);
    assert_eq!(after.get(63, 31), Some(PixelState::On));
}

#[test]
fn load_rom_file_goes_through_staging() {
    let tmp = tempfile::NamedTempFile::new().unwrap();
    std::fs::write(tmp.path(), [0x00, 0xE0, 0x12, 0x00]).unwrap();
    let mut session = Session::start(FakeGuest::with_defaults(), &BridgeConfig::default()).unwrap();

    session.load_rom_file(tmp.path()).unwrap();

    let guest = session.shutdown().unwrap();
    assert_eq!(guest.loaded, [0x00, 0xE0, 0x12, 0x00]);
    assert_eq!(guest.calls.alloc, guest.calls.free);
}

#[test]
fn missing_rom_file_is_io_error() {
    let mut session = Session::start(FakeGuest::with_defaults(), &BridgeConfig::default()).unwrap();

    let result = session.load_rom_file(std::path::Path::new("does/not/exist.ch8"));

    assert!(matches!(result, Err(BridgeError::Io(_))));
    assert_eq!(session.guest().calls.alloc, 0);
}

#[test]
fn pressed_keys_queries_every_key() {
    let mut session = Session::start(FakeGuest::with_defaults(), &BridgeConfig::default()).unwrap();
    session.guest_mut().pressed = vec![0x1, 0xF];

    assert_eq!(session.pressed_keys().unwrap(), vec![0x1, 0xF]);
}

#[test]
fn guest_fault_during_init_fails_start_and_tears_down() {
    let deinits = Rc::new(Cell::new(0));
    let seen = Rc::clone(&deinits);
    let mut guest = FakeGuest::with_defaults();
    guest.on_init = hook(|memory, host| {
        host.log(MemoryView::new(memory), 0x7FFF_0000, 4);
        false
    });
    guest.on_deinit = hook(move |_memory, _host| {
        seen.set(seen.get() + 1);
        false
    });

    let result = Session::start(guest, &BridgeConfig::default());

    assert!(matches!(
        result,
        Err(BridgeError::OutOfBounds {
            offset: 0x7FFF_0000,
            ..
        })
    ));
    assert_eq!(deinits.get(), 1);
}

#[test]
fn guest_fault_during_rom_load_fails_the_load() {
    let config = BridgeConfig {
        protocol: DisplayProtocol::Incremental,
        ..BridgeConfig::default()
    };
    let mut session = Session::start(FakeGuest::new(&config, ManualClock::new()), &config).unwrap();
    session.guest_mut().on_load = hook(|_memory, host| {
        host.set_pixel(1, 64, 0);
        false
    });

    let result = session.load_rom(&[0x12, 0x00]);

    assert!(matches!(
        result,
        Err(BridgeError::PixelOutOfRange { x: 64, y: 0 })
    ));
    let guest = session.guest_mut();
    assert_eq!(guest.calls.alloc, guest.calls.free);
    assert!(guest.host.take_fault().is_none());
}

#[test]
fn guest_fault_outranks_a_rejected_rom() {
    let mut session = Session::start(FakeGuest::with_defaults(), &BridgeConfig::default()).unwrap();
    session.guest_mut().reject_roms = true;
    session.guest_mut().on_load = hook(|memory, host| {
        host.log_error(MemoryView::new(memory), 0x7FFF_0000, 4);
        false
    });

    let result = session.load_rom(&[0x12, 0x00]);

    assert!(matches!(result, Err(BridgeError::OutOfBounds { .. })));
}
