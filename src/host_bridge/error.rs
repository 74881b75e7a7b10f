use std::fmt::{Display, Formatter};

#[derive(Debug)]
pub enum BridgeError {
    Io(std::io::Error),
    InvalidArgument(&'static str),
    Instantiate(String),
    MissingExport(&'static str),
    GuestTrap {
        entry: &'static str,
        message: String,
    },
    InitFailure(&'static str),
    AllocationFailed {
        len: usize,
    },
    LoadFailed {
        len: usize,
    },
    OutOfBounds {
        offset: usize,
        len: usize,
        capacity: usize,
    },
    FramebufferLayout {
        bits: u32,
        expected: u32,
    },
    PixelOutOfRange {
        x: i32,
        y: i32,
    },
    NoSurface,
    DoubleDeinit(&'static str),
    SchedulerStopped,
}

impl BridgeError {
    /// Errors that mean the host/guest contract is broken. The session cannot continue.
    pub fn is_session_fatal(&self) -> bool {
        matches!(
            self,
            Self::Instantiate(_)
                | Self::MissingExport(_)
                | Self::GuestTrap { .. }
                | Self::InitFailure(_)
                | Self::OutOfBounds { .. }
                | Self::FramebufferLayout { .. }
                | Self::PixelOutOfRange { .. }
        )
    }

    pub fn is_layout_mismatch(&self) -> bool {
        matches!(
            self,
            Self::FramebufferLayout { .. } | Self::PixelOutOfRange { .. }
        )
    }
}

impl Display for BridgeError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(error) => write!(f, "io error: {error}"),
            Self::InvalidArgument(argument) => write!(f, "invalid argument: {argument}"),
            Self::Instantiate(message) => write!(f, "could not instantiate guest: {message}"),
            Self::MissingExport(name) => write!(f, "guest does not export '{name}'"),
            Self::GuestTrap { entry, message } => {
                write!(f, "guest trapped in '{entry}': {message}")
            }
            Self::InitFailure(reason) => write!(f, "couldn't initialize emulator: {reason}"),
            Self::AllocationFailed { len } => {
                write!(f, "couldn't allocate {len} bytes of ROM staging memory")
            }
            Self::LoadFailed { len } => write!(f, "guest rejected ROM of {len} bytes"),
            Self::OutOfBounds {
                offset,
                len,
                capacity,
            } => write!(
                f,
                "guest memory access 0x{offset:x}+{len} exceeds capacity 0x{capacity:x}"
            ),
            Self::FramebufferLayout { bits, expected } => {
                write!(f, "framebuffer spans {bits} bits (expected {expected})")
            }
            Self::PixelOutOfRange { x, y } => {
                write!(f, "pixel ({x}, {y}) outside the 64x32 display")
            }
            Self::NoSurface => write!(f, "paint requested with no screen surface"),
            Self::DoubleDeinit(what) => write!(f, "attempt to deinit {what} twice"),
            Self::SchedulerStopped => write!(f, "scheduler already stopped"),
        }
    }
}

impl std::error::Error for BridgeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(error) => Some(error),
            _ => None,
        }
    }
}

impl From<std::io::Error> for BridgeError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}
