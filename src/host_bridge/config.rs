use std::env;

use crate::host_bridge::error::BridgeError;

pub const SCREEN_WIDTH: usize = 64;
pub const SCREEN_HEIGHT: usize = 32;
pub const FRAMEBUFFER_BITS: usize = SCREEN_WIDTH * SCREEN_HEIGHT;
pub const FRAMEBUFFER_BYTES: usize = FRAMEBUFFER_BITS / 8;
pub const PROGRAM_START: u32 = 0x200;
pub const KEY_COUNT: u8 = 16;
/// Largest accepted host pixels per cell. Bounds the surface at 4096x2048.
pub const MAX_PIXEL_SIZE: u32 = 64;

/// How guest cycles are paced against the host frame loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pacing {
    /// One tick per host frame. Emulation speed follows the host frame rate.
    FrameDriven,
    /// At most one tick per frame, gated on `1e9 / clock_hz` nanoseconds having elapsed.
    TimerDriven,
}

/// Which framebuffer protocol a session uses. Exactly one is active per session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplayProtocol {
    /// Host decodes the packed framebuffer and repaints every cell when the draw flag is set.
    Bulk,
    /// Guest pushes individual cells through `setPixel`.
    Incremental,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BridgeConfig {
    pub clock_hz: u32,
    pub pixel_size: u32,
    pub target_fps: u32,
    pub pacing: Pacing,
    pub protocol: DisplayProtocol,
    pub seed: Option<u64>,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            clock_hz: 60,
            pixel_size: 6,
            target_fps: 60,
            pacing: Pacing::FrameDriven,
            protocol: DisplayProtocol::Bulk,
            seed: None,
        }
    }
}

impl BridgeConfig {
    pub fn validate(&self) -> Result<(), BridgeError> {
        if self.clock_hz == 0 {
            return Err(BridgeError::InvalidArgument("clock_hz must be > 0"));
        }
        if self.pixel_size == 0 {
            return Err(BridgeError::InvalidArgument("pixel_size must be > 0"));
        }
        if self.pixel_size > MAX_PIXEL_SIZE {
            return Err(BridgeError::InvalidArgument("pixel_size must be <= 64"));
        }
        if self.target_fps == 0 {
            return Err(BridgeError::InvalidArgument("target_fps must be > 0"));
        }
        Ok(())
    }

    /// Applies `CHIP8_PACING` and `CHIP8_PROTOCOL` when they are set.
    pub fn apply_env_overrides(&mut self) -> Result<(), String> {
        if let Ok(profile) = env::var("CHIP8_PACING") {
            self.pacing = load_pacing_profile(&profile)?;
        }
        if let Ok(profile) = env::var("CHIP8_PROTOCOL") {
            self.protocol = load_protocol_profile(&profile)?;
        }
        Ok(())
    }
}

pub fn load_pacing_profile(profile: &str) -> Result<Pacing, String> {
    match profile.trim().to_ascii_lowercase().as_str() {
        "frame" => Ok(Pacing::FrameDriven),
        "timer" => Ok(Pacing::TimerDriven),
        other => Err(format!(
            "invalid pacing '{other}', expected one of: frame, timer"
        )),
    }
}

pub fn load_protocol_profile(profile: &str) -> Result<DisplayProtocol, String> {
    match profile.trim().to_ascii_lowercase().as_str() {
        "bulk" => Ok(DisplayProtocol::Bulk),
        "incremental" => Ok(DisplayProtocol::Incremental),
        other => Err(format!(
            "invalid display protocol '{other}', expected one of: bulk, incremental"
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn profiles_are_case_and_whitespace_insensitive() {
        assert_eq!(load_pacing_profile(" Timer "), Ok(Pacing::TimerDriven));
        assert_eq!(
            load_protocol_profile("INCREMENTAL"),
            Ok(DisplayProtocol::Incremental)
        );
    }

    #[test]
    fn unknown_profile_names_the_choices() {
        let error = load_pacing_profile("vsync").unwrap_err();
        assert!(error.contains("frame, timer"));
    }

    #[test]
    fn validate_rejects_zero_rates() {
        let config = BridgeConfig {
            clock_hz: 0,
            ..BridgeConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(BridgeError::InvalidArgument(_))
        ));
        assert!(BridgeConfig::default().validate().is_ok());
    }

    #[test]
    fn validate_rejects_oversized_pixels() {
        let at_limit = BridgeConfig {
            pixel_size: MAX_PIXEL_SIZE,
            ..BridgeConfig::default()
        };
        let past_limit = BridgeConfig {
            pixel_size: MAX_PIXEL_SIZE + 1,
            ..BridgeConfig::default()
        };

        assert!(at_limit.validate().is_ok());
        assert!(matches!(
            past_limit.validate(),
            Err(BridgeError::InvalidArgument(_))
        ));
    }

    #[test]
    fn framebuffer_geometry_is_256_bytes() {
        assert_eq!(FRAMEBUFFER_BITS, 2048);
        assert_eq!(FRAMEBUFFER_BYTES, 256);
    }
}
