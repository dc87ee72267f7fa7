//! Render configuration.
//!
//! DESIGN
//! ======
//! Numeric knobs are read once from `MINIMAP_*` environment variables with
//! compiled defaults, the same way the persistence worker tunes itself.
//! Whole-image layers (overlay, background, missing-map placeholder) are
//! attached programmatically by the host since they are decoded elsewhere.
//!
//! Orientation constants (deadzone, pitch range) are empirically tuned and
//! kept configurable rather than derived.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use crate::geometry::{Color, Image, RASTER_SIZE};

const DEFAULT_RENDER_DELAY: u64 = 1;
const DEFAULT_ROTATE_BY_DEFAULT: bool = true;
const DEFAULT_IDLE_TIMEOUT_MS: u64 = 5000;
const DEFAULT_DEADZONE_DEGREES: f64 = 40.0;
const DEFAULT_PITCH_MIN: f64 = 50.0;
const DEFAULT_PITCH_MAX: f64 = 90.0;
const DEFAULT_FREE_RUN_INTERVAL_MS: u64 = 70;
const DEFAULT_MAX_WORKERS: usize = 0;

// =============================================================================
// ERRORS
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("unknown render mode: {0}")]
    UnknownRenderMode(String),
}

// =============================================================================
// TRI-STATE OPTION
// =============================================================================

/// A setting that may be left unset so a lower-priority source decides.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BooleanOption {
    #[default]
    Unset,
    True,
    False,
}

impl BooleanOption {
    #[must_use]
    pub fn as_bool(self) -> Option<bool> {
        match self {
            Self::Unset => None,
            Self::True => Some(true),
            Self::False => Some(false),
        }
    }

    /// First set value in `chain` (highest priority first), else `default`.
    #[must_use]
    pub fn resolve(chain: &[Self], default: bool) -> bool {
        chain.iter().find_map(|opt| opt.as_bool()).unwrap_or(default)
    }
}

impl From<bool> for BooleanOption {
    fn from(value: bool) -> Self {
        if value { Self::True } else { Self::False }
    }
}

// =============================================================================
// RENDER MODE
// =============================================================================

/// Which driver runs the compose pass. Exactly one is active per scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RenderMode {
    /// Compose inside the host's tick callback.
    #[default]
    HostTick,
    /// Compose from a spawned interval loop, independent of the host tick.
    /// Discouraged: providers are queried off the host thread and are not
    /// guaranteed to be reentrant.
    FreeRunning,
}

impl FromStr for RenderMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "tick" | "host" | "host_tick" => Ok(Self::HostTick),
            "free" | "free_running" | "async" => Ok(Self::FreeRunning),
            other => Err(ConfigError::UnknownRenderMode(other.to_owned())),
        }
    }
}

// =============================================================================
// ORIENTATION TUNING
// =============================================================================

/// Angular constants for mapping a user's heading onto the aim cursor.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OrientationTuning {
    /// Half-width of the yaw band (degrees) that maps onto the full aim-X range.
    pub deadzone_degrees: f64,
    /// Lowest pitch (degrees) considered; maps to aim-Y = -127.
    pub pitch_min: f64,
    /// Highest pitch (degrees) considered; maps to aim-Y = 127.
    pub pitch_max: f64,
}

impl Default for OrientationTuning {
    fn default() -> Self {
        Self { deadzone_degrees: DEFAULT_DEADZONE_DEGREES, pitch_min: DEFAULT_PITCH_MIN, pitch_max: DEFAULT_PITCH_MAX }
    }
}

// =============================================================================
// RENDER CONFIG
// =============================================================================

/// Read-only configuration consumed by the scheduler and compositor.
#[derive(Debug, Clone)]
pub struct RenderConfig {
    /// Compose only every `render_delay` host ticks. Never zero.
    pub render_delay: u64,
    /// Rotation used when neither the sub-map nor the user sets one.
    pub rotate_by_default: bool,
    /// Viewers without a refresh for longer than this are deactivated.
    pub idle_timeout: Duration,
    pub orientation: OrientationTuning,
    pub mode: RenderMode,
    /// Period of the free-running loop.
    pub free_run_interval: Duration,
    /// Maximum concurrent composition tasks per pass; 0 means one per viewer.
    pub max_workers: usize,
    /// Global overlay drawn above world pixels.
    pub overlay: Option<Arc<Image>>,
    /// Global background drawn below terrain.
    pub background: Option<Arc<Image>>,
    /// Delivered instead of terrain when the bound sub-map cannot be resolved.
    pub missing_map: Arc<Image>,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            render_delay: DEFAULT_RENDER_DELAY,
            rotate_by_default: DEFAULT_ROTATE_BY_DEFAULT,
            idle_timeout: Duration::from_millis(DEFAULT_IDLE_TIMEOUT_MS),
            orientation: OrientationTuning::default(),
            mode: RenderMode::HostTick,
            free_run_interval: Duration::from_millis(DEFAULT_FREE_RUN_INTERVAL_MS),
            max_workers: DEFAULT_MAX_WORKERS,
            overlay: None,
            background: None,
            missing_map: Arc::new(default_missing_map_image()),
        }
    }
}

impl RenderConfig {
    /// Load numeric settings from the environment, falling back to defaults.
    #[must_use]
    pub fn from_env() -> Self {
        let config = Self {
            render_delay: env_parse("MINIMAP_RENDER_DELAY", DEFAULT_RENDER_DELAY).max(1),
            rotate_by_default: env_parse("MINIMAP_ROTATE_BY_DEFAULT", DEFAULT_ROTATE_BY_DEFAULT),
            idle_timeout: Duration::from_millis(env_parse("MINIMAP_IDLE_TIMEOUT_MS", DEFAULT_IDLE_TIMEOUT_MS)),
            orientation: OrientationTuning {
                deadzone_degrees: env_parse("MINIMAP_DEADZONE_DEGREES", DEFAULT_DEADZONE_DEGREES),
                pitch_min: env_parse("MINIMAP_PITCH_MIN", DEFAULT_PITCH_MIN),
                pitch_max: env_parse("MINIMAP_PITCH_MAX", DEFAULT_PITCH_MAX),
            },
            mode: env_parse("MINIMAP_RENDER_MODE", RenderMode::HostTick),
            free_run_interval: Duration::from_millis(env_parse(
                "MINIMAP_FREE_RUN_INTERVAL_MS",
                DEFAULT_FREE_RUN_INTERVAL_MS,
            )),
            max_workers: env_parse("MINIMAP_MAX_WORKERS", DEFAULT_MAX_WORKERS),
            ..Self::default()
        };

        info!(
            render_delay = config.render_delay,
            rotate_by_default = config.rotate_by_default,
            idle_timeout_ms = config.idle_timeout.as_millis(),
            deadzone = config.orientation.deadzone_degrees,
            pitch_min = config.orientation.pitch_min,
            pitch_max = config.orientation.pitch_max,
            mode = ?config.mode,
            max_workers = config.max_workers,
            "render config loaded"
        );
        config
    }

    #[must_use]
    pub fn with_overlay(mut self, image: Image) -> Self {
        self.overlay = Some(Arc::new(image));
        self
    }

    #[must_use]
    pub fn with_background(mut self, image: Image) -> Self {
        self.background = Some(Arc::new(image));
        self
    }

    #[must_use]
    pub fn with_missing_map(mut self, image: Image) -> Self {
        self.missing_map = Arc::new(image);
        self
    }
}

/// Parse an environment variable, using `default` when absent or invalid.
/// An invalid value is logged at `warn` with its parse error.
pub fn env_parse<T>(key: &str, default: T) -> T
where
    T: FromStr + Copy,
    T::Err: fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) => parse_or_default(key, &raw, default),
        Err(_) => default,
    }
}

fn parse_or_default<T>(key: &str, raw: &str, default: T) -> T
where
    T: FromStr,
    T::Err: fmt::Display,
{
    match raw.trim().parse::<T>() {
        Ok(value) => value,
        Err(e) => {
            warn!(key, raw, error = %e, "invalid config value; using default");
            default
        }
    }
}

fn default_missing_map_image() -> Image {
    Image::checkerboard(RASTER_SIZE, 16, Color::rgb(112, 112, 112), Color::rgb(0, 0, 0))
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
