//! Game tuning defaults. The engine reads them through `EngineRules`, which
//! the `[engine]` config section can override.

/// Energy ceiling and starting energy.
pub const ENERGY_MAX: u32 = 5000;

/// Period of the regeneration tick, in milliseconds.
pub const REGEN_INTERVAL_MS: u64 = 500;

/// A tick only regenerates if the last tap is strictly older than this.
pub const REGEN_IDLE_THRESHOLD_MS: u64 = 500;

/// Score multiplier while a booster is running.
pub const BOOSTER_MULTIPLIER: u64 = 10;

/// How long one booster lasts, in seconds.
pub const BOOSTER_DURATION_SECS: u64 = 30;

/// Boosters granted per calendar day.
pub const DAILY_BOOSTS: u8 = 3;

/// Every this many combo steps the multiplier grows by one.
pub const COMBO_STEP: u64 = 10;

/// Below this the host warns the player that energy is running out.
pub const ENERGY_LOW_THRESHOLD: u32 = 500;

/// Upper bound accepted for the regeneration interval and idle threshold.
pub const MAX_INTERVAL_MS: u64 = 3_600_000;

/// Upper bound accepted for a booster's duration.
pub const MAX_BOOSTER_DURATION_SECS: u64 = 86_400;

// --- Storage keys ---

pub const KEY_PROGRESS: &str = "sandyState";
pub const KEY_BOOSTS_REMAINING: &str = "boostsRemaining";
pub const KEY_BOOST_RESET_TIME: &str = "boostResetTime";
