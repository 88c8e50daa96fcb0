//! Pure transition functions over `EngineState`.
//!
//! Each function takes the current state by value and hands back the next
//! state together with the outcome. A rejected action returns the input state
//! untouched.

use chrono::{DateTime, Duration, FixedOffset, Utc};
use serde::{Deserialize, Serialize};
use crate::core::constants::*;
use crate::core::engine_state::{derive_multiplier, EngineState};
use crate::utils::{EngineError, EngineResult, Rejection};

/// Tunable numbers behind the transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineRules {
    pub energy_max: u32,
    pub regen_interval_ms: u64,
    pub regen_idle_threshold_ms: u64,
    pub booster_multiplier: u64,
    pub booster_duration_secs: u64,
    pub daily_boosts: u8,
    pub allow_overlapping_boosters: bool,
    pub energy_low_threshold: u32,
}

impl Default for EngineRules {
    fn default() -> Self {
        Self {
            energy_max: ENERGY_MAX,
            regen_interval_ms: REGEN_INTERVAL_MS,
            regen_idle_threshold_ms: REGEN_IDLE_THRESHOLD_MS,
            booster_multiplier: BOOSTER_MULTIPLIER,
            booster_duration_secs: BOOSTER_DURATION_SECS,
            daily_boosts: DAILY_BOOSTS,
            allow_overlapping_boosters: true,
            energy_low_threshold: ENERGY_LOW_THRESHOLD,
        }
    }
}

impl EngineRules {
    pub fn initial_state(&self) -> EngineState {
        EngineState::with_energy(self.energy_max, self.daily_boosts)
    }

    pub fn validate(&self) -> EngineResult<()> {
        if self.energy_max == 0 {
            return Err(EngineError::configuration("Energy max must be greater than 0"));
        }
        if self.regen_interval_ms == 0 || self.regen_interval_ms > MAX_INTERVAL_MS {
            return Err(EngineError::configuration(format!(
                "Regeneration interval must be between 1 and {} ms",
                MAX_INTERVAL_MS
            )));
        }
        if self.regen_idle_threshold_ms > MAX_INTERVAL_MS {
            return Err(EngineError::configuration(format!(
                "Regeneration idle threshold must be at most {} ms",
                MAX_INTERVAL_MS
            )));
        }
        if self.booster_multiplier == 0 {
            return Err(EngineError::configuration("Booster multiplier must be at least 1"));
        }
        if self.booster_duration_secs == 0 || self.booster_duration_secs > MAX_BOOSTER_DURATION_SECS {
            return Err(EngineError::configuration(format!(
                "Booster duration must be between 1 and {} seconds",
                MAX_BOOSTER_DURATION_SECS
            )));
        }
        Ok(())
    }

    // Clamped to the validated range so out-of-range rules never overflow chrono.
    pub fn regen_interval(&self) -> Duration {
        Duration::milliseconds(self.regen_interval_ms.clamp(1, MAX_INTERVAL_MS) as i64)
    }

    pub fn regen_idle_threshold(&self) -> Duration {
        Duration::milliseconds(self.regen_idle_threshold_ms.min(MAX_INTERVAL_MS) as i64)
    }

    pub fn booster_duration(&self) -> Duration {
        Duration::seconds(self.booster_duration_secs.min(MAX_BOOSTER_DURATION_SECS) as i64)
    }
}

/// Spends one energy and scores `boost_multiplier` points through the combo.
pub fn tap(
    state: EngineState,
    now: DateTime<Utc>,
) -> (EngineState, Result<u64, Rejection>) {
    if !state.can_tap() {
        return (state, Err(Rejection::InsufficientEnergy));
    }

    let mut next = state;
    next.energy = next.energy.saturating_sub(1);
    next.last_tap_at = Some(now);

    let amount = next.boost_multiplier;
    let (next, granted) = apply_points(next, amount);
    (next, Ok(granted))
}

/// `points += amount * combo * multiplier`, then the combo advances and the
/// multiplier is re-derived from the new combo.
pub fn apply_points(state: EngineState, amount: u64) -> (EngineState, u64) {
    let granted = amount
        .saturating_mul(state.combo)
        .saturating_mul(state.multiplier);

    let mut next = state;
    next.points = next.points.saturating_add(granted);
    next.combo = next.combo.saturating_add(1);
    next.multiplier = derive_multiplier(next.combo, COMBO_STEP);
    (next, granted)
}

/// One regeneration tick at `now`. Returns whether energy went up.
pub fn regenerate(
    state: EngineState,
    rules: &EngineRules,
    now: DateTime<Utc>,
) -> (EngineState, bool) {
    let idle = match state.last_tap_at {
        None => true,
        Some(last) => now - last > rules.regen_idle_threshold(),
    };

    if !idle || state.energy >= rules.energy_max {
        return (state, false);
    }

    let mut next = state;
    next.energy = (next.energy + 1).min(rules.energy_max);
    (next, true)
}

pub fn activate_booster(
    state: EngineState,
    rules: &EngineRules,
) -> (EngineState, Result<(), Rejection>) {
    if state.boosts_remaining == 0 {
        return (state, Err(Rejection::NoBoostsRemaining));
    }
    if state.boost_active && !rules.allow_overlapping_boosters {
        return (state, Err(Rejection::BoosterAlreadyActive));
    }

    let mut next = state;
    next.boosts_remaining -= 1;
    next.boost_multiplier = rules.booster_multiplier;
    next.boost_active = true;
    (next, Ok(()))
}

pub fn expire_booster(state: EngineState) -> EngineState {
    let mut next = state;
    next.boost_multiplier = 1;
    next.boost_active = false;
    next
}

/// What storage held about the daily allowance at startup.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoredBoosts {
    pub reset_at: Option<DateTime<FixedOffset>>,
    pub remaining: Option<u8>,
}

/// Refills the allowance if the last reset happened before `start_of_today`,
/// otherwise restores the stored count. Returns whether a refill happened.
pub fn daily_boost_reset(
    state: EngineState,
    rules: &EngineRules,
    stored: StoredBoosts,
    start_of_today: DateTime<FixedOffset>,
) -> (EngineState, bool) {
    let mut next = state;
    let stale = match stored.reset_at {
        None => true,
        Some(reset_at) => reset_at < start_of_today,
    };

    if stale {
        next.boosts_remaining = rules.daily_boosts;
        next.boost_reset_date = Some(start_of_today.date_naive());
    } else {
        next.boosts_remaining = stored
            .remaining
            .unwrap_or(rules.daily_boosts)
            .min(rules.daily_boosts);
        next.boost_reset_date = stored.reset_at.map(|at| at.date_naive());
    }
    (next, stale)
}
