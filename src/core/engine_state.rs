use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use crate::core::constants::{COMBO_STEP, DAILY_BOOSTS, ENERGY_MAX};
use crate::core::progression::{compute_rank, Rank};

/// Everything the engine knows about one player session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineState {
    pub points: u64,
    pub combo: u64,
    pub multiplier: u64,
    pub energy: u32,
    pub last_tap_at: Option<DateTime<Utc>>,
    pub boosts_remaining: u8,
    pub boost_reset_date: Option<NaiveDate>,
    pub boost_multiplier: u64,
    pub boost_active: bool,
}

impl Default for EngineState {
    fn default() -> Self {
        Self::with_energy(ENERGY_MAX, DAILY_BOOSTS)
    }
}

impl EngineState {
    pub fn with_energy(energy: u32, boosts: u8) -> Self {
        Self {
            points: 0,
            combo: 1,
            multiplier: 1,
            energy,
            last_tap_at: None,
            boosts_remaining: boosts,
            boost_reset_date: None,
            boost_multiplier: 1,
            boost_active: false,
        }
    }

    pub fn rank(&self) -> Rank {
        compute_rank(self.points)
    }

    pub fn progress(&self) -> Progress {
        Progress {
            points: self.points,
            combo: self.combo,
            multiplier: self.multiplier,
        }
    }

    /// Restores the persisted score fields, keeping session fields as they are.
    pub fn restore_progress(&mut self, progress: Progress) {
        let progress = progress.normalized(COMBO_STEP);
        self.points = progress.points;
        self.combo = progress.combo;
        self.multiplier = progress.multiplier;
    }

    pub fn is_energy_low(&self, threshold: u32) -> bool {
        self.energy < threshold
    }

    pub fn can_tap(&self) -> bool {
        self.energy > 0
    }
}

pub fn derive_multiplier(combo: u64, step: u64) -> u64 {
    combo / step.max(1) + 1
}

/// The score blob stored under the progress key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Progress {
    pub points: u64,
    pub combo: u64,
    pub multiplier: u64,
}

impl Default for Progress {
    fn default() -> Self {
        Self {
            points: 0,
            combo: 1,
            multiplier: 1,
        }
    }
}

impl Progress {
    /// Combo is at least 1 and multiplier always follows from combo.
    pub fn normalized(self, combo_step: u64) -> Self {
        let combo = self.combo.max(1);
        Self {
            points: self.points,
            combo,
            multiplier: derive_multiplier(combo, combo_step),
        }
    }

    pub fn is_consistent(&self, combo_step: u64) -> bool {
        *self == self.normalized(combo_step)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::constants::ENERGY_LOW_THRESHOLD;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_default_state() {
        let state = EngineState::default();

        assert_eq!(state.points, 0);
        assert_eq!(state.combo, 1);
        assert_eq!(state.multiplier, 1);
        assert_eq!(state.energy, 5000);
        assert_eq!(state.boosts_remaining, 3);
        assert_eq!(state.boost_multiplier, 1);
        assert!(!state.boost_active);
        assert!(state.last_tap_at.is_none());
        assert_eq!(state.rank(), Rank::SandyStarter);
    }

    #[test]
    fn test_derive_multiplier() {
        assert_eq!(derive_multiplier(1, 10), 1);
        assert_eq!(derive_multiplier(9, 10), 1);
        assert_eq!(derive_multiplier(10, 10), 2);
        assert_eq!(derive_multiplier(25, 10), 3);
        assert_eq!(derive_multiplier(5, 0), 6);
    }

    #[test]
    fn test_progress_blob_format() {
        let progress = Progress {
            points: 42,
            combo: 12,
            multiplier: 2,
        };
        let json = serde_json::to_string(&progress).unwrap();
        assert_eq!(json, r#"{"points":42,"combo":12,"multiplier":2}"#);

        let back: Progress = serde_json::from_str(&json).unwrap();
        assert_eq!(back, progress);
    }

    #[test]
    fn test_restore_progress_rederives_multiplier() {
        let mut state = EngineState::default();
        state.energy = 1200;
        state.restore_progress(Progress {
            points: 900,
            combo: 0,
            multiplier: 7,
        });

        assert_eq!(state.points, 900);
        assert_eq!(state.combo, 1);
        assert_eq!(state.multiplier, 1);
        assert_eq!(state.energy, 1200);
    }

    #[test]
    fn test_progress_consistency() {
        assert!(Progress::default().is_consistent(10));
        assert!(!Progress { points: 0, combo: 20, multiplier: 1 }.is_consistent(10));
    }

    #[test]
    fn test_energy_flags() {
        let mut state = EngineState::default();
        assert!(state.can_tap());
        assert!(!state.is_energy_low(ENERGY_LOW_THRESHOLD));

        state.energy = 499;
        assert!(state.is_energy_low(ENERGY_LOW_THRESHOLD));

        state.energy = 0;
        assert!(!state.can_tap());
    }
}
