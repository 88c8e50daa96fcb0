use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Rank {
    SandyStarter,
    BeachExplorer,
    OceanMaster,
}

impl Rank {
    pub const ALL: [Rank; 3] = [Rank::SandyStarter, Rank::BeachExplorer, Rank::OceanMaster];

    pub fn label(self) -> &'static str {
        match self {
            Rank::SandyStarter => "Sandy Starter",
            Rank::BeachExplorer => "Beach Explorer",
            Rank::OceanMaster => "Ocean Master",
        }
    }

    pub fn icon(self) -> &'static str {
        match self {
            Rank::SandyStarter => "🐚",
            Rank::BeachExplorer => "🏖️",
            Rank::OceanMaster => "🌊",
        }
    }

    /// Points needed to hold this rank (inclusive).
    pub fn threshold(self) -> u64 {
        match self {
            Rank::SandyStarter => 0,
            Rank::BeachExplorer => 2500,
            Rank::OceanMaster => 5000,
        }
    }

    pub fn next(self) -> Option<Rank> {
        match self {
            Rank::SandyStarter => Some(Rank::BeachExplorer),
            Rank::BeachExplorer => Some(Rank::OceanMaster),
            Rank::OceanMaster => None,
        }
    }

    /// Percentage of the way from this rank's threshold to the next one.
    /// The top rank always reports 100.
    pub fn progress(self, points: u64) -> f64 {
        let Some(next) = self.next() else {
            return 100.0;
        };
        let span = (next.threshold() - self.threshold()) as f64;
        let done = points.saturating_sub(self.threshold()) as f64;
        (done / span * 100.0).clamp(0.0, 100.0)
    }
}

impl fmt::Display for Rank {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

pub fn compute_rank(points: u64) -> Rank {
    if points >= Rank::OceanMaster.threshold() {
        Rank::OceanMaster
    } else if points >= Rank::BeachExplorer.threshold() {
        Rank::BeachExplorer
    } else {
        Rank::SandyStarter
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Achievement {
    pub threshold: u64,
    pub message: &'static str,
}

pub const ACHIEVEMENTS: [Achievement; 3] = [
    Achievement {
        threshold: 100,
        message: "🎉 First Milestone Reached!",
    },
    Achievement {
        threshold: 500,
        message: "⭐ You're Getting Better!",
    },
    Achievement {
        threshold: 1000,
        message: "🏆 Master Achievement Unlocked!",
    },
];

/// Milestones passed when points move from `before` to `after`.
/// Combo scaling makes landing exactly on a threshold rare, so crossing counts.
pub fn achievements_crossed(before: u64, after: u64) -> impl Iterator<Item = &'static Achievement> {
    ACHIEVEMENTS
        .iter()
        .filter(move |a| before < a.threshold && a.threshold <= after)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Reward {
    pub id: u32,
    pub name: &'static str,
    pub cost: u64,
    pub icon: &'static str,
    pub description: &'static str,
}

impl Reward {
    pub fn is_claimable(&self, points: u64) -> bool {
        points >= self.cost
    }
}

pub const REWARDS: [Reward; 4] = [
    Reward {
        id: 1,
        name: "Beach Day Pass",
        cost: 1000,
        icon: "🏖️",
        description: "Free entry to premium beach locations",
    },
    Reward {
        id: 2,
        name: "Surf Lesson",
        cost: 2000,
        icon: "🏄",
        description: "1-hour private surfing lesson",
    },
    Reward {
        id: 3,
        name: "Beach Equipment",
        cost: 3000,
        icon: "⛱️",
        description: "Premium beach gear rental package",
    },
    Reward {
        id: 4,
        name: "VIP Experience",
        cost: 5000,
        icon: "👑",
        description: "Full day VIP beach experience",
    },
];

pub fn claimable_rewards(points: u64) -> Vec<&'static Reward> {
    REWARDS.iter().filter(|r| r.is_claimable(points)).collect()
}
