use serde::{Deserialize, Serialize};
use uuid::Uuid;
use chrono::{DateTime, Utc};
use crate::core::progression::{Achievement, Rank};
use crate::utils::Rejection;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineEvent {
    pub id: Uuid,
    pub event_type: EngineEventType,
    pub timestamp: DateTime<Utc>,
    pub data: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum EngineEventType {
    EngineStarted,
    TapRejected,
    BoosterActivated,
    BoosterExpired,
    BoosterUnavailable,
    BoostsReplenished,
    EnergyLow,
    EnergyDepleted,
    RankChanged,
    AchievementUnlocked,
    ProgressReset,
}

impl EngineEvent {
    pub fn new(event_type: EngineEventType, timestamp: DateTime<Utc>, data: serde_json::Value) -> Self {
        Self {
            id: Uuid::new_v4(),
            event_type,
            timestamp,
            data,
        }
    }

    pub fn engine_started(at: DateTime<Utc>, points: u64, boosts_remaining: u8) -> Self {
        let data = serde_json::json!({
            "points": points,
            "boosts_remaining": boosts_remaining
        });
        Self::new(EngineEventType::EngineStarted, at, data)
    }

    pub fn tap_rejected(at: DateTime<Utc>, reason: Rejection) -> Self {
        let data = serde_json::json!({
            "reason": reason,
            "message": reason.to_string()
        });
        Self::new(EngineEventType::TapRejected, at, data)
    }

    pub fn booster_activated(at: DateTime<Utc>, multiplier: u64, duration_secs: u64, boosts_remaining: u8) -> Self {
        let data = serde_json::json!({
            "title": "Booster Activated!",
            "message": format!("{}x points for {} seconds", multiplier, duration_secs),
            "multiplier": multiplier,
            "duration_secs": duration_secs,
            "boosts_remaining": boosts_remaining
        });
        Self::new(EngineEventType::BoosterActivated, at, data)
    }

    pub fn booster_expired(at: DateTime<Utc>) -> Self {
        let data = serde_json::json!({
            "title": "Boost Ended",
            "message": "Back to normal speed"
        });
        Self::new(EngineEventType::BoosterExpired, at, data)
    }

    pub fn booster_unavailable(at: DateTime<Utc>, reason: Rejection) -> Self {
        let data = serde_json::json!({
            "reason": reason,
            "message": reason.to_string()
        });
        Self::new(EngineEventType::BoosterUnavailable, at, data)
    }

    pub fn boosts_replenished(at: DateTime<Utc>, boosts_remaining: u8) -> Self {
        let data = serde_json::json!({
            "boosts_remaining": boosts_remaining
        });
        Self::new(EngineEventType::BoostsReplenished, at, data)
    }

    pub fn energy_low(at: DateTime<Utc>, energy: u32) -> Self {
        let data = serde_json::json!({
            "energy": energy,
            "message": "Energy low! Wait to regenerate..."
        });
        Self::new(EngineEventType::EnergyLow, at, data)
    }

    pub fn energy_depleted(at: DateTime<Utc>) -> Self {
        Self::new(EngineEventType::EnergyDepleted, at, serde_json::json!({ "energy": 0 }))
    }

    pub fn rank_changed(at: DateTime<Utc>, from: Rank, to: Rank) -> Self {
        let data = serde_json::json!({
            "from": from.label(),
            "to": to.label()
        });
        Self::new(EngineEventType::RankChanged, at, data)
    }

    pub fn achievement_unlocked(at: DateTime<Utc>, achievement: &Achievement) -> Self {
        let data = serde_json::json!({
            "threshold": achievement.threshold,
            "message": achievement.message
        });
        Self::new(EngineEventType::AchievementUnlocked, at, data)
    }

    pub fn progress_reset(at: DateTime<Utc>) -> Self {
        Self::new(EngineEventType::ProgressReset, at, serde_json::Value::Null)
    }

    /// Human-readable line for toasts and logs.
    pub fn message(&self) -> String {
        let field = |key: &str| self.data.get(key).and_then(|v| v.as_str()).map(str::to_string);
        match self.event_type {
            EngineEventType::BoosterActivated | EngineEventType::BoosterExpired => {
                format!(
                    "{} {}",
                    field("title").unwrap_or_default(),
                    field("message").unwrap_or_default()
                )
            }
            EngineEventType::RankChanged => {
                format!("New rank: {}", field("to").unwrap_or_default())
            }
            EngineEventType::BoostsReplenished => "Daily boosters refilled".to_string(),
            EngineEventType::EnergyDepleted => "Out of energy".to_string(),
            EngineEventType::ProgressReset => "Progress reset".to_string(),
            EngineEventType::EngineStarted => "Engine started".to_string(),
            _ => field("message").unwrap_or_default(),
        }
    }
}

pub trait EngineEventHandler: Send {
    fn handle_event(&mut self, event: &EngineEvent);
}

pub struct EventLogger {
    events: Vec<EngineEvent>,
    max_events: usize,
}

impl EventLogger {
    pub fn new(max_events: usize) -> Self {
        Self {
            events: Vec::new(),
            max_events,
        }
    }

    pub fn get_events(&self) -> &[EngineEvent] {
        &self.events
    }

    pub fn get_events_by_type(&self, event_type: &EngineEventType) -> Vec<&EngineEvent> {
        self.events
            .iter()
            .filter(|event| &event.event_type == event_type)
            .collect()
    }

    pub fn get_event_count(&self) -> usize {
        self.events.len()
    }

    pub fn get_event_count_by_type(&self, event_type: &EngineEventType) -> usize {
        self.events
            .iter()
            .filter(|event| &event.event_type == event_type)
            .count()
    }
}

impl Default for EventLogger {
    fn default() -> Self {
        Self::new(1000)
    }
}

impl EngineEventHandler for EventLogger {
    fn handle_event(&mut self, event: &EngineEvent) {
        self.events.push(event.clone());

        if self.events.len() > self.max_events {
            self.events.remove(0);
        }
    }
}

/// Forwards every event to each registered handler in order.
pub struct CompositeEventHandler {
    handlers: Vec<Box<dyn EngineEventHandler>>,
}

impl CompositeEventHandler {
    pub fn new() -> Self {
        Self {
            handlers: Vec::new(),
        }
    }

    pub fn add_handler<H: EngineEventHandler + 'static>(&mut self, handler: H) {
        self.handlers.push(Box::new(handler));
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl Default for CompositeEventHandler {
    fn default() -> Self {
        Self::new()
    }
}

impl EngineEventHandler for CompositeEventHandler {
    fn handle_event(&mut self, event: &EngineEvent) {
        for handler in &mut self.handlers {
            handler.handle_event(event);
        }
    }
}

/// Sends events over a channel, for hosts that render notifications elsewhere.
pub struct ChannelEventHandler {
    sender: tokio::sync::mpsc::UnboundedSender<EngineEvent>,
}

impl ChannelEventHandler {
    pub fn new(sender: tokio::sync::mpsc::UnboundedSender<EngineEvent>) -> Self {
        Self { sender }
    }
}

impl EngineEventHandler for ChannelEventHandler {
    fn handle_event(&mut self, event: &EngineEvent) {
        // Receiver gone means the host stopped listening.
        let _ = self.sender.send(event.clone());
    }
}
