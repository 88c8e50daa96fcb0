pub mod clock;
pub mod constants;
pub mod driver;
pub mod engine;
pub mod engine_state;
pub mod events;
pub mod progression;
pub mod rules;
pub mod scheduler;

pub use clock::{Clock, ManualClock, SystemClock};
pub use driver::{Driver, SharedEngine};
pub use engine::{BoosterResult, Engine, TapResult};
pub use engine_state::{EngineState, Progress};
pub use events::{EngineEvent, EngineEventHandler, EngineEventType};
pub use progression::{compute_rank, Rank};
pub use rules::EngineRules;
