pub mod config;
pub mod core;
pub mod store;
pub mod ui;
pub mod utils;

pub use config::Config;
pub use core::{Engine, EngineRules, EngineState, Rank};
pub use store::{FileStore, KeyValueStore, MemoryStore};
pub use ui::TapInterface;
pub use utils::{EngineError, EngineResult, Rejection};

pub type Result<T> = anyhow::Result<T>;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const APP_NAME: &str = env!("CARGO_PKG_NAME");
