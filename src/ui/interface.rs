use dialoguer::{Confirm, Select};
use std::time::Duration;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver};

use crate::config::Config;
use crate::core::driver::{Driver, SharedEngine};
use crate::core::events::{ChannelEventHandler, EngineEvent};
use crate::core::rules::EngineRules;
use crate::ui::Display;
use crate::utils::{EngineError, EngineResult, Rejection};
use tracing::{error, info};

const BURST_TAPS: usize = 10;

/// Interactive terminal session over a live engine.
pub struct TapInterface {
    engine: SharedEngine,
    driver: Option<Driver>,
    events: UnboundedReceiver<EngineEvent>,
    display: Display,
    rules: EngineRules,
    config: Config,
}

impl TapInterface {
    pub async fn new(engine: SharedEngine, config: Config) -> EngineResult<Self> {
        info!("Initializing tap interface");

        let display = Display::from_config(&config.ui)
            .map_err(|e| EngineError::configuration(format!("Failed to create display: {}", e)))?;

        let (tx, events) = unbounded_channel();
        let rules = {
            let mut guard = engine.lock().await;
            guard.add_listener(ChannelEventHandler::new(tx));
            *guard.rules()
        };

        let driver = Driver::spawn(engine.clone(), Duration::from_millis(rules.regen_interval_ms));

        Ok(Self {
            engine,
            driver: Some(driver),
            events,
            display,
            rules,
            config,
        })
    }

    pub async fn run(&mut self) -> EngineResult<()> {
        info!("Starting tap session");

        loop {
            match self.show_main_menu().await {
                Ok(true) => {}
                Ok(false) => break,
                Err(e) => {
                    error!("Main menu error: {}", e);
                    self.display.show_error(&format!("An error occurred: {}", e)).ok();
                    self.display.wait_for_enter().ok();
                }
            }
        }

        if let Some(driver) = self.driver.take() {
            driver.shutdown().await;
        }

        self.display.show_message("See you on the beach!", "success").ok();
        Ok(())
    }

    async fn show_main_menu(&mut self) -> EngineResult<bool> {
        self.display.clear_screen().ok();
        self.display.show_title(&format!("🏝️ Sandy Tap v{}", crate::VERSION))?;
        self.show_status().await?;
        self.flush_events()?;

        let choices = [
            "👆 Tap",
            "🖐️ Tap x10",
            "🚀 Activate Booster",
            "🏆 Ranks & Rewards",
            "🔄 Reset Progress",
            "🚪 Quit",
        ];

        let selection = Select::new()
            .with_prompt("What would you like to do?")
            .items(&choices)
            .default(0)
            .interact()
            .map_err(|e| EngineError::configuration(format!("Menu selection error: {}", e)))?;

        match selection {
            0 => self.tap(1).await?,
            1 => self.tap(BURST_TAPS).await?,
            2 => self.activate_booster().await?,
            3 => self.ranks_and_rewards().await?,
            4 => self.reset_progress().await?,
            5 => return Ok(false),
            _ => unreachable!(),
        }

        Ok(true)
    }

    async fn show_status(&self) -> EngineResult<()> {
        let state = self.engine.lock().await.state();
        self.display
            .show_status(&state, self.rules.energy_max, self.config.ui.show_rank)?;
        Ok(())
    }

    async fn tap(&mut self, count: usize) -> EngineResult<()> {
        let mut total = 0u64;
        let mut rejected = None;

        {
            let mut engine = self.engine.lock().await;
            for _ in 0..count {
                let result = engine.register_tap();
                if let Some(reason) = result.rejection {
                    rejected = Some(reason);
                    break;
                }
                total = total.saturating_add(result.granted);
            }
        }

        if total > 0 {
            self.display.show_success(&format!("+{} points", total))?;
        }
        if let Some(Rejection::InsufficientEnergy) = rejected {
            self.display.show_warning("Out of energy, rest a moment to recharge")?;
        }

        self.flush_events()?;
        Ok(())
    }

    async fn activate_booster(&mut self) -> EngineResult<()> {
        let result = self.engine.lock().await.activate_booster();

        match result.rejection {
            None => self.display.show_success(&format!(
                "{}x points for {} seconds!",
                self.rules.booster_multiplier, self.rules.booster_duration_secs
            ))?,
            Some(reason) => self.display.show_warning(&reason.to_string())?,
        }

        self.flush_events()?;
        self.display.wait_for_enter()?;
        Ok(())
    }

    async fn ranks_and_rewards(&mut self) -> EngineResult<()> {
        self.display.clear_screen().ok();
        let points = self.engine.lock().await.state().points;
        self.display.show_ranks_and_rewards(points)?;
        self.display.wait_for_enter()?;
        Ok(())
    }

    async fn reset_progress(&mut self) -> EngineResult<()> {
        let confirmed = Confirm::new()
            .with_prompt("Reset all points, combo and boosters?")
            .default(false)
            .interact()
            .map_err(|e| EngineError::configuration(format!("Reset confirmation error: {}", e)))?;

        if confirmed {
            self.engine.lock().await.reset_progress()?;
            self.display.show_success("Progress reset")?;
        } else {
            self.display.show_message("Reset cancelled.", "info")?;
        }

        self.flush_events()?;
        self.display.wait_for_enter()?;
        Ok(())
    }

    fn flush_events(&mut self) -> EngineResult<()> {
        while let Ok(event) = self.events.try_recv() {
            self.display.show_event(&event)?;
        }
        Ok(())
    }
}
