use console::Term;
use std::io::{self, Write};
use crate::core::engine_state::EngineState;
use crate::core::events::{EngineEvent, EngineEventType};
use crate::config::UiConfig;
use crate::core::progression::{Rank, REWARDS};
use crate::ui::ThemeManager;
use tracing::warn;

const BAR_LENGTH: usize = 20;

pub struct Display {
    term: Term,
    theme_manager: ThemeManager,
    text_width: usize,
}

impl Display {
    pub fn new(theme_manager: ThemeManager, text_width: usize) -> io::Result<Self> {
        Ok(Self {
            term: Term::stdout(),
            theme_manager,
            text_width,
        })
    }

    /// Display with the configured width and theme. An unknown theme falls
    /// back to the default one.
    pub fn from_config(ui: &UiConfig) -> io::Result<Self> {
        let mut display = Self::new(ThemeManager::new(), ui.text_width)?;
        if !display.set_theme(&ui.theme) {
            warn!("Unknown theme '{}', using default", ui.theme);
        }
        Ok(display)
    }

    pub fn theme_name(&self) -> &str {
        self.theme_manager.current_theme_name()
    }

    pub fn clear_screen(&self) -> io::Result<()> {
        self.term.clear_screen()
    }

    pub fn show_title(&self, title: &str) -> io::Result<()> {
        let styled_title = self.theme_manager.apply_style(title, "title");
        let border = "═".repeat(self.text_width);
        let styled_border = self.theme_manager.apply_style(&border, "separator");

        writeln!(io::stdout(), "{}", styled_title)?;
        writeln!(io::stdout(), "{}", styled_border)?;
        writeln!(io::stdout())?;

        Ok(())
    }

    /// Energy bar, score line, rank and booster status.
    pub fn show_status(&self, state: &EngineState, energy_max: u32, show_rank: bool) -> io::Result<()> {
        let bar = create_energy_bar(state.energy, energy_max, BAR_LENGTH);
        let styled_bar = self.theme_manager.apply_style(&bar, energy_style(state.energy, energy_max));
        writeln!(io::stdout(), "⚡ Energy {} {}/{}", styled_bar, state.energy, energy_max)?;

        let score = format!("🏖️ Points: {}", state.points);
        writeln!(io::stdout(), "{}", self.theme_manager.apply_style(&score, "stats"))?;

        let combo = format!("🔥 Combo x{} | Multiplier x{}", state.combo, state.multiplier);
        writeln!(io::stdout(), "{}", self.theme_manager.apply_style(&combo, combo_style(state.combo)))?;

        if show_rank {
            let rank = state.rank();
            let line = match rank.next() {
                Some(next) => format!(
                    "{} {} ({:.0}% to {})",
                    rank.icon(),
                    rank,
                    rank.progress(state.points),
                    next
                ),
                None => format!("{} {} (max rank)", rank.icon(), rank),
            };
            writeln!(io::stdout(), "{}", self.theme_manager.apply_style(&line, "info"))?;
        }

        let boost = if state.boost_active {
            format!("🚀 Booster x{} active | {} left today", state.boost_multiplier, state.boosts_remaining)
        } else {
            format!("🚀 {} booster(s) left today", state.boosts_remaining)
        };
        let boost_style = if state.boost_active { "boost" } else { "info" };
        writeln!(io::stdout(), "{}", self.theme_manager.apply_style(&boost, boost_style))?;
        writeln!(io::stdout())?;

        Ok(())
    }

    /// Toast for an engine event. Housekeeping events are skipped.
    pub fn show_event(&self, event: &EngineEvent) -> io::Result<()> {
        let style = match event.event_type {
            EngineEventType::EngineStarted => return Ok(()),
            EngineEventType::TapRejected | EngineEventType::BoosterUnavailable => "warning",
            EngineEventType::EnergyLow | EngineEventType::EnergyDepleted => "energy_low",
            EngineEventType::BoosterActivated | EngineEventType::BoosterExpired => "boost",
            _ => "notification",
        };
        self.show_message(&format!("🔔 {}", event.message()), style)
    }

    pub fn show_ranks_and_rewards(&self, points: u64) -> io::Result<()> {
        self.show_message("🏆 Ranks", "header")?;
        for rank in Rank::ALL {
            let marker = if points >= rank.threshold() { "✔" } else { " " };
            let line = format!("  [{}] {} {} ({} points)", marker, rank.icon(), rank, rank.threshold());
            self.show_message(&line, "stats")?;
        }
        writeln!(io::stdout())?;

        self.show_message("🎁 Rewards", "header")?;
        for reward in REWARDS.iter() {
            let line = format!("  {} {} ({} points)", reward.icon, reward.name, reward.cost);
            let style = if reward.is_claimable(points) { "success" } else { "separator" };
            self.show_message(&line, style)?;
        }
        writeln!(io::stdout())?;

        Ok(())
    }

    pub fn show_message(&self, message: &str, style: &str) -> io::Result<()> {
        let styled_message = self.theme_manager.apply_style(message, style);
        writeln!(io::stdout(), "{}", styled_message)?;
        Ok(())
    }

    pub fn show_error(&self, error: &str) -> io::Result<()> {
        self.show_message(&format!("❌ {}", error), "error")
    }

    pub fn show_success(&self, message: &str) -> io::Result<()> {
        self.show_message(&format!("✅ {}", message), "success")
    }

    pub fn show_warning(&self, message: &str) -> io::Result<()> {
        self.show_message(&format!("⚠️ {}", message), "warning")
    }

    pub fn wait_for_enter(&self) -> io::Result<()> {
        let styled_prompt = self.theme_manager.apply_style("Press Enter to continue...", "info");
        print!("{}", styled_prompt);
        io::stdout().flush()?;

        let mut input = String::new();
        io::stdin().read_line(&mut input)?;
        Ok(())
    }

    pub fn set_theme(&mut self, theme_name: &str) -> bool {
        self.theme_manager.set_theme(theme_name)
    }
}

pub fn create_energy_bar(current: u32, max: u32, length: usize) -> String {
    let filled = if max == 0 {
        0
    } else {
        ((current.min(max) as u64 * length as u64) / max as u64) as usize
    };

    format!("{}{}", "█".repeat(filled), "░".repeat(length - filled))
}

pub fn energy_style(current: u32, max: u32) -> &'static str {
    let percentage = if max == 0 { 0.0 } else { current as f32 / max as f32 };

    if percentage > 0.6 {
        "energy_high"
    } else if percentage > 0.2 {
        "energy_medium"
    } else {
        "energy_low"
    }
}

pub fn combo_style(combo: u64) -> &'static str {
    match combo {
        c if c > 20 => "combo_hot",
        c if c > 10 => "combo_warm",
        _ => "combo_base",
    }
}
