use colored::{Color, Colorize};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Theme {
    pub name: String,
    pub colors: HashMap<String, ColorConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColorConfig {
    pub foreground: Option<String>,
    pub style: Vec<String>,
}

impl ColorConfig {
    fn new(foreground: &str, style: &[&str]) -> Self {
        Self {
            foreground: Some(foreground.to_string()),
            style: style.iter().map(|s| s.to_string()).collect(),
        }
    }
}

pub struct ThemeManager {
    themes: HashMap<String, Theme>,
    current_theme: String,
}

impl ThemeManager {
    pub fn new() -> Self {
        let mut manager = Self {
            themes: HashMap::new(),
            current_theme: "default".to_string(),
        };

        manager.load_default_themes();
        manager
    }

    pub fn set_theme(&mut self, theme_name: &str) -> bool {
        if self.themes.contains_key(theme_name) {
            self.current_theme = theme_name.to_string();
            true
        } else {
            false
        }
    }

    pub fn current_theme_name(&self) -> &str {
        &self.current_theme
    }

    pub fn apply_style(&self, text: &str, style_name: &str) -> String {
        let color_config = self
            .themes
            .get(&self.current_theme)
            .and_then(|theme| theme.colors.get(style_name))
            .or_else(|| self.themes.get("default").and_then(|theme| theme.colors.get(style_name)));

        let Some(color_config) = color_config else {
            return text.to_string();
        };

        let mut styled = text.normal();
        if let Some(color) = color_config.foreground.as_deref().and_then(parse_color) {
            styled = styled.color(color);
        }

        for style in &color_config.style {
            styled = match style.as_str() {
                "bold" => styled.bold(),
                "italic" => styled.italic(),
                "underline" => styled.underline(),
                "dimmed" => styled.dimmed(),
                _ => styled,
            };
        }

        styled.to_string()
    }

    pub fn list_themes(&self) -> Vec<String> {
        let mut names: Vec<String> = self.themes.keys().cloned().collect();
        names.sort();
        names
    }

    fn load_default_themes(&mut self) {
        let default_colors: HashMap<String, ColorConfig> = [
            ("title", ColorConfig::new("cyan", &["bold"])),
            ("header", ColorConfig::new("blue", &["bold"])),
            ("stats", ColorConfig::new("yellow", &[])),
            ("energy_high", ColorConfig::new("green", &["bold"])),
            ("energy_medium", ColorConfig::new("yellow", &["bold"])),
            ("energy_low", ColorConfig::new("red", &["bold"])),
            ("combo_base", ColorConfig::new("yellow", &[])),
            ("combo_warm", ColorConfig::new("bright_yellow", &["bold"])),
            ("combo_hot", ColorConfig::new("bright_red", &["bold"])),
            ("boost", ColorConfig::new("magenta", &["bold"])),
            ("notification", ColorConfig::new("bright_magenta", &[])),
            ("error", ColorConfig::new("red", &["bold"])),
            ("success", ColorConfig::new("green", &["bold"])),
            ("warning", ColorConfig::new("yellow", &["bold"])),
            ("info", ColorConfig::new("blue", &[])),
            ("separator", ColorConfig::new("bright_black", &["dimmed"])),
        ]
        .into_iter()
        .map(|(name, config)| (name.to_string(), config))
        .collect();

        self.themes.insert("default".to_string(), Theme {
            name: "default".to_string(),
            colors: default_colors,
        });

        // Ocean only overrides a few entries; the rest fall back to default.
        let ocean_colors: HashMap<String, ColorConfig> = [
            ("title", ColorConfig::new("bright_blue", &["bold"])),
            ("header", ColorConfig::new("bright_cyan", &["bold"])),
            ("stats", ColorConfig::new("bright_white", &[])),
            ("boost", ColorConfig::new("bright_magenta", &["bold", "underline"])),
            ("info", ColorConfig::new("cyan", &[])),
        ]
        .into_iter()
        .map(|(name, config)| (name.to_string(), config))
        .collect();

        self.themes.insert("ocean".to_string(), Theme {
            name: "ocean".to_string(),
            colors: ocean_colors,
        });
    }
}

impl Default for ThemeManager {
    fn default() -> Self {
        Self::new()
    }
}

fn parse_color(color_name: &str) -> Option<Color> {
    match color_name.to_lowercase().as_str() {
        "black" => Some(Color::Black),
        "red" => Some(Color::Red),
        "green" => Some(Color::Green),
        "yellow" => Some(Color::Yellow),
        "blue" => Some(Color::Blue),
        "magenta" => Some(Color::Magenta),
        "cyan" => Some(Color::Cyan),
        "white" => Some(Color::White),
        "bright_black" => Some(Color::BrightBlack),
        "bright_red" => Some(Color::BrightRed),
        "bright_green" => Some(Color::BrightGreen),
        "bright_yellow" => Some(Color::BrightYellow),
        "bright_blue" => Some(Color::BrightBlue),
        "bright_magenta" => Some(Color::BrightMagenta),
        "bright_cyan" => Some(Color::BrightCyan),
        "bright_white" => Some(Color::BrightWhite),
        _ => None,
    }
}
