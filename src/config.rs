use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, ensure};
use serde::{Deserialize, Serialize};

use crate::nes::{
    BUTTON_A, BUTTON_B, BUTTON_DOWN, BUTTON_LEFT, BUTTON_RIGHT, BUTTON_SELECT, BUTTON_START,
    BUTTON_UP,
};

pub const DEFAULT_CONFIG_FILE: &str = "famicore.json";
pub const NTSC_FRAME_RATE_HZ: f64 = 60.098_813_897_440_515;

/// Key names for one pad. Names are egui key names ("W", "ArrowUp",
/// "Enter", ...) plus "Shift", which matches either shift modifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct KeyBindings {
    pub a: Vec<String>,
    pub b: Vec<String>,
    pub select: Vec<String>,
    pub start: Vec<String>,
    pub up: Vec<String>,
    pub down: Vec<String>,
    pub left: Vec<String>,
    pub right: Vec<String>,
}

fn keys(names: &[&str]) -> Vec<String> {
    names.iter().map(|name| name.to_string()).collect()
}

impl Default for KeyBindings {
    fn default() -> Self {
        Self::player_one()
    }
}

impl KeyBindings {
    pub fn player_one() -> Self {
        Self {
            a: keys(&["Space", "Z"]),
            b: keys(&["X"]),
            select: keys(&["Shift"]),
            start: keys(&["Enter"]),
            up: keys(&["W", "ArrowUp"]),
            down: keys(&["S", "ArrowDown"]),
            left: keys(&["A", "ArrowLeft"]),
            right: keys(&["D", "ArrowRight"]),
        }
    }

    pub fn player_two() -> Self {
        Self {
            a: keys(&["M"]),
            b: keys(&["N"]),
            select: keys(&["O"]),
            start: keys(&["U"]),
            up: keys(&["I"]),
            down: keys(&["K"]),
            left: keys(&["J"]),
            right: keys(&["L"]),
        }
    }

    /// Controller byte for the keys `is_down` reports as held.
    pub fn buttons(&self, is_down: impl Fn(&str) -> bool) -> u8 {
        let table: [(&[String], u8); 8] = [
            (&self.a, BUTTON_A),
            (&self.b, BUTTON_B),
            (&self.select, BUTTON_SELECT),
            (&self.start, BUTTON_START),
            (&self.up, BUTTON_UP),
            (&self.down, BUTTON_DOWN),
            (&self.left, BUTTON_LEFT),
            (&self.right, BUTTON_RIGHT),
        ];

        table
            .iter()
            .filter(|(names, _)| names.iter().any(|name| is_down(name)))
            .fold(0, |state, (_, bit)| state | bit)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub window_scale: f32,
    pub frame_rate_hz: f64,
    pub player_one: KeyBindings,
    pub player_two: KeyBindings,
    pub last_rom_dir: Option<PathBuf>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            window_scale: 3.0,
            frame_rate_hz: NTSC_FRAME_RATE_HZ,
            player_one: KeyBindings::player_one(),
            player_two: KeyBindings::player_two(),
            last_rom_dir: None,
        }
    }
}

impl Settings {
    /// Reads `path`, falling back to defaults when the file does not exist.
    /// Fields missing from the file keep their defaults.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            log::info!("no settings at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let text = fs::read_to_string(path)
            .with_context(|| format!("failed to read settings {}", path.display()))?;
        let settings: Self = serde_json::from_str(&text)
            .with_context(|| format!("failed to parse settings {}", path.display()))?;
        settings
            .validate()
            .with_context(|| format!("invalid settings in {}", path.display()))?;
        Ok(settings)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let text = serde_json::to_string_pretty(self).context("failed to serialize settings")?;
        fs::write(path, text)
            .with_context(|| format!("failed to write settings {}", path.display()))
    }

    fn validate(&self) -> Result<()> {
        ensure!(
            self.window_scale >= 1.0 && self.window_scale <= 8.0,
            "window_scale must be between 1 and 8, got {}",
            self.window_scale
        );
        ensure!(
            self.frame_rate_hz > 0.0 && self.frame_rate_hz <= 240.0,
            "frame_rate_hz must be in (0, 240], got {}",
            self.frame_rate_hz
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("famicore-{}-{name}.json", std::process::id()))
    }

    #[test]
    fn missing_file_gives_defaults() {
        let settings = Settings::load(&temp_path("missing")).unwrap();
        assert_eq!(settings, Settings::default());
    }

    #[test]
    fn save_then_load_keeps_changes() {
        let path = temp_path("roundtrip");
        let mut settings = Settings::default();
        settings.window_scale = 2.0;
        settings.last_rom_dir = Some(PathBuf::from("/roms"));
        settings.player_two.start = vec!["Tab".to_string()];

        settings.save(&path).unwrap();
        let loaded = Settings::load(&path).unwrap();
        fs::remove_file(&path).ok();

        assert_eq!(loaded, settings);
    }

    #[test]
    fn partial_file_fills_in_defaults() {
        let path = temp_path("partial");
        fs::write(&path, r#"{ "window_scale": 4.0, "player_one": { "a": ["K"] } }"#).unwrap();
        let loaded = Settings::load(&path).unwrap();
        fs::remove_file(&path).ok();

        assert_eq!(loaded.window_scale, 4.0);
        assert_eq!(loaded.frame_rate_hz, NTSC_FRAME_RATE_HZ);
        assert_eq!(loaded.player_one.a, vec!["K".to_string()]);
        assert_eq!(loaded.player_one.start, KeyBindings::player_one().start);
        assert_eq!(loaded.player_two, KeyBindings::player_two());
    }

    #[test]
    fn malformed_or_invalid_file_is_an_error() {
        let path = temp_path("malformed");
        fs::write(&path, "{ not json").unwrap();
        let err = Settings::load(&path).unwrap_err();
        assert!(format!("{err:#}").contains("failed to parse settings"));

        fs::write(&path, r#"{ "frame_rate_hz": 0.0 }"#).unwrap();
        let err = Settings::load(&path).unwrap_err();
        fs::remove_file(&path).ok();
        assert!(format!("{err:#}").contains("frame_rate_hz"));
    }

    #[test]
    fn bindings_map_held_keys_to_buttons() {
        let bindings = KeyBindings::player_one();

        assert_eq!(bindings.buttons(|_| false), 0);
        assert_eq!(
            bindings.buttons(|key| key == "ArrowUp" || key == "Z"),
            BUTTON_UP | BUTTON_A
        );
        assert_eq!(
            bindings.buttons(|key| matches!(key, "Shift" | "Enter" | "D" | "X")),
            BUTTON_SELECT | BUTTON_START | BUTTON_RIGHT | BUTTON_B
        );
    }
}
