//! Host-persisted runtime settings (spec.md §6 "Config"). These are
//! opaque to `real8-core` — the core never reads them directly — but the
//! CLI host uses them to decide presentation hints and volume levels.
//!
//! Grounded on `patsoffice-phosphor-core`'s `frontend` crate, which
//! persists an equivalent settings file with `serde` + `toml` + `dirs`.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// `None` lets the cart's own `_update60` declaration decide (spec.md
    /// §4.8 "FPS detection"); `Some(30|60)` overrides it.
    pub target_fps: Option<u32>,
    pub volume_music: u8,
    pub volume_sfx: u8,
    pub show_stats: bool,
    pub stretch_screen: bool,
    pub crt_filter: bool,
    pub interpolation: bool,
    pub show_skin: bool,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            target_fps: None,
            volume_music: 10,
            volume_sfx: 10,
            show_stats: false,
            stretch_screen: true,
            crt_filter: false,
            interpolation: false,
            show_skin: true,
        }
    }
}

impl Config {
    /// Loads a config from `path`, falling back to defaults if the file
    /// doesn't exist. A malformed file is an error (unlike out-of-range
    /// cart data, this is host configuration the user is expected to get
    /// right).
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            return Ok(Config::default());
        }
        let text = fs::read_to_string(path)?;
        Ok(toml::from_str(&text)?)
    }
}
