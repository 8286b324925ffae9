//! Persistent batch settings (JSON file in the user data directory).

use std::fs;
use std::path::{Path, PathBuf};

use agcflow_core::engine::MAX_FIXED_GAIN_DB;
use agcflow_core::PipelineConfig;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[serde(default)]
pub struct AppSettings {
    pub fixed_digital_gain_db: f32,
    pub adaptive_digital_enabled: bool,
    pub vad_attack_probability: f32,
    pub enable_band_split: Option<bool>,
    pub debug_dir: Option<String>,
    pub debug_mirror: bool,
}

impl Default for AppSettings {
    fn default() -> Self {
        let pipeline = PipelineConfig::default();
        Self {
            fixed_digital_gain_db: pipeline.fixed_digital_gain_db,
            adaptive_digital_enabled: pipeline.adaptive_digital_enabled,
            vad_attack_probability: pipeline.vad_attack_probability,
            enable_band_split: None,
            debug_dir: None,
            debug_mirror: false,
        }
    }
}

impl AppSettings {
    pub fn normalize(&mut self) {
        if !self.fixed_digital_gain_db.is_finite() {
            self.fixed_digital_gain_db = AppSettings::default().fixed_digital_gain_db;
        }
        // Upper bound is exclusive in the engine.
        self.fixed_digital_gain_db = self
            .fixed_digital_gain_db
            .clamp(0.0, MAX_FIXED_GAIN_DB - 0.5);
        self.vad_attack_probability = if self.vad_attack_probability.is_nan() {
            1.0
        } else {
            self.vad_attack_probability.clamp(0.0, 1.0)
        };
        self.debug_dir = self
            .debug_dir
            .as_ref()
            .map(|d| d.trim().to_string())
            .filter(|d| !d.is_empty());
    }

    /// Pipeline config with these settings; stream shape is left at defaults
    /// and filled from the input file.
    pub fn pipeline_template(&self) -> PipelineConfig {
        PipelineConfig {
            fixed_digital_gain_db: self.fixed_digital_gain_db,
            adaptive_digital_enabled: self.adaptive_digital_enabled,
            vad_attack_probability: self.vad_attack_probability,
            enable_band_split: self.enable_band_split,
            debug_dir: self.debug_dir.as_ref().map(PathBuf::from),
            debug_mirror: self.debug_mirror,
            ..PipelineConfig::default()
        }
    }
}

pub fn default_settings_path() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var_os("APPDATA")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("."))
            .join("agcflow")
            .join("settings.json")
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var_os("XDG_CONFIG_HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|| {
                std::env::var_os("HOME")
                    .map(PathBuf::from)
                    .unwrap_or_else(|| PathBuf::from("/tmp"))
                    .join(".config")
            })
            .join("agcflow")
            .join("settings.json")
    }
}

/// Missing or malformed files fall back to defaults.
pub fn load_settings(path: &Path) -> AppSettings {
    let mut settings = fs::read_to_string(path)
        .ok()
        .and_then(|raw| serde_json::from_str::<AppSettings>(&raw).ok())
        .unwrap_or_default();
    settings.normalize();
    settings
}

pub fn save_settings(path: &Path, settings: &AppSettings) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(settings).map_err(std::io::Error::other)?;
    fs::write(path, json)
}
