use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use lookout_core::shared::constants::{
    DEFAULT_CONFIDENCE, DEFAULT_MAX_DETECTIONS, DEFAULT_SNAPSHOT_INTERVAL_SECS, MAX_CUDA_DEVICE,
    MAX_MAX_DETECTIONS, MIN_MAX_DETECTIONS,
};
use lookout_core::shared::settings::{DetectionSettings, Device};

pub const MIN_SNAPSHOT_INTERVAL_SECS: u32 = 1;
pub const MAX_SNAPSHOT_INTERVAL_SECS: u32 = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InputType {
    Image,
    Video,
    Webcam,
    IpCamera,
}

impl InputType {
    pub const ALL: &[InputType] = &[
        InputType::Image,
        InputType::Video,
        InputType::Webcam,
        InputType::IpCamera,
    ];
}

impl std::fmt::Display for InputType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InputType::Image => write!(f, "Image"),
            InputType::Video => write!(f, "Video"),
            InputType::Webcam => write!(f, "Webcam"),
            InputType::IpCamera => write!(f, "IP Camera"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Appearance {
    System,
    Dark,
    Light,
}

impl Appearance {
    pub const ALL: &[Appearance] = &[Appearance::System, Appearance::Dark, Appearance::Light];
}

impl std::fmt::Display for Appearance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Appearance::System => write!(f, "System"),
            Appearance::Dark => write!(f, "Dark"),
            Appearance::Light => write!(f, "Light"),
        }
    }
}

/// Sidebar state persisted between launches.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub input_type: InputType,
    pub max_detections: u32,
    /// `cpu` or a CUDA device index, as typed in the device selector.
    pub device: String,
    pub confidence: f32,
    pub save_result: bool,
    pub auto_snapshot: bool,
    pub snapshot_interval_secs: u32,
    pub appearance: Appearance,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            input_type: InputType::Image,
            max_detections: DEFAULT_MAX_DETECTIONS as u32,
            device: Device::Cpu.to_string(),
            confidence: DEFAULT_CONFIDENCE as f32,
            save_result: true,
            auto_snapshot: false,
            snapshot_interval_secs: DEFAULT_SNAPSHOT_INTERVAL_SECS as u32,
            appearance: Appearance::System,
        }
    }
}

impl Settings {
    fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("Lookout").join("settings.json"))
    }

    pub fn load() -> Self {
        Self::config_path()
            .map(|path| Self::load_from(&path))
            .unwrap_or_default()
    }

    pub fn save(&self) {
        if let Some(path) = Self::config_path() {
            if let Err(e) = self.save_to(&path) {
                log::warn!("Could not save settings to {}: {e}", path.display());
            }
        }
    }

    fn load_from(path: &Path) -> Self {
        fs::read_to_string(path)
            .ok()
            .and_then(|json| serde_json::from_str::<Settings>(&json).ok())
            .map(Settings::sanitized)
            .unwrap_or_default()
    }

    fn save_to(&self, path: &Path) -> Result<(), Box<dyn std::error::Error>> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    /// Pulls hand-edited values back into the ranges the controls allow.
    fn sanitized(mut self) -> Self {
        let confidence = if self.confidence.is_finite() {
            self.confidence
        } else {
            DEFAULT_CONFIDENCE as f32
        };
        self.confidence = confidence.clamp(0.0, 1.0);
        self.max_detections = self
            .max_detections
            .clamp(MIN_MAX_DETECTIONS as u32, MAX_MAX_DETECTIONS as u32);
        self.snapshot_interval_secs = self
            .snapshot_interval_secs
            .clamp(MIN_SNAPSHOT_INTERVAL_SECS, MAX_SNAPSHOT_INTERVAL_SECS);
        if self.listed_device().is_none() {
            self.device = Device::Cpu.to_string();
        }
        self
    }

    /// The stored device, if it is one the selector offers.
    fn listed_device(&self) -> Option<Device> {
        self.device
            .parse::<Device>()
            .ok()
            .filter(|device| !matches!(device, Device::Cuda(id) if *id > MAX_CUDA_DEVICE))
    }

    pub fn device(&self) -> Device {
        self.listed_device().unwrap_or_default()
    }

    pub fn detection_settings(&self) -> DetectionSettings {
        DetectionSettings {
            confidence: f64::from(self.confidence),
            max_detections: self.max_detections as usize,
            device: self.device(),
            save_result: self.save_result,
        }
    }
}
