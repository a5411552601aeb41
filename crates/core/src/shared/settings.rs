use std::fmt;
use std::str::FromStr;

use thiserror::Error;

use crate::shared::constants::{
    DEFAULT_CONFIDENCE, DEFAULT_MAX_DETECTIONS, MAX_CUDA_DEVICE, MAX_MAX_DETECTIONS,
    MIN_MAX_DETECTIONS,
};

#[derive(Error, Debug, PartialEq)]
pub enum SettingsError {
    #[error("confidence must be between 0.0 and 1.0, got {0}")]
    Confidence(f64),
    #[error("max detections must be between 1 and 20, got {0}")]
    MaxDetections(usize),
    #[error("unknown device '{0}' (expected cpu, 0, 1 or 2)")]
    Device(String),
}

/// Compute device the detector session runs on.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Device {
    #[default]
    Cpu,
    Cuda(u32),
}

impl FromStr for Device {
    type Err = SettingsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim().to_ascii_lowercase();
        if trimmed == "cpu" {
            return Ok(Device::Cpu);
        }
        let index = trimmed.strip_prefix("cuda:").unwrap_or(&trimmed);
        index
            .parse::<u32>()
            .map(Device::Cuda)
            .map_err(|_| SettingsError::Device(s.to_string()))
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Device::Cpu => write!(f, "cpu"),
            Device::Cuda(id) => write!(f, "{id}"),
        }
    }
}

/// The user-facing detection controls shared by every input source.
#[derive(Clone, Debug, PartialEq)]
pub struct DetectionSettings {
    pub confidence: f64,
    pub max_detections: usize,
    pub device: Device,
    pub save_result: bool,
}

impl Default for DetectionSettings {
    fn default() -> Self {
        Self {
            confidence: DEFAULT_CONFIDENCE,
            max_detections: DEFAULT_MAX_DETECTIONS,
            device: Device::Cpu,
            save_result: true,
        }
    }
}

impl DetectionSettings {
    pub fn validate(&self) -> Result<(), SettingsError> {
        if !(0.0..=1.0).contains(&self.confidence) {
            return Err(SettingsError::Confidence(self.confidence));
        }
        if !(MIN_MAX_DETECTIONS..=MAX_MAX_DETECTIONS).contains(&self.max_detections) {
            return Err(SettingsError::MaxDetections(self.max_detections));
        }
        if let Device::Cuda(id) = self.device {
            if id > MAX_CUDA_DEVICE {
                return Err(SettingsError::Device(self.device.to_string()));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("cpu", Device::Cpu)]
    #[case("CPU", Device::Cpu)]
    #[case("0", Device::Cuda(0))]
    #[case("2", Device::Cuda(2))]
    #[case("cuda:1", Device::Cuda(1))]
    #[case(" 1 ", Device::Cuda(1))]
    fn test_device_parses(#[case] input: &str, #[case] expected: Device) {
        assert_eq!(input.parse::<Device>().unwrap(), expected);
    }

    #[rstest]
    #[case("gpu")]
    #[case("")]
    #[case("-1")]
    #[case("cuda:")]
    fn test_device_rejects(#[case] input: &str) {
        assert_eq!(
            input.parse::<Device>(),
            Err(SettingsError::Device(input.to_string()))
        );
    }

    #[test]
    fn test_device_display_matches_selector_values() {
        assert_eq!(Device::Cpu.to_string(), "cpu");
        assert_eq!(Device::Cuda(1).to_string(), "1");
    }

    #[test]
    fn test_defaults() {
        let s = DetectionSettings::default();
        assert_eq!(s.confidence, 0.4);
        assert_eq!(s.max_detections, 5);
        assert_eq!(s.device, Device::Cpu);
        assert!(s.save_result);
        assert!(s.validate().is_ok());
    }

    #[rstest]
    #[case(-0.1)]
    #[case(1.01)]
    fn test_validate_rejects_confidence(#[case] confidence: f64) {
        let s = DetectionSettings {
            confidence,
            ..Default::default()
        };
        assert_eq!(s.validate(), Err(SettingsError::Confidence(confidence)));
    }

    #[rstest]
    #[case(0)]
    #[case(21)]
    fn test_validate_rejects_max_detections(#[case] max_detections: usize) {
        let s = DetectionSettings {
            max_detections,
            ..Default::default()
        };
        assert_eq!(s.validate(), Err(SettingsError::MaxDetections(max_detections)));
    }

    #[rstest]
    #[case(3)]
    #[case(7)]
    fn test_validate_rejects_unlisted_cuda_device(#[case] id: u32) {
        let s = DetectionSettings {
            device: Device::Cuda(id),
            ..Default::default()
        };
        assert_eq!(s.validate(), Err(SettingsError::Device(id.to_string())));
    }

    #[rstest]
    #[case(Device::Cpu)]
    #[case(Device::Cuda(0))]
    #[case(Device::Cuda(2))]
    fn test_validate_accepts_listed_devices(#[case] device: Device) {
        let s = DetectionSettings {
            device,
            ..Default::default()
        };
        assert!(s.validate().is_ok());
    }

    #[rstest]
    #[case(0.0, 1)]
    #[case(1.0, 20)]
    fn test_validate_accepts_bounds(#[case] confidence: f64, #[case] max_detections: usize) {
        let s = DetectionSettings {
            confidence,
            max_detections,
            ..Default::default()
        };
        assert!(s.validate().is_ok());
    }
}
