//! Output Device Enumeration
//!
//! Lists what [`CpalDriver::with_device`](crate::CpalDriver::with_device)
//! can open.

use cpal::traits::{DeviceTrait, HostTrait};
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, EngineResult};

/// Sample rates probed against each device's supported ranges
const COMMON_RATES: [u32; 6] = [44100, 48000, 88200, 96000, 176400, 192000];

/// An output device on the default host
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputDevice {
    /// Device name, also used to select it
    pub name: String,

    /// Whether this is the host's default output
    pub is_default: bool,

    /// Common sample rates the device supports (may be empty if querying failed)
    pub sample_rates: Vec<u32>,

    /// Maximum supported channels
    pub max_channels: u16,
}

impl OutputDevice {
    /// Enumerate output devices on the default host
    pub fn enumerate() -> EngineResult<Vec<OutputDevice>> {
        let host = cpal::default_host();

        let default_name = host.default_output_device().and_then(|d| d.name().ok());

        let devices: Vec<_> = host
            .output_devices()
            .map_err(|e| EngineError::DeviceNotFound(e.to_string()))?
            .filter_map(|device| Self::from_cpal_device(&device, default_name.as_deref()).ok())
            .collect();

        if devices.is_empty() {
            return Err(EngineError::NoDevicesFound);
        }
        Ok(devices)
    }

    /// The host's default output device
    pub fn default_output() -> EngineResult<OutputDevice> {
        let device = cpal::default_host()
            .default_output_device()
            .ok_or(EngineError::NoDevicesFound)?;

        let mut info = Self::from_cpal_device(&device, None)?;
        info.is_default = true;
        Ok(info)
    }

    /// Whether `rate` is among the probed rates this device supports
    pub fn supports_rate(&self, rate: u32) -> bool {
        self.sample_rates.contains(&rate)
    }

    fn from_cpal_device(device: &cpal::Device, default_name: Option<&str>) -> EngineResult<Self> {
        let name = device
            .name()
            .map_err(|e| EngineError::DeviceNotFound(e.to_string()))?;
        let is_default = default_name == Some(name.as_str());

        let (sample_rates, max_channels) = match device.supported_output_configs() {
            Ok(configs) => supported_rates(configs),
            Err(_) => (Vec::new(), 2),
        };

        Ok(Self {
            name,
            is_default,
            sample_rates,
            max_channels,
        })
    }
}

fn supported_rates(
    configs: impl Iterator<Item = cpal::SupportedStreamConfigRange>,
) -> (Vec<u32>, u16) {
    let mut sample_rates = Vec::new();
    let mut max_channels = 0u16;

    for config in configs {
        max_channels = max_channels.max(config.channels());

        let min = config.min_sample_rate().0;
        let max = config.max_sample_rate().0;
        for &rate in &COMMON_RATES {
            if (min..=max).contains(&rate) && !sample_rates.contains(&rate) {
                sample_rates.push(rate);
            }
        }
    }

    sample_rates.sort_unstable();
    (sample_rates, max_channels)
}
