use anyhow::Context;
use cathcore::config::BenchConfig;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::generator::profile::SimulationProfile;

/// Serial link to the relay microcontroller.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RelaySettings {
    /// Explicit port name; when absent the first USB port whose description
    /// contains `match_description` is used.
    pub port: Option<String>,
    pub match_description: String,
    pub baud_rate: u32,
    pub timeout_ms: u64,
    /// Pause before each selector byte so the board is ready to read.
    pub guard_delay_ms: u64,
}

impl Default for RelaySettings {
    fn default() -> Self {
        Self {
            port: None,
            match_description: "Arduino".into(),
            baud_rate: 115_200,
            timeout_ms: 500,
            guard_delay_ms: 10,
        }
    }
}

impl RelaySettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn guard_delay(&self) -> Duration {
        Duration::from_millis(self.guard_delay_ms)
    }
}

/// Raw SCPI socket on the oscilloscope.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScopeSettings {
    pub address: String,
    /// Length of trace fetched after each acquisition.
    pub capture_window_s: f64,
    pub io_timeout_ms: u64,
    pub busy_poll_ms: u64,
}

impl Default for ScopeSettings {
    fn default() -> Self {
        Self {
            address: "192.168.1.20:4000".into(),
            capture_window_s: 8.0e-6,
            io_timeout_ms: 2_000,
            busy_poll_ms: 50,
        }
    }
}

/// VNWA executable and the calibration it loads before sweeping.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VnwaSettings {
    pub executable: PathBuf,
    pub script: PathBuf,
    pub master_cal: Option<PathBuf>,
    pub cal_file: Option<PathBuf>,
    pub time_per_point: u32,
    pub tx_power: u32,
}

impl Default for VnwaSettings {
    fn default() -> Self {
        Self {
            executable: PathBuf::from("C:\\VNWA\\VNWA.exe"),
            script: PathBuf::from("Script.scr"),
            master_cal: None,
            cal_file: Some(PathBuf::from("C:\\VNWA\\VNWA.cal")),
            time_per_point: 10,
            tx_power: 4_000,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HardwareConfig {
    pub relay: RelaySettings,
    pub scope: ScopeSettings,
    pub vnwa: VnwaSettings,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TesterConfig {
    pub bench: BenchConfig,
    pub hardware: HardwareConfig,
    pub simulation: SimulationProfile,
}

impl TesterConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path_ref = path.as_ref();
        let contents = fs::read_to_string(path_ref)
            .with_context(|| format!("reading tester config {}", path_ref.display()))?;
        let config: TesterConfig = serde_yaml::from_str(&contents)
            .with_context(|| format!("parsing tester config {}", path_ref.display()))?;
        config
            .bench
            .validate()
            .with_context(|| format!("validating tester config {}", path_ref.display()))?;
        Ok(config)
    }

    pub fn to_yaml(&self) -> anyhow::Result<String> {
        serde_yaml::to_string(self).context("serializing tester config")
    }
}
