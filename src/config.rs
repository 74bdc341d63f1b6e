use std::path::PathBuf;

use serde_derive::Deserialize;

#[derive(Clone, Debug, Deserialize)]
pub struct SystemConfig {
    /// Bus address of the own system.
    pub address: u16,
    /// Entity address of the engine within the system.
    pub entity: u8,
    /// Human readable system name.
    pub name: String,
}

#[derive(Clone, Debug, Deserialize)]
pub struct StoreConfig {
    /// Directory the plan database lives in.
    pub directory: PathBuf,
}

#[derive(Clone, Debug, Deserialize)]
pub struct TransportConfig {
    /// Local socket address of the bus gateway.
    pub bind: String,
    /// Peer address published envelopes are forwarded to.
    pub peer: String,
}

/// Engine behavior options.
#[derive(Clone, Debug, Deserialize)]
pub struct EngineConfig {
    /// Compute plan progress while executing.
    #[serde(default)]
    pub compute_progress: bool,
    /// Predict fuel usage at plan load.
    #[serde(default = "default_true")]
    pub fuel_prediction: bool,
    /// Rate of the periodic plan control state report in hertz.
    #[serde(default = "default_report_frequency")]
    pub state_report_frequency: f64,
    /// Duration of the vehicle calibration process in seconds.
    #[serde(default = "default_calibration_time")]
    pub minimum_calibration_time: u16,
    /// Whether calibration should be performed at all.
    #[serde(default = "default_true")]
    pub perform_calibration: bool,
    /// Abort initialization when a payload fails to activate.
    #[serde(default)]
    pub abort_on_failed_activation: bool,
    /// Perform station keeping while calibrating.
    #[serde(default)]
    pub stationkeeping_while_calibrating: bool,
    /// Station keeping speed in RPM.
    #[serde(default = "default_sk_speed")]
    pub stationkeeping_speed: f32,
    /// Station keeping radius in meters.
    #[serde(default = "default_sk_radius")]
    pub stationkeeping_radius: f32,
    /// Entity label of the IMU gating the fuel prediction.
    #[serde(default = "default_imu_label")]
    pub imu_entity_label: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            compute_progress: false,
            fuel_prediction: true,
            state_report_frequency: default_report_frequency(),
            minimum_calibration_time: default_calibration_time(),
            perform_calibration: true,
            abort_on_failed_activation: false,
            stationkeeping_while_calibrating: false,
            stationkeeping_speed: default_sk_speed(),
            stationkeeping_radius: default_sk_radius(),
            imu_entity_label: default_imu_label(),
        }
    }
}

/// Daemon configuration.
#[derive(Clone, Debug, Deserialize)]
pub struct Config {
    pub system: SystemConfig,
    pub store: StoreConfig,
    /// UDP bus gateway, disabled when absent.
    pub transport: Option<TransportConfig>,
    #[serde(default)]
    pub engine: EngineConfig,
}

fn default_true() -> bool {
    true
}

fn default_report_frequency() -> f64 {
    3.0
}

fn default_calibration_time() -> u16 {
    10
}

fn default_sk_speed() -> f32 {
    1600.0
}

fn default_sk_radius() -> f32 {
    20.0
}

fn default_imu_label() -> String {
    "IMU".to_owned()
}
