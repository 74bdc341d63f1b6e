use serde_derive::{Deserialize, Serialize};

use super::maneuver::Maneuver;
use super::RequestKind;

/// Operating mode reported by the vehicle supervisor.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum OpMode {
    Service,
    Calibration,
    Error,
    Maneuver,
    ExternalControl,
    Boot,
}

/// Periodic state of the vehicle supervisor.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct VehicleState {
    pub op_mode: OpMode,
    /// Bitfield of VehicleState::FLAG_* values.
    pub flags: u8,
    /// Estimated time to finish the active maneuver, in seconds.
    pub maneuver_eta: u16,
    pub last_error: String,
    /// Time the last error was reported, negative when none was.
    pub last_error_time: f64,
    /// Comma separated labels of entities currently in error.
    pub error_ents: String,
}

impl VehicleState {
    /// The active maneuver finished.
    pub const FLAG_MANEUVER_DONE: u8 = 0x01;

    pub fn maneuver_done(&self) -> bool {
        self.flags & Self::FLAG_MANEUVER_DONE != 0
    }
}

impl Default for VehicleState {
    fn default() -> Self {
        Self {
            op_mode: OpMode::Boot,
            flags: 0,
            maneuver_eta: 0xFFFF,
            last_error: String::new(),
            last_error_time: -1.0,
            error_ents: String::new(),
        }
    }
}

/// Command accepted by the vehicle supervisor.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum VcCommand {
    ExecManeuver,
    StopManeuver,
    StartCalibration,
    StopCalibration,
}

impl std::fmt::Display for VcCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VcCommand::ExecManeuver => write!(f, "execute maneuver"),
            VcCommand::StopManeuver => write!(f, "stop maneuver"),
            VcCommand::StartCalibration => write!(f, "start calibration"),
            VcCommand::StopCalibration => write!(f, "stop calibration"),
        }
    }
}

/// Request to, or reply from, the vehicle supervisor.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct VehicleCommand {
    pub kind: RequestKind,
    pub command: VcCommand,
    /// Correlates a reply with its request.
    pub request_id: u16,
    pub maneuver: Option<Maneuver>,
    /// Expected calibration duration, only meaningful for StartCalibration.
    pub calib_time: u16,
    pub info: String,
}
