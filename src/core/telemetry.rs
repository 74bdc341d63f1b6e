use serde_derive::{Deserialize, Serialize};

/// Navigation solution of the own vehicle.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EstimatedState {
    /// Latitude in radians.
    pub lat: f64,
    /// Longitude in radians.
    pub lon: f64,
    /// Depth below the surface in meters.
    pub depth: f32,
}

impl EstimatedState {
    /// Whether a position fix was ever received.
    pub fn has_fix(&self) -> bool {
        self.lat != 0.0 || self.lon != 0.0
    }
}

impl Default for EstimatedState {
    fn default() -> Self {
        Self {
            lat: 0.0,
            lon: 0.0,
            depth: 0.0,
        }
    }
}

/// State of the maneuver currently under control.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum McsState {
    Executing,
    Done,
    Error,
    Stopped,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ManeuverControlState {
    pub state: McsState,
    /// Estimated seconds to completion, 0xFFFF when unknown.
    pub eta: u16,
    pub info: String,
}

impl Default for ManeuverControlState {
    fn default() -> Self {
        Self {
            state: McsState::Stopped,
            eta: 0xFFFF,
            info: String::new(),
        }
    }
}

/// Identity of a software component on the vehicle.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EntityInfo {
    /// Entity address within its system.
    pub id: u8,
    pub label: String,
    pub component: String,
}

/// Activation state of an entity.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActivationState {
    Inactive,
    Active,
    ActivationInProgress,
    DeactivationInProgress,
    Failed,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EntityActivationState {
    pub state: ActivationState,
    pub error: String,
}

/// Battery level estimate.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FuelLevel {
    /// Remaining capacity in percent.
    pub value: f32,
    /// Confidence of the estimate in percent.
    pub confidence: f32,
}
