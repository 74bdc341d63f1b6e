use serde_derive::{Deserialize, Serialize};

/// Vertical reference for a maneuver target.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ZUnits {
    Depth,
    Altitude,
    Height,
}

/// Unit of the commanded speed.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SpeedUnits {
    MetersPs,
    Rpm,
    Percentage,
}

/// Travel to a target point and finish on arrival.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Goto {
    /// Latitude in radians.
    pub lat: f64,
    /// Longitude in radians.
    pub lon: f64,
    pub z: f32,
    pub z_units: ZUnits,
    pub speed: f32,
    pub speed_units: SpeedUnits,
}

/// Circle a target point for a fixed duration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Loiter {
    pub lat: f64,
    pub lon: f64,
    pub z: f32,
    pub z_units: ZUnits,
    /// Loiter radius in meters.
    pub radius: f32,
    /// Duration in seconds, zero for unbounded.
    pub duration: u16,
    pub speed: f32,
    pub speed_units: SpeedUnits,
}

/// Hold the vehicle near a target point within a radius.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StationKeeping {
    pub lat: f64,
    pub lon: f64,
    pub z: f32,
    pub z_units: ZUnits,
    /// Keep-within radius in meters.
    pub radius: f32,
    /// Duration in seconds, zero for unbounded.
    pub duration: u16,
    pub speed: f32,
    pub speed_units: SpeedUnits,
}

/// Keep actuation at rest for a fixed duration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct IdleManeuver {
    /// Duration in seconds, zero for unbounded.
    pub duration: u16,
}

/// Typed maneuver payload.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum ManeuverKind {
    Goto(Goto),
    Loiter(Loiter),
    StationKeeping(StationKeeping),
    Idle(IdleManeuver),
}

impl ManeuverKind {
    /// Stable 16-bit identifier of the maneuver kind, as announced by the
    /// maneuver controllers through RegisterManeuver.
    pub fn kind_id(&self) -> u16 {
        match self {
            ManeuverKind::Goto(_) => 450,
            ManeuverKind::Idle(_) => 453,
            ManeuverKind::Loiter(_) => 455,
            ManeuverKind::StationKeeping(_) => 461,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ManeuverKind::Goto(_) => "Goto",
            ManeuverKind::Idle(_) => "IdleManeuver",
            ManeuverKind::Loiter(_) => "Loiter",
            ManeuverKind::StationKeeping(_) => "StationKeeping",
        }
    }
}

/// An atomic vehicle action.
///
/// Carries the plan reference of the execution it belongs to and, when the
/// plan was resumed, the opaque resume token for this maneuver kind.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Maneuver {
    /// Reference of the plan execution this maneuver is part of.
    pub plan_ref: u32,
    /// Opaque resume state, if the plan was started from a memento.
    pub memento: Option<Vec<u8>>,
    pub kind: ManeuverKind,
}

impl Maneuver {
    pub fn new(kind: ManeuverKind) -> Self {
        Self {
            plan_ref: 0,
            memento: None,
            kind,
        }
    }
}

impl From<ManeuverKind> for Maneuver {
    fn from(kind: ManeuverKind) -> Self {
        Self::new(kind)
    }
}
