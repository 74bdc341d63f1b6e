use serde_derive::{Deserialize, Serialize};

use super::maneuver::Maneuver;
use super::plan::{PlanMemento, PlanSpecification, PlanStatistics};

/// Direction and outcome of a request/reply pair.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum RequestKind {
    Request,
    Success,
    Failure,
    InProgress,
}

/// Plan control operation.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlanOp {
    Start,
    Stop,
    Load,
    Get,
}

impl std::fmt::Display for PlanOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PlanOp::Start => write!(f, "start plan"),
            PlanOp::Stop => write!(f, "stop plan"),
            PlanOp::Load => write!(f, "load plan"),
            PlanOp::Get => write!(f, "get plan"),
        }
    }
}

/// Argument of a plan control request or reply.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum PlanArg {
    Spec(PlanSpecification),
    Memento(PlanMemento),
    Maneuver(Maneuver),
    Statistics(PlanStatistics),
}

/// Operator request to start, stop, load or fetch a plan.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PlanControl {
    pub kind: RequestKind,
    pub op: PlanOp,
    pub request_id: u16,
    pub plan_id: String,
    /// Bitfield of PlanControl::FLG_* values.
    pub flags: u16,
    pub arg: Option<PlanArg>,
    pub info: String,
}

impl PlanControl {
    /// Calibrate the vehicle before execution.
    pub const FLG_CALIBRATE: u16 = 0x0001;

    pub fn request(op: PlanOp, request_id: u16, plan_id: impl Into<String>) -> Self {
        Self {
            kind: RequestKind::Request,
            op,
            request_id,
            plan_id: plan_id.into(),
            flags: 0,
            arg: None,
            info: String::new(),
        }
    }
}

/// Externally published engine state.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlanState {
    Blocked,
    Ready,
    Initializing,
    Executing,
}

impl std::fmt::Display for PlanState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PlanState::Blocked => write!(f, "BLOCKED"),
            PlanState::Ready => write!(f, "READY"),
            PlanState::Initializing => write!(f, "INITIALIZING"),
            PlanState::Executing => write!(f, "EXECUTING"),
        }
    }
}

/// Outcome of the last finished plan.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum LastOutcome {
    None,
    Success,
    Failure,
}

/// Periodic report of the engine state.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PlanControlState {
    pub state: PlanState,
    pub plan_id: String,
    /// Estimated seconds until plan completion.
    pub plan_eta: i32,
    /// Plan progress in percent, negative when unavailable.
    pub plan_progress: f32,
    pub man_id: String,
    /// Kind identifier of the active maneuver, 0xFFFF when none.
    pub man_type: u16,
    /// Estimated seconds until maneuver completion.
    pub man_eta: i32,
    pub last_outcome: LastOutcome,
}

impl Default for PlanControlState {
    fn default() -> Self {
        Self {
            state: PlanState::Ready,
            plan_id: String::new(),
            plan_eta: 0,
            plan_progress: -1.0,
            man_id: String::new(),
            man_type: 0xFFFF,
            man_eta: 0,
            last_outcome: LastOutcome::None,
        }
    }
}

/// Record kind in the plan database.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlanDbType {
    Plan,
    Memento,
}

/// Plan database operation.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlanDbOp {
    Set,
    Get,
    Del,
    Clear,
}

/// Argument of a plan database request or reply.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum PlanDbArg {
    Spec(PlanSpecification),
    Memento(PlanMemento),
}

/// Externally initiated operation on the plan database.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PlanDb {
    pub kind: RequestKind,
    pub op: PlanDbOp,
    pub request_id: u16,
    pub object_type: PlanDbType,
    pub object_id: String,
    pub arg: Option<PlanDbArg>,
    pub info: String,
}

/// Power state change notification.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum PowerOp {
    PowerDownInProgress,
    PowerDownAborted,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PowerOperation {
    pub op: PowerOp,
}

/// Announcement of a supported maneuver kind.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RegisterManeuver {
    /// Kind identifier of the maneuver.
    pub mid: u16,
}

/// Opaque resume token reported by a maneuver controller.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Memento {
    pub id: String,
    /// Reference of the plan execution the token belongs to.
    pub plan_ref: u32,
    /// Maneuver the token resumes at.
    pub maneuver_id: String,
    pub memento: Vec<u8>,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum LoggingOp {
    RequestStart,
    RequestStop,
}

/// Request towards the logging subsystem.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LoggingControl {
    pub op: LoggingOp,
    pub name: String,
}

/// Coarse health of the engine entity.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum EntityStateKind {
    Boot,
    Normal,
    Error,
}

/// Qualifier of the entity state.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum StatusCode {
    Init,
    Active,
    DbError,
    PowerDown,
}

/// Health report towards the supervising task manager.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EntityState {
    pub state: EntityStateKind,
    pub code: StatusCode,
}
