pub use self::control::{
    EntityState, EntityStateKind, LastOutcome, LoggingControl, LoggingOp, Memento, PlanArg,
    PlanControl, PlanControlState, PlanDb, PlanDbArg, PlanDbOp, PlanDbType, PlanOp, PlanState,
    PowerOp, PowerOperation, RegisterManeuver, RequestKind, StatusCode,
};
pub use self::maneuver::{
    Goto, IdleManeuver, Loiter, Maneuver, ManeuverKind, SpeedUnits, StationKeeping, ZUnits,
};
pub use self::plan::{
    PlanManeuver, PlanMemento, PlanSpecification, PlanStatistics, PlanTransition,
    TransitionCondition,
};
pub use self::telemetry::{
    ActivationState, EntityActivationState, EntityInfo, EstimatedState, FuelLevel,
    ManeuverControlState, McsState,
};
pub use self::vehicle::{OpMode, VcCommand, VehicleCommand, VehicleState};

mod control;
mod maneuver;
mod plan;
mod telemetry;
mod vehicle;

use serde_derive::{Deserialize, Serialize};

/// Address of any system or entity on the bus.
pub const ADDR_ANY: u16 = 0xFFFF;
/// Entity address of any entity within a system.
pub const ENTITY_ANY: u8 = 0xFF;

/// Message exchanged on the vehicle bus.
///
/// Every message kind the engine consumes or emits is a variant of this sum.
/// Consumers match on the variant which guarantees that a newly added message
/// kind cannot go unhandled.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Message {
    EntityState(EntityState),
    EntityInfo(EntityInfo),
    EntityActivationState(EntityActivationState),
    LoggingControl(LoggingControl),
    FuelLevel(FuelLevel),
    PowerOperation(PowerOperation),
    EstimatedState(EstimatedState),
    ManeuverControlState(ManeuverControlState),
    RegisterManeuver(RegisterManeuver),
    VehicleState(VehicleState),
    VehicleCommand(VehicleCommand),
    PlanSpecification(PlanSpecification),
    PlanDb(PlanDb),
    PlanControl(PlanControl),
    PlanControlState(PlanControlState),
    Memento(Memento),
    PlanMemento(PlanMemento),
}

impl Message {
    /// Stable 16-bit identifier of the message kind.
    pub fn kind(&self) -> u16 {
        match self {
            Message::EntityState(_) => 1,
            Message::EntityInfo(_) => 3,
            Message::EntityActivationState(_) => 14,
            Message::LoggingControl(_) => 102,
            Message::FuelLevel(_) => 279,
            Message::PowerOperation(_) => 308,
            Message::EstimatedState(_) => 350,
            Message::ManeuverControlState(_) => 470,
            Message::RegisterManeuver(_) => 469,
            Message::VehicleState(_) => 500,
            Message::VehicleCommand(_) => 501,
            Message::PlanSpecification(_) => 551,
            Message::PlanDb(_) => 556,
            Message::PlanControl(_) => 559,
            Message::PlanControlState(_) => 560,
            Message::Memento(_) => 580,
            Message::PlanMemento(_) => 581,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Message::EntityState(_) => "EntityState",
            Message::EntityInfo(_) => "EntityInfo",
            Message::EntityActivationState(_) => "EntityActivationState",
            Message::LoggingControl(_) => "LoggingControl",
            Message::FuelLevel(_) => "FuelLevel",
            Message::PowerOperation(_) => "PowerOperation",
            Message::EstimatedState(_) => "EstimatedState",
            Message::ManeuverControlState(_) => "ManeuverControlState",
            Message::RegisterManeuver(_) => "RegisterManeuver",
            Message::VehicleState(_) => "VehicleState",
            Message::VehicleCommand(_) => "VehicleCommand",
            Message::PlanSpecification(_) => "PlanSpecification",
            Message::PlanDb(_) => "PlanDb",
            Message::PlanControl(_) => "PlanControl",
            Message::PlanControlState(_) => "PlanControlState",
            Message::Memento(_) => "Memento",
            Message::PlanMemento(_) => "PlanMemento",
        }
    }
}

/// A message together with its bus addressing.
///
/// Telemetry entering the engine is consumed by value; no envelope outlives
/// the handler it is passed to.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    /// Source system address.
    pub src: u16,
    /// Source entity within the source system.
    pub src_ent: u8,
    /// Destination system address.
    pub dst: u16,
    /// Destination entity within the destination system.
    pub dst_ent: u8,
    /// Time of dispatch in seconds since the UNIX epoch.
    pub timestamp: f64,
    pub body: Message,
}

impl Envelope {
    /// Envelope addressed to every system on the bus.
    pub fn broadcast(src: u16, src_ent: u8, timestamp: f64, body: Message) -> Self {
        Self {
            src,
            src_ent,
            dst: ADDR_ANY,
            dst_ent: ENTITY_ANY,
            timestamp,
            body,
        }
    }

    /// Envelope addressed to a single system and entity.
    pub fn to(
        src: u16,
        src_ent: u8,
        dst: u16,
        dst_ent: u8,
        timestamp: f64,
        body: Message,
    ) -> Self {
        Self {
            src,
            src_ent,
            dst,
            dst_ent,
            timestamp,
            body,
        }
    }
}
