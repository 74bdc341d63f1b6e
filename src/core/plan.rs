use serde_derive::{Deserialize, Serialize};

use super::maneuver::Maneuver;

/// Condition guarding a plan transition.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransitionCondition {
    /// Taken whenever the source maneuver finished.
    Always,
    /// Taken when the source maneuver finished without error.
    ManeuverDone,
}

/// Directed edge in the plan graph.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PlanTransition {
    /// Maneuver id the transition leaves from.
    pub source: String,
    /// Maneuver id the transition leads to.
    pub destination: String,
    pub condition: TransitionCondition,
}

/// A named node of the plan graph.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PlanManeuver {
    /// Identifier unique within the plan.
    pub maneuver_id: String,
    pub data: Maneuver,
    /// Entity labels that must be active while this maneuver runs.
    #[serde(default)]
    pub required_entities: Vec<String>,
}

/// An ordered graph of maneuvers with a designated start.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PlanSpecification {
    pub plan_id: String,
    /// Maneuver id execution starts at.
    pub start_man_id: String,
    pub maneuvers: Vec<PlanManeuver>,
    pub transitions: Vec<PlanTransition>,
    /// Entity that loaded the specification.
    #[serde(default)]
    pub source_entity: u8,
}

impl PlanSpecification {
    /// Look up a maneuver by id.
    pub fn maneuver(&self, id: &str) -> Option<&PlanManeuver> {
        self.maneuvers.iter().find(|pm| pm.maneuver_id == id)
    }

    pub fn maneuver_mut(&mut self, id: &str) -> Option<&mut PlanManeuver> {
        self.maneuvers.iter_mut().find(|pm| pm.maneuver_id == id)
    }
}

/// Opaque per-maneuver resume token bound to a plan.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PlanMemento {
    pub id: String,
    pub plan_id: String,
    /// Maneuver to resume the plan at.
    pub maneuver_id: String,
    pub memento: Vec<u8>,
}

/// Derived figures of a parsed plan. Computed once at parse time.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PlanStatistics {
    pub plan_id: String,
    /// Total travel distance in meters.
    pub distance: f32,
    /// Estimated execution duration in seconds, negative when unknown.
    pub duration: f32,
    pub maneuver_count: u16,
    /// Predicted battery draw as a percentage of capacity, if computable.
    pub fuel_usage: Option<f32>,
    /// Predicted battery percentage left after the plan, if computable.
    pub fuel_remaining: Option<f32>,
}

impl PlanStatistics {
    /// Whether the predicted draw leaves the battery above the reserve margin.
    pub fn fuel_sufficient(&self) -> Option<bool> {
        self.fuel_remaining.map(|left| left > crate::plan::fuel::RESERVE_PERCENT)
    }
}
