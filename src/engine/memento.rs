use std::collections::VecDeque;

use crate::core::{Memento, PlanMemento, PlanSpecification};

/// Number of plan snapshots kept for resume pairing.
const SNAPSHOT_LIMIT: usize = 8;

/// Pairs resume tokens from the vehicle with the plan they belong to.
///
/// Every plan start registers a snapshot under its plan reference. A memento
/// arriving later names that reference; the handler turns it into a
/// PlanMemento carrying the plan id of the snapshot. Mementos for references
/// that were never registered, or that aged out, are discarded.
pub struct MementoHandler {
    snapshots: VecDeque<(u32, PlanSpecification)>,
}

impl MementoHandler {
    pub fn new() -> Self {
        Self {
            snapshots: VecDeque::new(),
        }
    }

    /// Register the plan starting under the given reference.
    pub fn add(&mut self, plan_ref: u32, spec: PlanSpecification) {
        self.snapshots.push_back((plan_ref, spec));

        while self.snapshots.len() > SNAPSHOT_LIMIT {
            self.snapshots.pop_front();
        }
    }

    /// Turn a vehicle memento into a persistable plan memento.
    pub fn process(&self, memento: &Memento) -> Option<PlanMemento> {
        let spec = self
            .snapshots
            .iter()
            .find(|(plan_ref, _)| *plan_ref == memento.plan_ref)
            .map(|(_, spec)| spec)?;

        Some(PlanMemento {
            id: memento.id.clone(),
            plan_id: spec.plan_id.clone(),
            maneuver_id: memento.maneuver_id.clone(),
            memento: memento.memento.clone(),
        })
    }
}

impl Default for MementoHandler {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(plan_id: &str) -> PlanSpecification {
        PlanSpecification {
            plan_id: plan_id.to_owned(),
            ..Default::default()
        }
    }

    fn memento(plan_ref: u32) -> Memento {
        Memento {
            id: "m1".to_owned(),
            plan_ref,
            maneuver_id: "b".to_owned(),
            memento: vec![0xAA, 0xBB],
        }
    }

    #[test]
    fn pairs_memento_with_its_snapshot() {
        let mut handler = MementoHandler::new();
        handler.add(3, spec("survey"));

        let produced = handler.process(&memento(3)).unwrap();

        assert_eq!(produced.plan_id, "survey");
        assert_eq!(produced.maneuver_id, "b");
        assert_eq!(produced.memento, vec![0xAA, 0xBB]);
    }

    #[test]
    fn unknown_reference_is_discarded() {
        let mut handler = MementoHandler::new();
        handler.add(3, spec("survey"));

        assert!(handler.process(&memento(4)).is_none());
    }

    #[test]
    fn old_snapshots_age_out() {
        let mut handler = MementoHandler::new();

        for plan_ref in 1..=SNAPSHOT_LIMIT as u32 + 1 {
            handler.add(plan_ref, spec("survey"));
        }

        assert!(handler.process(&memento(1)).is_none());
        assert!(handler.process(&memento(2)).is_some());
    }
}
