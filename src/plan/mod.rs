use std::collections::{HashMap, HashSet, VecDeque};

use crate::core::{
    ActivationState, EntityActivationState, EntityInfo, EstimatedState, ManeuverControlState,
    ManeuverKind, PlanManeuver, PlanSpecification, PlanStatistics, SpeedUnits,
    TransitionCondition, VehicleState,
};
use crate::math::surface_distance;

pub mod fuel;

mod calibration;

use self::calibration::Calibration;
use self::fuel::{FuelPredictor, ManeuverDraw};

/// Propeller revolutions that correspond to one meter per second.
const RPM_PER_MPS: f64 = 1600.0;

/// A plan specification was rejected.
#[derive(Debug, PartialEq, Eq)]
pub struct ParseError(String);

impl ParseError {
    fn new(cause: impl Into<String>) -> Self {
        Self(cause.into())
    }
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for ParseError {}

/// Per-maneuver execution estimate derived at parse time.
struct Estimate {
    /// Estimated duration in seconds, if computable.
    duration: Option<f64>,
    /// Commanded horizontal speed in meters per second, if computable.
    speed: Option<f64>,
}

/// Navigable model of the plan under execution.
///
/// Owns the parsed specification, the execution estimates, the calibration
/// tracker and the fuel predictor. The model has no channel back to its
/// owner; every method is a plain call that returns what the caller needs.
pub struct PlanModel {
    compute_progress: bool,
    predict_fuel: bool,
    min_calibration_time: f64,
    spec: Option<PlanSpecification>,
    estimates: HashMap<String, Estimate>,
    total_duration: Option<f64>,
    completed: HashSet<String>,
    completed_duration: f64,
    current: Option<String>,
    done: bool,
    last_progress: f32,
    calibration: Calibration,
    fuel: FuelPredictor,
}

impl PlanModel {
    pub fn new(compute_progress: bool, predict_fuel: bool, min_calibration_time: f64) -> Self {
        Self {
            compute_progress,
            predict_fuel,
            min_calibration_time,
            spec: None,
            estimates: HashMap::new(),
            total_duration: None,
            completed: HashSet::new(),
            completed_duration: 0.0,
            current: None,
            done: false,
            last_progress: -1.0,
            calibration: Calibration::new(min_calibration_time),
            fuel: FuelPredictor::new(),
        }
    }

    /// Parse a plan specification into a navigable graph and derive its
    /// statistics. On failure the model is left cleared.
    pub fn parse(
        &mut self,
        spec: &PlanSpecification,
        supported_maneuvers: &HashSet<u16>,
        entities: &HashMap<String, EntityInfo>,
        imu_enabled: bool,
        state: &EstimatedState,
    ) -> Result<PlanStatistics, ParseError> {
        self.clear();

        if spec.maneuvers.is_empty() {
            return Err(ParseError::new("plan has no maneuvers"));
        }

        let mut ids = HashSet::new();
        for pm in &spec.maneuvers {
            if !ids.insert(pm.maneuver_id.as_str()) {
                return Err(ParseError::new(format!(
                    "duplicate maneuver id: {}",
                    pm.maneuver_id
                )));
            }

            if !supported_maneuvers.contains(&pm.data.kind.kind_id()) {
                return Err(ParseError::new(format!(
                    "maneuver type not supported: {}",
                    pm.data.kind.name()
                )));
            }

            for label in &pm.required_entities {
                if !entities.contains_key(label) {
                    return Err(ParseError::new(format!("unknown entity: {}", label)));
                }
            }
        }

        if !ids.contains(spec.start_man_id.as_str()) {
            return Err(ParseError::new(format!(
                "start maneuver not found: {}",
                spec.start_man_id
            )));
        }

        for transition in &spec.transitions {
            for endpoint in [&transition.source, &transition.destination] {
                if !ids.contains(endpoint.as_str()) {
                    return Err(ParseError::new(format!(
                        "transition references unknown maneuver: {}",
                        endpoint
                    )));
                }
            }
        }

        // Every maneuver must be connected to the start. Maneuvers ahead of
        // the start are the execution, maneuvers leading up to it are
        // history a resumed plan skipped; anything else is dead graph.
        let ahead = walk(spec, spec.start_man_id.as_str(), false);
        let behind = walk(spec, spec.start_man_id.as_str(), true);

        for pm in &spec.maneuvers {
            if !ahead.contains(pm.maneuver_id.as_str())
                && !behind.contains(pm.maneuver_id.as_str())
            {
                return Err(ParseError::new(format!(
                    "unreachable maneuver: {}",
                    pm.maneuver_id
                )));
            }
        }

        let distance = self.estimate(spec, state);

        let total: Option<f64> = self
            .estimates
            .values()
            .map(|e| e.duration)
            .sum::<Option<f64>>();
        self.total_duration = total;

        let mut statistics = PlanStatistics {
            plan_id: spec.plan_id.clone(),
            distance: distance as f32,
            duration: total.unwrap_or(-1.0) as f32,
            maneuver_count: spec.maneuvers.len() as u16,
            fuel_usage: None,
            fuel_remaining: None,
        };

        if self.predict_fuel {
            let draws: Vec<ManeuverDraw> = spec
                .maneuvers
                .iter()
                .map(|pm| {
                    let estimate = &self.estimates[&pm.maneuver_id];
                    ManeuverDraw {
                        duration: estimate.duration,
                        speed: estimate.speed,
                    }
                })
                .collect();

            statistics.fuel_usage = self.fuel.predict(&draws, imu_enabled);
            statistics.fuel_remaining = self.fuel.remaining();
        }

        self.spec = Some(spec.clone());

        Ok(statistics)
    }

    /// Derive per-maneuver estimates, chaining target positions in
    /// declaration order. Returns the total travel distance.
    fn estimate(&mut self, spec: &PlanSpecification, state: &EstimatedState) -> f64 {
        let mut position = state.has_fix().then_some((state.lat, state.lon));
        let mut total_distance = 0.0;

        for pm in &spec.maneuvers {
            let estimate = match &pm.data.kind {
                ManeuverKind::Goto(goto) => {
                    let distance = travel(&mut position, goto.lat, goto.lon);
                    total_distance += distance;

                    let speed = speed_mps(goto.speed, goto.speed_units);
                    Estimate {
                        duration: speed.map(|v| distance / v),
                        speed,
                    }
                }
                ManeuverKind::Loiter(loiter) => {
                    let distance = travel(&mut position, loiter.lat, loiter.lon);
                    total_distance += distance;

                    let speed = speed_mps(loiter.speed, loiter.speed_units);
                    Estimate {
                        duration: bounded(loiter.duration)
                            .map(|d| d + speed.map(|v| distance / v).unwrap_or(0.0)),
                        speed,
                    }
                }
                ManeuverKind::StationKeeping(sk) => {
                    let distance = travel(&mut position, sk.lat, sk.lon);
                    total_distance += distance;

                    let speed = speed_mps(sk.speed, sk.speed_units);
                    Estimate {
                        duration: bounded(sk.duration)
                            .map(|d| d + speed.map(|v| distance / v).unwrap_or(0.0)),
                        speed,
                    }
                }
                ManeuverKind::Idle(idle) => Estimate {
                    duration: bounded(idle.duration),
                    speed: None,
                },
            };

            self.estimates.insert(pm.maneuver_id.clone(), estimate);
        }

        total_distance
    }

    pub fn is_loaded(&self) -> bool {
        self.spec.is_some()
    }

    /// The maneuver execution starts at.
    pub fn load_start_maneuver(&self) -> Option<PlanManeuver> {
        let spec = self.spec.as_ref()?;
        spec.maneuver(&spec.start_man_id).cloned()
    }

    /// Successor of the maneuver that just finished.
    ///
    /// Among the transitions leaving the finished maneuver whose condition
    /// holds, the first in declaration order wins. No matching transition
    /// means the plan is complete.
    pub fn load_next_maneuver(&self) -> Option<PlanManeuver> {
        let spec = self.spec.as_ref()?;
        let current = self.current.as_deref()?;

        spec.transitions
            .iter()
            .find(|t| t.source == current && condition_holds(t.condition))
            .and_then(|t| spec.maneuver(&t.destination).cloned())
    }

    pub fn maneuver_started(&mut self, id: &str) {
        self.current = Some(id.to_owned());
    }

    /// Account for the completion of the active maneuver. Idempotent per
    /// maneuver; the completion may be signalled through more than one path.
    pub fn maneuver_done(&mut self) {
        let Some(current) = self.current.clone() else {
            return;
        };

        if !self.completed.insert(current.clone()) {
            return;
        }

        if let Some(estimate) = self.estimates.get(&current) {
            self.completed_duration += estimate.duration.unwrap_or(0.0);
        }

        if self.load_next_maneuver().is_none() {
            self.done = true;
        }
    }

    pub fn is_done(&self) -> bool {
        self.done
    }

    pub fn current_id(&self) -> &str {
        self.current.as_deref().unwrap_or("")
    }

    /// Plan progress in percent, monotonically non-decreasing within one
    /// execution. Negative when progress is disabled or not computable.
    pub fn update_progress(&mut self, mcs: &ManeuverControlState) -> f32 {
        if !self.compute_progress || self.spec.is_none() {
            return -1.0;
        }

        let Some(total) = self.total_duration.filter(|t| *t > 0.0) else {
            return -1.0;
        };

        let mut elapsed = self.completed_duration;

        // Add what the vehicle reports of the active maneuver.
        if let Some(current) = &self.current {
            if !self.completed.contains(current) && mcs.eta != 0xFFFF {
                if let Some(duration) = self.estimates.get(current).and_then(|e| e.duration) {
                    elapsed += (duration - f64::from(mcs.eta)).clamp(0.0, duration);
                }
            }
        }

        let progress = ((elapsed / total * 100.0) as f32).clamp(0.0, 100.0);

        self.last_progress = progress.max(self.last_progress);
        self.last_progress
    }

    /// Estimated seconds until the plan completes.
    pub fn eta(&self) -> f64 {
        if self.done {
            return 0.0;
        }

        match self.total_duration {
            Some(total) if self.last_progress >= 0.0 => {
                total * f64::from(100.0 - self.last_progress) / 100.0
            }
            Some(total) => total - self.completed_duration,
            None => 0.0,
        }
    }

    pub fn update_calibration(&mut self, vs: &VehicleState) {
        self.calibration.update(vs);
    }

    pub fn calibration_started(&mut self, now: f64) {
        self.calibration.start(now);
    }

    pub fn is_calibration_done(&self, now: f64) -> bool {
        self.calibration.is_done(now)
    }

    pub fn has_calibration_failed(&self) -> bool {
        self.calibration.has_failed()
    }

    pub fn calibration_info(&self, now: f64) -> String {
        self.calibration.info(now)
    }

    pub fn estimated_calibration_time(&self, now: f64) -> f64 {
        self.calibration.estimated_time(now)
    }

    /// Judge an entity activation report against the plan requirements.
    ///
    /// Fails only when the plan requires the entity to be active and the
    /// activation reports a hard error.
    pub fn on_entity_activation_state(
        &self,
        label: &str,
        msg: &EntityActivationState,
    ) -> Result<(), String> {
        let Some(spec) = &self.spec else {
            return Ok(());
        };

        let required = spec
            .maneuvers
            .iter()
            .any(|pm| pm.required_entities.iter().any(|l| l == label));

        if required && msg.state == ActivationState::Failed {
            Err(msg.error.clone())
        } else {
            Ok(())
        }
    }

    pub fn on_fuel_level(&mut self, level: &crate::core::FuelLevel) {
        self.fuel.on_fuel_level(level);
    }

    /// Reset the execution bookkeeping for a fresh run.
    pub fn plan_started(&mut self) {
        self.completed.clear();
        self.completed_duration = 0.0;
        self.current = None;
        self.done = false;
        self.last_progress = -1.0;
        self.calibration = Calibration::new(self.min_calibration_time);
    }

    pub fn plan_stopped(&mut self) {
        log::debug!("Plan stopped at {:.1}%", self.last_progress);
    }

    /// Drop the loaded plan.
    pub fn clear(&mut self) {
        self.spec = None;
        self.estimates.clear();
        self.total_duration = None;
        self.plan_started();
    }
}

/// Whether a transition may be taken once its source maneuver finished
/// without error. The engine only follows transitions at that point, so
/// every condition kind currently holds.
fn condition_holds(condition: TransitionCondition) -> bool {
    matches!(
        condition,
        TransitionCondition::Always | TransitionCondition::ManeuverDone
    )
}

/// Maneuver ids connected to `from` by transitions, following edges forward
/// or in reverse.
fn walk<'a>(spec: &'a PlanSpecification, from: &'a str, reverse: bool) -> HashSet<&'a str> {
    let mut seen = HashSet::new();
    let mut frontier = VecDeque::from([from]);

    while let Some(id) = frontier.pop_front() {
        if !seen.insert(id) {
            continue;
        }

        for transition in &spec.transitions {
            let (here, there) = if reverse {
                (&transition.destination, &transition.source)
            } else {
                (&transition.source, &transition.destination)
            };

            if here == id {
                frontier.push_back(there.as_str());
            }
        }
    }

    seen
}

fn bounded(duration: u16) -> Option<f64> {
    (duration > 0).then_some(f64::from(duration))
}

fn speed_mps(speed: f32, units: SpeedUnits) -> Option<f64> {
    match units {
        SpeedUnits::MetersPs if speed > 0.0 => Some(f64::from(speed)),
        SpeedUnits::Rpm if speed > 0.0 => Some(f64::from(speed) / RPM_PER_MPS),
        _ => None,
    }
}

fn travel(position: &mut Option<(f64, f64)>, lat: f64, lon: f64) -> f64 {
    let distance = match position {
        Some((from_lat, from_lon)) => surface_distance(*from_lat, *from_lon, lat, lon),
        None => 0.0,
    };

    *position = Some((lat, lon));
    distance
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Goto, IdleManeuver, Maneuver, McsState, PlanTransition, ZUnits};

    fn goto(lat_deg: f64, lon_deg: f64, speed: f32) -> Maneuver {
        Maneuver::new(ManeuverKind::Goto(Goto {
            lat: lat_deg.to_radians(),
            lon: lon_deg.to_radians(),
            z: 2.0,
            z_units: ZUnits::Depth,
            speed,
            speed_units: SpeedUnits::MetersPs,
        }))
    }

    fn maneuver(id: &str, data: Maneuver) -> PlanManeuver {
        PlanManeuver {
            maneuver_id: id.to_owned(),
            data,
            required_entities: vec![],
        }
    }

    fn transition(source: &str, destination: &str) -> PlanTransition {
        PlanTransition {
            source: source.to_owned(),
            destination: destination.to_owned(),
            condition: TransitionCondition::ManeuverDone,
        }
    }

    fn two_leg_plan() -> PlanSpecification {
        PlanSpecification {
            plan_id: "survey".to_owned(),
            start_man_id: "a".to_owned(),
            maneuvers: vec![
                maneuver("a", goto(41.0, -8.0, 1.0)),
                maneuver("b", goto(41.01, -8.0, 1.0)),
            ],
            transitions: vec![transition("a", "b")],
            source_entity: 0,
        }
    }

    fn supported() -> HashSet<u16> {
        [450, 453, 455, 461].into_iter().collect()
    }

    fn state_at(lat_deg: f64, lon_deg: f64) -> EstimatedState {
        EstimatedState {
            lat: lat_deg.to_radians(),
            lon: lon_deg.to_radians(),
            depth: 0.0,
        }
    }

    fn model(compute_progress: bool) -> PlanModel {
        PlanModel::new(compute_progress, true, 10.0)
    }

    #[test]
    fn parse_accepts_a_sound_plan() {
        let mut model = model(true);

        let statistics = model
            .parse(
                &two_leg_plan(),
                &supported(),
                &HashMap::new(),
                false,
                &state_at(41.0, -8.0),
            )
            .unwrap();

        assert_eq!(statistics.maneuver_count, 2);
        assert!(statistics.duration > 0.0);
        assert!(statistics.distance > 1000.0);
        assert!(model.is_loaded());
    }

    #[test]
    fn parse_rejects_unsupported_maneuver() {
        let mut model = model(false);
        let only_goto: HashSet<u16> = [450].into_iter().collect();

        let mut plan = two_leg_plan();
        plan.maneuvers.push(maneuver(
            "c",
            Maneuver::new(ManeuverKind::Idle(IdleManeuver { duration: 5 })),
        ));
        plan.transitions.push(transition("b", "c"));

        let err = model
            .parse(&plan, &only_goto, &HashMap::new(), false, &state_at(41.0, -8.0))
            .unwrap_err();

        assert_eq!(err.to_string(), "maneuver type not supported: IdleManeuver");
        assert!(!model.is_loaded());
    }

    #[test]
    fn parse_rejects_unknown_entity() {
        let mut model = model(false);

        let mut plan = two_leg_plan();
        plan.maneuvers[0].required_entities.push("Sidescan".to_owned());

        let err = model
            .parse(&plan, &supported(), &HashMap::new(), false, &state_at(41.0, -8.0))
            .unwrap_err();

        assert_eq!(err.to_string(), "unknown entity: Sidescan");
    }

    #[test]
    fn parse_rejects_bad_start_and_bad_transitions() {
        let mut model = model(false);

        let mut plan = two_leg_plan();
        plan.start_man_id = "nope".to_owned();
        assert!(model
            .parse(&plan, &supported(), &HashMap::new(), false, &state_at(41.0, -8.0))
            .is_err());

        let mut plan = two_leg_plan();
        plan.transitions.push(transition("b", "ghost"));
        assert!(model
            .parse(&plan, &supported(), &HashMap::new(), false, &state_at(41.0, -8.0))
            .is_err());
    }

    #[test]
    fn parse_rejects_unreachable_maneuver() {
        let mut model = model(false);

        let mut plan = two_leg_plan();
        plan.maneuvers.push(maneuver("island", goto(42.0, -8.0, 1.0)));

        let err = model
            .parse(&plan, &supported(), &HashMap::new(), false, &state_at(41.0, -8.0))
            .unwrap_err();

        assert_eq!(err.to_string(), "unreachable maneuver: island");
    }

    #[test]
    fn graph_walk_and_completion() {
        let mut model = model(false);
        model
            .parse(
                &two_leg_plan(),
                &supported(),
                &HashMap::new(),
                false,
                &state_at(41.0, -8.0),
            )
            .unwrap();
        model.plan_started();

        let start = model.load_start_maneuver().unwrap();
        assert_eq!(start.maneuver_id, "a");
        model.maneuver_started("a");

        model.maneuver_done();
        assert!(!model.is_done());

        let next = model.load_next_maneuver().unwrap();
        assert_eq!(next.maneuver_id, "b");
        model.maneuver_started("b");

        model.maneuver_done();
        assert!(model.is_done());
    }

    #[test]
    fn first_declared_transition_wins() {
        let mut model = model(false);

        let mut plan = two_leg_plan();
        plan.maneuvers.push(maneuver("c", goto(41.02, -8.0, 1.0)));
        // Two transitions leave "a"; the one declared first is taken.
        plan.transitions.insert(0, transition("a", "c"));
        plan.transitions.push(transition("c", "b"));

        model
            .parse(&plan, &supported(), &HashMap::new(), false, &state_at(41.0, -8.0))
            .unwrap();
        model.plan_started();
        model.maneuver_started("a");
        model.maneuver_done();

        assert_eq!(model.load_next_maneuver().unwrap().maneuver_id, "c");
    }

    #[test]
    fn resumed_plan_may_start_mid_graph() {
        let mut model = model(false);

        // A resumed plan points its start past the maneuvers already flown.
        let mut plan = two_leg_plan();
        plan.start_man_id = "b".to_owned();

        model
            .parse(&plan, &supported(), &HashMap::new(), false, &state_at(41.0, -8.0))
            .unwrap();

        assert_eq!(model.load_start_maneuver().unwrap().maneuver_id, "b");
    }

    #[test]
    fn progress_disabled_returns_negative() {
        let mut model = model(false);
        model
            .parse(
                &two_leg_plan(),
                &supported(),
                &HashMap::new(),
                false,
                &state_at(41.0, -8.0),
            )
            .unwrap();

        assert_eq!(model.update_progress(&ManeuverControlState::default()), -1.0);
    }

    #[test]
    fn progress_with_unknown_duration_returns_negative() {
        let mut model = model(true);

        let mut plan = two_leg_plan();
        // Unbounded idle has no duration estimate.
        plan.maneuvers.push(maneuver(
            "c",
            Maneuver::new(ManeuverKind::Idle(IdleManeuver { duration: 0 })),
        ));
        plan.transitions.push(transition("b", "c"));

        model
            .parse(&plan, &supported(), &HashMap::new(), false, &state_at(41.0, -8.0))
            .unwrap();

        assert_eq!(model.update_progress(&ManeuverControlState::default()), -1.0);
    }

    #[test]
    fn progress_is_monotonic() {
        let mut model = model(true);
        model
            .parse(
                &two_leg_plan(),
                &supported(),
                &HashMap::new(),
                false,
                &state_at(40.99, -8.0),
            )
            .unwrap();
        model.plan_started();
        model.maneuver_started("a");

        let early = model.update_progress(&ManeuverControlState {
            state: McsState::Executing,
            eta: 100,
            info: String::new(),
        });
        assert!(early >= 0.0);

        model.maneuver_done();
        model.maneuver_started("b");

        let later = model.update_progress(&ManeuverControlState {
            state: McsState::Executing,
            eta: 0xFFFF,
            info: String::new(),
        });
        assert!(later >= early);

        // A stale report cannot move progress backwards.
        let stale = model.update_progress(&ManeuverControlState {
            state: McsState::Executing,
            eta: 0xFFFF,
            info: String::new(),
        });
        assert!(stale >= later);

        model.maneuver_done();
        assert!(model.is_done());
        assert_eq!(model.eta(), 0.0);
    }

    #[test]
    fn required_entity_failure_is_reported() {
        let mut model = model(false);

        let mut plan = two_leg_plan();
        plan.maneuvers[0].required_entities.push("IMU".to_owned());

        let entities: HashMap<String, EntityInfo> = [(
            "IMU".to_owned(),
            EntityInfo {
                id: 42,
                label: "IMU".to_owned(),
                component: "Sensors.IMU".to_owned(),
            },
        )]
        .into_iter()
        .collect();

        model
            .parse(&plan, &supported(), &entities, false, &state_at(41.0, -8.0))
            .unwrap();

        let failed = EntityActivationState {
            state: ActivationState::Failed,
            error: "no power".to_owned(),
        };

        assert_eq!(
            model.on_entity_activation_state("IMU", &failed),
            Err("no power".to_owned())
        );

        // Failures of entities the plan does not need are not fatal.
        assert_eq!(model.on_entity_activation_state("Camera", &failed), Ok(()));

        let active = EntityActivationState {
            state: ActivationState::Active,
            error: String::new(),
        };
        assert_eq!(model.on_entity_activation_state("IMU", &active), Ok(()));
    }
}
