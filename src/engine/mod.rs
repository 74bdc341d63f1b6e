use std::collections::{HashMap, HashSet, VecDeque};
use std::rc::Rc;

use tokio::sync::mpsc;

use crate::bus::BusHandle;
use crate::config::{Config, EngineConfig};
use crate::core::{
    ActivationState, EntityActivationState, EntityInfo, EntityState, EntityStateKind, Envelope,
    EstimatedState, IdleManeuver, LastOutcome, LoggingControl, LoggingOp, Maneuver,
    ManeuverControlState, ManeuverKind, McsState, Memento, Message, OpMode, PlanArg, PlanControl,
    PlanControlState, PlanDb, PlanManeuver, PlanMemento, PlanOp, PlanSpecification, PlanState,
    PlanStatistics, PowerOp, PowerOperation, RegisterManeuver, RequestKind, SpeedUnits,
    StationKeeping, StatusCode, VcCommand, VehicleCommand, VehicleState, ZUnits,
};
use crate::plan::PlanModel;
use crate::store::{PlanStore, StoreError};
use crate::time::{Clock, Counter};

mod dialog;
mod memento;


use self::dialog::VehicleDialog;
use self::memento::MementoHandler;

/// Seconds of vehicle state silence before the engine blocks.
const VSTATE_TIMEOUT: f64 = 2.5;
/// Plan control requests held while a vehicle reply is outstanding.
const REQUEST_QUEUE_LIMIT: usize = 32;

/// Internal machine state.
///
/// The externally published state is a projection of this; see
/// [`EngineState::published`]. Only the engine itself moves between states.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum EngineState {
    /// Waiting for the plan database.
    Boot,
    /// Awaiting commands.
    Ready,
    /// Stopping a plan.
    Stopping,
    /// A plan start was accepted.
    StartActivation,
    /// Calibrating and activating payload.
    Activating,
    /// Dispatching the first maneuver.
    StartExecution,
    /// Executing a plan.
    Executing,
    /// No healthy vehicle to command.
    Blocked,
}

impl EngineState {
    /// Externally published projection of the machine state.
    pub fn published(self) -> PlanState {
        match self {
            EngineState::Boot | EngineState::Blocked => PlanState::Blocked,
            EngineState::Ready | EngineState::Stopping => PlanState::Ready,
            EngineState::StartActivation
            | EngineState::Activating
            | EngineState::StartExecution => PlanState::Initializing,
            EngineState::Executing => PlanState::Executing,
        }
    }
}

/// The plan engine.
///
/// Accepts mission plans, drives the vehicle through calibration and
/// execution, and keeps the rest of the system informed of its state. All
/// work happens on one cooperative loop; the only suspension point is the
/// bus wait in [`Engine::run`].
pub struct Engine {
    args: EngineConfig,
    system: u16,
    entity: u8,
    clock: Rc<dyn Clock>,
    bus: BusHandle,
    store: PlanStore,
    plan: PlanModel,
    dialog: VehicleDialog,
    memento_handler: MementoHandler,
    state: EngineState,
    pcs: PlanControlState,
    reply: PlanControl,
    reply_dst: (u16, u8),
    last_event: String,
    spec: PlanSpecification,
    supported_maneuvers: HashSet<u16>,
    entities: HashMap<String, EntityInfo>,
    imu_enabled: bool,
    requests: VecDeque<(u16, u8, PlanControl)>,
    plan_ref: u32,
    estate: EstimatedState,
    mcs: ManeuverControlState,
    report: Counter,
    last_vstate: f64,
    entity_state: (EntityStateKind, StatusCode),
}

impl Engine {
    pub fn new(config: &Config, store: PlanStore, bus: BusHandle, clock: Rc<dyn Clock>) -> Self {
        let args = config.engine.clone();
        let now = clock.now();

        let plan = PlanModel::new(
            args.compute_progress,
            args.fuel_prediction,
            f64::from(args.minimum_calibration_time),
        );

        let report_period = 1.0 / args.state_report_frequency.max(0.1);

        Self {
            args,
            system: config.system.address,
            entity: config.system.entity,
            clock,
            bus,
            store,
            plan,
            dialog: VehicleDialog::new(),
            memento_handler: MementoHandler::new(),
            state: EngineState::Boot,
            pcs: PlanControlState::default(),
            reply: PlanControl::request(PlanOp::Stop, 0, ""),
            reply_dst: (crate::core::ADDR_ANY, crate::core::ENTITY_ANY),
            last_event: String::new(),
            spec: PlanSpecification::default(),
            supported_maneuvers: HashSet::new(),
            entities: HashMap::new(),
            imu_enabled: false,
            requests: VecDeque::new(),
            plan_ref: 0,
            estate: EstimatedState::default(),
            mcs: ManeuverControlState::default(),
            report: Counter::new(report_period, now),
            last_vstate: now,
            entity_state: (EntityStateKind::Boot, StatusCode::Init),
        }
    }

    /// Run the engine until the bus closes.
    pub async fn run(mut self, mut inbox: mpsc::UnboundedReceiver<Envelope>) {
        self.set_initial_state();

        loop {
            let wait = self.poll();

            match tokio::time::timeout(std::time::Duration::from_secs_f64(wait), inbox.recv())
                .await
            {
                Ok(Some(envelope)) => self.consume(envelope),
                Ok(None) => {
                    log::debug!("Bus closed, engine stopping");
                    break;
                }
                Err(_) => {}
            }
        }
    }

    /// Publish the initial machine state.
    pub fn set_initial_state(&mut self) {
        self.pcs = PlanControlState::default();
        self.last_event = "initializing".to_owned();

        if self.store.is_open() {
            self.state = EngineState::Ready;
            self.set_entity_state(EntityStateKind::Normal, StatusCode::Active);
        } else {
            self.state = EngineState::Boot;
            self.set_entity_state(EntityStateKind::Error, StatusCode::DbError);
        }

        self.pcs.state = self.state.published();
        self.publish_pcs();

        let now = self.clock.now();
        self.last_vstate = now;
        self.report.reset(now);
    }

    /// Evaluate the timers. Returns how long the caller may block on the bus.
    pub fn poll(&mut self) -> f64 {
        let now = self.clock.now();

        if self.report.overflow(now) {
            if self.args.compute_progress {
                self.report_progress();
            }

            self.publish_pcs();
            self.report.reset(now);
        }

        if self.entity_state.0 == EntityStateKind::Normal
            && now - self.last_vstate > VSTATE_TIMEOUT
        {
            self.change_state(EngineState::Blocked, "vehicle state timeout", None);
            self.last_vstate = now;
        }

        if !self.dialog.pending() {
            if let Some((src, src_ent, pc)) = self.requests.pop_front() {
                self.process_request(src, src_ent, pc);
            }
        }

        if self.dialog.timed_out(now) {
            self.dialog.invalidate();
            self.on_failure("vehicle reply timeout");
            self.change_state(EngineState::Ready, "vehicle reply timeout", None);

            self.requests.clear();
            log::error!("Cleared all requests");
        }

        self.dialog
            .deadline_remaining(now)
            .map_or(1.0, |d| d.min(1.0))
            .max(0.01)
    }

    /// Consume one bus message.
    pub fn consume(&mut self, envelope: Envelope) {
        match envelope.body {
            Message::EstimatedState(msg) => {
                // Only the own navigation feed is of interest.
                if envelope.src == self.system {
                    self.estate = msg;
                }
            }
            Message::ManeuverControlState(msg) => {
                if msg.state == McsState::Done {
                    self.plan.maneuver_done();
                }
                self.mcs = msg;
            }
            Message::PowerOperation(msg) => {
                if envelope.dst == self.system {
                    self.on_power_operation(msg);
                }
            }
            Message::RegisterManeuver(msg) => self.on_register_maneuver(msg),
            Message::EntityInfo(msg) => {
                self.entities.insert(msg.label.clone(), msg);
            }
            Message::EntityActivationState(msg) => {
                self.on_entity_activation(envelope.src_ent, msg)
            }
            Message::FuelLevel(msg) => self.plan.on_fuel_level(&msg),
            Message::Memento(msg) => self.on_memento(msg),
            Message::PlanDb(msg) => {
                if msg.kind == RequestKind::Request {
                    self.on_plan_db(envelope.src, envelope.src_ent, msg);
                }
            }
            Message::VehicleCommand(msg) => {
                self.on_vehicle_reply(envelope.dst, envelope.dst_ent, msg)
            }
            Message::VehicleState(msg) => self.on_vehicle_state(msg),
            Message::PlanControl(msg) => self.on_plan_control(envelope.src, envelope.src_ent, msg),
            // Published by the engine itself.
            Message::PlanControlState(_)
            | Message::PlanSpecification(_)
            | Message::PlanMemento(_)
            | Message::LoggingControl(_)
            | Message::EntityState(_) => {}
        }
    }

    fn on_register_maneuver(&mut self, msg: RegisterManeuver) {
        self.supported_maneuvers.insert(msg.mid);
    }

    fn on_power_operation(&mut self, msg: PowerOperation) {
        match msg.op {
            PowerOp::PowerDownInProgress => {
                self.store.close();
                self.set_entity_state(EntityStateKind::Error, StatusCode::PowerDown);
            }
            PowerOp::PowerDownAborted => match self.store.open() {
                Ok(()) => self.set_entity_state(EntityStateKind::Normal, StatusCode::Active),
                Err(e) => {
                    log::error!("Failed to reopen plan store: {}", e);
                    self.set_entity_state(EntityStateKind::Error, StatusCode::DbError);
                }
            },
        }
    }

    fn on_plan_db(&mut self, src: u16, src_ent: u8, request: PlanDb) {
        match self.store.on_plan_db(&request) {
            Ok(reply) => {
                self.dispatch_to(src, src_ent, Message::PlanDb(reply));
                self.set_entity_state(EntityStateKind::Normal, StatusCode::Active);
            }
            Err(e) => {
                log::error!("Plan database failure: {}", e);
                self.set_entity_state(EntityStateKind::Error, StatusCode::DbError);
            }
        }
    }

    fn on_entity_activation(&mut self, src_ent: u8, msg: EntityActivationState) {
        if self
            .entities
            .get(&self.args.imu_entity_label)
            .map(|e| e.id)
            == Some(src_ent)
        {
            self.imu_enabled = msg.state == ActivationState::Active;
        }

        let Some(label) = self
            .entities
            .values()
            .find(|e| e.id == src_ent)
            .map(|e| e.label.clone())
        else {
            return;
        };

        if let Err(error) = self.plan.on_entity_activation_state(&label, &msg) {
            let error = format!("failed to activate {}: {}", label, error);

            if self.args.abort_on_failed_activation {
                self.on_failure(&error);

                // Stop calibration if any is running.
                if self.init_mode() && !self.dialog.pending() {
                    self.vehicle_request(VcCommand::StopCalibration, None);
                    self.reply.plan_id = self.spec.plan_id.clone();
                }

                self.change_state(EngineState::Ready, &error, None);
            } else {
                log::error!("{}", error);
            }
        }
    }

    fn on_memento(&mut self, msg: Memento) {
        let Some(pmem) = self.memento_handler.process(&msg) else {
            log::debug!("Discarding memento for unknown plan reference {}", msg.plan_ref);
            return;
        };

        if let Err(e) = self.store.store_memento(&pmem) {
            log::error!("Failed to persist memento {}: {}", pmem.id, e);
            self.set_entity_state(EntityStateKind::Error, StatusCode::DbError);
        }
    }

    fn on_vehicle_reply(&mut self, dst: u16, dst_ent: u8, vc: VehicleCommand) {
        if dst != self.system || dst_ent != self.entity {
            return;
        }

        let Some(outcome) = self.dialog.on_reply(&vc) else {
            return;
        };

        if self.init_mode() || self.exec_mode() {
            if let Err(info) = outcome {
                self.reply.plan_id = self.spec.plan_id.clone();
                self.on_failure(&info);
                self.change_state(EngineState::Ready, &info, None);
            }
        }
    }

    fn on_vehicle_state(&mut self, vs: VehicleState) {
        if self.entity_state.0 == EntityStateKind::Boot {
            return;
        }

        self.last_vstate = self.clock.now();

        match vs.op_mode {
            OpMode::Service => self.on_vehicle_service(&vs),
            OpMode::Error | OpMode::Boot => self.on_vehicle_error(&vs),
            OpMode::Maneuver => self.on_vehicle_maneuver(&vs),
            OpMode::Calibration | OpMode::ExternalControl => {}
        }

        if self.init_mode() {
            self.plan.update_calibration(&vs);

            let now = self.clock.now();
            if self.plan.is_calibration_done(now) {
                if vs.op_mode == OpMode::Calibration && !self.dialog.pending() {
                    let pman = self.plan.load_start_maneuver();
                    self.start_maneuver(pman);
                }
            } else if self.plan.has_calibration_failed() {
                let info = self.plan.calibration_info(now);
                self.reply.plan_id = self.spec.plan_id.clone();
                self.on_failure(&info);
                self.change_state(EngineState::Ready, &info, None);
            }
        }
    }

    fn on_vehicle_service(&mut self, vs: &VehicleState) {
        match self.pcs.state {
            PlanState::Blocked => self.change_state(EngineState::Ready, "vehicle ready", None),
            PlanState::Initializing => {
                if !self.dialog.pending() {
                    let pman = self.plan.load_start_maneuver();
                    self.start_maneuver(pman);
                }
            }
            PlanState::Executing => {
                if !self.dialog.pending() {
                    let info = vs.last_error.clone();
                    self.reply.plan_id = self.spec.plan_id.clone();
                    self.on_failure(&info);
                    self.change_state(EngineState::Ready, &info, None);
                }
            }
            PlanState::Ready => {}
        }
    }

    fn on_vehicle_maneuver(&mut self, vs: &VehicleState) {
        if !self.exec_mode() || self.dialog.pending() {
            return;
        }

        if vs.maneuver_done() {
            // The maneuver controller may not have reported completion yet.
            self.plan.maneuver_done();

            if self.plan.is_done() {
                self.vehicle_request(VcCommand::StopManeuver, None);

                self.reply.plan_id = self.spec.plan_id.clone();
                self.on_success("plan completed");
                self.pcs.last_outcome = LastOutcome::Success;
                self.change_state(EngineState::Ready, "plan completed", None);
            } else {
                let pman = self.plan.load_next_maneuver();
                self.start_maneuver(pman);
            }
        } else {
            self.pcs.man_eta = i32::from(vs.maneuver_eta);
        }
    }

    fn on_vehicle_error(&mut self, vs: &VehicleState) {
        let edesc = if vs.last_error_time < 0.0 {
            format!("vehicle errors: {}", vs.error_ents)
        } else {
            vs.last_error.clone()
        };

        if self.exec_mode() {
            self.reply.plan_id = self.spec.plan_id.clone();
            self.on_failure(&edesc);
        }

        // Only react to a fresh error description.
        if edesc != self.last_event && !self.dialog.pending() {
            if self.init_mode() {
                self.on_failure(&edesc);

                // Stop calibration if any is running.
                self.vehicle_request(VcCommand::StopCalibration, None);
                self.reply.plan_id = self.spec.plan_id.clone();
            }

            self.change_state(EngineState::Blocked, &edesc, None);
        }
    }

    fn on_plan_control(&mut self, src: u16, src_ent: u8, pc: PlanControl) {
        if pc.kind != RequestKind::Request {
            return;
        }

        if self.dialog.pending() {
            if self.requests.len() >= REQUEST_QUEUE_LIMIT {
                log::error!("Request queue full, refusing request {}", pc.request_id);

                let mut refusal = pc;
                refusal.kind = RequestKind::Failure;
                refusal.arg = None;
                refusal.info = "request queue full".to_owned();
                self.dispatch_to(src, src_ent, Message::PlanControl(refusal));
            } else {
                log::debug!("Queued request {}", pc.request_id);
                self.requests.push_back((src, src_ent, pc));
            }

            return;
        }

        if self.requests.is_empty() {
            self.process_request(src, src_ent, pc);
        } else {
            // Keep arrival order.
            self.requests.push_back((src, src_ent, pc));
            if let Some((src, src_ent, pc)) = self.requests.pop_front() {
                self.process_request(src, src_ent, pc);
            }
        }
    }

    fn process_request(&mut self, src: u16, src_ent: u8, mut pc: PlanControl) {
        self.reply_dst = (src, src_ent);
        self.reply = PlanControl {
            kind: RequestKind::Failure,
            op: pc.op,
            request_id: pc.request_id,
            plan_id: pc.plan_id.clone(),
            flags: 0,
            arg: None,
            info: String::new(),
        };

        log::info!("Request -- {} ({})", pc.op, pc.plan_id);

        if self.entity_state.0 != EntityStateKind::Normal {
            self.on_failure("engine not ready");
            return;
        }

        match pc.op {
            PlanOp::Start => {
                let arg = pc.arg.take();
                if !self.start_plan(&pc.plan_id, arg, pc.flags) {
                    self.vehicle_request(VcCommand::StopManeuver, None);
                }
            }
            PlanOp::Stop => {
                self.stop_plan(false);
            }
            PlanOp::Load => {
                let arg = pc.arg.take();
                self.load_plan(&pc.plan_id, arg, false);
            }
            PlanOp::Get => self.get_plan(),
        }
    }

    /// Start a plan. Returns false when a previously executing maneuver was
    /// superseded without being stopped.
    fn start_plan(&mut self, plan_id: &str, arg: Option<PlanArg>, flags: u16) -> bool {
        let stopped = self.stop_plan(true);

        self.change_state(
            EngineState::StartActivation,
            &format!("plan initializing: {}", plan_id),
            None,
        );

        if !self.load_plan(plan_id, arg, true) {
            return stopped;
        }

        let plan_id = self.spec.plan_id.clone();
        self.change_log(&plan_id);

        if self.init_mode() || self.exec_mode() {
            if !stopped {
                self.plan.plan_stopped();
            }

            self.plan.plan_started();
        }

        self.dispatch_broadcast(Message::PlanSpecification(self.spec.clone()));

        self.plan_ref = self.plan_ref.wrapping_add(1);
        self.memento_handler.add(self.plan_ref, self.spec.clone());

        if flags & PlanControl::FLG_CALIBRATE != 0 && self.args.perform_calibration {
            if !self.start_calibration() {
                return stopped;
            }

            let event = self.last_event.clone();
            self.on_success(&event);
        } else {
            let pman = self.plan.load_start_maneuver();
            self.start_maneuver(pman);

            let event = self.last_event.clone();
            if self.exec_mode() {
                self.on_success(&event);
            } else {
                self.on_failure(&event);
                return stopped;
            }
        }

        true
    }

    /// Stop the plan being executed, if any. With `plan_startup` the stop
    /// makes room for a new plan and no maneuver is stopped; the new plan
    /// supersedes the old one.
    fn stop_plan(&mut self, plan_startup: bool) -> bool {
        if self.init_mode() || self.exec_mode() {
            if !plan_startup {
                self.vehicle_request(VcCommand::StopManeuver, None);

                self.reply.plan_id = self.spec.plan_id.clone();
                self.on_success("plan stopped");
                self.pcs.last_outcome = LastOutcome::Failure;

                self.enter(EngineState::Stopping);
                self.change_state(EngineState::Ready, "plan stopped", None);
            } else {
                self.pcs.last_outcome = LastOutcome::Failure;
                log::debug!("Switching to new plan");
                return false;
            }
        } else if !plan_startup {
            self.on_failure("no plan running");
            self.reply.plan_id.clear();
        }

        true
    }

    /// Load a plan. With `plan_startup` the plan remains loaded for the
    /// start that follows; otherwise the model is cleared again and only the
    /// statistics remain.
    fn load_plan(&mut self, plan_id: &str, arg: Option<PlanArg>, plan_startup: bool) -> bool {
        // A load is rejected while a plan is active; a start supersedes it.
        if (self.init_mode() && !plan_startup) || self.exec_mode() {
            self.on_failure("cannot load plan now");
            return false;
        }

        if let Err(info) = self.parse_arg(plan_id, arg) {
            self.on_failure(&info);
            self.change_state(
                EngineState::Ready,
                &format!("plan load failed: {}", info),
                None,
            );
            return false;
        }

        let Some(statistics) = self.parse_plan(plan_startup) else {
            let info = self.reply.info.clone();
            self.change_state(
                EngineState::Ready,
                &format!("plan parse failed: {}", info),
                None,
            );
            return false;
        };

        self.reply.arg = Some(PlanArg::Statistics(statistics));
        self.reply.plan_id = self.spec.plan_id.clone();
        self.pcs.plan_id = self.spec.plan_id.clone();

        self.on_success("plan loaded");

        true
    }

    fn parse_plan(&mut self, plan_startup: bool) -> Option<PlanStatistics> {
        match self.plan.parse(
            &self.spec,
            &self.supported_maneuvers,
            &self.entities,
            self.imu_enabled,
            &self.estate,
        ) {
            Ok(statistics) => {
                if statistics.fuel_sufficient() == Some(false) {
                    log::warn!(
                        "Fuel may not last the plan, predicted remaining {:.1}%",
                        statistics.fuel_remaining.unwrap_or(0.0)
                    );
                }

                // Without a start to follow, the model is no longer needed.
                if !plan_startup {
                    self.plan.clear();
                }

                Some(statistics)
            }
            Err(e) => {
                self.on_failure(&e.to_string());
                self.plan.clear();
                None
            }
        }
    }

    fn get_plan(&mut self) {
        if self.spec.plan_id.is_empty() {
            self.on_failure("no plan loaded");
            return;
        }

        self.reply.arg = Some(PlanArg::Spec(self.spec.clone()));
        self.reply.plan_id = self.spec.plan_id.clone();
        self.on_success("OK");
    }

    /// Resolve the argument of a load or start into the current plan
    /// specification.
    fn parse_arg(&mut self, plan_id: &str, arg: Option<PlanArg>) -> Result<(), String> {
        match arg {
            Some(PlanArg::Spec(given)) => {
                self.spec = given;
                self.spec.source_entity = self.entity;

                if let Err(e) = self.store.store_plan(&self.spec) {
                    return self.db_failure(e);
                }

                Ok(())
            }
            Some(PlanArg::Memento(pmem)) => self.resume_from_memento(pmem),
            Some(PlanArg::Maneuver(man)) => {
                // A bare maneuver becomes a single-maneuver quick plan.
                let name = man.kind.name().to_owned();

                self.spec = PlanSpecification {
                    plan_id: plan_id.to_owned(),
                    start_man_id: name.clone(),
                    maneuvers: vec![PlanManeuver {
                        maneuver_id: name,
                        data: man,
                        required_entities: vec![],
                    }],
                    transitions: vec![],
                    source_entity: self.entity,
                };

                if let Err(e) = self.store.store_plan(&self.spec) {
                    return self.db_failure(e);
                }

                Ok(())
            }
            Some(PlanArg::Statistics(_)) => Err("unsupported plan control argument".to_owned()),
            None => match self.store.lookup_plan(plan_id) {
                Ok(Some(spec)) => {
                    self.spec = spec;
                    Ok(())
                }
                Ok(None) => match self.store.lookup_memento(plan_id) {
                    Ok(Some(pmem)) => self.resume_from_memento(pmem),
                    Ok(None) => Err(format!("undefined plan or memento: {}", plan_id)),
                    Err(e) => self.db_failure(e),
                },
                Err(e) => self.db_failure(e),
            },
        }
    }

    /// Load the memento's plan and point it at the resume maneuver.
    fn resume_from_memento(&mut self, pmem: PlanMemento) -> Result<(), String> {
        let spec = match self.store.lookup_plan(&pmem.plan_id) {
            Ok(Some(spec)) => spec,
            Ok(None) => return Err(format!("no such plan: {}", pmem.plan_id)),
            Err(e) => return self.db_failure(e),
        };

        self.spec = spec;
        self.spec.source_entity = self.entity;
        self.spec.start_man_id = pmem.maneuver_id.clone();

        match self.spec.maneuver_mut(&pmem.maneuver_id) {
            Some(pm) => pm.data.memento = Some(pmem.memento.clone()),
            None => {
                return Err(format!(
                    "could not find resume maneuver: {}",
                    pmem.maneuver_id
                ))
            }
        }

        log::warn!("Resuming with memento: {}", pmem.id);

        if let Err(e) = self.store.store_memento(&pmem) {
            return self.db_failure(e);
        }

        Ok(())
    }

    fn db_failure(&mut self, e: StoreError) -> Result<(), String> {
        log::error!("Plan database failure: {}", e);
        self.set_entity_state(EntityStateKind::Error, StatusCode::DbError);

        Err(format!("plan database error: {}", e))
    }

    /// Send the calibration filler maneuver to the vehicle: station keeping
    /// at the current position when configured, an unbounded idle otherwise.
    fn start_calibration(&mut self) -> bool {
        if self.blocked_mode() {
            self.on_failure("cannot initialize plan in BLOCKED state");
            return false;
        }

        let filler = if self.args.stationkeeping_while_calibrating {
            ManeuverKind::StationKeeping(StationKeeping {
                lat: self.estate.lat,
                lon: self.estate.lon,
                z: 0.0,
                z_units: ZUnits::Depth,
                radius: self.args.stationkeeping_radius,
                duration: 0,
                speed: self.args.stationkeeping_speed,
                speed_units: SpeedUnits::Rpm,
            })
        } else {
            ManeuverKind::Idle(IdleManeuver { duration: 0 })
        };

        self.vehicle_request(VcCommand::ExecManeuver, Some(Maneuver::new(filler)));
        self.plan.calibration_started(self.clock.now());
        self.enter(EngineState::Activating);

        true
    }

    fn start_maneuver(&mut self, pman: Option<PlanManeuver>) {
        let Some(mut pman) = pman else {
            let info = format!("{}: invalid maneuver ID", self.plan.current_id());
            self.change_state(EngineState::Ready, &info, None);
            return;
        };

        pman.data.plan_ref = self.plan_ref;

        self.enter(EngineState::StartExecution);
        self.vehicle_request(VcCommand::ExecManeuver, Some(pman.data.clone()));

        let man_type = pman.data.kind.kind_id();
        self.change_state(
            EngineState::Executing,
            &format!("{}: executing maneuver", pman.maneuver_id),
            Some((pman.maneuver_id.as_str(), man_type)),
        );

        self.plan.maneuver_started(&pman.maneuver_id);
    }

    fn vehicle_request(&mut self, command: VcCommand, maneuver: Option<Maneuver>) {
        let now = self.clock.now();

        let calib_time = if command == VcCommand::StartCalibration {
            self.plan.calibration_started(now);
            self.plan.estimated_calibration_time(now) as u16
        } else {
            0
        };

        let vc = self.dialog.request(command, maneuver, calib_time, now);

        log::debug!("Vehicle request {}: {}", vc.request_id, vc.command);
        self.dispatch_broadcast(Message::VehicleCommand(vc));
    }

    fn answer(&mut self, kind: RequestKind, info: &str) {
        self.reply.kind = kind;
        self.reply.info = info.to_owned();

        let (dst, dst_ent) = self.reply_dst;
        self.dispatch_to(dst, dst_ent, Message::PlanControl(self.reply.clone()));

        let line = format!("Reply -- {} ({}) -- {}", self.reply.op, self.reply.plan_id, info);
        if kind == RequestKind::Failure {
            log::error!("{}", line);
        } else {
            log::info!("{}", line);
        }
    }

    fn on_failure(&mut self, info: &str) {
        self.pcs.last_outcome = LastOutcome::Failure;
        self.pcs.plan_progress = -1.0;
        self.pcs.plan_eta = 0;

        self.answer(RequestKind::Failure, info);
    }

    fn on_success(&mut self, info: &str) {
        self.pcs.plan_progress = -1.0;
        self.pcs.plan_eta = 0;

        self.answer(RequestKind::Success, info);
    }

    /// Internal state hop without publication; the published projection is
    /// settled by the change_state call that follows.
    fn enter(&mut self, state: EngineState) {
        log::debug!("Now in {:?} state", state);
        self.state = state;
    }

    /// Move the machine, publishing the new state when its projection
    /// changed. Leaving a plan for any reason settles the plan bookkeeping
    /// and rotates the log.
    fn change_state(&mut self, to: EngineState, event: &str, maneuver: Option<(&str, u16)>) {
        log::warn!("{}", event);
        self.last_event = event.to_owned();

        if to != self.state {
            log::debug!("Now in {:?} state", to);
        }

        let published = to.published();
        if published != self.pcs.state {
            let was_in_plan = self.init_mode() || self.exec_mode();

            self.pcs.state = published;

            let is_in_plan = self.init_mode() || self.exec_mode();
            if was_in_plan && !is_in_plan {
                self.plan.plan_stopped();
                self.change_log("");
            }
        }

        self.state = to;

        match maneuver {
            Some((id, man_type)) => {
                self.pcs.man_id = id.to_owned();
                self.pcs.man_type = man_type;
            }
            None => {
                self.pcs.man_id.clear();
                self.pcs.man_type = 0xFFFF;
            }
        }

        self.publish_pcs();
    }

    fn report_progress(&mut self) {
        // Progress only means something while in a plan.
        if !self.exec_mode() && !self.init_mode() {
            return;
        }

        self.pcs.plan_progress = self.plan.update_progress(&self.mcs);
        self.pcs.plan_eta = self.plan.eta() as i32;
    }

    fn change_log(&self, name: &str) {
        self.dispatch_broadcast(Message::LoggingControl(LoggingControl {
            op: LoggingOp::RequestStart,
            name: name.to_owned(),
        }));
    }

    fn set_entity_state(&mut self, state: EntityStateKind, code: StatusCode) {
        if self.entity_state == (state, code) {
            return;
        }

        self.entity_state = (state, code);
        self.dispatch_broadcast(Message::EntityState(EntityState { state, code }));
    }

    fn publish_pcs(&self) {
        self.dispatch_broadcast(Message::PlanControlState(self.pcs.clone()));
    }

    fn dispatch_broadcast(&self, body: Message) {
        self.bus.publish(Envelope::broadcast(
            self.system,
            self.entity,
            self.clock.epoch(),
            body,
        ));
    }

    fn dispatch_to(&self, dst: u16, dst_ent: u8, body: Message) {
        self.bus.publish(Envelope::to(
            self.system,
            self.entity,
            dst,
            dst_ent,
            self.clock.epoch(),
            body,
        ));
    }

    fn blocked_mode(&self) -> bool {
        self.pcs.state == PlanState::Blocked
    }

    fn init_mode(&self) -> bool {
        self.pcs.state == PlanState::Initializing
    }

    fn exec_mode(&self) -> bool {
        self.pcs.state == PlanState::Executing
    }
}
