use crate::core::{Maneuver, RequestKind, VcCommand, VehicleCommand};

/// Seconds the vehicle has to reply to a command.
pub const REPLY_TIMEOUT: f64 = 2.5;

/// Request/reply bookkeeping towards the vehicle supervisor.
///
/// At most one vehicle command is in flight at a time; the engine queues
/// anything that would overlap. The request counter wraps, which is safe for
/// the same reason, and is bumped on invalidation so a late reply can never
/// match a newer request.
pub struct VehicleDialog {
    counter: u16,
    deadline: Option<f64>,
    command: Option<VcCommand>,
}

impl VehicleDialog {
    pub fn new() -> Self {
        Self {
            counter: 0,
            deadline: None,
            command: None,
        }
    }

    /// Build the next vehicle request and arm the reply deadline.
    pub fn request(
        &mut self,
        command: VcCommand,
        maneuver: Option<Maneuver>,
        calib_time: u16,
        now: f64,
    ) -> VehicleCommand {
        self.counter = self.counter.wrapping_add(1);
        self.deadline = Some(now + REPLY_TIMEOUT);
        self.command = Some(command);

        VehicleCommand {
            kind: RequestKind::Request,
            command,
            request_id: self.counter,
            maneuver,
            calib_time,
            info: String::new(),
        }
    }

    /// Match a reply against the in-flight request.
    ///
    /// The caller has already verified the envelope is addressed to the
    /// engine. Replies for another request id are ignored, as is anything
    /// while no request is in flight. An IN_PROGRESS reply leaves the
    /// deadline intact. A FAILURE on a stop-calibration request is reported
    /// as success; that command is issued defensively.
    pub fn on_reply(&mut self, vc: &VehicleCommand) -> Option<Result<(), String>> {
        if vc.kind == RequestKind::Request {
            return None;
        }

        if !self.pending() || vc.request_id != self.counter {
            return None;
        }

        if vc.kind == RequestKind::InProgress {
            return None;
        }

        self.deadline = None;
        let command = self.command.take();

        if vc.kind == RequestKind::Failure {
            if command == Some(VcCommand::StopCalibration) {
                log::debug!("Stop calibration refused: {}", vc.info);
                return Some(Ok(()));
            }

            return Some(Err(vc.info.clone()));
        }

        Some(Ok(()))
    }

    pub fn pending(&self) -> bool {
        self.deadline.is_some()
    }

    /// Whether the in-flight request ran out of time. A reply arriving at
    /// the deadline itself is still accepted.
    pub fn timed_out(&self, now: f64) -> bool {
        matches!(self.deadline, Some(deadline) if now > deadline)
    }

    /// Seconds until the in-flight request runs out of time.
    pub fn deadline_remaining(&self, now: f64) -> Option<f64> {
        self.deadline.map(|deadline| (deadline - now).max(0.0))
    }

    /// Drop the in-flight request and invalidate any late reply to it.
    pub fn invalidate(&mut self) {
        self.counter = self.counter.wrapping_add(1);
        self.deadline = None;
        self.command = None;
    }
}

impl Default for VehicleDialog {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reply(kind: RequestKind, command: VcCommand, request_id: u16) -> VehicleCommand {
        VehicleCommand {
            kind,
            command,
            request_id,
            maneuver: None,
            calib_time: 0,
            info: "nope".to_owned(),
        }
    }

    #[test]
    fn request_ids_are_monotonic() {
        let mut dialog = VehicleDialog::new();

        let first = dialog.request(VcCommand::StopManeuver, None, 0, 0.0);
        dialog.invalidate();
        let second = dialog.request(VcCommand::StopManeuver, None, 0, 0.0);

        assert_eq!(second.request_id, first.request_id + 2);
        assert!(dialog.pending());
    }

    #[test]
    fn reply_must_match_request_id() {
        let mut dialog = VehicleDialog::new();
        let request = dialog.request(VcCommand::ExecManeuver, None, 0, 0.0);

        assert!(dialog
            .on_reply(&reply(
                RequestKind::Success,
                VcCommand::ExecManeuver,
                request.request_id + 1
            ))
            .is_none());
        assert!(dialog.pending());

        assert_eq!(
            dialog.on_reply(&reply(
                RequestKind::Success,
                VcCommand::ExecManeuver,
                request.request_id
            )),
            Some(Ok(()))
        );
        assert!(!dialog.pending());
    }

    #[test]
    fn in_progress_keeps_the_deadline() {
        let mut dialog = VehicleDialog::new();
        let request = dialog.request(VcCommand::ExecManeuver, None, 0, 10.0);

        assert!(dialog
            .on_reply(&reply(
                RequestKind::InProgress,
                VcCommand::ExecManeuver,
                request.request_id
            ))
            .is_none());

        assert!(dialog.pending());
        assert!(dialog.timed_out(10.0 + REPLY_TIMEOUT + 0.1));
    }

    #[test]
    fn deadline_is_inclusive() {
        let mut dialog = VehicleDialog::new();
        dialog.request(VcCommand::ExecManeuver, None, 0, 10.0);

        assert!(!dialog.timed_out(10.0 + REPLY_TIMEOUT));
        assert!(dialog.timed_out(10.0 + REPLY_TIMEOUT + 0.001));
    }

    #[test]
    fn stop_calibration_failure_is_downgraded() {
        let mut dialog = VehicleDialog::new();
        let request = dialog.request(VcCommand::StopCalibration, None, 0, 0.0);

        assert_eq!(
            dialog.on_reply(&reply(
                RequestKind::Failure,
                VcCommand::StopCalibration,
                request.request_id
            )),
            Some(Ok(()))
        );
    }

    #[test]
    fn failure_carries_the_vehicle_info() {
        let mut dialog = VehicleDialog::new();
        let request = dialog.request(VcCommand::ExecManeuver, None, 0, 0.0);

        assert_eq!(
            dialog.on_reply(&reply(
                RequestKind::Failure,
                VcCommand::ExecManeuver,
                request.request_id
            )),
            Some(Err("nope".to_owned()))
        );
    }

    #[test]
    fn replies_without_pending_request_are_ignored() {
        let mut dialog = VehicleDialog::new();

        assert!(dialog
            .on_reply(&reply(RequestKind::Success, VcCommand::ExecManeuver, 1))
            .is_none());
    }
}
