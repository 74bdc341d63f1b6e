use crate::core::{OpMode, VehicleState};

/// Tracks the pre-execution calibration procedure.
///
/// Calibration counts down from a configured minimum once started. It only
/// completes when the countdown elapsed while the vehicle is actually in
/// CALIBRATION mode; a vehicle error reported during calibration marks the
/// procedure failed.
pub struct Calibration {
    /// Minimum calibration duration in seconds.
    min_time: f64,
    started_at: Option<f64>,
    last_op_mode: Option<OpMode>,
    failure: Option<String>,
}

impl Calibration {
    pub fn new(min_time: f64) -> Self {
        Self {
            min_time,
            started_at: None,
            last_op_mode: None,
            failure: None,
        }
    }

    /// Begin the countdown.
    pub fn start(&mut self, now: f64) {
        self.started_at = Some(now);
        self.failure = None;
    }

    /// Track the vehicle state while calibrating.
    pub fn update(&mut self, vs: &VehicleState) {
        self.last_op_mode = Some(vs.op_mode);

        if self.started_at.is_none() || self.failure.is_some() {
            return;
        }

        if vs.op_mode == OpMode::Calibration
            && vs.last_error_time >= 0.0
            && !vs.last_error.is_empty()
        {
            self.failure = Some(vs.last_error.clone());
        }
    }

    pub fn is_done(&self, now: f64) -> bool {
        match self.started_at {
            Some(started) => {
                self.failure.is_none()
                    && now - started >= self.min_time
                    && self.last_op_mode == Some(OpMode::Calibration)
            }
            None => false,
        }
    }

    pub fn has_failed(&self) -> bool {
        self.failure.is_some()
    }

    pub fn info(&self, now: f64) -> String {
        if let Some(failure) = &self.failure {
            return format!("calibration failed: {}", failure);
        }

        match self.started_at {
            Some(started) => {
                let left = (self.min_time - (now - started)).max(0.0);
                format!("calibrating, {:.0}s left", left)
            }
            None => "calibration not started".to_owned(),
        }
    }

    /// Expected calibration duration from this point on.
    pub fn estimated_time(&self, now: f64) -> f64 {
        match self.started_at {
            Some(started) => (self.min_time - (now - started)).max(0.0),
            None => self.min_time,
        }
    }
}
