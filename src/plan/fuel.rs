use crate::core::FuelLevel;

/// Battery percentage that must be left untouched by a plan.
pub const RESERVE_PERCENT: f32 = 5.0;

/// Usable battery capacity in watt hours.
const BATTERY_CAPACITY_WH: f64 = 1400.0;
/// Baseline electronics draw in watts.
const HOTEL_LOAD_W: f64 = 35.0;
/// Additional draw of the inertial measurement unit in watts.
const IMU_LOAD_W: f64 = 15.0;
/// Propulsion draw at one meter per second in watts.
const MOTION_LOAD_W: f64 = 18.0;

/// Estimated execution of a single maneuver, input to the predictor.
#[derive(Clone, Debug)]
pub struct ManeuverDraw {
    /// Estimated duration in seconds, if known.
    pub duration: Option<f64>,
    /// Commanded speed in meters per second, if known. Unknown speed is
    /// treated as a stationary maneuver.
    pub speed: Option<f64>,
}

fn motion_power(speed: f64) -> f64 {
    MOTION_LOAD_W * speed.powi(3)
}

/// Predicts battery draw of a plan against the live fuel telemetry.
pub struct FuelPredictor {
    level: Option<FuelLevel>,
    usage: Option<f32>,
}

impl FuelPredictor {
    pub fn new() -> Self {
        Self {
            level: None,
            usage: None,
        }
    }

    /// Feed the last observed battery level.
    pub fn on_fuel_level(&mut self, level: &FuelLevel) {
        self.level = Some(level.clone());
    }

    /// Predict the battery draw of a plan as a percentage of capacity.
    ///
    /// Returns nothing when any maneuver has an unknown duration; a plan of
    /// unbounded length has no meaningful prediction.
    pub fn predict(&mut self, draws: &[ManeuverDraw], imu_enabled: bool) -> Option<f32> {
        let hotel = if imu_enabled {
            HOTEL_LOAD_W + IMU_LOAD_W
        } else {
            HOTEL_LOAD_W
        };

        let mut energy_wh = 0.0;
        for draw in draws {
            let duration = draw.duration?;
            let power = hotel + draw.speed.map(motion_power).unwrap_or(0.0);

            energy_wh += duration * power / 3600.0;
        }

        let usage = (energy_wh / BATTERY_CAPACITY_WH * 100.0) as f32;
        self.usage = Some(usage);

        Some(usage)
    }

    /// Predicted battery percentage left after the plan.
    pub fn remaining(&self) -> Option<f32> {
        let level = self.level.as_ref()?;

        self.usage.map(|usage| level.value - usage)
    }

    /// Whether the predicted draw leaves the battery above the reserve.
    pub fn sufficient(&self) -> Option<bool> {
        self.remaining().map(|left| left > RESERVE_PERCENT)
    }
}

impl Default for FuelPredictor {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn level(value: f32) -> FuelLevel {
        FuelLevel {
            value,
            confidence: 90.0,
        }
    }

    #[test]
    fn unknown_duration_voids_prediction() {
        let mut predictor = FuelPredictor::new();

        let draws = [
            ManeuverDraw {
                duration: Some(600.0),
                speed: Some(1.2),
            },
            ManeuverDraw {
                duration: None,
                speed: None,
            },
        ];

        assert_eq!(predictor.predict(&draws, false), None);
    }

    #[test]
    fn imu_raises_the_hotel_load() {
        let draws = [ManeuverDraw {
            duration: Some(3600.0),
            speed: Some(1.0),
        }];

        let mut predictor = FuelPredictor::new();
        let without_imu = predictor.predict(&draws, false).unwrap();
        let with_imu = predictor.predict(&draws, true).unwrap();

        assert!(with_imu > without_imu);

        // One hour at 15 W more is one percent of a 1.4 kWh pack.
        assert!((with_imu - without_imu - 15.0 / 14.0).abs() < 1e-3);
    }

    #[test]
    fn remaining_needs_fuel_telemetry() {
        let draws = [ManeuverDraw {
            duration: Some(3600.0),
            speed: Some(1.0),
        }];

        let mut predictor = FuelPredictor::new();
        predictor.predict(&draws, false).unwrap();

        assert_eq!(predictor.remaining(), None);

        predictor.on_fuel_level(&level(50.0));

        let left = predictor.remaining().unwrap();
        assert!(left < 50.0 && left > 40.0);
        assert_eq!(predictor.sufficient(), Some(true));

        predictor.on_fuel_level(&level(4.0));
        assert_eq!(predictor.sufficient(), Some(false));
    }
}
