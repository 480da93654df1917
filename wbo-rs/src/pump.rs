//! Pump cell current control, 500 Hz.
//!
//! Holds the Nernst cell at its reference voltage by driving the pump
//! cell; the resulting pump current encodes lambda. Below operating
//! temperature the loop stays off, except for a narrow window where a
//! small alternating current probes whether a sensor is connected at all.

use shared::wbo_hal::{HeaterState, PumpDac, Sampler};

use crate::f_abs;
use crate::pid::{Pid, PidConfig};

pub const PUMP_CONTROL_PERIOD_MS: u32 = 2;

pub const NERNST_TARGET_V: f32 = 0.45;

/// Pump actuation starts this far below the heater target temperature.
pub const START_PUMP_TEMP_OFFSET_C: f32 = 200.0;

/// Sensor presence detection runs between this offset and the pump start.
pub const START_SENSOR_DETECTION_TEMP_OFFSET_C: f32 = 300.0;

const DETECT_HALF_CYCLE_TICKS: u32 = 25;
const DETECT_FULL_CYCLE_TICKS: u32 = 50;
const DETECT_CURRENT_UA: f32 = 1000.0;
const DETECT_AMPLITUDE_THRESHOLD_V: f32 = 0.1;

const PUMP_PID: PidConfig = PidConfig {
    kp: 50.0,
    ki: 10_000.0,
    kd: 0.0,
    clamp: 10.0,
};

/// Wiggles the pump current and watches the Nernst voltage follow. A
/// connected cell responds with a measurable peak-to-peak amplitude, an
/// open connector does not.
#[derive(Debug, Default)]
struct SensorDetector {
    cycle: u32,
    completed_cycles: u32,
    nernst_hi: f32,
    nernst_lo: f32,
    max_amplitude: f32,
}

impl SensorDetector {
    fn feed(&mut self, sampler: &dyn Sampler, dac: &mut dyn PumpDac) {
        if self.cycle < DETECT_HALF_CYCLE_TICKS {
            dac.set_current_target_ua(DETECT_CURRENT_UA);
            self.nernst_hi = sampler.nernst_dc();
        } else {
            dac.set_current_target_ua(-DETECT_CURRENT_UA);
            self.nernst_lo = sampler.nernst_dc();
        }

        self.cycle += 1;
        if self.cycle >= DETECT_FULL_CYCLE_TICKS {
            let amplitude = f_abs(self.nernst_hi - self.nernst_lo);
            if amplitude > self.max_amplitude {
                self.max_amplitude = amplitude;
            }

            self.cycle = 0;
            self.completed_cycles += 1;
        }
    }

    fn reset(&mut self) {
        *self = Self::default();
    }

    fn sensor_present(&self) -> bool {
        self.completed_cycles > 0 && self.max_amplitude > DETECT_AMPLITUDE_THRESHOLD_V
    }
}

pub struct PumpController {
    pid: Pid,
    detector: SensorDetector,
}

impl PumpController {
    pub fn new() -> Self {
        Self {
            pid: Pid::new(PUMP_PID, PUMP_CONTROL_PERIOD_MS),
            detector: SensorDetector::default(),
        }
    }

    pub fn update(
        &mut self,
        sampler: &dyn Sampler,
        dac: &mut dyn PumpDac,
        heater_state: HeaterState,
        heater_target_temp_c: f32,
        pump_gain_adjust: f32,
    ) {
        let sensor_temp_c = sampler.sensor_temperature_c();

        // Only actuate the pump when the sensor is hot enough not to be
        // damaged by it
        if heater_state == HeaterState::ClosedLoop
            || sensor_temp_c >= heater_target_temp_c - START_PUMP_TEMP_OFFSET_C
        {
            let nernst_v = sampler.nernst_dc();
            let target_ma = pump_gain_adjust * self.pid.update(NERNST_TARGET_V, nernst_v);

            dac.set_current_target_ua(target_ma * 1000.0);
        } else if sensor_temp_c >= heater_target_temp_c - START_SENSOR_DETECTION_TEMP_OFFSET_C {
            self.detector.feed(sampler, dac);
        } else {
            self.detector.reset();
            dac.set_current_target_ua(0.0);
        }
    }

    pub fn sensor_present(&self) -> bool {
        self.detector.sensor_present()
    }
}
