//! Pump current to lambda conversion.
//!
//! Each sensor variant has its own characteristic curve (pump cell current
//! in mA against lambda), taken from the Bosch datasheets. Between points
//! the curve is interpolated linearly; outside it is clamped.

use shared::wbo_hal::{HeaterState, SensorType};

use crate::f_abs;
use crate::interp::interpolate_clamped;
use crate::pump::NERNST_TARGET_V;

/// Lambda readings this far from the Nernst target are considered not
/// settled and therefore invalid.
const NERNST_VALID_BAND_V: f32 = 0.1;

/// The sensors are not characterized below this lambda.
const LAMBDA_VALID_MIN: f32 = 0.6;

const LSU49_CURVE: [(f32, f32); 24] = [
    (-2.0, 0.65),
    (-1.602, 0.7),
    (-1.243, 0.75),
    (-0.927, 0.8),
    (-0.8, 0.822),
    (-0.652, 0.85),
    (-0.405, 0.9),
    (-0.183, 0.95),
    (-0.106, 0.97),
    (-0.04, 0.99),
    (0.0, 1.003),
    (0.015, 1.01),
    (0.097, 1.05),
    (0.193, 1.1),
    (0.25, 1.132),
    (0.329, 1.179),
    (0.671, 1.429),
    (0.938, 1.701),
    (1.15, 2.0),
    (1.385, 2.434),
    (1.7, 3.413),
    (2.0, 5.391),
    (2.15, 7.506),
    (2.25, 10.119),
];

const LSU42_CURVE: [(f32, f32); 13] = [
    (-1.85, 0.7),
    (-1.08, 0.8),
    (-0.76, 0.85),
    (-0.47, 0.9),
    (-0.22, 0.95),
    (0.0, 1.009),
    (0.34, 1.18),
    (0.68, 1.43),
    (0.95, 1.7),
    (1.17, 2.0),
    (1.7, 3.5),
    (2.1, 5.0),
    (2.54, 10.0),
];

const LSUADV_CURVE: [(f32, f32); 19] = [
    (-2.15, 0.65),
    (-1.75, 0.7),
    (-1.35, 0.75),
    (-1.0, 0.8),
    (-0.7, 0.85),
    (-0.43, 0.9),
    (-0.2, 0.95),
    (0.0, 1.002),
    (0.1, 1.05),
    (0.2, 1.1),
    (0.35, 1.19),
    (0.7, 1.45),
    (0.95, 1.72),
    (1.15, 2.0),
    (1.4, 2.45),
    (1.7, 3.4),
    (2.0, 5.4),
    (2.2, 8.0),
    (2.3, 10.2),
];

pub fn lambda_for_pump_current(sensor: SensorType, pump_current_ma: f32) -> f32 {
    let curve: &[(f32, f32)] = match sensor {
        SensorType::Lsu49 => &LSU49_CURVE,
        SensorType::Lsu42 => &LSU42_CURVE,
        SensorType::LsuAdv => &LSUADV_CURVE,
    };

    interpolate_clamped(curve, pump_current_ma)
}

/// Lambda is only trusted once the heater regulates and the pump loop holds
/// the Nernst cell at its target.
pub fn lambda_is_valid(heater_state: HeaterState, nernst_dc_v: f32, lambda: f32) -> bool {
    heater_state == HeaterState::ClosedLoop
        && lambda >= LAMBDA_VALID_MIN
        && f_abs(nernst_dc_v - NERNST_TARGET_V) < NERNST_VALID_BAND_V
}
