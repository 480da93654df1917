//! Heater control, the safety-critical path.
//!
//! Runs at 1 kHz. Each tick reads the sampler, advances the state machine,
//! converts the requested effective voltage into a PWM duty against the
//! measured supply, and pushes it to the heater driver.

use shared::{
    wbo_hal::{HeaterAllow, HeaterPwm, HeaterState, Sampler, SensorType, Status},
    ControllerEntity,
};

use crate::config::HeaterSettings;
use crate::heater_fsm::{preheat::Preheat, HeaterFsm};
use crate::pid::{Pid, PidConfig};

pub const HEATER_CONTROL_PERIOD_MS: u32 = 1;

/// How long the supply must sit above the on-threshold before heating
/// auto-starts without an ECU command.
pub const HEATER_BATTERY_STAB_TIME_S: f32 = 0.5;

pub const HEATER_WARMUP_TIMEOUT_S: f32 = 60.0;
pub const HEATER_CLOSED_LOOP_STAB_TIME_S: f32 = 5.0;

/// Sustained out-of-band time before an over/underheat trips.
pub const HEATER_TEMP_FAULT_TIME_S: f32 = 0.5;

pub const HEATER_FAST_HEATING_THRESHOLD_C: f32 = 600.0;

pub const HEATER_DIDNT_HEAT_RETRY_S: f32 = 30.0;
pub const HEATER_OVERHEAT_RETRY_S: f32 = 30.0;
pub const HEATER_UNDERHEAT_RETRY_S: f32 = 10.0;

pub const HEATER_VOLTAGE_LIMIT_V: f32 = 12.0;
pub const PREHEAT_VOLTAGE_V: f32 = 2.0;
pub const CLOSED_LOOP_BASE_VOLTAGE_V: f32 = 7.5;

const SUPPLY_IMPLAUSIBLE_FLOOR_V: f32 = 3.0;
const SUPPLY_FALLBACK_V: f32 = 12.0;
const SUPPLY_OVERVOLTAGE_CUTOFF_V: f32 = 23.0;

const HEATER_PID: PidConfig = PidConfig {
    kp: 0.3,
    ki: 0.3,
    kd: 0.01,
    clamp: 3.0,
};

/// Where this board measures the heater supply from, in preference order:
/// a local divider on Heater-, a board-level supply sense ADC, or the
/// battery voltage the ECU reports over CAN.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupplySource {
    HeaterSense,
    BoardSense,
    RemoteBattery,
}

#[derive(Debug, Clone, Copy)]
pub struct HeaterBoardConfig {
    pub supply_source: SupplySource,
    /// Boards that sense the supply through the heater low-side need the
    /// PWM opened up periodically; the duty cap is applied every 10th tick.
    pub max_duty: Option<f32>,
}

impl HeaterBoardConfig {
    pub fn heater_sense() -> Self {
        Self {
            supply_source: SupplySource::HeaterSense,
            max_duty: None,
        }
    }
}

pub struct HeaterController {
    fsm: Option<ControllerEntity<HeaterFsm, HeaterController, HeaterState>>,
    pub(crate) pid: Pid,
    pub(crate) target_temp_c: f32,
    pub(crate) target_esr_ohm: f32,
    pub(crate) settings: HeaterSettings,
    board: HeaterBoardConfig,

    // Tick inputs, copied before the state machine runs
    pub(crate) sensor_temp_c: f32,
    pub(crate) sensor_esr_ohm: f32,
    pub(crate) heater_allowed: bool,

    // Tick outputs
    pub(crate) requested_volts: f32,
    pub(crate) status: Status,
    duty: f32,
    effective_volts: f32,

    supply_stable_time_s: f32,
    cycle: u32,
}

impl HeaterController {
    pub fn new(sensor: SensorType, settings: HeaterSettings, board: HeaterBoardConfig) -> Self {
        let mut controller = Self {
            fsm: None,
            pid: Pid::new(HEATER_PID, HEATER_CONTROL_PERIOD_MS),
            target_temp_c: sensor.target_temp_c(),
            target_esr_ohm: sensor.target_esr_ohm(),
            settings,
            board,
            sensor_temp_c: 0.0,
            sensor_esr_ohm: 0.0,
            heater_allowed: false,
            requested_volts: 0.0,
            status: Status::Preheat,
            duty: 0.0,
            effective_volts: 0.0,
            supply_stable_time_s: 0.0,
            cycle: 0,
        };

        let fsm = ControllerEntity::new(&mut controller, Preheat::new());
        controller.fsm = Some(fsm);

        controller
    }

    pub fn update(
        &mut self,
        sampler: &dyn Sampler,
        pwm: &mut dyn HeaterPwm,
        heater_allow: HeaterAllow,
        board_supply_v: Option<f32>,
        remote_battery_v: f32,
        dt: f32,
    ) {
        self.sensor_esr_ohm = sampler.sensor_esr_ohm();
        self.sensor_temp_c = sampler.sensor_temperature_c();

        let mut supply_v = match self.board.supply_source {
            SupplySource::HeaterSense => sampler.internal_heater_voltage_v(),
            SupplySource::BoardSense => board_supply_v.unwrap_or(0.0),
            SupplySource::RemoteBattery => remote_battery_v,
        };

        self.heater_allowed = self.resolve_heater_allow(heater_allow, supply_v, dt);

        if let Some(mut fsm) = self.fsm.take() {
            fsm.update(self, dt);
            self.fsm = Some(fsm);
        }

        let mut volts = self.requested_volts.min(HEATER_VOLTAGE_LIMIT_V);

        // An implausibly low measurement would otherwise explode the duty
        if supply_v < SUPPLY_IMPLAUSIBLE_FLOOR_V {
            supply_v = SUPPLY_FALLBACK_V;
        }

        let ratio = volts / supply_v;
        let mut duty = (ratio * ratio).min(1.0);

        self.cycle = self.cycle.wrapping_add(1);
        if let Some(max_duty) = self.board.max_duty {
            if self.cycle % 10 == 0 && duty > max_duty {
                duty = max_duty;
            }
        }

        if supply_v >= SUPPLY_OVERVOLTAGE_CUTOFF_V {
            duty = 0.0;
            volts = 0.0;
        }

        self.duty = duty;
        self.effective_volts = volts;
        pwm.set_duty(duty);
    }

    fn resolve_heater_allow(&mut self, allow: HeaterAllow, supply_v: f32, dt: f32) -> bool {
        match allow {
            HeaterAllow::Allowed => true,
            HeaterAllow::NotAllowed => false,
            HeaterAllow::Unknown => {
                // No command over CAN yet; gate on the supply thresholds
                if supply_v < self.settings.supply_off_voltage() {
                    self.supply_stable_time_s = 0.0;
                    false
                } else {
                    self.supply_stable_time_s += dt;
                    supply_v > self.settings.supply_on_voltage()
                        && self.supply_stable_time_s >= HEATER_BATTERY_STAB_TIME_S
                }
            }
        }
    }

    pub fn state(&self) -> HeaterState {
        self.fsm
            .as_ref()
            .expect("No FSM state, impl must be wrong")
            .hal_state()
    }

    pub fn is_running_closed_loop(&self) -> bool {
        self.state() == HeaterState::ClosedLoop
    }

    pub fn status(&self) -> Status {
        self.status
    }

    pub fn duty(&self) -> f32 {
        self.duty
    }

    pub fn effective_voltage(&self) -> f32 {
        self.effective_volts
    }

    pub fn target_temp_c(&self) -> f32 {
        self.target_temp_c
    }

    pub(crate) fn closed_loop_temp_c(&self) -> f32 {
        self.target_temp_c - 30.0
    }

    pub(crate) fn overheat_temp_c(&self) -> f32 {
        self.target_temp_c + 100.0
    }

    pub(crate) fn underheat_temp_c(&self) -> f32 {
        self.target_temp_c - 100.0
    }
}
