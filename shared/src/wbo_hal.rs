use serde::{Deserialize, Serialize};
use strum_macros::{EnumCount as EnumCountMacro, EnumIter};

/// Bosch LSU sensor variants supported by the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumIter)]
#[repr(u8)]
pub enum SensorType {
    Lsu49 = 0,
    Lsu42 = 1,
    LsuAdv = 2,
}

impl SensorType {
    pub fn from_raw(raw: u8) -> Option<Self> {
        match raw {
            0 => Some(SensorType::Lsu49),
            1 => Some(SensorType::Lsu42),
            2 => Some(SensorType::LsuAdv),
            _ => None,
        }
    }

    /// Heater regulation target, degrees C.
    pub fn target_temp_c(&self) -> f32 {
        match self {
            SensorType::Lsu49 => 780.0,
            SensorType::Lsu42 => 730.0,
            SensorType::LsuAdv => 785.0,
        }
    }

    /// Nernst cell ESR at the target temperature, ohms.
    pub fn target_esr_ohm(&self) -> f32 {
        match self {
            SensorType::Lsu49 => 300.0,
            SensorType::Lsu42 => 80.0,
            SensorType::LsuAdv => 300.0,
        }
    }
}

/// External permission to energize the heater, reported over CAN.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumIter)]
pub enum HeaterAllow {
    Unknown,
    Allowed,
    NotAllowed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumIter)]
pub enum HeaterState {
    Preheat,
    WarmupRamp,
    ClosedLoop,
    Stopped,
}

/// Per-channel controller status. The discriminants are the wire values
/// carried in the diag frame status byte; do not renumber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumIter)]
#[repr(u8)]
pub enum Status {
    Preheat = 0,
    Warmup = 1,
    RunningClosedLoop = 2,
    SensorDidntHeat = 3,
    SensorOverheat = 4,
    SensorUnderheat = 5,
}

/// Extra broadcast protocol selection. The discriminants are part of the
/// persisted configuration ABI; do not renumber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumCountMacro, EnumIter)]
#[repr(u8)]
pub enum CanProtocol {
    None = 0,
    AemNet = 1,
    EcuMasterClassic = 2,
    EcuMasterBlack = 3,
    Haltech = 4,
    LinkEcu = 5,
    Emtron = 6,
    Motec = 7,
}

impl CanProtocol {
    pub fn from_raw(raw: u8) -> Option<Self> {
        match raw {
            0 => Some(CanProtocol::None),
            1 => Some(CanProtocol::AemNet),
            2 => Some(CanProtocol::EcuMasterClassic),
            3 => Some(CanProtocol::EcuMasterBlack),
            4 => Some(CanProtocol::Haltech),
            5 => Some(CanProtocol::LinkEcu),
            6 => Some(CanProtocol::Emtron),
            7 => Some(CanProtocol::Motec),
            _ => None,
        }
    }
}

/// Source feeding an aux analog output curve. Persisted ABI values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumIter)]
#[repr(u8)]
pub enum AuxOutputSource {
    Afr0 = 0,
    Afr1 = 1,
    Lambda0 = 2,
    Lambda1 = 3,
    Egt0 = 4,
    Egt1 = 5,
}

impl AuxOutputSource {
    pub fn from_raw(raw: u8) -> Option<Self> {
        match raw {
            0 => Some(AuxOutputSource::Afr0),
            1 => Some(AuxOutputSource::Afr1),
            2 => Some(AuxOutputSource::Lambda0),
            3 => Some(AuxOutputSource::Lambda1),
            4 => Some(AuxOutputSource::Egt0),
            5 => Some(AuxOutputSource::Egt1),
            _ => None,
        }
    }
}

/// A classic CAN 2.0 frame, 11 or 29 bit identifier, up to 8 data bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CanFrame {
    pub id: u32,
    pub extended: bool,
    pub dlc: u8,
    pub data: [u8; 8],
}

impl CanFrame {
    pub fn new(id: u32, extended: bool, payload: &[u8]) -> Self {
        let mut data = [0u8; 8];
        let dlc = payload.len().min(8);
        data[..dlc].copy_from_slice(&payload[..dlc]);

        Self {
            id,
            extended,
            dlc: dlc as u8,
            data,
        }
    }

    pub fn empty(id: u32, extended: bool) -> Self {
        Self {
            id,
            extended,
            dlc: 0,
            data: [0u8; 8],
        }
    }

    pub fn payload(&self) -> &[u8] {
        &self.data[..self.dlc as usize]
    }
}

/// One coherent view of a channel's analog front end, captured by the
/// sampling pipeline. Consumers get a copy, never a live reference.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SamplerSnapshot {
    pub nernst_dc_v: f32,
    pub pump_nominal_current_ma: f32,
    pub sensor_esr_ohm: f32,
    pub sensor_temperature_c: f32,
    pub internal_heater_voltage_v: f32,
}

pub trait Sampler {
    fn nernst_dc(&self) -> f32;
    fn pump_nominal_current_ma(&self) -> f32;
    fn sensor_esr_ohm(&self) -> f32;
    fn sensor_temperature_c(&self) -> f32;
    fn internal_heater_voltage_v(&self) -> f32;

    fn snapshot(&self) -> SamplerSnapshot {
        SamplerSnapshot {
            nernst_dc_v: self.nernst_dc(),
            pump_nominal_current_ma: self.pump_nominal_current_ma(),
            sensor_esr_ohm: self.sensor_esr_ohm(),
            sensor_temperature_c: self.sensor_temperature_c(),
            internal_heater_voltage_v: self.internal_heater_voltage_v(),
        }
    }
}

pub trait PumpDac {
    /// Command the pump cell current, microamps. Positive pumps oxygen out
    /// of the measurement chamber.
    fn set_current_target_ua(&mut self, target_ua: f32);

    /// Duty the DAC stage is currently producing, 0..1.
    fn output_duty(&self) -> f32;
}

pub trait HeaterPwm {
    /// Duty cycle in 0..1. Writes are non-blocking register stores.
    fn set_duty(&mut self, duty: f32);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CanError {
    MailboxFull,
    BusOff,
}

pub trait CanTransport {
    /// Submit a frame to the peripheral mailbox. A full mailbox returns
    /// `Err(CanError::MailboxFull)` within the timeout; callers on the
    /// periodic path drop the frame and move on.
    fn transmit(&mut self, frame: &CanFrame, timeout_ms: u32) -> Result<(), CanError>;

    /// Blocking receive; `None` timeout blocks forever.
    fn receive(&mut self, timeout_ms: Option<u32>) -> Option<CanFrame>;
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EgtReading {
    pub temperature_c: f32,
    pub cold_junction_c: f32,
}

pub trait EgtDriver {
    fn reading(&self) -> EgtReading;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NvError {
    Read,
    Write,
    VerifyFailed,
}

/// Fixed-size blob storage for the configuration record. The store must be
/// erase-write-verify so a torn write leaves the tag invalid.
pub trait NonvolatileStore {
    fn read(&mut self, buffer: &mut [u8]) -> Result<(), NvError>;
    fn write(&mut self, buffer: &[u8]) -> Result<(), NvError>;
}

pub trait SystemController {
    fn delay_ms(&mut self, ms: u32);

    /// Issue the MCU reset that lands in the bootloader. Callers must have
    /// flushed the CAN transmit mailbox first.
    fn reset_to_bootloader(&mut self);
}
