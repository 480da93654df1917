use crate::wbo_hal::{
    CanError, CanFrame, CanTransport, EgtDriver, EgtReading, HeaterPwm, NonvolatileStore, NvError,
    PumpDac, Sampler, SystemController,
};

pub struct SamplerMock {
    pub nernst_dc_v: f32,
    pub pump_nominal_current_ma: f32,
    pub sensor_esr_ohm: f32,
    pub sensor_temperature_c: f32,
    pub internal_heater_voltage_v: f32,
}

impl SamplerMock {
    pub fn new() -> Self {
        Self {
            nernst_dc_v: 0.0,
            pump_nominal_current_ma: 0.0,
            sensor_esr_ohm: 10_000.0,
            sensor_temperature_c: 20.0,
            internal_heater_voltage_v: 0.0,
        }
    }
}

impl Sampler for SamplerMock {
    fn nernst_dc(&self) -> f32 {
        self.nernst_dc_v
    }

    fn pump_nominal_current_ma(&self) -> f32 {
        self.pump_nominal_current_ma
    }

    fn sensor_esr_ohm(&self) -> f32 {
        self.sensor_esr_ohm
    }

    fn sensor_temperature_c(&self) -> f32 {
        self.sensor_temperature_c
    }

    fn internal_heater_voltage_v(&self) -> f32 {
        self.internal_heater_voltage_v
    }
}

pub struct PumpDacMock {
    pub target_ua: f32,
    pub duty: f32,
    pub set_count: u32,
}

impl PumpDacMock {
    pub fn new() -> Self {
        Self {
            target_ua: 0.0,
            duty: 0.0,
            set_count: 0,
        }
    }
}

impl PumpDac for PumpDacMock {
    fn set_current_target_ua(&mut self, target_ua: f32) {
        self.target_ua = target_ua;
        self.set_count += 1;
    }

    fn output_duty(&self) -> f32 {
        self.duty
    }
}

pub struct HeaterPwmMock {
    pub duty: f32,
    pub set_count: u32,
}

impl HeaterPwmMock {
    pub fn new() -> Self {
        Self {
            duty: 0.0,
            set_count: 0,
        }
    }
}

impl HeaterPwm for HeaterPwmMock {
    fn set_duty(&mut self, duty: f32) {
        self.duty = duty;
        self.set_count += 1;
    }
}

pub const CAN_MOCK_CAPACITY: usize = 64;

pub struct CanTransportMock {
    sent: [Option<CanFrame>; CAN_MOCK_CAPACITY],
    sent_count: usize,
    rx_queue: [Option<CanFrame>; CAN_MOCK_CAPACITY],
    rx_head: usize,
    rx_tail: usize,
    pub mailbox_full: bool,
}

impl CanTransportMock {
    pub fn new() -> Self {
        Self {
            sent: [None; CAN_MOCK_CAPACITY],
            sent_count: 0,
            rx_queue: [None; CAN_MOCK_CAPACITY],
            rx_head: 0,
            rx_tail: 0,
            mailbox_full: false,
        }
    }

    pub fn enqueue_rx(&mut self, frame: CanFrame) {
        self.rx_queue[self.rx_tail % CAN_MOCK_CAPACITY] = Some(frame);
        self.rx_tail += 1;
    }

    pub fn sent_frames(&self) -> impl Iterator<Item = &CanFrame> {
        self.sent[..self.sent_count].iter().flatten()
    }

    pub fn sent_count(&self) -> usize {
        self.sent_count
    }

    pub fn last_sent(&self) -> Option<&CanFrame> {
        self.sent[..self.sent_count].iter().flatten().last()
    }

    pub fn clear_sent(&mut self) {
        self.sent = [None; CAN_MOCK_CAPACITY];
        self.sent_count = 0;
    }
}

impl CanTransport for CanTransportMock {
    fn transmit(&mut self, frame: &CanFrame, _timeout_ms: u32) -> Result<(), CanError> {
        if self.mailbox_full {
            return Err(CanError::MailboxFull);
        }

        if self.sent_count < CAN_MOCK_CAPACITY {
            self.sent[self.sent_count] = Some(*frame);
            self.sent_count += 1;
        }

        Ok(())
    }

    fn receive(&mut self, _timeout_ms: Option<u32>) -> Option<CanFrame> {
        if self.rx_head == self.rx_tail {
            return None;
        }

        let frame = self.rx_queue[self.rx_head % CAN_MOCK_CAPACITY].take();
        self.rx_head += 1;
        frame
    }
}

pub struct EgtDriverMock {
    pub temperature_c: f32,
    pub cold_junction_c: f32,
}

impl EgtDriverMock {
    pub fn new() -> Self {
        Self {
            temperature_c: 20.0,
            cold_junction_c: 20.0,
        }
    }
}

impl EgtDriver for EgtDriverMock {
    fn reading(&self) -> EgtReading {
        EgtReading {
            temperature_c: self.temperature_c,
            cold_junction_c: self.cold_junction_c,
        }
    }
}

pub struct NonvolatileStoreMock<const SIZE: usize> {
    pub contents: [u8; SIZE],
    pub fail_reads: bool,
    pub fail_writes: bool,
    pub write_count: u32,
}

impl<const SIZE: usize> NonvolatileStoreMock<SIZE> {
    pub fn new() -> Self {
        Self {
            contents: [0xFF; SIZE],
            fail_reads: false,
            fail_writes: false,
            write_count: 0,
        }
    }
}

impl<const SIZE: usize> NonvolatileStore for NonvolatileStoreMock<SIZE> {
    fn read(&mut self, buffer: &mut [u8]) -> Result<(), NvError> {
        if self.fail_reads {
            return Err(NvError::Read);
        }

        let len = buffer.len().min(SIZE);
        buffer[..len].copy_from_slice(&self.contents[..len]);
        Ok(())
    }

    fn write(&mut self, buffer: &[u8]) -> Result<(), NvError> {
        if self.fail_writes {
            return Err(NvError::Write);
        }

        let len = buffer.len().min(SIZE);
        self.contents[..len].copy_from_slice(&buffer[..len]);
        self.write_count += 1;
        Ok(())
    }
}

pub struct SystemControllerMock {
    pub delayed_ms: u32,
    pub reset_count: u32,
}

impl SystemControllerMock {
    pub fn new() -> Self {
        Self {
            delayed_ms: 0,
            reset_count: 0,
        }
    }
}

impl SystemController for SystemControllerMock {
    fn delay_ms(&mut self, ms: u32) {
        self.delayed_ms += ms;
    }

    fn reset_to_bootloader(&mut self) {
        self.reset_count += 1;
    }
}
