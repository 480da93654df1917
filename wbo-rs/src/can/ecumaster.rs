//! EcuMaster lambda-to-CAN formats, 1 Mbps, big endian.

use shared::wbo_hal::{CanFrame, CanProtocol, SensorType};

use super::bytes::{put_i16_be, put_u16_be};
use super::{no_frames, one_frame, oxygen_percent, AfrFrameInputs, EgtFrameInputs, TxFrames};
use crate::config::Configuration;
use crate::EGT_CHANNELS;

const ECUMASTER_L2C_BASE_ID: u32 = 0x664;

const ECUMASTER_CLASSIC_EGT_BASE_ID: u32 = 0x610;
const ECUMASTER_BLACK_EGT_BASE_ID: u32 = 0x660;

// Calibration state field, 3 bits
const CAL_STATE_FINISHED: u8 = 2;

fn device_version(sensor: SensorType) -> u8 {
    match sensor {
        SensorType::Lsu42 => 0,
        SensorType::Lsu49 => 1,
        SensorType::LsuAdv => 2,
    }
}

pub fn encode_afr(config: &Configuration, ch: usize, inputs: &[AfrFrameInputs]) -> TxFrames {
    let input = &inputs[ch];
    let id = ECUMASTER_L2C_BASE_ID + config.afr[ch].extra_can_id_offset as u32 * 2;

    let mut data = [0u8; 8];

    put_u16_be(
        &mut data,
        0,
        (input.sample.internal_heater_voltage_v * 100.0) as u16,
    );
    data[2] = (input.heater_duty * 255.0) as u8;
    data[3] = (input.sample.sensor_temperature_c / 4.0) as u8;

    let lambda_raw = if input.lambda_valid {
        (input.lambda * 1000.0) as u16
    } else {
        0
    };
    put_u16_be(&mut data, 4, lambda_raw);

    data[6] = 0; // no wiring faults reported
    data[7] = (CAL_STATE_FINISHED << 3) | device_version(config.sensor_type);

    let mut data2 = [0u8; 8];

    put_i16_be(
        &mut data2,
        0,
        (input.sample.pump_nominal_current_ma * 1000.0) as i16,
    );

    let oxygen = oxygen_percent(input.lambda, input.lambda_valid);
    put_i16_be(&mut data2, 2, (oxygen * 100.0) as i16);

    put_u16_be(&mut data2, 4, (input.sample.sensor_esr_ohm * 10.0) as u16);

    [
        Some(CanFrame::new(id, true, &data)),
        Some(CanFrame::new(id + 1, true, &data2)),
        None,
    ]
}

/// 1-4 thermocouples in one frame from channel 0; the Black variant moves
/// the base ID.
pub fn encode_egt(config: &Configuration, ch: usize, inputs: &EgtFrameInputs) -> TxFrames {
    if ch != 0 {
        return no_frames();
    }

    let base = if config.egt[0].extra_protocol == CanProtocol::EcuMasterBlack {
        ECUMASTER_BLACK_EGT_BASE_ID
    } else {
        ECUMASTER_CLASSIC_EGT_BASE_ID
    };
    let id = base + config.egt[0].extra_can_id_offset as u32;

    let mut data = [0u8; 8];
    for i in 0..EGT_CHANNELS {
        put_i16_be(&mut data, 2 * i, inputs.readings[i].temperature_c as i16);
    }

    one_frame(CanFrame::new(id, true, &data))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::can::tests_support::{afr_inputs_fixture, egt_inputs_fixture};

    #[test]
    fn afr_pair_layout() {
        let config = Configuration::default();
        let mut inputs = [afr_inputs_fixture(), afr_inputs_fixture()];
        inputs[0].sample.internal_heater_voltage_v = 13.8;
        inputs[0].sample.sensor_temperature_c = 780.0;
        inputs[0].sample.sensor_esr_ohm = 300.0;
        inputs[0].sample.pump_nominal_current_ma = 1.5;
        inputs[0].heater_duty = 0.4;
        inputs[0].lambda = 1.2;

        let frames = encode_afr(&config, 0, &inputs);

        let frame = frames[0].unwrap();
        assert_eq!(frame.id, 0x664);
        assert_eq!(get_volts(&frame.data), 1379); // 13.8 * 100, float rounding down
        assert_eq!(frame.data[2], 102); // 0.4 * 255
        assert_eq!(frame.data[3], 195); // 780 / 4
        assert_eq!(&frame.data[4..6], &1200u16.to_be_bytes());
        assert_eq!(frame.data[6], 0);
        assert_eq!(frame.data[7], (2 << 3) | 1); // finished, LSU4.9

        let frame2 = frames[1].unwrap();
        assert_eq!(frame2.id, 0x665);
        assert_eq!(&frame2.data[0..2], &1500i16.to_be_bytes());
        assert_eq!(&frame2.data[4..6], &3000u16.to_be_bytes());
    }

    fn get_volts(data: &[u8; 8]) -> u16 {
        u16::from_be_bytes([data[0], data[1]])
    }

    #[test]
    fn id_offset_steps_by_two() {
        let mut config = Configuration::default();
        config.afr[0].extra_can_id_offset = 1;

        let inputs = [afr_inputs_fixture(), afr_inputs_fixture()];
        let frames = encode_afr(&config, 0, &inputs);

        assert_eq!(frames[0].unwrap().id, 0x666);
        assert_eq!(frames[1].unwrap().id, 0x667);
    }

    #[test]
    fn device_version_tracks_sensor_type() {
        let mut config = Configuration::default();
        config.sensor_type = SensorType::LsuAdv;

        let inputs = [afr_inputs_fixture(), afr_inputs_fixture()];
        let frame = encode_afr(&config, 0, &inputs)[0].unwrap();

        assert_eq!(frame.data[7] & 0x07, 2);
    }

    #[test]
    fn egt_base_follows_device_variant() {
        let mut config = Configuration::default();
        let inputs = egt_inputs_fixture();

        config.egt[0].extra_protocol = CanProtocol::EcuMasterClassic;
        assert_eq!(encode_egt(&config, 0, &inputs)[0].unwrap().id, 0x610);

        config.egt[0].extra_protocol = CanProtocol::EcuMasterBlack;
        assert_eq!(encode_egt(&config, 0, &inputs)[0].unwrap().id, 0x660);
    }

    #[test]
    fn egt_carries_raw_celsius() {
        let config = Configuration::default();
        let frame = encode_egt(&config, 0, &egt_inputs_fixture())[0].unwrap();

        assert_eq!(&frame.data[0..2], &650i16.to_be_bytes());
        assert_eq!(&frame.data[2..4], &700i16.to_be_bytes());
        assert_eq!(&frame.data[4..8], &[0, 0, 0, 0]);
    }
}
