//! The persistent configuration record.
//!
//! The on-flash layout is an ABI shared with external ECU tooling: field
//! offsets, bitfield packing and the little-endian byte order are frozen.
//! Encode and decode go field-by-field against the byte slice so this file
//! stays the single source of truth for the layout; any layout change must
//! bump `CONFIG_TAG`.

use serde::{Deserialize, Serialize};
use shared::wbo_hal::{AuxOutputSource, CanProtocol, NonvolatileStore, NvError, SensorType};

use crate::{silprintln, AFR_CHANNELS, EGT_CHANNELS};

pub const CONFIG_SIZE: usize = 256;

const CONFIG_TAG: u32 = 0xDEAD_BE02;

// The record always carries two AFR and two EGT entries regardless of how
// many channels the board populates.
const CONFIG_AFR_ENTRIES: usize = 2;
const CONFIG_EGT_ENTRIES: usize = 2;

const AUX_CURVE_POINTS: usize = 8;
const AUX_OUTPUTS: usize = 2;

const OFFSET_TAG: usize = 0;
const OFFSET_LEGACY: usize = 4;
const OFFSET_AUX_BINS: usize = 5;
const OFFSET_AUX_VALUES: usize = 69;
const OFFSET_AUX_SOURCES: usize = 133;
const OFFSET_SENSOR_TYPE: usize = 135;
const OFFSET_AFR_ENTRIES: usize = 136;
const OFFSET_EGT_ENTRIES: usize = 152;
const OFFSET_HEATER: usize = 168;

const CHANNEL_ENTRY_SIZE: usize = 8;

const FLAG_RUSEFI_TX: u8 = 0x01;
const FLAG_RUSEFI_TX_DIAG: u8 = 0x02;
const PROTOCOL_SHIFT: u32 = 2;

pub const TS_SIGNATURE: &str = "wbo-rs 0.1.0 wideband";

/// Broadcast settings for one AFR or EGT channel. 8 bytes on the wire:
/// a flag byte (tx enable bit 0, diag enable bit 1, extra protocol from
/// bit 2 up), the internal protocol index, the extra protocol ID offset,
/// then padding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelSettings {
    pub rusefi_tx: bool,
    pub rusefi_tx_diag: bool,
    pub extra_protocol: CanProtocol,
    pub rusefi_idx: u8,
    pub extra_can_id_offset: u8,
}

impl ChannelSettings {
    fn encode(&self, bytes: &mut [u8]) {
        let mut flags = (self.extra_protocol as u8) << PROTOCOL_SHIFT;
        if self.rusefi_tx {
            flags |= FLAG_RUSEFI_TX;
        }
        if self.rusefi_tx_diag {
            flags |= FLAG_RUSEFI_TX_DIAG;
        }

        bytes[0] = flags;
        bytes[1] = self.rusefi_idx;
        bytes[2] = self.extra_can_id_offset;
        bytes[3..CHANNEL_ENTRY_SIZE].fill(0);
    }

    fn decode(bytes: &[u8]) -> Option<Self> {
        let flags = bytes[0];
        let extra_protocol = CanProtocol::from_raw(flags >> PROTOCOL_SHIFT)?;

        Some(Self {
            rusefi_tx: flags & FLAG_RUSEFI_TX != 0,
            rusefi_tx_diag: flags & FLAG_RUSEFI_TX_DIAG != 0,
            extra_protocol,
            rusefi_idx: bytes[1],
            extra_can_id_offset: bytes[2],
        })
    }
}

/// Heater supply thresholds and preheat time, stored scaled: supply
/// voltages in 0.1 V steps, preheat time in 5 s steps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeaterSettings {
    pub supply_off_decivolts: u8,
    pub supply_on_decivolts: u8,
    pub preheat_time_raw: u8,
}

impl HeaterSettings {
    pub fn supply_off_voltage(&self) -> f32 {
        self.supply_off_decivolts as f32 * 0.1
    }

    pub fn supply_on_voltage(&self) -> f32 {
        self.supply_on_decivolts as f32 * 0.1
    }

    pub fn preheat_time_s(&self) -> f32 {
        self.preheat_time_raw as f32 * 5.0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Configuration {
    pub aux_out_bins: [[f32; AUX_CURVE_POINTS]; AUX_OUTPUTS],
    pub aux_out_values: [[f32; AUX_CURVE_POINTS]; AUX_OUTPUTS],
    pub aux_output_source: [AuxOutputSource; AUX_OUTPUTS],
    pub sensor_type: SensorType,
    pub afr: [ChannelSettings; CONFIG_AFR_ENTRIES],
    pub egt: [ChannelSettings; CONFIG_EGT_ENTRIES],
    pub heater: HeaterSettings,
}

impl Configuration {
    /// Board defaults, installed whenever the stored record is missing or
    /// carries a stale tag.
    pub fn default() -> Self {
        let mut aux_out_bins = [[0.0; AUX_CURVE_POINTS]; AUX_OUTPUTS];
        let mut aux_out_values = [[0.0; AUX_CURVE_POINTS]; AUX_OUTPUTS];

        // Default aux curve maps AFR 8.5..18.0 onto 0..5 V
        for i in 0..AUX_CURVE_POINTS {
            let frac = i as f32 / (AUX_CURVE_POINTS - 1) as f32;
            let bin = 8.5 + (18.0 - 8.5) * frac;
            let value = 5.0 * frac;

            aux_out_bins[0][i] = bin;
            aux_out_bins[1][i] = bin;
            aux_out_values[0][i] = value;
            aux_out_values[1][i] = value;
        }

        let afr = core::array::from_fn(|i| ChannelSettings {
            rusefi_tx: true,
            rusefi_tx_diag: true,
            extra_protocol: CanProtocol::None,
            rusefi_idx: i as u8,
            extra_can_id_offset: i as u8,
        });

        let egt = core::array::from_fn(|i| ChannelSettings {
            rusefi_tx: false,
            rusefi_tx_diag: false,
            extra_protocol: CanProtocol::None,
            rusefi_idx: i as u8,
            extra_can_id_offset: i as u8,
        });

        Self {
            aux_out_bins,
            aux_out_values,
            aux_output_source: [AuxOutputSource::Afr0, AuxOutputSource::Afr1],
            sensor_type: SensorType::Lsu49,
            afr,
            egt,
            heater: HeaterSettings {
                supply_off_decivolts: 60,
                supply_on_decivolts: 110,
                preheat_time_raw: 1,
            },
        }
    }

    pub fn to_bytes(&self) -> [u8; CONFIG_SIZE] {
        let mut bytes = [0u8; CONFIG_SIZE];

        bytes[OFFSET_TAG..OFFSET_TAG + 4].copy_from_slice(&CONFIG_TAG.to_le_bytes());
        bytes[OFFSET_LEGACY] = 0;

        for aux in 0..AUX_OUTPUTS {
            for i in 0..AUX_CURVE_POINTS {
                let bin_at = OFFSET_AUX_BINS + (aux * AUX_CURVE_POINTS + i) * 4;
                let value_at = OFFSET_AUX_VALUES + (aux * AUX_CURVE_POINTS + i) * 4;

                bytes[bin_at..bin_at + 4].copy_from_slice(&self.aux_out_bins[aux][i].to_le_bytes());
                bytes[value_at..value_at + 4]
                    .copy_from_slice(&self.aux_out_values[aux][i].to_le_bytes());
            }

            bytes[OFFSET_AUX_SOURCES + aux] = self.aux_output_source[aux] as u8;
        }

        bytes[OFFSET_SENSOR_TYPE] = self.sensor_type as u8;

        for (i, entry) in self.afr.iter().enumerate() {
            let at = OFFSET_AFR_ENTRIES + i * CHANNEL_ENTRY_SIZE;
            entry.encode(&mut bytes[at..at + CHANNEL_ENTRY_SIZE]);
        }

        for (i, entry) in self.egt.iter().enumerate() {
            let at = OFFSET_EGT_ENTRIES + i * CHANNEL_ENTRY_SIZE;
            entry.encode(&mut bytes[at..at + CHANNEL_ENTRY_SIZE]);
        }

        bytes[OFFSET_HEATER] = self.heater.supply_off_decivolts;
        bytes[OFFSET_HEATER + 1] = self.heater.supply_on_decivolts;
        bytes[OFFSET_HEATER + 2] = self.heater.preheat_time_raw;

        bytes
    }

    /// `None` when the tag is stale or any field fails validation; the
    /// caller then installs defaults.
    pub fn from_bytes(bytes: &[u8; CONFIG_SIZE]) -> Option<Self> {
        let tag = u32::from_le_bytes([
            bytes[OFFSET_TAG],
            bytes[OFFSET_TAG + 1],
            bytes[OFFSET_TAG + 2],
            bytes[OFFSET_TAG + 3],
        ]);
        if tag != CONFIG_TAG {
            return None;
        }

        let mut aux_out_bins = [[0.0f32; AUX_CURVE_POINTS]; AUX_OUTPUTS];
        let mut aux_out_values = [[0.0f32; AUX_CURVE_POINTS]; AUX_OUTPUTS];
        let mut aux_output_source = [AuxOutputSource::Afr0; AUX_OUTPUTS];

        for aux in 0..AUX_OUTPUTS {
            for i in 0..AUX_CURVE_POINTS {
                let bin_at = OFFSET_AUX_BINS + (aux * AUX_CURVE_POINTS + i) * 4;
                let value_at = OFFSET_AUX_VALUES + (aux * AUX_CURVE_POINTS + i) * 4;

                aux_out_bins[aux][i] = f32::from_le_bytes([
                    bytes[bin_at],
                    bytes[bin_at + 1],
                    bytes[bin_at + 2],
                    bytes[bin_at + 3],
                ]);
                aux_out_values[aux][i] = f32::from_le_bytes([
                    bytes[value_at],
                    bytes[value_at + 1],
                    bytes[value_at + 2],
                    bytes[value_at + 3],
                ]);
            }

            aux_output_source[aux] = AuxOutputSource::from_raw(bytes[OFFSET_AUX_SOURCES + aux])?;
        }

        let sensor_type = SensorType::from_raw(bytes[OFFSET_SENSOR_TYPE])?;

        let decode_entry = |at: usize| ChannelSettings::decode(&bytes[at..at + CHANNEL_ENTRY_SIZE]);

        let afr = [
            decode_entry(OFFSET_AFR_ENTRIES)?,
            decode_entry(OFFSET_AFR_ENTRIES + CHANNEL_ENTRY_SIZE)?,
        ];

        let egt = [
            decode_entry(OFFSET_EGT_ENTRIES)?,
            decode_entry(OFFSET_EGT_ENTRIES + CHANNEL_ENTRY_SIZE)?,
        ];

        let heater = HeaterSettings {
            supply_off_decivolts: bytes[OFFSET_HEATER],
            supply_on_decivolts: bytes[OFFSET_HEATER + 1],
            preheat_time_raw: bytes[OFFSET_HEATER + 2],
        };

        if heater.supply_on_decivolts <= heater.supply_off_decivolts {
            return None;
        }

        Some(Self {
            aux_out_bins,
            aux_out_values,
            aux_output_source,
            sensor_type,
            afr,
            egt,
            heater,
        })
    }

    pub fn set_rusefi_indices(&mut self, base: u8) {
        for i in 0..AFR_CHANNELS {
            self.afr[i].rusefi_idx = base.wrapping_add(i as u8);
        }
        for i in 0..EGT_CHANNELS {
            self.egt[i].rusefi_idx = base.wrapping_add(i as u8);
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    Loaded,
    Defaulted,
}

/// Owns the in-RAM configuration plus its byte image, backed by the
/// non-volatile store. The byte image is what the serial tuner reads.
pub struct ConfigStore<'a> {
    store: &'a mut dyn NonvolatileStore,
    config: Configuration,
    bytes: [u8; CONFIG_SIZE],
}

impl<'a> ConfigStore<'a> {
    pub fn load(store: &'a mut dyn NonvolatileStore) -> (Self, LoadOutcome) {
        let mut bytes = [0u8; CONFIG_SIZE];

        let config = match store.read(&mut bytes) {
            Ok(()) => Configuration::from_bytes(&bytes),
            Err(_) => None,
        };

        let (config, outcome) = match config {
            Some(config) => (config, LoadOutcome::Loaded),
            None => {
                silprintln!("config: stored record invalid, using defaults");
                (Configuration::default(), LoadOutcome::Defaulted)
            }
        };

        let bytes = config.to_bytes();

        (
            Self {
                store,
                config,
                bytes,
            },
            outcome,
        )
    }

    pub fn config(&self) -> &Configuration {
        &self.config
    }

    pub fn config_mut(&mut self) -> &mut Configuration {
        &mut self.config
    }

    pub fn save(&mut self) -> Result<(), NvError> {
        self.bytes = self.config.to_bytes();
        self.store.write(&self.bytes)
    }

    /// Raw record bytes for the tuning protocol.
    pub fn config_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn signature(&self) -> &'static str {
        TS_SIGNATURE
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::wbo_mock::NonvolatileStoreMock;

    #[test]
    fn record_is_256_bytes() {
        assert_eq!(Configuration::default().to_bytes().len(), CONFIG_SIZE);
        assert_eq!(OFFSET_HEATER + 8 + 80, CONFIG_SIZE);
    }

    #[test]
    fn tag_sits_at_offset_zero() {
        let bytes = Configuration::default().to_bytes();
        assert_eq!(&bytes[0..4], &[0x02, 0xBE, 0xAD, 0xDE]);
    }

    #[test]
    fn defaults_reject_a_stale_tag() {
        let mut bytes = Configuration::default().to_bytes();
        bytes[3] = 0x00;
        assert!(Configuration::from_bytes(&bytes).is_none());
    }

    #[test]
    fn aux_bins_at_offset_5() {
        let mut bytes = Configuration::default().to_bytes();

        for i in 0..8 {
            let value = 10.0f32 + i as f32;
            bytes[5 + i * 4..5 + i * 4 + 4].copy_from_slice(&value.to_le_bytes());
        }
        for i in 0..8 {
            let value = 20.0f32 + i as f32;
            bytes[37 + i * 4..37 + i * 4 + 4].copy_from_slice(&value.to_le_bytes());
        }

        let config = Configuration::from_bytes(&bytes).unwrap();
        for i in 0..8 {
            assert_eq!(config.aux_out_bins[0][i], 10.0 + i as f32);
            assert_eq!(config.aux_out_bins[1][i], 20.0 + i as f32);
        }
    }

    #[test]
    fn aux_values_at_offset_69() {
        let mut bytes = Configuration::default().to_bytes();

        for curve in 0..2 {
            for i in 0..8 {
                let at = 69 + (curve * 8 + i) * 4;
                let value = 100.0f32 + (curve * 10 + i) as f32;
                bytes[at..at + 4].copy_from_slice(&value.to_le_bytes());
            }
        }

        let config = Configuration::from_bytes(&bytes).unwrap();
        for curve in 0..2 {
            for i in 0..8 {
                assert_eq!(config.aux_out_values[curve][i], 100.0 + (curve * 10 + i) as f32);
            }
        }
    }

    #[test]
    fn aux_sources_at_offset_133() {
        let mut bytes = Configuration::default().to_bytes();
        bytes[133] = AuxOutputSource::Lambda0 as u8;
        bytes[134] = AuxOutputSource::Egt1 as u8;

        let config = Configuration::from_bytes(&bytes).unwrap();
        assert_eq!(config.aux_output_source[0], AuxOutputSource::Lambda0);
        assert_eq!(config.aux_output_source[1], AuxOutputSource::Egt1);
    }

    #[test]
    fn sensor_type_at_offset_135() {
        let mut bytes = Configuration::default().to_bytes();
        bytes[135] = SensorType::Lsu42 as u8;

        let config = Configuration::from_bytes(&bytes).unwrap();
        assert_eq!(config.sensor_type, SensorType::Lsu42);
    }

    #[test]
    fn afr_entries_at_offset_136() {
        let mut bytes = Configuration::default().to_bytes();

        // tx, diag, protocol AemNet, idx 5, offset 10
        bytes[136] = 0b0000_0111;
        bytes[137] = 5;
        bytes[138] = 10;

        // second entry: diag only, protocol none, idx 7, offset 15
        bytes[144] = 0b0000_0010;
        bytes[145] = 7;
        bytes[146] = 15;

        let config = Configuration::from_bytes(&bytes).unwrap();

        assert!(config.afr[0].rusefi_tx);
        assert!(config.afr[0].rusefi_tx_diag);
        assert_eq!(config.afr[0].extra_protocol, CanProtocol::AemNet);
        assert_eq!(config.afr[0].rusefi_idx, 5);
        assert_eq!(config.afr[0].extra_can_id_offset, 10);

        assert!(!config.afr[1].rusefi_tx);
        assert!(config.afr[1].rusefi_tx_diag);
        assert_eq!(config.afr[1].extra_protocol, CanProtocol::None);
        assert_eq!(config.afr[1].rusefi_idx, 7);
        assert_eq!(config.afr[1].extra_can_id_offset, 15);
    }

    #[test]
    fn egt_entries_at_offset_152() {
        let mut bytes = Configuration::default().to_bytes();

        bytes[152] = 0b0000_0101; // tx, protocol AemNet
        bytes[153] = 3;
        bytes[154] = 8;

        let config = Configuration::from_bytes(&bytes).unwrap();

        assert!(config.egt[0].rusefi_tx);
        assert!(!config.egt[0].rusefi_tx_diag);
        assert_eq!(config.egt[0].extra_protocol, CanProtocol::AemNet);
        assert_eq!(config.egt[0].rusefi_idx, 3);
        assert_eq!(config.egt[0].extra_can_id_offset, 8);
    }

    #[test]
    fn heater_settings_at_offset_168() {
        let mut bytes = Configuration::default().to_bytes();
        bytes[168] = 120;
        bytes[169] = 135;
        bytes[170] = 25;

        let config = Configuration::from_bytes(&bytes).unwrap();
        assert_eq!(config.heater.supply_off_voltage(), 12.0);
        assert_eq!(config.heater.supply_on_voltage(), 13.5);
        assert_eq!(config.heater.preheat_time_s(), 125.0);
    }

    #[test]
    fn supply_thresholds_must_be_ordered() {
        let mut bytes = Configuration::default().to_bytes();
        bytes[168] = 110;
        bytes[169] = 110;
        assert!(Configuration::from_bytes(&bytes).is_none());

        bytes[169] = 111;
        assert!(Configuration::from_bytes(&bytes).is_some());
    }

    #[test]
    fn round_trips_bytes_verbatim() {
        let mut config = Configuration::default();
        config.sensor_type = SensorType::LsuAdv;
        config.afr[0].extra_protocol = CanProtocol::Haltech;
        config.afr[1].rusefi_idx = 9;
        config.aux_out_bins[1][3] = 12.75;

        let bytes = config.to_bytes();
        let reloaded = Configuration::from_bytes(&bytes).unwrap();

        assert_eq!(reloaded, config);
        assert_eq!(reloaded.to_bytes(), bytes);
    }

    #[test]
    fn defaults_enable_internal_protocol_only() {
        let config = Configuration::default();

        for (i, entry) in config.afr.iter().enumerate() {
            assert!(entry.rusefi_tx);
            assert!(entry.rusefi_tx_diag);
            assert_eq!(entry.extra_protocol, CanProtocol::None);
            assert_eq!(entry.rusefi_idx, i as u8);
        }

        for entry in &config.egt {
            assert!(!entry.rusefi_tx);
        }
    }

    #[test]
    fn default_aux_curve_spans_afr_range() {
        let config = Configuration::default();

        assert_eq!(config.aux_out_bins[0][0], 8.5);
        assert_eq!(config.aux_out_bins[0][7], 18.0);
        assert_eq!(config.aux_out_values[0][0], 0.0);
        assert_eq!(config.aux_out_values[0][7], 5.0);
    }

    #[test]
    fn store_defaults_on_blank_flash() {
        let mut nv = NonvolatileStoreMock::<CONFIG_SIZE>::new();

        let (store, outcome) = ConfigStore::load(&mut nv);
        assert_eq!(outcome, LoadOutcome::Defaulted);
        assert_eq!(store.config(), &Configuration::default());
    }

    #[test]
    fn store_round_trips_through_flash() {
        let mut nv = NonvolatileStoreMock::<CONFIG_SIZE>::new();

        {
            let (mut store, _) = ConfigStore::load(&mut nv);
            store.config_mut().afr[0].rusefi_idx = 4;
            store.save().unwrap();
        }

        let (store, outcome) = ConfigStore::load(&mut nv);
        assert_eq!(outcome, LoadOutcome::Loaded);
        assert_eq!(store.config().afr[0].rusefi_idx, 4);
        assert_eq!(store.config_bytes(), &store.config().to_bytes()[..]);
    }

    #[test]
    fn store_defaults_on_read_failure() {
        let mut nv = NonvolatileStoreMock::<CONFIG_SIZE>::new();
        nv.fail_reads = true;

        let (_, outcome) = ConfigStore::load(&mut nv);
        assert_eq!(outcome, LoadOutcome::Defaulted);
    }

    #[test]
    fn signature_is_stable() {
        let mut nv = NonvolatileStoreMock::<CONFIG_SIZE>::new();
        let (store, _) = ConfigStore::load(&mut nv);
        assert_eq!(store.signature(), TS_SIGNATURE);
    }
}
