//! Aux analog outputs.
//!
//! Each of the two aux channels maps a configured source value through its
//! 8-point curve to a 0..5 V output, typically feeding a dash gauge or an
//! analog ECU input.

use shared::wbo_hal::AuxOutputSource;

use crate::config::Configuration;
use crate::interp::interpolate_axes;
use crate::{AFR_CHANNELS, EGT_CHANNELS};

/// Gasoline stoichiometric ratio used for the AFR-sourced curves.
pub const AFR_STOICH_RATIO: f32 = 14.7;

pub fn aux_output_voltage(
    config: &Configuration,
    aux: usize,
    lambda: &[f32; AFR_CHANNELS],
    egt_temp_c: &[f32; EGT_CHANNELS],
) -> f32 {
    let source_value = match config.aux_output_source[aux] {
        AuxOutputSource::Afr0 => lambda[0] * AFR_STOICH_RATIO,
        AuxOutputSource::Afr1 => lambda[1] * AFR_STOICH_RATIO,
        AuxOutputSource::Lambda0 => lambda[0],
        AuxOutputSource::Lambda1 => lambda[1],
        AuxOutputSource::Egt0 => egt_temp_c[0],
        AuxOutputSource::Egt1 => egt_temp_c[1],
    };

    interpolate_axes(
        &config.aux_out_bins[aux],
        &config.aux_out_values[aux],
        source_value,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_curve_maps_stoich_to_midscale() {
        let config = Configuration::default();

        // Lambda 1.0 is AFR 14.7, which sits at (14.7 - 8.5) / 9.5 of the
        // default 0..5 V span
        let volts = aux_output_voltage(&config, 0, &[1.0, 1.0], &[0.0, 0.0]);
        let expected = (14.7 - 8.5) / (18.0 - 8.5) * 5.0;

        assert!((volts - expected).abs() < 1e-3);
    }

    #[test]
    fn curve_clamps_at_the_rails() {
        let config = Configuration::default();

        assert_eq!(aux_output_voltage(&config, 0, &[0.3, 1.0], &[0.0, 0.0]), 0.0);
        assert_eq!(aux_output_voltage(&config, 0, &[2.0, 1.0], &[0.0, 0.0]), 5.0);
    }

    #[test]
    fn lambda_source_skips_afr_scaling() {
        let mut config = Configuration::default();
        config.aux_output_source[0] = AuxOutputSource::Lambda0;
        for i in 0..8 {
            config.aux_out_bins[0][i] = 0.5 + i as f32 * 0.1;
            config.aux_out_values[0][i] = i as f32;
        }

        let volts = aux_output_voltage(&config, 0, &[0.75, 1.0], &[0.0, 0.0]);
        assert!((volts - 2.5).abs() < 1e-3);
    }

    #[test]
    fn egt_source_reads_the_second_channel() {
        let mut config = Configuration::default();
        config.aux_output_source[1] = AuxOutputSource::Egt1;
        for i in 0..8 {
            config.aux_out_bins[1][i] = (i as f32) * 100.0;
            config.aux_out_values[1][i] = (i as f32) * 0.5;
        }

        let volts = aux_output_voltage(&config, 1, &[1.0, 1.0], &[0.0, 350.0]);
        assert!((volts - 1.75).abs() < 1e-3);
    }
}
