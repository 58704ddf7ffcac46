//! V.26 QPSK and V.27 8-PSK baseband modems (spec.md §4.1). Each symbol
//! encodes a Gray-coded phase *increment* relative to the previous symbol
//! (differential phase-shift keying), so a channel-wide phase ambiguity
//! never desyncs decoding.

use super::sine::PhaseAccumulator;
use super::ToneSource;
use crate::error::ConfigError;

/// The two V.26 constellation variants differ only in the absolute phase
/// assigned to the first (00) dibit; both must be explicitly requested
/// (spec.md §4.1, "attempting to use QPSK without explicit variant is an
/// error").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QpskVariant {
    V26A,
    V26B,
}

/// V.26 QPSK Gray-coded dibit -> phase increment (degrees), per variant.
fn qpsk_increment_deg(variant: QpskVariant, dibit: u8) -> f64 {
    let table_a = [0.0, 90.0, 180.0, 270.0];
    let table_b = [45.0, 135.0, 225.0, 315.0];
    let table = match variant {
        QpskVariant::V26A => table_a,
        QpskVariant::V26B => table_b,
    };
    table[(dibit & 0b11) as usize]
}

/// V.27 8-PSK Gray-coded tribit -> phase increment (degrees).
fn psk8_increment_deg(tribit: u8) -> f64 {
    const TABLE: [f64; 8] = [0.0, 45.0, 90.0, 135.0, 180.0, 225.0, 270.0, 315.0];
    TABLE[(tribit & 0b111) as usize]
}

/// Differential PSK modulator carrying either 2 bits/symbol (V.26) or 3
/// bits/symbol (V.27) as a phase increment from the previous symbol.
pub struct PskModulator {
    carrier: PhaseAccumulator,
    variant: PskKind,
    phase_deg: f64,
}

#[derive(Debug, Clone, Copy)]
enum PskKind {
    Qpsk(QpskVariant),
    Psk8,
}

impl PskModulator {
    pub fn new_qpsk(variant: QpskVariant, carrier_hz: f64, sample_rate: u32) -> Self {
        PskModulator { carrier: PhaseAccumulator::new(carrier_hz, sample_rate), variant: PskKind::Qpsk(variant), phase_deg: 0.0 }
    }

    pub fn new_8psk(carrier_hz: f64, sample_rate: u32) -> Self {
        PskModulator { carrier: PhaseAccumulator::new(carrier_hz, sample_rate), variant: PskKind::Psk8, phase_deg: 0.0 }
    }

    /// Advance to the next symbol by Gray-coded bits (2 or 3, LSB-first in
    /// `bits[0]`), updating the running phase.
    pub fn set_symbol(&mut self, bits: u8) -> Result<(), ConfigError> {
        let inc = match self.variant {
            PskKind::Qpsk(v) => qpsk_increment_deg(v, bits),
            PskKind::Psk8 => psk8_increment_deg(bits),
        };
        self.phase_deg = (self.phase_deg + inc) % 360.0;
        self.carrier.reset_phase();
        Ok(())
    }
}

impl ToneSource for PskModulator {
    fn next_sample(&mut self) -> i16 {
        self.carrier.next_sample();
        let carrier_idx = (self.carrier.phase_table_index()) as i32;
        let shift = (self.phase_deg / 360.0 * super::sine::TABLE_LEN as f64) as i32;
        let idx = (carrier_idx + shift).rem_euclid(super::sine::TABLE_LEN as i32) as usize;
        super::sine::table()[idx]
    }
}

/// Require an explicit constellation variant before constructing a QPSK
/// modulator from user configuration (spec.md §4.1).
pub fn require_variant(variant: Option<QpskVariant>) -> Result<QpskVariant, ConfigError> {
    variant.ok_or(ConfigError::MissingPskVariant)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn qpsk_variants_map_to_distinct_phases() {
        assert_ne!(qpsk_increment_deg(QpskVariant::V26A, 0), qpsk_increment_deg(QpskVariant::V26B, 0));
    }

    #[test]
    fn eight_psk_table_has_eight_distinct_increments() {
        let mut seen: Vec<f64> = (0u8..8).map(psk8_increment_deg).collect();
        seen.sort_by(|a, b| a.partial_cmp(b).unwrap());
        seen.dedup();
        assert_eq!(seen.len(), 8);
    }

    #[test]
    fn missing_variant_is_a_config_error() {
        assert_eq!(require_variant(None), Err(ConfigError::MissingPskVariant));
    }

    #[test]
    fn modulator_emits_bounded_samples() {
        let mut m = PskModulator::new_qpsk(QpskVariant::V26A, 1800.0, 7200);
        m.set_symbol(0b10).unwrap();
        for _ in 0..32 {
            let s = m.next_sample();
            assert!(s.abs() <= i16::MAX);
        }
    }
}
