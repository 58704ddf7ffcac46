//! In-memory configuration data types (spec.md §3, "Audio configuration").
//! Parsing an on-disk config file is out of scope (spec.md §1); these are
//! plain validated data a future file-format parser can construct.

use crate::error::ConfigError;
use crate::fx25::Fx25Pref;
use crate::tone::psk::QpskVariant;

/// Default number of audio devices a process supports (spec.md §3).
pub const MAX_AUDIO_DEVICES: usize = 3;
pub const MAX_SUBCHANNELS: usize = 9;
pub const MAX_SLICERS: usize = 9;

/// Modulation family selectable per channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Modulation {
    Afsk { mark_hz: u32, space_hz: u32 },
    QpskV26(QpskVariant),
    Psk8V27,
    Scrambled9600,
    Eas,
}

/// FEC preference for a channel (spec.md §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FecPreference {
    Off,
    Fx25(Fx25Pref),
    Il2pNormal,
    Il2pInverted,
    Both,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Duplex {
    Half,
    Full,
}

/// One radio channel's demodulation and framing configuration.
#[derive(Debug, Clone)]
pub struct ChannelConfig {
    pub modulation: Modulation,
    pub baud: u32,
    pub fec: FecPreference,
    pub duplex: Duplex,
    pub n_subchannels: usize,
    pub n_slicers: usize,
}

impl ChannelConfig {
    pub fn new(modulation: Modulation, baud: u32, fec: FecPreference, duplex: Duplex) -> Result<Self, ConfigError> {
        // QpskV26's variant is mandatory by construction (spec.md §4.1:
        // "attempting to use QPSK without explicit variant is an error"),
        // so there's nothing further to validate for it here.
        if matches!(modulation, Modulation::Afsk { .. }) && !matches!(baud, 300 | 1200) {
            return Err(ConfigError::InvalidBaud(baud));
        }
        Ok(ChannelConfig { modulation, baud, fec, duplex, n_subchannels: 1, n_slicers: 1 })
    }

    pub fn with_subchannels(mut self, n: usize) -> Result<Self, ConfigError> {
        if n == 0 || n > MAX_SUBCHANNELS {
            return Err(ConfigError::TooManySubchannels { max: MAX_SUBCHANNELS, got: n });
        }
        self.n_subchannels = n;
        Ok(self)
    }

    pub fn with_slicers(mut self, n: usize) -> Result<Self, ConfigError> {
        if n == 0 || n > MAX_SLICERS {
            return Err(ConfigError::TooManySlicers { max: MAX_SLICERS, got: n });
        }
        self.n_slicers = n;
        Ok(self)
    }
}

/// Sample rate assumed when a caller doesn't open a real [`crate::audio::AudioDevice`]
/// first (demo binaries, tests): a common rate well above the Nyquist rate
/// for 2200 Hz AFSK mark/space tones.
pub const DEFAULT_SAMPLE_RATE: u32 = 9600;

/// One physical audio device, exposing 1 (mono) or 2 (stereo) radio
/// channels, all sampled at the device's one sample rate (spec.md §3: "a
/// channel references its audio device").
#[derive(Debug, Clone)]
pub struct AudioConfig {
    pub channels: Vec<ChannelConfig>,
    pub sample_rate: u32,
}

impl AudioConfig {
    pub fn mono(channel: ChannelConfig) -> Self {
        Self::mono_at(channel, DEFAULT_SAMPLE_RATE)
    }

    pub fn mono_at(channel: ChannelConfig, sample_rate: u32) -> Self {
        AudioConfig { channels: vec![channel], sample_rate }
    }

    pub fn stereo(left: ChannelConfig, right: ChannelConfig) -> Self {
        Self::stereo_at(left, right, DEFAULT_SAMPLE_RATE)
    }

    pub fn stereo_at(left: ChannelConfig, right: ChannelConfig, sample_rate: u32) -> Self {
        AudioConfig { channels: vec![left, right], sample_rate }
    }

    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }
}

/// The full modem configuration: up to `MAX_AUDIO_DEVICES` audio devices,
/// each with 1 or 2 radio channels indexed `0..2*devices`.
#[derive(Debug, Clone, Default)]
pub struct ModemConfig {
    pub devices: Vec<AudioConfig>,
}

impl ModemConfig {
    pub fn new(devices: Vec<AudioConfig>) -> Result<Self, ConfigError> {
        if devices.len() > MAX_AUDIO_DEVICES {
            return Err(ConfigError::ChannelOutOfRange(devices.len() * 2, MAX_AUDIO_DEVICES * 2));
        }
        Ok(ModemConfig { devices })
    }

    /// Total number of radio channels (`0..2*devices`), regardless of
    /// whether each device is mono or stereo.
    pub fn channel_count(&self) -> usize {
        self.devices.iter().map(|d| d.channel_count()).sum()
    }

    /// Map a channel index to its owning device index (spec.md §3: "a
    /// channel references its audio device via integer division by 2").
    pub fn device_for_channel(&self, channel: usize) -> Result<usize, ConfigError> {
        let device = channel / 2;
        if device >= self.devices.len() {
            return Err(ConfigError::ChannelOutOfRange(channel, self.channel_count()));
        }
        Ok(device)
    }

    pub fn channel(&self, index: usize) -> Result<&ChannelConfig, ConfigError> {
        let device = self.device_for_channel(index)?;
        let local = index % 2;
        self.devices[device]
            .channels
            .get(local)
            .ok_or(ConfigError::ChannelOutOfRange(index, self.channel_count()))
    }

    /// Sample rate of the audio device that owns `index` (spec.md §4.1: the
    /// tone codec is driven at whatever rate the device capturing it runs
    /// at).
    pub fn sample_rate_for_channel(&self, index: usize) -> Result<u32, ConfigError> {
        let device = self.device_for_channel(index)?;
        Ok(self.devices[device].sample_rate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn afsk_channel() -> ChannelConfig {
        ChannelConfig::new(Modulation::Afsk { mark_hz: 1200, space_hz: 2200 }, 1200, FecPreference::Off, Duplex::Half).unwrap()
    }

    #[test]
    fn invalid_afsk_baud_is_rejected() {
        let err = ChannelConfig::new(Modulation::Afsk { mark_hz: 1200, space_hz: 2200 }, 9600, FecPreference::Off, Duplex::Half).unwrap_err();
        assert_eq!(err, ConfigError::InvalidBaud(9600));
    }

    #[test]
    fn channel_to_device_mapping() {
        let cfg = ModemConfig::new(vec![AudioConfig::stereo(afsk_channel(), afsk_channel()), AudioConfig::mono(afsk_channel())]).unwrap();
        assert_eq!(cfg.device_for_channel(0).unwrap(), 0);
        assert_eq!(cfg.device_for_channel(1).unwrap(), 0);
        assert_eq!(cfg.device_for_channel(2).unwrap(), 1);
        assert!(cfg.device_for_channel(3).is_err());
    }

    #[test]
    fn too_many_subchannels_rejected() {
        let err = afsk_channel().with_subchannels(10).unwrap_err();
        assert_eq!(err, ConfigError::TooManySubchannels { max: 9, got: 10 });
    }
}
