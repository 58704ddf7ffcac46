//! Core signal-to-packet-to-signal pipeline and AX.25 v2.2 data-link state
//! machine for an amateur packet radio TNC: tone codec, HDLC/FX.25/IL2P
//! framing, the AX.25 packet object, the receive dispatch queue, the
//! transmit scheduler, the connected-mode link state machine, and the
//! channel supervisor that ties a configured set of audio devices to all of
//! the above.

pub mod audio;
pub mod ax25;
pub mod config;
pub mod datalink;
pub mod dlq;
pub mod error;
pub mod fx25;
pub mod hdlc;
pub mod il2p;
pub mod rs;
pub mod sidechannel;
pub mod supervisor;
pub mod tone;
pub mod txsched;
