//! AX.25 packet object (C6): addresses, control/PID/info accessors, and
//! both the on-air byte form and the TNC-2 text form.

pub mod address;
pub mod frame;
pub mod text;

pub use address::Address;
pub use frame::{live_packet_count, Ax25Packet, CommandResponse, FrameType, Modulo};
pub use text::{parse as parse_text, TextAddress, TextFrame};
