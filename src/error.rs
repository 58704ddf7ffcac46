//! Crate-wide error types.
//!
//! Each subsystem that can fail in a way visible to its caller gets its own
//! `thiserror` enum; [`TncError`] composes them for call sites that cross
//! subsystem boundaries (e.g. the channel supervisor).

use thiserror::Error;

/// Configuration errors: invalid baud rate, missing QPSK variant, unknown
/// FX.25 tag, etc. These abort initialization (spec.md §7).
#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum ConfigError {
    #[error("unsupported baud rate: {0}")]
    InvalidBaud(u32),
    #[error("QPSK/8PSK modulation requires an explicit constellation variant")]
    MissingPskVariant,
    #[error("unknown FX.25 tag preference: {0}")]
    UnknownFx25Tag(u16),
    #[error("audio channel index {0} out of range for {1} configured devices")]
    ChannelOutOfRange(usize, usize),
    #[error("at most {max} subchannels are supported, got {got}")]
    TooManySubchannels { max: usize, got: usize },
    #[error("at most {max} slicers per subchannel are supported, got {got}")]
    TooManySlicers { max: usize, got: usize },
}

/// Reed-Solomon codec errors.
#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum RsError {
    #[error("message of length {0} does not fit in RS(n={1},k={2})")]
    MessageTooLong(usize, usize, usize),
    #[error("block uncorrectable: too many errors for nroots={0}")]
    Uncorrectable(usize),
    #[error("invalid erasure position {0} for block length {1}")]
    InvalidErasure(usize, usize),
}

/// FX.25 framing errors.
#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum Fx25Error {
    #[error("no correlation tag matched within hamming tolerance")]
    NoTagMatch,
    #[error("data length {0} exceeds capacity {1} of any defined tag")]
    NoTagFits(usize, usize),
    #[error(transparent)]
    Rs(#[from] RsError),
}

/// IL2P framing errors.
#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum Il2pError {
    #[error("sync word not found")]
    NoSync,
    #[error("header uncorrectable")]
    HeaderUncorrectable,
    #[error("payload block uncorrectable")]
    PayloadUncorrectable,
    #[error("payload length {0} exceeds maximum {1}")]
    PayloadTooLong(usize, usize),
    #[error(transparent)]
    Rs(#[from] RsError),
}

/// HDLC engine errors.
#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum HdlcError {
    #[error("frame control escape/abort sequence seen")]
    Aborted,
    #[error("frame CRC did not validate")]
    BadFcs,
    #[error("frame bit count {0} is not a multiple of 8")]
    Misaligned(usize),
    #[error("frame length {0} outside allowed range {1}..{2}")]
    BadLength(usize, usize, usize),
}

/// AX.25 packet parse/build errors.
#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum Ax25Error {
    #[error("frame too short or too long: {0} bytes")]
    BadFrameLength(usize),
    #[error("address field is not a whole number of 7-byte groups")]
    MisalignedAddressField,
    #[error("address count {0} outside allowed range 2..=10")]
    BadAddressCount(usize),
    #[error("address byte has low bit set where it must be clear")]
    BadAddressTermination,
    #[error("callsign longer than 6 characters: {0:?}")]
    CallsignTooLong(String),
    #[error("lower-case callsign rejected in strict mode: {0:?}")]
    LowerCaseCallsign(String),
    #[error("SSID {0} outside 0..=15")]
    BadSsid(u8),
    #[error("`*` used in non-terminal address position")]
    MisplacedHBitMark,
    #[error("malformed TNC-2 text: {0}")]
    BadText(String),
    #[error("malformed hex escape in info field: {0:?}")]
    BadHexEscape(String),
}

/// Data-link (C9) protocol errors: FRMR conditions.
#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum LinkError {
    #[error("invalid control field {0:#04x}")]
    InvalidControl(u16),
    #[error("I field exceeded N1 maximum ({len} > {max})")]
    InfoTooLong { len: usize, max: usize },
    #[error("invalid N(R) {nr} received (V(A)={va}, V(S)={vs})")]
    InvalidNr { nr: u8, va: u8, vs: u8 },
    #[error("received unexpected U or S frame under timer-recovery")]
    UnexpectedFrame,
    #[error("retry limit exceeded, link reset")]
    RetriesExhausted,
}

/// Receive dispatch queue errors.
#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum DlqError {
    #[error("consumer already shut down")]
    ShutDown,
}

/// Top level error used at module boundaries that can fail for more than
/// one subsystem-specific reason.
#[derive(Debug, Error)]
pub enum TncError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Rs(#[from] RsError),
    #[error(transparent)]
    Fx25(#[from] Fx25Error),
    #[error(transparent)]
    Il2p(#[from] Il2pError),
    #[error(transparent)]
    Hdlc(#[from] HdlcError),
    #[error(transparent)]
    Ax25(#[from] Ax25Error),
    #[error(transparent)]
    Link(#[from] LinkError),
    #[error(transparent)]
    Dlq(#[from] DlqError),
}
