//! XID (exchange identification) parameter encoding (spec.md §4.9/§6):
//! Format Indicator `0x82`, Group Identifier `0x80`, then a big-endian
//! 16-bit triple-block length followed by PI/PL/PV parameter triples.
//!
//! spec.md names the two bitmask parameters ("classes-of-procedures",
//! "HDLC optional functions bitmap") by reference to AX.25 v2.2 Figure 4.5
//! without reproducing its bit table, and the only fully worked example is
//! E5. The bit assignments below are this implementation's resolution of
//! that gap (recorded in DESIGN.md): enough of the figure to reproduce E5
//! exactly, with the rest of each bitmask reserved at zero.

use crate::ax25::Modulo;

const FORMAT_INDICATOR: u8 = 0x82;
const GROUP_IDENTIFIER: u8 = 0x80;

const PI_CLASSES_OF_PROCEDURES: u8 = 0x02;
const PI_HDLC_FUNCTIONS: u8 = 0x03;
const PI_I_FIELD_LENGTH_RX: u8 = 0x06;
const PI_WINDOW_SIZE_RX: u8 = 0x08;
const PI_ACK_TIMER: u8 = 0x09;
const PI_RETRIES: u8 = 0x0A;

/// Classes-of-procedures bit: Balanced Asynchronous (Class I) operation,
/// always set by this implementation.
const COP_BALANCED_ABM: u16 = 0x0100;
/// Classes-of-procedures bit: half-duplex operation requested.
const COP_HALF_DUPLEX: u16 = 0x2000;

const HDLC_REJ_CMD_RESP: u32 = 1 << 23;
const HDLC_EXTENDED_ADDRESS: u32 = 1 << 18;
const HDLC_MODULO_128: u32 = 1 << 17;
const HDLC_SREJ_CMD_RESP: u32 = 1 << 15;
const HDLC_16_BIT_FCS: u32 = 1 << 13;
const HDLC_TEST_CMD_RESP: u32 = 1 << 11;
const HDLC_SREJ_SINGLE_ONLY: u32 = 1 << 1;

/// SREJ negotiation outcome (spec.md §4.9: "SREJ... Multi-SREJ extends
/// with a list").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SrejCapability {
    None,
    Single,
    Multi,
}

/// The negotiable parameter set of one XID exchange (spec.md §4.9).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct XidParams {
    pub full_duplex: bool,
    pub modulo: Modulo,
    pub srej: SrejCapability,
    /// Maximum I-field length the *sender* is willing to receive, in bytes.
    pub i_field_length_rx_bytes: u16,
    pub window_size_rx: u8,
    pub ack_timer_ms: u16,
    pub retries: u8,
}

impl XidParams {
    fn classes_of_procedures(&self) -> u16 {
        let mut v = COP_BALANCED_ABM;
        if !self.full_duplex {
            v |= COP_HALF_DUPLEX;
        }
        v
    }

    fn hdlc_functions(&self) -> u32 {
        let mut v = HDLC_REJ_CMD_RESP | HDLC_EXTENDED_ADDRESS | HDLC_16_BIT_FCS | HDLC_TEST_CMD_RESP;
        if self.modulo == Modulo::Mod128 {
            v |= HDLC_MODULO_128;
        }
        match self.srej {
            SrejCapability::None => {}
            SrejCapability::Single => v |= HDLC_SREJ_CMD_RESP | HDLC_SREJ_SINGLE_ONLY,
            SrejCapability::Multi => v |= HDLC_SREJ_CMD_RESP,
        }
        v
    }
}

/// Encode one XID information field per spec.md §6.
pub fn encode(params: &XidParams) -> Vec<u8> {
    let mut triples = Vec::new();
    triples.push(PI_CLASSES_OF_PROCEDURES);
    triples.push(2);
    triples.extend_from_slice(&params.classes_of_procedures().to_be_bytes());

    triples.push(PI_HDLC_FUNCTIONS);
    triples.push(3);
    let f = params.hdlc_functions().to_be_bytes();
    triples.extend_from_slice(&f[1..]); // low 3 bytes of the 24-bit field

    triples.push(PI_I_FIELD_LENGTH_RX);
    triples.push(2);
    triples.extend_from_slice(&(params.i_field_length_rx_bytes as u32 * 8).to_be_bytes()[2..]);

    triples.push(PI_WINDOW_SIZE_RX);
    triples.push(1);
    triples.push(params.window_size_rx);

    triples.push(PI_ACK_TIMER);
    triples.push(2);
    triples.extend_from_slice(&params.ack_timer_ms.to_be_bytes());

    triples.push(PI_RETRIES);
    triples.push(1);
    triples.push(params.retries);

    let mut out = Vec::with_capacity(4 + triples.len());
    out.push(FORMAT_INDICATOR);
    out.push(GROUP_IDENTIFIER);
    out.extend_from_slice(&(triples.len() as u16).to_be_bytes());
    out.extend_from_slice(&triples);
    out
}

/// Decode an XID information field back into [`XidParams`], so far as this
/// implementation's bit assignments can recover it. Returns `None` on a
/// malformed header or truncated triple list.
pub fn decode(bytes: &[u8]) -> Option<XidParams> {
    if bytes.len() < 4 || bytes[0] != FORMAT_INDICATOR || bytes[1] != GROUP_IDENTIFIER {
        return None;
    }
    let len = u16::from_be_bytes([bytes[2], bytes[3]]) as usize;
    let triples = bytes.get(4..4 + len)?;

    let mut full_duplex = true;
    let mut modulo = Modulo::Mod8;
    let mut srej = SrejCapability::None;
    let mut i_field_length_rx_bytes = 0u16;
    let mut window_size_rx = 0u8;
    let mut ack_timer_ms = 0u16;
    let mut retries = 0u8;

    let mut i = 0;
    while i + 2 <= triples.len() {
        let pi = triples[i];
        let pl = triples[i + 1] as usize;
        let pv = triples.get(i + 2..i + 2 + pl)?;
        match pi {
            PI_CLASSES_OF_PROCEDURES if pl == 2 => {
                let v = u16::from_be_bytes([pv[0], pv[1]]);
                full_duplex = v & COP_HALF_DUPLEX == 0;
            }
            PI_HDLC_FUNCTIONS if pl == 3 => {
                let v = ((pv[0] as u32) << 16) | ((pv[1] as u32) << 8) | pv[2] as u32;
                modulo = if v & HDLC_MODULO_128 != 0 { Modulo::Mod128 } else { Modulo::Mod8 };
                srej = if v & HDLC_SREJ_CMD_RESP == 0 {
                    SrejCapability::None
                } else if v & HDLC_SREJ_SINGLE_ONLY != 0 {
                    SrejCapability::Single
                } else {
                    SrejCapability::Multi
                };
            }
            PI_I_FIELD_LENGTH_RX if pl == 2 => {
                let bits = u16::from_be_bytes([pv[0], pv[1]]);
                i_field_length_rx_bytes = bits / 8;
            }
            PI_WINDOW_SIZE_RX if pl == 1 => window_size_rx = pv[0],
            PI_ACK_TIMER if pl == 2 => ack_timer_ms = u16::from_be_bytes([pv[0], pv[1]]),
            PI_RETRIES if pl == 1 => retries = pv[0],
            _ => {}
        }
        i += 2 + pl;
    }

    Some(XidParams { full_duplex, modulo, srej, i_field_length_rx_bytes, window_size_rx, ack_timer_ms, retries })
}

#[cfg(test)]
mod tests {
    use super::*;

    /// spec.md §8 E5.
    #[test]
    fn e5_reference_vector() {
        let params = XidParams {
            full_duplex: false,
            modulo: Modulo::Mod128,
            srej: SrejCapability::Single,
            i_field_length_rx_bytes: 128,
            window_size_rx: 2,
            ack_timer_ms: 4096,
            retries: 3,
        };
        let encoded = encode(&params);
        let expected: Vec<u8> = vec![
            0x82, 0x80, 0x00, 0x17, 0x02, 0x02, 0x21, 0x00, 0x03, 0x03, 0x86, 0xA8, 0x02, 0x06, 0x02, 0x04, 0x00, 0x08, 0x01, 0x02, 0x09,
            0x02, 0x10, 0x00, 0x0A, 0x01, 0x03,
        ];
        assert_eq!(encoded, expected);
    }

    #[test]
    fn round_trips_through_decode() {
        let params = XidParams {
            full_duplex: true,
            modulo: Modulo::Mod8,
            srej: SrejCapability::None,
            i_field_length_rx_bytes: 256,
            window_size_rx: 4,
            ack_timer_ms: 3000,
            retries: 10,
        };
        let encoded = encode(&params);
        let decoded = decode(&encoded).unwrap();
        assert_eq!(decoded, params);
    }
}
