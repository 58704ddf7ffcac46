//! The AX.25 packet object (C6): an owned byte buffer holding the frame
//! exactly as it appears on the air (address field, control, optional PID,
//! info — FCS excluded, it is only ever present transiently on the wire).

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;

use super::address::{decode_field, encode_field, Address};
use crate::error::Ax25Error;

/// Sequence-number modulus a frame/link uses. `Unknown` triggers the
/// heuristic of spec.md §4.6 when decoding the control field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Modulo {
    #[default]
    Unknown,
    Mod8,
    Mod128,
}

/// Decoded frame-type view, spec.md §4.6.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameType {
    I { ns: u8, nr: u8, pf: bool, pid: u8 },
    SRr { nr: u8, pf: bool },
    SRnr { nr: u8, pf: bool },
    SRej { nr: u8, pf: bool },
    SSrej { nr: u8, pf: bool },
    USabm { pf: bool },
    USabme { pf: bool },
    UDisc { pf: bool },
    UDm { pf: bool },
    UUa { pf: bool },
    UFrmr { pf: bool },
    UUi { pf: bool, pid: u8 },
    UXid { pf: bool },
    UTest { pf: bool },
    NotAx25,
}

/// Command/response classification from the destination/source SSID C/R
/// bits (spec.md §4.6, AX.25 v2.2 §6.1.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandResponse {
    Command,
    Response,
    Indeterminate,
}

const PID_NONE: u8 = 0xF0; // "no layer 3" - also the usual APRS PID.
const PID_SEGMENT: u8 = 0x08;

const SABM: u8 = 0x2F;
const SABME: u8 = 0x6F;
const DISC: u8 = 0x43;
const DM: u8 = 0x0F;
const UA: u8 = 0x63;
const FRMR: u8 = 0x87;
const UI: u8 = 0x03;
const XID: u8 = 0xAF;
const TEST: u8 = 0xE3;
const PF_BIT: u8 = 0x10;
const U_MASK: u8 = !PF_BIT;

static LIVE_PACKETS: AtomicUsize = AtomicUsize::new(0);

/// Number of [`Ax25Packet`] instances currently alive in this process.
/// Backs the leak-detection heuristic the channel supervisor (C10) logs
/// against (spec.md §9, SPEC_FULL.md §4.10).
pub fn live_packet_count() -> usize {
    LIVE_PACKETS.load(Ordering::Relaxed)
}

/// An AX.25 frame exactly as it appears on the air, minus the FCS.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ax25Packet {
    bytes: Vec<u8>,
    addr_len: usize,
    release_time: u64,
    modulo: Modulo,
}

impl Ax25Packet {
    /// Build a packet from fully-formed addresses, control bytes, optional
    /// PID, and info field. `control` is 1 or 2 bytes, low byte first, per
    /// `modulo`.
    pub fn build(
        addrs: &[Address],
        control: &[u8],
        pid: Option<u8>,
        info: &[u8],
        strict: bool,
        modulo: Modulo,
    ) -> Result<Self, Ax25Error> {
        let mut bytes = encode_field(addrs, strict)?;
        bytes.extend_from_slice(control);
        if let Some(p) = pid {
            bytes.push(p);
        }
        bytes.extend_from_slice(info);
        Self::from_bytes_with_modulo(bytes, modulo)
    }

    /// Parse a raw on-air frame (address field through info, FCS already
    /// stripped and verified by the HDLC layer).
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self, Ax25Error> {
        Self::from_bytes_with_modulo(bytes, Modulo::Unknown)
    }

    pub fn from_bytes_with_modulo(bytes: Vec<u8>, modulo: Modulo) -> Result<Self, Ax25Error> {
        if bytes.len() < 15 || bytes.len() > 330 {
            return Err(Ax25Error::BadFrameLength(bytes.len()));
        }
        let (_, addr_len) = decode_field(&bytes)?;
        LIVE_PACKETS.fetch_add(1, Ordering::Relaxed);
        Ok(Ax25Packet {
            bytes,
            addr_len,
            release_time: monotonic_secs(),
            modulo,
        })
    }

    /// The raw on-air bytes (address field through info, no FCS).
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes.clone()
    }

    // `into_bytes` clones rather than moving out of `self` because `Drop`
    // (for the live-packet accounting) forbids destructuring by value.

    pub fn modulo(&self) -> Modulo {
        self.modulo
    }

    pub fn set_modulo(&mut self, modulo: Modulo) {
        self.modulo = modulo;
    }

    pub fn release_time(&self) -> u64 {
        self.release_time
    }

    fn addresses(&self) -> Vec<Address> {
        decode_field(&self.bytes).map(|(a, _)| a).unwrap_or_default()
    }

    pub fn num_addr(&self) -> usize {
        self.addresses().len()
    }

    pub fn get_addr(&self, i: usize) -> Option<String> {
        self.addresses().get(i).map(|a| a.callsign.clone())
    }

    pub fn get_addr_with_ssid(&self, i: usize) -> Option<String> {
        self.addresses().get(i).map(|a| a.to_text(true))
    }

    pub fn get_h(&self, i: usize) -> Option<bool> {
        self.addresses().get(i).map(|a| a.h_bit)
    }

    pub fn get_ssid(&self, i: usize) -> Option<u8> {
        self.addresses().get(i).map(|a| a.ssid)
    }

    fn control_len(&self) -> usize {
        match self.modulo {
            Modulo::Mod128 => {
                if self.is_u_frame_at(self.addr_len) {
                    1
                } else {
                    2
                }
            }
            Modulo::Mod8 => 1,
            Modulo::Unknown => self.heuristic_control_len(),
        }
    }

    fn is_u_frame_at(&self, off: usize) -> bool {
        self.bytes.get(off).map(|&b| b & 0x03 == 0x03).unwrap_or(false)
    }

    fn heuristic_control_len(&self) -> usize {
        let off = self.addr_len;
        let Some(&b0) = self.bytes.get(off) else {
            return 1;
        };
        if b0 & 0x03 == 0x03 {
            return 1; // U frames never carry an extended control field.
        }
        let Some(&b1) = self.bytes.get(off + 1) else {
            return 1;
        };
        let is_s_frame = b0 & 0x03 == 0x01;
        let pid_after_one_byte = self.bytes.get(off + 1).copied();
        let looks_modulo128 = is_s_frame
            || pid_after_one_byte == Some(PID_NONE)
            || pid_after_one_byte == Some(PID_SEGMENT);
        let _ = b1;
        if looks_modulo128 {
            2
        } else {
            1
        }
    }

    /// Raw control field bytes (1 or 2, low byte first).
    pub fn get_control(&self) -> Option<&[u8]> {
        let off = self.addr_len;
        let len = self.control_len();
        self.bytes.get(off..off + len)
    }

    fn is_u(&self) -> bool {
        self.get_control().map(|c| c[0] & 0x03 == 0x03).unwrap_or(false)
    }

    pub fn get_pid(&self) -> Option<u8> {
        let off = self.addr_len + self.control_len();
        if self.is_u() {
            // Only the UI frame carries a PID among U frames.
            let ctrl = self.get_control()?[0] & U_MASK;
            if ctrl != UI {
                return None;
            }
        }
        self.bytes.get(off).copied()
    }

    fn info_offset(&self) -> usize {
        let off = self.addr_len + self.control_len();
        let is_i_or_ui = self.get_control().map(|c| c[0] & 0x01 == 0 || c[0] & U_MASK == UI).unwrap_or(false);
        if is_i_or_ui {
            off + 1
        } else {
            off
        }
    }

    pub fn get_info(&self) -> &[u8] {
        let off = self.info_offset().min(self.bytes.len());
        &self.bytes[off..]
    }

    /// Command/response classification from the destination (C) and
    /// source (R) SSID-byte high bits.
    pub fn command_response(&self) -> CommandResponse {
        let addrs = self.addresses();
        let c = addrs.first().map(|a| a.h_bit).unwrap_or(false);
        let r = addrs.get(1).map(|a| a.h_bit).unwrap_or(false);
        match (c, r) {
            (true, false) => CommandResponse::Command,
            (false, true) => CommandResponse::Response,
            _ => CommandResponse::Indeterminate,
        }
    }

    pub fn frame_type(&self) -> FrameType {
        let Some(ctrl) = self.get_control() else {
            return FrameType::NotAx25;
        };
        let b0 = ctrl[0];
        if b0 & 0x01 == 0 {
            // I frame.
            let (ns, nr, pf) = match self.modulo_effective() {
                Modulo::Mod128 => {
                    if ctrl.len() < 2 {
                        return FrameType::NotAx25;
                    }
                    ((b0 >> 1) & 0x7F, (ctrl[1] >> 1) & 0x7F, ctrl[1] & 0x01 != 0)
                }
                _ => ((b0 >> 1) & 0x07, (b0 >> 5) & 0x07, b0 & 0x10 != 0),
            };
            let pid = self.get_pid().unwrap_or(0);
            return FrameType::I { ns, nr, pf, pid };
        }
        if b0 & 0x03 == 0x01 {
            // S frame.
            let stype = (b0 >> 2) & 0x03;
            let (nr, pf) = match self.modulo_effective() {
                Modulo::Mod128 => {
                    if ctrl.len() < 2 {
                        return FrameType::NotAx25;
                    }
                    ((ctrl[1] >> 1) & 0x7F, ctrl[1] & 0x01 != 0)
                }
                _ => ((b0 >> 5) & 0x07, b0 & 0x10 != 0),
            };
            return match stype {
                0b00 => FrameType::SRr { nr, pf },
                0b01 => FrameType::SRej { nr, pf },
                0b10 => FrameType::SRnr { nr, pf },
                0b11 => FrameType::SSrej { nr, pf },
                _ => unreachable!(),
            };
        }
        // U frame.
        let pf = b0 & PF_BIT != 0;
        match b0 & U_MASK {
            SABM => FrameType::USabm { pf },
            SABME => FrameType::USabme { pf },
            DISC => FrameType::UDisc { pf },
            DM => FrameType::UDm { pf },
            UA => FrameType::UUa { pf },
            FRMR => FrameType::UFrmr { pf },
            UI => FrameType::UUi { pf, pid: self.get_pid().unwrap_or(0) },
            XID => FrameType::UXid { pf },
            TEST => FrameType::UTest { pf },
            _ => FrameType::NotAx25,
        }
    }

    fn modulo_effective(&self) -> Modulo {
        match self.modulo {
            Modulo::Unknown => {
                if self.heuristic_control_len() == 2 {
                    Modulo::Mod128
                } else {
                    Modulo::Mod8
                }
            }
            m => m,
        }
    }

    /// CRC-16/X-25 over source + destination + info, digipeaters excluded
    /// and trailing CR/LF/space stripped, for duplicate suppression
    /// (spec.md §4.6).
    pub fn dedupe_hash(&self) -> u16 {
        let addrs = self.addresses();
        let mut buf = Vec::new();
        if let Some(dest) = addrs.first() {
            buf.extend_from_slice(dest.callsign.as_bytes());
        }
        if let Some(src) = addrs.get(1) {
            buf.extend_from_slice(src.callsign.as_bytes());
        }
        let mut info = self.get_info();
        while let Some((&last, rest)) = info.split_last() {
            if last == b'\r' || last == b'\n' || last == b' ' {
                info = rest;
            } else {
                break;
            }
        }
        buf.extend_from_slice(info);
        let mut crc = crate::hdlc::crc::Crc16::new();
        crc.update_slice(&buf);
        crc.finish_u16()
    }

    /// Insert a digipeater address at `pos`, shifting later addresses up
    /// and re-deriving the last-address-bit invariant.
    pub fn insert_digi(&mut self, pos: usize, addr: Address, strict: bool) -> Result<(), Ax25Error> {
        let mut addrs = self.addresses();
        if pos == 0 || pos > addrs.len() {
            return Err(Ax25Error::BadAddressCount(addrs.len() + 1));
        }
        addrs.insert(pos, addr);
        self.rebuild_addrs(addrs, strict)
    }

    /// Strip the digipeater address at `pos` (must not be source/dest).
    pub fn remove_digi(&mut self, pos: usize, strict: bool) -> Result<(), Ax25Error> {
        let mut addrs = self.addresses();
        if pos < 2 || pos >= addrs.len() {
            return Err(Ax25Error::BadAddressCount(addrs.len()));
        }
        addrs.remove(pos);
        self.rebuild_addrs(addrs, strict)
    }

    fn rebuild_addrs(&mut self, addrs: Vec<Address>, strict: bool) -> Result<(), Ax25Error> {
        let rest = self.bytes[self.addr_len..].to_vec();
        let new_field = encode_field(&addrs, strict)?;
        self.addr_len = new_field.len();
        self.bytes = new_field;
        self.bytes.extend_from_slice(&rest);
        Ok(())
    }
}

impl Drop for Ax25Packet {
    fn drop(&mut self) {
        LIVE_PACKETS.fetch_sub(1, Ordering::Relaxed);
    }
}

fn monotonic_secs() -> u64 {
    use std::sync::OnceLock;
    static START: OnceLock<Instant> = OnceLock::new();
    let start = START.get_or_init(Instant::now);
    start.elapsed().as_secs()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ui_frame() -> Ax25Packet {
        let dest = Address::new("APRS", 0);
        let src = Address::new("N0CALL", 0);
        Ax25Packet::build(&[dest, src], &[UI | PF_BIT], Some(PID_NONE), b"hello", true, Modulo::Mod8).unwrap()
    }

    #[test]
    fn pack_parse_byte_identity() {
        let p = ui_frame();
        let bytes = p.as_bytes().to_vec();
        let p2 = Ax25Packet::from_bytes(bytes.clone()).unwrap();
        assert_eq!(p2.as_bytes(), &bytes[..]);
    }

    #[test]
    fn ui_frame_type_and_info() {
        let p = ui_frame();
        assert_eq!(p.get_info(), b"hello");
        assert_eq!(p.get_pid(), Some(PID_NONE));
        match p.frame_type() {
            FrameType::UUi { pf, pid } => {
                assert!(pf);
                assert_eq!(pid, PID_NONE);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn i_frame_modulo8_fields() {
        let dest = Address::new("DEST", 0);
        let src = Address::new("SRC", 1);
        // N(S)=3, N(R)=5, P/F=1 -> bit0=0, bits1-3=011, bit4=1, bits5-7=101
        let ctrl = 0b101_1_011_0u8;
        let p = Ax25Packet::build(&[dest, src], &[ctrl], Some(PID_NONE), b"data", true, Modulo::Mod8).unwrap();
        match p.frame_type() {
            FrameType::I { ns, nr, pf, pid } => {
                assert_eq!(ns, 3);
                assert_eq!(nr, 5);
                assert!(pf);
                assert_eq!(pid, PID_NONE);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn dedupe_hash_ignores_digis_and_trailing_ws() {
        let p1 = Ax25Packet::build(
            &[Address::new("APRS", 0), Address::new("N0CALL", 0)],
            &[UI],
            Some(PID_NONE),
            b"msg\r\n",
            true,
            Modulo::Mod8,
        )
        .unwrap();
        let p2 = Ax25Packet::build(
            &[Address::new("APRS", 0), Address::new("N0CALL", 0), Address::new("WIDE1", 1)],
            &[UI],
            Some(PID_NONE),
            b"msg",
            true,
            Modulo::Mod8,
        )
        .unwrap();
        assert_eq!(p1.dedupe_hash(), p2.dedupe_hash());
    }
}
