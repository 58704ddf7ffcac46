//! IL2P (C4): sync word, RS+scrambled header, and RS+scrambled payload
//! blocks wrapping a bare AX.25 frame (spec.md §4.4). Unlike FX.25, IL2P
//! replaces HDLC bit-stuffed framing entirely rather than wrapping it.

pub mod header;
pub mod scrambler;

use crate::ax25::address;
use crate::error::Il2pError;
use crate::rs::RsCodec;
use header::{FrameKind, Il2pHeader, PidClass, HEADER_LEN};
use scrambler::{bytes_to_msb_bits, msb_bits_to_bytes};

/// 24-bit sync word, most-significant bit first on the wire.
pub const SYNC_WORD: u32 = 0xF1_5E_48;
const SYNC_BITS: usize = 24;
const HEADER_NROOTS: usize = 2;
/// AX.25 UI control byte (modulo-8 and modulo-128 alike), P/F bit masked out.
const UI_CONTROL: u8 = 0x03;

/// One bit of wire polarity: "inverted" mode complements every bit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Polarity {
    Normal,
    Inverted,
}

fn sync_word_bits(polarity: Polarity) -> [u8; SYNC_BITS] {
    let mut bits = [0u8; SYNC_BITS];
    for (i, b) in bits.iter_mut().enumerate() {
        let raw = ((SYNC_WORD >> (SYNC_BITS - 1 - i)) & 1) as u8;
        *b = if polarity == Polarity::Inverted { raw ^ 1 } else { raw };
    }
    bits
}

fn hamming(a: u32, b: u32) -> u32 {
    (a ^ b).count_ones()
}

/// Streaming 24-bit sync-word correlator tolerating a single bit error in
/// either polarity.
pub struct SyncWatcher {
    shreg: u32,
    bits_seen: u32,
}

impl Default for SyncWatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl SyncWatcher {
    pub fn new() -> Self {
        SyncWatcher { shreg: 0, bits_seen: 0 }
    }

    pub fn push_bit(&mut self, bit: u8) -> Option<Polarity> {
        self.shreg = ((self.shreg << 1) | (bit & 1) as u32) & 0xFF_FFFF;
        self.bits_seen = self.bits_seen.saturating_add(1);
        if self.bits_seen < SYNC_BITS as u32 {
            return None;
        }
        if hamming(self.shreg, SYNC_WORD) <= 1 {
            return Some(Polarity::Normal);
        }
        if hamming(self.shreg, (!SYNC_WORD) & 0xFF_FFFF) <= 1 {
            return Some(Polarity::Inverted);
        }
        None
    }
}

/// Data length and parity-symbol count of one payload RS block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockGeom {
    pub data_len: usize,
    pub nroots: usize,
}

/// Split a `p`-byte payload into RS block geometry per spec.md §4.4.
/// Large blocks (one byte bigger than the rest) are emitted first.
pub fn payload_blocks(p: usize, max_fec: bool) -> Vec<BlockGeom> {
    if p == 0 {
        return Vec::new();
    }
    let cap = if max_fec { 239 } else { 247 };
    let n_blocks = p.div_ceil(cap);
    let small_size = p / n_blocks;
    let large_count = p - n_blocks * small_size;
    let nroots = if max_fec {
        16
    } else {
        match small_size {
            0..=61 => 2,
            62..=123 => 4,
            124..=185 => 6,
            _ => 8,
        }
    };
    let mut out = Vec::with_capacity(n_blocks);
    for i in 0..n_blocks {
        let data_len = if i < large_count { small_size + 1 } else { small_size };
        out.push(BlockGeom { data_len, nroots });
    }
    out
}

/// RS-encode and scramble one block of `data` (header or payload),
/// returning the on-air bit sequence (codeword bits plus flush).
fn encode_block(data: &[u8], nroots: usize) -> Result<Vec<u8>, Il2pError> {
    let rs = RsCodec::new(0x11d, 1, 1, nroots);
    let parity = rs.encode(data)?;
    let mut codeword = data.to_vec();
    codeword.extend_from_slice(&parity);
    Ok(scrambler::scramble_block(&bytes_to_msb_bits(&codeword)))
}

/// Descramble and RS-correct one block, returning `(data, corrections)`.
fn decode_block(coded_bits: &[u8], data_len: usize, nroots: usize) -> Result<(Vec<u8>, usize), Il2pError> {
    let total = data_len + nroots;
    let bits = scrambler::descramble_block(coded_bits, total * 8);
    let mut codeword = msb_bits_to_bytes(&bits);
    let rs = RsCodec::new(0x11d, 1, 1, nroots);
    let corrections = rs.decode(&mut codeword, &[]).map_err(|_| Il2pError::PayloadUncorrectable)?;
    codeword.truncate(data_len);
    Ok((codeword, corrections))
}

fn wire_bits_for_block(data_len: usize, nroots: usize) -> usize {
    (data_len + nroots) * 8 + scrambler::FLUSH
}

/// Pull header fields (addresses, control, PID class) out of a bare AX.25
/// frame (address..info, no FCS).
fn extract_header_fields(ax25_bytes: &[u8]) -> Option<(String, u8, String, u8, u8, PidClass)> {
    let (addrs, field_len) = address::decode_field(ax25_bytes).ok()?;
    if addrs.len() < 2 {
        return None;
    }
    let control = *ax25_bytes.get(field_len)?;
    let is_ui = control & !0x10 == UI_CONTROL;
    let pid_class = if is_ui {
        match ax25_bytes.get(field_len + 1) {
            Some(0xF0) => PidClass::None,
            Some(0x08) => PidClass::Segment,
            Some(_) => PidClass::Other,
            None => PidClass::None,
        }
    } else {
        PidClass::None
    };
    Some((addrs[0].callsign.clone(), addrs[0].ssid, addrs[1].callsign.clone(), addrs[1].ssid, control, pid_class))
}

/// Wrap a bare AX.25 frame (address..info, no FCS) as an IL2P bit stream.
pub fn encode(ax25_bytes: &[u8], max_fec: bool) -> Result<Vec<u8>, Il2pError> {
    if ax25_bytes.len() > 1023 {
        return Err(Il2pError::PayloadTooLong(ax25_bytes.len(), 1023));
    }
    let (dst_callsign, dst_ssid, src_callsign, src_ssid, control, pid_class) =
        extract_header_fields(ax25_bytes).unwrap_or((String::new(), 0, String::new(), 0, 0, PidClass::None));

    let header = Il2pHeader {
        kind: FrameKind::Ax25,
        max_fec,
        dst_callsign,
        dst_ssid,
        src_callsign,
        src_ssid,
        control,
        pid_class,
        payload_len: ax25_bytes.len() as u16,
    };
    let clear = header.encode();
    let clarified = header::clarify(&clear);
    let mut out = sync_word_bits(Polarity::Normal).to_vec();
    out.extend(encode_block(&clarified, HEADER_NROOTS)?);

    let mut offset = 0;
    for block in payload_blocks(ax25_bytes.len(), max_fec) {
        let chunk = &ax25_bytes[offset..offset + block.data_len];
        out.extend(encode_block(chunk, block.nroots)?);
        offset += block.data_len;
    }
    Ok(out)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ReceiveState {
    Searching,
    Header,
    Payload,
}

/// Result of feeding bits to [`Il2pReceiver`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Il2pEvent {
    Frame { ax25_bytes: Vec<u8>, corrections: usize },
    Dropped(Il2pError),
}

/// Streaming IL2P receiver: sync detection, then header, then chained
/// payload blocks.
pub struct Il2pReceiver {
    state: ReceiveState,
    watcher: SyncWatcher,
    polarity: Polarity,
    bitbuf: Vec<u8>,
    target_bits: usize,
    header: Option<Il2pHeader>,
    blocks: Vec<BlockGeom>,
    block_idx: usize,
    payload: Vec<u8>,
    total_corrections: usize,
}

impl Default for Il2pReceiver {
    fn default() -> Self {
        Self::new()
    }
}

impl Il2pReceiver {
    pub fn new() -> Self {
        Il2pReceiver {
            state: ReceiveState::Searching,
            watcher: SyncWatcher::new(),
            polarity: Polarity::Normal,
            bitbuf: Vec::new(),
            target_bits: wire_bits_for_block(HEADER_LEN, HEADER_NROOTS),
            header: None,
            blocks: Vec::new(),
            block_idx: 0,
            payload: Vec::new(),
            total_corrections: 0,
        }
    }

    fn reset(&mut self) {
        self.state = ReceiveState::Searching;
        self.watcher = SyncWatcher::new();
        self.bitbuf.clear();
        self.target_bits = wire_bits_for_block(HEADER_LEN, HEADER_NROOTS);
        self.header = None;
        self.blocks.clear();
        self.block_idx = 0;
        self.payload.clear();
        self.total_corrections = 0;
    }

    pub fn push_bit(&mut self, raw_bit: u8) -> Option<Il2pEvent> {
        match self.state {
            ReceiveState::Searching => {
                if let Some(p) = self.watcher.push_bit(raw_bit) {
                    self.polarity = p;
                    self.state = ReceiveState::Header;
                    self.bitbuf.clear();
                }
                None
            }
            ReceiveState::Header => {
                let bit = if self.polarity == Polarity::Inverted { raw_bit ^ 1 } else { raw_bit };
                self.bitbuf.push(bit & 1);
                if self.bitbuf.len() < self.target_bits {
                    return None;
                }
                let result = decode_block(&self.bitbuf, HEADER_LEN, HEADER_NROOTS);
                let bits = std::mem::take(&mut self.bitbuf);
                let _ = bits;
                match result {
                    Ok((clarified, corrections)) => {
                        let mut clear_buf = [0u8; HEADER_LEN];
                        clear_buf.copy_from_slice(&header::declarify(&clarified.try_into().unwrap_or([0u8; HEADER_LEN])));
                        match Il2pHeader::decode(&clear_buf) {
                            Ok(hdr) => {
                                let blocks = payload_blocks(hdr.payload_len as usize, hdr.max_fec);
                                self.total_corrections += corrections;
                                if blocks.is_empty() {
                                    let event = Il2pEvent::Frame { ax25_bytes: Vec::new(), corrections: self.total_corrections };
                                    self.reset();
                                    return Some(event);
                                }
                                self.target_bits = wire_bits_for_block(blocks[0].data_len, blocks[0].nroots);
                                self.header = Some(hdr);
                                self.blocks = blocks;
                                self.block_idx = 0;
                                self.state = ReceiveState::Payload;
                                None
                            }
                            Err(e) => {
                                self.reset();
                                Some(Il2pEvent::Dropped(e))
                            }
                        }
                    }
                    Err(e) => {
                        self.reset();
                        Some(Il2pEvent::Dropped(e))
                    }
                }
            }
            ReceiveState::Payload => {
                let bit = if self.polarity == Polarity::Inverted { raw_bit ^ 1 } else { raw_bit };
                self.bitbuf.push(bit & 1);
                if self.bitbuf.len() < self.target_bits {
                    return None;
                }
                let geom = self.blocks[self.block_idx];
                let bits = std::mem::take(&mut self.bitbuf);
                match decode_block(&bits, geom.data_len, geom.nroots) {
                    Ok((mut data, corrections)) => {
                        self.total_corrections += corrections;
                        self.payload.append(&mut data);
                        self.block_idx += 1;
                        if self.block_idx == self.blocks.len() {
                            let event = Il2pEvent::Frame { ax25_bytes: std::mem::take(&mut self.payload), corrections: self.total_corrections };
                            self.reset();
                            Some(event)
                        } else {
                            let next = self.blocks[self.block_idx];
                            self.target_bits = wire_bits_for_block(next.data_len, next.nroots);
                            None
                        }
                    }
                    Err(e) => {
                        self.reset();
                        Some(Il2pEvent::Dropped(e))
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feed(bits: &[u8]) -> Vec<Il2pEvent> {
        let mut rx = Il2pReceiver::new();
        bits.iter().filter_map(|&b| rx.push_bit(b)).collect()
    }

    #[test]
    fn payload_block_geometry_matches_spec_buckets() {
        let g = payload_blocks(64, false);
        assert_eq!(g.len(), 1);
        assert_eq!(g[0].nroots, 2);

        let g = payload_blocks(500, true);
        let total: usize = g.iter().map(|b| b.data_len).sum();
        assert_eq!(total, 500);
        assert!(g.iter().all(|b| b.nroots == 16 && b.data_len <= 239));
    }

    #[test]
    fn small_frame_round_trips() {
        let dst = address::Address::new("APRS", 0);
        let mut src = address::Address::new("N0CALL", 5);
        src.last = true;
        let mut ax25 = address::encode_field(&[dst, src], true).unwrap();
        ax25.push(UI_CONTROL);
        ax25.push(0xF0);
        ax25.extend_from_slice(b"hello il2p");

        let bits = encode(&ax25, false).unwrap();
        let events = feed(&bits);
        assert_eq!(events.len(), 1);
        match &events[0] {
            Il2pEvent::Frame { ax25_bytes, corrections } => {
                assert_eq!(ax25_bytes, &ax25);
                assert_eq!(*corrections, 0);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn multi_block_frame_round_trips_with_errors() {
        let dst = address::Address::new("WIDE1", 1);
        let mut src = address::Address::new("KC1ABC", 0);
        src.last = true;
        let mut ax25 = address::encode_field(&[dst, src], true).unwrap();
        ax25.push(UI_CONTROL);
        ax25.push(0xF0);
        ax25.extend(std::iter::repeat(b'x').take(300));

        let mut bits = encode(&ax25, true).unwrap();
        // flip a handful of bits inside the first payload block to exercise
        // RS correction end to end.
        for i in 0..5 {
            let idx = 400 + i * 37;
            bits[idx] ^= 1;
        }
        let events = feed(&bits);
        assert_eq!(events.len(), 1);
        match &events[0] {
            Il2pEvent::Frame { ax25_bytes, .. } => assert_eq!(ax25_bytes, &ax25),
            other => panic!("unexpected {other:?}"),
        }
    }
}
