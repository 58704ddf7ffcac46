//! FX.25 (C3): a correlation-tag + Reed-Solomon wrapper around an
//! HDLC-encoded AX.25 frame, transparent to upper layers when no tag is
//! present on the air.
//!
//! Wire format (spec.md §4.3/§6): a 64-bit correlation tag, LSB of the tag
//! value transmitted first, followed by a fixed-size RS-coded block
//! holding the HDLC-framed AX.25 frame (flags included) padded with extra
//! `0x7E` flags out to the tag's data capacity, followed by the tag's
//! parity symbols.

pub mod tags;

use crate::error::Fx25Error;
use crate::hdlc::{self, DeframeEvent, HdlcDeframer, FLAG};
use crate::rs::RsCodec;
use tags::{by_tag, hamming_distance, TagInfo, AUTO_ORDER, TAGS};

/// Transmit-side tag preference (spec.md §4.3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fx25Pref {
    /// FX.25 disabled; caller should send plain AX.25.
    Off,
    /// Prefer tags in the order {0x04, 0x03, 0x06, 0x09, 0x05, 0x01}.
    Auto,
    /// Pick the shortest tag with exactly this many parity bytes
    /// (16, 32, or 64) that fits the data.
    Parity(u8),
    /// Force a specific tag number (1..=11); an error if the data doesn't
    /// fit.
    ForceTag(u8),
}

/// Hamming-distance tolerance for a tag match, chosen so spurious matches
/// in noise are rare given that defined tags are pairwise 32 apart
/// (spec.md §4.3).
pub const TAG_TOLERANCE: u32 = 8;

/// Select the tag that would be used to carry `data_len` bytes of
/// HDLC-framed data, or `None` if FX.25 should be skipped in favor of
/// plain AX.25.
pub fn select_tag(data_len: usize, pref: Fx25Pref) -> Result<Option<&'static TagInfo>, Fx25Error> {
    match pref {
        Fx25Pref::Off => Ok(None),
        Fx25Pref::ForceTag(num) => {
            let t = by_tag(num).ok_or(Fx25Error::NoTagMatch)?;
            if data_len > t.k {
                Err(Fx25Error::NoTagFits(data_len, t.k))
            } else {
                Ok(Some(t))
            }
        }
        Fx25Pref::Parity(p) => Ok(TAGS.iter().filter(|t| t.nroots as u8 == p && t.k >= data_len).min_by_key(|t| t.n)),
        Fx25Pref::Auto => Ok(AUTO_ORDER.iter().filter_map(|&num| by_tag(num)).find(|t| t.k >= data_len)),
    }
}

/// Byte-align a bit-stuffed HDLC bit stream by continuing the flag
/// pattern (`0x7E` repeating) past the closing flag until the length is a
/// multiple of 8; bit stuffing never touches flag bits so this is safe to
/// append outside the synced frame.
fn pack_byte_aligned(bits: &[u8]) -> Vec<u8> {
    let mut bits = bits.to_vec();
    let flag_bits = hdlc::bytes_to_bits(&[FLAG]);
    let mut i = 0;
    while bits.len() % 8 != 0 {
        bits.push(flag_bits[i % 8]);
        i += 1;
    }
    hdlc::bits_to_bytes(&bits)
}

/// Frame `payload` (address..info, unframed) as HDLC, pad and RS-encode it
/// into an FX.25 block per `pref`. Returns `None` when `pref` says to skip
/// FX.25 or no tag fits a preference that permits falling back to plain
/// AX.25.
pub fn encode(payload: &[u8], pref: Fx25Pref) -> Result<Option<Vec<u8>>, Fx25Error> {
    let packed = pack_byte_aligned(&hdlc::frame_bits(payload, 0, 0));
    let Some(tag) = select_tag(packed.len(), pref)? else {
        return Ok(None);
    };
    let mut data = packed;
    data.resize(tag.k, FLAG);
    let rs = RsCodec::new(0x11d, 1, 1, tag.nroots);
    let parity = rs.encode(&data)?;

    let mut out = Vec::with_capacity(8 + tag.n);
    out.extend_from_slice(&tag.value.to_le_bytes());
    out.extend_from_slice(&data);
    out.extend_from_slice(&parity);
    Ok(Some(out))
}

/// Continuous correlation-tag detector: feed it one raw bit at a time.
pub struct TagWatcher {
    shreg: u64,
    bits_seen: u32,
}

impl Default for TagWatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl TagWatcher {
    pub fn new() -> Self {
        TagWatcher { shreg: 0, bits_seen: 0 }
    }

    /// Feed one bit (as transmitted, i.e. LSB of the tag first). Returns
    /// the matched tag once 64 bits have been seen and one scores within
    /// [`TAG_TOLERANCE`].
    pub fn push_bit(&mut self, bit: u8) -> Option<&'static TagInfo> {
        self.shreg = (self.shreg >> 1) | (((bit & 1) as u64) << 63);
        self.bits_seen = self.bits_seen.saturating_add(1);
        if self.bits_seen < 64 {
            return None;
        }
        TAGS.iter().find(|t| hamming_distance(self.shreg, t.value) <= TAG_TOLERANCE)
    }

    pub fn reset(&mut self) {
        self.shreg = 0;
        self.bits_seen = 0;
    }
}

enum ReceiveState {
    Searching(TagWatcher),
    Collecting { tag: &'static TagInfo, bits: Vec<u8> },
}

/// Result of feeding bits to [`Fx25Receiver`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fx25Event {
    /// A block was received, RS-corrected, and an inner AX.25 frame was
    /// successfully deframed from it.
    Frame { payload: Vec<u8>, corrections: usize, tag: u8 },
    /// A tag matched but the block that followed was uncorrectable or did
    /// not contain a recoverable HDLC frame.
    Dropped(Fx25Error),
}

/// Streaming FX.25 receiver layered in front of (or beside) the plain
/// HDLC deframer: watches for a correlation tag, then collects and
/// RS-decodes the following fixed-size block.
pub struct Fx25Receiver {
    state: ReceiveState,
}

impl Default for Fx25Receiver {
    fn default() -> Self {
        Self::new()
    }
}

impl Fx25Receiver {
    pub fn new() -> Self {
        Fx25Receiver { state: ReceiveState::Searching(TagWatcher::new()) }
    }

    pub fn push_bit(&mut self, bit: u8) -> Option<Fx25Event> {
        match &mut self.state {
            ReceiveState::Searching(watcher) => {
                if let Some(tag) = watcher.push_bit(bit) {
                    self.state = ReceiveState::Collecting { tag, bits: Vec::with_capacity(tag.n * 8) };
                }
                None
            }
            ReceiveState::Collecting { tag, bits } => {
                bits.push(bit & 1);
                if bits.len() < tag.n * 8 {
                    return None;
                }
                let tag = *tag;
                let bits = std::mem::take(bits);
                self.state = ReceiveState::Searching(TagWatcher::new());
                Some(Self::finish_block(tag, &bits))
            }
        }
    }

    fn finish_block(tag: &'static TagInfo, bits: &[u8]) -> Fx25Event {
        let mut block = hdlc::bits_to_bytes(bits);
        debug_assert_eq!(block.len(), tag.n);
        let rs = RsCodec::new(0x11d, 1, 1, tag.nroots);
        let corrections = match rs.decode(&mut block, &[]) {
            Ok(c) => c,
            Err(e) => return Fx25Event::Dropped(Fx25Error::Rs(e)),
        };
        let data = &block[..tag.k];
        let mut deframer = HdlcDeframer::new();
        for &byte in data {
            for i in 0..8 {
                let bit = (byte >> i) & 1;
                if let Some(DeframeEvent::Frame(f)) = deframer.push_bit(bit) {
                    return Fx25Event::Frame { payload: f, corrections, tag: tag.tag };
                }
            }
        }
        Fx25Event::Dropped(Fx25Error::NoTagMatch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn select_tag_auto_picks_smallest_fit() {
        let t = select_tag(10, Fx25Pref::Auto).unwrap().unwrap();
        assert_eq!(t.tag, 0x04); // 48/32/16 is first in AUTO_ORDER and fits 10 bytes
    }

    #[test]
    fn force_tag_errors_when_too_small() {
        let err = select_tag(100, Fx25Pref::ForceTag(0x04)).unwrap_err();
        assert!(matches!(err, Fx25Error::NoTagFits(100, 32)));
    }

    #[test]
    fn round_trip_with_injected_errors() {
        let payload = b"WB2OSZ-15>TEST:Hello".to_vec();
        let block = encode(&payload, Fx25Pref::ForceTag(0x03)).unwrap().unwrap();

        // corrupt 7 of the 80 data+parity bytes (tag 0x03: n=80,k=64,nroots=16)
        let mut corrupted = block.clone();
        for i in 0..7 {
            let pos = 8 + i * 11; // spread across the 80-byte RS block
            corrupted[pos] ^= 0xFF;
        }

        let mut rx = Fx25Receiver::new();
        let bits = hdlc::bytes_to_bits(&corrupted);
        let mut got = None;
        for b in bits {
            if let Some(ev) = rx.push_bit(b) {
                got = Some(ev);
                break;
            }
        }
        match got {
            Some(Fx25Event::Frame { payload: p, corrections, tag }) => {
                assert_eq!(p, payload);
                assert!(corrections <= 8);
                assert_eq!(tag, 0x03);
            }
            other => panic!("unexpected {other:?}"),
        }
    }
}
