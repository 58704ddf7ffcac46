//! NRZI line coding: a data bit of `0` toggles the output level, a `1`
//! leaves it unchanged. Used directly by AFSK framing and, with an
//! additional G3RUH scrambler pass (`tone::scramble`), by the 9600-baud
//! baseband modulation.

#[derive(Debug, Clone, Copy, Default)]
pub struct NrziEncoder {
    level: u8,
}

impl NrziEncoder {
    pub fn new() -> Self {
        NrziEncoder { level: 1 }
    }

    /// Encode one data bit into a line level (0 or 1).
    pub fn encode(&mut self, bit: u8) -> u8 {
        if bit & 1 == 0 {
            self.level ^= 1;
        }
        self.level
    }

    pub fn encode_all(&mut self, bits: &[u8]) -> Vec<u8> {
        bits.iter().map(|&b| self.encode(b)).collect()
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NrziDecoder {
    prev_level: Option<u8>,
}

impl NrziDecoder {
    pub fn new() -> Self {
        NrziDecoder { prev_level: None }
    }

    /// Decode one line level into a data bit. The very first sample has no
    /// predecessor to compare against; by convention it is treated as `1`
    /// (no transition) since flags on the air establish level before any
    /// bit of interest is decoded.
    pub fn decode(&mut self, level: u8) -> u8 {
        let level = level & 1;
        let bit = match self.prev_level {
            None => 1,
            Some(prev) => u8::from(prev == level),
        };
        self.prev_level = Some(level);
        bit
    }

    pub fn decode_all(&mut self, levels: &[u8]) -> Vec<u8> {
        levels.iter().map(|&l| self.decode(l)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip() {
        let bits = [1u8, 0, 0, 1, 1, 0, 1, 0, 0, 0, 1];
        let mut enc = NrziEncoder::new();
        let levels = enc.encode_all(&bits);
        let mut dec = NrziDecoder::new();
        let back = dec.decode_all(&levels);
        assert_eq!(&bits[..], &back[..]);
    }
}
