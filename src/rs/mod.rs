//! Systematic Reed-Solomon codec over GF(2^8) (C2), parameterized by
//! primitive polynomial, first consecutive root (`fcr`), primitive element
//! step (`prim`), and parity symbol count (`nroots`). Used directly by
//! FX.25 (C3) and, with different block sizes, by IL2P (C4).
//!
//! The encode/decode shapes (generator-polynomial division for encoding;
//! syndromes, Berlekamp-Massey, Chien search, and Forney's algorithm for
//! decoding) follow the classic systematic-RS structure used throughout
//! amateur radio and deep-space coding literature (originally popularized
//! in the public domain by Phil Karn's `libfec`); nothing here is copied
//! from any single implementation's source text.

pub mod gf;

use gf::GaloisField;

use crate::error::RsError;

/// One of the three standard configurations spec.md §4.3/§4.4 require:
/// `genpoly = 0x11d`, `fcr = 1`, `prim = 1`, with 16/32/64 parity symbols.
#[derive(Debug, Clone)]
pub struct RsCodec {
    gf: GaloisField,
    fcr: i32,
    prim: i32,
    nroots: usize,
    /// Generator polynomial coefficients, in index (log) form, length
    /// `nroots + 1`.
    genpoly_log: Vec<u16>,
}

impl RsCodec {
    pub fn new(genpoly: u32, fcr: i32, prim: i32, nroots: usize) -> Self {
        let gf = GaloisField::new(genpoly);
        let nn = gf.nn;
        assert!(nroots < nn, "nroots must be less than field size - 1");

        let mut poly = vec![0u16; nroots + 1];
        poly[0] = 1;
        let mut root = fcr * prim;
        for i in 0..nroots {
            poly[i + 1] = 1;
            let mut j = i;
            while j > 0 {
                if poly[j] != 0 {
                    let idx = gf.index_of[poly[j] as usize] as i64 + root as i64;
                    poly[j] = poly[j - 1] ^ gf.alpha_to[modnn(nn, idx)];
                } else {
                    poly[j] = poly[j - 1];
                }
                j -= 1;
            }
            let idx = gf.index_of[poly[0] as usize] as i64 + root as i64;
            poly[0] = gf.alpha_to[modnn(nn, idx)];
            root += prim;
        }
        let genpoly_log: Vec<u16> = poly.iter().map(|&c| gf.index_of[c as usize]).collect();

        RsCodec { gf, fcr, prim, nroots, genpoly_log }
    }

    /// Standard RS(255,239) configuration, 16 parity symbols.
    pub fn standard16() -> Self {
        Self::new(0x11d, 1, 1, 16)
    }
    /// Standard RS(255,223) configuration, 32 parity symbols.
    pub fn standard32() -> Self {
        Self::new(0x11d, 1, 1, 32)
    }
    /// Standard RS(255,191) configuration, 64 parity symbols.
    pub fn standard64() -> Self {
        Self::new(0x11d, 1, 1, 64)
    }

    pub fn nroots(&self) -> usize {
        self.nroots
    }
    pub fn n(&self) -> usize {
        self.gf.nn
    }
    pub fn max_data_len(&self) -> usize {
        self.gf.nn - self.nroots
    }

    /// Encode `data` (at most `n - nroots` bytes; shorter messages are
    /// implicitly left-padded with zero symbols, i.e. a shortened code).
    /// Returns just the `nroots` parity bytes.
    pub fn encode(&self, data: &[u8]) -> Result<Vec<u8>, RsError> {
        let nn = self.gf.nn;
        if data.len() > nn - self.nroots {
            return Err(RsError::MessageTooLong(data.len(), nn, nn - self.nroots));
        }
        let nroots = self.nroots;
        let mut parity = vec![0u16; nroots];
        for &d in data {
            let feedback = self.gf.index_of[(d as u16 ^ parity[0]) as usize];
            if feedback as usize != nn {
                for j in 1..nroots {
                    let gp = self.genpoly_log[nroots - j];
                    if gp as usize != nn {
                        let idx = feedback as i64 + gp as i64;
                        parity[j] ^= self.gf.alpha_to[modnn(nn, idx)];
                    }
                }
            }
            parity.copy_within(1..nroots, 0);
            if feedback as usize != nn {
                let gp = self.genpoly_log[0];
                let idx = feedback as i64 + gp as i64;
                parity[nroots - 1] = self.gf.alpha_to[modnn(nn, idx)];
            } else {
                parity[nroots - 1] = 0;
            }
        }
        Ok(parity.into_iter().map(|v| v as u8).collect())
    }

    /// Decode `received` (data followed by `nroots` parity bytes) in
    /// place, correcting up to `nroots/2` symbol errors (more if some
    /// error locations are supplied as known `erasures`, indices into
    /// `received`). Returns the number of symbols corrected, or an error
    /// if the block is uncorrectable.
    pub fn decode(&self, received: &mut [u8], erasures: &[usize]) -> Result<usize, RsError> {
        let nn = self.gf.nn;
        let nroots = self.nroots;
        if received.len() > nn {
            return Err(RsError::MessageTooLong(received.len(), nn, nn - nroots));
        }
        for &e in erasures {
            if e >= received.len() {
                return Err(RsError::InvalidErasure(e, received.len()));
            }
        }
        let pad = nn - received.len();
        let a0 = nn as i32;

        // Syndromes.
        let mut s = vec![0u16; nroots];
        for i in 0..nroots {
            s[i] = received[0] as u16;
        }
        for j in 1..received.len() {
            for i in 0..nroots {
                if s[i] == 0 {
                    s[i] = received[j] as u16;
                } else {
                    let root = (self.fcr + i as i32) * self.prim;
                    let idx = self.gf.index_of[s[i] as usize] as i64 + root as i64;
                    s[i] = received[j] as u16 ^ self.gf.alpha_to[modnn(nn, idx)];
                }
            }
        }
        let mut syn_error = 0u16;
        let mut s_log = vec![0i32; nroots];
        for i in 0..nroots {
            syn_error |= s[i];
            s_log[i] = self.gf.index_of[s[i] as usize] as i32;
        }
        if syn_error == 0 {
            return Ok(0);
        }

        let no_eras = erasures.len();
        let mut lambda = vec![0u16; nroots + 1];
        lambda[0] = 1;
        if no_eras > 0 {
            lambda[1] = self.gf.alpha_to[modnn(nn, (self.prim as i64) * ((nn as i64) - 1 - erasures[0] as i64))];
            for i in 1..no_eras {
                let u = modnn(nn, (self.prim as i64) * ((nn as i64) - 1 - erasures[i] as i64)) as i32;
                let mut j = i + 1;
                while j > 0 {
                    let tmp = self.gf.index_of[lambda[j - 1] as usize] as i32;
                    if tmp != a0 {
                        let idx = u as i64 + tmp as i64;
                        lambda[j] ^= self.gf.alpha_to[modnn(nn, idx)];
                    }
                    j -= 1;
                }
            }
        }
        let mut b: Vec<i32> = lambda.iter().map(|&l| self.gf.index_of[l as usize] as i32).collect();

        let mut r = no_eras;
        let mut el = no_eras;
        let mut t = vec![0u16; nroots + 1];
        while {
            r += 1;
            r <= nroots
        } {
            let mut discr_r = 0u16;
            for i in 0..r {
                if lambda[i] != 0 && s_log[r - i - 1] != a0 {
                    let idx = self.gf.index_of[lambda[i] as usize] as i64 + s_log[r - i - 1] as i64;
                    discr_r ^= self.gf.alpha_to[modnn(nn, idx)];
                }
            }
            let discr_r_log = self.gf.index_of[discr_r as usize] as i32;
            if discr_r_log == a0 {
                b.copy_within(0..nroots, 1);
                b[0] = a0;
            } else {
                t[0] = lambda[0];
                for i in 0..nroots {
                    if b[i] != a0 {
                        let idx = discr_r_log as i64 + b[i] as i64;
                        t[i + 1] = lambda[i + 1] ^ self.gf.alpha_to[modnn(nn, idx)];
                    } else {
                        t[i + 1] = lambda[i + 1];
                    }
                }
                if 2 * el <= r + no_eras - 1 {
                    el = r + no_eras - el;
                    for i in 0..=nroots {
                        b[i] = if lambda[i] == 0 {
                            a0
                        } else {
                            modnn(nn, self.gf.index_of[lambda[i] as usize] as i64 - discr_r_log as i64 + nn as i64) as i32
                        };
                    }
                } else {
                    b.copy_within(0..nroots, 1);
                    b[0] = a0;
                }
                lambda.copy_from_slice(&t);
            }
        }

        let mut lambda_log = vec![0i32; nroots + 1];
        let mut deg_lambda = 0usize;
        for i in 0..=nroots {
            lambda_log[i] = self.gf.index_of[lambda[i] as usize] as i32;
            if lambda_log[i] != a0 {
                deg_lambda = i;
            }
        }

        // Chien search.
        let mut reg = vec![0i32; nroots + 1];
        reg[1..=nroots].copy_from_slice(&lambda_log[1..=nroots]);
        let mut root = vec![0i32; nroots];
        let mut loc = vec![0i32; nroots];
        let mut count = 0usize;
        let iprim = modinv(nn, self.prim);
        let mut k = modnn(nn, iprim as i64 - 1) as i32;
        for i in 1..=nn as i32 {
            let mut q = 1u16;
            for j in (1..=deg_lambda).rev() {
                if reg[j] != a0 {
                    reg[j] = modnn(nn, reg[j] as i64 + j as i64) as i32;
                    q ^= self.gf.alpha_to[reg[j] as usize];
                }
            }
            if q == 0 {
                root[count] = i;
                loc[count] = k;
                count += 1;
            }
            k = modnn(nn, k as i64 + iprim as i64) as i32;
            if count == deg_lambda {
                break;
            }
        }
        if deg_lambda != count {
            return Err(RsError::Uncorrectable(self.nroots));
        }

        // Error evaluator polynomial omega(x) = s(x) lambda(x) mod x^nroots.
        let deg_omega = deg_lambda.saturating_sub(1);
        let mut omega_log = vec![0i32; nroots];
        for i in 0..=deg_omega {
            let mut tmp = 0u16;
            for j in 0..=i {
                if s_log[i - j] != a0 && lambda_log[j] != a0 {
                    let idx = s_log[i - j] as i64 + lambda_log[j] as i64;
                    tmp ^= self.gf.alpha_to[modnn(nn, idx)];
                }
            }
            omega_log[i] = self.gf.index_of[tmp as usize] as i32;
        }

        // Forney: compute error magnitudes and apply them.
        for j in (0..count).rev() {
            let mut num1 = 0u16;
            for i in (0..=deg_omega).rev() {
                if omega_log[i] != a0 {
                    let idx = omega_log[i] as i64 + (i as i64) * root[j] as i64;
                    num1 ^= self.gf.alpha_to[modnn(nn, idx)];
                }
            }
            let idx = (root[j] as i64) * ((self.fcr - 1) as i64) + nn as i64;
            let num2 = self.gf.alpha_to[modnn(nn, idx)];
            let mut den = 0u16;
            let start = (deg_lambda.min(nroots - 1)) & !1usize;
            let mut i = start as i32;
            while i >= 0 {
                let ii = i as usize;
                if lambda_log[ii + 1] != a0 {
                    let idx = lambda_log[ii + 1] as i64 + (i as i64) * root[j] as i64;
                    den ^= self.gf.alpha_to[modnn(nn, idx)];
                }
                i -= 2;
            }
            if num1 != 0 && (loc[j] as usize) >= pad {
                let pos = loc[j] as usize - pad;
                if pos < received.len() {
                    let idx = self.gf.index_of[num1 as usize] as i64 + self.gf.index_of[num2 as usize] as i64 + nn as i64
                        - self.gf.index_of[den as usize] as i64;
                    received[pos] ^= self.gf.alpha_to[modnn(nn, idx)] as u8;
                }
            }
        }
        Ok(count)
    }
}

#[inline]
fn modnn(nn: usize, x: i64) -> usize {
    x.rem_euclid(nn as i64) as usize
}

/// Multiplicative inverse of `a` modulo `nn` (`nn = 2^symsize - 1`), used
/// to step the Chien search index by `1/prim`.
fn modinv(nn: usize, a: i32) -> i32 {
    let m = nn as i32;
    let (mut old_r, mut r) = (a.rem_euclid(m), m);
    let (mut old_s, mut s) = (1i32, 0i32);
    while r != 0 {
        let q = old_r / r;
        let tmp_r = old_r - q * r;
        old_r = r;
        r = tmp_r;
        let tmp_s = old_s - q * s;
        old_s = s;
        s = tmp_s;
    }
    old_s.rem_euclid(m)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::Rng;

    #[test]
    fn encode_decode_no_errors() {
        let rs = RsCodec::standard16();
        let data: Vec<u8> = (0..200u32).map(|i| (i * 37) as u8).collect();
        let parity = rs.encode(&data).unwrap();
        let mut block = data.clone();
        block.extend_from_slice(&parity);
        let corrections = rs.decode(&mut block, &[]).unwrap();
        assert_eq!(corrections, 0);
        assert_eq!(&block[..data.len()], &data[..]);
    }

    #[test]
    fn corrects_up_to_half_parity_errors() {
        let rs = RsCodec::standard32(); // nroots=32, corrects up to 16 errors
        let data: Vec<u8> = (0..223u32).map(|i| (i * 91 + 3) as u8).collect();
        let parity = rs.encode(&data).unwrap();
        let mut block = data.clone();
        block.extend_from_slice(&parity);
        let mut rng = rand::thread_rng();
        let mut positions: Vec<usize> = (0..block.len()).collect();
        for i in (1..positions.len()).rev() {
            let j = rng.gen_range(0..=i);
            positions.swap(i, j);
        }
        for &pos in positions.iter().take(16) {
            block[pos] ^= 0xFF;
        }
        let corrections = rs.decode(&mut block, &[]).unwrap();
        assert_eq!(corrections, 16);
        assert_eq!(&block[..data.len()], &data[..]);
    }

    #[test]
    fn uncorrectable_beyond_limit() {
        let rs = RsCodec::standard16(); // corrects up to 8 errors
        let data: Vec<u8> = (0..239u32).map(|i| i as u8).collect();
        let parity = rs.encode(&data).unwrap();
        let mut block = data.clone();
        block.extend_from_slice(&parity);
        for pos in 0..12 {
            block[pos] ^= 0xAA;
        }
        assert!(rs.decode(&mut block, &[]).is_err());
    }

    #[test]
    fn shortened_block_roundtrip() {
        let rs = RsCodec::standard16();
        let data = b"short message".to_vec();
        let parity = rs.encode(&data).unwrap();
        let mut block = data.clone();
        block.extend_from_slice(&parity);
        block[2] ^= 0x55;
        let corrections = rs.decode(&mut block, &[]).unwrap();
        assert_eq!(corrections, 1);
        assert_eq!(&block[..data.len()], &data[..]);
    }
}
