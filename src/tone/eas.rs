//! EAS SAME generator (spec.md §4.1): fixed 520.833 bit/s AFSK at
//! 2083.33/1562.50 Hz, framed with a preamble, up to three copies of the
//! header, and an end-of-message marker. The caller supplies the already-
//! formatted SAME header text (e.g. `ZCZC-ORG-EEE-PSSCCC+TTTT-JJJHHMM-LLLLLLLL-`).

const BAUD: f64 = 520.833;
const MARK_HZ: f64 = 2083.33;
const SPACE_HZ: f64 = 1562.50;
const PREAMBLE_BYTE: u8 = 0xAB;
const PREAMBLE_BYTES: usize = 16;
const EOM: &str = "NNNN";

fn byte_to_bits_lsb_first(b: u8) -> [u8; 8] {
    let mut out = [0u8; 8];
    for (i, o) in out.iter_mut().enumerate() {
        *o = (b >> i) & 1;
    }
    out
}

/// Render one copy's worth of bits: 16 preamble bytes (`0xAB`) then the
/// ASCII message bytes, LSB first per byte (AFSK air-interface bit order).
fn frame_bits(message: &str) -> Vec<u8> {
    let mut bits = Vec::new();
    for _ in 0..PREAMBLE_BYTES {
        bits.extend_from_slice(&byte_to_bits_lsb_first(PREAMBLE_BYTE));
    }
    for &b in message.as_bytes() {
        bits.extend_from_slice(&byte_to_bits_lsb_first(b));
    }
    bits
}

/// Render audio for `header` repeated three times followed by the
/// end-of-message marker repeated three times, with 1-second gaps between
/// copies as the SAME protocol specifies.
pub fn render(header: &str, sample_rate: u32, amplitude: i16) -> Vec<i16> {
    let mut out = Vec::new();
    for _ in 0..3 {
        out.extend(render_one(header, sample_rate, amplitude));
        out.extend(std::iter::repeat(0i16).take(sample_rate as usize));
    }
    for _ in 0..3 {
        out.extend(render_one(EOM, sample_rate, amplitude));
        out.extend(std::iter::repeat(0i16).take(sample_rate as usize));
    }
    out
}

fn render_one(message: &str, sample_rate: u32, amplitude: i16) -> Vec<i16> {
    let bits = frame_bits(message);
    let samples_per_bit = sample_rate as f64 / BAUD;
    let mut out = Vec::with_capacity((bits.len() as f64 * samples_per_bit) as usize);
    let mut phase = 0.0f64;
    for &bit in &bits {
        let freq = if bit == 1 { MARK_HZ } else { SPACE_HZ };
        let n = samples_per_bit.round() as usize;
        for _ in 0..n {
            out.push((phase.sin() * amplitude as f64) as i16);
            phase += 2.0 * std::f64::consts::PI * freq / sample_rate as f64;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_includes_three_header_and_three_eom_copies() {
        let header = "ZCZC-WXR-RWT-020103+0030-0010000-NWS-";
        let one_header_len = render_one(header, 8000, 10000).len();
        let one_eom_len = render_one(EOM, 8000, 10000).len();
        let one_sec = 8000usize;
        let audio = render(header, 8000, 10000);
        let expected = 3 * (one_header_len + one_sec) + 3 * (one_eom_len + one_sec);
        assert_eq!(audio.len(), expected);
    }
}
