//! DTMF Goertzel detector and dual-tone generator (spec.md §4.1).

use std::f64::consts::PI;

const ROW_FREQS: [f64; 4] = [697.0, 770.0, 852.0, 941.0];
const COL_FREQS: [f64; 4] = [1209.0, 1336.0, 1477.0, 1633.0];

const KEYPAD: [[char; 4]; 4] = [
    ['1', '2', '3', 'A'],
    ['4', '5', '6', 'B'],
    ['7', '8', '9', 'C'],
    ['*', '0', '#', 'D'],
];

/// One Goertzel bin tuned to a single target frequency.
struct Goertzel {
    coef: f64,
    q1: f64,
    q2: f64,
}

impl Goertzel {
    fn new(freq: f64, sample_rate: u32, block_size: usize) -> Self {
        // spec.md §4.1: k = N*f/Fs is never rounded to an integer bin.
        let k = block_size as f64 * freq / sample_rate as f64;
        let omega = 2.0 * PI * k / block_size as f64;
        Goertzel { coef: 2.0 * omega.cos(), q1: 0.0, q2: 0.0 }
    }

    fn reset(&mut self) {
        self.q1 = 0.0;
        self.q2 = 0.0;
    }

    fn push(&mut self, sample: f64) {
        let q0 = self.coef * self.q1 - self.q2 + sample;
        self.q2 = self.q1;
        self.q1 = q0;
    }

    /// Magnitude per spec.md §4.1's formula, not squared magnitude, so the
    /// 1.74x dominance threshold compares like units.
    fn magnitude(&self) -> f64 {
        (self.q1 * self.q1 + self.q2 * self.q2 - self.q1 * self.q2 * self.coef).max(0.0).sqrt()
    }
}

/// Streaming DTMF decoder: feed audio samples; receive decoded symbols as
/// they debounce, plus an end-of-sequence marker after a silence timeout.
pub struct DtmfDetector {
    rows: [Goertzel; 4],
    cols: [Goertzel; 4],
    block_size: usize,
    in_block: usize,
    last_symbol: Option<char>,
    pending_confirm: Option<char>,
    silence_blocks: u32,
    silence_timeout_blocks: u32,
    armed_since_last_symbol: bool,
}

/// Block size recommendation from spec.md §4.1: `round(205 * sample_rate / 8000)`.
pub fn block_size(sample_rate: u32) -> usize {
    ((205.0 * sample_rate as f64 / 8000.0).round()) as usize
}

impl DtmfDetector {
    pub fn new(sample_rate: u32) -> Self {
        let block_size = block_size(sample_rate);
        let rows = ROW_FREQS.map(|f| Goertzel::new(f, sample_rate, block_size));
        let cols = COL_FREQS.map(|f| Goertzel::new(f, sample_rate, block_size));
        let blocks_per_5s = (sample_rate as f64 * 5.0 / block_size as f64).round() as u32;
        DtmfDetector {
            rows,
            cols,
            block_size,
            in_block: 0,
            last_symbol: None,
            pending_confirm: None,
            silence_blocks: 0,
            silence_timeout_blocks: blocks_per_5s.max(1),
            armed_since_last_symbol: false,
        }
    }

    /// Feed one sample. Returns `Some(symbol)` once a button has debounced
    /// across two consecutive blocks, or `Some('$')` after the silence
    /// timer expires following at least one detected symbol.
    pub fn push_sample(&mut self, sample: i16) -> Option<char> {
        let s = sample as f64;
        for g in self.rows.iter_mut().chain(self.cols.iter_mut()) {
            g.push(s);
        }
        self.in_block += 1;
        if self.in_block < self.block_size {
            return None;
        }
        self.in_block = 0;
        let result = self.evaluate_block();
        for g in self.rows.iter_mut().chain(self.cols.iter_mut()) {
            g.reset();
        }
        result
    }

    fn evaluate_block(&mut self) -> Option<char> {
        let row_mags: Vec<f64> = self.rows.iter().map(|g| g.magnitude()).collect();
        let col_mags: Vec<f64> = self.cols.iter().map(|g| g.magnitude()).collect();
        let symbol = dominant_pair(&row_mags, &col_mags);

        match symbol {
            Some(sym) => {
                self.silence_blocks = 0;
                let confirmed = if self.pending_confirm == Some(sym) { Some(sym) } else { None };
                self.pending_confirm = Some(sym);
                if confirmed.is_some() && self.last_symbol != confirmed {
                    self.last_symbol = confirmed;
                    self.armed_since_last_symbol = true;
                    confirmed
                } else {
                    None
                }
            }
            None => {
                self.pending_confirm = None;
                if self.armed_since_last_symbol {
                    self.silence_blocks += 1;
                    if self.silence_blocks >= self.silence_timeout_blocks {
                        self.armed_since_last_symbol = false;
                        return Some('$');
                    }
                }
                None
            }
        }
    }
}

fn dominant_pair(row_mags: &[f64], col_mags: &[f64]) -> Option<char> {
    let row = dominant_index(row_mags)?;
    let col = dominant_index(col_mags)?;
    Some(KEYPAD[row][col])
}

/// A group (row or column) wins only if its strongest bin exceeds 1.74x
/// the sum of the other three (spec.md §4.1).
fn dominant_index(mags: &[f64]) -> Option<usize> {
    let (idx, &best) = mags.iter().enumerate().max_by(|a, b| a.1.partial_cmp(b.1).unwrap())?;
    let rest: f64 = mags.iter().enumerate().filter(|&(i, _)| i != idx).map(|(_, v)| v).sum();
    if best > 1.74 * rest && best > 1.0 {
        Some(idx)
    } else {
        None
    }
}

/// DTMF generator: sum of row + column sine, minimum 50ms tone + 50ms gap.
pub struct DtmfGenerator {
    sample_rate: u32,
    amplitude_pct: u32,
}

impl DtmfGenerator {
    pub fn new(sample_rate: u32, amplitude_pct: u32) -> Self {
        DtmfGenerator { sample_rate, amplitude_pct }
    }

    /// Render one symbol as `tone_ms` of dual-tone audio followed by
    /// `gap_ms` of silence (minimum 50/50 per spec.md §4.1).
    pub fn render_symbol(&self, symbol: char, tone_ms: u32, gap_ms: u32) -> Vec<i16> {
        let (row_freq, col_freq) = match symbol_to_freqs(symbol) {
            Some(f) => f,
            None => return Vec::new(),
        };
        let tone_ms = tone_ms.max(50);
        let gap_ms = gap_ms.max(50);
        let scale = i16::MAX as f64 * self.amplitude_pct as f64 / 100.0;
        let tone_samples = (self.sample_rate as u64 * tone_ms as u64 / 1000) as usize;
        let gap_samples = (self.sample_rate as u64 * gap_ms as u64 / 1000) as usize;

        let mut out = Vec::with_capacity(tone_samples + gap_samples);
        for n in 0..tone_samples {
            let t = n as f64 / self.sample_rate as f64;
            let row = (2.0 * PI * row_freq * t).sin();
            let col = (2.0 * PI * col_freq * t).sin();
            out.push(((row + col) * 0.5 * scale) as i16);
        }
        out.resize(tone_samples + gap_samples, 0);
        out
    }
}

fn symbol_to_freqs(symbol: char) -> Option<(f64, f64)> {
    for (r, row) in KEYPAD.iter().enumerate() {
        for (c, &sym) in row.iter().enumerate() {
            if sym == symbol {
                return Some((ROW_FREQS[r], COL_FREQS[c]));
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn synth_tone(symbol: char, sample_rate: u32, n: usize, gain: f64) -> Vec<i16> {
        let (row_freq, col_freq) = symbol_to_freqs(symbol).unwrap();
        (0..n)
            .map(|i| {
                let t = i as f64 / sample_rate as f64;
                let v = ((2.0 * PI * row_freq * t).sin() + (2.0 * PI * col_freq * t).sin()) * 0.5 * gain;
                v as i16
            })
            .collect()
    }

    #[test]
    fn detector_is_amplitude_invariant() {
        let sample_rate = 8000;
        let bs = block_size(sample_rate);
        let samples = synth_tone('5', sample_rate, bs * 3, 8000.0);
        let scaled: Vec<i16> = samples.iter().map(|&s| ((s as f64) * 2.0).clamp(i16::MIN as f64, i16::MAX as f64) as i16).collect();

        let decode = |samples: &[i16]| -> Vec<char> {
            let mut d = DtmfDetector::new(sample_rate);
            samples.iter().filter_map(|&s| d.push_sample(s)).collect()
        };
        assert_eq!(decode(&samples), decode(&scaled));
    }

    #[test]
    fn detector_recognizes_a_button_after_debounce() {
        let sample_rate = 8000;
        let bs = block_size(sample_rate);
        let samples = synth_tone('7', sample_rate, bs * 3, 8000.0);
        let mut d = DtmfDetector::new(sample_rate);
        let symbols: Vec<char> = samples.iter().filter_map(|&s| d.push_sample(s)).collect();
        assert_eq!(symbols, vec!['7']);
    }

    #[test]
    fn generator_round_trips_through_detector() {
        let sample_rate = 8000;
        let gen = DtmfGenerator::new(sample_rate, 80);
        let audio = gen.render_symbol('C', 60, 60);
        let mut d = DtmfDetector::new(sample_rate);
        let symbols: Vec<char> = audio.iter().filter_map(|&s| d.push_sample(s)).collect();
        assert_eq!(symbols, vec!['C']);
    }
}
