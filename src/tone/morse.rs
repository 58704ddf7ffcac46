//! Morse code generator (spec.md §4.1, E6). A dot is one time unit, a
//! dash three, intra-character gaps one unit, inter-character gaps three,
//! word gaps seven. Unit duration is `1200/WPM` ms; tone is 800 Hz.

const TONE_HZ: f64 = 800.0;

fn pattern(c: char) -> Option<&'static str> {
    Some(match c.to_ascii_uppercase() {
        'A' => ".-",
        'B' => "-...",
        'C' => "-.-.",
        'D' => "-..",
        'E' => ".",
        'F' => "..-.",
        'G' => "--.",
        'H' => "....",
        'I' => "..",
        'J' => ".---",
        'K' => "-.-",
        'L' => ".-..",
        'M' => "--",
        'N' => "-.",
        'O' => "---",
        'P' => ".--.",
        'Q' => "--.-",
        'R' => ".-.",
        'S' => "...",
        'T' => "-",
        'U' => "..-",
        'V' => "...-",
        'W' => ".--",
        'X' => "-..-",
        'Y' => "-.--",
        'Z' => "--..",
        '0' => "-----",
        '1' => ".----",
        '2' => "..---",
        '3' => "...--",
        '4' => "....-",
        '5' => ".....",
        '6' => "-....",
        '7' => "--...",
        '8' => "---..",
        '9' => "----.",
        _ => return None,
    })
}

/// One symbol in a Morse timeline: `true` means "tone on" for `units` time
/// units, `false` means silence for `units` units.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Element {
    pub tone_on: bool,
    pub units: u32,
}

/// Render `text` to a timeline of (tone/silence, unit-count) elements and
/// the total keyed-tone unit count (E6: used both for audio pacing and as
/// the reported PTT duration, so the two never drift apart).
pub fn plan(text: &str) -> (Vec<Element>, u32) {
    let mut elements = Vec::new();
    let mut tone_units = 0u32;
    let mut first_char = true;

    for word in text.split(' ') {
        if !first_char {
            elements.push(Element { tone_on: false, units: 7 });
        }
        let mut first_in_word = true;
        for c in word.chars() {
            let Some(pat) = pattern(c) else { continue };
            if !first_in_word {
                elements.push(Element { tone_on: false, units: 3 });
            }
            for (i, sym) in pat.chars().enumerate() {
                if i > 0 {
                    elements.push(Element { tone_on: false, units: 1 });
                }
                let units = if sym == '.' { 1 } else { 3 };
                elements.push(Element { tone_on: true, units });
                tone_units += units;
            }
            first_in_word = false;
            first_char = false;
        }
    }
    (elements, tone_units)
}

/// Render a text string to audio at the given WPM, sample rate, and
/// amplitude. `txdelay_ms`/`txtail_ms` insert silence (keyed off, per
/// spec.md §4.1) before and after the keyed tone.
pub fn render(text: &str, wpm: u32, sample_rate: u32, amplitude: i16, txdelay_ms: u32, txtail_ms: u32) -> Vec<i16> {
    let (elements, _) = plan(text);
    let unit_ms = 1200.0 / wpm.max(1) as f64;

    let mut out = silence_samples(sample_rate, txdelay_ms);
    let mut phase = 0.0f64;
    for el in elements {
        let n = (sample_rate as f64 * unit_ms * el.units as f64 / 1000.0).round() as usize;
        if el.tone_on {
            for _ in 0..n {
                out.push((phase.sin() * amplitude as f64) as i16);
                phase += 2.0 * std::f64::consts::PI * TONE_HZ / sample_rate as f64;
            }
        } else {
            out.extend(std::iter::repeat(0i16).take(n));
        }
    }
    out.extend(silence_samples(sample_rate, txtail_ms));
    out
}

fn silence_samples(sample_rate: u32, ms: u32) -> Vec<i16> {
    vec![0i16; (sample_rate as u64 * ms as u64 / 1000) as usize]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cq_dx_unit_count_is_stable_and_matches_letter_patterns() {
        // Keyed-tone units only (dots=1, dashes=3), excluding inter-element
        // and inter-word silence: C=-.-.(3+1+3+1=8), Q=--.-(3+3+1+3=10),
        // D=-..(3+1+1=5), X=-..-(3+1+1+3=8); total 31.
        let (_, units) = plan("CQ DX");
        assert_eq!(units, 31);
    }

    #[test]
    fn pacing_and_reported_duration_share_the_same_unit_count() {
        let (elements, tone_units) = plan("CQ DX");
        let recomputed: u32 = elements.iter().filter(|e| e.tone_on).map(|e| e.units).sum();
        assert_eq!(recomputed, tone_units);
    }

    #[test]
    fn render_respects_txdelay_and_txtail_silence() {
        let audio = render("E", 10, 8000, 10000, 20, 30);
        let delay_samples = 8000 * 20 / 1000;
        assert!(audio[..delay_samples].iter().all(|&s| s == 0));
    }
}
