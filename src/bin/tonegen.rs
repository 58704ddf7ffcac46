//! Demo binary: render one of the crate's tone sources to a raw 16-bit PCM
//! file, one binary per pipeline-stage demo in the teacher's one-binary-
//! per-mode layout (SPEC_FULL.md §0).

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;

use clap::{Parser, ValueEnum};

use packetmodem_core::tone::afsk::AfskModulator;
use packetmodem_core::tone::dtmf::DtmfGenerator;
use packetmodem_core::tone::eas;
use packetmodem_core::tone::morse;
use packetmodem_core::tone::ToneSource;

#[derive(Clone, Copy, ValueEnum)]
enum Waveform {
    Afsk,
    Dtmf,
    Morse,
    Eas,
}

#[derive(Parser)]
struct Args {
    /// Which tone source to render.
    #[arg(value_enum)]
    waveform: Waveform,

    /// Output path for raw little-endian i16 PCM samples.
    #[arg(short, long, default_value = "tonegen.raw")]
    out: PathBuf,

    #[arg(long, default_value_t = 9600)]
    sample_rate: u32,

    /// Payload text: bits (0/1 characters) for AFSK, keypad symbols for
    /// DTMF, plain text for Morse, a formatted SAME header for EAS.
    #[arg(short, long, default_value = "1010110010")]
    text: String,
}

fn main() {
    env_logger::init();
    let args = Args::parse();

    let samples = match args.waveform {
        Waveform::Afsk => render_afsk(&args.text, args.sample_rate),
        Waveform::Dtmf => render_dtmf(&args.text, args.sample_rate),
        Waveform::Morse => morse::render(&args.text, 20, args.sample_rate, 12000, 0, 0),
        Waveform::Eas => eas::render(&args.text, args.sample_rate, 12000),
    };

    let n = samples.len();
    let file = File::create(&args.out).expect("create output file");
    let mut writer = BufWriter::new(file);
    for s in samples {
        writer.write_all(&s.to_le_bytes()).expect("write sample");
    }
    log::info!("wrote {n} samples to {}", args.out.display());
}

fn render_afsk(bits: &str, sample_rate: u32) -> Vec<i16> {
    let mut modulator = AfskModulator::new(1200.0, 2200.0, 1200, sample_rate);
    let samples_per_bit = (sample_rate / 1200).max(1) as usize;
    let mut out = Vec::new();
    for c in bits.chars() {
        modulator.set_bit(if c == '1' { 1 } else { 0 });
        for _ in 0..samples_per_bit {
            out.push(modulator.next_sample());
        }
    }
    out
}

fn render_dtmf(symbols: &str, sample_rate: u32) -> Vec<i16> {
    let gen = DtmfGenerator::new(sample_rate, 80);
    let mut out = Vec::new();
    for c in symbols.chars() {
        out.extend(gen.render_symbol(c, 100, 60));
    }
    out
}
