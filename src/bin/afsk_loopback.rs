//! Demo binary: encode a TNC-2 text frame to AFSK audio, run it straight
//! back through the receive pipeline, and print what came out the other
//! end. A quick end-to-end smoke test for the tone codec through the AX.25
//! packet object, in the teacher's one-binary-per-mode layout
//! (SPEC_FULL.md §0).

use std::sync::Arc;

use clap::Parser;

use packetmodem_core::ax25::parse_text;
use packetmodem_core::config::{AudioConfig, ChannelConfig, Duplex, FecPreference, Modulation, ModemConfig};
use packetmodem_core::dlq::{Dlq, DlqItemKind};
use packetmodem_core::hdlc;
use packetmodem_core::supervisor::Supervisor;
use packetmodem_core::tone::afsk::AfskModulator;
use packetmodem_core::tone::ToneSource;

#[derive(Parser)]
struct Args {
    /// TNC-2 text frame, e.g. "WB2OSZ-15>TEST:Hello".
    #[arg(default_value = "WB2OSZ-15>TEST:Hello")]
    frame: String,

    #[arg(long, default_value_t = 9600)]
    sample_rate: u32,
}

fn main() {
    env_logger::init();
    let args = Args::parse();

    let text_frame = parse_text(&args.frame, true).expect("parse TNC-2 text frame");
    let dest = text_frame.dest.to_address().expect("destination address");
    let src = text_frame.source.to_address().expect("source address");
    let packet = packetmodem_core::ax25::Ax25Packet::build(
        &[dest, src],
        &[0x03],
        Some(0xF0),
        &text_frame.info,
        true,
        packetmodem_core::ax25::Modulo::Mod8,
    )
    .expect("build AX.25 packet");

    let bits = hdlc::frame_bits(packet.as_bytes(), 4, 4);
    let mut modulator = AfskModulator::new(1200.0, 2200.0, 1200, args.sample_rate);
    let samples_per_bit = (args.sample_rate / 1200).max(1) as usize;
    let mut samples = Vec::with_capacity(bits.len() * samples_per_bit);
    for bit in bits {
        modulator.set_bit(bit);
        for _ in 0..samples_per_bit {
            samples.push(modulator.next_sample());
        }
    }

    let chan = ChannelConfig::new(Modulation::Afsk { mark_hz: 1200, space_hz: 2200 }, 1200, FecPreference::Off, Duplex::Half)
        .expect("valid channel config");
    let config = ModemConfig::new(vec![AudioConfig::mono_at(chan, args.sample_rate)]).expect("valid modem config");

    let dlq = Arc::new(Dlq::new());
    let mut sup = Supervisor::new(config, Arc::clone(&dlq));
    for sample in samples {
        sup.process_device_frame(0, &[sample]);
    }

    let mut decoded_any = false;
    while let Some(item) = dlq.dequeue() {
        if let DlqItemKind::ReceivedFrame { packet, origin } = item.kind {
            decoded_any = true;
            println!("channel {} fec={:?} corrections={}: {:02x?}", origin.channel, origin.fec, origin.corrections, packet.as_bytes());
        }
    }
    if !decoded_any {
        log::warn!("no frame was decoded from the loopback audio");
    }
}
