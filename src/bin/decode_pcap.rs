//! Decode the collectd traffic in a pcap/pcapng capture and print totals.
//!
//! ```bash
//! decode_pcap capture.pcap
//! decode_pcap --mode counts --port 25826 capture.pcapng
//! decode_pcap --dump=out.txt --frame 12 capture.pcap
//! ```

use anyhow::{Context, Result};
use clap::Parser;
use collectd_dissect::capture::{for_each_udp_datagram, UdpDatagram};
use collectd_dissect::dump::{render_tree, summary_line, write_hex};
use collectd_dissect::{
    DecodeError, DecodeMode, Decoder, DecoderConfig, PacketCounts, PacketDecodeResult, PacketStats,
    COLLECTD_UDP_PORT,
};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{self, Write};
use std::path::PathBuf;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Decode collectd network-protocol packets from a capture file
#[derive(Parser, Debug)]
#[command(name = "decode_pcap")]
#[command(version, about, long_about = None)]
struct Cli {
    /// pcap or pcapng capture
    capture: PathBuf,

    /// UDP port carrying collectd traffic (either direction)
    #[arg(short, long, default_value_t = COLLECTD_UDP_PORT)]
    port: u16,

    /// tree (full decode) or counts (structure-only walk)
    #[arg(short, long, default_value = "tree")]
    mode: DecodeMode,

    /// Write a per-packet dump to PATH, or stdout when no path is given
    #[arg(long, value_name = "PATH", num_args = 0..=1, default_missing_value = "-")]
    dump: Option<PathBuf>,

    /// Only dump this frame number
    #[arg(long, value_name = "N")]
    frame: Option<u64>,

    /// Largest datagram handed to the decoder
    #[arg(long, default_value_t = collectd_dissect::config::DEFAULT_MAX_PACKET_LEN)]
    max_packet_len: usize,

    /// Reject VALUES parts whose count disagrees with their length
    #[arg(long)]
    strict_value_count: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,
}

#[derive(Debug, Default)]
struct Totals {
    datagrams: u64,
    other_port: u64,
    too_large: u64,
    incomplete: u64,
    warnings: u64,
    counts: PacketCounts,
    stats: PacketStats,
    error_kinds: BTreeMap<&'static str, u64>,
}

impl Totals {
    fn add(&mut self, res: &PacketDecodeResult) {
        self.datagrams += 1;
        self.counts.merge(&res.counts);
        self.stats.merge(&res.stats);
        self.warnings += res.warnings.len() as u64;
        if let Some(err) = &res.error {
            self.incomplete += 1;
            *self.error_kinds.entry(err.error.kind()).or_insert(0) += 1;
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.log_level)?;

    let config = DecoderConfig::default()
        .with_mode(cli.mode)
        .with_udp_port(cli.port)
        .with_max_packet_len(cli.max_packet_len)
        .with_strict_value_count(cli.strict_value_count);
    let decoder = Decoder::new(config).context("invalid decoder configuration")?;

    let mut dump: Option<Box<dyn Write>> = match &cli.dump {
        None => None,
        Some(p) if p.as_os_str() == "-" => Some(Box::new(io::stdout().lock())),
        Some(p) => Some(Box::new(
            File::create(p).with_context(|| format!("creating dump file {}", p.display()))?,
        )),
    };

    let mut totals = Totals::default();
    let mut dump_error: Option<io::Error> = None;
    let capture = for_each_udp_datagram(&cli.capture, |frame, dgram| {
        if !dgram.involves_port(decoder.config().udp_port) {
            totals.other_port += 1;
            return;
        }
        let res = decoder.decode(dgram.payload);
        match &res {
            Ok(r) => totals.add(r),
            Err(e) => {
                totals.too_large += 1;
                tracing::warn!(frame, error = %e, "datagram skipped");
            }
        }
        if dump_error.is_some() || cli.frame.is_some_and(|f| f != frame) {
            return;
        }
        if let Some(w) = dump.as_mut() {
            if let Err(e) = dump_packet(&mut **w, frame, &dgram, &res) {
                dump_error = Some(e);
            }
        }
    })
    .with_context(|| format!("reading capture {}", cli.capture.display()))?;
    if let Some(e) = dump_error {
        return Err(e).context("writing dump");
    }
    if let Some(w) = dump.as_mut() {
        w.flush().context("writing dump")?;
    }

    tracing::info!(frames = capture.frames, datagrams = totals.datagrams, "capture decoded");
    eprintln!("capture: {}", cli.capture.display());
    eprintln!("mode: {}", decoder.config().mode);
    eprintln!("frames: {}", capture.frames);
    eprintln!("udp datagrams: {}", capture.udp_datagrams);
    eprintln!("  not port {}: {}", decoder.config().udp_port, totals.other_port);
    eprintln!("  too large: {}", totals.too_large);
    eprintln!("collectd packets: {}", totals.datagrams);
    eprintln!("  ended early: {}", totals.incomplete);
    for (kind, n) in &totals.error_kinds {
        eprintln!("    {}: {}", kind, n);
    }
    eprintln!(
        "parts: ok={}, unknown={}, error={}",
        totals.counts.parts_ok, totals.counts.parts_unknown, totals.counts.parts_error
    );
    eprintln!("records emitted: {}", totals.counts.records_emitted);
    eprintln!("warnings: {}", totals.warnings);
    if !totals.stats.is_empty() {
        eprintln!("value lists: {}", totals.stats.values_num);
        for (label, map) in [
            ("hosts", &totals.stats.hosts),
            ("plugins", &totals.stats.plugins),
            ("types", &totals.stats.types),
        ] {
            eprintln!("{}:", label);
            for (name, n) in map {
                eprintln!("  {}: {}", name, n);
            }
        }
    }
    Ok(())
}

fn dump_packet(
    w: &mut dyn Write,
    frame: u64,
    dgram: &UdpDatagram<'_>,
    res: &Result<PacketDecodeResult, DecodeError>,
) -> io::Result<()> {
    writeln!(
        w,
        "=== frame {}  udp {} -> {}  len {} ===",
        frame,
        dgram.src_port,
        dgram.dst_port,
        dgram.payload.len()
    )?;
    write_hex(w, dgram.payload)?;
    match res {
        Ok(r) if r.mode == DecodeMode::Tree => write!(w, "{}", render_tree(r))?,
        Ok(r) => writeln!(w, "{}", summary_line(r))?,
        Err(e) => writeln!(w, "  <BAD> {}", e)?,
    }
    Ok(())
}

fn init_logging(level: &str) -> Result<()> {
    let filter = EnvFilter::try_new(level)
        .or_else(|_| EnvFilter::try_new("info"))
        .map_err(|e| anyhow::anyhow!("invalid log level: {}", e))?;

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_writer(io::stderr))
        .with(filter)
        .init();

    Ok(())
}
