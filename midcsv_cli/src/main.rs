use std::fs::File;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::Context;
use clap::{ArgAction, Parser};
use log::LevelFilter;

use midcsv_core::record::unpack_triple;
use midcsv_core::{decode, encode, read_records, write_records, HuffmanModel, Reader};

// ── CLI definition ─────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(
    name = "midcsv",
    about = "Pack midicsv event logs into a Huffman-coded bit stream, and unpack them again",
    version
)]
struct Cli {
    /// Decode a packed stream back into midicsv text (default: encode)
    #[arg(short, long)]
    decode: bool,
    /// Print the code tables and record count of a packed stream
    #[arg(long, conflicts_with = "decode")]
    inspect: bool,
    /// Input file ("-" reads stdin)
    #[arg(default_value = "-")]
    input: PathBuf,
    /// Output file ("-" writes stdout)
    #[arg(default_value = "-")]
    output: PathBuf,
    /// Do not print the summary to stderr
    #[arg(short, long)]
    quiet: bool,
    /// Log more detail (-v info, -vv debug, -vvv trace); RUST_LOG overrides
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

// ── Helpers ────────────────────────────────────────────────────────────────

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .format_timestamp(None)
        .init();
}

fn is_std(path: &Path) -> bool {
    path.to_str() == Some("-")
}

fn read_input(path: &Path) -> anyhow::Result<Vec<u8>> {
    let mut buf = Vec::new();
    if is_std(path) {
        io::stdin().lock().read_to_end(&mut buf).context("reading stdin")?;
    } else {
        File::open(path)
            .and_then(|mut f| f.read_to_end(&mut buf))
            .with_context(|| format!("reading input file {:?}", path))?;
    }
    Ok(buf)
}

/// Output is only written once the whole run has succeeded.
fn write_output(path: &Path, bytes: &[u8]) -> anyhow::Result<()> {
    if is_std(path) {
        let mut out = io::stdout().lock();
        out.write_all(bytes)?;
        out.flush()?;
    } else {
        std::fs::write(path, bytes).with_context(|| format!("writing output file {:?}", path))?;
    }
    Ok(())
}

fn human_bytes(n: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB"];
    let mut v = n as f64;
    let mut unit = 0;
    while v >= 1024.0 && unit < UNITS.len() - 1 {
        v /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{} B", n)
    } else {
        format!("{:.2} {}", v, UNITS[unit])
    }
}

// ── Mode implementations ───────────────────────────────────────────────────

fn run_encode(input: &Path, output: &Path, quiet: bool) -> anyhow::Result<()> {
    let text = read_input(input)?;
    let t0 = Instant::now();

    let records = read_records(text.as_slice()).with_context(|| format!("parsing {:?}", input))?;
    let mut packed = Vec::new();
    let bits = encode(&records, &mut packed).context("packing records")?;
    let elapsed = t0.elapsed();

    write_output(output, &packed)?;

    if !quiet {
        eprintln!("  records     : {}", records.len());
        eprintln!("  text size   : {}", human_bytes(text.len() as u64));
        eprintln!("  packed      : {} ({} bits)", human_bytes(packed.len() as u64), bits);
        eprintln!("  ratio       : {:.2}x", text.len() as f64 / packed.len().max(1) as f64);
        eprintln!("  elapsed     : {:.3}s", elapsed.as_secs_f64());
    }
    Ok(())
}

fn run_decode(input: &Path, output: &Path, quiet: bool) -> anyhow::Result<()> {
    let packed = read_input(input)?;
    let t0 = Instant::now();

    let records = decode(packed.as_slice()).with_context(|| format!("unpacking {:?}", input))?;
    let mut text = Vec::new();
    write_records(&mut text, &records)?;
    let elapsed = t0.elapsed();

    write_output(output, &text)?;

    if !quiet {
        eprintln!("  records     : {}", records.len());
        eprintln!("  packed      : {}", human_bytes(packed.len() as u64));
        eprintln!("  text size   : {}", human_bytes(text.len() as u64));
        eprintln!("  elapsed     : {:.3}s", elapsed.as_secs_f64());
    }
    Ok(())
}

fn print_table(out: &mut impl Write, title: &str, model: &HuffmanModel, triples: bool) -> io::Result<()> {
    writeln!(out, "  {title}")?;
    writeln!(out, "    key bits     : {}", model.max_bits())?;
    writeln!(out, "    entries      : {}", model.len())?;
    writeln!(out, "    longest code : {}", model.longest_code())?;
    if model.is_empty() {
        return Ok(());
    }
    writeln!(out)?;
    writeln!(out, "    {:>14}  {:>4}  {}", "value", "len", "code")?;
    writeln!(out, "    {}", "-".repeat(40))?;
    for (value, code) in model.iter() {
        let shown = if triples {
            let [a, b, c] = unpack_triple(value);
            format!("{a}, {b}, {c}")
        } else {
            value.to_string()
        };
        writeln!(out, "    {:>14}  {:>4}  {}", shown, code.len(), code)?;
    }
    Ok(())
}

fn run_inspect(input: &Path, output: &Path) -> anyhow::Result<()> {
    let packed = read_input(input)?;
    let reader = Reader::open(packed.as_slice()).with_context(|| format!("reading header of {:?}", input))?;
    let header = reader.header();

    let mut report = Vec::new();
    writeln!(report, "=== packed midicsv stream: {:?} ===", input)?;
    writeln!(report)?;
    writeln!(report, "  stream size    : {}", human_bytes(packed.len() as u64))?;
    writeln!(report, "  record count   : {}", header.record_count)?;
    writeln!(report, "  header size    : {} bits", reader.bits_read())?;
    writeln!(report)?;
    print_table(&mut report, "time deltas", &header.time_model, false)?;
    writeln!(report)?;
    print_table(&mut report, "parameter triples", &header.param_model, true)?;

    write_output(output, &report)
}

// ── Entry point ────────────────────────────────────────────────────────────

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    if cli.inspect {
        run_inspect(&cli.input, &cli.output)
    } else if cli.decode {
        run_decode(&cli.input, &cli.output, cli.quiet)
    } else {
        run_encode(&cli.input, &cli.output, cli.quiet)
    }
}
