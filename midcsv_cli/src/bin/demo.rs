//! midcsv demo
//!
//! Generates a deterministic piano piece in midicsv form, packs it, unpacks
//! it, checks the text comes back byte for byte, and reports where the bits
//! went.

use std::time::Instant;

use anyhow::{bail, Result};

use midcsv_core::{decode, encode, read_records, write_records, Reader, Record};

// ── constants ──────────────────────────────────────────────────────────────

const TRACKS: u8 = 3;
const BARS: u32 = 48;
const TICKS_PER_QUARTER: u32 = 480;

// C major and A minor arpeggio roots; the small set keeps the triple table short
const ROOTS: &[u8] = &[48, 53, 55, 57, 60];
const SHAPE: &[u8] = &[0, 4, 7, 12];
const VELOCITIES: &[u8] = &[64, 80, 96];
const STEPS: &[u32] = &[120, 240, 240, 480];

// ── data generator ──────────────────────────────────────────────────────────

struct Lcg(u64);

impl Lcg {
    fn next(&mut self) -> u64 {
        self.0 = self.0.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
        self.0 >> 33
    }

    fn pick<T: Copy>(&mut self, items: &[T]) -> T {
        items[(self.next() % items.len() as u64) as usize]
    }
}

/// The same seed always produces the same text.
fn generate_piece(seed: u64) -> String {
    let mut rng = Lcg(seed);
    let mut lines = vec![format!("0, 0, Header, 1, {}, {}", TRACKS, TICKS_PER_QUARTER)];

    for track in 1..=TRACKS {
        let channel = track - 1;
        lines.push(format!("{track}, 0, Start_track"));
        if track == 1 {
            lines.push("1, 0, Title_t, \"Generated Sonatina\"".to_string());
            lines.push("1, 0, Time_signature, 4, 2, 24, 8".to_string());
            lines.push("1, 0, Tempo, 500000".to_string());
        }
        lines.push(format!("{track}, 0, Control_c, {channel}, 7, 100"));

        let mut time = 0u32;
        let end = BARS * 4 * TICKS_PER_QUARTER;
        while time < end {
            let root = rng.pick(ROOTS) - 12 * (track - 1).min(2);
            let velocity = rng.pick(VELOCITIES);
            for &offset in SHAPE {
                let note = root + offset;
                let step = rng.pick(STEPS);
                lines.push(format!("{track}, {time}, Note_on_c, {channel}, {note}, {velocity}"));
                time += step;
                lines.push(format!("{track}, {time}, Note_off_c, {channel}, {note}, 0"));
            }
        }
        lines.push(format!("{track}, {time}, End_track"));
    }
    lines.push("0, 0, End_of_file".to_string());

    let mut text = lines.join("\n");
    text.push('\n');
    text
}

// ── demo runner ─────────────────────────────────────────────────────────────

fn run() -> Result<()> {
    section("0 · DATA GENERATION");
    let text = generate_piece(0x5EED);
    let records: Vec<Record> = read_records(text.as_bytes())?;
    println!("  tracks      : {}", TRACKS);
    println!("  records     : {}", records.len());
    println!("  text size   : {} B", text.len());
    println!();

    section("1 · PACK");
    let t0 = Instant::now();
    let mut packed = Vec::new();
    let bits = encode(&records, &mut packed)?;
    let pack_time = t0.elapsed();
    println!("  packed      : {} B ({} bits)", packed.len(), bits);
    println!("  ratio       : {:.2}x", text.len() as f64 / packed.len() as f64);
    println!("  bits/record : {:.2}", bits as f64 / records.len() as f64);
    println!("  elapsed     : {:.3} ms", pack_time.as_secs_f64() * 1000.0);
    println!();

    section("2 · HEADER");
    let reader = Reader::open(packed.as_slice())?;
    let header = reader.header();
    println!("  header bits : {}", reader.bits_read());
    println!(
        "  time table  : {} deltas, longest code {} bits",
        header.time_model.len(),
        header.time_model.longest_code()
    );
    println!(
        "  param table : {} triples, longest code {} bits",
        header.param_model.len(),
        header.param_model.longest_code()
    );
    println!();

    section("3 · UNPACK + VERIFY");
    let t0 = Instant::now();
    let decoded = decode(packed.as_slice())?;
    let unpack_time = t0.elapsed();
    let mut restored = Vec::new();
    write_records(&mut restored, &decoded)?;
    if restored != text.as_bytes() {
        bail!("round trip mismatch: restored text differs from the generated piece");
    }
    println!("  records     : {}", decoded.len());
    println!("  elapsed     : {:.3} ms", unpack_time.as_secs_f64() * 1000.0);
    println!("  text        : identical ✓");
    Ok(())
}

// ── small helpers ──────────────────────────────────────────────────────────

fn section(title: &str) {
    println!("━━━ {title} {}", "━".repeat(70usize.saturating_sub(title.len() + 5)));
}

fn main() {
    if let Err(e) = run() {
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}
