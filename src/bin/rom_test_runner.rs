use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{Context, Result, bail};
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use famicore::nes::Console;
use quick_xml::Reader;
use quick_xml::events::Event;
use sha1::{Digest, Sha1};
use tracing_subscriber::filter::LevelFilter;

/// Blargg-style test ROMs publish a status byte at $6000 once the
/// signature DE B0 61 appears at $6001.
const RESULT_SIGNATURE: [u8; 3] = [0xDE, 0xB0, 0x61];
const RESULT_RUNNING: u8 = 0x80;

#[derive(Debug, Clone)]
struct SuiteTest {
    filename: String,
    system: String,
    runframes: u32,
    tvsha1: String,
    recordedinput: String,
}

#[derive(Debug, Clone)]
struct RunResult {
    rgb: String,
    rgba: String,
    cart_status: Option<u8>,
    cart_message: String,
    jammed: Option<String>,
    pc: u16,
    cycles: u64,
    frames: u64,
    nmis_serviced: u64,
    ppu_ctrl: u8,
    ppu_mask: u8,
    ppu_status: u8,
}

#[derive(Debug, Clone)]
struct Config {
    suite: PathBuf,
    rom_root: PathBuf,
    max_tests: usize,
    include_recorded_input: bool,
    include_pal: bool,
    contains: Vec<String>,
    frame_multiplier: u32,
    extra_frames: u32,
    single_rom: Option<PathBuf>,
    single_frames: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            suite: PathBuf::from("external/nes-test-roms/test_roms.xml"),
            rom_root: PathBuf::from("external/nes-test-roms"),
            max_tests: 80,
            include_recorded_input: false,
            include_pal: false,
            contains: Vec::new(),
            frame_multiplier: 1,
            extra_frames: 0,
            single_rom: None,
            single_frames: 60,
        }
    }
}

fn parse_number<T: std::str::FromStr>(flag: &str, value: Option<String>) -> Result<T>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let value = value.with_context(|| format!("{flag} requires an integer"))?;
    value
        .parse::<T>()
        .with_context(|| format!("invalid {flag} value: {value}"))
}

fn parse_args() -> Result<Config> {
    let mut cfg = Config::default();
    let mut args = std::env::args().skip(1);

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--suite" => {
                let value = args.next().context(
                    "--suite requires a path, e.g. --suite external/nes-test-roms/test_roms.xml",
                )?;
                cfg.suite = PathBuf::from(value);
            }
            "--rom-root" => {
                let value = args.next().context(
                    "--rom-root requires a path, e.g. --rom-root external/nes-test-roms",
                )?;
                cfg.rom_root = PathBuf::from(value);
            }
            "--max-tests" => cfg.max_tests = parse_number("--max-tests", args.next())?,
            "--include-recorded-input" => cfg.include_recorded_input = true,
            "--include-pal" => cfg.include_pal = true,
            "--contains" => {
                let value = args
                    .next()
                    .context("--contains requires a substring, e.g. --contains vbl_nmi_timing")?;
                cfg.contains.push(value.to_lowercase());
            }
            "--frame-multiplier" => {
                cfg.frame_multiplier = parse_number("--frame-multiplier", args.next())?
            }
            "--extra-frames" => cfg.extra_frames = parse_number("--extra-frames", args.next())?,
            "--rom" => {
                let value = args.next().context("--rom requires a path to a .nes file")?;
                cfg.single_rom = Some(PathBuf::from(value));
            }
            "--frames" => cfg.single_frames = parse_number("--frames", args.next())?,
            "--help" | "-h" => {
                print_help();
                std::process::exit(0);
            }
            other => {
                bail!("unknown argument: {other}\nUse --help to view supported options.");
            }
        }
    }

    Ok(cfg)
}

fn print_help() {
    println!(
        "ROM suite runner for famicore\n\n\
Usage:\n\
  rom_test_runner [options]\n\
  rom_test_runner --rom <file.nes> [--frames <n>]\n\n\
Options:\n\
  --suite <path>                 Path to test_roms.xml\n\
  --rom-root <path>              Root path containing ROM files\n\
  --max-tests <n>                Maximum number of tests to run (default 80)\n\
  --include-recorded-input       Include tests that require replay input\n\
  --include-pal                  Include PAL tests\n\
  --contains <substr>            Only run tests whose filename contains this text (repeatable)\n\
  --frame-multiplier <n>         Multiply XML runframes by n (default 1)\n\
  --extra-frames <n>             Add n frames after XML runframes (default 0)\n\
  --rom <path>                   Run one ROM and print its frame hash\n\
  --frames <n>                   Frames to run with --rom (default 60)\n\
  -h, --help                     Show this help\n"
    );
}

fn parse_suite_xml(path: &Path) -> Result<Vec<SuiteTest>> {
    let xml = fs::read_to_string(path)
        .with_context(|| format!("failed to read suite XML: {}", path.display()))?;
    parse_suite(&xml).with_context(|| format!("failed to parse suite XML: {}", path.display()))
}

fn parse_suite(xml: &str) -> Result<Vec<SuiteTest>> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut tests = Vec::new();
    let mut current: Option<SuiteTest> = None;
    let mut reading_tvsha1 = false;
    let mut reading_recorded = false;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                let name = e.name();
                if name.as_ref() == b"test" {
                    let mut test = SuiteTest {
                        filename: String::new(),
                        system: String::new(),
                        runframes: 0,
                        tvsha1: String::new(),
                        recordedinput: String::new(),
                    };

                    for attr in e.attributes().flatten() {
                        let value = attr
                            .decode_and_unescape_value(reader.decoder())
                            .map(|v| v.to_string())
                            .unwrap_or_default();
                        match attr.key.as_ref() {
                            b"filename" => test.filename = value,
                            b"system" => test.system = value,
                            b"runframes" => test.runframes = value.parse::<u32>().unwrap_or(0),
                            _ => {}
                        }
                    }

                    current = Some(test);
                } else if name.as_ref() == b"tvsha1" {
                    reading_tvsha1 = true;
                } else if name.as_ref() == b"recordedinput" {
                    reading_recorded = true;
                }
            }
            Ok(Event::Text(e)) => {
                let text = e.decode().map(|v| v.to_string()).unwrap_or_default();
                append_text(current.as_mut(), reading_tvsha1, reading_recorded, &text);
            }
            Ok(Event::CData(e)) => {
                let text = e.decode().map(|v| v.to_string()).unwrap_or_default();
                append_text(current.as_mut(), reading_tvsha1, reading_recorded, &text);
            }
            Ok(Event::End(e)) => {
                let name = e.name();
                if name.as_ref() == b"tvsha1" {
                    reading_tvsha1 = false;
                } else if name.as_ref() == b"recordedinput" {
                    reading_recorded = false;
                } else if name.as_ref() == b"test"
                    && let Some(mut test) = current.take()
                {
                    test.tvsha1 = test.tvsha1.trim().to_string();
                    test.recordedinput = test.recordedinput.trim().to_string();
                    tests.push(test);
                }
            }
            Ok(Event::Eof) => break,
            Err(err) => bail!("malformed XML at byte {}: {err}", reader.buffer_position()),
            _ => {}
        }
    }

    Ok(tests)
}

fn append_text(test: Option<&mut SuiteTest>, tvsha1: bool, recorded: bool, text: &str) {
    let Some(test) = test else {
        return;
    };
    if tvsha1 {
        test.tvsha1.push_str(text);
    } else if recorded {
        test.recordedinput.push_str(text);
    }
}

fn should_run(test: &SuiteTest, cfg: &Config) -> bool {
    if !cfg.include_pal && test.system.eq_ignore_ascii_case("pal") {
        return false;
    }

    if !cfg.include_recorded_input && !test.recordedinput.is_empty() {
        return false;
    }

    if !cfg.contains.is_empty() {
        let lower = test.filename.to_lowercase();
        if !cfg.contains.iter().any(|f| lower.contains(f)) {
            return false;
        }
    }

    true
}

fn hash_frame_rgb(frame_rgb: &[u8]) -> String {
    BASE64_STANDARD.encode(Sha1::digest(frame_rgb))
}

fn hash_frame_rgba(frame_rgb: &[u8]) -> String {
    let mut hasher = Sha1::new();
    for px in frame_rgb.chunks_exact(3) {
        hasher.update([px[0], px[1], px[2], 0xFF]);
    }
    BASE64_STANDARD.encode(hasher.finalize())
}

/// Status byte and message text from cartridge RAM, if the ROM uses the
/// $6000 result protocol.
fn cartridge_result(ram: &[u8]) -> (Option<u8>, String) {
    if ram.len() < 4 || ram[1..4] != RESULT_SIGNATURE {
        return (None, String::new());
    }
    let text: Vec<u8> = ram[4..].iter().copied().take_while(|&b| b != 0).collect();
    (Some(ram[0]), String::from_utf8_lossy(&text).trim().to_string())
}

fn run_rom(rom_path: &Path, frames: u32) -> Result<RunResult> {
    let mut console = Console::from_file(rom_path)
        .with_context(|| format!("failed to load ROM {}", rom_path.display()))?;

    let mut jammed = None;
    for _ in 0..frames {
        if let Err(err) = console.step_frame() {
            jammed = Some(err.to_string());
            break;
        }
        let (status, _) = cartridge_result(console.cartridge_ram());
        if status.is_some_and(|s| s < RESULT_RUNNING) {
            break;
        }
    }

    let frame = console.frame();
    let (cart_status, cart_message) = cartridge_result(console.cartridge_ram());
    let ppu = console.ppu();
    Ok(RunResult {
        rgb: hash_frame_rgb(&frame),
        rgba: hash_frame_rgba(&frame),
        cart_status,
        cart_message,
        jammed,
        pc: console.cpu().regs.pc,
        cycles: console.cpu().cycles,
        frames: console.frame_count(),
        nmis_serviced: console.debug_counters().nmis_serviced,
        ppu_ctrl: ppu.ctrl(),
        ppu_mask: ppu.mask(),
        ppu_status: ppu.status(),
    })
}

fn run_single_rom(path: &Path, frames: u32) -> Result<()> {
    let result = run_rom(path, frames)?;
    println!("{}", path.display());
    println!("  frames={} rgb={} rgba={}", result.frames, result.rgb, result.rgba);
    if let Some(status) = result.cart_status {
        println!("  result=${status:02X} {}", result.cart_message);
    }
    if let Some(jam) = &result.jammed {
        println!("  stopped: {jam}");
    }
    Ok(())
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(LevelFilter::WARN)
        .with_writer(std::io::stderr)
        .init();

    let cfg = parse_args()?;
    if let Some(rom) = &cfg.single_rom {
        return run_single_rom(rom, cfg.single_frames);
    }

    let start = Instant::now();
    let tests = parse_suite_xml(&cfg.suite)?;

    let selected: Vec<SuiteTest> = tests
        .into_iter()
        .filter(|t| should_run(t, &cfg))
        .take(cfg.max_tests)
        .collect();

    println!(
        "Running {} test(s) from {}",
        selected.len(),
        cfg.suite.display()
    );

    let mut passed = 0usize;
    let mut failed = 0usize;
    let mut skipped = 0usize;

    for (idx, test) in selected.iter().enumerate() {
        let label = format!("[{}/{}] {}", idx + 1, selected.len(), test.filename);
        let frames = test
            .runframes
            .saturating_mul(cfg.frame_multiplier)
            .saturating_add(cfg.extra_frames);

        match run_rom(&cfg.rom_root.join(&test.filename), frames) {
            Ok(result) if result.rgb == test.tvsha1 => {
                passed += 1;
                println!("PASS {label} [rgb]");
            }
            Ok(result) if result.rgba == test.tvsha1 => {
                passed += 1;
                println!("PASS {label} [rgba]");
            }
            Ok(result) if result.cart_status == Some(0) => {
                passed += 1;
                println!("PASS {label} [cart-result]");
            }
            Ok(result) => {
                failed += 1;
                println!(
                    "FAIL {label}\n  expected: {}\n  got rgb : {}\n  got rgba: {}\n  pc=${:04X} cycles={} frames={} nmi_serviced={}\n  ppu ctrl=${:02X} mask=${:02X} status=${:02X}",
                    test.tvsha1,
                    result.rgb,
                    result.rgba,
                    result.pc,
                    result.cycles,
                    result.frames,
                    result.nmis_serviced,
                    result.ppu_ctrl,
                    result.ppu_mask,
                    result.ppu_status,
                );
                if let Some(status) = result.cart_status {
                    println!("  result=${status:02X} {}", result.cart_message);
                }
                if let Some(jam) = &result.jammed {
                    println!("  stopped: {jam}");
                }
            }
            Err(err) => {
                skipped += 1;
                println!("SKIP {label} -> {err:#}");
            }
        }
    }

    let elapsed = start.elapsed().as_secs_f32();
    println!();
    println!("Summary:");
    println!("- Passed: {passed}");
    println!("- Failed: {failed}");
    println!("- Skipped: {skipped}");
    println!("- Runtime: {:.2}s", elapsed);

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_suite_entries() {
        let xml = r#"<testroms>
  <test filename="cpu/official.nes" system="NTSC" runframes="600">
    <tvsha1>abc=</tvsha1>
  </test>
  <test filename="input/read.nes" system="PAL" runframes="10">
    <recordedinput><![CDATA[AAAA]]></recordedinput>
    <tvsha1> def= </tvsha1>
  </test>
</testroms>"#;
        let tests = parse_suite(xml).unwrap();

        assert_eq!(tests.len(), 2);
        assert_eq!(tests[0].filename, "cpu/official.nes");
        assert_eq!(tests[0].runframes, 600);
        assert_eq!(tests[0].tvsha1, "abc=");
        assert_eq!(tests[1].tvsha1, "def=");
        assert_eq!(tests[1].recordedinput, "AAAA");

        let cfg = Config::default();
        assert!(should_run(&tests[0], &cfg));
        assert!(!should_run(&tests[1], &cfg));
    }

    #[test]
    fn contains_filter_is_case_insensitive() {
        let test = SuiteTest {
            filename: "vbl_nmi_timing/1.frame_basics.nes".to_string(),
            system: "NTSC".to_string(),
            runframes: 1,
            tvsha1: String::new(),
            recordedinput: String::new(),
        };
        let cfg = Config {
            contains: vec!["frame_basics".to_string()],
            ..Config::default()
        };
        assert!(should_run(&test, &cfg));

        let cfg = Config {
            contains: vec!["sprite".to_string()],
            ..Config::default()
        };
        assert!(!should_run(&test, &cfg));
    }

    #[test]
    fn hashes_are_base64_sha1() {
        assert_eq!(hash_frame_rgb(b""), "2jmj7l5rSw0yVb/vlWAYkK/YBwk=");
        assert_eq!(hash_frame_rgb(b"abc"), "qZk+NkcGgWq6PiVxeFDCbJzQ2J0=");
        assert_eq!(hash_frame_rgba(&[1, 2, 3]), hash_frame_rgb(&[1, 2, 3, 0xFF]));
    }

    #[test]
    fn reads_cartridge_result_protocol() {
        let mut ram = vec![0u8; 0x2000];
        assert_eq!(cartridge_result(&ram), (None, String::new()));

        ram[0] = 0x00;
        ram[1..4].copy_from_slice(&RESULT_SIGNATURE);
        ram[4..12].copy_from_slice(b"\nPassed\n");
        assert_eq!(cartridge_result(&ram), (Some(0), "Passed".to_string()));
    }
}
