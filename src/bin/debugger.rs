use std::collections::BTreeSet;
use std::io::{BufRead, Write};
use std::path::Path;

use anyhow::{Context, Result, bail};
use famicore::nes::Console;
use famicore::nes::cpu::StepError;
use tracing_subscriber::filter::LevelFilter;

/// Instructions `run` executes before giving the prompt back.
const RUN_STEP_LIMIT: usize = 5_000_000;

fn print_help() {
    println!("Commands:");
    println!("  step, s [n]    - Step n instructions (default 1)");
    println!("  frame, f [n]   - Run n whole frames (default 1)");
    println!("  run, r         - Run until a breakpoint or jam");
    println!("  bp <addr>      - Toggle breakpoint at address");
    println!("  regs           - Show CPU registers");
    println!("  mem <addr> [n] - Show n bytes from address (default 16)");
    println!("  dis <addr> [n] - Disassemble n instructions (default 8)");
    println!("  ppu            - Show PPU state");
    println!("  events [n]     - Show recent core events");
    println!("  reset          - Reset the console");
    println!("  quit, q        - Exit debugger");
}

fn parse_addr(text: &str) -> Result<u16> {
    let digits = text
        .trim_start_matches('$')
        .trim_start_matches("0x")
        .trim_start_matches("0X");
    u16::from_str_radix(digits, 16).with_context(|| format!("invalid address: {text}"))
}

fn parse_count(text: Option<&&str>, default: usize) -> Result<usize> {
    match text {
        Some(text) => text
            .parse::<usize>()
            .with_context(|| format!("invalid count: {text}")),
        None => Ok(default),
    }
}

fn print_regs(console: &Console) {
    let regs = console.cpu().regs;
    println!(
        "PC: ${:04X}  A: ${:02X}  X: ${:02X}  Y: ${:02X}  SP: ${:02X}  P: {} (${:02X})  CYC: {}",
        regs.pc,
        regs.a,
        regs.x,
        regs.y,
        regs.sp,
        regs.p,
        regs.p.bits(),
        console.cpu().cycles
    );
}

fn print_next(console: &Console) {
    let pc = console.cpu().regs.pc;
    let (text, _) = console.disassemble(pc);
    println!("${pc:04X}  {text}");
}

fn print_memory(console: &Console, addr: u16, len: usize) {
    for row in 0..len.div_ceil(16) {
        let base = addr.wrapping_add((row * 16) as u16);
        let count = (len - row * 16).min(16);
        let bytes: Vec<String> = (0..count)
            .map(|i| format!("{:02X}", console.peek(base.wrapping_add(i as u16))))
            .collect();
        println!("{base:04X}: {}", bytes.join(" "));
    }
}

fn print_disassembly(console: &Console, addr: u16, count: usize) {
    let mut pc = addr;
    for _ in 0..count {
        let (text, size) = console.disassemble(pc);
        let bytes: Vec<String> = (0..size)
            .map(|i| format!("{:02X}", console.peek(pc.wrapping_add(i as u16))))
            .collect();
        println!("${pc:04X}  {:<9} {text}", bytes.join(" "));
        pc = pc.wrapping_add(size as u16);
    }
}

fn print_ppu(console: &Console) {
    let ppu = console.ppu();
    let counters = console.debug_ppu_counters();
    println!("PPU State:");
    println!(
        "  Frame: {}, Scanline: {}, Cycle: {}",
        ppu.frame_count(),
        ppu.scanline(),
        ppu.cycle()
    );
    println!("  $2000 (ctrl):   {:08b}", ppu.ctrl());
    println!("  $2001 (mask):   {:08b}", ppu.mask());
    println!("  $2002 (status): {:08b}", ppu.status());
    println!(
        "  v=${:04X} t=${:04X} fine_x={}",
        ppu.vram_addr(),
        ppu.temp_addr(),
        ppu.fine_x()
    );
    println!(
        "  vblanks={} nmi edges/fired/cancelled={}/{}/{} sprite0_hits={} overflows={}",
        counters.vblank_entries,
        counters.nmi_edges,
        counters.nmi_fired,
        counters.nmi_cancelled,
        counters.sprite0_hits,
        counters.sprite_overflow_events
    );
}

/// Steps up to `limit` instructions, stopping early on a breakpoint.
/// Returns how many ran.
fn run_until(
    console: &mut Console,
    breakpoints: &BTreeSet<u16>,
    limit: usize,
) -> Result<usize, StepError> {
    for count in 0..limit {
        console.step()?;
        if breakpoints.contains(&console.cpu().regs.pc) {
            return Ok(count + 1);
        }
    }
    Ok(limit)
}

fn report_jam(err: StepError) {
    println!("Stopped: {err}");
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(LevelFilter::INFO)
        .with_writer(std::io::stderr)
        .init();

    println!("famicore debugger");
    println!("=================");
    println!();

    let args: Vec<String> = std::env::args().collect();
    if args.len() < 2 {
        println!("Usage: famicore_debug <rom.nes>");
        println!();
        print_help();
        return Ok(());
    }

    let rom_path = Path::new(&args[1]);
    println!("Loading ROM: {}", rom_path.display());
    let mut console = Console::from_file(rom_path)
        .with_context(|| format!("failed to load {}", rom_path.display()))?;

    println!("Mapper: {}", console.mapper_name());
    println!();
    print_regs(&console);
    print_next(&console);
    println!();
    println!("Type 'help' for commands");

    let mut breakpoints = BTreeSet::new();
    let stdin = std::io::stdin();
    let mut lines = stdin.lock().lines();

    loop {
        print!("> ");
        std::io::stdout().flush().ok();

        let Some(line) = lines.next() else {
            break;
        };
        let line = line.context("failed to read command")?;
        let parts: Vec<&str> = line.split_whitespace().collect();
        let Some(&command) = parts.first() else {
            continue;
        };

        let outcome = (|| -> Result<bool> {
            match command {
                "help" | "h" => print_help(),
                "step" | "s" => {
                    let count = parse_count(parts.get(1), 1)?;
                    for _ in 0..count {
                        if let Err(err) = console.step() {
                            report_jam(err);
                            break;
                        }
                    }
                    print_regs(&console);
                    print_next(&console);
                }
                "frame" | "f" => {
                    let count = parse_count(parts.get(1), 1)?;
                    for _ in 0..count {
                        if let Err(err) = console.step_frame() {
                            report_jam(err);
                            break;
                        }
                    }
                    println!("Frame {}", console.frame_count());
                    print_regs(&console);
                }
                "run" | "r" => {
                    match run_until(&mut console, &breakpoints, RUN_STEP_LIMIT) {
                        Ok(count) if breakpoints.contains(&console.cpu().regs.pc) => {
                            println!("Breakpoint after {count} instruction(s)");
                        }
                        Ok(count) => println!("Paused after {count} instruction(s)"),
                        Err(err) => report_jam(err),
                    }
                    print_regs(&console);
                    print_next(&console);
                }
                "bp" => {
                    let Some(text) = parts.get(1) else {
                        bail!("usage: bp <addr>");
                    };
                    let addr = parse_addr(text)?;
                    if breakpoints.remove(&addr) {
                        println!("Breakpoint cleared at ${addr:04X}");
                    } else {
                        breakpoints.insert(addr);
                        println!("Breakpoint set at ${addr:04X}");
                    }
                }
                "regs" => print_regs(&console),
                "mem" => {
                    let Some(text) = parts.get(1) else {
                        bail!("usage: mem <addr> [n]");
                    };
                    print_memory(&console, parse_addr(text)?, parse_count(parts.get(2), 16)?);
                }
                "dis" => {
                    let addr = match parts.get(1) {
                        Some(text) => parse_addr(text)?,
                        None => console.cpu().regs.pc,
                    };
                    print_disassembly(&console, addr, parse_count(parts.get(2), 8)?);
                }
                "ppu" => print_ppu(&console),
                "events" => {
                    for event in console.recent_events(parse_count(parts.get(1), 16)?) {
                        println!("  {event}");
                    }
                }
                "reset" => {
                    console.reset();
                    print_regs(&console);
                }
                "quit" | "q" => return Ok(false),
                other => println!("Unknown command: {other}. Type 'help' for available commands."),
            }
            Ok(true)
        })();

        match outcome {
            Ok(true) => {}
            Ok(false) => break,
            Err(err) => println!("Error: {err:#}"),
        }
    }

    println!("Goodbye!");
    Ok(())
}
