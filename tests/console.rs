use famicore::nes::cartridge::{CartridgeError, PRG_BANK_SIZE};
use famicore::nes::cpu::{FLAG_NEGATIVE, FLAG_ZERO, StepError};
use famicore::nes::frame::{FRAME_BYTES, FRAME_WIDTH};
use famicore::nes::{BUTTON_A, BUTTON_RIGHT, BUTTON_START, Console, palette};

const NMI_HANDLER: u16 = 0x9000;

/// NROM-128 image: `program` at $8000, an `INC $00 ; RTI` NMI handler at
/// $9000, 8 KiB CHR-RAM.
fn nrom(program: &[u8]) -> Vec<u8> {
    let mut image = vec![b'N', b'E', b'S', 0x1A, 1, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0];
    let mut prg = vec![0xEA; PRG_BANK_SIZE];
    prg[..program.len()].copy_from_slice(program);
    prg[0x1000..0x1003].copy_from_slice(&[0xE6, 0x00, 0x40]);
    prg[0x3FFA..].copy_from_slice(&[0x00, 0x90, 0x00, 0x80, 0x00, 0x80]);
    image.extend_from_slice(&prg);
    image
}

fn boot(program: &[u8]) -> Console {
    Console::from_bytes(&nrom(program)).expect("valid NROM image")
}

#[test]
fn lda_immediate_loads_and_sets_flags() {
    let mut console = boot(&[0xA9, 0x05, 0xA9, 0x00, 0xA9, 0x80]);

    assert_eq!(console.step(), Ok(2));
    let regs = console.cpu().regs;
    assert_eq!(regs.a, 0x05);
    assert_eq!(regs.pc, 0x8002);
    assert!(!regs.p.get(FLAG_ZERO));
    assert!(!regs.p.get(FLAG_NEGATIVE));

    console.step().unwrap();
    assert!(console.cpu().regs.p.get(FLAG_ZERO));
    console.step().unwrap();
    assert!(console.cpu().regs.p.get(FLAG_NEGATIVE));
}

#[test]
fn jsr_pushes_return_address_minus_one() {
    let mut console = boot(&[0x20, 0x34, 0x12]);

    assert_eq!(console.step(), Ok(6));
    let regs = console.cpu().regs;
    assert_eq!(regs.pc, 0x1234);
    assert_eq!(regs.sp, 0xFB);
    assert_eq!(console.peek(0x01FD), 0x80);
    assert_eq!(console.peek(0x01FC), 0x02);
}

#[test]
fn vblank_nmi_is_serviced_on_the_following_step() {
    // LDA #$80 ; STA $2000 ; loop: JMP loop
    let mut console = boot(&[0xA9, 0x80, 0x8D, 0x00, 0x20, 0x4C, 0x05, 0x80]);

    let mut steps = 0;
    while !console.cpu().nmi_pending() {
        console.step().unwrap();
        steps += 1;
        assert!(steps < 40_000, "NMI never raised");
    }
    let ppu = console.ppu();
    assert_eq!(ppu.scanline(), 241);
    assert!((4..=12).contains(&ppu.cycle()), "cycle {}", ppu.cycle());
    assert_ne!(ppu.status() & 0x80, 0);
    assert_eq!(console.cpu().regs.pc, 0x8005);

    assert_eq!(console.step(), Ok(7));
    assert_eq!(console.cpu().regs.pc, NMI_HANDLER);
    assert_eq!(console.peek(0x01FD), 0x80);
    assert_eq!(console.peek(0x01FC), 0x05);

    // INC $00 ; RTI
    console.step().unwrap();
    console.step().unwrap();
    assert_eq!(console.cpu().regs.pc, 0x8005);
    assert_eq!(console.peek(0x0000), 1);
    assert_eq!(console.debug_counters().nmis_serviced, 1);
}

#[test]
fn one_nmi_per_frame() {
    let mut console = boot(&[0xA9, 0x80, 0x8D, 0x00, 0x20, 0x4C, 0x05, 0x80]);
    for _ in 0..5 {
        console.step_frame().unwrap();
    }
    assert_eq!(console.peek(0x0000), 5);
    assert_eq!(console.frame_count(), 5);
}

#[test]
fn controller_reads_through_the_cpu() {
    // Strobe, then eight reads of $4016 stored at $10-$17, a ninth at $18.
    let mut program = vec![0xA9, 0x01, 0x8D, 0x16, 0x40, 0xA9, 0x00, 0x8D, 0x16, 0x40];
    for i in 0..9u8 {
        program.extend_from_slice(&[0xAD, 0x16, 0x40, 0x85, 0x10 + i]);
    }
    let mut console = boot(&program);
    console.set_buttons(0, BUTTON_A | BUTTON_START | BUTTON_RIGHT);

    for _ in 0..(4 + 2 * 9) {
        console.step().unwrap();
    }

    let bits: Vec<u8> = (0..9).map(|i| console.peek(0x10 + i) & 0x01).collect();
    assert_eq!(bits, vec![1, 0, 0, 1, 0, 0, 0, 1, 1]);
    assert_eq!(console.peek(0x10) & 0xE0, 0x40);
}

#[test]
fn invalid_header_is_rejected_without_a_console() {
    let mut image = nrom(&[]);
    image[0] = b'X';

    assert!(matches!(
        Console::from_bytes(&image),
        Err(CartridgeError::InvalidHeader { .. })
    ));
    assert!(matches!(
        Console::from_bytes(&image[..8]),
        Err(CartridgeError::InvalidHeader { .. })
    ));
}

#[test]
fn other_mappers_are_rejected() {
    let mut image = nrom(&[]);
    image[6] = 0x10;

    assert!(matches!(
        Console::from_bytes(&image),
        Err(CartridgeError::UnsupportedMapper(1))
    ));
}

#[test]
fn oam_dma_copies_ram_page_and_stalls() {
    // LDA #$AB ; STA $0300 ; LDA #$03 ; STA $4014
    let mut console = boot(&[0xA9, 0xAB, 0x8D, 0x00, 0x03, 0xA9, 0x03, 0x8D, 0x14, 0x40]);
    console.step().unwrap();
    console.step().unwrap();
    console.step().unwrap();

    // 8 cycles so far; STA brings the total to 12, even.
    assert_eq!(console.step(), Ok(4 + 513));
    assert_eq!(console.ppu().oam()[0], 0xAB);
    assert_eq!(console.cpu().cycles, 12 + 513);
    assert_eq!(console.debug_counters().dma_transfers, 1);
}

#[test]
fn jam_halts_until_reset() {
    let mut console = boot(&[0xA9, 0x01, 0x12]);
    console.step().unwrap();

    let jam = StepError::Jammed {
        opcode: 0x12,
        pc: 0x8002,
    };
    assert_eq!(console.step(), Err(jam));
    assert_eq!(console.step_frame(), Err(jam));
    assert_eq!(console.cpu().regs.a, 0x01);

    console.reset();
    assert_eq!(console.cpu().regs.pc, 0x8000);
    assert_eq!(console.step(), Ok(2));
}

#[test]
fn step_frame_publishes_backdrop_colour() {
    // Set the universal background to $21 through $2006/$2007.
    let mut console = boot(&[
        0xA9, 0x3F, 0x8D, 0x06, 0x20, 0xA9, 0x00, 0x8D, 0x06, 0x20, 0xA9, 0x21, 0x8D, 0x07, 0x20,
        0x4C, 0x0F, 0x80,
    ]);
    let first = console.step_frame().unwrap();
    let second = console.step_frame().unwrap();

    assert_eq!(second.len(), FRAME_BYTES);
    assert!(!std::sync::Arc::ptr_eq(&first, &second));
    let centre = (120 * FRAME_WIDTH + 128) * 3;
    assert_eq!(&second[centre..centre + 3], &palette::rgb(0x21));
    assert_eq!(console.frame_count(), 2);
}

#[test]
fn ram_mirrors_are_visible_to_programs() {
    // LDA #$5A ; STA $0812 ; LDA $1812
    let mut console = boot(&[0xA9, 0x5A, 0x8D, 0x12, 0x08, 0xA9, 0x00, 0xAD, 0x12, 0x18]);
    for _ in 0..4 {
        console.step().unwrap();
    }
    assert_eq!(console.cpu().regs.a, 0x5A);
    assert_eq!(console.peek(0x0012), 0x5A);
}
