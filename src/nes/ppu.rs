use super::frame::{Frame, FrameBuffer};
use super::mapper::Mirroring;
use super::palette;

pub const CYCLES_PER_SCANLINE: u16 = 341;
pub const SCANLINES_PER_FRAME: u16 = 262;
pub const VBLANK_SCANLINE: u16 = 241;
pub const PRE_RENDER_SCANLINE: u16 = 261;

const CTRL_NMI_ENABLE: u8 = 0x80;
const CTRL_SPRITE_SIZE_16: u8 = 0x20;
const CTRL_BG_TABLE: u8 = 0x10;
const CTRL_SPRITE_TABLE: u8 = 0x08;
const CTRL_VRAM_INC_32: u8 = 0x04;

const MASK_GRAYSCALE: u8 = 0x01;
const MASK_SHOW_BG_LEFT: u8 = 0x02;
const MASK_SHOW_SPRITE_LEFT: u8 = 0x04;
const MASK_SHOW_BG: u8 = 0x08;
const MASK_SHOW_SPRITES: u8 = 0x10;

const STATUS_SPRITE_OVERFLOW: u8 = 0x20;
const STATUS_SPRITE_ZERO_HIT: u8 = 0x40;
const STATUS_VBLANK: u8 = 0x80;

/// PPU ticks between the NMI line rising and the CPU seeing it. A $2002
/// read inside this window cancels the NMI.
const NMI_DELAY_TICKS: u8 = 2;

const PATTERN_SIZE: usize = 0x2000;
const NAMETABLE_SIZE: usize = 0x0800;
const MAX_SPRITES_PER_LINE: usize = 8;

#[derive(Debug, Clone, Copy, Default)]
pub struct PpuDebugCounters {
    pub ticks: u64,
    pub vblank_entries: u64,
    pub vblank_suppressed: u64,
    pub nmi_edges: u64,
    pub nmi_fired: u64,
    pub nmi_cancelled: u64,
    pub status_reads: u64,
    pub sprite_overflow_events: u64,
    pub sprite0_hits: u64,
    pub pattern_writes: u64,
    pub nametable_writes: u64,
    pub palette_writes: u64,
}

pub struct Ppu {
    ctrl: u8,
    mask: u8,
    status: u8,

    oam_addr: u8,
    oam: [u8; 256],

    chr: Vec<u8>,
    chr_writable: bool,
    nametables: [u8; NAMETABLE_SIZE],
    palette_ram: [u8; 32],
    mirroring: Mirroring,

    write_toggle: bool,
    v: u16,
    t: u16,
    fine_x: u8,
    read_buffer: u8,
    open_bus: u8,

    scanline: u16,
    cycle: u16,
    frame: u64,
    odd_frame: bool,

    nmi_line: bool,
    nmi_delay: u8,
    nmi_pending: bool,
    vblank_suppress: bool,

    next_tile_id: u8,
    next_tile_attr: u8,
    next_tile_lsb: u8,
    next_tile_msb: u8,
    bg_shift_pattern_lo: u16,
    bg_shift_pattern_hi: u16,
    bg_shift_attr_lo: u16,
    bg_shift_attr_hi: u16,

    sprite_count: usize,
    sprite_patterns_lo: [u8; MAX_SPRITES_PER_LINE],
    sprite_patterns_hi: [u8; MAX_SPRITES_PER_LINE],
    sprite_x: [u8; MAX_SPRITES_PER_LINE],
    sprite_attributes: [u8; MAX_SPRITES_PER_LINE],
    sprite_indices: [u8; MAX_SPRITES_PER_LINE],

    frame_buffer: FrameBuffer,
    debug: PpuDebugCounters,
}

impl Ppu {
    /// `chr` is the cartridge's 8 KiB of pattern data. CHR-RAM carts pass
    /// `chr_writable = true` so $2007 writes below $2000 stick.
    pub fn new(chr: Vec<u8>, chr_writable: bool, mirroring: Mirroring) -> Self {
        let mut chr = chr;
        chr.resize(PATTERN_SIZE, 0);
        Self {
            ctrl: 0,
            mask: 0,
            status: 0,
            oam_addr: 0,
            oam: [0; 256],
            chr,
            chr_writable,
            nametables: [0; NAMETABLE_SIZE],
            // Black backdrop until the program loads its own palette.
            palette_ram: [0x0F; 32],
            mirroring,
            write_toggle: false,
            v: 0,
            t: 0,
            fine_x: 0,
            read_buffer: 0,
            open_bus: 0,
            scanline: 0,
            cycle: 0,
            frame: 0,
            odd_frame: false,
            nmi_line: false,
            nmi_delay: 0,
            nmi_pending: false,
            vblank_suppress: false,
            next_tile_id: 0,
            next_tile_attr: 0,
            next_tile_lsb: 0,
            next_tile_msb: 0,
            bg_shift_pattern_lo: 0,
            bg_shift_pattern_hi: 0,
            bg_shift_attr_lo: 0,
            bg_shift_attr_hi: 0,
            sprite_count: 0,
            sprite_patterns_lo: [0; MAX_SPRITES_PER_LINE],
            sprite_patterns_hi: [0; MAX_SPRITES_PER_LINE],
            sprite_x: [0; MAX_SPRITES_PER_LINE],
            sprite_attributes: [0; MAX_SPRITES_PER_LINE],
            sprite_indices: [0; MAX_SPRITES_PER_LINE],
            frame_buffer: FrameBuffer::new(),
            debug: PpuDebugCounters::default(),
        }
    }

    /// Register and timing state return to power-up values. Pattern,
    /// name-table, palette and OAM contents survive, as on hardware.
    pub fn reset(&mut self) {
        self.ctrl = 0;
        self.mask = 0;
        self.status = 0;
        self.oam_addr = 0;
        self.write_toggle = false;
        self.v = 0;
        self.t = 0;
        self.fine_x = 0;
        self.read_buffer = 0;
        self.open_bus = 0;
        self.scanline = 0;
        self.cycle = 0;
        self.frame = 0;
        self.odd_frame = false;
        self.nmi_line = false;
        self.nmi_delay = 0;
        self.nmi_pending = false;
        self.vblank_suppress = false;
        self.bg_shift_pattern_lo = 0;
        self.bg_shift_pattern_hi = 0;
        self.bg_shift_attr_lo = 0;
        self.bg_shift_attr_hi = 0;
        self.sprite_count = 0;
        self.frame_buffer.clear();
        self.debug = PpuDebugCounters::default();
    }

    /// Most recently completed frame.
    pub fn frame(&self) -> Frame {
        self.frame_buffer.front()
    }

    pub fn frame_count(&self) -> u64 {
        self.frame
    }

    pub fn scanline(&self) -> u16 {
        self.scanline
    }

    pub fn cycle(&self) -> u16 {
        self.cycle
    }

    pub fn ctrl(&self) -> u8 {
        self.ctrl
    }

    pub fn mask(&self) -> u8 {
        self.mask
    }

    pub fn status(&self) -> u8 {
        self.status
    }

    pub fn vram_addr(&self) -> u16 {
        self.v
    }

    pub fn temp_addr(&self) -> u16 {
        self.t
    }

    pub fn fine_x(&self) -> u8 {
        self.fine_x
    }

    pub fn oam(&self) -> &[u8; 256] {
        &self.oam
    }

    pub fn debug_counters(&self) -> PpuDebugCounters {
        self.debug
    }

    pub fn take_nmi(&mut self) -> bool {
        std::mem::take(&mut self.nmi_pending)
    }

    pub fn cpu_read_register(&mut self, addr: u16) -> u8 {
        let value = match addr & 0x0007 {
            2 => {
                self.debug.status_reads = self.debug.status_reads.wrapping_add(1);

                // One tick before vblank: the flag never sets this frame.
                if self.scanline == VBLANK_SCANLINE && self.cycle == 0 {
                    self.vblank_suppress = true;
                    self.debug.vblank_suppressed = self.debug.vblank_suppressed.wrapping_add(1);
                }
                if self.nmi_delay > 0 {
                    self.debug.nmi_cancelled = self.debug.nmi_cancelled.wrapping_add(1);
                }

                let value = (self.status & 0xE0) | (self.open_bus & 0x1F);
                self.status &= !STATUS_VBLANK;
                self.write_toggle = false;
                self.update_nmi_line();
                value
            }
            4 => self.oam[self.oam_addr as usize],
            7 => {
                let ppu_addr = self.v & 0x3FFF;
                let value = self.ppu_read(ppu_addr);
                let result = if ppu_addr >= 0x3F00 {
                    // Palette reads bypass the buffer, which picks up the
                    // name-table byte underneath instead.
                    self.read_buffer = self.ppu_read(ppu_addr - 0x1000);
                    value
                } else {
                    std::mem::replace(&mut self.read_buffer, value)
                };
                self.increment_vram_addr_cpu_access();
                result
            }
            _ => self.open_bus,
        };
        self.open_bus = value;
        value
    }

    /// What a CPU read would return, without touching flags, the write
    /// toggle, the read buffer or `v`.
    pub fn peek_register(&self, addr: u16) -> u8 {
        match addr & 0x0007 {
            2 => (self.status & 0xE0) | (self.open_bus & 0x1F),
            4 => self.oam[self.oam_addr as usize],
            7 => {
                let ppu_addr = self.v & 0x3FFF;
                if ppu_addr >= 0x3F00 {
                    self.ppu_read(ppu_addr)
                } else {
                    self.read_buffer
                }
            }
            _ => self.open_bus,
        }
    }

    pub fn cpu_write_register(&mut self, addr: u16, value: u8) {
        self.open_bus = value;
        match addr & 0x0007 {
            0 => {
                self.ctrl = value;
                self.t = (self.t & !0x0C00) | (((value as u16) & 0x03) << 10);
                self.update_nmi_line();
            }
            1 => self.mask = value,
            2 => {}
            3 => self.oam_addr = value,
            4 => {
                self.oam[self.oam_addr as usize] = value;
                self.oam_addr = self.oam_addr.wrapping_add(1);
            }
            5 => {
                if !self.write_toggle {
                    self.fine_x = value & 0x07;
                    self.t = (self.t & !0x001F) | ((value as u16) >> 3);
                } else {
                    self.t = (self.t & !0x03E0) | (((value as u16) >> 3) << 5);
                    self.t = (self.t & !0x7000) | (((value as u16) & 0x07) << 12);
                }
                self.write_toggle = !self.write_toggle;
            }
            6 => {
                if !self.write_toggle {
                    self.t = (self.t & 0x00FF) | (((value as u16) & 0x3F) << 8);
                } else {
                    self.t = (self.t & 0x7F00) | value as u16;
                    self.v = self.t;
                }
                self.write_toggle = !self.write_toggle;
            }
            _ => {
                let ppu_addr = self.v & 0x3FFF;
                self.ppu_write(ppu_addr, value);
                self.increment_vram_addr_cpu_access();
            }
        }
    }

    /// OAM DMA payload, written starting at the current OAMADDR.
    pub fn write_oam_dma(&mut self, bytes: &[u8; 256]) {
        for &byte in bytes {
            self.oam[self.oam_addr as usize] = byte;
            self.oam_addr = self.oam_addr.wrapping_add(1);
        }
    }

    /// Side-effect-free view of PPU address space.
    pub fn peek_memory(&self, addr: u16) -> u8 {
        self.ppu_read(addr)
    }

    pub fn tick(&mut self) {
        self.debug.ticks = self.debug.ticks.wrapping_add(1);

        if self.nmi_delay > 0 {
            self.nmi_delay -= 1;
            if self.nmi_delay == 0 && self.nmi_line {
                self.nmi_pending = true;
                self.debug.nmi_fired = self.debug.nmi_fired.wrapping_add(1);
            }
        }

        let visible_line = self.scanline < 240;
        let pre_render = self.scanline == PRE_RENDER_SCANLINE;
        let rendering_enabled = self.rendering_enabled();

        if visible_line && (1..=256).contains(&self.cycle) {
            self.render_pixel((self.cycle - 1) as usize, self.scanline as usize);
        }

        if (visible_line || pre_render) && rendering_enabled {
            if (1..=256).contains(&self.cycle) || (321..=336).contains(&self.cycle) {
                self.shift_background_registers();
                self.fetch_background(self.cycle % 8);
            }

            if self.cycle == 256 {
                self.increment_y();
            }

            if self.cycle == 257 {
                self.copy_horizontal_bits();
                if visible_line {
                    self.evaluate_sprites();
                }
            }

            if pre_render && (280..=304).contains(&self.cycle) {
                self.copy_vertical_bits();
            }
        } else if visible_line && self.cycle == 257 {
            self.sprite_count = 0;
        }

        if self.scanline == VBLANK_SCANLINE && self.cycle == 1 {
            self.debug.vblank_entries = self.debug.vblank_entries.wrapping_add(1);
            if !self.vblank_suppress {
                self.status |= STATUS_VBLANK;
            }
            self.vblank_suppress = false;
            self.update_nmi_line();
        }

        if pre_render && self.cycle == 1 {
            self.status &= !(STATUS_VBLANK | STATUS_SPRITE_ZERO_HIT | STATUS_SPRITE_OVERFLOW);
            self.sprite_count = 0;
            self.update_nmi_line();
        }

        // NTSC odd frames skip the last pre-render tick while rendering.
        if pre_render && rendering_enabled && self.odd_frame && self.cycle == 339 {
            self.finish_frame();
            return;
        }

        self.cycle += 1;
        if self.cycle >= CYCLES_PER_SCANLINE {
            self.cycle = 0;
            self.scanline += 1;
            if self.scanline >= SCANLINES_PER_FRAME {
                self.finish_frame();
            }
        }
    }

    fn finish_frame(&mut self) {
        self.cycle = 0;
        self.scanline = 0;
        self.frame_buffer.swap();
        self.frame = self.frame.wrapping_add(1);
        self.odd_frame = !self.odd_frame;
    }

    fn rendering_enabled(&self) -> bool {
        (self.mask & (MASK_SHOW_BG | MASK_SHOW_SPRITES)) != 0
    }

    fn update_nmi_line(&mut self) {
        let line = (self.ctrl & CTRL_NMI_ENABLE) != 0 && (self.status & STATUS_VBLANK) != 0;
        if line && !self.nmi_line {
            self.nmi_delay = NMI_DELAY_TICKS;
            self.debug.nmi_edges = self.debug.nmi_edges.wrapping_add(1);
        } else if !line {
            self.nmi_delay = 0;
        }
        self.nmi_line = line;
    }

    fn fetch_background(&mut self, phase: u16) {
        match phase {
            1 => self.next_tile_id = self.ppu_read(0x2000 | (self.v & 0x0FFF)),
            3 => {
                let addr = 0x23C0
                    | (self.v & 0x0C00)
                    | ((self.v >> 4) & 0x0038)
                    | ((self.v >> 2) & 0x0007);
                let attr = self.ppu_read(addr);
                let shift = ((self.v >> 4) & 0x04) | (self.v & 0x02);
                self.next_tile_attr = (attr >> shift) & 0x03;
            }
            5 => self.next_tile_lsb = self.ppu_read(self.background_pattern_addr()),
            7 => self.next_tile_msb = self.ppu_read(self.background_pattern_addr() + 8),
            0 => {
                self.load_background_shifters();
                self.increment_coarse_x();
            }
            _ => {}
        }
    }

    fn background_pattern_addr(&self) -> u16 {
        let table = if (self.ctrl & CTRL_BG_TABLE) != 0 {
            0x1000
        } else {
            0x0000
        };
        let fine_y = (self.v >> 12) & 0x07;
        table + (self.next_tile_id as u16) * 16 + fine_y
    }

    fn render_pixel(&mut self, x: usize, y: usize) {
        let (bg_pixel, bg_palette) = self.background_sample(x);
        let sprite = self.sprite_sample(x);

        if bg_pixel != 0 && x != 255 && self.sprite_zero_opaque_at(x) {
            if (self.status & STATUS_SPRITE_ZERO_HIT) == 0 {
                self.debug.sprite0_hits = self.debug.sprite0_hits.wrapping_add(1);
            }
            self.status |= STATUS_SPRITE_ZERO_HIT;
        }

        let palette_index = match sprite {
            Some((pixel, palette, behind_bg)) if bg_pixel == 0 || !behind_bg => {
                0x10 | (palette << 2) | pixel
            }
            _ if bg_pixel != 0 => (bg_palette << 2) | bg_pixel,
            _ => 0,
        };

        let mut color = self.palette_ram[palette_ram_index(palette_index as u16)];
        if (self.mask & MASK_GRAYSCALE) != 0 {
            color &= 0x30;
        }
        self.frame_buffer.set_pixel(x, y, palette::rgb(color));
    }

    fn background_sample(&self, x: usize) -> (u8, u8) {
        if (self.mask & MASK_SHOW_BG) == 0 {
            return (0, 0);
        }
        if x < 8 && (self.mask & MASK_SHOW_BG_LEFT) == 0 {
            return (0, 0);
        }

        let bit = 0x8000u16 >> self.fine_x;
        let p0 = ((self.bg_shift_pattern_lo & bit) != 0) as u8;
        let p1 = ((self.bg_shift_pattern_hi & bit) != 0) as u8;
        let a0 = ((self.bg_shift_attr_lo & bit) != 0) as u8;
        let a1 = ((self.bg_shift_attr_hi & bit) != 0) as u8;
        ((p1 << 1) | p0, (a1 << 1) | a0)
    }

    fn sprites_visible_at(&self, x: usize) -> bool {
        (self.mask & MASK_SHOW_SPRITES) != 0 && (x >= 8 || (self.mask & MASK_SHOW_SPRITE_LEFT) != 0)
    }

    /// 2-bit pattern value of buffered sprite `slot` at screen column `x`.
    fn sprite_pixel(&self, slot: usize, x: usize) -> u8 {
        let offset = x as i16 - self.sprite_x[slot] as i16;
        if !(0..8).contains(&offset) {
            return 0;
        }
        let bit = 7 - offset as u8;
        let lo = (self.sprite_patterns_lo[slot] >> bit) & 0x01;
        let hi = (self.sprite_patterns_hi[slot] >> bit) & 0x01;
        (hi << 1) | lo
    }

    /// First opaque sprite pixel at `x` in OAM order: (pixel, palette, behind background).
    fn sprite_sample(&self, x: usize) -> Option<(u8, u8, bool)> {
        if !self.sprites_visible_at(x) {
            return None;
        }
        (0..self.sprite_count).find_map(|slot| {
            let pixel = self.sprite_pixel(slot, x);
            (pixel != 0).then(|| {
                let attributes = self.sprite_attributes[slot];
                (pixel, attributes & 0x03, (attributes & 0x20) != 0)
            })
        })
    }

    fn sprite_zero_opaque_at(&self, x: usize) -> bool {
        self.sprites_visible_at(x)
            && (0..self.sprite_count)
                .any(|slot| self.sprite_indices[slot] == 0 && self.sprite_pixel(slot, x) != 0)
    }

    fn shift_background_registers(&mut self) {
        self.bg_shift_pattern_lo <<= 1;
        self.bg_shift_pattern_hi <<= 1;
        self.bg_shift_attr_lo <<= 1;
        self.bg_shift_attr_hi <<= 1;
    }

    fn load_background_shifters(&mut self) {
        self.bg_shift_pattern_lo = (self.bg_shift_pattern_lo & 0xFF00) | self.next_tile_lsb as u16;
        self.bg_shift_pattern_hi = (self.bg_shift_pattern_hi & 0xFF00) | self.next_tile_msb as u16;

        let attr_lo = if (self.next_tile_attr & 0x01) != 0 { 0xFF } else { 0x00 };
        let attr_hi = if (self.next_tile_attr & 0x02) != 0 { 0xFF } else { 0x00 };
        self.bg_shift_attr_lo = (self.bg_shift_attr_lo & 0xFF00) | attr_lo;
        self.bg_shift_attr_hi = (self.bg_shift_attr_hi & 0xFF00) | attr_hi;
    }

    fn increment_coarse_x(&mut self) {
        if (self.v & 0x001F) == 31 {
            self.v &= !0x001F;
            self.v ^= 0x0400;
        } else {
            self.v = self.v.wrapping_add(1);
        }
    }

    fn increment_y(&mut self) {
        if (self.v & 0x7000) != 0x7000 {
            self.v = self.v.wrapping_add(0x1000);
            return;
        }

        self.v &= !0x7000;
        let mut y = (self.v & 0x03E0) >> 5;
        if y == 29 {
            y = 0;
            self.v ^= 0x0800;
        } else if y == 31 {
            y = 0;
        } else {
            y += 1;
        }
        self.v = (self.v & !0x03E0) | (y << 5);
    }

    fn copy_horizontal_bits(&mut self) {
        self.v = (self.v & !0x041F) | (self.t & 0x041F);
    }

    fn copy_vertical_bits(&mut self) {
        self.v = (self.v & !0x7BE0) | (self.t & 0x7BE0);
    }

    fn sprite_height(&self) -> i16 {
        if (self.ctrl & CTRL_SPRITE_SIZE_16) != 0 {
            16
        } else {
            8
        }
    }

    /// Fills the sprite buffers for the line after the current one. A
    /// sprite whose OAM Y is `y` is drawn from line `y + 1`, so the row for
    /// the next line is `scanline - y`.
    fn evaluate_sprites(&mut self) {
        let height = self.sprite_height();
        let scanline = self.scanline as i16;
        let in_range = |y: u8| (0..height).contains(&(scanline - y as i16));

        self.sprite_count = 0;
        let mut n = 0usize;
        while n < 64 && self.sprite_count < MAX_SPRITES_PER_LINE {
            let y = self.oam[n * 4];
            if in_range(y) {
                let row = (scanline - y as i16) as u16;
                self.load_sprite(n, row);
            }
            n += 1;
        }

        // With eight sprites found, the hardware keeps scanning but bumps
        // the byte offset along with the sprite index, so it compares tile,
        // attribute and X bytes against the line as if they were Y.
        let mut m = 0usize;
        while n < 64 {
            if in_range(self.oam[n * 4 + m]) {
                if (self.status & STATUS_SPRITE_OVERFLOW) == 0 {
                    self.debug.sprite_overflow_events =
                        self.debug.sprite_overflow_events.wrapping_add(1);
                }
                self.status |= STATUS_SPRITE_OVERFLOW;
                break;
            }
            n += 1;
            m = (m + 1) & 0x03;
        }
    }

    fn load_sprite(&mut self, index: usize, row: u16) {
        let base = index * 4;
        let tile_index = self.oam[base + 1];
        let attributes = self.oam[base + 2];
        let x = self.oam[base + 3];

        let height = self.sprite_height() as u16;
        let mut row = row;
        if (attributes & 0x80) != 0 {
            row = height - 1 - row;
        }

        let (table, tile) = if height == 16 {
            let table = ((tile_index & 0x01) as u16) * 0x1000;
            (table, ((tile_index & 0xFE) as u16) + row / 8)
        } else {
            let table = if (self.ctrl & CTRL_SPRITE_TABLE) != 0 {
                0x1000
            } else {
                0x0000
            };
            (table, tile_index as u16)
        };

        let addr = table + tile * 16 + (row & 0x07);
        let mut lo = self.ppu_read(addr);
        let mut hi = self.ppu_read(addr + 8);
        if (attributes & 0x40) != 0 {
            lo = lo.reverse_bits();
            hi = hi.reverse_bits();
        }

        let slot = self.sprite_count;
        self.sprite_patterns_lo[slot] = lo;
        self.sprite_patterns_hi[slot] = hi;
        self.sprite_x[slot] = x;
        self.sprite_attributes[slot] = attributes;
        self.sprite_indices[slot] = index as u8;
        self.sprite_count += 1;
    }

    fn increment_vram_addr_cpu_access(&mut self) {
        let render_line = self.scanline < 240 || self.scanline == PRE_RENDER_SCANLINE;
        if self.rendering_enabled() && render_line {
            // During rendering $2007 bumps the scroll counters instead.
            self.increment_coarse_x();
            self.increment_y();
        } else if (self.ctrl & CTRL_VRAM_INC_32) != 0 {
            self.v = self.v.wrapping_add(32);
        } else {
            self.v = self.v.wrapping_add(1);
        }
    }

    fn ppu_read(&self, addr: u16) -> u8 {
        let addr = addr & 0x3FFF;
        match addr {
            0x0000..=0x1FFF => self.chr[addr as usize],
            0x2000..=0x3EFF => self.nametables[self.nametable_index(addr)],
            _ => self.palette_ram[palette_ram_index(addr)],
        }
    }

    fn ppu_write(&mut self, addr: u16, value: u8) {
        let addr = addr & 0x3FFF;
        match addr {
            0x0000..=0x1FFF => {
                if self.chr_writable {
                    self.debug.pattern_writes = self.debug.pattern_writes.wrapping_add(1);
                    self.chr[addr as usize] = value;
                } else {
                    log::trace!("ignored CHR-ROM write ${addr:04X} <- ${value:02X}");
                }
            }
            0x2000..=0x3EFF => {
                self.debug.nametable_writes = self.debug.nametable_writes.wrapping_add(1);
                let index = self.nametable_index(addr);
                self.nametables[index] = value;
            }
            _ => {
                self.debug.palette_writes = self.debug.palette_writes.wrapping_add(1);
                self.palette_ram[palette_ram_index(addr)] = value;
            }
        }
    }

    fn nametable_index(&self, addr: u16) -> usize {
        let index = ((addr - 0x2000) % 0x1000) as usize;
        let table = index / 0x400;
        let offset = index % 0x400;
        let physical = match self.mirroring {
            Mirroring::Horizontal => table >> 1,
            Mirroring::Vertical => table & 0x01,
        };
        physical * 0x400 + offset
    }
}

/// Sprite backdrop entries $3F10/$14/$18/$1C alias $3F00/$04/$08/$0C.
fn palette_ram_index(addr: u16) -> usize {
    let index = (addr & 0x1F) as usize;
    if index >= 16 && (index & 0x03) == 0 {
        index - 16
    } else {
        index
    }
}
