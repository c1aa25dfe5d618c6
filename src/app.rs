use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use eframe::egui::{self, ColorImage, Key, TextureHandle, TextureOptions};

use crate::config::{KeyBindings, Settings};
use crate::nes::Console;
use crate::nes::frame::{FRAME_HEIGHT, FRAME_WIDTH};

const MAX_FRAMES_PER_UPDATE: u32 = 2;
const IDLE_REPAINT: Duration = Duration::from_millis(4);

pub struct FamicoreApp {
    console: Option<Console>,
    settings: Settings,
    config_path: PathBuf,
    frame_texture: Option<TextureHandle>,
    status_line: String,
    loaded_rom: Option<PathBuf>,
    frame_interval: Duration,
    next_frame_at: Option<Instant>,
    paused: bool,
}

impl FamicoreApp {
    pub fn new(
        cc: &eframe::CreationContext<'_>,
        settings: Settings,
        config_path: PathBuf,
        rom: Option<PathBuf>,
    ) -> Self {
        cc.egui_ctx.set_visuals(egui::Visuals::dark());

        let mut app = Self {
            console: None,
            frame_interval: Duration::from_secs_f64(1.0 / settings.frame_rate_hz),
            settings,
            config_path,
            frame_texture: None,
            status_line: "Drop a .nes file or click Open ROM".to_string(),
            loaded_rom: None,
            next_frame_at: None,
            paused: false,
        };
        if let Some(path) = rom {
            app.load_rom(&path);
        }
        app
    }

    fn load_rom(&mut self, path: &Path) {
        match Console::from_file(path) {
            Ok(console) => {
                self.status_line = format!(
                    "Loaded {} using {}{}",
                    path.file_name().and_then(|f| f.to_str()).unwrap_or("ROM"),
                    console.mapper_name(),
                    if console.has_battery() { ", battery RAM" } else { "" }
                );
                self.console = Some(console);
                self.loaded_rom = Some(path.to_path_buf());
                self.frame_texture = None;
                self.next_frame_at = None;
                self.paused = false;
                self.remember_rom_dir(path);
            }
            Err(err) => {
                log::warn!("failed to load {}: {err}", path.display());
                self.status_line = format!("Failed to load ROM: {err}");
            }
        }
    }

    fn remember_rom_dir(&mut self, path: &Path) {
        let Some(dir) = path.parent() else {
            return;
        };
        if self.settings.last_rom_dir.as_deref() == Some(dir) {
            return;
        }
        self.settings.last_rom_dir = Some(dir.to_path_buf());
        if let Err(err) = self.settings.save(&self.config_path) {
            log::warn!("{err:#}");
        }
    }

    fn open_rom_dialog(&mut self) {
        let mut dialog = rfd::FileDialog::new()
            .add_filter("NES ROM", &["nes"])
            .set_title("Open NES ROM");
        if let Some(dir) = &self.settings.last_rom_dir {
            dialog = dialog.set_directory(dir);
        }
        if let Some(path) = dialog.pick_file() {
            self.load_rom(&path);
        }
    }

    fn handle_dropped_files(&mut self, ctx: &egui::Context) {
        let dropped = ctx.input(|input| input.raw.dropped_files.clone());
        for file in dropped {
            if let Some(path) = file.path {
                let is_nes = path
                    .extension()
                    .and_then(|ext| ext.to_str())
                    .map(|ext| ext.eq_ignore_ascii_case("nes"))
                    .unwrap_or(false);

                if is_nes {
                    self.load_rom(&path);
                } else {
                    self.status_line = format!("Unsupported file: {}", path.display());
                }
            }
        }
    }

    fn reset(&mut self) {
        if let Some(console) = self.console.as_mut() {
            console.reset();
            self.next_frame_at = None;
            self.paused = false;
            self.status_line = "Reset complete".to_string();
        }
    }

    fn handle_shortcuts(&mut self, ctx: &egui::Context) {
        let open_shortcut = ctx.input(|i| i.modifiers.command && i.key_pressed(Key::O));
        if open_shortcut {
            self.open_rom_dialog();
        }

        if ctx.input(|i| i.key_pressed(Key::R)) {
            self.reset();
        }

        if ctx.input(|i| i.key_pressed(Key::P)) && self.console.is_some() {
            self.paused = !self.paused;
            self.next_frame_at = None;
        }
    }

    fn controller_state(ctx: &egui::Context, bindings: &KeyBindings) -> u8 {
        ctx.input(|input| {
            bindings.buttons(|name| {
                if name == "Shift" {
                    input.modifiers.shift
                } else {
                    Key::from_name(name).is_some_and(|key| input.key_down(key))
                }
            })
        })
    }

    fn update_texture(&mut self, ctx: &egui::Context) {
        let Some(console) = self.console.as_ref() else {
            return;
        };
        let frame = console.frame();
        let image = ColorImage::from_rgb([FRAME_WIDTH, FRAME_HEIGHT], &frame);

        if let Some(texture) = self.frame_texture.as_mut() {
            texture.set(image, TextureOptions::NEAREST);
        } else {
            self.frame_texture =
                Some(ctx.load_texture("nes-frame", image, TextureOptions::NEAREST));
        }
    }

    fn run_due_frames(&mut self, ctx: &egui::Context) {
        let pad1 = Self::controller_state(ctx, &self.settings.player_one);
        let pad2 = Self::controller_state(ctx, &self.settings.player_two);
        let Some(console) = self.console.as_mut() else {
            return;
        };

        let now = Instant::now();
        let mut next = self.next_frame_at.unwrap_or(now);
        let mut ran_frames = 0u32;

        while Instant::now() >= next && ran_frames < MAX_FRAMES_PER_UPDATE {
            console.set_buttons(0, pad1);
            console.set_buttons(1, pad2);
            if let Err(err) = console.step_frame() {
                log::warn!("emulation stopped: {err}");
                self.status_line = format!("Emulation stopped: {err}");
                self.paused = true;
                break;
            }
            ran_frames += 1;
            next += self.frame_interval;
        }

        // Fell more than a frame behind (window dragged, debugger): drop the backlog.
        if ran_frames == 0 && now > next + self.frame_interval {
            next = now;
        }
        self.next_frame_at = Some(next);
    }

    fn debug_panel(&self, ui: &mut egui::Ui) {
        let Some(console) = self.console.as_ref() else {
            return;
        };
        let regs = console.cpu().regs;
        let debug = console.debug_counters();
        let bus = console.bus().counters();
        let ppu = console.ppu();
        let ppu_debug = console.debug_ppu_counters();

        ui.collapsing("Debug", |ui| {
            ui.monospace(format!(
                "CPU A={:02X} X={:02X} Y={:02X} P={} SP={:02X} PC={:04X} cycles={} | next: {}",
                regs.a,
                regs.x,
                regs.y,
                regs.p,
                regs.sp,
                regs.pc,
                console.cpu().cycles,
                console.disassemble(regs.pc).0
            ));
            ui.monospace(format!(
                "Core frames={} cpu_steps={} ppu_ticks={} nmi raised/serviced={}/{} dma={} stall={}",
                debug.frames,
                debug.cpu_steps,
                debug.ppu_ticks,
                debug.nmis_raised,
                debug.nmis_serviced,
                debug.dma_transfers,
                debug.dma_stall_cycles
            ));
            ui.monospace(format!(
                "Bus reads ram={} ppu={} io={} cart={} | writes ram={} ppu={} io={} cart={} | last read=${:04X} last write=${:04X}:${:02X}",
                bus.reads_ram,
                bus.reads_ppu_regs,
                bus.reads_io,
                bus.reads_cart,
                bus.writes_ram,
                bus.writes_ppu_regs,
                bus.writes_io,
                bus.writes_cart,
                bus.last_read_addr,
                bus.last_write_addr,
                bus.last_write_value
            ));
            ui.monospace(format!(
                "PPU sl={} cy={} ctrl={:02X} mask={:02X} status={:02X} v={:04X} t={:04X} | vblank={} suppressed={} nmi edges/fired/cancelled={}/{}/{} sprite0={} overflow={}",
                ppu.scanline(),
                ppu.cycle(),
                ppu.ctrl(),
                ppu.mask(),
                ppu.status(),
                ppu.vram_addr(),
                ppu.temp_addr(),
                ppu_debug.vblank_entries,
                ppu_debug.vblank_suppressed,
                ppu_debug.nmi_edges,
                ppu_debug.nmi_fired,
                ppu_debug.nmi_cancelled,
                ppu_debug.sprite0_hits,
                ppu_debug.sprite_overflow_events
            ));

            let events = console.recent_events(8);
            if !events.is_empty() {
                ui.separator();
                ui.label("Recent events:");
                for event in events {
                    ui.monospace(event);
                }
            }
        });
    }
}

impl eframe::App for FamicoreApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.handle_dropped_files(ctx);
        self.handle_shortcuts(ctx);

        if !self.paused {
            self.run_due_frames(ctx);
        }
        self.update_texture(ctx);

        egui::TopBottomPanel::top("toolbar").show(ctx, |ui| {
            ui.horizontal(|ui| {
                if ui.button("Open ROM").clicked() {
                    self.open_rom_dialog();
                }

                let has_rom = self.console.is_some();
                if ui
                    .add_enabled(has_rom, egui::Button::new("Reset (R)"))
                    .clicked()
                {
                    self.reset();
                }

                let pause_label = if self.paused {
                    "Resume (P)"
                } else {
                    "Pause (P)"
                };
                if ui
                    .add_enabled(has_rom, egui::Button::new(pause_label))
                    .clicked()
                {
                    self.paused = !self.paused;
                    self.next_frame_at = None;
                }

                if let Some(path) = &self.loaded_rom {
                    ui.separator();
                    ui.label(path.display().to_string());
                }
            });
        });

        egui::TopBottomPanel::bottom("status").show(ctx, |ui| {
            ui.horizontal_wrapped(|ui| {
                ui.label(&self.status_line);
                if let Some(console) = &self.console {
                    ui.separator();
                    ui.label(format!("Mapper: {}", console.mapper_name()));
                }
                ui.separator();
                ui.label("Controls: WASD/arrows move, Space/Z=A, X=B, Enter=Start, Shift=Select, P=Pause, R=Reset");
            });

            ui.separator();
            self.debug_panel(ui);
        });

        egui::CentralPanel::default().show(ctx, |ui| {
            ui.vertical_centered(|ui| {
                let available = ui.available_size();
                let scale_x = (available.x / FRAME_WIDTH as f32).max(1.0);
                let scale_y = (available.y / FRAME_HEIGHT as f32).max(1.0);
                let scale = scale_x.min(scale_y).floor().max(1.0);
                let target = egui::vec2(FRAME_WIDTH as f32 * scale, FRAME_HEIGHT as f32 * scale);

                if let Some(texture) = &self.frame_texture {
                    ui.add(egui::Image::new(texture).fit_to_exact_size(target));
                } else {
                    ui.add_space(8.0);
                    ui.label("No ROM loaded. Drag and drop a .nes file.");
                }
            });
        });

        match self.next_frame_at {
            Some(next) if !self.paused => {
                let wait = next.saturating_duration_since(Instant::now());
                ctx.request_repaint_after(wait.min(IDLE_REPAINT));
            }
            _ => ctx.request_repaint_after(Duration::from_millis(50)),
        }
    }
}
