//! Desktop bench for pic18-mcal.
//!
//! Runs the bench firmware (see [`bench`]) against the simulated PIC18F4620
//! and shows the 20x4 character LCD.
//!
//! - **GUI mode** (default): scaled window, keyboard drives the 4x3 keypad
//!   and the potentiometer, SFR dump and screenshot keys.
//! - **Headless mode** (`--headless`): scripted key presses, prints the LCD
//!   and device state when done.

mod bench;
mod font;

use bench::{Bench, LOOP_CYCLES};
use minifb::{Key, Scale, ScaleMode, Window, WindowOptions};
use pic18_mcal::debugger::WatchKind;
use pic18_mcal::savestate::{self, CHIP_PIC18F4620};
use pic18_mcal::{Pic18, INSTRUCTION_HZ};
use std::env;
use std::fs;
use std::path::Path;
use std::time::{Duration, Instant};

const CELL_W: usize = 6;
const CELL_H: usize = 9;
const BORDER: usize = 4;
const STATUS_H: usize = 10;
const SCREEN_WIDTH: usize = 20 * CELL_W - 1 + 2 * BORDER;
const SCREEN_HEIGHT: usize = 4 * CELL_H - 1 + 2 * BORDER + STATUS_H;

const COLOR_BG: u32 = 0x2F4F0F;
const COLOR_OFF: u32 = 0x8FB02F;
const COLOR_ON: u32 = 0x1A2608;
const COLOR_LAMP: u32 = 0xE03020;
const COLOR_BAR: u32 = 0xC8C8C8;

/// Potentiometer step per frame while Up/Down is held.
const POT_STEP: u16 = 8;
/// Main-loop passes a scripted key stays down (and then up).
const KEY_HOLD_TICKS: usize = 2;

// ─── Logging ────────────────────────────────────────────────────────────────

/// Level from `--log`, if given and valid.
fn log_level(args: &[String]) -> Option<log::LevelFilter> {
    arg_value(args, "--log").and_then(|s| s.parse().ok())
}

/// `RUST_LOG` sets per-module filters (default `warn`); `--log` overrides
/// the global level.
fn init_logger(level: Option<log::LevelFilter>) {
    let mut builder = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"));
    if let Some(level) = level {
        builder.filter_level(level);
    }
    builder.format_timestamp(None).init();
}

// ─── Main ───────────────────────────────────────────────────────────────────

fn usage(prog: &str) -> ! {
    eprintln!("PIC18F4620 servo bench");
    eprintln!("Usage: {} [options]", prog);
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --headless           Run without GUI");
    eprintln!("  --cycles N           Instruction cycles to run (headless, default 200000)");
    eprintln!("  --keys STR           Keys to press in order, e.g. \"4*#\" (headless)");
    eprintln!("  --pot N              Potentiometer level 0-1023 (default 512)");
    eprintln!("  --eeprom FILE        EEPROM image, loaded at start and saved on exit");
    eprintln!("  --state FILE         Write a snapshot of the chip on exit");
    eprintln!("  --watch SFR          Log writes to a named SFR (repeatable)");
    eprintln!("  --log LEVEL          error|warn|info|debug|trace (default warn, or RUST_LOG)");
    eprintln!("  --scale N            Initial scale 1-8 (default 6)");
    eprintln!();
    eprintln!("GUI keys: 0-9=Keypad digits R=* Enter=# Up/Down=Pot");
    eprintln!("          F2=SFR dump S=Screenshot Esc=Quit");
    std::process::exit(1);
}

fn arg_value<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.iter().position(|a| a == flag).and_then(|i| args.get(i + 1)).map(String::as_str)
}

fn main() {
    let args: Vec<String> = env::args().collect();
    if args.iter().any(|a| a == "-h" || a == "--help") {
        usage(&args[0]);
    }

    init_logger(log_level(&args));

    let headless = args.iter().any(|a| a == "--headless");
    let initial_scale: usize = arg_value(&args, "--scale")
        .and_then(|s| s.parse().ok())
        .unwrap_or(6)
        .clamp(1, 8);
    let pot: u16 = arg_value(&args, "--pot").and_then(|s| s.parse().ok()).unwrap_or(512);
    let eeprom_path = arg_value(&args, "--eeprom").map(Path::new);
    let state_path = arg_value(&args, "--state").map(Path::new);

    let mut pic = Pic18::new();
    pic.set_analog_input(0, pot);
    if let Some(path) = eeprom_path.filter(|p| p.exists()) {
        match savestate::load_eeprom_image(path) {
            Ok(image) => pic.load_eeprom(&image),
            Err(e) => eprintln!("Warning: EEPROM {}: {}", path.display(), e),
        }
    }

    // Watchpoints
    {
        let mut i = 0;
        while i < args.len() {
            if args[i] == "--watch" {
                if let Some(name) = args.get(i + 1) {
                    if pic.debugger.watch_sfr(name, WatchKind::Write).is_none() {
                        eprintln!("Warning: unknown SFR {}", name);
                    }
                }
                i += 2;
            } else {
                i += 1;
            }
        }
    }

    let mut bench = match Bench::new(pic) {
        Ok(b) => b,
        Err(e) => {
            eprintln!("Firmware setup failed: {}", e);
            std::process::exit(1);
        }
    };

    if headless {
        run_headless(&args, &mut bench);
    } else {
        run_gui(&mut bench, initial_scale);
    }

    if let Some(path) = eeprom_path {
        if bench.mcu.regs.eeprom_dirty {
            match savestate::save_eeprom_image(path, &bench.mcu.regs.save_eeprom()) {
                Ok(()) => log::info!("EEPROM saved to {}", path.display()),
                Err(e) => eprintln!("Warning: EEPROM {}: {}", path.display(), e),
            }
        }
    }
    if let Some(path) = state_path {
        if let Err(e) = savestate::save_to_file(&bench.mcu.regs.save_state(), CHIP_PIC18F4620, path) {
            eprintln!("Warning: snapshot {}: {}", path.display(), e);
        }
    }
}

/// Report and clear a watchpoint hit.
fn report_watch(bench: &mut Bench) {
    if let Some(hit) = bench.mcu.regs.debugger.take_hit() {
        eprintln!(
            "*** Watchpoint [{}] 0x{:03X}: {:02X} -> {:02X} at cycle {} ***",
            hit.index, hit.addr, hit.old_val, hit.new_val, bench.mcu.regs.cycles
        );
    }
}

// ─── Rendering ──────────────────────────────────────────────────────────────

/// Five-by-eight pixel rows of a character cell, bits 4..0 left to right.
fn cell_rows(lcd: &pic18_mcal::peripherals::Hd44780, code: u8) -> [u8; 8] {
    if code < 0x10 {
        return lcd.glyph(code);
    }
    let cols = font::glyph(code);
    let mut rows = [0u8; 8];
    for (y, row) in rows.iter_mut().enumerate() {
        for (x, col) in cols.iter().enumerate() {
            if col & (1 << y) != 0 {
                *row |= 0x10 >> x;
            }
        }
    }
    rows
}

fn fill_rect(fb: &mut [u32], x: usize, y: usize, w: usize, h: usize, color: u32) {
    for py in y..(y + h).min(SCREEN_HEIGHT) {
        for px in x..(x + w).min(SCREEN_WIDTH) {
            fb[py * SCREEN_WIDTH + px] = color;
        }
    }
}

fn render(bench: &Bench, fb: &mut [u32]) {
    fb.fill(COLOR_BG);
    let lcd_h = SCREEN_HEIGHT - STATUS_H;
    fill_rect(fb, BORDER / 2, BORDER / 2, SCREEN_WIDTH - BORDER, lcd_h - BORDER, COLOR_OFF);

    if let Some(lcd) = bench.mcu.regs.lcd.as_ref().filter(|l| l.display_on) {
        for row in 0..4 {
            for (col, &code) in lcd.row_bytes(row).iter().enumerate() {
                let rows = cell_rows(lcd, code);
                let (x0, y0) = (BORDER + col * CELL_W, BORDER + row * CELL_H);
                for (y, bits) in rows.iter().enumerate() {
                    for x in 0..5 {
                        if bits & (0x10 >> x) != 0 {
                            fb[(y0 + y) * SCREEN_WIDTH + x0 + x] = COLOR_ON;
                        }
                    }
                }
            }
        }
    }

    // Status strip: relay lamp, then the servo pulse width as a bar.
    let y = lcd_h + 2;
    if bench.relay_pin() {
        fill_rect(fb, BORDER, y, 8, STATUS_H - 4, COLOR_LAMP);
    }
    let cfg = bench.servo.config();
    let span = (cfg.max_duty - cfg.min_duty).max(1) as usize;
    let bar_w = SCREEN_WIDTH - 2 * BORDER - 12;
    let fill = (bench.servo.duty().saturating_sub(cfg.min_duty) as usize * bar_w) / span;
    fill_rect(fb, BORDER + 12, y + 2, fill.max(1), STATUS_H - 8, COLOR_BAR);
}

// ─── Screenshot (BMP) ───────────────────────────────────────────────────────

fn save_screenshot(pixels: &[u32], path: &str) -> Result<(), String> {
    let w = SCREEN_WIDTH as u32;
    let h = SCREEN_HEIGHT as u32;
    let row_size = (w * 3 + 3) & !3;
    let pixel_data_size = row_size * h;
    let file_size = 54 + pixel_data_size;
    let mut data = Vec::with_capacity(file_size as usize);
    // BMP header
    data.extend_from_slice(b"BM");
    data.extend_from_slice(&file_size.to_le_bytes());
    data.extend_from_slice(&0u32.to_le_bytes());
    data.extend_from_slice(&54u32.to_le_bytes());
    // DIB header
    data.extend_from_slice(&40u32.to_le_bytes());
    data.extend_from_slice(&w.to_le_bytes());
    data.extend_from_slice(&h.to_le_bytes());
    data.extend_from_slice(&1u16.to_le_bytes());
    data.extend_from_slice(&24u16.to_le_bytes());
    data.extend_from_slice(&[0u8; 24]);
    // Pixel data (bottom-up BGR)
    for y in (0..SCREEN_HEIGHT).rev() {
        for &px in &pixels[y * SCREEN_WIDTH..(y + 1) * SCREEN_WIDTH] {
            data.extend_from_slice(&[px as u8, (px >> 8) as u8, (px >> 16) as u8]);
        }
        data.resize(data.len() + (row_size - w * 3) as usize, 0);
    }
    fs::write(path, &data).map_err(|e| format!("{}: {}", path, e))
}

// ─── GUI Mode ───────────────────────────────────────────────────────────────

const DIGIT_KEYS: [(Key, char); 10] = [
    (Key::Key0, '0'), (Key::Key1, '1'), (Key::Key2, '2'), (Key::Key3, '3'), (Key::Key4, '4'),
    (Key::Key5, '5'), (Key::Key6, '6'), (Key::Key7, '7'), (Key::Key8, '8'), (Key::Key9, '9'),
];

fn held_key(window: &Window) -> Option<char> {
    DIGIT_KEYS
        .iter()
        .find(|(k, _)| window.is_key_down(*k))
        .map(|&(_, c)| c)
        .or_else(|| window.is_key_down(Key::R).then_some('*'))
        .or_else(|| window.is_key_down(Key::Enter).then_some('#'))
}

fn run_gui(bench: &mut Bench, scale: usize) {
    let scaled_w = SCREEN_WIDTH * scale;
    let scaled_h = SCREEN_HEIGHT * scale;

    let mut window = match Window::new(
        "PIC18 servo bench",
        scaled_w,
        scaled_h,
        WindowOptions {
            scale: Scale::X1,
            scale_mode: ScaleMode::AspectRatioStretch,
            resize: true,
            ..Default::default()
        },
    ) {
        Ok(w) => w,
        Err(e) => {
            eprintln!("Failed to create window: {}", e);
            return;
        }
    };
    window.set_target_fps(60);

    let mut fb = vec![0u32; SCREEN_WIDTH * SCREEN_HEIGHT];
    let mut scaled_buf = vec![0u32; scaled_w * scaled_h];
    let mut pot = bench.mcu.regs.adc.inputs[0];
    let mut last_title = Instant::now();
    let mut last_cycles = bench.mcu.regs.cycles;
    let mut prev_f2 = false;
    let mut prev_s = false;
    let mut screenshot_n = 0u32;

    while window.is_open() && !window.is_key_down(Key::Escape) {
        bench.press(held_key(&window));

        if window.is_key_down(Key::Up) {
            pot = (pot + POT_STEP).min(0x3FF);
        }
        if window.is_key_down(Key::Down) {
            pot = pot.saturating_sub(POT_STEP);
        }
        bench.mcu.regs.set_analog_input(0, pot);

        // SFR dump (F2)
        let f2 = window.is_key_down(Key::F2);
        if f2 && !prev_f2 {
            eprintln!("--- SFRs (cycle {}) ---\n{}---", bench.mcu.regs.cycles, bench.mcu.regs.dump_sfr());
        }
        prev_f2 = f2;

        if let Err(e) = bench.tick() {
            log::error!("firmware: {}", e);
            break;
        }
        report_watch(bench);

        render(bench, &mut fb);

        // Screenshot (S)
        let s = window.is_key_down(Key::S);
        if s && !prev_s {
            let f = format!("screenshot_{:04}.bmp", screenshot_n);
            match save_screenshot(&fb, &f) {
                Ok(()) => {
                    eprintln!("Screenshot: {}", f);
                    screenshot_n += 1;
                }
                Err(e) => eprintln!("Screenshot error: {}", e),
            }
        }
        prev_s = s;

        for y in 0..scaled_h {
            let src = &fb[(y / scale) * SCREEN_WIDTH..];
            for (x, px) in scaled_buf[y * scaled_w..(y + 1) * scaled_w].iter_mut().enumerate() {
                *px = src[x / scale];
            }
        }
        if let Err(e) = window.update_with_buffer(&scaled_buf, scaled_w, scaled_h) {
            eprintln!("Window update failed: {}", e);
            break;
        }

        if last_title.elapsed() >= Duration::from_secs(1) {
            let cycles = bench.mcu.regs.cycles;
            let speed = (cycles - last_cycles) as f64 / last_title.elapsed().as_secs_f64() / INSTRUCTION_HZ as f64;
            window.set_title(&format!(
                "PIC18 servo bench - {:3} deg, duty {} - {:.0}% speed",
                bench.angle,
                bench.servo.duty(),
                speed * 100.0
            ));
            last_cycles = cycles;
            last_title = Instant::now();
        }
    }
}

// ─── Headless Mode ──────────────────────────────────────────────────────────

fn run_headless(args: &[String], bench: &mut Bench) {
    let cycles: u64 = arg_value(args, "--cycles").and_then(|s| s.parse().ok()).unwrap_or(200_000);
    let keys: Vec<char> = arg_value(args, "--keys").unwrap_or("").chars().collect();
    for &k in &keys {
        if bench::key_position(k).is_none() {
            eprintln!("Warning: no key '{}' on the keypad", k);
        }
    }

    let script_ticks = keys.len() * 2 * KEY_HOLD_TICKS;
    let ticks = ((cycles / LOOP_CYCLES) as usize).max(script_ticks + 1);
    for tick in 0..ticks {
        let step = tick / KEY_HOLD_TICKS;
        let key = if step % 2 == 0 { keys.get(step / 2).copied() } else { None };
        bench.press(key);
        if let Err(e) = bench.tick() {
            eprintln!("Firmware error at cycle {}: {}", bench.mcu.regs.cycles, e);
            break;
        }
        report_watch(bench);
    }

    println!("  +--------------------+");
    for line in bench.lcd_lines() {
        println!("  |{}|", line);
    }
    println!("  +--------------------+");
    println!(
        "  angle={} duty={} pot={} relay={} cycles={}",
        bench.angle,
        bench.servo.duty(),
        bench.pot,
        if bench.relay_pin() { "on" } else { "off" },
        bench.mcu.regs.cycles
    );
}
