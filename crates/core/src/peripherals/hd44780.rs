//! HD44780 character LCD controller model.
//!
//! The controller samples RS and the data pins on the falling edge of EN.
//! It powers up with an 8-bit interface; when only D4..D7 are wired the
//! low nibble reads as zero until a function set with DL=0 switches it to
//! 4-bit transfers (high nibble first).

use serde::{Deserialize, Serialize};

use crate::sfr::Port;

pub const LCD_ROWS: usize = 4;
pub const LCD_COLUMNS: usize = 20;

const DDRAM_SIZE: usize = 128;
const CGRAM_SIZE: usize = 64;
const ROW_BASE: [u8; LCD_ROWS] = [0x00, 0x40, 0x14, 0x54];

/// Pins the LCD is wired to. `data` holds D0..D7 for an 8-bit bus or
/// D4..D7 for a 4-bit bus.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LcdWiring {
    pub rs: (Port, u8),
    pub en: (Port, u8),
    pub data: Vec<(Port, u8)>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Hd44780 {
    wiring: LcdWiring,
    ddram: Vec<u8>,
    cgram: Vec<u8>,
    addr: u8,
    cgram_select: bool,
    eight_bit: bool,
    pending: Option<u8>,
    prev_en: bool,
    pub two_line: bool,
    pub display_on: bool,
    pub cursor_on: bool,
    pub blink_on: bool,
    increment: bool,
    shift_on_write: bool,
    scroll: i16,
    /// Bytes latched since power-up.
    pub writes: u64,
}

impl Hd44780 {
    pub fn new(wiring: LcdWiring) -> Self {
        Hd44780 {
            wiring,
            ddram: vec![b' '; DDRAM_SIZE],
            cgram: vec![0; CGRAM_SIZE],
            addr: 0,
            cgram_select: false,
            eight_bit: true,
            pending: None,
            prev_en: false,
            two_line: false,
            display_on: false,
            cursor_on: false,
            blink_on: false,
            increment: true,
            shift_on_write: false,
            scroll: 0,
            writes: 0,
        }
    }

    pub fn wiring(&self) -> &LcdWiring {
        &self.wiring
    }

    /// Sample the pins; `levels` holds the current level of every port.
    pub fn sample(&mut self, levels: &[u8; 5]) {
        let level = |(p, b): (Port, u8)| levels[p.index()] & (1 << b) != 0;
        let en = level(self.wiring.en);
        if self.prev_en && !en {
            let rs = level(self.wiring.rs);
            let mut bus = 0u8;
            for (i, &pin) in self.wiring.data.iter().enumerate() {
                if level(pin) {
                    bus |= 1 << i;
                }
            }
            self.latch(rs, bus);
        }
        self.prev_en = en;
    }

    fn latch(&mut self, rs: bool, bus: u8) {
        if self.wiring.data.len() >= 8 {
            self.execute(rs, bus);
        } else if self.eight_bit {
            self.execute(rs, bus << 4);
        } else if let Some(high) = self.pending.take() {
            self.execute(rs, (high << 4) | (bus & 0x0F));
        } else {
            self.pending = Some(bus & 0x0F);
        }
    }

    fn execute(&mut self, rs: bool, byte: u8) {
        self.writes += 1;
        if rs {
            self.write_data(byte);
        } else {
            self.command(byte);
        }
    }

    fn command(&mut self, cmd: u8) {
        log::trace!("lcd: command {:02X}", cmd);
        if cmd & 0x80 != 0 {
            self.addr = cmd & 0x7F;
            self.cgram_select = false;
        } else if cmd & 0x40 != 0 {
            self.addr = cmd & 0x3F;
            self.cgram_select = true;
        } else if cmd & 0x20 != 0 {
            self.eight_bit = cmd & 0x10 != 0;
            self.two_line = cmd & 0x08 != 0;
            self.pending = None;
        } else if cmd & 0x10 != 0 {
            let right = cmd & 0x04 != 0;
            if cmd & 0x08 != 0 {
                self.scroll += if right { -1 } else { 1 };
            } else {
                self.move_cursor(right);
            }
        } else if cmd & 0x08 != 0 {
            self.display_on = cmd & 0x04 != 0;
            self.cursor_on = cmd & 0x02 != 0;
            self.blink_on = cmd & 0x01 != 0;
        } else if cmd & 0x04 != 0 {
            self.increment = cmd & 0x02 != 0;
            self.shift_on_write = cmd & 0x01 != 0;
        } else if cmd & 0x02 != 0 {
            self.addr = 0;
            self.scroll = 0;
            self.cgram_select = false;
        } else if cmd & 0x01 != 0 {
            self.ddram.fill(b' ');
            self.addr = 0;
            self.scroll = 0;
            self.increment = true;
            self.cgram_select = false;
        }
    }

    fn write_data(&mut self, byte: u8) {
        if self.cgram_select {
            self.cgram[(self.addr & 0x3F) as usize] = byte;
            self.addr = (self.addr + 1) & 0x3F;
            return;
        }
        self.ddram[(self.addr & 0x7F) as usize] = byte;
        self.move_cursor(self.increment);
        if self.shift_on_write {
            self.scroll += if self.increment { 1 } else { -1 };
        }
    }

    fn move_cursor(&mut self, forward: bool) {
        self.addr = if forward {
            self.addr.wrapping_add(1) & 0x7F
        } else {
            self.addr.wrapping_sub(1) & 0x7F
        };
    }

    /// Cursor position in DDRAM.
    pub fn address(&self) -> u8 {
        self.addr
    }

    /// Character codes visible on `row` (0-based).
    pub fn row_bytes(&self, row: usize) -> [u8; LCD_COLUMNS] {
        let mut out = [b' '; LCD_COLUMNS];
        if row >= LCD_ROWS {
            return out;
        }
        for (col, slot) in out.iter_mut().enumerate() {
            let a = (ROW_BASE[row] as i16 + col as i16 + self.scroll).rem_euclid(DDRAM_SIZE as i16);
            *slot = self.ddram[a as usize];
        }
        out
    }

    /// Visible text of `row`; custom glyphs (codes 0..=7) and other
    /// non-ASCII codes render as `?`.
    pub fn row_text(&self, row: usize) -> String {
        self.row_bytes(row)
            .iter()
            .map(|&b| if (0x20..0x7F).contains(&b) { b as char } else { '?' })
            .collect()
    }

    /// Eight-row bitmap of custom glyph `code` (0..=7).
    pub fn glyph(&self, code: u8) -> [u8; 8] {
        let mut g = [0u8; 8];
        let base = ((code & 0x07) as usize) * 8;
        g.copy_from_slice(&self.cgram[base..base + 8]);
        g
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn four_bit() -> Hd44780 {
        Hd44780::new(LcdWiring {
            rs: (Port::D, 0),
            en: (Port::D, 1),
            data: vec![(Port::D, 4), (Port::D, 5), (Port::D, 6), (Port::D, 7)],
        })
    }

    /// Clock one transfer on PORTD with the given RS and D4..D7 nibble.
    fn clock(lcd: &mut Hd44780, rs: bool, nibble: u8) {
        let base = (nibble << 4) | rs as u8;
        let mut levels = [0u8; 5];
        levels[Port::D.index()] = base | 0x02;
        lcd.sample(&levels);
        levels[Port::D.index()] = base;
        lcd.sample(&levels);
    }

    fn send(lcd: &mut Hd44780, rs: bool, byte: u8) {
        clock(lcd, rs, byte >> 4);
        clock(lcd, rs, byte & 0x0F);
    }

    #[test]
    fn test_four_bit_init_and_text() {
        let mut lcd = four_bit();
        clock(&mut lcd, false, 0x3);
        clock(&mut lcd, false, 0x3);
        clock(&mut lcd, false, 0x3);
        clock(&mut lcd, false, 0x2);
        send(&mut lcd, false, 0x28);
        send(&mut lcd, false, 0x0C);
        send(&mut lcd, false, 0x01);
        assert!(lcd.two_line);
        assert!(lcd.display_on);
        send(&mut lcd, true, b'H');
        send(&mut lcd, true, b'i');
        send(&mut lcd, false, 0xC0 + 3);
        send(&mut lcd, true, b'!');
        assert!(lcd.row_text(0).starts_with("Hi "));
        assert_eq!(&lcd.row_text(1)[..4], "   !");
    }

    #[test]
    fn test_row_bases() {
        let mut lcd = four_bit();
        clock(&mut lcd, false, 0x2);
        send(&mut lcd, false, 0x94);
        send(&mut lcd, true, b'x');
        send(&mut lcd, false, 0xD4 + 19);
        send(&mut lcd, true, b'y');
        assert_eq!(lcd.row_bytes(2)[0], b'x');
        assert_eq!(lcd.row_bytes(3)[19], b'y');
    }

    #[test]
    fn test_cgram_and_shift() {
        let mut lcd = four_bit();
        clock(&mut lcd, false, 0x2);
        send(&mut lcd, false, 0x40 + 8);
        for row in 0..8u8 {
            send(&mut lcd, true, row);
        }
        assert_eq!(lcd.glyph(1), [0, 1, 2, 3, 4, 5, 6, 7]);
        send(&mut lcd, false, 0x80);
        send(&mut lcd, true, b'A');
        send(&mut lcd, false, 0x1C); // shift display right
        assert_eq!(lcd.row_bytes(0)[1], b'A');
        send(&mut lcd, false, 0x02);
        assert_eq!(lcd.row_bytes(0)[0], b'A');
    }
}
