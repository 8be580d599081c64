//! Demo firmware for the bench board.
//!
//! Wiring: 20x4 LCD on PORTD in 4-bit mode (RS=RD0, EN=RD1, D4..D7=RD4..RD7),
//! 4x3 keypad with rows on RB0..RB3 and columns on RB4..RB6, relay on RC0,
//! servo on RC2 (CCP1), potentiometer on AN0. The last stored angle lives at
//! EEPROM address 0.
//!
//! Keys: a digit moves the servo to `digit * 20` degrees, `*` toggles the
//! relay, `#` stores the angle.

use pic18_mcal::devices::keypad::{Keypad, KEYS_4X3};
use pic18_mcal::devices::lcd::{DataBus, Lcd, NoDelay};
use pic18_mcal::devices::{Relay, Servo, ServoConfig};
use pic18_mcal::hal::adc::{self, AdcConfig, Channel};
use pic18_mcal::hal::eeprom;
use pic18_mcal::hal::gpio::{Logic, PinConfig};
use pic18_mcal::peripherals::LcdWiring;
use pic18_mcal::{Mcu, Pic18, Port, Result};

pub const ANGLE_ADDR: u16 = 0;
/// Instruction cycles per main-loop pass (5 ms at 2 MIPS).
pub const LOOP_CYCLES: u64 = 10_000;
const DEFAULT_ANGLE: u8 = 90;

const DEGREE: [u8; 8] = [0x0C, 0x12, 0x12, 0x0C, 0x00, 0x00, 0x00, 0x00];

const KEYPAD_ROWS: [(Port, u8); 4] = [(Port::B, 0), (Port::B, 1), (Port::B, 2), (Port::B, 3)];
const KEYPAD_COLS: [(Port, u8); 3] = [(Port::B, 4), (Port::B, 5), (Port::B, 6)];

pub struct Bench {
    pub mcu: Mcu<Pic18>,
    lcd: Lcd<NoDelay>,
    keypad: Keypad<3>,
    relay: Relay,
    pub servo: Servo,
    pub angle: u8,
    pub relay_on: bool,
    pub pot: u16,
    saved: bool,
    last_key: Option<char>,
}

/// Matrix position of a key on the 4x3 pad.
pub fn key_position(key: char) -> Option<(usize, usize)> {
    KEYS_4X3.iter().enumerate().find_map(|(r, row)| row.iter().position(|&k| k == key).map(|c| (r, c)))
}

impl Bench {
    /// Wire the board devices to `pic` and run the firmware's setup.
    pub fn new(mut pic: Pic18) -> Result<Bench> {
        pic.attach_lcd(LcdWiring {
            rs: (Port::D, 0),
            en: (Port::D, 1),
            data: (4..8).map(|b| (Port::D, b)).collect(),
        });
        pic.attach_keypad(&KEYPAD_ROWS, &KEYPAD_COLS);
        let mut mcu = Mcu::new(pic);

        let mut lcd = Lcd::new(
            PinConfig::output(Port::D, 0, Logic::Low),
            PinConfig::output(Port::D, 1, Logic::Low),
            DataBus::FourBit(core::array::from_fn(|i| PinConfig::output(Port::D, 4 + i as u8, Logic::Low))),
            NoDelay,
        );
        lcd.init(&mut mcu)?;

        let keypad = Keypad::four_by_three(
            KEYPAD_ROWS.map(|(p, b)| PinConfig::output(p, b, Logic::Low)),
            KEYPAD_COLS.map(|(p, b)| PinConfig::input(p, b)),
        );
        keypad.init(&mut mcu)?;

        let relay = Relay::new(Port::C, 0, Logic::Low);
        relay.init(&mut mcu)?;

        adc::init(&mut mcu, &AdcConfig::default())?;

        let stored = eeprom::read_byte(&mut mcu, ANGLE_ADDR)?;
        let angle = if stored <= 180 { stored } else { DEFAULT_ANGLE };
        let servo = Servo::init(&mut mcu, ServoConfig::default())?;
        servo.set_angle(angle as f32)?;
        log::info!("bench: start at {} degrees (eeprom 0x{:02X})", angle, stored);

        let mut bench = Bench {
            mcu,
            lcd,
            keypad,
            relay,
            servo,
            angle,
            relay_on: false,
            pot: 0,
            saved: stored == angle,
            last_key: None,
        };
        bench.draw_labels()?;
        bench.refresh()?;
        Ok(bench)
    }

    fn draw_labels(&mut self) -> Result<()> {
        let (mcu, lcd) = (&mut self.mcu, &mut self.lcd);
        lcd.send_str_at(mcu, 1, 1, "PIC18 servo bench")?;
        lcd.send_str_at(mcu, 2, 1, "Angle:")?;
        lcd.send_custom_char(mcu, 2, 11, &DEGREE, 0)?;
        lcd.send_str_at(mcu, 3, 1, "Pot:")?;
        lcd.send_str_at(mcu, 4, 1, "Relay:")
    }

    fn refresh(&mut self) -> Result<()> {
        let (mcu, lcd) = (&mut self.mcu, &mut self.lcd);
        lcd.send_u8_at(mcu, 2, 8, self.angle)?;
        lcd.send_u16_at(mcu, 3, 8, self.pot)?;
        lcd.send_str_at(mcu, 4, 8, if self.relay_on { "ON " } else { "OFF" })?;
        lcd.send_str_at(mcu, 4, 16, if self.saved { "saved" } else { "     " })
    }

    /// One main-loop pass: let the chip run, then scan the keypad, sample
    /// the potentiometer and redraw.
    pub fn tick(&mut self) -> Result<()> {
        self.mcu.run(LOOP_CYCLES);
        let key = self.keypad.scan(&mut self.mcu)?;
        if key != self.last_key {
            if let Some(k) = key {
                self.on_key(k)?;
            }
            self.last_key = key;
        }
        self.pot = adc::read_blocking(&mut self.mcu, Channel::An0)?;
        self.refresh()
    }

    fn on_key(&mut self, key: char) -> Result<()> {
        log::debug!("bench: key {}", key);
        match key {
            '0'..='9' => {
                self.angle = (key as u8 - b'0') * 20;
                self.servo.set_angle(self.angle as f32)?;
                self.saved = false;
            }
            '*' => {
                self.relay_on = !self.relay_on;
                if self.relay_on {
                    self.relay.turn_on(&mut self.mcu)?;
                } else {
                    self.relay.turn_off(&mut self.mcu)?;
                }
            }
            '#' => {
                eeprom::write_byte(&mut self.mcu, ANGLE_ADDR, self.angle)?;
                self.saved = true;
            }
            _ => {}
        }
        Ok(())
    }

    pub fn press(&mut self, key: Option<char>) {
        self.mcu.regs.press_key(key.and_then(key_position));
    }

    pub fn lcd_lines(&self) -> Vec<String> {
        match &self.mcu.regs.lcd {
            Some(lcd) => (0..4).map(|r| lcd.row_text(r)).collect(),
            None => Vec::new(),
        }
    }

    pub fn relay_pin(&self) -> bool {
        self.mcu.regs.pin_level(Port::C, 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tap(bench: &mut Bench, key: char) {
        bench.press(Some(key));
        bench.tick().unwrap();
        bench.press(None);
        bench.tick().unwrap();
    }

    #[test]
    fn test_key_positions() {
        assert_eq!(key_position('1'), Some((0, 0)));
        assert_eq!(key_position('#'), Some((3, 2)));
        assert_eq!(key_position('x'), None);
    }

    #[test]
    fn test_startup_screen() {
        let mut pic = Pic18::new();
        pic.set_analog_input(0, 300);
        let mut bench = Bench::new(pic).unwrap();
        bench.tick().unwrap();
        let lines = bench.lcd_lines();
        assert_eq!(lines[0].trim_end(), "PIC18 servo bench");
        assert!(lines[1].starts_with("Angle: 90 "));
        assert!(lines[2].starts_with("Pot:   300"));
        assert!(lines[3].starts_with("Relay: OFF"));
        assert_eq!(bench.angle, DEFAULT_ANGLE);
    }

    #[test]
    fn test_keys_drive_devices() {
        let mut bench = Bench::new(Pic18::new()).unwrap();
        tap(&mut bench, '4');
        assert_eq!(bench.angle, 80);
        assert_eq!(bench.servo.duty(), ServoConfig::default().duty_for(80.0));
        tap(&mut bench, '*');
        assert!(bench.relay_on);
        assert!(bench.relay_pin());
        tap(&mut bench, '#');
        assert_eq!(bench.mcu.regs.mem.eeprom[ANGLE_ADDR as usize], 80);
        assert!(bench.lcd_lines()[3].contains("ON"));
        assert!(bench.lcd_lines()[3].ends_with("saved"));
    }

    #[test]
    fn test_angle_restored_from_eeprom() {
        let mut pic = Pic18::new();
        pic.load_eeprom(&[140]);
        let bench = Bench::new(pic).unwrap();
        assert_eq!(bench.angle, 140);
    }
}
