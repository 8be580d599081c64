//! # pic18-mcal
//!
//! Peripheral drivers for the PIC18F4620 and a host-side simulation of the
//! chip they drive.
//!
//! Drivers configure the memory-mapped control registers for one peripheral
//! mode and expose blocking or interrupt-driven primitives on top of them.
//! They are written against the [`Registers`] trait, so the same code runs
//! on a volatile [`regs::Mmio`] window or on the simulated [`Pic18`].
//!
//! ## Architecture
//!
//! - [`Pic18`]: Simulated chip: SFR file, EEPROM and peripheral models
//! - [`Mcu`]: Register backend plus interrupt handlers
//! - [`sfr`]: PIC18F4620 register map
//! - [`hal`]: On-chip peripheral drivers: GPIO, ADC, SPI, I2C, CCP, timers,
//!   EEPROM, interrupts
//! - [`devices`]: Board devices on top of the drivers: keypad, character
//!   LCD, relay, servo
//! - [`peripherals`]: Peripheral models used by [`Pic18`]
//! - [`debugger`]: SFR viewer and watchpoints
//! - [`savestate`]: Snapshots of the simulated chip
//!
//! ## Example
//!
//! ```
//! use pic18_mcal::hal::adc::{self, AdcConfig, Channel};
//! use pic18_mcal::Pic18;
//!
//! let mut pic = Pic18::new();
//! pic.set_analog_input(0, 612);
//! let config = AdcConfig::default();
//! adc::init(&mut pic, &config).unwrap();
//! assert_eq!(adc::read_blocking(&mut pic, Channel::An0).unwrap(), 612);
//! ```

pub mod error;
pub mod regs;
pub mod sfr;
pub mod memory;
pub mod mcu;
pub mod peripherals;
pub mod hal;
pub mod devices;
pub mod debugger;
pub mod savestate;

pub use error::{Error, Result, SnapshotError};
pub use mcu::Mcu;
pub use memory::Memory;
pub use regs::Registers;
pub use sfr::Port;

use peripherals::{
    Adc, BusEvent, Ccp, CcpAddrs, CcpEvent, EepromCtrl, Hd44780, KeyMatrix, LcdWiring, Mssp,
    Ports, Timer16, Timer16Addrs, Timer2,
};
use sfr::*;

/// Crystal frequency: 8 MHz
pub const XTAL_FREQ: u32 = 8_000_000;
/// Instruction cycle rate (Fosc/4)
pub const INSTRUCTION_HZ: u32 = XTAL_FREQ / 4;
/// Data space size: 3968 bytes GPR + 128 SFR
pub const DATA_SIZE: usize = 4096;
/// EEPROM size: 1 KB
pub const EEPROM_SIZE: usize = 1024;

/// Simulated PIC18F4620.
///
/// Firmware-visible state is the data space in [`Memory`]; the peripheral
/// models intercept the SFRs they own. One [`Pic18::step`] is one
/// instruction cycle. External stimuli (input pins, analog levels, SPI and
/// I2C peers, keypad, LCD) are attached through the methods below.
pub struct Pic18 {
    pub mem: Memory,
    /// Instruction cycles since reset
    pub cycles: u64,
    pub ports: Ports,
    pub adc: Adc,
    pub mssp: Mssp,
    pub eectl: EepromCtrl,
    pub timer1: Timer16,
    pub timer3: Timer16,
    pub timer2: Timer2,
    pub ccp1: Ccp,
    pub ccp2: Ccp,
    pub keypad: Option<KeyMatrix>,
    pub lcd: Option<Hd44780>,
    /// EEPROM dirty flag (true if modified since last save)
    pub eeprom_dirty: bool,
    /// Watchpoints and SFR viewer
    pub debugger: debugger::Debugger,
}

impl Pic18 {
    pub fn new() -> Self {
        Pic18 {
            mem: Memory::new(),
            cycles: 0,
            ports: Ports::new(),
            adc: Adc::new(),
            mssp: Mssp::new(),
            eectl: EepromCtrl::new(),
            timer1: Timer16::new(Timer16Addrs {
                con: T1CON, tmrl: TMR1L, tmrh: TMR1H, pir: PIR1, flag: Pir1::TMR1IF.bits(),
            }),
            timer3: Timer16::new(Timer16Addrs {
                con: T3CON, tmrl: TMR3L, tmrh: TMR3H, pir: PIR2, flag: Pir2::TMR3IF.bits(),
            }),
            timer2: Timer2::new(),
            ccp1: Ccp::new(CcpAddrs {
                con: CCP1CON, rl: CCPR1L, rh: CCPR1H, pir: PIR1, flag: Pir1::CCP1IF.bits(),
            }),
            ccp2: Ccp::new(CcpAddrs {
                con: CCP2CON, rl: CCPR2L, rh: CCPR2H, pir: PIR2, flag: Pir2::CCP2IF.bits(),
            }),
            keypad: None,
            lcd: None,
            eeprom_dirty: false,
            debugger: debugger::Debugger::new(),
        }
    }

    /// Power-on reset of the SFRs and peripheral models. EEPROM contents,
    /// external inputs and attached devices are kept.
    pub fn reset(&mut self) {
        self.mem.reset_sfrs();
        self.cycles = 0;
        self.adc.reset();
        self.mssp.reset();
        self.eectl.reset();
        self.timer1.reset();
        self.timer3.reset();
        self.timer2.reset();
        self.ccp1.reset();
        self.ccp2.reset();
        if let Some(lcd) = &mut self.lcd {
            *lcd = Hd44780::new(lcd.wiring().clone());
        }
    }

    // --- Data space ---

    /// Read from data space with peripheral hooks
    pub fn read_data(&mut self, addr: u16) -> u8 {
        let a = addr as usize;
        let v = if let PORTA..=PORTE = addr {
            self.port_levels(Port::ALL[(addr - PORTA) as usize])
        } else if let Some(v) = self.mssp.read(addr, &mut self.mem.data) {
            v
        } else if let Some(v) = self.eectl.read(addr) {
            v
        } else if a < self.mem.data.len() {
            self.mem.data[a]
        } else {
            0
        };
        if !self.debugger.watchpoints.is_empty() {
            self.debugger.check_read(addr, v);
        }
        v
    }

    /// Write to data space with peripheral hooks
    pub fn write_data(&mut self, addr: u16, value: u8) {
        let a = addr as usize;
        if a >= self.mem.data.len() {
            return;
        }
        if !self.debugger.watchpoints.is_empty() {
            let old = self.mem.data[a];
            self.debugger.check_write(addr, old, value);
        }
        let data = &mut self.mem.data;
        let handled = self.ports.write(addr, value, data)
            || self.adc.write(addr, value, data)
            || self.mssp.write(addr, value, data)
            || self.eectl.write(addr, value, data, &mut self.mem.eeprom)
            || self.ccp1.write(addr, value, data)
            || self.ccp2.write(addr, value, data);
        if !handled {
            data[a] = value;
        }
        if self.eectl.take_dirty() {
            self.eeprom_dirty = true;
        }
        if Port::from_addr(addr).is_some() || addr == CCP1CON || addr == CCP2CON {
            self.sync_pins();
        }
    }

    /// Advance one instruction cycle: timers, CCP compare and PWM.
    pub fn step(&mut self) {
        self.cycles += 1;
        let data = &mut self.mem.data;
        let t1 = self.timer1.step(data);
        let t3 = self.timer3.step(data);
        let period = self.timer2.step(data);

        let t3con = TxCon::from_bits_retain(data[T3CON as usize]);
        // T3CCP2:T3CCP1 = 1x: both on Timer3, 01: CCP1 on Timer1, 00: both on Timer1
        let ccp1_t3 = t3con.contains(TxCon::T3CCP2);
        let ccp2_t3 = t3con.intersects(TxCon::T3CCP2 | TxCon::T3CCP1);

        let before = (self.ccp1.output, self.ccp2.output);
        for (ccp, on_t3, is_ccp2) in [(&mut self.ccp1, ccp1_t3, false), (&mut self.ccp2, ccp2_t3, true)] {
            let (timer, ticked) = if on_t3 { (&self.timer3, t3) } else { (&self.timer1, t1) };
            let count = timer.value(data);
            if ticked && ccp.compare(data, count) == CcpEvent::SpecialEvent {
                timer.set_value(data, 0);
                if is_ccp2 {
                    self.adc.trigger(data);
                }
            }
            ccp.pwm(data, period);
        }
        if before != (self.ccp1.output, self.ccp2.output) {
            self.sync_pins();
        }
    }

    // --- Pins ---

    /// Levels the chip drives on `port`: the latch, with CCP-owned pins
    /// (RC2 for CCP1, RC1 for CCP2) replaced by the module output.
    pub fn driven_levels(&self, port: Port) -> u8 {
        let data = &self.mem.data;
        let mut v = data[port.lat() as usize];
        if port == Port::C {
            for (ccp, bit) in [(&self.ccp1, 2), (&self.ccp2, 1)] {
                if ccp.drives_pin(data) {
                    v = (v & !(1 << bit)) | ((ccp.output as u8) << bit);
                }
            }
        }
        v
    }

    /// Pin levels of `port` as a PORTx read returns them.
    pub fn port_levels(&self, port: Port) -> u8 {
        let driven = Port::ALL.map(|p| self.driven_levels(p));
        let mut input = self.ports.input[port.index()];
        if let Some(km) = &self.keypad {
            input = km.apply(port, input, &driven);
        }
        let tris = self.mem.data[port.tris() as usize];
        Ports::merge(driven[port.index()], input, tris)
    }

    /// Level of a single pin.
    pub fn pin_level(&self, port: Port, pin: u8) -> bool {
        self.port_levels(port) & (1 << pin) != 0
    }

    /// Drive an external level onto a pin (seen when the pin is an input).
    /// Edges on RC2/RC1 feed CCP1/CCP2 capture.
    pub fn set_pin_input(&mut self, port: Port, pin: u8, level: bool) {
        self.ports.set_input(port, pin, level);
        if port == Port::C {
            let t3con = TxCon::from_bits_retain(self.mem.data[T3CON as usize]);
            let data = &mut self.mem.data;
            if pin == 2 {
                let t = if t3con.contains(TxCon::T3CCP2) { &self.timer3 } else { &self.timer1 };
                let count = t.value(data);
                self.ccp1.capture(data, level, count);
            } else if pin == 1 {
                let t = if t3con.intersects(TxCon::T3CCP2 | TxCon::T3CCP1) { &self.timer3 } else { &self.timer1 };
                let count = t.value(data);
                self.ccp2.capture(data, level, count);
            }
        }
    }

    fn sync_pins(&mut self) {
        if self.lcd.is_none() {
            return;
        }
        let levels = Port::ALL.map(|p| self.port_levels(p));
        if let Some(lcd) = &mut self.lcd {
            lcd.sample(&levels);
        }
    }

    // --- External devices ---

    /// Set the level (0..=1023) on analog channel ANn.
    pub fn set_analog_input(&mut self, channel: usize, value: u16) {
        if let Some(slot) = self.adc.inputs.get_mut(channel) {
            *slot = value.min(0x3FF);
        }
    }

    pub fn attach_lcd(&mut self, wiring: LcdWiring) {
        self.lcd = Some(Hd44780::new(wiring));
    }

    pub fn attach_keypad(&mut self, rows: &[(Port, u8)], cols: &[(Port, u8)]) {
        self.keypad = Some(KeyMatrix::new(rows, cols));
    }

    /// Hold down the key at (row, column); `None` releases all keys.
    pub fn press_key(&mut self, key: Option<(usize, usize)>) {
        if let Some(km) = &mut self.keypad {
            km.pressed = key;
        }
    }

    /// Bytes the SPI peer shifts back, one per transfer.
    pub fn queue_spi_rx(&mut self, bytes: &[u8]) {
        self.mssp.spi_rx.extend(bytes.iter().copied());
    }

    pub fn take_spi_tx(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.mssp.spi_tx)
    }

    /// A byte clocked in from an external master (SPI slave mode) or
    /// addressed to us (I2C slave mode).
    pub fn mssp_slave_receive(&mut self, byte: u8, is_address: bool) {
        self.mssp.slave_receive(byte, is_address, &mut self.mem.data);
    }

    /// Make the 7-bit I2C address `addr` acknowledge.
    pub fn attach_i2c_target(&mut self, addr: u8) {
        if !self.mssp.i2c_targets.contains(&addr) {
            self.mssp.i2c_targets.push(addr);
        }
    }

    pub fn queue_i2c_rx(&mut self, bytes: &[u8]) {
        self.mssp.i2c_rx.extend(bytes.iter().copied());
    }

    pub fn i2c_events(&self) -> &[BusEvent] {
        &self.mssp.events
    }

    pub fn take_i2c_events(&mut self) -> Vec<BusEvent> {
        std::mem::take(&mut self.mssp.events)
    }

    // --- EEPROM ---

    pub fn save_eeprom(&self) -> Vec<u8> {
        self.mem.eeprom.clone()
    }

    pub fn load_eeprom(&mut self, image: &[u8]) {
        self.mem.load_eeprom(image);
        self.eeprom_dirty = false;
    }

    // --- Snapshots ---

    /// Capture the chip state. Attached devices and watchpoints are not part
    /// of it; the pressed key is.
    pub fn save_state(&self) -> savestate::SaveState {
        savestate::SaveState {
            cycles: self.cycles,
            data: self.mem.data.clone(),
            eeprom: self.mem.eeprom.clone(),
            inputs: self.ports.input,
            adc: self.adc.save_state(),
            mssp: self.mssp.save_state(),
            timer1: self.timer1.save_state(),
            timer3: self.timer3.save_state(),
            timer2: self.timer2.save_state(),
            ccp1: self.ccp1.save_state(),
            ccp2: self.ccp2.save_state(),
            pressed_key: self.keypad.as_ref().and_then(|k| k.pressed),
        }
    }

    pub fn load_state(&mut self, s: &savestate::SaveState) {
        self.cycles = s.cycles;
        let len = s.data.len().min(self.mem.data.len());
        self.mem.data[..len].copy_from_slice(&s.data[..len]);
        self.mem.load_eeprom(&s.eeprom);
        self.ports.input = s.inputs;
        self.adc.load_state(&s.adc);
        self.mssp.load_state(&s.mssp);
        self.timer1.load_state(&s.timer1);
        self.timer3.load_state(&s.timer3);
        self.timer2.load_state(&s.timer2);
        self.ccp1.load_state(&s.ccp1);
        self.ccp2.load_state(&s.ccp2);
        self.press_key(s.pressed_key);
        self.eeprom_dirty = false;
    }

    // --- Debug views ---

    /// Format a hex dump of data space.
    pub fn dump_ram(&self, start: u16, length: u16) -> String {
        debugger::dump_ram(&self.mem.data, start, length)
    }

    /// Named SFRs with non-zero values.
    pub fn dump_sfr(&self) -> String {
        debugger::dump_sfr(&self.mem.data)
    }

    pub fn dump_sfr_all(&self) -> String {
        debugger::dump_sfr_all(&self.mem.data)
    }
}

impl Default for Pic18 {
    fn default() -> Self {
        Self::new()
    }
}

impl Registers for Pic18 {
    #[inline]
    fn read(&mut self, addr: u16) -> u8 {
        self.read_data(addr)
    }

    #[inline]
    fn write(&mut self, addr: u16, value: u8) {
        self.write_data(addr, value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pic18_creation() {
        let mut pic = Pic18::new();
        assert_eq!(pic.cycles, 0);
        assert_eq!(pic.read_data(TRISB), 0xFF);
        assert_eq!(pic.mem.eeprom.len(), EEPROM_SIZE);
    }

    #[test]
    fn test_port_read_merges_latch_and_input() {
        let mut pic = Pic18::new();
        pic.write_data(TRISB, 0xF0);
        pic.write_data(PORTB, 0xFF); // lands in LATB
        assert_eq!(pic.read_data(LATB), 0xFF);
        pic.set_pin_input(Port::B, 7, true);
        pic.set_pin_input(Port::B, 0, false);
        assert_eq!(pic.read_data(PORTB), 0x8F);
        assert!(pic.pin_level(Port::B, 3));
    }

    #[test]
    fn test_ccp_compare_drives_rc2() {
        let mut pic = Pic18::new();
        pic.write_data(TRISC, 0x00);
        pic.write_data(CCPR1H, 0);
        pic.write_data(CCPR1L, 5);
        pic.write_data(T3CON, TxCon::T3CCP2.bits() | TxCon::TMRON.bits());
        pic.write_data(CCP1CON, 0x08);
        assert!(!pic.pin_level(Port::C, 2));
        for _ in 0..5 {
            pic.step();
        }
        assert!(pic.pin_level(Port::C, 2));
        assert_ne!(pic.read_data(PIR1) & Pir1::CCP1IF.bits(), 0);
    }

    #[test]
    fn test_special_event_resets_timer_and_starts_adc() {
        let mut pic = Pic18::new();
        pic.set_analog_input(0, 100);
        pic.write_data(ADCON1, 0x0E);
        pic.write_data(ADCON2, 0x80);
        pic.write_data(ADCON0, 0x01);
        pic.write_data(CCPR2L, 3);
        pic.write_data(T1CON, 0x01);
        pic.write_data(CCP2CON, 0x0B);
        for _ in 0..3 {
            pic.step();
        }
        assert_eq!(pic.read_data(TMR1L), 0);
        assert_eq!(pic.read_data(ADRESL), 100);
        assert_ne!(pic.read_data(PIR2) & Pir2::CCP2IF.bits(), 0);
    }

    #[test]
    fn test_capture_on_rc2() {
        let mut pic = Pic18::new();
        pic.write_data(T1CON, 0x01);
        pic.write_data(CCP1CON, 0x05);
        for _ in 0..40 {
            pic.step();
        }
        pic.set_pin_input(Port::C, 2, true);
        assert_ne!(pic.read_data(PIR1) & Pir1::CCP1IF.bits(), 0);
        assert_eq!(pic.read_data(CCPR1L), 40);
    }

    #[test]
    fn test_eeprom_dirty_after_write() {
        let mut pic = Pic18::new();
        pic.write_data(EEDATA, 0x12);
        pic.write_data(EECON1, Eecon1::WREN.bits());
        pic.write_data(EECON2, 0x55);
        pic.write_data(EECON2, 0xAA);
        pic.write_data(EECON1, (Eecon1::WREN | Eecon1::WR).bits());
        assert!(pic.eeprom_dirty);
        assert_eq!(pic.save_eeprom()[0], 0x12);
    }

    #[test]
    fn test_reset_keeps_eeprom() {
        let mut pic = Pic18::new();
        pic.load_eeprom(&[0xAB]);
        pic.write_data(TRISD, 0);
        pic.reset();
        assert_eq!(pic.read_data(TRISD), 0xFF);
        assert_eq!(pic.mem.eeprom[0], 0xAB);
    }
}
