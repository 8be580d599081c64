//! Capture/Compare/PWM module model.
//!
//! Compare: after each increment of the selected time base the 16-bit timer
//! is checked against CCPRxH:CCPRxL; a match raises CCPxIF and runs the mode's
//! pin action. Writing CCPxCON with mode 1000 forces the pin low (driven high
//! on match), mode 1001 forces it high (driven low on match).
//!
//! Capture: edges on the CCP pin latch the time base into CCPRx after 1, 4 or
//! 16 qualifying edges.
//!
//! PWM: CCPRxL:DCxB is latched into the duty register at every Timer2 period
//! boundary; the pin is high while `TMR2 << 2` is below the 10-bit duty.

use crate::sfr::{CCPCON_DCB, CCPCON_MODE, TMR2};

#[derive(Debug, Clone)]
pub struct CcpAddrs {
    pub con: u16,
    pub rl: u16,
    pub rh: u16,
    /// Interrupt flag register and bit
    pub pir: u16,
    pub flag: u8,
}

/// Result of a compare check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CcpEvent {
    None,
    Match,
    /// Mode 1011: the time base must be reset (CCP2 also starts the ADC).
    SpecialEvent,
}

pub struct Ccp {
    addrs: CcpAddrs,
    /// Level the module drives on its pin.
    pub output: bool,
    edges: u8,
    prev_input: bool,
    duty_lsb: u8,
}

impl Ccp {
    pub fn new(addrs: CcpAddrs) -> Self {
        Ccp { addrs, output: false, edges: 0, prev_input: false, duty_lsb: 0 }
    }

    pub fn reset(&mut self) {
        self.output = false;
        self.edges = 0;
        self.prev_input = false;
        self.duty_lsb = 0;
    }

    pub fn mode(&self, data: &[u8]) -> u8 {
        CCPCON_MODE.get(data[self.addrs.con as usize])
    }

    /// True if the module owns the pin (compare with pin action, or PWM).
    pub fn drives_pin(&self, data: &[u8]) -> bool {
        matches!(self.mode(data), 0x2 | 0x8 | 0x9 | 0xC..=0xF)
    }

    pub fn register(&self, data: &[u8]) -> u16 {
        ((data[self.addrs.rh as usize] as u16) << 8) | data[self.addrs.rl as usize] as u16
    }

    /// Returns true if addr was handled
    pub fn write(&mut self, addr: u16, value: u8, data: &mut [u8]) -> bool {
        if addr != self.addrs.con {
            return false;
        }
        let old = self.mode(data);
        data[addr as usize] = value;
        let mode = CCPCON_MODE.get(value);
        match mode {
            0x8 => self.output = false,
            0x9 => self.output = true,
            0x0 => self.output = false,
            _ => {}
        }
        if mode != old {
            self.edges = 0;
        }
        true
    }

    /// Called after the selected time base incremented to `timer`.
    pub fn compare(&mut self, data: &mut [u8], timer: u16) -> CcpEvent {
        let mode = self.mode(data);
        if !matches!(mode, 0x2 | 0x8..=0xB) || timer != self.register(data) {
            return CcpEvent::None;
        }
        data[self.addrs.pir as usize] |= self.addrs.flag;
        match mode {
            0x2 => self.output = !self.output,
            0x8 => self.output = true,
            0x9 => self.output = false,
            0xB => return CcpEvent::SpecialEvent,
            _ => {}
        }
        CcpEvent::Match
    }

    /// Sample the CCP pin for capture mode.
    pub fn capture(&mut self, data: &mut [u8], level: bool, timer: u16) {
        let rising = level && !self.prev_input;
        let falling = !level && self.prev_input;
        self.prev_input = level;
        let needed = match self.mode(data) {
            0x4 if falling => 1,
            0x5 if rising => 1,
            0x6 if rising => 4,
            0x7 if rising => 16,
            _ => return,
        };
        self.edges += 1;
        if self.edges < needed {
            return;
        }
        self.edges = 0;
        data[self.addrs.rh as usize] = (timer >> 8) as u8;
        data[self.addrs.rl as usize] = timer as u8;
        data[self.addrs.pir as usize] |= self.addrs.flag;
    }

    /// PWM output for this cycle.
    pub fn pwm(&mut self, data: &mut [u8], period_start: bool) {
        if self.mode(data) & 0xC != 0xC {
            return;
        }
        if period_start {
            data[self.addrs.rh as usize] = data[self.addrs.rl as usize];
            self.duty_lsb = CCPCON_DCB.get(data[self.addrs.con as usize]);
        }
        let duty = ((data[self.addrs.rh as usize] as u16) << 2) | self.duty_lsb as u16;
        self.output = ((data[TMR2 as usize] as u16) << 2) < duty;
    }

    pub fn save_state(&self) -> crate::savestate::CcpState {
        crate::savestate::CcpState {
            output: self.output,
            edges: self.edges,
            prev_input: self.prev_input,
            duty_lsb: self.duty_lsb,
        }
    }

    pub fn load_state(&mut self, s: &crate::savestate::CcpState) {
        self.output = s.output;
        self.edges = s.edges;
        self.prev_input = s.prev_input;
        self.duty_lsb = s.duty_lsb;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sfr::{Pir1, CCP1CON, CCPR1H, CCPR1L, PIR1};

    fn ccp1() -> Ccp {
        Ccp::new(CcpAddrs {
            con: CCP1CON, rl: CCPR1L, rh: CCPR1H, pir: PIR1, flag: Pir1::CCP1IF.bits(),
        })
    }

    #[test]
    fn test_compare_drive_high_on_match() {
        let mut d = vec![0u8; 0x1000];
        let mut c = ccp1();
        d[CCPR1H as usize] = 0x01;
        d[CCPR1L as usize] = 0x00;
        c.write(CCP1CON, 0x08, &mut d);
        assert!(!c.output);
        assert_eq!(c.compare(&mut d, 0x00FF), CcpEvent::None);
        assert_eq!(c.compare(&mut d, 0x0100), CcpEvent::Match);
        assert!(c.output);
        assert_ne!(d[PIR1 as usize] & Pir1::CCP1IF.bits(), 0);
    }

    #[test]
    fn test_compare_mode_write_initialises_pin() {
        let mut d = vec![0u8; 0x1000];
        let mut c = ccp1();
        c.write(CCP1CON, 0x09, &mut d);
        assert!(c.output);
        assert_eq!(c.compare(&mut d, 0), CcpEvent::Match);
        assert!(!c.output);
    }

    #[test]
    fn test_special_event() {
        let mut d = vec![0u8; 0x1000];
        let mut c = ccp1();
        d[CCPR1L as usize] = 10;
        c.write(CCP1CON, 0x0B, &mut d);
        assert_eq!(c.compare(&mut d, 10), CcpEvent::SpecialEvent);
        assert!(!c.drives_pin(&d));
    }

    #[test]
    fn test_capture_every_4th_rising() {
        let mut d = vec![0u8; 0x1000];
        let mut c = ccp1();
        c.write(CCP1CON, 0x06, &mut d);
        for i in 0..4u16 {
            c.capture(&mut d, true, 100 + i);
            c.capture(&mut d, false, 200 + i);
            if i < 3 {
                assert_eq!(d[PIR1 as usize], 0);
            }
        }
        assert_ne!(d[PIR1 as usize] & Pir1::CCP1IF.bits(), 0);
        assert_eq!(c.register(&d), 103);
    }

    #[test]
    fn test_pwm_duty_latched_at_period() {
        let mut d = vec![0u8; 0x1000];
        let mut c = ccp1();
        d[CCPR1L as usize] = 2; // duty 10 bits = 2 << 2 | 0b01 = 9
        c.write(CCP1CON, 0x1C, &mut d);
        d[TMR2 as usize] = 0;
        c.pwm(&mut d, false);
        assert!(!c.output); // not latched yet
        c.pwm(&mut d, true);
        assert!(c.output);
        d[TMR2 as usize] = 2; // 8 < 9
        c.pwm(&mut d, false);
        assert!(c.output);
        d[TMR2 as usize] = 3; // 12 >= 9
        c.pwm(&mut d, false);
        assert!(!c.output);
    }
}
