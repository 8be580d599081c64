//! Timer1, Timer2 and Timer3 models.
//!
//! [`Timer16`] covers Timer1 and Timer3: internal clock (Fosc/4) through a
//! 1/2/4/8 prescaler, overflow sets TMRxIF. The count lives in the TMRxH:TMRxL
//! bytes of the data array so firmware reads and writes it directly.
//!
//! [`Timer2`] counts up to PR2, resets on the following increment and raises
//! PIR1.TMR2IF once every `TOUTPS + 1` periods. Its period boundary is the
//! PWM time base.

use crate::sfr::{
    Pir1, TxCon, PIR1, PR2, T2CON, T2CON_CKPS, T2CON_TMR2ON, T2CON_TOUTPS, TMR2, TXCON_CKPS,
};

/// Memory-mapped register addresses for a 16-bit timer instance.
#[derive(Debug, Clone)]
pub struct Timer16Addrs {
    pub con: u16,
    pub tmrl: u16,
    pub tmrh: u16,
    /// Interrupt flag register and bit
    pub pir: u16,
    pub flag: u8,
}

pub struct Timer16 {
    addrs: Timer16Addrs,
    prescale_count: u8,
    /// Overflows since reset.
    pub overflows: u64,
}

impl Timer16 {
    pub fn new(addrs: Timer16Addrs) -> Self {
        Timer16 { addrs, prescale_count: 0, overflows: 0 }
    }

    pub fn reset(&mut self) {
        self.prescale_count = 0;
        self.overflows = 0;
    }

    pub fn value(&self, data: &[u8]) -> u16 {
        ((data[self.addrs.tmrh as usize] as u16) << 8) | data[self.addrs.tmrl as usize] as u16
    }

    pub fn set_value(&self, data: &mut [u8], value: u16) {
        data[self.addrs.tmrh as usize] = (value >> 8) as u8;
        data[self.addrs.tmrl as usize] = value as u8;
    }

    /// Advance one instruction cycle. Returns true if the count changed.
    pub fn step(&mut self, data: &mut [u8]) -> bool {
        let con = TxCon::from_bits_retain(data[self.addrs.con as usize]);
        if !con.contains(TxCon::TMRON) || con.contains(TxCon::TMRCS) {
            return false;
        }
        let prescale = 1u8 << TXCON_CKPS.get(con.bits());
        self.prescale_count += 1;
        if self.prescale_count < prescale {
            return false;
        }
        self.prescale_count = 0;
        let next = self.value(data).wrapping_add(1);
        self.set_value(data, next);
        if next == 0 {
            data[self.addrs.pir as usize] |= self.addrs.flag;
            self.overflows += 1;
        }
        true
    }

    pub fn save_state(&self) -> crate::savestate::TimerState {
        crate::savestate::TimerState { prescale_count: self.prescale_count, postscale_count: 0 }
    }

    pub fn load_state(&mut self, s: &crate::savestate::TimerState) {
        self.prescale_count = s.prescale_count;
    }
}

pub struct Timer2 {
    prescale_count: u8,
    postscale_count: u8,
}

impl Timer2 {
    pub fn new() -> Self {
        Timer2 { prescale_count: 0, postscale_count: 0 }
    }

    pub fn reset(&mut self) {
        *self = Timer2::new();
    }

    /// Advance one instruction cycle. Returns true on a period boundary
    /// (TMR2 matched PR2 and restarted from 0).
    pub fn step(&mut self, data: &mut [u8]) -> bool {
        let con = data[T2CON as usize];
        if T2CON_TMR2ON.get(con) == 0 {
            return false;
        }
        let prescale = match T2CON_CKPS.get(con) {
            0 => 1,
            1 => 4,
            _ => 16,
        };
        self.prescale_count += 1;
        if self.prescale_count < prescale {
            return false;
        }
        self.prescale_count = 0;
        if data[TMR2 as usize] == data[PR2 as usize] {
            data[TMR2 as usize] = 0;
            self.postscale_count += 1;
            if self.postscale_count > T2CON_TOUTPS.get(con) {
                self.postscale_count = 0;
                data[PIR1 as usize] |= Pir1::TMR2IF.bits();
            }
            true
        } else {
            data[TMR2 as usize] = data[TMR2 as usize].wrapping_add(1);
            false
        }
    }

    pub fn save_state(&self) -> crate::savestate::TimerState {
        crate::savestate::TimerState {
            prescale_count: self.prescale_count,
            postscale_count: self.postscale_count,
        }
    }

    pub fn load_state(&mut self, s: &crate::savestate::TimerState) {
        self.prescale_count = s.prescale_count;
        self.postscale_count = s.postscale_count;
    }
}
