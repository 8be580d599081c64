//! Timer1, Timer2 and Timer3 drivers.
//!
//! Timer1/Timer3 run from the instruction clock through a 1/2/4/8
//! prescaler. Their init only touches the timer fields of TxCON: on Timer3
//! the T3CCP2:T3CCP1 bits belong to the CCP driver and are preserved.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::hal::interrupt::{self, Irq, Source};
use crate::regs::Registers;
use crate::sfr::{
    TxCon, PR2, T1CON, T2CON, T2CON_CKPS, T2CON_TMR2ON, T2CON_TOUTPS, T3CON, TMR1H, TMR1L, TMR2,
    TMR3H, TMR3L, TXCON_CKPS,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Timer16 {
    Timer1,
    Timer3,
}

impl Timer16 {
    fn con(self) -> u16 {
        match self {
            Timer16::Timer1 => T1CON,
            Timer16::Timer3 => T3CON,
        }
    }

    fn counter(self) -> (u16, u16) {
        match self {
            Timer16::Timer1 => (TMR1H, TMR1L),
            Timer16::Timer3 => (TMR3H, TMR3L),
        }
    }

    fn source(self) -> Source {
        match self {
            Timer16::Timer1 => Source::Tmr1,
            Timer16::Timer3 => Source::Tmr3,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Prescaler {
    #[default]
    Div1 = 0,
    Div2 = 1,
    Div4 = 2,
    Div8 = 3,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Timer16Config {
    pub timer: Timer16,
    pub prescaler: Prescaler,
    /// Read/write TMRxH:TMRxL as one 16-bit operation (RD16).
    pub rw16: bool,
    pub preload: u16,
    pub irq: Irq,
}

impl Default for Timer16Config {
    fn default() -> Self {
        Timer16Config {
            timer: Timer16::Timer1,
            prescaler: Prescaler::Div1,
            rw16: true,
            preload: 0,
            irq: Irq::Disabled,
        }
    }
}

/// Stop, configure, preload and start a 16-bit timer.
pub fn init<R: Registers>(regs: &mut R, cfg: &Timer16Config) {
    let con = cfg.timer.con();
    regs.clear_bits(con, TxCon::TMRON.bits());
    regs.write_field(con, TXCON_CKPS, cfg.prescaler as u8);
    regs.write_bit(con, TxCon::RD16.bits(), cfg.rw16);
    regs.clear_bits(con, (TxCon::TMRCS | TxCon::SYNC).bits());
    write_value(regs, cfg.timer, cfg.preload);
    interrupt::enable(regs, cfg.timer.source(), cfg.irq);
    regs.set_bits(con, TxCon::TMRON.bits());
    log::debug!("{:?}: {:?}, preload {}", cfg.timer, cfg.prescaler, cfg.preload);
}

pub fn deinit<R: Registers>(regs: &mut R, timer: Timer16) {
    regs.clear_bits(timer.con(), TxCon::TMRON.bits());
    interrupt::disable(regs, timer.source());
}

/// High byte first: in 16-bit mode TMRxH is buffered until TMRxL is written.
pub fn write_value<R: Registers>(regs: &mut R, timer: Timer16, value: u16) {
    let (h, l) = timer.counter();
    regs.write(h, (value >> 8) as u8);
    regs.write(l, value as u8);
}

/// Low byte first: in 16-bit mode reading TMRxL latches TMRxH.
pub fn read_value<R: Registers>(regs: &mut R, timer: Timer16) -> u16 {
    let (h, l) = timer.counter();
    let low = regs.read(l) as u16;
    ((regs.read(h) as u16) << 8) | low
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Timer2Prescaler {
    #[default]
    Div1,
    Div4,
    Div16,
}

impl Timer2Prescaler {
    pub fn ratio(self) -> u32 {
        match self {
            Timer2Prescaler::Div1 => 1,
            Timer2Prescaler::Div4 => 4,
            Timer2Prescaler::Div16 => 16,
        }
    }

    fn bits(self) -> u8 {
        match self {
            Timer2Prescaler::Div1 => 0,
            Timer2Prescaler::Div4 => 1,
            Timer2Prescaler::Div16 => 2,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Timer2Config {
    pub prescaler: Timer2Prescaler,
    /// 1..=16
    pub postscaler: u8,
    pub period: u8,
    pub irq: Irq,
}

impl Default for Timer2Config {
    fn default() -> Self {
        Timer2Config { prescaler: Timer2Prescaler::Div1, postscaler: 1, period: 0xFF, irq: Irq::Disabled }
    }
}

pub fn timer2_init<R: Registers>(regs: &mut R, cfg: &Timer2Config) -> Result<()> {
    if !(1..=16).contains(&cfg.postscaler) {
        return Err(Error::InvalidConfig("timer2 postscaler must be 1..=16"));
    }
    regs.write_field(T2CON, T2CON_TMR2ON, 0);
    regs.write_field(T2CON, T2CON_CKPS, cfg.prescaler.bits());
    regs.write_field(T2CON, T2CON_TOUTPS, cfg.postscaler - 1);
    regs.write(PR2, cfg.period);
    regs.write(TMR2, 0);
    interrupt::enable(regs, Source::Tmr2, cfg.irq);
    regs.write_field(T2CON, T2CON_TMR2ON, 1);
    log::debug!("timer2: {:?} 1:{} PR2={}", cfg.prescaler, cfg.postscaler, cfg.period);
    Ok(())
}

pub fn timer2_deinit<R: Registers>(regs: &mut R) {
    regs.write_field(T2CON, T2CON_TMR2ON, 0);
    interrupt::disable(regs, Source::Tmr2);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sfr::{Pir2, PIR2};
    use crate::Pic18;

    #[test]
    fn test_timer3_init_keeps_ccp_bits() {
        let mut pic = Pic18::new();
        pic.write_data(T3CON, TxCon::T3CCP2.bits());
        let cfg = Timer16Config {
            timer: Timer16::Timer3,
            prescaler: Prescaler::Div8,
            preload: 0x1234,
            ..Default::default()
        };
        init(&mut pic, &cfg);
        let con = TxCon::from_bits_retain(pic.read_data(T3CON));
        assert!(con.contains(TxCon::T3CCP2 | TxCon::TMRON | TxCon::RD16));
        assert_eq!(TXCON_CKPS.get(con.bits()), 3);
        assert_eq!(read_value(&mut pic, Timer16::Timer3), 0x1234);
    }

    #[test]
    fn test_timer3_counts_and_overflows() {
        let mut pic = Pic18::new();
        let cfg = Timer16Config { timer: Timer16::Timer3, preload: 0xFFFE, ..Default::default() };
        init(&mut pic, &cfg);
        pic.step();
        assert_eq!(read_value(&mut pic, Timer16::Timer3), 0xFFFF);
        pic.step();
        assert_eq!(read_value(&mut pic, Timer16::Timer3), 0);
        assert_ne!(pic.read_data(PIR2) & Pir2::TMR3IF.bits(), 0);
        deinit(&mut pic, Timer16::Timer3);
        pic.step();
        assert_eq!(read_value(&mut pic, Timer16::Timer3), 0);
    }

    #[test]
    fn test_timer2_init() {
        let mut pic = Pic18::new();
        let cfg = Timer2Config { prescaler: Timer2Prescaler::Div16, postscaler: 4, period: 99, irq: Irq::Disabled };
        timer2_init(&mut pic, &cfg).unwrap();
        let con = pic.read_data(T2CON);
        assert_eq!(T2CON_CKPS.get(con), 2);
        assert_eq!(T2CON_TOUTPS.get(con), 3);
        assert_eq!(T2CON_TMR2ON.get(con), 1);
        assert_eq!(pic.read_data(PR2), 99);
        timer2_deinit(&mut pic);
        assert_eq!(T2CON_TMR2ON.get(pic.read_data(T2CON)), 0);
    }

    #[test]
    fn test_timer2_bad_postscaler() {
        let mut pic = Pic18::new();
        let cfg = Timer2Config { postscaler: 0, ..Default::default() };
        assert!(matches!(timer2_init(&mut pic, &cfg), Err(Error::InvalidConfig(_))));
    }
}
