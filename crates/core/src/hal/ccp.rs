//! CCP1/CCP2 capture, compare and PWM.
//!
//! Capture and compare run on Timer1 or Timer3 as selected by the
//! T3CCP2:T3CCP1 bits of T3CON. PWM runs on Timer2: the period comes from
//! PR2, the 10-bit duty from CCPRxL:DCxB.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::hal::gpio::{self, PinConfig};
use crate::hal::interrupt::{self, Irq, Source};
use crate::hal::timer::Timer2Prescaler;
use crate::regs::Registers;
use crate::sfr::{
    Port, TxCon, CCP1CON, CCP2CON, CCPCON_DCB, CCPCON_MODE, CCPR1H, CCPR1L, CCPR2H, CCPR2L, PR2,
    T2CON, T2CON_CKPS, T2CON_TMR2ON, T2CON_TOUTPS, T3CON,
};
use crate::XTAL_FREQ;

const MODE_OFF: u8 = 0x0;
const MODE_PWM: u8 = 0xC;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CcpModule {
    Ccp1,
    Ccp2,
}

impl CcpModule {
    fn con(self) -> u16 {
        match self {
            CcpModule::Ccp1 => CCP1CON,
            CcpModule::Ccp2 => CCP2CON,
        }
    }

    fn reg(self) -> (u16, u16) {
        match self {
            CcpModule::Ccp1 => (CCPR1H, CCPR1L),
            CcpModule::Ccp2 => (CCPR2H, CCPR2L),
        }
    }

    pub fn source(self) -> Source {
        match self {
            CcpModule::Ccp1 => Source::Ccp1,
            CcpModule::Ccp2 => Source::Ccp2,
        }
    }

    /// Default pin: RC2 for CCP1, RC1 for CCP2.
    pub fn pin(self) -> (Port, u8) {
        match self {
            CcpModule::Ccp1 => (Port::C, 2),
            CcpModule::Ccp2 => (Port::C, 1),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CaptureEdge {
    EveryFalling = 0x4,
    EveryRising = 0x5,
    Every4thRising = 0x6,
    Every16thRising = 0x7,
}

/// What the module does when the timer matches CCPRx.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CompareAction {
    ToggleOnMatch = 0x2,
    /// Pin starts low and is driven high on match.
    DriveHighOnMatch = 0x8,
    /// Pin starts high and is driven low on match.
    DriveLowOnMatch = 0x9,
    /// Flag only, pin untouched.
    SoftwareInterrupt = 0xA,
    /// Resets the time base; CCP2 also starts an A/D conversion.
    SpecialEvent = 0xB,
}

/// Time base for capture and compare (T3CCP2:T3CCP1).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TimerPairing {
    BothTimer3,
    Ccp1Timer1Ccp2Timer3,
    #[default]
    BothTimer1,
}

impl TimerPairing {
    fn apply<R: Registers>(self, regs: &mut R) {
        let (ccp2, ccp1) = match self {
            TimerPairing::BothTimer3 => (true, true),
            TimerPairing::Ccp1Timer1Ccp2Timer3 => (false, true),
            TimerPairing::BothTimer1 => (false, false),
        };
        regs.write_bit(T3CON, TxCon::T3CCP2.bits(), ccp2);
        regs.write_bit(T3CON, TxCon::T3CCP1.bits(), ccp1);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CcpMode {
    Capture { edge: CaptureEdge, timer: TimerPairing },
    Compare { action: CompareAction, timer: TimerPairing },
    Pwm { frequency: u32, prescaler: Timer2Prescaler, postscaler: u8 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CcpConfig {
    pub module: CcpModule,
    pub mode: CcpMode,
    pub pin: PinConfig,
    pub irq: Irq,
}

impl CcpConfig {
    /// Config on the module's own pin: an input for capture, an output
    /// otherwise.
    pub fn new(module: CcpModule, mode: CcpMode) -> Self {
        let (port, pin) = module.pin();
        let pin = match mode {
            CcpMode::Capture { .. } => PinConfig::input(port, pin),
            _ => PinConfig::output(port, pin, gpio::Logic::Low),
        };
        CcpConfig { module, mode, pin, irq: Irq::Disabled }
    }
}

/// PR2 for a PWM frequency: `XTAL_FREQ / (4 * frequency * prescaler) - 1`.
pub fn pwm_period_reload(frequency: u32, prescaler: Timer2Prescaler) -> Result<u8> {
    let div = 4u64 * frequency as u64 * prescaler.ratio() as u64;
    if div == 0 {
        return Err(Error::InvalidConfig("pwm frequency must be non-zero"));
    }
    match (XTAL_FREQ as u64 / div).checked_sub(1) {
        Some(v) if v <= 0xFF => Ok(v as u8),
        _ => Err(Error::InvalidConfig("pwm frequency out of range")),
    }
}

pub fn init<R: Registers>(regs: &mut R, cfg: &CcpConfig) -> Result<()> {
    let con = cfg.module.con();
    regs.write_field(con, CCPCON_MODE, MODE_OFF);
    match cfg.mode {
        CcpMode::Capture { edge, timer } => {
            regs.write_field(con, CCPCON_MODE, edge as u8);
            timer.apply(regs);
        }
        CcpMode::Compare { action, timer } => {
            regs.write_field(con, CCPCON_MODE, action as u8);
            timer.apply(regs);
        }
        CcpMode::Pwm { frequency, prescaler, postscaler } => {
            let pr2 = pwm_period_reload(frequency, prescaler)?;
            if !(1..=16).contains(&postscaler) {
                return Err(Error::InvalidConfig("timer2 postscaler must be 1..=16"));
            }
            regs.write(PR2, pr2);
            regs.write_field(T2CON, T2CON_CKPS, prescaler as u8);
            regs.write_field(T2CON, T2CON_TOUTPS, postscaler - 1);
            regs.write_field(T2CON, T2CON_TMR2ON, 1);
            regs.write_field(con, CCPCON_MODE, MODE_PWM);
        }
    }
    gpio::pin_initialize(regs, &cfg.pin)?;
    interrupt::enable(regs, cfg.module.source(), cfg.irq);
    log::debug!("{:?}: {:?}", cfg.module, cfg.mode);
    Ok(())
}

pub fn deinit<R: Registers>(regs: &mut R, module: CcpModule) {
    regs.write_field(module.con(), CCPCON_MODE, MODE_OFF);
    interrupt::disable(regs, module.source());
}

fn take_flag<R: Registers>(regs: &mut R, module: CcpModule) -> bool {
    let set = interrupt::flag(regs, module.source());
    if set {
        interrupt::clear_flag(regs, module.source());
    }
    set
}

/// True once per capture event (reads and clears CCPxIF).
pub fn capture_is_ready<R: Registers>(regs: &mut R, module: CcpModule) -> bool {
    take_flag(regs, module)
}

pub fn capture_value<R: Registers>(regs: &mut R, module: CcpModule) -> u16 {
    let (h, l) = module.reg();
    let low = regs.read(l) as u16;
    ((regs.read(h) as u16) << 8) | low
}

/// True once per compare match (reads and clears CCPxIF).
pub fn compare_is_completed<R: Registers>(regs: &mut R, module: CcpModule) -> bool {
    take_flag(regs, module)
}

pub fn compare_set_value<R: Registers>(regs: &mut R, module: CcpModule, value: u16) {
    let (h, l) = module.reg();
    regs.write(l, value as u8);
    regs.write(h, (value >> 8) as u8);
}

/// Switch the compare action without touching the rest of the setup.
pub fn set_compare_action<R: Registers>(regs: &mut R, module: CcpModule, action: CompareAction) {
    regs.write_field(module.con(), CCPCON_MODE, action as u8);
}

/// Duty cycle in percent of the current PR2 period.
pub fn pwm_set_duty_cycle<R: Registers>(regs: &mut R, module: CcpModule, percent: u8) -> Result<()> {
    if percent > 100 {
        return Err(Error::InvalidDutyCycle(percent));
    }
    let period = regs.read(PR2) as u32 + 1;
    let duty = 4 * period * percent as u32 / 100;
    let (_, l) = module.reg();
    regs.write_field(module.con(), CCPCON_DCB, (duty & 0x03) as u8);
    regs.write(l, (duty >> 2) as u8);
    Ok(())
}

pub fn pwm_start<R: Registers>(regs: &mut R, module: CcpModule) {
    regs.write_field(module.con(), CCPCON_MODE, MODE_PWM);
}

pub fn pwm_stop<R: Registers>(regs: &mut R, module: CcpModule) {
    regs.write_field(module.con(), CCPCON_MODE, MODE_OFF);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hal::timer::{self, Timer16, Timer16Config};
    use crate::Pic18;

    #[test]
    fn test_pwm_period_reload() {
        assert_eq!(pwm_period_reload(5_000, Timer2Prescaler::Div4), Ok(99));
        assert_eq!(pwm_period_reload(20_000, Timer2Prescaler::Div1), Ok(99));
        assert!(pwm_period_reload(100, Timer2Prescaler::Div1).is_err());
        assert!(pwm_period_reload(0, Timer2Prescaler::Div1).is_err());
    }

    #[test]
    fn test_duty_cycle_split() {
        let mut pic = Pic18::new();
        pic.write_data(PR2, 99);
        pwm_set_duty_cycle(&mut pic, CcpModule::Ccp2, 33).unwrap();
        // 4 * 100 * 33 / 100 = 132 = 0b10000100
        assert_eq!(pic.read_data(CCPR2L), 33);
        assert_eq!(CCPCON_DCB.get(pic.read_data(CCP2CON)), 0);
        pwm_set_duty_cycle(&mut pic, CcpModule::Ccp2, 1).unwrap();
        assert_eq!(pic.read_data(CCPR2L), 1);
        assert_eq!(CCPCON_DCB.get(pic.read_data(CCP2CON)), 0);
        pwm_set_duty_cycle(&mut pic, CcpModule::Ccp1, 57).unwrap();
        // 228 = 57 << 2
        assert_eq!(pic.read_data(CCPR1L), 57);
        assert_eq!(pwm_set_duty_cycle(&mut pic, CcpModule::Ccp1, 101), Err(Error::InvalidDutyCycle(101)));

        pic.write_data(PR2, 0x3E);
        // 4 * 63 * 50 / 100 = 126 = 0b11111_10
        pwm_set_duty_cycle(&mut pic, CcpModule::Ccp1, 50).unwrap();
        assert_eq!(pic.read_data(CCPR1L), 31);
        assert_eq!(CCPCON_DCB.get(pic.read_data(CCP1CON)), 2);
        // 63 = 0b1111_11
        pwm_set_duty_cycle(&mut pic, CcpModule::Ccp1, 25).unwrap();
        assert_eq!(pic.read_data(CCPR1L), 15);
        assert_eq!(CCPCON_DCB.get(pic.read_data(CCP1CON)), 3);

        pic.write_data(PR2, 0xFF);
        // 4 * 256 * 33 / 100 = 337 = 0b1010100_01
        pwm_set_duty_cycle(&mut pic, CcpModule::Ccp2, 33).unwrap();
        assert_eq!(pic.read_data(CCPR2L), 84);
        assert_eq!(CCPCON_DCB.get(pic.read_data(CCP2CON)), 1);
    }

    #[test]
    fn test_pwm_output() {
        let mut pic = Pic18::new();
        let mode = CcpMode::Pwm { frequency: 5_000, prescaler: Timer2Prescaler::Div4, postscaler: 1 };
        init(&mut pic, &CcpConfig::new(CcpModule::Ccp1, mode)).unwrap();
        assert_eq!(pic.read_data(PR2), 99);
        pwm_set_duty_cycle(&mut pic, CcpModule::Ccp1, 50).unwrap();
        for _ in 0..400 {
            pic.step();
        }
        let mut high = 0;
        for _ in 0..800 {
            pic.step();
            if pic.pin_level(Port::C, 2) {
                high += 1;
            }
        }
        assert!((390..=410).contains(&high), "high for {} of 800 cycles", high);
        pwm_stop(&mut pic, CcpModule::Ccp1);
        assert!(!pic.pin_level(Port::C, 2));
    }

    #[test]
    fn test_compare_drives_pin_high() {
        let mut pic = Pic18::new();
        let mode = CcpMode::Compare { action: CompareAction::DriveHighOnMatch, timer: TimerPairing::BothTimer1 };
        compare_set_value(&mut pic, CcpModule::Ccp1, 0x0010);
        init(&mut pic, &CcpConfig::new(CcpModule::Ccp1, mode)).unwrap();
        timer::init(&mut pic, &Timer16Config { timer: Timer16::Timer1, ..Default::default() });
        for _ in 0..15 {
            pic.step();
        }
        assert!(!pic.pin_level(Port::C, 2));
        assert!(!compare_is_completed(&mut pic, CcpModule::Ccp1));
        pic.step();
        assert!(pic.pin_level(Port::C, 2));
        assert!(compare_is_completed(&mut pic, CcpModule::Ccp1));
        assert!(!compare_is_completed(&mut pic, CcpModule::Ccp1));

        set_compare_action(&mut pic, CcpModule::Ccp1, CompareAction::DriveLowOnMatch);
        assert!(pic.pin_level(Port::C, 2));
    }

    #[test]
    fn test_capture_on_timer3() {
        let mut pic = Pic18::new();
        let mode = CcpMode::Capture { edge: CaptureEdge::EveryRising, timer: TimerPairing::BothTimer3 };
        init(&mut pic, &CcpConfig::new(CcpModule::Ccp1, mode)).unwrap();
        let con = TxCon::from_bits_retain(pic.read_data(T3CON));
        assert!(con.contains(TxCon::T3CCP2 | TxCon::T3CCP1));
        timer::init(&mut pic, &Timer16Config { timer: Timer16::Timer3, ..Default::default() });
        for _ in 0..100 {
            pic.step();
        }
        assert!(!capture_is_ready(&mut pic, CcpModule::Ccp1));
        pic.set_pin_input(Port::C, 2, true);
        assert!(capture_is_ready(&mut pic, CcpModule::Ccp1));
        assert_eq!(capture_value(&mut pic, CcpModule::Ccp1), 100);
    }

    #[test]
    fn test_timer_pairing_bits() {
        let mut pic = Pic18::new();
        TimerPairing::Ccp1Timer1Ccp2Timer3.apply(&mut pic);
        assert_eq!(pic.read_data(T3CON), TxCon::T3CCP1.bits());
        TimerPairing::BothTimer1.apply(&mut pic);
        assert_eq!(pic.read_data(T3CON), 0);
    }

    #[test]
    fn test_deinit() {
        let mut pic = Pic18::new();
        let mode = CcpMode::Compare { action: CompareAction::SoftwareInterrupt, timer: TimerPairing::BothTimer1 };
        let cfg = CcpConfig { irq: Irq::Enabled, ..CcpConfig::new(CcpModule::Ccp2, mode) };
        init(&mut pic, &cfg).unwrap();
        assert_eq!(CCPCON_MODE.get(pic.read_data(CCP2CON)), 0xA);
        deinit(&mut pic, CcpModule::Ccp2);
        assert_eq!(pic.read_data(CCP2CON), 0);
    }
}
