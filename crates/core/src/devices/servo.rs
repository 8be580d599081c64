//! Hobby servo on a CCP compare output with Timer3 as time base.
//!
//! The pulse is produced by the CCP interrupt rather than the PWM module:
//! each period has a high phase of `duty` timer ticks and a low phase of
//! `period - duty` ticks. On every compare match the ISR zeroes Timer3 and
//! loads the length and pin action of the next phase. [`Servo::set_angle`]
//! publishes a new duty that the ISR picks up at the start of the next high
//! phase.

use std::sync::atomic::{AtomicU16, AtomicU8, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::hal::ccp::{self, CcpConfig, CcpMode, CcpModule, CompareAction, TimerPairing};
use crate::hal::interrupt::Irq;
use crate::hal::timer::{self, Prescaler, Timer16, Timer16Config};
use crate::mcu::Mcu;
use crate::regs::Registers;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ServoConfig {
    pub module: CcpModule,
    pub irq: Irq,
    pub min_angle: f32,
    pub max_angle: f32,
    /// Pulse length in Timer3 ticks at `min_angle` and `max_angle`.
    pub min_duty: u16,
    pub max_duty: u16,
    /// High plus low phase, in Timer3 ticks.
    pub period: u16,
    /// Added to the requested angle before mapping.
    pub trim: f32,
    /// Compare value loaded by `init`, before any angle is set.
    pub initial_duty: u16,
}

impl Default for ServoConfig {
    fn default() -> Self {
        ServoConfig {
            module: CcpModule::Ccp1,
            irq: Irq::Enabled,
            min_angle: 0.0,
            max_angle: 180.0,
            min_duty: 1850,
            max_duty: 4000,
            period: 4000,
            trim: 0.26,
            initial_duty: 1800,
        }
    }
}

impl ServoConfig {
    fn validate(&self) -> Result<()> {
        if self.min_angle.partial_cmp(&self.max_angle) != Some(core::cmp::Ordering::Less) {
            return Err(Error::InvalidConfig("servo angle range is empty"));
        }
        if self.min_duty > self.max_duty || self.max_duty > self.period {
            return Err(Error::InvalidConfig("servo pulse range wider than its period"));
        }
        Ok(())
    }

    /// Linear map of `angle + trim` onto the duty range, clamped to it.
    pub fn duty_for(&self, angle: f32) -> u16 {
        let x = angle + self.trim;
        if x.is_nan() {
            return self.min_duty;
        }
        let span = (self.max_duty - self.min_duty) as f32;
        let duty = (x - self.min_angle) * span / (self.max_angle - self.min_angle) + self.min_duty as f32;
        duty.clamp(self.min_duty as f32, self.max_duty as f32) as u16
    }
}

pub struct Servo {
    cfg: ServoConfig,
    duty: Arc<AtomicU16>,
    step: Arc<AtomicU8>,
}

impl Servo {
    /// Configure CCP compare and Timer3 and attach the ISR. The pin starts
    /// low and goes high after `initial_duty` ticks.
    pub fn init<R: Registers + 'static>(mcu: &mut Mcu<R>, cfg: ServoConfig) -> Result<Servo> {
        cfg.validate()?;
        let module = cfg.module;
        ccp::compare_set_value(mcu, module, cfg.initial_duty);
        let mut ccp_cfg = CcpConfig::new(module, CcpMode::Compare {
            action: CompareAction::DriveHighOnMatch,
            timer: TimerPairing::BothTimer3,
        });
        ccp_cfg.irq = cfg.irq;
        ccp::init(mcu, &ccp_cfg)?;
        timer::init(mcu, &Timer16Config {
            timer: Timer16::Timer3,
            prescaler: Prescaler::Div1,
            rw16: true,
            preload: 0,
            irq: Irq::Disabled,
        });

        let duty = Arc::new(AtomicU16::new(cfg.initial_duty));
        let step = Arc::new(AtomicU8::new(0));
        let (isr_duty, isr_step, period) = (duty.clone(), step.clone(), cfg.period);
        mcu.attach(module.source(), cfg.irq, move |regs: &mut R| {
            let n = isr_step.fetch_add(1, Ordering::Relaxed) + 1;
            timer::write_value(regs, Timer16::Timer3, 0);
            let duty = isr_duty.load(Ordering::Relaxed);
            match n {
                1 => {
                    ccp::compare_set_value(regs, module, duty);
                    ccp::set_compare_action(regs, module, CompareAction::DriveLowOnMatch);
                }
                2 => {
                    ccp::compare_set_value(regs, module, period.saturating_sub(duty).max(1));
                    ccp::set_compare_action(regs, module, CompareAction::DriveHighOnMatch);
                    isr_step.store(0, Ordering::Relaxed);
                }
                _ => {}
            }
        });
        log::debug!("servo: {:?} period {} ticks", module, cfg.period);
        Ok(Servo { cfg, duty, step })
    }

    /// Publish the duty for `angle`. An angle outside the configured range
    /// still moves the servo to the nearest end and reports
    /// `AngleOutOfRange`.
    pub fn set_angle(&self, angle: f32) -> Result<()> {
        if !angle.is_finite() {
            return Err(Error::AngleOutOfRange);
        }
        let duty = self.cfg.duty_for(angle);
        self.duty.store(duty, Ordering::Relaxed);
        log::trace!("servo: angle {} -> duty {}", angle, duty);
        if (self.cfg.min_angle..=self.cfg.max_angle).contains(&angle) {
            Ok(())
        } else {
            Err(Error::AngleOutOfRange)
        }
    }

    /// Current pulse length in Timer3 ticks.
    pub fn duty(&self) -> u16 {
        self.duty.load(Ordering::Relaxed)
    }

    pub fn config(&self) -> &ServoConfig {
        &self.cfg
    }

    /// Stop the pulse train and release the CCP module and Timer3.
    pub fn deinit<R: Registers>(self, mcu: &mut Mcu<R>) {
        let module = self.cfg.module;
        ccp::compare_set_value(mcu, module, 0);
        ccp::deinit(mcu, module);
        timer::deinit(mcu, Timer16::Timer3);
        mcu.detach(module.source());
        self.step.store(0, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sfr::{Port, CCP1CON};
    use crate::Pic18;

    /// Run `cycles` and return the cycle numbers of each rising and falling
    /// edge on the servo pin.
    fn edges(mcu: &mut Mcu<Pic18>, cycles: u64) -> (Vec<u64>, Vec<u64>) {
        let (mut rise, mut fall) = (Vec::new(), Vec::new());
        let mut prev = mcu.regs.pin_level(Port::C, 2);
        for _ in 0..cycles {
            mcu.run(1);
            let level = mcu.regs.pin_level(Port::C, 2);
            if level != prev {
                if level { rise.push(mcu.regs.cycles) } else { fall.push(mcu.regs.cycles) }
                prev = level;
            }
        }
        (rise, fall)
    }

    #[test]
    fn test_duty_mapping() {
        let cfg = ServoConfig::default();
        assert_eq!(cfg.duty_for(0.0), 1853);
        assert_eq!(cfg.duty_for(90.0), 2928);
        assert_eq!(cfg.duty_for(180.0), 4000);
        assert_eq!(cfg.duty_for(-45.0), 1850);
    }

    #[test]
    fn test_pulse_train() {
        let mut mcu = Mcu::new(Pic18::new());
        let servo = Servo::init(&mut mcu, ServoConfig::default()).unwrap();
        assert!(!mcu.regs.pin_level(Port::C, 2));
        servo.set_angle(90.0).unwrap();
        let (rise, fall) = edges(&mut mcu, 14_000);
        assert_eq!(rise[0], 1800);
        assert_eq!(fall[0] - rise[0], 2928);
        assert_eq!(rise[1] - rise[0], 4000);
        assert_eq!(fall[1] - rise[1], 2928);

        // the running high phase keeps the old duty, the low phase after it
        // is already sized for the new one
        servo.set_angle(0.0).unwrap();
        let (rise, fall) = edges(&mut mcu, 9_000);
        assert_eq!(fall[0], 13_800 + 2928);
        assert_eq!(rise[0], fall[0] + 4000 - 1853);
        assert_eq!(fall[1] - rise[0], 1853);
        assert_eq!(rise[1] - rise[0], 4000);
    }

    #[test]
    fn test_out_of_range_angle() {
        let mut mcu = Mcu::new(Pic18::new());
        let servo = Servo::init(&mut mcu, ServoConfig::default()).unwrap();
        assert_eq!(servo.set_angle(200.0), Err(Error::AngleOutOfRange));
        assert_eq!(servo.duty(), 4000);
        assert_eq!(servo.set_angle(-1.0), Err(Error::AngleOutOfRange));
        assert_eq!(servo.duty(), 1850);
    }

    #[test]
    fn test_non_finite_angle() {
        let mut mcu = Mcu::new(Pic18::new());
        let servo = Servo::init(&mut mcu, ServoConfig::default()).unwrap();
        servo.set_angle(90.0).unwrap();
        assert_eq!(servo.set_angle(f32::NAN), Err(Error::AngleOutOfRange));
        assert_eq!(servo.duty(), 2928);
        assert_eq!(servo.set_angle(f32::INFINITY), Err(Error::AngleOutOfRange));
        assert_eq!(servo.set_angle(f32::NEG_INFINITY), Err(Error::AngleOutOfRange));
        assert_eq!(servo.duty(), 2928);
        assert_eq!(ServoConfig::default().duty_for(f32::NAN), 1850);
    }

    #[test]
    fn test_invalid_config() {
        let mut mcu = Mcu::new(Pic18::new());
        let cfg = ServoConfig { max_duty: 5000, ..ServoConfig::default() };
        assert!(matches!(Servo::init(&mut mcu, cfg), Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn test_deinit() {
        let mut mcu = Mcu::new(Pic18::new());
        let servo = Servo::init(&mut mcu, ServoConfig::default()).unwrap();
        mcu.run(2000);
        assert!(mcu.regs.pin_level(Port::C, 2));
        servo.deinit(&mut mcu);
        assert!(!mcu.has_handler(crate::hal::interrupt::Source::Ccp1));
        assert_eq!(mcu.regs.read_data(CCP1CON) & 0x0F, 0);
        assert!(!mcu.regs.pin_level(Port::C, 2));
        let t = timer::read_value(&mut mcu, Timer16::Timer3);
        mcu.run(100);
        assert_eq!(timer::read_value(&mut mcu, Timer16::Timer3), t);
    }
}
