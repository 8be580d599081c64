//! Interrupt sources and dispatch.
//!
//! Each [`Source`] knows its flag, enable and priority bits. [`enable`]
//! performs the register setup a driver's init needs; [`InterruptManager`]
//! owns the handlers and plays the role of the high- and low-priority
//! vectors: [`InterruptManager::service`] runs every pending source that the
//! global enable bits allow, high priority first, clearing each flag before
//! its handler runs.

use serde::{Deserialize, Serialize};

use crate::regs::Registers;
use crate::sfr::{Intcon, Pir1, Pir2, Rcon, INTCON, INTCON2, IPR1, IPR2, PIE1, PIE2, PIR1, PIR2, RCON};

/// Interrupt priority level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Priority {
    High,
    Low,
}

/// How a driver's interrupt is configured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Irq {
    /// Source disabled; the driver is polled.
    #[default]
    Disabled,
    /// Enabled without priority levels (GIE/PEIE).
    Enabled,
    /// Enabled with priority levels (IPEN, GIEH/GIEL).
    Priority(Priority),
}

/// Interrupt sources used by the drivers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Source {
    Int0,
    Tmr0,
    Adc,
    Ssp,
    Ccp1,
    Tmr1,
    Tmr2,
    Tmr3,
    Ccp2,
    BusCollision,
    Eeprom,
}

#[derive(Debug, Clone, Copy)]
struct Bit {
    addr: u16,
    mask: u8,
}

const fn bit(addr: u16, mask: u8) -> Bit {
    Bit { addr, mask }
}

struct SourceBits {
    flag: Bit,
    enable: Bit,
    /// `None` for INT0, which is always high priority.
    priority: Option<Bit>,
    /// Peripheral sources also need PEIE (GIEL in priority mode).
    peripheral: bool,
}

impl Source {
    /// Dispatch order within one priority level.
    pub const ALL: [Source; 11] = [
        Source::Int0,
        Source::Tmr0,
        Source::Adc,
        Source::Tmr1,
        Source::Tmr2,
        Source::Tmr3,
        Source::Ccp1,
        Source::Ccp2,
        Source::Ssp,
        Source::BusCollision,
        Source::Eeprom,
    ];

    fn bits(self) -> SourceBits {
        let p1 = |m: Pir1| SourceBits {
            flag: bit(PIR1, m.bits()),
            enable: bit(PIE1, m.bits()),
            priority: Some(bit(IPR1, m.bits())),
            peripheral: true,
        };
        let p2 = |m: Pir2| SourceBits {
            flag: bit(PIR2, m.bits()),
            enable: bit(PIE2, m.bits()),
            priority: Some(bit(IPR2, m.bits())),
            peripheral: true,
        };
        match self {
            Source::Int0 => SourceBits {
                flag: bit(INTCON, Intcon::INT0IF.bits()),
                enable: bit(INTCON, Intcon::INT0IE.bits()),
                priority: None,
                peripheral: false,
            },
            Source::Tmr0 => SourceBits {
                flag: bit(INTCON, Intcon::TMR0IF.bits()),
                enable: bit(INTCON, Intcon::TMR0IE.bits()),
                priority: Some(bit(INTCON2, 0x04)),
                peripheral: false,
            },
            Source::Adc => p1(Pir1::ADIF),
            Source::Ssp => p1(Pir1::SSPIF),
            Source::Ccp1 => p1(Pir1::CCP1IF),
            Source::Tmr1 => p1(Pir1::TMR1IF),
            Source::Tmr2 => p1(Pir1::TMR2IF),
            Source::Tmr3 => p2(Pir2::TMR3IF),
            Source::Ccp2 => p2(Pir2::CCP2IF),
            Source::BusCollision => p2(Pir2::BCLIF),
            Source::Eeprom => p2(Pir2::EEIF),
        }
    }
}

/// Configure a source: clear its flag, program priority and the global
/// enables, then enable it. `Irq::Disabled` just disables the source.
pub fn enable<R: Registers>(regs: &mut R, source: Source, irq: Irq) {
    let b = source.bits();
    if irq == Irq::Disabled {
        regs.clear_bits(b.enable.addr, b.enable.mask);
        return;
    }
    regs.clear_bits(b.flag.addr, b.flag.mask);
    match irq {
        Irq::Priority(p) => {
            regs.set_bits(RCON, Rcon::IPEN.bits());
            if let Some(pb) = b.priority {
                regs.write_bit(pb.addr, pb.mask, p == Priority::High);
            }
            regs.set_bits(INTCON, (Intcon::GIEH | Intcon::GIEL).bits());
        }
        _ => {
            let mut g = Intcon::GIE;
            if b.peripheral {
                g |= Intcon::PEIE;
            }
            regs.set_bits(INTCON, g.bits());
        }
    }
    regs.set_bits(b.enable.addr, b.enable.mask);
    log::debug!("irq: {:?} enabled ({:?})", source, irq);
}

pub fn disable<R: Registers>(regs: &mut R, source: Source) {
    let b = source.bits();
    regs.clear_bits(b.enable.addr, b.enable.mask);
}

pub fn clear_flag<R: Registers>(regs: &mut R, source: Source) {
    let b = source.bits();
    regs.clear_bits(b.flag.addr, b.flag.mask);
}

pub fn flag<R: Registers>(regs: &mut R, source: Source) -> bool {
    let b = source.bits();
    regs.read_bit(b.flag.addr, b.flag.mask)
}

/// Priority level the CPU would vector `source` at right now, or `None` if
/// it is not pending, not enabled or masked by the global enables.
pub fn active<R: Registers>(regs: &mut R, source: Source) -> Option<Priority> {
    let b = source.bits();
    if !regs.read_bit(b.flag.addr, b.flag.mask) || !regs.read_bit(b.enable.addr, b.enable.mask) {
        return None;
    }
    let intcon = Intcon::from_bits_retain(regs.read(INTCON));
    if regs.read_bit(RCON, Rcon::IPEN.bits()) {
        let high = match b.priority {
            Some(pb) => regs.read_bit(pb.addr, pb.mask),
            None => true,
        };
        match (high, intcon.contains(Intcon::GIEH), intcon.contains(Intcon::GIEL)) {
            (true, true, _) => Some(Priority::High),
            (false, true, true) => Some(Priority::Low),
            _ => None,
        }
    } else {
        let allowed = intcon.contains(Intcon::GIE) && (!b.peripheral || intcon.contains(Intcon::PEIE));
        allowed.then_some(Priority::High)
    }
}

/// Interrupt handler. It receives the register file so it can drive the
/// peripheral that raised it.
pub type Handler<R> = Box<dyn FnMut(&mut R)>;

/// Handler table, one slot per source.
pub struct InterruptManager<R> {
    handlers: Vec<(Source, Handler<R>)>,
}

impl<R: Registers> InterruptManager<R> {
    pub fn new() -> Self {
        InterruptManager { handlers: Vec::new() }
    }

    /// Install `handler` for `source`, replacing any previous one.
    pub fn set_handler(&mut self, source: Source, handler: Handler<R>) {
        self.remove_handler(source);
        self.handlers.push((source, handler));
    }

    pub fn remove_handler(&mut self, source: Source) -> bool {
        let before = self.handlers.len();
        self.handlers.retain(|(s, _)| *s != source);
        before != self.handlers.len()
    }

    pub fn has_handler(&self, source: Source) -> bool {
        self.handlers.iter().any(|(s, _)| *s == source)
    }

    /// Run every active source once, high priority first. Returns the
    /// number of sources serviced.
    pub fn service(&mut self, regs: &mut R) -> usize {
        let mut serviced = 0;
        for level in [Priority::High, Priority::Low] {
            for source in Source::ALL {
                if active(regs, source) != Some(level) {
                    continue;
                }
                clear_flag(regs, source);
                if let Some((_, h)) = self.handlers.iter_mut().find(|(s, _)| *s == source) {
                    h(regs);
                }
                log::trace!("irq: serviced {:?} ({:?})", source, level);
                serviced += 1;
            }
        }
        serviced
    }
}

impl<R: Registers> Default for InterruptManager<R> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Pic18;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[test]
    fn test_enable_without_priority() {
        let mut pic = Pic18::new();
        pic.write_data(PIR1, Pir1::ADIF.bits());
        enable(&mut pic, Source::Adc, Irq::Enabled);
        assert_eq!(pic.read_data(PIR1) & Pir1::ADIF.bits(), 0);
        assert_ne!(pic.read_data(PIE1) & Pir1::ADIF.bits(), 0);
        let intcon = pic.read_data(INTCON);
        assert_eq!(intcon & 0xC0, 0xC0);
        assert_eq!(pic.read_data(RCON) & Rcon::IPEN.bits(), 0);
    }

    #[test]
    fn test_enable_low_priority() {
        let mut pic = Pic18::new();
        enable(&mut pic, Source::Tmr3, Irq::Priority(Priority::Low));
        assert_ne!(pic.read_data(RCON) & Rcon::IPEN.bits(), 0);
        assert_eq!(pic.read_data(IPR2) & Pir2::TMR3IF.bits(), 0);
        pic.write_data(PIR2, Pir2::TMR3IF.bits());
        assert_eq!(active(&mut pic, Source::Tmr3), Some(Priority::Low));
        pic.clear_bits(INTCON, Intcon::GIEL.bits());
        assert_eq!(active(&mut pic, Source::Tmr3), None);
    }

    #[test]
    fn test_peripheral_needs_peie() {
        let mut pic = Pic18::new();
        enable(&mut pic, Source::Ccp1, Irq::Enabled);
        pic.clear_bits(INTCON, Intcon::PEIE.bits());
        pic.set_bits(PIR1, Pir1::CCP1IF.bits());
        assert_eq!(active(&mut pic, Source::Ccp1), None);
        pic.set_bits(INTCON, Intcon::PEIE.bits());
        assert_eq!(active(&mut pic, Source::Ccp1), Some(Priority::High));
    }

    #[test]
    fn test_service_order_and_flag_clear() {
        let mut pic = Pic18::new();
        let mut mgr: InterruptManager<Pic18> = InterruptManager::new();
        let log = Rc::new(RefCell::new(Vec::new()));
        for (src, p) in [(Source::Adc, Priority::Low), (Source::Tmr1, Priority::High)] {
            enable(&mut pic, src, Irq::Priority(p));
            let log = log.clone();
            mgr.set_handler(src, Box::new(move |regs: &mut Pic18| {
                // flag is already clear when the handler runs
                assert!(!flag(regs, src));
                log.borrow_mut().push(src);
            }));
        }
        pic.set_bits(PIR1, (Pir1::ADIF | Pir1::TMR1IF).bits());
        assert_eq!(mgr.service(&mut pic), 2);
        assert_eq!(*log.borrow(), vec![Source::Tmr1, Source::Adc]);
        assert_eq!(mgr.service(&mut pic), 0);
    }

    #[test]
    fn test_disabled_source_not_serviced() {
        let mut pic = Pic18::new();
        let mut mgr: InterruptManager<Pic18> = InterruptManager::new();
        enable(&mut pic, Source::Ssp, Irq::Enabled);
        disable(&mut pic, Source::Ssp);
        pic.set_bits(PIR1, Pir1::SSPIF.bits());
        assert_eq!(mgr.service(&mut pic), 0);
        assert!(flag(&mut pic, Source::Ssp));
    }
}
