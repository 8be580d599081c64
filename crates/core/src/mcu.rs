//! Register file plus interrupt dispatcher.

use crate::hal::interrupt::{self, Handler, InterruptManager, Irq, Source};
use crate::regs::Registers;
use crate::Pic18;

/// A register backend together with the handlers of its interrupt sources.
///
/// Drivers that only touch registers accept any [`Registers`], including
/// `Mcu`. Drivers that install an interrupt handler (servo, I2C slave) take
/// the `Mcu` itself.
pub struct Mcu<R: Registers> {
    pub regs: R,
    interrupts: InterruptManager<R>,
}

impl<R: Registers> Mcu<R> {
    pub fn new(regs: R) -> Self {
        Mcu { regs, interrupts: InterruptManager::new() }
    }

    /// Enable `source` as `irq` describes and install its handler.
    pub fn attach<F>(&mut self, source: Source, irq: Irq, handler: F)
    where
        F: FnMut(&mut R) + 'static,
    {
        let irq = if irq == Irq::Disabled { Irq::Enabled } else { irq };
        self.interrupts.set_handler(source, Box::new(handler) as Handler<R>);
        interrupt::enable(&mut self.regs, source, irq);
    }

    /// Disable `source` and drop its handler.
    pub fn detach(&mut self, source: Source) {
        interrupt::disable(&mut self.regs, source);
        self.interrupts.remove_handler(source);
    }

    pub fn has_handler(&self, source: Source) -> bool {
        self.interrupts.has_handler(source)
    }

    /// Run the handlers of every pending interrupt. Returns the number of
    /// sources serviced.
    pub fn service_interrupts(&mut self) -> usize {
        let Mcu { regs, interrupts } = self;
        interrupts.service(regs)
    }

    pub fn into_inner(self) -> R {
        self.regs
    }
}

impl<R: Registers> Registers for Mcu<R> {
    #[inline]
    fn read(&mut self, addr: u16) -> u8 {
        self.regs.read(addr)
    }

    #[inline]
    fn write(&mut self, addr: u16, value: u8) {
        self.regs.write(addr, value)
    }
}

impl Mcu<Pic18> {
    /// Advance the simulated chip `cycles` instruction cycles, servicing
    /// interrupts after each one.
    pub fn run(&mut self, cycles: u64) {
        for _ in 0..cycles {
            self.regs.step();
            self.service_interrupts();
        }
    }
}
