//! 10-bit analog-to-digital converter model.
//!
//! Setting GO/DONE while ADON is set performs an instant conversion of the
//! selected channel from [`Adc::inputs`]. The result is justified according
//! to ADCON2.ADFM, GO/DONE is cleared and PIR1.ADIF is raised. Channels that
//! ADCON1.PCFG configures as digital convert as 0.

use crate::sfr::{Adcon0, Pir1, ADCON0, ADCON0_CHS, ADCON1, ADCON1_PCFG, ADCON2, ADCON2_ADFM, ADRESH, ADRESL, PIR1};

/// Number of analog channels (AN0..AN12).
pub const ADC_CHANNELS: usize = 13;

pub struct Adc {
    /// Analog level per channel, 0..=1023.
    pub inputs: [u16; ADC_CHANNELS],
    /// Completed conversions since reset.
    pub conversions: u64,
}

impl Adc {
    pub fn new() -> Self {
        Adc { inputs: [0; ADC_CHANNELS], conversions: 0 }
    }

    pub fn reset(&mut self) {
        self.conversions = 0;
    }

    /// Returns true if addr was handled
    pub fn write(&mut self, addr: u16, value: u8, data: &mut [u8]) -> bool {
        if addr == ADCON0 {
            data[ADCON0 as usize] = value;
            let go = Adcon0::GO_DONE.bits() | Adcon0::ADON.bits();
            if value & go == go {
                self.convert(data);
            }
            return true;
        }
        false
    }

    /// Run one conversion if the converter is on (CCP2 special event trigger).
    pub fn trigger(&mut self, data: &mut [u8]) {
        if data[ADCON0 as usize] & Adcon0::ADON.bits() != 0 {
            self.convert(data);
        }
    }

    fn convert(&mut self, data: &mut [u8]) {
        let ch = ADCON0_CHS.get(data[ADCON0 as usize]) as usize;
        let value = if ch < ADC_CHANNELS && is_analog(ADCON1_PCFG.get(data[ADCON1 as usize]), ch) {
            self.inputs[ch].min(0x3FF)
        } else {
            0
        };
        if ADCON2_ADFM.get(data[ADCON2 as usize]) != 0 {
            data[ADRESH as usize] = (value >> 8) as u8;
            data[ADRESL as usize] = (value & 0xFF) as u8;
        } else {
            data[ADRESH as usize] = (value >> 2) as u8;
            data[ADRESL as usize] = ((value & 0x03) << 6) as u8;
        }
        data[ADCON0 as usize] &= !Adcon0::GO_DONE.bits();
        data[PIR1 as usize] |= Pir1::ADIF.bits();
        self.conversions += 1;
        log::trace!("adc: AN{} -> {}", ch, value);
    }

    pub fn save_state(&self) -> crate::savestate::AdcState {
        crate::savestate::AdcState { inputs: self.inputs.to_vec(), conversions: self.conversions }
    }

    pub fn load_state(&mut self, s: &crate::savestate::AdcState) {
        for (dst, src) in self.inputs.iter_mut().zip(&s.inputs) {
            *dst = *src;
        }
        self.conversions = s.conversions;
    }
}

/// PCFG 0x0E makes AN0 analog, each step down adds one channel; 0x00 and
/// 0x01 make all thirteen analog, 0x0F none.
fn is_analog(pcfg: u8, ch: usize) -> bool {
    let count = match pcfg {
        0x00 | 0x01 => ADC_CHANNELS,
        p => 15 - p as usize,
    };
    ch < count
}

#[cfg(test)]
mod tests {
    use super::*;

    fn data() -> Vec<u8> {
        vec![0u8; 0x1000]
    }

    #[test]
    fn test_right_justified() {
        let mut d = data();
        let mut adc = Adc::new();
        adc.inputs[3] = 0x2AB;
        d[ADCON1 as usize] = 0x0B; // AN0..AN3 analog
        d[ADCON2 as usize] = 0x80;
        adc.write(ADCON0, (3 << 2) | 0x03, &mut d);
        assert_eq!(d[ADRESH as usize], 0x02);
        assert_eq!(d[ADRESL as usize], 0xAB);
        assert_eq!(d[ADCON0 as usize] & 0x02, 0);
        assert_ne!(d[PIR1 as usize] & Pir1::ADIF.bits(), 0);
    }

    #[test]
    fn test_left_justified() {
        let mut d = data();
        let mut adc = Adc::new();
        adc.inputs[0] = 0x3FF;
        d[ADCON1 as usize] = 0x0E;
        adc.write(ADCON0, 0x03, &mut d);
        assert_eq!(d[ADRESH as usize], 0xFF);
        assert_eq!(d[ADRESL as usize], 0xC0);
    }

    #[test]
    fn test_digital_channel_reads_zero() {
        let mut d = data();
        let mut adc = Adc::new();
        adc.inputs[5] = 500;
        d[ADCON1 as usize] = 0x0E; // only AN0 analog
        d[ADCON2 as usize] = 0x80;
        adc.write(ADCON0, (5 << 2) | 0x03, &mut d);
        assert_eq!(d[ADRESH as usize], 0);
        assert_eq!(d[ADRESL as usize], 0);
    }

    #[test]
    fn test_no_conversion_when_off() {
        let mut d = data();
        let mut adc = Adc::new();
        adc.write(ADCON0, 0x02, &mut d);
        assert_eq!(adc.conversions, 0);
        assert_eq!(d[ADCON0 as usize], 0x02);
    }
}
