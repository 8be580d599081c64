//! PIC18F4620 special function register map.
//!
//! Addresses are data-space addresses (the SFR window is 0xF80..=0xFFF).
//! Flag registers are `bitflags` types so drivers can write
//! `PIR1::ADIF.bits()` instead of magic masks; multi-bit fields are
//! `(mask, shift)` pairs used with [`crate::Registers::write_field`].

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

/// First SFR address.
pub const SFR_BASE: u16 = 0xF80;
/// Number of SFR addresses.
pub const SFR_SIZE: usize = 128;

// Ports
pub const PORTA: u16 = 0xF80;
pub const PORTB: u16 = 0xF81;
pub const PORTC: u16 = 0xF82;
pub const PORTD: u16 = 0xF83;
pub const PORTE: u16 = 0xF84;
pub const LATA: u16 = 0xF89;
pub const LATB: u16 = 0xF8A;
pub const LATC: u16 = 0xF8B;
pub const LATD: u16 = 0xF8C;
pub const LATE: u16 = 0xF8D;
pub const TRISA: u16 = 0xF92;
pub const TRISB: u16 = 0xF93;
pub const TRISC: u16 = 0xF94;
pub const TRISD: u16 = 0xF95;
pub const TRISE: u16 = 0xF96;

// Peripheral interrupt registers
pub const PIE1: u16 = 0xF9D;
pub const PIR1: u16 = 0xF9E;
pub const IPR1: u16 = 0xF9F;
pub const PIE2: u16 = 0xFA0;
pub const PIR2: u16 = 0xFA1;
pub const IPR2: u16 = 0xFA2;

// Data EEPROM
pub const EECON1: u16 = 0xFA6;
pub const EECON2: u16 = 0xFA7;
pub const EEDATA: u16 = 0xFA8;
pub const EEADR: u16 = 0xFA9;
pub const EEADRH: u16 = 0xFAA;

// Timer3
pub const T3CON: u16 = 0xFB1;
pub const TMR3L: u16 = 0xFB2;
pub const TMR3H: u16 = 0xFB3;

// CCP
pub const CCP2CON: u16 = 0xFBA;
pub const CCPR2L: u16 = 0xFBB;
pub const CCPR2H: u16 = 0xFBC;
pub const CCP1CON: u16 = 0xFBD;
pub const CCPR1L: u16 = 0xFBE;
pub const CCPR1H: u16 = 0xFBF;

// ADC
pub const ADCON2: u16 = 0xFC0;
pub const ADCON1: u16 = 0xFC1;
pub const ADCON0: u16 = 0xFC2;
pub const ADRESL: u16 = 0xFC3;
pub const ADRESH: u16 = 0xFC4;

// MSSP
pub const SSPCON2: u16 = 0xFC5;
pub const SSPCON1: u16 = 0xFC6;
pub const SSPSTAT: u16 = 0xFC7;
pub const SSPADD: u16 = 0xFC8;
pub const SSPBUF: u16 = 0xFC9;

// Timer2
pub const T2CON: u16 = 0xFCA;
pub const PR2: u16 = 0xFCB;
pub const TMR2: u16 = 0xFCC;

// Timer1
pub const T1CON: u16 = 0xFCD;
pub const TMR1L: u16 = 0xFCE;
pub const TMR1H: u16 = 0xFCF;

pub const RCON: u16 = 0xFD0;

pub const INTCON3: u16 = 0xFF0;
pub const INTCON2: u16 = 0xFF1;
pub const INTCON: u16 = 0xFF2;

bitflags! {
    /// INTCON. GIE/PEIE double as GIEH/GIEL when `RCON.IPEN` is set.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Intcon: u8 {
        const GIE = 1 << 7;
        const PEIE = 1 << 6;
        const TMR0IE = 1 << 5;
        const INT0IE = 1 << 4;
        const RBIE = 1 << 3;
        const TMR0IF = 1 << 2;
        const INT0IF = 1 << 1;
        const RBIF = 1 << 0;
    }
}

impl Intcon {
    pub const GIEH: Intcon = Intcon::GIE;
    pub const GIEL: Intcon = Intcon::PEIE;
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Rcon: u8 {
        const IPEN = 1 << 7;
    }
}

bitflags! {
    /// Layout shared by PIR1, PIE1 and IPR1.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Pir1: u8 {
        const PSPIF = 1 << 7;
        const ADIF = 1 << 6;
        const RCIF = 1 << 5;
        const TXIF = 1 << 4;
        const SSPIF = 1 << 3;
        const CCP1IF = 1 << 2;
        const TMR2IF = 1 << 1;
        const TMR1IF = 1 << 0;
    }
}

bitflags! {
    /// Layout shared by PIR2, PIE2 and IPR2.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Pir2: u8 {
        const OSCFIF = 1 << 7;
        const CMIF = 1 << 6;
        const EEIF = 1 << 4;
        const BCLIF = 1 << 3;
        const HLVDIF = 1 << 2;
        const TMR3IF = 1 << 1;
        const CCP2IF = 1 << 0;
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Eecon1: u8 {
        const EEPGD = 1 << 7;
        const CFGS = 1 << 6;
        const FREE = 1 << 4;
        const WRERR = 1 << 3;
        const WREN = 1 << 2;
        const WR = 1 << 1;
        const RD = 1 << 0;
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Adcon0: u8 {
        const GO_DONE = 1 << 1;
        const ADON = 1 << 0;
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Sspstat: u8 {
        const SMP = 1 << 7;
        const CKE = 1 << 6;
        const D_A = 1 << 5;
        const P = 1 << 4;
        const S = 1 << 3;
        const R_W = 1 << 2;
        const UA = 1 << 1;
        const BF = 1 << 0;
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Sspcon1: u8 {
        const WCOL = 1 << 7;
        const SSPOV = 1 << 6;
        const SSPEN = 1 << 5;
        const CKP = 1 << 4;
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Sspcon2: u8 {
        const GCEN = 1 << 7;
        const ACKSTAT = 1 << 6;
        const ACKDT = 1 << 5;
        const ACKEN = 1 << 4;
        const RCEN = 1 << 3;
        const PEN = 1 << 2;
        const RSEN = 1 << 1;
        const SEN = 1 << 0;
    }
}

bitflags! {
    /// T1CON and T3CON share the enable/clock bits; T3CCPx only exist in T3CON.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct TxCon: u8 {
        const RD16 = 1 << 7;
        const T3CCP2 = 1 << 6;
        const T3CCP1 = 1 << 3;
        const SYNC = 1 << 2;
        const TMRCS = 1 << 1;
        const TMRON = 1 << 0;
    }
}

/// A multi-bit register field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Field {
    pub mask: u8,
    pub shift: u8,
}

impl Field {
    pub const fn new(mask: u8, shift: u8) -> Self {
        Field { mask, shift }
    }

    #[inline]
    pub const fn get(self, reg: u8) -> u8 {
        (reg & self.mask) >> self.shift
    }
}

/// ADCON0 channel select.
pub const ADCON0_CHS: Field = Field::new(0x3C, 2);
/// ADCON1 voltage reference bits (VCFG1:VCFG0).
pub const ADCON1_VCFG: Field = Field::new(0x30, 4);
/// ADCON1 port configuration.
pub const ADCON1_PCFG: Field = Field::new(0x0F, 0);
/// ADCON2 result format (1 = right justified).
pub const ADCON2_ADFM: Field = Field::new(0x80, 7);
pub const ADCON2_ACQT: Field = Field::new(0x38, 3);
pub const ADCON2_ADCS: Field = Field::new(0x07, 0);
pub const SSPCON1_SSPM: Field = Field::new(0x0F, 0);
/// CCPxCON PWM duty LSBs.
pub const CCPCON_DCB: Field = Field::new(0x30, 4);
pub const CCPCON_MODE: Field = Field::new(0x0F, 0);
pub const TXCON_CKPS: Field = Field::new(0x30, 4);
pub const T2CON_TOUTPS: Field = Field::new(0x78, 3);
pub const T2CON_TMR2ON: Field = Field::new(0x04, 2);
pub const T2CON_CKPS: Field = Field::new(0x03, 0);

/// GPIO port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Port {
    A,
    B,
    C,
    D,
    E,
}

impl Port {
    pub const ALL: [Port; 5] = [Port::A, Port::B, Port::C, Port::D, Port::E];

    /// Index 0..=4, also the offset of the port inside each register bank.
    #[inline]
    pub const fn index(self) -> usize {
        self as usize
    }

    #[inline]
    pub const fn port(self) -> u16 {
        PORTA + self as u16
    }

    #[inline]
    pub const fn lat(self) -> u16 {
        LATA + self as u16
    }

    #[inline]
    pub const fn tris(self) -> u16 {
        TRISA + self as u16
    }

    /// Number of implemented pins (RE has RE0..RE2 as I/O).
    #[inline]
    pub const fn width(self) -> u8 {
        match self {
            Port::E => 3,
            _ => 8,
        }
    }

    /// Reverse lookup from a PORT, LAT or TRIS address.
    pub fn from_addr(addr: u16) -> Option<Port> {
        let base = match addr {
            PORTA..=PORTE => PORTA,
            LATA..=LATE => LATA,
            TRISA..=TRISE => TRISA,
            _ => return None,
        };
        Some(Port::ALL[(addr - base) as usize])
    }
}

impl std::fmt::Display for Port {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let c = match self {
            Port::A => 'A',
            Port::B => 'B',
            Port::C => 'C',
            Port::D => 'D',
            Port::E => 'E',
        };
        write!(f, "R{}", c)
    }
}

/// Named registers, used by the debugger dump and watchpoint listing.
pub const NAMES: &[(u16, &str)] = &[
    (PORTA, "PORTA"), (PORTB, "PORTB"), (PORTC, "PORTC"), (PORTD, "PORTD"), (PORTE, "PORTE"),
    (LATA, "LATA"), (LATB, "LATB"), (LATC, "LATC"), (LATD, "LATD"), (LATE, "LATE"),
    (TRISA, "TRISA"), (TRISB, "TRISB"), (TRISC, "TRISC"), (TRISD, "TRISD"), (TRISE, "TRISE"),
    (PIE1, "PIE1"), (PIR1, "PIR1"), (IPR1, "IPR1"),
    (PIE2, "PIE2"), (PIR2, "PIR2"), (IPR2, "IPR2"),
    (EECON1, "EECON1"), (EECON2, "EECON2"), (EEDATA, "EEDATA"),
    (EEADR, "EEADR"), (EEADRH, "EEADRH"),
    (T3CON, "T3CON"), (TMR3L, "TMR3L"), (TMR3H, "TMR3H"),
    (CCP2CON, "CCP2CON"), (CCPR2L, "CCPR2L"), (CCPR2H, "CCPR2H"),
    (CCP1CON, "CCP1CON"), (CCPR1L, "CCPR1L"), (CCPR1H, "CCPR1H"),
    (ADCON2, "ADCON2"), (ADCON1, "ADCON1"), (ADCON0, "ADCON0"),
    (ADRESL, "ADRESL"), (ADRESH, "ADRESH"),
    (SSPCON2, "SSPCON2"), (SSPCON1, "SSPCON1"), (SSPSTAT, "SSPSTAT"),
    (SSPADD, "SSPADD"), (SSPBUF, "SSPBUF"),
    (T2CON, "T2CON"), (PR2, "PR2"), (TMR2, "TMR2"),
    (T1CON, "T1CON"), (TMR1L, "TMR1L"), (TMR1H, "TMR1H"),
    (RCON, "RCON"),
    (INTCON3, "INTCON3"), (INTCON2, "INTCON2"), (INTCON, "INTCON"),
];

/// Resolve an SFR address to its name.
pub fn name(addr: u16) -> Option<&'static str> {
    NAMES.iter().find(|(a, _)| *a == addr).map(|(_, n)| *n)
}
