//! # ARM7TDMI Operating Modes
//!
//! The ARM7TDMI has seven operating modes, stored in bits 0-4 of the CPSR:
//!
//! ```text
//! ┌─────────────┬──────────┬───────────────────────────────────────────────┐
//! │    Mode     │  Binary  │                  Purpose                      │
//! ├─────────────┼──────────┼───────────────────────────────────────────────┤
//! │ User        │  10000   │ Normal program execution (unprivileged)       │
//! │ FIQ         │  10001   │ Fast interrupt handling                       │
//! │ IRQ         │  10010   │ General interrupt handling                    │
//! │ Supervisor  │  10011   │ Protected mode for BIOS calls (SWI)           │
//! │ Abort       │  10111   │ Memory access failures                        │
//! │ Undefined   │  11011   │ Undefined instruction handling                │
//! │ System      │  11111   │ Privileged mode sharing User registers        │
//! └─────────────┴──────────┴───────────────────────────────────────────────┘
//! ```
//!
//! Each exception mode has its own banked SP/LR (FIQ also banks R8-R12)
//! and an SPSR slot that receives the CPSR on exception entry. User and
//! System share one register bank and have no SPSR.

use serde::{Deserialize, Serialize};

/// The CPU operating mode, as encoded in CPSR bits 4..0.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Serialize, Deserialize)]
pub enum Mode {
    /// Normal program execution (unprivileged). Games run here after the
    /// BIOS hands over control.
    User = 0b10000,

    /// Fast Interrupt Request. Banks R8-R14 so the handler gets scratch
    /// registers for free. Unused on the GBA (no external FIQ source).
    Fiq = 0b10001,

    /// Interrupt Request: `VBlank`, `HBlank`, timers, DMA, keypad.
    Irq = 0b10010,

    /// Supervisor: entered via Reset or the SWI instruction (BIOS calls).
    Supervisor = 0b10011,

    /// Abort: failed data access or instruction fetch. On the GBA this
    /// usually means a bug, there is no virtual memory.
    Abort = 0b10111,

    /// Undefined instruction.
    Undefined = 0b11011,

    /// Privileged mode that shares the User register bank.
    System = 0b11111,
}

impl Mode {
    /// Whether this mode has a banked SPSR. User and System do not: there
    /// is no exception to return from.
    #[must_use]
    pub const fn has_spsr(self) -> bool {
        !matches!(self, Self::User | Self::System)
    }

    /// Index of this mode's SP/LR bank slot. System aliases User.
    #[must_use]
    pub const fn bank_index(self) -> usize {
        match self {
            Self::User | Self::System => 0,
            Self::Fiq => 1,
            Self::Irq => 2,
            Self::Supervisor => 3,
            Self::Abort => 4,
            Self::Undefined => 5,
        }
    }

    /// Index of this mode's SPSR slot, for the five exception modes.
    #[must_use]
    pub const fn spsr_index(self) -> Option<usize> {
        match self {
            Self::User | Self::System => None,
            Self::Fiq => Some(0),
            Self::Irq => Some(1),
            Self::Supervisor => Some(2),
            Self::Abort => Some(3),
            Self::Undefined => Some(4),
        }
    }
}

impl From<Mode> for u32 {
    fn from(m: Mode) -> Self {
        m as Self
    }
}

impl TryFrom<u32> for Mode {
    type Error = String;

    fn try_from(n: u32) -> Result<Self, Self::Error> {
        match n {
            0b10000 => Ok(Self::User),
            0b10001 => Ok(Self::Fiq),
            0b10010 => Ok(Self::Irq),
            0b10011 => Ok(Self::Supervisor),
            0b10111 => Ok(Self::Abort),
            0b11011 => Ok(Self::Undefined),
            0b11111 => Ok(Self::System),
            _ => Err(format!("Unexpected value for Mode: {n:#07b}")),
        }
    }
}

impl std::fmt::Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::User => f.write_str("USR"),
            Self::Fiq => f.write_str("FIQ"),
            Self::Irq => f.write_str("IRQ"),
            Self::Supervisor => f.write_str("SVC"),
            Self::Abort => f.write_str("ABT"),
            Self::Undefined => f.write_str("UND"),
            Self::System => f.write_str("SYS"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mode_roundtrip() {
        for mode in [
            Mode::User,
            Mode::Fiq,
            Mode::Irq,
            Mode::Supervisor,
            Mode::Abort,
            Mode::Undefined,
            Mode::System,
        ] {
            assert_eq!(Mode::try_from(u32::from(mode)), Ok(mode));
        }
    }

    #[test]
    fn invalid_mode_bits() {
        assert!(Mode::try_from(0).is_err());
        assert!(Mode::try_from(0b10100).is_err());
        assert!(Mode::try_from(0b11110).is_err());
    }

    #[test]
    fn spsr_presence() {
        assert!(!Mode::User.has_spsr());
        assert!(!Mode::System.has_spsr());
        assert!(Mode::Fiq.has_spsr());
        assert!(Mode::Irq.has_spsr());
        assert!(Mode::Supervisor.has_spsr());
    }

    #[test]
    fn system_shares_user_bank() {
        assert_eq!(Mode::System.bank_index(), Mode::User.bank_index());
        assert_ne!(Mode::Irq.bank_index(), Mode::User.bank_index());
    }
}
