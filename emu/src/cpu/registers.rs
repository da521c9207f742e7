//! # ARM7TDMI Register File
//!
//! Sixteen registers are visible at any time, but some are different
//! physical registers depending on the mode ("register banking"):
//!
//! ```text
//! ┌──────────┬─────────────────────────────────────────────────────────────────┐
//! │ Register │ Banking                                                         │
//! ├──────────┼─────────────────────────────────────────────────────────────────┤
//! │ R0-R7    │ Never banked.                                                   │
//! │ R8-R12   │ Banked only in FIQ mode.                                        │
//! │ R13 (SP) │ Banked in every exception mode (System shares User's).          │
//! │ R14 (LR) │ Banked in every exception mode (System shares User's).          │
//! │ R15 (PC) │ Never banked; writes are masked to the instruction alignment.   │
//! └──────────┴─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Banking is what makes interrupts transparent: when an IRQ fires, the
//! handler gets its own SP/LR and cannot corrupt the interrupted code's.
//!
//! The storage is flat: one array per bank, indexed through
//! [`Mode::bank_index`]. No swapping happens on a mode switch; `get`/`set`
//! route to the right slot on every access.
//!
//! ## Flag cache
//!
//! N/Z/C/V and I/F/T are kept as plain `bool`s because nearly every ALU
//! instruction touches them. The packed CPSR is materialized on demand by
//! [`CpuRegisters::cpsr`] and unpacked again by [`CpuRegisters::set_cpsr`];
//! those are the only crossings between the two representations.

use serde::{Deserialize, Serialize};

use crate::cpu::condition::Condition;
use crate::cpu::cpu_modes::Mode;
use crate::cpu::psr::Psr;

/// Stack Pointer register index.
pub const REG_SP: u32 = 13;

/// Link Register index (return address for subroutines).
pub const REG_LR: u32 = 14;

/// Program Counter register index.
pub const REG_PC: u32 = 15;

/// Initial SP values set up by the BIOS before a cartridge boots.
const RESET_SP_USER: u32 = 0x0300_7F00;
const RESET_SP_IRQ: u32 = 0x0300_7FA0;
const RESET_SP_SUPERVISOR: u32 = 0x0300_7FE0;

/// Address of the first game pak ROM instruction.
const RESET_PC: u32 = 0x0800_0000;

#[allow(clippy::struct_excessive_bools)]
#[derive(Serialize, Deserialize)]
pub struct CpuRegisters {
    // R0-R7, shared by every mode.
    common: [u32; 8],

    // R8-R12 have two banks: FIQ and everyone else.
    r8_12_user: [u32; 5],
    r8_12_fiq: [u32; 5],

    // R13/R14 slots indexed by `Mode::bank_index`.
    r13: [u32; 6],
    r14: [u32; 6],

    r15: u32,

    // SPSR slots indexed by `Mode::spsr_index`.
    spsr: [Psr; 5],

    // Decoded CPSR (the flag cache).
    sign: bool,
    zero: bool,
    carry: bool,
    overflow: bool,
    irq_disable: bool,
    fiq_disable: bool,
    thumb_state: bool,
    mode: Mode,

    // CPSR bits 27..8 carry no meaning on the ARM7TDMI but must survive
    // an MSR/MRS round trip unchanged.
    reserved_bits: u32,
}

impl Default for CpuRegisters {
    fn default() -> Self {
        Self {
            common: [0; 8],
            r8_12_user: [0; 5],
            r8_12_fiq: [0; 5],
            r13: [0; 6],
            r14: [0; 6],
            r15: 0,
            spsr: [Psr::default(); 5],
            sign: false,
            zero: false,
            carry: false,
            overflow: false,
            irq_disable: true,
            fiq_disable: true,
            thumb_state: false,
            mode: Mode::System,
            reserved_bits: 0,
        }
    }
}

impl CpuRegisters {
    /// Put every register back into the post-BIOS boot state: GPRs zero,
    /// the three stacks the BIOS prepares, PC at the cartridge entry
    /// point, System mode with IRQ and FIQ masked, ARM state.
    pub fn reset(&mut self) {
        *self = Self::default();

        self.r13[Mode::User.bank_index()] = RESET_SP_USER;
        self.r13[Mode::Irq.bank_index()] = RESET_SP_IRQ;
        self.r13[Mode::Supervisor.bank_index()] = RESET_SP_SUPERVISOR;
        self.r15 = RESET_PC;
    }

    /// Read a register as seen from the current mode.
    #[must_use]
    pub fn get(&self, reg: u32) -> u32 {
        debug_assert!(reg <= 15, "invalid register index: {reg}");

        match reg {
            0..=7 => self.common[reg as usize],
            8..=12 => {
                if self.mode == Mode::Fiq {
                    self.r8_12_fiq[reg as usize - 8]
                } else {
                    self.r8_12_user[reg as usize - 8]
                }
            }
            REG_SP => self.r13[self.mode.bank_index()],
            REG_LR => self.r14[self.mode.bank_index()],
            _ => self.r15,
        }
    }

    /// Write a register as seen from the current mode. Writes to R15 drop
    /// bit 0 in Thumb state and bits 1..0 in ARM state.
    pub fn set(&mut self, reg: u32, value: u32) {
        debug_assert!(reg <= 15, "invalid register index: {reg}");

        match reg {
            0..=7 => self.common[reg as usize] = value,
            8..=12 => {
                if self.mode == Mode::Fiq {
                    self.r8_12_fiq[reg as usize - 8] = value;
                } else {
                    self.r8_12_user[reg as usize - 8] = value;
                }
            }
            REG_SP => self.r13[self.mode.bank_index()] = value,
            REG_LR => self.r14[self.mode.bank_index()] = value,
            _ => {
                self.r15 = if self.thumb_state {
                    value & !1
                } else {
                    value & !3
                };
            }
        }
    }

    #[must_use]
    pub const fn pc(&self) -> u32 {
        self.r15
    }

    pub fn set_pc(&mut self, value: u32) {
        self.set(REG_PC, value);
    }

    /// Advance PC past a just-fetched instruction without alignment
    /// masking (the fetch addresses are already aligned).
    pub fn advance_pc(&mut self, instruction_size: u32) {
        self.r15 = self.r15.wrapping_add(instruction_size);
    }

    #[must_use]
    pub fn sp(&self) -> u32 {
        self.get(REG_SP)
    }

    pub fn set_sp(&mut self, value: u32) {
        self.set(REG_SP, value);
    }

    #[must_use]
    pub fn lr(&self) -> u32 {
        self.get(REG_LR)
    }

    pub fn set_lr(&mut self, value: u32) {
        self.set(REG_LR, value);
    }

    // ===== CPSR / SPSR =====

    /// Materialize the packed CPSR from the flag cache.
    #[must_use]
    pub fn cpsr(&self) -> Psr {
        let mut psr = Psr::from(self.reserved_bits);
        psr.set_sign_flag(self.sign);
        psr.set_zero_flag(self.zero);
        psr.set_carry_flag(self.carry);
        psr.set_overflow_flag(self.overflow);
        psr.set_irq_disable(self.irq_disable);
        psr.set_fiq_disable(self.fiq_disable);
        psr.set_state_bit(self.thumb_state);
        psr.set_mode(self.mode);

        psr
    }

    /// Unpack a full CPSR value into the cache. An invalid mode field
    /// keeps the current mode (MSR with garbage mode bits is a no-op on
    /// the mode, matching the observed behavior of the hardware source).
    pub fn set_cpsr(&mut self, psr: Psr) {
        self.sign = psr.sign_flag();
        self.zero = psr.zero_flag();
        self.carry = psr.carry_flag();
        self.overflow = psr.overflow_flag();
        self.irq_disable = psr.irq_disable();
        self.fiq_disable = psr.fiq_disable();
        self.thumb_state = psr.state_bit();
        self.reserved_bits = u32::from(psr) & 0x0FFF_FF00;

        if let Some(mode) = psr.mode() {
            self.mode = mode;
        }
    }

    /// The current mode's SPSR. In User/System, which have none, reads
    /// return the live CPSR instead.
    #[must_use]
    pub fn spsr(&self) -> Psr {
        match self.mode.spsr_index() {
            Some(idx) => self.spsr[idx],
            None => self.cpsr(),
        }
    }

    /// Write the current mode's SPSR; no-op in User/System.
    pub fn set_spsr(&mut self, psr: Psr) {
        if let Some(idx) = self.mode.spsr_index() {
            self.spsr[idx] = psr;
        }
    }

    // ===== Flag cache accessors =====

    #[must_use]
    pub const fn sign_flag(&self) -> bool {
        self.sign
    }

    #[must_use]
    pub const fn zero_flag(&self) -> bool {
        self.zero
    }

    #[must_use]
    pub const fn carry_flag(&self) -> bool {
        self.carry
    }

    #[must_use]
    pub const fn overflow_flag(&self) -> bool {
        self.overflow
    }

    pub fn set_carry_flag(&mut self, value: bool) {
        self.carry = value;
    }

    pub fn set_overflow_flag(&mut self, value: bool) {
        self.overflow = value;
    }

    #[must_use]
    pub const fn irq_disabled(&self) -> bool {
        self.irq_disable
    }

    pub fn set_irq_disabled(&mut self, value: bool) {
        self.irq_disable = value;
    }

    #[must_use]
    pub const fn fiq_disabled(&self) -> bool {
        self.fiq_disable
    }

    pub fn set_fiq_disabled(&mut self, value: bool) {
        self.fiq_disable = value;
    }

    #[must_use]
    pub const fn thumb_state(&self) -> bool {
        self.thumb_state
    }

    pub fn set_thumb_state(&mut self, value: bool) {
        self.thumb_state = value;
    }

    #[must_use]
    pub const fn mode(&self) -> Mode {
        self.mode
    }

    /// Set N and Z from a result.
    pub fn set_flags_nz(&mut self, result: u32) {
        self.sign = result & 0x8000_0000 != 0;
        self.zero = result == 0;
    }

    /// Set all four condition flags.
    pub fn set_flags_nzcv(&mut self, result: u32, carry: bool, overflow: bool) {
        self.set_flags_nz(result);
        self.carry = carry;
        self.overflow = overflow;
    }

    /// Set N and Z from a 64-bit result (long multiplies): N is bit 63,
    /// Z covers the whole value.
    pub fn set_flags_nz_64(&mut self, result: u64) {
        self.sign = result & 0x8000_0000_0000_0000 != 0;
        self.zero = result == 0;
    }

    /// Test an ARM condition against the cached flags.
    #[must_use]
    pub fn check_condition(&self, cond: Condition) -> bool {
        use Condition::{AL, CC, CS, EQ, GE, GT, HI, LE, LS, LT, MI, NE, NV, PL, VC, VS};
        match cond {
            EQ => self.zero,
            NE => !self.zero,
            CS => self.carry,
            CC => !self.carry,
            MI => self.sign,
            PL => !self.sign,
            VS => self.overflow,
            VC => !self.overflow,
            HI => self.carry && !self.zero,
            LS => !self.carry || self.zero,
            GE => self.sign == self.overflow,
            LT => self.sign != self.overflow,
            GT => !self.zero && (self.sign == self.overflow),
            LE => self.zero || (self.sign != self.overflow),
            AL | NV => true,
        }
    }

    // ===== Mode switching =====

    /// Switch to `new_mode`. With `save_cpsr` the packed CPSR is copied
    /// into the new mode's SPSR slot first (exception entry). The I/F/T
    /// bits are left alone; exception entry adjusts them separately.
    pub fn switch_mode(&mut self, new_mode: Mode, save_cpsr: bool) {
        if save_cpsr {
            if let Some(idx) = new_mode.spsr_index() {
                self.spsr[idx] = self.cpsr();
            }
        }

        self.mode = new_mode;
    }

    /// Exception return: copy the current mode's SPSR back into CPSR,
    /// restoring flags, interrupt masks, Thumb state and mode in one go.
    /// No-op in User/System.
    pub fn restore_cpsr_from_spsr(&mut self) {
        if let Some(idx) = self.mode.spsr_index() {
            self.set_cpsr(self.spsr[idx]);
        }
    }
}

impl std::fmt::Display for CpuRegisters {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(
            f,
            "Mode: {} | {}",
            self.mode,
            if self.thumb_state { "THUMB" } else { "ARM" }
        )?;
        writeln!(
            f,
            "CPSR: {:08X} | N={} Z={} C={} V={} | I={} F={}",
            u32::from(self.cpsr()),
            u8::from(self.sign),
            u8::from(self.zero),
            u8::from(self.carry),
            u8::from(self.overflow),
            u8::from(self.irq_disable),
            u8::from(self.fiq_disable),
        )?;

        for row in 0..4 {
            let base = row * 4;
            writeln!(
                f,
                "R{base:<2}={:08X}  R{:<2}={:08X}  R{:<2}={:08X}  R{:<2}={:08X}",
                self.get(base),
                base + 1,
                self.get(base + 1),
                base + 2,
                self.get(base + 2),
                base + 3,
                self.get(base + 3),
            )?;
        }

        Ok(())
    }
}
