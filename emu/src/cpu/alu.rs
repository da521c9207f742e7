//! # Barrel Shifter and Flag-Producing Arithmetic
//!
//! The barrel shifter sits in front of the ALU and shifts the second
//! operand for free. Its zero-amount encodings are the treacherous part:
//! a shift *encoded in the instruction* (immediate) reuses amount 0 for
//! LSR #32, ASR #32 and RRX, while a shift amount *read from a register*
//! with value 0 leaves the operand and carry untouched.
//!
//! ```text
//! ┌───────┬──────────────────────────────┬──────────────────────────────┐
//! │ Shift │ amount 0, by-immediate       │ amount 0, by-register        │
//! ├───────┼──────────────────────────────┼──────────────────────────────┤
//! │ LSL   │ identity, carry unchanged    │ identity, carry unchanged    │
//! │ LSR   │ LSR #32: 0, carry = bit 31   │ identity, carry unchanged    │
//! │ ASR   │ ASR #32: sign fill           │ identity, carry unchanged    │
//! │ ROR   │ RRX: rotate through carry    │ identity, carry unchanged    │
//! └───────┴──────────────────────────────┴──────────────────────────────┘
//! ```
//!
//! [`alu_add`] and [`alu_sub`] are the only places integer condition
//! flags are computed; every arithmetic opcode in both instruction sets
//! goes through them. `alu_sub` follows the ARM convention where carry
//! means "no borrow": `carry_in = true` subtracts exactly `b`, while
//! `carry_in = false` subtracts one more (SBC).

use crate::bitwise::Bits;
use crate::cpu::flags::ShiftKind;

/// Whether the shift amount was encoded in the instruction or read from
/// a register. Selects between the two zero-amount behaviors above.
#[derive(Debug, PartialEq, Eq, Copy, Clone)]
pub enum ShiftSource {
    Immediate,
    Register,
}

/// A shifted operand together with the shifter's carry-out.
#[derive(Debug, PartialEq, Eq, Copy, Clone)]
pub struct ShiftResult {
    pub value: u32,
    pub carry: bool,
}

/// An arithmetic result together with the C and V flags it produced.
#[derive(Debug, PartialEq, Eq, Copy, Clone)]
pub struct AluResult {
    pub value: u32,
    pub carry: bool,
    pub overflow: bool,
}

/// Apply one barrel shifter operation.
///
/// `amount` may be anything up to 255 (register-specified shifts use the
/// low byte of Rs); every amount above 32 drains the value out entirely.
#[must_use]
pub fn shift(
    kind: ShiftKind,
    amount: u32,
    value: u32,
    carry_in: bool,
    source: ShiftSource,
) -> ShiftResult {
    match kind {
        ShiftKind::Lsl => match amount {
            0 => ShiftResult {
                value,
                carry: carry_in,
            },
            1..=31 => ShiftResult {
                value: value << amount,
                carry: value.get_bit((32 - amount) as u8),
            },
            32 => ShiftResult {
                value: 0,
                carry: value.get_bit(0),
            },
            _ => ShiftResult {
                value: 0,
                carry: false,
            },
        },
        ShiftKind::Lsr => match amount {
            // LSR #0 encodes LSR #32 in the immediate form.
            0 => match source {
                ShiftSource::Immediate => ShiftResult {
                    value: 0,
                    carry: value.get_bit(31),
                },
                ShiftSource::Register => ShiftResult {
                    value,
                    carry: carry_in,
                },
            },
            1..=31 => ShiftResult {
                value: value >> amount,
                carry: value.get_bit((amount - 1) as u8),
            },
            32 => ShiftResult {
                value: 0,
                carry: value.get_bit(31),
            },
            _ => ShiftResult {
                value: 0,
                carry: false,
            },
        },
        ShiftKind::Asr => {
            let amount = match (amount, source) {
                // ASR #0 encodes ASR #32 in the immediate form.
                (0, ShiftSource::Immediate) => 32,
                (0, ShiftSource::Register) => {
                    return ShiftResult {
                        value,
                        carry: carry_in,
                    }
                }
                _ => amount,
            };

            if amount >= 32 {
                // The sign bit fills the whole word.
                let sign = value.get_bit(31);
                ShiftResult {
                    value: if sign { u32::MAX } else { 0 },
                    carry: sign,
                }
            } else {
                ShiftResult {
                    value: ((value as i32) >> amount) as u32,
                    carry: value.get_bit((amount - 1) as u8),
                }
            }
        }
        ShiftKind::Ror => {
            if amount == 0 {
                return match source {
                    // ROR #0 encodes RRX: one-bit rotate through carry.
                    ShiftSource::Immediate => ShiftResult {
                        value: (value >> 1) | (u32::from(carry_in) << 31),
                        carry: value.get_bit(0),
                    },
                    ShiftSource::Register => ShiftResult {
                        value,
                        carry: carry_in,
                    },
                };
            }

            let masked = amount & 31;
            if masked == 0 {
                // ROR #32 (or a multiple): identity, carry from bit 31.
                ShiftResult {
                    value,
                    carry: value.get_bit(31),
                }
            } else {
                ShiftResult {
                    value: value.rotate_right(masked),
                    carry: value.get_bit((masked - 1) as u8),
                }
            }
        }
    }
}

/// `a + b + carry_in`, with unsigned carry and signed overflow.
#[must_use]
pub fn alu_add(a: u32, b: u32, carry_in: bool) -> AluResult {
    let wide = u64::from(a) + u64::from(b) + u64::from(carry_in);
    let value = wide as u32;

    AluResult {
        value,
        carry: wide > u64::from(u32::MAX),
        // Overflow: operands share a sign the result does not.
        overflow: ((a ^ value) & (b ^ value)).get_bit(31),
    }
}

/// `a - b - !carry_in`, ARM borrow convention: `carry_in = true` means
/// "no borrow pending". The carry-out is the inverted borrow
/// (`a >= b`, strict when a borrow was pending).
#[must_use]
pub fn alu_sub(a: u32, b: u32, carry_in: bool) -> AluResult {
    let value = a
        .wrapping_sub(b)
        .wrapping_sub(u32::from(!carry_in));

    AluResult {
        value,
        carry: if carry_in { a >= b } else { a > b },
        // Overflow: operand signs differ and the result took b's sign.
        overflow: ((a ^ b) & (a ^ value)).get_bit(31),
    }
}
