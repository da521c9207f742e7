//! # ARM Instruction Decode
//!
//! A 32-bit word is classified into one of the instruction families by
//! bits 27..25, with the `000`/`001` group needing refinement because
//! multiply, swap, halfword transfers, BX and the PSR transfers all live
//! inside the data-processing encoding space:
//!
//! ```text
//! ┌───────────┬──────────────────────────────────────────────────────────┐
//! │ 27..25    │ Family                                                   │
//! ├───────────┼──────────────────────────────────────────────────────────┤
//! │ 101       │ Branch / Branch with Link                                │
//! │ 100       │ Block Data Transfer (LDM/STM)                            │
//! │ 01x       │ Single Data Transfer (LDR/STR)                           │
//! │ 00x       │ BX, SWP, MUL/MLA, UMULL.., LDRH/STRH.., MRS/MSR,         │
//! │           │ then Data Processing                                     │
//! │ 111       │ Software Interrupt                                       │
//! └───────────┴──────────────────────────────────────────────────────────┘
//! ```
//!
//! The refinement order matters: the specific patterns must be recognized
//! before the generic data-processing decode swallows them.

use crate::bitwise::Bits;
use crate::cpu::flags::{Indexing, LoadStoreKind, Offsetting, ReadWriteKind, ShiftKind};

/// The 16 data processing opcodes, bits 24..21.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum AluOp {
    And = 0x0,
    Eor = 0x1,
    Sub = 0x2,
    Rsb = 0x3,
    Add = 0x4,
    Adc = 0x5,
    Sbc = 0x6,
    Rsc = 0x7,
    Tst = 0x8,
    Teq = 0x9,
    Cmp = 0xA,
    Cmn = 0xB,
    Orr = 0xC,
    Mov = 0xD,
    Bic = 0xE,
    Mvn = 0xF,
}

impl AluOp {
    /// Arithmetic opcodes update all of NZCV from the ALU; logical ones
    /// update NZ and take C from the barrel shifter, leaving V alone.
    #[must_use]
    pub const fn is_arithmetic(self) -> bool {
        matches!(
            self,
            Self::Sub
                | Self::Rsb
                | Self::Add
                | Self::Adc
                | Self::Sbc
                | Self::Rsc
                | Self::Cmp
                | Self::Cmn
        )
    }

    /// TST/TEQ/CMP/CMN only set flags, they never write Rd.
    #[must_use]
    pub const fn is_test(self) -> bool {
        matches!(self, Self::Tst | Self::Teq | Self::Cmp | Self::Cmn)
    }
}

impl From<u32> for AluOp {
    fn from(op_code: u32) -> Self {
        match op_code {
            0x0 => Self::And,
            0x1 => Self::Eor,
            0x2 => Self::Sub,
            0x3 => Self::Rsb,
            0x4 => Self::Add,
            0x5 => Self::Adc,
            0x6 => Self::Sbc,
            0x7 => Self::Rsc,
            0x8 => Self::Tst,
            0x9 => Self::Teq,
            0xA => Self::Cmp,
            0xB => Self::Cmn,
            0xC => Self::Orr,
            0xD => Self::Mov,
            0xE => Self::Bic,
            0xF => Self::Mvn,
            _ => unreachable!(),
        }
    }
}

/// How the shift amount of a register operand is specified.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum ShiftBy {
    /// 5-bit amount in the instruction (bits 11..7).
    Immediate(u32),
    /// Low byte of a register (bits 11..8 name Rs).
    Register(u32),
}

/// Second operand of a data processing instruction.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum Operand2 {
    /// 8-bit immediate rotated right by twice the 4-bit rotate field.
    Immediate { base: u32, rotate: u32 },
    /// Register, passed through the barrel shifter.
    Register {
        rm: u32,
        shift_kind: ShiftKind,
        shift_by: ShiftBy,
    },
}

impl Operand2 {
    fn decode(op_code: u32) -> Self {
        if op_code.get_bit(25) {
            Self::Immediate {
                base: op_code.get_bits(0..=7),
                rotate: op_code.get_bits(8..=11) * 2,
            }
        } else {
            Self::Register {
                rm: op_code.get_bits(0..=3),
                shift_kind: op_code.get_bits(5..=6).into(),
                shift_by: if op_code.get_bit(4) {
                    ShiftBy::Register(op_code.get_bits(8..=11))
                } else {
                    ShiftBy::Immediate(op_code.get_bits(7..=11))
                },
            }
        }
    }
}

/// Which PSR an MRS/MSR names.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum PsrKind {
    Cpsr,
    Spsr,
}

impl From<bool> for PsrKind {
    fn from(value: bool) -> Self {
        if value { Self::Spsr } else { Self::Cpsr }
    }
}

/// MSR source operand.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum MsrOperand {
    Immediate { base: u32, rotate: u32 },
    Register(u32),
}

/// PSR transfer operation.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum PsrOp {
    /// Copy CPSR/SPSR into Rd.
    Mrs { rd: u32 },
    /// Write the fields selected by the byte mask (bits 19..16).
    Msr { field_mask: u32, operand: MsrOperand },
}

/// Halfword/signed transfer data type, bits 6..5 (the SH field).
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum HalfwordKind {
    /// SH = 01: unsigned halfword (LDRH/STRH).
    UnsignedHalfword,
    /// SH = 10: sign-extended byte (LDRSB).
    SignedByte,
    /// SH = 11: sign-extended halfword (LDRSH).
    SignedHalfword,
}

/// Halfword transfer offset: split 8-bit immediate or register.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum HalfwordOffset {
    Immediate(u32),
    Register(u32),
}

/// Single data transfer offset: 12-bit immediate or shifted register.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum TransferOffset {
    Immediate(u32),
    Register {
        rm: u32,
        shift_kind: ShiftKind,
        amount: u32,
    },
}

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum ArmInstruction {
    DataProcessing {
        opcode: AluOp,
        set_conditions: bool,
        rn: u32,
        rd: u32,
        operand2: Operand2,
    },
    Multiply {
        accumulate: bool,
        set_conditions: bool,
        rd: u32,
        rn: u32,
        rs: u32,
        rm: u32,
    },
    MultiplyLong {
        signed: bool,
        accumulate: bool,
        set_conditions: bool,
        rd_hi: u32,
        rd_lo: u32,
        rs: u32,
        rm: u32,
    },
    SingleDataSwap {
        quantity: ReadWriteKind,
        rn: u32,
        rd: u32,
        rm: u32,
    },
    BranchAndExchange {
        rm: u32,
    },
    HalfwordDataTransfer {
        load_store: LoadStoreKind,
        indexing: Indexing,
        offsetting: Offsetting,
        write_back: bool,
        kind: HalfwordKind,
        offset: HalfwordOffset,
        rn: u32,
        rd: u32,
    },
    SingleDataTransfer {
        load_store: LoadStoreKind,
        quantity: ReadWriteKind,
        indexing: Indexing,
        offsetting: Offsetting,
        write_back: bool,
        offset: TransferOffset,
        rn: u32,
        rd: u32,
    },
    BlockDataTransfer {
        load_store: LoadStoreKind,
        indexing: Indexing,
        offsetting: Offsetting,
        load_psr: bool,
        write_back: bool,
        rn: u32,
        register_list: u16,
    },
    Branch {
        link: bool,
        offset: u32,
    },
    PsrTransfer {
        psr: PsrKind,
        op: PsrOp,
    },
    SoftwareInterrupt,
    Undefined,
}

impl From<u32> for ArmInstruction {
    fn from(op_code: u32) -> Self {
        match op_code.get_bits(25..=27) {
            0b101 => Self::Branch {
                link: op_code.get_bit(24),
                offset: op_code.get_bits(0..=23),
            },
            0b100 => Self::BlockDataTransfer {
                load_store: op_code.get_bit(20).into(),
                indexing: op_code.get_bit(24).into(),
                offsetting: op_code.get_bit(23).into(),
                load_psr: op_code.get_bit(22),
                write_back: op_code.get_bit(21),
                rn: op_code.get_bits(16..=19),
                register_list: op_code.get_bits(0..=15) as u16,
            },
            0b010 | 0b011 => Self::decode_single_data_transfer(op_code),
            0b000 | 0b001 => Self::decode_data_processing_family(op_code),
            0b111 => Self::SoftwareInterrupt,
            // 110: coprocessor transfers, absent on the GBA.
            _ => Self::Undefined,
        }
    }
}

impl ArmInstruction {
    fn decode_single_data_transfer(op_code: u32) -> Self {
        let offset = if op_code.get_bit(25) {
            TransferOffset::Register {
                rm: op_code.get_bits(0..=3),
                shift_kind: op_code.get_bits(5..=6).into(),
                amount: op_code.get_bits(7..=11),
            }
        } else {
            TransferOffset::Immediate(op_code.get_bits(0..=11))
        };

        Self::SingleDataTransfer {
            load_store: op_code.get_bit(20).into(),
            quantity: op_code.get_bit(22).into(),
            indexing: op_code.get_bit(24).into(),
            offsetting: op_code.get_bit(23).into(),
            write_back: op_code.get_bit(21),
            offset,
            rn: op_code.get_bits(16..=19),
            rd: op_code.get_bits(12..=15),
        }
    }

    fn decode_data_processing_family(op_code: u32) -> Self {
        let register_form = !op_code.get_bit(25);

        if register_form && (op_code & 0x0FFF_FFF0) == 0x012F_FF10 {
            return Self::BranchAndExchange {
                rm: op_code.get_bits(0..=3),
            };
        }

        if register_form && op_code.get_bits(4..=7) == 0b1001 {
            // Bits 7..4 = 1001 select the multiply family and SWP.
            return match op_code.get_bits(23..=24) {
                0b10 if !op_code.get_bit(21) && !op_code.get_bit(20) => Self::SingleDataSwap {
                    quantity: op_code.get_bit(22).into(),
                    rn: op_code.get_bits(16..=19),
                    rd: op_code.get_bits(12..=15),
                    rm: op_code.get_bits(0..=3),
                },
                0b01 => Self::MultiplyLong {
                    signed: op_code.get_bit(22),
                    accumulate: op_code.get_bit(21),
                    set_conditions: op_code.get_bit(20),
                    rd_hi: op_code.get_bits(16..=19),
                    rd_lo: op_code.get_bits(12..=15),
                    rs: op_code.get_bits(8..=11),
                    rm: op_code.get_bits(0..=3),
                },
                0b00 => Self::Multiply {
                    accumulate: op_code.get_bit(21),
                    set_conditions: op_code.get_bit(20),
                    rd: op_code.get_bits(16..=19),
                    rn: op_code.get_bits(12..=15),
                    rs: op_code.get_bits(8..=11),
                    rm: op_code.get_bits(0..=3),
                },
                _ => Self::Undefined,
            };
        }

        if register_form && op_code.get_bit(7) && op_code.get_bit(4) {
            // Bit 7 and bit 4 set with a non-zero SH field: halfword or
            // signed transfer.
            let kind = match op_code.get_bits(5..=6) {
                0b01 => HalfwordKind::UnsignedHalfword,
                0b10 => HalfwordKind::SignedByte,
                0b11 => HalfwordKind::SignedHalfword,
                _ => return Self::Undefined,
            };

            let offset = if op_code.get_bit(22) {
                HalfwordOffset::Immediate(
                    (op_code.get_bits(8..=11) << 4) | op_code.get_bits(0..=3),
                )
            } else {
                HalfwordOffset::Register(op_code.get_bits(0..=3))
            };

            return Self::HalfwordDataTransfer {
                load_store: op_code.get_bit(20).into(),
                indexing: op_code.get_bit(24).into(),
                offsetting: op_code.get_bit(23).into(),
                write_back: op_code.get_bit(21),
                kind,
                offset,
                rn: op_code.get_bits(16..=19),
                rd: op_code.get_bits(12..=15),
            };
        }

        let opcode = op_code.get_bits(21..=24);
        let set_conditions = op_code.get_bit(20);

        if (0b1000..=0b1011).contains(&opcode) && !set_conditions {
            // A test opcode without S is MRS/MSR.
            let psr = PsrKind::from(op_code.get_bit(22));
            let op = if op_code.get_bit(21) {
                PsrOp::Msr {
                    field_mask: op_code.get_bits(16..=19),
                    operand: if op_code.get_bit(25) {
                        MsrOperand::Immediate {
                            base: op_code.get_bits(0..=7),
                            rotate: op_code.get_bits(8..=11) * 2,
                        }
                    } else {
                        MsrOperand::Register(op_code.get_bits(0..=3))
                    },
                }
            } else {
                PsrOp::Mrs {
                    rd: op_code.get_bits(12..=15),
                }
            };

            return Self::PsrTransfer { psr, op };
        }

        Self::DataProcessing {
            opcode: opcode.into(),
            set_conditions,
            rn: op_code.get_bits(16..=19),
            rd: op_code.get_bits(12..=15),
            operand2: Operand2::decode(op_code),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn decode_branch() {
        // BL +0xF8 (S4 in the verification scenarios)
        let op_code = 0xEB00_003E_u32;
        assert_eq!(
            ArmInstruction::from(op_code),
            ArmInstruction::Branch {
                link: true,
                offset: 0x3E,
            }
        );
    }

    #[test]
    fn decode_bx() {
        let op_code = 0xE12F_FF11_u32;
        assert_eq!(
            ArmInstruction::from(op_code),
            ArmInstruction::BranchAndExchange { rm: 1 }
        );
    }

    #[test]
    fn decode_mov_immediate() {
        // MOV R1, #1
        let op_code = 0xE3A0_1001_u32;
        assert_eq!(
            ArmInstruction::from(op_code),
            ArmInstruction::DataProcessing {
                opcode: AluOp::Mov,
                set_conditions: false,
                rn: 0,
                rd: 1,
                operand2: Operand2::Immediate { base: 1, rotate: 0 },
            }
        );
    }

    #[test]
    fn decode_adds_register() {
        // ADDS R2, R0, R1
        let op_code = 0xE090_2001_u32;
        assert_eq!(
            ArmInstruction::from(op_code),
            ArmInstruction::DataProcessing {
                opcode: AluOp::Add,
                set_conditions: true,
                rn: 0,
                rd: 2,
                operand2: Operand2::Register {
                    rm: 1,
                    shift_kind: ShiftKind::Lsl,
                    shift_by: ShiftBy::Immediate(0),
                },
            }
        );
    }

    #[test]
    fn decode_multiply_vs_multiply_long() {
        // MUL R2, R0, R1
        let op_code = 0b1110_000_0000_0_0010_0000_0001_1001_0000_u32;
        assert_eq!(
            ArmInstruction::from(op_code),
            ArmInstruction::Multiply {
                accumulate: false,
                set_conditions: false,
                rd: 2,
                rn: 0,
                rs: 1,
                rm: 0,
            }
        );

        // UMULL R3, R2, R0, R1: bit 23 set selects the long family even
        // though bit 22 (the sign select) is clear.
        let op_code = 0b1110_000_0100_0_0010_0011_0001_1001_0000_u32;
        assert_eq!(
            ArmInstruction::from(op_code),
            ArmInstruction::MultiplyLong {
                signed: false,
                accumulate: false,
                set_conditions: false,
                rd_hi: 2,
                rd_lo: 3,
                rs: 1,
                rm: 0,
            }
        );

        // SMLAL R3, R2, R0, R1
        let op_code = 0b1110_000_0111_1_0010_0011_0001_1001_0000_u32;
        assert_eq!(
            ArmInstruction::from(op_code),
            ArmInstruction::MultiplyLong {
                signed: true,
                accumulate: true,
                set_conditions: true,
                rd_hi: 2,
                rd_lo: 3,
                rs: 1,
                rm: 0,
            }
        );
    }

    #[test]
    fn decode_swap() {
        // SWP R1, R2, [R3]
        let op_code = 0b1110_00010_0_00_0011_0001_0000_1001_0010_u32;
        assert_eq!(
            ArmInstruction::from(op_code),
            ArmInstruction::SingleDataSwap {
                quantity: ReadWriteKind::Word,
                rn: 3,
                rd: 1,
                rm: 2,
            }
        );

        // SWPB R1, R2, [R3]
        let op_code = 0b1110_00010_1_00_0011_0001_0000_1001_0010_u32;
        assert_eq!(
            ArmInstruction::from(op_code),
            ArmInstruction::SingleDataSwap {
                quantity: ReadWriteKind::Byte,
                rn: 3,
                rd: 1,
                rm: 2,
            }
        );
    }

    #[test]
    fn decode_halfword_transfer() {
        // LDRH R0, [R1, #0x22]
        let op_code = 0b1110_000_1_1_1_0_1_0001_0000_0010_1011_0010_u32;
        assert_eq!(
            ArmInstruction::from(op_code),
            ArmInstruction::HalfwordDataTransfer {
                load_store: LoadStoreKind::Load,
                indexing: Indexing::Pre,
                offsetting: Offsetting::Up,
                write_back: false,
                kind: HalfwordKind::UnsignedHalfword,
                offset: HalfwordOffset::Immediate(0x22),
                rn: 1,
                rd: 0,
            }
        );

        // LDRSB R0, [R1, R2]
        let op_code = 0b1110_000_1_1_0_0_1_0001_0000_0000_1101_0010_u32;
        assert_eq!(
            ArmInstruction::from(op_code),
            ArmInstruction::HalfwordDataTransfer {
                load_store: LoadStoreKind::Load,
                indexing: Indexing::Pre,
                offsetting: Offsetting::Up,
                write_back: false,
                kind: HalfwordKind::SignedByte,
                offset: HalfwordOffset::Register(2),
                rn: 1,
                rd: 0,
            }
        );
    }

    #[test]
    fn decode_psr_transfer() {
        // MRS R0, CPSR
        let op_code = 0xE10F_0000_u32;
        assert_eq!(
            ArmInstruction::from(op_code),
            ArmInstruction::PsrTransfer {
                psr: PsrKind::Cpsr,
                op: PsrOp::Mrs { rd: 0 },
            }
        );

        // MSR SPSR_fc, R0
        let op_code = 0xE169_F000_u32;
        assert_eq!(
            ArmInstruction::from(op_code),
            ArmInstruction::PsrTransfer {
                psr: PsrKind::Spsr,
                op: PsrOp::Msr {
                    field_mask: 0b1001,
                    operand: MsrOperand::Register(0),
                },
            }
        );

        // MSR CPSR_f, #0xF0000000 (immediate form, bits 27..25 = 001)
        let op_code = 0xE328_F4F0_u32;
        assert_eq!(
            ArmInstruction::from(op_code),
            ArmInstruction::PsrTransfer {
                psr: PsrKind::Cpsr,
                op: PsrOp::Msr {
                    field_mask: 0b1000,
                    operand: MsrOperand::Immediate {
                        base: 0xF0,
                        rotate: 8,
                    },
                },
            }
        );

        // TST R0, R1 (S set) stays data processing.
        let op_code = 0xE110_0001_u32;
        assert!(matches!(
            ArmInstruction::from(op_code),
            ArmInstruction::DataProcessing {
                opcode: AluOp::Tst,
                set_conditions: true,
                ..
            }
        ));
    }

    #[test]
    fn decode_block_transfer() {
        // STMDB R13!, {R0, R1, R14}
        let op_code = 0b1110_100_1_0_0_1_0_1101_0100_0000_0000_0011_u32;
        assert_eq!(
            ArmInstruction::from(op_code),
            ArmInstruction::BlockDataTransfer {
                load_store: LoadStoreKind::Store,
                indexing: Indexing::Pre,
                offsetting: Offsetting::Down,
                load_psr: false,
                write_back: true,
                rn: 13,
                register_list: 0x4003,
            }
        );
    }

    #[test]
    fn decode_swi() {
        let op_code = 0xEF00_0001_u32;
        assert_eq!(ArmInstruction::from(op_code), ArmInstruction::SoftwareInterrupt);
    }

    #[test]
    fn decode_coprocessor_transfer_as_undefined() {
        // LDC/STC live in the 110 family; there is no coprocessor to
        // talk to on the GBA.
        let op_code = 0xEC10_0000_u32;
        assert_eq!(ArmInstruction::from(op_code), ArmInstruction::Undefined);
    }
}
