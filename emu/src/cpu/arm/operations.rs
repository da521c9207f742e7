//! # ARM Instruction Execution
//!
//! Every handler takes the decoded instruction fields, applies the side
//! effects to the register file and the bus, and returns the cycle count
//! charged for it. The caller has already checked the condition field.
//!
//! The cycle numbers are the fixed per-instruction approximation this
//! core uses throughout; see the dispatch table at the bottom of each
//! handler rather than a shared table.

use crate::bus::MemoryBus;
use crate::cpu::alu::{alu_add, alu_sub, shift, ShiftSource};
use crate::cpu::arm::instructions::{
    AluOp, ArmInstruction, HalfwordKind, HalfwordOffset, MsrOperand, Operand2, PsrKind, PsrOp,
    ShiftBy, TransferOffset,
};
use crate::cpu::arm7tdmi::{Arm7tdmi, SIZE_OF_ARM_INSTRUCTION};
use crate::cpu::cpu_modes::Mode;
use crate::cpu::flags::{Indexing, LoadStoreKind, Offsetting, ReadWriteKind};
use crate::cpu::psr::Psr;
use crate::cpu::registers::REG_PC;

impl Arm7tdmi {
    pub(crate) fn execute_arm(&mut self, bus: &mut MemoryBus, instruction: ArmInstruction) -> u32 {
        match instruction {
            ArmInstruction::DataProcessing {
                opcode,
                set_conditions,
                rn,
                rd,
                operand2,
            } => self.data_processing(opcode, set_conditions, rn, rd, operand2),
            ArmInstruction::Multiply {
                accumulate,
                set_conditions,
                rd,
                rn,
                rs,
                rm,
            } => self.multiply(accumulate, set_conditions, rd, rn, rs, rm),
            ArmInstruction::MultiplyLong {
                signed,
                accumulate,
                set_conditions,
                rd_hi,
                rd_lo,
                rs,
                rm,
            } => self.multiply_long(signed, accumulate, set_conditions, rd_hi, rd_lo, rs, rm),
            ArmInstruction::SingleDataSwap { quantity, rn, rd, rm } => {
                self.single_data_swap(bus, quantity, rn, rd, rm)
            }
            ArmInstruction::BranchAndExchange { rm } => self.branch_and_exchange(rm),
            ArmInstruction::HalfwordDataTransfer {
                load_store,
                indexing,
                offsetting,
                write_back,
                kind,
                offset,
                rn,
                rd,
            } => self.halfword_data_transfer(
                bus, load_store, indexing, offsetting, write_back, kind, offset, rn, rd,
            ),
            ArmInstruction::SingleDataTransfer {
                load_store,
                quantity,
                indexing,
                offsetting,
                write_back,
                offset,
                rn,
                rd,
            } => self.single_data_transfer(
                bus, load_store, quantity, indexing, offsetting, write_back, offset, rn, rd,
            ),
            ArmInstruction::BlockDataTransfer {
                load_store,
                indexing,
                offsetting,
                load_psr,
                write_back,
                rn,
                register_list,
            } => self.block_data_transfer(
                bus,
                load_store,
                indexing,
                offsetting,
                load_psr,
                write_back,
                rn,
                register_list,
            ),
            ArmInstruction::Branch { link, offset } => self.branch(link, offset),
            ArmInstruction::PsrTransfer { psr, op } => self.psr_transfer(psr, op),
            ArmInstruction::SoftwareInterrupt => {
                self.trigger_swi();
                3
            }
            // Permissive: unknown encodings fall through as a 1-cycle
            // no-op instead of taking the Undefined exception.
            ArmInstruction::Undefined => 1,
        }
    }

    /// Second operand of a data processing instruction: a rotated
    /// immediate or a barrel-shifted register. Returns the value and the
    /// shifter carry-out that logical opcodes propagate into C.
    fn eval_operand2(&mut self, operand2: Operand2) -> (u32, bool) {
        let carry_in = self.registers.carry_flag();

        match operand2 {
            Operand2::Immediate { base, rotate } => {
                let value = base.rotate_right(rotate);
                let carry = if rotate == 0 {
                    carry_in
                } else {
                    value & 0x8000_0000 != 0
                };
                (value, carry)
            }
            Operand2::Register {
                rm,
                shift_kind,
                shift_by,
            } => {
                let rm_value = if rm == REG_PC {
                    // R15 as the shifted operand reads as prefetch PC,
                    // one word further still when the shift amount comes
                    // from a register (the instruction takes an extra
                    // internal cycle).
                    self.prefetch_pc().wrapping_add(match shift_by {
                        ShiftBy::Register(_) => SIZE_OF_ARM_INSTRUCTION,
                        ShiftBy::Immediate(_) => 0,
                    })
                } else {
                    self.registers.get(rm)
                };

                let result = match shift_by {
                    ShiftBy::Immediate(amount) => {
                        shift(shift_kind, amount, rm_value, carry_in, ShiftSource::Immediate)
                    }
                    ShiftBy::Register(rs) => {
                        let amount = self.registers.get(rs) & 0xFF;
                        shift(shift_kind, amount, rm_value, carry_in, ShiftSource::Register)
                    }
                };

                (result.value, result.carry)
            }
        }
    }

    fn data_processing(
        &mut self,
        opcode: AluOp,
        set_conditions: bool,
        rn: u32,
        rd: u32,
        operand2: Operand2,
    ) -> u32 {
        let op1 = if rn == REG_PC {
            self.prefetch_pc()
        } else {
            self.registers.get(rn)
        };

        let (op2, shifter_carry) = self.eval_operand2(operand2);

        let carry_in = self.registers.carry_flag();
        let mut carry = carry_in;
        let mut overflow = self.registers.overflow_flag();

        let result = match opcode {
            AluOp::And | AluOp::Tst => {
                carry = shifter_carry;
                op1 & op2
            }
            AluOp::Eor | AluOp::Teq => {
                carry = shifter_carry;
                op1 ^ op2
            }
            AluOp::Orr => {
                carry = shifter_carry;
                op1 | op2
            }
            AluOp::Mov => {
                carry = shifter_carry;
                op2
            }
            AluOp::Bic => {
                carry = shifter_carry;
                op1 & !op2
            }
            AluOp::Mvn => {
                carry = shifter_carry;
                !op2
            }
            AluOp::Sub | AluOp::Cmp => {
                let r = alu_sub(op1, op2, true);
                (carry, overflow) = (r.carry, r.overflow);
                r.value
            }
            AluOp::Rsb => {
                let r = alu_sub(op2, op1, true);
                (carry, overflow) = (r.carry, r.overflow);
                r.value
            }
            AluOp::Add | AluOp::Cmn => {
                let r = alu_add(op1, op2, false);
                (carry, overflow) = (r.carry, r.overflow);
                r.value
            }
            AluOp::Adc => {
                let r = alu_add(op1, op2, carry_in);
                (carry, overflow) = (r.carry, r.overflow);
                r.value
            }
            AluOp::Sbc => {
                let r = alu_sub(op1, op2, carry_in);
                (carry, overflow) = (r.carry, r.overflow);
                r.value
            }
            AluOp::Rsc => {
                let r = alu_sub(op2, op1, carry_in);
                (carry, overflow) = (r.carry, r.overflow);
                r.value
            }
        };

        if !opcode.is_test() {
            self.registers.set(rd, result);

            if rd == REG_PC {
                // Writing R15 is a branch: the prefetched instructions
                // are discarded. With S set this doubles as the
                // exception-return idiom.
                if set_conditions {
                    self.registers.restore_cpsr_from_spsr();
                }
                return 3;
            }
        }

        if set_conditions {
            self.registers.set_flags_nz(result);
            self.registers.set_carry_flag(carry);
            if opcode.is_arithmetic() {
                self.registers.set_overflow_flag(overflow);
            }
        }

        1
    }

    fn multiply(
        &mut self,
        accumulate: bool,
        set_conditions: bool,
        rd: u32,
        rn: u32,
        rs: u32,
        rm: u32,
    ) -> u32 {
        let mut result = self
            .registers
            .get(rm)
            .wrapping_mul(self.registers.get(rs));

        if accumulate {
            result = result.wrapping_add(self.registers.get(rn));
        }

        self.registers.set(rd, result);

        if set_conditions {
            // C and V are unpredictable after a multiply; left alone.
            self.registers.set_flags_nz(result);
        }

        2
    }

    #[allow(clippy::too_many_arguments)]
    fn multiply_long(
        &mut self,
        signed: bool,
        accumulate: bool,
        set_conditions: bool,
        rd_hi: u32,
        rd_lo: u32,
        rs: u32,
        rm: u32,
    ) -> u32 {
        let rm_value = self.registers.get(rm);
        let rs_value = self.registers.get(rs);

        let mut result = if signed {
            (i64::from(rm_value as i32).wrapping_mul(i64::from(rs_value as i32))) as u64
        } else {
            u64::from(rm_value) * u64::from(rs_value)
        };

        if accumulate {
            let acc = (u64::from(self.registers.get(rd_hi)) << 32)
                | u64::from(self.registers.get(rd_lo));
            result = result.wrapping_add(acc);
        }

        self.registers.set(rd_lo, result as u32);
        self.registers.set(rd_hi, (result >> 32) as u32);

        if set_conditions {
            // N from bit 63, Z from the whole 64-bit value; C/V untouched.
            self.registers.set_flags_nz_64(result);
        }

        3
    }

    fn branch(&mut self, link: bool, offset: u32) -> u32 {
        // 24-bit signed word offset relative to the prefetch PC.
        let offset = ((offset << 8) as i32) >> 6;

        if link {
            self.registers
                .set_lr(self.current_pc.wrapping_add(SIZE_OF_ARM_INSTRUCTION));
        }

        let target = self.prefetch_pc().wrapping_add(offset as u32);
        self.registers.set_pc(target);

        3
    }

    fn branch_and_exchange(&mut self, rm: u32) -> u32 {
        let destination = self.registers.get(rm);

        // Bit 0 of the target selects the instruction set.
        self.registers.set_thumb_state(destination & 1 != 0);
        self.registers.set_pc(destination);

        3
    }

    #[allow(clippy::too_many_arguments)]
    fn single_data_transfer(
        &mut self,
        bus: &mut MemoryBus,
        load_store: LoadStoreKind,
        quantity: ReadWriteKind,
        indexing: Indexing,
        offsetting: Offsetting,
        write_back: bool,
        offset: TransferOffset,
        rn: u32,
        rd: u32,
    ) -> u32 {
        let base = if rn == REG_PC {
            self.prefetch_pc()
        } else {
            self.registers.get(rn)
        };

        let offset_value = match offset {
            TransferOffset::Immediate(value) => value,
            TransferOffset::Register {
                rm,
                shift_kind,
                amount,
            } => {
                shift(
                    shift_kind,
                    amount,
                    self.registers.get(rm),
                    false,
                    ShiftSource::Immediate,
                )
                .value
            }
        };

        let indexed = match offsetting {
            Offsetting::Up => base.wrapping_add(offset_value),
            Offsetting::Down => base.wrapping_sub(offset_value),
        };

        let address = match indexing {
            Indexing::Pre => indexed,
            Indexing::Post => base,
        };

        let cycles = match load_store {
            LoadStoreKind::Load => {
                let value = match quantity {
                    ReadWriteKind::Byte => u32::from(bus.read_8(address)),
                    ReadWriteKind::Word => Self::read_word_rotated(bus, address),
                };

                self.registers.set(rd, value);

                if rd == REG_PC { 5 } else { 3 }
            }
            LoadStoreKind::Store => {
                let value = if rd == REG_PC {
                    // Stored PC reads one word past the prefetch.
                    self.prefetch_pc().wrapping_add(SIZE_OF_ARM_INSTRUCTION)
                } else {
                    self.registers.get(rd)
                };

                match quantity {
                    ReadWriteKind::Byte => bus.write_8(address, value as u8),
                    ReadWriteKind::Word => bus.write_32(address, value),
                }

                2
            }
        };

        if (write_back || indexing == Indexing::Post) && rn != REG_PC {
            self.registers.set(rn, indexed);
        }

        cycles
    }

    #[allow(clippy::too_many_arguments)]
    fn halfword_data_transfer(
        &mut self,
        bus: &mut MemoryBus,
        load_store: LoadStoreKind,
        indexing: Indexing,
        offsetting: Offsetting,
        write_back: bool,
        kind: HalfwordKind,
        offset: HalfwordOffset,
        rn: u32,
        rd: u32,
    ) -> u32 {
        let base = if rn == REG_PC {
            self.prefetch_pc()
        } else {
            self.registers.get(rn)
        };

        let offset_value = match offset {
            HalfwordOffset::Immediate(value) => value,
            HalfwordOffset::Register(rm) => self.registers.get(rm),
        };

        let indexed = match offsetting {
            Offsetting::Up => base.wrapping_add(offset_value),
            Offsetting::Down => base.wrapping_sub(offset_value),
        };

        let address = match indexing {
            Indexing::Pre => indexed,
            Indexing::Post => base,
        };

        let cycles = match load_store {
            LoadStoreKind::Load => {
                let value = match kind {
                    HalfwordKind::UnsignedHalfword => u32::from(bus.read_16(address)),
                    HalfwordKind::SignedByte => bus.read_8(address) as i8 as i32 as u32,
                    HalfwordKind::SignedHalfword => bus.read_16(address) as i16 as i32 as u32,
                };

                self.registers.set(rd, value);

                if rd == REG_PC { 5 } else { 3 }
            }
            LoadStoreKind::Store => {
                // Only STRH exists in this family; the signed encodings
                // with L=0 store nothing.
                if kind == HalfwordKind::UnsignedHalfword {
                    let value = if rd == REG_PC {
                        self.prefetch_pc().wrapping_add(SIZE_OF_ARM_INSTRUCTION)
                    } else {
                        self.registers.get(rd)
                    };

                    bus.write_16(address, value as u16);
                }

                2
            }
        };

        if (write_back || indexing == Indexing::Post) && rn != REG_PC {
            self.registers.set(rn, indexed);
        }

        cycles
    }

    #[allow(clippy::too_many_arguments)]
    fn block_data_transfer(
        &mut self,
        bus: &mut MemoryBus,
        load_store: LoadStoreKind,
        indexing: Indexing,
        offsetting: Offsetting,
        load_psr: bool,
        write_back: bool,
        rn: u32,
        register_list: u16,
    ) -> u32 {
        let base = self.registers.get(rn);
        let count = register_list.count_ones();

        if register_list == 0 {
            // Empty list: transfer PC only and move the base by 0x40.
            match load_store {
                LoadStoreKind::Load => {
                    let value = bus.read_32(base);
                    self.registers.set_pc(value);
                }
                LoadStoreKind::Store => {
                    let value = self.prefetch_pc().wrapping_add(SIZE_OF_ARM_INSTRUCTION);
                    bus.write_32(base, value);
                }
            }

            if write_back {
                let adjusted = match offsetting {
                    Offsetting::Up => base.wrapping_add(0x40),
                    Offsetting::Down => base.wrapping_sub(0x40),
                };
                self.registers.set(rn, adjusted);
            }

            return 2;
        }

        // Transfers always walk memory upwards in ascending register
        // order; the four (P, U) combinations only pick the window.
        let (mut address, final_address) = match (offsetting, indexing) {
            (Offsetting::Up, Indexing::Pre) => (base.wrapping_add(4), base.wrapping_add(count * 4)),
            (Offsetting::Up, Indexing::Post) => (base, base.wrapping_add(count * 4)),
            (Offsetting::Down, Indexing::Pre) => {
                (base.wrapping_sub(count * 4), base.wrapping_sub(count * 4))
            }
            (Offsetting::Down, Indexing::Post) => (
                base.wrapping_sub(count * 4).wrapping_add(4),
                base.wrapping_sub(count * 4),
            ),
        };

        let mut cycles = 2;

        for reg in 0..16 {
            if register_list & (1 << reg) == 0 {
                continue;
            }

            match load_store {
                LoadStoreKind::Load => {
                    let value = bus.read_32(address);
                    self.registers.set(reg, value);
                }
                LoadStoreKind::Store => {
                    let value = if reg == REG_PC {
                        self.prefetch_pc().wrapping_add(SIZE_OF_ARM_INSTRUCTION)
                    } else {
                        self.registers.get(reg)
                    };
                    bus.write_32(address, value);
                }
            }

            address = address.wrapping_add(4);
            cycles += 1;
        }

        if write_back {
            self.registers.set(rn, final_address);
        }

        if load_store == LoadStoreKind::Load && register_list & (1 << REG_PC) != 0 {
            if load_psr {
                self.registers.restore_cpsr_from_spsr();
            }
            cycles += 2;
        }

        cycles
    }

    fn single_data_swap(
        &mut self,
        bus: &mut MemoryBus,
        quantity: ReadWriteKind,
        rn: u32,
        rd: u32,
        rm: u32,
    ) -> u32 {
        let address = self.registers.get(rn);
        let source = self.registers.get(rm);

        let old = match quantity {
            ReadWriteKind::Byte => {
                let old = u32::from(bus.read_8(address));
                bus.write_8(address, source as u8);
                old
            }
            ReadWriteKind::Word => {
                let old = bus.read_32(address);
                bus.write_32(address, source);
                old
            }
        };

        self.registers.set(rd, old);

        4
    }

    fn psr_transfer(&mut self, psr: PsrKind, op: PsrOp) -> u32 {
        match op {
            PsrOp::Mrs { rd } => {
                let value = match psr {
                    PsrKind::Cpsr => self.registers.cpsr(),
                    PsrKind::Spsr => self.registers.spsr(),
                };

                self.registers.set(rd, value.into());
            }
            PsrOp::Msr { field_mask, operand } => {
                let value = match operand {
                    MsrOperand::Immediate { base, rotate } => base.rotate_right(rotate),
                    MsrOperand::Register(rm) => self.registers.get(rm),
                };

                let mut mask = 0_u32;
                for (bit, byte_mask) in [
                    (0b0001, 0x0000_00FF),
                    (0b0010, 0x0000_FF00),
                    (0b0100, 0x00FF_0000),
                    (0b1000, 0xFF00_0000_u32),
                ] {
                    if field_mask & bit != 0 {
                        mask |= byte_mask;
                    }
                }

                match psr {
                    PsrKind::Spsr => {
                        let old = u32::from(self.registers.spsr());
                        self.registers
                            .set_spsr(Psr::from((old & !mask) | (value & mask)));
                    }
                    PsrKind::Cpsr => {
                        // User code may only touch the flags byte.
                        if self.registers.mode() == Mode::User {
                            mask &= 0xFF00_0000;
                        }

                        let old = u32::from(self.registers.cpsr());
                        self.registers
                            .set_cpsr(Psr::from((old & !mask) | (value & mask)));
                    }
                }
            }
        }

        1
    }
}
