//! Small enums for the single-bit fields that show up across the ARM and
//! Thumb load/store encodings. Each one converts from the raw bit so the
//! decoders read as a straight transcription of the reference manual.

use crate::bitwise::Bits;

/// Transfer quantity: a 32-bit word (16-bit in Thumb) or a byte.
#[derive(Debug, Default, PartialEq, Eq, Copy, Clone)]
pub enum ReadWriteKind {
    #[default]
    Word,
    Byte,
}

impl From<bool> for ReadWriteKind {
    fn from(value: bool) -> Self {
        if value { Self::Byte } else { Self::Word }
    }
}

/// Transfer direction.
#[derive(Debug, PartialEq, Eq, Copy, Clone)]
pub enum LoadStoreKind {
    Store,
    Load,
}

impl From<bool> for LoadStoreKind {
    fn from(b: bool) -> Self {
        match b {
            false => Self::Store,
            true => Self::Load,
        }
    }
}

/// When the offset is applied to the base register.
#[derive(Debug, PartialEq, Eq, Copy, Clone)]
pub enum Indexing {
    /// Add offset after transfer.
    Post,

    /// Add offset before transfer.
    Pre,
}

impl From<bool> for Indexing {
    fn from(state: bool) -> Self {
        match state {
            false => Self::Post,
            true => Self::Pre,
        }
    }
}

/// Whether the offset is added to or subtracted from the base.
#[derive(Debug, PartialEq, Eq, Copy, Clone)]
pub enum Offsetting {
    Down,
    Up,
}

impl From<bool> for Offsetting {
    fn from(state: bool) -> Self {
        match state {
            false => Self::Down,
            true => Self::Up,
        }
    }
}

/// Second operand source for data processing: register or immediate.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum OperandKind {
    Register,
    Immediate,
}

impl From<bool> for OperandKind {
    fn from(b: bool) -> Self {
        match b {
            false => Self::Register,
            true => Self::Immediate,
        }
    }
}

/// The four barrel shifter operations, as encoded in bits 6..5.
#[derive(Debug, PartialEq, Eq, Copy, Clone)]
pub enum ShiftKind {
    Lsl = 0,
    Lsr = 1,
    Asr = 2,
    Ror = 3,
}

impl From<u32> for ShiftKind {
    fn from(op_code: u32) -> Self {
        match op_code.get_bits(0..=1) {
            0 => Self::Lsl,
            1 => Self::Lsr,
            2 => Self::Asr,
            3 => Self::Ror,
            _ => unreachable!(),
        }
    }
}

impl std::fmt::Display for ShiftKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Lsl => f.write_str("LSL"),
            Self::Lsr => f.write_str("LSR"),
            Self::Asr => f.write_str("ASR"),
            Self::Ror => f.write_str("ROR"),
        }
    }
}
