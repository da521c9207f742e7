//! ARM (32-bit) instruction set: typed decode in [`instructions`],
//! execution on the CPU core in [`operations`].

pub mod instructions;
pub mod operations;
