//! The memory-mapped hardware the system loop drives alongside the CPU:
//! LCD, sound, timers, DMA and the keypad, plus the interrupt/event
//! plumbing they use to talk to each other without holding references.

pub mod dma;
pub mod interrupt_control;
pub mod keypad;
pub mod lcd;
pub mod sound;
pub mod timers;
