//! Interrupt request bits and the event pulses peripherals exchange.
//!
//! The IE/IF/IME registers themselves live in the bus's MMIO block; this
//! module owns the bit assignments and the [`HardwareEvents`] mailbox.
//! Peripherals never hold references to each other: a producer posts a
//! pulse here during its `step`, the consumer drains it on its next one.
//! The system loop sequences the steps, so a pulse is consumed within
//! the same tick or the one after.

/// Bit assignments of the IE and IF registers.
pub mod irq {
    pub const VBLANK: u16 = 0x0001;
    pub const HBLANK: u16 = 0x0002;
    pub const VCOUNT: u16 = 0x0004;
    pub const TIMER0: u16 = 0x0008;
    pub const TIMER1: u16 = 0x0010;
    pub const TIMER2: u16 = 0x0020;
    pub const TIMER3: u16 = 0x0040;
    pub const SERIAL: u16 = 0x0080;
    pub const DMA0: u16 = 0x0100;
    pub const DMA1: u16 = 0x0200;
    pub const DMA2: u16 = 0x0400;
    pub const DMA3: u16 = 0x0800;
    pub const KEYPAD: u16 = 0x1000;
    pub const GAMEPAK: u16 = 0x2000;
}

/// A HALTCNT write latches one of these; the system loop applies it to
/// the CPU after the current instruction finishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HaltRequest {
    Halt,
    Stop,
}

/// Cross-peripheral event mailbox, owned by the bus.
#[derive(Default)]
pub struct HardwareEvents {
    /// LCD entered the VBlank period this tick (DMA start condition).
    pub vblank_start: bool,

    /// LCD entered an HBlank period this tick (DMA start condition).
    pub hblank_start: bool,

    /// Overflows of timers 0 and 1 since the APU last looked (the
    /// direct-sound channels are clocked by these).
    pub timer_overflows: [u32; 2],

    /// A direct-sound FIFO has drained low and wants its DMA channel
    /// (index 0 = FIFO A / DMA1, index 1 = FIFO B / DMA2).
    pub fifo_dma_request: [bool; 2],

    /// Bytes written to the FIFO registers, waiting for the APU.
    pub fifo_writes: [Vec<u8>; 2],
}
