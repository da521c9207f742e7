//! # GBA System
//!
//! Owns every component and sequences one tick:
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │ 1. Give DMA the bus. If a transfer ran, its cycles advance the   │
//! │    LCD/sound/timers and the CPU sits this tick out.              │
//! │ 2. Otherwise the CPU executes one instruction; its cycle count   │
//! │    advances the LCD, sound and timers, in that order.            │
//! │ 3. Apply a latched HALTCNT request, then deliver a pending,      │
//! │    unmasked IRQ to the CPU.                                      │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Nothing preempts an instruction: interrupts are delivered on the
//! tick boundary after the write that raised them.

use logger::log;

use crate::bus::MemoryBus;
use crate::cartridge_header::{CartridgeError, CartridgeHeader};
use crate::cpu::arm7tdmi::Arm7tdmi;
use crate::cpu::hardware::dma::Dma;
use crate::cpu::hardware::interrupt_control::HaltRequest;
use crate::cpu::hardware::keypad::Button;
use crate::cpu::hardware::lcd::Lcd;
use crate::cpu::hardware::sound::Sound;
use crate::cpu::hardware::timers::Timers;

pub const CPU_FREQUENCY: u32 = 16_777_216;
pub const CYCLES_PER_FRAME: u32 = 280_896;

#[derive(Default)]
pub struct Gba {
    pub bus: MemoryBus,
    pub cpu: Arm7tdmi,
    pub lcd: Lcd,
    pub sound: Sound,
    pub timers: Timers,
    pub dma: Dma,

    pub cartridge_header: Option<CartridgeHeader>,

    pub total_cycles: u64,
    pub frame_count: u64,
}

impl Gba {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load_bios(&mut self, data: &[u8]) {
        self.bus.load_bios(data);
    }

    /// Validate and load a cartridge. The header region must be present;
    /// anything shorter is rejected before touching the bus.
    pub fn load_rom(&mut self, data: &[u8]) -> Result<(), CartridgeError> {
        let header = CartridgeHeader::parse(data)?;

        log(format!(
            "cartridge: \"{}\" [{}] maker {}",
            header.game_title, header.game_code, header.maker_code
        ));

        self.bus.load_rom(data);
        self.cartridge_header = Some(header);

        Ok(())
    }

    pub fn reset(&mut self) {
        self.cpu.reset();
        self.lcd.reset();
        self.sound.reset();
        self.timers.reset();
        self.dma.reset();
        self.total_cycles = 0;
        self.frame_count = 0;
    }

    /// One tick of the whole machine. Returns the cycles that elapsed.
    pub fn step(&mut self) -> u32 {
        // DMA has bus priority: a pending transfer blocks the CPU.
        let dma_cycles = self.dma.step(&mut self.bus);
        if dma_cycles > 0 {
            self.step_peripherals(dma_cycles);
            self.finish_tick();
            self.total_cycles += u64::from(dma_cycles);
            return dma_cycles;
        }

        let cycles = self.cpu.step(&mut self.bus);
        self.step_peripherals(cycles);
        self.finish_tick();
        self.total_cycles += u64::from(cycles);

        cycles
    }

    fn step_peripherals(&mut self, cycles: u32) {
        self.lcd.step(&mut self.bus, cycles);
        self.sound.step(&mut self.bus, cycles);
        self.timers.step(&mut self.bus, cycles);
    }

    fn finish_tick(&mut self) {
        if let Some(request) = self.bus.halt_request.take() {
            match request {
                HaltRequest::Halt => self.cpu.halt(),
                HaltRequest::Stop => self.cpu.stop(),
            }
        }

        if self.bus.irq_pending() {
            self.cpu.trigger_irq();
        }
    }

    /// Run until the LCD finishes the current frame (~280 896 cycles).
    pub fn run_frame(&mut self) {
        self.lcd.frame_ready = false;

        while !self.lcd.frame_ready {
            self.step();
        }

        self.frame_count += 1;
    }

    #[must_use]
    pub fn framebuffer(&self) -> &[u8] {
        &self.lcd.framebuffer
    }

    pub fn audio_samples(&mut self, count: usize) -> Vec<(i16, i16)> {
        self.sound.samples(count)
    }

    pub fn set_button(&mut self, button: Button, pressed: bool) {
        self.bus.set_key_state(button, pressed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    /// A ROM whose entry point loops forever: B . (branch to itself).
    fn looping_rom() -> Vec<u8> {
        let mut rom = vec![0_u8; 0x200];
        rom[0x0B2] = 0x96;
        // B -8 => offset -2 words
        rom[0..4].copy_from_slice(&0xEAFF_FFFE_u32.to_le_bytes());
        rom
    }

    #[test]
    fn rejects_short_rom() {
        let mut gba = Gba::new();
        assert!(gba.load_rom(&[0_u8; 0x20]).is_err());
        assert!(gba.cartridge_header.is_none());
    }

    #[test]
    fn frame_takes_expected_cycles() {
        let mut gba = Gba::new();
        gba.load_rom(&looping_rom()).unwrap();
        gba.reset();

        // The first frame is short: frame_ready fires when VBlank
        // starts. From then on, VBlank-to-VBlank is a full frame.
        gba.run_frame();
        let start_of_vblank = gba.total_cycles;

        gba.run_frame();
        let frame = gba.total_cycles - start_of_vblank;

        // Every instruction is 3 cycles, so both frame boundaries sit
        // within one instruction of the exact period.
        assert!(frame.abs_diff(u64::from(CYCLES_PER_FRAME)) < 4);
        assert_eq!(gba.frame_count, 2);
    }

    #[test]
    fn dma_blocks_the_cpu_for_a_tick() {
        let mut gba = Gba::new();
        gba.load_rom(&looping_rom()).unwrap();
        gba.reset();

        // Arm an immediate DMA3: 4 halfwords EWRAM -> IWRAM.
        gba.bus.write_32(0x0400_00D4, 0x0200_0000);
        gba.bus.write_32(0x0400_00D8, 0x0300_0000);
        gba.bus.write_16(0x0400_00DC, 4);
        gba.bus.write_16(0x0400_00DE, 0x8000);

        let pc_before = gba.cpu.registers.pc();
        let cycles = gba.step();

        // The CPU did not run: PC is untouched and the tick cost is the
        // transfer's.
        assert_eq!(cycles, 2 + 2 * 4);
        assert_eq!(gba.cpu.registers.pc(), pc_before);

        // Next tick the channel is drained and the CPU resumes.
        gba.step();
        assert_eq!(gba.cpu.registers.pc(), pc_before);
        assert!(gba.total_cycles > u64::from(cycles));
    }

    #[test]
    fn haltcnt_halts_until_irq() {
        let mut gba = Gba::new();
        gba.load_rom(&looping_rom()).unwrap();
        gba.reset();
        gba.cpu.registers.set_irq_disabled(false);

        gba.bus.write_8(0x0400_0301, 0);
        gba.step();
        assert!(gba.cpu.is_halted());

        // Enable and raise a timer IRQ; delivery un-halts the core.
        gba.bus.write_16(0x0400_0200, 0x0008);
        gba.bus.write_16(0x0400_0208, 1);
        gba.bus.request_interrupt(0x0008);
        gba.step();

        assert!(!gba.cpu.is_halted());
        assert_eq!(gba.cpu.registers.pc(), 0x0000_0018);
    }
}
