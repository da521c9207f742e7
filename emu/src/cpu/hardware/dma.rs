//! # DMA Controller
//!
//! Four channels with fixed priority (0 highest). A channel latches its
//! source, destination and count when it is enabled, then runs when its
//! start condition arrives: immediately, at VBlank, at HBlank, or on a
//! sound-FIFO request (channels 1/2). A transfer runs to completion in
//! one go and returns its cycle cost to the system loop, which skips the
//! CPU for that tick - that is the bus priority the hardware enforces.

use crate::bus::{MemoryBus, IO_DMA0SAD};
use crate::cpu::hardware::interrupt_control::irq;

const CONTROL_REPEAT: u16 = 0x0200;
const CONTROL_WORD: u16 = 0x0400;
const CONTROL_IRQ: u16 = 0x4000;
const CONTROL_ENABLE: u16 = 0x8000;

const TIMING_IMMEDIATE: u16 = 0;
const TIMING_VBLANK: u16 = 1;
const TIMING_HBLANK: u16 = 2;
const TIMING_SPECIAL: u16 = 3;

#[derive(Default)]
struct Channel {
    source: u32,
    destination: u32,
    count: u32,
    running: bool,
    previous_control: u16,
}

/// Per-channel address and count masks: channel 0 cannot reach the game
/// pak, only channel 3 can write to it, and only channel 3 has a 16-bit
/// count.
const fn channel_masks(id: usize) -> (u32, u32, u32) {
    match id {
        0 => (0x07FF_FFFF, 0x07FF_FFFF, 0x3FFF),
        1 | 2 => (0x0FFF_FFFF, 0x07FF_FFFF, 0x3FFF),
        _ => (0x0FFF_FFFF, 0x0FFF_FFFF, 0xFFFF),
    }
}

const fn register_block(id: usize) -> u32 {
    IO_DMA0SAD + id as u32 * 12
}

#[derive(Default)]
pub struct Dma {
    channels: [Channel; 4],
}

impl Dma {
    pub fn reset(&mut self) {
        self.channels = Default::default();
    }

    /// Run at most one pending transfer (highest priority first) and
    /// return the cycles it consumed; 0 when no channel is ready.
    pub fn step(&mut self, bus: &mut MemoryBus) -> u32 {
        self.poll_control_writes(bus);
        self.consume_triggers(bus);

        for id in 0..4 {
            if self.channels[id].running {
                return self.execute_transfer(bus, id);
            }
        }

        0
    }

    /// Pick up control writes since the last step: an enable rising edge
    /// latches the internal registers and arms the channel.
    fn poll_control_writes(&mut self, bus: &MemoryBus) {
        for id in 0..4 {
            let control = bus.io_16(register_block(id) + 10);
            let channel = &mut self.channels[id];

            let rising = control & CONTROL_ENABLE != 0
                && channel.previous_control & CONTROL_ENABLE == 0;
            channel.previous_control = control;

            if !rising {
                continue;
            }

            let (source_mask, dest_mask, count_mask) = channel_masks(id);
            channel.source = bus.io_32(register_block(id)) & source_mask;
            channel.destination = bus.io_32(register_block(id) + 4) & dest_mask;
            channel.count = Self::effective_count(bus, id, count_mask);

            if (control >> 12) & 3 == TIMING_IMMEDIATE {
                channel.running = true;
            }
        }
    }

    /// Arm channels whose start condition pulsed since the last step.
    fn consume_triggers(&mut self, bus: &mut MemoryBus) {
        let vblank = std::mem::take(&mut bus.events.vblank_start);
        let hblank = std::mem::take(&mut bus.events.hblank_start);
        let fifo = std::mem::take(&mut bus.events.fifo_dma_request);

        for id in 0..4 {
            let control = bus.io_16(register_block(id) + 10);
            if control & CONTROL_ENABLE == 0 || self.channels[id].running {
                continue;
            }

            let timing = (control >> 12) & 3;
            let triggered = match timing {
                TIMING_VBLANK => vblank,
                TIMING_HBLANK => hblank,
                // Sound DMA: channel 1 feeds FIFO A, channel 2 FIFO B.
                TIMING_SPECIAL => (id == 1 && fifo[0]) || (id == 2 && fifo[1]),
                _ => false,
            };

            if triggered {
                self.channels[id].running = true;
            }
        }
    }

    fn effective_count(bus: &MemoryBus, id: usize, count_mask: u32) -> u32 {
        let raw = u32::from(bus.io_16(register_block(id) + 8)) & count_mask;
        if raw == 0 { count_mask + 1 } else { raw }
    }

    fn execute_transfer(&mut self, bus: &mut MemoryBus, id: usize) -> u32 {
        let control = bus.io_16(register_block(id) + 10);
        let (source_mask, dest_mask, count_mask) = channel_masks(id);

        let word_transfer = control & CONTROL_WORD != 0;
        let unit: u32 = if word_transfer { 4 } else { 2 };
        let dest_control = (control >> 5) & 3;
        let source_control = (control >> 7) & 3;

        let source_delta = Self::address_delta(source_control, unit);
        let dest_delta = if dest_control == 3 {
            // Increment + reload steps during repeat reload, not here.
            0
        } else {
            Self::address_delta(dest_control, unit)
        };

        let mut cycles = 2;

        let count = self.channels[id].count;
        for _ in 0..count {
            let channel = &self.channels[id];

            if word_transfer {
                let value = bus.read_32(channel.source);
                bus.write_32(channel.destination, value);
            } else {
                let value = bus.read_16(channel.source);
                bus.write_16(channel.destination, value);
            }
            cycles += 2;

            let channel = &mut self.channels[id];
            channel.source = channel.source.wrapping_add_signed(source_delta) & source_mask;
            channel.destination =
                channel.destination.wrapping_add_signed(dest_delta) & dest_mask;
        }

        self.channels[id].running = false;

        let timing = (control >> 12) & 3;
        if control & CONTROL_REPEAT != 0 && timing != TIMING_IMMEDIATE {
            // Repeat: reload the count (and the destination in
            // increment-reload mode), wait for the next trigger.
            self.channels[id].count = Self::effective_count(bus, id, count_mask);

            if dest_control == 3 {
                self.channels[id].destination = bus.io_32(register_block(id) + 4) & dest_mask;
            }
        } else {
            bus.set_io_16(register_block(id) + 10, control & !CONTROL_ENABLE);
            self.channels[id].previous_control = control & !CONTROL_ENABLE;
        }

        if control & CONTROL_IRQ != 0 {
            bus.request_interrupt(irq::DMA0 << id);
        }

        cycles
    }

    const fn address_delta(control: u16, unit: u32) -> i32 {
        match control {
            0 => unit as i32,
            1 => -(unit as i32),
            // Fixed, and increment-reload (handled by the caller).
            _ => 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const DMA3SAD: u32 = 0x0400_00D4;
    const DMA3DAD: u32 = 0x0400_00D8;
    const DMA3CNT_L: u32 = 0x0400_00DC;
    const DMA3CNT_H: u32 = 0x0400_00DE;

    #[test]
    fn immediate_transfer_copies_and_disables() {
        let mut dma = Dma::default();
        let mut bus = MemoryBus::default();

        for i in 0..4_u32 {
            bus.write_16(0x0200_0000 + i * 2, 0x1100 + i as u16);
        }

        bus.write_32(DMA3SAD, 0x0200_0000);
        bus.write_32(DMA3DAD, 0x0300_0000);
        bus.write_16(DMA3CNT_L, 4);
        bus.write_16(DMA3CNT_H, CONTROL_ENABLE);

        let cycles = dma.step(&mut bus);
        assert_eq!(cycles, 2 + 2 * 4);

        for i in 0..4_u32 {
            assert_eq!(bus.read_16(0x0300_0000 + i * 2), 0x1100 + i as u16);
        }

        // Channel disabled itself; nothing more to do.
        assert_eq!(bus.io_16(crate::bus::IO_DMA0SAD + 3 * 12 + 10) & CONTROL_ENABLE, 0);
        assert_eq!(dma.step(&mut bus), 0);
    }

    #[test]
    fn word_transfer_and_decrement() {
        let mut dma = Dma::default();
        let mut bus = MemoryBus::default();

        bus.write_32(0x0200_0000, 0xAABB_CCDD);
        bus.write_32(0x0200_0004, 0x1122_3344);

        bus.write_32(DMA3SAD, 0x0200_0000);
        bus.write_32(DMA3DAD, 0x0300_0004);
        bus.write_16(DMA3CNT_L, 2);
        // 32-bit units, destination decrementing.
        bus.write_16(DMA3CNT_H, CONTROL_ENABLE | CONTROL_WORD | (1 << 5));

        dma.step(&mut bus);

        assert_eq!(bus.read_32(0x0300_0004), 0xAABB_CCDD);
        assert_eq!(bus.read_32(0x0300_0000), 0x1122_3344);
    }

    #[test]
    fn count_zero_means_full_count() {
        let mut dma = Dma::default();
        let mut bus = MemoryBus::default();

        bus.write_32(DMA3SAD, 0x0200_0000);
        bus.write_32(DMA3DAD, 0x0300_0000);
        bus.write_16(DMA3CNT_L, 0);
        bus.write_16(DMA3CNT_H, CONTROL_ENABLE);

        let cycles = dma.step(&mut bus);
        assert_eq!(cycles, 2 + 2 * 0x10000);
    }

    #[test]
    fn vblank_timing_waits_for_pulse() {
        let mut dma = Dma::default();
        let mut bus = MemoryBus::default();

        bus.write_16(0x0200_0000, 0xBEEF);
        bus.write_32(DMA3SAD, 0x0200_0000);
        bus.write_32(DMA3DAD, 0x0300_0000);
        bus.write_16(DMA3CNT_L, 1);
        bus.write_16(DMA3CNT_H, CONTROL_ENABLE | (TIMING_VBLANK << 12));

        // Armed but not triggered.
        assert_eq!(dma.step(&mut bus), 0);

        bus.events.vblank_start = true;
        assert!(dma.step(&mut bus) > 0);
        assert_eq!(bus.read_16(0x0300_0000), 0xBEEF);
    }

    #[test]
    fn completion_irq() {
        let mut dma = Dma::default();
        let mut bus = MemoryBus::default();

        bus.write_32(DMA3SAD, 0x0200_0000);
        bus.write_32(DMA3DAD, 0x0300_0000);
        bus.write_16(DMA3CNT_L, 1);
        bus.write_16(DMA3CNT_H, CONTROL_ENABLE | CONTROL_IRQ);

        dma.step(&mut bus);
        assert_eq!(bus.io_16(crate::bus::IO_IF) & irq::DMA3, irq::DMA3);
    }

    #[test]
    fn repeat_reloads_count_and_keeps_enable() {
        let mut dma = Dma::default();
        let mut bus = MemoryBus::default();

        bus.write_16(0x0200_0000, 0x4242);
        bus.write_32(DMA3SAD, 0x0200_0000);
        bus.write_32(DMA3DAD, 0x0300_0000);
        bus.write_16(DMA3CNT_L, 1);
        bus.write_16(
            DMA3CNT_H,
            CONTROL_ENABLE | CONTROL_REPEAT | (TIMING_HBLANK << 12) | (2 << 7),
        );

        bus.events.hblank_start = true;
        assert!(dma.step(&mut bus) > 0);

        // Still enabled, runs again on the next pulse.
        bus.events.hblank_start = true;
        assert!(dma.step(&mut bus) > 0);
    }
}
