//! # LCD
//!
//! Scanline timing and bitmap-mode rendering.
//!
//! ```text
//! One scanline:  240 visible dots + 68 HBlank dots, 4 cycles per dot
//!                = 960 + 272 = 1232 cycles
//! One frame:     160 visible lines + 68 VBlank lines
//!                = 228 * 1232 = 280 896 cycles
//! ```
//!
//! The LCD owns VCOUNT and the status bits of DISPSTAT, publishing both
//! into the MMIO block after every step. It renders a scanline into the
//! RGB framebuffer when a visible line ends, raises the VBlank/HBlank/
//! VCount-match interrupts, and posts the DMA start pulses.
//!
//! Bitmap modes 3/4/5 are rendered faithfully; the tiled modes fall back
//! to the backdrop color (palette entry 0). Mode-accurate tile and
//! sprite rendering is outside this project's focus.

use crate::bitwise::Bits;
use crate::bus::{MemoryBus, IO_DISPCNT, IO_DISPSTAT, IO_VCOUNT};
use crate::cpu::hardware::interrupt_control::irq;

pub const SCREEN_WIDTH: usize = 240;
pub const SCREEN_HEIGHT: usize = 160;

const VISIBLE_LINES: u16 = 160;
const TOTAL_LINES: u16 = 228;
const CYCLES_PER_SCANLINE: u32 = 1232;
const VISIBLE_CYCLES: u32 = 960;

// DISPSTAT bits.
const STAT_VBLANK: u16 = 0x0001;
const STAT_HBLANK: u16 = 0x0002;
const STAT_VCOUNT_MATCH: u16 = 0x0004;
const STAT_VBLANK_IRQ: u16 = 0x0008;
const STAT_HBLANK_IRQ: u16 = 0x0010;
const STAT_VCOUNT_IRQ: u16 = 0x0020;

pub struct Lcd {
    /// Cycles into the current scanline.
    scanline_cycles: u32,
    vcount: u16,

    /// Set when the last visible line completes; the frame loop clears
    /// it before running a frame.
    pub frame_ready: bool,

    /// 240x160 RGB888, row-major.
    pub framebuffer: Vec<u8>,
}

impl Default for Lcd {
    fn default() -> Self {
        Self {
            scanline_cycles: 0,
            vcount: 0,
            frame_ready: false,
            framebuffer: vec![0; SCREEN_WIDTH * SCREEN_HEIGHT * 3],
        }
    }
}

impl Lcd {
    pub fn reset(&mut self) {
        self.scanline_cycles = 0;
        self.vcount = 0;
        self.frame_ready = false;
        self.framebuffer.fill(0);
    }

    pub fn step(&mut self, bus: &mut MemoryBus, cycles: u32) {
        self.scanline_cycles += cycles;

        while self.scanline_cycles >= CYCLES_PER_SCANLINE {
            self.scanline_cycles -= CYCLES_PER_SCANLINE;
            self.end_scanline(bus);
        }

        self.publish_status(bus);
    }

    fn end_scanline(&mut self, bus: &mut MemoryBus) {
        let dispstat = bus.io_16(IO_DISPSTAT);

        if self.vcount < VISIBLE_LINES {
            self.render_scanline(bus);
            bus.events.hblank_start = true;
        }

        if dispstat & STAT_HBLANK_IRQ != 0 {
            bus.request_interrupt(irq::HBLANK);
        }

        self.vcount += 1;

        if self.vcount == VISIBLE_LINES {
            self.frame_ready = true;
            bus.events.vblank_start = true;

            if dispstat & STAT_VBLANK_IRQ != 0 {
                bus.request_interrupt(irq::VBLANK);
            }
        }

        if self.vcount >= TOTAL_LINES {
            self.vcount = 0;
        }

        if self.vcount == dispstat >> 8 && dispstat & STAT_VCOUNT_IRQ != 0 {
            bus.request_interrupt(irq::VCOUNT);
        }
    }

    fn publish_status(&self, bus: &mut MemoryBus) {
        let mut dispstat = bus.io_16(IO_DISPSTAT) & !(STAT_VBLANK | STAT_HBLANK | STAT_VCOUNT_MATCH);

        // VBlank flag is clear on the wrap-around line 227.
        if (VISIBLE_LINES..TOTAL_LINES - 1).contains(&self.vcount) {
            dispstat |= STAT_VBLANK;
        }
        if self.scanline_cycles >= VISIBLE_CYCLES {
            dispstat |= STAT_HBLANK;
        }
        if self.vcount == dispstat >> 8 {
            dispstat |= STAT_VCOUNT_MATCH;
        }

        bus.set_io_16(IO_DISPSTAT, dispstat);
        bus.set_io_16(IO_VCOUNT, self.vcount);
    }

    fn render_scanline(&mut self, bus: &mut MemoryBus) {
        let dispcnt = bus.io_16(IO_DISPCNT);
        let y = usize::from(self.vcount);

        // Forced blank: the LCD shows white.
        if u32::from(dispcnt).get_bit(7) {
            let row = &mut self.framebuffer[y * SCREEN_WIDTH * 3..(y + 1) * SCREEN_WIDTH * 3];
            row.fill(0xFF);
            return;
        }

        match dispcnt & 7 {
            3 => self.render_mode3(bus, y),
            4 => self.render_mode4(bus, y, dispcnt),
            5 => self.render_mode5(bus, y, dispcnt),
            _ => self.render_backdrop(bus, y),
        }
    }

    /// Mode 3: single 240x160 frame of raw 15-bit color in VRAM.
    fn render_mode3(&mut self, bus: &mut MemoryBus, y: usize) {
        for x in 0..SCREEN_WIDTH {
            let address = 0x0600_0000 + ((y * SCREEN_WIDTH + x) * 2) as u32;
            let color = bus.read_16(address);
            self.put_pixel(x, y, color);
        }
    }

    /// Mode 4: 240x160 paletted, double-buffered by DISPCNT bit 4.
    fn render_mode4(&mut self, bus: &mut MemoryBus, y: usize, dispcnt: u16) {
        let page = if u32::from(dispcnt).get_bit(4) { 0xA000 } else { 0 };

        for x in 0..SCREEN_WIDTH {
            let address = 0x0600_0000 + page + (y * SCREEN_WIDTH + x) as u32;
            let index = bus.read_8(address);
            let color = bus.read_16(0x0500_0000 + u32::from(index) * 2);
            self.put_pixel(x, y, color);
        }
    }

    /// Mode 5: 160x128 direct color, double-buffered; the rest of the
    /// screen shows the backdrop.
    fn render_mode5(&mut self, bus: &mut MemoryBus, y: usize, dispcnt: u16) {
        const MODE5_WIDTH: usize = 160;
        const MODE5_HEIGHT: usize = 128;

        let backdrop = bus.read_16(0x0500_0000);
        let page = if u32::from(dispcnt).get_bit(4) { 0xA000 } else { 0 };

        for x in 0..SCREEN_WIDTH {
            let color = if x < MODE5_WIDTH && y < MODE5_HEIGHT {
                let address = 0x0600_0000 + page + ((y * MODE5_WIDTH + x) * 2) as u32;
                bus.read_16(address)
            } else {
                backdrop
            };
            self.put_pixel(x, y, color);
        }
    }

    fn render_backdrop(&mut self, bus: &mut MemoryBus, y: usize) {
        let backdrop = bus.read_16(0x0500_0000);
        for x in 0..SCREEN_WIDTH {
            self.put_pixel(x, y, backdrop);
        }
    }

    /// Expand a 15-bit BGR color into 8-bit-per-channel RGB.
    fn put_pixel(&mut self, x: usize, y: usize, color: u16) {
        let expand = |channel: u16| ((channel << 3) | (channel >> 2)) as u8;

        let offset = (y * SCREEN_WIDTH + x) * 3;
        self.framebuffer[offset] = expand(color & 0x1F);
        self.framebuffer[offset + 1] = expand((color >> 5) & 0x1F);
        self.framebuffer[offset + 2] = expand((color >> 10) & 0x1F);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn vcount_advances_per_scanline() {
        let mut lcd = Lcd::default();
        let mut bus = MemoryBus::default();

        lcd.step(&mut bus, CYCLES_PER_SCANLINE * 3);
        assert_eq!(bus.io_16(IO_VCOUNT), 3);
    }

    #[test]
    fn hblank_flag_tracks_position_in_line() {
        let mut lcd = Lcd::default();
        let mut bus = MemoryBus::default();

        lcd.step(&mut bus, VISIBLE_CYCLES - 1);
        assert_eq!(bus.io_16(IO_DISPSTAT) & STAT_HBLANK, 0);

        lcd.step(&mut bus, 1);
        assert_eq!(bus.io_16(IO_DISPSTAT) & STAT_HBLANK, STAT_HBLANK);
    }

    #[test]
    fn frame_ready_after_visible_lines() {
        let mut lcd = Lcd::default();
        let mut bus = MemoryBus::default();

        lcd.step(&mut bus, CYCLES_PER_SCANLINE * u32::from(VISIBLE_LINES) - 1);
        assert!(!lcd.frame_ready);

        lcd.step(&mut bus, 1);
        assert!(lcd.frame_ready);
        assert!(bus.events.vblank_start);
        assert_eq!(bus.io_16(IO_DISPSTAT) & STAT_VBLANK, STAT_VBLANK);
    }

    #[test]
    fn vblank_irq_requires_enable_bit() {
        let mut lcd = Lcd::default();
        let mut bus = MemoryBus::default();

        lcd.step(&mut bus, CYCLES_PER_SCANLINE * u32::from(VISIBLE_LINES));
        assert_eq!(bus.io_16(crate::bus::IO_IF) & irq::VBLANK, 0);

        let mut lcd = Lcd::default();
        let mut bus = MemoryBus::default();
        bus.write_16(0x0400_0004, STAT_VBLANK_IRQ);

        lcd.step(&mut bus, CYCLES_PER_SCANLINE * u32::from(VISIBLE_LINES));
        assert_eq!(bus.io_16(crate::bus::IO_IF) & irq::VBLANK, irq::VBLANK);
    }

    #[test]
    fn vcount_match_irq() {
        let mut lcd = Lcd::default();
        let mut bus = MemoryBus::default();
        bus.write_16(0x0400_0004, STAT_VCOUNT_IRQ | (5 << 8));

        lcd.step(&mut bus, CYCLES_PER_SCANLINE * 5);
        assert_eq!(bus.io_16(crate::bus::IO_IF) & irq::VCOUNT, irq::VCOUNT);
        assert_eq!(
            bus.io_16(IO_DISPSTAT) & STAT_VCOUNT_MATCH,
            STAT_VCOUNT_MATCH
        );
    }

    #[test]
    fn mode3_renders_raw_colors() {
        let mut lcd = Lcd::default();
        let mut bus = MemoryBus::default();

        bus.write_16(0x0400_0000, 3); // DISPCNT mode 3
        bus.write_16(0x0600_0000, 0x001F); // pure red, top-left

        lcd.step(&mut bus, CYCLES_PER_SCANLINE);

        assert_eq!(lcd.framebuffer[0], 0xFF);
        assert_eq!(lcd.framebuffer[1], 0);
        assert_eq!(lcd.framebuffer[2], 0);
    }

    #[test]
    fn mode4_uses_palette() {
        let mut lcd = Lcd::default();
        let mut bus = MemoryBus::default();

        bus.write_16(0x0400_0000, 4);
        bus.write_16(0x0600_0000, 0x0101); // pixel indices 1, 1
        bus.write_16(0x0500_0002, 0x7C00); // palette entry 1: pure blue

        lcd.step(&mut bus, CYCLES_PER_SCANLINE);

        assert_eq!(lcd.framebuffer[0], 0);
        assert_eq!(lcd.framebuffer[2], 0xFF);
    }
}
