//! # Timers
//!
//! Four 16-bit up-counters. Each one either counts CPU cycles through a
//! prescaler (1/64/256/1024) or, for timers 1-3, counts overflows of
//! the previous timer ("cascade"). On overflow a timer reloads from
//! TMxCNT_L's latched write value, optionally raises its IRQ, and -
//! for timers 0/1 - clocks the direct-sound FIFOs.
//!
//! The control registers live in the bus's MMIO block; enable edges are
//! detected against a copy kept from the previous step.

use crate::bus::{MemoryBus, IO_TM0CNT_L};
use crate::cpu::hardware::interrupt_control::irq;

const PRESCALERS: [u32; 4] = [1, 64, 256, 1024];

const CONTROL_CASCADE: u16 = 0x0004;
const CONTROL_IRQ: u16 = 0x0040;
const CONTROL_ENABLE: u16 = 0x0080;

#[derive(Default)]
struct Timer {
    counter: u32,
    prescaler_counter: u32,
    previous_control: u16,
    running: bool,
}

impl Timer {
    /// Count `ticks` increments, returning how many times the counter
    /// overflowed. The counter reloads on each overflow.
    fn count(&mut self, ticks: u32, reload: u16) -> u32 {
        let mut overflows = 0;

        for _ in 0..ticks {
            self.counter += 1;
            if self.counter > 0xFFFF {
                self.counter = u32::from(reload);
                overflows += 1;
            }
        }

        overflows
    }
}

#[derive(Default)]
pub struct Timers {
    channels: [Timer; 4],
}

impl Timers {
    pub fn reset(&mut self) {
        self.channels = Default::default();
    }

    pub fn step(&mut self, bus: &mut MemoryBus, cycles: u32) {
        let mut cascade_overflows = 0;

        for id in 0..4 {
            let control_offset = IO_TM0CNT_L + id as u32 * 4 + 2;
            let control = bus.io_16(control_offset);
            let reload = bus.timer_reload[id];

            // Enable edge: reload the counter and restart the prescaler.
            let timer = &mut self.channels[id];
            if (control ^ timer.previous_control) & CONTROL_ENABLE != 0 {
                if control & CONTROL_ENABLE != 0 {
                    timer.counter = u32::from(reload);
                    timer.prescaler_counter = 0;
                    timer.running = true;
                } else {
                    timer.running = false;
                }
            }
            timer.previous_control = control;

            let cascade = id > 0 && control & CONTROL_CASCADE != 0;

            let overflows = if !timer.running {
                0
            } else if cascade {
                timer.count(cascade_overflows, reload)
            } else {
                timer.prescaler_counter += cycles;
                let prescaler = PRESCALERS[(control & 3) as usize];
                let ticks = timer.prescaler_counter / prescaler;
                timer.prescaler_counter %= prescaler;

                timer.count(ticks, reload)
            };

            if overflows > 0 {
                if control & CONTROL_IRQ != 0 {
                    bus.request_interrupt(irq::TIMER0 << id);
                }

                // Timers 0/1 clock the direct-sound channels.
                if id < 2 {
                    bus.events.timer_overflows[id] += overflows;
                }
            }

            bus.set_io_16(IO_TM0CNT_L + id as u32 * 4, self.channels[id].counter as u16);

            cascade_overflows = overflows;
        }
    }
}
