use serde::{Deserialize, Serialize};

/// GBA button bit positions in KEYINPUT (active low: pressed = 0).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Button {
    A = 1 << 0,
    B = 1 << 1,
    Select = 1 << 2,
    Start = 1 << 3,
    Right = 1 << 4,
    Left = 1 << 5,
    Up = 1 << 6,
    Down = 1 << 7,
    R = 1 << 8,
    L = 1 << 9,
}

#[derive(Serialize, Deserialize)]
pub struct Keypad {
    /// Live KEYINPUT value: bits 0-9 set while released.
    pub key_input: u16,
}

impl Default for Keypad {
    fn default() -> Self {
        Self { key_input: 0x03FF }
    }
}

impl Keypad {
    pub fn set_button(&mut self, button: Button, pressed: bool) {
        if pressed {
            self.key_input &= !(button as u16);
        } else {
            self.key_input |= button as u16;
        }
    }

    /// Whether the current key state matches the KEYCNT interrupt
    /// condition: any of the selected keys (OR mode) or all of them
    /// (AND mode), with bit 14 gating the whole feature.
    #[must_use]
    pub fn interrupt_matches(&self, keycnt: u16) -> bool {
        if keycnt & 0x4000 == 0 {
            return false;
        }

        let selected = keycnt & 0x03FF;
        let pressed = !self.key_input & 0x03FF;

        if keycnt & 0x8000 != 0 {
            pressed & selected == selected
        } else {
            pressed & selected != 0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn buttons_are_active_low() {
        let mut keypad = Keypad::default();
        assert_eq!(keypad.key_input, 0x03FF);

        keypad.set_button(Button::A, true);
        assert_eq!(keypad.key_input & 1, 0);

        keypad.set_button(Button::A, false);
        assert_eq!(keypad.key_input, 0x03FF);
    }

    #[test]
    fn keycnt_or_mode() {
        let mut keypad = Keypad::default();
        let keycnt = 0x4000 | 0b0011; // IRQ on A or B

        assert!(!keypad.interrupt_matches(keycnt));

        keypad.set_button(Button::B, true);
        assert!(keypad.interrupt_matches(keycnt));

        // Feature disabled: no match even with keys held.
        assert!(!keypad.interrupt_matches(0b0011));
    }

    #[test]
    fn keycnt_and_mode() {
        let mut keypad = Keypad::default();
        let keycnt = 0xC000 | 0b0011; // IRQ on A and B together

        keypad.set_button(Button::A, true);
        assert!(!keypad.interrupt_matches(keycnt));

        keypad.set_button(Button::B, true);
        assert!(keypad.interrupt_matches(keycnt));
    }
}
