//! Generic HID joystick fallback.
//!
//! Matched by usage (`Generic Desktop / Joystick`) when nothing more specific
//! claims the device. The layout below is a fixed-offset heuristic that fits
//! a number of flight-stick style devices; button meaning is not mapped
//! per vendor/product, so the assignments are placeholders rather than
//! per-model semantics.

use crate::state::{ButtonId, GamepadState};

pub(crate) struct HidJoystick;

/// Sign-extend an 8-bit axis byte.
fn int8(value: u8) -> i32 {
    value as i8 as i32
}

/// Sign-extend a 10-bit little-endian axis packed across two bytes.
fn int10(low: u8, high: u8) -> i32 {
    let value = low as i32 | ((high as i32 & 0x03) << 8);
    if value > 511 {
        value - 1024
    } else {
        value
    }
}

impl HidJoystick {
    pub(crate) fn decode(&mut self, report: &[u8], state: &mut GamepadState) {
        if report.len() < 9 {
            return;
        }
        let buttons = state.buttons_mut();
        buttons.set(ButtonId::R1, report[8] & 0x01 != 0); // button 1 (trigger)
        buttons.set(ButtonId::L1, report[8] & 0x02 != 0); // button 2
        buttons.set(ButtonId::Select, report[8] & 0x04 != 0); // button 3
        buttons.set(ButtonId::Start, report[8] & 0x08 != 0); // button 4
        buttons.set(ButtonId::A, report[8] & 0x10 != 0); // button 5
        buttons.set(ButtonId::X, report[8] & 0x20 != 0); // button 6
        buttons.set(ButtonId::Y, report[8] & 0x40 != 0); // button 7
        buttons.set(ButtonId::B, report[8] & 0x80 != 0); // button 8

        super::decode_hat(buttons, report[7]);

        // Throttle doubles as the right trigger.
        state.set_right_trigger_raw((report[6] as i32) << 1);

        state.set_left_joystick_raw(
            int10(report[1], report[2]) << 6,
            int10(report[3], report[4]) << 6,
        );
        // Z / twist / rudder lands on the right stick X.
        state.set_right_joystick_raw(int8(report[5]) << 10, 0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ten_bit_axes_sign_extend() {
        assert_eq!(int10(0x00, 0x00), 0);
        assert_eq!(int10(0xFF, 0x01), 511);
        assert_eq!(int10(0x00, 0x02), -512);
        assert_eq!(int10(0xFF, 0x03), -1);
    }

    #[test]
    fn decode_axes_and_buttons() {
        let mut state = GamepadState::new();
        state.set_joystick_deadzone_raw(0);
        let mut report = [0u8; 9];
        report[1] = 0xFF;
        report[2] = 0x01; // X full positive (511)
        report[5] = 0x80; // twist full negative (-128)
        report[6] = 0xFF; // throttle
        report[7] = 0x08; // hat neutral
        report[8] = 0x11; // buttons 1 + 5
        HidJoystick.decode(&report, &mut state);

        assert!(state.buttons().get(ButtonId::R1));
        assert!(state.buttons().get(ButtonId::A));
        assert!(!state.buttons().get(ButtonId::Up));
        assert_eq!(state.right_trigger(), 1.0);
        assert!(state.left_joystick().0 > 0.99);
        assert!(state.right_joystick().0 < -0.99);
        assert_eq!(state.right_joystick().1, 0.0);
    }
}
