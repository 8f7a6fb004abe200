//! X-Input compatible controllers (Xbox 360 clones).
//!
//! Identified by class signature rather than vendor/product id. No handshake;
//! the controller reports as soon as it is claimed, so `init` only drains the
//! stale reports queued up during enumeration.

use crate::device::DeviceLink;
use crate::error::Result;
use crate::state::{ButtonId, GamepadState};

pub(crate) struct XInput {
    led: u8,
}

impl XInput {
    pub(crate) fn new() -> Self {
        Self { led: 0 }
    }

    pub(crate) fn init(&mut self, link: &mut DeviceLink) -> Result<()> {
        link.flush()
    }

    /// Set the player indicator (0..=2) via the 2-bit LED pattern.
    pub(crate) fn set_led(&mut self, link: &mut DeviceLink, index: u8) -> Result<()> {
        self.led = index.min(2);
        let mut message = [0x01, 0x03, 0x02];
        for i in 0..2 {
            if self.led > i {
                message[2] |= 1 << (1 - i);
            }
        }
        link.write(&message, true)?;
        Ok(())
    }

    pub(crate) fn decode(&mut self, report: &[u8], state: &mut GamepadState) {
        if report.len() < 14 {
            return;
        }
        let buttons = state.buttons_mut();
        buttons.set(ButtonId::Up, report[2] & 0x01 != 0);
        buttons.set(ButtonId::Down, report[2] & 0x02 != 0);
        buttons.set(ButtonId::Left, report[2] & 0x04 != 0);
        buttons.set(ButtonId::Right, report[2] & 0x08 != 0);
        buttons.set(ButtonId::Start, report[2] & 0x10 != 0);
        buttons.set(ButtonId::Select, report[2] & 0x20 != 0);
        buttons.set(ButtonId::L1, report[3] & 0x01 != 0);
        buttons.set(ButtonId::R1, report[3] & 0x02 != 0);
        buttons.set(ButtonId::Home, report[3] & 0x04 != 0);
        buttons.set(ButtonId::B, report[3] & 0x10 != 0);
        buttons.set(ButtonId::A, report[3] & 0x20 != 0);
        buttons.set(ButtonId::Y, report[3] & 0x40 != 0);
        buttons.set(ButtonId::X, report[3] & 0x80 != 0);

        state.set_left_trigger_raw(report[4] as i32);
        state.set_right_trigger_raw(report[5] as i32);

        state.set_left_joystick_raw(
            i16::from_le_bytes([report[6], report[7]]) as i32,
            i16::from_le_bytes([report[8], report[9]]) as i32,
        );
        state.set_right_joystick_raw(
            i16::from_le_bytes([report[10], report[11]]) as i32,
            i16::from_le_bytes([report[12], report[13]]) as i32,
        );
    }
}
