//! Switch Pro Controller (and clones), 057e:2009.
//!
//! The controller stays silent over USB until a fixed command sequence runs;
//! every command must be acknowledged before the next one goes out, and a
//! single miss aborts the whole connection attempt.

use crate::device::DeviceLink;
use crate::error::{Error, Result};
use crate::state::{ButtonId, GamepadState};

/// USB initialization sequence, written in strict order.
const HANDSHAKE: [&[u8]; 7] = [
    // identify: device type + MAC
    &[0x80, 0x01],
    // handshake
    &[0x80, 0x02],
    // faster baud rate
    &[0x80, 0x03],
    // handshake again at the new rate
    &[0x80, 0x02],
    // USB HID only, no wireless timeout
    &[0x80, 0x04],
    // subcommand 0x03: standard input report mode
    &[0x01, 0x06, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x03, 0x30],
    // subcommand 0x38: home LED pattern
    &[
        0x01, 0x0B, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x38, 0x01, 0x00, 0x00,
        0x11, 0x11,
    ],
];

/// Player LED command template; the low nibble of the last byte is the mask.
const LED_TEMPLATE: [u8; 12] = [
    0x01, 0x0A, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x30, 0x00,
];

pub(crate) struct SwitchPro {
    led: u8,
}

impl SwitchPro {
    pub(crate) fn new() -> Self {
        Self { led: 0 }
    }

    pub(crate) fn init(&mut self, link: &mut DeviceLink) -> Result<()> {
        for message in HANDSHAKE {
            if !link.write(message, true)? {
                return Err(Error::HandshakeFailed("command not acknowledged"));
            }
        }
        Ok(())
    }

    /// Light the first `index` player LEDs (0..=4).
    pub(crate) fn set_led(&mut self, link: &mut DeviceLink, index: u8) -> Result<()> {
        self.led = index.min(4);
        let mut message = LED_TEMPLATE;
        for i in 0..4 {
            if self.led > i {
                message[11] |= 1 << i;
            }
        }
        link.write(&message, true)?;
        Ok(())
    }

    pub(crate) fn decode(&mut self, report: &[u8], state: &mut GamepadState) {
        if report.len() < 5 {
            return;
        }
        let buttons = state.buttons_mut();
        buttons.set(ButtonId::Y, report[2] & 0x01 != 0);
        buttons.set(ButtonId::X, report[2] & 0x02 != 0);
        buttons.set(ButtonId::B, report[2] & 0x04 != 0);
        buttons.set(ButtonId::A, report[2] & 0x08 != 0);
        buttons.set(ButtonId::R1, report[2] & 0x40 != 0);
        buttons.set(ButtonId::Select, report[3] & 0x01 != 0);
        buttons.set(ButtonId::Start, report[3] & 0x02 != 0);
        buttons.set(ButtonId::Down, report[4] & 0x01 != 0);
        buttons.set(ButtonId::Up, report[4] & 0x02 != 0);
        buttons.set(ButtonId::Right, report[4] & 0x04 != 0);
        buttons.set(ButtonId::Left, report[4] & 0x08 != 0);
        buttons.set(ButtonId::L1, report[4] & 0x40 != 0);
    }
}
