//! Sony DUALSHOCK 4 (wired), 054c:09cc.
//!
//! The gamepad function is not interface 0, so the control interface is
//! discovered by class rather than assumed. All output — light bar color,
//! rumble, flash period — funnels through a single 32-byte control report;
//! changing any one knob rewrites the whole report.

use crate::descriptor::{DeviceDescriptor, INTERFACE_CLASS_HID};
use crate::device::DeviceLink;
use crate::error::{Error, Result};
use crate::families::decode_hat;
use crate::state::{ButtonId, GamepadState};

/// Light bar palette indexed by player LED number: white, blue, red, green,
/// pink.
const COLORS: [u32; 5] = [0xFFFFFF, 0x0000FF, 0xFF0000, 0x00FF00, 0xFF00FF];

/// Longest flash period the control report can express, in seconds.
const FLASH_MAX_SECONDS: f32 = 2.5;

pub(crate) struct DualShock4 {
    led: u8,
    color: u32,
    rumble: f32,
    flash: f32,
}

impl DualShock4 {
    pub(crate) fn new() -> Self {
        Self {
            led: 0,
            color: 0,
            rumble: 0.0,
            flash: 0.0,
        }
    }

    /// Locate the gamepad control interface: HID class, subclass 0.
    pub(crate) fn find_interface(descriptor: &DeviceDescriptor) -> Result<usize> {
        descriptor
            .configurations
            .first()
            .and_then(|configuration| {
                configuration
                    .interfaces
                    .iter()
                    .position(|interface| interface.class_identifier() == (INTERFACE_CLASS_HID, 0x00))
            })
            .ok_or(Error::UnsupportedTopology("no gamepad control interface"))
    }

    /// Rewrite the 32-byte control report from the current color, rumble,
    /// and flash values.
    fn update_control(&mut self, link: &mut DeviceLink) -> Result<()> {
        let mut message = [0u8; 32];
        message[0] = 0x05;
        message[1] = 0xFF;
        let rumble = ((self.rumble * 255.0) as i32 & 0xFF) as u8;
        message[4] = rumble;
        message[5] = rumble;
        message[6] = (self.color >> 16) as u8;
        message[7] = (self.color >> 8) as u8;
        message[8] = self.color as u8;
        let flash = ((self.flash / FLASH_MAX_SECONDS * 255.0) as i32 & 0xFF) as u8;
        message[9] = flash;
        message[10] = flash;
        link.write(&message, true)?;
        Ok(())
    }

    /// Pick the light bar color for a player index (0..=4).
    pub(crate) fn set_led(&mut self, link: &mut DeviceLink, index: u8) -> Result<()> {
        self.led = index.min(COLORS.len() as u8 - 1);
        self.color = COLORS[self.led as usize];
        self.update_control(link)
    }

    /// Set an arbitrary 24-bit RGB light bar color.
    pub(crate) fn set_color(&mut self, link: &mut DeviceLink, rgb: u32) -> Result<()> {
        self.color = rgb & 0xFFFFFF;
        self.led = 0;
        self.update_control(link)
    }

    /// Set rumble magnitude, `0.0..=1.0`.
    pub(crate) fn set_rumble(&mut self, link: &mut DeviceLink, value: f32) -> Result<()> {
        self.rumble = value;
        self.update_control(link)
    }

    /// Set the light bar flash period in seconds, up to 2.5.
    pub(crate) fn set_flash(&mut self, link: &mut DeviceLink, period: f32) -> Result<()> {
        self.flash = period;
        self.update_control(link)
    }

    pub(crate) fn decode(&mut self, report: &[u8], state: &mut GamepadState) {
        if report.len() < 10 {
            return;
        }
        // Sticks are unsigned bytes recentered into the signed 16-bit range;
        // Y grows downward on the wire.
        state.set_left_joystick_raw(
            (report[1] as i32 - 128) << 8,
            (128 - report[2] as i32) << 8,
        );
        state.set_right_joystick_raw(
            (report[3] as i32 - 128) << 8,
            (128 - report[4] as i32) << 8,
        );

        let buttons = state.buttons_mut();
        buttons.set(ButtonId::Y, report[5] & 0x80 != 0); // Triangle
        buttons.set(ButtonId::B, report[5] & 0x40 != 0); // Circle
        buttons.set(ButtonId::A, report[5] & 0x20 != 0); // Cross
        buttons.set(ButtonId::X, report[5] & 0x10 != 0); // Square

        decode_hat(buttons, report[5] & 0x0F);

        buttons.set(ButtonId::L1, report[6] & 0x01 != 0);
        buttons.set(ButtonId::R1, report[6] & 0x02 != 0);
        // L2/R2 bits (0x04/0x08) are ignored; the analog triggers below
        // derive those buttons.
        buttons.set(ButtonId::Select, report[6] & 0x10 != 0); // Share
        buttons.set(ButtonId::Start, report[6] & 0x20 != 0); // Options
        buttons.set(ButtonId::L3, report[6] & 0x40 != 0);
        buttons.set(ButtonId::R3, report[6] & 0x80 != 0);

        buttons.set(ButtonId::Home, report[7] & 0x01 != 0); // PS
        buttons.set(ButtonId::TouchPad, report[7] & 0x02 != 0);

        state.set_left_trigger_raw(report[8] as i32);
        state.set_right_trigger_raw(report[9] as i32);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::testsupport::open_link;
    use crate::transport::mock::{
        config_bytes, device_bytes, endpoint_record, interface_record, MockDevice,
    };

    fn neutral_report() -> [u8; 10] {
        let mut report = [0u8; 10];
        report[1] = 128;
        report[2] = 128;
        report[3] = 128;
        report[4] = 128;
        report[5] = 0x08; // hat neutral
        report
    }

    #[test]
    fn control_interface_is_discovered_not_assumed() {
        let device = device_bytes(0x00, 0x00, 0x00, 64, 1);
        let config = config_bytes(
            1,
            &[
                (interface_record(0x01, 0x01, 0x00), vec![]), // audio
                (interface_record(0x01, 0x02, 0x00), vec![]),
                (
                    interface_record(INTERFACE_CLASS_HID, 0x00, 0x00),
                    vec![endpoint_record(0x84, 0x03, 64, 5)],
                ),
            ],
        );
        let descriptor = DeviceDescriptor::parse(&device, &[config]).unwrap();
        assert_eq!(DualShock4::find_interface(&descriptor).unwrap(), 2);

        let bare = DeviceDescriptor::parse(&device, &[]).unwrap();
        assert!(matches!(
            DualShock4::find_interface(&bare),
            Err(Error::UnsupportedTopology(_))
        ));
    }

    #[test]
    fn decode_recenters_sticks() {
        let mut state = GamepadState::new();
        state.set_joystick_deadzone_raw(0);
        let mut report = neutral_report();
        report[1] = 255; // left stick X hard right
        report[2] = 0; // left stick Y up (wire grows downward)
        DualShock4::new().decode(&report, &mut state);
        let (x, y) = state.left_joystick();
        assert!(x > 0.98);
        assert!(y > 0.98);
        assert!(state.buttons().get(ButtonId::JoystickRight));
        assert!(state.buttons().get(ButtonId::JoystickUp));
    }

    #[test]
    fn decode_masks_hat_from_face_bits() {
        let mut state = GamepadState::new();
        let mut report = neutral_report();
        report[5] = 0x80; // Triangle held, hat code 0 (up)
        DualShock4::new().decode(&report, &mut state);
        assert!(state.buttons().get(ButtonId::Y));
        assert!(state.buttons().get(ButtonId::Up));
    }

    #[test]
    fn decode_ignores_raw_trigger_bits() {
        let mut state = GamepadState::new();
        let mut report = neutral_report();
        report[6] = 0x04 | 0x08; // raw L2/R2 bits, triggers released
        DualShock4::new().decode(&report, &mut state);
        assert!(!state.buttons().get(ButtonId::L2));
        assert!(!state.buttons().get(ButtonId::R2));

        report[8] = 255;
        state.begin_update();
        DualShock4::new().decode(&report, &mut state);
        assert!(state.buttons().get(ButtonId::L2));
    }

    #[test]
    fn touch_pad_and_home() {
        let mut state = GamepadState::new();
        let mut report = neutral_report();
        report[7] = 0x03;
        DualShock4::new().decode(&report, &mut state);
        assert!(state.buttons().get(ButtonId::Home));
        assert!(state.buttons().get(ButtonId::TouchPad));
    }

    #[test]
    fn control_report_layout() {
        let device = MockDevice::new(0x054C, 0x09CC);
        // ACK every control write.
        for _ in 0..3 {
            device.queue_report(&[0x01]);
        }
        let mut link = open_link(&device);
        let mut decoder = DualShock4::new();
        decoder.set_led(&mut link, 1).unwrap();
        decoder.set_rumble(&mut link, 1.0).unwrap();
        decoder.set_flash(&mut link, 2.5).unwrap();

        let writes = device.writes();
        assert_eq!(writes.len(), 3);
        let led = &writes[0].1;
        assert_eq!(led.len(), 32);
        assert_eq!(&led[..2], &[0x05, 0xFF]);
        assert_eq!(&led[6..9], &[0x00, 0x00, 0xFF]); // player 1 = blue

        let rumble = &writes[1].1;
        assert_eq!(&rumble[4..6], &[0xFF, 0xFF]);

        let flash = &writes[2].1;
        assert_eq!(&flash[9..11], &[0xFF, 0xFF]);
    }
}
