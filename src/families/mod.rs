//! Per-family report decoders.
//!
//! One module per supported controller family. Each decoder knows three
//! things: how to bring its hardware into a reporting state (`init`), how to
//! drive its player LED or light bar (`set_led`), and how to translate one
//! fixed-layout input report into [`GamepadState`] (`decode`).
//!
//! The family set is closed, so decoders dispatch through the
//! [`FamilyDecoder`] enum rather than trait objects; every match is
//! exhaustive and adding a family is a compile-visible change.
//!
//! Decoders overwrite every button and axis they own on every `decode` call.
//! Edge detection happens centrally in [`Buttons::set`](crate::state::Buttons::set);
//! a decoder that only wrote on transitions would corrupt that bookkeeping.

mod dualshock4;
mod hid_joystick;
mod hid_pads;
mod switch_pro;
mod xinput;

pub(crate) use dualshock4::DualShock4;
pub(crate) use hid_joystick::HidJoystick;
pub(crate) use hid_pads::{AdafruitSnes, EightBitDoZero2, PowerAWired};
pub(crate) use switch_pro::SwitchPro;
pub(crate) use xinput::XInput;

use crate::classifier::DeviceFamily;
use crate::descriptor::DeviceDescriptor;
use crate::device::DeviceLink;
use crate::error::{Error, Result};
use crate::state::{ButtonId, Buttons, GamepadState};

/// Decoder state for one bound controller.
pub(crate) enum FamilyDecoder {
    SwitchPro(SwitchPro),
    XInput(XInput),
    AdafruitSnes(AdafruitSnes),
    EightBitDoZero2(EightBitDoZero2),
    PowerAWired(PowerAWired),
    DualShock4(DualShock4),
    HidJoystick(HidJoystick),
}

impl FamilyDecoder {
    /// Build the decoder for a classified family and pick the interface it
    /// talks to (configuration 0 throughout).
    ///
    /// Most families use interface 0; the DualShock 4 scans for its control
    /// interface. `Unknown` is not attachable.
    pub(crate) fn attach(family: DeviceFamily, descriptor: &DeviceDescriptor) -> Result<(Self, usize)> {
        match family {
            DeviceFamily::Unknown => Err(Error::UnsupportedTopology("unclassified device")),
            DeviceFamily::SwitchPro => Ok((Self::SwitchPro(SwitchPro::new()), 0)),
            DeviceFamily::XInput => Ok((Self::XInput(XInput::new()), 0)),
            DeviceFamily::AdafruitSnes => Ok((Self::AdafruitSnes(AdafruitSnes), 0)),
            DeviceFamily::EightBitDoZero2 => Ok((Self::EightBitDoZero2(EightBitDoZero2), 0)),
            DeviceFamily::PowerAWired => Ok((Self::PowerAWired(PowerAWired), 0)),
            DeviceFamily::PlayStationDs4 => {
                let interface = DualShock4::find_interface(descriptor)?;
                Ok((Self::DualShock4(DualShock4::new()), interface))
            }
            DeviceFamily::HidJoystick => Ok((Self::HidJoystick(HidJoystick), 0)),
        }
    }

    /// The family this decoder serves.
    pub(crate) fn family(&self) -> DeviceFamily {
        match self {
            Self::SwitchPro(_) => DeviceFamily::SwitchPro,
            Self::XInput(_) => DeviceFamily::XInput,
            Self::AdafruitSnes(_) => DeviceFamily::AdafruitSnes,
            Self::EightBitDoZero2(_) => DeviceFamily::EightBitDoZero2,
            Self::PowerAWired(_) => DeviceFamily::PowerAWired,
            Self::DualShock4(_) => DeviceFamily::PlayStationDs4,
            Self::HidJoystick(_) => DeviceFamily::HidJoystick,
        }
    }

    /// Run the family's initialization sequence on a freshly claimed link.
    pub(crate) fn init(&mut self, link: &mut DeviceLink) -> Result<()> {
        match self {
            Self::SwitchPro(decoder) => decoder.init(link),
            Self::XInput(decoder) => decoder.init(link),
            _ => Ok(()),
        }
    }

    /// Drive the player LED / light bar. Families without one ignore this.
    pub(crate) fn set_led(&mut self, link: &mut DeviceLink, index: u8) -> Result<()> {
        match self {
            Self::SwitchPro(decoder) => decoder.set_led(link, index),
            Self::XInput(decoder) => decoder.set_led(link, index),
            Self::DualShock4(decoder) => decoder.set_led(link, index),
            _ => Ok(()),
        }
    }

    /// Set an arbitrary light bar color. Returns `Ok(false)` for families
    /// without one.
    pub(crate) fn set_color(&mut self, link: &mut DeviceLink, rgb: u32) -> Result<bool> {
        match self {
            Self::DualShock4(decoder) => decoder.set_color(link, rgb).map(|_| true),
            _ => Ok(false),
        }
    }

    /// Set rumble magnitude. Returns `Ok(false)` for families without it.
    pub(crate) fn set_rumble(&mut self, link: &mut DeviceLink, value: f32) -> Result<bool> {
        match self {
            Self::DualShock4(decoder) => decoder.set_rumble(link, value).map(|_| true),
            _ => Ok(false),
        }
    }

    /// Set the light bar flash period. Returns `Ok(false)` for families
    /// without one.
    pub(crate) fn set_flash(&mut self, link: &mut DeviceLink, period: f32) -> Result<bool> {
        match self {
            Self::DualShock4(decoder) => decoder.set_flash(link, period).map(|_| true),
            _ => Ok(false),
        }
    }

    /// Decode one input report into the normalized state.
    pub(crate) fn decode(&mut self, report: &[u8], state: &mut GamepadState) {
        match self {
            Self::SwitchPro(decoder) => decoder.decode(report, state),
            Self::XInput(decoder) => decoder.decode(report, state),
            Self::AdafruitSnes(decoder) => decoder.decode(report, state),
            Self::EightBitDoZero2(decoder) => decoder.decode(report, state),
            Self::PowerAWired(decoder) => decoder.decode(report, state),
            Self::DualShock4(decoder) => decoder.decode(report, state),
            Self::HidJoystick(decoder) => decoder.decode(report, state),
        }
    }
}

/// Decode a 3-bit hat code into the four D-pad buttons.
///
/// Each direction owns three adjacent codes, so the diagonals (odd codes)
/// activate two directions at once. 0x08 and above mean neutral.
pub(crate) fn decode_hat(buttons: &mut Buttons, code: u8) {
    buttons.set(ButtonId::Up, matches!(code, 0x07 | 0x00 | 0x01));
    buttons.set(ButtonId::Right, matches!(code, 0x01 | 0x02 | 0x03));
    buttons.set(ButtonId::Down, matches!(code, 0x03 | 0x04 | 0x05));
    buttons.set(ButtonId::Left, matches!(code, 0x05 | 0x06 | 0x07));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hat_diagonals_activate_two_directions() {
        let mut buttons = Buttons::default();
        decode_hat(&mut buttons, 0x01);
        assert!(buttons.get(ButtonId::Up));
        assert!(buttons.get(ButtonId::Right));
        assert!(!buttons.get(ButtonId::Down));
        assert!(!buttons.get(ButtonId::Left));

        decode_hat(&mut buttons, 0x05);
        assert!(buttons.get(ButtonId::Down));
        assert!(buttons.get(ButtonId::Left));
        assert!(!buttons.get(ButtonId::Up));
        assert!(!buttons.get(ButtonId::Right));
    }

    #[test]
    fn hat_neutral_releases_all() {
        let mut buttons = Buttons::default();
        decode_hat(&mut buttons, 0x00);
        decode_hat(&mut buttons, 0x08);
        assert!(!buttons.any_pressed());
    }
}
