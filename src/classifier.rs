//! Device classification.
//!
//! Maps an enumerated device's identity and parsed topology onto a
//! [`DeviceFamily`]. Three ordered tiers, first match wins:
//!
//! 1. exact `(vendor, product)` lookup — controllers with no reliable class
//!    signature;
//! 2. HID usage lookup — interface 0 of configuration 0 is HID class and
//!    advertises a known usage pair;
//! 3. device-class 4-tuple lookup — vendor-agnostic clones identified purely
//!    by their class signature.
//!
//! Classification is a pure function of identity + descriptor; it touches no
//! shared state and is callable before the device is claimed.

use crate::descriptor::{DeviceDescriptor, INTERFACE_CLASS_HID, USAGE_JOYSTICK, USAGE_PAGE_GENERIC_DESKTOP};

/// The closed set of supported controller hardware types.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum DeviceFamily {
    /// Not a recognized game controller.
    #[default]
    Unknown,
    /// 057e:2009, Switch Pro Controller and clones.
    SwitchPro,
    /// 081f:e401, generic SNES-layout HID pad.
    AdafruitSnes,
    /// 2dc8:9018, 8BitDo Zero 2 mini pad.
    EightBitDoZero2,
    /// Xbox 360 clones, identified by class signature (vid:pid vary).
    XInput,
    /// 20d6:a711, PowerA Wired Controller (for Switch).
    PowerAWired,
    /// 054c:09cc, wired Sony DUALSHOCK 4.
    PlayStationDs4,
    /// Generic HID joystick, identified by usage (vid:pid vary).
    HidJoystick,
}

impl DeviceFamily {
    /// Human-readable family name.
    pub fn name(&self) -> &'static str {
        match self {
            DeviceFamily::Unknown => "Unknown",
            DeviceFamily::SwitchPro => "Switch Pro Controller",
            DeviceFamily::AdafruitSnes => "Adafruit SNES Controller",
            DeviceFamily::EightBitDoZero2 => "8BitDo Zero 2",
            DeviceFamily::XInput => "Generic XInput",
            DeviceFamily::PowerAWired => "PowerA Wired Controller",
            DeviceFamily::PlayStationDs4 => "PlayStation DUALSHOCK 4 Controller",
            DeviceFamily::HidJoystick => "HID Joystick",
        }
    }
}

impl std::fmt::Display for DeviceFamily {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

// (family, vid, pid)
const DEVICE_IDS: &[(DeviceFamily, u16, u16)] = &[
    (DeviceFamily::SwitchPro, 0x057E, 0x2009),
    (DeviceFamily::AdafruitSnes, 0x081F, 0xE401),
    (DeviceFamily::EightBitDoZero2, 0x2DC8, 0x9018),
    (DeviceFamily::PowerAWired, 0x20D6, 0xA711),
    (DeviceFamily::PlayStationDs4, 0x054C, 0x09CC),
];

// (family, device class, device subclass, interface 0 class, interface 0 subclass)
const DEVICE_CLASSES: &[(DeviceFamily, u8, u8, u8, u8)] =
    &[(DeviceFamily::XInput, 0xFF, 0xFF, 0xFF, 0x5D)];

// (family, usage page id, usage id)
const DEVICE_HID_USAGES: &[(DeviceFamily, u8, u8)] =
    &[(DeviceFamily::HidJoystick, USAGE_PAGE_GENERIC_DESKTOP, USAGE_JOYSTICK)];

/// Classify a device by identity and parsed topology.
pub fn classify(identity: (u16, u16), descriptor: &DeviceDescriptor) -> DeviceFamily {
    for &(family, vid, pid) in DEVICE_IDS {
        if identity == (vid, pid) {
            return family;
        }
    }

    if let Some(interface) = descriptor
        .configurations
        .first()
        .and_then(|configuration| configuration.interfaces.first())
    {
        if interface.class == INTERFACE_CLASS_HID {
            if let Some(usage) = interface.hid_usage {
                for &(family, page, id) in DEVICE_HID_USAGES {
                    if (usage.page, usage.id) == (page, id) {
                        return family;
                    }
                }
            }
        }
    }

    if let Ok(class_identifier) = descriptor.class_identifier(0, 0) {
        for &(family, class, subclass, interface_class, interface_subclass) in DEVICE_CLASSES {
            if class_identifier == (class, subclass, interface_class, interface_subclass) {
                return family;
            }
        }
    }

    DeviceFamily::Unknown
}
