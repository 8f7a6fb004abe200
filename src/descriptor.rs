//! USB descriptor model.
//!
//! Parses the raw byte stream of a USB configuration descriptor into a
//! structured topology: configuration → interfaces → endpoints, with an
//! optional HID usage identifier attached to HID-class interfaces. The device
//! descriptor (fetched separately over the control endpoint) forms the root.
//!
//! Parsing is a single linear scan over length-prefixed records. Every record
//! is validated through [`Descriptor`], which checks the self-declared length
//! byte against the record slice and, where the caller knows it, the type
//! byte. Inconsistent input fails with
//! [`Error::MalformedDescriptor`](crate::Error::MalformedDescriptor) rather
//! than producing a partial tree.

use crate::error::{Error, Result};

/// Device descriptor record type.
pub const DESCRIPTOR_DEVICE: u8 = 0x01;
/// Configuration descriptor record type.
pub const DESCRIPTOR_CONFIGURATION: u8 = 0x02;
/// Interface descriptor record type.
pub const DESCRIPTOR_INTERFACE: u8 = 0x04;
/// Endpoint descriptor record type.
pub const DESCRIPTOR_ENDPOINT: u8 = 0x05;
/// HID class descriptor record type.
pub const DESCRIPTOR_HID: u8 = 0x21;

/// Direction bit of an endpoint address (set = IN, device to host).
const ENDPOINT_DIR_IN: u8 = 0x80;

/// Interface class code for HID.
pub const INTERFACE_CLASS_HID: u8 = 0x03;

/// Usage page id for Generic Desktop controls.
pub const USAGE_PAGE_GENERIC_DESKTOP: u8 = 0x01;
/// Usage id for a joystick within the Generic Desktop page.
pub const USAGE_JOYSTICK: u8 = 0x04;

/// Length/type-validated view over one length-prefixed descriptor record.
///
/// Reused by every record parser below: the length byte must equal the slice
/// length, and when `expected_type` is given the type byte must match.
struct Descriptor<'a> {
    bytes: &'a [u8],
}

impl<'a> Descriptor<'a> {
    fn parse(bytes: &'a [u8], expected_type: Option<u8>) -> Result<Self> {
        if bytes.len() < 2 || bytes[0] as usize != bytes.len() {
            return Err(Error::MalformedDescriptor("record length mismatch"));
        }
        if let Some(expected) = expected_type {
            if bytes[1] != expected {
                return Err(Error::MalformedDescriptor("unexpected record type"));
            }
        }
        Ok(Self { bytes })
    }

    fn require(&self, len: usize) -> Result<()> {
        if self.bytes.len() < len {
            return Err(Error::MalformedDescriptor("record too short"));
        }
        Ok(())
    }

    fn byte(&self, index: usize) -> u8 {
        self.bytes[index]
    }

    fn word(&self, index: usize) -> u16 {
        u16::from_le_bytes([self.bytes[index], self.bytes[index + 1]])
    }
}

/// HID usage identifier advertised by a HID-class interface.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct HidUsage {
    /// Usage page id (e.g. 0x01 Generic Desktop).
    pub page: u8,
    /// Usage id within the page (e.g. 0x04 Joystick).
    pub id: u8,
}

/// One unidirectional endpoint on an interface. Immutable once parsed.
#[derive(Clone, Copy, Debug)]
pub struct EndpointDescriptor {
    /// Endpoint address: low 7 bits endpoint number, high bit direction.
    pub address: u8,
    /// Transfer attributes (type in the low 2 bits).
    pub attributes: u8,
    /// Maximum packet size in bytes.
    pub max_packet_size: u16,
    /// Polling interval in raw, speed-relative units.
    pub interval: u8,
}

impl EndpointDescriptor {
    fn from_record(record: &[u8]) -> Result<Self> {
        let d = Descriptor::parse(record, Some(DESCRIPTOR_ENDPOINT))?;
        d.require(7)?;
        Ok(Self {
            address: d.byte(2),
            attributes: d.byte(3),
            max_packet_size: d.word(4),
            interval: d.byte(6),
        })
    }

    /// Endpoint number without the direction bit.
    pub fn number(&self) -> u8 {
        self.address & !ENDPOINT_DIR_IN
    }

    /// Whether this endpoint carries data device → host.
    pub fn is_input(&self) -> bool {
        self.address & ENDPOINT_DIR_IN != 0
    }
}

/// One interface of a configuration, with its endpoints in descriptor stream
/// order.
#[derive(Clone, Debug, Default)]
pub struct InterfaceDescriptor {
    pub class: u8,
    pub subclass: u8,
    pub protocol: u8,
    /// Endpoints in the order they appeared in the descriptor stream.
    pub endpoints: Vec<EndpointDescriptor>,
    /// Usage identifier attached when the interface advertises the HID class
    /// and the stream carries the usage prelude.
    pub hid_usage: Option<HidUsage>,
}

impl InterfaceDescriptor {
    fn from_record(record: &[u8]) -> Result<Self> {
        let d = Descriptor::parse(record, Some(DESCRIPTOR_INTERFACE))?;
        d.require(8)?;
        Ok(Self {
            class: d.byte(5),
            subclass: d.byte(6),
            protocol: d.byte(7),
            endpoints: Vec::new(),
            hid_usage: None,
        })
    }

    /// First IN endpoint, if any.
    pub fn in_endpoint(&self) -> Option<&EndpointDescriptor> {
        self.endpoints.iter().find(|e| e.is_input())
    }

    /// First OUT endpoint, if any.
    pub fn out_endpoint(&self) -> Option<&EndpointDescriptor> {
        self.endpoints.iter().find(|e| !e.is_input())
    }

    /// Interface `(class, subclass)` pair.
    pub fn class_identifier(&self) -> (u8, u8) {
        (self.class, self.subclass)
    }
}

/// One device configuration with its interfaces in stream order.
#[derive(Clone, Debug, Default)]
pub struct ConfigurationDescriptor {
    /// Configuration value, used verbatim in set-configuration.
    pub value: u8,
    /// Interface count the configuration record declares.
    pub interface_count: u8,
    /// Maximum bus power draw in 2 mA units.
    pub max_power: u8,
    /// Interfaces in the order they appeared in the descriptor stream.
    pub interfaces: Vec<InterfaceDescriptor>,
}

impl ConfigurationDescriptor {
    /// Parse a raw configuration descriptor byte stream.
    ///
    /// Single linear scan: each record is dispatched on its type byte.
    /// Endpoint records arriving before any interface record are skipped;
    /// record types this driver does not model are stepped over by length.
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        let mut configuration = Self::default();
        let mut offset = 0usize;
        while offset < bytes.len() {
            let length = bytes[offset] as usize;
            if length == 0 {
                return Err(Error::MalformedDescriptor("zero-length record"));
            }
            let end = offset + length;
            if end > bytes.len() {
                return Err(Error::MalformedDescriptor("record runs past buffer"));
            }
            let record = &bytes[offset..end];
            match record[1] {
                DESCRIPTOR_CONFIGURATION => {
                    let d = Descriptor::parse(record, Some(DESCRIPTOR_CONFIGURATION))?;
                    d.require(9)?;
                    configuration.value = d.byte(5);
                    configuration.interface_count = d.byte(4);
                    configuration.max_power = d.byte(8);
                    configuration.interfaces.clear();
                }
                DESCRIPTOR_INTERFACE => {
                    configuration.interfaces.push(InterfaceDescriptor::from_record(record)?);
                }
                DESCRIPTOR_ENDPOINT => {
                    if let Some(interface) = configuration.interfaces.last_mut() {
                        interface.endpoints.push(EndpointDescriptor::from_record(record)?);
                    }
                }
                DESCRIPTOR_HID => {
                    let d = Descriptor::parse(record, Some(DESCRIPTOR_HID))?;
                    d.require(9)?;
                    if let Some(interface) = configuration.interfaces.last_mut() {
                        interface.hid_usage = hid_usage_from_record(record);
                    }
                }
                _ => {}
            }
            offset = end;
        }
        Ok(configuration)
    }
}

/// Extract the usage prelude trailing a HID class record.
///
/// The 9-byte HID descriptor may be followed by the first two short items of
/// the interface's report descriptor: `05 <page>` and `09 <usage>`. Streams
/// without the prelude yield `None`.
fn hid_usage_from_record(record: &[u8]) -> Option<HidUsage> {
    let items = record.get(9..)?;
    if items.len() >= 4 && items[0] == 0x05 && items[2] == 0x09 {
        Some(HidUsage {
            page: items[1],
            id: items[3],
        })
    } else {
        None
    }
}

/// Root of the parsed topology for one physical device.
///
/// Constructed once at connect time from the raw device descriptor plus one
/// raw configuration descriptor stream per configuration, and owned by the
/// connection manager for the device's lifetime.
#[derive(Clone, Debug, Default)]
pub struct DeviceDescriptor {
    pub class: u8,
    pub subclass: u8,
    pub protocol: u8,
    /// Maximum packet size of the control endpoint.
    pub max_packet_size: u8,
    /// Parsed configurations in fetch order.
    pub configurations: Vec<ConfigurationDescriptor>,
}

impl DeviceDescriptor {
    /// Parse the 18-byte device descriptor and one configuration stream per
    /// entry of `configuration_bytes`.
    pub fn parse(device_bytes: &[u8], configuration_bytes: &[Vec<u8>]) -> Result<Self> {
        let d = Descriptor::parse(device_bytes, Some(DESCRIPTOR_DEVICE))?;
        d.require(18)?;
        let mut descriptor = Self {
            class: d.byte(4),
            subclass: d.byte(5),
            protocol: d.byte(6),
            max_packet_size: d.byte(7),
            configurations: Vec::with_capacity(configuration_bytes.len()),
        };
        for bytes in configuration_bytes {
            descriptor
                .configurations
                .push(ConfigurationDescriptor::parse(bytes)?);
        }
        Ok(descriptor)
    }

    /// The `(device class, device subclass, interface class, interface
    /// subclass)` 4-tuple used by class-based classification.
    pub fn class_identifier(&self, configuration: usize, interface: usize) -> Result<(u8, u8, u8, u8)> {
        let interface = self
            .configurations
            .get(configuration)
            .ok_or(Error::IndexOutOfRange)?
            .interfaces
            .get(interface)
            .ok_or(Error::IndexOutOfRange)?;
        Ok((self.class, self.subclass, interface.class, interface.subclass))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::mock::{config_bytes, endpoint_record, hid_record, interface_record};

    #[test]
    fn parses_interfaces_and_partitions_endpoints() {
        let bytes = config_bytes(
            1,
            &[
                (
                    interface_record(0x03, 0x00, 0x00),
                    vec![endpoint_record(0x81, 0x03, 64, 8), endpoint_record(0x01, 0x03, 64, 8)],
                ),
                (
                    interface_record(0xFF, 0x5D, 0x01),
                    vec![endpoint_record(0x82, 0x03, 32, 4)],
                ),
            ],
        );
        let configuration = ConfigurationDescriptor::parse(&bytes).unwrap();
        assert_eq!(configuration.value, 1);
        assert_eq!(configuration.interfaces.len(), 2);
        assert_eq!(configuration.interfaces[0].endpoints.len(), 2);
        assert_eq!(configuration.interfaces[1].endpoints.len(), 1);

        let first = &configuration.interfaces[0];
        assert_eq!(first.in_endpoint().unwrap().address, 0x81);
        assert_eq!(first.out_endpoint().unwrap().address, 0x01);
        assert!(configuration.interfaces[1].out_endpoint().is_none());
    }

    #[test]
    fn truncated_trailing_record_fails() {
        let mut bytes = config_bytes(1, &[(interface_record(0x03, 0x00, 0x00), vec![])]);
        // Declare a 7-byte endpoint record but supply only 3 bytes of it.
        bytes.extend_from_slice(&[7, DESCRIPTOR_ENDPOINT, 0x81]);
        assert!(matches!(
            ConfigurationDescriptor::parse(&bytes),
            Err(Error::MalformedDescriptor(_))
        ));
    }

    #[test]
    fn zero_length_record_fails() {
        let mut bytes = config_bytes(1, &[]);
        bytes.push(0);
        assert!(matches!(
            ConfigurationDescriptor::parse(&bytes),
            Err(Error::MalformedDescriptor(_))
        ));
    }

    #[test]
    fn endpoint_before_interface_is_skipped() {
        let mut bytes = config_bytes(1, &[]);
        bytes.extend_from_slice(&endpoint_record(0x81, 0x03, 64, 8));
        let configuration = ConfigurationDescriptor::parse(&bytes).unwrap();
        assert!(configuration.interfaces.is_empty());
    }

    #[test]
    fn hid_record_attaches_usage() {
        let mut bytes = config_bytes(1, &[(interface_record(0x03, 0x00, 0x00), vec![])]);
        bytes.extend_from_slice(&hid_record(USAGE_PAGE_GENERIC_DESKTOP, USAGE_JOYSTICK));
        let configuration = ConfigurationDescriptor::parse(&bytes).unwrap();
        assert_eq!(
            configuration.interfaces[0].hid_usage,
            Some(HidUsage {
                page: USAGE_PAGE_GENERIC_DESKTOP,
                id: USAGE_JOYSTICK
            })
        );
    }

    #[test]
    fn record_type_and_length_validation() {
        let record = [9u8, DESCRIPTOR_INTERFACE, 0, 0, 0, 0x03, 0x00, 0x00, 0];
        assert!(Descriptor::parse(&record, Some(DESCRIPTOR_INTERFACE)).is_ok());
        assert!(Descriptor::parse(&record, Some(DESCRIPTOR_ENDPOINT)).is_err());
        // Self-declared length no longer matches the slice.
        assert!(Descriptor::parse(&record[..8], Some(DESCRIPTOR_INTERFACE)).is_err());
    }

    #[test]
    fn class_identifier_bounds() {
        let device = crate::transport::mock::device_bytes(0xFF, 0xFF, 0x00, 64, 1);
        let config = config_bytes(1, &[(interface_record(0xFF, 0x5D, 0x01), vec![])]);
        let descriptor = DeviceDescriptor::parse(&device, &[config]).unwrap();
        assert_eq!(descriptor.class_identifier(0, 0).unwrap(), (0xFF, 0xFF, 0xFF, 0x5D));
        assert!(matches!(
            descriptor.class_identifier(0, 1),
            Err(Error::IndexOutOfRange)
        ));
        assert!(matches!(
            descriptor.class_identifier(1, 0),
            Err(Error::IndexOutOfRange)
        ));
    }
}
