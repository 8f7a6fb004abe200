//! USB transport capability.
//!
//! The driver core never talks to hardware directly; the host platform
//! supplies an implementation of [`UsbHost`] (enumeration, opening) and
//! [`UsbDeviceHandle`] (descriptor fetch, claiming, interrupt transfers).
//! Anything that can enumerate wired USB devices and move fixed-size report
//! packets with bounded timeouts can back these traits.
//!
//! Reads and writes must distinguish an expired bounded wait
//! ([`Error::TransportTimeout`](crate::Error::TransportTimeout)) from any
//! other I/O failure ([`Error::TransportError`](crate::Error::TransportError));
//! the connection manager treats the two very differently.
//!
//! The [`mock`] module provides a scripted in-memory implementation used
//! throughout the test suite.

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Bus speed class of an enumerated device.
///
/// Only the high/not-high distinction matters to the driver: it changes how
/// the endpoint polling interval is interpreted.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum UsbSpeed {
    Low,
    Full,
    High,
}

/// Snapshot of one enumerated device, as reported by the host platform.
///
/// Serializable for diagnostics and logging; `port_numbers` is `None` when
/// the device hangs off the root port with no hub in between.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct UsbDeviceInfo {
    /// USB vendor id.
    pub vendor_id: u16,
    /// USB product id.
    pub product_id: u16,
    /// Hub port path to the device, root-first. `None` = root port / no hub.
    pub port_numbers: Option<Vec<u8>>,
    /// Bus speed the device enumerated at.
    pub speed: UsbSpeed,
    /// Product string reported by the device, when available.
    pub product: Option<String>,
}

impl UsbDeviceInfo {
    /// The `(vendor, product)` identity used for claim and quarantine keys.
    pub fn identity(&self) -> (u16, u16) {
        (self.vendor_id, self.product_id)
    }
}

/// Host-side enumeration and open capability.
pub trait UsbHost {
    /// List currently attached devices.
    fn enumerate(&mut self) -> Result<Vec<UsbDeviceInfo>>;

    /// Open a device for descriptor fetch and transfers.
    fn open(&mut self, info: &UsbDeviceInfo) -> Result<Box<dyn UsbDeviceHandle>>;
}

/// An opened device.
pub trait UsbDeviceHandle {
    /// Raw bytes of the 18-byte device descriptor.
    fn device_descriptor_bytes(&mut self) -> Result<Vec<u8>>;

    /// Raw bytes of the full configuration descriptor stream for the given
    /// configuration index.
    fn configuration_descriptor_bytes(&mut self, index: u8) -> Result<Vec<u8>>;

    /// Detach any conflicting host-claimed driver from `interface`, then set
    /// the active configuration by its numeric value.
    fn claim(&mut self, interface: u8, configuration_value: u8) -> Result<()>;

    /// Interrupt/bulk read from `endpoint` into `buffer`.
    ///
    /// Returns the number of bytes received. An expired wait fails with
    /// `TransportTimeout`.
    fn read(&mut self, endpoint: u8, buffer: &mut [u8], timeout_ms: u32) -> Result<usize>;

    /// Interrupt/bulk write of `data` to `endpoint`.
    fn write(&mut self, endpoint: u8, data: &[u8], timeout_ms: u32) -> Result<()>;
}

pub mod mock {
    //! Scripted transport for tests.
    //!
    //! A [`MockDevice`] holds shared interior state: descriptor bytes, a queue
    //! of read outcomes, and a history of writes and claims. Tests keep their
    //! own clone of the device to inject reports and failures mid-run while
    //! the driver owns the opened handle.

    use std::cell::RefCell;
    use std::collections::VecDeque;
    use std::rc::Rc;

    use super::{UsbDeviceHandle, UsbDeviceInfo, UsbHost, UsbSpeed};
    use crate::error::{Error, Result};

    /// Outcome of one scripted `read` call.
    #[derive(Clone, Debug)]
    pub enum ReadStep {
        /// Deliver these report bytes.
        Report(Vec<u8>),
        /// Fail with `TransportTimeout`.
        Timeout,
        /// Fail with `TransportError`.
        Error,
    }

    #[derive(Debug, Default)]
    struct DeviceState {
        device_bytes: Vec<u8>,
        configuration_bytes: Vec<Vec<u8>>,
        reads: VecDeque<ReadStep>,
        writes: Vec<(u8, Vec<u8>)>,
        claims: Vec<(u8, u8)>,
        descriptor_fetches: usize,
        fail_open: bool,
        fail_descriptors: bool,
        fail_writes: bool,
    }

    /// One scripted device, cloneable so a test can keep poking at it after
    /// handing the host to the driver.
    #[derive(Clone)]
    pub struct MockDevice {
        info: UsbDeviceInfo,
        state: Rc<RefCell<DeviceState>>,
    }

    impl MockDevice {
        pub fn new(vendor_id: u16, product_id: u16) -> Self {
            Self {
                info: UsbDeviceInfo {
                    vendor_id,
                    product_id,
                    port_numbers: None,
                    speed: UsbSpeed::Full,
                    product: None,
                },
                state: Rc::new(RefCell::new(DeviceState::default())),
            }
        }

        pub fn with_port(mut self, port: u8) -> Self {
            self.info.port_numbers = Some(vec![port]);
            self
        }

        pub fn with_speed(mut self, speed: UsbSpeed) -> Self {
            self.info.speed = speed;
            self
        }

        /// Script the raw device descriptor bytes.
        pub fn with_device_descriptor(self, bytes: Vec<u8>) -> Self {
            self.state.borrow_mut().device_bytes = bytes;
            self
        }

        /// Script one configuration descriptor stream (index order).
        pub fn with_configuration(self, bytes: Vec<u8>) -> Self {
            self.state.borrow_mut().configuration_bytes.push(bytes);
            self
        }

        /// Append a report to the read queue.
        pub fn queue_report(&self, bytes: &[u8]) {
            self.state.borrow_mut().reads.push_back(ReadStep::Report(bytes.to_vec()));
        }

        /// Append `count` timeouts to the read queue.
        pub fn queue_timeouts(&self, count: usize) {
            let mut state = self.state.borrow_mut();
            for _ in 0..count {
                state.reads.push_back(ReadStep::Timeout);
            }
        }

        /// Append a hard read failure to the read queue.
        pub fn queue_read_error(&self) {
            self.state.borrow_mut().reads.push_back(ReadStep::Error);
        }

        /// Make `open` fail.
        pub fn fail_open(&self) {
            self.state.borrow_mut().fail_open = true;
        }

        /// Make descriptor fetches fail.
        pub fn fail_descriptors(&self) {
            self.state.borrow_mut().fail_descriptors = true;
        }

        /// Make writes fail with `TransportTimeout`.
        pub fn fail_writes(&self, fail: bool) {
            self.state.borrow_mut().fail_writes = fail;
        }

        /// Everything written to the device so far, as `(endpoint, bytes)`.
        pub fn writes(&self) -> Vec<(u8, Vec<u8>)> {
            self.state.borrow().writes.clone()
        }

        /// Every `(interface, configuration_value)` claim so far.
        pub fn claims(&self) -> Vec<(u8, u8)> {
            self.state.borrow().claims.clone()
        }

        /// Reports and failures still queued.
        pub fn queued_reads(&self) -> usize {
            self.state.borrow().reads.len()
        }

        /// How many times the device descriptor was fetched.
        pub fn descriptor_fetches(&self) -> usize {
            self.state.borrow().descriptor_fetches
        }

        pub fn info(&self) -> &UsbDeviceInfo {
            &self.info
        }
    }

    /// Scripted host over a fixed set of [`MockDevice`]s.
    #[derive(Default)]
    pub struct MockHost {
        devices: Vec<MockDevice>,
        fail_enumerate: bool,
    }

    impl MockHost {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn add_device(&mut self, device: MockDevice) {
            self.devices.push(device);
        }

        pub fn remove_device(&mut self, vendor_id: u16, product_id: u16) {
            self.devices
                .retain(|d| (d.info.vendor_id, d.info.product_id) != (vendor_id, product_id));
        }

        pub fn fail_enumerate(&mut self, fail: bool) {
            self.fail_enumerate = fail;
        }
    }

    impl UsbHost for MockHost {
        fn enumerate(&mut self) -> Result<Vec<UsbDeviceInfo>> {
            if self.fail_enumerate {
                return Err(Error::TransportError("enumeration failed".into()));
            }
            Ok(self.devices.iter().map(|d| d.info.clone()).collect())
        }

        fn open(&mut self, info: &UsbDeviceInfo) -> Result<Box<dyn UsbDeviceHandle>> {
            let device = self
                .devices
                .iter()
                .find(|d| d.info.identity() == info.identity())
                .ok_or_else(|| Error::TransportError("no such device".into()))?;
            if device.state.borrow().fail_open {
                return Err(Error::TransportError("open failed".into()));
            }
            Ok(Box::new(MockHandle {
                state: Rc::clone(&device.state),
            }))
        }
    }

    struct MockHandle {
        state: Rc<RefCell<DeviceState>>,
    }

    impl UsbDeviceHandle for MockHandle {
        fn device_descriptor_bytes(&mut self) -> Result<Vec<u8>> {
            let mut state = self.state.borrow_mut();
            state.descriptor_fetches += 1;
            if state.fail_descriptors {
                return Err(Error::TransportError("descriptor fetch failed".into()));
            }
            Ok(state.device_bytes.clone())
        }

        fn configuration_descriptor_bytes(&mut self, index: u8) -> Result<Vec<u8>> {
            let state = self.state.borrow();
            if state.fail_descriptors {
                return Err(Error::TransportError("descriptor fetch failed".into()));
            }
            state
                .configuration_bytes
                .get(index as usize)
                .cloned()
                .ok_or_else(|| Error::TransportError("no such configuration".into()))
        }

        fn claim(&mut self, interface: u8, configuration_value: u8) -> Result<()> {
            self.state.borrow_mut().claims.push((interface, configuration_value));
            Ok(())
        }

        fn read(&mut self, _endpoint: u8, buffer: &mut [u8], _timeout_ms: u32) -> Result<usize> {
            match self.state.borrow_mut().reads.pop_front() {
                Some(ReadStep::Report(bytes)) => {
                    let n = bytes.len().min(buffer.len());
                    buffer[..n].copy_from_slice(&bytes[..n]);
                    Ok(n)
                }
                Some(ReadStep::Timeout) | None => Err(Error::TransportTimeout),
                Some(ReadStep::Error) => Err(Error::TransportError("injected read failure".into())),
            }
        }

        fn write(&mut self, endpoint: u8, data: &[u8], _timeout_ms: u32) -> Result<()> {
            let mut state = self.state.borrow_mut();
            if state.fail_writes {
                return Err(Error::TransportTimeout);
            }
            state.writes.push((endpoint, data.to_vec()));
            Ok(())
        }
    }

    /// Build raw 18-byte device descriptor bytes.
    pub fn device_bytes(class: u8, subclass: u8, protocol: u8, max_packet: u8, configurations: u8) -> Vec<u8> {
        let mut bytes = vec![0u8; 18];
        bytes[0] = 18;
        bytes[1] = crate::descriptor::DESCRIPTOR_DEVICE;
        bytes[2] = 0x00;
        bytes[3] = 0x02; // bcdUSB 2.00
        bytes[4] = class;
        bytes[5] = subclass;
        bytes[6] = protocol;
        bytes[7] = max_packet;
        bytes[17] = configurations;
        bytes
    }

    /// Build one raw interface record.
    pub fn interface_record(class: u8, subclass: u8, protocol: u8) -> Vec<u8> {
        vec![9, crate::descriptor::DESCRIPTOR_INTERFACE, 0, 0, 0, class, subclass, protocol, 0]
    }

    /// Build one raw endpoint record.
    pub fn endpoint_record(address: u8, attributes: u8, max_packet_size: u16, interval: u8) -> Vec<u8> {
        let size = max_packet_size.to_le_bytes();
        vec![7, crate::descriptor::DESCRIPTOR_ENDPOINT, address, attributes, size[0], size[1], interval]
    }

    /// Build one raw HID class record carrying the usage prelude.
    pub fn hid_record(page: u8, id: u8) -> Vec<u8> {
        vec![13, crate::descriptor::DESCRIPTOR_HID, 0x11, 0x01, 0, 1, 0x22, 0x41, 0x00, 0x05, page, 0x09, id]
    }

    /// Assemble a full configuration descriptor stream: the configuration
    /// record followed by each interface record and its trailing records
    /// (endpoints, HID) in order.
    pub fn config_bytes(value: u8, interfaces: &[(Vec<u8>, Vec<Vec<u8>>)]) -> Vec<u8> {
        let mut bytes = vec![
            9,
            crate::descriptor::DESCRIPTOR_CONFIGURATION,
            0,
            0, // wTotalLength patched below
            interfaces.len() as u8,
            value,
            0,
            0x80,
            50,
        ];
        for (interface, trailing) in interfaces {
            bytes.extend_from_slice(interface);
            for record in trailing {
                bytes.extend_from_slice(record);
            }
        }
        let total = (bytes.len() as u16).to_le_bytes();
        bytes[2] = total[0];
        bytes[3] = total[1];
        bytes
    }
}
