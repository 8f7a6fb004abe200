//! Claimed-device I/O.
//!
//! [`DeviceLink`] wraps an opened transport handle together with the parsed
//! topology, the chosen interface's endpoint pair, the report double-buffer,
//! and the computed poll interval. It owns the low-level transfer discipline:
//! bounded reads into the report buffer, write-then-ACK for handshake
//! traffic, and the stale-report flush.
//!
//! [`ActiveDevice`] pairs a link with its family decoder; the two are created
//! and destroyed as a unit by the connection manager.

use std::time::{Duration, Instant};

use tracing::trace;

use crate::descriptor::{DeviceDescriptor, EndpointDescriptor};
use crate::error::{Error, Result};
use crate::families::FamilyDecoder;
use crate::registry::DeviceIdentity;
use crate::state::GamepadState;
use crate::transport::{UsbDeviceHandle, UsbSpeed};

/// Report buffers never exceed this many bytes regardless of what the
/// endpoint advertises.
const REPORT_BUFFER_CAP: u16 = 64;

/// Read attempts made while waiting for a write acknowledgement.
const ACK_ATTEMPTS: usize = 8;

/// Discard reads performed by [`DeviceLink::flush`].
const FLUSH_READS: usize = 8;

/// An opened, claimed controller interface.
pub struct DeviceLink {
    handle: Box<dyn UsbDeviceHandle>,
    descriptor: DeviceDescriptor,
    identity: DeviceIdentity,
    in_endpoint: Option<EndpointDescriptor>,
    out_endpoint: Option<EndpointDescriptor>,
    report: Vec<u8>,
    previous: Vec<u8>,
    interval_ms: u64,
    last_poll: Instant,
    verbose: bool,
}

impl DeviceLink {
    /// Claim `interface` of `configuration` and prepare for polling.
    ///
    /// Fails with `UnsupportedTopology` when the interface exposes neither an
    /// IN nor an OUT endpoint, and with `IndexOutOfRange` for indices outside
    /// the parsed topology.
    pub(crate) fn open(
        mut handle: Box<dyn UsbDeviceHandle>,
        descriptor: DeviceDescriptor,
        configuration: usize,
        interface: usize,
        speed: UsbSpeed,
        identity: DeviceIdentity,
        verbose: bool,
    ) -> Result<Self> {
        let config = descriptor
            .configurations
            .get(configuration)
            .ok_or(Error::IndexOutOfRange)?;
        let iface = config.interfaces.get(interface).ok_or(Error::IndexOutOfRange)?;
        let in_endpoint = iface.in_endpoint().copied();
        let out_endpoint = iface.out_endpoint().copied();
        if in_endpoint.is_none() && out_endpoint.is_none() {
            return Err(Error::UnsupportedTopology("interface has no endpoints"));
        }

        handle.claim(interface as u8, config.value)?;

        let packet_size = REPORT_BUFFER_CAP.min(
            in_endpoint
                .map(|e| e.max_packet_size)
                .unwrap_or(0)
                .max(out_endpoint.map(|e| e.max_packet_size).unwrap_or(0)),
        ) as usize;

        let raw_interval = in_endpoint
            .map(|e| e.interval)
            .unwrap_or(0)
            .max(out_endpoint.map(|e| e.interval).unwrap_or(0));
        let interval_ms = effective_interval_ms(raw_interval, speed);

        Ok(Self {
            handle,
            descriptor,
            identity,
            in_endpoint,
            out_endpoint,
            report: vec![0u8; packet_size],
            previous: vec![0u8; packet_size],
            interval_ms,
            last_poll: Instant::now(),
            verbose,
        })
    }

    pub fn identity(&self) -> DeviceIdentity {
        self.identity
    }

    pub fn descriptor(&self) -> &DeviceDescriptor {
        &self.descriptor
    }

    /// Effective poll interval in milliseconds.
    pub fn interval_ms(&self) -> u64 {
        self.interval_ms
    }

    /// Read one report into the current-report buffer.
    ///
    /// Returns the byte count; 0 when the interface has no IN endpoint.
    pub(crate) fn read(&mut self) -> Result<usize> {
        let Some(endpoint) = self.in_endpoint else {
            return Ok(0);
        };
        self.handle
            .read(endpoint.address, &mut self.report, self.interval_ms as u32)
    }

    /// Write `data` to the OUT endpoint.
    ///
    /// With `acknowledge`, waits for any successful read afterwards (up to
    /// [`ACK_ATTEMPTS`], swallowing per-read failures). Returns `Ok(false)`
    /// when the interface has no OUT endpoint, the write times out, or no
    /// acknowledgement arrives; hard write failures propagate.
    pub(crate) fn write(&mut self, data: &[u8], acknowledge: bool) -> Result<bool> {
        let Some(endpoint) = self.out_endpoint else {
            return Ok(false);
        };
        match self.handle.write(endpoint.address, data, self.interval_ms as u32) {
            Ok(()) => {}
            Err(Error::TransportTimeout) => return Ok(false),
            Err(e) => return Err(e),
        }
        if !acknowledge {
            return Ok(true);
        }
        for _ in 0..ACK_ATTEMPTS {
            if self.read().is_ok() {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Drain stale reports left over from enumeration.
    ///
    /// Timeouts are expected and swallowed; hard failures propagate.
    pub(crate) fn flush(&mut self) -> Result<()> {
        for _ in 0..FLUSH_READS {
            match self.read() {
                Ok(_) | Err(Error::TransportTimeout) => {}
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }
}

/// Convert a raw endpoint interval to milliseconds.
///
/// Low/full speed report the interval directly in ms. High speed reports an
/// exponent: 2^(interval − 1) frames of 125 µs.
fn effective_interval_ms(raw: u8, speed: UsbSpeed) -> u64 {
    match speed {
        UsbSpeed::High => {
            if raw == 0 {
                0
            } else {
                (1u64 << (raw as u32).min(63)) >> 3
            }
        }
        _ => raw as u64,
    }
}

/// A bound controller: the claimed link plus its family decoder state.
pub struct ActiveDevice {
    pub(crate) link: DeviceLink,
    pub(crate) decoder: FamilyDecoder,
}

impl ActiveDevice {
    /// Poll once if the interval has elapsed and decode any fresh report.
    ///
    /// Returns `Ok(false)` when throttled, when nothing was received, or when
    /// the report repeats the previous one byte-for-byte up to the read
    /// length. The poll timestamp advances on every attempted read.
    pub(crate) fn read_state(&mut self, state: &mut GamepadState) -> Result<bool> {
        let Self { link, decoder } = self;
        if link.last_poll.elapsed() < Duration::from_millis(link.interval_ms) {
            return Ok(false);
        }
        link.last_poll = Instant::now();

        let count = link.read()?;
        if count == 0 || link.report[..count] == link.previous[..count] {
            return Ok(false);
        }
        link.previous.copy_from_slice(&link.report);

        if link.verbose {
            trace!(report = ?&link.report[..count], "report");
        }
        decoder.decode(&link.report, state);
        Ok(true)
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_speed_interval_is_direct() {
        assert_eq!(effective_interval_ms(8, UsbSpeed::Full), 8);
        assert_eq!(effective_interval_ms(10, UsbSpeed::Low), 10);
        assert_eq!(effective_interval_ms(0, UsbSpeed::Full), 0);
    }

    #[test]
    fn high_speed_interval_is_exponential() {
        // 2^(raw) / 8 ms, matching the 125 µs frame scaling.
        assert_eq!(effective_interval_ms(4, UsbSpeed::High), 2);
        assert_eq!(effective_interval_ms(7, UsbSpeed::High), 16);
        assert_eq!(effective_interval_ms(1, UsbSpeed::High), 0);
        assert_eq!(effective_interval_ms(0, UsbSpeed::High), 0);
    }
}
