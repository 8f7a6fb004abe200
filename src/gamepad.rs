//! Connection manager and poller.
//!
//! [`Gamepad`] coordinates device identification, initialization, and reading
//! for one controller slot. The caller drives it with [`Gamepad::update`]
//! once per frame or tick; everything else — searching, claiming, handshakes,
//! throttled polling, debouncing, failure quarantine, forced disconnect —
//! happens behind that single entry point.
//!
//! Lifecycle: unbound, the gamepad searches for an attachable device at most
//! once per search delay, trying one candidate per call. Bound, it polls the
//! device at its computed interval and decodes fresh reports into the shared
//! [`GamepadState`]. A timeout ceiling or any hard transport failure tears
//! the binding down and the search resumes.
//!
//! Errors never escape `update()`: setup failures quarantine the device id in
//! the shared [`ConnectionRegistry`] and the search moves on; polling
//! failures surface only as the connected flag flipping false. One bad device
//! never takes down the loop for the others.

use std::time::{Duration, Instant};

use tracing::{debug, trace, warn};

use crate::classifier::{classify, DeviceFamily};
use crate::config::TuningProfile;
use crate::descriptor::DeviceDescriptor;
use crate::device::{ActiveDevice, DeviceLink};
use crate::error::{Error, Result};
use crate::families::FamilyDecoder;
use crate::registry::{ConnectionRegistry, SharedRegistry};
use crate::state::{ButtonEvent, ButtonId, Buttons, GamepadState};
use crate::transport::{UsbDeviceInfo, UsbHost};

/// Consecutive-timeout ceiling; one more forces a disconnect.
const MAX_TIMEOUTS: u32 = 99;

/// Minimum time between device searches while unbound.
const SEARCH_DELAY: Duration = Duration::from_secs(1);

/// One controller slot: search, bind, poll, decode.
pub struct Gamepad {
    host: Box<dyn UsbHost>,
    port: Option<u8>,
    verbose: bool,
    registry: SharedRegistry,
    state: GamepadState,
    active: Option<ActiveDevice>,
    timeouts: u32,
    search_delay: Duration,
    last_search: Option<Instant>,
}

impl Gamepad {
    /// Bind a new slot to `host`, optionally pinned to a physical hub port.
    ///
    /// `port = None` accepts the first attachable device found anywhere. The
    /// slot gets its own fresh registry; use [`Gamepad::with_registry`] when
    /// several slots share one physical host.
    pub fn new(host: impl UsbHost + 'static, port: Option<u8>) -> Self {
        Self::with_registry(host, port, ConnectionRegistry::shared())
    }

    /// Bind a new slot sharing a claim/quarantine registry with other slots.
    pub fn with_registry(host: impl UsbHost + 'static, port: Option<u8>, registry: SharedRegistry) -> Self {
        Self {
            host: Box::new(host),
            port,
            verbose: false,
            registry,
            state: GamepadState::new(),
            active: None,
            timeouts: 0,
            search_delay: SEARCH_DELAY,
            last_search: None,
        }
    }

    /// Enable per-report trace diagnostics for this slot.
    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Override the minimum time between device searches.
    pub fn set_search_delay(&mut self, delay: Duration) {
        self.search_delay = delay;
    }

    /// Advance the slot by one tick.
    ///
    /// Searches for a device when unbound (rate-limited, one candidate per
    /// call), polls and decodes when bound. Returns whether the gamepad state
    /// changed this call. Transport trouble never propagates; a failed
    /// binding simply flips [`Gamepad::connected`] back to false.
    pub fn update(&mut self) -> bool {
        self.state.begin_update();

        if self.active.is_none() && self.search_due() {
            self.search();
            self.last_search = Some(Instant::now());
        }
        let Some(active) = self.active.as_mut() else {
            return false;
        };

        match active.read_state(&mut self.state) {
            Ok(updated) => updated,
            Err(Error::TransportTimeout) => {
                self.timeouts += 1;
                if self.timeouts > MAX_TIMEOUTS {
                    debug!(port = ?self.port, "device exceeded max timeouts");
                    return self.disconnect();
                }
                false
            }
            Err(error) => {
                warn!(port = ?self.port, %error, "transport failure while polling");
                self.disconnect()
            }
        }
    }

    fn search_due(&self) -> bool {
        self.last_search
            .map_or(true, |last| last.elapsed() >= self.search_delay)
    }

    /// One search cycle: enumerate, filter, and attempt the first remaining
    /// candidate. A failed attempt quarantines the device id; the next cycle
    /// moves on to the next candidate.
    fn search(&mut self) {
        let devices = match self.host.enumerate() {
            Ok(devices) => devices,
            Err(error) => {
                warn!(%error, "device enumeration failed");
                return;
            }
        };

        let candidate = devices.into_iter().find(|info| self.is_candidate(info));
        let Some(info) = candidate else {
            return;
        };

        if self.verbose {
            trace!(
                "gamepad device found: {:04x}:{:04x} port {:?}",
                info.vendor_id,
                info.product_id,
                info.port_numbers
            );
        }

        if let Err(error) = self.try_attach(&info) {
            debug!(
                "failed to initialize device {:04x}:{:04x}: {}",
                info.vendor_id, info.product_id, error
            );
            self.registry.borrow_mut().mark_failed(info.identity());
        }
    }

    fn is_candidate(&self, info: &UsbDeviceInfo) -> bool {
        let identity = info.identity();
        let registry = self.registry.borrow();
        if registry.is_claimed(self.port, identity) || registry.is_failed(identity) {
            return false;
        }
        if let Some(port) = self.port {
            match &info.port_numbers {
                // No hub in between: only the root port (1) can match.
                None => {
                    if port != 1 {
                        return false;
                    }
                }
                Some(path) => {
                    if path.as_slice() != [port] {
                        return false;
                    }
                }
            }
        }
        true
    }

    /// Fetch descriptors, classify, claim, and initialize one candidate.
    fn try_attach(&mut self, info: &UsbDeviceInfo) -> Result<()> {
        let mut handle = self.host.open(info)?;

        let device_bytes = handle.device_descriptor_bytes()?;
        let configuration_count = device_bytes.get(17).copied().unwrap_or(0);
        let mut configuration_bytes = Vec::with_capacity(configuration_count as usize);
        for index in 0..configuration_count {
            configuration_bytes.push(handle.configuration_descriptor_bytes(index)?);
        }
        let descriptor = DeviceDescriptor::parse(&device_bytes, &configuration_bytes)?;

        let identity = info.identity();
        let family = classify(identity, &descriptor);
        if family == DeviceFamily::Unknown {
            return Err(Error::UnsupportedTopology("device not recognized"));
        }
        debug!(family = family.name(), "device identified");

        let (mut decoder, interface) = FamilyDecoder::attach(family, &descriptor)?;
        let mut link = DeviceLink::open(
            handle,
            descriptor,
            0,
            interface,
            info.speed,
            identity,
            self.verbose,
        )?;
        decoder.init(&mut link)?;

        // Player LED follows the port number; cosmetic, so a refused write
        // does not fail the binding.
        if let Err(error) = decoder.set_led(&mut link, self.port.unwrap_or(0)) {
            debug!(%error, "player led not set");
        }

        self.registry.borrow_mut().claim(self.port, identity);
        self.active = Some(ActiveDevice { link, decoder });
        debug!(family = family.name(), port = ?self.port, "controller connected");
        Ok(())
    }

    /// Release the bound device, if any.
    ///
    /// Removes the claim, drops the transport handle, resets the timeout
    /// counter and the gamepad state. Idempotent: returns false when nothing
    /// was bound.
    pub fn disconnect(&mut self) -> bool {
        let Some(active) = self.active.take() else {
            return false;
        };
        let identity = active.link.identity();
        debug!("disconnecting from device {:04x}:{:04x}", identity.0, identity.1);
        self.registry.borrow_mut().release(self.port, identity);
        self.timeouts = 0;
        self.state.reset();
        true
    }

    // --- read-only surface ---

    /// Whether a controller is currently bound.
    pub fn connected(&self) -> bool {
        self.active.is_some()
    }

    /// Family of the bound controller, `Unknown` when unbound.
    pub fn family(&self) -> DeviceFamily {
        self.active
            .as_ref()
            .map(|a| a.decoder.family())
            .unwrap_or_default()
    }

    /// The port this slot was pinned to at construction.
    pub fn port(&self) -> Option<u8> {
        self.port
    }

    /// Effective poll interval of the bound device, in milliseconds.
    pub fn poll_interval_ms(&self) -> Option<u64> {
        self.active.as_ref().map(|a| a.link.interval_ms())
    }

    /// Parsed topology of the bound device.
    pub fn descriptor(&self) -> Option<&DeviceDescriptor> {
        self.active.as_ref().map(|a| a.link.descriptor())
    }

    /// Digital button state.
    pub fn buttons(&self) -> &Buttons {
        self.state.buttons()
    }

    /// Whether one button is currently pressed.
    pub fn button(&self, id: ButtonId) -> bool {
        self.state.buttons().get(id)
    }

    /// Press/release records for every button that changed in the last
    /// update, in fixed button order.
    pub fn events(&self) -> impl Iterator<Item = ButtonEvent> {
        self.state.buttons().events()
    }

    /// Left trigger pull, `0.0..=1.0`.
    pub fn left_trigger(&self) -> f32 {
        self.state.left_trigger()
    }

    /// Right trigger pull, `0.0..=1.0`.
    pub fn right_trigger(&self) -> f32 {
        self.state.right_trigger()
    }

    /// Left stick `(x, y)`, each `-1.0..=1.0`.
    pub fn left_joystick(&self) -> (f32, f32) {
        self.state.left_joystick()
    }

    /// Right stick `(x, y)`, each `-1.0..=1.0`.
    pub fn right_joystick(&self) -> (f32, f32) {
        self.state.right_joystick()
    }

    // --- tuning ---

    pub fn trigger_threshold(&self) -> f32 {
        self.state.trigger_threshold()
    }

    pub fn set_trigger_threshold(&mut self, value: f32) {
        self.state.set_trigger_threshold(value);
    }

    pub fn joystick_threshold(&self) -> f32 {
        self.state.joystick_threshold()
    }

    pub fn set_joystick_threshold(&mut self, value: f32) {
        self.state.set_joystick_threshold(value);
    }

    pub fn joystick_deadzone(&self) -> f32 {
        self.state.joystick_deadzone()
    }

    pub fn set_joystick_deadzone(&mut self, value: f32) {
        self.state.set_joystick_deadzone(value);
    }

    pub fn set_left_joystick_invert_x(&mut self, invert: bool) {
        self.state.left_joystick_invert_x = invert;
    }

    pub fn set_left_joystick_invert_y(&mut self, invert: bool) {
        self.state.left_joystick_invert_y = invert;
    }

    pub fn set_right_joystick_invert_x(&mut self, invert: bool) {
        self.state.right_joystick_invert_x = invert;
    }

    pub fn set_right_joystick_invert_y(&mut self, invert: bool) {
        self.state.right_joystick_invert_y = invert;
    }

    /// Apply a saved tuning profile to this slot.
    pub fn apply_profile(&mut self, profile: &TuningProfile) {
        profile.apply(&mut self.state);
    }

    /// Capture the current tuning as a profile.
    pub fn profile(&self) -> TuningProfile {
        TuningProfile::from_state(&self.state)
    }

    // --- control output ---

    /// Set the player LED index. Families with no LED ignore the call.
    /// Returns false when no device is bound.
    pub fn set_led(&mut self, index: u8) -> bool {
        let Some(ActiveDevice { link, decoder }) = self.active.as_mut() else {
            return false;
        };
        if let Err(error) = decoder.set_led(link, index) {
            debug!(%error, "player led not set");
        }
        true
    }

    /// Set an arbitrary light bar color (DualShock 4 only).
    /// Returns whether the bound family supports it.
    pub fn set_color(&mut self, rgb: u32) -> bool {
        let Some(ActiveDevice { link, decoder }) = self.active.as_mut() else {
            return false;
        };
        match decoder.set_color(link, rgb) {
            Ok(supported) => supported,
            Err(error) => {
                debug!(%error, "light bar color not set");
                false
            }
        }
    }

    /// Set rumble magnitude `0.0..=1.0` (DualShock 4 only).
    /// Returns whether the bound family supports it.
    pub fn set_rumble(&mut self, value: f32) -> bool {
        let Some(ActiveDevice { link, decoder }) = self.active.as_mut() else {
            return false;
        };
        match decoder.set_rumble(link, value) {
            Ok(supported) => supported,
            Err(error) => {
                debug!(%error, "rumble not set");
                false
            }
        }
    }

    /// Set the light bar flash period in seconds (DualShock 4 only).
    /// Returns whether the bound family supports it.
    pub fn set_flash(&mut self, period: f32) -> bool {
        let Some(ActiveDevice { link, decoder }) = self.active.as_mut() else {
            return false;
        };
        match decoder.set_flash(link, period) {
            Ok(supported) => supported,
            Err(error) => {
                debug!(%error, "flash period not set");
                false
            }
        }
    }
}
