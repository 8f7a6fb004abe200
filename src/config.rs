//! Persistable tuning profile.
//!
//! [`TuningProfile`] captures the caller-adjustable knobs of a gamepad —
//! thresholds, deadzone, axis inversion — as a serde value that round-trips
//! through TOML, so applications can keep per-controller tuning next to their
//! other settings files.

use serde::{Deserialize, Serialize};

use crate::state::{
    GamepadState, DEFAULT_JOYSTICK_DEADZONE, DEFAULT_JOYSTICK_THRESHOLD, DEFAULT_TRIGGER_THRESHOLD,
};

/// Tuning knobs for one gamepad. All fractions of full range, `0.0..=1.0`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TuningProfile {
    /// Trigger pull at which `L2`/`R2` activate.
    pub trigger_threshold: f32,
    /// Left-stick deflection at which the `JOYSTICK_*` buttons activate.
    pub joystick_threshold: f32,
    /// Stick deflection treated as exactly zero.
    pub joystick_deadzone: f32,
    pub left_joystick_invert_x: bool,
    pub left_joystick_invert_y: bool,
    pub right_joystick_invert_x: bool,
    pub right_joystick_invert_y: bool,
}

impl Default for TuningProfile {
    fn default() -> Self {
        Self {
            trigger_threshold: DEFAULT_TRIGGER_THRESHOLD,
            joystick_threshold: DEFAULT_JOYSTICK_THRESHOLD,
            joystick_deadzone: DEFAULT_JOYSTICK_DEADZONE,
            left_joystick_invert_x: false,
            left_joystick_invert_y: false,
            right_joystick_invert_x: false,
            right_joystick_invert_y: false,
        }
    }
}

impl TuningProfile {
    /// Parse a profile from TOML text. Missing keys fall back to defaults.
    pub fn from_toml_str(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }

    /// Serialize the profile as TOML text.
    pub fn to_toml_string(&self) -> Result<String, toml::ser::Error> {
        toml::to_string(self)
    }

    /// Capture the current tuning of a state.
    pub fn from_state(state: &GamepadState) -> Self {
        Self {
            trigger_threshold: state.trigger_threshold(),
            joystick_threshold: state.joystick_threshold(),
            joystick_deadzone: state.joystick_deadzone(),
            left_joystick_invert_x: state.left_joystick_invert_x,
            left_joystick_invert_y: state.left_joystick_invert_y,
            right_joystick_invert_x: state.right_joystick_invert_x,
            right_joystick_invert_y: state.right_joystick_invert_y,
        }
    }

    /// Apply every knob to a state.
    pub fn apply(&self, state: &mut GamepadState) {
        state.set_trigger_threshold(self.trigger_threshold);
        state.set_joystick_threshold(self.joystick_threshold);
        state.set_joystick_deadzone(self.joystick_deadzone);
        state.left_joystick_invert_x = self.left_joystick_invert_x;
        state.left_joystick_invert_y = self.left_joystick_invert_y;
        state.right_joystick_invert_x = self.right_joystick_invert_x;
        state.right_joystick_invert_y = self.right_joystick_invert_y;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::ButtonId;

    #[test]
    fn missing_keys_default() {
        let profile = TuningProfile::from_toml_str("joystick_deadzone = 0.2\n").unwrap();
        assert_eq!(profile.joystick_deadzone, 0.2);
        assert_eq!(profile.trigger_threshold, DEFAULT_TRIGGER_THRESHOLD);
        assert!(!profile.left_joystick_invert_y);
    }

    #[test]
    fn toml_round_trip() {
        let profile = TuningProfile {
            trigger_threshold: 0.75,
            left_joystick_invert_y: true,
            ..TuningProfile::default()
        };
        let text = profile.to_toml_string().unwrap();
        assert_eq!(TuningProfile::from_toml_str(&text).unwrap(), profile);
    }

    #[test]
    fn apply_reaches_derived_buttons() {
        let mut state = GamepadState::new();
        let profile = TuningProfile {
            trigger_threshold: 0.9,
            ..TuningProfile::default()
        };
        profile.apply(&mut state);
        state.set_left_trigger(0.6);
        assert!(!state.buttons().get(ButtonId::L2));
        state.set_left_trigger(0.95);
        assert!(state.buttons().get(ButtonId::L2));
    }
}
