//! Commandable relay with optional self-toggling.

use fieldsim_types::DeviceDefinition;

use crate::error::DeviceError;
use crate::model::{DeviceCore, DeviceModel, impl_core_access};
use crate::params::ParamReader;
use crate::signal::Toggle;

/// Holds a boolean state that external writers may command.
#[derive(Debug)]
pub struct Relay {
    core: DeviceCore,
    default_state: bool,
    auto_toggle: bool,
    toggle: Toggle,
}

impl Relay {
    /// Registered type name.
    pub const TYPE_NAME: &'static str = "relay";

    /// Build from a definition.
    pub fn from_definition(def: &DeviceDefinition, seed: u64) -> Result<Self, DeviceError> {
        let p = ParamReader::new(&def.name, &def.parameters);
        let default_state = p.boolean("defaultState", false)?;
        Ok(Self {
            core: DeviceCore::new(def, seed),
            default_state,
            auto_toggle: p.boolean("autoToggle", false)?,
            toggle: Toggle::new(default_state, p.positive("togglePeriod", 10.0)?),
        })
    }

    /// Current contact state.
    pub const fn state(&self) -> bool {
        self.toggle.state()
    }
}

impl DeviceModel for Relay {
    impl_core_access!();

    fn type_name(&self) -> &'static str {
        Self::TYPE_NAME
    }

    fn step(&mut self, t: f64, _dt: f64) -> f64 {
        let on = if self.auto_toggle {
            self.toggle.advance(t)
        } else {
            self.toggle.state()
        };
        if on { 1.0 } else { 0.0 }
    }

    fn quiescent_value(&self) -> f64 {
        0.0
    }

    fn reset_state(&mut self) {
        self.toggle.reset(self.default_state);
    }

    fn command(&mut self, value: f64) -> bool {
        self.toggle.set(value != 0.0);
        true
    }

    fn follows_tag_commands(&self) -> bool {
        !self.auto_toggle
    }
}
