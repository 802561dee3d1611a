//! The device model contract and the record every model shares.
//!
//! A model owns a [`DeviceCore`] by composition and implements the
//! model-specific hooks of [`DeviceModel`]. The provided methods handle the
//! common lifecycle: a disabled model answers with its quiescent value and
//! touches nothing, an enabled one advances its clock and then steps its
//! dynamics.

use std::fmt;
use std::time::Duration;

use fieldsim_types::DeviceDefinition;
use rand::SeedableRng;
use rand::rngs::StdRng;

use crate::signal;

/// Fields common to every device model.
#[derive(Debug)]
pub struct DeviceCore {
    name: String,
    address: String,
    description: String,
    update_interval: Duration,
    enabled: bool,
    /// Simulation clock in seconds; advances only while enabled.
    elapsed: f64,
    seed: u64,
    rng: StdRng,
}

impl DeviceCore {
    /// Build the shared record for `def` with a private RNG seeded from
    /// `seed`.
    pub fn new(def: &DeviceDefinition, seed: u64) -> Self {
        let interval_ms = u64::try_from(def.update_interval_ms).unwrap_or(0);
        Self {
            name: def.name.clone(),
            address: def.address.clone(),
            description: def.description.clone(),
            update_interval: Duration::from_millis(interval_ms),
            enabled: def.enabled,
            elapsed: 0.0,
            seed,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Device name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// External address token.
    pub fn address(&self) -> &str {
        &self.address
    }

    /// Free-text description.
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Advisory update interval from the definition.
    pub const fn update_interval(&self) -> Duration {
        self.update_interval
    }

    /// Whether the model is enabled.
    pub const fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Enable or disable the model.
    pub const fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    /// Seconds of enabled simulation time.
    pub const fn elapsed(&self) -> f64 {
        self.elapsed
    }

    /// The seed the private RNG starts from.
    pub const fn seed(&self) -> u64 {
        self.seed
    }

    /// The model's private RNG.
    pub const fn rng(&mut self) -> &mut StdRng {
        &mut self.rng
    }

    /// Advance the clock by `dt` seconds and return the new elapsed time.
    pub fn advance(&mut self, dt: f64) -> f64 {
        self.elapsed += dt;
        self.elapsed
    }

    /// Zero the clock and reseed the RNG.
    pub fn reset(&mut self) {
        self.elapsed = 0.0;
        self.rng = StdRng::seed_from_u64(self.seed);
    }

    /// Gaussian noise from the private RNG.
    pub fn gaussian(&mut self, std_dev: f64) -> f64 {
        signal::gaussian(&mut self.rng, std_dev)
    }

    /// Bernoulli trial from the private RNG.
    pub fn chance(&mut self, p: f64) -> bool {
        signal::chance(&mut self.rng, p)
    }
}

/// A polymorphic unit of continuous-time simulation.
///
/// Implementors supply the hooks (`core`, `core_mut`, `step`,
/// `quiescent_value`, `reset_state`); everything else is provided.
pub trait DeviceModel: Send + fmt::Debug {
    /// Registered type name of this model.
    fn type_name(&self) -> &'static str;

    /// Shared fields.
    fn core(&self) -> &DeviceCore;

    /// Shared fields, mutably.
    fn core_mut(&mut self) -> &mut DeviceCore;

    /// Advance model dynamics. `t` is the already-advanced elapsed time and
    /// `dt` the step, both in seconds.
    fn step(&mut self, t: f64, dt: f64) -> f64;

    /// The value reported while disabled.
    fn quiescent_value(&self) -> f64;

    /// Clear model-specific transient state. The core has already been
    /// reset when this runs.
    fn reset_state(&mut self);

    /// Apply an external command. Returns `false` when the model ignores it.
    fn command(&mut self, _value: f64) -> bool {
        false
    }

    /// Whether writes to this device's tag should be forwarded to
    /// [`command`](Self::command).
    fn follows_tag_commands(&self) -> bool {
        false
    }

    /// Advance by `dt` and return the new output value.
    fn update(&mut self, dt: Duration) -> f64 {
        if !self.core().is_enabled() {
            return self.quiescent_value();
        }
        let dt = dt.as_secs_f64();
        let t = self.core_mut().advance(dt);
        self.step(t, dt)
    }

    /// Restore the freshly constructed state, keeping static parameters.
    fn reset(&mut self) {
        self.core_mut().reset();
        self.reset_state();
    }

    /// Device name.
    fn name(&self) -> &str {
        self.core().name()
    }

    /// Whether the model is enabled.
    fn is_enabled(&self) -> bool {
        self.core().is_enabled()
    }

    /// Enable or disable the model.
    fn set_enabled(&mut self, enabled: bool) {
        self.core_mut().set_enabled(enabled);
    }

    /// Seconds of enabled simulation time.
    fn elapsed(&self) -> f64 {
        self.core().elapsed()
    }
}

/// Shorthand for the boilerplate accessors of a model with a `core` field.
macro_rules! impl_core_access {
    () => {
        fn core(&self) -> &$crate::model::DeviceCore {
            &self.core
        }

        fn core_mut(&mut self) -> &mut $crate::model::DeviceCore {
            &mut self.core
        }
    };
}

pub(crate) use impl_core_access;

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::float_cmp)]
mod tests {
    use rand::Rng;

    use super::*;

    #[test]
    fn core_reset_reseeds() {
        let def = DeviceDefinition::new("X", "sine", "%DF1");
        let mut core = DeviceCore::new(&def, 99);
        let first: Vec<u64> = (0..4).map(|_| core.rng().random()).collect();
        core.advance(1.5);
        core.reset();
        let again: Vec<u64> = (0..4).map(|_| core.rng().random()).collect();
        assert_eq!(first, again);
        assert_eq!(core.elapsed(), 0.0);
    }

    #[test]
    fn core_copies_definition_fields() {
        let def = DeviceDefinition::new("Pump", "relay", "%MW4")
            .with_description("feed pump")
            .with_enabled(false);
        let core = DeviceCore::new(&def, 1);
        assert_eq!(core.name(), "Pump");
        assert_eq!(core.address(), "%MW4");
        assert_eq!(core.description(), "feed pump");
        assert!(!core.is_enabled());
        assert_eq!(core.update_interval(), Duration::from_millis(100));
    }
}
