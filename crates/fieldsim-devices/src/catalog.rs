//! The constructor table mapping type names to model constructors.
//!
//! The table is an ordinary value: build it with [`ModelCatalog::builtin`],
//! extend it with [`ModelCatalog::register`], and hand it to the loader.
//! Definitions are checked against it with [`ModelCatalog::validate`] before
//! any model is constructed.
//!
//! # Seeds
//!
//! Every model gets its own seed. An explicit `seed` parameter wins; with a
//! simulator-wide seed the device seed is derived from it and the device
//! name, so runs are reproducible; with neither, the seed comes from OS
//! entropy.

use std::collections::BTreeMap;

use fieldsim_types::DeviceDefinition;
use tracing::debug;

use crate::error::DeviceError;
use crate::model::DeviceModel;
use crate::models::{
    Digital, IntegerActuator, Noise, Pressure, RandomWalk, Relay, ServoMotor, Sine, StepMotor,
    Temperature, Vibration,
};

/// Builds one model from its definition and resolved seed.
pub type Constructor = fn(&DeviceDefinition, u64) -> Result<Box<dyn DeviceModel>, DeviceError>;

fn boxed<M: DeviceModel + 'static>(model: M) -> Box<dyn DeviceModel> {
    Box::new(model)
}

/// Explicit map from type name to constructor.
#[derive(Debug, Clone, Default)]
pub struct ModelCatalog {
    constructors: BTreeMap<String, Constructor>,
}

impl ModelCatalog {
    /// A catalog with no types registered.
    pub fn empty() -> Self {
        Self::default()
    }

    /// A catalog with all eleven built-in models.
    pub fn builtin() -> Self {
        let mut catalog = Self::empty();
        catalog.register(Temperature::TYPE_NAME, |def, seed| {
            Temperature::from_definition(def, seed).map(boxed)
        });
        catalog.register(Pressure::TYPE_NAME, |def, seed| {
            Pressure::from_definition(def, seed).map(boxed)
        });
        catalog.register(Sine::TYPE_NAME, |def, seed| {
            Sine::from_definition(def, seed).map(boxed)
        });
        catalog.register(RandomWalk::TYPE_NAME, |def, seed| {
            RandomWalk::from_definition(def, seed).map(boxed)
        });
        catalog.register(Digital::TYPE_NAME, |def, seed| {
            Digital::from_definition(def, seed).map(boxed)
        });
        catalog.register(Vibration::TYPE_NAME, |def, seed| {
            Vibration::from_definition(def, seed).map(boxed)
        });
        catalog.register(Noise::TYPE_NAME, |def, seed| {
            Noise::from_definition(def, seed).map(boxed)
        });
        catalog.register(Relay::TYPE_NAME, |def, seed| {
            Relay::from_definition(def, seed).map(boxed)
        });
        catalog.register(IntegerActuator::TYPE_NAME, |def, seed| {
            IntegerActuator::from_definition(def, seed).map(boxed)
        });
        catalog.register(StepMotor::TYPE_NAME, |def, seed| {
            StepMotor::from_definition(def, seed).map(boxed)
        });
        catalog.register(ServoMotor::TYPE_NAME, |def, seed| {
            ServoMotor::from_definition(def, seed).map(boxed)
        });
        catalog
    }

    /// Register `constructor` under `type_name`, returning any constructor
    /// it replaces.
    pub fn register(&mut self, type_name: &str, constructor: Constructor) -> Option<Constructor> {
        self.constructors.insert(type_name.to_owned(), constructor)
    }

    /// Whether `type_name` is registered.
    pub fn contains(&self, type_name: &str) -> bool {
        self.constructors.contains_key(type_name)
    }

    /// Registered type names in sorted order.
    pub fn type_names(&self) -> impl Iterator<Item = &str> {
        self.constructors.keys().map(String::as_str)
    }

    /// Number of registered types.
    pub fn len(&self) -> usize {
        self.constructors.len()
    }

    /// Whether no types are registered.
    pub fn is_empty(&self) -> bool {
        self.constructors.is_empty()
    }

    /// Reject the first definition whose type is not registered.
    pub fn validate(&self, defs: &[DeviceDefinition]) -> Result<(), DeviceError> {
        defs.iter()
            .find(|def| !self.contains(&def.device_type))
            .map_or(Ok(()), |def| Err(unknown_type(def)))
    }

    /// Construct the model for `def`. `simulator_seed` is the optional
    /// run-wide seed.
    pub fn build(
        &self,
        def: &DeviceDefinition,
        simulator_seed: Option<u64>,
    ) -> Result<Box<dyn DeviceModel>, DeviceError> {
        let constructor = self
            .constructors
            .get(&def.device_type)
            .ok_or_else(|| unknown_type(def))?;
        let seed = device_seed(def, simulator_seed)?;
        let model = constructor(def, seed)?;
        debug!(
            device = %def.name,
            device_type = %def.device_type,
            seed,
            enabled = def.enabled,
            "device model built"
        );
        Ok(model)
    }

    /// Validate every definition, then construct them all in order.
    pub fn build_all(
        &self,
        defs: &[DeviceDefinition],
        simulator_seed: Option<u64>,
    ) -> Result<Vec<Box<dyn DeviceModel>>, DeviceError> {
        self.validate(defs)?;
        defs.iter().map(|def| self.build(def, simulator_seed)).collect()
    }
}

fn unknown_type(def: &DeviceDefinition) -> DeviceError {
    DeviceError::UnknownType {
        device: def.name.clone(),
        device_type: def.device_type.clone(),
    }
}

/// Resolve the private seed for `def`.
pub fn device_seed(def: &DeviceDefinition, simulator_seed: Option<u64>) -> Result<u64, DeviceError> {
    let explicit = def.parameters.seed().map_err(|source| DeviceError::Parameter {
        device: def.name.clone(),
        source,
    })?;
    Ok(match (explicit, simulator_seed) {
        (Some(seed), _) => seed,
        (None, Some(global)) => derive_seed(global, &def.name),
        (None, None) => rand::random(),
    })
}

/// Mix a run-wide seed with a device name into a per-device seed.
///
/// FNV-1a over the name, combined with the run seed and scrambled with
/// `xorshift64`. Equal inputs always give equal seeds.
pub fn derive_seed(simulator_seed: u64, name: &str) -> u64 {
    const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
    const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

    let name_hash = name
        .bytes()
        .fold(FNV_OFFSET, |hash, byte| (hash ^ u64::from(byte)).wrapping_mul(FNV_PRIME));

    let mut state = simulator_seed.wrapping_mul(0x9e37_79b9_7f4a_7c15) ^ name_hash;
    // xorshift needs a non-zero state.
    if state == 0 {
        state = FNV_OFFSET;
    }
    state ^= state.wrapping_shl(13);
    state ^= state.wrapping_shr(7);
    state ^= state.wrapping_shl(17);
    state
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::float_cmp)]
mod tests {
    use std::time::Duration;

    use super::*;

    const ALL_TYPES: [(&str, &str); 11] = [
        ("temperature", "%DF1"),
        ("pressure", "%DF2"),
        ("sine", "%DF3"),
        ("random", "%DF4"),
        ("digital", "%MW1"),
        ("vibration", "%DF5"),
        ("noise", "%DF6"),
        ("relay", "%MW2"),
        ("integer", "%DW1"),
        ("stepmotor", "%DF7"),
        ("servomotor", "%DF8"),
    ];

    #[test]
    fn builtin_registers_every_model() {
        let catalog = ModelCatalog::builtin();
        assert_eq!(catalog.len(), 11);
        for (ty, address) in ALL_TYPES {
            let def = DeviceDefinition::new(format!("dev-{ty}"), ty, address);
            let model = catalog.build(&def, Some(1)).unwrap();
            assert_eq!(model.type_name(), ty);
            assert_eq!(model.name(), def.name);
        }
    }

    #[test]
    fn validate_rejects_unknown_types_up_front() {
        let catalog = ModelCatalog::builtin();
        let defs = vec![
            DeviceDefinition::new("T1", "temperature", "%DF1"),
            DeviceDefinition::new("X1", "flux-capacitor", "%DF2"),
        ];
        let err = catalog.validate(&defs).unwrap_err();
        assert_eq!(
            err,
            DeviceError::UnknownType {
                device: "X1".to_owned(),
                device_type: "flux-capacitor".to_owned(),
            }
        );
        assert!(catalog.build_all(&defs, None).is_err());
    }

    #[test]
    fn hand_assembled_catalog() {
        let mut catalog = ModelCatalog::empty();
        assert!(catalog.register("relay", |def, seed| Relay::from_definition(def, seed).map(boxed)).is_none());
        assert!(catalog.contains("relay"));
        assert!(!catalog.contains("temperature"));
        assert_eq!(catalog.type_names().collect::<Vec<_>>(), ["relay"]);
    }

    #[test]
    fn simulator_seed_makes_runs_reproducible() {
        let catalog = ModelCatalog::builtin();
        let def = DeviceDefinition::new("Temp1", "temperature", "%DF1");
        let mut a = catalog.build(&def, Some(1234)).unwrap();
        let mut b = catalog.build(&def, Some(1234)).unwrap();
        for _ in 0..50 {
            assert_eq!(
                a.update(Duration::from_millis(100)),
                b.update(Duration::from_millis(100))
            );
        }
    }

    #[test]
    fn explicit_seed_parameter_wins() {
        let def = DeviceDefinition::new("T1", "temperature", "%DF1").with_parameter("seed", 5);
        assert_eq!(device_seed(&def, Some(99)).unwrap(), 5);
        assert_eq!(device_seed(&def, None).unwrap(), 5);
    }

    #[test]
    fn derived_seeds_differ_per_device() {
        assert_ne!(derive_seed(1, "T1"), derive_seed(1, "T2"));
        assert_ne!(derive_seed(1, "T1"), derive_seed(2, "T1"));
        assert_eq!(derive_seed(7, "Pump"), derive_seed(7, "Pump"));
    }

    #[test]
    fn disabled_models_never_advance() {
        let catalog = ModelCatalog::builtin();
        for (ty, address) in ALL_TYPES {
            let def = DeviceDefinition::new(format!("dev-{ty}"), ty, address).with_enabled(false);
            let mut model = catalog.build(&def, Some(3)).unwrap();
            let quiescent = model.quiescent_value();
            for _ in 0..20 {
                assert_eq!(model.update(Duration::from_millis(100)), quiescent, "{ty}");
            }
            assert_eq!(model.elapsed(), 0.0, "{ty}");
        }
    }

    #[test]
    fn reset_reproduces_fresh_sequence_for_every_model() {
        let catalog = ModelCatalog::builtin();
        for (ty, address) in ALL_TYPES {
            let def = DeviceDefinition::new(format!("dev-{ty}"), ty, address);
            let mut fresh = catalog.build(&def, Some(8)).unwrap();
            let expected: Vec<f64> = (0..30).map(|_| fresh.update(Duration::from_millis(70))).collect();

            let mut model = catalog.build(&def, Some(8)).unwrap();
            for _ in 0..17 {
                model.update(Duration::from_millis(70));
            }
            model.reset();
            assert_eq!(model.elapsed(), 0.0, "{ty}");
            let actual: Vec<f64> = (0..30).map(|_| model.update(Duration::from_millis(70))).collect();
            assert_eq!(expected, actual, "{ty}");
        }
    }
}
