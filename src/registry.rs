/// The set of features known to this extension
use crate::error::RegistryError;
use crate::feature::FeatureDescriptor;
use crate::features;

/// Ordered collection of feature descriptors with unique ids.
#[derive(Debug, Default)]
pub struct FeatureRegistry {
    features: Vec<FeatureDescriptor>,
}

impl FeatureRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, feature: FeatureDescriptor) -> Result<(), RegistryError> {
        if self.get(feature.id).is_some() {
            return Err(RegistryError::DuplicateId(feature.id.to_string()));
        }
        self.features.push(feature);
        Ok(())
    }

    pub fn get(&self, id: &str) -> Option<&FeatureDescriptor> {
        self.features.iter().find(|f| f.id == id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &FeatureDescriptor> {
        self.features.iter()
    }

    pub fn ids(&self) -> Vec<&'static str> {
        self.features.iter().map(|f| f.id).collect()
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }
}

/// Every feature shipped with the extension, in display order
pub fn builtin() -> Result<FeatureRegistry, RegistryError> {
    let mut registry = FeatureRegistry::new();
    registry.register(features::banner::feature())?;
    registry.register(features::volume_booster::feature())?;

    log::debug!("Loaded features: {:?}", registry.ids());
    Ok(registry)
}
