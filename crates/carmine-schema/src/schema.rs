//! The model schema and its builder.

use std::sync::Arc;

use async_trait::async_trait;
use carmine_types::KEY_SEPARATOR;

use crate::error::SchemaError;
use crate::property::{IndexKind, PropertySpec};

/// Caller-supplied identifier source for models that do not use the store
/// counter. Generators may perform I/O (e.g. request ids from an external
/// service); the returned string must not contain the key separator, which
/// is enforced at save time.
#[async_trait]
pub trait IdGenerator: Send + Sync {
    async fn next_id(&self) -> String;
}

/// How new instances of a model obtain their identifier.
#[derive(Clone)]
pub enum IdStrategy {
    /// Atomic per-model counter in the store.
    Increment,
    Custom(Arc<dyn IdGenerator>),
}

impl IdStrategy {
    /// Stable tag persisted in the meta records.
    pub fn tag(&self) -> &'static str {
        match self {
            IdStrategy::Increment => "increment",
            IdStrategy::Custom(_) => "custom",
        }
    }
}

impl std::fmt::Debug for IdStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.tag())
    }
}

/// A complete, immutable model definition.
#[derive(Debug)]
pub struct ModelSchema {
    name: String,
    properties: Vec<PropertySpec>,
    id_strategy: IdStrategy,
    version: String,
    properties_fingerprint: String,
}

impl ModelSchema {
    pub fn builder(name: &str) -> SchemaBuilder {
        SchemaBuilder {
            name: name.to_string(),
            properties: Vec::new(),
            id_strategy: IdStrategy::Increment,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Property specs in declaration order.
    pub fn properties(&self) -> &[PropertySpec] {
        &self.properties
    }

    pub fn property(&self, name: &str) -> Option<&PropertySpec> {
        self.properties.iter().find(|p| p.name == name)
    }

    pub fn id_strategy(&self) -> &IdStrategy {
        &self.id_strategy
    }

    /// Stable hash of the normalized definition. Two processes whose
    /// definitions of a model differ produce different versions; the meta
    /// records persist this for drift detection.
    pub fn definition_version(&self) -> &str {
        &self.version
    }

    /// Serialized property spec, persisted alongside the version.
    pub fn properties_fingerprint(&self) -> &str {
        &self.properties_fingerprint
    }
}

/// Builds a [`ModelSchema`], validating the definition once at the end.
pub struct SchemaBuilder {
    name: String,
    properties: Vec<PropertySpec>,
    id_strategy: IdStrategy,
}

impl SchemaBuilder {
    pub fn property(mut self, spec: PropertySpec) -> Self {
        self.properties.push(spec);
        self
    }

    pub fn id_strategy(mut self, strategy: IdStrategy) -> Self {
        self.id_strategy = strategy;
        self
    }

    pub fn id_generator(self, generator: impl IdGenerator + 'static) -> Self {
        self.id_strategy(IdStrategy::Custom(Arc::new(generator)))
    }

    pub fn build(self) -> Result<Arc<ModelSchema>, SchemaError> {
        if self.name.is_empty() {
            return Err(SchemaError::EmptyModelName);
        }
        if self.name.contains(KEY_SEPARATOR) {
            return Err(SchemaError::SeparatorInModelName(self.name));
        }
        for (i, spec) in self.properties.iter().enumerate() {
            if self.properties[..i].iter().any(|p| p.name == spec.name) {
                return Err(SchemaError::DuplicateProperty(spec.name.clone()));
            }
            if spec.index == IndexKind::Scored && !spec.kind.is_numeric() {
                return Err(SchemaError::ScoredIndexOnNonNumeric(spec.name.clone()));
            }
        }

        let fragments: Vec<serde_json::Value> = self
            .properties
            .iter()
            .map(PropertySpec::fingerprint_fragment)
            .collect();
        let properties_fingerprint =
            serde_json::to_string(&fragments).expect("fingerprint fragments are valid json");
        let normalized = serde_json::json!({
            "name": self.name,
            "idGenerator": self.id_strategy.tag(),
            "properties": fragments,
        });
        let version = blake3::hash(normalized.to_string().as_bytes())
            .to_hex()
            .to_string();

        Ok(Arc::new(ModelSchema {
            name: self.name,
            properties: self.properties,
            id_strategy: self.id_strategy,
            version,
            properties_fingerprint,
        }))
    }
}
