//! Property specifications: type casters, defaults, uniqueness, indexing.

use std::sync::Arc;

use carmine_types::Value;

use crate::validators::Validator;

/// A type caster: `(incoming value, previous value) -> cast value`.
///
/// Casters are pure and idempotent. The previous value is provided so
/// custom casters can implement write-once or derived behavior.
pub type CasterFn = Arc<dyn Fn(&Value, &Value) -> Value + Send + Sync>;

/// The declared type of a property, which doubles as its caster.
#[derive(Clone)]
pub enum PropertyKind {
    String,
    Integer,
    Float,
    Boolean,
    /// Millisecond timestamp, stored as an integer.
    Timestamp,
    Json,
    /// Caller-supplied caster. The tag names the type in definition
    /// fingerprints.
    Custom { tag: String, caster: CasterFn },
}

impl PropertyKind {
    /// Stable tag used in the definition fingerprint.
    pub fn tag(&self) -> &str {
        match self {
            PropertyKind::String => "string",
            PropertyKind::Integer => "integer",
            PropertyKind::Float => "float",
            PropertyKind::Boolean => "boolean",
            PropertyKind::Timestamp => "timestamp",
            PropertyKind::Json => "json",
            PropertyKind::Custom { tag, .. } => tag,
        }
    }

    /// True for kinds whose values carry a numeric score.
    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            PropertyKind::Integer | PropertyKind::Float | PropertyKind::Timestamp
        )
    }

    /// Cast an incoming value to this kind's canonical representation.
    pub fn cast(&self, value: &Value, previous: &Value) -> Value {
        match self {
            PropertyKind::String => Value::String(value.storage_form()),
            PropertyKind::Integer | PropertyKind::Timestamp => {
                Value::Integer(cast_integer(value))
            }
            PropertyKind::Float => Value::Float(cast_float(value)),
            PropertyKind::Boolean => Value::Boolean(cast_boolean(value)),
            PropertyKind::Json => Value::Json(cast_json(value)),
            PropertyKind::Custom { caster, .. } => caster(value, previous),
        }
    }

    /// The kind's zero value, used when no default is declared.
    pub fn zero(&self) -> Value {
        match self {
            PropertyKind::String => Value::String(String::new()),
            PropertyKind::Integer | PropertyKind::Timestamp => Value::Integer(0),
            PropertyKind::Float => Value::Float(0.0),
            PropertyKind::Boolean => Value::Boolean(false),
            PropertyKind::Json => Value::Json(serde_json::Value::Null),
            PropertyKind::Custom { .. } => Value::Null,
        }
    }
}

impl std::fmt::Debug for PropertyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.tag())
    }
}

fn cast_integer(value: &Value) -> i64 {
    match value {
        Value::Integer(i) => *i,
        Value::Float(f) => *f as i64,
        Value::Boolean(b) => i64::from(*b),
        other => other.storage_form().trim().parse().unwrap_or(0),
    }
}

fn cast_float(value: &Value) -> f64 {
    match value {
        Value::Integer(i) => *i as f64,
        Value::Float(f) => *f,
        other => other.storage_form().trim().parse().unwrap_or(0.0),
    }
}

fn cast_boolean(value: &Value) -> bool {
    match value {
        Value::Boolean(b) => *b,
        Value::Integer(i) => *i != 0,
        Value::Float(f) => *f != 0.0,
        Value::String(s) => s == "true" || s == "1",
        _ => false,
    }
}

fn cast_json(value: &Value) -> serde_json::Value {
    match value {
        Value::Json(j) => j.clone(),
        Value::String(s) => {
            serde_json::from_str(s).unwrap_or_else(|_| serde_json::Value::String(s.clone()))
        }
        Value::Integer(i) => serde_json::Value::from(*i),
        Value::Float(f) => serde_json::Value::from(*f),
        Value::Boolean(b) => serde_json::Value::from(*b),
        Value::Null => serde_json::Value::Null,
    }
}

/// Secondary index participation of a property.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IndexKind {
    None,
    /// Per-value id set, exact-match lookups.
    Equality,
    /// Ordered numeric index plus the mirrored per-value set.
    Scored,
}

/// Produces a property's initial value.
#[derive(Clone)]
pub enum DefaultProvider {
    Value(Value),
    /// Evaluated once per instantiation; e.g. creation timestamps.
    Computed(Arc<dyn Fn() -> Value + Send + Sync>),
}

impl DefaultProvider {
    pub fn produce(&self) -> Value {
        match self {
            DefaultProvider::Value(v) => v.clone(),
            DefaultProvider::Computed(f) => f(),
        }
    }

    fn fingerprint_form(&self) -> String {
        match self {
            DefaultProvider::Value(v) => v.storage_form(),
            DefaultProvider::Computed(_) => "<computed>".to_string(),
        }
    }
}

impl std::fmt::Debug for DefaultProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.fingerprint_form())
    }
}

/// Full specification of one model property.
#[derive(Clone, Debug)]
pub struct PropertySpec {
    pub name: String,
    pub kind: PropertyKind,
    pub default: DefaultProvider,
    pub unique: bool,
    pub index: IndexKind,
    /// Skip the caster when hydrating this property from storage.
    pub load_pure: bool,
    pub validators: Vec<Validator>,
}

impl PropertySpec {
    fn new(name: &str, kind: PropertyKind) -> Self {
        let default = DefaultProvider::Value(kind.zero());
        Self {
            name: name.to_string(),
            kind,
            default,
            unique: false,
            index: IndexKind::None,
            load_pure: false,
            validators: Vec::new(),
        }
    }

    pub fn string(name: &str) -> Self {
        Self::new(name, PropertyKind::String)
    }

    pub fn integer(name: &str) -> Self {
        Self::new(name, PropertyKind::Integer)
    }

    pub fn float(name: &str) -> Self {
        Self::new(name, PropertyKind::Float)
    }

    pub fn boolean(name: &str) -> Self {
        Self::new(name, PropertyKind::Boolean)
    }

    pub fn timestamp(name: &str) -> Self {
        Self::new(name, PropertyKind::Timestamp)
    }

    pub fn json(name: &str) -> Self {
        Self::new(name, PropertyKind::Json)
    }

    pub fn custom(name: &str, tag: &str, caster: CasterFn) -> Self {
        Self::new(
            name,
            PropertyKind::Custom {
                tag: tag.to_string(),
                caster,
            },
        )
    }

    pub fn with_default(mut self, value: impl Into<Value>) -> Self {
        self.default = DefaultProvider::Value(value.into());
        self
    }

    pub fn with_computed_default(
        mut self,
        f: impl Fn() -> Value + Send + Sync + 'static,
    ) -> Self {
        self.default = DefaultProvider::Computed(Arc::new(f));
        self
    }

    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    /// Index the property: numeric kinds get a scored index (with the
    /// mirrored equality sets), everything else an equality index.
    pub fn indexed(mut self) -> Self {
        self.index = if self.kind.is_numeric() {
            IndexKind::Scored
        } else {
            IndexKind::Equality
        };
        self
    }

    pub fn load_pure(mut self) -> Self {
        self.load_pure = true;
        self
    }

    pub fn validated_by(mut self, validator: Validator) -> Self {
        self.validators.push(validator);
        self
    }

    /// Initial value: the declared default, run through the caster so
    /// defaults obey the same canonicalization as assignments.
    pub fn initial_value(&self) -> Value {
        let raw = self.default.produce();
        self.kind.cast(&raw, &Value::Null)
    }

    /// Normalized JSON fragment for the definition fingerprint.
    pub fn fingerprint_fragment(&self) -> serde_json::Value {
        serde_json::json!({
            "name": self.name,
            "type": self.kind.tag(),
            "default": self.default.fingerprint_form(),
            "unique": self.unique,
            "index": match self.index {
                IndexKind::None => "none",
                IndexKind::Equality => "equality",
                IndexKind::Scored => "scored",
            },
            "loadPure": self.load_pure,
            "validations": self.validators.iter().map(|v| v.kind()).collect::<Vec<_>>(),
        })
    }
}
