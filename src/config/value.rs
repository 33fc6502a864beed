use core::fmt;

// -----------------------------------------------------------------------------
// Handles

/// Index of an object member node inside a [`Config`](super::Config) arena.
///
/// A handle is only meaningful together with the config that produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObjectNodeHandle(pub(crate) u32);

/// Index of an array element node inside a [`Config`](super::Config) arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ArrayNodeHandle(pub(crate) u32);

impl ObjectNodeHandle {
    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}

impl ArrayNodeHandle {
    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}

// -----------------------------------------------------------------------------
// ConfigValue

/// A single value in a config tree.
///
/// Scalars are stored inline. `Object` and `Array` hold the handle of their
/// first node, or `None` when empty.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum ConfigValue {
    /// No value. Querying a missing member yields this.
    #[default]
    None,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(Box<str>),
    Object(Option<ObjectNodeHandle>),
    Array(Option<ArrayNodeHandle>),
}

impl ConfigValue {
    /// Short human-readable name of the variant, for diagnostics.
    pub fn kind_name(&self) -> &'static str {
        match self {
            ConfigValue::None => "none",
            ConfigValue::Bool(_) => "bool",
            ConfigValue::Int(_) => "int",
            ConfigValue::Float(_) => "float",
            ConfigValue::String(_) => "string",
            ConfigValue::Object(_) => "object",
            ConfigValue::Array(_) => "array",
        }
    }

    pub fn is_none(&self) -> bool {
        matches!(self, ConfigValue::None)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ConfigValue::Bool(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            ConfigValue::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            ConfigValue::Float(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            ConfigValue::String(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<Option<ObjectNodeHandle>> {
        match self {
            ConfigValue::Object(head) => Some(*head),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<Option<ArrayNodeHandle>> {
        match self {
            ConfigValue::Array(head) => Some(*head),
            _ => None,
        }
    }
}

impl From<bool> for ConfigValue {
    fn from(v: bool) -> Self {
        ConfigValue::Bool(v)
    }
}

impl From<i64> for ConfigValue {
    fn from(v: i64) -> Self {
        ConfigValue::Int(v)
    }
}

impl From<f64> for ConfigValue {
    fn from(v: f64) -> Self {
        ConfigValue::Float(v)
    }
}

impl From<&str> for ConfigValue {
    fn from(v: &str) -> Self {
        ConfigValue::String(v.into())
    }
}

impl From<String> for ConfigValue {
    fn from(v: String) -> Self {
        ConfigValue::String(v.into_boxed_str())
    }
}

impl From<ConfigObject> for ConfigValue {
    fn from(obj: ConfigObject) -> Self {
        ConfigValue::Object(obj.head)
    }
}

impl fmt::Display for ConfigValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigValue::None => f.write_str("none"),
            ConfigValue::Bool(v) => write!(f, "{v}"),
            ConfigValue::Int(v) => write!(f, "{v}"),
            ConfigValue::Float(v) => write!(f, "{v}"),
            ConfigValue::String(v) => write!(f, "{v:?}"),
            ConfigValue::Object(_) => f.write_str("<object>"),
            ConfigValue::Array(_) => f.write_str("<array>"),
        }
    }
}

// -----------------------------------------------------------------------------
// ConfigObject

/// Builder handle of an object under construction.
///
/// Tracks the head and tail of the member list so that
/// [`Config::add_value`](super::Config::add_value) appends in O(1) and
/// member order is preserved.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConfigObject {
    pub(crate) head: Option<ObjectNodeHandle>,
    pub(crate) tail: Option<ObjectNodeHandle>,
}

impl ConfigObject {
    pub fn new() -> Self {
        Self::default()
    }

    /// Handle of the first member node, `None` for an empty object.
    pub fn head(&self) -> Option<ObjectNodeHandle> {
        self.head
    }
}

/// Builder handle of an array under construction.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConfigArray {
    pub(crate) head: Option<ArrayNodeHandle>,
    pub(crate) tail: Option<ArrayNodeHandle>,
}

impl ConfigArray {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn head(&self) -> Option<ArrayNodeHandle> {
        self.head
    }
}

impl From<ConfigArray> for ConfigValue {
    fn from(arr: ConfigArray) -> Self {
        ConfigValue::Array(arr.head)
    }
}
