use hashbrown::HashMap;

// -----------------------------------------------------------------------------
// DataTranslator

pub(crate) enum Binding<T> {
    Bool(fn(&mut T) -> &mut bool),
    Int(fn(&mut T) -> &mut i64),
    Float(fn(&mut T) -> &mut f64),
    Str(fn(&mut T) -> &mut String),
    BoolArray(fn(&mut T) -> &mut Vec<bool>),
    IntArray(fn(&mut T) -> &mut Vec<i64>),
    FloatArray(fn(&mut T) -> &mut Vec<f64>),
    StrArray(fn(&mut T) -> &mut Vec<String>),
}

impl<T> Binding<T> {
    pub(crate) fn expected(&self) -> &'static str {
        match self {
            Binding::Bool(_) => "bool",
            Binding::Int(_) => "int",
            Binding::Float(_) => "float",
            Binding::Str(_) => "string",
            Binding::BoolArray(_) => "bool array",
            Binding::IntArray(_) => "int array",
            Binding::FloatArray(_) => "float array",
            Binding::StrArray(_) => "string array",
        }
    }
}

/// Maps config object keys onto fields of a plain struct, without going
/// through the reflection registry.
///
/// Each binding pairs a key name with an accessor returning a mutable
/// reference to the target field. Driven by
/// [`Config::translate`](super::Config::translate); a key whose stored value
/// has the wrong type fails that key only.
///
/// # Examples
///
/// ```
/// use vc_rtti::config::{Config, DataTranslator};
///
/// #[derive(Default)]
/// struct Settings {
///     width: i64,
///     title: String,
/// }
///
/// let translator = DataTranslator::new()
///     .int("width", |s: &mut Settings| &mut s.width)
///     .string("title", |s: &mut Settings| &mut s.title);
///
/// let config = Config::parse("width = 1280 title = \"demo\"").unwrap();
/// let mut settings = Settings::default();
/// assert!(config.translate(config.root(), &translator, &mut settings));
/// assert_eq!(settings.width, 1280);
/// ```
pub struct DataTranslator<T> {
    pub(crate) bindings: HashMap<&'static str, Binding<T>>,
}

impl<T> DataTranslator<T> {
    pub fn new() -> Self {
        Self {
            bindings: HashMap::new(),
        }
    }

    pub fn bool(mut self, name: &'static str, accessor: fn(&mut T) -> &mut bool) -> Self {
        self.bindings.insert(name, Binding::Bool(accessor));
        self
    }

    pub fn int(mut self, name: &'static str, accessor: fn(&mut T) -> &mut i64) -> Self {
        self.bindings.insert(name, Binding::Int(accessor));
        self
    }

    pub fn float(mut self, name: &'static str, accessor: fn(&mut T) -> &mut f64) -> Self {
        self.bindings.insert(name, Binding::Float(accessor));
        self
    }

    pub fn string(mut self, name: &'static str, accessor: fn(&mut T) -> &mut String) -> Self {
        self.bindings.insert(name, Binding::Str(accessor));
        self
    }

    pub fn bool_array(
        mut self,
        name: &'static str,
        accessor: fn(&mut T) -> &mut Vec<bool>,
    ) -> Self {
        self.bindings.insert(name, Binding::BoolArray(accessor));
        self
    }

    pub fn int_array(mut self, name: &'static str, accessor: fn(&mut T) -> &mut Vec<i64>) -> Self {
        self.bindings.insert(name, Binding::IntArray(accessor));
        self
    }

    pub fn float_array(
        mut self,
        name: &'static str,
        accessor: fn(&mut T) -> &mut Vec<f64>,
    ) -> Self {
        self.bindings.insert(name, Binding::FloatArray(accessor));
        self
    }

    pub fn string_array(
        mut self,
        name: &'static str,
        accessor: fn(&mut T) -> &mut Vec<String>,
    ) -> Self {
        self.bindings.insert(name, Binding::StrArray(accessor));
        self
    }
}

impl<T> Default for DataTranslator<T> {
    fn default() -> Self {
        Self::new()
    }
}
