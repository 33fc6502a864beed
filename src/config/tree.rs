use core::fmt::Write as _;

use crate::config::tokenizer::{ParseError, Spanned, Token, Tokenizer};
use crate::config::translator::{Binding, DataTranslator};
use crate::config::value::{
    ArrayNodeHandle, ConfigArray, ConfigObject, ConfigValue, ObjectNodeHandle,
};

const INDENT: &str = "  ";

// -----------------------------------------------------------------------------
// Nodes

#[derive(Debug)]
struct ObjectNode {
    name: Box<str>,
    value: ConfigValue,
    next: Option<ObjectNodeHandle>,
}

#[derive(Debug)]
struct ArrayNode {
    value: ConfigValue,
    next: Option<ArrayNodeHandle>,
}

/// Output style of [`Config::to_string`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    /// One member per line, nested objects on indented brace lines.
    Pretty,
    /// Everything on one line, single spaces between members.
    Compact,
}

// -----------------------------------------------------------------------------
// Config

/// A tree of named values backed by two node arenas.
///
/// Member and element lists are singly linked through the arenas, so handles
/// stay valid as the tree grows and insertion order is preserved on
/// iteration.
///
/// # Examples
///
/// ```
/// use vc_rtti::config::{Config, ConfigObject, ConfigValue};
///
/// let mut config = Config::new();
/// let mut root = ConfigObject::new();
/// config
///     .add_value(&mut root, "width", ConfigValue::Int(1280))
///     .add_value(&mut root, "fullscreen", ConfigValue::Bool(false));
/// config.set_root(root);
///
/// assert_eq!(config.to_string(vc_rtti::config::ConfigFormat::Compact), "width=1280 fullscreen=false");
/// ```
#[derive(Debug, Default)]
pub struct Config {
    object_nodes: Vec<ObjectNode>,
    array_nodes: Vec<ArrayNode>,
    root: Option<ObjectNodeHandle>,
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    /// Handle of the first member of the root object, `None` when empty.
    pub fn root(&self) -> Option<ObjectNodeHandle> {
        self.root
    }

    /// Makes `object` the root of this config.
    pub fn set_root(&mut self, object: ConfigObject) {
        self.root = object.head;
    }

    /// Makes the object behind an [`Object`](ConfigValue::Object) value the
    /// root. Returns `false` (and leaves the root alone) for any other
    /// value.
    pub fn set_root_value(&mut self, value: &ConfigValue) -> bool {
        match value {
            ConfigValue::Object(head) => {
                self.root = *head;
                true
            }
            _ => false,
        }
    }

    fn alloc_object_node(&mut self, node: ObjectNode) -> ObjectNodeHandle {
        assert!(
            self.object_nodes.len() < u32::MAX as usize,
            "config object arena exhausted"
        );
        let handle = ObjectNodeHandle(self.object_nodes.len() as u32);
        self.object_nodes.push(node);
        handle
    }

    fn alloc_array_node(&mut self, node: ArrayNode) -> ArrayNodeHandle {
        assert!(
            self.array_nodes.len() < u32::MAX as usize,
            "config array arena exhausted"
        );
        let handle = ArrayNodeHandle(self.array_nodes.len() as u32);
        self.array_nodes.push(node);
        handle
    }

    /// Appends a named member to `object`. Returns `self` for chaining.
    pub fn add_value(
        &mut self,
        object: &mut ConfigObject,
        key: &str,
        value: ConfigValue,
    ) -> &mut Self {
        let handle = self.alloc_object_node(ObjectNode {
            name: key.into(),
            value,
            next: None,
        });
        match object.tail {
            Some(tail) => self.object_nodes[tail.index()].next = Some(handle),
            None => object.head = Some(handle),
        }
        object.tail = Some(handle);
        self
    }

    /// Appends an element to `array`. Returns `self` for chaining.
    pub fn add_array_value(&mut self, array: &mut ConfigArray, value: ConfigValue) -> &mut Self {
        let handle = self.alloc_array_node(ArrayNode { value, next: None });
        match array.tail {
            Some(tail) => self.array_nodes[tail.index()].next = Some(handle),
            None => array.head = Some(handle),
        }
        array.tail = Some(handle);
        self
    }

    /// Walks the members of an object in insertion order. The callback
    /// returns `false` to stop early.
    pub fn iterate<F>(&self, head: Option<ObjectNodeHandle>, mut callback: F)
    where
        F: FnMut(&str, &ConfigValue) -> bool,
    {
        let mut cursor = head;
        while let Some(handle) = cursor {
            let node = &self.object_nodes[handle.index()];
            if !callback(&node.name, &node.value) {
                return;
            }
            cursor = node.next;
        }
    }

    /// Walks the elements of an array in order. The callback receives the
    /// element index and returns `false` to stop early.
    pub fn iterate_array<F>(&self, head: Option<ArrayNodeHandle>, mut callback: F)
    where
        F: FnMut(usize, &ConfigValue) -> bool,
    {
        let mut cursor = head;
        let mut index = 0usize;
        while let Some(handle) = cursor {
            let node = &self.array_nodes[handle.index()];
            if !callback(index, &node.value) {
                return;
            }
            index += 1;
            cursor = node.next;
        }
    }

    // -------------------------------------------------------------------------
    // Parsing

    /// Parses config text into a new tree.
    pub fn parse(text: &str) -> Result<Config, ParseError> {
        let mut config = Config::new();
        let mut tokenizer = Tokenizer::new(text);
        let root = config.parse_object(&mut tokenizer, false)?;
        config.set_root(root);
        Ok(config)
    }

    fn parse_object(
        &mut self,
        tokenizer: &mut Tokenizer<'_>,
        braced: bool,
    ) -> Result<ConfigObject, ParseError> {
        let mut object = ConfigObject::new();
        loop {
            let Some(sp) = tokenizer.next_token()? else {
                if braced {
                    return Err(ParseError::UnexpectedEnd { expected: "`}`" });
                }
                return Ok(object);
            };
            match sp.token {
                Token::Symbol('}') if braced => return Ok(object),
                Token::Identifier(key) => {
                    expect_symbol(tokenizer, '=', "`=`")?;
                    let value = self.parse_value(tokenizer)?;
                    self.add_value(&mut object, &key, value);
                }
                token => {
                    return Err(ParseError::UnexpectedToken {
                        expected: "a member name",
                        got: token.to_string(),
                        line: sp.line,
                        column: sp.column,
                    });
                }
            }
        }
    }

    fn parse_value(&mut self, tokenizer: &mut Tokenizer<'_>) -> Result<ConfigValue, ParseError> {
        let Some(sp) = tokenizer.next_token()? else {
            return Err(ParseError::UnexpectedEnd { expected: "a value" });
        };
        self.parse_value_token(tokenizer, sp)
    }

    fn parse_value_token(
        &mut self,
        tokenizer: &mut Tokenizer<'_>,
        sp: Spanned,
    ) -> Result<ConfigValue, ParseError> {
        match sp.token {
            Token::Bool(v) => Ok(ConfigValue::Bool(v)),
            Token::Int(v) => Ok(ConfigValue::Int(v)),
            Token::Float(v) => Ok(ConfigValue::Float(v)),
            Token::Str(v) => Ok(ConfigValue::String(v.into_boxed_str())),
            Token::Symbol('{') => {
                let object = self.parse_object(tokenizer, true)?;
                Ok(ConfigValue::Object(object.head))
            }
            Token::Symbol('[') => {
                let mut array = ConfigArray::new();
                loop {
                    let Some(sp) = tokenizer.next_token()? else {
                        return Err(ParseError::UnexpectedEnd { expected: "`]`" });
                    };
                    if sp.token == Token::Symbol(']') {
                        return Ok(ConfigValue::Array(array.head));
                    }
                    let value = self.parse_value_token(tokenizer, sp)?;
                    self.add_array_value(&mut array, value);
                }
            }
            token => Err(ParseError::UnexpectedToken {
                expected: "a value",
                got: token.to_string(),
                line: sp.line,
                column: sp.column,
            }),
        }
    }

    // -------------------------------------------------------------------------
    // Generation

    /// Renders the tree back to text.
    #[allow(clippy::inherent_to_string)]
    pub fn to_string(&self, format: ConfigFormat) -> String {
        let mut out = String::new();
        let indent = match format {
            ConfigFormat::Pretty => Some(0),
            ConfigFormat::Compact => None,
        };
        self.object_to_string(&mut out, self.root, indent);
        out
    }

    fn write_indent(out: &mut String, indent: Option<usize>) {
        if let Some(depth) = indent {
            for _ in 0..depth {
                out.push_str(INDENT);
            }
        }
    }

    fn value_to_string(&self, out: &mut String, value: &ConfigValue, indent: Option<usize>) {
        let spacing = if indent.is_some() { " " } else { "" };
        let next_indent = indent.map(|d| d + 1);
        match value {
            ConfigValue::None => {
                let _ = write!(out, "{spacing}0");
            }
            ConfigValue::Bool(v) => {
                let _ = write!(out, "{spacing}{v}");
            }
            ConfigValue::Int(v) => {
                let _ = write!(out, "{spacing}{v}");
            }
            ConfigValue::Float(v) => {
                let _ = write!(out, "{spacing}{v}");
            }
            ConfigValue::String(v) => {
                out.push_str(spacing);
                write_escaped(out, v);
            }
            ConfigValue::Object(head) => {
                if indent.is_some() {
                    out.push('\n');
                }
                Self::write_indent(out, indent);
                out.push('{');
                if indent.is_some() {
                    out.push('\n');
                }
                self.object_to_string(out, *head, next_indent);
                Self::write_indent(out, indent);
                out.push('}');
            }
            ConfigValue::Array(head) => {
                let _ = write!(out, "{spacing}[");
                let mut first = true;
                self.iterate_array(*head, |_, element| {
                    if indent.is_none() && !first {
                        out.push(' ');
                    }
                    first = false;
                    self.value_to_string(out, element, next_indent);
                    true
                });
                let _ = write!(out, "{spacing}]");
            }
        }
    }

    fn object_to_string(
        &self,
        out: &mut String,
        head: Option<ObjectNodeHandle>,
        indent: Option<usize>,
    ) {
        let mut cursor = head;
        while let Some(handle) = cursor {
            Self::write_indent(out, indent);
            let node = &self.object_nodes[handle.index()];
            out.push_str(&node.name);
            out.push_str(if indent.is_some() { " =" } else { "=" });
            self.value_to_string(out, &node.value, indent);
            cursor = node.next;
            if indent.is_some() {
                out.push('\n');
            } else if cursor.is_some() {
                out.push(' ');
            }
        }
    }

    // -------------------------------------------------------------------------
    // Translation

    /// Copies values out of an object into `target` using `translator`.
    ///
    /// Keys without a binding are ignored. A bound key whose value has the
    /// wrong type is logged and skipped; the return value is `false` if any
    /// bound key failed.
    pub fn translate<T>(
        &self,
        head: Option<ObjectNodeHandle>,
        translator: &DataTranslator<T>,
        target: &mut T,
    ) -> bool {
        let mut success = true;
        self.iterate(head, |key, value| {
            let Some(binding) = translator.bindings.get(key) else {
                return true;
            };
            if !self.translate_one(key, value, binding, target) {
                success = false;
            }
            true
        });
        success
    }

    fn translate_one<T>(
        &self,
        key: &str,
        value: &ConfigValue,
        binding: &Binding<T>,
        target: &mut T,
    ) -> bool {
        let mismatch = |found: &ConfigValue| {
            log::error!(
                "config key '{key}': expected {}, found {}",
                binding.expected(),
                found.kind_name()
            );
            false
        };
        match binding {
            Binding::Bool(acc) => match value {
                ConfigValue::Bool(v) => {
                    *acc(target) = *v;
                    true
                }
                other => mismatch(other),
            },
            Binding::Int(acc) => match value {
                ConfigValue::Int(v) => {
                    *acc(target) = *v;
                    true
                }
                other => mismatch(other),
            },
            Binding::Float(acc) => match value {
                ConfigValue::Float(v) => {
                    *acc(target) = *v;
                    true
                }
                other => mismatch(other),
            },
            Binding::Str(acc) => match value {
                ConfigValue::String(v) => {
                    *acc(target) = v.to_string();
                    true
                }
                other => mismatch(other),
            },
            Binding::BoolArray(acc) => {
                self.translate_array(key, value, acc(target), "bool", |v| v.as_bool())
            }
            Binding::IntArray(acc) => {
                self.translate_array(key, value, acc(target), "int", |v| v.as_int())
            }
            Binding::FloatArray(acc) => {
                self.translate_array(key, value, acc(target), "float", |v| v.as_float())
            }
            Binding::StrArray(acc) => self.translate_array(key, value, acc(target), "string", |v| {
                v.as_str().map(str::to_owned)
            }),
        }
    }

    fn translate_array<E>(
        &self,
        key: &str,
        value: &ConfigValue,
        target: &mut Vec<E>,
        expected: &'static str,
        extract: impl Fn(&ConfigValue) -> Option<E>,
    ) -> bool {
        let ConfigValue::Array(head) = value else {
            log::error!(
                "config key '{key}': expected {expected} array, found {}",
                value.kind_name()
            );
            return false;
        };
        let mut success = true;
        self.iterate_array(*head, |index, element| match extract(element) {
            Some(v) => {
                target.push(v);
                true
            }
            None => {
                log::error!(
                    "config key '{key}': element {index} is {}, expected {expected}",
                    element.kind_name()
                );
                success = false;
                false
            }
        });
        success
    }
}

fn expect_symbol(
    tokenizer: &mut Tokenizer<'_>,
    symbol: char,
    expected: &'static str,
) -> Result<(), ParseError> {
    match tokenizer.next_token()? {
        Some(sp) if sp.token == Token::Symbol(symbol) => Ok(()),
        Some(sp) => Err(ParseError::UnexpectedToken {
            expected,
            got: sp.token.to_string(),
            line: sp.line,
            column: sp.column,
        }),
        None => Err(ParseError::UnexpectedEnd { expected }),
    }
}

fn write_escaped(out: &mut String, text: &str) {
    out.push('"');
    for ch in text.chars() {
        match ch {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            '\0' => out.push_str("\\0"),
            ch => out.push(ch),
        }
    }
    out.push('"');
}

// -----------------------------------------------------------------------------
// GenericValue

/// Read-only cursor pairing a [`ConfigValue`] with its owning [`Config`],
/// so nested objects and arrays can be queried by key or index.
#[derive(Clone, Copy)]
pub struct GenericValue<'a> {
    config: &'a Config,
    slot: Slot<'a>,
}

#[derive(Clone, Copy)]
enum Slot<'a> {
    /// The config root, which behaves like an object value.
    Root,
    /// A missing member or out-of-range element.
    Missing,
    Value(&'a ConfigValue),
}

static NONE_VALUE: ConfigValue = ConfigValue::None;

impl<'a> GenericValue<'a> {
    /// Cursor over the config root.
    pub fn from_root(config: &'a Config) -> Self {
        Self {
            config,
            slot: Slot::Root,
        }
    }

    pub fn new(config: &'a Config, value: &'a ConfigValue) -> Self {
        Self {
            config,
            slot: Slot::Value(value),
        }
    }

    /// The wrapped value. The root and missing entries read as
    /// [`ConfigValue::None`].
    pub fn value(&self) -> &'a ConfigValue {
        match self.slot {
            Slot::Value(value) => value,
            Slot::Root | Slot::Missing => &NONE_VALUE,
        }
    }

    fn object_head(&self) -> Option<Option<ObjectNodeHandle>> {
        match self.slot {
            Slot::Root => Some(self.config.root),
            Slot::Value(value) => value.as_object(),
            Slot::Missing => None,
        }
    }

    pub fn is_object(&self) -> bool {
        self.object_head().is_some()
    }

    pub fn has_member(&self, key: &str) -> bool {
        !matches!(self.member(key).slot, Slot::Missing)
    }

    /// Member lookup by key. Yields a missing cursor when `self` is not an
    /// object or the key is absent, so lookups can be chained safely.
    pub fn member(&self, key: &str) -> GenericValue<'a> {
        let Some(head) = self.object_head() else {
            return self.missing();
        };
        let mut cursor = head;
        while let Some(handle) = cursor {
            let node = &self.config.object_nodes[handle.index()];
            if &*node.name == key {
                return Self::new(self.config, &node.value);
            }
            cursor = node.next;
        }
        self.missing()
    }

    /// Number of elements when `self` is an array, zero otherwise.
    pub fn array_size(&self) -> usize {
        let Some(head) = self.value().as_array() else {
            return 0;
        };
        let mut count = 0;
        self.config.iterate_array(head, |_, _| {
            count += 1;
            true
        });
        count
    }

    /// Element lookup by index. Yields a missing cursor when out of range
    /// or `self` is not an array.
    pub fn element(&self, index: usize) -> GenericValue<'a> {
        let Some(head) = self.value().as_array() else {
            return self.missing();
        };
        let mut cursor = head;
        let mut i = 0usize;
        while let Some(handle) = cursor {
            let node = &self.config.array_nodes[handle.index()];
            if i == index {
                return Self::new(self.config, &node.value);
            }
            i += 1;
            cursor = node.next;
        }
        self.missing()
    }

    fn missing(&self) -> Self {
        Self {
            config: self.config,
            slot: Slot::Missing,
        }
    }
}

// -----------------------------------------------------------------------------
// Tests
