//! CIM object model: values, object paths, classes, instances and
//! qualifier declarations.
//!
//! All element names (classes, properties, qualifiers, key bindings) are
//! case-insensitive in CIM; lookups here follow that rule while keeping the
//! spelling the object was defined with.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Qualifier name -> value, as attached to a class, property, method or parameter.
pub type QualifierSet = BTreeMap<String, CimValue>;

/// Case-insensitive lookup in a name-keyed map (exact match tried first).
pub fn lookup<'a, V>(map: &'a BTreeMap<String, V>, name: &str) -> Option<&'a V> {
    map.get(name).or_else(|| {
        map.iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v)
    })
}

/* ---- Values ---- */

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CimValue {
    Boolean(bool),
    Integer(i64),
    Real(f64),
    String(String),
    Reference {
        #[serde(rename = "ref")]
        path: ObjectPath,
    },
    Array(Vec<CimValue>),
}

impl CimValue {
    pub fn string(s: impl Into<String>) -> Self {
        CimValue::String(s.into())
    }

    pub fn reference(path: ObjectPath) -> Self {
        CimValue::Reference { path }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            CimValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            CimValue::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_path(&self) -> Option<&ObjectPath> {
        match self {
            CimValue::Reference { path } => Some(path),
            _ => None,
        }
    }
}

impl fmt::Display for CimValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CimValue::Boolean(b) => write!(f, "{b}"),
            CimValue::Integer(i) => write!(f, "{i}"),
            CimValue::Real(r) => write!(f, "{r}"),
            CimValue::String(s) => f.write_str(s),
            CimValue::Reference { path } => write!(f, "{path}"),
            CimValue::Array(items) => {
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                Ok(())
            }
        }
    }
}

/* ---- Object paths ---- */

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PathParseError {
    #[error("object path is empty")]
    Empty,
    #[error("invalid class name '{0}' in object path")]
    InvalidClassName(String),
    #[error("malformed key binding '{0}' in object path")]
    MalformedKey(String),
    #[error("unterminated string value in object path")]
    UnterminatedString,
    #[error("unsupported key value '{0}' in object path")]
    InvalidValue(String),
}

/// Class or instance path in WBEM URI untyped form:
/// `[//host][/namespace:]ClassName[.Key1="v",Key2=3]`.
///
/// Equality is case-insensitive for namespace, class name and key names.
/// Namespaces are only compared when both paths carry one.
#[derive(Debug, Clone, Default)]
pub struct ObjectPath {
    pub namespace: Option<String>,
    pub classname: String,
    pub keybindings: BTreeMap<String, CimValue>,
}

impl ObjectPath {
    pub fn new(classname: impl Into<String>) -> Self {
        ObjectPath {
            namespace: None,
            classname: classname.into(),
            keybindings: BTreeMap::new(),
        }
    }

    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    pub fn with_key(mut self, name: impl Into<String>, value: CimValue) -> Self {
        self.keybindings.insert(name.into(), value);
        self
    }

    pub fn key(&self, name: &str) -> Option<&CimValue> {
        lookup(&self.keybindings, name)
    }

    pub fn is_class_path(&self) -> bool {
        self.keybindings.is_empty()
    }
}

impl PartialEq for ObjectPath {
    fn eq(&self, other: &Self) -> bool {
        if let (Some(a), Some(b)) = (&self.namespace, &other.namespace)
            && !a.trim_matches('/').eq_ignore_ascii_case(b.trim_matches('/'))
        {
            return false;
        }
        self.classname.eq_ignore_ascii_case(&other.classname)
            && self.keybindings.len() == other.keybindings.len()
            && self
                .keybindings
                .iter()
                .all(|(k, v)| other.key(k) == Some(v))
    }
}

fn escape_key_string(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"")
}

fn fmt_key_value(value: &CimValue) -> String {
    match value {
        CimValue::String(s) => format!("\"{}\"", escape_key_string(s)),
        CimValue::Reference { path } => format!("\"{}\"", escape_key_string(&path.to_string())),
        CimValue::Boolean(b) => (if *b { "TRUE" } else { "FALSE" }).to_string(),
        other => other.to_string(),
    }
}

impl fmt::Display for ObjectPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(ns) = &self.namespace {
            write!(f, "/{}:", ns.trim_start_matches('/'))?;
        }
        f.write_str(&self.classname)?;
        for (i, (k, v)) in self.keybindings.iter().enumerate() {
            f.write_str(if i == 0 { "." } else { "," })?;
            write!(f, "{k}={}", fmt_key_value(v))?;
        }
        Ok(())
    }
}

fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Raw key value as found in a path string.
enum RawKeyValue {
    Quoted(String),
    Bare(String),
}

fn split_keybindings(keys: &str) -> Result<Vec<(String, RawKeyValue)>, PathParseError> {
    let chars: Vec<char> = keys.chars().collect();
    let mut out = Vec::new();
    let mut i = 0;
    while i < chars.len() {
        let start = i;
        while i < chars.len() && chars[i] != '=' {
            i += 1;
        }
        if i >= chars.len() {
            return Err(PathParseError::MalformedKey(chars[start..].iter().collect()));
        }
        let name: String = chars[start..i].iter().collect::<String>().trim().to_string();
        if !is_identifier(&name) {
            return Err(PathParseError::MalformedKey(name));
        }
        i += 1; // '='
        let value = if chars.get(i) == Some(&'"') {
            i += 1;
            let mut buf = String::new();
            loop {
                match chars.get(i) {
                    None => return Err(PathParseError::UnterminatedString),
                    Some('\\') => {
                        if let Some(c) = chars.get(i + 1) {
                            buf.push(*c);
                        }
                        i += 2;
                    }
                    Some('"') => {
                        i += 1;
                        break;
                    }
                    Some(c) => {
                        buf.push(*c);
                        i += 1;
                    }
                }
            }
            RawKeyValue::Quoted(buf)
        } else {
            let vstart = i;
            while i < chars.len() && chars[i] != ',' {
                i += 1;
            }
            RawKeyValue::Bare(chars[vstart..i].iter().collect::<String>().trim().to_string())
        };
        match chars.get(i) {
            None => {}
            Some(',') => i += 1,
            Some(_) => {
                return Err(PathParseError::MalformedKey(chars[start..].iter().collect()));
            }
        }
        out.push((name, value));
    }
    Ok(out)
}

fn convert_key_value(raw: RawKeyValue) -> Result<CimValue, PathParseError> {
    match raw {
        RawKeyValue::Quoted(s) => {
            // Embedded instance paths are carried as quoted strings.
            if s.contains('=')
                && let Ok(path) = s.parse::<ObjectPath>()
                && !path.keybindings.is_empty()
            {
                return Ok(CimValue::reference(path));
            }
            Ok(CimValue::String(s))
        }
        RawKeyValue::Bare(s) => {
            if s.eq_ignore_ascii_case("true") {
                Ok(CimValue::Boolean(true))
            } else if s.eq_ignore_ascii_case("false") {
                Ok(CimValue::Boolean(false))
            } else if let Ok(i) = s.parse::<i64>() {
                Ok(CimValue::Integer(i))
            } else if let Ok(r) = s.parse::<f64>() {
                Ok(CimValue::Real(r))
            } else {
                Err(PathParseError::InvalidValue(s))
            }
        }
    }
}

impl FromStr for ObjectPath {
    type Err = PathParseError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let mut s = raw.trim();
        if s.is_empty() {
            return Err(PathParseError::Empty);
        }
        // Host component is accepted but not retained.
        if let Some(rest) = s.strip_prefix("//") {
            s = match rest.find('/') {
                Some(idx) => &rest[idx..],
                None => return Err(PathParseError::InvalidClassName(raw.to_string())),
            };
        }
        let (head, keys) = match s.find('.') {
            Some(idx) => (&s[..idx], Some(&s[idx + 1..])),
            None => (s, None),
        };
        let (namespace, classname) = match head.rfind(':') {
            Some(idx) => {
                let ns = head[..idx].trim_start_matches('/');
                (
                    if ns.is_empty() { None } else { Some(ns.to_string()) },
                    &head[idx + 1..],
                )
            }
            None => (None, head),
        };
        if !is_identifier(classname) {
            return Err(PathParseError::InvalidClassName(classname.to_string()));
        }
        let mut keybindings = BTreeMap::new();
        if let Some(keys) = keys {
            for (name, value) in split_keybindings(keys)? {
                keybindings.insert(name, convert_key_value(value)?);
            }
        }
        Ok(ObjectPath {
            namespace,
            classname: classname.to_string(),
            keybindings,
        })
    }
}

impl Serialize for ObjectPath {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ObjectPath {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/* ---- Schema elements ---- */

fn default_type() -> String {
    "string".to_string()
}

fn is_false(b: &bool) -> bool {
    !*b
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CimProperty {
    pub name: String,
    #[serde(rename = "type", default = "default_type")]
    pub cim_type: String,
    #[serde(default, skip_serializing_if = "is_false")]
    pub is_array: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference_class: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<CimValue>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub qualifiers: QualifierSet,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub class_origin: Option<String>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub propagated: bool,
}

impl CimProperty {
    pub fn new(name: impl Into<String>, cim_type: impl Into<String>) -> Self {
        CimProperty {
            name: name.into(),
            cim_type: cim_type.into(),
            is_array: false,
            reference_class: None,
            value: None,
            qualifiers: QualifierSet::new(),
            class_origin: None,
            propagated: false,
        }
    }

    pub fn is_key(&self) -> bool {
        lookup(&self.qualifiers, "Key").and_then(CimValue::as_bool) == Some(true)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CimParameter {
    pub name: String,
    #[serde(rename = "type", default = "default_type")]
    pub cim_type: String,
    #[serde(default, skip_serializing_if = "is_false")]
    pub is_array: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference_class: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub qualifiers: QualifierSet,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CimMethod {
    pub name: String,
    #[serde(rename = "type", default = "default_type")]
    pub return_type: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub parameters: Vec<CimParameter>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub qualifiers: QualifierSet,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub class_origin: Option<String>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub propagated: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CimClass {
    pub classname: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub superclass: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub qualifiers: QualifierSet,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub properties: Vec<CimProperty>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub methods: Vec<CimMethod>,
}

impl CimClass {
    pub fn new(classname: impl Into<String>) -> Self {
        CimClass {
            classname: classname.into(),
            superclass: None,
            qualifiers: QualifierSet::new(),
            properties: Vec::new(),
            methods: Vec::new(),
        }
    }

    pub fn qualifier(&self, name: &str) -> Option<&CimValue> {
        lookup(&self.qualifiers, name)
    }

    pub fn property(&self, name: &str) -> Option<&CimProperty> {
        self.properties
            .iter()
            .find(|p| p.name.eq_ignore_ascii_case(name))
    }

    pub fn is_association(&self) -> bool {
        self.qualifier("Association").and_then(CimValue::as_bool) == Some(true)
    }

    pub fn reference_properties(&self) -> impl Iterator<Item = &CimProperty> {
        self.properties.iter().filter(|p| p.reference_class.is_some())
    }

    /// Remove qualifiers at every level: class, properties, methods, parameters.
    pub fn strip_qualifiers(&mut self) {
        self.qualifiers.clear();
        for p in &mut self.properties {
            p.qualifiers.clear();
        }
        for m in &mut self.methods {
            m.qualifiers.clear();
            for param in &mut m.parameters {
                param.qualifiers.clear();
            }
        }
    }

    pub fn clear_class_origin(&mut self) {
        for p in &mut self.properties {
            p.class_origin = None;
        }
        for m in &mut self.methods {
            m.class_origin = None;
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CimInstance {
    pub classname: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<ObjectPath>,
    #[serde(default)]
    pub properties: BTreeMap<String, Option<CimValue>>,
}

impl CimInstance {
    pub fn new(classname: impl Into<String>) -> Self {
        CimInstance {
            classname: classname.into(),
            path: None,
            properties: BTreeMap::new(),
        }
    }

    pub fn with_property(mut self, name: impl Into<String>, value: CimValue) -> Self {
        self.set(name, Some(value));
        self
    }

    pub fn get(&self, name: &str) -> Option<&CimValue> {
        lookup(&self.properties, name).and_then(Option::as_ref)
    }

    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(CimValue::as_str)
    }

    pub fn get_path(&self, name: &str) -> Option<&ObjectPath> {
        self.get(name).and_then(CimValue::as_path)
    }

    /// Set a property, replacing an existing entry whose name differs only in case.
    pub fn set(&mut self, name: impl Into<String>, value: Option<CimValue>) {
        let name = name.into();
        let existing = self
            .properties
            .keys()
            .find(|k| k.eq_ignore_ascii_case(&name))
            .cloned();
        match existing {
            Some(k) => {
                self.properties.insert(k, value);
            }
            None => {
                self.properties.insert(name, value);
            }
        }
    }

    pub fn retain_properties(&mut self, names: &[String]) {
        self.properties
            .retain(|k, _| names.iter().any(|n| n.eq_ignore_ascii_case(k)));
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Scope {
    Class,
    Association,
    Indication,
    Property,
    Reference,
    Method,
    Parameter,
    Any,
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Scope::Class => "class",
            Scope::Association => "association",
            Scope::Indication => "indication",
            Scope::Property => "property",
            Scope::Reference => "reference",
            Scope::Method => "method",
            Scope::Parameter => "parameter",
            Scope::Any => "any",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualifierDecl {
    pub name: String,
    #[serde(rename = "type", default = "default_type")]
    pub cim_type: String,
    #[serde(default, skip_serializing_if = "is_false")]
    pub is_array: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<CimValue>,
    #[serde(default)]
    pub scopes: Vec<Scope>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub overridable: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tosubclass: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub translatable: Option<bool>,
}

impl QualifierDecl {
    pub fn new(name: impl Into<String>, cim_type: impl Into<String>, scopes: Vec<Scope>) -> Self {
        QualifierDecl {
            name: name.into(),
            cim_type: cim_type.into(),
            is_array: false,
            value: None,
            scopes,
            overridable: None,
            tosubclass: None,
            translatable: None,
        }
    }
}
