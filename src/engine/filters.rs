//! Class filters: qualifier flags (association, indication, experimental,
//! deprecated), minimum schema version, schema prefix, subclass-of and
//! leaf classes.
//!
//! Filters are evaluated against a retrieved batch of classes and combined
//! with logical AND. Qualifier scopes come from the qualifier declarations of
//! the namespace, so `--experimental` also matches an experimental property
//! when the declaration allows the qualifier on properties.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use thiserror::Error;

use super::results::OpError;
use crate::cim::{CimClass, CimValue, Scope, StatusCode, WbemConnection, model::lookup};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FilterError {
    #[error("invalid --since version '{0}': expected three numeric components M.N.U")]
    InvalidVersion(String),

    #[error("class '{0}' given with --subclass-of was not found among the retrieved classes")]
    SubclassOfNotFound(String),
}

/// Filter flags of the class commands. `None` leaves a qualifier unfiltered.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterOptions {
    pub association: Option<bool>,
    pub indication: Option<bool>,
    pub experimental: Option<bool>,
    pub deprecated: Option<bool>,
    pub since: Option<String>,
    pub schema: Option<String>,
    pub subclass_of: Option<String>,
    pub leaf_classes: bool,
}

impl FilterOptions {
    pub fn is_active(&self) -> bool {
        self.association.is_some()
            || self.indication.is_some()
            || self.experimental.is_some()
            || self.deprecated.is_some()
            || self.since.is_some()
            || self.schema.is_some()
            || self.subclass_of.is_some()
            || self.leaf_classes
    }
}

/// Elements of a class a qualifier may be attached to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScopeMask {
    pub class: bool,
    pub property: bool,
    pub method: bool,
    pub parameter: bool,
}

impl ScopeMask {
    pub const ALL: ScopeMask = ScopeMask {
        class: true,
        property: true,
        method: true,
        parameter: true,
    };

    pub fn from_scopes(scopes: &[Scope]) -> Self {
        let mut mask = ScopeMask::default();
        for scope in scopes {
            match scope {
                Scope::Class | Scope::Association | Scope::Indication => mask.class = true,
                Scope::Property | Scope::Reference => mask.property = true,
                Scope::Method => mask.method = true,
                Scope::Parameter => mask.parameter = true,
                Scope::Any => return ScopeMask::ALL,
            }
        }
        mask
    }
}

/// `M.N.U` schema version, ordered component-wise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct SchemaVersion(pub u32, pub u32, pub u32);

impl std::str::FromStr for SchemaVersion {
    type Err = FilterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || FilterError::InvalidVersion(s.to_string());
        let parts: Vec<&str> = s.trim().split('.').collect();
        let [major, minor, update] = parts.as_slice() else {
            return Err(invalid());
        };
        let num = |p: &str| p.trim().parse::<u32>().map_err(|_| invalid());
        Ok(SchemaVersion(num(*major)?, num(*minor)?, num(*update)?))
    }
}

impl fmt::Display for SchemaVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.0, self.1, self.2)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Wanted {
    Flag(bool),
    AtLeast(SchemaVersion),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QualifierFilter {
    pub qualifier: String,
    pub wanted: Wanted,
    pub scope: ScopeMask,
}

/// Filters ready to apply to one namespace's batch of classes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QualifierFilterSpec {
    pub qualifiers: Vec<QualifierFilter>,
    pub schema: Option<String>,
    pub subclass_of: Option<String>,
    pub leaf_classes: bool,
}

impl QualifierFilterSpec {
    pub fn is_empty(&self) -> bool {
        self.qualifiers.is_empty()
            && self.schema.is_none()
            && self.subclass_of.is_none()
            && !self.leaf_classes
    }
}

/// Result of `apply`.
#[derive(Debug, Clone, PartialEq)]
pub enum Filtered {
    Classes(Vec<CimClass>),
    Names(Vec<String>),
}

fn qualifier_scope(
    conn: &dyn WbemConnection,
    namespace: &str,
    qualifier: &str,
) -> Result<ScopeMask, OpError> {
    match conn.get_qualifier(namespace, qualifier) {
        Ok(decl) => Ok(ScopeMask::from_scopes(&decl.scopes)),
        Err(e) if e.status() == Some(StatusCode::NotFound) => {
            tracing::debug!(namespace, qualifier, "qualifier not declared, matching any element");
            Ok(ScopeMask::ALL)
        }
        Err(e) => Err(e.into()),
    }
}

/// Build the filter set for `namespace`. The version given with `since` is
/// validated before the server is consulted.
pub fn build_filters(
    conn: &dyn WbemConnection,
    namespace: &str,
    opts: &FilterOptions,
) -> Result<QualifierFilterSpec, OpError> {
    let since = opts
        .since
        .as_deref()
        .map(str::parse::<SchemaVersion>)
        .transpose()?;

    let mut qualifiers = Vec::new();
    let flags = [
        ("Association", opts.association),
        ("Indication", opts.indication),
        ("Experimental", opts.experimental),
        ("Deprecated", opts.deprecated),
    ];
    for (name, wanted) in flags {
        if let Some(wanted) = wanted {
            qualifiers.push(QualifierFilter {
                qualifier: name.to_string(),
                wanted: Wanted::Flag(wanted),
                scope: qualifier_scope(conn, namespace, name)?,
            });
        }
    }
    if let Some(version) = since {
        qualifiers.push(QualifierFilter {
            qualifier: "Version".to_string(),
            wanted: Wanted::AtLeast(version),
            scope: ScopeMask {
                class: true,
                ..ScopeMask::default()
            },
        });
    }

    Ok(QualifierFilterSpec {
        qualifiers,
        schema: opts.schema.clone(),
        subclass_of: opts.subclass_of.clone(),
        leaf_classes: opts.leaf_classes,
    })
}

/// A qualifier counts as present unless it is absent or explicitly false.
fn present(quals: &BTreeMap<String, CimValue>, name: &str) -> bool {
    lookup(quals, name).is_some_and(|v| v != &CimValue::Boolean(false))
}

fn has_qualifier(cls: &CimClass, name: &str, scope: ScopeMask) -> bool {
    (scope.class && present(&cls.qualifiers, name))
        || (scope.property && cls.properties.iter().any(|p| present(&p.qualifiers, name)))
        || (scope.method && cls.methods.iter().any(|m| present(&m.qualifiers, name)))
        || (scope.parameter
            && cls
                .methods
                .iter()
                .flat_map(|m| &m.parameters)
                .any(|p| present(&p.qualifiers, name)))
}

fn class_version(cls: &CimClass) -> Option<SchemaVersion> {
    let raw = cls.qualifier("Version")?.as_str()?;
    match raw.parse() {
        Ok(v) => Some(v),
        Err(_) => {
            tracing::debug!(class = %cls.classname, version = raw, "unparsable Version qualifier");
            None
        }
    }
}

fn matches_qualifier(cls: &CimClass, filter: &QualifierFilter) -> bool {
    match &filter.wanted {
        Wanted::Flag(wanted) => has_qualifier(cls, &filter.qualifier, filter.scope) == *wanted,
        Wanted::AtLeast(min) => class_version(cls).is_some_and(|v| v >= *min),
    }
}

fn matches_schema(classname: &str, schema: &str) -> bool {
    let prefix = format!("{}_", schema.to_ascii_lowercase());
    classname.to_ascii_lowercase().starts_with(&prefix)
}

/// Lowercased names of every class in the batch deriving from `root`
/// (`root` itself excluded).
fn subclass_closure(classes: &[CimClass], root: &str) -> BTreeSet<String> {
    let parent: BTreeMap<String, String> = classes
        .iter()
        .filter_map(|c| {
            c.superclass
                .as_ref()
                .map(|s| (c.classname.to_ascii_lowercase(), s.to_ascii_lowercase()))
        })
        .collect();
    let root = root.to_ascii_lowercase();
    classes
        .iter()
        .map(|c| c.classname.to_ascii_lowercase())
        .filter(|name| {
            let mut current = parent.get(name);
            let mut hops = 0;
            while let Some(p) = current {
                if *p == root {
                    return true;
                }
                hops += 1;
                if hops > classes.len() {
                    break;
                }
                current = parent.get(p);
            }
            false
        })
        .collect()
}

/// Apply `spec` to a batch. Qualifiers are stripped from retained classes
/// afterwards unless `include_qualifiers` is set.
pub fn apply(
    classes: Vec<CimClass>,
    spec: &QualifierFilterSpec,
    names_only: bool,
    include_qualifiers: bool,
) -> Result<Filtered, FilterError> {
    let closure = match &spec.subclass_of {
        Some(root) => {
            if !classes
                .iter()
                .any(|c| c.classname.eq_ignore_ascii_case(root))
            {
                return Err(FilterError::SubclassOfNotFound(root.clone()));
            }
            Some(subclass_closure(&classes, root))
        }
        None => None,
    };
    let with_children: BTreeSet<String> = classes
        .iter()
        .filter_map(|c| c.superclass.as_ref().map(|s| s.to_ascii_lowercase()))
        .collect();

    let mut retained: Vec<CimClass> = classes
        .into_iter()
        .filter(|cls| {
            let lower = cls.classname.to_ascii_lowercase();
            spec.qualifiers.iter().all(|f| matches_qualifier(cls, f))
                && spec
                    .schema
                    .as_deref()
                    .is_none_or(|s| matches_schema(&cls.classname, s))
                && closure.as_ref().is_none_or(|c| c.contains(&lower))
                && (!spec.leaf_classes || !with_children.contains(&lower))
        })
        .collect();

    if names_only {
        return Ok(Filtered::Names(
            retained.into_iter().map(|c| c.classname).collect(),
        ));
    }
    if !include_qualifiers {
        retained.iter_mut().for_each(CimClass::strip_qualifiers);
    }
    Ok(Filtered::Classes(retained))
}
