//! Resolve the `-n/--namespace` options of a command to the ordered list of
//! namespaces it runs against.

use crate::cim::{StatusCode, WbemConnection, WbemError};

/// Outcome of namespace resolution. `warning` is set when the interop
/// namespace could not be found and the default namespace was used instead.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedNamespaces {
    pub names: Vec<String>,
    pub warning: Option<String>,
}

impl ResolvedNamespaces {
    fn single(name: &str) -> Self {
        ResolvedNamespaces {
            names: vec![name.to_string()],
            warning: None,
        }
    }
}

/// Flatten repeated options and comma separated lists, keeping order and duplicates.
pub fn split_namespaces(requested: &[String]) -> Vec<String> {
    requested
        .iter()
        .flat_map(|item| item.split(','))
        .map(str::trim)
        .filter(|ns| !ns.is_empty())
        .map(str::to_string)
        .collect()
}

/// Resolve requested namespaces.
///
/// Explicit names are returned as given. With none given, the connection's
/// default namespace is used, or every namespace of the server (sorted) when
/// `default_all` is set. Servers without namespace enumeration fall back to
/// the default namespace; a missing interop namespace falls back with a warning.
pub fn resolve_namespaces(
    conn: &dyn WbemConnection,
    requested: &[String],
    default_all: bool,
) -> Result<ResolvedNamespaces, WbemError> {
    let explicit = split_namespaces(requested);
    if !explicit.is_empty() {
        return Ok(ResolvedNamespaces {
            names: explicit,
            warning: None,
        });
    }

    let default_ns = conn.default_namespace();
    if !default_all {
        return Ok(ResolvedNamespaces::single(default_ns));
    }

    match conn.enumerate_namespaces() {
        Ok(mut names) => {
            names.sort();
            tracing::debug!(count = names.len(), "namespaces enumerated");
            Ok(ResolvedNamespaces {
                names,
                warning: None,
            })
        }
        Err(WbemError::Model(reason)) => {
            tracing::debug!(%reason, "namespace enumeration unsupported, using default namespace");
            Ok(ResolvedNamespaces::single(default_ns))
        }
        Err(e) if e.status() == Some(StatusCode::NotFound) => {
            let warning = format!(
                "Interop namespace not found ({e}); using default namespace '{default_ns}'"
            );
            Ok(ResolvedNamespaces {
                names: vec![default_ns.to_string()],
                warning: Some(warning),
            })
        }
        Err(e) => Err(e),
    }
}
