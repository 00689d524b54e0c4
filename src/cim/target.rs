//! Target parsing (WBEM server URL vs mock repository files).
//!
//! parse_server / parse_mock -> TargetSpec { Server | Mock }
//! establish -> boxed `WbemConnection` (mock only; no CIM-XML transport here).
//!
use anyhow::{Context, Result, bail};
use std::fmt;
use std::path::PathBuf;
use url::Url;

use super::WbemConnection;
use super::mock::MockWbemServer;

/// Classification of the high-level target kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetKind {
    Http,
    Https,
    Mock,
}

/// A parsed representation of the server a command should talk to.
#[derive(Debug, Clone)]
pub enum TargetSpec {
    /// Remote WBEM server. `original` keeps the user's spelling for diagnostics.
    Server { original: String, url: Url },
    /// In-memory mock server built from repository files.
    Mock { files: Vec<PathBuf> },
}

impl TargetSpec {
    pub fn kind(&self) -> TargetKind {
        match self {
            TargetSpec::Server { url, .. } if url.scheme() == "http" => TargetKind::Http,
            TargetSpec::Server { .. } => TargetKind::Https,
            TargetSpec::Mock { .. } => TargetKind::Mock,
        }
    }
}

impl fmt::Display for TargetSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TargetSpec::Server { url, .. } => write!(f, "server: {url}"),
            TargetSpec::Mock { files } => {
                let names: Vec<String> = files.iter().map(|p| p.display().to_string()).collect();
                write!(f, "mock: {}", names.join(", "))
            }
        }
    }
}

/// Parse a `--server` value.
///
/// Accepts `http://host[:port]`, `https://host[:port]` or a bare
/// `host[:port]`, which defaults to https. Other schemes are rejected.
///
/// Examples:
/// - "https://cimom.example.com:5989" -> Server (https)
/// - "localhost:5988" -> Server (https://localhost:5988)
pub fn parse_server(raw: &str) -> Result<TargetSpec> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        bail!("Server URL is empty");
    }

    let candidate = if trimmed.contains("://") {
        trimmed.to_string()
    } else {
        format!("https://{trimmed}")
    };
    let url = Url::parse(&candidate).with_context(|| format!("Invalid server URL '{raw}'"))?;
    match url.scheme() {
        "http" | "https" => {}
        other => bail!("Unsupported scheme '{other}' in server URL '{raw}' (use http or https)"),
    }
    if url.host_str().is_none() {
        bail!("Server URL '{raw}' has no host");
    }
    Ok(TargetSpec::Server {
        original: raw.to_string(),
        url,
    })
}

/// Build a mock target from one or more repository files (comma lists allowed).
pub fn parse_mock(files: &[String]) -> Result<TargetSpec> {
    let files: Vec<PathBuf> = files
        .iter()
        .flat_map(|f| f.split(','))
        .map(str::trim)
        .filter(|f| !f.is_empty())
        .map(PathBuf::from)
        .collect();
    if files.is_empty() {
        bail!("No mock repository files given");
    }
    for f in &files {
        let ext = f
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase());
        match ext.as_deref() {
            Some("yaml") | Some("yml") | Some("json") => {}
            _ => bail!(
                "Mock repository file '{}' must be .yaml, .yml or .json",
                f.display()
            ),
        }
    }
    Ok(TargetSpec::Mock { files })
}

/// Open a connection for the target.
pub fn establish(
    spec: &TargetSpec,
    default_namespace: Option<&str>,
) -> Result<Box<dyn WbemConnection>> {
    match spec {
        TargetSpec::Mock { files } => {
            let server = MockWbemServer::from_files(files, default_namespace)
                .with_context(|| format!("Failed to build mock server ({spec})"))?;
            tracing::debug!(
                url = server.url(),
                default_namespace = server.default_namespace(),
                "mock server ready"
            );
            Ok(Box::new(server))
        }
        TargetSpec::Server { original, url } => {
            tracing::debug!(%url, "no transport for remote server");
            bail!(
                "Cannot connect to {original}: the CIM-XML transport is not part of this build; \
                 use --mock-server to work against a repository file"
            )
        }
    }
}
