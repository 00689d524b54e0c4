//! Named connection definitions persisted in a YAML file.
//!
//! ```yaml
//! connection_definitions:
//!   dev:
//!     server: https://cimom.example.com:5989
//!     default_namespace: root/cimv2
//!     user: admin
//!   local:
//!     mock_server: [mock/simple_repo.yaml]
//! default_connection: local
//! ```

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const DEFAULT_CONNECTIONS_FILE: &str = "wbemcli_connections.yaml";

#[derive(Debug, Error)]
pub enum ConnectionFileError {
    #[error("Failed to read connections file '{path}'")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse connections file '{path}'")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("Failed to write connections file '{path}'")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to serialize connection definitions")]
    Serialize(#[source] serde_yaml::Error),

    #[error("Connection '{0}' not found in connections file")]
    NotFound(String),

    #[error("Invalid connection definition '{name}': {message}")]
    Invalid { name: String, message: String },
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConnectionDefinition {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub mock_server: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_namespace: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
    /// Operation timeout in seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u32>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub no_verify: bool,
}

impl ConnectionDefinition {
    /// Exactly one of `server` / `mock_server` must be set.
    pub fn validate(&self, name: &str) -> Result<(), ConnectionFileError> {
        let invalid = |message: &str| ConnectionFileError::Invalid {
            name: name.to_string(),
            message: message.to_string(),
        };
        if name.trim().is_empty() {
            return Err(invalid("name must not be empty"));
        }
        match (&self.server, self.mock_server.is_empty()) {
            (Some(_), false) => Err(invalid("server and mock_server are mutually exclusive")),
            (None, true) => Err(invalid("one of server or mock_server is required")),
            (Some(s), true) if s.trim().is_empty() => Err(invalid("server must not be empty")),
            _ => Ok(()),
        }
    }

    /// Short description for listings.
    pub fn target_summary(&self) -> String {
        match &self.server {
            Some(s) => s.clone(),
            None => format!("mock: {}", self.mock_server.join(", ")),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConnectionFile {
    #[serde(default)]
    pub connection_definitions: BTreeMap<String, ConnectionDefinition>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_connection: Option<String>,
}

/// Connection file loaded into memory; changes are written with `save`.
#[derive(Debug)]
pub struct ConnectionRepository {
    path: PathBuf,
    file: ConnectionFile,
}

impl ConnectionRepository {
    /// Resolve the file location: explicit path, else the default name in the
    /// current directory.
    pub fn resolve_path(explicit: Option<&Path>) -> PathBuf {
        explicit
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONNECTIONS_FILE))
    }

    /// Load the repository. A missing file is an empty repository.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, ConnectionFileError> {
        let path = path.into();
        if !path.exists() {
            tracing::debug!(path = %path.display(), "connections file absent, starting empty");
            return Ok(ConnectionRepository {
                path,
                file: ConnectionFile::default(),
            });
        }
        let content = fs::read_to_string(&path).map_err(|source| ConnectionFileError::Read {
            path: path.clone(),
            source,
        })?;
        let file: ConnectionFile = if content.trim().is_empty() {
            ConnectionFile::default()
        } else {
            serde_yaml::from_str(&content).map_err(|source| ConnectionFileError::Parse {
                path: path.clone(),
                source,
            })?
        };
        for (name, def) in &file.connection_definitions {
            def.validate(name)?;
        }
        Ok(ConnectionRepository { path, file })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.file.connection_definitions.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ConnectionDefinition)> {
        self.file
            .connection_definitions
            .iter()
            .map(|(n, d)| (n.as_str(), d))
    }

    pub fn is_empty(&self) -> bool {
        self.file.connection_definitions.is_empty()
    }

    pub fn get(&self, name: &str) -> Result<&ConnectionDefinition, ConnectionFileError> {
        self.file
            .connection_definitions
            .get(name)
            .ok_or_else(|| ConnectionFileError::NotFound(name.to_string()))
    }

    pub fn default_connection(&self) -> Option<&str> {
        self.file.default_connection.as_deref()
    }

    /// Add or replace a definition. Returns true when one was replaced.
    pub fn add(
        &mut self,
        name: &str,
        def: ConnectionDefinition,
    ) -> Result<bool, ConnectionFileError> {
        def.validate(name)?;
        Ok(self
            .file
            .connection_definitions
            .insert(name.to_string(), def)
            .is_some())
    }

    /// Remove a definition, clearing the default marker if it pointed at it.
    pub fn delete(&mut self, name: &str) -> Result<ConnectionDefinition, ConnectionFileError> {
        let def = self
            .file
            .connection_definitions
            .remove(name)
            .ok_or_else(|| ConnectionFileError::NotFound(name.to_string()))?;
        if self.file.default_connection.as_deref() == Some(name) {
            self.file.default_connection = None;
        }
        Ok(def)
    }

    pub fn set_default(&mut self, name: Option<&str>) -> Result<(), ConnectionFileError> {
        if let Some(n) = name {
            self.get(n)?;
        }
        self.file.default_connection = name.map(str::to_string);
        Ok(())
    }

    pub fn save(&self) -> Result<(), ConnectionFileError> {
        let yaml = serde_yaml::to_string(&self.file).map_err(ConnectionFileError::Serialize)?;
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).map_err(|source| ConnectionFileError::Write {
                path: self.path.clone(),
                source,
            })?;
        }
        fs::write(&self.path, yaml).map_err(|source| ConnectionFileError::Write {
            path: self.path.clone(),
            source,
        })?;
        tracing::debug!(path = %self.path.display(), "connections file saved");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mock_def(file: &str) -> ConnectionDefinition {
        ConnectionDefinition {
            mock_server: vec![file.to_string()],
            ..ConnectionDefinition::default()
        }
    }

    #[test]
    fn missing_file_is_empty_repository() {
        let dir = tempfile::tempdir().unwrap();
        let repo = ConnectionRepository::open(dir.path().join("none.yaml")).unwrap();
        assert!(repo.is_empty());
        assert!(repo.default_connection().is_none());
    }

    #[test]
    fn save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("conns.yaml");
        let mut repo = ConnectionRepository::open(&path).unwrap();
        repo.add(
            "dev",
            ConnectionDefinition {
                server: Some("https://cimom:5989".into()),
                user: Some("admin".into()),
                timeout: Some(30),
                ..ConnectionDefinition::default()
            },
        )
        .unwrap();
        repo.add("mock", mock_def("repo.yaml")).unwrap();
        repo.set_default(Some("mock")).unwrap();
        repo.save().unwrap();

        let back = ConnectionRepository::open(&path).unwrap();
        assert_eq!(back.names().collect::<Vec<_>>(), vec!["dev", "mock"]);
        assert_eq!(back.default_connection(), Some("mock"));
        assert_eq!(back.get("dev").unwrap().timeout, Some(30));
    }

    #[test]
    fn delete_clears_default() {
        let dir = tempfile::tempdir().unwrap();
        let mut repo = ConnectionRepository::open(dir.path().join("c.yaml")).unwrap();
        repo.add("a", mock_def("a.yaml")).unwrap();
        repo.set_default(Some("a")).unwrap();
        repo.delete("a").unwrap();
        assert!(repo.default_connection().is_none());
        assert!(matches!(
            repo.delete("a"),
            Err(ConnectionFileError::NotFound(_))
        ));
    }

    #[test]
    fn definitions_are_validated() {
        let both = ConnectionDefinition {
            server: Some("https://x".into()),
            mock_server: vec!["a.yaml".into()],
            ..ConnectionDefinition::default()
        };
        assert!(both.validate("x").is_err());
        assert!(ConnectionDefinition::default().validate("x").is_err());
        assert!(mock_def("a.yaml").validate("").is_err());
        assert!(mock_def("a.yaml").validate("ok").is_ok());
    }

    #[test]
    fn default_must_exist() {
        let dir = tempfile::tempdir().unwrap();
        let mut repo = ConnectionRepository::open(dir.path().join("c.yaml")).unwrap();
        assert!(matches!(
            repo.set_default(Some("nope")),
            Err(ConnectionFileError::NotFound(_))
        ));
    }

    #[test]
    fn malformed_file_reports_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.yaml");
        fs::write(&path, "connection_definitions: [not, a, map]").unwrap();
        let err = ConnectionRepository::open(&path).unwrap_err();
        assert!(err.to_string().contains("bad.yaml"));
    }
}
