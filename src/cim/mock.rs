//! In-memory WBEM server backed by YAML/JSON repository files.
//!
//! Repository layout (YAML shown, JSON equivalent accepted):
//!
//! ```yaml
//! default_namespace: root/cimv2        # optional
//! namespace_enumeration: supported     # or: unsupported
//! namespaces:
//!   root/cimv2:
//!     qualifier_decls: [...]
//!     classes: [...]
//!     instances: [...]
//! ```
//!
//! Several files may be given; namespaces with the same name are merged.
//! Instance paths are computed from the `Key` properties of the class
//! hierarchy when the repository is loaded and on `create_instance`.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

use super::error::{StatusCode, WbemError};
use super::model::{CimClass, CimInstance, CimValue, ObjectPath, QualifierDecl};
use super::{AssocFilter, ClassRequest, InstanceRequest, WbemConnection};

pub const DEFAULT_NAMESPACE: &str = "root/cimv2";

/// Namespace names recognized as the interop namespace, in lookup order.
pub const INTEROP_NAMESPACES: &[&str] = &["interop", "root/interop", "root/PG_InterOp"];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NamespaceEnumeration {
    #[default]
    Supported,
    /// Simulates a server without the CIM_Namespace model.
    Unsupported,
}

/// Failure every operation in a mock namespace reports instead of its result,
/// e.g. `fault: {kind: status, code: 2}` or `fault: {kind: timeout, message: ...}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum MockFault {
    /// A CIM status code (1 = CIM_ERR_FAILED ... 17 = CIM_ERR_METHOD_NOT_FOUND).
    Status { code: u16 },
    Connection { message: String },
    Authentication { message: String },
    Timeout { message: String },
}

impl MockFault {
    fn to_error(&self, namespace: &str) -> WbemError {
        match self {
            MockFault::Status { code } => WbemError::cim(
                StatusCode::from_code(*code),
                format!("simulated failure in namespace '{namespace}'"),
            ),
            MockFault::Connection { message } => WbemError::Connection(message.clone()),
            MockFault::Authentication { message } => WbemError::Authentication(message.clone()),
            MockFault::Timeout { message } => WbemError::Timeout(message.clone()),
        }
    }
}

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct MockNamespace {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fault: Option<MockFault>,
    #[serde(default)]
    pub qualifier_decls: Vec<QualifierDecl>,
    #[serde(default)]
    pub classes: Vec<CimClass>,
    #[serde(default)]
    pub instances: Vec<CimInstance>,
}

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct MockRepository {
    #[serde(default)]
    pub default_namespace: Option<String>,
    #[serde(default)]
    pub namespace_enumeration: NamespaceEnumeration,
    #[serde(default)]
    pub namespaces: BTreeMap<String, MockNamespace>,
}

#[derive(Debug, Error)]
pub enum MockError {
    #[error("failed to read mock repository '{path}'")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse YAML mock repository '{path}'")]
    Yaml {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("failed to parse JSON mock repository '{path}'")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid mock repository: {0}")]
    Invalid(String),
}

fn not_found(what: impl Into<String>) -> WbemError {
    WbemError::cim(StatusCode::NotFound, what)
}

fn invalid_class(ns: &str, classname: &str) -> WbemError {
    WbemError::cim(
        StatusCode::InvalidClass,
        format!("class '{classname}' does not exist in namespace '{ns}'"),
    )
}

fn name_matches(filter: Option<&str>, name: &str) -> bool {
    filter.is_none_or(|f| f.eq_ignore_ascii_case(name))
}

impl MockNamespace {
    fn class(&self, name: &str) -> Option<&CimClass> {
        self.classes
            .iter()
            .find(|c| c.classname.eq_ignore_ascii_case(name))
    }

    /// The class followed by its ancestors, nearest first.
    fn superclass_chain(&self, name: &str) -> Vec<&CimClass> {
        let mut chain = Vec::new();
        let mut next = self.class(name);
        while let Some(cls) = next {
            if chain.len() > self.classes.len() {
                break; // cyclic hierarchy
            }
            chain.push(cls);
            next = cls.superclass.as_deref().and_then(|s| self.class(s));
        }
        chain
    }

    /// True if `name` is `ancestor` or derives from it.
    fn is_subclass_of(&self, name: &str, ancestor: &str) -> bool {
        self.superclass_chain(name)
            .iter()
            .any(|c| c.classname.eq_ignore_ascii_case(ancestor))
    }

    fn is_association_class(&self, name: &str) -> bool {
        self.superclass_chain(name).iter().any(|c| c.is_association())
    }

    fn select_classes(
        &self,
        ns: &str,
        classname: Option<&str>,
        deep: bool,
    ) -> Result<Vec<&CimClass>, WbemError> {
        if let Some(c) = classname
            && self.class(c).is_none()
        {
            return Err(invalid_class(ns, c));
        }
        Ok(self
            .classes
            .iter()
            .filter(|c| match classname {
                None => deep || c.superclass.is_none(),
                Some(parent) if deep => {
                    !c.classname.eq_ignore_ascii_case(parent)
                        && self.is_subclass_of(&c.classname, parent)
                }
                Some(parent) => c
                    .superclass
                    .as_deref()
                    .is_some_and(|s| s.eq_ignore_ascii_case(parent)),
            })
            .collect())
    }

    /// Class as a server would return it: inherited elements merged in
    /// unless `local_only`, qualifiers and class origin per request flags.
    fn resolved_class(&self, name: &str, req: &ClassRequest) -> Option<CimClass> {
        let chain = self.superclass_chain(name);
        let cls = *chain.first()?;
        let mut merged = CimClass {
            classname: cls.classname.clone(),
            superclass: cls.superclass.clone(),
            qualifiers: cls.qualifiers.clone(),
            properties: Vec::new(),
            methods: Vec::new(),
        };
        let sources: Vec<&CimClass> = if req.local_only {
            vec![cls]
        } else {
            chain.iter().rev().copied().collect()
        };
        for source in sources {
            let propagated = !source.classname.eq_ignore_ascii_case(&cls.classname);
            for p in &source.properties {
                let mut p = p.clone();
                p.class_origin = Some(source.classname.clone());
                p.propagated = propagated;
                match merged
                    .properties
                    .iter_mut()
                    .find(|e| e.name.eq_ignore_ascii_case(&p.name))
                {
                    Some(existing) => *existing = p,
                    None => merged.properties.push(p),
                }
            }
            for m in &source.methods {
                let mut m = m.clone();
                m.class_origin = Some(source.classname.clone());
                m.propagated = propagated;
                match merged
                    .methods
                    .iter_mut()
                    .find(|e| e.name.eq_ignore_ascii_case(&m.name))
                {
                    Some(existing) => *existing = m,
                    None => merged.methods.push(m),
                }
            }
        }
        if !req.include_qualifiers {
            merged.strip_qualifiers();
        }
        if !req.include_classorigin {
            merged.clear_class_origin();
        }
        Some(merged)
    }

    fn key_names(&self, classname: &str) -> Vec<String> {
        self.resolved_class(classname, &ClassRequest::default())
            .map(|c| {
                c.properties
                    .iter()
                    .filter(|p| p.is_key())
                    .map(|p| p.name.clone())
                    .collect()
            })
            .unwrap_or_default()
    }

    fn instance_path(&self, ns: &str, inst: &CimInstance) -> Result<ObjectPath, WbemError> {
        let cls = self
            .class(&inst.classname)
            .ok_or_else(|| invalid_class(ns, &inst.classname))?;
        let keys = self.key_names(&cls.classname);
        if keys.is_empty() {
            return Err(WbemError::cim(
                StatusCode::InvalidParameter,
                format!("class '{}' defines no key properties", cls.classname),
            ));
        }
        let mut path = ObjectPath::new(cls.classname.clone()).with_namespace(ns);
        for key in keys {
            let value = inst.get(&key).cloned().ok_or_else(|| {
                WbemError::cim(
                    StatusCode::InvalidParameter,
                    format!("instance of '{}' lacks key property '{key}'", cls.classname),
                )
            })?;
            path.keybindings.insert(key, value);
        }
        Ok(path)
    }

    fn find_instance(&self, path: &ObjectPath) -> Option<&CimInstance> {
        self.instances
            .iter()
            .find(|i| i.path.as_ref() == Some(path))
    }

    /// Association instances of the (optional) class filter that reference
    /// `target` through a property matching `role`, paired with that property name.
    fn referencing<'a>(
        &'a self,
        target: &'a ObjectPath,
        assoc_class: Option<&'a str>,
        role: Option<&'a str>,
    ) -> impl Iterator<Item = (&'a CimInstance, &'a str)> + 'a {
        self.instances
            .iter()
            .filter(move |inst| self.is_association_class(&inst.classname))
            .filter(move |inst| assoc_class.is_none_or(|ac| self.is_subclass_of(&inst.classname, ac)))
            .filter_map(move |inst| {
                inst.properties
                    .iter()
                    .find(|(pname, value)| {
                        name_matches(role, pname)
                            && value
                                .as_ref()
                                .and_then(CimValue::as_path)
                                .is_some_and(|p| p == target)
                    })
                    .map(|(pname, _)| (inst, pname.as_str()))
            })
    }
}

/// Mock WBEM server holding a merged repository in memory.
#[derive(Debug)]
pub struct MockWbemServer {
    url: String,
    default_namespace: String,
    enumeration: NamespaceEnumeration,
    namespaces: Vec<(String, MockNamespace)>,
}

impl MockWbemServer {
    /// Load and merge repository files (`.yaml`/`.yml` or `.json`).
    pub fn from_files(
        files: &[PathBuf],
        default_namespace: Option<&str>,
    ) -> Result<Self, MockError> {
        let mut merged = MockRepository::default();
        for path in files {
            let repo = load_repository(path)?;
            if merged.default_namespace.is_none() {
                merged.default_namespace = repo.default_namespace;
            }
            if repo.namespace_enumeration == NamespaceEnumeration::Unsupported {
                merged.namespace_enumeration = NamespaceEnumeration::Unsupported;
            }
            for (name, ns) in repo.namespaces {
                let entry = merged.namespaces.entry(name).or_default();
                if ns.fault.is_some() {
                    entry.fault = ns.fault;
                }
                entry.qualifier_decls.extend(ns.qualifier_decls);
                entry.classes.extend(ns.classes);
                entry.instances.extend(ns.instances);
            }
        }
        let names: Vec<String> = files.iter().map(|p| p.display().to_string()).collect();
        Self::from_repository(merged, default_namespace, format!("mock:{}", names.join(",")))
    }

    pub fn from_repository(
        repo: MockRepository,
        default_namespace: Option<&str>,
        url: impl Into<String>,
    ) -> Result<Self, MockError> {
        let default_namespace = default_namespace
            .map(str::to_string)
            .or(repo.default_namespace)
            .unwrap_or_else(|| DEFAULT_NAMESPACE.to_string());

        let mut namespaces: Vec<(String, MockNamespace)> = Vec::new();
        for (name, ns) in repo.namespaces {
            let name = name.trim_matches('/').to_string();
            if namespaces.iter().any(|(n, _)| n.eq_ignore_ascii_case(&name)) {
                return Err(MockError::Invalid(format!(
                    "namespace '{name}' defined twice with different case"
                )));
            }
            namespaces.push((name, ns));
        }

        for (name, ns) in &mut namespaces {
            validate_classes(name, ns)?;
            let mut paths = Vec::with_capacity(ns.instances.len());
            for inst in &ns.instances {
                let path = ns
                    .instance_path(name, inst)
                    .map_err(|e| MockError::Invalid(format!("namespace '{name}': {e}")))?;
                if paths.contains(&path) {
                    return Err(MockError::Invalid(format!("duplicate instance {path}")));
                }
                paths.push(path);
            }
            for (inst, path) in ns.instances.iter_mut().zip(paths) {
                inst.path = Some(path);
            }
        }

        Ok(MockWbemServer {
            url: url.into(),
            default_namespace,
            enumeration: repo.namespace_enumeration,
            namespaces,
        })
    }

    fn namespace(&self, name: &str) -> Result<&MockNamespace, WbemError> {
        let wanted = name.trim_matches('/');
        let ns = self
            .namespaces
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(wanted))
            .map(|(_, ns)| ns)
            .ok_or_else(|| {
                WbemError::cim(
                    StatusCode::InvalidNamespace,
                    format!("namespace '{name}' does not exist"),
                )
            })?;
        match &ns.fault {
            Some(fault) => Err(fault.to_error(wanted)),
            None => Ok(ns),
        }
    }

    fn namespace_mut(&mut self, name: &str) -> Result<(String, &mut MockNamespace), WbemError> {
        let wanted = name.trim_matches('/');
        self.namespaces
            .iter_mut()
            .find(|(n, _)| n.eq_ignore_ascii_case(wanted))
            .map(|(n, ns)| (n.clone(), ns))
            .ok_or_else(|| {
                WbemError::cim(
                    StatusCode::InvalidNamespace,
                    format!("namespace '{name}' does not exist"),
                )
            })
            .and_then(|(n, ns)| {
                let fault = ns.fault.as_ref().map(|f| f.to_error(&n));
                match fault {
                    Some(e) => Err(e),
                    None => Ok((n, ns)),
                }
            })
    }
}

fn load_repository(path: &Path) -> Result<MockRepository, MockError> {
    let raw = std::fs::read_to_string(path).map_err(|source| MockError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let is_json = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("json"));
    if is_json {
        serde_json::from_str(&raw).map_err(|source| MockError::Json {
            path: path.to_path_buf(),
            source,
        })
    } else {
        serde_yaml::from_str(&raw).map_err(|source| MockError::Yaml {
            path: path.to_path_buf(),
            source,
        })
    }
}

fn validate_classes(ns_name: &str, ns: &MockNamespace) -> Result<(), MockError> {
    for (i, cls) in ns.classes.iter().enumerate() {
        if ns.classes[..i]
            .iter()
            .any(|c| c.classname.eq_ignore_ascii_case(&cls.classname))
        {
            return Err(MockError::Invalid(format!(
                "class '{}' defined twice in namespace '{ns_name}'",
                cls.classname
            )));
        }
        if let Some(sup) = &cls.superclass
            && ns.class(sup).is_none()
        {
            return Err(MockError::Invalid(format!(
                "superclass '{sup}' of '{}' not defined in namespace '{ns_name}'",
                cls.classname
            )));
        }
    }
    Ok(())
}

impl WbemConnection for MockWbemServer {
    fn url(&self) -> &str {
        &self.url
    }

    fn default_namespace(&self) -> &str {
        &self.default_namespace
    }

    fn interop_namespace(&self) -> Result<String, WbemError> {
        INTEROP_NAMESPACES
            .iter()
            .find_map(|candidate| {
                self.namespaces
                    .iter()
                    .find(|(n, _)| n.eq_ignore_ascii_case(candidate))
                    .map(|(n, _)| n.clone())
            })
            .ok_or_else(|| not_found("interop namespace could not be determined"))
    }

    fn enumerate_namespaces(&self) -> Result<Vec<String>, WbemError> {
        if self.enumeration == NamespaceEnumeration::Unsupported {
            return Err(WbemError::Model(
                "server does not implement the CIM_Namespace model".into(),
            ));
        }
        self.interop_namespace()?;
        Ok(self.namespaces.iter().map(|(n, _)| n.clone()).collect())
    }

    fn enumerate_classes(
        &self,
        namespace: &str,
        classname: Option<&str>,
        req: &ClassRequest,
    ) -> Result<Vec<CimClass>, WbemError> {
        let ns = self.namespace(namespace)?;
        Ok(ns
            .select_classes(namespace, classname, req.deep_inheritance)?
            .into_iter()
            .filter_map(|c| ns.resolved_class(&c.classname, req))
            .collect())
    }

    fn enumerate_class_names(
        &self,
        namespace: &str,
        classname: Option<&str>,
        deep_inheritance: bool,
    ) -> Result<Vec<String>, WbemError> {
        let ns = self.namespace(namespace)?;
        Ok(ns
            .select_classes(namespace, classname, deep_inheritance)?
            .into_iter()
            .map(|c| c.classname.clone())
            .collect())
    }

    fn get_class(
        &self,
        namespace: &str,
        classname: &str,
        req: &ClassRequest,
    ) -> Result<CimClass, WbemError> {
        self.namespace(namespace)?
            .resolved_class(classname, req)
            .ok_or_else(|| {
                not_found(format!(
                    "class '{classname}' not found in namespace '{namespace}'"
                ))
            })
    }

    fn class_references(
        &self,
        namespace: &str,
        classname: &str,
        filter: &AssocFilter,
    ) -> Result<Vec<CimClass>, WbemError> {
        let ns = self.namespace(namespace)?;
        let lineage: Vec<String> = ns
            .superclass_chain(classname)
            .iter()
            .map(|c| c.classname.clone())
            .collect();
        if lineage.is_empty() {
            return Err(not_found(format!("class '{classname}' not found")));
        }
        let req = ClassRequest::default();
        Ok(ns
            .classes
            .iter()
            .filter(|c| ns.is_association_class(&c.classname))
            .filter(|c| {
                filter
                    .result_class
                    .as_deref()
                    .is_none_or(|rc| ns.is_subclass_of(&c.classname, rc))
            })
            .filter_map(|c| ns.resolved_class(&c.classname, &req))
            .filter(|assoc| {
                assoc.reference_properties().any(|p| {
                    name_matches(filter.role.as_deref(), &p.name)
                        && p.reference_class
                            .as_deref()
                            .is_some_and(|rc| lineage.iter().any(|l| l.eq_ignore_ascii_case(rc)))
                })
            })
            .collect())
    }

    fn class_associators(
        &self,
        namespace: &str,
        classname: &str,
        filter: &AssocFilter,
    ) -> Result<Vec<CimClass>, WbemError> {
        let ns = self.namespace(namespace)?;
        let lineage: Vec<String> = ns
            .superclass_chain(classname)
            .iter()
            .map(|c| c.classname.clone())
            .collect();
        if lineage.is_empty() {
            return Err(not_found(format!("class '{classname}' not found")));
        }
        let req = ClassRequest::default();
        let mut result: Vec<CimClass> = Vec::new();
        for assoc in ns
            .classes
            .iter()
            .filter(|c| ns.is_association_class(&c.classname))
            .filter(|c| {
                filter
                    .assoc_class
                    .as_deref()
                    .is_none_or(|ac| ns.is_subclass_of(&c.classname, ac))
            })
            .filter_map(|c| ns.resolved_class(&c.classname, &req))
        {
            let refs: Vec<_> = assoc.reference_properties().collect();
            for near in refs.iter().filter(|p| {
                name_matches(filter.role.as_deref(), &p.name)
                    && p.reference_class
                        .as_deref()
                        .is_some_and(|rc| lineage.iter().any(|l| l.eq_ignore_ascii_case(rc)))
            }) {
                for far in refs.iter().filter(|p| {
                    !p.name.eq_ignore_ascii_case(&near.name)
                        && name_matches(filter.result_role.as_deref(), &p.name)
                }) {
                    let Some(far_class) = far.reference_class.as_deref() else {
                        continue;
                    };
                    if let Some(rc) = filter.result_class.as_deref()
                        && !ns.is_subclass_of(far_class, rc)
                    {
                        continue;
                    }
                    if result
                        .iter()
                        .any(|c| c.classname.eq_ignore_ascii_case(far_class))
                    {
                        continue;
                    }
                    if let Some(cls) = ns.resolved_class(far_class, &req) {
                        result.push(cls);
                    }
                }
            }
        }
        Ok(result)
    }

    fn enumerate_instances(
        &self,
        namespace: &str,
        classname: &str,
        req: &InstanceRequest,
    ) -> Result<Vec<CimInstance>, WbemError> {
        let ns = self.namespace(namespace)?;
        if ns.class(classname).is_none() {
            return Err(invalid_class(namespace, classname));
        }
        Ok(ns
            .instances
            .iter()
            .filter(|i| ns.is_subclass_of(&i.classname, classname))
            .map(|i| {
                let mut inst = i.clone();
                if let Some(props) = &req.property_list {
                    inst.retain_properties(props);
                }
                inst
            })
            .collect())
    }

    fn enumerate_instance_names(
        &self,
        namespace: &str,
        classname: &str,
    ) -> Result<Vec<ObjectPath>, WbemError> {
        Ok(self
            .enumerate_instances(namespace, classname, &InstanceRequest::default())?
            .into_iter()
            .filter_map(|i| i.path)
            .collect())
    }

    fn get_instance(
        &self,
        namespace: &str,
        path: &ObjectPath,
        req: &InstanceRequest,
    ) -> Result<CimInstance, WbemError> {
        let ns = self.namespace(namespace)?;
        if ns.class(&path.classname).is_none() {
            return Err(invalid_class(namespace, &path.classname));
        }
        let mut inst = ns
            .find_instance(path)
            .cloned()
            .ok_or_else(|| not_found(format!("instance {path} not found")))?;
        if let Some(props) = &req.property_list {
            inst.retain_properties(props);
        }
        Ok(inst)
    }

    fn create_instance(
        &mut self,
        namespace: &str,
        mut instance: CimInstance,
    ) -> Result<ObjectPath, WbemError> {
        let (name, ns) = self.namespace_mut(namespace)?;
        let path = ns.instance_path(&name, &instance)?;
        if ns.find_instance(&path).is_some() {
            return Err(WbemError::cim(
                StatusCode::AlreadyExists,
                format!("instance {path} already exists"),
            ));
        }
        instance.path = Some(path.clone());
        ns.instances.push(instance);
        tracing::debug!(%path, "mock instance created");
        Ok(path)
    }

    fn delete_instance(&mut self, namespace: &str, path: &ObjectPath) -> Result<(), WbemError> {
        let (_, ns) = self.namespace_mut(namespace)?;
        if ns.class(&path.classname).is_none() {
            return Err(invalid_class(namespace, &path.classname));
        }
        let idx = ns
            .instances
            .iter()
            .position(|i| i.path.as_ref() == Some(path))
            .ok_or_else(|| not_found(format!("instance {path} not found")))?;
        ns.instances.remove(idx);
        tracing::debug!(%path, "mock instance deleted");
        Ok(())
    }

    fn references(
        &self,
        namespace: &str,
        path: &ObjectPath,
        filter: &AssocFilter,
    ) -> Result<Vec<CimInstance>, WbemError> {
        let ns = self.namespace(namespace)?;
        if ns.find_instance(path).is_none() {
            return Err(not_found(format!("instance {path} not found")));
        }
        Ok(ns
            .referencing(path, filter.result_class.as_deref(), filter.role.as_deref())
            .map(|(inst, _)| inst.clone())
            .collect())
    }

    fn associators(
        &self,
        namespace: &str,
        path: &ObjectPath,
        filter: &AssocFilter,
    ) -> Result<Vec<CimInstance>, WbemError> {
        let ns = self.namespace(namespace)?;
        if ns.find_instance(path).is_none() {
            return Err(not_found(format!("instance {path} not found")));
        }
        let mut result: Vec<CimInstance> = Vec::new();
        for (assoc, near_role) in
            ns.referencing(path, filter.assoc_class.as_deref(), filter.role.as_deref())
        {
            for (pname, value) in &assoc.properties {
                if pname.eq_ignore_ascii_case(near_role)
                    || !name_matches(filter.result_role.as_deref(), pname)
                {
                    continue;
                }
                let Some(far) = value.as_ref().and_then(CimValue::as_path) else {
                    continue;
                };
                let Some(inst) = ns.find_instance(far) else {
                    continue;
                };
                if let Some(rc) = filter.result_class.as_deref()
                    && !ns.is_subclass_of(&inst.classname, rc)
                {
                    continue;
                }
                if result.iter().any(|r| r.path == inst.path) {
                    continue;
                }
                result.push(inst.clone());
            }
        }
        Ok(result)
    }

    fn enumerate_qualifiers(&self, namespace: &str) -> Result<Vec<QualifierDecl>, WbemError> {
        Ok(self.namespace(namespace)?.qualifier_decls.clone())
    }

    fn get_qualifier(&self, namespace: &str, name: &str) -> Result<QualifierDecl, WbemError> {
        self.namespace(namespace)?
            .qualifier_decls
            .iter()
            .find(|q| q.name.eq_ignore_ascii_case(name))
            .cloned()
            .ok_or_else(|| {
                not_found(format!(
                    "qualifier '{name}' not declared in namespace '{namespace}'"
                ))
            })
    }
}

/// Repository used by unit tests across the crate (same file shipped in `mock/`).
#[cfg(test)]
pub(crate) fn fixture() -> MockWbemServer {
    let repo: MockRepository =
        serde_yaml::from_str(include_str!("../../mock/simple_repo.yaml")).unwrap();
    MockWbemServer::from_repository(repo, None, "mock:simple_repo.yaml").unwrap()
}
