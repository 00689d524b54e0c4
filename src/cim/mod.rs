//! CIM object model and the protocol-client seam.
//!
//! `WbemConnection` is the boundary to whatever actually talks to a WBEM
//! server. Commands and the aggregation/subscription engines only ever see
//! this trait; `mock::MockWbemServer` is the implementation shipped here.

pub mod error;
pub mod mock;
pub mod model;
pub mod mof;
pub mod target;

pub use error::{StatusCode, WbemError};
pub use model::{CimClass, CimInstance, CimValue, ObjectPath, QualifierDecl, Scope};

/// Flags for class retrieval operations (EnumerateClasses / GetClass).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassRequest {
    pub deep_inheritance: bool,
    pub local_only: bool,
    pub include_qualifiers: bool,
    pub include_classorigin: bool,
}

impl Default for ClassRequest {
    fn default() -> Self {
        ClassRequest {
            deep_inheritance: false,
            local_only: false,
            include_qualifiers: true,
            include_classorigin: false,
        }
    }
}

/// Flags for instance retrieval operations.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InstanceRequest {
    /// Restrict returned properties (case-insensitive). `None` returns all.
    pub property_list: Option<Vec<String>>,
}

/// Filters shared by References and Associators, for classes and instances.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AssocFilter {
    pub assoc_class: Option<String>,
    pub result_class: Option<String>,
    pub role: Option<String>,
    pub result_role: Option<String>,
}

/// Operations the command layer needs from a WBEM server.
///
/// All operations are blocking. Namespaces are case-insensitive.
pub trait WbemConnection {
    /// URL (or pseudo URL for mock servers) identifying the server.
    fn url(&self) -> &str;

    fn default_namespace(&self) -> &str;

    /// The namespace holding the server's CIM_Namespace and subscription objects.
    fn interop_namespace(&self) -> Result<String, WbemError>;

    /// All namespaces of the server (unsorted). Fails with `WbemError::Model`
    /// when the server does not implement namespace discovery.
    fn enumerate_namespaces(&self) -> Result<Vec<String>, WbemError>;

    fn enumerate_classes(
        &self,
        namespace: &str,
        classname: Option<&str>,
        req: &ClassRequest,
    ) -> Result<Vec<CimClass>, WbemError>;

    fn enumerate_class_names(
        &self,
        namespace: &str,
        classname: Option<&str>,
        deep_inheritance: bool,
    ) -> Result<Vec<String>, WbemError>;

    fn get_class(
        &self,
        namespace: &str,
        classname: &str,
        req: &ClassRequest,
    ) -> Result<CimClass, WbemError>;

    /// Association classes referencing `classname`.
    fn class_references(
        &self,
        namespace: &str,
        classname: &str,
        filter: &AssocFilter,
    ) -> Result<Vec<CimClass>, WbemError>;

    /// Classes on the far side of associations referencing `classname`.
    fn class_associators(
        &self,
        namespace: &str,
        classname: &str,
        filter: &AssocFilter,
    ) -> Result<Vec<CimClass>, WbemError>;

    /// Instances of `classname` and its subclasses.
    fn enumerate_instances(
        &self,
        namespace: &str,
        classname: &str,
        req: &InstanceRequest,
    ) -> Result<Vec<CimInstance>, WbemError>;

    fn enumerate_instance_names(
        &self,
        namespace: &str,
        classname: &str,
    ) -> Result<Vec<ObjectPath>, WbemError>;

    fn get_instance(
        &self,
        namespace: &str,
        path: &ObjectPath,
        req: &InstanceRequest,
    ) -> Result<CimInstance, WbemError>;

    fn create_instance(
        &mut self,
        namespace: &str,
        instance: CimInstance,
    ) -> Result<ObjectPath, WbemError>;

    fn delete_instance(&mut self, namespace: &str, path: &ObjectPath) -> Result<(), WbemError>;

    /// Association instances referencing the instance at `path`.
    fn references(
        &self,
        namespace: &str,
        path: &ObjectPath,
        filter: &AssocFilter,
    ) -> Result<Vec<CimInstance>, WbemError>;

    /// Instances associated with the instance at `path`.
    fn associators(
        &self,
        namespace: &str,
        path: &ObjectPath,
        filter: &AssocFilter,
    ) -> Result<Vec<CimInstance>, WbemError>;

    fn enumerate_qualifiers(&self, namespace: &str) -> Result<Vec<QualifierDecl>, WbemError>;

    fn get_qualifier(&self, namespace: &str, name: &str) -> Result<QualifierDecl, WbemError>;
}
