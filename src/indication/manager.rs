//! Subscription store: the destination, filter and subscription instances a
//! server keeps in its interop namespace.

use url::Url;

use super::identity::{Identity, ObjectKind};
use crate::cim::{CimInstance, CimValue, InstanceRequest, ObjectPath, WbemConnection, WbemError};

pub const DESTINATION_CLASS: &str = "CIM_ListenerDestinationCIMXML";
pub const FILTER_CLASS: &str = "CIM_IndicationFilter";
pub const SUBSCRIPTION_CLASS: &str = "CIM_IndicationSubscription";
pub const SYSTEM_CREATION_CLASS: &str = "CIM_ComputerSystem";

/// PersistenceType values of CIM_ListenerDestination.
const PERSISTENCE_PERMANENT: i64 = 2;
const PERSISTENCE_TRANSIENT: i64 = 3;

/// Normalize a listener URL; a missing scheme means https.
pub fn normalize_listener_url(raw: &str) -> Option<String> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    let candidate = if raw.contains("://") {
        raw.to_string()
    } else {
        format!("https://{raw}")
    };
    let url = Url::parse(&candidate).ok()?;
    if !matches!(url.scheme(), "http" | "https") || url.host_str().is_none() {
        return None;
    }
    Some(url.to_string().trim_end_matches('/').to_string())
}

/// Access to subscription objects of one server for one subscription manager.
pub struct SubscriptionManager<'c> {
    conn: &'c mut dyn WbemConnection,
    submgr_id: String,
    server_id: String,
    interop: String,
}

impl<'c> SubscriptionManager<'c> {
    /// Register the connection's server. Fails when the server has no interop namespace.
    pub fn new(
        conn: &'c mut dyn WbemConnection,
        submgr_id: impl Into<String>,
    ) -> Result<Self, WbemError> {
        let interop = conn.interop_namespace()?;
        let server_id = conn.url().to_string();
        tracing::debug!(server_id = %server_id, %interop, "subscription manager attached");
        Ok(SubscriptionManager {
            conn,
            submgr_id: submgr_id.into(),
            server_id,
            interop,
        })
    }

    pub fn submgr_id(&self) -> &str {
        &self.submgr_id
    }

    pub fn server_id(&self) -> &str {
        &self.server_id
    }

    pub fn interop_namespace(&self) -> &str {
        &self.interop
    }

    pub fn classify(&self, kind: ObjectKind, name: &str) -> Identity {
        Identity::classify(kind, &self.submgr_id, name)
    }

    /// Ownership of an endpoint instance from its `Name` property.
    pub fn is_owned(&self, kind: ObjectKind, inst: &CimInstance) -> bool {
        inst.get_str("Name")
            .is_some_and(|name| self.classify(kind, name).is_owned())
    }

    /// A subscription is owned when its handler or its filter is owned.
    pub fn subscription_is_owned(&self, sub: &CimInstance) -> bool {
        let owned_ref = |prop: &str, kind: ObjectKind| {
            sub.get_path(prop)
                .and_then(|p| p.key("Name"))
                .and_then(CimValue::as_str)
                .is_some_and(|name| self.classify(kind, name).is_owned())
        };
        owned_ref("Handler", ObjectKind::Destination) || owned_ref("Filter", ObjectKind::Filter)
    }

    fn instances(&self, classname: &str) -> Result<Vec<CimInstance>, WbemError> {
        self.conn
            .enumerate_instances(&self.interop, classname, &InstanceRequest::default())
    }

    pub fn destinations(&self) -> Result<Vec<CimInstance>, WbemError> {
        self.instances(DESTINATION_CLASS)
    }

    pub fn filters(&self) -> Result<Vec<CimInstance>, WbemError> {
        self.instances(FILTER_CLASS)
    }

    pub fn subscriptions(&self) -> Result<Vec<CimInstance>, WbemError> {
        self.instances(SUBSCRIPTION_CLASS)
    }

    pub fn endpoints(&self, kind: ObjectKind) -> Result<Vec<CimInstance>, WbemError> {
        match kind {
            ObjectKind::Destination => self.destinations(),
            ObjectKind::Filter => self.filters(),
        }
    }

    /// Fetch the instance a reference points to, if it still exists.
    pub fn resolve_reference(&self, path: &ObjectPath) -> Result<Option<CimInstance>, WbemError> {
        match self
            .conn
            .get_instance(&self.interop, path, &InstanceRequest::default())
        {
            Ok(inst) => Ok(Some(inst)),
            Err(e) if e.is_recoverable() => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn create(&mut self, inst: CimInstance) -> Result<CimInstance, WbemError> {
        let path = self.conn.create_instance(&self.interop, inst)?;
        tracing::info!(%path, "created");
        self.conn
            .get_instance(&self.interop, &path, &InstanceRequest::default())
    }

    fn system_keys(&self, classname: &str) -> CimInstance {
        CimInstance::new(classname)
            .with_property("SystemCreationClassName", CimValue::string(SYSTEM_CREATION_CLASS))
            .with_property("SystemName", CimValue::string(self.server_id.as_str()))
            .with_property("CreationClassName", CimValue::string(classname))
    }

    /// Create a CIM-XML listener destination. `url` must already be normalized.
    pub fn create_destination(
        &mut self,
        name: &str,
        url: &str,
        owned: bool,
    ) -> Result<CimInstance, WbemError> {
        let persistence = if owned {
            PERSISTENCE_TRANSIENT
        } else {
            PERSISTENCE_PERMANENT
        };
        let inst = self
            .system_keys(DESTINATION_CLASS)
            .with_property("Name", CimValue::string(name))
            .with_property("Destination", CimValue::string(url))
            .with_property("PersistenceType", CimValue::Integer(persistence))
            .with_property("Protocol", CimValue::Integer(2));
        self.create(inst)
    }

    pub fn create_filter(
        &mut self,
        name: &str,
        query: &str,
        query_language: &str,
        source_namespaces: &[String],
    ) -> Result<CimInstance, WbemError> {
        let namespaces = source_namespaces
            .iter()
            .map(|ns| CimValue::string(ns.as_str()))
            .collect();
        let inst = self
            .system_keys(FILTER_CLASS)
            .with_property("Name", CimValue::string(name))
            .with_property("Query", CimValue::string(query))
            .with_property("QueryLanguage", CimValue::string(query_language))
            .with_property("SourceNamespaces", CimValue::Array(namespaces))
            .with_property("IndividualSubscriptionSupported", CimValue::Boolean(true));
        self.create(inst)
    }

    pub fn create_subscription(
        &mut self,
        destination: &ObjectPath,
        filter: &ObjectPath,
    ) -> Result<CimInstance, WbemError> {
        let inst = CimInstance::new(SUBSCRIPTION_CLASS)
            .with_property("Filter", CimValue::reference(filter.clone()))
            .with_property("Handler", CimValue::reference(destination.clone()))
            .with_property("OnFatalErrorPolicy", CimValue::Integer(2))
            .with_property("FailureTriggerTimeInterval", CimValue::Integer(60))
            .with_property("SubscriptionState", CimValue::Integer(2))
            .with_property("RepeatNotificationPolicy", CimValue::Integer(2));
        self.create(inst)
    }

    pub fn delete(&mut self, path: &ObjectPath) -> Result<(), WbemError> {
        self.conn.delete_instance(&self.interop, path)?;
        tracing::info!(%path, "deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cim::mock::fixture;
    use crate::indication::identity::DEFAULT_SUBMGR_ID;

    #[test]
    fn listener_url_normalization() {
        assert_eq!(
            normalize_listener_url("localhost:5000").as_deref(),
            Some("https://localhost:5000")
        );
        assert_eq!(
            normalize_listener_url("http://10.1.1.1:5988").as_deref(),
            Some("http://10.1.1.1:5988")
        );
        assert!(normalize_listener_url("ftp://x").is_none());
        assert!(normalize_listener_url("").is_none());
    }

    #[test]
    fn create_destination_sets_persistence() {
        let mut conn = fixture();
        let mut mgr = SubscriptionManager::new(&mut conn, DEFAULT_SUBMGR_ID).unwrap();
        assert_eq!(mgr.interop_namespace(), "interop");
        let owned = mgr
            .create_destination(
                "pywbemdestination:defaultpywbemcliSubMgr:d1",
                "http://l:5000",
                true,
            )
            .unwrap();
        assert_eq!(owned.get("PersistenceType"), Some(&CimValue::Integer(3)));
        assert!(mgr.is_owned(ObjectKind::Destination, &owned));

        let permanent = mgr
            .create_destination("d2", "http://l:5000", false)
            .unwrap();
        assert_eq!(permanent.get("PersistenceType"), Some(&CimValue::Integer(2)));
        assert!(!mgr.is_owned(ObjectKind::Destination, &permanent));
        assert_eq!(mgr.destinations().unwrap().len(), 2);
    }

    #[test]
    fn subscription_ownership_follows_endpoints() {
        let mut conn = fixture();
        let mut mgr = SubscriptionManager::new(&mut conn, DEFAULT_SUBMGR_ID).unwrap();
        let dest = mgr.create_destination("d", "http://l:5000", false).unwrap();
        let owned_filter = mgr
            .create_filter(
                "pywbemfilter:defaultpywbemcliSubMgr:f",
                "SELECT * FROM CIM_Indication",
                "WQL",
                &["root/cimv2".to_string()],
            )
            .unwrap();
        let sub = mgr
            .create_subscription(
                dest.path.as_ref().unwrap(),
                owned_filter.path.as_ref().unwrap(),
            )
            .unwrap();
        assert!(mgr.subscription_is_owned(&sub));

        let perm_filter = mgr
            .create_filter("pf", "SELECT * FROM CIM_Indication", "WQL", &[])
            .unwrap();
        let sub2 = mgr
            .create_subscription(
                dest.path.as_ref().unwrap(),
                perm_filter.path.as_ref().unwrap(),
            )
            .unwrap();
        assert!(!mgr.subscription_is_owned(&sub2));
    }
}
