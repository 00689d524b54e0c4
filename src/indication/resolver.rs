//! Identity resolution and lifecycle rules for indication subscriptions.
//!
//! A user supplied identity may be the full `Name` of a permanent object or
//! the local part of an owned one, so lookups search both name spaces.
//! Subscriptions have no name of their own; they are addressed through their
//! destination and filter.

use thiserror::Error;

use super::identity::{IdentityError, ObjectKind, OwnedIdentity, owned_prefix};
use super::manager::{SubscriptionManager, normalize_listener_url};
use crate::cim::{CimInstance, ObjectPath, WbemError};

/// Interactive choice among candidates.
pub trait Selector {
    /// Index into `choices`, or `None` when the user cancels.
    fn select(&mut self, prompt: &str, choices: &[String]) -> Option<usize>;
}

impl<S: Selector + ?Sized> Selector for &mut S {
    fn select(&mut self, prompt: &str, choices: &[String]) -> Option<usize> {
        (**self).select(prompt, choices)
    }
}

#[derive(Debug, Error)]
pub enum SubscriptionError {
    #[error(transparent)]
    Wbem(#[from] WbemError),

    #[error(transparent)]
    Identity(#[from] IdentityError),

    #[error("no {kind} found for identity '{identity}'")]
    NotFound { kind: &'static str, identity: String },

    #[error(
        "identity '{identity}' matches {} {kind}s; use --select to choose one of:\n  {}",
        .candidates.len(),
        .candidates.join("\n  ")
    )]
    Ambiguous {
        kind: &'static str,
        identity: String,
        candidates: Vec<String>,
    },

    #[error("{kind} selection cancelled")]
    SelectionCancelled { kind: &'static str },

    #[error(
        "permanent subscription cannot reference owned objects: destination Name '{destination}', filter Name '{filter}'"
    )]
    OwnershipViolation { destination: String, filter: String },

    #[error("permanent {kind} with Name '{name}' already exists")]
    DuplicatePermanent { kind: ObjectKind, name: String },

    #[error("owned {kind} '{identity}' already exists")]
    DuplicateOwned { kind: ObjectKind, identity: String },

    #[error("{kind} '{name}' is referenced by {count} subscription(s)")]
    InUse {
        kind: ObjectKind,
        name: String,
        count: usize,
    },

    #[error("no subscription with destination '{destination}' and filter '{filter}'")]
    SubscriptionNotFound { destination: String, filter: String },

    #[error("invalid listener URL '{0}' (expected [http|https://]host[:port])")]
    InvalidListenerUrl(String),
}

type Result<T> = std::result::Result<T, SubscriptionError>;

/// Destination or filter with its derived identity and the number of
/// subscriptions referencing it.
#[derive(Debug, Clone)]
pub struct EndpointListing {
    pub instance: CimInstance,
    pub owned: bool,
    pub identity: String,
    pub references: usize,
}

#[derive(Debug, Clone)]
pub struct SubscriptionListing {
    pub instance: CimInstance,
    pub owned: bool,
    pub destination: Option<CimInstance>,
    pub filter: Option<CimInstance>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RemovedObjects {
    pub subscriptions: Vec<ObjectPath>,
    pub filters: Vec<ObjectPath>,
    pub destinations: Vec<ObjectPath>,
}

impl RemovedObjects {
    pub fn is_empty(&self) -> bool {
        self.subscriptions.is_empty() && self.filters.is_empty() && self.destinations.is_empty()
    }
}

/// Parameters of a new indication filter.
#[derive(Debug, Clone)]
pub struct FilterDefinition {
    pub query: String,
    pub query_language: String,
    pub source_namespaces: Vec<String>,
}

fn instance_name(inst: &CimInstance) -> &str {
    inst.get_str("Name").unwrap_or("")
}

fn path_summary(inst: &CimInstance) -> String {
    inst.path
        .as_ref()
        .map(ToString::to_string)
        .unwrap_or_else(|| inst.classname.clone())
}

fn references(sub: &CimInstance, role: &str, target: &CimInstance) -> bool {
    match (sub.get_path(role), target.path.as_ref()) {
        (Some(r), Some(p)) => r == p,
        _ => false,
    }
}

fn role_of(kind: ObjectKind) -> &'static str {
    match kind {
        ObjectKind::Destination => "Handler",
        ObjectKind::Filter => "Filter",
    }
}

pub struct SubscriptionResolver<'c> {
    store: SubscriptionManager<'c>,
    selector: Box<dyn Selector + 'c>,
}

impl<'c> SubscriptionResolver<'c> {
    pub fn new(store: SubscriptionManager<'c>, selector: Box<dyn Selector + 'c>) -> Self {
        SubscriptionResolver { store, selector }
    }

    pub fn store(&self) -> &SubscriptionManager<'c> {
        &self.store
    }

    /// Objects of `kind` whose Name matches `identity`, permanent matches first.
    ///
    /// An identity already carrying the owned prefix is only looked up as an
    /// owned Name. Otherwise it is tried both as a permanent Name and as the
    /// local part of an owned Name.
    pub fn find_by_identity(&self, identity: &str, kind: ObjectKind) -> Result<Vec<CimInstance>> {
        let prefix = owned_prefix(kind, self.store.submgr_id());
        let all = self.store.endpoints(kind)?;
        let mut found = Vec::new();

        if identity.starts_with(&prefix) {
            found.extend(all.into_iter().filter(|inst| {
                instance_name(inst) == identity && self.store.is_owned(kind, inst)
            }));
        } else {
            let owned_name = format!("{prefix}{identity}");
            let (permanent, owned): (Vec<_>, Vec<_>) = all
                .into_iter()
                .filter(|inst| {
                    let name = instance_name(inst);
                    name == identity || name == owned_name
                })
                .partition(|inst| !self.store.is_owned(kind, inst));
            found.extend(permanent);
            found.extend(owned);
        }
        tracing::debug!(identity, %kind, matches = found.len(), "identity lookup");
        Ok(found)
    }

    fn choose<F>(
        &mut self,
        mut candidates: Vec<CimInstance>,
        identity: &str,
        kind: &'static str,
        select: bool,
        summarize: F,
    ) -> Result<CimInstance>
    where
        F: Fn(&Self, &CimInstance) -> String,
    {
        match candidates.len() {
            0 => Err(SubscriptionError::NotFound {
                kind,
                identity: identity.to_string(),
            }),
            1 => Ok(candidates.remove(0)),
            _ => {
                let choices: Vec<String> = candidates.iter().map(|c| summarize(self, c)).collect();
                if !select {
                    return Err(SubscriptionError::Ambiguous {
                        kind,
                        identity: identity.to_string(),
                        candidates: choices,
                    });
                }
                let prompt = format!("Select a {kind} for identity '{identity}'");
                match self.selector.select(&prompt, &choices) {
                    Some(idx) if idx < candidates.len() => Ok(candidates.swap_remove(idx)),
                    _ => Err(SubscriptionError::SelectionCancelled { kind }),
                }
            }
        }
    }

    /// Reduce candidates for a destination or filter to exactly one.
    pub fn resolve_single(
        &mut self,
        candidates: Vec<CimInstance>,
        identity: &str,
        kind: ObjectKind,
        select: bool,
    ) -> Result<CimInstance> {
        self.choose(candidates, identity, kind.as_str(), select, |_, inst| {
            path_summary(inst)
        })
    }

    fn resolve_identity(
        &mut self,
        identity: &str,
        kind: ObjectKind,
        select: bool,
    ) -> Result<CimInstance> {
        let candidates = self.find_by_identity(identity, kind)?;
        self.resolve_single(candidates, identity, kind, select)
    }

    pub fn resolve_subscription_endpoints(
        &mut self,
        destination: &str,
        filter: &str,
        select: bool,
    ) -> Result<(CimInstance, CimInstance)> {
        let dest = self.resolve_identity(destination, ObjectKind::Destination, select)?;
        let filt = self.resolve_identity(filter, ObjectKind::Filter, select)?;
        Ok((dest, filt))
    }

    /// Summary line for a subscription: (ownership, destination, filter).
    pub fn subscription_summary(&self, sub: &CimInstance) -> String {
        let ownership = if self.store.subscription_is_owned(sub) {
            "owned"
        } else {
            "permanent"
        };
        let endpoint = |role: &str| {
            sub.get_path(role)
                .map(ToString::to_string)
                .unwrap_or_else(|| "<missing>".to_string())
        };
        format!("({ownership}, {}, {})", endpoint("Handler"), endpoint("Filter"))
    }

    /// Name for a new object, enforcing the duplicate rules of each ownership.
    fn new_endpoint_name(&self, kind: ObjectKind, identity: &str, owned: bool) -> Result<String> {
        let existing = self.store.endpoints(kind)?;
        if owned {
            let name = OwnedIdentity::new(kind, self.store.submgr_id(), identity)?.name();
            if existing.iter().any(|inst| instance_name(inst) == name) {
                return Err(SubscriptionError::DuplicateOwned {
                    kind,
                    identity: identity.to_string(),
                });
            }
            return Ok(name);
        }

        if identity.is_empty() {
            return Err(IdentityError::Empty { kind }.into());
        }
        let prefix = owned_prefix(kind, self.store.submgr_id());
        if identity.starts_with(&prefix) {
            return Err(IdentityError::ReservedPrefix {
                kind,
                name: identity.to_string(),
                prefix,
            }
            .into());
        }
        if existing
            .iter()
            .any(|inst| !self.store.is_owned(kind, inst) && instance_name(inst) == identity)
        {
            return Err(SubscriptionError::DuplicatePermanent {
                kind,
                name: identity.to_string(),
            });
        }
        Ok(identity.to_string())
    }

    pub fn add_destination(
        &mut self,
        identity: &str,
        listener_url: &str,
        owned: bool,
    ) -> Result<CimInstance> {
        let url = normalize_listener_url(listener_url)
            .ok_or_else(|| SubscriptionError::InvalidListenerUrl(listener_url.to_string()))?;
        let name = self.new_endpoint_name(ObjectKind::Destination, identity, owned)?;
        Ok(self.store.create_destination(&name, &url, owned)?)
    }

    pub fn add_filter(
        &mut self,
        identity: &str,
        definition: &FilterDefinition,
        owned: bool,
    ) -> Result<CimInstance> {
        let name = self.new_endpoint_name(ObjectKind::Filter, identity, owned)?;
        Ok(self.store.create_filter(
            &name,
            &definition.query,
            &definition.query_language,
            &definition.source_namespaces,
        )?)
    }

    /// Create a subscription between existing endpoints. A permanent
    /// subscription may only reference permanent endpoints.
    pub fn add_subscription(
        &mut self,
        destination: &str,
        filter: &str,
        owned: bool,
        select: bool,
    ) -> Result<CimInstance> {
        let (dest, filt) = self.resolve_subscription_endpoints(destination, filter, select)?;
        if !owned
            && (self.store.is_owned(ObjectKind::Destination, &dest)
                || self.store.is_owned(ObjectKind::Filter, &filt))
        {
            return Err(SubscriptionError::OwnershipViolation {
                destination: instance_name(&dest).to_string(),
                filter: instance_name(&filt).to_string(),
            });
        }
        if owned
            && !self.store.is_owned(ObjectKind::Destination, &dest)
            && !self.store.is_owned(ObjectKind::Filter, &filt)
        {
            tracing::debug!(
                destination = instance_name(&dest),
                filter = instance_name(&filt),
                "owned subscription requested on permanent endpoints, stored as permanent"
            );
        }
        let (Some(dest_path), Some(filter_path)) = (dest.path.as_ref(), filt.path.as_ref()) else {
            return Err(WbemError::Model("endpoint instance returned without a path".into()).into());
        };
        Ok(self.store.create_subscription(dest_path, filter_path)?)
    }

    fn remove_endpoint(&mut self, identity: &str, kind: ObjectKind, select: bool) -> Result<ObjectPath> {
        let target = self.resolve_identity(identity, kind, select)?;
        let count = self
            .store
            .subscriptions()?
            .iter()
            .filter(|sub| references(sub, role_of(kind), &target))
            .count();
        if count > 0 {
            return Err(SubscriptionError::InUse {
                kind,
                name: instance_name(&target).to_string(),
                count,
            });
        }
        let path = target
            .path
            .ok_or_else(|| WbemError::Model(format!("{kind} instance returned without a path")))?;
        self.store.delete(&path)?;
        Ok(path)
    }

    /// Remove a destination that no subscription references.
    pub fn remove_destination(&mut self, identity: &str, select: bool) -> Result<ObjectPath> {
        self.remove_endpoint(identity, ObjectKind::Destination, select)
    }

    /// Remove a filter that no subscription references.
    pub fn remove_filter(&mut self, identity: &str, select: bool) -> Result<ObjectPath> {
        self.remove_endpoint(identity, ObjectKind::Filter, select)
    }

    /// Remove the subscription binding `destination` and `filter`.
    ///
    /// With `remove_associated`, endpoints left without any subscription are
    /// removed as well.
    pub fn remove_subscription(
        &mut self,
        destination: &str,
        filter: &str,
        remove_associated: bool,
        select: bool,
    ) -> Result<RemovedObjects> {
        let (dest, filt) = self.resolve_subscription_endpoints(destination, filter, select)?;
        let subs = self.store.subscriptions()?;
        let matching: Vec<CimInstance> = subs
            .iter()
            .filter(|sub| references(sub, "Handler", &dest) && references(sub, "Filter", &filt))
            .cloned()
            .collect();
        if matching.is_empty() {
            return Err(SubscriptionError::SubscriptionNotFound {
                destination: instance_name(&dest).to_string(),
                filter: instance_name(&filt).to_string(),
            });
        }
        let sub = self.choose(matching, destination, "subscription", select, |this, s| {
            this.subscription_summary(s)
        })?;

        let mut removed = RemovedObjects::default();
        if let Some(path) = sub.path.clone() {
            self.store.delete(&path)?;
            removed.subscriptions.push(path);
        }
        if !remove_associated {
            return Ok(removed);
        }

        let remaining = self.store.subscriptions()?;
        for (kind, endpoint) in [(ObjectKind::Destination, &dest), (ObjectKind::Filter, &filt)] {
            if remaining
                .iter()
                .any(|s| references(s, role_of(kind), endpoint))
            {
                tracing::info!(name = instance_name(endpoint), %kind, "still referenced, kept");
                continue;
            }
            if let Some(path) = endpoint.path.clone() {
                self.store.delete(&path)?;
                match kind {
                    ObjectKind::Destination => removed.destinations.push(path),
                    ObjectKind::Filter => removed.filters.push(path),
                }
            }
        }
        Ok(removed)
    }

    /// Remove every owned subscription, then every owned filter and
    /// destination no longer referenced.
    pub fn remove_server(&mut self) -> Result<RemovedObjects> {
        let mut removed = RemovedObjects::default();
        for sub in self.store.subscriptions()? {
            if self.store.subscription_is_owned(&sub)
                && let Some(path) = sub.path
            {
                self.store.delete(&path)?;
                removed.subscriptions.push(path);
            }
        }
        let remaining = self.store.subscriptions()?;
        for kind in [ObjectKind::Filter, ObjectKind::Destination] {
            for inst in self.store.endpoints(kind)? {
                if !self.store.is_owned(kind, &inst) {
                    continue;
                }
                if remaining.iter().any(|s| references(s, role_of(kind), &inst)) {
                    tracing::warn!(
                        name = instance_name(&inst),
                        %kind,
                        "owned object referenced by a permanent subscription, kept"
                    );
                    continue;
                }
                if let Some(path) = inst.path {
                    self.store.delete(&path)?;
                    match kind {
                        ObjectKind::Destination => removed.destinations.push(path),
                        ObjectKind::Filter => removed.filters.push(path),
                    }
                }
            }
        }
        Ok(removed)
    }

    fn list_endpoints(&self, kind: ObjectKind) -> Result<Vec<EndpointListing>> {
        let subs = self.store.subscriptions()?;
        let role = role_of(kind);
        Ok(self
            .store
            .endpoints(kind)?
            .into_iter()
            .map(|instance| {
                let identity = self.store.classify(kind, instance_name(&instance));
                EndpointListing {
                    owned: identity.is_owned(),
                    identity: identity.display_identity().to_string(),
                    references: subs.iter().filter(|s| references(s, role, &instance)).count(),
                    instance,
                }
            })
            .collect())
    }

    /// Destinations with the number of subscriptions using each as Handler.
    pub fn list_destinations(&self) -> Result<Vec<EndpointListing>> {
        self.list_endpoints(ObjectKind::Destination)
    }

    /// Filters with the number of subscriptions using each as Filter.
    pub fn list_filters(&self) -> Result<Vec<EndpointListing>> {
        self.list_endpoints(ObjectKind::Filter)
    }

    pub fn list_subscriptions(&self) -> Result<Vec<SubscriptionListing>> {
        self.store
            .subscriptions()?
            .into_iter()
            .map(|instance| {
                let resolve = |role: &str| -> Result<Option<CimInstance>> {
                    match instance.get_path(role) {
                        Some(p) => Ok(self.store.resolve_reference(p)?),
                        None => Ok(None),
                    }
                };
                Ok(SubscriptionListing {
                    owned: self.store.subscription_is_owned(&instance),
                    destination: resolve("Handler")?,
                    filter: resolve("Filter")?,
                    instance,
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cim::mock::{MockWbemServer, fixture};
    use crate::cim::{
        AssocFilter, CimClass, ClassRequest, InstanceRequest, QualifierDecl, WbemConnection,
    };
    use crate::indication::identity::DEFAULT_SUBMGR_ID;
    use std::cell::Cell;
    use std::rc::Rc;

    /// Returns a fixed answer and records that it was asked.
    struct ScriptedSelector {
        answer: Option<usize>,
        asked: Rc<Cell<usize>>,
    }

    impl Selector for ScriptedSelector {
        fn select(&mut self, _prompt: &str, _choices: &[String]) -> Option<usize> {
            self.asked.set(self.asked.get() + 1);
            self.answer
        }
    }

    /// Mock server wrapper counting create_instance calls.
    struct CountingServer {
        inner: MockWbemServer,
        creates: Rc<Cell<usize>>,
    }

    impl WbemConnection for CountingServer {
        fn url(&self) -> &str {
            self.inner.url()
        }
        fn default_namespace(&self) -> &str {
            self.inner.default_namespace()
        }
        fn interop_namespace(&self) -> std::result::Result<String, WbemError> {
            self.inner.interop_namespace()
        }
        fn enumerate_namespaces(&self) -> std::result::Result<Vec<String>, WbemError> {
            self.inner.enumerate_namespaces()
        }
        fn enumerate_classes(
            &self,
            ns: &str,
            cn: Option<&str>,
            req: &ClassRequest,
        ) -> std::result::Result<Vec<CimClass>, WbemError> {
            self.inner.enumerate_classes(ns, cn, req)
        }
        fn enumerate_class_names(
            &self,
            ns: &str,
            cn: Option<&str>,
            deep: bool,
        ) -> std::result::Result<Vec<String>, WbemError> {
            self.inner.enumerate_class_names(ns, cn, deep)
        }
        fn get_class(
            &self,
            ns: &str,
            cn: &str,
            req: &ClassRequest,
        ) -> std::result::Result<CimClass, WbemError> {
            self.inner.get_class(ns, cn, req)
        }
        fn class_references(
            &self,
            ns: &str,
            cn: &str,
            f: &AssocFilter,
        ) -> std::result::Result<Vec<CimClass>, WbemError> {
            self.inner.class_references(ns, cn, f)
        }
        fn class_associators(
            &self,
            ns: &str,
            cn: &str,
            f: &AssocFilter,
        ) -> std::result::Result<Vec<CimClass>, WbemError> {
            self.inner.class_associators(ns, cn, f)
        }
        fn enumerate_instances(
            &self,
            ns: &str,
            cn: &str,
            req: &InstanceRequest,
        ) -> std::result::Result<Vec<CimInstance>, WbemError> {
            self.inner.enumerate_instances(ns, cn, req)
        }
        fn enumerate_instance_names(
            &self,
            ns: &str,
            cn: &str,
        ) -> std::result::Result<Vec<ObjectPath>, WbemError> {
            self.inner.enumerate_instance_names(ns, cn)
        }
        fn get_instance(
            &self,
            ns: &str,
            path: &ObjectPath,
            req: &InstanceRequest,
        ) -> std::result::Result<CimInstance, WbemError> {
            self.inner.get_instance(ns, path, req)
        }
        fn create_instance(
            &mut self,
            ns: &str,
            inst: CimInstance,
        ) -> std::result::Result<ObjectPath, WbemError> {
            self.creates.set(self.creates.get() + 1);
            self.inner.create_instance(ns, inst)
        }
        fn delete_instance(
            &mut self,
            ns: &str,
            path: &ObjectPath,
        ) -> std::result::Result<(), WbemError> {
            self.inner.delete_instance(ns, path)
        }
        fn references(
            &self,
            ns: &str,
            path: &ObjectPath,
            f: &AssocFilter,
        ) -> std::result::Result<Vec<CimInstance>, WbemError> {
            self.inner.references(ns, path, f)
        }
        fn associators(
            &self,
            ns: &str,
            path: &ObjectPath,
            f: &AssocFilter,
        ) -> std::result::Result<Vec<CimInstance>, WbemError> {
            self.inner.associators(ns, path, f)
        }
        fn enumerate_qualifiers(
            &self,
            ns: &str,
        ) -> std::result::Result<Vec<QualifierDecl>, WbemError> {
            self.inner.enumerate_qualifiers(ns)
        }
        fn get_qualifier(
            &self,
            ns: &str,
            name: &str,
        ) -> std::result::Result<QualifierDecl, WbemError> {
            self.inner.get_qualifier(ns, name)
        }
    }

    struct Harness {
        server: CountingServer,
        creates: Rc<Cell<usize>>,
        asked: Rc<Cell<usize>>,
    }

    impl Harness {
        fn new() -> Self {
            let creates = Rc::new(Cell::new(0));
            Harness {
                server: CountingServer {
                    inner: fixture(),
                    creates: creates.clone(),
                },
                creates,
                asked: Rc::new(Cell::new(0)),
            }
        }

        fn resolver(&mut self, answer: Option<usize>) -> SubscriptionResolver<'_> {
            let store = SubscriptionManager::new(&mut self.server, DEFAULT_SUBMGR_ID).unwrap();
            let selector = ScriptedSelector {
                answer,
                asked: self.asked.clone(),
            };
            SubscriptionResolver::new(store, Box::new(selector))
        }
    }

    fn filter_def() -> FilterDefinition {
        FilterDefinition {
            query: "SELECT * FROM CIM_Indication".into(),
            query_language: "WQL".into(),
            source_namespaces: vec!["root/cimv2".into()],
        }
    }

    #[test]
    fn dual_search_finds_owned_and_permanent() {
        let mut h = Harness::new();
        let mut r = h.resolver(None);
        r.add_filter("x", &filter_def(), true).unwrap();
        r.add_filter("x", &filter_def(), false).unwrap();

        let found = r.find_by_identity("x", ObjectKind::Filter).unwrap();
        let names: Vec<&str> = found.iter().map(instance_name).collect();
        assert_eq!(names, vec!["x", "pywbemfilter:defaultpywbemcliSubMgr:x"]);

        let owned_only = r
            .find_by_identity("pywbemfilter:defaultpywbemcliSubMgr:x", ObjectKind::Filter)
            .unwrap();
        assert_eq!(owned_only.len(), 1);
    }

    #[test]
    fn ambiguous_identity_without_selection_lists_candidates() {
        let mut h = Harness::new();
        let mut r = h.resolver(None);
        r.add_filter("x", &filter_def(), true).unwrap();
        r.add_filter("x", &filter_def(), false).unwrap();
        let candidates = r.find_by_identity("x", ObjectKind::Filter).unwrap();
        let paths: Vec<String> = candidates.iter().map(path_summary).collect();
        let err = r
            .resolve_single(candidates, "x", ObjectKind::Filter, false)
            .unwrap_err();
        match &err {
            SubscriptionError::Ambiguous { candidates, .. } => assert_eq!(candidates, &paths),
            other => panic!("unexpected {other:?}"),
        }
        let msg = err.to_string();
        assert!(paths.iter().all(|p| msg.contains(p.as_str())));
        assert!(msg.contains("--select"));
        drop(r);
        assert_eq!(h.asked.get(), 0);
    }

    #[test]
    fn selection_picks_candidate_or_cancels() {
        let mut h = Harness::new();
        {
            let mut r = h.resolver(Some(1));
            r.add_filter("x", &filter_def(), true).unwrap();
            r.add_filter("x", &filter_def(), false).unwrap();
            let candidates = r.find_by_identity("x", ObjectKind::Filter).unwrap();
            let picked = r
                .resolve_single(candidates, "x", ObjectKind::Filter, true)
                .unwrap();
            assert_eq!(instance_name(&picked), "pywbemfilter:defaultpywbemcliSubMgr:x");
        }
        let mut r = h.resolver(None);
        let candidates = r.find_by_identity("x", ObjectKind::Filter).unwrap();
        assert!(matches!(
            r.resolve_single(candidates, "x", ObjectKind::Filter, true),
            Err(SubscriptionError::SelectionCancelled { .. })
        ));
    }

    #[test]
    fn unknown_identity_is_not_found() {
        let mut h = Harness::new();
        let mut r = h.resolver(None);
        let err = r
            .resolve_subscription_endpoints("nodest", "nofilter", false)
            .unwrap_err();
        assert!(matches!(
            err,
            SubscriptionError::NotFound { kind: "destination", .. }
        ));
    }

    #[test]
    fn duplicate_permanent_filter_rejected_before_create() {
        let mut h = Harness::new();
        {
            let mut r = h.resolver(None);
            r.add_filter("f1", &filter_def(), false).unwrap();
        }
        let before = h.creates.get();
        let mut r = h.resolver(None);
        let err = r.add_filter("f1", &filter_def(), false).unwrap_err();
        assert!(matches!(
            err,
            SubscriptionError::DuplicatePermanent { kind: ObjectKind::Filter, ref name } if name == "f1"
        ));
        drop(r);
        assert_eq!(h.creates.get(), before, "no create attempted");
    }

    #[test]
    fn owned_and_permanent_names_do_not_collide() {
        let mut h = Harness::new();
        let mut r = h.resolver(None);
        r.add_destination("d1", "http://localhost:5000", false)
            .unwrap();
        r.add_destination("d1", "http://localhost:5000", true).unwrap();
        assert!(matches!(
            r.add_destination("d1", "http://localhost:5000", true),
            Err(SubscriptionError::DuplicateOwned { .. })
        ));
        assert!(matches!(
            r.add_destination("a:b", "http://localhost:5000", true),
            Err(SubscriptionError::Identity(IdentityError::ContainsColon { .. }))
        ));
        assert!(matches!(
            r.add_destination("d2", "ftp://x", true),
            Err(SubscriptionError::InvalidListenerUrl(_))
        ));
    }

    #[test]
    fn permanent_subscription_rejects_owned_filter() {
        let mut h = Harness::new();
        let before;
        {
            let mut r = h.resolver(None);
            r.add_destination("pd", "http://localhost:5000", false)
                .unwrap();
            r.add_filter("of", &filter_def(), true).unwrap();
        }
        before = h.creates.get();
        let mut r = h.resolver(None);
        let err = r.add_subscription("pd", "of", false, false).unwrap_err();
        let msg = err.to_string();
        assert!(matches!(err, SubscriptionError::OwnershipViolation { .. }));
        assert!(msg.contains("'pd'"));
        assert!(msg.contains("pywbemfilter:defaultpywbemcliSubMgr:of"));
        assert!(r.store().subscriptions().unwrap().is_empty());
        drop(r);
        assert_eq!(h.creates.get(), before);
    }

    #[test]
    fn owned_subscription_may_bind_permanent_endpoints() {
        let mut h = Harness::new();
        let mut r = h.resolver(None);
        r.add_destination("pd", "http://localhost:5000", false)
            .unwrap();
        r.add_filter("pf", &filter_def(), false).unwrap();
        let sub = r.add_subscription("pd", "pf", true, false).unwrap();
        assert_eq!(r.store().subscriptions().unwrap().len(), 1);

        // Nothing owned is referenced, so the subscription lists as permanent
        // and survives remove-server.
        assert!(!r.store().subscription_is_owned(&sub));
        let listed = r.list_subscriptions().unwrap();
        assert!(!listed[0].owned);
        assert!(r.remove_server().unwrap().is_empty());
        assert_eq!(r.store().subscriptions().unwrap().len(), 1);
    }

    #[test]
    fn owned_endpoint_makes_subscription_owned() {
        let mut h = Harness::new();
        let mut r = h.resolver(None);
        r.add_destination("od", "http://localhost:5000", true).unwrap();
        r.add_filter("pf", &filter_def(), false).unwrap();
        let sub = r.add_subscription("od", "pf", true, false).unwrap();
        assert!(r.store().subscription_is_owned(&sub));
        assert!(r.list_subscriptions().unwrap()[0].owned);

        let removed = r.remove_server().unwrap();
        assert_eq!(removed.subscriptions.len(), 1);
        assert_eq!(removed.destinations.len(), 1);
        assert!(removed.filters.is_empty());
    }

    #[test]
    fn listings_count_references() {
        let mut h = Harness::new();
        let mut r = h.resolver(None);
        r.add_destination("d", "http://localhost:5000", true).unwrap();
        r.add_filter("f1", &filter_def(), true).unwrap();
        r.add_filter("f2", &filter_def(), true).unwrap();
        r.add_subscription("d", "f1", true, false).unwrap();
        r.add_subscription("d", "f2", true, false).unwrap();

        let dests = r.list_destinations().unwrap();
        assert_eq!(dests.len(), 1);
        assert_eq!(dests[0].references, 2);
        assert!(dests[0].owned);
        assert_eq!(dests[0].identity, "d");

        let filters = r.list_filters().unwrap();
        assert!(filters.iter().all(|f| f.references == 1));

        let subs = r.list_subscriptions().unwrap();
        assert_eq!(subs.len(), 2);
        assert!(subs.iter().all(|s| s.owned && s.destination.is_some() && s.filter.is_some()));
    }

    #[test]
    fn referenced_endpoints_cannot_be_removed() {
        let mut h = Harness::new();
        let mut r = h.resolver(None);
        r.add_destination("d", "http://localhost:5000", false).unwrap();
        r.add_filter("f", &filter_def(), false).unwrap();
        r.add_subscription("d", "f", false, false).unwrap();
        assert!(matches!(
            r.remove_filter("f", false),
            Err(SubscriptionError::InUse { count: 1, .. })
        ));
        assert!(matches!(
            r.remove_destination("d", false),
            Err(SubscriptionError::InUse { .. })
        ));
    }

    #[test]
    fn remove_subscription_matches_exact_endpoints() {
        let mut h = Harness::new();
        let mut r = h.resolver(None);
        r.add_destination("d", "http://localhost:5000", false).unwrap();
        r.add_filter("f1", &filter_def(), false).unwrap();
        r.add_filter("f2", &filter_def(), false).unwrap();
        r.add_subscription("d", "f1", false, false).unwrap();
        r.add_subscription("d", "f2", false, false).unwrap();

        let removed = r.remove_subscription("d", "f1", true, false).unwrap();
        assert_eq!(removed.subscriptions.len(), 1);
        assert_eq!(removed.filters.len(), 1, "f1 no longer referenced");
        assert!(removed.destinations.is_empty(), "d still used by f2");

        let left = r.list_subscriptions().unwrap();
        assert_eq!(left.len(), 1);
        assert_eq!(
            left[0].filter.as_ref().and_then(|f| f.get_str("Name")),
            Some("f2")
        );

        assert!(matches!(
            r.remove_subscription("d", "f1", false, false),
            Err(SubscriptionError::NotFound { kind: "filter", .. })
        ));
    }

    #[test]
    fn remove_subscription_without_match() {
        let mut h = Harness::new();
        let mut r = h.resolver(None);
        r.add_destination("d", "http://localhost:5000", false).unwrap();
        r.add_filter("f", &filter_def(), false).unwrap();
        assert!(matches!(
            r.remove_subscription("d", "f", false, false),
            Err(SubscriptionError::SubscriptionNotFound { .. })
        ));
    }

    #[test]
    fn remove_server_leaves_permanent_objects() {
        let mut h = Harness::new();
        let mut r = h.resolver(None);
        r.add_destination("od", "http://localhost:5000", true).unwrap();
        r.add_filter("of", &filter_def(), true).unwrap();
        r.add_destination("pd", "http://localhost:5001", false).unwrap();
        r.add_filter("pf", &filter_def(), false).unwrap();
        r.add_subscription("od", "of", true, false).unwrap();
        r.add_subscription("pd", "pf", false, false).unwrap();

        let removed = r.remove_server().unwrap();
        assert_eq!(removed.subscriptions.len(), 1);
        assert_eq!(removed.filters.len(), 1);
        assert_eq!(removed.destinations.len(), 1);
        assert_eq!(r.list_destinations().unwrap().len(), 1);
        assert_eq!(r.list_subscriptions().unwrap().len(), 1);
    }
}
