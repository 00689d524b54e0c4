//! Indication subscriptions: naming of owned and permanent objects, the
//! subscription store in the interop namespace and identity resolution.

pub mod identity;
pub mod manager;
pub mod resolver;

pub use identity::{DEFAULT_SUBMGR_ID, ObjectKind};
pub use manager::SubscriptionManager;
pub use resolver::{
    EndpointListing, FilterDefinition, RemovedObjects, Selector, SubscriptionResolver,
};
