/*!
`subscription.rs`

Implements `wbemcli subscription ...`: listener destinations, indication
filters and subscriptions in the server's interop namespace.

Identities
  - owned objects (default for add commands) get the Name
    `pywbem{destination|filter}:{submgr-id}:{IDENTITY}` and are removed
    by `remove-server`
  - permanent objects (`--permanent`) use IDENTITY as the Name unchanged

Removal and add-subscription look objects up by identity. When an identity
matches more than one object the command fails unless `--select` is given,
in which case the candidates are offered for interactive selection.
*/

use anyhow::{Context as _, Result};
use clap::{Args, Subcommand};
use serde::Serialize;

use crate::cim::mof::instance_to_mof;
use crate::cim::{CimInstance, ObjectPath};
use crate::cmd::format::{ConsoleRenderer, OutputFormat};
use crate::cmd::ownership::{OwnedFlags, Ownership};
use crate::cmd::shared::{Context, Session};
use crate::indication::{
    DEFAULT_SUBMGR_ID, EndpointListing, FilterDefinition, ObjectKind, RemovedObjects,
    SubscriptionManager, SubscriptionResolver,
};

#[derive(Args, Debug)]
pub struct SubscriptionArgs {
    /// Subscription manager id scoping owned objects
    #[arg(long = "submgr-id", value_name = "ID", default_value = DEFAULT_SUBMGR_ID, global = true)]
    pub submgr_id: String,

    #[command(subcommand)]
    pub command: SubscriptionCommand,
}

#[derive(Subcommand, Debug)]
pub enum SubscriptionCommand {
    /// Add a CIM-XML listener destination
    AddDestination(AddDestinationArgs),
    /// Add an indication filter
    AddFilter(AddFilterArgs),
    /// Add a subscription between an existing destination and filter
    AddSubscription(AddSubscriptionArgs),
    /// Count destinations, filters and subscriptions by ownership
    List(ListArgs),
    ListDestinations(ListArgs),
    ListFilters(ListArgs),
    ListSubscriptions(ListArgs),
    /// Remove a destination not used by any subscription
    RemoveDestination(RemoveEndpointArgs),
    /// Remove a filter not used by any subscription
    RemoveFilter(RemoveEndpointArgs),
    /// Remove the subscription between a destination and a filter
    RemoveSubscription(RemoveSubscriptionArgs),
    /// Remove every owned subscription, filter and destination
    RemoveServer,
}

#[derive(Args, Debug)]
pub struct AddDestinationArgs {
    pub identity: String,

    /// Listener URL, [http|https://]host[:port]
    #[arg(short = 'l', long = "listener-url", value_name = "URL")]
    pub listener_url: String,

    #[command(flatten)]
    pub ownership: OwnedFlags,
}

#[derive(Args, Debug)]
pub struct AddFilterArgs {
    pub identity: String,

    /// Query selecting the indications, e.g. "SELECT * FROM CIM_AlertIndication"
    #[arg(long)]
    pub query: String,

    #[arg(long = "query-language", default_value = "WQL")]
    pub query_language: String,

    /// Namespaces the indications originate from (default: the default namespace)
    #[arg(long = "source-namespaces", value_name = "NS")]
    pub source_namespaces: Vec<String>,

    #[command(flatten)]
    pub ownership: OwnedFlags,
}

#[derive(Args, Debug)]
pub struct AddSubscriptionArgs {
    pub destination_identity: String,
    pub filter_identity: String,

    #[command(flatten)]
    pub ownership: OwnedFlags,

    /// Choose interactively when an identity matches several objects
    #[arg(long)]
    pub select: bool,
}

#[derive(Args, Debug)]
pub struct ListArgs {
    #[arg(long = "type", value_enum, default_value_t = Ownership::All)]
    pub ownership: Ownership,

    #[arg(long = "names-only", visible_alias = "no")]
    pub names_only: bool,

    #[arg(long)]
    pub summary: bool,
}

#[derive(Args, Debug)]
pub struct RemoveEndpointArgs {
    pub identity: String,

    #[arg(long)]
    pub select: bool,
}

#[derive(Args, Debug)]
pub struct RemoveSubscriptionArgs {
    pub destination_identity: String,
    pub filter_identity: String,

    /// Also remove the destination and filter when no other subscription uses them
    #[arg(long = "remove-associated-instances")]
    pub remove_associated: bool,

    #[arg(long)]
    pub select: bool,
}

#[derive(Serialize)]
struct OwnershipCounts {
    object: &'static str,
    owned: usize,
    permanent: usize,
    all: usize,
}

impl OwnershipCounts {
    fn tally(object: &'static str, owned: impl Iterator<Item = bool>) -> Self {
        let (mut o, mut p) = (0, 0);
        for is_owned in owned {
            if is_owned {
                o += 1;
            } else {
                p += 1;
            }
        }
        OwnershipCounts {
            object,
            owned: o,
            permanent: p,
            all: o + p,
        }
    }
}

/// Rows of a listing plus the instances behind them.
struct Listing {
    instances: Vec<CimInstance>,
    headers: &'static [&'static str],
    rows: Vec<Vec<String>>,
}

pub fn execute_subscription(args: SubscriptionArgs, ctx: &mut Context) -> Result<()> {
    let Session {
        conn,
        mut out,
        selector,
        ..
    } = ctx.session(OutputFormat::Table)?;
    let default_ns = conn.default_namespace().to_string();
    let store = SubscriptionManager::new(conn, args.submgr_id.clone())
        .context("Failed to attach the subscription manager")?;
    tracing::debug!(submgr_id = %args.submgr_id, server_id = store.server_id(), "subscription command");
    let mut resolver = SubscriptionResolver::new(store, Box::new(selector));

    match args.command {
        SubscriptionCommand::AddDestination(a) => {
            let owned = a.ownership.is_owned();
            let inst = resolver.add_destination(&a.identity, &a.listener_url, owned)?;
            report_added(&mut out, ObjectKind::Destination.as_str(), owned, &inst)
        }
        SubscriptionCommand::AddFilter(a) => {
            let mut source_namespaces: Vec<String> = a
                .source_namespaces
                .iter()
                .flat_map(|s| s.split(','))
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect();
            if source_namespaces.is_empty() {
                source_namespaces.push(default_ns);
            }
            let definition = FilterDefinition {
                query: a.query,
                query_language: a.query_language,
                source_namespaces,
            };
            let owned = a.ownership.is_owned();
            let inst = resolver.add_filter(&a.identity, &definition, owned)?;
            report_added(&mut out, ObjectKind::Filter.as_str(), owned, &inst)
        }
        SubscriptionCommand::AddSubscription(a) => {
            let requested_owned = a.ownership.is_owned();
            let inst = resolver.add_subscription(
                &a.destination_identity,
                &a.filter_identity,
                requested_owned,
                a.select,
            )?;
            // Ownership of a subscription follows from its endpoints.
            let owned = resolver.store().subscription_is_owned(&inst);
            if requested_owned && !owned {
                out.warning(
                    "Both endpoints are permanent; the subscription was created as permanent \
                     and is not removed by remove-server",
                )?;
            }
            report_added(&mut out, "subscription", owned, &inst)
        }
        SubscriptionCommand::List(a) => list_counts(&resolver, &mut out, &a),
        SubscriptionCommand::ListDestinations(a) => {
            let listing = endpoint_listing(
                resolver.list_destinations()?,
                a.ownership,
                &["Ownership", "Identity", "Name", "Destination", "Subscriptions"],
                "Destination",
            );
            emit(&mut out, "destination", listing, &a)
        }
        SubscriptionCommand::ListFilters(a) => {
            let listing = endpoint_listing(
                resolver.list_filters()?,
                a.ownership,
                &["Ownership", "Identity", "Name", "Query", "Subscriptions"],
                "Query",
            );
            emit(&mut out, "filter", listing, &a)
        }
        SubscriptionCommand::ListSubscriptions(a) => {
            let name = |inst: &Option<CimInstance>| {
                inst.as_ref()
                    .and_then(|i| i.get_str("Name"))
                    .unwrap_or("<missing>")
                    .to_string()
            };
            let mut listing = Listing {
                instances: Vec::new(),
                headers: &["Ownership", "Handler", "Destination", "Filter", "Query"],
                rows: Vec::new(),
            };
            for sub in resolver.list_subscriptions()? {
                if !a.ownership.includes(sub.owned) {
                    continue;
                }
                listing.rows.push(vec![
                    Ownership::label(sub.owned).to_string(),
                    name(&sub.destination),
                    sub.destination
                        .as_ref()
                        .and_then(|d| d.get_str("Destination"))
                        .unwrap_or_default()
                        .to_string(),
                    name(&sub.filter),
                    sub.filter
                        .as_ref()
                        .and_then(|f| f.get_str("Query"))
                        .unwrap_or_default()
                        .to_string(),
                ]);
                listing.instances.push(sub.instance);
            }
            emit(&mut out, "subscription", listing, &a)
        }
        SubscriptionCommand::RemoveDestination(a) => {
            let path = resolver.remove_destination(&a.identity, a.select)?;
            tracing::info!(%path, "destination removed");
            out.success(format!("Removed destination {path}"))?;
            Ok(())
        }
        SubscriptionCommand::RemoveFilter(a) => {
            let path = resolver.remove_filter(&a.identity, a.select)?;
            tracing::info!(%path, "filter removed");
            out.success(format!("Removed filter {path}"))?;
            Ok(())
        }
        SubscriptionCommand::RemoveSubscription(a) => {
            let removed = resolver.remove_subscription(
                &a.destination_identity,
                &a.filter_identity,
                a.remove_associated,
                a.select,
            )?;
            report_removed(&mut out, &removed)
        }
        SubscriptionCommand::RemoveServer => {
            let removed = resolver.remove_server()?;
            if removed.is_empty() {
                out.line("No owned subscriptions, filters or destinations")?;
                return Ok(());
            }
            report_removed(&mut out, &removed)
        }
    }
}

fn report_added(
    out: &mut ConsoleRenderer<'_>,
    object_type: &str,
    owned: bool,
    inst: &CimInstance,
) -> Result<()> {
    tracing::info!(object_type, owned, name = inst.get_str("Name"), "subscription object added");
    if out.format().is_machine() {
        out.value(inst)?;
        return Ok(());
    }
    let path = inst
        .path
        .as_ref()
        .map(ToString::to_string)
        .unwrap_or_else(|| inst.classname.clone());
    out.success(format!(
        "Added {} {object_type}: {path}",
        Ownership::label(owned)
    ))?;
    Ok(())
}

fn report_removed(out: &mut ConsoleRenderer<'_>, removed: &RemovedObjects) -> Result<()> {
    #[derive(Serialize)]
    struct Removed<'r> {
        subscriptions: &'r [ObjectPath],
        filters: &'r [ObjectPath],
        destinations: &'r [ObjectPath],
    }

    if out.format().is_machine() {
        out.value(&Removed {
            subscriptions: &removed.subscriptions,
            filters: &removed.filters,
            destinations: &removed.destinations,
        })?;
        return Ok(());
    }
    let groups = [
        ("subscription", &removed.subscriptions),
        ("filter", &removed.filters),
        ("destination", &removed.destinations),
    ];
    for (label, paths) in groups {
        for path in paths {
            out.success(format!("Removed {label} {path}"))?;
        }
    }
    Ok(())
}

fn list_counts(
    resolver: &SubscriptionResolver<'_>,
    out: &mut ConsoleRenderer<'_>,
    args: &ListArgs,
) -> Result<()> {
    let counts = [
        OwnershipCounts::tally(
            "destinations",
            resolver.list_destinations()?.iter().map(|l| l.owned),
        ),
        OwnershipCounts::tally("filters", resolver.list_filters()?.iter().map(|l| l.owned)),
        OwnershipCounts::tally(
            "subscriptions",
            resolver.list_subscriptions()?.iter().map(|l| l.owned),
        ),
    ];

    if out.format().is_machine() {
        out.value(&counts)?;
        return Ok(());
    }
    let pick = |c: &OwnershipCounts| match args.ownership {
        Ownership::Owned => c.owned,
        Ownership::Permanent => c.permanent,
        Ownership::All => c.all,
    };
    if args.summary {
        for c in &counts {
            out.line(format!("{}: {}", c.object, pick(c)))?;
        }
        return Ok(());
    }
    let title = format!("Subscription manager {}", resolver.store().submgr_id());
    let subtitle = format!("interop namespace {}", resolver.store().interop_namespace());
    out.title(&title, Some(&subtitle))?;
    let rows: Vec<Vec<String>> = counts
        .iter()
        .map(|c| {
            vec![
                c.object.to_string(),
                c.owned.to_string(),
                c.permanent.to_string(),
                c.all.to_string(),
            ]
        })
        .collect();
    out.table(&["Object", "Owned", "Permanent", "All"], &rows)?;
    Ok(())
}

fn endpoint_listing(
    listings: Vec<EndpointListing>,
    ownership: Ownership,
    headers: &'static [&'static str],
    detail: &str,
) -> Listing {
    let mut listing = Listing {
        instances: Vec::new(),
        headers,
        rows: Vec::new(),
    };
    for l in listings.into_iter().filter(|l| ownership.includes(l.owned)) {
        listing.rows.push(vec![
            Ownership::label(l.owned).to_string(),
            l.identity.clone(),
            l.instance.get_str("Name").unwrap_or_default().to_string(),
            l.instance.get_str(detail).unwrap_or_default().to_string(),
            l.references.to_string(),
        ]);
        listing.instances.push(l.instance);
    }
    listing
}

fn emit(
    out: &mut ConsoleRenderer<'_>,
    object_type: &str,
    listing: Listing,
    args: &ListArgs,
) -> Result<()> {
    if args.summary {
        out.line(format!("{} {object_type}(s) returned", listing.instances.len()))?;
        return Ok(());
    }
    if args.names_only {
        let paths: Vec<ObjectPath> = listing.instances.into_iter().filter_map(|i| i.path).collect();
        if out.format().is_machine() {
            out.value(&paths)?;
        } else {
            for path in paths {
                out.line(path.to_string())?;
            }
        }
        return Ok(());
    }
    match out.format() {
        OutputFormat::Json | OutputFormat::Yaml => out.value(&listing.instances)?,
        OutputFormat::Mof => {
            for inst in &listing.instances {
                out.line(instance_to_mof(inst))?;
            }
        }
        OutputFormat::Table | OutputFormat::Text => out.table(listing.headers, &listing.rows)?,
    }
    Ok(())
}
