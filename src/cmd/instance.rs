/*!
`instance.rs`

Implements `wbemcli instance <enumerate|get|create|delete|references|associators|count>`.

Instance names are WBEM URI paths (`CIM_Foo.InstanceID="CIM_Foo1"`), or a
class name plus `--key NAME=VALUE` options. `CLASSNAME.?` lists the
instances of the class and asks which one to use.

Read operations run in every requested namespace and aggregate partial
failures; `create` and `delete` act on a single namespace.
*/

use anyhow::{Context as _, Result, bail};
use clap::{Args, Subcommand};
use std::str::FromStr;

use crate::cim::{
    AssocFilter, CimInstance, CimValue, ClassRequest, InstanceRequest, ObjectPath,
    WbemConnection,
};
use crate::cmd::format::{CimObjects, ClassCount, OutputFormat};
use crate::cmd::shared::{
    Context, Session, coerce_cim_value, glob_matcher, in_namespaces, parse_assignments,
    target_namespaces,
};
use crate::indication::Selector;

#[derive(Args, Debug)]
pub struct InstanceArgs {
    #[command(subcommand)]
    pub command: InstanceCommand,
}

#[derive(Subcommand, Debug)]
pub enum InstanceCommand {
    /// List instances of a class and its subclasses
    Enumerate(EnumerateArgs),
    /// Show one instance
    Get(GetArgs),
    /// Create an instance from --property NAME=VALUE options
    Create(CreateArgs),
    /// Delete an instance
    Delete(DeleteArgs),
    /// Association instances referencing an instance
    References(ReferencesArgs),
    /// Instances associated with an instance
    Associators(AssociatorsArgs),
    /// Count instances per class (all namespaces by default)
    Count(CountArgs),
}

/// INSTANCENAME plus optional `--key` options.
#[derive(Args, Debug, Clone)]
pub struct InstanceName {
    /// Instance path, CLASSNAME with --key options, or CLASSNAME.? to choose interactively
    pub instancename: String,

    /// Key binding NAME=VALUE when INSTANCENAME is a class name (repeatable)
    #[arg(short = 'k', long = "key", value_name = "NAME=VALUE")]
    pub keys: Vec<String>,
}

#[derive(Args, Debug)]
pub struct EnumerateArgs {
    pub classname: String,

    #[arg(long = "names-only", visible_alias = "no")]
    pub names_only: bool,

    /// Only these properties (repeatable or comma separated)
    #[arg(long = "property-list", visible_alias = "pl", value_name = "NAMES")]
    pub property_list: Vec<String>,

    #[arg(long)]
    pub summary: bool,

    /// Namespace(s); repeatable or comma separated
    #[arg(short = 'n', long = "namespace", value_name = "NS")]
    pub namespace: Vec<String>,
}

#[derive(Args, Debug)]
pub struct GetArgs {
    #[command(flatten)]
    pub name: InstanceName,

    #[arg(long = "property-list", visible_alias = "pl", value_name = "NAMES")]
    pub property_list: Vec<String>,

    #[arg(short = 'n', long = "namespace", value_name = "NS")]
    pub namespace: Vec<String>,
}

#[derive(Args, Debug)]
pub struct CreateArgs {
    pub classname: String,

    /// Property value NAME=VALUE (repeatable; arrays comma separated)
    #[arg(short = 'p', long = "property", value_name = "NAME=VALUE")]
    pub properties: Vec<String>,

    #[arg(short = 'n', long = "namespace", value_name = "NS")]
    pub namespace: Option<String>,
}

#[derive(Args, Debug)]
pub struct DeleteArgs {
    #[command(flatten)]
    pub name: InstanceName,

    #[arg(short = 'n', long = "namespace", value_name = "NS")]
    pub namespace: Option<String>,
}

#[derive(Args, Debug)]
pub struct ReferencesArgs {
    #[command(flatten)]
    pub name: InstanceName,

    /// Only associations of this class
    #[arg(long = "result-class", visible_alias = "rc")]
    pub result_class: Option<String>,

    #[arg(long)]
    pub role: Option<String>,

    #[arg(long = "names-only", visible_alias = "no")]
    pub names_only: bool,

    #[arg(long)]
    pub summary: bool,

    #[arg(short = 'n', long = "namespace", value_name = "NS")]
    pub namespace: Vec<String>,
}

#[derive(Args, Debug)]
pub struct AssociatorsArgs {
    #[command(flatten)]
    pub name: InstanceName,

    #[arg(long = "assoc-class", visible_alias = "ac")]
    pub assoc_class: Option<String>,

    /// Only associated instances of this class
    #[arg(long = "result-class", visible_alias = "rc")]
    pub result_class: Option<String>,

    #[arg(long)]
    pub role: Option<String>,

    #[arg(long = "result-role", visible_alias = "rr")]
    pub result_role: Option<String>,

    #[arg(long = "names-only", visible_alias = "no")]
    pub names_only: bool,

    #[arg(long)]
    pub summary: bool,

    #[arg(short = 'n', long = "namespace", value_name = "NS")]
    pub namespace: Vec<String>,
}

#[derive(Args, Debug)]
pub struct CountArgs {
    /// Class name glob (default: every class)
    #[arg(default_value = "*")]
    pub pattern: String,

    /// Namespace(s) to count in (default: all namespaces)
    #[arg(short = 'n', long = "namespace", value_name = "NS")]
    pub namespace: Vec<String>,
}

/// Entry point for the instance command group.
pub fn execute_instance(args: InstanceArgs, ctx: &mut Context) -> Result<()> {
    match args.command {
        InstanceCommand::Enumerate(a) => enumerate(a, ctx),
        InstanceCommand::Get(a) => get(a, ctx),
        InstanceCommand::Create(a) => create(a, ctx),
        InstanceCommand::Delete(a) => delete(a, ctx),
        InstanceCommand::References(a) => references(a, ctx),
        InstanceCommand::Associators(a) => associators(a, ctx),
        InstanceCommand::Count(a) => count(a, ctx),
    }
}

fn instance_request(property_list: &[String]) -> InstanceRequest {
    let names: Vec<String> = property_list
        .iter()
        .flat_map(|p| p.split(','))
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(str::to_string)
        .collect();
    InstanceRequest {
        property_list: (!names.is_empty()).then_some(names),
    }
}

/// Untyped key value: integers and booleans are recognized, anything else is a string.
fn key_value(raw: &str) -> CimValue {
    if let Ok(n) = raw.parse::<i64>() {
        return CimValue::Integer(n);
    }
    match raw {
        "true" | "TRUE" | "True" => CimValue::Boolean(true),
        "false" | "FALSE" | "False" => CimValue::Boolean(false),
        _ => CimValue::string(raw),
    }
}

/// Turn an `InstanceName` into a path, asking the selector for `CLASS.?`.
fn resolve_instance_name(
    name: &InstanceName,
    conn: &dyn WbemConnection,
    namespace: &str,
    selector: &mut dyn Selector,
) -> Result<ObjectPath> {
    let raw = name.instancename.trim();
    if let Some(classname) = raw.strip_suffix(".?") {
        let paths = conn
            .enumerate_instance_names(namespace, classname)
            .with_context(|| format!("Failed to list instances of '{classname}'"))?;
        if paths.is_empty() {
            bail!("No instances of '{classname}' in namespace '{namespace}'");
        }
        let choices: Vec<String> = paths.iter().map(ToString::to_string).collect();
        let prompt = format!("Select an instance of {classname}");
        return match selector.select(&prompt, &choices) {
            Some(idx) if idx < paths.len() => Ok(paths[idx].clone()),
            _ => bail!("Instance selection cancelled"),
        };
    }

    if !name.keys.is_empty() {
        let mut path = ObjectPath::new(raw);
        for (k, v) in parse_assignments(&name.keys)? {
            path = path.with_key(k, key_value(&v));
        }
        return Ok(path);
    }

    let path = ObjectPath::from_str(raw).with_context(|| format!("Invalid instance name '{raw}'"))?;
    if path.is_class_path() {
        bail!("Instance name '{raw}' has no key bindings (use --key or CLASSNAME.?)");
    }
    Ok(path)
}

fn instances_or_paths(instances: Vec<CimInstance>, names_only: bool) -> CimObjects {
    if names_only {
        CimObjects::Paths(instances.into_iter().filter_map(|i| i.path).collect())
    } else {
        CimObjects::Instances(instances)
    }
}

fn enumerate(args: EnumerateArgs, ctx: &mut Context) -> Result<()> {
    let req = instance_request(&args.property_list);
    let Session { conn, mut out, .. } = ctx.session(OutputFormat::Mof)?;
    let conn: &dyn WbemConnection = conn;
    let namespaces = target_namespaces(conn, &args.namespace, false)?;
    in_namespaces(&mut out, namespaces, "instance", &args.classname, |ns| {
        let objects = if args.names_only {
            CimObjects::Paths(conn.enumerate_instance_names(ns, &args.classname)?)
        } else {
            CimObjects::Instances(conn.enumerate_instances(ns, &args.classname, &req)?)
        };
        Ok(objects.summarized(args.summary))
    })
}

fn get(args: GetArgs, ctx: &mut Context) -> Result<()> {
    let req = instance_request(&args.property_list);
    let Session {
        conn,
        mut out,
        selector,
        ..
    } = ctx.session(OutputFormat::Mof)?;
    let conn: &dyn WbemConnection = conn;
    let namespaces = target_namespaces(conn, &args.namespace, false)?;
    let first = namespaces
        .first()
        .cloned()
        .unwrap_or_else(|| conn.default_namespace().to_string());
    let path = resolve_instance_name(&args.name, conn, &first, selector)?;
    let target = path.to_string();
    in_namespaces(&mut out, namespaces, "instance", &target, |ns| {
        Ok(CimObjects::Instances(vec![conn.get_instance(ns, &path, &req)?]))
    })
}

fn create(args: CreateArgs, ctx: &mut Context) -> Result<()> {
    let Session { conn, mut out, .. } = ctx.session(OutputFormat::Text)?;
    let ns = args
        .namespace
        .clone()
        .unwrap_or_else(|| conn.default_namespace().to_string());
    let cls = conn
        .get_class(&ns, &args.classname, &ClassRequest::default())
        .with_context(|| format!("Failed to get class '{}'", args.classname))?;

    let mut inst = CimInstance::new(cls.classname.clone());
    for (name, raw) in parse_assignments(&args.properties)? {
        let Some(prop) = cls.property(&name) else {
            bail!("Property '{name}' is not defined in class '{}'", cls.classname);
        };
        let cim_type = if prop.reference_class.is_some() {
            "reference"
        } else {
            prop.cim_type.as_str()
        };
        let value = coerce_cim_value(&raw, cim_type, prop.is_array)
            .with_context(|| format!("Invalid value for property '{}'", prop.name))?;
        inst.set(prop.name.clone(), Some(value));
    }

    let path = conn
        .create_instance(&ns, inst)
        .with_context(|| format!("Failed to create instance of '{}'", cls.classname))?;
    tracing::info!(%path, "instance created");
    if out.format().is_machine() {
        out.value(&path)?;
    } else {
        out.line(path.to_string())?;
    }
    Ok(())
}

fn delete(args: DeleteArgs, ctx: &mut Context) -> Result<()> {
    let Session {
        conn,
        mut out,
        selector,
        ..
    } = ctx.session(OutputFormat::Text)?;
    let ns = args
        .namespace
        .clone()
        .unwrap_or_else(|| conn.default_namespace().to_string());
    let path = resolve_instance_name(&args.name, &*conn, &ns, selector)?;
    conn.delete_instance(&ns, &path)
        .with_context(|| format!("Failed to delete instance {path}"))?;
    tracing::info!(%path, "instance deleted");
    out.success(format!("Deleted instance {path}"))?;
    Ok(())
}

fn references(args: ReferencesArgs, ctx: &mut Context) -> Result<()> {
    let filter = AssocFilter {
        result_class: args.result_class.clone(),
        role: args.role.clone(),
        ..AssocFilter::default()
    };
    let Session {
        conn,
        mut out,
        selector,
        ..
    } = ctx.session(OutputFormat::Mof)?;
    let conn: &dyn WbemConnection = conn;
    let namespaces = target_namespaces(conn, &args.namespace, false)?;
    let first = namespaces.first().cloned().unwrap_or_default();
    let path = resolve_instance_name(&args.name, conn, &first, selector)?;
    let target = path.to_string();
    in_namespaces(&mut out, namespaces, "instance", &target, |ns| {
        let found = conn.references(ns, &path, &filter)?;
        Ok(instances_or_paths(found, args.names_only).summarized(args.summary))
    })
}

fn associators(args: AssociatorsArgs, ctx: &mut Context) -> Result<()> {
    let filter = AssocFilter {
        assoc_class: args.assoc_class.clone(),
        result_class: args.result_class.clone(),
        role: args.role.clone(),
        result_role: args.result_role.clone(),
    };
    let Session {
        conn,
        mut out,
        selector,
        ..
    } = ctx.session(OutputFormat::Mof)?;
    let conn: &dyn WbemConnection = conn;
    let namespaces = target_namespaces(conn, &args.namespace, false)?;
    let first = namespaces.first().cloned().unwrap_or_default();
    let path = resolve_instance_name(&args.name, conn, &first, selector)?;
    let target = path.to_string();
    in_namespaces(&mut out, namespaces, "instance", &target, |ns| {
        let found = conn.associators(ns, &path, &filter)?;
        Ok(instances_or_paths(found, args.names_only).summarized(args.summary))
    })
}

fn count(args: CountArgs, ctx: &mut Context) -> Result<()> {
    let matcher = glob_matcher(&args.pattern)?;
    let Session { conn, mut out, .. } = ctx.session(OutputFormat::Table)?;
    let conn: &dyn WbemConnection = conn;
    let namespaces = target_namespaces(conn, &args.namespace, true)?;
    in_namespaces(&mut out, namespaces, "instance", &args.pattern, |ns| {
        let mut counts = Vec::new();
        for classname in conn.enumerate_class_names(ns, None, true)? {
            if !matcher.is_match(&classname) {
                continue;
            }
            // Instances of subclasses are counted under their own class.
            let count = conn
                .enumerate_instance_names(ns, &classname)?
                .iter()
                .filter(|p| p.classname.eq_ignore_ascii_case(&classname))
                .count();
            if count > 0 {
                counts.push(ClassCount { classname, count });
            }
        }
        counts.sort_by_key(|c| c.classname.to_ascii_lowercase());
        Ok(CimObjects::Counts(counts))
    })
}
