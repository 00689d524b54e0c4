/*!
`class.rs`

Implements `wbemcli class <enumerate|get|find|references|associators|tree>`.

All commands except `tree` run in every requested namespace through the
results handler: namespaces that fail with NotFound / InvalidClass /
InvalidNamespace / InvalidParameter are reported after the successful ones,
and the command only fails when no namespace succeeded.

Filter flags (`--association`, `--experimental`, `--since`, `--subclass-of`,
`--leaf-classes`, ...) force qualifiers on retrieval; they are stripped
again unless the user asked for them.
*/

use anyhow::{Result, bail};
use clap::{Args, Subcommand};
use std::collections::BTreeMap;

use crate::cim::{AssocFilter, ClassRequest, CimClass, WbemConnection};
use crate::cmd::format::{CimObjects, OutputFormat};
use crate::cmd::shared::{Context, Session, glob_matcher, in_namespaces, target_namespaces};
use crate::engine::{FilterOptions, Filtered, apply, build_filters};

#[derive(Args, Debug)]
pub struct ClassArgs {
    #[command(subcommand)]
    pub command: ClassCommand,
}

#[derive(Subcommand, Debug)]
pub enum ClassCommand {
    /// List classes below CLASSNAME (or the top-level classes)
    Enumerate(EnumerateArgs),
    /// Show one class
    Get(GetArgs),
    /// Find class names matching a glob pattern (all namespaces by default)
    Find(FindArgs),
    /// Association classes referencing a class
    References(ReferencesArgs),
    /// Classes associated with a class
    Associators(AssociatorsArgs),
    /// Show the inheritance tree
    Tree(TreeArgs),
}

/// Qualifier and hierarchy filters shared by class listings.
#[derive(Args, Debug, Clone, Default)]
pub struct ClassFilterArgs {
    /// Only association classes
    #[arg(long, conflicts_with = "no_association")]
    pub association: bool,
    /// Exclude association classes
    #[arg(long = "no-association")]
    pub no_association: bool,

    /// Only indication classes
    #[arg(long, conflicts_with = "no_indication")]
    pub indication: bool,
    #[arg(long = "no-indication")]
    pub no_indication: bool,

    /// Only classes with an Experimental element
    #[arg(long, conflicts_with = "no_experimental")]
    pub experimental: bool,
    #[arg(long = "no-experimental")]
    pub no_experimental: bool,

    /// Only classes with a Deprecated element
    #[arg(long, conflicts_with = "no_deprecated")]
    pub deprecated: bool,
    #[arg(long = "no-deprecated")]
    pub no_deprecated: bool,

    /// Only classes whose Version qualifier is at least M.N.U
    #[arg(long, value_name = "M.N.U")]
    pub since: Option<String>,

    /// Only classes of this schema (classname prefix before '_')
    #[arg(long, value_name = "SCHEMA")]
    pub schema: Option<String>,

    /// Only subclasses of this class (implies deep inheritance)
    #[arg(long = "subclass-of", value_name = "CLASS")]
    pub subclass_of: Option<String>,

    /// Only classes without subclasses
    #[arg(long = "leaf-classes")]
    pub leaf_classes: bool,
}

fn tri_state(yes: bool, no: bool) -> Option<bool> {
    match (yes, no) {
        (true, _) => Some(true),
        (false, true) => Some(false),
        (false, false) => None,
    }
}

impl ClassFilterArgs {
    pub fn to_options(&self) -> FilterOptions {
        FilterOptions {
            association: tri_state(self.association, self.no_association),
            indication: tri_state(self.indication, self.no_indication),
            experimental: tri_state(self.experimental, self.no_experimental),
            deprecated: tri_state(self.deprecated, self.no_deprecated),
            since: self.since.clone(),
            schema: self.schema.clone(),
            subclass_of: self.subclass_of.clone(),
            leaf_classes: self.leaf_classes,
        }
    }
}

#[derive(Args, Debug, Clone, Default)]
pub struct RetrievalArgs {
    /// Only elements defined in the class itself
    #[arg(short = 'l', long = "local-only", visible_alias = "lo")]
    pub local_only: bool,

    /// Omit qualifiers
    #[arg(long = "no-qualifiers", visible_alias = "nq")]
    pub no_qualifiers: bool,

    /// Include class origin of properties and methods
    #[arg(short = 'c', long = "include-classorigin", visible_alias = "ico")]
    pub include_classorigin: bool,
}

#[derive(Args, Debug)]
pub struct EnumerateArgs {
    pub classname: Option<String>,

    /// Include subclasses at every depth
    #[arg(long = "deep-inheritance", visible_alias = "di")]
    pub deep_inheritance: bool,

    #[command(flatten)]
    pub retrieval: RetrievalArgs,

    /// Class names only
    #[arg(long = "names-only", visible_alias = "no")]
    pub names_only: bool,

    /// Only the number of classes
    #[arg(long)]
    pub summary: bool,

    /// Namespace(s); repeatable or comma separated
    #[arg(short = 'n', long = "namespace", value_name = "NS")]
    pub namespace: Vec<String>,

    #[command(flatten)]
    pub filters: ClassFilterArgs,
}

#[derive(Args, Debug)]
pub struct GetArgs {
    pub classname: String,

    #[command(flatten)]
    pub retrieval: RetrievalArgs,

    /// Namespace(s); repeatable or comma separated
    #[arg(short = 'n', long = "namespace", value_name = "NS")]
    pub namespace: Vec<String>,
}

#[derive(Args, Debug)]
pub struct FindArgs {
    /// Class name glob, e.g. "CIM_*Service"
    pub pattern: String,

    /// Namespace(s) to search (default: all namespaces)
    #[arg(short = 'n', long = "namespace", value_name = "NS")]
    pub namespace: Vec<String>,
}

#[derive(Args, Debug)]
pub struct ReferencesArgs {
    pub classname: String,

    /// Only associations of this class
    #[arg(long = "result-class", visible_alias = "rc")]
    pub result_class: Option<String>,

    /// Only associations referencing the class through this property
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
    pub classname: String,

    /// Only through associations of this class
    #[arg(long = "assoc-class", visible_alias = "ac")]
    pub assoc_class: Option<String>,

    /// Only associated classes of this class
    #[arg(long = "result-class", visible_alias = "rc")]
    pub result_class: Option<String>,

    #[arg(long)]
    pub role: Option<String>,

    /// Property on the far side of the association
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
pub struct TreeArgs {
    /// Root of the tree (default: every top-level class)
    pub classname: Option<String>,

    #[arg(short = 'n', long = "namespace", value_name = "NS")]
    pub namespace: Option<String>,
}

/// Entry point for the class command group.
pub fn execute_class(args: ClassArgs, ctx: &mut Context) -> Result<()> {
    match args.command {
        ClassCommand::Enumerate(a) => enumerate(a, ctx),
        ClassCommand::Get(a) => get(a, ctx),
        ClassCommand::Find(a) => find(a, ctx),
        ClassCommand::References(a) => references(a, ctx),
        ClassCommand::Associators(a) => associators(a, ctx),
        ClassCommand::Tree(a) => tree(a, ctx),
    }
}

fn class_request(r: &RetrievalArgs, deep_inheritance: bool, force_qualifiers: bool) -> ClassRequest {
    ClassRequest {
        deep_inheritance,
        local_only: r.local_only,
        include_qualifiers: !r.no_qualifiers || force_qualifiers,
        include_classorigin: r.include_classorigin,
    }
}

fn classes_or_names(classes: Vec<CimClass>, names_only: bool) -> CimObjects {
    if names_only {
        CimObjects::ClassNames(classes.into_iter().map(|c| c.classname).collect())
    } else {
        CimObjects::Classes(classes)
    }
}

fn enumerate(args: EnumerateArgs, ctx: &mut Context) -> Result<()> {
    let opts = args.filters.to_options();
    let filtering = opts.is_active();
    let deep = args.deep_inheritance || opts.subclass_of.is_some();
    let req = class_request(&args.retrieval, deep, filtering);
    let classname = args.classname.as_deref();
    let target = classname.unwrap_or("<top-level>").to_string();

    let Session { conn, mut out, .. } = ctx.session(OutputFormat::Mof)?;
    let conn: &dyn WbemConnection = conn;
    let namespaces = target_namespaces(conn, &args.namespace, false)?;

    in_namespaces(&mut out, namespaces, "class", &target, |ns| {
        let objects = if filtering {
            let spec = build_filters(conn, ns, &opts)?;
            let classes = conn.enumerate_classes(ns, classname, &req)?;
            match apply(classes, &spec, args.names_only, !args.retrieval.no_qualifiers)? {
                Filtered::Classes(c) => CimObjects::Classes(c),
                Filtered::Names(n) => CimObjects::ClassNames(n),
            }
        } else if args.names_only {
            CimObjects::ClassNames(conn.enumerate_class_names(ns, classname, deep)?)
        } else {
            CimObjects::Classes(conn.enumerate_classes(ns, classname, &req)?)
        };
        Ok(objects.summarized(args.summary))
    })
}

fn get(args: GetArgs, ctx: &mut Context) -> Result<()> {
    let req = class_request(&args.retrieval, false, false);
    let Session { conn, mut out, .. } = ctx.session(OutputFormat::Mof)?;
    let conn: &dyn WbemConnection = conn;
    let namespaces = target_namespaces(conn, &args.namespace, false)?;
    in_namespaces(&mut out, namespaces, "class", &args.classname, |ns| {
        let cls = conn.get_class(ns, &args.classname, &req)?;
        Ok(CimObjects::Classes(vec![cls]))
    })
}

fn find(args: FindArgs, ctx: &mut Context) -> Result<()> {
    let matcher = glob_matcher(&args.pattern)?;
    let Session { conn, mut out, .. } = ctx.session(OutputFormat::Text)?;
    let conn: &dyn WbemConnection = conn;
    let namespaces = target_namespaces(conn, &args.namespace, true)?;
    in_namespaces(&mut out, namespaces, "class", &args.pattern, |ns| {
        let mut names: Vec<String> = conn
            .enumerate_class_names(ns, None, true)?
            .into_iter()
            .filter(|n| matcher.is_match(n))
            .collect();
        names.sort_by_key(|n| n.to_ascii_lowercase());
        Ok(CimObjects::ClassNames(names))
    })
}

fn references(args: ReferencesArgs, ctx: &mut Context) -> Result<()> {
    let filter = AssocFilter {
        result_class: args.result_class.clone(),
        role: args.role.clone(),
        ..AssocFilter::default()
    };
    let Session { conn, mut out, .. } = ctx.session(OutputFormat::Mof)?;
    let conn: &dyn WbemConnection = conn;
    let namespaces = target_namespaces(conn, &args.namespace, false)?;
    in_namespaces(&mut out, namespaces, "class", &args.classname, |ns| {
        let classes = conn.class_references(ns, &args.classname, &filter)?;
        Ok(classes_or_names(classes, args.names_only).summarized(args.summary))
    })
}

fn associators(args: AssociatorsArgs, ctx: &mut Context) -> Result<()> {
    let filter = AssocFilter {
        assoc_class: args.assoc_class.clone(),
        result_class: args.result_class.clone(),
        role: args.role.clone(),
        result_role: args.result_role.clone(),
    };
    let Session { conn, mut out, .. } = ctx.session(OutputFormat::Mof)?;
    let conn: &dyn WbemConnection = conn;
    let namespaces = target_namespaces(conn, &args.namespace, false)?;
    in_namespaces(&mut out, namespaces, "class", &args.classname, |ns| {
        let classes = conn.class_associators(ns, &args.classname, &filter)?;
        Ok(classes_or_names(classes, args.names_only).summarized(args.summary))
    })
}

/// Box-drawing rendering of the subclass hierarchy below each root.
fn tree_lines(roots: &[String], children: &BTreeMap<String, Vec<String>>) -> Vec<String> {
    fn walk(
        name: &str,
        prefix: &str,
        children: &BTreeMap<String, Vec<String>>,
        lines: &mut Vec<String>,
    ) {
        let kids = children
            .get(&name.to_ascii_lowercase())
            .map(Vec::as_slice)
            .unwrap_or_default();
        for (i, kid) in kids.iter().enumerate() {
            let last = i + 1 == kids.len();
            let branch = if last { "└── " } else { "├── " };
            lines.push(format!("{prefix}{branch}{kid}"));
            let next = format!("{prefix}{}", if last { "    " } else { "│   " });
            walk(kid, &next, children, lines);
        }
    }

    let mut lines = Vec::new();
    for root in roots {
        lines.push(root.clone());
        walk(root, "", children, &mut lines);
    }
    lines
}

fn tree(args: TreeArgs, ctx: &mut Context) -> Result<()> {
    let Session { conn, mut out, .. } = ctx.session(OutputFormat::Text)?;
    let ns = args
        .namespace
        .clone()
        .unwrap_or_else(|| conn.default_namespace().to_string());
    let req = ClassRequest {
        deep_inheritance: true,
        include_qualifiers: false,
        ..ClassRequest::default()
    };
    let classes = conn.enumerate_classes(&ns, None, &req)?;

    let mut children: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for c in &classes {
        if let Some(sup) = &c.superclass {
            children
                .entry(sup.to_ascii_lowercase())
                .or_default()
                .push(c.classname.clone());
        }
    }
    for kids in children.values_mut() {
        kids.sort_by_key(|k| k.to_ascii_lowercase());
    }

    let roots: Vec<String> = match &args.classname {
        Some(root) => match classes
            .iter()
            .find(|c| c.classname.eq_ignore_ascii_case(root))
        {
            Some(c) => vec![c.classname.clone()],
            None => bail!("Class '{root}' not found in namespace '{ns}'"),
        },
        None => {
            let mut r: Vec<String> = classes
                .iter()
                .filter(|c| c.superclass.is_none())
                .map(|c| c.classname.clone())
                .collect();
            r.sort_by_key(|k| k.to_ascii_lowercase());
            r
        }
    };

    for line in tree_lines(&roots, &children) {
        out.line(line)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cmd::shared::testing::mock_context;
    use crate::engine::results::AggregateError;
    use clap::Parser;

    #[derive(Parser)]
    struct TestCli {
        #[command(flatten)]
        args: ClassArgs,
    }

    fn run(format: OutputFormat, argv: &[&str]) -> (Result<()>, String, String) {
        let (mut ctx, out, err) = mock_context(format);
        let cli = TestCli::parse_from(std::iter::once("class").chain(argv.iter().copied()));
        let result = execute_class(cli.args, &mut ctx);
        (result, out.contents(), err.contents())
    }

    #[test]
    fn enumerate_names_deep() {
        let (r, out, _) = run(OutputFormat::Text, &["enumerate", "--di", "--no"]);
        r.unwrap();
        for name in ["CIM_Foo", "CIM_Foo_sub_sub", "TST_Lineage", "TST_Alert"] {
            assert!(out.lines().any(|l| l == name), "{name} missing from {out}");
        }
    }

    #[test]
    fn association_filter_keeps_only_associations() {
        let (r, out, _) = run(OutputFormat::Text, &["enumerate", "--association", "--no"]);
        r.unwrap();
        assert_eq!(out, "TST_Lineage\n");
    }

    #[test]
    fn subclass_of_implies_deep_inheritance() {
        let (r, out, _) = run(
            OutputFormat::Text,
            &["enumerate", "--subclass-of", "CIM_Foo", "--no"],
        );
        r.unwrap();
        let mut got: Vec<&str> = out.lines().collect();
        got.sort();
        assert_eq!(got, vec!["CIM_Foo_sub", "CIM_Foo_sub2", "CIM_Foo_sub_sub"]);
    }

    #[test]
    fn malformed_since_is_fatal() {
        let (r, out, _) = run(OutputFormat::Text, &["enumerate", "--since", "1.2"]);
        let err = r.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<AggregateError>(),
            Some(AggregateError::Escalated { .. })
        ));
        assert!(out.is_empty());
    }

    #[test]
    fn get_partial_success_reports_failed_namespace() {
        let (r, out, err) = run(
            OutputFormat::Mof,
            &["get", "CIM_Foo", "-n", "root/cimv2,root/bad"],
        );
        r.unwrap();
        assert!(out.contains("Namespace: root/cimv2"));
        assert!(out.contains("class CIM_Foo {"));
        assert!(err.contains("root/bad"));
    }

    #[test]
    fn get_unknown_class_fails_everywhere() {
        let (r, out, err) = run(OutputFormat::Mof, &["get", "CIM_Nope"]);
        let e = r.unwrap_err();
        assert!(matches!(
            e.downcast_ref::<AggregateError>(),
            Some(AggregateError::AllFailed { .. })
        ));
        assert!(out.is_empty());
        assert!(err.contains("CIM_Nope"));
    }

    #[test]
    fn find_searches_all_namespaces() {
        let (r, out, _) = run(OutputFormat::Text, &["find", "*indication*"]);
        r.unwrap();
        assert!(out.contains("Namespace: interop"));
        assert!(out.contains("CIM_IndicationFilter"));
        assert!(out.contains("CIM_IndicationSubscription"));
    }

    #[test]
    fn associators_of_person_class() {
        let (r, out, _) = run(OutputFormat::Text, &["associators", "TST_Person", "--no"]);
        r.unwrap();
        assert_eq!(out.trim(), "TST_Person");
    }

    #[test]
    fn tree_draws_hierarchy() {
        let (r, out, _) = run(OutputFormat::Text, &["tree", "CIM_Foo"]);
        r.unwrap();
        let expected = "CIM_Foo\n├── CIM_Foo_sub\n│   └── CIM_Foo_sub_sub\n└── CIM_Foo_sub2\n";
        assert_eq!(out, expected);
    }

    #[test]
    fn tree_unknown_root() {
        let (r, _, _) = run(OutputFormat::Text, &["tree", "CIM_Nope"]);
        assert!(r.unwrap_err().to_string().contains("CIM_Nope"));
    }
}
