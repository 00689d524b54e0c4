/*!
`connection.rs`

Implements `wbemcli connection <list|show|save|delete|select|test>`.

Definitions live in the connections file (`--connections-file`,
`WBEMCLI_CONNECTIONS_FILE`, else `wbemcli_connections.yaml`). Only `test`
opens a connection; the other commands work without a server.
*/

use anyhow::{Context as _, Result, bail};
use clap::{Args, Subcommand};
use serde::Serialize;

use crate::cim::target::TargetKind;
use crate::connections::{ConnectionDefinition, ConnectionRepository};
use crate::cmd::format::OutputFormat;
use crate::cmd::shared::{Context, Session, target_spec};

#[derive(Args, Debug)]
pub struct ConnectionArgs {
    #[command(subcommand)]
    pub command: ConnectionCommand,
}

#[derive(Subcommand, Debug)]
pub enum ConnectionCommand {
    /// List saved connections
    List,
    /// Show a saved connection (default: the default connection)
    Show {
        #[arg(value_name = "NAME")]
        connection: Option<String>,
    },
    /// Save the connection given by --server / --mock-server under NAME
    Save {
        #[arg(value_name = "NAME")]
        connection: String,

        /// Also make it the default connection
        #[arg(long = "set-default")]
        set_default: bool,
    },
    /// Delete a saved connection (choose interactively without NAME)
    Delete {
        #[arg(value_name = "NAME")]
        connection: Option<String>,
    },
    /// Make a saved connection the default (choose interactively without NAME)
    Select {
        #[arg(value_name = "NAME")]
        connection: Option<String>,
    },
    /// Connect and run a trivial request against the default namespace
    Test,
}

#[derive(Serialize)]
struct ShownConnection<'d> {
    name: &'d str,
    default: bool,
    #[serde(flatten)]
    definition: &'d ConnectionDefinition,
}

pub fn execute_connection(args: ConnectionArgs, ctx: &mut Context) -> Result<()> {
    match args.command {
        ConnectionCommand::List => list(ctx),
        ConnectionCommand::Show { connection } => show(ctx, connection),
        ConnectionCommand::Save {
            connection,
            set_default,
        } => save(ctx, &connection, set_default),
        ConnectionCommand::Delete { connection } => delete(ctx, connection),
        ConnectionCommand::Select { connection } => select(ctx, connection),
        ConnectionCommand::Test => test(ctx),
    }
}

fn list(ctx: &mut Context) -> Result<()> {
    let repo = ctx.options().open_repository()?;
    let mut out = ctx.renderer(OutputFormat::Table);
    let shown: Vec<ShownConnection<'_>> = repo
        .iter()
        .map(|(name, definition)| ShownConnection {
            name,
            default: repo.default_connection() == Some(name),
            definition,
        })
        .collect();

    if out.format().is_machine() {
        out.value(&shown)?;
        return Ok(());
    }
    if shown.is_empty() {
        out.line(format!(
            "No connections defined in {}",
            repo.path().display()
        ))?;
        return Ok(());
    }
    let rows: Vec<Vec<String>> = shown
        .iter()
        .map(|s| {
            vec![
                if s.default { "*".into() } else { String::new() },
                s.name.to_string(),
                s.definition.target_summary(),
                s.definition.default_namespace.clone().unwrap_or_default(),
                s.definition.user.clone().unwrap_or_default(),
            ]
        })
        .collect();
    out.table(&["Default", "Name", "Target", "Namespace", "User"], &rows)?;
    Ok(())
}

fn show(ctx: &mut Context, name: Option<String>) -> Result<()> {
    let repo = ctx.options().open_repository()?;
    let Some(name) = name.or_else(|| repo.default_connection().map(str::to_string)) else {
        bail!("No connection name given and no default connection selected");
    };
    let definition = repo.get(&name)?;
    let kind = match target_spec(definition)?.kind() {
        TargetKind::Http => "http",
        TargetKind::Https => "https",
        TargetKind::Mock => "mock",
    };
    let shown = ShownConnection {
        name: &name,
        default: repo.default_connection() == Some(name.as_str()),
        definition,
    };

    let mut out = ctx.renderer(OutputFormat::Text);
    if out.format().is_machine() {
        out.value(&shown)?;
        return Ok(());
    }
    out.line(format!("name: {name}"))?;
    out.line(format!("kind: {kind}"))?;
    out.line(format!("target: {}", definition.target_summary()))?;
    if let Some(ns) = &definition.default_namespace {
        out.line(format!("default-namespace: {ns}"))?;
    }
    if let Some(user) = &definition.user {
        out.line(format!("user: {user}"))?;
    }
    if let Some(timeout) = definition.timeout {
        out.line(format!("timeout: {timeout}"))?;
    }
    if definition.no_verify {
        out.line("verify: false")?;
    }
    out.line(format!("default: {}", shown.default))?;
    Ok(())
}

fn save(ctx: &mut Context, name: &str, set_default: bool) -> Result<()> {
    let Some(definition) = ctx.options().definition_from_flags()? else {
        bail!("Nothing to save: give --server or --mock-server");
    };
    target_spec(&definition)?;
    let mut repo = ctx.options().open_repository()?;
    let replaced = repo.add(name, definition)?;
    if set_default {
        repo.set_default(Some(name))?;
    }
    repo.save()?;
    tracing::info!(name, replaced, path = %repo.path().display(), "connection saved");

    let mut out = ctx.renderer(OutputFormat::Text);
    let verb = if replaced { "Replaced" } else { "Saved" };
    out.success(format!("{verb} connection '{name}' in {}", repo.path().display()))?;
    Ok(())
}

/// NAME, or an interactive choice among the saved connections.
fn choose_name(ctx: &mut Context, repo: &ConnectionRepository, name: Option<String>, verb: &str) -> Result<String> {
    if let Some(name) = name {
        return Ok(name);
    }
    let names: Vec<String> = repo.names().map(str::to_string).collect();
    if names.is_empty() {
        bail!("No connections defined in {}", repo.path().display());
    }
    match ctx.select(&format!("Select a connection to {verb}"), &names) {
        Some(idx) if idx < names.len() => Ok(names[idx].clone()),
        _ => bail!("Connection selection cancelled"),
    }
}

fn delete(ctx: &mut Context, name: Option<String>) -> Result<()> {
    let mut repo = ctx.options().open_repository()?;
    let name = choose_name(ctx, &repo, name, "delete")?;
    repo.delete(&name)?;
    repo.save()?;
    tracing::info!(name = %name, "connection deleted");
    ctx.renderer(OutputFormat::Text)
        .success(format!("Deleted connection '{name}'"))?;
    Ok(())
}

fn select(ctx: &mut Context, name: Option<String>) -> Result<()> {
    let mut repo = ctx.options().open_repository()?;
    let name = choose_name(ctx, &repo, name, "make the default")?;
    repo.set_default(Some(&name))?;
    repo.save()?;
    tracing::info!(name = %name, "default connection selected");
    ctx.renderer(OutputFormat::Text)
        .success(format!("Default connection is now '{name}'"))?;
    Ok(())
}

fn test(ctx: &mut Context) -> Result<()> {
    let Session {
        conn, target, mut out, ..
    } = ctx.session(OutputFormat::Text)?;
    let ns = conn.default_namespace().to_string();
    let classes = conn
        .enumerate_class_names(&ns, None, false)
        .with_context(|| format!("Connection test failed for {target}"))?;
    tracing::debug!(namespace = %ns, classes = classes.len(), "connection test request done");
    out.success(format!("Connection successful: {target} (namespace {ns})"))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cmd::shared::GeneralOptions;
    use crate::cmd::shared::testing::{FixedSelector, SharedBuf};
    use crate::cmd::format::StyleOptions;
    use std::path::Path;

    fn context(file: &Path, opts: GeneralOptions) -> (Context, SharedBuf) {
        let out = SharedBuf::default();
        let opts = GeneralOptions {
            connections_file: Some(file.to_path_buf()),
            output_format: opts.output_format.or(Some(OutputFormat::Text)),
            ..opts
        };
        let ctx = Context::new(opts)
            .with_output(
                Box::new(out.clone()),
                Box::new(SharedBuf::default()),
                StyleOptions::plain(),
            )
            .with_selector(Box::new(FixedSelector(Some(1))));
        (ctx, out)
    }

    fn run(ctx: &mut Context, command: ConnectionCommand) -> Result<()> {
        execute_connection(ConnectionArgs { command }, ctx)
    }

    fn mock_flags() -> GeneralOptions {
        GeneralOptions {
            mock_server: vec![concat!(env!("CARGO_MANIFEST_DIR"), "/mock/simple_repo.yaml").into()],
            ..GeneralOptions::default()
        }
    }

    #[test]
    fn save_list_show_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("conns.yaml");

        let (mut ctx, _) = context(&file, mock_flags());
        run(
            &mut ctx,
            ConnectionCommand::Save {
                connection: "local".into(),
                set_default: true,
            },
        )
        .unwrap();

        let (mut ctx, out) = context(&file, GeneralOptions::default());
        run(&mut ctx, ConnectionCommand::List).unwrap();
        let listing = out.contents();
        assert!(listing.contains("local"));
        assert!(listing.contains("*"));

        run(&mut ctx, ConnectionCommand::Show { connection: None }).unwrap();
        let shown = out.contents();
        assert!(shown.contains("kind: mock"));
        assert!(shown.contains("default: true"));
    }

    #[test]
    fn save_requires_a_target() {
        let dir = tempfile::tempdir().unwrap();
        let (mut ctx, _) = context(&dir.path().join("c.yaml"), GeneralOptions::default());
        let err = run(
            &mut ctx,
            ConnectionCommand::Save {
                connection: "x".into(),
                set_default: false,
            },
        )
        .unwrap_err();
        assert!(err.to_string().contains("Nothing to save"));
    }

    #[test]
    fn select_and_delete_interactively() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("c.yaml");
        for name in ["a", "b"] {
            let (mut ctx, _) = context(&file, mock_flags());
            run(
                &mut ctx,
                ConnectionCommand::Save {
                    connection: name.into(),
                    set_default: false,
                },
            )
            .unwrap();
        }

        let (mut ctx, out) = context(&file, GeneralOptions::default());
        run(&mut ctx, ConnectionCommand::Select { connection: None }).unwrap();
        assert!(out.contents().contains("Default connection is now 'b'"));
        assert_eq!(
            ConnectionRepository::open(&file).unwrap().default_connection(),
            Some("b")
        );

        run(&mut ctx, ConnectionCommand::Delete { connection: Some("b".into()) }).unwrap();
        let repo = ConnectionRepository::open(&file).unwrap();
        assert_eq!(repo.names().collect::<Vec<_>>(), vec!["a"]);
        assert!(repo.default_connection().is_none());
    }

    #[test]
    fn test_connects_through_default() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("c.yaml");
        let (mut ctx, _) = context(&file, mock_flags());
        run(
            &mut ctx,
            ConnectionCommand::Save {
                connection: "m".into(),
                set_default: true,
            },
        )
        .unwrap();

        let (mut ctx, out) = context(&file, GeneralOptions::default());
        run(&mut ctx, ConnectionCommand::Test).unwrap();
        assert!(out.contents().contains("Connection successful"));
    }

    #[test]
    fn show_unknown_name_fails() {
        let dir = tempfile::tempdir().unwrap();
        let (mut ctx, _) = context(&dir.path().join("c.yaml"), GeneralOptions::default());
        assert!(run(&mut ctx, ConnectionCommand::Show { connection: Some("zz".into()) }).is_err());
        assert!(run(&mut ctx, ConnectionCommand::Show { connection: None }).is_err());
    }
}
