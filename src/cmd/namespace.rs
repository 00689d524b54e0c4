//! `wbemcli namespace <list|interop>`

use anyhow::{Context as _, Result};
use clap::{Args, Subcommand};

use crate::cmd::format::OutputFormat;
use crate::cmd::shared::{Context, Session};

#[derive(Args, Debug)]
pub struct NamespaceArgs {
    #[command(subcommand)]
    pub command: NamespaceCommand,
}

#[derive(Subcommand, Debug)]
pub enum NamespaceCommand {
    /// List the namespaces of the server
    List {
        #[arg(long)]
        summary: bool,
    },
    /// Show the interop namespace
    Interop,
}

pub fn execute_namespace(args: NamespaceArgs, ctx: &mut Context) -> Result<()> {
    let Session { conn, mut out, .. } = ctx.session(OutputFormat::Text)?;
    match args.command {
        NamespaceCommand::List { summary } => {
            let mut names = conn
                .enumerate_namespaces()
                .context("Failed to enumerate namespaces")?;
            names.sort_by_key(|n| n.to_ascii_lowercase());
            if summary {
                out.line(format!("{} namespace(s) returned", names.len()))?;
            } else if out.format().is_machine() {
                out.value(&names)?;
            } else if matches!(out.format(), OutputFormat::Table) {
                let rows: Vec<Vec<String>> = names.into_iter().map(|n| vec![n]).collect();
                out.table(&["Namespace"], &rows)?;
            } else {
                for name in names {
                    out.line(name)?;
                }
            }
        }
        NamespaceCommand::Interop => {
            let interop = conn
                .interop_namespace()
                .context("Failed to determine the interop namespace")?;
            if out.format().is_machine() {
                out.value(&interop)?;
            } else {
                out.line(interop)?;
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cmd::shared::testing::mock_context;

    fn run(format: OutputFormat, command: NamespaceCommand) -> (Result<()>, String) {
        let (mut ctx, out, _) = mock_context(format);
        let result = execute_namespace(NamespaceArgs { command }, &mut ctx);
        (result, out.contents())
    }

    #[test]
    fn list_sorted() {
        let (r, out) = run(OutputFormat::Text, NamespaceCommand::List { summary: false });
        r.unwrap();
        assert_eq!(out, "interop\nroot/cimv2\n");
    }

    #[test]
    fn list_json_and_summary() {
        let (r, out) = run(OutputFormat::Json, NamespaceCommand::List { summary: false });
        r.unwrap();
        let parsed: Vec<String> = serde_json::from_str(&out).unwrap();
        assert_eq!(parsed, vec!["interop", "root/cimv2"]);

        let (r, out) = run(OutputFormat::Text, NamespaceCommand::List { summary: true });
        r.unwrap();
        assert_eq!(out, "2 namespace(s) returned\n");
    }

    #[test]
    fn interop_namespace() {
        let (r, out) = run(OutputFormat::Text, NamespaceCommand::Interop);
        r.unwrap();
        assert_eq!(out, "interop\n");
    }
}
