/*!
`qualifier.rs`

Implements `wbemcli qualifier <enumerate|get>` for qualifier declarations.
Both run in every requested namespace like the class commands.
*/

use anyhow::Result;
use clap::{Args, Subcommand};

use crate::cim::WbemConnection;
use crate::cmd::format::{CimObjects, OutputFormat};
use crate::cmd::shared::{Context, Session, in_namespaces, target_namespaces};

#[derive(Args, Debug)]
pub struct QualifierArgs {
    #[command(subcommand)]
    pub command: QualifierCommand,
}

#[derive(Subcommand, Debug)]
pub enum QualifierCommand {
    /// List qualifier declarations
    Enumerate {
        #[arg(long)]
        summary: bool,

        #[arg(short = 'n', long = "namespace", value_name = "NS")]
        namespace: Vec<String>,
    },
    /// Show one qualifier declaration
    Get {
        qualifiername: String,

        #[arg(short = 'n', long = "namespace", value_name = "NS")]
        namespace: Vec<String>,
    },
}

pub fn execute_qualifier(args: QualifierArgs, ctx: &mut Context) -> Result<()> {
    let Session { conn, mut out, .. } = ctx.session(OutputFormat::Mof)?;
    let conn: &dyn WbemConnection = conn;
    match args.command {
        QualifierCommand::Enumerate { summary, namespace } => {
            let namespaces = target_namespaces(conn, &namespace, false)?;
            in_namespaces(&mut out, namespaces, "qualifier", "*", |ns| {
                let mut decls = conn.enumerate_qualifiers(ns)?;
                decls.sort_by_key(|d| d.name.to_ascii_lowercase());
                Ok(CimObjects::Qualifiers(decls).summarized(summary))
            })
        }
        QualifierCommand::Get {
            qualifiername,
            namespace,
        } => {
            let namespaces = target_namespaces(conn, &namespace, false)?;
            in_namespaces(&mut out, namespaces, "qualifier", &qualifiername, |ns| {
                Ok(CimObjects::Qualifiers(vec![
                    conn.get_qualifier(ns, &qualifiername)?,
                ]))
            })
        }
    }
}
