use clap::Parser;

mod cim;
mod cmd;
mod connections;
mod engine;
mod indication;
mod utils;

use cmd::{Commands, Context, GeneralOptions, InvalidTarget};

/// wbemcli - command line client for WBEM/CIM servers
///
/// Command groups:
///   wbemcli class        <enumerate|get|find|references|associators|tree>
///   wbemcli instance     <enumerate|get|create|delete|references|associators|count>
///   wbemcli qualifier    <enumerate|get>
///   wbemcli namespace    <list|interop>
///   wbemcli subscription <add-*|list*|remove-*>
///   wbemcli connection   <list|show|save|delete|select|test>
///   wbemcli repl
///
/// Global flags / env:
///   -v / -vv          Increase verbosity (RUST_LOG overrides)
///   -q / --quiet      Errors only
///   -s / --server     WBEM server URL (or WBEMCLI_SERVER)
///   -m / --mock-server FILE  Mock repository file(s) (or WBEMCLI_MOCK_SERVER)
///   --name NAME       Saved connection (or WBEMCLI_NAME)
///   -o / --output-format  mof|table|text|json|yaml
///
/// Per-namespace commands accept -n/--namespace (repeatable or comma
/// separated). Namespaces failing with NotFound, InvalidClass,
/// InvalidNamespace or InvalidParameter are reported after the successful
/// ones; the command fails only when no namespace succeeded.
///
/// Examples:
///   wbemcli -m mock/simple_repo.yaml class enumerate --di --no
///   wbemcli -m mock/simple_repo.yaml class get CIM_Foo -n root/cimv2,interop
///   wbemcli -m mock/simple_repo.yaml instance count 'tst_*'
///   wbemcli -m mock/simple_repo.yaml subscription add-destination odest -l http://localhost:5000
///   wbemcli -m mock/simple_repo.yaml connection save local --set-default
#[derive(Parser, Debug)]
#[command(
    name = "wbemcli",
    version,
    about = "wbemcli - command line client for WBEM/CIM servers",
    propagate_version = true,
    disable_help_subcommand = true
)]
pub struct Cli {
    /// Increase verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Silence all non-error output
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(flatten)]
    general: GeneralOptions,

    #[command(subcommand)]
    command: Commands,
}

fn main() {
    let cli = Cli::parse();

    let level = utils::derive_level(cli.verbose, cli.quiet);
    utils::init_logging(level);

    let mut general = cli.general;
    general.apply_env();

    let mut ctx = Context::new(general);
    if let Err(e) = cmd::execute(cli.command, &mut ctx) {
        eprintln!("Error: {e:#}");
        let code = if e.downcast_ref::<InvalidTarget>().is_some() {
            2
        } else {
            1
        };
        std::process::exit(code);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn global_options_after_subcommand() {
        let cli = Cli::try_parse_from([
            "wbemcli",
            "class",
            "get",
            "CIM_Foo",
            "-m",
            "mock/simple_repo.yaml",
            "-o",
            "json",
            "-vv",
        ])
        .unwrap();
        assert_eq!(cli.verbose, 2);
        assert_eq!(cli.general.mock_server, vec!["mock/simple_repo.yaml"]);
        assert!(matches!(cli.command, Commands::Class(_)));
    }
}
