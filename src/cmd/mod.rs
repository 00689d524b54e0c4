/*!
Command layer: one module per command group plus shared helpers.

  src/cmd/
    mod.rs          (this file: `Commands` and the dispatcher)
    shared.rs       (global options, target resolution, `Context`, helpers)
    format.rs       (output formats and the console renderer)
    ownership.rs    (owned / permanent selectors)
    class.rs        instance.rs   qualifier.rs   namespace.rs
    subscription.rs connection.rs repl.rs

Conventions:
  - Each group module exposes one public `execute_*` function taking its
    `clap::Args` struct and the `Context`, returning `anyhow::Result<()>`.
  - Commands that run per namespace go through `shared::in_namespaces`.
*/

use anyhow::Result;
use clap::Subcommand;

pub mod class;
pub mod connection;
pub mod format;
pub mod instance;
pub mod namespace;
pub mod ownership;
pub mod qualifier;
pub mod repl;
pub mod shared;
pub mod subscription;

pub use class::{ClassArgs, execute_class};
pub use connection::{ConnectionArgs, execute_connection};
pub use instance::{InstanceArgs, execute_instance};
pub use namespace::{NamespaceArgs, execute_namespace};
pub use qualifier::{QualifierArgs, execute_qualifier};
pub use repl::execute_repl;
pub use shared::{Context, GeneralOptions, InvalidTarget};
pub use subscription::{SubscriptionArgs, execute_subscription};

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Classes: enumerate, get, find, references, associators, tree
    Class(ClassArgs),

    /// Instances: enumerate, get, create, delete, references, associators, count
    Instance(InstanceArgs),

    /// Qualifier declarations
    Qualifier(QualifierArgs),

    /// Namespaces of the server
    Namespace(NamespaceArgs),

    /// Indication destinations, filters and subscriptions
    Subscription(SubscriptionArgs),

    /// Saved connection definitions
    Connection(ConnectionArgs),

    /// Interactive shell reusing one connection
    Repl,
}

pub fn execute(command: Commands, ctx: &mut Context) -> Result<()> {
    match command {
        Commands::Class(args) => execute_class(args, ctx),
        Commands::Instance(args) => execute_instance(args, ctx),
        Commands::Qualifier(args) => execute_qualifier(args, ctx),
        Commands::Namespace(args) => execute_namespace(args, ctx),
        Commands::Subscription(args) => execute_subscription(args, ctx),
        Commands::Connection(args) => execute_connection(args, ctx),
        Commands::Repl => execute_repl(ctx),
    }
}
