/*!
Ownership selectors for the subscription commands.

  Ownership  : --type owned|permanent|all (listings)
  OwnedFlags : --owned / --permanent (add commands; owned by default)
*/

use clap::Args;
use std::fmt;

#[derive(clap::ValueEnum, Clone, Copy, Debug, Default, Eq, PartialEq, Hash)]
pub enum Ownership {
    /// Objects created by this subscription manager
    Owned,
    /// Objects not following the owned naming pattern
    Permanent,
    #[default]
    All,
}

impl Ownership {
    /// Whether an object with the given ownership is selected.
    pub fn includes(&self, owned: bool) -> bool {
        match self {
            Ownership::Owned => owned,
            Ownership::Permanent => !owned,
            Ownership::All => true,
        }
    }

    pub fn label(owned: bool) -> &'static str {
        if owned { "owned" } else { "permanent" }
    }
}

impl fmt::Display for Ownership {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Ownership::Owned => "owned",
            Ownership::Permanent => "permanent",
            Ownership::All => "all",
        };
        f.write_str(s)
    }
}

#[derive(Args, Debug, Clone, Copy, Default)]
pub struct OwnedFlags {
    /// Create an owned object, named after the subscription manager (default)
    #[arg(long, conflicts_with = "permanent")]
    pub owned: bool,

    /// Create a permanent object with exactly the given name
    #[arg(long)]
    pub permanent: bool,
}

impl OwnedFlags {
    pub fn is_owned(&self) -> bool {
        !self.permanent
    }
}
