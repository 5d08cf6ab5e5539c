//! CLI argument definitions for the load generator.

use clap::Args;

/// Arguments for `cdc-demo populate`.
///
/// Connection settings are not flags; they come from the environment
/// (see [`crate::DbConfig::from_env`]).
#[derive(Args, Clone, Debug, Default)]
pub struct PopulateArgs {
    /// Bulk insert N rows per table and exit (continuous simulation when omitted)
    #[arg(long, value_name = "N")]
    pub bulk: Option<usize>,
}

/// Which entry mode the generator runs in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    /// One-shot population of `count` rows per table.
    Bulk { count: usize },
    /// Infinite randomized-operation loop.
    Continuous,
}

impl PopulateArgs {
    /// Resolve the entry mode selected by the arguments.
    pub fn mode(&self) -> RunMode {
        match self.bulk {
            Some(count) => RunMode::Bulk { count },
            None => RunMode::Continuous,
        }
    }
}
