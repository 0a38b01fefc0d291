use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "mhashdb", version, about = "Multi-attribute linear-hashed relation store")]
pub struct Cli {
    #[command(subcommand)]
    pub cmd: Cmd,
}

#[derive(Subcommand, Debug)]
pub enum Cmd {
    /// Create a new relation (newRelation).
    Create {
        #[arg(long)]
        rel: PathBuf,
        #[arg(long)]
        nattrs: u32,
        #[arg(long)]
        pages: u32,
        #[arg(long)]
        depth: u32,
        /// Choice vector as `att:bit,att:bit,...`; may be shorter than
        /// MAXCHVEC, the remainder is filled by round-robin.
        #[arg(long = "chvec", default_value = "")]
        chvec: String,
    },

    /// Insert NL-terminated tuples read from stdin (addToRelation).
    Insert {
        #[arg(long)]
        rel: PathBuf,
    },

    /// Partial-match query: `mhashdb query [-v] <proj-list> from <rel> where <query-tuple>`.
    ///
    /// Parsed by hand rather than through clap's derive macros: the
    /// `from`/`where` keyword grammar is the contract external scripts
    /// already depend on, not a flag set.
    #[command(trailing_var_arg = true)]
    Query {
        #[arg(allow_hyphen_values = true)]
        args: Vec<String>,
    },

    /// Print relationStats.
    Stats {
        #[arg(long)]
        rel: PathBuf,
    },
}
