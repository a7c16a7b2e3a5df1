use clap::{Parser, Subcommand};

pub mod errors;
mod handlers;

pub use handlers::*;

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Embed new and changed notes, drop vectors of deleted ones
    Embed {},

    /// Print the domain classification of a note
    Classify {
        /// Note id or vault-relative path
        note: String,
    },

    /// Find cross-domain connections for one note
    Discover {
        /// Note id or vault-relative path
        note: String,

        /// Ask the language model to explain each connection
        #[clap(long, default_value = "false")]
        explain: bool,

        /// Ignore and do not update cached results
        #[clap(long, default_value = "false")]
        no_cache: bool,
    },

    /// Best connections across a sample of the whole vault
    Top {
        /// Number of connections to print
        #[clap(short, long, default_value = "10")]
        limit: usize,

        #[clap(long, default_value = "false")]
        explain: bool,

        #[clap(long, default_value = "false")]
        no_cache: bool,

        /// Seed the source sampling. Seeded runs bypass the cache.
        #[clap(long)]
        seed: Option<u64>,
    },

    /// Let the language model judge sampled cross-domain pairs
    Deep {
        /// Seed the pair sampling. Seeded runs bypass the cache.
        #[clap(long)]
        seed: Option<u64>,

        #[clap(long, default_value = "false")]
        no_cache: bool,
    },

    /// Manage cached results
    Cache {
        #[clap(subcommand)]
        action: CacheArgs,
    },
}

impl Command {
    pub fn name(&self) -> &'static str {
        match self {
            Command::Embed {} => "embed",
            Command::Classify { .. } => "classify",
            Command::Discover { .. } => "discover",
            Command::Top { .. } => "top",
            Command::Deep { .. } => "deep",
            Command::Cache { .. } => "cache",
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum CacheArgs {
    /// Remove every cached result
    Clear {
        /// Skip confirmation
        #[clap(short, long, default_value = "false")]
        yes: bool,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_top() {
        let args =
            Args::try_parse_from(["serendip", "top", "--limit", "5", "--seed", "42"]).unwrap();
        match args.command {
            Command::Top {
                limit,
                seed,
                explain,
                no_cache,
            } => {
                assert_eq!(limit, 5);
                assert_eq!(seed, Some(42));
                assert!(!explain);
                assert!(!no_cache);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_parse_discover_flags() {
        let args =
            Args::try_parse_from(["serendip", "discover", "notes/a.md", "--explain", "--no-cache"])
                .unwrap();
        assert!(matches!(
            args.command,
            Command::Discover { ref note, explain: true, no_cache: true } if note == "notes/a.md"
        ));
    }

    #[test]
    fn test_parse_cache_clear() {
        let args = Args::try_parse_from(["serendip", "cache", "clear", "-y"]).unwrap();
        assert!(matches!(
            args.command,
            Command::Cache {
                action: CacheArgs::Clear { yes: true }
            }
        ));
    }
}
