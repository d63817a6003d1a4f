use std::path::{Path, PathBuf};

use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::Shell;

use crate::{
    cache_dir::CacheDir,
    error::Result,
    store::{CacheStore, DirStore, MemoryStore, RedbStore},
};

#[derive(Debug, Parser)]
#[command(
    name = "fewshot",
    about = "Pick the most similar few-shot exemplars for a question"
)]
pub struct Cli {
    /// Override the XDG cache directory
    #[arg(long, global = true)]
    pub cache_dir: Option<PathBuf>,

    /// JSON file with the exemplar corpus (defaults to the built-in set)
    #[arg(long, global = true)]
    pub corpus: Option<PathBuf>,

    /// Cache backend
    #[arg(long, value_enum, default_value_t = StoreKind::Dir, global = true)]
    pub store: StoreKind,

    /// Increase log verbosity (can be repeated: -v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Only log warnings and errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum StoreKind {
    /// Three files in the cache directory
    Dir,
    /// A single redb database in the cache directory
    Redb,
}

impl StoreKind {
    /// Open this backend in the resolved cache directory.
    ///
    /// If the directory cannot be resolved or created, or the database
    /// cannot be opened, a warning is logged and a read-only in-memory
    /// store is returned instead. Commands then answer from a fresh build
    /// that is reported as not persisted.
    pub fn open(self, explicit: Option<&Path>) -> Box<dyn CacheStore> {
        match self.try_open(explicit) {
            Ok(store) => store,
            Err(e) => {
                tracing::warn!(
                    "cache unavailable, continuing without persistence: {e}"
                );
                Box::new(MemoryStore::read_only())
            }
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            StoreKind::Dir => "dir",
            StoreKind::Redb => "redb",
        }
    }

    fn try_open(self, explicit: Option<&Path>) -> Result<Box<dyn CacheStore>> {
        let cache_dir = CacheDir::resolve(explicit)?;
        let store: Box<dyn CacheStore> = match self {
            StoreKind::Dir => Box::new(DirStore::new(cache_dir.root())),
            StoreKind::Redb => {
                Box::new(RedbStore::open(&cache_dir.redb_path())?)
            }
        };
        Ok(store)
    }
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Retrieve the exemplars most similar to a question
    Retrieve(RetrieveArgs),
    /// List the exemplars in the corpus
    Corpus(CorpusArgs),
    /// Print the corpus fingerprint
    Fingerprint,
    /// Show cache location and freshness
    Status(StatusArgs),
    /// Rebuild the vector cache even if it is fresh
    Rebuild,
    /// Start MCP server for AI agent integration
    Mcp,
    /// Generate shell completions
    #[command(hide = true)]
    Completions(CompletionsArgs),
}

// -- Retrieve --

#[derive(Debug, Parser)]
pub struct RetrieveArgs {
    /// The question to find exemplars for
    pub query: String,

    /// Number of exemplars to return
    #[arg(short = 'k', long, default_value = "3")]
    pub count: usize,

    /// Output results as JSON
    #[arg(long)]
    pub json: bool,
}

// -- Corpus --

#[derive(Debug, Parser)]
pub struct CorpusArgs {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

// -- Status --

#[derive(Debug, Parser)]
pub struct StatusArgs {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

// -- Completions --

#[derive(Debug, Parser)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    #[arg(value_enum)]
    pub shell: Shell,
}

impl CompletionsArgs {
    /// Generate shell completions and print to stdout.
    pub fn generate(&self) {
        let mut cmd = Cli::command();
        clap_complete::generate(
            self.shell,
            &mut cmd,
            "fewshot",
            &mut std::io::stdout(),
        );
    }
}
