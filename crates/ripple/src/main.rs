mod commands;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Args, Parser, Subcommand, ValueEnum};
use clap_verbosity_flag::{InfoLevel, Verbosity};
use itertools::Itertools;
use mimalloc::MiMalloc;
use ripple_store::{ChecksumMode, Encoding};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::format::FmtSpan;

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

/// Crates to include in the logging allowlist.
const CRATES: &[&str] = &["ripple", "ripple_graph", "ripple_schemas", "ripple_store"];

const DEFAULT_ARTIFACTS_DIR: &str = "target/ripple";

/// Select the tests affected by a change to compiled build output.
///
/// Builds per-test dependency closures from an extractor's dependency map,
/// records a checksum of every dependency, and on the next run reports which
/// tests reach a dependency whose checksum changed.
#[derive(Parser)]
#[command(author, version, about)]
struct Cli {
    #[command(flatten)]
    verbose: Verbosity<InfoLevel>,

    #[command(subcommand)]
    command: Commands,
}

/// Options of the commands that compare checksums.
#[derive(Args)]
struct StoreArgs {
    /// Directory holding the persisted state file
    #[arg(long, default_value = DEFAULT_ARTIFACTS_DIR)]
    artifacts_dir: PathBuf,

    /// Ignore trailing whitespace and line endings in text resources
    ///
    /// Binary resources such as `.class` files are always hashed as stored,
    /// so this only has an effect when the tracked resources are text.
    #[arg(long)]
    clean_checksums: bool,
}

impl StoreArgs {
    fn checksum_mode(&self) -> ChecksumMode {
        if self.clean_checksums {
            ChecksumMode::Normalized
        } else {
            ChecksumMode::Raw
        }
    }
}

/// Persisted state encoding.
#[derive(Clone, Copy, ValueEnum)]
enum Format {
    /// Test names on every record
    PlainText,
    /// Test table once, indices on records
    Indexed,
}

impl From<Format> for Encoding {
    fn from(format: Format) -> Self {
        match format {
            Format::PlainText => Encoding::PlainText,
            Format::Indexed => Encoding::Indexed,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Run a full selection cycle
    ///
    /// Analyzes the dependency map, compares checksums against the previous
    /// run, prints the tests to run as JSON, then records the new state.
    Select {
        #[command(flatten)]
        store: StoreArgs,

        /// Dependency map JSON: {"unit": ["dependency", ...], ...}
        #[arg(long)]
        deps: PathBuf,

        /// Test unit to analyze (repeatable)
        #[arg(long = "test")]
        tests: Vec<String>,

        /// File listing test units, one per line
        #[arg(long)]
        tests_file: Option<PathBuf>,

        /// File of extra `source target` edges, one per line
        #[arg(long)]
        extra_edges: Option<PathBuf>,

        /// Classpath directories used to resolve units to files
        #[arg(long, value_delimiter = ':', required = true)]
        classpath: Vec<PathBuf>,

        /// Configuration JSON (defaults are built in)
        #[arg(long)]
        config: Option<PathBuf>,

        /// Encoding of the written state (defaults to the previous one)
        #[arg(long, value_enum)]
        format: Option<Format>,

        /// Also track units resolved inside packaged archives
        #[arg(long)]
        include_archives: bool,

        /// Test that depends on everything (repeatable)
        #[arg(long = "wildcard-test")]
        wildcard_tests: Vec<String>,

        /// Keep noise units in the graph
        #[arg(long)]
        no_noise_filter: bool,

        /// Keep hub units in the graph
        #[arg(long)]
        no_hub_bypass: bool,

        /// Output file path (writes to stdout if not specified)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Compare checksums against the previous run without writing state
    ///
    /// Prints the change set as JSON, or `null` when there is no previous
    /// state.
    Changes {
        #[command(flatten)]
        store: StoreArgs,

        /// Test universe member (repeatable; defaults to the stored tests)
        ///
        /// Tests the previous run did not record are reported as affected.
        #[arg(long = "test")]
        tests: Vec<String>,

        /// Output file path (writes to stdout if not specified)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// List the resources tracked by the persisted state
    Tracked {
        /// Directory holding the persisted state file
        #[arg(long, default_value = DEFAULT_ARTIFACTS_DIR)]
        artifacts_dir: PathBuf,
    },

    /// Rank tracked resources by how many tests they share with a target
    Bridges {
        /// Directory holding the persisted state file
        #[arg(long, default_value = DEFAULT_ARTIFACTS_DIR)]
        artifacts_dir: PathBuf,

        /// Resource id, or a path suffix such as `com/acme/Widget.class`
        target: String,

        /// Number of rows to show
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize structured logging. Output goes to stderr so JSON output
    // on stdout remains clean for piping. Default to warn, allowlist our crates.
    let level = cli.verbose.tracing_level_filter();
    let allowlist = CRATES.iter().map(|c| format!("{c}={level}")).join(",");
    let filter = EnvFilter::new(format!("warn,{allowlist}"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_span_events(FmtSpan::CLOSE)
        .init();

    match cli.command {
        Commands::Select {
            store,
            deps,
            tests,
            tests_file,
            extra_edges,
            classpath,
            config,
            format,
            include_archives,
            wildcard_tests,
            no_noise_filter,
            no_hub_bypass,
            output,
        } => commands::select(&commands::SelectArgs {
            artifacts_dir: store.artifacts_dir.clone(),
            checksum_mode: store.checksum_mode(),
            deps,
            tests,
            tests_file,
            extra_edges,
            classpath,
            config,
            encoding: format.map(Encoding::from),
            include_archives,
            wildcard_tests: wildcard_tests.into_iter().collect(),
            exclude_noise: !no_noise_filter,
            bypass_hubs: !no_hub_bypass,
            output,
        }),
        Commands::Changes {
            store,
            tests,
            output,
        } => commands::changes(
            &store.artifacts_dir,
            store.checksum_mode(),
            tests,
            output.as_deref(),
        ),
        Commands::Tracked { artifacts_dir } => commands::tracked(&artifacts_dir),
        Commands::Bridges {
            artifacts_dir,
            target,
            limit,
        } => commands::bridges(&artifacts_dir, &target, limit),
    }
}
