//! Subcommand implementations.

use std::collections::BTreeSet;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use itertools::Itertools;
use ripple_graph::{AnalyzeOptions, GraphOptions, analyze};
use ripple_schemas::{
    RippleConfig, load_config, load_dependency_map, load_extra_edges, load_unit_list,
};
use ripple_store::{
    ChangeSet, ChecksumMode, Checksummer, ClasspathResolver, Encoding, PersistOptions,
    PersistedState, compare_state, persist_state, read_state, tracked_resources,
};
use serde::Serialize;
use tracing::{error, info};

/// Inputs of a selection cycle.
pub struct SelectArgs {
    pub artifacts_dir: PathBuf,
    pub checksum_mode: ChecksumMode,
    pub deps: PathBuf,
    pub tests: Vec<String>,
    pub tests_file: Option<PathBuf>,
    pub extra_edges: Option<PathBuf>,
    pub classpath: Vec<PathBuf>,
    pub config: Option<PathBuf>,
    pub encoding: Option<Encoding>,
    pub include_archives: bool,
    pub wildcard_tests: BTreeSet<String>,
    pub exclude_noise: bool,
    pub bypass_hubs: bool,
    pub output: Option<PathBuf>,
}

/// What `select` prints.
#[derive(Debug, Serialize)]
struct Selection {
    /// No previous state was found, so every test is selected.
    first_run: bool,
    /// Tests to run.
    selected: BTreeSet<String>,
    /// Tests that may be skipped.
    skipped: BTreeSet<String>,
    /// Resources whose content changed.
    changed: BTreeSet<String>,
    /// Changed resources that no longer exist.
    deleted: BTreeSet<String>,
}

impl Selection {
    fn new(tests: &BTreeSet<String>, changes: Option<ChangeSet>) -> Self {
        match changes {
            None => Self {
                first_run: true,
                selected: tests.clone(),
                skipped: BTreeSet::new(),
                changed: BTreeSet::new(),
                deleted: BTreeSet::new(),
            },
            Some(changes) => Self {
                first_run: false,
                selected: tests
                    .iter()
                    .filter(|test| !changes.non_affected.contains(*test))
                    .cloned()
                    .collect(),
                skipped: changes.non_affected,
                changed: changes.changed,
                deleted: changes.deleted,
            },
        }
    }
}

/// Opens the output file, or stdout when none was given.
fn open_output(output: Option<&Path>) -> Result<Box<dyn Write>> {
    Ok(match output {
        Some(path) => Box::new(BufWriter::new(
            File::create(path).with_context(|| format!("creating {}", path.display()))?,
        )),
        None => Box::new(std::io::stdout().lock()),
    })
}

/// Compares `state` against current resource contents.
///
/// With `tests`, only the tests the state has recorded can be non-affected;
/// the others are new since the last run and count as affected. Without,
/// the universe is the state's own test table.
///
/// Why: a test the state never saw has no records, so no checksum change
/// can reach it and the plain partition would skip it.
fn compare_tests(
    state: &PersistedState,
    checksum_mode: ChecksumMode,
    tests: Option<&BTreeSet<String>>,
) -> ChangeSet {
    let checksummer = Checksummer::new(checksum_mode);
    let Some(tests) = tests else {
        return compare_state(state, &checksummer, None);
    };
    let (known, unknown): (BTreeSet<String>, BTreeSet<String>) =
        tests.iter().cloned().partition(|test| {
            state.tests.contains(test.as_str())
                || state.wildcard.as_ref().is_some_and(|w| w.contains(test))
        });
    let mut changes = compare_state(state, &checksummer, Some(&known));
    if !unknown.is_empty() {
        info!(tests = unknown.len(), "Selecting tests new since the previous run");
    }
    changes.affected.extend(unknown);
    changes
}

fn write_json(output: Option<&Path>, value: &impl Serialize) -> Result<()> {
    let mut writer = open_output(output)?;
    serde_json::to_writer_pretty(&mut writer, value)?;
    writeln!(writer)?;
    writer.flush()?;
    Ok(())
}

/// Full cycle: detect changes, print the selection, persist the new state.
pub fn select(args: &SelectArgs) -> Result<()> {
    // Configuration problems are fatal and must surface before any state is
    // touched.
    let config = match &args.config {
        Some(path) => load_config(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => RippleConfig::default(),
    };
    let resolver =
        ClasspathResolver::new(args.classpath.iter().cloned(), &config.resource_extension)?;
    let deps = load_dependency_map(&args.deps)
        .with_context(|| format!("loading dependency map {}", args.deps.display()))?;
    let extra_edges = match &args.extra_edges {
        Some(path) => load_extra_edges(path)
            .with_context(|| format!("loading extra edges {}", path.display()))?,
        None => Vec::new(),
    };
    let mut entries = args.tests.clone();
    if let Some(path) = &args.tests_file {
        entries.extend(
            load_unit_list(path).with_context(|| format!("loading tests {}", path.display()))?,
        );
    }
    if entries.is_empty() {
        bail!("no tests given; use --test or --tests-file");
    }
    let tests: BTreeSet<String> = entries.iter().cloned().collect();

    let previous = read_state(&args.artifacts_dir);
    let encoding = args
        .encoding
        .or_else(|| previous.as_ref().map(|state| state.encoding))
        .unwrap_or_default();

    let changes = previous
        .as_ref()
        .map(|state| compare_tests(state, args.checksum_mode, Some(&tests)));
    let selection = Selection::new(&tests, changes);
    info!(
        first_run = selection.first_run,
        selected = selection.selected.len(),
        skipped = selection.skipped.len(),
        "Selected tests"
    );

    let analysis = analyze(
        &deps,
        &extra_edges,
        &entries,
        &config,
        AnalyzeOptions {
            graph: GraphOptions {
                exclude_noise: args.exclude_noise,
                bypass_hubs: args.bypass_hubs,
            },
            compute_unreached: true,
        },
    );

    write_json(args.output.as_deref(), &selection)?;

    let options = PersistOptions {
        encoding,
        include_third_party_archives: args.include_archives,
        wildcard_tests: args.wildcard_tests.clone(),
        checksum_mode: args.checksum_mode,
    };
    if let Err(err) = persist_state(
        &analysis.closures,
        &resolver,
        &args.artifacts_dir,
        analysis.unreached.as_ref(),
        &config,
        &options,
    ) {
        error!(
            %err,
            "Failed to persist state; the next run will compare against the previous one"
        );
    }
    Ok(())
}

/// Detect-only: prints the change set, or `null` without prior state.
pub fn changes(
    artifacts_dir: &Path,
    checksum_mode: ChecksumMode,
    tests: Vec<String>,
    output: Option<&Path>,
) -> Result<()> {
    let universe: Option<BTreeSet<String>> =
        (!tests.is_empty()).then(|| tests.into_iter().collect());
    let changes = read_state(artifacts_dir)
        .map(|state| compare_tests(&state, checksum_mode, universe.as_ref()));
    write_json(output, &changes)
}

/// Prints every tracked resource id, one per line.
pub fn tracked(artifacts_dir: &Path) -> Result<()> {
    let mut out = std::io::stdout().lock();
    for resource in tracked_resources(artifacts_dir) {
        writeln!(out, "{resource}")?;
    }
    Ok(())
}

/// Prints the overlap ranking for `target`.
pub fn bridges(artifacts_dir: &Path, target: &str, limit: usize) -> Result<()> {
    let Some(state) = read_state(artifacts_dir) else {
        bail!("no persisted state in {}", artifacts_dir.display());
    };
    let Some(report) = ripple_store::bridges(&state, target, limit) else {
        bail!("no tracked resource matches {target}");
    };

    let mut out = std::io::stdout().lock();
    writeln!(out, "{} ({} tests)", report.target, report.target_tests)?;
    writeln!(out)?;
    writeln!(out, "{:>8} {:>8} {:>6}  resource", "overlap", "jaccard", "tests")?;
    for row in &report.rows {
        writeln!(
            out,
            "{:>8} {:>8.3} {:>6}  {}",
            row.overlap, row.jaccard, row.tests, row.resource
        )?;
    }
    if !report.packages.is_empty() {
        writeln!(out)?;
        let width = report.packages.iter().map(|(p, _)| p.len()).max().unwrap_or(0);
        writeln!(
            out,
            "{}",
            report
                .packages
                .iter()
                .map(|(package, overlap)| format!("{package:<width$} {overlap:>8}"))
                .join("\n")
        )?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::fs;

    use serde_json::Value;
    use tempfile::TempDir;

    use super::*;

    fn names(items: &[&str]) -> BTreeSet<String> {
        items.iter().map(|s| (*s).to_string()).collect()
    }

    /// A build with `app.T1` and `app.T3`, both depending on `app.A`.
    struct Build {
        root: TempDir,
    }

    impl Build {
        fn new() -> Self {
            let root = tempfile::tempdir().expect("temp dir");
            let classes = root.path().join("classes/app");
            fs::create_dir_all(&classes).unwrap();
            for unit in ["T1", "T3", "A"] {
                fs::write(classes.join(format!("{unit}.class")), unit).unwrap();
            }
            fs::write(
                root.path().join("deps.json"),
                r#"{"app.T1": ["app.A"], "app.T3": ["app.A"]}"#,
            )
            .unwrap();
            Self { root }
        }

        fn path(&self, name: &str) -> PathBuf {
            self.root.path().join(name)
        }

        fn args(&self, tests: &[&str]) -> SelectArgs {
            SelectArgs {
                artifacts_dir: self.path("ripple"),
                checksum_mode: ChecksumMode::Raw,
                deps: self.path("deps.json"),
                tests: tests.iter().map(|t| (*t).to_string()).collect(),
                tests_file: None,
                extra_edges: None,
                classpath: vec![self.path("classes")],
                config: None,
                encoding: None,
                include_archives: false,
                wildcard_tests: BTreeSet::new(),
                exclude_noise: true,
                bypass_hubs: true,
                output: Some(self.path("selection.json")),
            }
        }

        /// Runs `select` and returns its printed selection.
        fn select(&self, tests: &[&str]) -> Value {
            select(&self.args(tests)).expect("select succeeds");
            let text = fs::read_to_string(self.path("selection.json")).unwrap();
            serde_json::from_str(&text).unwrap()
        }
    }

    fn listed(value: &Value, key: &str) -> BTreeSet<String> {
        value[key]
            .as_array()
            .expect("array")
            .iter()
            .map(|v| v.as_str().expect("string").to_string())
            .collect()
    }

    #[test]
    fn first_run_selects_everything() {
        let selection = Selection::new(&names(&["T1", "T2"]), None);

        assert!(selection.first_run);
        assert_eq!(selection.selected, names(&["T1", "T2"]));
        assert!(selection.skipped.is_empty());
    }

    /// A test added since the previous run is selected even when nothing
    /// changed.
    ///
    /// Why: the previous state holds no records for it, so checksums alone
    /// would never select it.
    #[test]
    fn new_test_is_selected_on_the_next_run() {
        let build = Build::new();

        let first = build.select(&["app.T1"]);
        assert_eq!(first["first_run"], Value::Bool(true));
        assert_eq!(listed(&first, "selected"), names(&["app.T1"]));

        let second = build.select(&["app.T1", "app.T3"]);
        assert_eq!(second["first_run"], Value::Bool(false));
        assert_eq!(listed(&second, "selected"), names(&["app.T3"]));
        assert_eq!(listed(&second, "skipped"), names(&["app.T1"]));

        // T3 is recorded now, so an unchanged third run skips both.
        let third = build.select(&["app.T1", "app.T3"]);
        assert!(listed(&third, "selected").is_empty());
        assert_eq!(listed(&third, "skipped"), names(&["app.T1", "app.T3"]));
    }

    /// A changed dependency selects every recorded test that reaches it.
    #[test]
    fn changed_dependency_is_selected() {
        let build = Build::new();
        build.select(&["app.T1", "app.T3"]);
        fs::write(build.path("classes/app/A.class"), "A edited").unwrap();

        let selection = build.select(&["app.T1", "app.T3"]);

        assert_eq!(listed(&selection, "selected"), names(&["app.T1", "app.T3"]));
        assert!(listed(&selection, "skipped").is_empty());
        assert_eq!(listed(&selection, "changed").len(), 1);
    }

    /// With an explicit test list, `changes` reports unrecorded tests as
    /// affected.
    #[test]
    fn changes_counts_unrecorded_tests_as_affected() {
        let build = Build::new();
        build.select(&["app.T1"]);
        let state = read_state(&build.path("ripple")).expect("state written");

        let explicit = compare_tests(
            &state,
            ChecksumMode::Raw,
            Some(&names(&["app.T1", "app.T3"])),
        );
        assert_eq!(explicit.affected, names(&["app.T3"]));
        assert_eq!(explicit.non_affected, names(&["app.T1"]));

        let stored = compare_tests(&state, ChecksumMode::Raw, None);
        assert!(stored.affected.is_empty());
        assert_eq!(stored.non_affected, names(&["app.T1"]));
    }
}
