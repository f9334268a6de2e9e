use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use chrono::Utc;
use clap::{Parser, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};
use readalong::{
    aggregate_reports, compute_unit_report, AlignmentCase, MappingConfig, Meta, OffsetCorrection,
    PhonemeAlignerBuilder, Report, SyncConfig, REPORT_SCHEMA_VERSION,
};
use tracing_subscriber::EnvFilter;

#[path = "sync_report/json_report_formatter.rs"]
mod json_report_formatter;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OffsetMode {
    Detect,
    Fixed,
    Disabled,
}

#[derive(Debug, Parser)]
#[command(name = "sync_report")]
#[command(about = "Align recorded engine outputs and report word-timing quality")]
struct Args {
    #[arg(
        long,
        env = "READALONG_REPORT_CASES_DIR",
        default_value = "test-data/alignments"
    )]
    cases_dir: PathBuf,
    #[arg(long, env = "READALONG_REPORT_OUT")]
    out: Option<PathBuf>,
    /// Sync configuration JSON; mapping and epsilon are taken from it.
    #[arg(long, env = "READALONG_CONFIG")]
    config: Option<PathBuf>,
    #[arg(long, env = "READALONG_REPORT_LIMIT")]
    limit: Option<usize>,
    #[arg(long, env = "READALONG_REPORT_OFFSET", default_value_t = 0)]
    offset: usize,
    #[arg(long, env = "READALONG_REPORT_OFFSET_MODE", value_enum)]
    offset_mode: Option<OffsetMode>,
    #[arg(long, env = "READALONG_REPORT_OFFSET_CHARS", default_value_t = 0)]
    offset_chars: usize,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    if let Err(err) = run() {
        eprintln!("{err}");
        std::process::exit(1);
    }
}

fn run() -> Result<(), String> {
    let args = Args::parse();
    let repo_root = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    let cases_dir = resolve_path(&repo_root, &args.cases_dir);
    let out_path = resolve_out_path(&repo_root, args.out.as_ref());

    let mut config = match &args.config {
        Some(path) => SyncConfig::load(&resolve_path(&repo_root, path))
            .map_err(|err| format!("Failed to load sync config: {err}"))?,
        None => SyncConfig::default(),
    };
    if let Some(mode) = args.offset_mode {
        config.mapping = MappingConfig {
            offset_correction: match mode {
                OffsetMode::Detect => OffsetCorrection::Detect,
                OffsetMode::Fixed => OffsetCorrection::Fixed(args.offset_chars),
                OffsetMode::Disabled => OffsetCorrection::Disabled,
            },
        };
    }

    let cases: Vec<AlignmentCase> = load_cases(&cases_dir)?
        .into_iter()
        .skip(args.offset)
        .take(args.limit.unwrap_or(usize::MAX))
        .collect();
    if cases.is_empty() {
        return Err(format!(
            "No alignment cases selected from '{}'.",
            cases_dir.display()
        ));
    }

    let aligner = PhonemeAlignerBuilder::from_config(&config).build();
    let epsilon = config.duration_epsilon_secs;

    let progress = ProgressBar::new(cases.len() as u64);
    progress.set_style(
        ProgressStyle::with_template(
            "[{elapsed_precise}] [{wide_bar:.cyan/blue}] {pos}/{len} ({eta}) {msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("=>-"),
    );
    progress.set_message("starting...");

    let started = Instant::now();
    let mut units = Vec::with_capacity(cases.len());
    let mut failures = 0usize;
    for case in &cases {
        progress.set_message(case.id.clone());
        match aligner.align(&case.to_input()) {
            Ok(alignment) => units.push(compute_unit_report(
                &case.id,
                &alignment,
                case.expected_words.as_deref(),
                case.word_positions.as_deref(),
                epsilon,
            )),
            Err(err) => {
                failures += 1;
                progress.println(format!("{}: align() failed: {err}", case.id));
            }
        }
        progress.inc(1);
    }
    progress.finish_with_message("alignment pass complete");
    println!(
        "aligned {} case(s) in {:.2}ms ({} failed)",
        units.len(),
        started.elapsed().as_secs_f64() * 1000.0,
        failures
    );

    let aggregates = aggregate_reports(&units, epsilon);
    let report = Report {
        schema_version: REPORT_SCHEMA_VERSION,
        meta: Meta {
            generated_at: Utc::now().to_rfc3339(),
            offset_correction: format!("{:?}", config.mapping.offset_correction),
            case_count: units.len(),
        },
        units,
        aggregates,
    };

    json_report_formatter::write_report(&out_path, &report)?;
    println!("{}", json_report_formatter::summary_line(&report));
    println!("{}", out_path.display());
    Ok(())
}

fn load_cases(dir: &Path) -> Result<Vec<AlignmentCase>, String> {
    let entries = fs::read_dir(dir)
        .map_err(|err| format!("Failed to list cases directory '{}': {err}", dir.display()))?;
    let mut paths: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| path.extension().is_some_and(|ext| ext == "json"))
        .collect();
    paths.sort();

    paths
        .iter()
        .map(|path| {
            let data = fs::read_to_string(path)
                .map_err(|err| format!("Failed to read case '{}': {err}", path.display()))?;
            serde_json::from_str(&data)
                .map_err(|err| format!("Failed to parse case '{}': {err}", path.display()))
        })
        .collect()
}

fn resolve_out_path(repo_root: &Path, out: Option<&PathBuf>) -> PathBuf {
    if let Some(path) = out {
        return resolve_path(repo_root, path);
    }

    let run_id = Utc::now().format("%Y%m%dT%H%M%SZ");
    repo_root
        .join("target")
        .join("sync_reports")
        .join(format!("sync-report-{run_id}.json"))
}

fn resolve_path(repo_root: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        repo_root.join(path)
    }
}
