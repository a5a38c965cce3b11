use crate::cli::args::{Cli, Commands, RunArgs};
use crate::core::engine::{self, RunConfig, fmt_dur};
use crate::core::io::is_stdin;
use crate::core::metrics::FinalMetrics;
use crate::core::model::{StatsConfig, UNCAPPED_MAX_REFS};
use crate::report::stats_txt;
use anyhow::{Context, Result, bail};
use clap::Parser;
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;

const MULTI_INPUT_EXT: &str = "stats";

pub fn entry() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Commands::Run(args) => run(args),
    }
}

fn init_logging(debug: bool) {
    let level = if debug {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Warn
    };
    env_logger::Builder::from_default_env()
        .filter_level(level)
        .format_timestamp(None)
        .format_target(false)
        .init();
}

fn run(args: RunArgs) -> Result<()> {
    init_logging(args.debug);
    let t0 = Instant::now();

    stage("preflight", || {
        if args.threads == 0 {
            bail!("--threads must be >= 1");
        }
        if args.inputs.iter().filter(|p| is_stdin(p)).count() > 1 {
            bail!("stdin (`-`) can only be read once");
        }
        Ok(())
    })?;

    let stats = stats_config(&args);
    let ext = output_ext(&args);

    let t_select = Instant::now();
    let mut inputs = Vec::with_capacity(args.inputs.len());
    for input in &args.inputs {
        if args.newer_only
            && let Some(ext) = ext.as_deref()
            && !is_stdin(input)
            && is_up_to_date(input, &output_path(input, ext))
        {
            log::info!("skipping {}: report is up to date", input.display());
            continue;
        }
        inputs.push(input.clone());
    }
    stage_done("select-inputs", t_select);
    if inputs.is_empty() {
        return Ok(());
    }

    let mut rna_out = match &args.rna_out {
        Some(path) => Some(BufWriter::new(File::create(path).with_context(|| {
            format!("failed to create coverage table {}", path.display())
        })?)),
        None => None,
    };

    let config = RunConfig {
        inputs,
        stats,
        threads: args.threads,
        force_bam: args.bam,
    };

    let total = config.inputs.len();
    let mut failed = 0usize;
    let t_engine = Instant::now();
    engine::run(&config, |input, result| {
        let metrics = match result {
            Ok(m) => m,
            Err(e) => {
                log::warn!("{:#}", e);
                failed += 1;
                return Ok(());
            }
        };
        let coverage = rna_out.as_mut().map(|w| w as &mut dyn Write);
        let written = match ext.as_deref() {
            Some(ext) if !is_stdin(input) => {
                write_report_file(&output_path(input, ext), &metrics, coverage)
            }
            _ => {
                let stdout = io::stdout();
                let mut w = stdout.lock();
                stats_txt::write_report(&mut w, &metrics, coverage)
                    .context("failed to write report to stdout")
            }
        };
        if let Err(e) = written {
            log::warn!("{}: {:#}", input.display(), e);
            failed += 1;
        }
        Ok(())
    })?;
    stage_done("engine", t_engine);

    if let Some(w) = rna_out.as_mut() {
        w.flush().context("failed to write coverage table")?;
    }
    log::debug!("total={}", fmt_dur(t0.elapsed()));

    if failed > 0 {
        bail!("{} of {} inputs failed", failed, total);
    }
    Ok(())
}

fn write_report_file(
    out: &Path,
    metrics: &FinalMetrics,
    coverage: Option<&mut dyn Write>,
) -> Result<()> {
    let file =
        File::create(out).with_context(|| format!("failed to create {}", out.display()))?;
    let mut w = BufWriter::new(file);
    stats_txt::write_report(&mut w, metrics, coverage)
        .with_context(|| format!("failed to write {}", out.display()))?;
    log::debug!("wrote {}", out.display());
    Ok(())
}

fn stats_config(args: &RunArgs) -> StatsConfig {
    let positional = args.rna || args.rna_out.is_some();
    let mut stats = if positional {
        StatsConfig::rna()
    } else {
        StatsConfig::default()
    };
    if let Some(bins) = args.sig_size {
        stats.hist_bins = bins;
    }
    stats.track_duplicates = args.dup;
    if args.all_refs {
        stats.max_refs = UNCAPPED_MAX_REFS;
    }
    stats
}

fn output_ext(args: &RunArgs) -> Option<String> {
    match &args.ext {
        Some(ext) => Some(ext.trim_start_matches('.').to_string()),
        None if args.inputs.len() > 1 => Some(MULTI_INPUT_EXT.to_string()),
        None => None,
    }
}

/// `<input minus .gz>.<ext>`
fn output_path(input: &Path, ext: &str) -> PathBuf {
    let base = match input.extension() {
        Some(e) if e.eq_ignore_ascii_case("gz") => input.with_extension(""),
        _ => input.to_path_buf(),
    };
    let mut name = base.into_os_string();
    name.push(".");
    name.push(ext);
    PathBuf::from(name)
}

fn is_up_to_date(input: &Path, output: &Path) -> bool {
    let modified = |p: &Path| fs::metadata(p).and_then(|m| m.modified()).ok();
    match (modified(input), modified(output)) {
        (Some(i), Some(o)) => o >= i,
        _ => false,
    }
}

fn stage<F>(name: &str, f: F) -> Result<()>
where
    F: FnOnce() -> Result<()>,
{
    let t = Instant::now();
    let res = f();
    stage_done(name, t);
    res
}

fn stage_done(name: &str, t: Instant) {
    engine::log_stage(name, t);
}
