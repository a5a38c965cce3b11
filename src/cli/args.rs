use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "sam-stats",
    version,
    about = "Single-pass alignment statistics for SAM/BAM"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    Run(RunArgs),
}

#[derive(Parser)]
pub struct RunArgs {
    /// SAM/BAM inputs, optionally gzipped; `-` reads stdin
    #[arg(required = true)]
    pub inputs: Vec<PathBuf>,

    /// Track read identifiers to report ambiguous and singleton mappings
    #[arg(short = 'D', long, default_value_t = false)]
    pub dup: bool,

    /// Report every reference, not just the first 1000
    #[arg(short = 'A', long, default_value_t = false)]
    pub all_refs: bool,

    /// Positional coverage mode: per-base coverage, skew and CV per reference
    #[arg(short = 'r', long, default_value_t = false)]
    pub rna: bool,

    /// Write positional coverage rows to FILE instead of the report (implies --rna)
    #[arg(short = 'R', long, value_name = "FILE")]
    pub rna_out: Option<PathBuf>,

    /// Coverage signature length (default 30, 60 with --rna; 0 for none)
    #[arg(short = 'S', long, value_name = "N")]
    pub sig_size: Option<usize>,

    /// Write each report to <input>.<EXT> (default `stats` with several inputs)
    #[arg(short = 'x', long, value_name = "EXT")]
    pub ext: Option<String>,

    /// Skip inputs whose report is newer than the input
    #[arg(short = 'M', long, default_value_t = false)]
    pub newer_only: bool,

    /// Treat every input as BAM
    #[arg(short = 'B', long, default_value_t = false)]
    pub bam: bool,

    #[arg(long, default_value_t = num_cpus::get())]
    pub threads: usize,

    /// Debug logging, including stage timings
    #[arg(short = 'd', long, default_value_t = false)]
    pub debug: bool,
}
