use crate::core::bam::BamReader;
use crate::core::error::DecodeError;
use crate::core::io::{Input, RecordFormat, sniff_stream, stream_reader};
use crate::core::metrics::{Agg, FinalMetrics};
use crate::core::model::StatsConfig;
use crate::core::sam;
use anyhow::{Context, Result, anyhow};
use crossbeam_channel as channel;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};

pub struct RunConfig {
    pub inputs: Vec<PathBuf>,
    pub stats: StatsConfig,
    pub threads: usize,
    pub force_bam: bool,
}

#[derive(Clone, Debug, Default)]
struct WorkerStats {
    files: u64,
    failed: u64,
    busy: Duration,
}

/// Statistics for one input, decoded and aggregated on the calling thread.
/// `threads` only feeds block-parallel gzip decompression.
pub fn analyze(
    path: &Path,
    config: &StatsConfig,
    threads: usize,
    force_bam: bool,
) -> Result<FinalMetrics> {
    let t_total = Instant::now();

    let t_open = Instant::now();
    let input = Input::open(path, threads)?;
    log_stage("engine.input_open", t_open);

    let mut agg = Agg::new(config.clone());
    let t_decode = Instant::now();
    let records = decode(input, force_bam, &mut agg)
        .with_context(|| format!("failed to read alignments from {}", path.display()))?;
    log_stage("engine.decode", t_decode);
    if agg.total_reads == 0 {
        log::warn!("no reads in {}", path.display());
    }

    let mapped = agg.mapped_reads;
    let t_finalize = Instant::now();
    let metrics = agg.finalize();
    log_stage("engine.finalize", t_finalize);
    log::debug!(
        "{}: records={} mapped={} total={}",
        path.display(),
        records,
        mapped,
        fmt_dur(t_total.elapsed())
    );
    Ok(metrics)
}

fn decode(input: Input, force_bam: bool, agg: &mut Agg) -> Result<u64, DecodeError> {
    match input {
        Input::Mapped(source) => {
            let bytes = source.bytes();
            if force_bam || RecordFormat::sniff(bytes) == RecordFormat::Bam {
                BamReader::new(bytes, agg)?.read_all(agg)
            } else {
                sam::read_bytes(bytes, agg)
            }
        }
        Input::Stream(reader) => {
            let (format, reader) = sniff_stream(reader)?;
            let reader = stream_reader(reader);
            if force_bam || format == RecordFormat::Bam {
                BamReader::new(reader, agg)?.read_all(agg)
            } else {
                sam::read_stream(reader, agg)
            }
        }
    }
}

/// Analyzes every input on a pool of worker threads and hands results to
/// `emit` strictly in input order. A failing input is reported through
/// `emit` and does not stop the others; an error returned by `emit` does.
pub fn run<F>(cfg: &RunConfig, mut emit: F) -> Result<()>
where
    F: FnMut(&Path, Result<FinalMetrics>) -> Result<()>,
{
    let t_total = Instant::now();
    if cfg.inputs.is_empty() {
        return Ok(());
    }
    let workers = cfg.threads.clamp(1, cfg.inputs.len());
    let per_file_threads = (cfg.threads / workers).max(1);
    log::debug!(
        "engine: inputs={} workers={} threads_per_file={}",
        cfg.inputs.len(),
        workers,
        per_file_threads
    );

    let (job_tx, job_rx) = channel::bounded::<(usize, &Path)>(workers * 2);
    let (result_tx, result_rx) = channel::unbounded::<(usize, Result<FinalMetrics>)>();
    let (stats_tx, stats_rx) = channel::unbounded::<WorkerStats>();

    let emitted = thread::scope(|s| -> Result<()> {
        s.spawn(move || {
            for (index, path) in cfg.inputs.iter().enumerate() {
                if job_tx.send((index, path.as_path())).is_err() {
                    return;
                }
            }
        });

        for _ in 0..workers {
            let rx = job_rx.clone();
            let tx = result_tx.clone();
            let stats_tx = stats_tx.clone();
            let stats = &cfg.stats;
            let force_bam = cfg.force_bam;
            s.spawn(move || {
                let mut wstats = WorkerStats::default();
                for (index, path) in rx.iter() {
                    let t = Instant::now();
                    let result = analyze(path, stats, per_file_threads, force_bam);
                    wstats.busy += t.elapsed();
                    wstats.files += 1;
                    if result.is_err() {
                        wstats.failed += 1;
                    }
                    if tx.send((index, result)).is_err() {
                        break;
                    }
                }
                let _ = stats_tx.send(wstats);
            });
        }
        drop(job_rx);
        drop(result_tx);
        drop(stats_tx);

        let mut pending: BTreeMap<usize, Result<FinalMetrics>> = BTreeMap::new();
        let mut next = 0usize;
        for (index, result) in result_rx.iter() {
            pending.insert(index, result);
            while let Some(result) = pending.remove(&next) {
                emit(&cfg.inputs[next], result)?;
                next += 1;
            }
        }
        if next != cfg.inputs.len() {
            return Err(anyhow!(
                "worker pool stopped after {} of {} inputs",
                next,
                cfg.inputs.len()
            ));
        }
        Ok(())
    });

    let mut totals = WorkerStats::default();
    for ws in stats_rx.iter() {
        totals.files += ws.files;
        totals.failed += ws.failed;
        totals.busy += ws.busy;
    }
    log::debug!(
        "engine: files={} failed={} worker_busy={}",
        totals.files,
        totals.failed,
        fmt_dur(totals.busy)
    );
    log_stage("engine.total", t_total);
    emitted
}

pub fn log_stage(name: &str, t: Instant) {
    log::debug!("stage={} time={}", name, fmt_dur(t.elapsed()));
}

pub fn fmt_dur(d: Duration) -> String {
    if d.as_secs_f64() < 1.0 {
        format!("{}ms", d.as_millis())
    } else {
        format!("{:.3}s", d.as_secs_f64())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::bam::tests::{BamBuilder, TestRecord};
    use crate::report::stats_txt;
    use flate2::Compression;
    use flate2::write::GzEncoder;
    use std::io::Write;

    const SAM: &str = "@HD\tVN:1.6\n\
@SQ\tSN:chr1\tLN:1000\n\
@SQ\tSN:chr2\tLN:500\n\
r1\t99\tchr1\t100\t60\t4M\t=\t300\t250\tACGT\tIIII\tNM:i:1\n\
r1\t147\tchr1\t300\t50\t4M\t=\t100\t-250\tTTGA\t!!II\n\
r2\t0\tchr2\t10\t30\t2M1I1M\t*\t0\t0\tGGCN\t#+5?\n\
r3\t4\t*\t0\t0\t*\t*\t0\t0\tACGT\tIIII\n";

    fn bam_equivalent() -> Vec<u8> {
        let mut bam = BamBuilder::new(&[("chr1", 1000), ("chr2", 500)]);
        bam.record(&TestRecord {
            name: "r1",
            flags: 99,
            ref_id: 0,
            pos0: 99,
            mapq: 60,
            cigar: &[(4, 0)],
            next_ref_id: 0,
            tlen: 250,
            seq: "ACGT",
            qual: Some(&[40, 40, 40, 40]),
            nm: Some(1),
        });
        bam.record(&TestRecord {
            name: "r1",
            flags: 147,
            ref_id: 0,
            pos0: 299,
            mapq: 50,
            cigar: &[(4, 0)],
            next_ref_id: 0,
            tlen: -250,
            seq: "TTGA",
            qual: Some(&[0, 0, 40, 40]),
            nm: None,
        });
        bam.record(&TestRecord {
            name: "r2",
            flags: 0,
            ref_id: 1,
            pos0: 9,
            mapq: 30,
            cigar: &[(2, 0), (1, 1), (1, 0)],
            next_ref_id: -1,
            tlen: 0,
            seq: "GGCN",
            qual: Some(&[2, 10, 20, 30]),
            nm: None,
        });
        bam.record(&TestRecord {
            name: "r3",
            flags: 4,
            ref_id: -1,
            pos0: -1,
            mapq: 0,
            cigar: &[],
            next_ref_id: -1,
            tlen: 0,
            seq: "ACGT",
            qual: Some(&[40; 4]),
            nm: None,
        });
        bam.data
    }

    fn render(m: &FinalMetrics) -> String {
        let mut out = Vec::new();
        stats_txt::write_report(&mut out, m, None).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn sam_and_bam_agree() {
        let dir = tempfile::tempdir().unwrap();
        let sam_path = dir.path().join("a.sam");
        let bam_path = dir.path().join("a.bam");
        std::fs::write(&sam_path, SAM).unwrap();
        std::fs::write(&bam_path, bam_equivalent()).unwrap();

        let cfg = StatsConfig::default();
        let from_sam = analyze(&sam_path, &cfg, 1, false).unwrap();
        let from_bam = analyze(&bam_path, &cfg, 1, false).unwrap();
        assert_eq!(from_sam.reads, 4);
        assert_eq!(from_sam.mapped_reads, 3);
        assert_eq!(render(&from_sam), render(&from_bam));
    }

    #[test]
    fn gzipped_bam_is_sniffed_after_inflate() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.bam.gz");
        let mut enc = GzEncoder::new(
            std::fs::File::create(&path).unwrap(),
            Compression::default(),
        );
        enc.write_all(&bam_equivalent()).unwrap();
        enc.finish().unwrap();
        let m = analyze(&path, &StatsConfig::default(), 2, false).unwrap();
        assert_eq!(m.reads, 4);
        assert_eq!(m.mapped_reads, 3);
    }

    #[test]
    fn repeated_runs_are_identical() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.sam");
        std::fs::write(&path, SAM).unwrap();
        let cfg = StatsConfig {
            track_duplicates: true,
            ..StatsConfig::default()
        };
        let a = analyze(&path, &cfg, 1, false).unwrap();
        let b = analyze(&path, &cfg, 1, false).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn malformed_input_names_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.sam");
        std::fs::write(&path, "r1\tX\tchr1\t1\t0\t4M\t*\t0\t0\tACGT\tIIII\n").unwrap();
        let err = analyze(&path, &StatsConfig::default(), 1, false).unwrap_err();
        assert!(format!("{:#}", err).contains("bad.sam"));
        assert!(err.downcast_ref::<DecodeError>().is_some());
    }

    #[test]
    fn run_emits_in_input_order_and_continues_past_failures() {
        let dir = tempfile::tempdir().unwrap();
        let mut inputs = Vec::new();
        for i in 0..5 {
            let path = dir.path().join(format!("f{}.sam", i));
            if i == 2 {
                std::fs::write(&path, "broken line\n").unwrap();
            } else {
                std::fs::write(&path, SAM).unwrap();
            }
            inputs.push(path);
        }
        let cfg = RunConfig {
            inputs: inputs.clone(),
            stats: StatsConfig::default(),
            threads: 3,
            force_bam: false,
        };
        let mut seen = Vec::new();
        run(&cfg, |path, result| {
            seen.push((path.to_path_buf(), result.is_ok()));
            Ok(())
        })
        .unwrap();
        let order: Vec<PathBuf> = seen.iter().map(|(p, _)| p.clone()).collect();
        assert_eq!(order, inputs);
        let ok: Vec<bool> = seen.iter().map(|(_, ok)| *ok).collect();
        assert_eq!(ok, [true, true, false, true, true]);
    }

    #[test]
    fn fmt_dur_units() {
        assert_eq!(fmt_dur(Duration::from_millis(250)), "250ms");
        assert_eq!(fmt_dur(Duration::from_millis(1500)), "1.500s");
    }
}
