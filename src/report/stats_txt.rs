use crate::core::metrics::{FinalMetrics, MappingMetrics, RefRow};
use std::fmt::Display;
use std::io::{self, Write};

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Line {
    pub key: String,
    pub value: String,
}

/// Report lines in output order. `coverage` holds positional coverage rows
/// only when they were requested separately.
#[derive(Clone, Debug, Default)]
pub struct Rendered {
    pub main: Vec<Line>,
    pub coverage: Vec<Line>,
}

struct Lines(Vec<Line>);

impl Lines {
    fn push(&mut self, key: impl Into<String>, value: impl Display) {
        self.0.push(Line {
            key: key.into(),
            value: value.to_string(),
        });
    }
}

pub fn render(m: &FinalMetrics, separate_coverage: bool) -> Rendered {
    let mut out = Lines(Vec::new());
    let mut coverage = Lines(Vec::new());

    out.push("reads", m.reads);
    out.push("mapped reads", m.mapped_reads);
    if let Some(d) = &m.duplicates {
        if d.ambiguous > 0 {
            out.push("ambiguous", d.ambiguous);
            out.push("pct ambiguous", format!("{:.6}", d.pct_ambiguous));
            out.push("max dup align", d.max_dup_align);
        }
        if d.singletons > 0 {
            out.push("singleton mappings", d.singletons);
        }
        out.push("total mappings", d.total_mappings);
    }

    if let Some(mm) = &m.mapping {
        let detached = separate_coverage.then_some(&mut coverage);
        render_mapping(mm, &mut out, detached);
    }

    Rendered {
        main: out.0,
        coverage: coverage.0,
    }
}

/// Coverage rows go to `coverage` when given, otherwise inline.
fn render_mapping(mm: &MappingMetrics, out: &mut Lines, mut coverage: Option<&mut Lines>) {
    out.push("mapped bases", mm.mapped_bases);
    if mm.paired {
        out.push("library", "paired-end");
    }
    if mm.discordant > 0 {
        out.push("discordant mates", mm.discordant);
    }
    if mm.distant > 0 {
        out.push("distant mates", mm.distant);
    }
    if let Some(pct) = mm.pct_forward {
        out.push("pct forward", format!("{:.3}", pct));
    }
    out.push("phred", mm.phred);
    out.push("forward", mm.forward);
    out.push("reverse", mm.reverse);
    out.push("len max", mm.len_max);
    if let Some(len) = &mm.len_spread {
        out.push("len mean", format!("{:.4}", len.mean));
        out.push("len stdev", format!("{:.4}", len.stdev));
    }
    out.push("mapq mean", format!("{:.4}", mm.mapq.mean));
    out.push("mapq stdev", format!("{:.4}", mm.mapq.stdev));
    out.push("mapq Q1", format!("{:.2}", mm.mapq.q1));
    out.push("mapq median", format!("{:.2}", mm.mapq.median));
    out.push("mapq Q3", format!("{:.2}", mm.mapq.q3));

    if let Some(e) = &mm.error_rates {
        out.push("snp rate", format!("{:.6}", e.snp));
        if let Some(ins) = e.ins {
            out.push("ins rate", format!("{:.6}", ins));
        }
        if let Some(del) = e.del {
            out.push("del rate", format!("{:.6}", del));
        }
        out.push("pct mismatch", format!("{:.4}", e.pct_mismatch));
    }

    if let Some(ins) = &mm.insert {
        out.push("insert mean", format!("{:.4}", ins.mean));
        if let Some(s) = &ins.spread {
            out.push("insert stdev", format!("{:.4}", s.stdev));
            out.push("insert Q1", format!("{:.2}", s.q1));
            out.push("insert median", format!("{:.2}", s.median));
            out.push("insert Q3", format!("{:.2}", s.q3));
        }
    }

    if let Some(q) = &mm.base_quality {
        out.push("base qual mean", format!("{:.4}", q.mean));
        out.push("base qual stdev", format!("{:.4}", q.stdev));
    }
    if let Some(c) = &mm.composition {
        out.push("%A", format!("{:.4}", c.a));
        out.push("%C", format!("{:.4}", c.c));
        out.push("%G", format!("{:.4}", c.g));
        out.push("%T", format!("{:.4}", c.t));
        if let Some(n) = c.n {
            out.push("%N", format!("{:.4}", n));
        }
    }

    if let Some(table) = &mm.references {
        for row in &table.rows {
            match row {
                RefRow::Share {
                    name,
                    pct,
                    signature,
                } => {
                    let pct = if table.wide_precision {
                        format!("{:.6}", pct)
                    } else {
                        format!("{:.2}", pct)
                    };
                    let value = match signature {
                        Some(sig) => format!("{}\t{}", pct, sig),
                        None => pct,
                    };
                    out.push(format!("%{}", name), value);
                }
                RefRow::Coverage {
                    name,
                    ref_len,
                    reads,
                    scores,
                    signature,
                } => {
                    coverage.as_deref_mut().unwrap_or(&mut *out).push(
                        name.clone(),
                        format!(
                            "{}\t{}\t{:.2}\t{:.4}\t{:.4}\t{}",
                            ref_len, reads, scores.pct_covered, scores.skew, scores.cv, signature
                        ),
                    );
                }
            }
        }
        if let Some(med) = &table.medians {
            out.push("median skew", format!("{:.2}", med.skew));
            out.push("median coverage cv", format!("{:.2}", med.cv));
            out.push("median coverage", format!("{:.2}", med.covered));
        }
    }

    if let Some(rc) = &mm.ref_counts {
        out.push("num ref seqs", rc.known);
        out.push("num ref aligned", rc.aligned);
    }
}

pub fn write_lines<W: Write + ?Sized>(w: &mut W, lines: &[Line]) -> io::Result<()> {
    for line in lines {
        writeln!(w, "{}\t{}", line.key, line.value)?;
    }
    Ok(())
}

/// Writes the report to `w`. With `coverage_out`, positional coverage rows
/// go there instead of into the report.
pub fn write_report<W: Write + ?Sized>(
    w: &mut W,
    m: &FinalMetrics,
    coverage_out: Option<&mut dyn Write>,
) -> io::Result<()> {
    let rendered = render(m, coverage_out.is_some());
    write_lines(w, &rendered.main)?;
    if let Some(cov) = coverage_out {
        write_lines(cov, &rendered.coverage)?;
    }
    w.flush()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::metrics::Agg;
    use crate::core::model::{AlignmentView, StatsConfig};

    fn rec<'a>(id: &'a str, reference: &'a str, position: i64, seq: &'a [u8]) -> AlignmentView<'a> {
        AlignmentView {
            id: id.as_bytes(),
            len: seq.len() as u32,
            flags: 0,
            reference: reference.as_bytes(),
            position,
            mapq: 20,
            mate_reference: b"",
            mate_distance: 0,
            seq,
            qual: b"",
            mismatches: 0,
            inserted: 0,
            deleted: 0,
        }
    }

    fn keys(lines: &[Line]) -> Vec<&str> {
        lines.iter().map(|l| l.key.as_str()).collect()
    }

    #[test]
    fn zero_mapped_report() {
        let mut agg = Agg::new(StatsConfig::default());
        agg.update(&rec("a", "", 0, b"ACGT"));
        let r = render(&agg.finalize(), false);
        assert_eq!(keys(&r.main), ["reads", "mapped reads"]);
        assert_eq!(r.main[1].value, "0");
    }

    #[test]
    fn empty_stream_report() {
        let r = render(&Agg::new(StatsConfig::default()).finalize(), false);
        let mut out = Vec::new();
        write_lines(&mut out, &r.main).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "reads\t0\nmapped reads\t0\n");
    }

    #[test]
    fn key_order_for_uniform_lengths() {
        let mut agg = Agg::new(StatsConfig::default());
        agg.update(&rec("a", "chr1", 1, b"ACGT"));
        agg.update(&rec("b", "chr1", 9, b"ACGA"));
        let r = render(&agg.finalize(), false);
        assert_eq!(
            keys(&r.main),
            [
                "reads",
                "mapped reads",
                "mapped bases",
                "phred",
                "forward",
                "reverse",
                "len max",
                "mapq mean",
                "mapq stdev",
                "mapq Q1",
                "mapq median",
                "mapq Q3",
                "snp rate",
                "pct mismatch",
                "%A",
                "%C",
                "%G",
                "%T",
            ]
        );
        let mapq = r.main.iter().find(|l| l.key == "mapq mean").unwrap();
        assert_eq!(mapq.value, "20.0000");
    }

    #[test]
    fn share_rows_with_signature() {
        let cfg = StatsConfig {
            hist_bins: 4,
            max_refs: 10,
            ..StatsConfig::default()
        };
        let mut agg = Agg::new(cfg);
        agg.declare_reference(b"chr1", 400);
        agg.declare_reference(b"chr2", 400);
        agg.update(&rec("a", "chr1", 1, b"ACGTACGT"));
        agg.update(&rec("b", "chr2", 390, b"AC"));
        let r = render(&agg.finalize(), false);
        let row = r.main.iter().find(|l| l.key == "%chr1").unwrap();
        assert_eq!(row.value, "80.00\t3000");
        let row = r.main.iter().find(|l| l.key == "%chr2").unwrap();
        assert_eq!(row.value, "20.00\t0001");
        let tail: Vec<&str> = keys(&r.main).into_iter().rev().take(2).collect();
        assert_eq!(tail, ["num ref aligned", "num ref seqs"]);
    }

    #[test]
    fn pct_forward_needs_more_than_100_mapped() {
        let mut agg = Agg::new(StatsConfig::default());
        for i in 0..100 {
            let mut r = rec("a", "chr1", 1 + i, b"ACGT");
            r.flags = if i < 75 { 0x10 } else { 0 };
            agg.update(&r);
        }
        let r = render(&agg.clone().finalize(), false);
        assert!(!keys(&r.main).contains(&"pct forward"));

        agg.update(&rec("b", "chr1", 500, b"ACGT"));
        let r = render(&agg.finalize(), false);
        let pct = r.main.iter().find(|l| l.key == "pct forward").unwrap();
        assert_eq!(pct.value, "74.257");
    }

    #[test]
    fn share_rows_use_six_decimals_by_default() {
        let mut agg = Agg::new(StatsConfig::default());
        agg.declare_reference(b"chr1", 400);
        agg.declare_reference(b"chr2", 400);
        agg.update(&rec("a", "chr1", 1, b"ACGTACGT"));
        agg.update(&rec("b", "chr2", 390, b"AC"));
        let r = render(&agg.finalize(), false);
        let row = r.main.iter().find(|l| l.key == "%chr1").unwrap();
        let fields: Vec<&str> = row.value.split('\t').collect();
        assert_eq!(fields[0], "80.000000");
        assert_eq!(fields[1].len(), 30);
        let row = r.main.iter().find(|l| l.key == "%chr2").unwrap();
        assert!(row.value.starts_with("20.000000\t"));
    }

    #[test]
    fn zero_bins_drop_the_signature() {
        let cfg = StatsConfig {
            hist_bins: 0,
            max_refs: 10,
            ..StatsConfig::default()
        };
        let mut agg = Agg::new(cfg);
        agg.declare_reference(b"chr1", 400);
        agg.declare_reference(b"chr2", 400);
        agg.update(&rec("a", "chr1", 1, b"ACGTACGT"));
        agg.update(&rec("b", "chr2", 390, b"AC"));
        let r = render(&agg.finalize(), false);
        let row = r.main.iter().find(|l| l.key == "%chr1").unwrap();
        assert_eq!(row.value, "80.00");
    }

    #[test]
    fn coverage_rows_can_be_split_out() {
        let mut cfg = StatsConfig::rna();
        cfg.hist_bins = 5;
        let mut agg = Agg::new(cfg);
        agg.declare_reference(b"tx1", 50);
        agg.declare_reference(b"tx2", 50);
        agg.update(&rec("a", "tx1", 1, b"ACGTACGTAC"));
        agg.update(&rec("b", "tx2", 41, b"ACGTACGTAC"));
        let m = agg.finalize();

        let inline = render(&m, false);
        assert!(inline.coverage.is_empty());
        assert!(inline.main.iter().any(|l| l.key == "tx1"));

        let split = render(&m, true);
        assert_eq!(keys(&split.coverage), ["tx1", "tx2"]);
        assert!(!split.main.iter().any(|l| l.key == "tx1"));
        assert!(split.main.iter().any(|l| l.key == "median coverage"));
        let fields: Vec<&str> = split.coverage[0].value.split('\t').collect();
        assert_eq!(fields[0], "50");
        assert_eq!(fields[1], "1");
        assert_eq!(fields[5], "30000");

        let mut main = Vec::new();
        let mut cov = Vec::new();
        write_report(&mut main, &m, Some(&mut cov)).unwrap();
        let cov = String::from_utf8(cov).unwrap();
        assert!(cov.starts_with("tx1\t50\t1\t"));
        assert_eq!(cov.lines().count(), 2);
    }
}
