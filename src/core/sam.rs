use crate::core::error::DecodeError;
use crate::core::model::{AlignmentSink, AlignmentView};
use memchr::{memchr, memchr_iter};
use std::io::BufRead;

const S_ID: usize = 0;
const S_FLAG: usize = 1;
const S_RNAME: usize = 2;
const S_POS: usize = 3;
const S_MAPQ: usize = 4;
const S_CIGAR: usize = 5;
const S_RNEXT: usize = 6;
const S_TLEN: usize = 8;
const S_SEQ: usize = 9;
const S_QUAL: usize = 10;
const MANDATORY_FIELDS: usize = 11;

/// Decodes an in-memory SAM file (typically a memory map).
pub fn read_bytes<S: AlignmentSink>(bytes: &[u8], sink: &mut S) -> Result<u64, DecodeError> {
    let mut records = 0u64;
    let mut line_no = 0u64;
    let mut start = 0usize;
    while start < bytes.len() {
        let end = memchr(b'\n', &bytes[start..])
            .map(|p| start + p)
            .unwrap_or(bytes.len());
        line_no += 1;
        if process_line(&bytes[start..end], line_no, sink)? {
            records += 1;
        }
        start = end + 1;
    }
    Ok(records)
}

/// Decodes SAM text from a stream (stdin or a decompressor).
pub fn read_stream<R: BufRead, S: AlignmentSink>(
    mut reader: R,
    sink: &mut S,
) -> Result<u64, DecodeError> {
    let mut records = 0u64;
    let mut line_no = 0u64;
    let mut buf = Vec::with_capacity(1024);
    loop {
        buf.clear();
        if reader.read_until(b'\n', &mut buf)? == 0 {
            break;
        }
        line_no += 1;
        if process_line(&buf, line_no, sink)? {
            records += 1;
        }
    }
    Ok(records)
}

/// Returns `true` when the line was an alignment record.
fn process_line<S: AlignmentSink>(
    line: &[u8],
    line_no: u64,
    sink: &mut S,
) -> Result<bool, DecodeError> {
    let line = trim_eol(line);
    if line.is_empty() {
        return Ok(false);
    }
    if line[0] == b'@' {
        if let Some((name, len)) = parse_sq_line(line) {
            sink.declare_reference(name, len);
        }
        return Ok(false);
    }
    let record = parse_record(line, line_no)?;
    sink.push(&record);
    Ok(true)
}

fn trim_eol(mut line: &[u8]) -> &[u8] {
    if let [rest @ .., b'\n'] = line {
        line = rest;
    }
    if let [rest @ .., b'\r'] = line {
        line = rest;
    }
    line
}

/// `@SQ` header line to `(SN, LN)`; a missing `LN` yields length 0.
pub fn parse_sq_line(line: &[u8]) -> Option<(&[u8], u64)> {
    let mut fields = line.split(|&b| b == b'\t');
    if fields.next()? != b"@SQ" {
        return None;
    }
    let mut name: Option<&[u8]> = None;
    let mut len = 0u64;
    for f in fields {
        if let Some(v) = f.strip_prefix(b"SN:") {
            name = Some(v);
        } else if let Some(v) = f.strip_prefix(b"LN:") {
            len = parse_uint(v).unwrap_or(0);
        }
    }
    name.filter(|n| !n.is_empty()).map(|n| (n, len))
}

/// Splits one alignment line into a normalized view borrowing from `line`.
pub fn parse_record(line: &[u8], line_no: u64) -> Result<AlignmentView<'_>, DecodeError> {
    let mut fields: [&[u8]; MANDATORY_FIELDS] = [&[]; MANDATORY_FIELDS];
    let mut tags: &[u8] = &[];
    let mut qual_end = line.len();
    let mut n = 0usize;
    let mut start = 0usize;
    for tab in memchr_iter(b'\t', line) {
        if n == MANDATORY_FIELDS - 1 {
            tags = &line[tab + 1..];
            qual_end = tab;
            break;
        }
        fields[n] = &line[start..tab];
        n += 1;
        start = tab + 1;
    }
    if n < MANDATORY_FIELDS - 1 {
        return Err(DecodeError::sam(
            line_no,
            format!("expected {} fields, found {}", MANDATORY_FIELDS, n + 1),
        ));
    }
    fields[MANDATORY_FIELDS - 1] = &line[start..qual_end];

    if !fields[S_FLAG].first().is_some_and(u8::is_ascii_digit) {
        return Err(DecodeError::sam(line_no, "FLAG is not numeric"));
    }
    if !fields[S_POS].first().is_some_and(u8::is_ascii_digit) {
        return Err(DecodeError::sam(line_no, "POS is not numeric"));
    }
    let flags = parse_uint(fields[S_FLAG])
        .filter(|&f| f <= u16::MAX as u64)
        .ok_or_else(|| DecodeError::sam(line_no, "FLAG out of range"))? as u16;
    let mut position = parse_int(fields[S_POS])
        .ok_or_else(|| DecodeError::sam(line_no, "POS is not an integer"))?;
    let mapq = parse_uint(fields[S_MAPQ])
        .ok_or_else(|| DecodeError::sam(line_no, "MAPQ is not an integer"))?
        .min(u32::MAX as u64) as u32;
    let mate_distance = parse_int(fields[S_TLEN])
        .ok_or_else(|| DecodeError::sam(line_no, "TLEN is not an integer"))?;

    let cigar = fields[S_CIGAR];
    let (inserted, deleted) = if cigar == b"*" || cigar.is_empty() {
        // no alignment, whatever POS says
        position = -1;
        (0, 0)
    } else {
        cigar_indels(cigar).ok_or_else(|| {
            DecodeError::sam(
                line_no,
                format!("invalid CIGAR {}", String::from_utf8_lossy(cigar)),
            )
        })?
    };

    let seq = star_as_empty(fields[S_SEQ]);
    let qual = star_as_empty(fields[S_QUAL]);

    Ok(AlignmentView {
        id: fields[S_ID],
        len: seq.len() as u32,
        flags,
        reference: star_as_empty(fields[S_RNAME]),
        position,
        mapq,
        mate_reference: star_as_empty(fields[S_RNEXT]),
        mate_distance,
        seq,
        qual,
        mismatches: nm_tag(tags),
        inserted,
        deleted,
    })
}

fn star_as_empty(field: &[u8]) -> &[u8] {
    if field == b"*" { &[] } else { field }
}

/// Total inserted and deleted bases in a CIGAR string.
pub fn cigar_indels(cigar: &[u8]) -> Option<(u32, u32)> {
    let mut ins = 0u32;
    let mut del = 0u32;
    let mut len = 0u32;
    let mut have_len = false;
    for &b in cigar {
        if b.is_ascii_digit() {
            len = len.checked_mul(10)?.checked_add((b - b'0') as u32)?;
            have_len = true;
            continue;
        }
        if !have_len {
            return None;
        }
        match b {
            b'I' => ins += len,
            b'D' => del += len,
            b'M' | b'N' | b'S' | b'H' | b'P' | b'=' | b'X' => {}
            _ => return None,
        }
        len = 0;
        have_len = false;
    }
    if have_len {
        return None;
    }
    Some((ins, del))
}

fn nm_tag(tags: &[u8]) -> u32 {
    tags.split(|&b| b == b'\t')
        .filter_map(|t| t.strip_prefix(b"NM:i:"))
        .filter_map(parse_uint)
        .last()
        .map(|v| v.min(u32::MAX as u64) as u32)
        .unwrap_or(0)
}

fn parse_uint(s: &[u8]) -> Option<u64> {
    if s.is_empty() {
        return None;
    }
    let mut v = 0u64;
    for &b in s {
        if !b.is_ascii_digit() {
            return None;
        }
        v = v.checked_mul(10)?.checked_add((b - b'0') as u64)?;
    }
    Some(v)
}

fn parse_int(s: &[u8]) -> Option<i64> {
    match s.split_first() {
        Some((b'-', rest)) => parse_uint(rest).map(|v| -(v.min(i64::MAX as u64) as i64)),
        Some((b'+', rest)) => parse_uint(rest).map(|v| v.min(i64::MAX as u64) as i64),
        _ => parse_uint(s).map(|v| v.min(i64::MAX as u64) as i64),
    }
}
