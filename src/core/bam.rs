use crate::core::error::DecodeError;
use crate::core::model::{AlignmentSink, OwnedAlignment};
use noodles::bam;
use noodles::sam::{
    self,
    alignment::{
        RecordBuf,
        record::{
            cigar::{Op, op::Kind},
            data::field::Tag,
        },
        record_buf::data::field::{Value, value::Array},
    },
};
use std::io::{self, Read};

pub const BAM_MAGIC: &[u8; 4] = b"BAM\x01";

const QUAL_ABSENT: u8 = 0xFF;
// Op codes as packed in a `CG:B:I` array.
const RAW_INS: u32 = 1;
const RAW_DEL: u32 = 2;

/// Streaming BAM decoder over already-decompressed bytes.
pub struct BamReader<R> {
    reader: bam::io::Reader<R>,
    header: sam::Header,
    references: Vec<Vec<u8>>,
    record: RecordBuf,
    current: OwnedAlignment,
    index: u64,
}

impl<R: Read> BamReader<R> {
    /// Reads the header and announces every reference to `sink`.
    pub fn new<S: AlignmentSink>(inner: R, sink: &mut S) -> Result<Self, DecodeError> {
        let mut reader = bam::io::Reader::from(inner);
        let header = reader.read_header().map_err(header_error)?;

        let mut references = Vec::with_capacity(header.reference_sequences().len());
        for (name, map) in header.reference_sequences() {
            let name: &[u8] = name.as_ref();
            sink.declare_reference(name, usize::from(map.length()) as u64);
            references.push(name.to_vec());
        }

        Ok(Self {
            reader,
            header,
            references,
            record: RecordBuf::default(),
            current: OwnedAlignment::default(),
            index: 0,
        })
    }

    pub fn reference_count(&self) -> usize {
        self.references.len()
    }

    /// Decodes the next alignment into an internal buffer. `Ok(None)` at a
    /// clean end of stream.
    pub fn next_record(&mut self) -> Result<Option<&OwnedAlignment>, DecodeError> {
        match self.reader.read_record_buf(&self.header, &mut self.record) {
            Ok(0) => return Ok(None),
            Ok(_) => self.index += 1,
            Err(e) => return Err(DecodeError::bam(self.index + 1, e.to_string())),
        }
        normalize(&self.record, &self.references, &mut self.current)
            .map_err(|msg| DecodeError::bam(self.index, msg))?;
        Ok(Some(&self.current))
    }

    /// Feeds every remaining record to `sink`; returns the record count.
    pub fn read_all<S: AlignmentSink>(&mut self, sink: &mut S) -> Result<u64, DecodeError> {
        let mut n = 0u64;
        while let Some(rec) = self.next_record()? {
            sink.push(&rec.as_view());
            n += 1;
        }
        Ok(n)
    }
}

fn header_error(e: io::Error) -> DecodeError {
    match e.kind() {
        io::ErrorKind::InvalidData | io::ErrorKind::UnexpectedEof => {
            DecodeError::InvalidBamHeader(e.to_string())
        }
        _ => DecodeError::Io(e),
    }
}

fn reference_name<'r>(
    refs: &'r [Vec<u8>],
    id: Option<usize>,
    field: &str,
) -> Result<&'r [u8], String> {
    match id {
        None => Ok(&[]),
        Some(id) => refs
            .get(id)
            .map(|v| v.as_slice())
            .ok_or_else(|| format!("{} reference id {} not in header", field, id)),
    }
}

fn normalize(
    record: &RecordBuf,
    refs: &[Vec<u8>],
    out: &mut OwnedAlignment,
) -> Result<(), String> {
    out.clear();
    if let Some(name) = record.name() {
        let name: &[u8] = name.as_ref();
        out.id.extend_from_slice(name);
    }

    let seq: &[u8] = record.sequence().as_ref();
    out.seq.extend_from_slice(seq);
    let qual: &[u8] = record.quality_scores().as_ref();
    if qual.first().is_some_and(|&q| q != QUAL_ABSENT) {
        out.qual.extend(qual.iter().map(|&q| q.saturating_add(33)));
    }

    let ops: &[Op] = record.cigar().as_ref();
    (out.inserted, out.deleted) = indel_totals(record, ops, seq.len());
    out.mismatches = edit_distance(record).unwrap_or(0);

    out.reference.extend_from_slice(reference_name(
        refs,
        record.reference_sequence_id(),
        "read",
    )?);
    out.mate_reference.extend_from_slice(reference_name(
        refs,
        record.mate_reference_sequence_id(),
        "mate",
    )?);
    out.len = seq.len() as u32;
    out.flags = u16::from(record.flags());
    out.mapq = record.mapping_quality().map_or(255, |q| q.get()) as u32;
    out.mate_distance = record.template_length() as i64;
    // aligners emit CIGAR-less placeholders for unaligned reads
    out.position = if ops.is_empty() {
        -1
    } else {
        record.alignment_start().map_or(0, |p| p.get() as i64)
    };
    Ok(())
}

/// Inserted and deleted base totals. A record with more operations than
/// the BAM core can hold stores `<len>S<reflen>N` there and the real
/// CIGAR in `CG:B:I`.
fn indel_totals(record: &RecordBuf, ops: &[Op], read_len: usize) -> (u32, u32) {
    if is_placeholder(ops, read_len)
        && let Some(Value::Array(Array::UInt32(raw))) =
            record.data().get(&Tag::new(b'C', b'G'))
    {
        return raw.iter().fold((0u32, 0u32), |(ins, del), &v| match v & 0xF {
            RAW_INS => (ins.saturating_add(v >> 4), del),
            RAW_DEL => (ins, del.saturating_add(v >> 4)),
            _ => (ins, del),
        });
    }
    ops.iter().fold((0u32, 0u32), |(ins, del), op| {
        let len = u32::try_from(op.len()).unwrap_or(u32::MAX);
        match op.kind() {
            Kind::Insertion => (ins.saturating_add(len), del),
            Kind::Deletion => (ins, del.saturating_add(len)),
            _ => (ins, del),
        }
    })
}

fn is_placeholder(ops: &[Op], read_len: usize) -> bool {
    matches!(ops, [clip, skip]
        if clip.kind() == Kind::SoftClip
            && clip.len() == read_len
            && skip.kind() == Kind::Skip)
}

/// `NM` of any integer width; negative values read as 0.
fn edit_distance(record: &RecordBuf) -> Option<u32> {
    let v = match record.data().get(&Tag::new(b'N', b'M'))? {
        Value::Int8(n) => *n as i64,
        Value::UInt8(n) => *n as i64,
        Value::Int16(n) => *n as i64,
        Value::UInt16(n) => *n as i64,
        Value::Int32(n) => *n as i64,
        Value::UInt32(n) => *n as i64,
        _ => return None,
    };
    Some(v.clamp(0, u32::MAX as i64) as u32)
}
