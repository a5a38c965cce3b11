use crate::core::bam::BAM_MAGIC;
use anyhow::{Context, Result, anyhow};
use flate2::read::MultiGzDecoder;
use gzp::deflate::{Bgzf, Mgzip};
use gzp::par::decompress::ParDecompressBuilder;
use memmap2::Mmap;
use std::fs::File;
use std::io::{self, BufReader, Cursor, Read};
use std::path::Path;

pub const STDIN_PATH: &str = "-";
const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];
const READ_BUF: usize = 1 << 20;

pub struct MmapSource {
    mmap: Mmap,
}

impl MmapSource {
    pub fn open(path: &Path) -> Result<Self> {
        let file =
            File::open(path).with_context(|| format!("failed to open {}", path.display()))?;
        // SAFETY: read-only file mapping.
        let mmap = unsafe { Mmap::map(&file) }
            .with_context(|| format!("mmap failed for {}", path.display()))?;
        Ok(Self { mmap })
    }

    pub fn bytes(&self) -> &[u8] {
        &self.mmap
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum InputKind {
    Plain,
    Gzip,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum RecordFormat {
    Sam,
    Bam,
}

impl RecordFormat {
    pub fn sniff(prefix: &[u8]) -> Self {
        if prefix.starts_with(BAM_MAGIC) {
            RecordFormat::Bam
        } else {
            RecordFormat::Sam
        }
    }
}

/// Opened input, after decompression.
pub enum Input {
    /// Uncompressed regular file, mapped in full.
    Mapped(MmapSource),
    /// Decompressed file or stdin.
    Stream(Box<dyn Read + Send>),
}

impl Input {
    pub fn open(path: &Path, threads: usize) -> Result<Self> {
        if is_stdin(path) {
            return open_stdin();
        }
        match detect_input_kind(path)? {
            InputKind::Gzip => Ok(Input::Stream(open_gzip_reader(path, threads)?)),
            InputKind::Plain => {
                let len = std::fs::metadata(path)
                    .with_context(|| format!("failed to stat {}", path.display()))?
                    .len();
                if len == 0 {
                    return Ok(Input::Stream(Box::new(io::empty())));
                }
                Ok(Input::Mapped(MmapSource::open(path)?))
            }
        }
    }
}

pub fn is_stdin(path: &Path) -> bool {
    path.as_os_str() == STDIN_PATH
}

fn open_stdin() -> Result<Input> {
    let (head, rest) = peek(io::stdin(), GZIP_MAGIC.len()).context("failed to read stdin")?;
    if head == GZIP_MAGIC {
        let joined = Cursor::new(head).chain(rest);
        Ok(Input::Stream(Box::new(MultiGzDecoder::new(BufReader::new(
            joined,
        )))))
    } else {
        Ok(Input::Stream(Box::new(Cursor::new(head).chain(rest))))
    }
}

/// Reads up to `n` bytes from the front of `reader`. Fewer are returned only
/// at end of stream.
pub fn peek<R: Read>(mut reader: R, n: usize) -> io::Result<(Vec<u8>, R)> {
    let mut head = vec![0u8; n];
    let mut filled = 0usize;
    while filled < n {
        match reader.read(&mut head[filled..]) {
            Ok(0) => break,
            Ok(k) => filled += k,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    head.truncate(filled);
    Ok((head, reader))
}

/// Sniffs the record format of a decompressed stream, handing back a reader
/// that still yields the sniffed bytes.
pub fn sniff_stream<R: Read>(reader: R) -> io::Result<(RecordFormat, impl Read)> {
    let (head, rest) = peek(reader, BAM_MAGIC.len())?;
    let format = RecordFormat::sniff(&head);
    Ok((format, Cursor::new(head).chain(rest)))
}

pub fn stream_reader<R: Read>(reader: R) -> BufReader<R> {
    BufReader::with_capacity(READ_BUF, reader)
}

pub fn detect_input_kind(path: &Path) -> Result<InputKind> {
    if let Some(ext) = path.extension().and_then(|s| s.to_str()) {
        let ext = ext.to_ascii_lowercase();
        if ext == "gz" {
            return Ok(InputKind::Gzip);
        }
    }
    let file = File::open(path).with_context(|| format!("failed to open {}", path.display()))?;
    let (magic, _) = peek(file, GZIP_MAGIC.len()).with_context(|| "failed to read magic bytes")?;
    if magic == GZIP_MAGIC {
        Ok(InputKind::Gzip)
    } else {
        Ok(InputKind::Plain)
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum GzipVariant {
    Standard,
    Mgzip,
    Bgzf,
}

fn gzip_variant(header: &[u8]) -> GzipVariant {
    if header.len() < 14 || header[..2] != GZIP_MAGIC {
        return GzipVariant::Standard;
    }
    // FEXTRA carries the block-size subfield
    if header[3] & 4 == 0 {
        return GzipVariant::Standard;
    }
    match (header[12], header[13]) {
        (b'B', b'C') => GzipVariant::Bgzf,
        (b'I', b'G') => GzipVariant::Mgzip,
        _ => GzipVariant::Standard,
    }
}

fn detect_gzip_variant(path: &Path) -> Result<GzipVariant> {
    let file = File::open(path).with_context(|| format!("failed to open {}", path.display()))?;
    let (header, _) = peek(file, 20).with_context(|| "failed to read gzip header")?;
    Ok(gzip_variant(&header))
}

/// Decompressing reader for `path`. Block-gzipped files (BGZF, as written by
/// samtools, or MGZIP) are inflated in parallel when `threads > 1`.
pub fn open_gzip_reader(path: &Path, threads: usize) -> Result<Box<dyn Read + Send>> {
    let variant = detect_gzip_variant(path)?;
    let file = File::open(path).with_context(|| format!("failed to open {}", path.display()))?;
    let reader = BufReader::new(file);
    let reader: Box<dyn Read + Send> = match variant {
        GzipVariant::Bgzf if threads > 1 => Box::new(
            ParDecompressBuilder::<Bgzf>::new()
                .num_threads(threads)
                .map_err(|e| anyhow!("invalid decompression thread count {}: {}", threads, e))?
                .from_reader(reader),
        ),
        GzipVariant::Mgzip if threads > 1 => Box::new(
            ParDecompressBuilder::<Mgzip>::new()
                .num_threads(threads)
                .map_err(|e| anyhow!("invalid decompression thread count {}: {}", threads, e))?
                .from_reader(reader),
        ),
        _ => Box::new(MultiGzDecoder::new(reader)),
    };
    log::debug!("{}: gzip variant {:?}", path.display(), variant);
    Ok(reader)
}
