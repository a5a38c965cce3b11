use std::io;
use thiserror::Error;

/// Failures while turning SAM/BAM bytes into normalized alignments.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("invalid SAM record at line {line}: {msg}")]
    InvalidSam { line: u64, msg: String },

    #[error("invalid BAM header: {0}")]
    InvalidBamHeader(String),

    #[error("invalid BAM record #{record}: {msg}")]
    InvalidBam { record: u64, msg: String },
}

impl DecodeError {
    pub fn sam(line: u64, msg: impl Into<String>) -> Self {
        DecodeError::InvalidSam {
            line,
            msg: msg.into(),
        }
    }

    pub fn bam(record: u64, msg: impl Into<String>) -> Self {
        DecodeError::InvalidBam {
            record,
            msg: msg.into(),
        }
    }
}
