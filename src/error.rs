//! Crate-wide error type.
//!
//! Fatal conditions are errors; recoverable conditions (short records,
//! zero-match patterns, duplicate file arguments) are logged and counted
//! by the operation that observes them.

use std::io;
use thiserror::Error;

use crate::interval::Interval;
use crate::relation::Relation;

/// Errors that can occur during region detection and interval merging.
#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("FASTA error: {0}")]
    Fasta(#[from] needletail::errors::ParseError),

    #[error("invalid pattern: {0}")]
    Pattern(#[from] regex::Error),

    #[error("{file}: parse error at line {line}: {message}")]
    Parse {
        file: String,
        line: usize,
        message: String,
    },

    #[error("{file}: expected header line not found: {expected}")]
    HeaderMismatch { file: String, expected: String },

    #[error("{file}: multiple references at line {line}: {previous}, {found}")]
    MultipleReferences {
        file: String,
        line: usize,
        previous: String,
        found: String,
    },

    #[error("cannot consolidate unsorted feature set for {seqid}")]
    UnsortedSet { seqid: String },

    #[error(
        "feature set {seqid} is unsorted: {keeper} is {relation} {incoming}, \
         which starts before it"
    )]
    OrderViolation {
        seqid: String,
        keeper: Interval,
        incoming: Interval,
        relation: Relation,
    },

    #[error("indeterminate relationship between {keeper} and {incoming} in {seqid}")]
    IndeterminateRelation {
        seqid: String,
        keeper: Interval,
        incoming: Interval,
    },

    #[error("cannot merge feature sets from different sequences: {accumulator}, {incoming}")]
    SeqidMismatch {
        accumulator: String,
        incoming: String,
    },

    #[error(
        "merge coverage mismatch for {seqid}: pieces cover {actual} positions, \
         inputs cover {expected}"
    )]
    CoverageInvariant {
        seqid: String,
        expected: u64,
        actual: u64,
    },

    #[error("invalid interval {seqid}:{start}-{end}: start must be less than end")]
    InvalidInterval {
        seqid: String,
        start: u64,
        end: u64,
    },

    #[error("{0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, Error>;
