//! BAM record model and binary decoding.
//!
//! - [`decoder`] - header and record decoding from a decompressed byte stream
//! - [`record`] - the decoded [`record::AlignmentRecord`] and its
//!   CIGAR-derived blocks, insertions and gaps
//! - [`tags`] - lazy auxiliary tag decoding
//! - [`filter`] - pass/reject rules applied before ingestion
//! - [`flags`] / [`cigar`] - the SAM flag bits and CIGAR op tables

pub mod cigar;
pub mod decoder;
pub mod filter;
pub mod flags;
pub mod record;
pub mod tags;

#[doc(hidden)]
pub mod testutil;

pub use decoder::{decode_header, decode_records, AlignmentSink, BamHeader};
pub use filter::AlignmentFilter;
pub use record::{
    AlignmentBlock, AlignmentRecord, BlockKind, Gap, GapKind, Insertion, MateInfo, Strand,
};
pub use tags::{TagMap, TagValue};
