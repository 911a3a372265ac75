#![deny(unsafe_code)]
#![allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_possible_wrap,
    clippy::cast_sign_loss,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::module_name_repetitions,
    clippy::struct_excessive_bools,
    clippy::uninlined_format_args
)]

//! # bamlens - Alignment-Track Core Library
//!
//! Data structures and algorithms behind an alignment track: binary BAM
//! record decoding, per-base coverage/pileup accumulation, bounded-memory
//! reservoir downsampling with mate pairing, greedy row packing for display,
//! and a generic chunked interval cache for range queries.
//!
//! ## Pipeline
//!
//! Raw decompressed bytes flow through [`bam::decode_records`] into an
//! [`container::AlignmentContainer`], which updates coverage per record,
//! admits records through a per-window reservoir, reconciles mate pairs,
//! and - once finished - hands its sorted alignment list to
//! [`rows::pack`] for display layout:
//!
//! ```no_run
//! use bamlens_lib::bam::{decode_header, decode_records};
//! use bamlens_lib::container::{AlignmentContainer, ContainerOptions};
//! use bamlens_lib::rows::PackOptions;
//!
//! # fn main() -> anyhow::Result<()> {
//! # let bytes: Vec<u8> = Vec::new();
//! let header = decode_header(&bytes)?;
//! let chr_idx = header.chr_index("chr1");
//!
//! let mut container = AlignmentContainer::new(
//!     "chr1",
//!     10_000,
//!     20_000,
//!     ContainerOptions::default(),
//!     Box::new(rand::rng()),
//! );
//! decode_records(
//!     &bytes, header.size, &header.chr_names, chr_idx, 10_000, 20_000, None,
//!     &mut container,
//! )?;
//! container.finish();
//!
//! let rows = container.pack_rows(&PackOptions::default());
//! # Ok(())
//! # }
//! ```
//!
//! The pipeline for a single query is synchronous and single-threaded and
//! relies on coordinate-sorted input. Independent queries share no mutable
//! state; cancel one by dropping its container.
//!
//! ## Modules
//!
//! - **[`bam`]** - record model, binary decoder, tags, filtering
//! - **[`container`]** - downsampling and pairing engine
//! - **[`coverage`]** - per-base nucleotide/quality/gap counters
//! - **[`rows`]** - greedy display-row packing
//! - **[`interval`]** - chunked interval tree and chromosome-keyed cache
//! - **[`features`]** - minimal generic features for the cache
//! - **[`stats`]** - paired-end fragment statistics
//! - **[`pairs`]** - mate-pair wrappers
//! - **[`errors`]** / **[`logging`]** - error types and log formatting

pub mod bam;
pub mod container;
pub mod coverage;
pub mod errors;
pub mod features;
pub mod interval;
pub mod logging;
pub mod pairs;
pub mod rows;
pub mod stats;

pub use errors::{BamlensError, Result};
