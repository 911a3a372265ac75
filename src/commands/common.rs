//! Shared argument groups and input loading for the CLI commands.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use bamlens_lib::bam::AlignmentFilter;
use bamlens_lib::container::ContainerOptions;
use clap::Parser;
use noodles::bgzf;
use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};

/// Input options shared by all commands.
#[derive(Debug, Parser)]
pub struct InputOptions {
    /// Input BAM file (BGZF-compressed or already decompressed)
    #[arg(short = 'i', long = "input")]
    pub input: PathBuf,
}

/// The genomic region a command operates on.
#[derive(Debug, Parser)]
pub struct RegionOptions {
    /// Region to query, as chr:start-end (1-based, e.g. chr1:10,000-20,000)
    #[arg(short = 'r', long = "region")]
    pub region: String,
}

/// A parsed query region with 0-based half-open coordinates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Region {
    pub chr: String,
    pub start: i64,
    pub end: i64,
}

impl RegionOptions {
    /// Parse the region string.
    pub fn parse(&self) -> Result<Region> {
        parse_region(&self.region)
    }
}

/// Parse `chr:start-end` (1-based, commas allowed) into 0-based half-open
/// coordinates.
pub fn parse_region(region: &str) -> Result<Region> {
    let (chr, range) = region
        .rsplit_once(':')
        .with_context(|| format!("region '{region}' is not of the form chr:start-end"))?;
    let (start_str, end_str) = range
        .split_once('-')
        .with_context(|| format!("region '{region}' is not of the form chr:start-end"))?;

    let parse_coord = |s: &str| -> Result<i64> {
        s.replace(',', "")
            .parse::<i64>()
            .with_context(|| format!("unparsable coordinate '{s}' in region '{region}'"))
    };
    let start = parse_coord(start_str)?;
    let end = parse_coord(end_str)?;

    if chr.is_empty() {
        bail!("region '{region}' has an empty chromosome name");
    }
    if start < 1 || end < start {
        bail!("region '{region}' has an invalid coordinate range");
    }

    Ok(Region { chr: chr.to_string(), start: start - 1, end })
}

/// Downsampling options shared by all commands.
#[derive(Debug, Parser)]
pub struct SamplingOptions {
    /// Genomic width of each downsampling window
    #[arg(long = "sampling-window", default_value_t = 100)]
    pub sampling_window_size: i64,

    /// Maximum reads kept per downsampling window
    #[arg(long = "sampling-depth", default_value_t = 1000)]
    pub sampling_depth: usize,

    /// Random seed for reproducible downsampling
    #[arg(long = "seed")]
    pub seed: Option<u64>,

    /// Do not reconcile mate pairs during ingestion
    #[arg(long = "no-pairs", default_value_t = false)]
    pub no_pairs: bool,
}

impl SamplingOptions {
    /// Build the reservoir's random source, seeded when requested.
    #[must_use]
    pub fn rng(&self) -> Box<dyn RngCore> {
        match self.seed {
            Some(seed) => Box::new(StdRng::seed_from_u64(seed)),
            None => Box::new(rand::rng()),
        }
    }
}

/// Read filtering options shared by all commands.
#[derive(Debug, Parser)]
pub struct FilterOptions {
    /// Keep reads failing vendor QC
    #[arg(long = "keep-vendor-failed", default_value_t = false)]
    pub keep_vendor_failed: bool,

    /// Keep PCR/optical duplicates
    #[arg(long = "keep-duplicates", default_value_t = false)]
    pub keep_duplicates: bool,

    /// Reject secondary alignments
    #[arg(long = "filter-secondary", default_value_t = false)]
    pub filter_secondary: bool,

    /// Reject supplementary alignments
    #[arg(long = "filter-supplementary", default_value_t = false)]
    pub filter_supplementary: bool,

    /// Minimum mapping quality
    #[arg(long = "min-mapq", default_value_t = 0)]
    pub min_mapq: u8,

    /// Only keep reads from this read group (repeatable)
    #[arg(long = "readgroup")]
    pub readgroups: Vec<String>,
}

impl FilterOptions {
    /// Translate CLI flags into an [`AlignmentFilter`].
    #[must_use]
    pub fn to_filter(&self) -> AlignmentFilter {
        AlignmentFilter {
            vendor_failed: !self.keep_vendor_failed,
            duplicates: !self.keep_duplicates,
            secondary: self.filter_secondary,
            supplementary: self.filter_supplementary,
            mq: self.min_mapq,
            readgroups: if self.readgroups.is_empty() {
                None
            } else {
                Some(self.readgroups.iter().cloned().collect())
            },
        }
    }
}

/// Assemble container options from the shared argument groups.
pub fn container_options(sampling: &SamplingOptions, filter: &FilterOptions)
    -> Result<ContainerOptions> {
    let options = ContainerOptions {
        sampling_window_size: sampling.sampling_window_size,
        sampling_depth: sampling.sampling_depth,
        pairs_supported: !sampling.no_pairs,
        filter: filter.to_filter(),
        ..ContainerOptions::default()
    };
    options.validate()?;
    Ok(options)
}

/// Decode one region of a decompressed BAM buffer into a finished container.
pub fn ingest_region(
    bytes: &[u8],
    region: &Region,
    options: ContainerOptions,
    rng: Box<dyn RngCore>,
) -> Result<bamlens_lib::container::AlignmentContainer> {
    let header = bamlens_lib::bam::decode_header(bytes)?;
    let Some(chr_idx) = header.chr_index(&region.chr) else {
        bail!(
            "chromosome '{}' not found in header ({} references)",
            region.chr,
            header.chr_names.len()
        );
    };

    let mut container = bamlens_lib::container::AlignmentContainer::new(
        &region.chr,
        region.start,
        region.end,
        options,
        rng,
    );
    bamlens_lib::bam::decode_records(
        bytes,
        header.size,
        &header.chr_names,
        Some(chr_idx),
        region.start,
        region.end,
        None,
        &mut container,
    )?;
    container.finish();
    Ok(container)
}

const BGZF_HEADER_SIZE: usize = 18;

/// Check whether a file starts with a valid BGZF header.
/// Returns `Ok(false)` for too-small files or plain uncompressed input.
fn is_bgzf<R: Read + Seek>(reader: &mut R) -> std::io::Result<bool> {
    let mut header = [0u8; BGZF_HEADER_SIZE];
    let result = match reader.read_exact(&mut header) {
        Ok(()) => {
            Ok(header[0..2] == [0x1f, 0x8b]      // gzip magic
                && header[2] == 0x08              // DEFLATE
                && header[3] == 0x04              // FEXTRA
                && header[12..14] == [b'B', b'C'] // BC subfield
                && header[14..16] == [0x02, 0x00]) // SLEN=2
        }
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => Ok(false),
        Err(e) => Err(e),
    };
    reader.seek(SeekFrom::Start(0))?;
    result
}

/// Load a BAM file as a decompressed byte buffer, inflating BGZF input.
pub fn load_bam_bytes(path: &Path) -> Result<Vec<u8>> {
    let mut file =
        File::open(path).with_context(|| format!("failed to open '{}'", path.display()))?;

    let mut bytes = Vec::new();
    if is_bgzf(&mut file)? {
        let mut reader = bgzf::io::Reader::new(file);
        reader
            .read_to_end(&mut bytes)
            .with_context(|| format!("failed to inflate '{}'", path.display()))?;
    } else {
        file.read_to_end(&mut bytes)
            .with_context(|| format!("failed to read '{}'", path.display()))?;
    }
    Ok(bytes)
}
