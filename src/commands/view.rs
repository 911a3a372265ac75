//! Decode a region and print its packed row layout.

use anyhow::Result;
use bamlens_lib::logging::{format_count, OperationTimer};
use bamlens_lib::pairs::Alignment;
use bamlens_lib::rows::{GroupBy, PackOptions};
use clap::Parser;
use itertools::Itertools;
use log::info;

use crate::commands::command::Command;
use crate::commands::common::{
    container_options, ingest_region, load_bam_bytes, FilterOptions, InputOptions, RegionOptions,
    SamplingOptions,
};

/// Decode a region of a BAM file and print its display-row layout.
///
/// Each output line is one display row; alignments in a row never overlap.
/// Mate pairs can be shown merged into single spans, and layout can honor
/// soft-clipped bases.
#[derive(Debug, Parser)]
#[command(
    name = "view",
    about = "Decode a region and print its packed alignment rows"
)]
pub struct View {
    /// Input options
    #[command(flatten)]
    pub input: InputOptions,

    /// Region options
    #[command(flatten)]
    pub region: RegionOptions,

    /// Downsampling options
    #[command(flatten)]
    pub sampling: SamplingOptions,

    /// Filter options
    #[command(flatten)]
    pub filter: FilterOptions,

    /// Merge mate pairs into single spans
    #[arg(long = "pairs", default_value_t = false)]
    pub view_as_pairs: bool,

    /// Position alignments by their soft-clipped extents
    #[arg(long = "soft-clips", default_value_t = false)]
    pub show_soft_clips: bool,

    /// Group rows by read strand
    #[arg(long = "group-by-strand", conflicts_with = "group_by_tag")]
    pub group_by_strand: bool,

    /// Group rows by a tag value (e.g. HP)
    #[arg(long = "group-by-tag")]
    pub group_by_tag: Option<String>,
}

impl Command for View {
    fn execute(&self) -> Result<()> {
        let region = self.region.parse()?;
        let options = container_options(&self.sampling, &self.filter)?;

        let timer = OperationTimer::new("Packing alignment rows");
        info!("Input: {}", self.input.input.display());
        info!("Region: {}:{}-{}", region.chr, region.start + 1, region.end);

        let bytes = load_bam_bytes(&self.input.input)?;
        let container = ingest_region(&bytes, &region, options, self.sampling.rng())?;

        let group_by = if self.group_by_strand {
            Some(GroupBy::Strand)
        } else {
            self.group_by_tag.clone().map(GroupBy::Tag)
        };
        let rows = container.pack_rows(&PackOptions {
            view_as_pairs: self.view_as_pairs,
            show_soft_clips: self.show_soft_clips,
            group_by,
        });

        let mut placed = 0u64;
        for (i, row) in rows.iter().enumerate() {
            placed += row.alignments.len() as u64;
            let label = row.group.as_deref().map(|g| format!(" [{g}]")).unwrap_or_default();
            let line = row
                .alignments
                .iter()
                .map(|al| format_alignment(al, self.show_soft_clips))
                .join(" ");
            println!("row {i:>4}{label}: {line}");
        }

        info!("Alignments kept: {}", format_count(container.alignments.len() as u64));
        info!("Rows: {}", format_count(rows.len() as u64));
        info!(
            "Max coverage in region: {}",
            container.query_coverage_max(region.start, region.end)
        );
        if container.has_downsampled_intervals() {
            for interval in &container.downsampled_intervals {
                info!(
                    "Downsampled window {}-{}: {} read(s) discarded",
                    interval.start + 1,
                    interval.end,
                    interval.count
                );
            }
        }
        if let Some(summary) = container.pair_stats.summary {
            info!(
                "Fragment length mean {:.1} (3-sigma bounds {:.1}..{:.1}){}",
                summary.mean,
                summary.lower,
                summary.upper,
                summary
                    .dominant_orientation
                    .map(|o| format!(", dominant orientation {o}"))
                    .unwrap_or_default()
            );
        }

        timer.log_completion(placed);
        Ok(())
    }
}

fn format_alignment(al: &Alignment, show_soft_clips: bool) -> String {
    let (start, end) =
        if show_soft_clips { (al.sc_start(), al.sc_end()) } else { (al.start(), al.end()) };
    let marker = match al {
        Alignment::Paired(pair) if pair.second.is_some() => "=",
        Alignment::Paired(_) => "~",
        Alignment::Single(_) => "",
    };
    format!("{}{}:{}-{}", marker, al.read_name(), start + 1, end)
}
