//! Decode a region and print its per-position coverage.

use anyhow::Result;
use bamlens_lib::logging::{format_count, OperationTimer};
use clap::Parser;
use log::info;

use crate::commands::command::Command;
use crate::commands::common::{
    container_options, ingest_region, load_bam_bytes, FilterOptions, InputOptions, RegionOptions,
    SamplingOptions,
};

/// Decode a region of a BAM file and print per-position coverage as TSV.
///
/// Columns: chrom, 1-based position, total depth, per-base counts (A/C/G/T/N
/// summed over strands), deletions, insertions, quality sum.
#[derive(Debug, Parser)]
#[command(name = "pileup", about = "Decode a region and print per-position coverage")]
pub struct Pileup {
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

    /// Also print zero-depth positions
    #[arg(long = "all-positions", default_value_t = false)]
    pub all_positions: bool,
}

impl Command for Pileup {
    fn execute(&self) -> Result<()> {
        let region = self.region.parse()?;
        let options = container_options(&self.sampling, &self.filter)?;

        let timer = OperationTimer::new("Computing pileup");
        info!("Input: {}", self.input.input.display());
        info!("Region: {}:{}-{}", region.chr, region.start + 1, region.end);

        let bytes = load_bam_bytes(&self.input.input)?;
        let container = ingest_region(&bytes, &region, options, self.sampling.rng())?;

        println!("chrom\tpos\tdepth\ta\tc\tg\tt\tn\tdel\tins\tqual");
        let mut printed = 0u64;
        for position in region.start..region.end {
            let Some(coverage) = container.coverage.at(position) else {
                continue;
            };
            if coverage.total == 0 && coverage.del == 0 && !self.all_positions {
                continue;
            }
            println!(
                "{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}",
                region.chr,
                position + 1,
                coverage.total,
                coverage.base_count('A'),
                coverage.base_count('C'),
                coverage.base_count('G'),
                coverage.base_count('T'),
                coverage.base_count('N'),
                coverage.del,
                coverage.ins,
                coverage.qual,
            );
            printed += 1;
        }

        info!("Positions printed: {}", format_count(printed));
        info!(
            "Max coverage in region: {}",
            container.query_coverage_max(region.start, region.end)
        );
        timer.log_completion(printed);
        Ok(())
    }
}
