//! Alignment filtering.

use ahash::AHashSet;

use crate::bam::record::AlignmentRecord;
use crate::errors::Result;

/// Pass/reject rules applied to each decoded record before ingestion.
///
/// Boolean options name the class of read that is *rejected* when the option
/// is on. Defaults reject vendor-failed reads and duplicates and keep
/// everything else.
#[derive(Debug, Clone)]
pub struct AlignmentFilter {
    /// Reject reads failing vendor QC
    pub vendor_failed: bool,
    /// Reject PCR/optical duplicates
    pub duplicates: bool,
    /// Reject secondary alignments
    pub secondary: bool,
    /// Reject supplementary alignments
    pub supplementary: bool,
    /// Minimum mapping quality
    pub mq: u8,
    /// When set, only reads whose `RG` tag is in the set pass
    pub readgroups: Option<AHashSet<String>>,
}

impl Default for AlignmentFilter {
    fn default() -> Self {
        Self {
            vendor_failed: true,
            duplicates: true,
            secondary: false,
            supplementary: false,
            mq: 0,
            readgroups: None,
        }
    }
}

impl AlignmentFilter {
    /// Whether `al` passes the filter.
    ///
    /// # Errors
    ///
    /// The read-group check decodes tags lazily and can hit an unsupported
    /// tag type.
    pub fn pass(&self, al: &mut AlignmentRecord) -> Result<bool> {
        if self.vendor_failed && al.is_vendor_failed() {
            return Ok(false);
        }
        if self.duplicates && al.is_duplicate() {
            return Ok(false);
        }
        if self.secondary && al.is_secondary() {
            return Ok(false);
        }
        if self.supplementary && al.is_supplementary() {
            return Ok(false);
        }
        if al.mapq < self.mq {
            return Ok(false);
        }
        if let Some(readgroups) = &self.readgroups {
            let rg = al.tag("RG")?.and_then(|v| v.as_str().map(str::to_string));
            return Ok(rg.is_some_and(|rg| readgroups.contains(&rg)));
        }
        Ok(true)
    }
}
