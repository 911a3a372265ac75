//! Per-base coverage and mismatch accumulation.
//!
//! A [`CoverageMap`] spans one query window and holds a [`Coverage`] counter
//! per reference position. Counts reflect every accepted read, whether or
//! not it survives downsampling.

use crate::bam::record::{AlignmentRecord, BlockKind, GapKind, Strand};

/// Default mismatch threshold as a fraction of weighted depth.
pub const DEFAULT_ALLELE_FREQ_THRESHOLD: f64 = 0.2;

/// Per-position base, strand and quality counters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Coverage {
    /// Positive-strand count per base
    pub pos_a: u32,
    pub pos_t: u32,
    pub pos_c: u32,
    pub pos_g: u32,
    pub pos_n: u32,
    /// Negative-strand count per base
    pub neg_a: u32,
    pub neg_t: u32,
    pub neg_c: u32,
    pub neg_g: u32,
    pub neg_n: u32,
    /// Quality sum per base
    pub qual_a: u64,
    pub qual_t: u64,
    pub qual_c: u64,
    pub qual_g: u64,
    pub qual_n: u64,
    /// Aggregate strand counts
    pub pos: u32,
    pub neg: u32,
    /// Aggregate quality sum
    pub qual: u64,
    /// Total depth; always equals the sum of per-base strand counts
    pub total: u32,
    /// Reads deleting this position
    pub del: u32,
    /// Insertions starting at this position
    pub ins: u32,
}

impl Coverage {
    fn inc(&mut self, base: char, strand: Strand, qual: u8) {
        let (pos_count, neg_count, qual_sum) = match base {
            'A' => (&mut self.pos_a, &mut self.neg_a, &mut self.qual_a),
            'T' => (&mut self.pos_t, &mut self.neg_t, &mut self.qual_t),
            'C' => (&mut self.pos_c, &mut self.neg_c, &mut self.qual_c),
            'G' => (&mut self.pos_g, &mut self.neg_g, &mut self.qual_g),
            // N and IUPAC ambiguity codes
            _ => (&mut self.pos_n, &mut self.neg_n, &mut self.qual_n),
        };
        match strand {
            Strand::Forward => {
                *pos_count += 1;
                self.pos += 1;
            }
            Strand::Reverse => {
                *neg_count += 1;
                self.neg += 1;
            }
        }
        *qual_sum += u64::from(qual);
        self.qual += u64::from(qual);
        self.total += 1;
    }

    /// Count for `base` summed over both strands.
    #[must_use]
    pub fn base_count(&self, base: char) -> u32 {
        match base {
            'A' => self.pos_a + self.neg_a,
            'T' => self.pos_t + self.neg_t,
            'C' => self.pos_c + self.neg_c,
            'G' => self.pos_g + self.neg_g,
            _ => self.pos_n + self.neg_n,
        }
    }

    fn base_qual(&self, base: char) -> u64 {
        match base {
            'A' => self.qual_a,
            'T' => self.qual_t,
            'C' => self.qual_c,
            'G' => self.qual_g,
            _ => self.qual_n,
        }
    }

    /// Whether non-reference evidence at this position reaches
    /// `threshold x weighted depth`.
    ///
    /// Weighted by quality when a quality sum is tracked and nonzero,
    /// otherwise by raw counts.
    #[must_use]
    pub fn is_mismatch(&self, ref_base: char, threshold: f64) -> bool {
        let quality_weight = self.qual > 0;
        let weighted_depth =
            if quality_weight { self.qual as f64 } else { f64::from(self.total) };

        let mut mismatch_sum = 0f64;
        for base in ['A', 'T', 'C', 'G'] {
            if base != ref_base {
                mismatch_sum += if quality_weight {
                    self.base_qual(base) as f64
                } else {
                    f64::from(self.base_count(base))
                };
            }
        }
        mismatch_sum >= threshold * weighted_depth
    }
}

/// Coverage counters for one genomic window, indexed by offset from the
/// window start.
#[derive(Debug, Clone)]
pub struct CoverageMap {
    /// Chromosome name
    pub chr: String,
    /// Window start (0-based)
    pub bp_start: i64,
    /// One counter per position in `[bp_start, bp_start + coverage.len())`
    pub coverage: Vec<Coverage>,
    /// Largest total depth seen anywhere in the window
    pub maximum: u32,
    /// Mismatch threshold passed to [`Coverage::is_mismatch`]
    pub threshold: f64,
}

impl CoverageMap {
    /// Create an all-zero map for `[start, end)` on `chr`.
    #[must_use]
    pub fn new(chr: &str, start: i64, end: i64, threshold: f64) -> Self {
        let len = usize::try_from((end - start).max(0)).unwrap_or(0);
        Self {
            chr: chr.to_string(),
            bp_start: start,
            coverage: vec![Coverage::default(); len],
            maximum: 0,
            threshold,
        }
    }

    #[inline]
    fn index(&self, position: i64) -> Option<usize> {
        let offset = position - self.bp_start;
        if offset < 0 || offset as usize >= self.coverage.len() {
            None
        } else {
            Some(offset as usize)
        }
    }

    /// Accumulate one alignment: match blocks add base/quality evidence,
    /// deletion gaps add `del`, insertions add `ins` at their start.
    /// Soft-clipped blocks and reference skips contribute nothing.
    pub fn inc_counts(&mut self, al: &AlignmentRecord) {
        let strand = al.strand();
        for block in &al.blocks {
            if block.kind != BlockKind::Match {
                continue;
            }
            for j in 0..block.len {
                let Some(i) = self.index(block.start + j) else {
                    continue;
                };
                let seq_offset = block.seq_offset + j as usize;
                let base = al.base_at(seq_offset).unwrap_or('N');
                let qual = al.qual_at(seq_offset).unwrap_or(0);
                self.coverage[i].inc(base, strand, qual);
                self.maximum = self.maximum.max(self.coverage[i].total);
            }
        }
        for gap in &al.gaps {
            if gap.kind != GapKind::Deletion {
                continue;
            }
            for j in 0..gap.len {
                if let Some(i) = self.index(gap.start + j) {
                    self.coverage[i].del += 1;
                }
            }
        }
        for insertion in &al.insertions {
            if let Some(i) = self.index(insertion.start) {
                self.coverage[i].ins += 1;
            }
        }
    }

    /// Counter at `position`, if inside the window.
    #[must_use]
    pub fn at(&self, position: i64) -> Option<&Coverage> {
        self.index(position).map(|i| &self.coverage[i])
    }

    /// Maximum total depth over `[start, end)`.
    #[must_use]
    pub fn max_in_range(&self, start: i64, end: i64) -> u32 {
        let mut max = 0;
        for position in start..end {
            if let Some(c) = self.at(position) {
                max = max.max(c.total);
            }
        }
        max
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bam::cigar::CigarOp;
    use crate::bam::record::TagData;

    fn record(start: i64, cigar: &[(char, i64)], seq: &str, qual: Option<Vec<u8>>, flag: u16)
        -> AlignmentRecord {
        let ops: Vec<CigarOp> = cigar.iter().map(|&(op, len)| CigarOp { op, len }).collect();
        let length_on_ref = crate::bam::cigar::reference_length(&ops);
        let mut rec = AlignmentRecord {
            chr: "chr1".to_string(),
            start,
            end: start + length_on_ref,
            flags: flag,
            mapq: 60,
            cigar: crate::bam::cigar::cigar_string(&ops),
            length_on_ref,
            seq: if seq.is_empty() { None } else { Some(seq.to_string()) },
            qual,
            read_name: "r".to_string(),
            fragment_length: 0,
            mate: None,
            pair_orientation: None,
            blocks: Vec::new(),
            insertions: Vec::new(),
            gaps: Vec::new(),
            sc_start: start,
            sc_length_on_ref: length_on_ref,
            tag_data: TagData::Raw(Vec::new()),
        };
        rec.make_blocks(&ops);
        rec
    }

    #[test]
    fn test_basic_counts() {
        let mut map = CoverageMap::new("chr1", 100, 120, DEFAULT_ALLELE_FREQ_THRESHOLD);
        map.inc_counts(&record(100, &[('M', 4)], "ACGT", Some(vec![10, 20, 30, 40]), 0));

        let c = map.at(100).unwrap();
        assert_eq!(c.pos_a, 1);
        assert_eq!(c.total, 1);
        assert_eq!(c.qual_a, 10);
        let c = map.at(103).unwrap();
        assert_eq!(c.pos_t, 1);
        assert_eq!(c.qual_t, 40);
        assert_eq!(map.at(104).unwrap().total, 0);
        assert_eq!(map.maximum, 1);
    }

    #[test]
    fn test_strand_split() {
        let mut map = CoverageMap::new("chr1", 0, 10, DEFAULT_ALLELE_FREQ_THRESHOLD);
        map.inc_counts(&record(0, &[('M', 1)], "A", Some(vec![7]), 0));
        map.inc_counts(&record(0, &[('M', 1)], "A", Some(vec![9]), crate::bam::flags::REVERSE));

        let c = map.at(0).unwrap();
        assert_eq!(c.pos_a, 1);
        assert_eq!(c.neg_a, 1);
        assert_eq!(c.pos, 1);
        assert_eq!(c.neg, 1);
        assert_eq!(c.total, 2);
        assert_eq!(c.qual, 16);
        // Invariant: total equals the per-base sum
        assert_eq!(
            c.total,
            c.pos_a + c.neg_a + c.pos_t + c.neg_t + c.pos_c + c.neg_c + c.pos_g + c.neg_g
                + c.pos_n + c.neg_n
        );
    }

    #[test]
    fn test_soft_clip_not_counted() {
        let mut map = CoverageMap::new("chr1", 95, 120, DEFAULT_ALLELE_FREQ_THRESHOLD);
        map.inc_counts(&record(100, &[('S', 3), ('M', 4)], "NNNACGT", Some(vec![30; 7]), 0));

        assert_eq!(map.at(97).unwrap().total, 0);
        assert_eq!(map.at(99).unwrap().total, 0);
        assert_eq!(map.at(100).unwrap().total, 1);
        assert_eq!(map.at(100).unwrap().pos_a, 1);
    }

    #[test]
    fn test_deletion_and_insertion_counts() {
        // 2M3D2M with a 1-base insertion after the first match block
        let mut map = CoverageMap::new("chr1", 0, 20, DEFAULT_ALLELE_FREQ_THRESHOLD);
        map.inc_counts(&record(
            0,
            &[('M', 2), ('I', 1), ('D', 3), ('M', 2)],
            "ACGTA",
            Some(vec![30; 5]),
            0,
        ));

        assert_eq!(map.at(2).unwrap().del, 1);
        assert_eq!(map.at(3).unwrap().del, 1);
        assert_eq!(map.at(4).unwrap().del, 1);
        assert_eq!(map.at(2).unwrap().ins, 1);
        assert_eq!(map.at(5).unwrap().total, 1);
        // Skips contribute nothing
        let mut map2 = CoverageMap::new("chr1", 0, 40, DEFAULT_ALLELE_FREQ_THRESHOLD);
        map2.inc_counts(&record(0, &[('M', 2), ('N', 20), ('M', 2)], "ACGT", None, 0));
        assert_eq!(map2.at(5).unwrap().del, 0);
        assert_eq!(map2.at(5).unwrap().total, 0);
    }

    #[test]
    fn test_missing_sequence_counts_n() {
        let mut map = CoverageMap::new("chr1", 0, 10, DEFAULT_ALLELE_FREQ_THRESHOLD);
        map.inc_counts(&record(0, &[('M', 3)], "", None, 0));
        let c = map.at(1).unwrap();
        assert_eq!(c.pos_n, 1);
        assert_eq!(c.qual, 0);
    }

    #[test]
    fn test_out_of_window_positions_ignored() {
        let mut map = CoverageMap::new("chr1", 100, 110, DEFAULT_ALLELE_FREQ_THRESHOLD);
        // Spans 95..115, only 100..110 is inside the window
        map.inc_counts(&record(95, &[('M', 20)], &"A".repeat(20), Some(vec![30; 20]), 0));
        assert_eq!(map.at(100).unwrap().total, 1);
        assert!(map.at(95).is_none());
        assert!(map.at(110).is_none());
    }

    #[test]
    fn test_is_mismatch_quality_weighted() {
        let mut c = Coverage::default();
        // 8 high-quality ref bases, 2 high-quality alt bases
        for _ in 0..8 {
            c.inc('A', Strand::Forward, 30);
        }
        c.inc('G', Strand::Forward, 30);
        c.inc('G', Strand::Reverse, 30);

        // Alt fraction = 60/300 = 0.2 >= threshold
        assert!(c.is_mismatch('A', 0.2));
        assert!(!c.is_mismatch('A', 0.25));
        // From G's point of view, mismatch fraction is 0.8
        assert!(c.is_mismatch('G', 0.2));
    }

    #[test]
    fn test_is_mismatch_count_weighted_without_quality() {
        let mut c = Coverage::default();
        for _ in 0..9 {
            c.inc('A', Strand::Forward, 0);
        }
        c.inc('T', Strand::Forward, 0);
        // No quality tracked: weighted depth falls back to raw total
        assert!(c.is_mismatch('A', 0.1));
        assert!(!c.is_mismatch('A', 0.2));
    }

    #[test]
    fn test_max_in_range() {
        let mut map = CoverageMap::new("chr1", 0, 30, DEFAULT_ALLELE_FREQ_THRESHOLD);
        for _ in 0..3 {
            map.inc_counts(&record(10, &[('M', 5)], "ACGTA", Some(vec![30; 5]), 0));
        }
        map.inc_counts(&record(20, &[('M', 5)], "ACGTA", Some(vec![30; 5]), 0));

        assert_eq!(map.max_in_range(0, 30), 3);
        assert_eq!(map.max_in_range(16, 30), 1);
        assert_eq!(map.max_in_range(0, 10), 0);
        assert_eq!(map.maximum, 3);
    }
}
