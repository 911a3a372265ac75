//! Mate-pair wrappers.
//!
//! A [`PairedAlignment`] spans two mates sharing a read name. It is created
//! from the first mate seen (using the mate summary to approximate the
//! combined span) and refined when the second mate arrives.

use crate::bam::record::{AlignmentRecord, Strand};

/// Whether a record is eligible for pairing: paired, mate mapped on the same
/// chromosome, first or second of its pair, and not secondary/supplementary.
#[must_use]
pub fn can_be_paired(al: &AlignmentRecord) -> bool {
    al.is_paired()
        && al.is_mate_mapped()
        && al.mate.as_ref().is_some_and(|m| m.chr == al.chr)
        && (al.is_first_of_pair() || al.is_second_of_pair())
        && !(al.is_secondary() || al.is_supplementary())
}

/// Two mates sharing a read name, presented as one span.
#[derive(Debug, Clone)]
pub struct PairedAlignment {
    /// Shared read name
    pub read_name: String,
    /// Chromosome of both mates
    pub chr: String,
    /// Combined span start
    pub start: i64,
    /// Combined span end
    pub end: i64,
    /// Combined start including soft clips
    pub sc_start: i64,
    /// Combined reference length including soft clips
    pub sc_length_on_ref: i64,
    /// The mate seen first
    pub first: AlignmentRecord,
    /// The other mate, once it arrives
    pub second: Option<AlignmentRecord>,
}

impl PairedAlignment {
    /// Wrap the first mate seen. The span end is approximated from the mate
    /// position until [`set_second`](Self::set_second) refines it.
    ///
    /// # Panics
    ///
    /// Panics if `first` carries no mate summary; callers guard with
    /// [`can_be_paired`].
    #[must_use]
    pub fn new(first: AlignmentRecord) -> Self {
        let mate = first.mate.as_ref().expect("pairable alignment must carry mate info");

        let (start, sc_start) = if first.start < mate.position {
            (first.start, first.sc_start)
        } else {
            (mate.position, mate.position)
        };
        let end = mate.position.max(first.start + first.length_on_ref);
        let sc_end = end.max(first.sc_end());

        Self {
            read_name: first.read_name.clone(),
            chr: first.chr.clone(),
            start,
            end,
            sc_start,
            sc_length_on_ref: sc_end - sc_start,
            first,
            second: None,
        }
    }

    /// Attach the second mate and recompute the combined span.
    pub fn set_second(&mut self, second: AlignmentRecord) {
        assert_eq!(
            self.read_name, second.read_name,
            "paired alignment mates must share a read name"
        );

        self.start = self.first.start.min(second.start);
        self.end = (self.first.start + self.first.length_on_ref)
            .max(second.start + second.length_on_ref);

        self.sc_start = self.first.sc_start.min(second.sc_start);
        let sc_end = self.first.sc_end().max(second.sc_end());
        self.sc_length_on_ref = sc_end - self.sc_start;

        self.second = Some(second);
    }

    /// Combined end including soft clips.
    #[inline]
    #[must_use]
    pub fn sc_end(&self) -> i64 {
        self.sc_start + self.sc_length_on_ref
    }

    /// Absolute template length of the pair.
    #[inline]
    #[must_use]
    pub fn fragment_length(&self) -> i64 {
        self.first.fragment_length.abs()
    }

    /// Whether the pair is flagged proper.
    #[inline]
    #[must_use]
    pub fn is_proper_pair(&self) -> bool {
        self.first.is_proper_pair()
    }

    /// Pair orientation, from the first mate.
    #[must_use]
    pub fn pair_orientation(&self) -> Option<&str> {
        self.first.pair_orientation.as_deref()
    }
}

/// A finished-container entry: one read, or a pair presented as one span.
#[derive(Debug, Clone)]
pub enum Alignment {
    /// An unpaired (or unpairable) record
    Single(AlignmentRecord),
    /// A mate pair
    Paired(Box<PairedAlignment>),
}

impl Alignment {
    /// Span start.
    #[must_use]
    pub fn start(&self) -> i64 {
        match self {
            Alignment::Single(al) => al.start,
            Alignment::Paired(pair) => pair.start,
        }
    }

    /// Span end.
    #[must_use]
    pub fn end(&self) -> i64 {
        match self {
            Alignment::Single(al) => al.end,
            Alignment::Paired(pair) => pair.end,
        }
    }

    /// Span start including soft clips.
    #[must_use]
    pub fn sc_start(&self) -> i64 {
        match self {
            Alignment::Single(al) => al.sc_start,
            Alignment::Paired(pair) => pair.sc_start,
        }
    }

    /// Span end including soft clips.
    #[must_use]
    pub fn sc_end(&self) -> i64 {
        match self {
            Alignment::Single(al) => al.sc_end(),
            Alignment::Paired(pair) => pair.sc_end(),
        }
    }

    /// Read name.
    #[must_use]
    pub fn read_name(&self) -> &str {
        match self {
            Alignment::Single(al) => &al.read_name,
            Alignment::Paired(pair) => &pair.read_name,
        }
    }

    /// Strand of the single record or of the pair's first mate.
    #[must_use]
    pub fn strand(&self) -> Strand {
        match self {
            Alignment::Single(al) => al.strand(),
            Alignment::Paired(pair) => pair.first.strand(),
        }
    }

    /// Strand of the first-of-pair read, when determinable.
    #[must_use]
    pub fn first_of_pair_strand(&self) -> Option<Strand> {
        match self {
            Alignment::Single(al) => al.first_of_pair_strand(),
            Alignment::Paired(pair) => pair.first.first_of_pair_strand(),
        }
    }

    /// Number of underlying records (1 or 2).
    #[must_use]
    pub fn record_count(&self) -> usize {
        match self {
            Alignment::Single(_) => 1,
            Alignment::Paired(pair) => 1 + usize::from(pair.second.is_some()),
        }
    }
}
