//! Greedy row packing for alignment display.
//!
//! Alignments are laid out into rows such that no two alignments in a row
//! overlap (with a 2bp spacer). Items are bucketed by start offset; each row
//! is built by repeatedly taking the earliest-positioned unplaced item whose
//! start is at or past the row cursor.

use std::collections::{BTreeMap, VecDeque};

use crate::pairs::{can_be_paired, Alignment, PairedAlignment};

/// Minimum gap between adjacent alignments in a row, in bases.
const ALIGNMENT_SPACE: i64 = 2;

/// Optional partition applied before packing; each group is packed
/// independently.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GroupBy {
    /// Read strand
    Strand,
    /// Strand of the first-of-pair read
    FirstInPairStrand,
    /// Value of a tag (e.g. `HP`)
    Tag(String),
}

/// Row layout options.
#[derive(Debug, Clone, Default)]
pub struct PackOptions {
    /// Merge mates into single spans before packing
    pub view_as_pairs: bool,
    /// Position items by their soft-clip-adjusted coordinates
    pub show_soft_clips: bool,
    /// Partition items into labeled groups before packing
    pub group_by: Option<GroupBy>,
}

/// One display row: non-overlapping alignments in start order.
#[derive(Debug, Clone, Default)]
pub struct AlignmentRow {
    /// Alignments in the row, left to right
    pub alignments: Vec<Alignment>,
    /// Group label when packing was grouped
    pub group: Option<String>,
}

/// Merge pairable single records into [`PairedAlignment`] spans.
///
/// Items that are already pairs, or that cannot be paired, pass through.
#[must_use]
pub fn pair_alignments(items: Vec<Alignment>) -> Vec<Alignment> {
    let mut cache: ahash::AHashMap<String, usize> = ahash::AHashMap::new();
    let mut result: Vec<Alignment> = Vec::with_capacity(items.len());

    for item in items {
        match item {
            Alignment::Single(al) if can_be_paired(&al) => {
                if let Some(&i) = cache.get(&al.read_name) {
                    let name = al.read_name.clone();
                    match &mut result[i] {
                        Alignment::Paired(pair) => pair.set_second(al),
                        Alignment::Single(_) => unreachable!("cache only indexes pairs"),
                    }
                    cache.remove(&name);
                } else {
                    cache.insert(al.read_name.clone(), result.len());
                    result.push(Alignment::Paired(Box::new(PairedAlignment::new(al))));
                }
            }
            other => result.push(other),
        }
    }
    result
}

/// Split [`PairedAlignment`] spans back into their mate records.
#[must_use]
pub fn unpair_alignments(items: Vec<Alignment>) -> Vec<Alignment> {
    let mut result = Vec::with_capacity(items.len());
    for item in items {
        match item {
            Alignment::Paired(pair) => {
                let pair = *pair;
                result.push(Alignment::Single(pair.first));
                if let Some(second) = pair.second {
                    result.push(Alignment::Single(second));
                }
            }
            single => result.push(single),
        }
    }
    result
}

/// Pack `items` into rows for the visible window `[start, end]`, applying
/// the pair/soft-clip/group toggles first.
#[must_use]
pub fn pack(items: Vec<Alignment>, start: i64, end: i64, options: &PackOptions)
    -> Vec<AlignmentRow> {
    let items =
        if options.view_as_pairs { pair_alignments(items) } else { unpair_alignments(items) };

    match &options.group_by {
        None => pack_alignment_rows(items, start, end, options.show_soft_clips),
        Some(group_by) => {
            let mut groups: BTreeMap<String, Vec<Alignment>> = BTreeMap::new();
            let mut ungrouped: Vec<Alignment> = Vec::new();
            for mut item in items {
                match group_value(&mut item, group_by) {
                    Some(label) => groups.entry(label).or_default().push(item),
                    None => ungrouped.push(item),
                }
            }

            let mut rows = Vec::new();
            for (label, group_items) in groups {
                for mut row in
                    pack_alignment_rows(group_items, start, end, options.show_soft_clips)
                {
                    row.group = Some(label.clone());
                    rows.push(row);
                }
            }
            // Ungrouped items land last, as their own block of rows
            rows.extend(pack_alignment_rows(ungrouped, start, end, options.show_soft_clips));
            rows
        }
    }
}

fn group_value(item: &mut Alignment, group_by: &GroupBy) -> Option<String> {
    match group_by {
        GroupBy::Strand => Some(item.strand().to_string()),
        GroupBy::FirstInPairStrand => item.first_of_pair_strand().map(|s| s.to_string()),
        GroupBy::Tag(name) => {
            let record = match item {
                Alignment::Single(al) => al,
                Alignment::Paired(pair) => &mut pair.first,
            };
            // A tag block that fails to decode simply leaves the item
            // ungrouped
            record.tag(name).ok().flatten().map(|v| v.to_string())
        }
    }
}

/// Greedy bucketed packing of a flat item list.
///
/// Rows are built left to right; the cursor advances to `item end + 2bp`
/// after each placement and restarts at the leftmost bucket when no
/// admissible item remains before the visible end. A full pass that places
/// nothing terminates the layout.
#[must_use]
pub fn pack_alignment_rows(mut items: Vec<Alignment>, start: i64, end: i64,
    show_soft_clips: bool) -> Vec<AlignmentRow> {
    if items.is_empty() {
        return Vec::new();
    }

    let item_start =
        |a: &Alignment| if show_soft_clips { a.sc_start() } else { a.start() };
    let item_end = |a: &Alignment| if show_soft_clips { a.sc_end() } else { a.end() };

    items.sort_by_key(item_start);
    let bucket_start = start.max(item_start(&items[0]));

    let total = items.len();
    let mut buckets: BTreeMap<i64, VecDeque<Alignment>> = BTreeMap::new();
    for item in items {
        let key = bucket_start.max(item_start(&item));
        buckets.entry(key).or_default().push_back(item);
    }

    let mut packed_rows: Vec<AlignmentRow> = Vec::new();
    let mut allocated = 0usize;
    let mut last_allocated = usize::MAX;

    while allocated < total {
        let mut row = AlignmentRow::default();
        let mut cursor = bucket_start;

        loop {
            if cursor > end {
                break;
            }
            let Some((&key, _)) = buckets.range(cursor..=end).next() else {
                break;
            };
            let queue = buckets.get_mut(&key).expect("bucket key just observed");
            let item = queue.pop_front().expect("non-empty bucket");
            if queue.is_empty() {
                buckets.remove(&key);
            }
            cursor = item_end(&item) + ALIGNMENT_SPACE;
            row.alignments.push(item);
            allocated += 1;
        }

        if !row.alignments.is_empty() {
            packed_rows.push(row);
        }
        if allocated == last_allocated {
            // No progress in a full pass; input is pathological
            break;
        }
        last_allocated = allocated;
    }

    packed_rows
}
