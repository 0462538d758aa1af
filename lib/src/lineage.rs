//! Parent inference for track lineages.
//!
//! TrackMate's lineage export appends a division suffix to the label
//! (`Track_4` divides into `Track_4.a` and `Track_4.b`) but writes no parent
//! column, so the parent is recovered from the label. Livecyte-style exports
//! carry only a lineage (founder) id; there the parent is recovered by frame
//! adjacency within the lineage group.

use std::collections::{BTreeMap, HashMap, HashSet};

use crate::error::{CellTrackError, Result};
use crate::trackmate::{ColumnData, SpotTable};

/// Returns the parent label for a division-suffixed track label.
///
/// The parent is the label minus its last character, with trailing dots
/// stripped. Labels without a dot, and labels whose computed parent is not in
/// `known`, are their own parent.
pub fn parent_from_label<'a>(label: &'a str, known: &HashSet<&str>) -> &'a str {
    if !label.contains('.') {
        return label;
    }

    let trimmed = match label.char_indices().next_back() {
        Some((index, _)) => &label[..index],
        None => label,
    };
    let parent = trimmed.trim_end_matches('.');

    if known.contains(parent) {
        parent
    } else {
        label
    }
}

/// Adds a `parent` column (second position) derived from `source_column` by
/// the label-suffix rule
pub fn add_parent_column(table: &mut SpotTable, source_column: &str) -> Result<()> {
    let labels = table.text_column(source_column)?.to_vec();
    let known: HashSet<&str> = labels.iter().map(String::as_str).collect();

    let parents: Vec<String> = labels
        .iter()
        .map(|label| parent_from_label(label, &known).to_string())
        .collect();

    table.insert_column(1, "parent", ColumnData::Text(parents))
}

/// One track's extent, used for frame-adjacency parent matching
#[derive(Debug, Clone, Copy)]
pub struct TrackSpan {
    /// The track's id
    pub id: i64,
    /// The lineage (founder) id the track belongs to
    pub lineage: i64,
    /// First frame the track appears in
    pub first_frame: i64,
    /// Last frame the track appears in
    pub last_frame: i64,
}

/// Resolves each track's parent by frame adjacency within its lineage group.
///
/// A track's parent is the track whose last frame immediately precedes the
/// child's first frame. Founders (id == lineage) keep the lineage id as
/// parent, as does every track in a single-track lineage. Two tracks ending
/// on the same frame make the link ambiguous: a warning is emitted and the
/// last-encountered candidate wins. A child with no adjacent parent is fatal.
pub fn parents_by_adjacency(spans: &[TrackSpan]) -> Result<BTreeMap<i64, i64>> {
    let mut parents: BTreeMap<i64, i64> = spans.iter().map(|span| (span.id, span.lineage)).collect();

    let mut groups: BTreeMap<i64, Vec<&TrackSpan>> = BTreeMap::new();
    for span in spans {
        groups.entry(span.lineage).or_default().push(span);
    }

    for group in groups.values() {
        if group.len() < 2 {
            continue;
        }

        let mut by_last_frame: HashMap<i64, i64> = HashMap::new();
        let mut ambiguous: HashMap<i64, Vec<i64>> = HashMap::new();
        for span in group {
            if let Some(&existing) = by_last_frame.get(&span.last_frame) {
                ambiguous
                    .entry(span.last_frame)
                    .or_insert_with(|| vec![existing])
                    .push(span.id);
            }
            by_last_frame.insert(span.last_frame, span.id);
        }

        for span in group {
            if span.id == span.lineage {
                continue;
            }

            let parent_last = span.first_frame - 1;
            if let Some(candidates) = ambiguous.get(&parent_last) {
                log::warn!(
                    "ambiguous lineage connection: last frame {}, candidates {:?}",
                    parent_last,
                    candidates
                );
            }

            let parent =
                *by_last_frame
                    .get(&parent_last)
                    .ok_or(CellTrackError::ParentNotFound {
                        id: span.id,
                        frame: parent_last,
                    })?;
            parents.insert(span.id, parent);
        }
    }

    Ok(parents)
}

/// Adds a `Parent ID` column resolved by frame adjacency. The table must
/// carry `Tracking ID`, `Lineage ID` and `Frame` columns.
pub fn add_adjacency_parents(table: &mut SpotTable) -> Result<()> {
    let ids = table.integer_column("Tracking ID")?.to_vec();
    let lineages = table.integer_column("Lineage ID")?.to_vec();
    let frames = table.integer_column("Frame")?.to_vec();

    let mut spans: BTreeMap<i64, TrackSpan> = BTreeMap::new();
    for ((&id, &lineage), &frame) in ids.iter().zip(lineages.iter()).zip(frames.iter()) {
        spans
            .entry(id)
            .and_modify(|span| {
                span.first_frame = span.first_frame.min(frame);
                span.last_frame = span.last_frame.max(frame);
            })
            .or_insert(TrackSpan {
                id,
                lineage,
                first_frame: frame,
                last_frame: frame,
            });
    }

    let spans: Vec<TrackSpan> = spans.into_values().collect();
    let parents = parents_by_adjacency(&spans)?;

    let column: Vec<i64> = ids
        .iter()
        .zip(lineages.iter())
        .map(|(id, &lineage)| parents.get(id).copied().unwrap_or(lineage))
        .collect();

    let end = table.columns().len();
    table.insert_column(end, "Parent ID", ColumnData::Integer(column))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parent_labels_from_division_suffix() {
        let known: HashSet<&str> = ["Track_4", "Track_4.a"].into_iter().collect();

        assert_eq!(parent_from_label("Track_4.a", &known), "Track_4");
        assert_eq!(parent_from_label("Track_4", &known), "Track_4");
        // Unknown parents fall back on the label itself.
        assert_eq!(parent_from_label("Track_9.b", &known), "Track_9.b");
    }

    #[test]
    fn adds_parent_column_second() {
        let csv = "LABEL,FRAME\nTrack_1,1\nTrack_1.a,2\nTrack_1.b,2\n";
        let mut table = SpotTable::parse(csv.as_bytes()).expect("valid csv");
        add_parent_column(&mut table, "LABEL").unwrap();

        assert_eq!(table.columns()[1].name(), "parent");
        assert_eq!(
            table.text_column("parent").unwrap(),
            &[
                "Track_1".to_string(),
                "Track_1".to_string(),
                "Track_1".to_string()
            ]
        );
    }

    #[test]
    fn adjacency_matches_last_frame_to_first() {
        let spans = [
            TrackSpan { id: 1, lineage: 1, first_frame: 1, last_frame: 5 },
            TrackSpan { id: 2, lineage: 1, first_frame: 6, last_frame: 9 },
            TrackSpan { id: 3, lineage: 1, first_frame: 6, last_frame: 8 },
        ];

        let parents = parents_by_adjacency(&spans).unwrap();
        assert_eq!(parents[&1], 1);
        assert_eq!(parents[&2], 1);
        assert_eq!(parents[&3], 1);
    }

    #[test]
    fn ambiguous_last_frames_resolve_to_last_candidate() {
        let spans = [
            TrackSpan { id: 1, lineage: 1, first_frame: 1, last_frame: 5 },
            TrackSpan { id: 2, lineage: 1, first_frame: 6, last_frame: 9 },
            TrackSpan { id: 3, lineage: 1, first_frame: 6, last_frame: 9 },
            TrackSpan { id: 4, lineage: 1, first_frame: 10, last_frame: 12 },
        ];

        let parents = parents_by_adjacency(&spans).unwrap();
        assert_eq!(parents[&2], 1);
        assert_eq!(parents[&3], 1);
        assert_eq!(parents[&4], 3);
    }

    #[test]
    fn missing_adjacent_parent_is_fatal() {
        let spans = [
            TrackSpan { id: 1, lineage: 1, first_frame: 1, last_frame: 5 },
            TrackSpan { id: 2, lineage: 1, first_frame: 8, last_frame: 9 },
        ];

        assert!(matches!(
            parents_by_adjacency(&spans),
            Err(CellTrackError::ParentNotFound { id: 2, frame: 7 })
        ));
    }

    #[test]
    fn single_track_lineages_keep_the_lineage_parent() {
        let spans = [TrackSpan { id: 7, lineage: 7, first_frame: 1, last_frame: 3 }];
        let parents = parents_by_adjacency(&spans).unwrap();
        assert_eq!(parents[&7], 7);
    }

    #[test]
    fn adds_adjacency_parent_column() {
        let csv = "\
Tracking ID,Lineage ID,Frame
1,1,1
1,1,5
2,1,6
3,1,6
3,1,8
";
        let mut table = SpotTable::parse(csv.as_bytes()).expect("valid csv");
        add_adjacency_parents(&mut table).unwrap();

        assert_eq!(table.columns().last().map(|c| c.name()), Some("Parent ID"));
        assert_eq!(
            table.integer_column("Parent ID").unwrap(),
            &[1, 1, 1, 1, 1]
        );
    }
}
