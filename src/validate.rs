use std::collections::HashMap;

use tracing::instrument;

use crate::{util::round1, ClassType, EntryFlag, MatchedAnchor};

/// Merges anchors sharing a (course code, class type) key. A candidate with a non-zero
/// total beats one without; between candidates of equal standing the lower one on the
/// page wins. Returns the survivors in first-seen key order and the number merged away.
#[instrument(level = "debug", skip_all, fields(anchors = matched.len()))]
pub fn deduplicate(matched: Vec<MatchedAnchor>) -> (Vec<MatchedAnchor>, usize) {
    let mut slots: HashMap<(String, ClassType), usize> = HashMap::new();
    let mut survivors: Vec<MatchedAnchor> = Vec::with_capacity(matched.len());
    let mut merged = 0;

    for candidate in matched {
        let key = (candidate.anchor.course_code.clone(), candidate.anchor.class_type);
        let slot = match slots.get(&key).copied() {
            Some(slot) => slot,
            None => {
                slots.insert(key, survivors.len());
                survivors.push(candidate);
                continue;
            }
        };
        merged += 1;

        let existing = &survivors[slot];
        let candidate_filled = candidate.total() > 0;
        let existing_filled = existing.total() > 0;
        let replace = if candidate_filled != existing_filled {
            candidate_filled
        } else {
            candidate.anchor.y_center > existing.anchor.y_center
        };
        if replace {
            log::info!(
                "Duplicate {} {} resolved: kept total={} at y={:.1}",
                key.0,
                key.1,
                candidate.total(),
                candidate.anchor.y_center
            );
            survivors[slot] = candidate;
        } else {
            log::info!(
                "Duplicate {} {} resolved: kept total={} at y={:.1}",
                key.0,
                key.1,
                existing.total(),
                existing.anchor.y_center
            );
        }
    }

    (survivors, merged)
}

/// Attendance figures of one row after validation. Never removes the row.
#[derive(Debug, Clone, PartialEq)]
pub struct Validated {
    pub matched: MatchedAnchor,
    pub present: u32,
    pub total: u32,
    pub percentage: f32,
    pub flags: Vec<EntryFlag>,
}

/// Checks `present <= total` and that the reported percentage is within
/// `percentage_tolerance` points of `100 * present / total`. Missing figures are filled
/// in (zeros for attendance, computed value for percentage) and flagged.
pub fn validate(matched: MatchedAnchor, percentage_tolerance: f32) -> Validated {
    let anchor = &matched.anchor;
    let mut flags = Vec::new();

    let (present, total) = match &matched.attendance {
        Some(field) => (field.present, field.total),
        None => {
            log::warn!(
                "Missing attendance for {} {}",
                anchor.course_code,
                anchor.class_type
            );
            flags.push(EntryFlag::MissingAttendance);
            (0, 0)
        }
    };

    if present > total {
        log::warn!(
            "Invalid: present > total for {} {}: {present}/{total}",
            anchor.course_code,
            anchor.class_type
        );
        flags.push(EntryFlag::PresentExceedsTotal);
    }

    let percentage = match &matched.percentage {
        Some(field) => {
            if total > 0 {
                let expected = 100.0 * present as f32 / total as f32;
                if (field.percentage - expected).abs() > percentage_tolerance {
                    log::warn!(
                        "Percentage mismatch for {} {}: {}% vs expected {expected:.1}%",
                        anchor.course_code,
                        anchor.class_type,
                        field.percentage
                    );
                    flags.push(EntryFlag::PercentageMismatch {
                        reported: field.percentage,
                        expected: round1(expected),
                    });
                }
            }
            field.percentage
        }
        None => {
            flags.push(EntryFlag::PercentageComputed);
            if total > 0 {
                round1(100.0 * present as f32 / total as f32)
            } else {
                0.0
            }
        }
    };

    Validated {
        matched,
        present,
        total,
        percentage,
        flags,
    }
}
