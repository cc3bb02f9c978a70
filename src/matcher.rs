use tracing::instrument;

use crate::{util::nearest_within, Anchor, AttendanceField, MatchedAnchor, PercentageField};

/// Attaches to every anchor the vertically nearest attendance and percentage field
/// within `tolerance`. Fields stay in the pool after being picked, so two close
/// anchors may share one. Anchors come out in the order they went in.
#[instrument(level = "debug", skip_all, fields(anchors = anchors.len()))]
pub fn match_fields(
    anchors: Vec<Anchor>,
    attendance_fields: &[AttendanceField],
    percentage_fields: &[PercentageField],
    tolerance: f32,
) -> Vec<MatchedAnchor> {
    anchors
        .into_iter()
        .map(|anchor| {
            let attendance =
                nearest_within(attendance_fields, anchor.y_center, tolerance, |it| it.y_center)
                    .map(|(field, _)| field.clone());
            let percentage =
                nearest_within(percentage_fields, anchor.y_center, tolerance, |it| it.y_center)
                    .map(|(field, _)| field.clone());
            if attendance.is_none() {
                log::debug!(
                    "No attendance field within {tolerance}px of {} {}",
                    anchor.course_code,
                    anchor.class_type
                );
            }
            MatchedAnchor {
                anchor,
                attendance,
                percentage,
            }
        })
        .collect()
}
