use std::sync::LazyLock;

use regex::Regex;
use tracing::instrument;

use crate::{normalize::NormalizedToken, util::nearest_within, Anchor, ClassType, ExtractionOptions};

// Three or four letters, then exactly three digits.
static COURSE_CODE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"([A-Z]{3,4}[0-9]{3})(?:[^0-9]|$)").expect("valid course code regex")
});

/// First course code embedded in `text`, e.g. `CEUC201` out of `ceuc201/fse`.
pub fn find_course_code(text: &str) -> Option<String> {
    COURSE_CODE
        .captures(&text.to_uppercase())
        .map(|captures| captures[1].to_string())
}

/// Pairs each course code in the code zone with the nearest class type token in the
/// class type zone. Codes without a class type inside the tolerance form no anchor.
#[instrument(level = "debug", skip(left_tokens, options), fields(tokens = left_tokens.len()))]
pub fn detect_anchors(left_tokens: &[NormalizedToken], options: &ExtractionOptions) -> Vec<Anchor> {
    let class_tokens = left_tokens
        .iter()
        .filter(|it| options.class_type_zone.contains(it.zone_ratio))
        .filter_map(|it| Some((it, ClassType::parse(&it.text)?)))
        .collect::<Vec<_>>();

    left_tokens
        .iter()
        .filter(|it| options.course_code_zone.contains(it.zone_ratio))
        .filter_map(|token| {
            let course_code = find_course_code(&token.text)?;
            let Some(((class_token, class_type), _)) = nearest_within(
                class_tokens.iter(),
                token.y_center,
                options.y_tolerance,
                |(it, _)| it.y_center,
            ) else {
                log::debug!(
                    "Course code {course_code} at y={:.1} has no class type nearby, skipping.",
                    token.y_center
                );
                return None;
            };
            log::info!(
                "Anchor detected: {course_code} {class_type} at y={:.1}",
                token.y_center
            );
            Some(Anchor {
                course_code,
                class_type: *class_type,
                x_center: token.x_center,
                y_center: token.y_center,
                confidence: (token.confidence + class_token.confidence) / 2.0,
            })
        })
        .collect()
}
