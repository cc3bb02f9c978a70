use std::sync::LazyLock;

use regex::Regex;
use tracing::instrument;

use crate::{normalize::NormalizedToken, AttendanceField, ExtractionOptions, PercentageField};

static ATTENDANCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([0-9]+)\s*/\s*([0-9]+)").expect("valid attendance regex"));
static PERCENTAGE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([0-9]+(?:\.[0-9]+)?)\s*%").expect("valid percentage regex"));

/// `present/total` out of a token, if it contains one that parses.
pub fn parse_attendance(text: &str) -> Option<(u32, u32)> {
    let captures = ATTENDANCE.captures(text)?;
    let present = captures[1].parse().ok()?;
    let total = captures[2].parse().ok()?;
    Some((present, total))
}

pub fn parse_percentage(text: &str) -> Option<f32> {
    let captures = PERCENTAGE.captures(text)?;
    captures[1].parse().ok().filter(|it: &f32| it.is_finite())
}

/// Every `present/total` token in the attendance zone, in token order.
#[instrument(level = "debug", skip(left_tokens, options), fields(tokens = left_tokens.len()))]
pub fn detect_attendance_fields(
    left_tokens: &[NormalizedToken],
    options: &ExtractionOptions,
) -> Vec<AttendanceField> {
    left_tokens
        .iter()
        .filter(|it| options.attendance_zone.contains(it.zone_ratio))
        .filter_map(|token| {
            let Some((present, total)) = parse_attendance(&token.text) else {
                log::trace!("Not an attendance fraction: {:?}", token.text);
                return None;
            };
            Some(AttendanceField {
                present,
                total,
                x_center: token.x_center,
                y_center: token.y_center,
                confidence: token.confidence,
            })
        })
        .collect()
}

/// Every `N%` token in the percentage zone, in token order.
#[instrument(level = "debug", skip(left_tokens, options), fields(tokens = left_tokens.len()))]
pub fn detect_percentage_fields(
    left_tokens: &[NormalizedToken],
    options: &ExtractionOptions,
) -> Vec<PercentageField> {
    left_tokens
        .iter()
        .filter(|it| options.percentage_zone.contains(it.zone_ratio))
        .filter_map(|token| {
            let percentage = parse_percentage(&token.text)?;
            Some(PercentageField {
                percentage,
                x_center: token.x_center,
                y_center: token.y_center,
                confidence: token.confidence,
            })
        })
        .collect()
}
