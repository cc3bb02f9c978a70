use std::borrow::Cow;
use std::sync::LazyLock;

use float_ord::FloatOrd;
use regex::Regex;
use tracing::instrument;

use crate::{
    util::{upper_median, x_ratio},
    ExtractionOptions, Token, ZoneFrame,
};

static NUMERIC_TOKEN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:[0-9]+\s*/\s*[0-9]+|[0-9]+(?:\.[0-9]+)?\s*%)$").expect("valid numeric regex")
});

/// A token annotated with its horizontal position.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedToken {
    /// Position in the recognizer's output.
    pub index: usize,
    pub text: String,
    pub x_center: f32,
    pub y_center: f32,
    pub confidence: f32,
    /// `x_center` over the image width.
    pub x_ratio: f32,
    /// Position used for zone tests. Equal to `x_ratio` until the region split rescales it.
    pub zone_ratio: f32,
}

/// Corrects O/I/L confusions in tokens that read as a fraction or percentage once
/// corrected, even when OCR produced no digit at all. Anything else, course codes
/// included, is returned untouched.
pub fn correct_numeric(text: &str) -> Cow<'_, str> {
    let trimmed = text.trim();
    let corrected = trimmed
        .chars()
        .map(|c| match c {
            'O' | 'o' => '0',
            'I' | 'i' | 'L' | 'l' => '1',
            other => other,
        })
        .collect::<String>();
    if corrected != trimmed && NUMERIC_TOKEN.is_match(&corrected) {
        log::trace!("Corrected numeric token {text:?} to {corrected:?}");
        Cow::Owned(corrected)
    } else {
        Cow::Borrowed(text)
    }
}

/// Annotates every token with its normalized position. Returns the tokens and the
/// width they were normalized against: the image width, or the rightmost token center
/// when no width is known.
#[instrument(level = "debug", skip(tokens), fields(tokens = tokens.len()))]
pub fn normalize_tokens(tokens: &[Token], image_width: u32) -> (Vec<NormalizedToken>, f32) {
    let width = if image_width > 0 {
        image_width as f32
    } else {
        let fallback = tokens
            .iter()
            .map(|it| FloatOrd(it.x_center))
            .max()
            .map_or(0.0, |it| it.0);
        log::debug!("Image width unknown, using rightmost token center {fallback} instead.");
        fallback
    };

    let normalized = tokens
        .iter()
        .enumerate()
        .map(|(index, token)| {
            let ratio = x_ratio(token.x_center, width);
            NormalizedToken {
                index,
                text: correct_numeric(&token.text).into_owned(),
                x_center: token.x_center,
                y_center: token.y_center,
                confidence: token.confidence,
                x_ratio: ratio,
                zone_ratio: ratio,
            }
        })
        .collect();
    (normalized, width)
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Regions {
    /// Attendance table.
    pub left: Vec<NormalizedToken>,
    /// Course name table.
    pub right: Vec<NormalizedToken>,
    /// The `x_ratio` threshold that was actually applied.
    pub threshold: f32,
}

/// Partitions tokens at `options.region_split`. Each token lands in exactly one region,
/// in its original order.
#[instrument(level = "debug", skip(tokens, options), fields(tokens = tokens.len()))]
pub fn split_regions(tokens: Vec<NormalizedToken>, options: &ExtractionOptions) -> Regions {
    let mut threshold = options.region_split;
    let left_count = tokens.iter().filter(|it| it.x_ratio < threshold).count();

    if options.adaptive_split && !tokens.is_empty() && (left_count == 0 || left_count == tokens.len()) {
        if let Some(median) = upper_median(tokens.iter().map(|it| it.x_ratio)) {
            log::debug!(
                "Split at {threshold} leaves one region empty, falling back to median {median}."
            );
            threshold = median;
        }
    }

    let (mut left, right): (Vec<_>, Vec<_>) =
        tokens.into_iter().partition(|it| it.x_ratio < threshold);

    if options.zone_frame == ZoneFrame::LeftTable && threshold > 0.0 {
        for token in &mut left {
            token.zone_ratio = token.x_ratio / threshold;
        }
    }

    log::debug!(
        "Split at {threshold}: {} left, {} right.",
        left.len(),
        right.len()
    );
    Regions {
        left,
        right,
        threshold,
    }
}
