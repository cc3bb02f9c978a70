use std::fmt;

use geo::{BoundingRect, Polygon};
use serde::{Deserialize, Serialize};

/// A single recognized text fragment in pixel space.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Token {
    pub text: String,
    pub x_center: f32,
    pub y_center: f32,
    #[serde(default = "default_confidence")]
    pub confidence: f32,
}

fn default_confidence() -> f32 {
    1.0
}

impl Token {
    pub fn new(text: impl Into<String>, x_center: f32, y_center: f32, confidence: f32) -> Self {
        Self {
            text: text.into(),
            x_center,
            y_center,
            confidence,
        }
    }

    /// Builds a token from a detection box, using the center of its bounding rectangle.
    /// Returns `None` for an empty polygon.
    pub fn from_polygon(text: impl Into<String>, confidence: f32, rect: &Polygon<f32>) -> Option<Self> {
        let center = rect.bounding_rect()?.center();
        Some(Self::new(text, center.x, center.y, confidence))
    }
}

/// Everything the upstream OCR pass produced for one image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenPage {
    pub width: u32,
    pub height: u32,
    pub tokens: Vec<Token>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ClassType {
    // Declaration order is the output order within a course code.
    Lect,
    Lab,
}

impl ClassType {
    /// Exact, case-insensitive match against `LECT` / `LAB`.
    pub fn parse(text: &str) -> Option<Self> {
        let text = text.trim();
        if text.eq_ignore_ascii_case("LECT") {
            Some(Self::Lect)
        } else if text.eq_ignore_ascii_case("LAB") {
            Some(Self::Lab)
        } else {
            None
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Lect => "LECT",
            Self::Lab => "LAB",
        }
    }
}

impl fmt::Display for ClassType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Row identity: a course code paired with its class type. Positioned at the course code token.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Anchor {
    pub course_code: String,
    pub class_type: ClassType,
    pub x_center: f32,
    pub y_center: f32,
    /// Mean confidence of the course code and class type tokens.
    pub confidence: f32,
}

impl Anchor {
    pub fn key(&self) -> (&str, ClassType) {
        (&self.course_code, self.class_type)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AttendanceField {
    pub present: u32,
    pub total: u32,
    pub x_center: f32,
    pub y_center: f32,
    pub confidence: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PercentageField {
    pub percentage: f32,
    pub x_center: f32,
    pub y_center: f32,
    pub confidence: f32,
}

/// An anchor together with whatever fields geometry attached to it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatchedAnchor {
    pub anchor: Anchor,
    pub attendance: Option<AttendanceField>,
    pub percentage: Option<PercentageField>,
}

impl MatchedAnchor {
    pub(crate) fn total(&self) -> u32 {
        self.attendance.as_ref().map_or(0, |it| it.total)
    }

    /// Mean confidence over every token that contributed to the row.
    pub(crate) fn confidence(&self) -> f32 {
        // The anchor already averages two tokens.
        let mut sum = self.anchor.confidence * 2.0;
        let mut count = 2.0;
        if let Some(attendance) = &self.attendance {
            sum += attendance.confidence;
            count += 1.0;
        }
        if let Some(percentage) = &self.percentage {
            sum += percentage.confidence;
            count += 1.0;
        }
        sum / count
    }
}

/// Anomalies attached to an entry. Flagged entries are always kept.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EntryFlag {
    PresentExceedsTotal,
    PercentageMismatch { reported: f32, expected: f32 },
    MissingAttendance,
    PercentageComputed,
    UnknownCourse,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttendanceEntry {
    pub course_code: String,
    pub course_name: String,
    pub class_type: ClassType,
    pub present: u32,
    pub total: u32,
    pub percentage: f32,
    pub confidence: f32,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub flags: Vec<EntryFlag>,
}

impl AttendanceEntry {
    pub fn is_flagged(&self) -> bool {
        !self.flags.is_empty()
    }

    /// False when the row claims more attended classes than were held.
    pub fn is_valid(&self) -> bool {
        !self.flags.contains(&EntryFlag::PresentExceedsTotal)
    }
}

/// Counters describing how a page was reconstructed.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Diagnostics {
    pub image_width: f32,
    pub split_threshold: f32,
    pub left_tokens: usize,
    pub right_tokens: usize,
    pub anchors: usize,
    pub attendance_fields: usize,
    pub percentage_fields: usize,
    pub dictionary_size: usize,
    pub duplicates_merged: usize,
    pub flagged_entries: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Extraction {
    pub entries: Vec<AttendanceEntry>,
    pub diagnostics: Diagnostics,
}
