use std::sync::Arc;

use image::DynamicImage;
use serde::{Deserialize, Serialize};
use tracing::instrument;

mod anchor;
mod assemble;
pub mod dictionary;
mod error;
mod fields;
mod matcher;
pub mod normalize;
pub mod recognizer;
mod result;
mod util;
mod validate;

pub use anchor::{detect_anchors, find_course_code};
pub use dictionary::{
    build_course_dictionary, CourseDictionary, CourseInfo, CourseLookup, CourseNames,
    UNKNOWN_COURSE,
};
pub use error::{Error, Result};
pub use fields::{detect_attendance_fields, detect_percentage_fields};
pub use matcher::match_fields;
pub use recognizer::{PrecomputedTokens, TextRecognizer};
pub use result::*;

use assemble::{assemble_entries, NameSources};
use normalize::{normalize_tokens, split_regions};
use validate::{deduplicate, validate};

/// Shared, read-only course name source.
pub type SharedCourseLookup = Arc<dyn CourseLookup + Send + Sync>;

pub struct AttendanceExtractorBuilder {
    options: ExtractionOptions,
    course_names: Option<SharedCourseLookup>,
    name_policy: NamePolicy,
}

impl AttendanceExtractorBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn options(mut self, options: ExtractionOptions) -> Self {
        self.options = options;
        self
    }

    /// Names for courses the screenshot's own table does not resolve.
    pub fn course_names(mut self, names: impl CourseLookup + Send + Sync + 'static) -> Self {
        self.course_names = Some(Arc::new(names));
        self
    }

    pub fn shared_course_names(mut self, names: SharedCourseLookup) -> Self {
        self.course_names = Some(names);
        self
    }

    pub fn name_policy(mut self, policy: NamePolicy) -> Self {
        self.name_policy = policy;
        self
    }

    #[instrument(skip(self))]
    pub fn build(self) -> Result<AttendanceExtractor> {
        self.options.validate()?;
        Ok(AttendanceExtractor {
            options: self.options,
            course_names: self.course_names,
            name_policy: self.name_policy,
        })
    }
}

impl Default for AttendanceExtractorBuilder {
    fn default() -> Self {
        Self {
            options: ExtractionOptions::default(),
            course_names: None,
            name_policy: NamePolicy::Fallback,
        }
    }
}

/// Rebuilds attendance rows from OCR tokens. Holds no per-page state, so one extractor
/// can serve any number of threads.
pub struct AttendanceExtractor {
    options: ExtractionOptions,
    course_names: Option<SharedCourseLookup>,
    name_policy: NamePolicy,
}

impl AttendanceExtractor {
    pub fn options(&self) -> &ExtractionOptions {
        &self.options
    }

    /// Runs the pipeline with the options the extractor was built with.
    pub fn extract(&self, page: &TokenPage) -> Extraction {
        self.run(page, &self.options)
    }

    /// Runs the pipeline with caller supplied tuning.
    pub fn extract_with(&self, page: &TokenPage, options: &ExtractionOptions) -> Result<Extraction> {
        options.validate()?;
        Ok(self.run(page, options))
    }

    /// Recognizes `image` and reconstructs its attendance table.
    #[instrument(skip(self, recognizer, image))]
    pub fn extract_image(
        &self,
        recognizer: &impl TextRecognizer,
        image: &DynamicImage,
    ) -> Result<Extraction> {
        let (width, height) = (image.width(), image.height());
        if width == 0 || height == 0 {
            return Err(Error::InvalidImageDimensions { width, height });
        }
        let tokens = recognizer.recognize(image)?;
        Ok(self.extract(&TokenPage {
            width,
            height,
            tokens,
        }))
    }

    #[instrument(skip(self, page, options), fields(tokens = page.tokens.len()))]
    fn run(&self, page: &TokenPage, options: &ExtractionOptions) -> Extraction {
        let ExtractionOptions {
            y_tolerance,
            percentage_tolerance,
            ..
        } = *options;

        let (tokens, image_width) = normalize_tokens(&page.tokens, page.width);
        let regions = split_regions(tokens, options);

        let anchors = detect_anchors(&regions.left, options);
        let anchor_count = anchors.len();
        if anchors.is_empty() {
            log::debug!("No anchors detected.");
        }
        let attendance_fields = detect_attendance_fields(&regions.left, options);
        let percentage_fields = detect_percentage_fields(&regions.left, options);
        log::debug!(
            "{anchor_count} anchors, {} attendance fields, {} percentage fields.",
            attendance_fields.len(),
            percentage_fields.len()
        );

        let matched = match_fields(anchors, &attendance_fields, &percentage_fields, y_tolerance);
        let dictionary = build_course_dictionary(&regions.right, options);
        let (matched, duplicates_merged) = deduplicate(matched);
        let validated = matched
            .into_iter()
            .map(|it| validate(it, percentage_tolerance))
            .collect::<Vec<_>>();

        let names = NameSources {
            page: &dictionary,
            external: self
                .course_names
                .as_deref()
                .map(|it| it as &dyn CourseLookup),
            policy: self.name_policy,
        };
        let entries = assemble_entries(validated, &names);
        log::debug!("Extracted {} attendance entries.", entries.len());

        let diagnostics = Diagnostics {
            image_width,
            split_threshold: regions.threshold,
            left_tokens: regions.left.len(),
            right_tokens: regions.right.len(),
            anchors: anchor_count,
            attendance_fields: attendance_fields.len(),
            percentage_fields: percentage_fields.len(),
            dictionary_size: dictionary.len(),
            duplicates_merged,
            flagged_entries: entries.iter().filter(|it| it.is_flagged()).count(),
        };
        Extraction {
            entries,
            diagnostics,
        }
    }
}

/// Half-open band `[lo, hi)` of normalized horizontal position.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Zone {
    pub lo: f32,
    pub hi: f32,
}

impl Zone {
    pub const fn new(lo: f32, hi: f32) -> Self {
        Self { lo, hi }
    }

    pub fn contains(&self, ratio: f32) -> bool {
        self.lo <= ratio && ratio < self.hi
    }

    fn validate(&self, name: &'static str) -> Result<()> {
        let in_range = |it: f32| (0.0..=1.0).contains(&it);
        if in_range(self.lo) && in_range(self.hi) && self.lo <= self.hi {
            Ok(())
        } else {
            Err(Error::InvalidZone {
                name,
                lo: self.lo,
                hi: self.hi,
            })
        }
    }
}

/// What the column zones are measured against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ZoneFrame {
    /// The full image width.
    Image,
    /// The width of the left region, so the zones span the attendance table.
    LeftTable,
}

/// How the screenshot's own course table and an external name list are combined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NamePolicy {
    /// Prefer names read off the page.
    Fallback,
    /// Prefer the external list.
    Override,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionOptions {
    pub course_code_zone: Zone,
    pub class_type_zone: Zone,
    pub attendance_zone: Zone,
    pub percentage_zone: Zone,
    pub zone_frame: ZoneFrame,
    /// `x_ratio` separating the attendance table from the course name table.
    pub region_split: f32,
    /// Re-split at the median when `region_split` leaves a side empty. Pages without a
    /// course name table must leave this off.
    pub adaptive_split: bool,
    /// Maximum vertical distance in pixels between an anchor and its fields.
    pub y_tolerance: f32,
    /// Vertical band in pixels for grouping course table rows.
    pub row_band: f32,
    /// Course names must be strictly longer than this.
    pub min_course_name_len: usize,
    /// Allowed gap in percentage points between reported and computed percentage.
    pub percentage_tolerance: f32,
}

impl ExtractionOptions {
    pub fn validate(&self) -> Result<()> {
        self.course_code_zone.validate("course_code_zone")?;
        self.class_type_zone.validate("class_type_zone")?;
        self.attendance_zone.validate("attendance_zone")?;
        self.percentage_zone.validate("percentage_zone")?;
        if !(self.region_split > 0.0 && self.region_split < 1.0) {
            return Err(Error::InvalidOption {
                name: "region_split",
                reason: format!("{} is not inside (0, 1)", self.region_split),
            });
        }
        for (name, value) in [
            ("y_tolerance", self.y_tolerance),
            ("row_band", self.row_band),
            ("percentage_tolerance", self.percentage_tolerance),
        ] {
            if !(value.is_finite() && value > 0.0) {
                return Err(Error::InvalidOption {
                    name,
                    reason: format!("{value} must be a positive number"),
                });
            }
        }
        Ok(())
    }
}

impl Default for ExtractionOptions {
    fn default() -> Self {
        Self {
            course_code_zone: Zone::new(0.00, 0.35),
            class_type_zone: Zone::new(0.35, 0.50),
            attendance_zone: Zone::new(0.50, 0.75),
            percentage_zone: Zone::new(0.75, 1.00),
            zone_frame: ZoneFrame::LeftTable,
            region_split: 0.52,
            adaptive_split: false,
            y_tolerance: 20.0,
            row_band: 20.0,
            min_course_name_len: 8,
            percentage_tolerance: 3.0,
        }
    }
}
