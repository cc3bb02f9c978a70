use std::{
    cmp::Reverse,
    collections::{BTreeMap, HashMap},
    path::Path,
};

use float_ord::FloatOrd;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::{anchor::find_course_code, error::Error, normalize::NormalizedToken, ExtractionOptions};

/// Name returned for codes no source knows about.
pub const UNKNOWN_COURSE: &str = "UNKNOWN";

/// Resolves a course code to its full name.
pub trait CourseLookup {
    fn lookup(&self, course_code: &str) -> Option<String>;
}

impl CourseLookup for HashMap<String, String> {
    fn lookup(&self, course_code: &str) -> Option<String> {
        self.get(course_code).cloned()
    }
}

impl CourseLookup for BTreeMap<String, String> {
    fn lookup(&self, course_code: &str) -> Option<String> {
        self.get(course_code).cloned()
    }
}

/// Code to name mapping read off the right-hand table of one screenshot.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CourseDictionary {
    names: BTreeMap<String, String>,
}

impl CourseDictionary {
    pub fn get(&self, course_code: &str) -> Option<&str> {
        self.names.get(course_code).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.names.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl CourseLookup for CourseDictionary {
    fn lookup(&self, course_code: &str) -> Option<String> {
        self.get(course_code).map(str::to_string)
    }
}

/// Groups tokens into visual rows. Tokens are swept top to bottom and a new row opens
/// whenever a token sits more than `band` below the first token of the current row.
/// Rows are returned top to bottom, each sorted left to right.
pub(crate) fn cluster_rows(tokens: &[NormalizedToken], band: f32) -> Vec<Vec<&NormalizedToken>> {
    let mut sorted = tokens.iter().collect::<Vec<_>>();
    sorted.sort_by_key(|it| FloatOrd(it.y_center));

    let mut rows: Vec<Vec<&NormalizedToken>> = Vec::new();
    let mut row_top = f32::NEG_INFINITY;
    for token in sorted {
        if rows.is_empty() || token.y_center - row_top > band {
            row_top = token.y_center;
            rows.push(vec![token]);
        } else if let Some(row) = rows.last_mut() {
            row.push(token);
        }
    }
    for row in &mut rows {
        row.sort_by_key(|it| FloatOrd(it.x_center));
    }
    rows
}

fn is_header(row: &[&NormalizedToken]) -> bool {
    let text = row
        .iter()
        .map(|it| it.text.to_uppercase())
        .collect::<Vec<_>>()
        .join(" ");
    text.contains("COURSE CODE") || text.contains("COURSE NAME")
}

/// Builds the code to name mapping from the right-hand table. Rows without a course
/// code (headers included) contribute nothing. In each row the first course code names
/// the course and the longest other token longer than
/// `min_course_name_len` characters is its name. Later rows overwrite earlier ones.
#[instrument(level = "debug", skip(right_tokens, options), fields(tokens = right_tokens.len()))]
pub fn build_course_dictionary(
    right_tokens: &[NormalizedToken],
    options: &ExtractionOptions,
) -> CourseDictionary {
    let mut names = BTreeMap::new();

    for row in cluster_rows(right_tokens, options.row_band) {
        let Some((code_index, course_code)) = row
            .iter()
            .enumerate()
            .find_map(|(i, it)| Some((i, find_course_code(&it.text)?)))
        else {
            if is_header(&row) {
                log::trace!("Skipping header row at y={:.1}", row[0].y_center);
            }
            continue;
        };
        // min_by_key keeps the leftmost of equally long candidates.
        let Some(name) = row
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != code_index)
            .map(|(_, it)| it.text.trim())
            .filter(|it| it.chars().count() > options.min_course_name_len)
            .min_by_key(|it| Reverse(it.chars().count()))
        else {
            log::debug!("Row with {course_code} has no course name, skipping.");
            continue;
        };
        let name = name.to_uppercase();
        log::info!("Dictionary: {course_code} -> {name}");
        if let Some(previous) = names.insert(course_code.clone(), name) {
            log::debug!("{course_code} appeared again, replacing {previous:?}");
        }
    }

    CourseDictionary { names }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CourseInfo {
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub abbr: String,
}

/// Externally maintained course names, in the `{"courses": {"CODE": {"name": ...}}}`
/// layout of a course configuration file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CourseNames {
    #[serde(default)]
    courses: BTreeMap<String, CourseInfo>,
}

impl CourseNames {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_json_str(json: &str) -> Result<Self, Error> {
        let parsed: Self = serde_json::from_str(json)?;
        // Codes are matched upper case.
        Ok(parsed.courses.into_iter().collect())
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, Error> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|source| Error::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let names = Self::from_json_str(&json)?;
        log::debug!("Loaded {} course names from {}", names.len(), path.display());
        Ok(names)
    }

    pub fn insert(&mut self, course_code: &str, info: CourseInfo) -> Option<CourseInfo> {
        self.courses.insert(course_code.to_uppercase(), info)
    }

    pub fn get(&self, course_code: &str) -> Option<&CourseInfo> {
        self.courses.get(course_code)
    }

    pub fn len(&self) -> usize {
        self.courses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.courses.is_empty()
    }
}

impl FromIterator<(String, CourseInfo)> for CourseNames {
    fn from_iter<T: IntoIterator<Item = (String, CourseInfo)>>(iter: T) -> Self {
        let mut names = Self::new();
        for (code, info) in iter {
            names.insert(&code, info);
        }
        names
    }
}

impl CourseLookup for CourseNames {
    fn lookup(&self, course_code: &str) -> Option<String> {
        self.get(course_code)
            .map(|it| it.name.trim())
            .filter(|it| !it.is_empty())
            .map(str::to_string)
    }
}
