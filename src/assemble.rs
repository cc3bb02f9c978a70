use tracing::instrument;

use crate::{
    dictionary::{CourseDictionary, CourseLookup, UNKNOWN_COURSE},
    validate::Validated,
    AttendanceEntry, EntryFlag, NamePolicy,
};

/// Where course names come from: the table on the page and an optional external list.
pub struct NameSources<'a> {
    pub page: &'a CourseDictionary,
    pub external: Option<&'a dyn CourseLookup>,
    pub policy: NamePolicy,
}

impl NameSources<'_> {
    pub fn resolve(&self, course_code: &str) -> Option<String> {
        let page = || self.page.lookup(course_code);
        let external = || self.external.and_then(|it| it.lookup(course_code));
        match self.policy {
            NamePolicy::Fallback => page().or_else(external),
            NamePolicy::Override => external().or_else(page),
        }
    }
}

/// Turns validated rows into entries ordered by course code, LECT before LAB.
#[instrument(level = "debug", skip_all, fields(rows = rows.len()))]
pub fn assemble_entries(rows: Vec<Validated>, names: &NameSources<'_>) -> Vec<AttendanceEntry> {
    let mut entries = rows
        .into_iter()
        .map(|row| {
            let Validated {
                matched,
                present,
                total,
                percentage,
                mut flags,
            } = row;
            let confidence = matched.confidence();
            let anchor = matched.anchor;
            let course_name = names.resolve(&anchor.course_code).unwrap_or_else(|| {
                log::warn!(
                    "Dictionary miss: {} (row kept as {UNKNOWN_COURSE})",
                    anchor.course_code
                );
                flags.push(EntryFlag::UnknownCourse);
                UNKNOWN_COURSE.to_string()
            });
            AttendanceEntry {
                course_code: anchor.course_code,
                course_name,
                class_type: anchor.class_type,
                present,
                total,
                percentage,
                confidence,
                flags,
            }
        })
        .collect::<Vec<_>>();

    entries.sort_by(|a, b| {
        a.course_code
            .cmp(&b.course_code)
            .then(a.class_type.cmp(&b.class_type))
    });
    entries
}
