//! Extraction rules for the portal's result page.
//!
//! The portal gives its cells no stable names, only display labels and
//! index-numbered ASP.NET ids. Identity fields are found through a table of
//! label-anchored rules; repeating semester panels are walked by index.

use std::collections::BTreeMap;
use std::ops::RangeInclusive;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::document::{
    by_id_fragment_within, by_id_suffix_within, closest, next_row, nth_next_sibling, text_of,
    untrimmed_text_of, Document,
};
use crate::{semester_key, CarryOverEntry, SubjectMark};

/// Indices of the semester panels the portal can render.
pub const PANELS: RangeInclusive<u8> = 4..=15;

/// Rows scanned in one panel's subject grid.
pub const SUBJECT_ROWS: usize = 10;

/// Token of the split "Name" text that holds the student's name.
pub const NAME_TOKEN: usize = 9;

/// The SGPA value sits three rows below the semester label row.
const SGPA_ROW_STEP: usize = 3;

static CODES: Lazy<Regex> = Lazy::new(|| Regex::new(r"[0-9()]").expect("valid regex"));
static WIDE_GAP: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s{2,}").expect("valid regex"));

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    RollNumber,
    EnrollmentNumber,
    FullName,
    FatherName,
    Course,
    Branch,
    InstituteName,
}

impl Field {
    pub fn name(self) -> &'static str {
        match self {
            Field::RollNumber => "rollNumber",
            Field::EnrollmentNumber => "enrollmentNumber",
            Field::FullName => "fullName",
            Field::FatherName => "fatherName",
            Field::Course => "course",
            Field::Branch => "branch",
            Field::InstituteName => "instituteName",
        }
    }
}

/// Which label cells a rule reads from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    /// The first matching label cell.
    First,
    /// Every matching label cell, texts concatenated in document order.
    All,
}

/// Read the cell `offset` siblings after a label cell containing `anchor`.
#[derive(Clone, Copy)]
pub struct FieldRule {
    pub field: Field,
    pub anchor: &'static str,
    pub offset: usize,
    pub scope: Scope,
    pub post: fn(&str) -> String,
}

/// Label, `:` separator, then value.
const VALUE_OFFSET: usize = 2;

pub const IDENTITY_RULES: &[FieldRule] = &[
    FieldRule {
        field: Field::RollNumber,
        anchor: "RollNo",
        offset: VALUE_OFFSET,
        scope: Scope::First,
        post: one_line,
    },
    FieldRule {
        field: Field::EnrollmentNumber,
        anchor: "EnrollmentNo",
        offset: VALUE_OFFSET,
        scope: Scope::First,
        post: one_line,
    },
    FieldRule {
        field: Field::FullName,
        anchor: "Name",
        offset: VALUE_OFFSET,
        scope: Scope::All,
        post: name_token,
    },
    FieldRule {
        field: Field::FatherName,
        anchor: "Father",
        offset: VALUE_OFFSET,
        scope: Scope::First,
        post: one_line,
    },
    FieldRule {
        field: Field::Branch,
        anchor: "Branch Code",
        offset: VALUE_OFFSET,
        scope: Scope::First,
        post: without_codes,
    },
    FieldRule {
        field: Field::Course,
        anchor: "Course Code",
        offset: VALUE_OFFSET,
        scope: Scope::First,
        post: without_codes,
    },
    FieldRule {
        field: Field::InstituteName,
        anchor: "Institute Code",
        offset: VALUE_OFFSET,
        scope: Scope::First,
        post: without_codes,
    },
];

/// Collapse every whitespace run to a single space.
pub fn one_line(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Drop the parenthesized numeric codes the portal prefixes to names.
pub fn without_codes(text: &str) -> String {
    one_line(&CODES.replace_all(text, ""))
}

/// Split on wide whitespace gaps and keep token `ordinal`, or `""`.
pub fn wide_token(text: &str, ordinal: usize) -> String {
    let stripped = CODES.replace_all(text, "");
    WIDE_GAP
        .split(stripped.trim())
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .nth(ordinal)
        .map(one_line)
        .unwrap_or_default()
}

fn name_token(text: &str) -> String {
    wide_token(text, NAME_TOKEN)
}

impl FieldRule {
    /// Apply the rule; `None` when nothing matched or the value is empty.
    pub fn apply(&self, doc: &Document) -> Option<String> {
        let raw: String = match self.scope {
            Scope::First => doc
                .first_label_cell(self.anchor)
                .and_then(|cell| nth_next_sibling(cell, self.offset))
                .map(untrimmed_text_of)?,
            Scope::All => doc
                .label_cells(self.anchor)
                .filter_map(|cell| nth_next_sibling(cell, self.offset))
                .map(untrimmed_text_of)
                .collect(),
        };
        let value = (self.post)(&raw);
        (!value.is_empty()).then_some(value)
    }
}

/// Identity block; a field is `None` when its rule found nothing.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Identity {
    pub roll_number: Option<String>,
    pub enrollment_number: Option<String>,
    pub full_name: Option<String>,
    pub father_name: Option<String>,
    pub course: Option<String>,
    pub branch: Option<String>,
    pub institute_name: Option<String>,
}

impl Identity {
    fn slot(&mut self, field: Field) -> &mut Option<String> {
        match field {
            Field::RollNumber => &mut self.roll_number,
            Field::EnrollmentNumber => &mut self.enrollment_number,
            Field::FullName => &mut self.full_name,
            Field::FatherName => &mut self.father_name,
            Field::Course => &mut self.course,
            Field::Branch => &mut self.branch,
            Field::InstituteName => &mut self.institute_name,
        }
    }
}

pub fn extract_identity(doc: &Document) -> Identity {
    extract_identity_with(doc, IDENTITY_RULES)
}

pub fn extract_identity_with(doc: &Document, rules: &[FieldRule]) -> Identity {
    let mut identity = Identity::default();
    for rule in rules {
        *identity.slot(rule.field) = rule.apply(doc);
    }
    identity
}

/// SGPA per semester, keyed `sem<N>`. Zero and unparseable values are dropped.
pub fn extract_semester_gpa(doc: &Document) -> BTreeMap<String, f64> {
    let mut semesters = BTreeMap::new();

    for marker in doc.by_id_fragment("forlblSemesterId") {
        let Some(row) = closest(marker, "tr") else {
            continue;
        };
        let label: String = by_id_fragment_within(row, "lblSemesterId")
            .filter(|el| *el != marker)
            .map(text_of)
            .collect();
        let Some(semester) = semester_number(&label) else {
            continue;
        };

        let sgpa = next_row(marker, SGPA_ROW_STEP)
            .and_then(|row| by_id_fragment_within(row, "lblSGPA").next())
            .map(text_of)
            .unwrap_or_default();

        if let Some(value) = parse_sgpa(&sgpa) {
            semesters.insert(semester_key(semester), value);
        }
    }

    semesters
}

fn semester_number(label: &str) -> Option<u32> {
    let digits: String = label.chars().filter(char::is_ascii_digit).collect();
    digits.parse().ok()
}

pub fn parse_sgpa(text: &str) -> Option<f64> {
    text.trim()
        .parse::<f64>()
        .ok()
        .filter(|value| value.is_finite() && *value != 0.0)
}

/// Id fragment for panel `index`, e.g. `ctl04_lblCOP`.
pub fn panel_id(index: u8, suffix: &str) -> String {
    format!("ctl{:02}_{}", index, suffix)
}

fn subject_id(index: u8, layout: u8, column: &str, row: usize) -> String {
    format!(
        "ctl{:02}_ctl{:02}_ctl00_grdViewSubjectMarksheet_{}_{}",
        index, layout, column, row
    )
}

/// Backlog codes of a COP text, with the `COP :` label removed.
pub fn cop_codes(text: &str) -> &str {
    strip_label(text, "COP")
}

fn strip_label<'a>(text: &'a str, label: &str) -> &'a str {
    let text = text.trim();
    match text.strip_prefix(label) {
        Some(rest) => rest.trim_start().trim_start_matches(':').trim(),
        None => text,
    }
}

/// One entry per panel whose COP text lists backlog codes.
pub fn extract_carry_overs(doc: &Document) -> Vec<CarryOverEntry> {
    let mut entries = Vec::new();

    for index in PANELS {
        let cop_fragment = panel_id(index, "lblCOP");
        let session_suffix = panel_id(index, "lblSession");
        let sem_suffix = panel_id(index, "lblSem");

        for cop in doc.by_id_fragment(&cop_fragment) {
            let cop_text = text_of(cop);
            if cop_codes(&cop_text).is_empty() {
                continue;
            }

            let container = closest(cop, "div").unwrap_or_else(|| doc.root());
            let session = by_id_suffix_within(container, &session_suffix)
                .next()
                .map(text_of)
                .unwrap_or_default();
            let semester = by_id_suffix_within(container, &sem_suffix)
                .next()
                .map(text_of)
                .unwrap_or_default();

            entries.push(CarryOverEntry {
                session: strip_label(&session, "Session").to_string(),
                semester: strip_label(&semester, "Sem").to_string(),
                cop_text,
            });
        }
    }

    entries
}

/// Result block of the most recent panel that has a subject grid.
#[derive(Debug, Clone, PartialEq)]
pub struct LatestSemester {
    pub panel: u8,
    pub result_status: String,
    pub total_marks: i64,
    pub carry_over_text: String,
    pub subjects: Vec<SubjectMark>,
}

/// Scan panels newest first and read the first one with subject content.
pub fn extract_latest_semester(doc: &Document) -> Option<LatestSemester> {
    PANELS
        .rev()
        .find_map(|index| grid_layout(doc, index).map(|layout| read_panel(doc, index, layout)))
}

/// Which of the two sub-layouts holds this panel's subject grid.
fn grid_layout(doc: &Document, index: u8) -> Option<u8> {
    let first = doc.id_text(&subject_id(index, 0, "subName", 0));
    let second = doc.id_text(&subject_id(index, 1, "subName", 0));
    match (first.is_empty(), second.is_empty()) {
        (true, true) => None,
        (_, false) => Some(1),
        (false, true) => Some(0),
    }
}

fn read_panel(doc: &Document, index: u8, layout: u8) -> LatestSemester {
    let total = doc.id_text(&format!(
        "ctl{:02}_ctl{:02}_lblSemesterTotalMarksObtained",
        index, layout
    ));

    let mut subjects = Vec::new();
    for row in 0..SUBJECT_ROWS {
        let subject = doc.id_text(&subject_id(index, layout, "subName", row));
        let code = doc.id_text(&subject_id(index, layout, "subCode", row));
        if subject.is_empty() || code.is_empty() {
            continue;
        }

        let type_id = subject_id(index, layout, "subType", row);
        let type_cell = doc
            .by_id_fragment(&type_id)
            .next()
            .and_then(|span| closest(span, "td"));
        let mark = |offset| {
            type_cell
                .and_then(|cell| nth_next_sibling(cell, offset))
                .map(text_of)
                .unwrap_or_default()
        };

        subjects.push(SubjectMark {
            kind: doc.id_text(&type_id),
            internal: mark(1),
            external: mark(2),
            subject,
            code,
        });
    }

    LatestSemester {
        panel: index,
        result_status: one_line(&doc.id_text(&panel_id(index, "lblResult"))),
        total_marks: leading_int(&total).unwrap_or(0),
        carry_over_text: one_line(&doc.id_text(&panel_id(index, "lblCOP"))),
        subjects,
    }
}

/// Leading integer of `text`, like `512` from `512/1000`.
pub fn leading_int(text: &str) -> Option<i64> {
    let text = text.trim();
    let end = text
        .char_indices()
        .find(|&(i, c)| !(c.is_ascii_digit() || (i == 0 && (c == '-' || c == '+'))))
        .map_or(text.len(), |(i, _)| i);
    text[..end].parse().ok()
}

pub fn extract_division(doc: &Document) -> String {
    one_line(&doc.id_text("lblDivisionAwarded"))
}

pub fn extract_cgpa(doc: &Document) -> String {
    one_line(&doc.id_text("lblFinalMO"))
}
