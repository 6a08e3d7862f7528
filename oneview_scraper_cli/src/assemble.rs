use tracing::debug;

use crate::document::Document;
use crate::error::Rejection;
use crate::extract::{self, Field, Identity};
use crate::{AcademicRecord, PLACEHOLDER};

/// Run every extractor over `doc` and build a record.
///
/// Rejected when the roll number, institute, branch or student name is
/// missing. `carryOvers` is empty when the page lists no backlog.
pub fn assemble(doc: &Document) -> Result<AcademicRecord, Rejection> {
    let Identity {
        roll_number,
        enrollment_number,
        full_name,
        father_name,
        course,
        branch,
        institute_name,
    } = extract::extract_identity(doc);

    let roll_number = required(Field::RollNumber, roll_number)?;
    let institute_name = required(Field::InstituteName, institute_name)?;
    let branch = required(Field::Branch, branch)?;
    let full_name = required(Field::FullName, full_name)?;

    let latest = extract::extract_latest_semester(doc);
    if latest.is_none() {
        debug!(roll = %roll_number, "no semester panel with a subject grid");
    }
    let (latest_result_status, total_marks_obtained, latest_carry_over_text, subjects) = latest
        .map(|l| (l.result_status, l.total_marks, l.carry_over_text, l.subjects))
        .unwrap_or_default();

    Ok(AcademicRecord {
        roll_number,
        enrollment_number: enrollment_number.unwrap_or_default(),
        full_name,
        father_name: father_name.unwrap_or_default(),
        course: course.unwrap_or_default(),
        branch,
        institute_name,
        semester_gpa: extract::extract_semester_gpa(doc),
        carry_overs: extract::extract_carry_overs(doc),
        division: extract::extract_division(doc),
        cgpa: extract::extract_cgpa(doc),
        subjects,
        latest_result_status,
        latest_carry_over_text,
        total_marks_obtained,
    })
}

/// Parse raw page text and assemble it.
pub fn parse_record(markup: &str) -> Result<AcademicRecord, Rejection> {
    assemble(&Document::parse(markup))
}

fn required(field: Field, value: Option<String>) -> Result<String, Rejection> {
    match value {
        Some(v) if !v.is_empty() && v != PLACEHOLDER => Ok(v),
        _ => Err(Rejection { field: field.name() }),
    }
}
