//! Tabular exports of the result store: CSV, and an xlsx result sheet.

mod xlsx;

pub use xlsx::{export_xlsx_file, split_carry_overs, write_xlsx, CarryOverSplit};

use std::fs::File;
use std::io::Write;
use std::path::Path;

use crate::error::{Error, ExportError};
use crate::store::ResultStore;
use crate::AcademicRecord;

/// The export always spreads SGPA over this many semester columns.
pub const SGPA_COLUMNS: u32 = 8;

const IDENTITY_HEADERS: [&str; 8] = [
    "rollNo",
    "enrollmentNo",
    "fullName",
    "fatherName",
    "course",
    "branch",
    "division",
    "cgpa",
];

pub fn headers(max_carry_overs: usize) -> Vec<String> {
    let mut headers: Vec<String> = IDENTITY_HEADERS.iter().map(|h| h.to_string()).collect();
    headers.extend((1..=SGPA_COLUMNS).map(|n| format!("SGPA_sem{}", n)));
    for i in 1..=max_carry_overs {
        headers.push(format!("CarryOver_{}_session", i));
        headers.push(format!("CarryOver_{}_sem", i));
        headers.push(format!("CarryOver_{}_cop", i));
    }
    headers.push("instituteName".to_string());
    headers
}

fn row(record: &AcademicRecord, max_carry_overs: usize) -> Vec<String> {
    let mut row = vec![
        record.roll_number.clone(),
        record.enrollment_number.clone(),
        record.full_name.clone(),
        record.father_name.clone(),
        record.course.clone(),
        record.branch.clone(),
        record.division.clone(),
        record.cgpa.clone(),
    ];
    row.extend((1..=SGPA_COLUMNS).map(|n| record.sgpa(n).map(|v| v.to_string()).unwrap_or_default()));
    for i in 0..max_carry_overs {
        match record.carry_overs.get(i) {
            Some(entry) => row.extend([
                entry.session.clone(),
                entry.semester.clone(),
                entry.cop_text.clone(),
            ]),
            None => row.extend([String::new(), String::new(), String::new()]),
        }
    }
    row.push(record.institute_name.clone());
    row
}

/// Write `records` as CSV, newest roll number first. Nothing is written for
/// an empty slice.
pub fn write_csv<W: Write>(records: &[AcademicRecord], out: W) -> Result<(), ExportError> {
    if records.is_empty() {
        return Ok(());
    }

    let mut sorted: Vec<&AcademicRecord> = records.iter().collect();
    sorted.sort_by(|a, b| b.roll_number.cmp(&a.roll_number));
    let max_carry_overs = sorted.iter().map(|r| r.carry_overs.len()).max().unwrap_or(0);

    let mut writer = csv::Writer::from_writer(out);
    writer.write_record(headers(max_carry_overs))?;
    for record in sorted {
        writer.write_record(row(record, max_carry_overs))?;
    }
    writer.flush()?;
    Ok(())
}

/// Render the result store at `results` into a CSV file at `out`.
/// Returns the number of records written.
pub fn export_csv_file(results: &Path, out: &Path) -> Result<usize, Error> {
    let records = ResultStore::new(results).load()?;
    if let Some(parent) = out.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(ExportError::from)?;
    }
    let file = File::create(out).map_err(ExportError::from)?;
    write_csv(&records, file)?;
    Ok(records.len())
}
