//! Result-sheet workbook: one row per student with latest-semester marks,
//! followed by a block of per-column summary formulas.

use std::path::Path;

use rust_xlsxwriter::{utility::column_number_to_name, Formula, Workbook, Worksheet};

use crate::error::{Error, ExportError};
use crate::extract::cop_codes;
use crate::store::ResultStore;
use crate::AcademicRecord;

/// Subjects beyond this many are left off the sheet.
pub const MAX_SUBJECTS: usize = 10;

/// Marker written for an absent candidate.
pub const ABSENT: &str = "###";

const TITLE_ROW: u32 = 0;
const SUBJECT_ROW: u32 = 4;
const HEADER_ROW: u32 = 5;
const FIRST_DATA_ROW: u32 = 6;

const COL_SERIAL: u16 = 0;
const COL_ROLL: u16 = 1;
const COL_NAME: u16 = 2;
const COL_ENROLLMENT: u16 = 3;
const COL_FATHER: u16 = 4;
const FIRST_SUBJECT_COL: u16 = 5;
const SUBJECT_COLS: u16 = 2 * MAX_SUBJECTS as u16;
const COL_TOTAL: u16 = FIRST_SUBJECT_COL + SUBJECT_COLS;
const COL_SGPA: u16 = COL_TOTAL + 1;
const COL_STATUS: u16 = COL_TOTAL + 2;
const COL_ODD_COP: u16 = COL_TOTAL + 3;
const COL_EVEN_COP: u16 = COL_TOTAL + 4;
const COL_COP_CODES: u16 = COL_TOTAL + 5;

#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Blank,
    Number(f64),
    Text(String),
    Formula(String),
}

#[derive(Debug, Clone, Copy)]
pub enum Side {
    Internal,
    External,
}

/// Sheet value for a raw portal mark. Absence becomes [`ABSENT`]; a `--`
/// external mark counts as zero.
pub fn mark_cell(raw: &str, side: Side) -> Cell {
    match (raw.trim(), side) {
        ("", _) => Cell::Blank,
        ("A" | "ABS", _) | ("--", Side::Internal) => Cell::Text(ABSENT.to_string()),
        ("--", Side::External) => Cell::Number(0.0),
        (mark, _) => mark
            .parse()
            .map(Cell::Number)
            .unwrap_or_else(|_| Cell::Text(mark.to_string())),
    }
}

/// Backlog codes of the latest semester, counted by semester parity.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CarryOverSplit {
    pub odd: u32,
    pub even: u32,
    pub codes: String,
}

pub fn split_carry_overs(cop_text: &str) -> CarryOverSplit {
    let codes: Vec<&str> = cop_codes(cop_text)
        .split(',')
        .map(str::trim)
        .filter(|code| !code.is_empty())
        .collect();

    let even = codes.iter().filter(|code| in_even_semester(code)).count() as u32;
    CarryOverSplit {
        odd: codes.len() as u32 - even,
        even,
        codes: codes.join(","),
    }
}

// The first digit of a subject code is its semester. Codes numbered `0x`
// carry the semester in the next digit, where 9 stands for the eighth.
fn in_even_semester(code: &str) -> bool {
    let first = code.chars().find_map(|c| c.to_digit(10)).unwrap_or(0);
    if first != 0 {
        return first % 2 == 0;
    }
    let second = code
        .as_bytes()
        .windows(2)
        .find(|pair| pair.iter().all(u8::is_ascii_digit))
        .map(|pair| u32::from(pair[1] - b'0'))
        .unwrap_or(0);
    second == 9 || second % 2 == 0
}

fn student_row(serial: usize, record: &AcademicRecord) -> Vec<(u16, Cell)> {
    let mut cells = vec![
        (COL_SERIAL, Cell::Number(serial as f64)),
        (COL_ROLL, Cell::Text(record.roll_number.clone())),
        (COL_NAME, Cell::Text(record.full_name.clone())),
        (COL_ENROLLMENT, Cell::Text(record.enrollment_number.clone())),
        (COL_FATHER, Cell::Text(record.father_name.clone())),
    ];
    for (i, subject) in record.subjects.iter().take(MAX_SUBJECTS).enumerate() {
        let col = FIRST_SUBJECT_COL + 2 * i as u16;
        cells.push((col, mark_cell(&subject.internal, Side::Internal)));
        cells.push((col + 1, mark_cell(&subject.external, Side::External)));
    }

    let split = split_carry_overs(&record.latest_carry_over_text);
    cells.extend([
        (COL_TOTAL, Cell::Number(record.total_marks_obtained as f64)),
        (
            COL_SGPA,
            record.latest_sgpa().map(Cell::Number).unwrap_or(Cell::Blank),
        ),
        (COL_STATUS, Cell::Text(record.latest_result_status.clone())),
        (COL_ODD_COP, Cell::Number(f64::from(split.odd))),
        (COL_EVEN_COP, Cell::Number(f64::from(split.even))),
        (COL_COP_CODES, Cell::Text(split.codes)),
    ]);
    cells
}

/// Summary block placed under `students` data rows, as `(row, col, cell)`
/// with zero-based coordinates.
pub fn summary_block(students: usize) -> Vec<(u32, u16, Cell)> {
    let first = FIRST_DATA_ROW + 1;
    let last = FIRST_DATA_ROW + students as u32;
    let top = FIRST_DATA_ROW + students as u32 + 2;
    // 1-based sheet row of summary line `offset`, for formula references.
    let at = |offset: u32| top + offset + 1;
    let range = |col: u16| {
        let name = column_number_to_name(col);
        format!("{name}{first}:{name}{last}")
    };
    let count_below = |col: u16, bound: &str| Cell::Formula(format!("COUNTIF({},\"<{}\")", range(col), bound));
    let count_from = |col: u16, bound: &str| Cell::Formula(format!("COUNTIF({},\">={}\")", range(col), bound));
    let count_between = |col: u16, low: &str, high: &str| {
        let r = range(col);
        Cell::Formula(format!("COUNTIFS({r},\">={low}\",{r},\"<{high}\")"))
    };

    let total = Cell::Number(students as f64);
    let mut block = Vec::new();
    let mut label = |offset: u32, text: &str| block.push((top + offset, COL_NAME, Cell::Text(text.to_string())));
    label(3, "Students appeared");
    label(4, "Absent");
    label(7, "Results available");
    label(8, "Highest marks");
    label(9, "Average marks");
    label(10, "Below 30%");
    label(11, "30% to 50%");
    label(12, "50% to 60%");
    label(13, "60% to 75%");
    label(14, "75% and above");
    label(15, "Passed");
    label(16, "Passed with grace");
    label(17, "One carry-over");
    label(18, "Two carry-overs");
    label(19, "Three or more carry-overs");
    label(20, "Pass percentage");
    label(21, "Pass percentage with grace");

    for col in FIRST_SUBJECT_COL..COL_TOTAL {
        let name = column_number_to_name(col);
        block.extend([
            (top + 3, col, total.clone()),
            (top + 4, col, Cell::Formula(format!("COUNTIF({},\"{}\")", range(col), ABSENT))),
            (top + 10, col, count_below(col, "15")),
            (top + 11, col, count_between(col, "15", "25")),
            (top + 12, col, count_between(col, "25", "30")),
            (top + 13, col, count_between(col, "30", "37.5")),
            (top + 14, col, count_from(col, "37.5")),
            (
                top + 20,
                col,
                Cell::Formula(format!("({name}{}-{name}{})*100/{name}{}", at(7), at(10), at(7))),
            ),
        ]);
    }
    for col in FIRST_SUBJECT_COL..=COL_TOTAL {
        block.push((top + 7, col, total.clone()));
    }
    for col in FIRST_SUBJECT_COL..=COL_SGPA {
        block.push((top + 8, col, Cell::Formula(format!("MAX({})", range(col)))));
        block.push((top + 9, col, Cell::Formula(format!("AVERAGE({})", range(col)))));
    }

    let t = column_number_to_name(COL_TOTAL);
    let status = range(COL_STATUS);
    let odd = range(COL_ODD_COP);
    block.extend([
        (top + 10, COL_TOTAL, count_below(COL_TOTAL, "255")),
        (top + 11, COL_TOTAL, count_between(COL_TOTAL, "255", "425")),
        (top + 12, COL_TOTAL, count_between(COL_TOTAL, "425", "510")),
        (top + 13, COL_TOTAL, count_between(COL_TOTAL, "510", "637.5")),
        (top + 14, COL_TOTAL, count_from(COL_TOTAL, "637.5")),
        (top + 15, COL_TOTAL, Cell::Formula(format!("COUNTIF({status},\"PASS\")"))),
        (top + 16, COL_TOTAL, Cell::Formula(format!("COUNTIF({status},\"PWG\")"))),
        (top + 17, COL_TOTAL, Cell::Formula(format!("COUNTIF({odd},1)"))),
        (top + 18, COL_TOTAL, Cell::Formula(format!("COUNTIF({odd},2)"))),
        (top + 19, COL_TOTAL, Cell::Formula(format!("COUNTIF({odd},\">=3\")"))),
        (
            top + 20,
            COL_TOTAL,
            Cell::Formula(format!("{t}{}/{t}{}*100", at(15), at(7))),
        ),
        (
            top + 21,
            COL_TOTAL,
            Cell::Formula(format!("({t}{}+{t}{})/{t}{}*100", at(15), at(16), at(7))),
        ),
        (top + 10, COL_SGPA, count_below(COL_SGPA, "6")),
        (top + 11, COL_SGPA, count_between(COL_SGPA, "6", "7.5")),
        (top + 12, COL_SGPA, count_between(COL_SGPA, "7.5", "9")),
        (top + 13, COL_SGPA, count_from(COL_SGPA, "9")),
    ]);
    block
}

fn put(sheet: &mut Worksheet, row: u32, col: u16, cell: &Cell) -> Result<(), ExportError> {
    match cell {
        Cell::Blank => {}
        Cell::Number(n) => {
            sheet.write_number(row, col, *n)?;
        }
        Cell::Text(text) => {
            sheet.write_string(row, col, text)?;
        }
        Cell::Formula(formula) => {
            sheet.write_formula(row, col, Formula::new(formula))?;
        }
    }
    Ok(())
}

fn write_headers(sheet: &mut Worksheet, first: Option<&AcademicRecord>) -> Result<(), ExportError> {
    sheet.write_string(TITLE_ROW, COL_SERIAL, "Result analysis")?;
    let fixed = [
        (COL_SERIAL, "S.No"),
        (COL_ROLL, "Roll No"),
        (COL_NAME, "Name"),
        (COL_ENROLLMENT, "Enrollment No"),
        (COL_FATHER, "Father's Name"),
        (COL_TOTAL, "Total Marks"),
        (COL_SGPA, "SGPA"),
        (COL_STATUS, "Result"),
        (COL_ODD_COP, "Odd Sem COP"),
        (COL_EVEN_COP, "Even Sem COP"),
        (COL_COP_CODES, "COP Subjects"),
    ];
    for (col, title) in fixed {
        sheet.write_string(HEADER_ROW, col, title)?;
    }

    for i in 0..MAX_SUBJECTS {
        let col = FIRST_SUBJECT_COL + 2 * i as u16;
        let subject = first
            .and_then(|record| record.subjects.get(i))
            .map(|s| s.subject.clone())
            .unwrap_or_else(|| format!("Subject-{}", i + 1));
        sheet.write_string(SUBJECT_ROW, col, subject)?;
        sheet.write_string(HEADER_ROW, col, "Int")?;
        sheet.write_string(HEADER_ROW, col + 1, "Ext")?;
    }
    Ok(())
}

/// Write the result sheet for `records`, ordered by roll number. Subject
/// headings come from the first student.
pub fn write_xlsx(records: &[AcademicRecord], out: &Path) -> Result<(), ExportError> {
    let mut sorted: Vec<&AcademicRecord> = records.iter().collect();
    sorted.sort_by(|a, b| a.roll_number.cmp(&b.roll_number));

    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet();
    sheet.set_name("Results")?;
    write_headers(sheet, sorted.first().copied())?;

    for (i, record) in sorted.iter().enumerate() {
        let row = FIRST_DATA_ROW + i as u32;
        for (col, cell) in student_row(i + 1, record) {
            put(sheet, row, col, &cell)?;
        }
    }
    if !sorted.is_empty() {
        for (row, col, cell) in summary_block(sorted.len()) {
            put(sheet, row, col, &cell)?;
        }
    }

    workbook.save(out)?;
    Ok(())
}

/// Render the result store at `results` into a workbook at `out`.
/// Returns the number of student rows written.
pub fn export_xlsx_file(results: &Path, out: &Path) -> Result<usize, Error> {
    let records = ResultStore::new(results).load()?;
    if let Some(parent) = out.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(ExportError::from)?;
    }
    write_xlsx(&records, out)?;
    Ok(records.len())
}
