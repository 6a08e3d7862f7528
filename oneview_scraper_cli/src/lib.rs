pub mod assemble;
pub mod document;
pub mod error;
pub mod export;
pub mod extract;
pub mod runner;
pub mod scraper;
pub mod store;
pub mod utils;

#[cfg(test)]
pub(crate) mod test_support;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

pub use error::{Error, MalformedQueueEntry};

/// Canonical "field not found" value used while extracting.
pub const PLACEHOLDER: &str = "N/A";

/// Portal-assigned roll number. Always non-empty ASCII digits.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RollNumber(String);

impl RollNumber {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for RollNumber {
    type Err = MalformedQueueEntry;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
            return Err(MalformedQueueEntry(s.to_string()));
        }
        Ok(Self(s.to_string()))
    }
}

impl TryFrom<String> for RollNumber {
    type Error = MalformedQueueEntry;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<RollNumber> for String {
    fn from(roll: RollNumber) -> Self {
        roll.0
    }
}

impl fmt::Display for RollNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One student's result as extracted from a portal page.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AcademicRecord {
    pub roll_number: String,
    pub enrollment_number: String,
    pub full_name: String,
    pub father_name: String,
    pub course: String,
    pub branch: String,
    pub institute_name: String,
    #[serde(rename = "semesterGPA")]
    pub semester_gpa: BTreeMap<String, f64>,
    pub carry_overs: Vec<CarryOverEntry>,
    pub division: String,
    pub cgpa: String,
    pub subjects: Vec<SubjectMark>,
    pub latest_result_status: String,
    pub latest_carry_over_text: String,
    pub total_marks_obtained: i64,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CarryOverEntry {
    pub session: String,
    pub semester: String,
    pub cop_text: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct SubjectMark {
    pub subject: String,
    pub code: String,
    #[serde(rename = "type")]
    pub kind: String,
    /// Kept as text: the portal renders markers such as `A` for absent.
    pub internal: String,
    pub external: String,
}

impl AcademicRecord {
    /// SGPA for semester `n` (1-based), if the portal reported one.
    pub fn sgpa(&self, n: u32) -> Option<f64> {
        self.semester_gpa.get(&semester_key(n)).copied()
    }

    /// SGPA of the highest-numbered semester on record.
    pub fn latest_sgpa(&self) -> Option<f64> {
        self.semester_gpa
            .iter()
            .filter_map(|(key, sgpa)| {
                let n: u32 = key.strip_prefix("sem")?.parse().ok()?;
                Some((n, *sgpa))
            })
            .max_by_key(|(n, _)| *n)
            .map(|(_, sgpa)| sgpa)
    }

    pub fn has_backlogs(&self) -> bool {
        !self.carry_overs.is_empty()
    }
}

pub fn semester_key(n: u32) -> String {
    format!("sem{}", n)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roll_number_rejects_non_digits() {
        assert!("2100680100172".parse::<RollNumber>().is_ok());
        assert!(" 42 ".parse::<RollNumber>().is_ok());
        assert!("abc".parse::<RollNumber>().is_err());
        assert!("12a".parse::<RollNumber>().is_err());
        assert!("".parse::<RollNumber>().is_err());
    }

    #[test]
    fn record_serializes_with_portal_field_names() {
        let record = AcademicRecord {
            roll_number: "1".into(),
            enrollment_number: String::new(),
            full_name: "A".into(),
            father_name: String::new(),
            course: String::new(),
            branch: "CSE".into(),
            institute_name: "X".into(),
            semester_gpa: BTreeMap::from([(semester_key(3), 7.5)]),
            carry_overs: Vec::new(),
            division: String::new(),
            cgpa: String::new(),
            subjects: vec![SubjectMark {
                subject: "MATHS".into(),
                code: "KAS103".into(),
                kind: "Theory".into(),
                internal: "25".into(),
                external: "A".into(),
            }],
            latest_result_status: String::new(),
            latest_carry_over_text: String::new(),
            total_marks_obtained: 0,
        };

        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["rollNumber"], "1");
        assert_eq!(value["semesterGPA"]["sem3"], 7.5);
        assert_eq!(value["carryOvers"], serde_json::json!([]));
        assert_eq!(value["subjects"][0]["type"], "Theory");
        assert_eq!(record.sgpa(3), Some(7.5));
        assert!(!record.has_backlogs());
    }

    #[test]
    fn latest_sgpa_orders_semesters_numerically() {
        let record = AcademicRecord {
            semester_gpa: BTreeMap::from([
                (semester_key(2), 7.0),
                (semester_key(10), 8.5),
                (semester_key(9), 6.0),
            ]),
            ..crate::assemble::parse_record(&crate::test_support::StudentPage::default().render())
                .unwrap()
        };
        // "sem10" sorts before "sem2" as text.
        assert_eq!(record.latest_sgpa(), Some(8.5));

        let empty = AcademicRecord {
            semester_gpa: BTreeMap::new(),
            ..record
        };
        assert_eq!(empty.latest_sgpa(), None);
    }
}
