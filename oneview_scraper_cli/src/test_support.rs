//! Builders for portal-shaped pages used across unit tests.

use std::collections::HashMap;
use std::fmt::Write as _;

use async_trait::async_trait;

use crate::error::FetchError;
use crate::scraper::Fetcher;
use crate::RollNumber;

/// Text the portal renders in the first "Name" labelled cell, nine wide-gap
/// separated tokens ahead of the student's name.
const EXAM_BANNER: &str =
    "  ONE  VIEW  RESULT  B.TECH  REGULAR  EVEN  SEMESTER  SESSION  RESULTS  ";

#[derive(Debug, Clone)]
pub struct StudentPage {
    pub roll: String,
    pub enrollment: String,
    pub name: String,
    pub father: String,
    pub course: String,
    pub branch: String,
    pub institute: String,
    pub sgpa: Vec<(u32, String)>,
    pub panels: Vec<Panel>,
    pub division: String,
    pub cgpa: String,
}

impl Default for StudentPage {
    fn default() -> Self {
        Self {
            roll: "2100680100172".into(),
            enrollment: "210068012345678".into(),
            name: "JOHN DOE".into(),
            father: "RICHARD DOE".into(),
            course: "(04) B.TECH".into(),
            branch: "(10) COMPUTER SCIENCE AND ENGINEERING".into(),
            institute: "(068) ABC INSTITUTE OF TECHNOLOGY".into(),
            sgpa: vec![(1, "7.2".into()), (2, "7.9".into())],
            panels: vec![
                Panel::new(4)
                    .result("PASS")
                    .total("540")
                    .cop("COP :")
                    .subject("ENGINEERING PHYSICS", "KAS101", "Theory", "22", "51"),
                Panel::new(5)
                    .result("PASS")
                    .total("588")
                    .cop("COP :")
                    .subject("PROGRAMMING FOR PROBLEM SOLVING", "KCS101", "Theory", "27", "60")
                    .subject("WORKSHOP PRACTICE", "KWS151", "Practical", "45", "46"),
            ],
            division: "FIRST".into(),
            cgpa: "7.85".into(),
        }
    }
}

impl StudentPage {
    pub fn with_roll(roll: &str) -> Self {
        Self {
            roll: roll.to_string(),
            ..Self::default()
        }
    }

    pub fn render(&self) -> String {
        let mut html = String::from("<html><body><form id=\"form1\">\n<table id=\"layout\"><tr><td>\n<table id=\"tblIdentity\">\n");
        let rows = [
            ("Exam Name", EXAM_BANNER.to_string()),
            ("RollNo", self.roll.clone()),
            ("EnrollmentNo", self.enrollment.clone()),
            ("Institute Code", self.institute.clone()),
            ("Course Code", self.course.clone()),
            ("Branch Code", self.branch.clone()),
            ("Name", format!("\n      {}\n    ", self.name)),
            ("Father's Name", format!("\n      {}\n    ", self.father)),
        ];
        for (label, value) in rows {
            let _ = writeln!(html, "<tr><td>{}</td><td>:</td><td>{}</td></tr>", label, value);
        }
        html.push_str("</table>\n</td></tr></table>\n");

        for (i, (semester, sgpa)) in self.sgpa.iter().enumerate() {
            let _ = write!(
                html,
                r#"<table class="sem">
<tr><td><label id="ctl00_rptSemester_ctl{i:02}_forlblSemesterId">Semester</label> <span id="ctl00_rptSemester_ctl{i:02}_lblSemesterId">{semester}</span></td></tr>
<tr><td>Even/Odd</td></tr>
<tr><td>Marks</td></tr>
<tr><td>SGPA <span id="ctl00_rptSemester_ctl{i:02}_lblSGPA">{sgpa}</span></td></tr>
</table>
"#,
                i = i + 40,
                semester = semester,
                sgpa = sgpa,
            );
        }

        for panel in &self.panels {
            panel.render_into(&mut html);
        }

        let _ = write!(
            html,
            r#"<span id="ctl00_lblDivisionAwarded">{}</span><span id="ctl00_lblFinalMO">{}</span>
</form></body></html>"#,
            self.division, self.cgpa
        );
        html
    }
}

#[derive(Debug, Clone)]
pub struct Panel {
    pub index: u8,
    pub layout: u8,
    pub result: String,
    pub total: String,
    pub cop: Option<String>,
    pub session: String,
    pub sem: String,
    pub subjects: Vec<[String; 5]>,
}

impl Panel {
    pub fn new(index: u8) -> Self {
        Self {
            index,
            layout: 0,
            result: String::new(),
            total: String::new(),
            cop: None,
            session: "Session : 2021-22(REGULAR)".into(),
            sem: "Sem : 1".into(),
            subjects: Vec::new(),
        }
    }

    pub fn layout(mut self, layout: u8) -> Self {
        self.layout = layout;
        self
    }

    pub fn result(mut self, result: &str) -> Self {
        self.result = result.into();
        self
    }

    pub fn total(mut self, total: &str) -> Self {
        self.total = total.into();
        self
    }

    pub fn cop(mut self, cop: &str) -> Self {
        self.cop = Some(cop.into());
        self
    }

    pub fn session(mut self, session: &str) -> Self {
        self.session = session.into();
        self
    }

    pub fn sem(mut self, sem: &str) -> Self {
        self.sem = sem.into();
        self
    }

    pub fn subject(mut self, name: &str, code: &str, kind: &str, internal: &str, external: &str) -> Self {
        self.subjects
            .push([name, code, kind, internal, external].map(String::from));
        self
    }

    fn render_into(&self, html: &mut String) {
        let p = format!("ctl00_rptSemester_ctl{:02}", self.index);
        let g = format!("{}_ctl{:02}", p, self.layout);
        let _ = writeln!(html, r#"<div id="{p}_pnlSemester">"#);
        let _ = writeln!(html, r#"<span id="{p}_lblSession">{}</span>"#, self.session);
        let _ = writeln!(html, r#"<span id="{p}_lblSem">{}</span>"#, self.sem);
        let _ = writeln!(html, r#"<span id="{p}_lblResult">{}</span>"#, self.result);
        if let Some(cop) = &self.cop {
            let _ = writeln!(html, r#"<span id="{p}_lblCOP">{}</span>"#, cop);
        }
        let _ = writeln!(
            html,
            r#"<span id="{g}_lblSemesterTotalMarksObtained">{}</span>"#,
            self.total
        );
        html.push_str("<table class=\"grid\">\n");
        for (row, [name, code, kind, internal, external]) in self.subjects.iter().enumerate() {
            let sub = format!("{g}_ctl00_grdViewSubjectMarksheet");
            let _ = writeln!(
                html,
                r#"<tr><td><span id="{sub}_subName_{row}">{name}</span></td><td><span id="{sub}_subCode_{row}">{code}</span></td><td><span id="{sub}_subType_{row}">{kind}</span></td><td>{internal}</td><td>{external}</td></tr>"#
            );
        }
        html.push_str("</table>\n</div>\n");
    }
}

/// Serves canned pages; unknown roll numbers fail like a dropped connection.
#[derive(Default)]
pub struct StubFetcher {
    pages: HashMap<String, String>,
}

impl StubFetcher {
    pub fn with_page(mut self, roll: &str, html: String) -> Self {
        self.pages.insert(roll.to_string(), html);
        self
    }
}

#[async_trait]
impl Fetcher for StubFetcher {
    async fn fetch(&self, roll: &RollNumber) -> Result<String, FetchError> {
        self.pages
            .get(roll.as_str())
            .cloned()
            .ok_or(FetchError::Blocked)
    }
}
