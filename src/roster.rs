use crate::error::RosterError;
use crate::models::{ClassYear, ColumnMap, StudentRecord};
use anyhow::{Context, Result};
use csv::{ReaderBuilder, StringRecord};
use std::io;
use std::path::Path;

/// Title row Workday puts above the real header in the internship report
pub const REVIEW_TITLE: &str = "Students for Internship Review";

/// Rows of a delimited export, keyed by the header row.
#[derive(Debug, Clone)]
pub struct Roster {
    headers: Vec<String>,
    records: Vec<StringRecord>,
}

impl Roster {
    pub fn from_reader<R: io::Read>(reader: R) -> Result<Self> {
        let mut csv_reader = ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_reader(reader);

        let mut records = csv_reader.records();
        let mut header = records
            .next()
            .ok_or(RosterError::MissingHeader)?
            .context("Failed to read roster header")?;
        if header.get(0).map(|cell| cell.trim()) == Some(REVIEW_TITLE) {
            header = records
                .next()
                .ok_or(RosterError::MissingHeader)?
                .context("Failed to read roster header")?;
        }

        let headers = header
            .iter()
            .map(|cell| cell.trim_start_matches('\u{feff}').trim().to_string())
            .collect();
        let records = records
            .collect::<Result<Vec<_>, _>>()
            .context("Failed to read roster rows")?;

        Ok(Self { headers, records })
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let file = std::fs::File::open(path)
            .with_context(|| format!("Failed to open roster: {}", path.display()))?;
        Self::from_reader(file).with_context(|| format!("Failed to parse roster: {}", path.display()))
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn column(&self, name: &str) -> Result<usize, RosterError> {
        self.headers
            .iter()
            .position(|header| header == name)
            .ok_or_else(|| RosterError::MissingColumn(name.to_string()))
    }

    /// Rows as cell slices; short rows read as empty cells.
    pub fn rows(&self) -> impl Iterator<Item = RosterRow<'_>> {
        self.records.iter().map(|record| RosterRow { record })
    }

    /// Converts every row into a typed student record.
    pub fn students(&self, columns: &ColumnMap) -> Result<Vec<StudentRecord>, RosterError> {
        // only list mode needs the name, so a roster without it is still usable
        let full_name = self.column(&columns.full_name).ok();
        let email = self.column(&columns.email)?;
        let program = self.column(&columns.primary_program)?;
        let status = self.column(&columns.program_status)?;
        let standing = self.column(&columns.class_standing)?;
        let international = self.column(&columns.is_international)?;

        Ok(self
            .rows()
            .map(|row| StudentRecord {
                full_name: full_name.map(|idx| row.cell(idx).to_string()).unwrap_or_default(),
                email: row.cell(email).trim().to_string(),
                primary_program: row.cell(program).to_string(),
                program_status: row.cell(status).to_string(),
                class_standing: ClassYear::from_label(row.cell(standing)),
                is_international: row.cell(international) == "Yes",
            })
            .collect())
    }
}

#[derive(Debug, Clone, Copy)]
pub struct RosterRow<'r> {
    record: &'r StringRecord,
}

impl<'r> RosterRow<'r> {
    pub fn cell(&self, idx: usize) -> &'r str {
        self.record.get(idx).unwrap_or("")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const REPORT: &str = "\
Students for Internship Review,,,,,
Student,CCA Email,Primary Program of Study,Primary Program of Study Record Status,Latest Class Standing,Is International Student
Ada Lovelace,ada@cca.edu,Architecture,In Progress,Third Year,Yes
Grace Hopper,,Interior Design,In Progress,Third Year,
Alan Turing,alan@cca.edu,Graduate Architecture,Suspended,Senior,yes
";

    #[test]
    fn title_row_is_skipped_and_fields_are_typed() {
        let roster = Roster::from_reader(REPORT.as_bytes()).unwrap();
        assert_eq!(roster.len(), 3);

        let students = roster.students(&ColumnMap::default()).unwrap();
        assert_eq!(
            students[0],
            StudentRecord {
                full_name: "Ada Lovelace".to_string(),
                email: "ada@cca.edu".to_string(),
                primary_program: "Architecture".to_string(),
                program_status: "In Progress".to_string(),
                class_standing: Some(ClassYear::Third),
                is_international: true,
            }
        );
        assert_eq!(students[1].email, "");
        assert!(!students[1].is_international);
        // only the exact "Yes" marks an international student
        assert!(!students[2].is_international);
        assert_eq!(students[2].class_standing, None);
    }

    #[test]
    fn plain_header_row_is_used_directly() {
        let csv = "CCA Email,Primary Program of Study,Primary Program of Study Record Status,Latest Class Standing,Is International Student\n\
                   b@cca.edu,Graphic Design,In Progress,Third Year\n";
        let roster = Roster::from_reader(csv.as_bytes()).unwrap();
        let students = roster.students(&ColumnMap::default()).unwrap();
        assert_eq!(students.len(), 1);
        assert_eq!(students[0].full_name, "");
        // the short row has no international cell at all
        assert!(!students[0].is_international);
    }

    #[test]
    fn missing_required_column_is_reported() {
        let csv = "Student,CCA Email\nA,a@cca.edu\n";
        let roster = Roster::from_reader(csv.as_bytes()).unwrap();
        assert_eq!(
            roster.students(&ColumnMap::default()).unwrap_err(),
            RosterError::MissingColumn("Primary Program of Study".to_string())
        );
    }

    #[test]
    fn empty_input_has_no_header() {
        let err = Roster::from_reader("".as_bytes()).unwrap_err();
        assert_eq!(
            err.downcast_ref::<RosterError>(),
            Some(&RosterError::MissingHeader)
        );
    }

    #[test]
    fn custom_column_names_are_honoured() {
        let csv = "Name,Email,Major,Status,Standing,Intl\nC,c@cca.edu,Interior Design,In Progress,Third Year,Yes\n";
        let columns = ColumnMap {
            full_name: "Name".to_string(),
            email: "Email".to_string(),
            primary_program: "Major".to_string(),
            program_status: "Status".to_string(),
            class_standing: "Standing".to_string(),
            is_international: "Intl".to_string(),
        };
        let roster = Roster::from_reader(csv.as_bytes()).unwrap();
        let students = roster.students(&columns).unwrap();
        assert_eq!(students[0].primary_program, "Interior Design");
        assert!(students[0].is_international);
    }

    #[test]
    fn reads_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("roster.csv");
        std::fs::write(&path, REPORT).unwrap();
        assert_eq!(Roster::from_path(&path).unwrap().len(), 3);
        assert!(Roster::from_path(&dir.path().join("missing.csv")).is_err());
    }
}
