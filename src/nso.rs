use crate::enrollment::{group_rows, strip_domain};
use crate::error::NsoError;
use crate::models::EnrollmentRow;
use crate::roster::Roster;
use anyhow::Result;
use tracing::debug;

/// Placeholder in the course shortname replaced by the student type code
pub const TYPE_PLACEHOLDER: &str = "{type}";

const STUDENT_TYPES: &[(&str, &str)] = &[
    ("First Year", "FRESH"),
    ("Graduate", "GRAD"),
    ("Second Degree", "TRSFR"),
    ("Transfer", "TRSFR"),
];

/// Header names of the orientation export columns
#[derive(Debug, Clone)]
pub struct NsoColumns {
    pub email: String,
    pub international: String,
    pub student_type: String,
}

impl Default for NsoColumns {
    fn default() -> Self {
        Self {
            email: "CCA Email".to_string(),
            international: "International?".to_string(),
            student_type: "Applicant Type".to_string(),
        }
    }
}

pub fn type_code(student_type: &str) -> Option<&'static str> {
    STUDENT_TYPES
        .iter()
        .find(|(name, _)| *name == student_type)
        .map(|(_, code)| *code)
}

/// "second DEGREE" -> "Second Degree"
pub fn title_case(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut at_word_start = true;
    for ch in value.chars() {
        if ch.is_alphabetic() {
            if at_word_start {
                out.extend(ch.to_uppercase());
            } else {
                out.extend(ch.to_lowercase());
            }
            at_word_start = false;
        } else {
            out.push(ch);
            at_word_start = true;
        }
    }
    out
}

/// Rows for one orientation student. Students without an institutional
/// account yet are skipped; an unknown student type is an error.
pub fn orientation_rows(
    email: &str,
    international: &str,
    student_type: &str,
    course_template: &str,
    email_domain: &str,
) -> Result<Vec<EnrollmentRow>, NsoError> {
    let email = email.trim();
    if !email.ends_with(email_domain) {
        debug!(email, "not an institutional address, skipping");
        return Ok(Vec::new());
    }
    let username = strip_domain(email, email_domain);
    if username.is_empty() {
        return Ok(Vec::new());
    }

    let student_type = title_case(student_type.trim());
    let code = type_code(&student_type).ok_or_else(|| NsoError::UnknownStudentType {
        student_type: student_type.clone(),
        username: username.to_string(),
    })?;
    let course = course_template.replace(TYPE_PLACEHOLDER, code);

    Ok(group_rows(
        username,
        &course,
        &student_type,
        !international.is_empty(),
    ))
}

pub fn orientation_enrollments(
    roster: &Roster,
    columns: &NsoColumns,
    course_template: &str,
    email_domain: &str,
) -> Result<Vec<EnrollmentRow>> {
    let email = roster.column(&columns.email)?;
    let international = roster.column(&columns.international)?;
    let student_type = roster.column(&columns.student_type)?;

    let mut rows = Vec::new();
    for row in roster.rows() {
        rows.extend(orientation_rows(
            row.cell(email),
            row.cell(international),
            row.cell(student_type),
            course_template,
            email_domain,
        )?);
    }
    Ok(rows)
}
