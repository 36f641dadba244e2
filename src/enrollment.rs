use crate::eligibility::{course_for, is_eligible};
use crate::models::{EnrollmentRow, ReviewEntry, StudentRecord, INTERNATIONAL_GROUP};
use tracing::debug;

/// What a single student turns into.
#[derive(Debug, Clone, PartialEq)]
pub enum Expansion {
    /// Zero rows when filtered out or not eligible, otherwise one or two.
    Rows(Vec<EnrollmentRow>),
    /// List mode: the student is reported for review, not enrolled.
    Review(ReviewEntry),
}

impl Expansion {
    pub fn is_empty(&self) -> bool {
        matches!(self, Expansion::Rows(rows) if rows.is_empty())
    }
}

pub struct InternEnroller<'a> {
    pub semester: &'a str,
    pub email_domain: &'a str,
    pub program_filter: Option<&'a str>,
    pub list_mode: bool,
}

impl<'a> InternEnroller<'a> {
    pub fn new(semester: &'a str, email_domain: &'a str) -> Self {
        Self {
            semester,
            email_domain,
            program_filter: None,
            list_mode: false,
        }
    }

    pub fn with_program(mut self, program: Option<&'a str>) -> Self {
        self.program_filter = program;
        self
    }

    pub fn with_list_mode(mut self, list_mode: bool) -> Self {
        self.list_mode = list_mode;
        self
    }

    pub fn expand(&self, student: &StudentRecord) -> Expansion {
        if let Some(program) = self.program_filter {
            if program != student.primary_program {
                return Expansion::Rows(Vec::new());
            }
        }
        if !is_eligible(student) {
            return Expansion::Rows(Vec::new());
        }
        // eligibility guarantees the program is in the registry
        let Some(course) = course_for(&student.primary_program) else {
            return Expansion::Rows(Vec::new());
        };

        if self.list_mode {
            return Expansion::Review(ReviewEntry {
                full_name: student.full_name.clone(),
                email: student.email.clone(),
            });
        }

        let username = strip_domain(&student.email, self.email_domain);
        debug!(username, course, international = student.is_international, "enrolling");
        Expansion::Rows(group_rows(
            username,
            course,
            self.semester,
            student.is_international,
        ))
    }

    /// Expands a whole roster, keeping input order.
    pub fn expand_all(&self, students: &[StudentRecord]) -> Vec<Expansion> {
        students
            .iter()
            .map(|student| self.expand(student))
            .filter(|expansion| !expansion.is_empty())
            .collect()
    }
}

/// Rows for an already-vetted roster (no eligibility check). International
/// status is any casing of "yes".
pub fn direct_enrollments(
    email: &str,
    international: &str,
    course: &str,
    semester: &str,
    email_domain: &str,
) -> Vec<EnrollmentRow> {
    let username = strip_domain(email.trim(), email_domain);
    let is_international = international.trim().eq_ignore_ascii_case("yes");
    group_rows(username, course, semester, is_international)
}

/// International students get a second row so they land in both groups.
pub fn group_rows(
    username: &str,
    course: &str,
    group: &str,
    is_international: bool,
) -> Vec<EnrollmentRow> {
    let mut rows = vec![EnrollmentRow::new(username, course, group)];
    if is_international {
        rows.push(EnrollmentRow::new(username, course, INTERNATIONAL_GROUP));
    }
    rows
}

pub fn strip_domain<'e>(email: &'e str, email_domain: &str) -> &'e str {
    email.strip_suffix(email_domain).unwrap_or(email)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::eligibility::IN_PROGRESS;
    use crate::models::ClassYear;

    const DOMAIN: &str = "@cca.edu";

    fn student(program: &str, standing: ClassYear, international: bool) -> StudentRecord {
        StudentRecord {
            full_name: "fake name".to_string(),
            email: "a@cca.edu".to_string(),
            primary_program: program.to_string(),
            program_status: IN_PROGRESS.to_string(),
            class_standing: Some(standing),
            is_international: international,
        }
    }

    fn rows(expansion: Expansion) -> Vec<EnrollmentRow> {
        match expansion {
            Expansion::Rows(rows) => rows,
            Expansion::Review(entry) => panic!("unexpected review entry {entry:?}"),
        }
    }

    #[test]
    fn domestic_student_gets_one_row() {
        let enroller = InternEnroller::new("Fall 2023", DOMAIN);
        let result = rows(enroller.expand(&student("Architecture", ClassYear::Third, false)));
        assert_eq!(result, vec![EnrollmentRow::new("a", "ARCHT-INTRN", "Fall 2023")]);
    }

    #[test]
    fn international_student_gets_two_rows() {
        let enroller = InternEnroller::new("Fall 2023", DOMAIN);
        let result = rows(enroller.expand(&student("Interior Design", ClassYear::Third, true)));
        assert_eq!(
            result,
            vec![
                EnrollmentRow::new("a", "INTER-INTRN", "Fall 2023"),
                EnrollmentRow::new("a", "INTER-INTRN", "International"),
            ]
        );
    }

    #[test]
    fn program_filter_excludes_other_programs() {
        let enroller =
            InternEnroller::new("Fall 2023", DOMAIN).with_program(Some("Interior Design"));
        let architecture = enroller.expand(&student("Architecture", ClassYear::Third, false));
        assert!(architecture.is_empty());

        let interior = rows(enroller.expand(&student("Interior Design", ClassYear::Third, false)));
        assert_eq!(interior, vec![EnrollmentRow::new("a", "INTER-INTRN", "Fall 2023")]);
    }

    #[test]
    fn ineligible_students_expand_to_nothing() {
        let enroller = InternEnroller::new("Fall 2023", DOMAIN);

        let mut suspended = student("Architecture", ClassYear::Third, false);
        suspended.program_status = "Suspended".to_string();
        assert!(enroller.expand(&suspended).is_empty());

        let mut no_email = student("Architecture", ClassYear::Third, false);
        no_email.email.clear();
        assert!(enroller.expand(&no_email).is_empty());

        assert!(enroller
            .expand(&student("Fake Program", ClassYear::Third, false))
            .is_empty());
        assert!(enroller
            .expand(&student("Architecture", ClassYear::First, false))
            .is_empty());
    }

    #[test]
    fn list_mode_reports_name_and_email() {
        let enroller = InternEnroller::new("Fall 2023", DOMAIN).with_list_mode(true);
        let entry = enroller.expand(&student("Architecture", ClassYear::Third, true));
        assert_eq!(
            entry,
            Expansion::Review(ReviewEntry {
                full_name: "fake name".to_string(),
                email: "a@cca.edu".to_string(),
            })
        );
        if let Expansion::Review(entry) = entry {
            assert_eq!(entry.to_string(), "fake name\ta@cca.edu");
        }

        let not_ready = enroller.expand(&student("Architecture", ClassYear::First, false));
        assert!(not_ready.is_empty());
    }

    #[test]
    fn expansion_is_repeatable() {
        let enroller = InternEnroller::new("Spring 2024", DOMAIN);
        let roster = vec![
            student("Interior Design", ClassYear::Third, true),
            student("Graphic Design", ClassYear::Fourth, false),
            student("Graduate Architecture", ClassYear::Second, false),
        ];
        let first = enroller.expand_all(&roster);
        assert_eq!(first, enroller.expand_all(&roster));
        assert_eq!(first.len(), 2);
    }

    #[test]
    fn domain_suffix_is_stripped_case_sensitively() {
        assert_eq!(strip_domain("jdoe@cca.edu", DOMAIN), "jdoe");
        assert_eq!(strip_domain("jdoe@CCA.EDU", DOMAIN), "jdoe@CCA.EDU");
        assert_eq!(strip_domain("jdoe@cca.edu.org", DOMAIN), "jdoe@cca.edu.org");
    }

    #[test]
    fn direct_enrollments_trim_and_accept_any_yes() {
        assert_eq!(
            direct_enrollments(" b@cca.edu ", " YES ", "IXDSN-INTRN", "Fall 2025", DOMAIN),
            vec![
                EnrollmentRow::new("b", "IXDSN-INTRN", "Fall 2025"),
                EnrollmentRow::new("b", "IXDSN-INTRN", "International"),
            ]
        );
        assert_eq!(
            direct_enrollments("c@cca.edu", "no", "IXDSN-INTRN", "Fall 2025", DOMAIN),
            vec![EnrollmentRow::new("c", "IXDSN-INTRN", "Fall 2025")]
        );
    }
}
