use crate::models::{ClassYear, StudentRecord};
use tracing::debug;

pub const IN_PROGRESS: &str = "In Progress";

/// Which standing scale a program's students are on. Undergraduate and
/// graduate years share labels but are not comparable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Track {
    Undergraduate,
    Graduate,
}

/// A program with a required internship and the standing that makes its
/// students ready to be enrolled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InternshipProgram {
    pub name: &'static str,
    pub course: &'static str,
    pub track: Track,
    /// `None` means registry membership alone never qualifies a student.
    pub ready_at: Option<ClassYear>,
}

pub const PROGRAMS: &[InternshipProgram] = &[
    InternshipProgram {
        name: "Architecture",
        course: "ARCHT-INTRN",
        track: Track::Undergraduate,
        ready_at: Some(ClassYear::Third),
    },
    InternshipProgram {
        name: "Graduate Architecture",
        course: "MARCH-INTRN",
        track: Track::Graduate,
        ready_at: Some(ClassYear::Second),
    },
    InternshipProgram {
        name: "Graphic Design",
        course: "GRAPH-INTRN",
        track: Track::Undergraduate,
        ready_at: Some(ClassYear::Third),
    },
    // INDUS wants students to finish Prof Practice first, so nobody is preloaded
    InternshipProgram {
        name: "Industrial Design",
        course: "INDUS-INTRN",
        track: Track::Undergraduate,
        ready_at: None,
    },
    InternshipProgram {
        name: "Interaction Design",
        course: "IXDSN-INTRN",
        track: Track::Undergraduate,
        ready_at: Some(ClassYear::Third),
    },
    InternshipProgram {
        name: "Interior Design",
        course: "INTER-INTRN",
        track: Track::Undergraduate,
        ready_at: Some(ClassYear::Third),
    },
];

pub fn find_program(name: &str) -> Option<&'static InternshipProgram> {
    PROGRAMS.iter().find(|program| program.name == name)
}

pub fn program_names() -> Vec<&'static str> {
    PROGRAMS.iter().map(|program| program.name).collect()
}

pub fn course_for(program: &str) -> Option<&'static str> {
    find_program(program).map(|program| program.course)
}

impl InternshipProgram {
    /// Readiness is an exact match: later years are assumed to be enrolled
    /// already and must not be enrolled twice.
    pub fn is_ready(&self, standing: Option<ClassYear>) -> bool {
        match (self.ready_at, standing) {
            (Some(required), Some(actual)) => required == actual,
            _ => false,
        }
    }
}

/// Whether the student should be placed in their program's internship course.
pub fn is_eligible(student: &StudentRecord) -> bool {
    let Some(program) = find_program(&student.primary_program) else {
        debug!(program = %student.primary_program, "program has no internship requirement");
        return false;
    };
    if student.program_status != IN_PROGRESS {
        debug!(status = %student.program_status, "program status is not In Progress");
        return false;
    }
    if student.email.is_empty() {
        debug!(student = %student.full_name, "no institutional email yet");
        return false;
    }
    if !program.is_ready(student.class_standing) {
        debug!(
            student = %student.email,
            program = program.name,
            track = ?program.track,
            standing = student.class_standing.map(|year| year.label()).unwrap_or("unknown"),
            "class standing does not match the program's readiness rule"
        );
        return false;
    }
    true
}
