use thiserror::Error;

/// Data-shape problems in feedback analyses. Any of these halts the whole
/// flatten so no partial CSV is produced.
#[derive(Error, Debug, PartialEq)]
pub enum FlattenError {
    #[error("No label for question '{question}' in feedback {feedback_id} in course {course_id}")]
    MissingLabel {
        question: String,
        feedback_id: u64,
        course_id: u64,
    },

    #[error(
        "Attempt {attempt_id} in feedback {feedback_id} does not line up with the header row: \
         expected {expected:?}, found {found:?}"
    )]
    MisalignedAttempt {
        attempt_id: u64,
        feedback_id: u64,
        expected: Vec<String>,
        found: Vec<String>,
    },
}

#[derive(Error, Debug, PartialEq)]
pub enum RosterError {
    #[error("Roster is missing the '{0}' column")]
    MissingColumn(String),

    #[error("Roster has no header row")]
    MissingHeader,
}

#[derive(Error, Debug, PartialEq)]
pub enum NsoError {
    #[error("Unknown student type {student_type} for student {username}")]
    UnknownStudentType {
        student_type: String,
        username: String,
    },
}

#[derive(Error, Debug)]
pub enum MoodleError {
    #[error("HTTP request to {function} failed with status: {status}")]
    Status {
        function: String,
        status: reqwest::StatusCode,
    },

    #[error("Moodle {function} returned {errorcode}: {message}")]
    Exception {
        function: String,
        errorcode: String,
        message: String,
    },

    #[error("Request to {function} failed: {source}")]
    Transport {
        function: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Unexpected {function} response: {source}")]
    Decode {
        function: String,
        #[source]
        source: serde_json::Error,
    },
}
