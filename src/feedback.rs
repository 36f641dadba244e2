use crate::error::FlattenError;
use regex::{Captures, Regex};
use serde::Deserialize;
use std::fmt;
use std::sync::LazyLock;

/// The two kinds of internship Feedback activities we export.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActivityKind {
    InternshipInfo,
    Evaluation,
    Unclassified,
}

impl ActivityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InternshipInfo => "internship_info",
            Self::Evaluation => "evaluation",
            Self::Unclassified => "none",
        }
    }
}

impl fmt::Display for ActivityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classifies a Feedback activity by its name. The more specific phrase is
/// checked first.
pub fn classify_activity(name: &str) -> ActivityKind {
    let name = name.trim().to_lowercase();
    if name.contains("submit employer and intern information") {
        ActivityKind::InternshipInfo
    } else if name.contains("evaluation") {
        ActivityKind::Evaluation
    } else {
        ActivityKind::Unclassified
    }
}

/// One answered question as returned by `mod_feedback_get_responses_analysis`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct QuestionResponse {
    /// Question text, starting with a "(short label)"
    pub name: String,
    pub printval: String,
    pub rawval: String,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct Attempt {
    pub id: u64,
    pub responses: Vec<QuestionResponse>,
}

/// All anonymous attempts on a single Feedback activity.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AnalysisDocument {
    pub feedback_id: u64,
    pub course_id: u64,
    pub name: String,
    pub attempts: Vec<Attempt>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FlatTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl FlatTable {
    /// No columns means there is nothing worth writing.
    pub fn is_empty(&self) -> bool {
        self.headers.is_empty()
    }
}

/// Documents split by activity kind, ready to be written as one CSV each.
#[derive(Debug, Clone, Default)]
pub struct ReportBuckets {
    pub internships: Vec<AnalysisDocument>,
    pub evaluations: Vec<AnalysisDocument>,
}

impl ReportBuckets {
    /// Returns false when the document belongs to no report.
    pub fn route(&mut self, kind: ActivityKind, document: AnalysisDocument) -> bool {
        match kind {
            ActivityKind::InternshipInfo => self.internships.push(document),
            ActivityKind::Evaluation => self.evaluations.push(document),
            ActivityKind::Unclassified => return false,
        }
        true
    }
}

/// Extracts "Phone" from "(Phone) Your phone number".
pub fn question_label(question: &str) -> Option<&str> {
    let rest = question.trim().strip_prefix('(')?;
    let end = rest.find(')')?;
    Some(&rest[..end])
}

static CHAR_REF: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"&(?:#([0-9]{1,8})|#[xX]([0-9a-fA-F]{1,6})|([A-Za-z][A-Za-z0-9]{1,31}));")
        .expect("valid regex")
});

const NAMED_REFS: &[(&str, &str)] = &[
    ("amp", "&"),
    ("lt", "<"),
    ("gt", ">"),
    ("quot", "\""),
    ("apos", "'"),
    ("nbsp", "\u{a0}"),
    ("ndash", "\u{2013}"),
    ("mdash", "\u{2014}"),
    ("lsquo", "\u{2018}"),
    ("rsquo", "\u{2019}"),
    ("ldquo", "\u{201c}"),
    ("rdquo", "\u{201d}"),
    ("hellip", "\u{2026}"),
    ("bull", "\u{2022}"),
    ("middot", "\u{b7}"),
    ("copy", "\u{a9}"),
    ("reg", "\u{ae}"),
    ("trade", "\u{2122}"),
    ("deg", "\u{b0}"),
    ("eacute", "\u{e9}"),
    ("egrave", "\u{e8}"),
    ("aacute", "\u{e1}"),
    ("iacute", "\u{ed}"),
    ("oacute", "\u{f3}"),
    ("uacute", "\u{fa}"),
    ("ntilde", "\u{f1}"),
    ("uuml", "\u{fc}"),
    ("ccedil", "\u{e7}"),
];

fn code_point(value: u32) -> char {
    match value {
        0 => char::REPLACEMENT_CHARACTER,
        _ => char::from_u32(value).unwrap_or(char::REPLACEMENT_CHARACTER),
    }
}

fn replace_reference(caps: &Captures) -> String {
    if let Some(dec) = caps.get(1) {
        return code_point(dec.as_str().parse().unwrap_or(u32::MAX)).to_string();
    }
    if let Some(hex) = caps.get(2) {
        return code_point(u32::from_str_radix(hex.as_str(), 16).unwrap_or(u32::MAX)).to_string();
    }
    let name = caps.get(3).map_or("", |m| m.as_str());
    NAMED_REFS
        .iter()
        .find(|(known, _)| *known == name)
        .map_or_else(|| caps[0].to_string(), |(_, text)| text.to_string())
}

/// Decodes HTML character references such as `&#45;` or `&amp;`. Everything
/// else in the value, markup and control characters included, is kept as is.
/// Unknown names stay literal.
pub fn decode_entities(value: &str) -> String {
    if !value.contains('&') {
        return value.to_string();
    }
    CHAR_REF.replace_all(value, replace_reference).into_owned()
}

fn attempt_labels(
    document: &AnalysisDocument,
    attempt: &Attempt,
) -> Result<Vec<String>, FlattenError> {
    attempt
        .responses
        .iter()
        .map(|response| {
            question_label(&response.name)
                .map(str::to_string)
                .ok_or_else(|| FlattenError::MissingLabel {
                    question: response.name.clone(),
                    feedback_id: document.feedback_id,
                    course_id: document.course_id,
                })
        })
        .collect()
}

fn cell_value(response: &QuestionResponse, label: &str) -> String {
    // the Connection question stores a menu index in rawval
    if label.eq_ignore_ascii_case("connection") {
        decode_entities(&response.printval)
    } else {
        decode_entities(&response.rawval)
    }
}

/// Flattens analyses into one row per attempt. Headers come from the first
/// attempt; every other attempt must carry the same labels in the same order.
/// An attempt with no answers becomes an empty row.
pub fn flatten(documents: &[AnalysisDocument]) -> Result<FlatTable, FlattenError> {
    let Some((first_document, first_attempt)) = documents
        .iter()
        .find_map(|document| document.attempts.first().map(|attempt| (document, attempt)))
    else {
        return Ok(FlatTable::default());
    };
    let headers = attempt_labels(first_document, first_attempt)?;

    let mut rows = Vec::new();
    for document in documents {
        for attempt in &document.attempts {
            if attempt.responses.is_empty() {
                rows.push(Vec::new());
                continue;
            }
            let labels = attempt_labels(document, attempt)?;
            if labels != headers {
                return Err(FlattenError::MisalignedAttempt {
                    attempt_id: attempt.id,
                    feedback_id: document.feedback_id,
                    expected: headers,
                    found: labels,
                });
            }
            rows.push(
                attempt
                    .responses
                    .iter()
                    .zip(&labels)
                    .map(|(response, label)| cell_value(response, label))
                    .collect(),
            );
        }
    }

    Ok(FlatTable { headers, rows })
}
