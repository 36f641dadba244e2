use crate::error::MoodleError;
use crate::feedback::{classify_activity, ActivityKind, AnalysisDocument, Attempt, ReportBuckets};
use crate::models::MoodleConfig;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, info, warn};

const COURSES_BY_FIELD: &str = "core_course_get_courses_by_field";
const FEEDBACKS_BY_COURSES: &str = "mod_feedback_get_feedbacks_by_courses";
const RESPONSES_ANALYSIS: &str = "mod_feedback_get_responses_analysis";
const GET_CATEGORIES: &str = "core_course_get_categories";
const ENROLLED_USERS: &str = "core_enrol_get_enrolled_users";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Course {
    pub id: u64,
    pub shortname: String,
    pub fullname: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct CoursesResponse {
    courses: Vec<Course>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct FeedbackActivity {
    pub id: u64,
    pub course: u64,
    pub name: String,
    pub coursemodule: u64,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct FeedbacksResponse {
    feedbacks: Vec<FeedbackActivity>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ResponsesAnalysis {
    pub anonattempts: Vec<Attempt>,
    pub totalanonattempts: u64,
    pub warnings: Vec<Value>,
}

pub struct MoodleClient {
    client: reqwest::Client,
    config: MoodleConfig,
}

impl MoodleClient {
    pub fn new(config: MoodleConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
        }
    }

    async fn call<T: DeserializeOwned>(
        &self,
        function: &str,
        params: &[(String, String)],
    ) -> Result<T, MoodleError> {
        let transport = |source: reqwest::Error| MoodleError::Transport {
            function: function.to_string(),
            source,
        };

        let response = self
            .client
            .get(self.config.service_url())
            .query(&[
                ("wstoken", self.config.token.as_str()),
                ("wsfunction", function),
                ("moodlewsrestformat", "json"),
            ])
            .query(params)
            .timeout(Duration::from_secs(30))
            .send()
            .await
            .map_err(transport)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(function, %status, %body, "HTTP error");
            return Err(MoodleError::Status {
                function: function.to_string(),
                status,
            });
        }

        let body: Value = response.json().await.map_err(transport)?;
        decode_response(function, body)
    }

    /// Categories matching every `(field, value)` filter, e.g. `("name", "2019SP")`
    /// or `("parent", "12")`. Returned as raw JSON objects.
    pub async fn categories(&self, filters: &[(String, String)]) -> Result<Vec<Value>, MoodleError> {
        let categories: Vec<Value> = self.call(GET_CATEGORIES, &criteria_params(filters)).await?;
        debug!(count = categories.len(), ?filters, "category search");
        Ok(categories)
    }

    /// Users enrolled in a course, with their profiles and other enrollments.
    pub async fn enrolled_users(&self, course_id: u64) -> Result<Value, MoodleError> {
        let params = vec![("courseid".to_string(), course_id.to_string())];
        self.call(ENROLLED_USERS, &params).await
    }

    /// All courses in the configured internships category.
    pub async fn courses_in_category(&self) -> Result<Vec<Course>, MoodleError> {
        let params = vec![
            ("field".to_string(), "category".to_string()),
            ("value".to_string(), self.config.category.clone()),
        ];
        let data: CoursesResponse = self.call(COURSES_BY_FIELD, &params).await?;
        debug!(
            count = data.courses.len(),
            "found courses in {}/course/management.php?categoryid={}",
            self.config.domain,
            self.config.category
        );
        Ok(data.courses)
    }

    /// Feedback activities inside the given courses, skipping ignored ones.
    pub async fn feedbacks_in_courses(
        &self,
        courses: &[Course],
    ) -> Result<Vec<FeedbackActivity>, MoodleError> {
        let ids = wanted_course_ids(courses, &self.config.ignored_courses);
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let data: FeedbacksResponse = self
            .call(FEEDBACKS_BY_COURSES, &course_id_params(&ids))
            .await?;
        debug!(count = data.feedbacks.len(), "found Feedback activities");
        Ok(data.feedbacks)
    }

    pub async fn responses_analysis(
        &self,
        feedback: &FeedbackActivity,
    ) -> Result<ResponsesAnalysis, MoodleError> {
        let params = vec![("feedbackid".to_string(), feedback.id.to_string())];
        let analysis: ResponsesAnalysis = self.call(RESPONSES_ANALYSIS, &params).await?;
        if !analysis.warnings.is_empty() {
            warn!(feedback = feedback.id, warnings = ?analysis.warnings, "analysis returned warnings");
        }
        debug!(
            attempts = analysis.anonattempts.len(),
            "attempts on Feedback {} {}/mod/feedback/show_entries.php?id={}",
            feedback.id,
            self.config.domain,
            feedback.coursemodule
        );
        Ok(analysis)
    }

    /// Fetches analyses for every internship-related feedback and sorts them
    /// into report buckets. Unclassified activities are never fetched.
    pub async fn collect_reports(
        &self,
        feedbacks: &[FeedbackActivity],
    ) -> Result<ReportBuckets, MoodleError> {
        let mut buckets = ReportBuckets::default();
        for feedback in feedbacks {
            let kind = classify_activity(&feedback.name);
            if kind == ActivityKind::Unclassified {
                debug!(feedback = feedback.id, name = %feedback.name, "skipping unrelated feedback");
                continue;
            }
            debug!(feedback = feedback.id, %kind, "fetching analysis");
            let analysis = self.responses_analysis(feedback).await?;
            if analysis.totalanonattempts == 0 {
                continue;
            }
            buckets.route(kind, into_document(feedback, analysis));
        }
        info!(
            internships = buckets.internships.len(),
            evaluations = buckets.evaluations.len(),
            "collected feedback analyses"
        );
        Ok(buckets)
    }
}

pub fn into_document(feedback: &FeedbackActivity, analysis: ResponsesAnalysis) -> AnalysisDocument {
    AnalysisDocument {
        feedback_id: feedback.id,
        course_id: feedback.course,
        name: feedback.name.clone(),
        attempts: analysis.anonattempts,
    }
}

/// Moodle reports failures as HTTP 200 with an error object in the body.
pub fn check_exception(function: &str, body: &Value) -> Result<(), MoodleError> {
    let Some(object) = body.as_object() else {
        return Ok(());
    };
    if !object.contains_key("exception") && !object.contains_key("moodle_exception") {
        return Ok(());
    }
    let field = |key: &str| {
        object
            .get(key)
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string()
    };
    Err(MoodleError::Exception {
        function: function.to_string(),
        errorcode: field("errorcode"),
        message: field("message"),
    })
}

pub fn decode_response<T: DeserializeOwned>(function: &str, body: Value) -> Result<T, MoodleError> {
    check_exception(function, &body)?;
    serde_json::from_value(body).map_err(|source| MoodleError::Decode {
        function: function.to_string(),
        source,
    })
}

pub fn wanted_course_ids(courses: &[Course], ignored: &[String]) -> Vec<String> {
    courses
        .iter()
        .map(|course| course.id.to_string())
        .filter(|id| !ignored.contains(id))
        .collect()
}

/// PHP-style array parameters: `courseids[0]=1&courseids[1]=2`
pub fn course_id_params(ids: &[String]) -> Vec<(String, String)> {
    ids.iter()
        .enumerate()
        .map(|(idx, id)| (format!("courseids[{}]", idx), id.clone()))
        .collect()
}

/// `criteria[0][key]=name&criteria[0][value]=2019SP` for each filter pair
pub fn criteria_params(filters: &[(String, String)]) -> Vec<(String, String)> {
    filters
        .iter()
        .enumerate()
        .flat_map(|(idx, (key, value))| {
            [
                (format!("criteria[{}][key]", idx), key.clone()),
                (format!("criteria[{}][value]", idx), value.clone()),
            ]
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn course(id: u64) -> Course {
        Course {
            id,
            ..Course::default()
        }
    }

    #[test]
    fn exception_payload_becomes_error() {
        let body = json!({
            "errorcode": "criteriaerror",
            "exception": "moodle_exception",
            "message": "Missing permissions to search on a criterion."
        });
        match check_exception(COURSES_BY_FIELD, &body).unwrap_err() {
            MoodleError::Exception { errorcode, message, .. } => {
                assert_eq!(errorcode, "criteriaerror");
                assert_eq!(message, "Missing permissions to search on a criterion.");
            }
            other => panic!("unexpected error {other}"),
        }
    }

    #[test]
    fn ordinary_payloads_pass() {
        assert!(check_exception(COURSES_BY_FIELD, &json!({"courses": []})).is_ok());
        assert!(check_exception(COURSES_BY_FIELD, &json!([])).is_ok());
    }

    #[test]
    fn ignored_courses_are_dropped() {
        let ids = wanted_course_ids(&[course(1), course(2), course(3)], &["2".to_string()]);
        assert_eq!(ids, vec!["1", "3"]);
    }

    #[test]
    fn course_ids_use_indexed_parameters() {
        let params = course_id_params(&["10".to_string(), "20".to_string()]);
        assert_eq!(
            params,
            vec![
                ("courseids[0]".to_string(), "10".to_string()),
                ("courseids[1]".to_string(), "20".to_string()),
            ]
        );
    }

    #[test]
    fn category_filters_use_indexed_criteria() {
        let params = criteria_params(&[
            ("name".to_string(), "2019SP".to_string()),
            ("parent".to_string(), "12".to_string()),
        ]);
        assert_eq!(
            params,
            vec![
                ("criteria[0][key]".to_string(), "name".to_string()),
                ("criteria[0][value]".to_string(), "2019SP".to_string()),
                ("criteria[1][key]".to_string(), "parent".to_string()),
                ("criteria[1][value]".to_string(), "12".to_string()),
            ]
        );
        assert!(criteria_params(&[]).is_empty());
    }

    #[test]
    fn category_responses_decode() {
        let none: Vec<Value> = decode_response(GET_CATEGORIES, json!([])).unwrap();
        assert!(none.is_empty());

        let found: Vec<Value> = decode_response(
            GET_CATEGORIES,
            json!([{"id": 40, "name": "2019SP", "parent": 0, "path": "/40", "coursecount": 3}]),
        )
        .unwrap();
        assert_eq!(found[0]["path"], "/40");

        let err = decode_response::<Vec<Value>>(
            GET_CATEGORIES,
            json!({
                "errorcode": "criteriaerror",
                "debuginfo": "You can not search on this criteria: shortname",
                "exception": "moodle_exception",
                "message": "Missing permissions to search on a criterion."
            }),
        )
        .unwrap_err();
        assert!(matches!(err, MoodleError::Exception { ref errorcode, .. } if errorcode == "criteriaerror"));
        assert_eq!(
            err.to_string(),
            "Moodle core_course_get_categories returned criteriaerror: Missing permissions to search on a criterion."
        );
    }

    #[test]
    fn unexpected_shape_is_a_decode_error() {
        let err = decode_response::<Vec<Value>>(GET_CATEGORIES, json!({"courses": []})).unwrap_err();
        assert!(matches!(err, MoodleError::Decode { .. }));
    }

    #[test]
    fn legacy_exception_key_is_detected() {
        let body = json!({"moodle_exception": "invalidtoken", "message": "Invalid token"});
        assert!(check_exception(ENROLLED_USERS, &body).is_err());
    }

    #[test]
    fn analysis_json_becomes_a_document() {
        let analysis: ResponsesAnalysis = serde_json::from_value(json!({
            "attempts": [],
            "totalattempts": 0,
            "anonattempts": [{
                "id": 5817, "courseid": 0, "userid": 11, "timemodified": 1683236827,
                "fullname": "Rey .",
                "responses": [{"id": 10490, "name": "(Phone) Your Phone Number",
                               "printval": "323-123-9876", "rawval": "323-123-9876"}]
            }],
            "totalanonattempts": 1,
            "warnings": []
        }))
        .unwrap();
        let feedback = FeedbackActivity {
            id: 1520,
            course: 5204,
            name: "Submit Employer and Intern Information".to_string(),
            coursemodule: 239207,
        };

        let document = into_document(&feedback, analysis);
        assert_eq!(document.feedback_id, 1520);
        assert_eq!(document.course_id, 5204);
        assert_eq!(document.attempts.len(), 1);
        assert_eq!(document.attempts[0].responses[0].name, "(Phone) Your Phone Number");
    }

    #[test]
    fn feedback_list_tolerates_extra_fields() {
        let data: FeedbacksResponse = serde_json::from_value(json!({
            "feedbacks": [{
                "id": 1520, "course": 5204, "name": "Submit Employer and Intern Information",
                "intro": "", "introformat": 1, "anonymous": 2, "coursemodule": 239207,
                "introfiles": []
            }],
            "warnings": []
        }))
        .unwrap();
        assert_eq!(data.feedbacks[0].coursemodule, 239207);
    }
}
