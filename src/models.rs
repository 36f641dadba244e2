use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Institutional email suffix stripped to form usernames
    pub email_domain: String,
    pub output_directory: String,
    pub columns: ColumnMap,
    pub moodle: MoodleSettings,
}

/// Roster header names for each student field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColumnMap {
    pub full_name: String,
    pub email: String,
    pub primary_program: String,
    pub program_status: String,
    pub class_standing: String,
    pub is_international: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MoodleSettings {
    pub domain: String,
    pub category: String,
    pub ignored_courses: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            email_domain: "@cca.edu".to_string(),
            output_directory: "data".to_string(),
            columns: ColumnMap::default(),
            moodle: MoodleSettings::default(),
        }
    }
}

impl Default for ColumnMap {
    fn default() -> Self {
        Self {
            full_name: "Student".to_string(),
            email: "CCA Email".to_string(),
            primary_program: "Primary Program of Study".to_string(),
            program_status: "Primary Program of Study Record Status".to_string(),
            class_standing: "Latest Class Standing".to_string(),
            is_international: "Is International Student".to_string(),
        }
    }
}

impl Config {
    pub fn load_from_file(file_path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(file_path)
            .with_context(|| format!("Failed to read config file: {}", file_path))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", file_path))?;
        Ok(config)
    }

    pub fn save_to_file(&self, file_path: &str) -> anyhow::Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(file_path, content)
            .with_context(|| format!("Failed to write config file: {}", file_path))?;
        Ok(())
    }

    /// Loads the file when present, otherwise falls back to the defaults.
    pub fn load_or_default(file_path: &str) -> anyhow::Result<Self> {
        if std::path::Path::new(file_path).exists() {
            Self::load_from_file(file_path)
        } else {
            Ok(Self::default())
        }
    }
}

/// Values that may come from the environment (after `.env` is loaded)
#[derive(Debug, Clone, Default)]
pub struct EnvOverrides {
    pub token: Option<String>,
    pub domain: Option<String>,
    pub category: Option<String>,
    pub ignored_courses: Option<String>,
}

impl EnvOverrides {
    pub fn from_env() -> Self {
        let read = |key: &str| std::env::var(key).ok().filter(|v| !v.is_empty());
        Self {
            token: read("TOKEN"),
            domain: read("DOMAIN"),
            category: read("CATEGORY"),
            ignored_courses: read("IGNORED_COURSES"),
        }
    }
}

/// Fully resolved web-service settings handed to the HTTP client
#[derive(Debug, Clone, PartialEq)]
pub struct MoodleConfig {
    pub domain: String,
    pub token: String,
    pub category: String,
    pub ignored_courses: Vec<String>,
}

impl MoodleConfig {
    /// Precedence: CLI flag, then environment, then config file.
    pub fn resolve(
        settings: &MoodleSettings,
        env: &EnvOverrides,
        cli_token: Option<&str>,
        cli_domain: Option<&str>,
    ) -> anyhow::Result<Self> {
        let token = cli_token
            .map(str::to_string)
            .or_else(|| env.token.clone())
            .context("No web service token: set TOKEN in .env or pass --token")?;

        let domain = cli_domain
            .map(str::to_string)
            .or_else(|| env.domain.clone())
            .unwrap_or_else(|| settings.domain.clone());
        if domain.is_empty() {
            anyhow::bail!("No Moodle domain: set DOMAIN in .env, [moodle].domain in the config, or pass --domain");
        }

        let category = env
            .category
            .clone()
            .unwrap_or_else(|| settings.category.clone());

        let ignored_courses = match &env.ignored_courses {
            Some(list) => split_course_list(list),
            None => settings.ignored_courses.clone(),
        };

        Ok(Self {
            domain: domain.trim_end_matches('/').to_string(),
            token,
            category,
            ignored_courses,
        })
    }

    pub fn service_url(&self) -> String {
        format!("{}/webservice/rest/server.php", self.domain)
    }
}

pub fn split_course_list(list: &str) -> Vec<String> {
    list.split(',')
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(str::to_string)
        .collect()
}

/// Class standing label. The same labels are used by undergraduate and
/// graduate students, so a year is only meaningful together with a program.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClassYear {
    First,
    Second,
    Third,
    Fourth,
    Fifth,
}

impl ClassYear {
    pub fn from_label(label: &str) -> Option<Self> {
        match label.trim() {
            "First Year" => Some(Self::First),
            "Second Year" => Some(Self::Second),
            "Third Year" => Some(Self::Third),
            "Fourth Year" => Some(Self::Fourth),
            "Fifth Year" => Some(Self::Fifth),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::First => "First Year",
            Self::Second => "Second Year",
            Self::Third => "Third Year",
            Self::Fourth => "Fourth Year",
            Self::Fifth => "Fifth Year",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct StudentRecord {
    pub full_name: String,
    /// Empty until the institutional account is provisioned
    pub email: String,
    pub primary_program: String,
    pub program_status: String,
    pub class_standing: Option<ClassYear>,
    pub is_international: bool,
}

/// One line of a Moodle "Upload users" enrollment CSV
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnrollmentRow {
    pub username: String,
    pub course: String,
    pub group: String,
}

impl EnrollmentRow {
    pub fn new(username: &str, course: &str, group: &str) -> Self {
        Self {
            username: username.to_string(),
            course: course.to_string(),
            group: group.to_string(),
        }
    }

    pub fn as_record(&self) -> [&str; 3] {
        [&self.username, &self.course, &self.group]
    }
}

pub const INTERNATIONAL_GROUP: &str = "International";

/// A student surfaced for human review instead of enrollment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReviewEntry {
    pub full_name: String,
    pub email: String,
}

impl fmt::Display for ReviewEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}\t{}", self.full_name, self.email)
    }
}
