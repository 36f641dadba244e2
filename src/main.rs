mod eligibility;
mod enrollment;
mod error;
mod feedback;
mod logging;
mod models;
mod moodle;
mod nso;
mod report;
mod roster;

use anyhow::{Context, Result};
use chrono::Local;
use clap::builder::PossibleValuesParser;
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use enrollment::{direct_enrollments, Expansion, InternEnroller};
use models::{Config, EnrollmentRow, EnvOverrides, MoodleConfig};
use moodle::MoodleClient;
use nso::NsoColumns;
use regex::Regex;
use roster::Roster;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

const DEFAULT_CONFIG: &str = "config.toml";
const SEMESTER_PATTERN: &str = r"^(Spring|Fall|Summer) \d{4}$";
const IXD_PROGRAM: &str = "Interaction Design";

/// Clap value parser for semester group names like "Fall 2023".
fn parse_semester(value: &str) -> Result<String, String> {
    let pattern = Regex::new(SEMESTER_PATTERN).map_err(|e| e.to_string())?;
    if pattern.is_match(value) {
        Ok(value.to_string())
    } else {
        Err(format!(
            "Semester must be in the format of 'Season YYYY' like 'Fall 2023', not '{}'",
            value
        ))
    }
}

fn semester_arg() -> Arg {
    Arg::new("semester")
        .short('s')
        .long("semester")
        .value_name("SEMESTER")
        .help("Semester group (like \"Fall 2023\")")
        .required(true)
        .value_parser(parse_semester)
}

fn token_arg() -> Arg {
    Arg::new("token")
        .short('t')
        .long("token")
        .help("Moodle web service token (overrides .env)")
}

fn domain_arg() -> Arg {
    Arg::new("domain")
        .short('d')
        .long("domain")
        .help("Moodle domain URL (overrides .env)")
}

fn cli() -> Command {
    Command::new("moodle-enroll")
        .version("0.1")
        .about("Turns roster exports and Feedback analyses into Moodle upload CSVs")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("Configuration file path")
                .global(true)
                .default_value(DEFAULT_CONFIG),
        )
        .subcommand(
            Command::new("interns")
                .about("Generate enrollments for students who are ready for internship courses")
                .arg(
                    Arg::new("report")
                        .short('r')
                        .long("report")
                        .value_name("CSV")
                        .help("Path to the Workday report exported as CSV")
                        .required(true)
                        .value_parser(value_parser!(PathBuf)),
                )
                .arg(semester_arg())
                .arg(
                    Arg::new("program")
                        .short('p')
                        .long("program")
                        .help("Generate enrollments for only a specific program")
                        .value_parser(PossibleValuesParser::new(eligibility::program_names())),
                )
                .arg(
                    Arg::new("list")
                        .short('l')
                        .long("list-mode")
                        .help("Print list of students (instead of CSV)")
                        .action(ArgAction::SetTrue),
                )
                .arg(
                    Arg::new("out")
                        .short('o')
                        .long("out")
                        .value_name("CSV")
                        .default_value("enrollments.csv")
                        .value_parser(value_parser!(PathBuf)),
                ),
        )
        .subcommand(
            Command::new("ixd")
                .about("Enroll a vetted list (email, international columns) in the IxD internship")
                .arg(
                    Arg::new("csv")
                        .value_name("CSV")
                        .required(true)
                        .value_parser(value_parser!(PathBuf)),
                )
                .arg(semester_arg())
                .arg(
                    Arg::new("out")
                        .short('o')
                        .long("out")
                        .value_name("CSV")
                        .default_value("enrollments.csv")
                        .value_parser(value_parser!(PathBuf)),
                ),
        )
        .subcommand(
            Command::new("nso")
                .about("Convert an orientation export into a Moodle enrollment CSV")
                .arg(
                    Arg::new("infile")
                        .short('i')
                        .long("infile")
                        .help("Input CSV file")
                        .required(true)
                        .value_parser(value_parser!(PathBuf)),
                )
                .arg(
                    Arg::new("outfile")
                        .short('o')
                        .long("outfile")
                        .help("Output CSV file")
                        .default_value("nso.csv")
                        .value_parser(value_parser!(PathBuf)),
                )
                .arg(
                    Arg::new("course")
                        .long("course")
                        .help("Course shortname (e.g. NSO-{type}-2024FA); {type} becomes FRESH, GRAD or TRSFR")
                        .required(true),
                )
                .arg(
                    Arg::new("email")
                        .short('e')
                        .long("email")
                        .help("Email column")
                        .default_value("CCA Email"),
                )
                .arg(
                    Arg::new("intl")
                        .long("intl")
                        .help("International column")
                        .default_value("International?"),
                )
                .arg(
                    Arg::new("type")
                        .short('t')
                        .long("type")
                        .help("Student type (First Year, Transfer, Graduate) column")
                        .default_value("Applicant Type"),
                ),
        )
        .subcommand(
            Command::new("feedback")
                .about("Export internship information and evaluation responses to CSV")
                .arg(token_arg())
                .arg(domain_arg()),
        )
        .subcommand(
            Command::new("categories")
                .about("Get Moodle category data by name (e.g. 2022SP)")
                .arg(Arg::new("name").value_name("NAME").required(true))
                .arg(token_arg())
                .arg(domain_arg()),
        )
        .subcommand(
            Command::new("enrolled-users")
                .about("Get users enrolled in a Moodle course")
                .arg(
                    Arg::new("courseid")
                        .value_name("COURSEID")
                        .required(true)
                        .value_parser(value_parser!(u64)),
                )
                .arg(token_arg())
                .arg(domain_arg()),
        )
        .subcommand(Command::new("init-config").about("Write a default configuration file"))
}

fn required<'a, T: Clone + Send + Sync + 'static>(args: &'a ArgMatches, id: &str) -> Result<&'a T> {
    args.get_one::<T>(id)
        .with_context(|| format!("Missing required argument: {}", id))
}

fn string_arg(args: &ArgMatches, id: &str) -> Option<String> {
    args.get_one::<String>(id).cloned()
}

fn print_upload_hint(config: &Config, path: &Path) {
    if config.moodle.domain.is_empty() {
        println!("Created {}. Feed it to the Upload Users tool.", path.display());
    } else {
        println!(
            "Created {}. Feed it to the Upload Users tool: {}/admin/tool/uploaduser/",
            path.display(),
            config.moodle.domain.trim_end_matches('/')
        );
    }
}

fn run_interns(config: &Config, args: &ArgMatches) -> Result<()> {
    let report: &PathBuf = required(args, "report")?;
    let semester: &String = required(args, "semester")?;
    let out: &PathBuf = required(args, "out")?;
    let program = args.get_one::<String>("program").map(String::as_str);
    let list_mode = args.get_flag("list");

    let roster = Roster::from_path(report)?;
    if roster.is_empty() {
        warn!(report = %report.display(), "report has no student rows");
    }
    debug!(rows = roster.len(), report = %report.display(), "read roster");
    let students = roster.students(&config.columns)?;

    let enroller = InternEnroller::new(semester, &config.email_domain)
        .with_program(program)
        .with_list_mode(list_mode);

    let mut rows = Vec::new();
    for expansion in enroller.expand_all(&students) {
        match expansion {
            Expansion::Rows(student_rows) => rows.extend(student_rows),
            Expansion::Review(entry) => println!("{}", entry),
        }
    }
    if list_mode {
        return Ok(());
    }

    report::write_enrollments_file(out, &rows)?;
    print_upload_hint(config, out);
    println!(
        "Remember to add {} to the Semester Groups grouping in each course.",
        semester
    );
    Ok(())
}

#[derive(Debug, Deserialize)]
struct IxdRow {
    email: String,
    international: String,
}

fn ixd_enrollments(path: &Path, semester: &str, email_domain: &str) -> Result<Vec<EnrollmentRow>> {
    let course = eligibility::course_for(IXD_PROGRAM)
        .with_context(|| format!("{} is missing from the program registry", IXD_PROGRAM))?;
    let mut reader = csv::Reader::from_path(path)
        .with_context(|| format!("Failed to open {}", path.display()))?;

    let mut rows = Vec::new();
    for result in reader.deserialize::<IxdRow>() {
        let row = result.with_context(|| format!("Failed to read {}", path.display()))?;
        rows.extend(direct_enrollments(
            &row.email,
            &row.international,
            course,
            semester,
            email_domain,
        ));
    }
    Ok(rows)
}

fn run_ixd(config: &Config, args: &ArgMatches) -> Result<()> {
    let input: &PathBuf = required(args, "csv")?;
    let semester: &String = required(args, "semester")?;
    let out: &PathBuf = required(args, "out")?;

    let rows = ixd_enrollments(input, semester, &config.email_domain)?;
    report::write_enrollments_file(out, &rows)?;
    print_upload_hint(config, out);
    Ok(())
}

fn run_nso(config: &Config, args: &ArgMatches) -> Result<()> {
    let infile: &PathBuf = required(args, "infile")?;
    let outfile: &PathBuf = required(args, "outfile")?;
    let course: &String = required(args, "course")?;
    let defaults = NsoColumns::default();
    let columns = NsoColumns {
        email: string_arg(args, "email").unwrap_or(defaults.email),
        international: string_arg(args, "intl").unwrap_or(defaults.international),
        student_type: string_arg(args, "type").unwrap_or(defaults.student_type),
    };

    let roster = Roster::from_path(infile)?;
    let rows = nso::orientation_enrollments(&roster, &columns, course, &config.email_domain)?;
    report::write_enrollments_file(outfile, &rows)?;
    println!("Created {}.", outfile.display());
    Ok(())
}

fn moodle_client(config: &Config, args: &ArgMatches) -> Result<MoodleClient> {
    let moodle_config = MoodleConfig::resolve(
        &config.moodle,
        &EnvOverrides::from_env(),
        args.get_one::<String>("token").map(String::as_str),
        args.get_one::<String>("domain").map(String::as_str),
    )?;
    Ok(MoodleClient::new(moodle_config))
}

async fn run_feedback(config: &Config, args: &ArgMatches) -> Result<()> {
    let client = moodle_client(config, args)?;

    let courses = client.courses_in_category().await?;
    for course in &courses {
        debug!(id = course.id, shortname = %course.shortname, fullname = %course.fullname, "course");
    }
    let feedbacks = client.feedbacks_in_courses(&courses).await?;
    let buckets = client.collect_reports(&feedbacks).await?;

    // flatten everything first so a malformed analysis leaves no partial output
    let tables = [
        ("internships", feedback::flatten(&buckets.internships)?),
        ("evaluations", feedback::flatten(&buckets.evaluations)?),
    ];

    let today = Local::now().date_naive();
    for (label, table) in &tables {
        if table.is_empty() {
            warn!(label, "no responses to write");
            continue;
        }
        let path = report::responses_path(&config.output_directory, today, label);
        report::write_table_file(&path, table)?;
        println!("Wrote {} responses to {}", table.rows.len(), path.display());
    }
    Ok(())
}

async fn run_categories(config: &Config, args: &ArgMatches) -> Result<()> {
    let name: &String = required(args, "name")?;
    let client = moodle_client(config, args)?;

    let categories = client
        .categories(&[("name".to_string(), name.clone())])
        .await?;
    if categories.is_empty() {
        println!("No matching categories were found; check your query filter.");
    }
    println!("{}", serde_json::to_string_pretty(&categories)?);
    Ok(())
}

async fn run_enrolled_users(config: &Config, args: &ArgMatches) -> Result<()> {
    let course_id: &u64 = required(args, "courseid")?;
    let client = moodle_client(config, args)?;

    let users = client.enrolled_users(*course_id).await?;
    println!("{}", serde_json::to_string_pretty(&users)?);
    Ok(())
}

fn init_config(config_file: &str) -> Result<()> {
    if Path::new(config_file).exists() {
        anyhow::bail!("{} already exists, not overwriting it", config_file);
    }
    Config::default().save_to_file(config_file)?;
    println!(
        "Created default configuration file: {}. Set [moodle].domain and category, and put TOKEN in .env.",
        config_file
    );
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    logging::init_logging(logging::debug_requested(
        std::env::var("DEBUG").ok().as_deref(),
    ));

    let matches = cli().get_matches();
    let config_file = matches
        .get_one::<String>("config")
        .map(String::as_str)
        .unwrap_or(DEFAULT_CONFIG);

    let Some((command, args)) = matches.subcommand() else {
        anyhow::bail!("No command given; see --help");
    };
    if command == "init-config" {
        return init_config(config_file);
    }

    let config = Config::load_or_default(config_file)?;
    match command {
        "interns" => run_interns(&config, args),
        "ixd" => run_ixd(&config, args),
        "nso" => run_nso(&config, args),
        "feedback" => run_feedback(&config, args).await,
        "categories" => run_categories(&config, args).await,
        "enrolled-users" => run_enrolled_users(&config, args).await,
        other => anyhow::bail!("Unknown command: {}", other),
    }
}
