use crate::feedback::FlatTable;
use crate::models::EnrollmentRow;
use anyhow::{Context, Result};
use chrono::NaiveDate;
use csv::Writer;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::info;

/// Header expected by Moodle's "Upload users" tool
pub const ENROLLMENT_HEADER: [&str; 3] = ["username", "course1", "group1"];

pub fn write_enrollments<W: io::Write>(out: W, rows: &[EnrollmentRow]) -> Result<()> {
    let mut writer = Writer::from_writer(out);
    writer.write_record(ENROLLMENT_HEADER)?;
    for row in rows {
        writer.write_record(row.as_record())?;
    }
    writer.flush()?;
    Ok(())
}

pub fn write_table<W: io::Write>(out: W, table: &FlatTable) -> Result<()> {
    let mut writer = Writer::from_writer(out);
    writer.write_record(&table.headers)?;
    for row in &table.rows {
        writer.write_record(row)?;
    }
    writer.flush()?;
    Ok(())
}

fn create_file(path: &Path) -> Result<fs::File> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
    }
    fs::File::create(path).with_context(|| format!("Failed to create file: {}", path.display()))
}

pub fn write_enrollments_file(path: &Path, rows: &[EnrollmentRow]) -> Result<()> {
    write_enrollments(create_file(path)?, rows)
        .with_context(|| format!("Failed to write enrollments: {}", path.display()))?;
    info!(rows = rows.len(), path = %path.display(), "wrote enrollment CSV");
    Ok(())
}

pub fn write_table_file(path: &Path, table: &FlatTable) -> Result<()> {
    write_table(create_file(path)?, table)
        .with_context(|| format!("Failed to write responses: {}", path.display()))?;
    info!(rows = table.rows.len(), path = %path.display(), "wrote responses CSV");
    Ok(())
}

/// `data/2024-05-01-internships-responses.csv`
pub fn responses_path(output_dir: &str, date: NaiveDate, label: &str) -> PathBuf {
    Path::new(output_dir).join(format!("{}-{}-responses.csv", date.format("%Y-%m-%d"), label))
}
