//! Access computation and report assembly.
//!
//! For every (satellite, facility) pair the engine asks STK to compute
//! access and then pulls the tabular "Access" report for the access time
//! window. The host emits columns separated by runs of two or more spaces
//! rather than a strict delimiter, so row recovery lives in one
//! narrowly-scoped parsing function with an explicit field contract.

use std::io::{Read, Write};

use chrono::{Local, NaiveDateTime, TimeZone, Utc};
use log::{info, warn};

use crate::client::ConnectClient;
use crate::config::ReportFormat;
use crate::error::StkResult;

/// Date format the host uses in report timestamps, interpreted as UTC.
const HOST_DATE_FORMAT: &str = "%d %b %Y %H:%M:%S%.f";
/// Display format for timestamps converted to the process-local timezone.
const LOCAL_DATE_FORMAT: &str = "%-d %b %Y %H:%M:%S";

/// Error token the host embeds in report text when a command failed
/// without nacking.
const COMMAND_FAILED_TOKEN: &str = "E_CommandFailed";

const CSV_HEADER: &str = "Satellite,Facility,Access Number,Start Time (UTCG),Stop Time (UTCG),\
Start Time (Local),Stop Time (Local),Duration (MM:SS.sss)";

/// One surviving access interval.
///
/// Duration is carried as the host reported it, reformatted but never
/// recomputed from the timestamps.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessRecord {
    pub satellite: String,
    pub facility: String,
    pub sequence: String,
    pub utc_start: String,
    pub utc_stop: String,
    pub local_start: String,
    pub local_stop: String,
    pub duration: String,
}

/// Computes access pairs and renders the combined report.
#[derive(Debug, Clone)]
pub struct AccessReportEngine {
    threshold_seconds: f64,
    format: ReportFormat,
}

impl AccessReportEngine {
    pub fn new(threshold_seconds: f64, format: ReportFormat) -> Self {
        Self {
            threshold_seconds,
            format,
        }
    }

    /// Enumerate the ground facilities known to the scenario.
    ///
    /// An empty listing or a rejected command yields an empty list, not an
    /// error; report generation is simply skipped in that case.
    pub fn enumerate_facilities<S: Read + Write>(
        &self,
        client: &mut ConnectClient<S>,
    ) -> StkResult<Vec<String>> {
        let frame = client.send_command("AllInstanceNames / Facility")?;
        if client.is_ack_on() && !frame.acked {
            return Ok(Vec::new());
        }
        let listing = frame.text();
        if listing.trim().is_empty() || listing.contains(COMMAND_FAILED_TOKEN) {
            return Ok(Vec::new());
        }
        Ok(extract_facility_names(&listing))
    }

    /// Compute access for every (satellite, facility) pair and render the
    /// report in the configured format. No surviving interval anywhere
    /// yields an empty string, which callers treat as "no access found".
    pub fn generate<S: Read + Write>(
        &self,
        client: &mut ConnectClient<S>,
        scenario_name: &str,
        satellites: &[String],
        facilities: &[String],
    ) -> StkResult<String> {
        let records = self.compute_records(client, scenario_name, satellites, facilities)?;
        info!(
            "{} access intervals survived the {}s threshold",
            records.len(),
            self.threshold_seconds
        );
        Ok(match self.format {
            ReportFormat::Csv => render_csv(&records),
            ReportFormat::Text => render_text(&records, facilities),
        })
    }

    fn compute_records<S: Read + Write>(
        &self,
        client: &mut ConnectClient<S>,
        scenario_name: &str,
        satellites: &[String],
        facilities: &[String],
    ) -> StkResult<Vec<AccessRecord>> {
        let mut records = Vec::new();

        for satellite in satellites {
            for facility in facilities {
                let sat_path = format!("/Scenario/{scenario_name}/Satellite/{satellite}");
                let fac_path = format!("/Scenario/{scenario_name}/Facility/{facility}");

                client.send_command(&format!(
                    "Access {sat_path} {fac_path} TimePeriod UseScenarioInterval"
                ))?;
                let report = client.send_command(&format!(
                    "Report_RM {sat_path} Style \"Access\" AccessObject {fac_path} \
TimePeriod UseAccessTimes"
                ))?;

                if client.is_ack_on() && !report.acked {
                    warn!("access report rejected for {satellite} / {facility}");
                    continue;
                }
                let body = report.text();
                if body.trim().is_empty() || body.contains(COMMAND_FAILED_TOKEN) {
                    continue;
                }

                records.extend(self.parse_report_rows(&body, satellite, facility));
            }
        }

        Ok(records)
    }

    /// Recover access rows from one report body.
    ///
    /// The first line is a column header and is discarded. Each remaining
    /// line is split on runs of 2+ whitespace; rows with fewer than 4
    /// fields are malformed and skipped. Field contract: 0 = sequence
    /// number, 1 = UTC start, 2 = UTC stop, 3 = duration in seconds.
    /// Rows not strictly above the threshold are dropped; rows that fail
    /// to parse are logged and skipped.
    fn parse_report_rows(&self, body: &str, satellite: &str, facility: &str) -> Vec<AccessRecord> {
        let mut records = Vec::new();

        for line in body.lines().skip(1) {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let fields = collapse_columns(line);
            if fields.len() < 4 {
                continue;
            }

            let Ok(duration_seconds) = fields[3].parse::<f64>() else {
                warn!("unparseable access row dropped: {line:?}");
                continue;
            };
            if duration_seconds <= self.threshold_seconds {
                continue;
            }

            let (Some(local_start), Some(local_stop)) =
                (to_local(&fields[1]), to_local(&fields[2]))
            else {
                warn!("unparseable access row dropped: {line:?}");
                continue;
            };

            records.push(AccessRecord {
                satellite: satellite.to_string(),
                facility: facility.to_string(),
                sequence: fields[0].clone(),
                utc_start: fields[1].clone(),
                utc_stop: fields[2].clone(),
                local_start,
                local_stop,
                duration: format_duration(duration_seconds),
            });
        }

        records
    }
}

/// Extract facility names from an object-path listing, one per
/// `/Facility/<name>` occurrence, stripping the `Facility` suffix some
/// scenarios append to the object name.
fn extract_facility_names(listing: &str) -> Vec<String> {
    let mut names = Vec::new();
    let mut rest = listing;
    while let Some(index) = rest.find("/Facility/") {
        rest = &rest[index + "/Facility/".len()..];
        let name: String = rest
            .chars()
            .take_while(|c| *c != '/' && !c.is_whitespace())
            .collect();
        if !name.is_empty() {
            names.push(name.strip_suffix("Facility").unwrap_or(&name).to_string());
        }
    }
    names
}

/// Split a report line on runs of two or more whitespace characters.
/// Single spaces stay inside a field (timestamps contain them).
fn collapse_columns(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut whitespace_run = 0usize;

    for c in line.trim().chars() {
        if c.is_whitespace() {
            whitespace_run += 1;
            continue;
        }
        if whitespace_run >= 2 && !current.is_empty() {
            fields.push(std::mem::take(&mut current));
        } else if whitespace_run == 1 {
            current.push(' ');
        }
        whitespace_run = 0;
        current.push(c);
    }
    if !current.is_empty() {
        fields.push(current);
    }
    fields
}

/// Convert a host UTC timestamp to the process-local timezone for display.
fn to_local(host_timestamp: &str) -> Option<String> {
    let naive = NaiveDateTime::parse_from_str(host_timestamp.trim(), HOST_DATE_FORMAT).ok()?;
    let local = Utc.from_utc_datetime(&naive).with_timezone(&Local);
    Some(local.format(LOCAL_DATE_FORMAT).to_string())
}

/// Reformat a duration in seconds as `MM:SS.sss`.
fn format_duration(total_seconds: f64) -> String {
    if total_seconds < 0.0 {
        return "00:00.000".to_string();
    }
    let minutes = (total_seconds / 60.0) as u64;
    let seconds = total_seconds % 60.0;
    format!("{minutes:02}:{seconds:06.3}")
}

fn render_csv(records: &[AccessRecord]) -> String {
    let mut csv = String::from(CSV_HEADER);
    csv.push('\n');
    for r in records {
        csv.push_str(&format!(
            "{},{},{},{},{},{},{},{}\n",
            r.satellite, r.facility, r.sequence, r.utc_start, r.utc_stop, r.local_start,
            r.local_stop, r.duration
        ));
    }
    csv
}

fn render_text(records: &[AccessRecord], facilities: &[String]) -> String {
    if records.is_empty() {
        return String::new();
    }

    let mut report = String::new();
    report.push_str(&Local::now().format("%d %b %Y %H:%M:%S").to_string());
    report.push_str("\n\n");
    report.push_str("Coverage Intervals\n\n");

    for facility in facilities {
        let rows: Vec<&AccessRecord> = records
            .iter()
            .filter(|record| record.facility == *facility)
            .collect();
        if rows.is_empty() {
            continue;
        }

        report.push_str(&format!("Coverage for {facility}\n"));
        report.push_str(&"-".repeat(149));
        report.push('\n');
        report.push_str(&text_row(
            "Satellite",
            "Access #",
            "Start Time (UTCG)",
            "Stop Time (UTCG)",
            "Start Time (Local)",
            "Stop Time (Local)",
            "Duration (MM:SS.sss)",
        ));
        report.push_str(&text_row(
            &"-".repeat(25),
            &"-".repeat(8),
            &"-".repeat(25),
            &"-".repeat(25),
            &"-".repeat(25),
            &"-".repeat(25),
            &"-".repeat(22),
        ));
        for r in rows {
            report.push_str(&text_row(
                &r.satellite,
                &r.sequence,
                &r.utc_start,
                &r.utc_stop,
                &r.local_start,
                &r.local_stop,
                &r.duration,
            ));
        }
        report.push('\n');
    }

    report
}

fn text_row(
    satellite: &str,
    sequence: &str,
    utc_start: &str,
    utc_stop: &str,
    local_start: &str,
    local_stop: &str,
    duration: &str,
) -> String {
    format!(
        "{satellite:<25} {sequence:>8} {utc_start:<25} {utc_stop:<25} \
{local_start:<25} {local_stop:<25} {duration:>22}\n"
    )
}
