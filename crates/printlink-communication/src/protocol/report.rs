//! Reply parser
//!
//! Turns replies into typed reports for observers: temperature readings from
//! `M105`, SD card listings from `M20`, error and informational lines. The
//! queue never looks at these; they exist purely for consumers of a session.

use printlink_core::Reply;
use serde::{Deserialize, Serialize};

/// One heater or sensor reading
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemperatureReading {
    /// Sensor name as reported (`T`, `T0`, `B`, `C`, ...)
    pub sensor: String,
    /// Current temperature
    pub current: f64,
    /// Target temperature, when reported
    pub target: Option<f64>,
}

/// One entry of an SD card listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileEntry {
    /// File name as reported
    pub name: String,
    /// Size in bytes, when reported
    pub size: Option<u64>,
}

/// Typed content of a reply
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Report {
    /// The acknowledgement line
    Ok,
    /// Temperature readings
    Temperature(Vec<TemperatureReading>),
    /// Complete file listing
    FileList(Vec<FileEntry>),
    /// Error reported by the firmware (`!!` or `Error:`)
    Error(String),
    /// Informational output (`//` or `echo:`)
    Info(String),
    /// Anything else
    Message(String),
}

const FILE_LIST_BEGIN: &str = "Begin file list";
const FILE_LIST_END: &str = "End file list";

/// Parse every line of a reply into reports, in order
pub fn parse_reply(reply: &Reply) -> Vec<Report> {
    let mut reports = Vec::new();
    let mut listing: Option<Vec<FileEntry>> = None;

    for line in reply.lines() {
        let line = line.trim();

        if listing.is_some() {
            if line == FILE_LIST_END {
                reports.push(Report::FileList(listing.take().unwrap_or_default()));
            } else if let (Some(entries), false) = (listing.as_mut(), line.is_empty()) {
                entries.push(parse_file_entry(line));
            }
            continue;
        }

        if line == FILE_LIST_BEGIN {
            listing = Some(Vec::new());
            continue;
        }

        reports.extend(parse_line(line));
    }

    // Listing cut short by the sentinel: report what arrived
    if let Some(entries) = listing {
        tracing::warn!("File listing not terminated, {} entries", entries.len());
        reports.push(Report::FileList(entries));
    }

    reports
}

/// Parse a single line outside of a file listing
pub fn parse_line(line: &str) -> Vec<Report> {
    let line = line.trim();
    if line.is_empty() {
        return Vec::new();
    }

    if let Some(rest) = line.strip_prefix("ok") {
        let mut reports = vec![Report::Ok];
        if let Some(readings) = parse_temperatures(rest) {
            reports.push(Report::Temperature(readings));
        }
        return reports;
    }

    if let Some(message) = line.strip_prefix("!!") {
        return vec![Report::Error(message.trim().to_string())];
    }
    if let Some(message) = line.strip_prefix("Error:") {
        return vec![Report::Error(message.trim().to_string())];
    }
    if let Some(message) = line.strip_prefix("//") {
        return vec![Report::Info(message.trim().to_string())];
    }
    if let Some(message) = line.strip_prefix("echo:") {
        return vec![Report::Info(message.trim().to_string())];
    }

    match parse_temperatures(line) {
        Some(readings) => vec![Report::Temperature(readings)],
        None => vec![Report::Message(line.to_string())],
    }
}

/// Parse `T:210.0 /210.0 B:60.0 /60.0` style readings
///
/// Returns `None` when the text holds no reading at all.
pub fn parse_temperatures(text: &str) -> Option<Vec<TemperatureReading>> {
    let mut readings: Vec<TemperatureReading> = Vec::new();

    for token in text.split_whitespace() {
        if let Some(target) = token.strip_prefix('/') {
            if let (Some(last), Ok(value)) = (readings.last_mut(), target.parse::<f64>()) {
                if last.target.is_none() {
                    last.target = Some(value);
                }
            }
            continue;
        }

        let Some((sensor, value)) = token.split_once(':') else {
            continue;
        };
        if !is_sensor_name(sensor) {
            continue;
        }
        // Marlin sometimes glues the target on: `T:210.0/210.0`
        let (current, target) = match value.split_once('/') {
            Some((current, target)) => (current, target.parse::<f64>().ok()),
            None => (value, None),
        };
        if let Ok(current) = current.parse::<f64>() {
            readings.push(TemperatureReading {
                sensor: sensor.to_string(),
                current,
                target,
            });
        }
    }

    if readings.is_empty() {
        None
    } else {
        Some(readings)
    }
}

fn is_sensor_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some('T') | Some('B') | Some('C') => chars.all(|c| c.is_ascii_digit()),
        _ => false,
    }
}

fn parse_file_entry(line: &str) -> FileEntry {
    match line.rsplit_once(' ') {
        Some((name, size)) => match size.parse::<u64>() {
            Ok(size) => FileEntry {
                name: name.trim().to_string(),
                size: Some(size),
            },
            Err(_) => FileEntry {
                name: line.to_string(),
                size: None,
            },
        },
        None => FileEntry {
            name: line.to_string(),
            size: None,
        },
    }
}
