//! Session listener used by `--connect`: logs what the printer reports

use async_trait::async_trait;
use printlink_communication::{parse_reply, Report};
use printlink_core::{Reply, SessionListener};
use std::time::Duration;

/// Logs parsed replies and session lifecycle
#[derive(Debug, Default, Clone, Copy)]
pub struct ReportLogger;

/// One-line summary of a report; `None` for bare acknowledgements
pub fn describe(report: &Report) -> Option<String> {
    match report {
        Report::Ok => None,
        Report::Temperature(readings) => Some(
            readings
                .iter()
                .map(|r| match r.target {
                    Some(target) => format!("{} {:.1}/{:.1}", r.sensor, r.current, target),
                    None => format!("{} {:.1}", r.sensor, r.current),
                })
                .collect::<Vec<_>>()
                .join("  "),
        ),
        Report::FileList(files) => Some(format!(
            "{} files: {}",
            files.len(),
            files
                .iter()
                .map(|f| f.name.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        )),
        Report::Error(text) | Report::Info(text) | Report::Message(text) => Some(text.clone()),
    }
}

#[async_trait]
impl SessionListener for ReportLogger {
    async fn on_connected(&self) {
        tracing::info!("Connected to gateway");
    }

    async fn on_reply(&self, reply: &Reply) {
        for report in parse_reply(reply) {
            let Some(text) = describe(&report) else {
                continue;
            };
            match report {
                Report::Error(_) => tracing::warn!("{}", text),
                Report::Temperature(_) | Report::FileList(_) => tracing::info!("{}", text),
                _ => tracing::debug!("{}", text),
            }
        }
    }

    async fn on_stalled(&self, command: &str, waited: Duration) {
        tracing::warn!("{:?} unanswered after {:?}", command, waited);
    }

    async fn on_disconnected(&self, reason: &str) {
        tracing::info!("Disconnected: {}", reason);
    }
}
