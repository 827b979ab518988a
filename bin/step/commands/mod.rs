//! CLI commands

pub mod check;
pub mod demo;
pub mod history;
pub mod leaderboard;
pub mod show;
pub mod stats;
pub mod upload;
pub mod verify;

use crate::style::*;
use anyhow::Result;
use std::sync::Arc;
use step_challenge::{
    ClientConfig, HttpLedgerGateway, Notification, NotificationKind, PipelineDeps,
    RecordPipeline, RelayerClient, Session, SharedSession, StepRecord,
};
use tokio::task::JoinHandle;

/// Pipeline wired to the configured gateway and relayer
pub fn connect(config: &ClientConfig) -> Result<RecordPipeline> {
    let gateway = Arc::new(HttpLedgerGateway::new(config.gateway.clone())?);
    let session = match &config.account {
        Some(address) => Session::connected(address.clone()),
        None => Session::disconnected(),
    };

    Ok(RecordPipeline::new(
        PipelineDeps {
            reader: gateway.clone(),
            signers: gateway,
            encryption: Arc::new(RelayerClient::new(&config.relayer)?),
            session: Arc::new(SharedSession::new(session)),
        },
        config.notifications.clone(),
    ))
}

/// Print pending notifications as the pipeline raises them
pub fn follow_progress(pipeline: &RecordPipeline) -> JoinHandle<()> {
    let mut rx = pipeline.subscribe();
    tokio::spawn(async move {
        let mut last_seen = None;
        let mut tick = 0u64;
        while rx.changed().await.is_ok() {
            let notification = rx.borrow_and_update().notification.clone();
            let Some(notification) = notification else {
                continue;
            };
            if last_seen == Some(notification.id) || notification.kind != NotificationKind::Pending
            {
                continue;
            }
            last_seen = Some(notification.id);
            println!(
                "  {}{}{} {}",
                colors::CYAN,
                spinner_frame(tick),
                colors::RESET,
                notification.message
            );
            tick += 1;
        }
    })
}

/// Print the outcome notification of an operation
pub fn print_notification(notification: Option<&Notification>) {
    match notification {
        Some(n) if n.kind == NotificationKind::Success => print_success(&n.message),
        Some(n) if n.kind == NotificationKind::Error => print_error(&n.message),
        Some(n) => print_info(&n.message),
        None => {}
    }
}

/// Print records as an aligned table
pub fn print_records(records: &[StepRecord]) {
    println!("  {}", table_header());
    println!("  {}", style_dim(&"─".repeat(90)));

    for record in records {
        let steps_color = if record.is_verified {
            colors::GREEN
        } else {
            colors::YELLOW
        };
        println!(
            "  {:<6} {:<18} {}{:<14}{} {:<14} {:<12} {}",
            record.rank_display(),
            truncate(&record.name, 18),
            steps_color,
            record.steps_display(),
            colors::RESET,
            record.short_creator(),
            record.created_date(),
            style_gray(record.id.as_str())
        );
    }
}

/// Column titles padded to the record row widths, then styled
fn table_header() -> String {
    style_bold(&format!(
        "{:<6} {:<18} {:<14} {:<14} {:<12} {}",
        "Rank", "Name", "Steps", "Creator", "Date", "Id"
    ))
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let head: String = s.chars().take(max - 3).collect();
        format!("{}...", head)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_header_columns_ignore_escape_codes() {
        let header = table_header();
        let plain = header
            .strip_prefix(colors::BOLD)
            .and_then(|h| h.strip_suffix(colors::RESET))
            .unwrap();
        assert_eq!(plain.find("Name"), Some(7));
        assert_eq!(plain.find("Steps"), Some(26));
        assert_eq!(plain.find("Id"), Some(69));
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("Alice", 18), "Alice");
        assert_eq!(truncate("Bartholomew the Great", 10), "Barthol...");
    }
}
