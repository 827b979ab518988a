//! Demo command - one challenge round against in-memory backends

use super::{follow_progress, print_notification, print_records};
use crate::print_banner;
use crate::style::*;
use anyhow::Result;
use std::sync::Arc;
use step_challenge::mock::{InMemoryLedger, SimulatedEncryption};
use step_challenge::{
    ClientConfig, NotificationConfig, PipelineDeps, RecordPipeline, Session, SharedSession,
};

const CONTRACT: &str = "0x57e9c4a11e96e000000000000000000000000001";

const PARTICIPANTS: [(&str, &str, &str, bool); 4] = [
    ("Alice", "0xa11ce00000000000000000000000000000000001", "8250", true),
    ("Bob", "0xb0b0000000000000000000000000000000000002", "12040", false),
    ("Carol", "0xca201000000000000000000000000000000000003", "15310", true),
    ("Dave", "0xdafe000000000000000000000000000000000004", "0640", true),
];

fn participant(
    ledger: &InMemoryLedger,
    encryption: &Arc<SimulatedEncryption>,
    account: &str,
    notifications: &NotificationConfig,
) -> RecordPipeline {
    RecordPipeline::new(
        PipelineDeps {
            reader: Arc::new(ledger.clone()),
            signers: Arc::new(ledger.clone()),
            encryption: encryption.clone(),
            session: Arc::new(SharedSession::new(Session::connected(account))),
        },
        notifications.clone(),
    )
}

pub async fn run(config: &ClientConfig) -> Result<()> {
    print_banner();
    print_header("Demo Round");

    let ledger = InMemoryLedger::new(CONTRACT);
    let encryption = Arc::new(SimulatedEncryption::new());
    let total = PARTICIPANTS.len() as u32 * 2;
    let mut step = 0;

    print_section("Uploads");
    println!();
    let mut uploaded = Vec::new();
    for (name, account, steps, reveal) in PARTICIPANTS {
        step += 1;
        print_step(step, total, &format!("{} uploads {} steps", name, steps));
        let pipeline = participant(&ledger, &encryption, account, &config.notifications);
        pipeline.sync_session().await?;

        let progress = follow_progress(&pipeline);
        let receipt = pipeline.upload(name, steps).await;
        progress.abort();
        print_notification(pipeline.state().notification.as_ref());
        uploaded.push((pipeline, receipt?.id, reveal));
    }

    print_section("Verification");
    println!();
    for (pipeline, id, reveal) in &uploaded {
        step += 1;
        if !reveal {
            print_step(step, total, &format!("{} stays encrypted", id));
            continue;
        }
        print_step(step, total, &format!("Revealing {}", id));
        pipeline.verify(id).await?;
        print_notification(pipeline.state().notification.as_ref());
    }

    if let Some((pipeline, id, _)) = uploaded.first() {
        println!();
        print_info("Verifying the same record again takes the stored value");
        let value = pipeline.verify(id).await?;
        print_notification(pipeline.state().notification.as_ref());
        print_key_value("Stored value", &format!("{:?}", value));
        print_key_value(
            "Verification transactions",
            &ledger.submission_count().to_string(),
        );
    }

    let observer = participant(&ledger, &encryption, PARTICIPANTS[0].1, &config.notifications);
    observer.load().await?;
    let state = observer.state();
    let stats = state.stats();

    print_section("Leaderboard");
    println!();
    print_records(&state.leaderboard);

    print_section("Statistics");
    println!();
    print_key_value("Total records", &stats.total_records.to_string());
    print_key_value("Verified records", &stats.verified_records.to_string());
    print_key_value("Total steps", &stats.total_steps.to_string());
    print_key_value("Average steps", &stats.avg_steps.to_string());
    if let Some(top) = &stats.top_performer {
        print_key_value_colored("Top performer", &top.name, colors::GREEN);
    }
    println!();
    Ok(())
}
