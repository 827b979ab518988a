//! Verify command - reveal a record's step count on-chain

use super::{connect, follow_progress, print_notification};
use crate::print_banner;
use crate::style::*;
use anyhow::Result;
use step_challenge::{ClientConfig, RecordId};

pub async fn run(config: &ClientConfig, id: String) -> Result<()> {
    print_banner();
    print_header("Verify Steps");

    let pipeline = connect(config)?;
    let id = RecordId::new(id);

    let progress = follow_progress(&pipeline);
    let result = pipeline.verify(&id).await;
    progress.abort();

    print_notification(pipeline.state().notification.as_ref());

    let steps = result?.or_else(|| pipeline.state().find(&id).and_then(|r| r.steps()));
    println!();
    print_key_value("Record", id.as_str());
    if let Some(steps) = steps {
        print_key_value_colored("Steps", &steps.to_string(), colors::GREEN);
    }
    if let Some(ranked) = pipeline.state().leaderboard.iter().find(|r| r.id == id) {
        print_key_value("Rank", &ranked.rank_display());
    }
    println!();
    Ok(())
}
