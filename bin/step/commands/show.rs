//! Show command - one record in detail

use super::connect;
use crate::print_banner;
use crate::style::*;
use anyhow::{anyhow, Result};
use step_challenge::{ClientConfig, RecordId};

pub async fn run(config: &ClientConfig, id: String) -> Result<()> {
    print_banner();
    print_header("Record");

    let pipeline = connect(config)?;
    pipeline.load().await?;

    let id = RecordId::new(id);
    let state = pipeline.state();
    let record = state
        .find(&id)
        .ok_or_else(|| anyhow!("Record {} not found", id))?;
    let rank = state
        .leaderboard
        .iter()
        .find(|r| r.id == id)
        .map(|r| r.rank_display())
        .unwrap_or_else(|| record.rank_display());

    let content = [
        format!("Id:       {}", record.id),
        format!("Creator:  {}", record.short_creator()),
        format!("Date:     {}", record.created_date()),
        format!("Steps:    {}", record.steps_display()),
        format!("Rank:     {}", rank),
        format!(
            "Status:   {}",
            if record.is_verified {
                "Verified"
            } else {
                "Pending verification"
            }
        ),
    ];
    let lines: Vec<&str> = content.iter().map(String::as_str).collect();
    print_box(&record.name, &lines);
    println!();
    Ok(())
}
