//! Leaderboard command - ranked verified records

use super::{connect, print_records};
use crate::print_banner;
use crate::style::*;
use anyhow::Result;
use step_challenge::{ClientConfig, LeaderboardFilter};

pub async fn run(config: &ClientConfig, search: String, verified_only: bool) -> Result<()> {
    print_banner();
    print_header("Leaderboard");

    let pipeline = connect(config)?;
    pipeline.load().await?;

    let filter = LeaderboardFilter::new(search, verified_only);
    let rows = pipeline.state().visible_leaderboard(&filter);

    if rows.is_empty() {
        print_info("No verified records yet");
    } else {
        print_records(&rows);
    }
    println!();
    Ok(())
}
