//! Stats command - challenge statistics

use super::connect;
use crate::print_banner;
use crate::style::*;
use anyhow::Result;
use step_challenge::ClientConfig;

pub async fn run(config: &ClientConfig) -> Result<()> {
    print_banner();
    print_header("Challenge Statistics");

    let pipeline = connect(config)?;
    pipeline.load().await?;
    let stats = pipeline.state().stats();

    print_section("Records");
    println!();
    print_key_value("Total", &stats.total_records.to_string());
    print_key_value_colored(
        "Verified",
        &stats.verified_records.to_string(),
        colors::GREEN,
    );
    print_key_value(
        "Encrypted",
        &(stats.total_records - stats.verified_records).to_string(),
    );
    println!();

    print_section("Steps");
    println!();
    print_key_value("Total", &stats.total_steps.to_string());
    print_key_value("Average", &stats.avg_steps.to_string());
    match &stats.top_performer {
        Some(top) => print_key_value_colored(
            "Top Performer",
            &format!("{} ({})", top.name, top.steps_display()),
            colors::GREEN,
        ),
        None => print_key_value("Top Performer", &style_dim("none yet")),
    }
    println!();
    Ok(())
}
