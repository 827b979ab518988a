//! Upload command - encrypt and submit a step count

use super::{connect, follow_progress, print_notification};
use crate::print_banner;
use crate::style::*;
use anyhow::{bail, Result};
use step_challenge::{ClientConfig, UploadForm};

pub async fn run(config: &ClientConfig, name: String, steps: String) -> Result<()> {
    print_banner();
    print_header("Upload Steps");

    let mut form = UploadForm::new();
    form.set_name(name);
    form.set_steps(&steps);
    if !form.can_submit() {
        bail!("Both a name and a step count are required");
    }

    let pipeline = connect(config)?;
    let progress = follow_progress(&pipeline);
    let result = pipeline.upload(form.name(), form.steps()).await;
    progress.abort();

    print_notification(pipeline.state().notification.as_ref());
    let receipt = result?;

    println!();
    print_key_value("Record", receipt.id.as_str());
    print_key_value("Steps", &receipt.steps.to_string());
    print_key_value("Transaction", &receipt.tx_hash);
    println!();
    print_info(&format!(
        "Reveal it on the leaderboard with: step verify {}",
        receipt.id
    ));
    Ok(())
}
