//! Check command - challenge availability

use super::{connect, print_notification};
use crate::print_banner;
use crate::style::*;
use anyhow::Result;
use step_challenge::ClientConfig;

pub async fn run(config: &ClientConfig) -> Result<()> {
    print_banner();
    print_header("Availability");

    print_key_value("Gateway", &config.gateway.url);
    print_key_value("Contract", &config.gateway.contract_address);
    println!();

    let pipeline = connect(config)?;
    let result = pipeline.check_availability().await;
    print_notification(pipeline.state().notification.as_ref());
    result?;
    println!();
    Ok(())
}
