//! History command - records uploaded by the account

use super::{connect, print_records};
use crate::print_banner;
use crate::style::*;
use anyhow::{bail, Result};
use step_challenge::ClientConfig;

pub async fn run(config: &ClientConfig) -> Result<()> {
    print_banner();
    print_header("My Records");

    let Some(account) = &config.account else {
        bail!("No account configured (use --account or STEP_ACCOUNT)");
    };
    print_key_value("Account", account);
    println!();

    let pipeline = connect(config)?;
    pipeline.load().await?;
    let history = pipeline.state().personal_history;

    if history.is_empty() {
        print_info("No records uploaded from this account");
    } else {
        print_records(&history);
    }
    println!();
    Ok(())
}
