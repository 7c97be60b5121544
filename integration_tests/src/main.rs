//! Integration tests for the sled firmware.
//!
//! Run after flashing the firmware to exercise the Sled Service over BLE.

mod ble_client;
mod tests;

use std::time::Duration;

use clap::Parser;
use colored::Colorize;

use ble_client::SledClient;
use tests::{print_results, run_all_tests};

#[derive(Parser)]
#[command(name = "integration-tests")]
#[command(about = "Integration tests for the sled firmware")]
struct Args {
    /// BLE device name (prefix match)
    #[arg(short, long, default_value = "Sled-")]
    name: String,

    /// BLE scan timeout in seconds
    #[arg(long, default_value = "10")]
    scan_timeout: u64,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    println!("{}", "Sled Integration Tests".bold());
    println!("Scanning for \"{}\"...", args.name);
    println!();

    let client =
        SledClient::connect_by_name(&args.name, Duration::from_secs(args.scan_timeout)).await?;
    println!("{}", "Connected!".green());

    println!("\nRunning tests...\n");

    let results = run_all_tests(&client).await;
    print_results(&results);

    client.disconnect().await?;

    // Exit with error code if any tests failed
    let failed = results.iter().filter(|r| !r.passed).count();
    if failed > 0 {
        std::process::exit(1);
    }

    Ok(())
}
