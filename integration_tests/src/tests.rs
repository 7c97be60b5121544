//! Integration test cases.

use std::future::Future;
use std::time::Duration;

use colored::Colorize;

use crate::ble_client::SledClient;

/// Highest pattern code the firmware knows (RollingHills)
const MAX_PATTERN_CODE: u32 = 6;

/// Sled value notification interval on the device
const NOTIFY_INTERVAL: Duration = Duration::from_secs(1);

/// Test result.
pub struct TestResult {
    pub name: String,
    pub passed: bool,
    pub message: Option<String>,
}

impl TestResult {
    fn pass() -> Self {
        Self {
            name: String::new(),
            passed: true,
            message: None,
        }
    }

    fn fail(message: impl Into<String>) -> Self {
        Self {
            name: String::new(),
            passed: false,
            message: Some(message.into()),
        }
    }
}

/// Run a test function and print results as it happens.
async fn run_test<'a, F, Fut>(name: &str, client: &'a SledClient, test_fn: F) -> TestResult
where
    F: FnOnce(&'a SledClient) -> Fut,
    Fut: Future<Output = TestResult>,
{
    print!("  {} ... ", name);
    std::io::Write::flush(&mut std::io::stdout()).ok();

    let mut result = test_fn(client).await;
    result.name = name.to_string();

    if result.passed {
        println!("{}", "PASS".green().bold());
    } else {
        println!("{}", "FAIL".red().bold());
        if let Some(msg) = &result.message {
            println!("    {}", msg.red());
        }
    }

    result
}

/// Run all tests and return results.
pub async fn run_all_tests(client: &SledClient) -> Vec<TestResult> {
    vec![
        run_test("Sled value is readable", client, test_read_sled_value).await,
        run_test("Every pattern code is stored", client, test_pattern_codes).await,
        run_test("Short PWM write is rejected", client, test_short_pwm_write).await,
        run_test("Subscribed client gets sled values", client, test_notifications).await,
        run_test("Unsubscribe stops notifications", client, test_unsubscribe).await,
    ]
}

/// Print test results summary.
pub fn print_results(results: &[TestResult]) {
    println!("\n{}", "=".repeat(60));
    println!("{}", "Test Results".bold());
    println!("{}", "=".repeat(60));

    let mut passed = 0;
    let mut failed = 0;

    for result in results {
        if result.passed {
            println!("  {} {}", "[PASS]".green().bold(), result.name);
            passed += 1;
        } else {
            println!("  {} {}", "[FAIL]".red().bold(), result.name);
            if let Some(msg) = &result.message {
                println!("         {}", msg.red());
            }
            failed += 1;
        }
    }

    println!("{}", "-".repeat(60));
    println!(
        "  Total: {} passed, {} failed",
        passed.to_string().green(),
        if failed > 0 {
            failed.to_string().red()
        } else {
            failed.to_string().normal()
        }
    );
    println!("{}", "=".repeat(60));
}

// --- Individual Tests ---

async fn test_read_sled_value(client: &SledClient) -> TestResult {
    match client.read_sled_value().await {
        Ok(value) => {
            print!("({}) ", value);
            TestResult::pass()
        }
        Err(e) => TestResult::fail(format!("Error: {}", e)),
    }
}

async fn test_pattern_codes(client: &SledClient) -> TestResult {
    for code in 0..=MAX_PATTERN_CODE {
        if let Err(e) = client.write_pattern(code).await {
            return TestResult::fail(format!("Write of pattern {} failed: {}", code, e));
        }
        match client.read_pwm_value().await {
            Ok(value) if value == code => {}
            Ok(value) => {
                return TestResult::fail(format!("Wrote pattern {}, read back {}", code, value));
            }
            Err(e) => return TestResult::fail(format!("Read after pattern {}: {}", code, e)),
        }
    }

    // Leave the device on the default pattern
    match client.write_pattern(0).await {
        Ok(()) => TestResult::pass(),
        Err(e) => TestResult::fail(format!("Restoring pattern 0 failed: {}", e)),
    }
}

async fn test_short_pwm_write(client: &SledClient) -> TestResult {
    let before = match client.read_pwm_value().await {
        Ok(v) => v,
        Err(e) => return TestResult::fail(format!("Read failed: {}", e)),
    };

    if client.write_pwm_raw(&[0x02, 0x00]).await.is_ok() {
        return TestResult::fail("2 byte PWM write was accepted");
    }

    match client.read_pwm_value().await {
        Ok(after) if after == before => TestResult::pass(),
        Ok(after) => TestResult::fail(format!("PWM value changed from {} to {}", before, after)),
        Err(e) => TestResult::fail(format!("Read failed: {}", e)),
    }
}

async fn test_notifications(client: &SledClient) -> TestResult {
    client.clear_notifications().await;
    if let Err(e) = client.subscribe().await {
        return TestResult::fail(format!("Subscribe failed: {}", e));
    }

    let values = match client
        .wait_for_notifications(3, NOTIFY_INTERVAL * 5)
        .await
    {
        Ok(v) => v,
        Err(e) => return TestResult::fail(e.to_string()),
    };

    // Sled value is the device uptime, so it must keep growing
    if values.windows(2).any(|w| w[1] <= w[0]) {
        return TestResult::fail(format!("Sled values not increasing: {:?}", values));
    }
    TestResult::pass()
}

async fn test_unsubscribe(client: &SledClient) -> TestResult {
    if let Err(e) = client.unsubscribe().await {
        return TestResult::fail(format!("Unsubscribe failed: {}", e));
    }

    // Let any notification already in flight arrive
    tokio::time::sleep(NOTIFY_INTERVAL / 2).await;
    client.clear_notifications().await;
    tokio::time::sleep(NOTIFY_INTERVAL * 3).await;

    match client.notification_count().await {
        0 => TestResult::pass(),
        n => TestResult::fail(format!("{} notifications after unsubscribe", n)),
    }
}
