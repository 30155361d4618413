//! Example demonstrating different retry strategies.
//!
//! This example shows how to:
//! - Configure fixed delays
//! - Configure exponential backoff
//! - Configure custom delays and retry conditions
//! - Observe retries with `on_retry`
//!
//! Run with: `cargo run --example retry_strategies`

use std::time::Duration;
use typed_fetch::retry::RetryContext;
use typed_fetch::{typed_fetch, ErrorKind, FetchOptions, RetryDelay, RetryPolicy, TypedError};

#[tokio::main]
async fn main() -> Result<(), TypedError> {
    // Initialize tracing to see retry attempts
    tracing_subscriber::fmt()
        .with_env_filter("typed_fetch=info,retry_strategies=info")
        .init();

    let options = FetchOptions::new()
        .host("https://jsonplaceholder.typicode.com")
        .timeout(Duration::from_secs(5));

    println!("=== No Retries ===");
    match typed_fetch("nonexistent", &options).await {
        Ok(_) => println!("Unexpected success"),
        Err(e) => println!("Failed immediately: {e} (attempt {:?})", e.retry_attempt),
    }
    println!();

    println!("=== Fixed Delay ===");
    let start = std::time::Instant::now();
    let fixed = options.clone().retry(RetryPolicy::new(2).delay_ms(500));
    match typed_fetch("nonexistent", &fixed).await {
        Ok(_) => println!("Unexpected success"),
        Err(e) => println!(
            "Failed after retries: {e} (attempt {:?}, {:?})",
            e.retry_attempt,
            start.elapsed()
        ),
    }
    println!();

    println!("=== Exponential Backoff ===");
    println!("Delays: 100ms, 200ms, 400ms (with jitter)");
    let exponential = options.clone().retry(
        RetryPolicy::new(3)
            .delay(RetryDelay::ExponentialBackoff {
                initial_delay: Duration::from_millis(100),
                max_delay: Duration::from_secs(30),
                jitter: true,
            })
            .retry_on([ErrorKind::RequestError, ErrorKind::Timeout])
            .on_retry(|ctx| {
                println!("  retry #{} after {:?}", ctx.retry_attempt, ctx.error_duration());
                Ok(())
            }),
    );
    if let Err(e) = typed_fetch("nonexistent", &exponential).await {
        println!("Failed after retries: {e}");
    }
    println!();

    println!("=== Custom Delay and Condition ===");
    let custom = options.clone().retry(
        RetryPolicy::new(5)
            .delay(RetryDelay::custom(|attempt| {
                Duration::from_millis(50 * u64::from(attempt))
            }))
            .condition(|ctx: &RetryContext<'_>| ctx.error.status >= 500),
    );
    match typed_fetch("posts/1", &custom).await {
        Ok(value) => println!("Success: {}", value["title"]),
        Err(e) => println!("Failed: {e}"),
    }

    Ok(())
}
