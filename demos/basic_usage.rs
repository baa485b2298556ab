use alloy_failover_strategy::{Address, FailoverConfig, FailoverManager, Provider};
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let config = match std::env::args().nth(1) {
        Some(path) => FailoverConfig::from_file(path)?,
        None => FailoverConfig::default(),
    }
    .with_health_check_interval(Duration::from_secs(60));

    println!("Managing {} RPC endpoints...", config.endpoints.len());

    let manager = FailoverManager::new(config).await?;

    let block = manager
        .execute("block_number", |provider| async move {
            provider.get_block_number().await
        })
        .await?;
    println!(
        "Current block number: {} (via {}, {}ms, {} attempts)",
        block.result,
        block.endpoint_label,
        block.elapsed_ms(),
        block.attempts
    );

    // BSC burn address
    let address: Address = "0x000000000000000000000000000000000000dEaD".parse()?;
    let balance = manager
        .execute("balance", |provider| async move {
            provider.get_balance(address).await
        })
        .await?;
    println!(
        "Balance of {}: {} BNB (via {})",
        address,
        balance.result.to_string().parse::<f64>().unwrap_or(0.0) / 1e18,
        balance.endpoint_label
    );

    let status = manager.status();
    println!(
        "\n{}/{} endpoints healthy ({:.0}%)",
        status.healthy_count, status.total_count, status.healthy_percentage
    );
    println!("{:-<60}", "");
    for endpoint in &status.endpoints {
        let mark = if endpoint.is_healthy { "✓" } else { "✗" };
        println!(
            "  {} {:<20} success {:>5.1}%  latency {:?}ms",
            mark,
            endpoint.label,
            endpoint.success_rate * 100.0,
            endpoint.last_latency_ms
        );
    }
    println!("{:-<60}", "");

    manager.shutdown();
    println!("\nShutdown complete!");

    Ok(())
}
