use mogilefs_client::{Client, ClientConfig, TrackerEndpoint};
use std::env;
use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    println!("==> MogileFS Store Example");

    let trackers = env::var("MOGILEFS_TRACKERS").unwrap_or_else(|_| "127.0.0.1:7001".to_string());
    let trackers = trackers
        .split(',')
        .map(str::parse::<TrackerEndpoint>)
        .collect::<Result<Vec<_>, _>>()?;

    let client = Client::new(ClientConfig::new(trackers, 5))?;
    println!("✓ Created client for {} tracker(s)", client.config().trackers.len());

    let key = "examples/hello.txt";
    let domain = env::var("MOGILEFS_DOMAIN").unwrap_or_else(|_| "testdomain".to_string());

    println!("✓ Key exists before store: {}", client.exists(key, &domain)?);

    client.put(key, "Hello from Rust!".as_bytes().to_vec(), &domain, "default")?;
    println!("✓ Stored object: {}", key);

    println!("✓ Key exists after store: {}", client.exists(key, &domain)?);

    Ok(())
}
