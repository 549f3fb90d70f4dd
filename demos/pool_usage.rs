//! Endpoint pool usage example
//!
//! Connects every endpoint from the environment (or a YAML config passed as
//! the first argument), then acquires a client a few times and prints the
//! pool state.
//!
//! Run with:
//! ```text
//! S3_POOL=127.0.0.1:9000,127.0.0.1:9001 S3_KEY=minioadmin S3_SECRET=minioadmin \
//!     cargo run --example pool_usage
//! ```

use anyhow::Result;
use hyper::Method;
use s3failover::{config, Core};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let path = std::env::args().nth(1);
    let config = config::load_config(path.as_deref(), None)?;

    // Fails unless every endpoint answers its health probe
    let core = Core::new(config).await?;

    for _ in 0..core.pool().len() * 2 {
        match core.acquire().await {
            Ok((idx, client)) => {
                let (status, _) = client.request(Method::GET, "/", Default::default()).await?;
                println!("endpoint {} ({}): {}", idx, client.endpoint(), status);
            }
            Err(e) => println!("acquire failed: {}", e),
        }
    }

    println!("\nPool state:");
    for stat in core.snapshot().await.endpoints {
        println!(
            "  [{}] {} online={} failing_for={:?}",
            stat.index, stat.address, stat.online, stat.failing_for
        );
    }

    Ok(())
}
