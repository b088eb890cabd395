//! Basic download example
//!
//! This example demonstrates the core functionality of tube-dl:
//! - Building a configuration
//! - Creating an orchestrator instance
//! - Subscribing to events
//! - Starting a download job
//! - Waiting for the terminal result

use tube_dl::config::{Config, DownloadConfig};
use tube_dl::{Event, JobOrchestrator, Mode, PlanRequest, Quality};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing for logging (optional)
    // Uncomment if you add tracing-subscriber to your dependencies:
    // tracing_subscriber::fmt::init();

    // Build configuration
    let config = Config {
        download: DownloadConfig {
            download_dir: "downloads".into(),
            ..Default::default()
        },
        ..Default::default()
    };

    // Create orchestrator instance (discovers yt-dlp on PATH)
    let orchestrator = JobOrchestrator::new(config).await?;

    // Subscribe to events
    let mut events = orchestrator.subscribe();
    tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            match event {
                Event::Started { url } => {
                    println!("✓ Started: {}", url);
                }
                Event::InfoResolved { title, .. } => {
                    println!("✓ Resolved: {}", title);
                }
                Event::Progress(snapshot) => {
                    match snapshot.fraction {
                        Some(fraction) => print!("⬇ {:.1}%", fraction * 100.0),
                        None => print!("⬇ ..."),
                    }
                    if let Some(speed) = snapshot.speed_bps {
                        print!(" @ {:.2} MB/s", speed as f64 / 1_048_576.0);
                    }
                    println!();
                }
                Event::PostProcessing => {
                    println!("🔄 Post-processing");
                }
                Event::Completed { path, title } => {
                    println!("✓ Complete: {} -> {:?}", title, path);
                }
                Event::Failed { kind, message } => {
                    println!("✗ Failed ({}): {}", kind, message);
                }
                _ => {}
            }
        }
    });

    // Start a 1080p-capped video download and wait for the result
    let handle = orchestrator
        .start(
            "https://youtu.be/dQw4w9WgXcQ",
            PlanRequest {
                mode: Mode::Video,
                quality: Quality::Height(1080),
                ..Default::default()
            },
        )
        .await?;

    let result = handle.await?;
    println!("Terminal result: {:?}", result);

    Ok(())
}
