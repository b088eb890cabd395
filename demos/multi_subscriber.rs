//! Multiple event subscribers example
//!
//! This example demonstrates how multiple parts of your application
//! can independently subscribe to job events.

use tube_dl::{Config, Event, JobOrchestrator, PlanRequest};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing (optional)
    // Uncomment if you add tracing-subscriber to your dependencies:
    // tracing_subscriber::fmt::init();

    let orchestrator = JobOrchestrator::new(Config::default()).await?;

    // UI subscriber - only cares about progress updates
    let mut ui_events = orchestrator.subscribe();
    tokio::spawn(async move {
        println!("[UI] Starting UI event subscriber");
        while let Ok(event) = ui_events.recv().await {
            match event {
                Event::Progress(snapshot) => {
                    if let Some(fraction) = snapshot.fraction {
                        println!("[UI] progress: {:.1}%", fraction * 100.0);
                    } else {
                        println!("[UI] progress: working...");
                    }
                }
                Event::AwaitingSelection { entry_count } => {
                    println!("[UI] playlist has {} entries, pick some!", entry_count);
                }
                _ => {}
            }
        }
    });

    // Logging subscriber - logs everything
    let mut log_events = orchestrator.subscribe();
    tokio::spawn(async move {
        println!("[LOG] Starting logging subscriber");
        while let Ok(event) = log_events.recv().await {
            println!("[LOG] Event: {:?}", event);
        }
    });

    // Notification subscriber - only cares about terminal events
    let mut notification_events = orchestrator.subscribe();
    tokio::spawn(async move {
        println!("[NOTIFY] Starting notification subscriber");
        while let Ok(event) = notification_events.recv().await {
            match event {
                Event::Completed { title, .. } => {
                    println!("[NOTIFY] done: {}", title);
                }
                Event::Cancelled => {
                    println!("[NOTIFY] cancelled");
                }
                Event::Failed { kind, .. } => {
                    println!("[NOTIFY] failed: {}", kind);
                }
                _ => {}
            }
        }
    });

    let handle = orchestrator
        .start("https://youtu.be/dQw4w9WgXcQ", PlanRequest::default())
        .await?;
    let result = handle.await?;
    println!("Result: {:?}", result);

    Ok(())
}
