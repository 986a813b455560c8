use anyhow::Result;
use magbank::counters::{CounterSource, SysfsNetCounters};
use magbank::{Config, Monitor};
use std::time::Duration;
use tracing::{debug, error, info};

const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::load().map_err(|e| {
        eprintln!("Failed to load configuration: {}", e);
        e
    })?;
    magbank::logging::init_logging(&config.logging)?;

    info!("magbank {} starting", env!("APP_VERSION"));

    let source = magbank::transport::source_from_config(&config);
    let counters: Option<Box<dyn CounterSource>> = if config.counters.interfaces.is_empty() {
        None
    } else {
        Some(Box::new(SysfsNetCounters::new(
            config.counters.sysfs_root.clone(),
            config.counters.interfaces.clone(),
        )))
    };

    let (monitor, handle) = Monitor::new(&config, source, counters);
    let mut monitor_task = tokio::spawn(monitor.run());

    let mut refresh = tokio::time::interval(Duration::from_millis(config.refresh_interval_ms));
    loop {
        tokio::select! {
            _ = refresh.tick() => {
                let snapshot = handle.snapshot();
                info!("{}", snapshot.summary_line());
                if let Ok(record) = serde_json::to_string(&snapshot) {
                    debug!("snapshot {}", record);
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupt received, shutting down");
                handle.quit()?;
                break;
            }
            finished = &mut monitor_task => {
                return match finished {
                    Ok(Ok(())) => Ok(()),
                    Ok(Err(e)) => {
                        error!("Monitor failed with error: {}", e);
                        Err(anyhow::anyhow!("Monitor error: {}", e))
                    }
                    Err(e) => Err(anyhow::anyhow!("Monitor task panicked: {}", e)),
                };
            }
        }
    }

    magbank::monitor::join(monitor_task, SHUTDOWN_GRACE).await?;
    let last = handle.snapshot();
    info!(
        "Session {} finished: {:.1} mAh, {:.3} Wh",
        last.tester.session_id, last.tester.capacity_mah, last.tester.energy_wh
    );
    Ok(())
}
