mod observability;

use std::time::{Duration, Instant};

use seadrift_domain::delivery::DeliveryService;
use seadrift_domain::matching::MatchingService;
use seadrift_infra::{config::AppConfig, logging::init_tracing, repositories::Repositories};
use tokio::time::interval;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::load()?;
    init_tracing(&config)?;
    observability::init_metrics()?;

    let repositories = Repositories::from_config(&config)?;
    let matching = MatchingService::new(
        repositories.outbox.clone(),
        repositories.profiles.clone(),
        repositories.fanout.clone(),
        repositories.delivery_queue.clone(),
        repositories.distance.clone(),
        config.delivery_delay_ms,
    );
    let delivery = DeliveryService::new(
        repositories.delivery_queue.clone(),
        repositories.sent_bottles.clone(),
        repositories.daily_counter.clone(),
    );

    info!(
        poll_interval_ms = config.worker_poll_interval_ms,
        backend = %config.data_backend,
        "worker starting"
    );

    let mut ticker = interval(Duration::from_millis(config.worker_poll_interval_ms));
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                run_sweeps(&matching, &delivery).await;
            }
            _ = tokio::signal::ctrl_c() => {
                info!("worker shutdown");
                break;
            }
        }
    }

    Ok(())
}

async fn run_sweeps(matching: &MatchingService, delivery: &DeliveryService) {
    let started = Instant::now();
    match matching.process_outbox().await {
        Ok(report) => {
            observability::register_sweep(
                "matching",
                "success",
                started.elapsed().as_secs_f64() * 1_000.0,
            );
            observability::register_matching_outcome(report.processed);
            if report.processed > 0 {
                info!(processed = report.processed, "matching sweep complete");
            }
        }
        Err(err) => {
            observability::register_sweep(
                "matching",
                "error",
                started.elapsed().as_secs_f64() * 1_000.0,
            );
            tracing::error!(error = %err, "matching sweep failed");
        }
    }

    let started = Instant::now();
    match delivery.run().await {
        Ok(report) => {
            observability::register_sweep(
                "delivery",
                "success",
                started.elapsed().as_secs_f64() * 1_000.0,
            );
            observability::register_delivery_outcome(report.delivered, report.errors);
            if report.checked > 0 {
                info!(
                    checked = report.checked,
                    delivered = report.delivered,
                    errors = report.errors,
                    "delivery sweep complete"
                );
            }
        }
        Err(err) => {
            observability::register_sweep(
                "delivery",
                "error",
                started.elapsed().as_secs_f64() * 1_000.0,
            );
            tracing::error!(error = %err, "delivery sweep failed");
        }
    }
}
