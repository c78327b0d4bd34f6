mod cli;

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use cli::{Cli, Commands};
use hsds_pipeline::api;
use hsds_pipeline::config::PipelineConfig;
use hsds_pipeline::publisher::Publisher;
use hsds_pipeline::queue::QueueName;
use hsds_pipeline::reconciler::Reconciler;
use hsds_pipeline::runtime::PipelineRuntime;
use hsds_pipeline::validator::Validator;
use hsds_pipeline::workers;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt().with_env_filter(tracing_subscriber::EnvFilter::from_default_env()).init();

    let cli = Cli::parse();
    let config = PipelineConfig::load()?;
    let runtime = Arc::new(PipelineRuntime::from_config(config).await?);

    match cli.command {
        Commands::ServeApi(args) => {
            let sweeper_runtime = runtime.clone();
            tokio::spawn(async move {
                sweeper_runtime.broker.run_sweeper(Duration::from_secs(30)).await;
            });
            api::run(args.address, runtime).await?;
        }
        Commands::Worker(args) => {
            let visibility_timeout = Duration::from_secs(args.visibility_timeout_s);
            let queue: QueueName = args.queue.into();
            info!(queue = %queue, count = args.count, "starting worker loops");

            let mut handles = Vec::new();
            match queue {
                QueueName::ScrapeIntake => {
                    for _ in 0..args.count {
                        let rt = runtime.clone();
                        handles.push(tokio::spawn(async move {
                            workers::run_scrape_intake_worker(rt, visibility_timeout).await;
                        }));
                    }
                }
                QueueName::Llm => {
                    for _ in 0..args.count {
                        let rt = runtime.clone();
                        handles.push(tokio::spawn(async move {
                            workers::run_llm_worker(rt, visibility_timeout).await;
                        }));
                    }
                }
                QueueName::Validator => {
                    let validator = Arc::new(
                        Validator::new(runtime.geocoder.clone(), runtime.config.validator.score_threshold)
                            .with_legacy_forgiving_state_check(runtime.config.validator.legacy_forgiving_state_check),
                    );
                    for _ in 0..args.count {
                        let rt = runtime.clone();
                        let validator = validator.clone();
                        handles.push(tokio::spawn(async move {
                            workers::run_validator_worker(rt, validator, visibility_timeout).await;
                        }));
                    }
                }
                QueueName::Reconciler => {
                    let reconciler = Arc::new(Reconciler::with_pool(
                        runtime.db_pool.clone(),
                        runtime.config.reconciler.clone(),
                    ));
                    for _ in 0..args.count {
                        let rt = runtime.clone();
                        let reconciler = reconciler.clone();
                        handles.push(tokio::spawn(async move {
                            workers::run_reconciler_worker(rt, reconciler, visibility_timeout).await;
                        }));
                    }
                }
            }

            let sweeper_runtime = runtime.clone();
            handles.push(tokio::spawn(async move {
                sweeper_runtime.broker.run_sweeper(Duration::from_secs(30)).await;
            }));

            for handle in handles {
                handle.await?;
            }
        }
        Commands::Publish(args) => {
            let state_keyspace = fjall::Config::new(&runtime.config.publisher.staging_dir.join("state")).open()?;
            let state = state_keyspace.open_partition("publisher", fjall::PartitionCreateOptions::default())?;
            let publisher = Publisher::new(runtime.db_pool.clone(), runtime.config.publisher.clone(), state);

            if args.once {
                publisher.run_cycle().await?;
            } else {
                let mut ticker = tokio::time::interval(Duration::from_secs(runtime.config.publisher.interval_s));
                loop {
                    ticker.tick().await;
                    if let Err(err) = publisher.run_cycle().await {
                        tracing::warn!(%err, "publish cycle failed");
                    }
                }
            }
        }
        Commands::Stats => {
            let cs_stats = runtime.content_store.stats()?;
            println!(
                "content_store: total={} new={} pending={} completed={} failed={} bytes={}",
                cs_stats.total, cs_stats.new, cs_stats.pending, cs_stats.completed, cs_stats.failed, cs_stats.byte_size
            );
            for name in QueueName::ALL {
                println!(
                    "queue {}: depth={} dlq_depth={}",
                    name,
                    runtime.broker.depth(name)?,
                    runtime.broker.dlq_depth(name)?
                );
            }
        }
    }

    Ok(())
}
