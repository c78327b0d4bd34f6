use std::net::SocketAddr;

use clap::{Parser, Subcommand};

use hsds_pipeline::queue::QueueName;

#[derive(Parser, Debug)]
#[command(name = "pipeline")]
#[command(about = "Food-assistance data ingestion pipeline", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the scrape-intake HTTP API
    ServeApi(ServeApiArgs),

    /// Run one or more stage workers against a queue
    Worker(WorkerArgs),

    /// Run the snapshot publisher
    Publish(PublishArgs),

    /// Print content-store and queue depth stats
    Stats,
}

#[derive(clap::Args, Debug)]
pub struct ServeApiArgs {
    /// Address to bind the API server to
    #[arg(long, default_value = "0.0.0.0:8080")]
    pub address: SocketAddr,
}

#[derive(clap::Args, Debug)]
pub struct WorkerArgs {
    /// Which stage queue to drain
    #[arg(long, value_enum)]
    pub queue: WorkerQueue,

    /// Number of worker loops to run concurrently
    #[arg(long, default_value_t = 1)]
    pub count: usize,

    /// Visibility timeout, in seconds, for jobs dequeued by this worker
    #[arg(long, default_value_t = 300)]
    pub visibility_timeout_s: u64,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
pub enum WorkerQueue {
    ScrapeIntake,
    Llm,
    Validator,
    Reconciler,
}

impl From<WorkerQueue> for QueueName {
    fn from(value: WorkerQueue) -> Self {
        match value {
            WorkerQueue::ScrapeIntake => QueueName::ScrapeIntake,
            WorkerQueue::Llm => QueueName::Llm,
            WorkerQueue::Validator => QueueName::Validator,
            WorkerQueue::Reconciler => QueueName::Reconciler,
        }
    }
}

#[derive(clap::Args, Debug)]
pub struct PublishArgs {
    /// Run a single publish cycle and exit, instead of looping on the
    /// configured interval
    #[arg(long, default_value_t = false)]
    pub once: bool,
}
