//! Food-assistance data ingestion pipeline: normalizes scraped payloads
//! into HSDS-shaped records via an LLM, validates and geocode-enriches
//! them, reconciles them into a canonical Postgres store, and periodically
//! publishes a consistent snapshot.

pub mod api;
pub mod config;
pub mod content_store;
pub mod coords;
pub mod error;
pub mod geocoder;
pub mod humanize;
pub mod llm;
pub mod observability;
pub mod publisher;
pub mod queue;
pub mod reconciler;
pub mod retry;
pub mod runtime;
pub mod validator;
pub mod workers;
