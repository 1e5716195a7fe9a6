//! # Prompt Harvest
//!
//! Harvests prompt cases from community-maintained markdown collections,
//! classifies them, deduplicates them by content fingerprint against a
//! record store, and writes only the new ones in bounded, rate-limited
//! batches.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────┐   ┌───────────┐   ┌────────────┐   ┌─────────┐   ┌──────────┐
//! │ Fetcher │──▶│ Extractor │──▶│ Classifier │──▶│  Dedup  │──▶│ Batches  │
//! │ raw md  │   │ strategies│   │  keywords  │   │ sha-256 │   │ ≤10/call │
//! └─────────┘   └───────────┘   └────────────┘   └─────────┘   └────┬─────┘
//!                                                                   ▼
//!                                                     Airtable │ SQLite │ memory
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! harvest sources                 # list configured sources
//! harvest run                     # dry-run, no credentials needed
//! harvest run --live              # write new records
//! harvest run --source ZeroLu/awesome-nanobanana-pro --output-json new.json
//! harvest schema                  # print the remote table schema
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types |
//! | [`fetch`] | Source document retrieval |
//! | [`markdown`] | Heading, fence, image, and link scanning |
//! | [`extract`] | Ordered extraction strategies |
//! | [`classify`] | Category, tags, reference detection |
//! | [`dedup`] | Fingerprints and new/duplicate partition |
//! | [`store`] | Record store trait and backends |
//! | [`persist`] | Batched, rate-limited writes |
//! | [`pipeline`] | Run orchestration |
//! | [`summary`] | Run summary |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |

pub mod classify;
pub mod config;
pub mod db;
pub mod dedup;
pub mod error;
pub mod export;
pub mod extract;
pub mod fetch;
pub mod markdown;
pub mod migrate;
pub mod models;
pub mod persist;
pub mod pipeline;
pub mod progress;
pub mod schema;
pub mod sources;
pub mod store;
pub mod summary;
