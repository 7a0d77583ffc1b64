//! # Takoyaki Vision
//!
//! A small inventory-tracking backend for a takoyaki stall. It accepts a
//! photo, forwards it to a vision-capable language model, receives a
//! structured inventory assessment, appends that assessment to a durable
//! report log, and serves a single shared application-state record.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌───────────────┐   ┌─────────────┐
//! │  HTTP    │──▶│    Vision      │──▶│ Report Log  │
//! │  (axum)  │   │  collaborator  │   │ (append)    │
//! └────┬─────┘   └───────────────┘   └─────────────┘
//!      │
//!      ▼
//! ┌──────────┐
//! │  State   │  one record, full-replace updates,
//! │  Store   │  atomic-rename JSON file
//! └──────────┘
//! ```
//!
//! The two stores own independent locks: state reads/writes and report
//! appends never contend with each other, and no lock is ever held
//! across the model call.
//!
//! ## Quick Start
//!
//! ```bash
//! tako init                     # create data files, seed default inventory
//! MOCK_VISION=1 tako serve      # start the API with the mock collaborator
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration with environment overrides |
//! | [`models`] | Core data types |
//! | [`storage`] | Backend trait: atomic JSON file, in-memory test double |
//! | [`store`] | Application-state singleton with validated replace |
//! | [`reports`] | Append-only report log with monotonic ids |
//! | [`defaults`] | Default seed inventory |
//! | [`vision`] | Vision collaborator (OpenAI call or deterministic mock) |
//! | [`server`] | HTTP API |

pub mod config;
pub mod defaults;
pub mod models;
pub mod reports;
pub mod server;
pub mod storage;
pub mod store;
pub mod vision;
