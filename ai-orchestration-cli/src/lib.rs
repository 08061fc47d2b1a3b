//! # AI Orchestration CLI
//!
//! Thin command-line front end over `ai_orchestration_core::Orchestrator`.
//! This crate owns configuration loading and process wiring only; routing,
//! scoring, and provider adapters all live in the engine crate.
//!
//! ## Quick Start
//!
//! ```no_run
//! use ai_orchestration_cli::config::Config;
//!
//! let config = Config::load("config.toml")?;
//! config.validate()?;
//! # Ok::<(), anyhow::Error>(())
//! ```

pub mod config;
pub mod wiring;

pub use wiring::build_orchestrator;
