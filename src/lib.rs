//! Linkkeeper - an in-memory URL shortener core
//!
//! # Architecture
//! - `shortener`: short code allocation and the code/URL index
//! - `analytics`: per-code access history, rollups and security signals
//! - `governor`: periodic history trimming and capacity eviction
//! - `backup`: snapshot format, periodic backups and restore-on-boot
//! - `config`: TOML + environment configuration
//! - `runtime`: startup/shutdown and execution modes (serve, cli)
//! - `system`: logging
//! - `utils`: URL validation, code generation, client address resolution

pub mod analytics;
pub mod backup;
pub mod cli;
pub mod config;
pub mod errors;
pub mod governor;
pub mod runtime;
pub mod shortener;
pub mod system;
pub mod utils;
