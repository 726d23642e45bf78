//! Remsync Core - Domain types and port definitions
//!
//! This crate contains the hexagonal architecture core of remsync:
//! - **Domain types** - `SyncDirection`, `SessionConfig`, `Task`, `RelativePath`, `RemotePath`
//! - **Port definitions** - Traits for adapters: `IRemoteStorage`, `ILocalFileSystem`, `IChangeWatcher`
//! - **Configuration** - YAML configuration with validation and a builder
//!
//! # Architecture
//!
//! The domain module holds plain data types and path arithmetic with no I/O.
//! Ports define the trait interfaces that the sync engine depends on and that
//! adapter crates (local filesystem, SFTP) implement.

pub mod config;
pub mod domain;
pub mod ports;
