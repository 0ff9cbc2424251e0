//! Shared test fakes for the restsync workspace.
//!
//! Dev-dependency only, never published.
//!
//! # Modules
//!
//! - [`repository`]: [`MemoryRepository`], an in-memory resource repository
//! - [`server`]: [`FakeServer`], an in-memory REST server that records calls
//! - [`fixtures`]: metadata trees and secret store configs for common scenarios

pub mod fixtures;
pub mod repository;
pub mod server;

pub use repository::MemoryRepository;
pub use server::{Call, CallKind, FakeServer};
