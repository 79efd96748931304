pub mod cache;
pub mod collections;
pub mod config;
pub mod engine;
pub mod error;
pub mod events;
pub mod panhandler;
pub mod query;
pub mod repos;
pub mod skillets;
pub mod store;
pub mod sync;
pub mod validation;

pub mod types;

pub use crate::cache::{CacheStore, Expiry, MemoryCache};
pub use crate::config::Settings;
pub use crate::engine::TemplateEngine;
pub use crate::error::PanhandlerError;
pub use crate::panhandler::{Panhandler, RequestContext};
pub use crate::query::SkilletQuery;
pub use crate::store::Store;
pub use crate::sync::Synchronizer;
