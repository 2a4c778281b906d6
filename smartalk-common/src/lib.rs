//! # SmarTalk Common Library
//!
//! Shared code for the SmarTalk analytics crates including:
//! - Event data model (Event, EventValue, payload sanitization)
//! - Funnel step catalogue
//! - Configuration loading
//! - Error types
//! - Time utilities

pub mod config;
pub mod error;
pub mod events;
pub mod time;

pub use config::AnalyticsConfig;
pub use error::{Error, Result};
pub use events::{Event, EventData, EventValue, FunnelStep, RawEventData, RawValue};
