//! # SmarTalk Analytics
//!
//! Client-side analytics for the SmarTalk learning app:
//! - [`buffer`]: batched, fire-and-forget event pipeline with timed and
//!   size-triggered flushes over [`transport`]
//! - [`funnel`]: conversion funnel step tracking and pure analysis functions
//! - [`replay`]: re-delivery of recorded events
//!
//! Services are constructed explicitly and passed around as handles; there
//! is no global analytics instance.

pub mod buffer;
pub mod funnel;
pub mod replay;
pub mod retry;
pub mod tracker;
pub mod transport;

pub use buffer::{BufferOptions, BufferStats, EventBuffer, FlushOutcome};
pub use funnel::{AnalysisError, FunnelCount, FunnelTracker};
pub use tracker::{EventReader, MemoryTracker, Tracker};
pub use transport::{BatchTransport, HttpTransport, TransportError};
