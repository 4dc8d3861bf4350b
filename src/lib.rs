//! # callgate
//!
//! 面向限流、按区域分区的 HTTP/JSON API 的客户端调用流水线。
//!
//! Client-side call pipeline for rate-limited, region-partitioned HTTP/JSON APIs.
//!
//! ## Overview
//!
//! Every outbound call goes through one pipeline that decides:
//!
//! - whether the call may proceed, using admission state mirrored from the server's own
//!   rate-limit headers rather than local counting
//! - whether it can be answered from a recorded fixture or the local call cache
//! - how the HTTP status classifies into a typed result
//!
//! Calls can also be deferred into named async groups and settled together.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use callgate::{CallPipeline, CallRequest, Settings};
//!
//! #[tokio::main]
//! async fn main() -> callgate::Result<()> {
//!     let settings = Settings::new("RGAPI-your-key", "euw")
//!         .with_cache_rate_limits(true)
//!         .with_env_overrides();
//!     let pipeline = CallPipeline::builder(settings).build()?;
//!
//!     let result = pipeline
//!         .call(CallRequest::get("/lol/status/v4/platform-data", "3:status"))
//!         .await?;
//!     println!("{}", result.json()?);
//!     Ok(())
//! }
//! ```
//!
//! ## Module Organization
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`pipeline`] | The call orchestrator, its builder and hooks |
//! | [`batch`] | Named async groups settled together |
//! | [`resilience`] | Server-synchronized rate-limit admission control |
//! | [`cache`] | Call cache and persisted control snapshots |
//! | [`classify`] | HTTP status to typed outcome |
//! | [`fixtures`] | Recorded responses for deterministic replay |
//! | [`transport`] | HTTP transport trait and the reqwest implementation |
//! | [`region`] | Region to platform routing |
//! | [`registry`] | Tag-keyed store and extension registries |
//! | [`settings`] | YAML settings with environment overrides |

pub mod batch;
pub mod cache;
pub mod classify;
pub mod fixtures;
pub mod pipeline;
pub mod region;
pub mod registry;
pub mod resilience;
pub mod settings;
pub mod transport;

mod utils;

// Re-export main types for convenience
pub use batch::{AsyncBatcher, SettledGroup};
pub use classify::{ErrorKind, Outcome};
pub use pipeline::{CallPipeline, CallPipelineBuilder, CallRequest, CallResult, ResponseSource};
pub use resilience::{RateLimitControl, RateLimitStatus};
pub use settings::Settings;

/// Result type alias for the library
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for the library
pub mod error;
pub use error::{Error, ErrorContext};
