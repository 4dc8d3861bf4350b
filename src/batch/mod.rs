//! 异步分组模块：按名称收集延迟调用并一起结算。
//!
//! # Async Groups
//!
//! Calls enqueued under a group name run their before hooks immediately, but their
//! network step is only driven when the group is committed. Each group gets its own
//! transport client.
//!
//! ## Key Components
//!
//! | Component | Description |
//! |-----------|-------------|
//! | [`AsyncBatcher`] | Enqueues calls per group and commits groups |
//! | [`SettledGroup`] | Per-call outcomes of one committed group, in enqueue order |
//!
//! ## Example
//!
//! ```rust,no_run
//! use callgate::batch::AsyncBatcher;
//! use callgate::pipeline::{CallPipeline, CallRequest, CallResult};
//! use callgate::settings::Settings;
//! use std::sync::Arc;
//!
//! # async fn run() -> callgate::Result<()> {
//! let pipeline = Arc::new(CallPipeline::builder(Settings::new("RGAPI-key", "euw")).build()?);
//! let batcher = AsyncBatcher::new(pipeline);
//!
//! for id in ["a", "b", "c"] {
//!     batcher.enqueue_with(
//!         "summoners",
//!         CallRequest::get(format!("/lol/summoner/v4/summoners/{}", id), "1:summoner"),
//!         Some(Box::new(|r: &CallResult| println!("{}", r.raw_body))),
//!         Some(Box::new(|e: &callgate::Error| eprintln!("{}", e))),
//!     )?;
//! }
//! let settled = batcher.commit("summoners").await?;
//! assert_eq!(settled.len(), 3);
//! # Ok(())
//! # }
//! ```
//!
//! Completion order inside a group follows the transport, not enqueue order; results are
//! reported by enqueue index.

mod group;
mod result;

pub use group::{AsyncBatcher, OnFulfilled, OnRejected};
pub use result::SettledGroup;
