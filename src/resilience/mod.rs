//! 限流控制模块：与服务端声明的限流状态同步的本地准入控制。
//!
//! # Rate Limit Control Module
//!
//! Local admission control kept in sync with the server's own accounting.
//!
//! ## Overview
//!
//! The API declares its limits and the caller's current usage in response headers:
//!
//! - application scope: one set of windows per `(credential, region)`
//! - method scope: one set of windows per `(credential, region, resource)`
//!
//! Both headers share the shape `"value:window_secs,value:window_secs"`. The control
//! never counts calls itself; every response overwrites the mirrored counts. A call is
//! admitted only when every applicable window has spare capacity or has rolled over.
//!
//! ## Key Components
//!
//! | Component | Description |
//! |-----------|-------------|
//! | [`RateLimitControl`] | Per-key bucket state, admission checks and snapshots |
//! | [`WindowBucket`] | One `(limit, window)` pair with its last observed count |
//! | [`RateLimitStatus`] | Diagnostic snapshot for one resource |
//!
//! ## Example
//!
//! ```rust
//! use callgate::resilience::RateLimitControl;
//!
//! let mut control = RateLimitControl::new();
//! control.register_limits("key", "eune", "1:summoner", Some("20:1,100:120"), Some("2000:60"));
//! control.register_call("key", "eune", "1:summoner", Some("1:1,1:120"), Some("1:60"));
//! assert!(control.can_call("key", "eune", "1:summoner", "/lol/summoner/v4/summoners/me"));
//! ```

mod rate_limit;
mod window;

pub use rate_limit::{RateLimitControl, RateLimitStatus};
pub use window::{parse_header, WindowBucket};
