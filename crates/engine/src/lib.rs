//! Comment-monitoring and automated-DM engine.
//!
//! One polling task per active workflow fetches new comments from the
//! provider, runs them through the keyword matcher, and on a match drives the
//! dispatch pipeline: duplicate suppression, rate limiting, reachability
//! check, template composition, provider send, and audit-event logging.
//!
//! Persistence is consumed through the [`store::EngineStore`] trait and the
//! provider through [`replyflow_instagram::ProviderApi`], so the whole engine
//! runs against in-memory fakes in tests.

pub mod config;
pub mod dedupe;
pub mod dispatch;
pub mod error;
pub mod monitor;
pub mod rate_limit;
pub mod store;

pub use config::EngineConfig;
pub use dedupe::DuplicateGuard;
pub use dispatch::{DispatchOutcome, DispatchService, SkipReason};
pub use error::EngineError;
pub use monitor::MonitorScheduler;
pub use rate_limit::RateLimiter;
pub use store::{Credential, EngineStore, PgEngineStore};
