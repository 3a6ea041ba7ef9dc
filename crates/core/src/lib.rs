//! Pure domain logic for the comment-to-DM engine.
//!
//! Zero internal deps -- everything here is usable from the db, engine, and
//! API layers without pulling in sqlx or tokio.

pub mod error;
pub mod events;
pub mod matching;
pub mod template;
pub mod types;
pub mod workflow;

pub use error::CoreError;
