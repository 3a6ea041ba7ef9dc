pub mod account_repo;
pub mod event_repo;
pub mod user_repo;
pub mod workflow_repo;

pub use account_repo::AccountRepo;
pub use event_repo::{EventRepo, EventTypeCount, KeywordPerformance};
pub use user_repo::UserRepo;
pub use workflow_repo::WorkflowRepo;
