//! Repositories for database operations

pub mod post;
pub mod token_blacklist;
pub mod user;

pub use post::PostRepository;
pub use token_blacklist::{BlacklistStore, InMemoryBlacklistStore, PgBlacklistStore};
pub use user::UserRepository;
