//! API models for request and response payloads

use serde::{Deserialize, Serialize};

pub mod post;
pub mod token;
pub mod user;

pub use post::{NewPost, Post, PostListResponse, UpdatePost};
pub use token::{BlacklistedToken, NewBlacklistedToken};
pub use user::{NewUser, UpdateUser, User, UserResponse};

/// Query parameters for paginated listings
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PageQuery {
    /// Page number (1-based)
    pub page: Option<u32>,
    /// Number of items per page
    pub limit: Option<u32>,
}

impl PageQuery {
    pub const DEFAULT_LIMIT: u32 = 10;
    pub const MAX_LIMIT: u32 = 100;

    pub fn page(&self) -> u32 {
        self.page.unwrap_or(1).max(1)
    }

    pub fn limit(&self) -> u32 {
        self.limit
            .unwrap_or(Self::DEFAULT_LIMIT)
            .clamp(1, Self::MAX_LIMIT)
    }

    pub fn offset(&self) -> i64 {
        (self.page() - 1) as i64 * self.limit() as i64
    }
}

/// Generic paginated response
#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: u32,
    pub limit: u32,
    pub total: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_query_clamps() {
        let q = PageQuery {
            page: Some(0),
            limit: Some(1000),
        };
        assert_eq!(q.page(), 1);
        assert_eq!(q.limit(), 100);
        assert_eq!(q.offset(), 0);

        let q = PageQuery {
            page: Some(3),
            limit: Some(0),
        };
        assert_eq!(q.limit(), 1);
        assert_eq!(q.offset(), 2);

        assert_eq!(PageQuery::default().limit(), 10);
    }
}
