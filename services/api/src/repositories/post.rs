//! Blog post repository

use common::error::DatabaseResult;
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::{NewPost, Post, UpdatePost};

const POST_COLUMNS: &str = "id, author_id, title, content, is_published, created_at, updated_at";

#[derive(Clone)]
pub struct PostRepository {
    pool: PgPool,
}

impl PostRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn find(&self, id: Uuid) -> DatabaseResult<Option<Post>> {
        let post = sqlx::query_as::<_, Post>(&format!(
            "SELECT {} FROM posts WHERE id = $1",
            POST_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(post)
    }

    /// Published posts, newest first, with the total count
    pub async fn list_published(
        &self,
        limit: i64,
        offset: i64,
    ) -> DatabaseResult<(Vec<Post>, i64)> {
        let posts = sqlx::query_as::<_, Post>(&format!(
            r#"
            SELECT {} FROM posts
            WHERE is_published
            ORDER BY created_at DESC
            LIMIT $1 OFFSET $2
            "#,
            POST_COLUMNS
        ))
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM posts WHERE is_published")
            .fetch_one(&self.pool)
            .await?;

        Ok((posts, total))
    }

    /// All posts of one author, drafts included
    pub async fn list_by_author(&self, author_id: Uuid) -> DatabaseResult<Vec<Post>> {
        let posts = sqlx::query_as::<_, Post>(&format!(
            "SELECT {} FROM posts WHERE author_id = $1 ORDER BY created_at DESC",
            POST_COLUMNS
        ))
        .bind(author_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(posts)
    }

    pub async fn create(&self, author_id: Uuid, new_post: &NewPost) -> DatabaseResult<Post> {
        let post = sqlx::query_as::<_, Post>(&format!(
            r#"
            INSERT INTO posts (author_id, title, content, is_published)
            VALUES ($1, $2, $3, $4)
            RETURNING {}
            "#,
            POST_COLUMNS
        ))
        .bind(author_id)
        .bind(new_post.title.trim())
        .bind(&new_post.content)
        .bind(new_post.is_published)
        .fetch_one(&self.pool)
        .await?;
        Ok(post)
    }

    pub async fn update(&self, id: Uuid, update: &UpdatePost) -> DatabaseResult<Option<Post>> {
        let post = sqlx::query_as::<_, Post>(&format!(
            r#"
            UPDATE posts
            SET title = COALESCE($2, title),
                content = COALESCE($3, content),
                is_published = COALESCE($4, is_published),
                updated_at = NOW()
            WHERE id = $1
            RETURNING {}
            "#,
            POST_COLUMNS
        ))
        .bind(id)
        .bind(update.title.as_deref().map(str::trim))
        .bind(update.content.as_deref())
        .bind(update.is_published)
        .fetch_optional(&self.pool)
        .await?;
        Ok(post)
    }

    pub async fn set_published(&self, id: Uuid, published: bool) -> DatabaseResult<Option<Post>> {
        self.update(
            id,
            &UpdatePost {
                is_published: Some(published),
                ..UpdatePost::default()
            },
        )
        .await
    }

    pub async fn delete(&self, id: Uuid) -> DatabaseResult<bool> {
        let result = sqlx::query("DELETE FROM posts WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
