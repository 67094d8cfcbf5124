use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
use serde::de::DeserializeOwned;

use super::{
    ContentStore, Cursor, PostCounter, PostQuery, ReactionWrite, StoreError, UserCounter,
};
use crate::db::models::{
    Bookmark, Draft, NewUser, Notification, Post, ProfilePatch, Reaction, User,
};
use crate::db::{self, format_timestamp};
use crate::social::domain::{
    DraftId, NotificationId, NotificationKind, PostId, PostKind, ReactionType, UserId,
};
use crate::state::DbPool;

const USER_COLUMNS: &str = "id, handle, name, display_name, avatar_url, banner_url, bio, \
     provider, provider_account_id, followers_count, following_count, created_at, updated_at";

const POST_COLUMNS: &str = "id, author_id, parent_id, repost_of, text, urls_json, \
     video_urls_json, images_json, hashtags_json, mentions_json, likes_count, replies_count, \
     reposts_count, created_at, updated_at";

const NOTIFICATION_COLUMNS: &str =
    "id, recipient_id, actor_id, kind, post_id, is_read, created_at";

const DRAFT_COLUMNS: &str =
    "id, author_id, text, urls_json, hashtags_json, mentions_json, created_at, updated_at";

/// SQLite implementation
pub struct SqliteContentStore {
    pool: DbPool,
}

impl SqliteContentStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn conversion_error<E>(idx: usize, err: E) -> rusqlite::Error
where
    E: std::error::Error + Send + Sync + 'static,
{
    rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(err))
}

fn time_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    db::parse_timestamp(&raw).map_err(|e| conversion_error(idx, e))
}

fn json_column<T: DeserializeOwned>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T> {
    let raw: String = row.get(idx)?;
    serde_json::from_str(&raw).map_err(|e| conversion_error(idx, e))
}

fn user_from_row(row: &Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: UserId(row.get(0)?),
        handle: row.get(1)?,
        name: row.get(2)?,
        display_name: row.get(3)?,
        avatar_url: row.get(4)?,
        banner_url: row.get(5)?,
        bio: row.get(6)?,
        provider: row.get(7)?,
        provider_account_id: row.get(8)?,
        followers_count: row.get(9)?,
        following_count: row.get(10)?,
        created_at: time_column(row, 11)?,
        updated_at: time_column(row, 12)?,
    })
}

fn post_from_row(row: &Row<'_>) -> rusqlite::Result<Post> {
    Ok(Post {
        id: PostId(row.get(0)?),
        author_id: UserId(row.get(1)?),
        kind: PostKind::from_columns(row.get(2)?, row.get(3)?),
        text: row.get(4)?,
        urls: json_column(row, 5)?,
        video_urls: json_column(row, 6)?,
        images: json_column(row, 7)?,
        hashtags: json_column(row, 8)?,
        mentions: json_column(row, 9)?,
        likes_count: row.get(10)?,
        replies_count: row.get(11)?,
        reposts_count: row.get(12)?,
        created_at: time_column(row, 13)?,
        updated_at: time_column(row, 14)?,
    })
}

fn reaction_from_row(row: &Row<'_>) -> rusqlite::Result<Reaction> {
    let kind: Option<String> = row.get(2)?;
    Ok(Reaction {
        user_id: UserId(row.get(0)?),
        post_id: PostId(row.get(1)?),
        kind: ReactionType::from_stored(kind.as_deref()),
        created_at: time_column(row, 3)?,
    })
}

fn notification_from_row(row: &Row<'_>) -> rusqlite::Result<Notification> {
    let kind: String = row.get(3)?;
    let post_id: Option<String> = row.get(4)?;
    Ok(Notification {
        id: NotificationId(row.get(0)?),
        recipient_id: UserId(row.get(1)?),
        actor_id: UserId(row.get(2)?),
        kind: kind.parse::<NotificationKind>().map_err(|e| conversion_error(3, e))?,
        post_id: post_id.map(PostId),
        is_read: row.get(5)?,
        created_at: time_column(row, 6)?,
    })
}

fn draft_from_row(row: &Row<'_>) -> rusqlite::Result<Draft> {
    Ok(Draft {
        id: DraftId(row.get(0)?),
        author_id: UserId(row.get(1)?),
        text: row.get(2)?,
        urls: json_column(row, 3)?,
        hashtags: json_column(row, 4)?,
        mentions: json_column(row, 5)?,
        created_at: time_column(row, 6)?,
        updated_at: time_column(row, 7)?,
    })
}

fn placeholders(n: usize) -> String {
    vec!["?"; n].join(", ")
}

fn text_values<'a>(items: impl IntoIterator<Item = &'a str>) -> Vec<Value> {
    items
        .into_iter()
        .map(|s| Value::Text(s.to_string()))
        .collect()
}

/// Case-folded `%needle%` with LIKE wildcards in the needle taken
/// literally. Match it against `fold(column)`.
fn like_pattern(needle: &str) -> String {
    let escaped = db::fold(needle)
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{}%", escaped)
}

fn optional_text(raw: &str) -> Value {
    if raw.trim().is_empty() {
        Value::Null
    } else {
        Value::Text(raw.trim().to_string())
    }
}

fn unique_violation(err: rusqlite::Error, message: &str) -> StoreError {
    match &err {
        rusqlite::Error::SqliteFailure(e, _)
            if e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
                || e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY =>
        {
            StoreError::Conflict(message.to_string())
        }
        _ => err.into(),
    }
}

/// Keyset predicate for `ORDER BY created_at DESC, <tie> DESC`.
fn cursor_clause(cursor: &Cursor, tie: &str, values: &mut Vec<Value>) -> String {
    let at = format_timestamp(cursor.at);
    match &cursor.post {
        Some(post) => {
            values.push(Value::Text(at.clone()));
            values.push(Value::Text(at));
            values.push(Value::Text(post.as_str().to_string()));
            format!("(created_at < ? OR (created_at = ? AND {} < ?))", tie)
        }
        None => {
            values.push(Value::Text(at));
            "created_at < ?".to_string()
        }
    }
}

/// WHERE clause and bound values for a post query. `None` when an
/// empty "in set" predicate makes the result empty without asking SQLite.
fn post_filter(query: &PostQuery) -> Option<(String, Vec<Value>)> {
    let mut clauses: Vec<String> = Vec::new();
    let mut values: Vec<Value> = Vec::new();

    if let Some(authors) = &query.authors {
        if authors.is_empty() {
            return None;
        }
        clauses.push(format!("author_id IN ({})", placeholders(authors.len())));
        values.extend(text_values(authors.iter().map(UserId::as_str)));
    }
    if query.top_level_only {
        clauses.push("parent_id IS NULL".to_string());
    }
    if let Some(parent) = &query.parent {
        clauses.push("parent_id = ?".to_string());
        values.push(Value::Text(parent.as_str().to_string()));
    }
    if let Some(origins) = &query.reposts_of {
        if origins.is_empty() {
            return None;
        }
        clauses.push(format!("repost_of IN ({})", placeholders(origins.len())));
        values.extend(text_values(origins.iter().map(PostId::as_str)));
    }
    if let Some(needle) = &query.text_contains {
        clauses.push("fold(text) LIKE ? ESCAPE '\\'".to_string());
        values.push(Value::Text(like_pattern(needle)));
    }
    if let Some(before) = &query.before {
        let clause = cursor_clause(before, "id", &mut values);
        clauses.push(clause);
    }

    let where_clause = if clauses.is_empty() {
        String::new()
    } else {
        format!(" WHERE {}", clauses.join(" AND "))
    };
    Some((where_clause, values))
}

fn collect_rows<T>(
    conn: &Connection,
    sql: &str,
    values: Vec<Value>,
    map: fn(&Row<'_>) -> rusqlite::Result<T>,
) -> Result<Vec<T>, StoreError> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt
        .query_map(params_from_iter(values), map)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

#[async_trait]
impl ContentStore for SqliteContentStore {
    async fn insert_user(&self, user: &NewUser) -> Result<User, StoreError> {
        let conn = self.pool.get()?;
        let now = db::now();
        let created = User {
            id: UserId::generate(),
            handle: user.handle.clone(),
            name: user.name.clone(),
            display_name: user.display_name.clone(),
            avatar_url: user.avatar_url.clone(),
            banner_url: None,
            bio: String::new(),
            provider: user.provider.clone(),
            provider_account_id: user.provider_account_id.clone(),
            followers_count: 0,
            following_count: 0,
            created_at: now,
            updated_at: now,
        };

        conn.execute(
            "INSERT INTO users (id, handle, name, display_name, avatar_url, provider,
                                provider_account_id, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?8)",
            params![
                created.id.as_str(),
                created.handle,
                created.name,
                created.display_name,
                created.avatar_url,
                created.provider,
                created.provider_account_id,
                format_timestamp(now),
            ],
        )
        .map_err(|e| unique_violation(e, "Handle already taken"))?;

        Ok(created)
    }

    async fn find_user(&self, id: &UserId) -> Result<Option<User>, StoreError> {
        let conn = self.pool.get()?;
        let user = conn
            .query_row(
                &format!("SELECT {} FROM users WHERE id = ?1", USER_COLUMNS),
                params![id.as_str()],
                user_from_row,
            )
            .optional()?;
        Ok(user)
    }

    async fn find_user_by_handle(&self, handle: &str) -> Result<Option<User>, StoreError> {
        let conn = self.pool.get()?;
        let user = conn
            .query_row(
                &format!("SELECT {} FROM users WHERE handle = ?1", USER_COLUMNS),
                params![handle],
                user_from_row,
            )
            .optional()?;
        Ok(user)
    }

    async fn find_user_by_identity(
        &self,
        provider: &str,
        provider_account_id: &str,
    ) -> Result<Option<User>, StoreError> {
        let conn = self.pool.get()?;
        let user = conn
            .query_row(
                &format!(
                    "SELECT {} FROM users WHERE provider = ?1 AND provider_account_id = ?2",
                    USER_COLUMNS
                ),
                params![provider, provider_account_id],
                user_from_row,
            )
            .optional()?;
        Ok(user)
    }

    async fn find_users(&self, ids: &[UserId]) -> Result<Vec<User>, StoreError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let conn = self.pool.get()?;
        let sql = format!(
            "SELECT {} FROM users WHERE id IN ({})",
            USER_COLUMNS,
            placeholders(ids.len())
        );
        collect_rows(
            &conn,
            &sql,
            text_values(ids.iter().map(UserId::as_str)),
            user_from_row,
        )
    }

    async fn find_users_by_handles(&self, handles: &[String]) -> Result<Vec<User>, StoreError> {
        if handles.is_empty() {
            return Ok(Vec::new());
        }
        let conn = self.pool.get()?;
        let sql = format!(
            "SELECT {} FROM users WHERE handle IN ({})",
            USER_COLUMNS,
            placeholders(handles.len())
        );
        collect_rows(
            &conn,
            &sql,
            text_values(handles.iter().map(String::as_str)),
            user_from_row,
        )
    }

    async fn search_users(&self, needle: &str, limit: usize) -> Result<Vec<User>, StoreError> {
        let conn = self.pool.get()?;
        let sql = format!(
            "SELECT {} FROM users
             WHERE fold(handle) LIKE ?1 ESCAPE '\\'
                OR fold(name) LIKE ?1 ESCAPE '\\'
                OR fold(display_name) LIKE ?1 ESCAPE '\\'
             ORDER BY created_at ASC, handle ASC
             LIMIT ?2",
            USER_COLUMNS
        );
        collect_rows(
            &conn,
            &sql,
            vec![Value::Text(like_pattern(needle)), Value::Integer(limit as i64)],
            user_from_row,
        )
    }

    async fn update_profile(&self, id: &UserId, patch: &ProfilePatch) -> Result<(), StoreError> {
        let conn = self.pool.get()?;

        let mut sets = vec!["updated_at = ?"];
        let mut values = vec![Value::Text(format_timestamp(db::now()))];

        if let Some(display_name) = &patch.display_name {
            sets.push("display_name = ?");
            values.push(optional_text(display_name));
        }
        if let Some(bio) = &patch.bio {
            sets.push("bio = ?");
            values.push(Value::Text(bio.clone()));
        }
        if let Some(avatar_url) = &patch.avatar_url {
            sets.push("avatar_url = ?");
            values.push(optional_text(avatar_url));
        }
        if let Some(banner_url) = &patch.banner_url {
            sets.push("banner_url = ?");
            values.push(optional_text(banner_url));
        }
        values.push(Value::Text(id.as_str().to_string()));

        conn.execute(
            &format!("UPDATE users SET {} WHERE id = ?", sets.join(", ")),
            params_from_iter(values),
        )?;
        Ok(())
    }

    async fn increment_user_counter(
        &self,
        id: &UserId,
        counter: UserCounter,
        delta: i64,
    ) -> Result<(), StoreError> {
        let conn = self.pool.get()?;
        let column = counter.column();
        conn.execute(
            &format!(
                "UPDATE users SET {col} = MAX({col} + ?1, 0) WHERE id = ?2",
                col = column
            ),
            params![delta, id.as_str()],
        )?;
        Ok(())
    }

    async fn insert_post(&self, post: &Post) -> Result<(), StoreError> {
        let conn = self.pool.get()?;
        conn.execute(
            "INSERT INTO posts (id, author_id, parent_id, repost_of, text, urls_json,
                                video_urls_json, images_json, hashtags_json, mentions_json,
                                likes_count, replies_count, reposts_count, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)",
            params![
                post.id.as_str(),
                post.author_id.as_str(),
                post.kind.parent_id().map(PostId::as_str),
                post.kind.origin_id().map(PostId::as_str),
                post.text,
                serde_json::to_string(&post.urls)?,
                serde_json::to_string(&post.video_urls)?,
                serde_json::to_string(&post.images)?,
                serde_json::to_string(&post.hashtags)?,
                serde_json::to_string(&post.mentions)?,
                post.likes_count,
                post.replies_count,
                post.reposts_count,
                format_timestamp(post.created_at),
                format_timestamp(post.updated_at),
            ],
        )
        .map_err(|e| unique_violation(e, "Already reposted"))?;
        Ok(())
    }

    async fn find_post(&self, id: &PostId) -> Result<Option<Post>, StoreError> {
        let conn = self.pool.get()?;
        let post = conn
            .query_row(
                &format!("SELECT {} FROM posts WHERE id = ?1", POST_COLUMNS),
                params![id.as_str()],
                post_from_row,
            )
            .optional()?;
        Ok(post)
    }

    async fn find_posts_by_ids(&self, ids: &[PostId]) -> Result<Vec<Post>, StoreError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let conn = self.pool.get()?;
        let sql = format!(
            "SELECT {} FROM posts WHERE id IN ({})",
            POST_COLUMNS,
            placeholders(ids.len())
        );
        collect_rows(
            &conn,
            &sql,
            text_values(ids.iter().map(PostId::as_str)),
            post_from_row,
        )
    }

    async fn find_posts(&self, query: &PostQuery) -> Result<Vec<Post>, StoreError> {
        let Some((where_clause, mut values)) = post_filter(query) else {
            return Ok(Vec::new());
        };
        let conn = self.pool.get()?;

        let mut sql = format!(
            "SELECT {} FROM posts{} ORDER BY created_at DESC, id DESC",
            POST_COLUMNS, where_clause
        );
        if let Some(limit) = query.limit {
            sql.push_str(" LIMIT ?");
            values.push(Value::Integer(limit as i64));
        }
        collect_rows(&conn, &sql, values, post_from_row)
    }

    async fn count_posts(&self, query: &PostQuery) -> Result<u64, StoreError> {
        let Some((where_clause, values)) = post_filter(query) else {
            return Ok(0);
        };
        let conn = self.pool.get()?;
        let count: i64 = conn.query_row(
            &format!("SELECT COUNT(*) FROM posts{}", where_clause),
            params_from_iter(values),
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    async fn delete_post(&self, id: &PostId) -> Result<bool, StoreError> {
        let conn = self.pool.get()?;
        let rows = conn.execute("DELETE FROM posts WHERE id = ?1", params![id.as_str()])?;
        Ok(rows > 0)
    }

    async fn increment_post_counter(
        &self,
        id: &PostId,
        counter: PostCounter,
        delta: i64,
    ) -> Result<(), StoreError> {
        let conn = self.pool.get()?;
        let column = counter.column();
        conn.execute(
            &format!(
                "UPDATE posts SET {col} = MAX({col} + ?1, 0) WHERE id = ?2",
                col = column
            ),
            params![delta, id.as_str()],
        )?;
        Ok(())
    }

    async fn write_reaction(
        &self,
        user: &UserId,
        post: &PostId,
        kind: ReactionType,
    ) -> Result<ReactionWrite, StoreError> {
        if self.insert_reaction_if_absent(user, post, kind).await? {
            return Ok(ReactionWrite::Inserted);
        }

        let conn = self.pool.get()?;
        // Untyped legacy rows compare as "like" and are only rewritten on a real change
        let rows = conn.execute(
            "UPDATE reactions SET reaction_type = ?1, updated_at = ?2
             WHERE user_id = ?3 AND post_id = ?4
               AND COALESCE(reaction_type, 'like') != ?1",
            params![
                kind.as_str(),
                format_timestamp(db::now()),
                user.as_str(),
                post.as_str()
            ],
        )?;

        Ok(if rows > 0 {
            ReactionWrite::Updated
        } else {
            ReactionWrite::Unchanged
        })
    }

    async fn insert_reaction_if_absent(
        &self,
        user: &UserId,
        post: &PostId,
        kind: ReactionType,
    ) -> Result<bool, StoreError> {
        let conn = self.pool.get()?;
        let now = format_timestamp(db::now());
        let rows = conn.execute(
            "INSERT INTO reactions (id, user_id, post_id, reaction_type, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?5)
             ON CONFLICT(user_id, post_id) DO NOTHING",
            params![
                uuid::Uuid::now_v7().to_string(),
                user.as_str(),
                post.as_str(),
                kind.as_str(),
                now
            ],
        )?;
        Ok(rows > 0)
    }

    async fn delete_reaction(&self, user: &UserId, post: &PostId) -> Result<bool, StoreError> {
        let conn = self.pool.get()?;
        let rows = conn.execute(
            "DELETE FROM reactions WHERE user_id = ?1 AND post_id = ?2",
            params![user.as_str(), post.as_str()],
        )?;
        Ok(rows > 0)
    }

    async fn find_reactions(
        &self,
        user: &UserId,
        posts: &[PostId],
    ) -> Result<Vec<Reaction>, StoreError> {
        if posts.is_empty() {
            return Ok(Vec::new());
        }
        let conn = self.pool.get()?;
        let sql = format!(
            "SELECT user_id, post_id, reaction_type, created_at FROM reactions
             WHERE user_id = ? AND post_id IN ({})",
            placeholders(posts.len())
        );
        let mut values = vec![Value::Text(user.as_str().to_string())];
        values.extend(text_values(posts.iter().map(PostId::as_str)));
        collect_rows(&conn, &sql, values, reaction_from_row)
    }

    async fn list_reactions(
        &self,
        user: &UserId,
        before: Option<&Cursor>,
        limit: usize,
    ) -> Result<Vec<Reaction>, StoreError> {
        let conn = self.pool.get()?;
        let mut values = vec![Value::Text(user.as_str().to_string())];
        let cursor = match before {
            Some(cursor) => format!(" AND {}", cursor_clause(cursor, "post_id", &mut values)),
            None => String::new(),
        };
        values.push(Value::Integer(limit as i64));

        let sql = format!(
            "SELECT user_id, post_id, reaction_type, created_at FROM reactions
             WHERE user_id = ?{}
             ORDER BY created_at DESC, post_id DESC
             LIMIT ?",
            cursor
        );
        collect_rows(&conn, &sql, values, reaction_from_row)
    }

    async fn insert_follow(
        &self,
        follower: &UserId,
        followee: &UserId,
    ) -> Result<bool, StoreError> {
        let conn = self.pool.get()?;
        let rows = conn.execute(
            "INSERT INTO follows (follower_id, followee_id, created_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(follower_id, followee_id) DO NOTHING",
            params![
                follower.as_str(),
                followee.as_str(),
                format_timestamp(db::now())
            ],
        )?;
        Ok(rows > 0)
    }

    async fn delete_follow(
        &self,
        follower: &UserId,
        followee: &UserId,
    ) -> Result<bool, StoreError> {
        let conn = self.pool.get()?;
        let rows = conn.execute(
            "DELETE FROM follows WHERE follower_id = ?1 AND followee_id = ?2",
            params![follower.as_str(), followee.as_str()],
        )?;
        Ok(rows > 0)
    }

    async fn follow_exists(
        &self,
        follower: &UserId,
        followee: &UserId,
    ) -> Result<bool, StoreError> {
        let conn = self.pool.get()?;
        let exists: bool = conn.query_row(
            "SELECT COUNT(*) > 0 FROM follows WHERE follower_id = ?1 AND followee_id = ?2",
            params![follower.as_str(), followee.as_str()],
            |row| row.get(0),
        )?;
        Ok(exists)
    }

    async fn followee_ids(&self, follower: &UserId) -> Result<Vec<UserId>, StoreError> {
        let conn = self.pool.get()?;
        collect_rows(
            &conn,
            "SELECT followee_id FROM follows WHERE follower_id = ? ORDER BY created_at",
            vec![Value::Text(follower.as_str().to_string())],
            |row| Ok(UserId(row.get(0)?)),
        )
    }

    async fn insert_bookmark(&self, user: &UserId, post: &PostId) -> Result<bool, StoreError> {
        let conn = self.pool.get()?;
        let rows = conn.execute(
            "INSERT INTO bookmarks (user_id, post_id, created_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(user_id, post_id) DO NOTHING",
            params![user.as_str(), post.as_str(), format_timestamp(db::now())],
        )?;
        Ok(rows > 0)
    }

    async fn delete_bookmark(&self, user: &UserId, post: &PostId) -> Result<bool, StoreError> {
        let conn = self.pool.get()?;
        let rows = conn.execute(
            "DELETE FROM bookmarks WHERE user_id = ?1 AND post_id = ?2",
            params![user.as_str(), post.as_str()],
        )?;
        Ok(rows > 0)
    }

    async fn bookmarked_among(
        &self,
        user: &UserId,
        posts: &[PostId],
    ) -> Result<Vec<PostId>, StoreError> {
        if posts.is_empty() {
            return Ok(Vec::new());
        }
        let conn = self.pool.get()?;
        let sql = format!(
            "SELECT post_id FROM bookmarks WHERE user_id = ? AND post_id IN ({})",
            placeholders(posts.len())
        );
        let mut values = vec![Value::Text(user.as_str().to_string())];
        values.extend(text_values(posts.iter().map(PostId::as_str)));
        collect_rows(&conn, &sql, values, |row| Ok(PostId(row.get(0)?)))
    }

    async fn list_bookmarks(
        &self,
        user: &UserId,
        before: Option<&Cursor>,
        limit: usize,
    ) -> Result<Vec<Bookmark>, StoreError> {
        let conn = self.pool.get()?;
        let mut values = vec![Value::Text(user.as_str().to_string())];
        let cursor = match before {
            Some(cursor) => format!(" AND {}", cursor_clause(cursor, "post_id", &mut values)),
            None => String::new(),
        };
        values.push(Value::Integer(limit as i64));

        let sql = format!(
            "SELECT user_id, post_id, created_at FROM bookmarks
             WHERE user_id = ?{}
             ORDER BY created_at DESC, post_id DESC
             LIMIT ?",
            cursor
        );
        collect_rows(&conn, &sql, values, |row| {
            Ok(Bookmark {
                user_id: UserId(row.get(0)?),
                post_id: PostId(row.get(1)?),
                created_at: time_column(row, 2)?,
            })
        })
    }

    async fn insert_notification(&self, notification: &Notification) -> Result<(), StoreError> {
        let conn = self.pool.get()?;
        conn.execute(
            "INSERT INTO notifications (id, recipient_id, actor_id, kind, post_id, is_read, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                notification.id.as_str(),
                notification.recipient_id.as_str(),
                notification.actor_id.as_str(),
                notification.kind.as_str(),
                notification.post_id.as_ref().map(PostId::as_str),
                notification.is_read,
                format_timestamp(notification.created_at),
            ],
        )?;
        Ok(())
    }

    async fn list_notifications(
        &self,
        recipient: &UserId,
        limit: usize,
    ) -> Result<Vec<Notification>, StoreError> {
        let conn = self.pool.get()?;
        let sql = format!(
            "SELECT {} FROM notifications WHERE recipient_id = ?
             ORDER BY created_at DESC, id DESC LIMIT ?",
            NOTIFICATION_COLUMNS
        );
        collect_rows(
            &conn,
            &sql,
            vec![
                Value::Text(recipient.as_str().to_string()),
                Value::Integer(limit as i64),
            ],
            notification_from_row,
        )
    }

    async fn count_unread_notifications(&self, recipient: &UserId) -> Result<u64, StoreError> {
        let conn = self.pool.get()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM notifications WHERE recipient_id = ?1 AND is_read = 0",
            params![recipient.as_str()],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    async fn mark_notification_read(
        &self,
        id: &NotificationId,
        recipient: &UserId,
    ) -> Result<bool, StoreError> {
        let conn = self.pool.get()?;
        let rows = conn.execute(
            "UPDATE notifications SET is_read = 1
             WHERE id = ?1 AND recipient_id = ?2 AND is_read = 0",
            params![id.as_str(), recipient.as_str()],
        )?;
        Ok(rows > 0)
    }

    async fn mark_all_notifications_read(&self, recipient: &UserId) -> Result<u64, StoreError> {
        let conn = self.pool.get()?;
        let rows = conn.execute(
            "UPDATE notifications SET is_read = 1 WHERE recipient_id = ?1 AND is_read = 0",
            params![recipient.as_str()],
        )?;
        Ok(rows as u64)
    }

    async fn insert_draft(&self, draft: &Draft) -> Result<(), StoreError> {
        let conn = self.pool.get()?;
        conn.execute(
            "INSERT INTO drafts (id, author_id, text, urls_json, hashtags_json, mentions_json,
                                 created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                draft.id.as_str(),
                draft.author_id.as_str(),
                draft.text,
                serde_json::to_string(&draft.urls)?,
                serde_json::to_string(&draft.hashtags)?,
                serde_json::to_string(&draft.mentions)?,
                format_timestamp(draft.created_at),
                format_timestamp(draft.updated_at),
            ],
        )?;
        Ok(())
    }

    async fn list_drafts(&self, author: &UserId) -> Result<Vec<Draft>, StoreError> {
        let conn = self.pool.get()?;
        let sql = format!(
            "SELECT {} FROM drafts WHERE author_id = ? ORDER BY updated_at DESC, id DESC",
            DRAFT_COLUMNS
        );
        collect_rows(
            &conn,
            &sql,
            vec![Value::Text(author.as_str().to_string())],
            draft_from_row,
        )
    }

    async fn delete_draft(&self, id: &DraftId, author: &UserId) -> Result<bool, StoreError> {
        let conn = self.pool.get()?;
        let rows = conn.execute(
            "DELETE FROM drafts WHERE id = ?1 AND author_id = ?2",
            params![id.as_str(), author.as_str()],
        )?;
        Ok(rows > 0)
    }
}
