use axum::http::{header, HeaderMap};
use chrono::Duration;
use rand::Rng;
use rusqlite::{params, OptionalExtension};

use crate::db;
use crate::error::AppResult;
use crate::social::domain::UserId;
use crate::state::DbPool;

/// Create a new session for a user. Returns the session token.
pub fn create_session(pool: &DbPool, user_id: &UserId, hours: u64) -> AppResult<String> {
    let conn = pool.get()?;

    let token = generate_token();
    let id = uuid::Uuid::now_v7().to_string();
    let now = db::now();
    let expires_at = now + Duration::hours(hours as i64);

    conn.execute(
        "INSERT INTO sessions (id, user_id, token, expires_at, created_at) VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            id,
            user_id.as_str(),
            token,
            db::format_timestamp(expires_at),
            db::format_timestamp(now)
        ],
    )?;

    Ok(token)
}

/// The user owning an unexpired session.
pub fn session_user(pool: &DbPool, token: &str) -> AppResult<Option<(UserId, String)>> {
    let conn = pool.get()?;
    let found = conn
        .query_row(
            "SELECT u.id, u.handle FROM sessions s \
             JOIN users u ON u.id = s.user_id \
             WHERE s.token = ?1 AND s.expires_at > ?2",
            params![token, db::format_timestamp(db::now())],
            |row| Ok((UserId::new(row.get::<_, String>(0)?), row.get(1)?)),
        )
        .optional()?;
    Ok(found)
}

/// Delete a session by token.
pub fn delete_session(pool: &DbPool, token: &str) -> AppResult<()> {
    let conn = pool.get()?;
    conn.execute("DELETE FROM sessions WHERE token = ?1", params![token])?;
    Ok(())
}

pub fn session_cookie(name: &str, token: &str, max_age_hours: u64) -> String {
    let max_age_secs = max_age_hours * 3600;
    format!(
        "{}={}; HttpOnly; SameSite=Lax; Path=/; Max-Age={}",
        name, token, max_age_secs
    )
}

pub fn clear_session_cookie(name: &str) -> String {
    format!("{}=; HttpOnly; SameSite=Lax; Path=/; Max-Age=0", name)
}

/// Session token from a `Bearer` authorization header, else the named cookie.
pub fn request_token<'a>(headers: &'a HeaderMap, cookie_name: &str) -> Option<&'a str> {
    bearer_token(headers).or_else(|| cookie_value(headers, cookie_name))
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

fn cookie_value<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|s| s.split(';'))
        .map(|s| s.trim())
        .find_map(|cookie| {
            let mut split = cookie.splitn(2, '=');
            let key = split.next()?.trim();
            let val = split.next()?.trim();
            if key == name && !val.is_empty() {
                Some(val)
            } else {
                None
            }
        })
}

/// Generate a cryptographically random 32-byte hex token.
fn generate_token() -> String {
    let mut rng = rand::thread_rng();
    let bytes: [u8; 32] = rng.gen();
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::NewUser;
    use crate::social::store::{ContentStore, SqliteContentStore};
    use axum::http::HeaderValue;
    use tempfile::TempDir;

    fn setup() -> (DbPool, TempDir) {
        let dir = TempDir::new().unwrap();
        let pool = db::create_pool(&dir.path().join("test.db")).unwrap();
        db::run_migrations(&pool).unwrap();
        (pool, dir)
    }

    async fn seed_user(pool: &DbPool) -> UserId {
        SqliteContentStore::new(pool.clone())
            .insert_user(&NewUser {
                handle: "alice".into(),
                name: "Alice".into(),
                display_name: None,
                avatar_url: None,
                provider: "github".into(),
                provider_account_id: "1".into(),
            })
            .await
            .unwrap()
            .id
    }

    #[test]
    fn generate_token_is_64_hex_chars() {
        let token = generate_token();
        assert_eq!(token.len(), 64);
        assert!(token.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn generate_token_is_unique() {
        let t1 = generate_token();
        let t2 = generate_token();
        assert_ne!(t1, t2);
    }

    #[tokio::test]
    async fn session_lifecycle() {
        let (pool, _dir) = setup();
        let user = seed_user(&pool).await;

        let token = create_session(&pool, &user, 1).unwrap();
        let (found, handle) = session_user(&pool, &token).unwrap().unwrap();
        assert_eq!(found, user);
        assert_eq!(handle, "alice");

        delete_session(&pool, &token).unwrap();
        assert!(session_user(&pool, &token).unwrap().is_none());
    }

    #[tokio::test]
    async fn expired_session_is_ignored() {
        let (pool, _dir) = setup();
        let user = seed_user(&pool).await;

        let token = create_session(&pool, &user, 0).unwrap();
        assert!(session_user(&pool, &token).unwrap().is_none());
    }

    #[test]
    fn bearer_header_wins_over_cookie() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("other=1; chirpnest_session=from-cookie"),
        );
        assert_eq!(
            request_token(&headers, "chirpnest_session"),
            Some("from-cookie")
        );

        headers.insert(
            header::AUTHORIZATION,
            HeaderValue::from_static("Bearer from-header"),
        );
        assert_eq!(
            request_token(&headers, "chirpnest_session"),
            Some("from-header")
        );
    }

    #[test]
    fn missing_token_is_none() {
        let headers = HeaderMap::new();
        assert!(request_token(&headers, "chirpnest_session").is_none());
    }
}
