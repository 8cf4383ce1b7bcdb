//! PostgreSQL store
//!
//! Identities and playlists on PostgreSQL using SQLx. Lockout transitions are
//! single `UPDATE ... RETURNING` statements so concurrent logins never lose
//! a reset or an increment.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::types::Json;
use sqlx::FromRow;
use std::time::Duration;
use uuid::Uuid;

use moodtune_core::{
    Activity, Genre, LockoutPolicy, LockoutState, Mood, NewUser, PageRequest, Playlist, PlaylistPage, PlaylistPatch,
    PlaylistStore, Preferences, PreferencesPatch, StoreError, StoreResult, Track, User, UserStore,
};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS users (
    id               UUID PRIMARY KEY,
    username         TEXT NOT NULL,
    password_hash    TEXT NOT NULL,
    favorite_genres  TEXT[] NOT NULL DEFAULT '{}',
    default_mood     TEXT NOT NULL DEFAULT 'happy',
    default_activity TEXT NOT NULL DEFAULT 'relaxing',
    is_active        BOOLEAN NOT NULL DEFAULT TRUE,
    last_login       TIMESTAMPTZ,
    failed_attempts  INTEGER NOT NULL DEFAULT 0 CHECK (failed_attempts >= 0),
    locked_until     TIMESTAMPTZ,
    created_at       TIMESTAMPTZ NOT NULL,
    updated_at       TIMESTAMPTZ NOT NULL
);

CREATE UNIQUE INDEX IF NOT EXISTS users_username_lower_idx ON users (LOWER(username));

CREATE TABLE IF NOT EXISTS playlists (
    id           UUID PRIMARY KEY,
    owner_id     UUID NOT NULL REFERENCES users (id),
    name         TEXT NOT NULL,
    description  TEXT NOT NULL DEFAULT '',
    mood         TEXT NOT NULL,
    activity     TEXT NOT NULL,
    genres       TEXT[] NOT NULL,
    tracks       JSONB NOT NULL DEFAULT '[]',
    is_public    BOOLEAN NOT NULL DEFAULT FALSE,
    ai_generated BOOLEAN NOT NULL DEFAULT TRUE,
    created_at   TIMESTAMPTZ NOT NULL,
    updated_at   TIMESTAMPTZ NOT NULL
);

CREATE INDEX IF NOT EXISTS playlists_owner_created_idx ON playlists (owner_id, created_at DESC);
"#;

const USER_COLUMNS: &str = "id, username, password_hash, favorite_genres, default_mood, default_activity, \
     is_active, last_login, failed_attempts, locked_until, created_at, updated_at";

const PLAYLIST_COLUMNS: &str = "id, owner_id, name, description, mood, activity, genres, tracks, \
     is_public, ai_generated, created_at, updated_at";

/// PostgreSQL store implementing both [`UserStore`] and [`PlaylistStore`]
#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Create a new store connection
    pub async fn connect(database_url: &str, pool_size: u32, acquire_timeout: Duration) -> StoreResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(pool_size)
            .acquire_timeout(acquire_timeout)
            .connect(database_url)
            .await
            .map_err(|e| StoreError::Backend(format!("PostgreSQL connection failed: {e}")))?;

        Ok(Self { pool })
    }

    /// Create tables and indexes when missing
    pub async fn init_schema(&self) -> StoreResult<()> {
        sqlx::raw_sql(SCHEMA)
            .execute(&self.pool)
            .await
            .map_err(db_error("initialize schema"))?;
        tracing::info!("PostgreSQL schema initialized");
        Ok(())
    }
}

fn db_error(context: &'static str) -> impl FnOnce(sqlx::Error) -> StoreError {
    move |e| StoreError::Backend(format!("Failed to {context}: {e}"))
}

fn corrupt(column: &str, value: &str) -> StoreError {
    StoreError::Backend(format!("Unexpected value '{value}' in column {column}"))
}

fn to_i64(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

fn genre_names(genres: &[Genre]) -> Vec<String> {
    genres.iter().map(|g| g.as_str().to_string()).collect()
}

fn parse_genres(names: &[String]) -> StoreResult<Vec<Genre>> {
    names
        .iter()
        .map(|n| n.parse::<Genre>().map_err(|_| corrupt("genres", n)))
        .collect()
}

/// User row from database
#[derive(Debug, FromRow)]
struct UserRow {
    id: Uuid,
    username: String,
    password_hash: String,
    favorite_genres: Vec<String>,
    default_mood: String,
    default_activity: String,
    is_active: bool,
    last_login: Option<DateTime<Utc>>,
    failed_attempts: i32,
    locked_until: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<UserRow> for User {
    type Error = StoreError;

    fn try_from(row: UserRow) -> StoreResult<Self> {
        let preferences = Preferences {
            favorite_genres: parse_genres(&row.favorite_genres)?,
            default_mood: row
                .default_mood
                .parse::<Mood>()
                .map_err(|_| corrupt("default_mood", &row.default_mood))?,
            default_activity: row
                .default_activity
                .parse::<Activity>()
                .map_err(|_| corrupt("default_activity", &row.default_activity))?,
        };

        Ok(User {
            id: row.id,
            username: row.username,
            password_hash: row.password_hash,
            preferences,
            is_active: row.is_active,
            last_login: row.last_login,
            failed_attempts: u32::try_from(row.failed_attempts).unwrap_or(0),
            locked_until: row.locked_until,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// Playlist row from database
#[derive(Debug, FromRow)]
struct PlaylistRow {
    id: Uuid,
    owner_id: Uuid,
    name: String,
    description: String,
    mood: String,
    activity: String,
    genres: Vec<String>,
    tracks: Json<Vec<Track>>,
    is_public: bool,
    ai_generated: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<PlaylistRow> for Playlist {
    type Error = StoreError;

    fn try_from(row: PlaylistRow) -> StoreResult<Self> {
        Ok(Playlist {
            id: row.id,
            name: row.name,
            description: row.description,
            owner_id: row.owner_id,
            mood: row.mood.parse().map_err(|_| corrupt("mood", &row.mood))?,
            activity: row.activity.parse().map_err(|_| corrupt("activity", &row.activity))?,
            genres: parse_genres(&row.genres)?,
            tracks: row.tracks.0,
            is_public: row.is_public,
            ai_generated: row.ai_generated,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

fn into_user(row: Option<UserRow>) -> StoreResult<Option<User>> {
    row.map(User::try_from).transpose()
}

fn into_playlist(row: Option<PlaylistRow>) -> StoreResult<Option<Playlist>> {
    row.map(Playlist::try_from).transpose()
}

#[async_trait]
impl UserStore for PostgresStore {
    async fn create(&self, new_user: NewUser, now: DateTime<Utc>) -> StoreResult<User> {
        let user = User::new(new_user, now);

        sqlx::query(
            r#"
            INSERT INTO users (
                id, username, password_hash, favorite_genres, default_mood, default_activity,
                is_active, failed_attempts, created_at, updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, TRUE, 0, $7, $7)
            "#,
        )
        .bind(user.id)
        .bind(&user.username)
        .bind(&user.password_hash)
        .bind(genre_names(&user.preferences.favorite_genres))
        .bind(user.preferences.default_mood.as_str())
        .bind(user.preferences.default_activity.as_str())
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(db) if db.is_unique_violation() => StoreError::DuplicateUsername,
            other => StoreError::Backend(format!("Failed to create user: {other}")),
        })?;

        Ok(user)
    }

    async fn find_by_username(&self, username: &str) -> StoreResult<Option<User>> {
        let row: Option<UserRow> =
            sqlx::query_as(&format!("SELECT {USER_COLUMNS} FROM users WHERE LOWER(username) = LOWER($1)"))
                .bind(username)
                .fetch_optional(&self.pool)
                .await
                .map_err(db_error("find user by username"))?;

        into_user(row)
    }

    async fn find_by_id(&self, id: Uuid) -> StoreResult<Option<User>> {
        let row: Option<UserRow> = sqlx::query_as(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error("find user by id"))?;

        into_user(row)
    }

    async fn record_login_failure(
        &self,
        id: Uuid,
        now: DateTime<Utc>,
        policy: &LockoutPolicy,
    ) -> StoreResult<Option<LockoutState>> {
        // Old column values are visible on the right-hand side, so each CASE
        // sees the pre-update state.
        let row: Option<(i32, Option<DateTime<Utc>>)> = sqlx::query_as(
            r#"
            UPDATE users SET
                failed_attempts = CASE
                    WHEN locked_until > $2 THEN failed_attempts
                    WHEN locked_until IS NOT NULL THEN 1
                    ELSE failed_attempts + 1
                END,
                locked_until = CASE
                    WHEN locked_until > $2 THEN locked_until
                    WHEN (CASE WHEN locked_until IS NOT NULL THEN 1 ELSE failed_attempts + 1 END) >= $3 THEN $4
                    ELSE NULL
                END,
                updated_at = CASE WHEN locked_until > $2 THEN updated_at ELSE $2 END
            WHERE id = $1
            RETURNING failed_attempts, locked_until
            "#,
        )
        .bind(id)
        .bind(now)
        .bind(i32::try_from(policy.max_attempts).unwrap_or(i32::MAX))
        .bind(now + policy.lock_duration)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error("record login failure"))?;

        Ok(row.map(|(attempts, until)| LockoutState::from_fields(u32::try_from(attempts).unwrap_or(0), until)))
    }

    async fn record_login_success(&self, id: Uuid, now: DateTime<Utc>) -> StoreResult<Option<User>> {
        let row: Option<UserRow> = sqlx::query_as(&format!(
            r#"
            UPDATE users SET
                failed_attempts = 0,
                locked_until = NULL,
                last_login = $2,
                updated_at = $2
            WHERE id = $1
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(now)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error("record login success"))?;

        into_user(row)
    }

    async fn update_preferences(
        &self,
        id: Uuid,
        patch: &PreferencesPatch,
        now: DateTime<Utc>,
    ) -> StoreResult<Option<User>> {
        let row: Option<UserRow> = sqlx::query_as(&format!(
            r#"
            UPDATE users SET
                favorite_genres = COALESCE($2, favorite_genres),
                default_mood = COALESCE($3, default_mood),
                default_activity = COALESCE($4, default_activity),
                updated_at = $5
            WHERE id = $1
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(patch.favorite_genres.as_deref().map(genre_names))
        .bind(patch.default_mood.map(|m| m.as_str()))
        .bind(patch.default_activity.map(|a| a.as_str()))
        .bind(now)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error("update preferences"))?;

        into_user(row)
    }

    async fn deactivate(&self, id: Uuid, now: DateTime<Utc>) -> StoreResult<bool> {
        let result = sqlx::query("UPDATE users SET is_active = FALSE, updated_at = $2 WHERE id = $1")
            .bind(id)
            .bind(now)
            .execute(&self.pool)
            .await
            .map_err(db_error("deactivate user"))?;

        Ok(result.rows_affected() > 0)
    }

    async fn ping(&self) -> StoreResult<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(db_error("ping database"))?;
        Ok(())
    }
}

#[async_trait]
impl PlaylistStore for PostgresStore {
    async fn create(&self, playlist: Playlist) -> StoreResult<Playlist> {
        sqlx::query(
            r#"
            INSERT INTO playlists (
                id, owner_id, name, description, mood, activity, genres, tracks,
                is_public, ai_generated, created_at, updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            "#,
        )
        .bind(playlist.id)
        .bind(playlist.owner_id)
        .bind(&playlist.name)
        .bind(&playlist.description)
        .bind(playlist.mood.as_str())
        .bind(playlist.activity.as_str())
        .bind(genre_names(&playlist.genres))
        .bind(Json(&playlist.tracks))
        .bind(playlist.is_public)
        .bind(playlist.ai_generated)
        .bind(playlist.created_at)
        .bind(playlist.updated_at)
        .execute(&self.pool)
        .await
        .map_err(db_error("create playlist"))?;

        Ok(playlist)
    }

    async fn list_owned(&self, owner: Uuid, page: PageRequest) -> StoreResult<PlaylistPage> {
        let total = self.count_owned(owner).await?;

        let rows: Vec<PlaylistRow> = sqlx::query_as(&format!(
            r#"
            SELECT {PLAYLIST_COLUMNS}
            FROM playlists
            WHERE owner_id = $1
            ORDER BY created_at DESC, id DESC
            LIMIT $2 OFFSET $3
            "#
        ))
        .bind(owner)
        .bind(to_i64(page.limit))
        .bind(to_i64(page.offset))
        .fetch_all(&self.pool)
        .await
        .map_err(db_error("list playlists"))?;

        let items = rows.into_iter().map(Playlist::try_from).collect::<StoreResult<Vec<_>>>()?;
        Ok(PlaylistPage { items, total })
    }

    async fn count_owned(&self, owner: Uuid) -> StoreResult<u64> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM playlists WHERE owner_id = $1")
            .bind(owner)
            .fetch_one(&self.pool)
            .await
            .map_err(db_error("count playlists"))?;

        Ok(u64::try_from(count).unwrap_or(0))
    }

    async fn find_visible(&self, id: Uuid, requester: Uuid) -> StoreResult<Option<Playlist>> {
        let row: Option<PlaylistRow> = sqlx::query_as(&format!(
            "SELECT {PLAYLIST_COLUMNS} FROM playlists WHERE id = $1 AND (owner_id = $2 OR is_public)"
        ))
        .bind(id)
        .bind(requester)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error("find playlist"))?;

        into_playlist(row)
    }

    async fn update_owned(
        &self,
        id: Uuid,
        owner: Uuid,
        patch: &PlaylistPatch,
        now: DateTime<Utc>,
    ) -> StoreResult<Option<Playlist>> {
        let row: Option<PlaylistRow> = sqlx::query_as(&format!(
            r#"
            UPDATE playlists SET
                name = COALESCE($3, name),
                description = COALESCE($4, description),
                is_public = COALESCE($5, is_public),
                updated_at = $6
            WHERE id = $1 AND owner_id = $2
            RETURNING {PLAYLIST_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(owner)
        .bind(patch.name.as_deref())
        .bind(patch.description.as_deref())
        .bind(patch.is_public)
        .bind(now)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error("update playlist"))?;

        into_playlist(row)
    }

    async fn delete_owned(&self, id: Uuid, owner: Uuid) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM playlists WHERE id = $1 AND owner_id = $2")
            .bind(id)
            .bind(owner)
            .execute(&self.pool)
            .await
            .map_err(db_error("delete playlist"))?;

        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Store against `DATABASE_URL`, with a clean schema
    async fn live_store() -> PostgresStore {
        let url = std::env::var("DATABASE_URL").expect("DATABASE_URL must point at a disposable database");
        let store = PostgresStore::connect(&url, 2, Duration::from_secs(5)).await.unwrap();
        store.init_schema().await.unwrap();
        sqlx::query("TRUNCATE playlists, users").execute(&store.pool).await.unwrap();
        store
    }

    #[tokio::test]
    #[ignore] // Needs PostgreSQL: DATABASE_URL=... cargo test -p moodtune-store -- --ignored
    async fn test_lockout_transitions_against_postgres() {
        let store = live_store().await;
        let policy = LockoutPolicy::default();
        // Whole seconds so TIMESTAMPTZ round-trips exactly
        let now = DateTime::from_timestamp(Utc::now().timestamp(), 0).unwrap();

        let user = UserStore::create(
            &store,
            NewUser {
                username: "alice_01".to_string(),
                password_hash: "hash".to_string(),
            },
            now,
        )
        .await
        .unwrap();

        for n in 1..=4 {
            let state = store.record_login_failure(user.id, now, &policy).await.unwrap().unwrap();
            assert_eq!(state, LockoutState::Unlocked { failed_attempts: n });
        }

        let until = now + policy.lock_duration;
        let state = store.record_login_failure(user.id, now, &policy).await.unwrap().unwrap();
        assert_eq!(state.locked_until(now), Some(until));
        assert_eq!(state.failed_attempts(), 5);

        // Inside the window nothing moves
        let inside = now + chrono::Duration::minutes(30);
        let state = store.record_login_failure(user.id, inside, &policy).await.unwrap().unwrap();
        assert_eq!(state.failed_attempts(), 5);
        assert_eq!(state.locked_until(inside), Some(until));

        // After expiry the counter restarts
        let after = until + chrono::Duration::seconds(1);
        let state = store.record_login_failure(user.id, after, &policy).await.unwrap().unwrap();
        assert_eq!(state, LockoutState::Unlocked { failed_attempts: 1 });

        let user = store.record_login_success(user.id, after).await.unwrap().unwrap();
        assert_eq!(user.lockout_state(), LockoutState::Unlocked { failed_attempts: 0 });
        assert_eq!(user.last_login, Some(after));

        assert!(store.record_login_failure(Uuid::new_v4(), after, &policy).await.unwrap().is_none());
    }

    #[test]
    fn test_user_row_conversion() {
        let now = Utc::now();
        let row = UserRow {
            id: Uuid::new_v4(),
            username: "alice_01".to_string(),
            password_hash: "hash".to_string(),
            favorite_genres: vec!["r&b".to_string(), "hip-hop".to_string()],
            default_mood: "calm".to_string(),
            default_activity: "working-out".to_string(),
            is_active: true,
            last_login: None,
            failed_attempts: 3,
            locked_until: None,
            created_at: now,
            updated_at: now,
        };

        let user = User::try_from(row).unwrap();
        assert_eq!(user.preferences.favorite_genres, vec![Genre::RnB, Genre::HipHop]);
        assert_eq!(user.preferences.default_activity, Activity::WorkingOut);
        assert_eq!(user.lockout_state(), LockoutState::Unlocked { failed_attempts: 3 });
    }

    #[test]
    fn test_unknown_enum_value_is_backend_error() {
        let now = Utc::now();
        let row = PlaylistRow {
            id: Uuid::new_v4(),
            owner_id: Uuid::new_v4(),
            name: "Gym".to_string(),
            description: String::new(),
            mood: "angry".to_string(),
            activity: "party".to_string(),
            genres: vec![],
            tracks: Json(vec![]),
            is_public: false,
            ai_generated: true,
            created_at: now,
            updated_at: now,
        };

        let err = Playlist::try_from(row).unwrap_err();
        assert!(matches!(err, StoreError::Backend(msg) if msg.contains("mood")));
    }
}
