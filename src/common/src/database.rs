use chrono::{NaiveDate, Utc};
use sqlx::{
    PgPool, Postgres, QueryBuilder, Sqlite, SqlitePool, postgres::PgPoolOptions, query,
    query_as, sqlite::SqlitePoolOptions,
};
use uuid::Uuid;

use crate::config::{DatabaseConfig, MatchMode};
use crate::model::{
    Event, ExpiredEvent, ExpiredFest, Fest, NewEvent, NewFest, NewRegistration, NewUser,
    Registration, User,
};

const FEST_COLUMNS: &str =
    "fest_id, title, description, opening_date, closing_date, organizing_dept, fest_image_url";
const EVENT_COLUMNS: &str = "event_id, title, description, event_date, end_date, fest, event_image_url, banner_url, pdf_url";

/// Builds `<prefix> IN (<binds>)` for the given backend.
macro_rules! in_list {
    ($db:ty, $prefix:expr, $ids:expr) => {{
        let mut builder = QueryBuilder::<$db>::new($prefix);
        builder.push(" IN (");
        let mut separated = builder.separated(", ");
        for id in $ids {
            separated.push_bind(id.as_str());
        }
        separated.push_unseparated(")");
        builder
    }};
}

/// Database provides access to the SOCIO tables (PostgreSQL or SQLite).
#[derive(Clone)]
pub enum Database {
    Postgres(PgPool),
    Sqlite(SqlitePool),
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Database::Postgres(_) => f.write_str("Database::Postgres"),
            Database::Sqlite(_) => f.write_str("Database::Sqlite"),
        }
    }
}

impl Database {
    /// Connect to the database at `dsn`.
    pub async fn new(dsn: &str, max_connections: u32) -> Result<Self, sqlx::Error> {
        log::info!(
            "Connecting to database {}",
            crate::config::redact_dsn(dsn)
        );

        let database = if dsn.starts_with("sqlite:") {
            let in_memory = dsn.contains(":memory:") || dsn.contains("mode=memory");
            let dsn_with_create = if in_memory || dsn.contains("mode=") {
                dsn.to_string()
            } else if dsn.contains('?') {
                format!("{dsn}&mode=rwc")
            } else {
                format!("{dsn}?mode=rwc")
            };

            let mut options = SqlitePoolOptions::new().max_connections(max_connections.max(1));
            if in_memory {
                // Every connection to :memory: is a separate database; keep the one we have
                options = options
                    .max_connections(1)
                    .idle_timeout(None)
                    .max_lifetime(None);
            }
            let pool = options.connect(&dsn_with_create).await.map_err(|e| {
                log::error!("Failed to connect to SQLite database: {e}");
                e
            })?;
            Database::Sqlite(pool)
        } else {
            let pool = PgPoolOptions::new()
                .max_connections(max_connections.max(1))
                .connect(dsn)
                .await
                .map_err(|e| {
                    log::error!("Failed to connect to PostgreSQL database: {e}");
                    e
                })?;
            Database::Postgres(pool)
        };

        log::info!("Database connection established successfully");
        Ok(database)
    }

    /// Connect and create missing tables when `init_schema` is set.
    pub async fn from_config(config: &DatabaseConfig) -> Result<Self, sqlx::Error> {
        let database = Self::new(&config.dsn, config.max_connections).await?;
        if config.init_schema {
            database.init_schema().await.map_err(|e| {
                log::error!("Failed to initialize database schema: {e}");
                e
            })?;
            log::info!("Database schema initialized successfully");
        }
        Ok(database)
    }

    /// In-memory SQLite database with the schema in place.
    pub async fn new_in_memory() -> Result<Self, sqlx::Error> {
        Self::from_config(&DatabaseConfig::in_memory()).await
    }

    /// Create the tables if they do not exist.
    pub async fn init_schema(&self) -> Result<(), sqlx::Error> {
        match self {
            Database::Sqlite(pool) => {
                let create_fest = r#"
                CREATE TABLE IF NOT EXISTS fest (
                    fest_id TEXT PRIMARY KEY,
                    title TEXT NOT NULL,
                    description TEXT,
                    opening_date DATE NOT NULL,
                    closing_date DATE NOT NULL,
                    organizing_dept TEXT,
                    fest_image_url TEXT
                )"#;
                query(create_fest).execute(pool).await?;

                let create_events = r#"
                CREATE TABLE IF NOT EXISTS events (
                    event_id TEXT PRIMARY KEY,
                    title TEXT NOT NULL,
                    description TEXT,
                    event_date DATE NOT NULL,
                    end_date DATE NOT NULL,
                    fest TEXT REFERENCES fest(fest_id),
                    event_image_url TEXT,
                    banner_url TEXT,
                    pdf_url TEXT
                )"#;
                query(create_events).execute(pool).await?;

                let create_registrations = r#"
                CREATE TABLE IF NOT EXISTS event_registrations (
                    registration_id TEXT PRIMARY KEY,
                    event_id TEXT NOT NULL REFERENCES events(event_id),
                    user_email TEXT NOT NULL,
                    registered_at TIMESTAMP NOT NULL,
                    UNIQUE (event_id, user_email)
                )"#;
                query(create_registrations).execute(pool).await?;

                let create_users = r#"
                CREATE TABLE IF NOT EXISTS users (
                    email TEXT PRIMARY KEY,
                    name TEXT,
                    is_organiser BOOLEAN NOT NULL DEFAULT 0,
                    created_at TIMESTAMP NOT NULL
                )"#;
                query(create_users).execute(pool).await?;
            }
            Database::Postgres(pool) => {
                let create_fest = r#"
                CREATE TABLE IF NOT EXISTS fest (
                    fest_id TEXT PRIMARY KEY,
                    title TEXT NOT NULL,
                    description TEXT,
                    opening_date DATE NOT NULL,
                    closing_date DATE NOT NULL,
                    organizing_dept TEXT,
                    fest_image_url TEXT
                )"#;
                query(create_fest).execute(pool).await?;

                let create_events = r#"
                CREATE TABLE IF NOT EXISTS events (
                    event_id TEXT PRIMARY KEY,
                    title TEXT NOT NULL,
                    description TEXT,
                    event_date DATE NOT NULL,
                    end_date DATE NOT NULL,
                    fest TEXT REFERENCES fest(fest_id),
                    event_image_url TEXT,
                    banner_url TEXT,
                    pdf_url TEXT
                )"#;
                query(create_events).execute(pool).await?;

                let create_registrations = r#"
                CREATE TABLE IF NOT EXISTS event_registrations (
                    registration_id TEXT PRIMARY KEY,
                    event_id TEXT NOT NULL REFERENCES events(event_id),
                    user_email TEXT NOT NULL,
                    registered_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                    UNIQUE (event_id, user_email)
                )"#;
                query(create_registrations).execute(pool).await?;

                let create_users = r#"
                CREATE TABLE IF NOT EXISTS users (
                    email TEXT PRIMARY KEY,
                    name TEXT,
                    is_organiser BOOLEAN NOT NULL DEFAULT FALSE,
                    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
                )"#;
                query(create_users).execute(pool).await?;
            }
        }

        Ok(())
    }

    /// Cheap round trip used by the health endpoint.
    pub async fn ping(&self) -> Result<(), sqlx::Error> {
        match self {
            Database::Sqlite(pool) => {
                query("SELECT 1").execute(pool).await?;
            }
            Database::Postgres(pool) => {
                query("SELECT 1").execute(pool).await?;
            }
        }
        Ok(())
    }

    // ---- cleanup queries ----

    /// Fests whose closing date matches `reference_date`.
    pub async fn find_expired_fests(
        &self,
        reference_date: NaiveDate,
        mode: MatchMode,
    ) -> Result<Vec<ExpiredFest>, sqlx::Error> {
        let op = comparison(mode);
        match self {
            Database::Sqlite(pool) => {
                let sql = format!(
                    "SELECT fest_id, fest_image_url FROM fest WHERE closing_date {op} ? ORDER BY fest_id"
                );
                query_as(&sql).bind(reference_date).fetch_all(pool).await
            }
            Database::Postgres(pool) => {
                let sql = format!(
                    "SELECT fest_id, fest_image_url FROM fest WHERE closing_date {op} $1 ORDER BY fest_id"
                );
                query_as(&sql).bind(reference_date).fetch_all(pool).await
            }
        }
    }

    /// Every event whose parent is one of `fest_ids`, whatever its own end date.
    pub async fn find_fest_events(
        &self,
        fest_ids: &[String],
    ) -> Result<Vec<ExpiredEvent>, sqlx::Error> {
        if fest_ids.is_empty() {
            return Ok(Vec::new());
        }
        let prefix =
            "SELECT event_id, event_image_url, banner_url, pdf_url FROM events WHERE fest";
        match self {
            Database::Sqlite(pool) => {
                let mut builder = in_list!(Sqlite, prefix, fest_ids);
                builder.push(" ORDER BY event_id");
                builder.build_query_as().fetch_all(pool).await
            }
            Database::Postgres(pool) => {
                let mut builder = in_list!(Postgres, prefix, fest_ids);
                builder.push(" ORDER BY event_id");
                builder.build_query_as().fetch_all(pool).await
            }
        }
    }

    /// Events without a parent fest whose end date matches `reference_date`.
    pub async fn find_expired_standalone_events(
        &self,
        reference_date: NaiveDate,
        mode: MatchMode,
    ) -> Result<Vec<ExpiredEvent>, sqlx::Error> {
        let op = comparison(mode);
        match self {
            Database::Sqlite(pool) => {
                let sql = format!(
                    "SELECT event_id, event_image_url, banner_url, pdf_url FROM events \
                     WHERE fest IS NULL AND end_date {op} ? ORDER BY event_id"
                );
                query_as(&sql).bind(reference_date).fetch_all(pool).await
            }
            Database::Postgres(pool) => {
                let sql = format!(
                    "SELECT event_id, event_image_url, banner_url, pdf_url FROM events \
                     WHERE fest IS NULL AND end_date {op} $1 ORDER BY event_id"
                );
                query_as(&sql).bind(reference_date).fetch_all(pool).await
            }
        }
    }

    /// Delete the registrations of `event_ids`; returns the number of rows removed.
    pub async fn delete_registrations(&self, event_ids: &[String]) -> Result<u64, sqlx::Error> {
        self.delete_in("DELETE FROM event_registrations WHERE event_id", event_ids)
            .await
    }

    pub async fn delete_events(&self, event_ids: &[String]) -> Result<u64, sqlx::Error> {
        self.delete_in("DELETE FROM events WHERE event_id", event_ids).await
    }

    pub async fn delete_fests(&self, fest_ids: &[String]) -> Result<u64, sqlx::Error> {
        self.delete_in("DELETE FROM fest WHERE fest_id", fest_ids).await
    }

    async fn delete_in(&self, prefix: &str, ids: &[String]) -> Result<u64, sqlx::Error> {
        if ids.is_empty() {
            return Ok(0);
        }
        let result = match self {
            Database::Sqlite(pool) => {
                let mut builder = in_list!(Sqlite, prefix, ids);
                builder.build().execute(pool).await?.rows_affected()
            }
            Database::Postgres(pool) => {
                let mut builder = in_list!(Postgres, prefix, ids);
                builder.build().execute(pool).await?.rows_affected()
            }
        };
        Ok(result)
    }

    // ---- fests ----

    pub async fn list_fests(&self) -> Result<Vec<Fest>, sqlx::Error> {
        let sql = format!("SELECT {FEST_COLUMNS} FROM fest ORDER BY opening_date, fest_id");
        match self {
            Database::Sqlite(pool) => query_as(&sql).fetch_all(pool).await,
            Database::Postgres(pool) => query_as(&sql).fetch_all(pool).await,
        }
    }

    pub async fn get_fest(&self, fest_id: &str) -> Result<Option<Fest>, sqlx::Error> {
        match self {
            Database::Sqlite(pool) => {
                let sql = format!("SELECT {FEST_COLUMNS} FROM fest WHERE fest_id = ?");
                query_as(&sql).bind(fest_id).fetch_optional(pool).await
            }
            Database::Postgres(pool) => {
                let sql = format!("SELECT {FEST_COLUMNS} FROM fest WHERE fest_id = $1");
                query_as(&sql).bind(fest_id).fetch_optional(pool).await
            }
        }
    }

    pub async fn insert_fest(&self, fest: NewFest) -> Result<Fest, sqlx::Error> {
        let fest = Fest::from(fest);
        match self {
            Database::Sqlite(pool) => {
                query(
                    "INSERT INTO fest (fest_id, title, description, opening_date, closing_date, organizing_dept, fest_image_url) \
                     VALUES (?, ?, ?, ?, ?, ?, ?)",
                )
                .bind(&fest.fest_id)
                .bind(&fest.title)
                .bind(&fest.description)
                .bind(fest.opening_date)
                .bind(fest.closing_date)
                .bind(&fest.organizing_dept)
                .bind(&fest.fest_image_url)
                .execute(pool)
                .await?;
            }
            Database::Postgres(pool) => {
                query(
                    "INSERT INTO fest (fest_id, title, description, opening_date, closing_date, organizing_dept, fest_image_url) \
                     VALUES ($1, $2, $3, $4, $5, $6, $7)",
                )
                .bind(&fest.fest_id)
                .bind(&fest.title)
                .bind(&fest.description)
                .bind(fest.opening_date)
                .bind(fest.closing_date)
                .bind(&fest.organizing_dept)
                .bind(&fest.fest_image_url)
                .execute(pool)
                .await?;
            }
        }
        Ok(fest)
    }

    // ---- events ----

    /// All events, or only the children of `fest` when given.
    pub async fn list_events(&self, fest: Option<&str>) -> Result<Vec<Event>, sqlx::Error> {
        match (self, fest) {
            (Database::Sqlite(pool), None) => {
                let sql = format!("SELECT {EVENT_COLUMNS} FROM events ORDER BY event_date, event_id");
                query_as(&sql).fetch_all(pool).await
            }
            (Database::Sqlite(pool), Some(fest)) => {
                let sql = format!(
                    "SELECT {EVENT_COLUMNS} FROM events WHERE fest = ? ORDER BY event_date, event_id"
                );
                query_as(&sql).bind(fest).fetch_all(pool).await
            }
            (Database::Postgres(pool), None) => {
                let sql = format!("SELECT {EVENT_COLUMNS} FROM events ORDER BY event_date, event_id");
                query_as(&sql).fetch_all(pool).await
            }
            (Database::Postgres(pool), Some(fest)) => {
                let sql = format!(
                    "SELECT {EVENT_COLUMNS} FROM events WHERE fest = $1 ORDER BY event_date, event_id"
                );
                query_as(&sql).bind(fest).fetch_all(pool).await
            }
        }
    }

    pub async fn get_event(&self, event_id: &str) -> Result<Option<Event>, sqlx::Error> {
        match self {
            Database::Sqlite(pool) => {
                let sql = format!("SELECT {EVENT_COLUMNS} FROM events WHERE event_id = ?");
                query_as(&sql).bind(event_id).fetch_optional(pool).await
            }
            Database::Postgres(pool) => {
                let sql = format!("SELECT {EVENT_COLUMNS} FROM events WHERE event_id = $1");
                query_as(&sql).bind(event_id).fetch_optional(pool).await
            }
        }
    }

    pub async fn insert_event(&self, event: NewEvent) -> Result<Event, sqlx::Error> {
        let event = Event::from(event);
        match self {
            Database::Sqlite(pool) => {
                query(
                    "INSERT INTO events (event_id, title, description, event_date, end_date, fest, event_image_url, banner_url, pdf_url) \
                     VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
                )
                .bind(&event.event_id)
                .bind(&event.title)
                .bind(&event.description)
                .bind(event.event_date)
                .bind(event.end_date)
                .bind(&event.fest)
                .bind(&event.event_image_url)
                .bind(&event.banner_url)
                .bind(&event.pdf_url)
                .execute(pool)
                .await?;
            }
            Database::Postgres(pool) => {
                query(
                    "INSERT INTO events (event_id, title, description, event_date, end_date, fest, event_image_url, banner_url, pdf_url) \
                     VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
                )
                .bind(&event.event_id)
                .bind(&event.title)
                .bind(&event.description)
                .bind(event.event_date)
                .bind(event.end_date)
                .bind(&event.fest)
                .bind(&event.event_image_url)
                .bind(&event.banner_url)
                .bind(&event.pdf_url)
                .execute(pool)
                .await?;
            }
        }
        Ok(event)
    }

    // ---- registrations ----

    pub async fn insert_registration(
        &self,
        registration: NewRegistration,
    ) -> Result<Registration, sqlx::Error> {
        let registration = Registration {
            registration_id: Uuid::new_v4().to_string(),
            event_id: registration.event_id,
            user_email: registration.user_email.trim().to_ascii_lowercase(),
            registered_at: Utc::now(),
        };
        match self {
            Database::Sqlite(pool) => {
                query(
                    "INSERT INTO event_registrations (registration_id, event_id, user_email, registered_at) VALUES (?, ?, ?, ?)",
                )
                .bind(&registration.registration_id)
                .bind(&registration.event_id)
                .bind(&registration.user_email)
                .bind(registration.registered_at)
                .execute(pool)
                .await?;
            }
            Database::Postgres(pool) => {
                query(
                    "INSERT INTO event_registrations (registration_id, event_id, user_email, registered_at) VALUES ($1, $2, $3, $4)",
                )
                .bind(&registration.registration_id)
                .bind(&registration.event_id)
                .bind(&registration.user_email)
                .bind(registration.registered_at)
                .execute(pool)
                .await?;
            }
        }
        Ok(registration)
    }

    pub async fn list_registrations(
        &self,
        event_id: &str,
    ) -> Result<Vec<Registration>, sqlx::Error> {
        match self {
            Database::Sqlite(pool) => {
                query_as(
                    "SELECT registration_id, event_id, user_email, registered_at FROM event_registrations \
                     WHERE event_id = ? ORDER BY registered_at, registration_id",
                )
                .bind(event_id)
                .fetch_all(pool)
                .await
            }
            Database::Postgres(pool) => {
                query_as(
                    "SELECT registration_id, event_id, user_email, registered_at FROM event_registrations \
                     WHERE event_id = $1 ORDER BY registered_at, registration_id",
                )
                .bind(event_id)
                .fetch_all(pool)
                .await
            }
        }
    }

    /// Returns `false` when no such registration exists.
    pub async fn delete_registration(&self, registration_id: &str) -> Result<bool, sqlx::Error> {
        let affected = match self {
            Database::Sqlite(pool) => {
                query("DELETE FROM event_registrations WHERE registration_id = ?")
                    .bind(registration_id)
                    .execute(pool)
                    .await?
                    .rows_affected()
            }
            Database::Postgres(pool) => {
                query("DELETE FROM event_registrations WHERE registration_id = $1")
                    .bind(registration_id)
                    .execute(pool)
                    .await?
                    .rows_affected()
            }
        };
        Ok(affected > 0)
    }

    // ---- users ----

    pub async fn get_user(&self, email: &str) -> Result<Option<User>, sqlx::Error> {
        let email = email.trim().to_ascii_lowercase();
        match self {
            Database::Sqlite(pool) => {
                query_as("SELECT email, name, is_organiser, created_at FROM users WHERE email = ?")
                    .bind(email)
                    .fetch_optional(pool)
                    .await
            }
            Database::Postgres(pool) => {
                query_as("SELECT email, name, is_organiser, created_at FROM users WHERE email = $1")
                    .bind(email)
                    .fetch_optional(pool)
                    .await
            }
        }
    }

    /// Grant or revoke organiser rights. `false` when no such user exists.
    pub async fn set_organiser(
        &self,
        email: &str,
        is_organiser: bool,
    ) -> Result<bool, sqlx::Error> {
        let email = email.trim().to_ascii_lowercase();
        let affected = match self {
            Database::Sqlite(pool) => {
                query("UPDATE users SET is_organiser = ? WHERE email = ?")
                    .bind(is_organiser)
                    .bind(email)
                    .execute(pool)
                    .await?
                    .rows_affected()
            }
            Database::Postgres(pool) => {
                query("UPDATE users SET is_organiser = $1 WHERE email = $2")
                    .bind(is_organiser)
                    .bind(email)
                    .execute(pool)
                    .await?
                    .rows_affected()
            }
        };
        Ok(affected > 0)
    }

    /// Insert the user on first sign-in; later calls only refresh the name.
    pub async fn upsert_user(&self, user: NewUser) -> Result<User, sqlx::Error> {
        let email = user.email.trim().to_ascii_lowercase();
        match self {
            Database::Sqlite(pool) => {
                query_as(
                    "INSERT INTO users (email, name, is_organiser, created_at) VALUES (?, ?, 0, ?) \
                     ON CONFLICT (email) DO UPDATE SET name = COALESCE(excluded.name, users.name) \
                     RETURNING email, name, is_organiser, created_at",
                )
                .bind(email)
                .bind(user.name)
                .bind(Utc::now())
                .fetch_one(pool)
                .await
            }
            Database::Postgres(pool) => {
                query_as(
                    "INSERT INTO users (email, name, is_organiser, created_at) VALUES ($1, $2, FALSE, $3) \
                     ON CONFLICT (email) DO UPDATE SET name = COALESCE(EXCLUDED.name, users.name) \
                     RETURNING email, name, is_organiser, created_at",
                )
                .bind(email)
                .bind(user.name)
                .bind(Utc::now())
                .fetch_one(pool)
                .await
            }
        }
    }
}

fn comparison(mode: MatchMode) -> &'static str {
    match mode {
        MatchMode::Exact => "=",
        MatchMode::Backlog => "<=",
    }
}

/// `true` when the error is a primary key or unique constraint violation.
pub fn is_unique_violation(error: &sqlx::Error) -> bool {
    error
        .as_database_error()
        .is_some_and(|e| e.is_unique_violation())
}

/// `true` when the error is a foreign key violation.
pub fn is_foreign_key_violation(error: &sqlx::Error) -> bool {
    error
        .as_database_error()
        .is_some_and(|e| e.is_foreign_key_violation())
}
