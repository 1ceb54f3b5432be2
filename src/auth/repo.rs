pub use crate::auth::repo_types::{NewUser, User};
use sqlx::PgPool;
use uuid::Uuid;

impl User {
    /// Find a user by email. Email is matched exactly as stored.
    pub async fn find_by_email(db: &PgPool, email: &str) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, name, email, age, country, gender, password_hash, role,
                   google_id, is_google_auth, picture, email_verified, created_at, updated_at
            FROM users
            WHERE email = $1
            "#,
        )
        .bind(email)
        .fetch_optional(db)
        .await?;
        Ok(user)
    }

    /// Find a user by email or Google subject id; either match counts.
    pub async fn find_by_email_or_subject(
        db: &PgPool,
        email: &str,
        google_id: &str,
    ) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, name, email, age, country, gender, password_hash, role,
                   google_id, is_google_auth, picture, email_verified, created_at, updated_at
            FROM users
            WHERE email = $1 OR google_id = $2
            "#,
        )
        .bind(email)
        .bind(google_id)
        .fetch_optional(db)
        .await?;
        Ok(user)
    }

    /// Insert a new user. Unique violations surface as `sqlx::Error` so the
    /// caller can translate them by constraint name; the unique indexes are
    /// the authority on duplicates, not any prior read.
    pub async fn insert(db: &PgPool, new: NewUser) -> Result<User, sqlx::Error> {
        sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (name, email, age, country, gender, password_hash, role,
                               google_id, is_google_auth, picture, email_verified)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            RETURNING id, name, email, age, country, gender, password_hash, role,
                      google_id, is_google_auth, picture, email_verified, created_at, updated_at
            "#,
        )
        .bind(new.name)
        .bind(new.email)
        .bind(new.age)
        .bind(new.country)
        .bind(new.gender)
        .bind(new.password_hash)
        .bind(new.role)
        .bind(new.google_id)
        .bind(new.is_google_auth)
        .bind(new.picture)
        .bind(new.email_verified)
        .fetch_one(db)
        .await
    }

    /// Attach a Google identity to an existing record. Only the subject id,
    /// flag, picture and email_verified change; profile fields and any stored
    /// password hash are left untouched.
    pub async fn link_external(
        db: &PgPool,
        id: Uuid,
        google_id: &str,
        picture: Option<&str>,
    ) -> Result<User, sqlx::Error> {
        sqlx::query_as::<_, User>(
            r#"
            UPDATE users
            SET google_id = $2, is_google_auth = TRUE, picture = $3,
                email_verified = TRUE, updated_at = now()
            WHERE id = $1
            RETURNING id, name, email, age, country, gender, password_hash, role,
                      google_id, is_google_auth, picture, email_verified, created_at, updated_at
            "#,
        )
        .bind(id)
        .bind(google_id)
        .bind(picture)
        .fetch_one(db)
        .await
    }
}
