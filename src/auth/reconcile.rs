//! Maps a verified identity to exactly one user record.
//!
//! Lookups here are only a fast path: the unique indexes on `users` are the
//! real arbiter, and a losing insert or link in a race comes back as a
//! unique violation that gets translated into the same domain error a
//! pre-check would have produced.

use crate::auth::error::AuthError;
use crate::auth::google::VerifiedIdentity;
use crate::auth::repo::{NewUser, User};
use sqlx::PgPool;
use tracing::info;

/// What the external path should do with a verified Google identity,
/// given the record (if any) that matched it by email or subject id.
#[derive(Debug)]
pub enum ExternalPlan {
    /// No record matched: create one from the verified identity.
    Create,
    /// A record matched by email but carries no subject id: link it.
    Link(User),
    /// The record already carries this subject id: reuse it unchanged.
    Reuse(User),
}

/// Decide between create, link and reuse. A record that matched by email
/// but is already bound to a *different* Google subject is rejected with
/// `DuplicateSubject` rather than silently reused or overwritten.
pub fn plan_external(
    existing: Option<User>,
    identity: &VerifiedIdentity,
) -> Result<ExternalPlan, AuthError> {
    match existing {
        None => Ok(ExternalPlan::Create),
        Some(user) => match user.google_id.as_deref() {
            None => Ok(ExternalPlan::Link(user)),
            Some(subject) if subject == identity.subject => Ok(ExternalPlan::Reuse(user)),
            Some(_) => Err(AuthError::DuplicateSubject),
        },
    }
}

/// Reconcile a Google-verified identity to a persisted user record.
/// Returns the record and whether it was created by this call. Replaying
/// the same identity reconciles to the same record.
pub async fn reconcile_external(
    db: &PgPool,
    identity: &VerifiedIdentity,
) -> Result<(User, bool), AuthError> {
    let existing = User::find_by_email_or_subject(db, &identity.email, &identity.subject).await?;

    match plan_external(existing, identity)? {
        ExternalPlan::Create => {
            let user = User::insert(db, new_user_from_identity(identity))
                .await
                .map_err(translate_unique_violation)?;
            info!(user_id = %user.id, "user created from google identity");
            Ok((user, true))
        }
        ExternalPlan::Link(user) => {
            let user = User::link_external(
                db,
                user.id,
                &identity.subject,
                identity.picture.as_deref(),
            )
            .await
            .map_err(translate_unique_violation)?;
            info!(user_id = %user.id, "google identity linked to existing user");
            Ok((user, false))
        }
        ExternalPlan::Reuse(user) => Ok((user, false)),
    }
}

/// Password registration. The pre-check gives the common-case error; the
/// unique index catches the record that appeared between check and insert.
pub async fn register_user(db: &PgPool, new: NewUser) -> Result<User, AuthError> {
    if User::find_by_email(db, &new.email).await?.is_some() {
        return Err(AuthError::DuplicateEmail);
    }
    User::insert(db, new)
        .await
        .map_err(translate_unique_violation)
}

/// Look up the record for a password login. Refuses Google-only accounts
/// before any hash comparison happens.
pub async fn find_password_user(db: &PgPool, email: &str) -> Result<User, AuthError> {
    let user = User::find_by_email(db, email)
        .await?
        .ok_or(AuthError::NotFound)?;
    password_login_gate(&user)?;
    Ok(user)
}

pub fn password_login_gate(user: &User) -> Result<(), AuthError> {
    if user.is_google_auth || user.password_hash.is_none() {
        return Err(AuthError::ProviderMismatch);
    }
    Ok(())
}

/// Field set for a record created from a verified Google identity: no
/// password, subject id bound, email already verified by the provider.
fn new_user_from_identity(identity: &VerifiedIdentity) -> NewUser {
    NewUser {
        name: identity.name.clone(),
        email: identity.email.clone(),
        age: None,
        country: None,
        gender: None,
        password_hash: None,
        role: "user".to_string(),
        google_id: Some(identity.subject.clone()),
        is_google_auth: true,
        picture: identity.picture.clone(),
        email_verified: true,
    }
}

fn translate_unique_violation(err: sqlx::Error) -> AuthError {
    if let Some(db_err) = err.as_database_error() {
        // 23505 = unique_violation; the constraint name tells us which
        // invariant the losing write hit.
        if db_err.code().as_deref() == Some("23505") {
            return match db_err.constraint() {
                Some("users_google_id_key") => AuthError::DuplicateSubject,
                _ => AuthError::DuplicateEmail,
            };
        }
    }
    AuthError::Unexpected(err.into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::OffsetDateTime;
    use uuid::Uuid;

    fn identity() -> VerifiedIdentity {
        VerifiedIdentity {
            subject: "google-sub-1".into(),
            email: "grace@example.com".into(),
            name: "Grace Hopper".into(),
            picture: Some("https://lh3.example/photo.jpg".into()),
        }
    }

    fn password_user() -> User {
        let now = OffsetDateTime::now_utc();
        User {
            id: Uuid::new_v4(),
            name: "Grace Hopper".into(),
            email: "grace@example.com".into(),
            age: Some(45),
            country: Some("US".into()),
            gender: Some("female".into()),
            password_hash: Some("$argon2id$stored".into()),
            role: "user".into(),
            google_id: None,
            is_google_auth: false,
            picture: None,
            email_verified: false,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn no_match_creates_a_new_record() {
        let plan = plan_external(None, &identity()).expect("plan");
        assert!(matches!(plan, ExternalPlan::Create));
    }

    #[test]
    fn email_match_without_subject_links_the_existing_record() {
        let user = password_user();
        let id = user.id;
        match plan_external(Some(user), &identity()).expect("plan") {
            ExternalPlan::Link(linked) => {
                // The record to link is handed back untouched; only the SQL
                // update sets subject id, flag, picture and email_verified.
                assert_eq!(linked.id, id);
                assert_eq!(linked.password_hash.as_deref(), Some("$argon2id$stored"));
                assert_eq!(linked.age, Some(45));
                assert_eq!(linked.country.as_deref(), Some("US"));
            }
            other => panic!("expected link, got {:?}", other),
        }
    }

    #[test]
    fn same_subject_reuses_the_record_unchanged() {
        let mut user = password_user();
        user.google_id = Some("google-sub-1".into());
        user.is_google_auth = true;
        let id = user.id;
        match plan_external(Some(user), &identity()).expect("plan") {
            ExternalPlan::Reuse(found) => assert_eq!(found.id, id),
            other => panic!("expected reuse, got {:?}", other),
        }
    }

    #[test]
    fn replaying_the_same_identity_never_plans_a_second_create() {
        let mut user = password_user();
        user.google_id = Some("google-sub-1".into());
        let plan = plan_external(Some(user), &identity()).expect("plan");
        assert!(matches!(plan, ExternalPlan::Reuse(_)));
    }

    #[test]
    fn different_subject_on_the_same_email_is_rejected() {
        let mut user = password_user();
        user.google_id = Some("some-other-subject".into());
        let err = plan_external(Some(user), &identity()).unwrap_err();
        assert!(matches!(err, AuthError::DuplicateSubject));
    }

    #[test]
    fn google_only_account_refuses_password_login() {
        let mut user = password_user();
        user.password_hash = None;
        user.google_id = Some("google-sub-1".into());
        user.is_google_auth = true;
        let err = password_login_gate(&user).unwrap_err();
        assert!(matches!(err, AuthError::ProviderMismatch));
    }

    #[test]
    fn flagged_account_refuses_password_login_even_with_a_stored_hash() {
        let mut user = password_user();
        user.is_google_auth = true;
        let err = password_login_gate(&user).unwrap_err();
        assert!(matches!(err, AuthError::ProviderMismatch));
    }

    #[test]
    fn password_account_passes_the_login_gate() {
        assert!(password_login_gate(&password_user()).is_ok());
    }

    #[test]
    fn google_created_record_has_no_password_and_a_bound_subject() {
        let new = new_user_from_identity(&identity());
        assert_eq!(new.google_id.as_deref(), Some("google-sub-1"));
        assert!(new.is_google_auth);
        assert!(new.email_verified);
        assert!(new.password_hash.is_none());
        assert_eq!(new.role, "user");
        assert_eq!(new.picture.as_deref(), Some("https://lh3.example/photo.jpg"));
    }
}
