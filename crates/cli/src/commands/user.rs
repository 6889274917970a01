//! Account management commands.
//!
//! Self-registration over the API always yields the `user` role, so this is
//! the way administrators are provisioned.

use secrecy::{ExposeSecret, SecretString};
use sqlx::PgPool;
use thiserror::Error;

use stockroom_core::identity::User;
use stockroom_core::{Email, EmailError, Role};
use stockroom_server::db::{RepositoryError, UserRepository};
use stockroom_server::services::auth::{
    Argon2Hasher, AuthError, PasswordHasher, validate_password,
};

#[derive(Debug, Error)]
pub enum UserError {
    #[error("Database connection error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Invalid role: {0}. Valid roles: user, admin")]
    InvalidRole(String),

    #[error("Invalid email: {0}")]
    InvalidEmail(#[from] EmailError),

    #[error("{0} is required")]
    MissingName(&'static str),

    #[error("A user already exists with email: {0}")]
    UserExists(String),

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Repository(RepositoryError),
}

/// Arguments of `user create`.
pub struct NewAccount<'a> {
    pub email: &'a str,
    pub password: &'a str,
    pub first_name: &'a str,
    pub last_name: &'a str,
    pub role: &'a str,
}

/// Check the arguments and hash the password, without touching the database.
fn prepare(account: &NewAccount<'_>) -> Result<User, UserError> {
    let role: Role = account
        .role
        .parse()
        .ok()
        .filter(|r| *r != Role::Unknown)
        .ok_or_else(|| UserError::InvalidRole(account.role.to_owned()))?;
    let email = Email::parse(account.email)?;
    if account.first_name.trim().is_empty() {
        return Err(UserError::MissingName("first name"));
    }
    if account.last_name.trim().is_empty() {
        return Err(UserError::MissingName("last name"));
    }
    validate_password(account.password)?;

    let password_hash = Argon2Hasher.hash(account.password)?;
    Ok(User::new(
        email,
        password_hash,
        account.first_name,
        account.last_name,
        role,
    ))
}

/// Create an account.
///
/// # Errors
///
/// Returns `UserError` if an argument is invalid, the email is taken, or the
/// database is unreachable.
pub async fn create(database_url: &SecretString, account: &NewAccount<'_>) -> Result<(), UserError> {
    let user = prepare(account)?;

    tracing::info!("Connecting to database...");
    let pool = PgPool::connect(database_url.expose_secret()).await?;

    UserRepository::new(&pool)
        .create(&user)
        .await
        .map_err(|e| match e {
            RepositoryError::Conflict(_) => UserError::UserExists(user.email.to_string()),
            other => UserError::Repository(other),
        })?;

    tracing::info!(
        "User created. ID: {}, Email: {}, Role: {}",
        user.id,
        user.email,
        user.role
    );
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn account<'a>(role: &'a str, password: &'a str) -> NewAccount<'a> {
        NewAccount {
            email: "Ops@Shop.Example",
            password,
            first_name: "Ada",
            last_name: "Byrne",
            role,
        }
    }

    #[test]
    fn test_prepare_builds_admin_with_normalized_email() {
        let user = prepare(&account("admin", "correct-horse-battery")).unwrap();
        assert_eq!(user.role, Role::Admin);
        assert_eq!(user.email.as_str(), "ops@shop.example");
        assert_ne!(user.password_hash, "correct-horse-battery");
    }

    #[test]
    fn test_prepare_rejects_unknown_role() {
        assert!(matches!(
            prepare(&account("unknown", "correct-horse-battery")),
            Err(UserError::InvalidRole(_))
        ));
        assert!(matches!(
            prepare(&account("root", "correct-horse-battery")),
            Err(UserError::InvalidRole(_))
        ));
    }

    #[test]
    fn test_prepare_rejects_short_password() {
        assert!(matches!(
            prepare(&account("user", "short")),
            Err(UserError::Auth(AuthError::WeakPassword(_)))
        ));
    }
}
