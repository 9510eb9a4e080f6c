//! Session token utility for Launchkit
//!
//! Creates (or updates) an account and prints a session token for it. This
//! stands in for a login page when operating the billing service.
//!
//! Usage:
//!   cargo run --bin issue-token -- ada@example.com
//!   cargo run --bin issue-token -- ops@example.com --admin
//!
//! The token is accepted as `Authorization: Bearer <token>` or as the
//! `session` cookie. It expires after `JWT_EXPIRY_HOURS`.

use anyhow::{bail, Context};
use launchkit_api::{auth::JwtManager, config::Config};
use launchkit_shared::{create_pool, AccountId, AccountRole};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let mut email = None;
    let mut role = AccountRole::Member;
    for arg in std::env::args().skip(1) {
        match arg.as_str() {
            "--admin" => role = AccountRole::Admin,
            flag if flag.starts_with("--") => bail!("Unknown flag: {flag}"),
            value if email.is_none() => email = Some(value.trim().to_lowercase()),
            extra => bail!("Unexpected argument: {extra}"),
        }
    }

    let Some(email) = email.filter(|e| e.contains('@')) else {
        eprintln!("Usage: issue-token <email> [--admin]");
        std::process::exit(1);
    };

    let config = Config::from_env().context("Failed to load configuration")?;
    let pool = create_pool(&config.database_url, 1)
        .await
        .context("Failed to connect to database")?;

    let (account_id,): (AccountId,) = sqlx::query_as(
        r#"
        INSERT INTO accounts (id, email, role)
        VALUES ($1, $2, $3)
        ON CONFLICT (email) DO UPDATE SET role = EXCLUDED.role
        RETURNING id
        "#,
    )
    .bind(AccountId::new())
    .bind(&email)
    .bind(role.as_str())
    .fetch_one(&pool)
    .await
    .context("Failed to upsert account")?;

    let jwt = JwtManager::new(&config.jwt_secret, config.jwt_expiry_hours);
    let token = jwt
        .generate_token(account_id, &email, role)
        .context("Failed to generate token")?;

    eprintln!("Account {account_id} ({email}, {role})");
    println!("{token}");

    Ok(())
}
