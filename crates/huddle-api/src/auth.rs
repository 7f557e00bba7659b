use std::sync::Arc;

use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier, password_hash::SaltString};
use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use jsonwebtoken::{EncodingKey, Header, encode};
use rand_core::OsRng;
use tracing::{error, info};
use uuid::Uuid;

use huddle_db::{Database, is_constraint_violation};
use huddle_gateway::dispatcher::Dispatcher;
use huddle_types::api::{Claims, LoginRequest, LoginResponse, RegisterRequest, RegisterResponse};

use crate::error::ApiError;
use crate::storage::Storage;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Arc<Database>,
    pub jwt_secret: String,
    pub dispatcher: Dispatcher,
    pub storage: Arc<Storage>,
    /// Externally reachable base URL, used to build upload and image URLs.
    pub public_url: String,
}

impl AppStateInner {
    /// Run blocking DB work off the async runtime.
    pub async fn run_db<F, T>(&self, f: F) -> Result<T, ApiError>
    where
        F: FnOnce(&Database) -> Result<T, ApiError> + Send + 'static,
        T: Send + 'static,
    {
        let db = self.db.clone();
        tokio::task::spawn_blocking(move || f(&db))
            .await
            .map_err(|e| {
                error!("spawn_blocking join error: {}", e);
                ApiError::Internal(anyhow::anyhow!("blocking task failed"))
            })?
    }

    pub fn storage_url(&self, storage_id: Uuid) -> String {
        format!("{}/storage/{}", self.public_url.trim_end_matches('/'), storage_id)
    }
}

const MIN_PASSWORD_LEN: usize = 8;
const MAX_NAME_LEN: usize = 80;

pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let name = req.name.trim().to_string();
    let email = req.email.trim().to_string();

    // Validate input
    if name.is_empty() || name.chars().count() > MAX_NAME_LEN {
        return Err(ApiError::bad_request("Name must be 1-80 characters"));
    }
    if !email.contains('@') || email.len() > 254 {
        return Err(ApiError::bad_request("Invalid email"));
    }
    if req.password.len() < MIN_PASSWORD_LEN {
        return Err(ApiError::bad_request("Password must be at least 8 characters"));
    }

    let user_id = Uuid::new_v4();
    let password = req.password;
    let (name_db, email_db) = (name.clone(), email.clone());

    state
        .run_db(move |db| {
            // Check if email is taken
            if db.get_user_by_email(&email_db)?.is_some() {
                return Err(ApiError::Conflict("Email already registered".into()));
            }

            // Hash password with Argon2id
            let salt = SaltString::generate(&mut OsRng);
            let password_hash = Argon2::default()
                .hash_password(password.as_bytes(), &salt)
                .map_err(|e| anyhow::anyhow!("password hashing failed: {}", e))?
                .to_string();

            db.create_user(user_id, &name_db, &email_db, &password_hash, huddle_db::now())
                .map_err(|e| {
                    if is_constraint_violation(&e) {
                        ApiError::Conflict("Email already registered".into())
                    } else {
                        ApiError::Internal(e)
                    }
                })
        })
        .await?;

    let token = create_token(&state.jwt_secret, user_id, &name)?;
    info!("Registered user {} ({})", name, user_id);

    Ok((StatusCode::CREATED, Json(RegisterResponse { user_id, token })))
}

pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let email = req.email.trim().to_string();
    let password = req.password;

    let user = state
        .run_db(move |db| {
            let user = db.get_user_by_email(&email)?.ok_or(ApiError::Unauthorized)?;

            // Verify password
            let parsed_hash = PasswordHash::new(&user.password)
                .map_err(|e| anyhow::anyhow!("stored password hash is invalid: {}", e))?;
            Argon2::default()
                .verify_password(password.as_bytes(), &parsed_hash)
                .map_err(|_| ApiError::Unauthorized)?;

            Ok(user)
        })
        .await?;

    let token = create_token(&state.jwt_secret, user.id, &user.name)?;

    Ok(Json(LoginResponse {
        user_id: user.id,
        name: user.name,
        token,
    }))
}

pub fn create_token(secret: &str, user_id: Uuid, name: &str) -> anyhow::Result<String> {
    let claims = Claims {
        sub: user_id,
        name: name.to_string(),
        exp: (chrono::Utc::now() + chrono::Duration::days(30)).timestamp() as usize,
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )?;

    Ok(token)
}
