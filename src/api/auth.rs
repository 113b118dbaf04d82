use axum::{
    Form, Json,
    extract::{FromRequestParts, State},
    http::request::Parts,
    response::Redirect,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_sessions::Session;

use crate::services::password;

use super::{ApiError, AppState};

pub const SESSION_USER_KEY: &str = "user";
const LOGIN_FLASH_KEY: &str = "login_flash";

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Deserialize)]
pub struct LoginForm {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

/// Identity kept in the session after a successful login.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionUser {
    pub id: String,
    pub email: String,
    #[serde(rename = "ACType")]
    pub account_type: String,
}

impl SessionUser {
    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.account_type == "admin"
    }
}

/// One-shot message for the login page, consumed by the flash endpoint.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoginFlash {
    pub error: Option<String>,
    pub old_email: Option<String>,
}

// ============================================================================
// Extractor
// ============================================================================

/// Extractor for handlers that require a logged-in user. Rejects with a
/// 401 JSON body when the session carries no identity.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub SessionUser);

impl CurrentUser {
    pub fn require_admin(&self) -> Result<(), ApiError> {
        if self.0.is_admin() {
            Ok(())
        } else {
            Err(ApiError::forbidden())
        }
    }
}

impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let session = Session::from_request_parts(parts, state)
            .await
            .map_err(|(_, msg)| ApiError::internal(format!("Session unavailable: {msg}")))?;

        let user = session
            .get::<SessionUser>(SESSION_USER_KEY)
            .await
            .map_err(|e| ApiError::internal(format!("Session error: {e}")))?
            .ok_or_else(ApiError::unauthorized)?;

        Ok(Self(user))
    }
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /auth/login
/// Verify credentials and start a session. Every outcome is a redirect:
/// failures carry a one-shot flash back to the login page, success lands
/// on the user's own profile.
pub async fn login(
    State(state): State<Arc<AppState>>,
    session: Session,
    Form(form): Form<LoginForm>,
) -> Result<Redirect, ApiError> {
    let email = form.email.trim().to_string();
    // Deliberately not trimmed: whatever was registered must match.
    let password = form.password;

    if email.is_empty() || password.is_empty() {
        return login_failure(&session, "Fill in both email and password.", &email).await;
    }

    let Some(record) = state.store().find_by_email(&email).await? else {
        return login_failure(&session, "Email or password is incorrect.", &email).await;
    };

    let is_valid = password::verify_password(&password, &record.password_hash)
        .await
        .map_err(|e| ApiError::internal(format!("Password verification error: {e}")))?;

    if !is_valid {
        return login_failure(&session, "Email or password is incorrect.", &email).await;
    }

    // Fresh session id so a pre-login cookie cannot be replayed.
    session
        .cycle_id()
        .await
        .map_err(|e| ApiError::internal(format!("Failed to cycle session: {e}")))?;

    let account_type = if record.account_type.is_empty() {
        "user".to_string()
    } else {
        record.account_type.clone()
    };
    let user = SessionUser {
        id: record.id.clone(),
        email: record.email.clone(),
        account_type,
    };
    session
        .insert(SESSION_USER_KEY, &user)
        .await
        .map_err(|e| ApiError::internal(format!("Failed to create session: {e}")))?;

    let _: Option<LoginFlash> = session
        .remove(LOGIN_FLASH_KEY)
        .await
        .map_err(|e| ApiError::internal(format!("Session error: {e}")))?;

    tracing::info!("User {} logged in", record.id);

    Ok(Redirect::to(&format!(
        "/person?id={}",
        urlencoding::encode(&record.id)
    )))
}

/// POST /auth/logout
/// Drop the whole session and land back on the login page.
pub async fn logout(session: Session) -> Result<Redirect, ApiError> {
    session
        .flush()
        .await
        .map_err(|e| ApiError::internal(format!("Failed to clear session: {e}")))?;
    Ok(Redirect::to("/login"))
}

/// GET /auth/flash
/// One-shot login flash: reading it clears it.
pub async fn login_flash(session: Session) -> Result<Json<LoginFlash>, ApiError> {
    let flash = session
        .remove::<LoginFlash>(LOGIN_FLASH_KEY)
        .await
        .map_err(|e| ApiError::internal(format!("Session error: {e}")))?
        .unwrap_or_default();
    Ok(Json(flash))
}

/// GET /auth/me
/// The session identity, for the page scripts to adapt their navigation.
pub async fn me(user: CurrentUser) -> Json<SessionUser> {
    Json(user.0)
}

// ============================================================================
// Helpers
// ============================================================================

/// Stores the failure flash and redirects back to the login page. The
/// message never says which of email or password was wrong.
async fn login_failure(
    session: &Session,
    message: &str,
    old_email: &str,
) -> Result<Redirect, ApiError> {
    let flash = LoginFlash {
        error: Some(message.to_string()),
        old_email: Some(old_email.to_string()),
    };
    session
        .insert(LOGIN_FLASH_KEY, &flash)
        .await
        .map_err(|e| ApiError::internal(format!("Failed to store flash: {e}")))?;
    Ok(Redirect::to("/login"))
}
