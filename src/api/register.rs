use axum::{Form, Json, extract::State, response::Redirect};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_sessions::Session;

use crate::models::NewRecord;
use crate::services::password;
use crate::store::{Mutation, StoreError};

use super::error::FormError;
use super::validation::{self, FieldError};
use super::{ApiError, AppState};

const REGISTER_FLASH_KEY: &str = "register_flash";

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Deserialize)]
pub struct RegisterForm {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub surname: String,
    #[serde(default, rename = "DOB")]
    pub dob: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub password: String,
}

/// One-shot state for the registration page: the failure message, the
/// field it belongs to and the entered values minus the password.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RegisterFlash {
    pub error: Option<String>,
    pub field: Option<String>,
    pub old: OldInput,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OldInput {
    pub name: String,
    pub surname: String,
    pub email: String,
    pub phone: String,
    #[serde(rename = "DOB")]
    pub dob: String,
}

struct ValidRegistration {
    name: String,
    surname: String,
    dob: String,
    email: String,
    phone: String,
    password: String,
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /register
/// Post-redirect-get: validation and store failures flash back to the
/// registration page with the entered values (never the password);
/// success inserts the person and redirects to the login page.
pub async fn register(
    State(state): State<Arc<AppState>>,
    session: Session,
    Form(form): Form<RegisterForm>,
) -> Result<Redirect, ApiError> {
    let old = OldInput {
        name: form.name.trim().to_string(),
        surname: form.surname.trim().to_string(),
        email: form.email.trim().to_string(),
        phone: form.phone.trim().to_string(),
        dob: form.dob.trim().to_string(),
    };

    let valid = match validate(&form) {
        Ok(valid) => valid,
        Err(err) => {
            return flash_failure(&session, old, err.message, Some(err.field.to_string())).await;
        }
    };

    let password_hash = password::hash_password(&valid.password, Some(&state.config().security))
        .await
        .map_err(|e| ApiError::internal(format!("Password hashing error: {e}")))?;

    let new = NewRecord {
        name: validation::escape_formula(&valid.name),
        surname: validation::escape_formula(&valid.surname),
        dob: valid.dob,
        email: valid.email,
        phone: valid.phone,
        account_type: "user".to_string(),
        password_hash,
    };

    match state.store().atomic_replace(Mutation::Insert(new)).await {
        Ok(record) => {
            let _: Option<RegisterFlash> = session
                .remove(REGISTER_FLASH_KEY)
                .await
                .map_err(|e| ApiError::internal(format!("Session error: {e}")))?;
            tracing::info!("User {} registered", record.id);
            Ok(Redirect::to("/login"))
        }
        Err(StoreError::EmailTaken) => {
            flash_failure(
                &session,
                old,
                "Email already exists.".to_string(),
                Some("email".to_string()),
            )
            .await
        }
        Err(other) => {
            let err = FormError::from(other);
            flash_failure(&session, old, err.message, None).await
        }
    }
}

/// GET /register/flash
/// One-shot registration flash: reading it clears it.
pub async fn register_flash(session: Session) -> Result<Json<RegisterFlash>, ApiError> {
    let flash = session
        .remove::<RegisterFlash>(REGISTER_FLASH_KEY)
        .await
        .map_err(|e| ApiError::internal(format!("Session error: {e}")))?
        .unwrap_or_default();
    Ok(Json(flash))
}

// ============================================================================
// Helpers
// ============================================================================

fn validate(form: &RegisterForm) -> Result<ValidRegistration, FieldError> {
    validation::require_all(&[
        ("name", form.name.trim()),
        ("surname", form.surname.trim()),
        ("DOB", form.dob.trim()),
        ("email", form.email.trim()),
        ("phone", form.phone.trim()),
        ("password", form.password.as_str()),
    ])?;

    Ok(ValidRegistration {
        name: validation::validate_name(&form.name)?,
        surname: validation::validate_surname(&form.surname)?,
        dob: validation::validate_dob(&form.dob)?,
        email: validation::validate_email(&form.email)?,
        phone: validation::validate_phone(&form.phone)?,
        password: validation::validate_password(&form.password)?,
    })
}

async fn flash_failure(
    session: &Session,
    old: OldInput,
    message: String,
    field: Option<String>,
) -> Result<Redirect, ApiError> {
    let flash = RegisterFlash {
        error: Some(message),
        field,
        old,
    };
    session
        .insert(REGISTER_FLASH_KEY, &flash)
        .await
        .map_err(|e| ApiError::internal(format!("Failed to store flash: {e}")))?;
    Ok(Redirect::to("/register"))
}
