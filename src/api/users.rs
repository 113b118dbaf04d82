use std::cmp::Ordering;
use std::sync::Arc;

use axum::{
    Json,
    extract::{Multipart, Path, Query, State},
    response::Redirect,
};
use serde::Deserialize;
use tower_sessions::Session;

use crate::models::{ProfileUpdate, Record};
use crate::store::{Mutation, StoreError};

use super::auth::{CurrentUser, SESSION_USER_KEY, SessionUser};
use super::error::FormError;
use super::types::{OkBody, UserDto, UserListResponse};
use super::validation;
use super::{ApiError, AppState};

const PER_PAGE_CHOICES: [usize; 4] = [1, 5, 10, 20];
const DEFAULT_PER_PAGE: usize = 10;

// ============================================================================
// Request Types
// ============================================================================

/// Pagination parameters. Kept as raw strings so junk values fall back to
/// the defaults instead of rejecting the request.
#[derive(Deserialize)]
pub struct ListQuery {
    #[serde(default)]
    page: Option<String>,
    #[serde(default)]
    per_page: Option<String>,
}

#[derive(Default)]
struct RawProfileForm {
    name: String,
    surname: String,
    dob: String,
    email: String,
    phone: String,
    ico: String,
    photo: Option<Vec<u8>>,
}

// ============================================================================
// Handlers
// ============================================================================

/// GET /users
/// Admin-only paginated listing, sorted by surname, name, then id.
pub async fn list_users(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    Query(query): Query<ListQuery>,
) -> Result<Json<UserListResponse>, ApiError> {
    user.require_admin()?;

    let mut page = query
        .page
        .as_deref()
        .and_then(|v| v.parse::<usize>().ok())
        .unwrap_or(1)
        .max(1);
    let per_page = query
        .per_page
        .as_deref()
        .and_then(|v| v.parse::<usize>().ok())
        .filter(|p| PER_PAGE_CHOICES.contains(p))
        .unwrap_or(DEFAULT_PER_PAGE);

    let mut records = state.store().load_all().await?;
    sort_for_listing(&mut records);

    let total = records.len();
    let total_pages = if total == 0 { 1 } else { total.div_ceil(per_page) };
    page = page.min(total_pages);

    let users = records
        .into_iter()
        .skip((page - 1) * per_page)
        .take(per_page)
        .map(UserDto::from)
        .collect();

    Ok(Json(UserListResponse {
        users,
        page,
        per_page,
        total,
        total_pages,
    }))
}

/// GET /users/{id}
/// One person, insurance labels included, password hash excluded.
pub async fn get_user(
    State(state): State<Arc<AppState>>,
    _user: CurrentUser,
    Path(id): Path<String>,
) -> Result<Json<UserDto>, ApiError> {
    let record = state.store().find_by_id(&id).await.map_err(|e| match e {
        StoreError::Unavailable(_) => ApiError::internal("Database file not found"),
        other => ApiError::from(other),
    })?;
    Ok(Json(UserDto::from(record)))
}

/// POST /users/{id}
/// Multipart profile update (text fields plus an optional photo), allowed
/// for the person themselves and for admins. Success redirects back to
/// the profile page; failures answer with a plain-text error.
pub async fn update_user(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    session: Session,
    Path(id): Path<String>,
    multipart: Multipart,
) -> Result<Redirect, FormError> {
    if !user.0.is_admin() && user.0.id != id {
        return Err(FormError::forbidden());
    }

    let form = read_profile_form(multipart).await?;

    validation::require_all(&[
        ("name", form.name.trim()),
        ("surname", form.surname.trim()),
        ("DOB", form.dob.trim()),
        ("email", form.email.trim()),
        ("phone", form.phone.trim()),
    ])?;
    let name = validation::validate_name(&form.name)?;
    let surname = validation::validate_surname(&form.surname)?;
    let dob = validation::validate_dob(&form.dob)?;
    let email = validation::validate_email(&form.email)?;
    let phone = validation::validate_phone(&form.phone)?;
    let ico = validation::normalize_ico(&form.ico);

    let photo = match form.photo {
        Some(bytes) if !bytes.is_empty() => Some(state.photos().save(&id, &bytes).await?),
        _ => None,
    };

    let update = ProfileUpdate {
        name: validation::escape_formula(&name),
        surname: validation::escape_formula(&surname),
        dob,
        email,
        phone,
        ico: validation::escape_formula(&ico),
        photo,
    };

    let record = state
        .store()
        .atomic_replace(Mutation::UpdateProfile {
            id: id.clone(),
            update,
        })
        .await?;

    // A self-edit may have changed the email the header shows.
    if user.0.id == id {
        let refreshed = SessionUser {
            id: user.0.id.clone(),
            email: record.email.clone(),
            account_type: user.0.account_type.clone(),
        };
        session
            .insert(SESSION_USER_KEY, &refreshed)
            .await
            .map_err(|e| FormError::internal(format!("Session error: {e}")))?;
    }

    tracing::info!("User {} profile updated by {}", id, user.0.id);
    Ok(Redirect::to(&format!(
        "/person?id={}",
        urlencoding::encode(&id)
    )))
}

/// DELETE /users/{id}
/// Admin-only removal. Answers `{"ok": true}` so the list page can prune
/// the row without reloading.
pub async fn delete_user(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    Path(id): Path<String>,
) -> Result<Json<OkBody>, ApiError> {
    user.require_admin()?;

    let removed = state
        .store()
        .atomic_replace(Mutation::Delete { id: id.clone() })
        .await?;

    tracing::info!(
        "User {} ({} {}) deleted by admin {}",
        id,
        removed.name,
        removed.surname,
        user.0.id
    );
    Ok(Json(OkBody::ok()))
}

// ============================================================================
// Helpers
// ============================================================================

fn sort_for_listing(records: &mut [Record]) {
    records.sort_by(|a, b| {
        let ord = a.surname.to_lowercase().cmp(&b.surname.to_lowercase());
        if ord != Ordering::Equal {
            return ord;
        }
        let ord = a.name.to_lowercase().cmp(&b.name.to_lowercase());
        if ord != Ordering::Equal {
            return ord;
        }
        numeric_id(&a.id).cmp(&numeric_id(&b.id))
    });
}

fn numeric_id(id: &str) -> i64 {
    id.parse().unwrap_or(0)
}

async fn read_profile_form(mut multipart: Multipart) -> Result<RawProfileForm, FormError> {
    let mut form = RawProfileForm::default();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| FormError::validation(format!("Malformed form data: {e}")))?
    {
        let Some(field_name) = field.name().map(ToString::to_string) else {
            continue;
        };
        match field_name.as_str() {
            "name" => form.name = field_text(field).await?,
            "surname" => form.surname = field_text(field).await?,
            "DOB" => form.dob = field_text(field).await?,
            "email" => form.email = field_text(field).await?,
            "phone" => form.phone = field_text(field).await?,
            "ICO" => form.ico = field_text(field).await?,
            "photo" => {
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| FormError::validation(format!("Failed to read photo: {e}")))?;
                form.photo = Some(bytes.to_vec());
            }
            _ => {}
        }
    }
    Ok(form)
}

async fn field_text(field: axum::extract::multipart::Field<'_>) -> Result<String, FormError> {
    field
        .text()
        .await
        .map_err(|e| FormError::validation(format!("Malformed form data: {e}")))
}
