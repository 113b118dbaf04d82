use std::sync::Arc;

use axum::{Form, Json, extract::State, response::Redirect};
use serde::Deserialize;

use crate::catalog;
use crate::store::{Mutation, ToggleAction};

use super::auth::CurrentUser;
use super::error::FormError;
use super::types::InsuranceOverview;
use super::{ApiError, AppState};

#[derive(Deserialize)]
pub struct ToggleForm {
    #[serde(default)]
    pub action: String,
    #[serde(default)]
    pub code: String,
}

/// GET /insurance
/// The signed-in person's insurance overview: the full catalog, their
/// active codes, and the recomputed monthly total.
pub async fn overview(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
) -> Result<Json<InsuranceOverview>, ApiError> {
    let record = state.store().find_by_id(&user.0.id).await?;
    let codes = catalog::parse_active_codes(&record.active_insurances);
    let monthly_total = catalog::monthly_total(&codes);
    let active = codes.iter().filter_map(|c| catalog::find(c)).collect();
    Ok(Json(InsuranceOverview {
        available: catalog::PRODUCTS,
        active,
        monthly_total,
    }))
}

/// POST /insurance
/// Adds or removes one insurance on the signed-in person's own row and
/// redirects back to the overview page.
pub async fn toggle(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    Form(form): Form<ToggleForm>,
) -> Result<Redirect, FormError> {
    let code = form.code.trim().to_string();
    let Some(action) = ToggleAction::parse(form.action.trim()) else {
        return Err(FormError::validation("Bad request"));
    };
    if code.is_empty() {
        return Err(FormError::validation("Bad request"));
    }
    if !catalog::contains(&code) {
        return Err(FormError::validation("Unknown insurance"));
    }

    let record = state
        .store()
        .atomic_replace(Mutation::ToggleInsurance {
            id: user.0.id.clone(),
            action,
            code: code.clone(),
        })
        .await?;

    tracing::info!(
        "User {} {} insurance {} (monthly total now {})",
        user.0.id,
        match action {
            ToggleAction::Add => "added",
            ToggleAction::Remove => "removed",
        },
        code,
        record.monthly_total
    );
    Ok(Redirect::to("/insurance"))
}
