use serde::Serialize;

use crate::catalog::{self, Product};
use crate::models::Record;

/// JSON error body every API endpoint uses.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
}

/// JSON acknowledgement for mutations with nothing else to return.
#[derive(Debug, Serialize)]
pub struct OkBody {
    pub ok: bool,
}

impl OkBody {
    #[must_use]
    pub const fn ok() -> Self {
        Self { ok: true }
    }
}

/// One person as the frontend sees it.
///
/// Field names match the table columns the page scripts were written
/// against; the password hash never leaves the server.
#[derive(Debug, Serialize)]
pub struct UserDto {
    pub id: String,
    pub name: String,
    pub surname: String,
    #[serde(rename = "DOB")]
    pub dob: String,
    pub email: String,
    pub phone: String,
    #[serde(rename = "ICO")]
    pub ico: String,
    #[serde(rename = "MT")]
    pub monthly_total: String,
    pub score: String,
    pub active_insurances: String,
    /// Catalog labels for `active_insurances`, ready for display.
    pub active_insurances_display: String,
    #[serde(rename = "ACType")]
    pub account_type: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub photo: String,
}

impl From<Record> for UserDto {
    fn from(record: Record) -> Self {
        let active_insurances_display = catalog::display_names(&record.active_insurances);
        Self {
            id: record.id,
            name: record.name,
            surname: record.surname,
            dob: record.dob,
            email: record.email,
            phone: record.phone,
            ico: record.ico,
            monthly_total: record.monthly_total,
            score: record.score,
            active_insurances: record.active_insurances,
            active_insurances_display,
            account_type: record.account_type,
            photo: record.photo,
        }
    }
}

/// One page of the admin person list.
#[derive(Debug, Serialize)]
pub struct UserListResponse {
    pub users: Vec<UserDto>,
    pub page: usize,
    pub per_page: usize,
    pub total: usize,
    pub total_pages: usize,
}

/// The session user's insurance state next to the full offering.
#[derive(Debug, Serialize)]
pub struct InsuranceOverview {
    pub available: &'static [Product],
    pub active: Vec<&'static Product>,
    /// Live sum of the active products' catalog prices, in CZK.
    pub monthly_total: u32,
}
