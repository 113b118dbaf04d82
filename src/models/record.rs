/// One insured person, exactly as stored in the table.
///
/// Every field is kept as the raw cell text. Numeric-looking columns such
/// as `id` and `monthly_total` stay strings so a rewrite never reformats
/// values it did not touch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub id: String,
    pub name: String,
    pub surname: String,
    pub dob: String,
    pub email: String,
    pub phone: String,
    pub ico: String,
    pub monthly_total: String,
    pub score: String,
    pub active_insurances: String,
    pub account_type: String,
    pub password_hash: String,
    pub photo: String,
}

/// Fields required to insert a person. The id is assigned by the store.
#[derive(Debug, Clone)]
pub struct NewRecord {
    pub name: String,
    pub surname: String,
    pub dob: String,
    pub email: String,
    pub phone: String,
    pub account_type: String,
    pub password_hash: String,
}

/// Editable profile fields. The password hash and score are never touched
/// by a profile update; `photo` is only written when a new upload landed.
#[derive(Debug, Clone)]
pub struct ProfileUpdate {
    pub name: String,
    pub surname: String,
    pub dob: String,
    pub email: String,
    pub phone: String,
    pub ico: String,
    pub photo: Option<String>,
}
