//! Persistence for the person table.
//!
//! All durable state lives in one semicolon-delimited file with a header
//! row. Columns are addressed by name, never by position, so a reordered
//! or extended file keeps working and unknown columns survive rewrites.
//! Readers parse a point-in-time snapshot without locking; every mutation
//! re-reads, edits and rewrites the whole file under an exclusive advisory
//! lock.

pub mod csv;

use async_trait::async_trait;
use thiserror::Error;

use crate::models::{NewRecord, ProfileUpdate, Record};

pub use self::csv::CsvStore;

/// Column names the store understands.
pub mod columns {
    pub const ID: &str = "id";
    pub const NAME: &str = "name";
    pub const SURNAME: &str = "surname";
    pub const DOB: &str = "DOB";
    pub const EMAIL: &str = "email";
    pub const PHONE: &str = "phone";
    pub const ICO: &str = "ICO";
    pub const MONTHLY_TOTAL: &str = "MT";
    pub const SCORE: &str = "score";
    pub const ACTIVE_INSURANCES: &str = "active_insurances";
    pub const ACCOUNT_TYPE: &str = "ACType";
    pub const PASSWORD_HASH: &str = "passwordHash";
    pub const PHOTO: &str = "photo";
}

/// Header written when the store has to create the table from scratch.
pub const CANONICAL_HEADER: &[&str] = &[
    columns::ID,
    columns::NAME,
    columns::SURNAME,
    columns::DOB,
    columns::EMAIL,
    columns::PHONE,
    columns::ICO,
    columns::MONTHLY_TOTAL,
    columns::SCORE,
    columns::ACTIVE_INSURANCES,
    columns::ACCOUNT_TYPE,
    columns::PASSWORD_HASH,
    columns::PHOTO,
];

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("user not found")]
    NotFound,
    #[error("table has no data rows")]
    TableEmpty,
    #[error("table is locked by another writer")]
    Busy,
    #[error("cannot open table: {0}")]
    Unavailable(String),
    #[error("table header is missing the `{0}` column")]
    MissingColumn(&'static str),
    #[error("email is already registered")]
    EmailTaken,
    #[error("storage task panicked")]
    TaskPanicked,
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("malformed table: {0}")]
    Csv(#[from] ::csv::Error),
}

/// Whether a toggle adds or removes one insurance product.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToggleAction {
    Add,
    Remove,
}

impl ToggleAction {
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "add" => Some(Self::Add),
            "remove" => Some(Self::Remove),
            _ => None,
        }
    }
}

/// One read-modify-write against the table, applied under the write lock.
#[derive(Debug, Clone)]
pub enum Mutation {
    /// Insert a new person with a freshly assigned id.
    Insert(NewRecord),
    /// Overwrite the editable profile fields of one person.
    UpdateProfile { id: String, update: ProfileUpdate },
    /// Add or remove one insurance code and recompute the monthly total.
    ToggleInsurance {
        id: String,
        action: ToggleAction,
        code: String,
    },
    /// Remove one person entirely.
    Delete { id: String },
}

/// Backing storage for the person table.
#[async_trait]
pub trait RowStore: Send + Sync {
    /// Loads every well-formed data row. A missing or unreadable table
    /// reads as empty.
    async fn load_all(&self) -> Result<Vec<Record>, StoreError>;

    /// Finds one person by id.
    ///
    /// # Errors
    ///
    /// `Unavailable` when the table file does not exist, `TableEmpty` when
    /// it has no data rows, `NotFound` when no row carries the id.
    async fn find_by_id(&self, id: &str) -> Result<Record, StoreError>;

    /// Finds one person by email, compared ASCII case-insensitively.
    async fn find_by_email(&self, email: &str) -> Result<Option<Record>, StoreError>;

    /// Applies one mutation atomically and returns the affected record
    /// (for `Delete`, the record as it was before removal).
    ///
    /// # Errors
    ///
    /// `Busy` when another writer holds the lock. The table is rewritten
    /// only when the whole mutation succeeded.
    async fn atomic_replace(&self, mutation: Mutation) -> Result<Record, StoreError>;
}
