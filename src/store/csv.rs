//! CSV-file implementation of the row store.

use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use csv::{ReaderBuilder, WriterBuilder};
use fs2::FileExt;
use async_trait::async_trait;
use tokio::task;
use tracing::{debug, warn};

use crate::catalog;
use crate::models::{NewRecord, ProfileUpdate, Record};

use super::{CANONICAL_HEADER, Mutation, RowStore, StoreError, ToggleAction, columns};

/// Row store backed by one semicolon-delimited file on disk.
#[derive(Debug, Clone)]
pub struct CsvStore {
    path: PathBuf,
}

impl CsvStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Creates the table file with the canonical header when it is missing.
    /// Returns `true` when a new file was written.
    pub fn ensure_table(&self) -> Result<bool, StoreError> {
        if self.path.exists() {
            return Ok(false);
        }
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let table = Table::canonical();
        std::fs::write(&self.path, table.to_bytes()?)?;
        Ok(true)
    }
}

#[async_trait]
impl RowStore for CsvStore {
    async fn load_all(&self) -> Result<Vec<Record>, StoreError> {
        let path = self.path.clone();
        task::spawn_blocking(move || {
            let Ok(content) = std::fs::read_to_string(&path) else {
                return Ok(Vec::new());
            };
            let table = Table::parse(&content);
            warn_malformed(&table, &path);
            Ok(table.records())
        })
        .await
        .map_err(|_| StoreError::TaskPanicked)?
    }

    async fn find_by_id(&self, id: &str) -> Result<Record, StoreError> {
        let path = self.path.clone();
        let id = id.to_string();
        task::spawn_blocking(move || {
            let content = std::fs::read_to_string(&path).map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    StoreError::Unavailable("table file not found".to_string())
                } else {
                    StoreError::Io(e)
                }
            })?;
            let table = Table::parse(&content);
            warn_malformed(&table, &path);
            if table.is_empty() {
                return Err(StoreError::TableEmpty);
            }
            let Some(id_idx) = table.column(columns::ID) else {
                return Err(StoreError::NotFound);
            };
            table
                .well_formed()
                .find(|row| Table::cell(row, id_idx) == id)
                .map(|row| table.record_at(row))
                .ok_or(StoreError::NotFound)
        })
        .await
        .map_err(|_| StoreError::TaskPanicked)?
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<Record>, StoreError> {
        let path = self.path.clone();
        let email = email.to_string();
        task::spawn_blocking(move || {
            let Ok(content) = std::fs::read_to_string(&path) else {
                return Ok(None);
            };
            let table = Table::parse(&content);
            warn_malformed(&table, &path);
            let Some(email_idx) = table.column(columns::EMAIL) else {
                return Ok(None);
            };
            Ok(table
                .well_formed()
                .find(|row| Table::cell(row, email_idx).eq_ignore_ascii_case(&email))
                .map(|row| table.record_at(row)))
        })
        .await
        .map_err(|_| StoreError::TaskPanicked)?
    }

    async fn atomic_replace(&self, mutation: Mutation) -> Result<Record, StoreError> {
        let path = self.path.clone();
        task::spawn_blocking(move || {
            let (mut file, mut table) = open_locked(&path)?;
            let record = apply_mutation(&mut table, mutation)?;
            write_back(&mut file, &table)?;
            Ok(record)
        })
        .await
        .map_err(|_| StoreError::TaskPanicked)?
    }
}

/// Opens the table read-write (creating an empty file if needed) and takes
/// the exclusive lock. A contended lock fails immediately instead of
/// queueing, so a slow writer degrades requests to retries, not pile-ups.
fn open_locked(path: &Path) -> Result<(File, Table), StoreError> {
    let mut file = OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(false)
        .open(path)
        .map_err(|e| StoreError::Unavailable(e.to_string()))?;

    if let Err(e) = file.try_lock_exclusive() {
        if e.raw_os_error() == fs2::lock_contended_error().raw_os_error() {
            debug!("Table {} is locked by another writer", path.display());
            return Err(StoreError::Busy);
        }
        return Err(StoreError::Io(e));
    }

    let mut content = String::new();
    file.read_to_string(&mut content)?;
    let table = Table::parse(&content);
    warn_malformed(&table, path);
    Ok((file, table))
}

/// Truncates and rewrites the table, then releases the lock.
fn write_back(file: &mut File, table: &Table) -> Result<(), StoreError> {
    let bytes = table.to_bytes()?;
    file.set_len(0)?;
    file.seek(SeekFrom::Start(0))?;
    file.write_all(&bytes)?;
    file.flush()?;
    file.unlock()?;
    Ok(())
}

fn warn_malformed(table: &Table, path: &Path) {
    let malformed = table.malformed_count();
    if malformed > 0 {
        warn!(
            "Ignoring {} malformed row(s) in {}",
            malformed,
            path.display()
        );
    }
}

fn apply_mutation(table: &mut Table, mutation: Mutation) -> Result<Record, StoreError> {
    match mutation {
        Mutation::Insert(new) => insert(table, new),
        Mutation::UpdateProfile { id, update } => update_profile(table, &id, update),
        Mutation::ToggleInsurance { id, action, code } => {
            toggle_insurance(table, &id, action, &code)
        }
        Mutation::Delete { id } => delete(table, &id),
    }
}

fn insert(table: &mut Table, new: NewRecord) -> Result<Record, StoreError> {
    if table.header.is_empty() {
        table.set_header(CANONICAL_HEADER.iter().map(ToString::to_string).collect());
    }
    let id_idx = table.require(columns::ID)?;
    let email_idx = table.require(columns::EMAIL)?;

    if table
        .rows
        .iter()
        .any(|row| Table::cell(row, email_idx).eq_ignore_ascii_case(&new.email))
    {
        return Err(StoreError::EmailTaken);
    }

    let mut row = vec![String::new(); table.header.len()];
    Table::set_cell(&mut row, id_idx, table.next_id());
    for (name, value) in [
        (columns::NAME, new.name),
        (columns::SURNAME, new.surname),
        (columns::DOB, new.dob),
        (columns::EMAIL, new.email),
        (columns::PHONE, new.phone),
        (columns::ACCOUNT_TYPE, new.account_type),
        (columns::PASSWORD_HASH, new.password_hash),
    ] {
        if let Some(idx) = table.column(name) {
            Table::set_cell(&mut row, idx, value);
        }
    }

    let record = table.record_at(&row);
    table.rows.push(row);
    Ok(record)
}

fn update_profile(table: &mut Table, id: &str, update: ProfileUpdate) -> Result<Record, StoreError> {
    if table.is_empty() {
        return Err(StoreError::TableEmpty);
    }
    table.require(columns::ID)?;
    let pos = table.find_position(id).ok_or(StoreError::NotFound)?;

    // The same address may stay on the edited row, but never on another.
    if let Some(email_idx) = table.column(columns::EMAIL) {
        let taken = table.rows.iter().enumerate().any(|(i, row)| {
            i != pos && Table::cell(row, email_idx).eq_ignore_ascii_case(&update.email)
        });
        if taken {
            return Err(StoreError::EmailTaken);
        }
    }

    let mut sets: Vec<(&str, String)> = vec![
        (columns::NAME, update.name),
        (columns::SURNAME, update.surname),
        (columns::DOB, update.dob),
        (columns::EMAIL, update.email),
        (columns::PHONE, update.phone),
        (columns::ICO, update.ico),
    ];
    if let Some(photo) = update.photo {
        sets.push((columns::PHOTO, photo));
    }
    for (name, value) in sets {
        if let Some(idx) = table.column(name) {
            Table::set_cell(&mut table.rows[pos], idx, value);
        }
    }
    Ok(table.record_at(&table.rows[pos]))
}

fn toggle_insurance(
    table: &mut Table,
    id: &str,
    action: ToggleAction,
    code: &str,
) -> Result<Record, StoreError> {
    if table.is_empty() {
        return Err(StoreError::TableEmpty);
    }
    table.require(columns::ID)?;
    let act_idx = table.require(columns::ACTIVE_INSURANCES)?;
    let mt_idx = table.require(columns::MONTHLY_TOTAL)?;
    let pos = table.find_position(id).ok_or(StoreError::NotFound)?;

    let mut codes = catalog::parse_active_codes(Table::cell(&table.rows[pos], act_idx));
    match action {
        ToggleAction::Add => {
            if !codes.iter().any(|c| c == code) {
                codes.push(code.to_string());
            }
        }
        ToggleAction::Remove => codes.retain(|c| c != code),
    }
    let total = catalog::monthly_total(&codes);

    Table::set_cell(&mut table.rows[pos], act_idx, codes.join(","));
    Table::set_cell(&mut table.rows[pos], mt_idx, total.to_string());
    Ok(table.record_at(&table.rows[pos]))
}

fn delete(table: &mut Table, id: &str) -> Result<Record, StoreError> {
    if table.is_empty() {
        return Err(StoreError::TableEmpty);
    }
    let id_idx = table.require(columns::ID)?;
    let pos = table.find_position(id).ok_or(StoreError::NotFound)?;
    let removed = table.record_at(&table.rows[pos]);
    table.rows.retain(|row| Table::cell(row, id_idx) != id);
    Ok(removed)
}

/// In-memory image of the table file.
///
/// Rows are kept exactly as read, ragged ones included, so a rewrite only
/// changes the cells a mutation touched. Reads go through [`well_formed`]
/// which hides rows whose cell count does not match the header.
///
/// [`well_formed`]: Table::well_formed
#[derive(Debug, Default)]
struct Table {
    header: Vec<String>,
    rows: Vec<Vec<String>>,
    index: HashMap<String, usize>,
    dropped: usize,
}

impl Table {
    fn parse(content: &str) -> Self {
        let mut reader = ReaderBuilder::new()
            .delimiter(b';')
            .has_headers(false)
            .flexible(true)
            .from_reader(content.as_bytes());

        let mut table = Self::default();
        for result in reader.records() {
            let record = match result {
                Ok(r) => r,
                Err(_) => {
                    table.dropped += 1;
                    continue;
                }
            };
            let cells: Vec<String> = record.iter().map(str::to_string).collect();
            if table.header.is_empty() {
                table.set_header(cells);
            } else {
                table.rows.push(cells);
            }
        }
        table
    }

    fn canonical() -> Self {
        let mut table = Self::default();
        table.set_header(CANONICAL_HEADER.iter().map(ToString::to_string).collect());
        table
    }

    fn set_header(&mut self, header: Vec<String>) {
        self.index = header
            .iter()
            .enumerate()
            .map(|(i, name)| (name.clone(), i))
            .collect();
        self.header = header;
    }

    /// True when the file would have fewer than two lines.
    fn is_empty(&self) -> bool {
        self.header.is_empty() || self.rows.is_empty()
    }

    fn column(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    fn require(&self, name: &'static str) -> Result<usize, StoreError> {
        self.column(name).ok_or(StoreError::MissingColumn(name))
    }

    fn cell<'a>(row: &'a [String], idx: usize) -> &'a str {
        row.get(idx).map_or("", String::as_str)
    }

    fn set_cell(row: &mut Vec<String>, idx: usize, value: String) {
        if row.len() <= idx {
            row.resize(idx + 1, String::new());
        }
        row[idx] = value;
    }

    /// Data rows whose cell count matches the header.
    fn well_formed(&self) -> impl Iterator<Item = &Vec<String>> {
        let width = self.header.len();
        self.rows.iter().filter(move |row| row.len() == width)
    }

    fn malformed_count(&self) -> usize {
        let width = self.header.len();
        self.dropped + self.rows.iter().filter(|row| row.len() != width).count()
    }

    /// First row whose id cell matches, ragged rows included.
    fn find_position(&self, id: &str) -> Option<usize> {
        let idx = self.column(columns::ID)?;
        self.rows.iter().position(|row| Self::cell(row, idx) == id)
    }

    /// Highest numeric id plus one, `"0"` for a table with no numeric ids.
    fn next_id(&self) -> String {
        let Some(idx) = self.column(columns::ID) else {
            return "0".to_string();
        };
        let max = self
            .rows
            .iter()
            .filter_map(|row| Self::cell(row, idx).parse::<i64>().ok())
            .fold(-1, i64::max);
        (max + 1).to_string()
    }

    fn record_at(&self, row: &[String]) -> Record {
        let get = |name: &str| {
            self.column(name)
                .map_or_else(String::new, |idx| Self::cell(row, idx).to_string())
        };
        Record {
            id: get(columns::ID),
            name: get(columns::NAME),
            surname: get(columns::SURNAME),
            dob: get(columns::DOB),
            email: get(columns::EMAIL),
            phone: get(columns::PHONE),
            ico: get(columns::ICO),
            monthly_total: get(columns::MONTHLY_TOTAL),
            score: get(columns::SCORE),
            active_insurances: get(columns::ACTIVE_INSURANCES),
            account_type: get(columns::ACCOUNT_TYPE),
            password_hash: get(columns::PASSWORD_HASH),
            photo: get(columns::PHOTO),
        }
    }

    fn records(&self) -> Vec<Record> {
        self.well_formed().map(|row| self.record_at(row)).collect()
    }

    fn to_bytes(&self) -> Result<Vec<u8>, StoreError> {
        let mut buf = Vec::new();
        {
            let mut writer = WriterBuilder::new()
                .delimiter(b';')
                .flexible(true)
                .from_writer(&mut buf);
            writer.write_record(&self.header)?;
            for row in &self.rows {
                writer.write_record(row)?;
            }
            writer.flush()?;
        }
        Ok(buf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LEGACY_HEADER: &str =
        "id;name;surname;DOB;email;phone;ICO;MT;score;active_insurances;ACType;passwordHash";

    fn legacy_table(rows: &[&str]) -> Table {
        let mut content = String::from(LEGACY_HEADER);
        for row in rows {
            content.push('\n');
            content.push_str(row);
        }
        Table::parse(&content)
    }

    fn new_record(email: &str) -> NewRecord {
        NewRecord {
            name: "Jan".to_string(),
            surname: "Novak".to_string(),
            dob: "2000-01-01".to_string(),
            email: email.to_string(),
            phone: "+420777000111".to_string(),
            account_type: "user".to_string(),
            password_hash: "hash".to_string(),
        }
    }

    #[test]
    fn test_parse_keeps_ragged_rows_but_hides_them_from_reads() {
        let table = legacy_table(&[
            "0;Jan;Novak;2000-01-01;jan@x.cz;+420777000111;;;;;user;hash",
            "busted;row",
        ]);
        assert_eq!(table.rows.len(), 2);
        assert_eq!(table.records().len(), 1);
        assert_eq!(table.malformed_count(), 1);
    }

    #[test]
    fn test_next_id_ignores_non_numeric_ids() {
        let table = legacy_table(&[
            "0;A;B;2000-01-01;a@x.cz;+420777000111;;;;;user;h",
            "7;C;D;2000-01-01;c@x.cz;+420777000112;;;;;user;h",
            "oops;E;F;2000-01-01;e@x.cz;+420777000113;;;;;user;h",
        ]);
        assert_eq!(table.next_id(), "8");
    }

    #[test]
    fn test_insert_into_fresh_table_writes_canonical_header_and_id_zero() {
        let mut table = Table::parse("");
        let record = insert(&mut table, new_record("jan@example.cz")).unwrap();
        assert_eq!(table.header.len(), CANONICAL_HEADER.len());
        assert_eq!(record.id, "0");
        assert_eq!(record.account_type, "user");
        assert_eq!(record.ico, "");

        let next = insert(&mut table, new_record("jana@example.cz")).unwrap();
        assert_eq!(next.id, "1");
    }

    #[test]
    fn test_insert_rejects_duplicate_email_case_insensitively() {
        let mut table = Table::parse("");
        insert(&mut table, new_record("jan@example.cz")).unwrap();
        let err = insert(&mut table, new_record("JAN@EXAMPLE.CZ")).unwrap_err();
        assert!(matches!(err, StoreError::EmailTaken));
    }

    #[test]
    fn test_toggle_accumulates_codes_and_recomputes_total() {
        let mut table =
            legacy_table(&["0;Jan;Novak;2000-01-01;jan@x.cz;+420777000111;;;;;user;hash"]);

        toggle_insurance(&mut table, "0", ToggleAction::Add, "zivotni").unwrap();
        let record =
            toggle_insurance(&mut table, "0", ToggleAction::Add, "povinne").unwrap();
        assert_eq!(record.active_insurances, "zivotni,povinne");
        assert_eq!(record.monthly_total, "519");

        let record =
            toggle_insurance(&mut table, "0", ToggleAction::Remove, "zivotni").unwrap();
        assert_eq!(record.active_insurances, "povinne");
        assert_eq!(record.monthly_total, "320");
    }

    #[test]
    fn test_toggle_drops_unknown_stored_codes() {
        let mut table = legacy_table(&[
            "0;Jan;Novak;2000-01-01;jan@x.cz;+420777000111;;999;;ufo,zivotni;user;hash",
        ]);
        let record = toggle_insurance(&mut table, "0", ToggleAction::Add, "povinne").unwrap();
        assert_eq!(record.active_insurances, "zivotni,povinne");
        assert_eq!(record.monthly_total, "519");
    }

    #[test]
    fn test_toggle_add_is_idempotent() {
        let mut table = legacy_table(&[
            "0;Jan;Novak;2000-01-01;jan@x.cz;+420777000111;;199;;zivotni;user;hash",
        ]);
        let record = toggle_insurance(&mut table, "0", ToggleAction::Add, "zivotni").unwrap();
        assert_eq!(record.active_insurances, "zivotni");
        assert_eq!(record.monthly_total, "199");
    }

    #[test]
    fn test_toggle_remove_of_inactive_code_is_a_no_op() {
        let mut table = legacy_table(&[
            "0;Jan;Novak;2000-01-01;jan@x.cz;+420777000111;;199;;zivotni;user;hash",
        ]);
        let record =
            toggle_insurance(&mut table, "0", ToggleAction::Remove, "povinne").unwrap();
        assert_eq!(record.active_insurances, "zivotni");
        assert_eq!(record.monthly_total, "199");
    }

    #[test]
    fn test_toggle_requires_total_column() {
        let mut table = Table::parse("id;active_insurances\n0;zivotni");
        let err =
            toggle_insurance(&mut table, "0", ToggleAction::Add, "povinne").unwrap_err();
        assert!(matches!(err, StoreError::MissingColumn("MT")));
    }

    #[test]
    fn test_update_rejects_email_taken_by_another_row() {
        let mut table = legacy_table(&[
            "0;Jan;Novak;2000-01-01;jan@x.cz;+420777000111;;;;;user;h",
            "1;Eva;Mala;1999-05-05;eva@x.cz;+420777000112;;;;;user;h",
        ]);
        let update = ProfileUpdate {
            name: "Eva".to_string(),
            surname: "Mala".to_string(),
            dob: "1999-05-05".to_string(),
            email: "JAN@X.CZ".to_string(),
            phone: "+420777000112".to_string(),
            ico: String::new(),
            photo: None,
        };
        let err = update_profile(&mut table, "1", update).unwrap_err();
        assert!(matches!(err, StoreError::EmailTaken));
    }

    #[test]
    fn test_update_keeps_own_email_and_skips_missing_photo_column() {
        let mut table = legacy_table(&[
            "0;Jan;Novak;2000-01-01;jan@x.cz;+420777000111;;;;;user;secret-hash",
        ]);
        let update = ProfileUpdate {
            name: "Jan".to_string(),
            surname: "Novy".to_string(),
            dob: "2000-01-01".to_string(),
            email: "jan@x.cz".to_string(),
            phone: "+420777000111".to_string(),
            ico: "12345678".to_string(),
            photo: Some("uploads/profile_0.png".to_string()),
        };
        let record = update_profile(&mut table, "0", update).unwrap();
        assert_eq!(record.surname, "Novy");
        assert_eq!(record.ico, "12345678");
        // No photo column in the legacy layout, so nothing was added.
        assert_eq!(record.photo, "");
        assert_eq!(table.rows[0].len(), table.header.len());
        // Password hash is never touched by a profile update.
        assert_eq!(record.password_hash, "secret-hash");
    }

    #[test]
    fn test_delete_removes_exactly_one_row_and_keeps_extra_columns() {
        let mut table = Table::parse(
            "id;name;surname;email;note\n0;Jan;Novak;jan@x.cz;keep me\n1;Eva;Mala;eva@x.cz;me too",
        );
        let removed = delete(&mut table, "1").unwrap();
        assert_eq!(removed.name, "Eva");
        assert_eq!(table.rows.len(), 1);
        assert_eq!(table.rows[0][4], "keep me");

        let bytes = table.to_bytes().unwrap();
        let text = String::from_utf8(bytes).unwrap();
        assert_eq!(text, "id;name;surname;email;note\n0;Jan;Novak;jan@x.cz;keep me\n");
    }

    #[test]
    fn test_delete_on_empty_table_reports_empty_not_missing() {
        let mut table = Table::parse(LEGACY_HEADER);
        let err = delete(&mut table, "0").unwrap_err();
        assert!(matches!(err, StoreError::TableEmpty));
    }

    #[test]
    fn test_delete_unknown_id_reports_not_found() {
        let mut table =
            legacy_table(&["0;Jan;Novak;2000-01-01;jan@x.cz;+420777000111;;;;;user;h"]);
        let err = delete(&mut table, "42").unwrap_err();
        assert!(matches!(err, StoreError::NotFound));
    }

    #[test]
    fn test_cells_with_delimiter_are_quoted_on_rewrite() {
        let mut table = Table::parse("id;name;surname;email\n0;Jan;Novak;jan@x.cz");
        let update = ProfileUpdate {
            name: "Jan; really".to_string(),
            surname: "Novak".to_string(),
            dob: String::new(),
            email: "jan@x.cz".to_string(),
            phone: String::new(),
            ico: String::new(),
            photo: None,
        };
        update_profile(&mut table, "0", update).unwrap();
        let text = String::from_utf8(table.to_bytes().unwrap()).unwrap();
        assert!(text.contains("\"Jan; really\""));

        let reread = Table::parse(&text);
        assert_eq!(reread.records()[0].name, "Jan; really");
    }
}
