use crate::api::validation;
use crate::config::Config;
use crate::models::NewRecord;
use crate::services::password;
use crate::store::{CsvStore, Mutation, RowStore, StoreError};

pub struct CreateAdminArgs<'a> {
    pub email: &'a str,
    pub password: &'a str,
    pub name: &'a str,
    pub surname: &'a str,
    pub dob: &'a str,
    pub phone: &'a str,
}

/// Validates like registration and inserts the account with admin rights
/// through the same store mutation, so email uniqueness and id assignment
/// hold for accounts created from the shell too.
pub async fn cmd_create_admin(config: &Config, args: CreateAdminArgs<'_>) -> anyhow::Result<()> {
    let name = validation::validate_name(args.name)?;
    let surname = validation::validate_surname(args.surname)?;
    let dob = validation::validate_dob(args.dob)?;
    let email = validation::validate_email(args.email)?;
    let phone = validation::validate_phone(args.phone)?;
    let password = validation::validate_password(args.password)?;

    let password_hash = password::hash_password(&password, Some(&config.security)).await?;

    let new = NewRecord {
        name: validation::escape_formula(&name),
        surname: validation::escape_formula(&surname),
        dob,
        email: email.clone(),
        phone,
        account_type: "admin".to_string(),
        password_hash,
    };

    let store = CsvStore::new(&config.storage.table_path);
    match store.atomic_replace(Mutation::Insert(new)).await {
        Ok(record) => {
            println!("✓ Created admin account (ID: {})", record.id);
            println!("  {} {} <{}>", record.name, record.surname, record.email);
            Ok(())
        }
        Err(StoreError::EmailTaken) => {
            println!("An account with email {email} already exists.");
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}
