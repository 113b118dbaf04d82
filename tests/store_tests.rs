//! Integration tests for the CSV row store against real files and real
//! advisory locks.

use std::path::PathBuf;

use fs2::FileExt;

use kartoteka::models::{NewRecord, ProfileUpdate};
use kartoteka::store::{
    CANONICAL_HEADER, CsvStore, Mutation, RowStore, StoreError, ToggleAction,
};

fn scratch_table() -> PathBuf {
    std::env::temp_dir()
        .join(format!("kartoteka-store-test-{}", uuid::Uuid::new_v4()))
        .join("records.csv")
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

#[tokio::test]
async fn test_missing_table_reads_empty_but_id_lookup_fails() {
    let store = CsvStore::new(scratch_table());

    assert!(store.load_all().await.unwrap().is_empty());
    assert!(store.find_by_email("jan@x.cz").await.unwrap().is_none());
    let err = store.find_by_id("0").await.unwrap_err();
    assert!(matches!(err, StoreError::Unavailable(_)));
}

#[tokio::test]
async fn test_ensure_table_writes_canonical_header_once() {
    let path = scratch_table();
    let store = CsvStore::new(&path);

    assert!(store.ensure_table().unwrap());
    let text = std::fs::read_to_string(&path).unwrap();
    assert_eq!(text, format!("{}\n", CANONICAL_HEADER.join(";")));

    // Header only: lookups report an empty table, not a missing person.
    let err = store.find_by_id("0").await.unwrap_err();
    assert!(matches!(err, StoreError::TableEmpty));

    assert!(!store.ensure_table().unwrap());
    assert_eq!(std::fs::read_to_string(&path).unwrap(), text);
}

#[tokio::test]
async fn test_ids_count_up_across_store_handles() {
    let path = scratch_table();
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();

    let store = CsvStore::new(&path);
    let first = store
        .atomic_replace(Mutation::Insert(new_record("jan@x.cz")))
        .await
        .unwrap();
    assert_eq!(first.id, "0");

    // A fresh handle sees the same file.
    let store = CsvStore::new(&path);
    let second = store
        .atomic_replace(Mutation::Insert(new_record("eva@x.cz")))
        .await
        .unwrap();
    assert_eq!(second.id, "1");
    assert_eq!(store.find_by_id("1").await.unwrap().email, "eva@x.cz");

    // The next id follows the highest surviving id.
    store
        .atomic_replace(Mutation::Delete {
            id: "0".to_string(),
        })
        .await
        .unwrap();
    let third = store
        .atomic_replace(Mutation::Insert(new_record("petr@x.cz")))
        .await
        .unwrap();
    assert_eq!(third.id, "2");
    let err = store.find_by_id("0").await.unwrap_err();
    assert!(matches!(err, StoreError::NotFound));
}

#[tokio::test]
async fn test_contended_write_fails_fast_with_busy() {
    let path = scratch_table();
    let store = CsvStore::new(&path);
    store.ensure_table().unwrap();

    let blocker = std::fs::OpenOptions::new()
        .read(true)
        .write(true)
        .open(&path)
        .unwrap();
    blocker.lock_exclusive().unwrap();

    let err = store
        .atomic_replace(Mutation::Insert(new_record("jan@x.cz")))
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::Busy));

    // The refused mutation left the file alone.
    assert!(store.load_all().await.unwrap().is_empty());

    blocker.unlock().unwrap();
    let record = store
        .atomic_replace(Mutation::Insert(new_record("jan@x.cz")))
        .await
        .unwrap();
    assert_eq!(record.id, "0");
    assert_eq!(store.load_all().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_insurance_toggles_recompute_the_stored_total() {
    let path = scratch_table();
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(
        &path,
        "id;name;surname;DOB;email;phone;ICO;MT;score;active_insurances;ACType;passwordHash\n\
         0;Jan;Novak;2000-01-01;jan@x.cz;+420777000111;;;;;user;hash\n",
    )
    .unwrap();

    let store = CsvStore::new(&path);
    store
        .atomic_replace(Mutation::ToggleInsurance {
            id: "0".to_string(),
            action: ToggleAction::Add,
            code: "zivotni".to_string(),
        })
        .await
        .unwrap();
    let record = store
        .atomic_replace(Mutation::ToggleInsurance {
            id: "0".to_string(),
            action: ToggleAction::Add,
            code: "povinne".to_string(),
        })
        .await
        .unwrap();
    assert_eq!(record.active_insurances, "zivotni,povinne");
    assert_eq!(record.monthly_total, "519");

    // The rewrite landed on disk, not just in the returned record.
    let text = std::fs::read_to_string(&path).unwrap();
    assert!(text.contains("zivotni,povinne"));
    assert!(text.contains("519"));

    let record = store
        .atomic_replace(Mutation::ToggleInsurance {
            id: "0".to_string(),
            action: ToggleAction::Remove,
            code: "zivotni".to_string(),
        })
        .await
        .unwrap();
    assert_eq!(record.active_insurances, "povinne");
    assert_eq!(record.monthly_total, "320");
    assert_eq!(store.find_by_id("0").await.unwrap().monthly_total, "320");
}

#[tokio::test]
async fn test_rewrite_keeps_unknown_columns_and_ragged_rows() {
    let path = scratch_table();
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(
        &path,
        "id;name;surname;DOB;email;phone;ICO;MT;score;active_insurances;ACType;passwordHash;legacy_note\n\
         0;Jan;Novak;2000-01-01;jan@x.cz;+420777000111;;;;;user;hash;imported 2019\n\
         half;a;row\n",
    )
    .unwrap();

    let store = CsvStore::new(&path);
    // The ragged row is invisible to reads.
    assert_eq!(store.load_all().await.unwrap().len(), 1);

    let update = ProfileUpdate {
        name: "Jan".to_string(),
        surname: "Novy".to_string(),
        dob: "2000-01-01".to_string(),
        email: "jan@x.cz".to_string(),
        phone: "+420777000111".to_string(),
        ico: "12345678".to_string(),
        photo: None,
    };
    store
        .atomic_replace(Mutation::UpdateProfile {
            id: "0".to_string(),
            update,
        })
        .await
        .unwrap();

    let text = std::fs::read_to_string(&path).unwrap();
    assert!(text.contains("legacy_note"));
    assert!(text.contains("imported 2019"));
    assert!(text.contains("half;a;row"));
    assert!(text.contains("Novy"));

    let record = store.find_by_id("0").await.unwrap();
    assert_eq!(record.surname, "Novy");
    assert_eq!(record.ico, "12345678");
}
