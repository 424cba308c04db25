#![forbid(unsafe_code)]

use taskhub_kernel_contracts::backend::ChallengeCodeRow;
use taskhub_storage::repo::UnsubscribeCodeRepo;
use taskhub_storage::taskhub_store::{StorageError, TaskHubStore, TABLE_UNSUBSCRIBE_CODES};

fn row(id: &str, code: &str) -> ChallengeCodeRow {
    ChallengeCodeRow {
        id: id.to_string(),
        code: code.to_string(),
    }
}

#[test]
fn at_unsub_code_db_01_select_returns_every_row() {
    let mut s = TaskHubStore::new_in_memory();
    s.unsub_code_insert_row(row("1", "Il1|!O0")).unwrap();
    s.unsub_code_insert_row(row("2", "O0o!iIl1")).unwrap();

    let rows = s.unsub_code_rows();
    assert_eq!(rows.len(), 2);
    assert!(rows.iter().any(|r| r.id == "1" && r.code == "Il1|!O0"));
    assert!(rows.iter().any(|r| r.id == "2" && r.code == "O0o!iIl1"));
}

#[test]
fn at_unsub_code_db_02_duplicate_id_is_rejected() {
    let mut s = TaskHubStore::new_in_memory();
    s.unsub_code_insert_row(row("1", "Il1|")).unwrap();
    assert_eq!(
        s.unsub_code_insert_row(row("1", "O0o!")),
        Err(StorageError::DuplicateKey {
            table: TABLE_UNSUBSCRIBE_CODES,
            key: "1".to_string(),
        })
    );
    assert_eq!(s.unsub_code_rows().len(), 1);
}

#[test]
fn at_unsub_code_db_03_empty_table_selects_nothing() {
    let mut s = TaskHubStore::new_in_memory();
    assert!(s.unsub_code_rows().is_empty());
    s.unsub_code_insert_row(row("9", "Il1|")).unwrap();
    assert!(s.unsub_code_delete_row("9"));
    assert!(!s.unsub_code_delete_row("9"));
    assert!(s.unsub_code_rows().is_empty());
}

#[test]
fn at_unsub_code_db_04_blank_rows_are_refused() {
    let mut s = TaskHubStore::new_in_memory();
    assert!(s.unsub_code_insert_row(row(" ", "Il1|")).is_err());
    assert!(s.unsub_code_insert_row(row("3", "")).is_err());
}
