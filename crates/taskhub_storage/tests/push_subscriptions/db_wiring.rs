#![forbid(unsafe_code)]

use taskhub_kernel_contracts::backend::PushSubscriptionUpsert;
use taskhub_kernel_contracts::push::PushEndpoint;
use taskhub_storage::repo::PushSubscriptionRepo;
use taskhub_storage::taskhub_store::{StorageError, TaskHubStore, UpsertOutcome};

fn endpoint(path: &str) -> PushEndpoint {
    PushEndpoint::new(format!("https://push.example/send/{path}")).unwrap()
}

fn upsert(ep: &PushEndpoint, auth: &str, at_ms: u64) -> PushSubscriptionUpsert {
    PushSubscriptionUpsert {
        endpoint: ep.clone(),
        p256dh: "BOr4nd0mP256dhKey+/=".to_string(),
        auth: auth.to_string(),
        updated_at_ms: at_ms,
    }
}

#[test]
fn at_push_sub_db_01_repeat_upsert_keeps_one_row_and_refreshes_timestamp() {
    let mut s = TaskHubStore::new_in_memory();
    let ep = endpoint("device-a");

    assert_eq!(
        s.push_sub_upsert_row(upsert(&ep, "authA", 1_000)).unwrap(),
        UpsertOutcome::Inserted
    );
    assert_eq!(
        s.push_sub_upsert_row(upsert(&ep, "authA", 2_000)).unwrap(),
        UpsertOutcome::Updated
    );

    assert_eq!(s.push_sub_rows().len(), 1);
    assert_eq!(s.push_sub_row(&ep).unwrap().updated_at_ms, 2_000);
}

#[test]
fn at_push_sub_db_02_upsert_preserves_done_task_ids() {
    let mut s = TaskHubStore::new_in_memory();
    let ep = endpoint("device-b");
    s.push_sub_upsert_row(upsert(&ep, "authB", 1)).unwrap();
    s.push_sub_update_done_task_ids(&ep, vec!["t1".to_string(), "t2".to_string(), "t1".to_string()])
        .unwrap();

    s.push_sub_upsert_row(upsert(&ep, "authB2", 2)).unwrap();
    let row = s.push_sub_row(&ep).unwrap();
    assert_eq!(row.auth, "authB2");
    assert_eq!(row.done_task_ids, vec!["t1".to_string(), "t2".to_string()]);
}

#[test]
fn at_push_sub_db_03_delete_reports_presence() {
    let mut s = TaskHubStore::new_in_memory();
    let ep = endpoint("device-c");
    s.push_sub_upsert_row(upsert(&ep, "authC", 1)).unwrap();
    assert!(s.push_sub_delete_row(&ep));
    assert!(!s.push_sub_delete_row(&ep));
    assert!(s.push_sub_row(&ep).is_none());
}

#[test]
fn at_push_sub_db_04_endpoints_are_isolated() {
    let mut s = TaskHubStore::new_in_memory();
    let a = endpoint("device-a");
    let b = endpoint("device-b");
    s.push_sub_upsert_row(upsert(&a, "authA", 1)).unwrap();
    s.push_sub_upsert_row(upsert(&b, "authB", 1)).unwrap();
    s.push_sub_delete_row(&a);
    assert_eq!(s.push_sub_rows().len(), 1);
    assert_eq!(s.push_sub_row(&b).unwrap().auth, "authB");
}

#[test]
fn at_push_sub_db_05_invalid_key_material_is_rejected() {
    let mut s = TaskHubStore::new_in_memory();
    let ep = endpoint("device-d");
    let err = s
        .push_sub_upsert_row(upsert(&ep, "not base64!", 1))
        .unwrap_err();
    assert!(matches!(err, StorageError::ContractViolation(_)));
    assert!(s.push_sub_rows().is_empty());
}

#[test]
fn at_push_sub_db_06_done_task_update_requires_row() {
    let mut s = TaskHubStore::new_in_memory();
    let ep = endpoint("device-e");
    let err = s
        .push_sub_update_done_task_ids(&ep, vec!["t1".to_string()])
        .unwrap_err();
    assert!(matches!(err, StorageError::NotFound { .. }));

    s.push_sub_upsert_row(upsert(&ep, "authE", 1)).unwrap();
    assert!(s
        .push_sub_update_done_task_ids(&ep, vec![" ".to_string()])
        .is_err());
    s.push_sub_update_done_task_ids(&ep, Vec::new()).unwrap();
    assert!(s.push_sub_row(&ep).unwrap().done_task_ids.is_empty());
}
