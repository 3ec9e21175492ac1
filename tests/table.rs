use anyhow::Result;
use ironstore::testing::*;
use ironstore::*;
use std::collections::BTreeSet;

fn open(account: &FakeStorageAccount) -> Result<(Table<SampleEntity, FakeTableClient>, FakeTableClient)> {
    let client = account.table_client("catalogue");
    let table = Table::new(client.clone())?;
    Ok((table, client))
}

#[test]
fn bulk_insert_single_partition_splits_at_limit() -> Result<()> {
    let account = FakeStorageAccount::new();
    let (table, client) = open(&account)?;

    let summary = table.insert_all(&entities_in_partition("pk", 150))?;

    assert_eq!(summary, BulkSummary { batches: 2, entities: 150 });
    assert_batch_sizes(&client, &[100, 50]);
    assert_batches_respect_limits(&client);
    assert_eq!(client.len(), 150);
    Ok(())
}

#[test]
fn bulk_insert_multiple_partitions() -> Result<()> {
    let account = FakeStorageAccount::new();
    let (table, client) = open(&account)?;

    // 150 + 30 + 220 -> [100, 50] + [30] + [100, 100, 20]
    let entities = entities_across_partitions(&[("p1", 150), ("p2", 30), ("p3", 220)]);
    let summary = table.insert_all(&entities)?;

    assert_eq!(summary.batches, 6);
    assert_eq!(summary.entities, 400);
    assert_batch_sizes(&client, &[100, 50, 30, 100, 100, 20]);
    assert_batches_respect_limits(&client);
    assert_eq!(table.query_all()?.len(), 400);
    assert_eq!(table.query_partition("p2")?.len(), 30);
    Ok(())
}

#[test]
fn interleaved_input_is_grouped_per_partition() -> Result<()> {
    let account = FakeStorageAccount::new();
    let (table, client) = open(&account)?;

    let entities = interleaved_entities(&[("a", 120), ("b", 5)]);
    table.insert_all(&entities)?;

    assert_batch_sizes(&client, &[100, 20, 5]);
    assert_batches_respect_limits(&client);

    // Within a partition the input order is preserved across chunks
    let calls = client.batch_calls();
    let a_rows: Vec<String> = calls
        .iter()
        .filter(|b| b.partition_keys.contains("a"))
        .flat_map(|b| b.row_keys.clone())
        .collect();
    let expected: Vec<String> = (0..120).map(|i| format!("row-{i:04}")).collect();
    assert_eq!(a_rows, expected);
    Ok(())
}

#[test]
fn every_entity_lands_in_exactly_one_batch() -> Result<()> {
    let account = FakeStorageAccount::new();
    let (table, client) = open(&account)?;

    let entities = interleaved_entities(&[("x", 333), ("y", 1), ("z", 100)]);
    table.insert_all(&entities)?;

    let sent: Vec<(String, String)> = client
        .batch_calls()
        .iter()
        .flat_map(|b| {
            let pk = b.partition_keys.iter().next().cloned().unwrap_or_default();
            b.row_keys.iter().map(move |rk| (pk.clone(), rk.clone()))
        })
        .collect();
    let unique: BTreeSet<_> = sent.iter().cloned().collect();
    assert_eq!(sent.len(), entities.len());
    assert_eq!(unique.len(), entities.len());
    Ok(())
}

#[test]
fn empty_bulk_is_rejected_without_backend_call() -> Result<()> {
    let account = FakeStorageAccount::new();
    let (table, client) = open(&account)?;

    let result = table.insert_all(&[]);
    assert_error_kind(&result, ErrorKind::InvalidInput);
    assert!(client.batch_calls().is_empty());
    Ok(())
}

#[test]
fn bad_key_fails_before_any_batch_is_sent() -> Result<()> {
    let account = FakeStorageAccount::new();
    let (table, client) = open(&account)?;

    let mut entities = entities_in_partition("pk", 250);
    entities[240].row_key = "has/slash".to_string();

    let result = table.insert_all(&entities);
    assert_error_kind(&result, ErrorKind::InvalidInput);
    assert!(client.batch_calls().is_empty());
    assert!(client.is_empty());
    Ok(())
}

#[test]
fn failed_batch_leaves_earlier_batches_committed() -> Result<()> {
    let account = FakeStorageAccount::new();
    let (table, client) = open(&account)?;
    client.fail_batch_call(1, StorageError::new(ErrorKind::ServiceUnavailable, "server busy"));

    let result = table.insert_all(&entities_in_partition("pk", 250));

    let err = result.expect_err("second batch was set to fail");
    assert_eq!(err.kind, ErrorKind::ServiceUnavailable);
    assert_eq!(err.message, "server busy");
    // First chunk applied, second rejected, third never attempted
    assert_eq!(client.len(), 100);
    let calls = client.batch_calls();
    assert_eq!(calls.len(), 2);
    assert!(calls[0].succeeded);
    assert!(!calls[1].succeeded);
    Ok(())
}

#[test]
fn failing_entity_rolls_back_its_whole_batch() -> Result<()> {
    let account = FakeStorageAccount::new();
    let (table, client) = open(&account)?;
    table.insert(&SampleEntity::new("pk", "row-0050", "already here", 1))?;

    let result = table.insert_all(&entities_in_partition("pk", 80));

    assert_error_kind(&result, ErrorKind::AlreadyExists);
    assert_eq!(client.len(), 1);
    Ok(())
}

#[test]
fn execute_batch_rejects_mixed_partitions_without_backend_call() -> Result<()> {
    let account = FakeStorageAccount::new();
    let (table, client) = open(&account)?;

    let mixed = vec![
        SampleEntity::new("a", "1", "one", 1),
        SampleEntity::new("b", "1", "one", 1),
    ];
    assert_error_kind(&table.execute_batch(TableOperation::Insert, &mixed), ErrorKind::InvalidInput);

    let oversized = entities_in_partition("a", MAX_BATCH_SIZE + 1);
    assert_error_kind(
        &table.execute_batch(TableOperation::Insert, &oversized),
        ErrorKind::InvalidInput,
    );

    assert_error_kind(&table.execute_batch(TableOperation::Insert, &[]), ErrorKind::InvalidInput);
    assert!(client.batch_calls().is_empty());

    table.execute_batch(TableOperation::Insert, &entities_in_partition("a", MAX_BATCH_SIZE))?;
    assert_batch_sizes(&client, &[MAX_BATCH_SIZE]);
    Ok(())
}

#[test]
fn merge_keeps_unlisted_properties_and_replace_does_not() -> Result<()> {
    #[derive(Debug, serde::Serialize, serde::Deserialize)]
    struct PriceOnly {
        partition_key: String,
        row_key: String,
        price: i64,
    }
    impl TableEntity for PriceOnly {
        fn partition_key(&self) -> &str {
            &self.partition_key
        }
        fn row_key(&self) -> &str {
            &self.row_key
        }
    }

    let account = FakeStorageAccount::new();
    let full = Table::<SampleEntity, _>::new(account.table_client("catalogue"))?;
    let partial = Table::<PriceOnly, _>::new(account.table_client("catalogue"))?;

    full.insert(&SampleEntity::new("eu", "1", "widget", 10))?;
    let update = PriceOnly {
        partition_key: "eu".to_string(),
        row_key: "1".to_string(),
        price: 12,
    };

    partial.insert_or_merge(&update)?;
    let merged = full.retrieve("eu", "1")?.expect("entity exists");
    assert_eq!(merged.name, "widget");
    assert_eq!(merged.price, 12);

    partial.insert_or_replace(&update)?;
    // The stored entity no longer has a name, so it no longer decodes as SampleEntity
    assert_error_kind(&full.retrieve("eu", "1"), ErrorKind::Serialization);
    assert_eq!(partial.retrieve("eu", "1")?.map(|p| p.price), Some(12));
    Ok(())
}

#[test]
fn single_entity_operations() -> Result<()> {
    let account = FakeStorageAccount::new();
    let (table, client) = open(&account)?;
    let entity = SampleEntity::new("eu", "1", "widget", 10);

    table.insert(&entity)?;
    assert_error_kind(&table.insert(&entity), ErrorKind::AlreadyExists);

    table.delete(&entity)?;
    assert_eq!(table.retrieve("eu", "1")?, None);
    assert_error_kind(&table.delete(&entity), ErrorKind::NotFound);
    assert_eq!(client.single_calls(), 4);
    Ok(())
}

#[test]
fn bulk_delete_removes_everything() -> Result<()> {
    let account = FakeStorageAccount::new();
    let (table, client) = open(&account)?;
    let entities = entities_across_partitions(&[("a", 130), ("b", 70)]);

    table.insert_or_replace_all(&entities)?;
    let summary = table.delete_all(&entities)?;

    assert_eq!(summary.batches, 3);
    assert!(client.is_empty());
    Ok(())
}

#[test]
fn query_take_limits_results_in_key_order() -> Result<()> {
    let account = FakeStorageAccount::new();
    let (table, _client) = open(&account)?;
    table.insert_all(&entities_across_partitions(&[("b", 5), ("a", 5)]))?;

    let first = table.query(&TableQuery::new().take(3))?;
    let keys: Vec<(String, String)> = first
        .into_iter()
        .map(|e| (e.partition_key, e.row_key))
        .collect();
    assert_eq!(
        keys,
        vec![
            ("a".to_string(), "row-0000".to_string()),
            ("a".to_string(), "row-0001".to_string()),
            ("a".to_string(), "row-0002".to_string()),
        ]
    );
    Ok(())
}

#[test]
fn opening_installs_retry_policy_and_validates_name() -> Result<()> {
    let account = FakeStorageAccount::new();
    let (_table, client) = open(&account)?;
    let policy = client.retry_policy().expect("policy installed on open");
    assert_eq!(policy.max_attempts(), 5);

    let bad = Table::<SampleEntity, _>::new(account.table_client("9lives"));
    assert!(matches!(bad, Err(ref e) if e.kind == ErrorKind::InvalidInput));
    Ok(())
}

#[test]
fn default_table_name_follows_type() -> Result<()> {
    let account = FakeStorageAccount::new();
    let table = Table::<SampleEntity, _>::new(account.table_client_for::<SampleEntity>())?;
    assert_eq!(table.name(), "sampleentity");
    Ok(())
}
