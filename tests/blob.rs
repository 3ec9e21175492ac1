use anyhow::Result;
use ironstore::testing::*;
use ironstore::*;

fn open(account: &FakeStorageAccount) -> Result<(ObjectContainer<SampleDocument, FakeBlobClient>, FakeBlobClient)> {
    let client = account.blob_client("documents");
    let container = ObjectContainer::new(client.clone())?;
    Ok((container, client))
}

#[test]
fn add_or_replace_then_get() -> Result<()> {
    let account = FakeStorageAccount::new();
    let (container, client) = open(&account)?;
    let doc = SampleDocument::new("Plan", "Ship it").with_tag("q3");

    container.add_or_replace(&doc, "plan")?;
    container.add_or_replace(&doc, "plan")?;

    assert_eq!(container.get("plan")?, Some(doc));
    assert_eq!(container.list_names()?, vec!["plan".to_string()]);
    assert_eq!(client.content_type_of("plan").as_deref(), Some("application/json"));
    Ok(())
}

#[test]
fn get_missing_is_none() -> Result<()> {
    let account = FakeStorageAccount::new();
    let (container, _client) = open(&account)?;
    assert_eq!(container.get("nothing")?, None);
    assert!(!container.exists("nothing")?);
    Ok(())
}

#[test]
fn add_refuses_to_overwrite() -> Result<()> {
    let account = FakeStorageAccount::new();
    let (container, _client) = open(&account)?;
    let first = SampleDocument::new("First", "one");

    container.add(&first, "doc")?;
    let result = container.add(&SampleDocument::new("Second", "two"), "doc");

    assert_error_kind(&result, ErrorKind::AlreadyExists);
    assert_eq!(container.get("doc")?, Some(first));
    Ok(())
}

#[test]
fn slashes_are_stripped_from_names() -> Result<()> {
    let account = FakeStorageAccount::new();
    let (container, _client) = open(&account)?;

    container.add_or_replace(&SampleDocument::new("Nested", "a/b"), "a/b")?;

    assert!(container.exists("ab")?);
    assert!(container.exists("a/b")?);
    assert_eq!(container.list_names()?, vec!["ab".to_string()]);

    // "a/b" and "ab" address the same object
    container.add_or_replace(&SampleDocument::new("Flat", "ab"), "ab")?;
    assert_eq!(container.get("a/b")?.map(|d| d.title), Some("Flat".to_string()));
    assert_error_kind(
        &container.add(&SampleDocument::new("Again", ""), "/a/b/"),
        ErrorKind::AlreadyExists,
    );
    Ok(())
}

#[test]
fn delete_is_idempotent() -> Result<()> {
    let account = FakeStorageAccount::new();
    let (container, _client) = open(&account)?;

    container.add_or_replace(&SampleDocument::new("Temp", ""), "tmp")?;
    container.delete("tmp")?;
    container.delete("tmp")?;

    assert!(!container.exists("tmp")?);
    Ok(())
}

#[test]
fn size_and_last_modified() -> Result<()> {
    let account = FakeStorageAccount::new();
    let (container, _client) = open(&account)?;
    let doc = SampleDocument::new("Sized", "payload");
    let before = chrono::Utc::now();

    container.add_or_replace(&doc, "sized")?;

    let expected = serde_json::to_string(&doc)?.len() as u64;
    assert_eq!(container.size("sized")?, expected);
    assert!(container.last_modified("sized")? >= before);
    Ok(())
}

#[test]
fn size_and_last_modified_of_missing_blob() -> Result<()> {
    let account = FakeStorageAccount::new();
    let (container, _client) = open(&account)?;

    assert_error_kind(&container.size("ghost"), ErrorKind::NotFound);
    let result = container.last_modified("ghost");
    assert_error_kind(&result, ErrorKind::NotFound);
    assert!(result.unwrap_err().message.contains("ghost"));
    Ok(())
}

#[test]
fn undecodable_blob_is_a_serialization_error() -> Result<()> {
    let account = FakeStorageAccount::new();
    let (container, client) = open(&account)?;

    client.upload("broken", b"{not json", "application/json")?;
    assert_error_kind(&container.get("broken"), ErrorKind::Serialization);

    client.upload("binary", &[0xff, 0xfe], "application/octet-stream")?;
    let result = container.get("bin/ary");
    assert_error_kind(&result, ErrorKind::Serialization);
    let message = result.unwrap_err().message;
    assert!(message.contains("'binary'"), "unexpected message: {message}");
    Ok(())
}

#[test]
fn configured_content_type_is_recorded() -> Result<()> {
    let account = FakeStorageAccount::new();
    let client = account.blob_client("typed");
    let config = StorageConfig {
        object_content_type: "application/vnd.report+json".to_string(),
        ..StorageConfig::default()
    };
    let container: ObjectContainer<SampleDocument, _> =
        ObjectContainer::with_config(client.clone(), &config)?;

    container.add_or_replace(&SampleDocument::new("T", ""), "t")?;
    assert_eq!(
        client.content_type_of("t").as_deref(),
        Some("application/vnd.report+json")
    );
    Ok(())
}

#[test]
fn container_must_exist_before_use() {
    let account = FakeStorageAccount::new();
    let raw = account.blob_client("unopened");
    assert_error_kind(&raw.exists("anything"), ErrorKind::NotFound);
}

#[test]
fn mixed_case_container_name_is_lower_cased() -> Result<()> {
    let account = FakeStorageAccount::new();
    let container: ObjectContainer<SampleDocument, _> =
        ObjectContainer::new(account.blob_client("Reports"))?;
    assert_eq!(container.name(), "reports");
    assert_eq!(resource_name("Reports"), container.name());
    Ok(())
}
