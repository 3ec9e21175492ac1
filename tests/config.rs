use anyhow::Result;
use ironstore::testing::TempConfigFile;
use ironstore::*;
use std::time::Duration;

#[test]
fn defaults() {
    let config = StorageConfig::default();
    assert_eq!(config.visibility_timeout(), Duration::from_secs(30));
    assert_eq!(config.retry.mode, RetryMode::Exponential);
    assert_eq!(config.retry.delta_backoff_ms, 1000);
    assert_eq!(config.retry.max_attempts, 5);
    assert_eq!(config.object_content_type, "application/json");
}

#[test]
fn json_file_with_partial_settings() -> Result<()> {
    let file = TempConfigFile::from_json(r#"{ "visibility_timeout_secs": 120, "retry": { "mode": "none" } }"#)?;

    let config = StorageConfig::from_json_file(file.path())?;

    assert_eq!(config.visibility_timeout(), Duration::from_secs(120));
    assert_eq!(config.retry.mode, RetryMode::None);
    assert_eq!(config.retry.max_attempts, 5);
    assert_eq!(config.retry.build().max_attempts(), 1);
    Ok(())
}

#[test]
fn json_file_round_trips_a_config() -> Result<()> {
    let config = StorageConfig {
        visibility_timeout_secs: 45,
        retry: RetrySettings {
            mode: RetryMode::Linear,
            delta_backoff_ms: 250,
            max_attempts: 3,
        },
        object_content_type: "text/plain".to_string(),
    };
    let file = TempConfigFile::from_config(&config)?;

    assert_eq!(StorageConfig::from_json_file(file.path())?, config);
    Ok(())
}

#[test]
fn json_file_errors_carry_context() -> Result<()> {
    let file = TempConfigFile::from_json("{ not json")?;
    let err = StorageConfig::from_json_file(file.path()).expect_err("invalid json");
    assert!(format!("{err:#}").contains(&file.path().display().to_string()));

    assert!(StorageConfig::from_json_file("/definitely/not/here.json").is_err());
    Ok(())
}

fn vars(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
    pairs
        .iter()
        .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
        .collect()
}

#[test]
fn from_vars_reads_prefixed_settings() -> Result<()> {
    let config = StorageConfig::from_vars(
        vars(&[
            ("APP_VISIBILITY_TIMEOUT_SECS", "75"),
            ("APP_RETRY_MODE", "linear"),
            ("APP_RETRY_DELTA_MS", "500"),
            ("OTHER_RETRY_MAX_ATTEMPTS", "9"),
        ]),
        "APP_",
    )?;

    assert_eq!(config.visibility_timeout_secs, 75);
    assert_eq!(config.retry.mode, RetryMode::Linear);
    assert_eq!(config.retry.delta_backoff_ms, 500);
    assert_eq!(config.retry.max_attempts, 5);
    Ok(())
}

#[test]
fn from_vars_rejects_bad_values() {
    let result = StorageConfig::from_vars(vars(&[("APP_RETRY_MAX_ATTEMPTS", "many")]), "APP_");
    let err = result.expect_err("unparsable attempt count");
    assert!(format!("{err:#}").contains("RETRY_MAX_ATTEMPTS=many"));
}

#[test]
fn from_env_without_matching_variables_uses_defaults() -> Result<()> {
    let config = StorageConfig::from_env("IRONSTORE_UNSET_PREFIX_7F3A_")?;
    assert_eq!(config, StorageConfig::default());
    Ok(())
}

#[test]
fn config_drives_wrapper_behaviour() -> Result<()> {
    let config = StorageConfig {
        visibility_timeout_secs: 7,
        retry: RetrySettings {
            mode: RetryMode::Linear,
            delta_backoff_ms: 100,
            max_attempts: 2,
        },
        ..StorageConfig::default()
    };
    let account = FakeStorageAccount::new();
    let client = account.queue_client("configured");
    let queue: Queue<String, _> = Queue::with_config(client.clone(), &config)?;

    assert_eq!(queue.visibility_timeout(), Duration::from_secs(7));
    let policy = client.retry_policy().expect("policy installed on open");
    assert_eq!(policy.max_attempts(), 2);

    queue.set_retry_policy(std::sync::Arc::new(NoRetry));
    assert_eq!(client.retry_policy().map(|p| p.max_attempts()), Some(1));
    Ok(())
}
