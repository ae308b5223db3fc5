// Configuration module tests

use pixelrelay::config::*;
use std::io::Write;
use tempfile::NamedTempFile;

#[test]
fn test_full_yaml_config() {
    let yaml = r#"
server:
  address: "127.0.0.1"
  port: 9000
transform:
  allow_list: ["example.com"]
  forward_headers: [authorization]
  strict_pipeline: true
  fetch_timeout_secs: 5
  max_source_bytes: 1048576
  max_source_pixels: 4000000
  cache_max_age_secs: 60
cache:
  enabled: false
  max_entries: 10
  ttl_seconds: 30
  max_item_bytes: 2048
logging:
  format: pretty
"#;
    let config = Config::from_yaml_with_env(yaml).unwrap();
    config.validate().unwrap();

    assert_eq!(config.server.listen_addr(), "127.0.0.1:9000");
    assert_eq!(config.transform.allow_list, vec!["example.com"]);
    assert_eq!(config.transform.forward_headers, vec!["authorization"]);
    assert!(config.transform.strict_pipeline);
    assert_eq!(config.transform.fetch_timeout_secs, 5);
    assert_eq!(config.transform.max_source_bytes, 1_048_576);
    assert_eq!(config.transform.max_source_pixels, 4_000_000);
    assert_eq!(config.transform.cache_max_age_secs, 60);
    assert!(!config.cache.enabled);
    assert_eq!(config.cache.max_entries, 10);
    assert_eq!(config.logging.format, LogFormat::Pretty);
}

#[test]
fn test_partial_yaml_uses_defaults() {
    let config = Config::from_yaml_with_env("server:\n  port: 8080\n").unwrap();
    assert_eq!(config.server.port, 8080);
    assert_eq!(config.server.address, "0.0.0.0");
    assert_eq!(
        config.transform.forward_headers,
        vec!["authorization", "cookie", "referer", "user-agent"]
    );
    assert!(!config.transform.strict_pipeline);
    assert_eq!(config.transform.cache_max_age_secs, 15_552_000);
    assert!(config.cache.enabled);
    assert_eq!(config.logging.format, LogFormat::Json);
}

#[test]
fn test_validation_rejects_zero_port() {
    let config = Config::from_yaml_with_env("server:\n  port: 0\n").unwrap();
    assert!(config.validate().is_err());
}

#[test]
fn test_validation_rejects_zero_limits() {
    let config = Config::from_yaml_with_env("transform:\n  max_source_bytes: 0\n").unwrap();
    assert!(config.validate().is_err());

    let config = Config::from_yaml_with_env("transform:\n  fetch_timeout_secs: 0\n").unwrap();
    assert!(config.validate().is_err());
}

#[test]
fn test_invalid_yaml_is_an_error() {
    assert!(Config::from_yaml_with_env("server: [not, a, map").is_err());
    assert!(Config::from_yaml_with_env("logging:\n  format: xml\n").is_err());
}

#[test]
fn test_load_from_file() {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(b"server:\n  port: 8181\ntransform:\n  allow_list: [\"cdn.test\"]\n")
        .unwrap();
    file.flush().unwrap();

    let mut config = Config::from_file(file.path()).unwrap();
    assert_eq!(config.server.port, 8181);

    config.apply_allow_list_override(Some(" a.test , ,b.test"));
    assert_eq!(config.transform.allow_list, vec!["a.test", "b.test"]);
}

#[test]
fn test_missing_file_is_an_error() {
    let err = Config::from_file("/nonexistent/pixelrelay.yaml").unwrap_err();
    assert!(err.contains("Failed to read config file"));
}

#[test]
fn test_blank_allow_list_entry_from_env_is_dropped() {
    std::env::set_var("PIXELRELAY_TEST_EMPTY_CDN_HOST", "");
    let config = Config::from_yaml_with_env(
        "transform:\n  allow_list: [\"${PIXELRELAY_TEST_EMPTY_CDN_HOST}\", \" cdn.test \"]\n",
    )
    .unwrap();
    config.validate().unwrap();

    assert_eq!(config.transform.allow_list, vec!["cdn.test"]);
    let list = pixelrelay::transform::AllowList::new(config.transform.allow_list.clone());
    let evil = reqwest::Url::parse("https://evil.attacker.net/a.png").unwrap();
    assert!(!list.is_allowed(&evil));
}

#[test]
fn test_allow_list_of_only_blank_entries_is_an_error() {
    std::env::set_var("PIXELRELAY_TEST_UNSET_CDN_HOST", "");
    let err = Config::from_yaml_with_env(
        "transform:\n  allow_list: [\"${PIXELRELAY_TEST_UNSET_CDN_HOST}\"]\n",
    )
    .unwrap_err();
    assert!(err.contains("allow_list"));
}
