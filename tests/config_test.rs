use std::env;
use std::fs;
use std::time::Duration;
use tempfile::TempDir;

fn write_config(yaml: &str) -> (TempDir, String) {
    let temp_dir = TempDir::new().unwrap();
    let config_path = temp_dir.path().join("config.yaml");
    fs::write(&config_path, yaml).unwrap();
    let path = config_path.to_string_lossy().to_string();
    (temp_dir, path)
}

/// Test loading configuration from YAML file
#[test]
fn test_load_yaml_config() {
    let yaml = r#"
profiles:
  test:
    endpoints:
      - s3-1.example.com:9000
      - s3-2.example.com:9000
    access_key: AKIATEST
    secret_key: secrettest
    region: us-west-2
    secure: true

default_profile: test

pool:
  health_check_timeout: 2
  cooldown: 300
"#;

    let (_dir, path) = write_config(yaml);
    let config = s3failover::config::load_from_yaml(&path).unwrap();

    let profile = config.profiles.get("test").unwrap();
    assert_eq!(
        profile.endpoints,
        vec!["s3-1.example.com:9000", "s3-2.example.com:9000"]
    );
    assert_eq!(profile.access_key, "AKIATEST");
    assert_eq!(profile.secret_key, "secrettest");
    assert_eq!(profile.region, "us-west-2");
    assert!(profile.secure);

    assert_eq!(config.default_profile, Some("test".to_string()));
    assert_eq!(config.pool.health_check_timeout(), Duration::from_secs(2));
    assert_eq!(config.pool.cooldown(), Duration::from_secs(300));
}

/// Test default values
#[test]
fn test_default_values() {
    let yaml = r#"
profiles:
  minimal:
    endpoints:
      - s3.test.com:9000
    access_key: key
    secret_key: secret
"#;

    let (_dir, path) = write_config(yaml);
    let config = s3failover::config::load_from_yaml(&path).unwrap();

    let profile = config.profiles.get("minimal").unwrap();
    assert_eq!(profile.region, "us-east-1");
    assert!(!profile.secure);

    assert_eq!(config.pool.health_check_timeout, 5);
    assert_eq!(config.pool.cooldown(), Duration::from_secs(600));
}

/// Test get_profile and profile selection through load_config
#[test]
fn test_profile_selection() {
    let yaml = r#"
profiles:
  prod:
    endpoints:
      - s3-prod.test.com:9000
    access_key: prod_key
    secret_key: prod_secret
  dev:
    endpoints:
      - s3-dev.test.com:9000
    access_key: dev_key
    secret_key: dev_secret

default_profile: prod
"#;

    let (_dir, path) = write_config(yaml);
    let config = s3failover::config::load_from_yaml(&path).unwrap();

    assert_eq!(config.get_profile(Some("dev")).unwrap().access_key, "dev_key");
    assert_eq!(config.get_profile(None).unwrap().access_key, "prod_key");
    assert!(config.get_profile(Some("nonexistent")).is_none());

    let config = s3failover::config::load_config(Some(path.as_str()), Some("dev")).unwrap();
    assert_eq!(config.get_profile(None).unwrap().access_key, "dev_key");

    let err = s3failover::config::load_config(Some(path.as_str()), Some("staging")).unwrap_err();
    assert!(err.to_string().contains("staging"));
}

/// Test that a profile without endpoints is rejected at load time
#[test]
fn test_empty_endpoints_rejected() {
    let yaml = r#"
profiles:
  empty:
    endpoints: []
    access_key: key
    secret_key: secret
"#;

    let (_dir, path) = write_config(yaml);
    let err = s3failover::config::load_from_yaml(&path).unwrap_err();
    assert!(err.to_string().contains("no endpoints"));
}

#[test]
fn test_missing_file() {
    let err = s3failover::config::load_from_yaml("/nonexistent/s3failover.yaml").unwrap_err();
    assert!(err.to_string().contains("Failed to read config file"));
}

/// Environment loading, run as a single test since it mutates process env
#[test]
fn test_load_env_config() {
    const VARS: &[&str] = &[
        "S3_POOL",
        "AWS_ACCESS_KEY_ID",
        "AWS_SECRET_ACCESS_KEY",
        "S3_KEY",
        "S3_SECRET",
        "AWS_REGION",
        "S3_SECURE",
        "POOL_HEALTH_CHECK_TIMEOUT",
        "POOL_COOLDOWN",
    ];
    let saved: Vec<(&str, Option<String>)> = VARS.iter().map(|k| (*k, env::var(k).ok())).collect();
    for key in VARS {
        env::remove_var(key);
    }

    // AWS standard variables
    env::set_var("AWS_ACCESS_KEY_ID", "test_key");
    env::set_var("AWS_SECRET_ACCESS_KEY", "test_secret");
    env::set_var("AWS_REGION", "eu-west-1");
    env::set_var("S3_POOL", "s3-1.test.com:9000, s3-2.test.com:9000,,s3-3.test.com:9000");
    env::set_var("S3_SECURE", "true");
    env::set_var("POOL_HEALTH_CHECK_TIMEOUT", "3");
    env::set_var("POOL_COOLDOWN", "60");

    let config = s3failover::config::load_from_env().unwrap();
    let profile = config.get_profile(None).unwrap();
    assert_eq!(
        profile.endpoints,
        vec!["s3-1.test.com:9000", "s3-2.test.com:9000", "s3-3.test.com:9000"]
    );
    assert_eq!(profile.access_key, "test_key");
    assert_eq!(profile.secret_key, "test_secret");
    assert_eq!(profile.region, "eu-west-1");
    assert!(profile.secure);
    assert_eq!(config.default_profile, Some("default".to_string()));
    assert_eq!(config.pool.health_check_timeout, 3);
    assert_eq!(config.pool.cooldown, 60);

    // Environment config only has the default profile
    let config = s3failover::config::load_config(None, Some("default")).unwrap();
    assert_eq!(config.get_profile(None).unwrap().access_key, "test_key");
    let err = s3failover::config::load_config(None, Some("prod")).unwrap_err();
    assert!(err.to_string().contains("Profile 'prod' not found in environment"));

    // Legacy credential variables, defaults for the rest
    for key in VARS {
        env::remove_var(key);
    }
    env::set_var("S3_KEY", "legacy_key");
    env::set_var("S3_SECRET", "legacy_secret");
    env::set_var("S3_POOL", "legacy-s3.test.com:9000");
    env::set_var("POOL_COOLDOWN", "not-a-number");

    let config = s3failover::config::load_from_env().unwrap();
    let profile = config.get_profile(None).unwrap();
    assert_eq!(profile.access_key, "legacy_key");
    assert_eq!(profile.secret_key, "legacy_secret");
    assert_eq!(profile.region, "us-east-1");
    assert!(!profile.secure);
    assert_eq!(config.pool.cooldown, 600);

    // No usable endpoints
    env::set_var("S3_POOL", " , ");
    assert!(s3failover::config::load_from_env().is_err());

    for (key, value) in saved {
        match value {
            Some(val) => env::set_var(key, val),
            None => env::remove_var(key),
        }
    }
}
