use autofix_engine::types::{ActionCategory, RiskLevel};
use autofix_engine::{AutoFixManager, ConfigError, EngineConfig, ExecutionRequest, InMemoryRecordStore, RiskMatcher};
use autofix_test_utils::{issue, recommendation, ScriptedRunner};
use std::io::Write;
use std::sync::Arc;

fn write_file(suffix: &str, body: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::Builder::new().suffix(suffix).tempfile().unwrap();
    file.write_all(body.as_bytes()).unwrap();
    file
}

const TOML: &str = r#"
[autofix]
enabled = true
dry_run = false
require_approval = false
max_risk_level = "high"
action_timeout_ms = 60000

[safety]
deny_list = ["shutdown -h"]

[[risk.rules]]
name = "queue_purge"
description = "purges a broker queue"
severity = "high"
mitigation = "Confirm consumers can replay from the source"

[risk.rules.matcher]
kind = "contains"
pattern = "purge_queue"

[[risk.rules]]
name = "scale"
description = "capacity change"
severity = "low"
score = 3

[risk.rules.matcher]
kind = "category"
category = "scale"
"#;

#[test]
fn loads_toml_by_extension() {
    let file = write_file(".toml", TOML);
    let config = EngineConfig::load(file.path()).unwrap();

    assert!(config.autofix.enabled);
    assert!(!config.autofix.dry_run);
    assert_eq!(config.autofix.max_risk_level, RiskLevel::High);
    assert_eq!(config.autofix.action_timeout_ms, 60_000);
    assert_eq!(config.safety.deny_list, vec!["shutdown -h".to_string()]);

    let rules = config.risk.rules.rules();
    assert_eq!(rules.len(), 2);
    assert_eq!(
        rules[1].matcher,
        RiskMatcher::Category {
            category: ActionCategory::Scale
        }
    );
    assert_eq!(rules[1].score(), 3);
}

#[test]
fn loads_yaml_by_extension() {
    let file = write_file(
        ".yml",
        "autofix:\n  enabled: true\nsafety:\n  deny_list: ['format c:']\n",
    );
    let config = EngineConfig::load(file.path()).unwrap();
    assert!(config.autofix.enabled);
    assert!(config.autofix.dry_run);
    assert_eq!(config.safety.deny_list, vec!["format c:".to_string()]);
}

#[test]
fn rejects_unknown_extension_and_missing_file() {
    let file = write_file(".ini", "enabled=true");
    assert!(matches!(EngineConfig::load(file.path()), Err(ConfigError::Invalid(_))));

    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("absent.toml");
    assert!(matches!(EngineConfig::load(&missing), Err(ConfigError::Io { .. })));
}

#[test]
fn rejects_zero_timeout() {
    let file = write_file(".toml", "[autofix]\naction_timeout_ms = 0\n");
    assert!(matches!(EngineConfig::load(file.path()), Err(ConfigError::Invalid(_))));
}

#[test]
fn default_config_round_trips_through_toml() {
    let text = EngineConfig::default().to_toml_string().unwrap();
    assert_eq!(EngineConfig::from_toml_str(&text).unwrap(), EngineConfig::default());
}

#[tokio::test]
async fn configured_tables_drive_the_manager() {
    let file = write_file(".toml", TOML);
    let config = EngineConfig::load(file.path()).unwrap();
    let runner = Arc::new(ScriptedRunner::new());
    let manager = AutoFixManager::from_config(&config, runner.clone(), Arc::new(InMemoryRecordStore::new()));

    let built = manager
        .build_plan(
            "rabbit",
            &[issue("q", vec![recommendation("purge", "rabbitmqctl purge_queue orders", "cleanup")])],
        )
        .unwrap();
    assert_eq!(built.risk_assessment.level, RiskLevel::High);
    assert!(built
        .risk_assessment
        .mitigations
        .iter()
        .any(|m| m.contains("replay")));
    // High is within the configured ceiling and approval is not demanded globally,
    // but High always requires approval
    assert!(built.requires_approval);

    let blocked = manager
        .build_plan("host", &[issue("h", vec![recommendation("stop", "shutdown -h now", "other")])])
        .unwrap();
    let outcome = manager
        .execute_fix_plan(&blocked, ExecutionRequest::new().approved_by("ops"))
        .await
        .unwrap();
    assert_eq!(outcome.status(), autofix_engine::types::FixStatus::ValidationFailed);
    assert_eq!(runner.call_count(), 0);
}
