//! sidewatch.toml 통합 설정 테스트
//!
//! - sidewatch.toml.example 파싱 테스트
//! - 파일 로딩 + 환경변수 우선순위 테스트
//! - 잘못된 형식 에러 테스트

use std::io::Write;

use serial_test::serial;
use sidewatch_core::config::SidewatchConfig;
use sidewatch_core::error::{ConfigError, SidewatchError};

// =============================================================================
// sidewatch.toml.example 파싱 테스트
// =============================================================================

#[test]
fn example_config_parses_and_validates() {
    let content = include_str!("../../../sidewatch.toml.example");
    let config = SidewatchConfig::parse(content).expect("example config should parse");
    config
        .validate()
        .expect("example config should pass validation");

    assert_eq!(config.upstream.port, 32767);
    assert_eq!(config.general.test_rule, "Test rule");
    assert!(config.sinks.stdout.enabled);
    assert!(!config.sinks.webhook.is_enabled());
}

#[test]
fn example_config_has_enrichment_sections() {
    let content = include_str!("../../../sidewatch.toml.example");
    let config = SidewatchConfig::parse(content).expect("should parse");

    assert_eq!(config.enrichment.custom_fields["Environment"], "production");
    assert!(
        config
            .enrichment
            .templated_fields
            .contains_key("Workload")
    );
}

// =============================================================================
// 파일 로딩 테스트
// =============================================================================

#[tokio::test]
#[serial]
async fn load_applies_env_over_file() {
    // Given: 파일에는 relay 주소가 설정되어 있음
    let mut file = tempfile::NamedTempFile::new().expect("temp file");
    writeln!(
        file,
        "[upstream]\naddress = \"10.0.0.1\"\nmax_retries = 3\n"
    )
    .expect("write config");

    // When: 환경변수로 주소를 덮어씀
    // SAFETY: serial 테스트에서만 환경변수를 조작합니다.
    unsafe { std::env::set_var("SIDEWATCH_UPSTREAM_ADDRESS", "10.0.0.99") };
    let loaded = SidewatchConfig::load(file.path()).await;
    unsafe { std::env::remove_var("SIDEWATCH_UPSTREAM_ADDRESS") };

    // Then: 환경변수가 우선하고 나머지 파일 값은 유지됨
    let config = loaded.expect("config should load");
    assert_eq!(config.upstream.address, "10.0.0.99");
    assert_eq!(config.upstream.max_retries, 3);
}

#[tokio::test]
#[serial]
async fn load_rejects_invalid_values_from_file() {
    let mut file = tempfile::NamedTempFile::new().expect("temp file");
    writeln!(file, "[general]\nlog_format = \"xml\"\n").expect("write config");

    let err = SidewatchConfig::load(file.path())
        .await
        .expect_err("xml log format should be rejected");
    assert!(matches!(
        err,
        SidewatchError::Config(ConfigError::InvalidValue { .. })
    ));
}
