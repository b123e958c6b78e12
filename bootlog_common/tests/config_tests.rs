//! Channel configuration loading tests.
//!
//! Defaults for omitted sections, unknown field rejection, size bounds.

use bootlog_common::config::{ChannelConfig, ConfigError, ConfigLoader};
use bootlog_common::consts::DEFAULT_REGION_PATH;
use bootlog_common::shm::consts::MIN_REGION_SIZE;
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

fn load(content: &str) -> Result<ChannelConfig, ConfigError> {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("bootlog.toml");
    fs::write(&path, content).unwrap();
    ChannelConfig::load(&path)
}

#[test]
fn empty_file_uses_defaults() {
    let config = load("").unwrap();
    assert_eq!(config.shared.service_name, "bootlog");
    assert_eq!(config.region.path, PathBuf::from(DEFAULT_REGION_PATH));
    assert_eq!(config.region.size, MIN_REGION_SIZE);
    assert!(!config.region.locked);
    assert!(config.validate().is_ok());
}

#[test]
fn partial_region_section_keeps_other_defaults() {
    let config = load("[region]\nsize = 262144\n").unwrap();
    assert_eq!(config.region.size, 262144);
    assert_eq!(config.region.path, PathBuf::from(DEFAULT_REGION_PATH));
}

#[test]
fn unknown_region_field_rejected() {
    let result = load("[region]\nsize = 65536\nwrap_around = true\n");
    assert!(matches!(result, Err(ConfigError::ParseError(_))));
}

#[test]
fn unknown_hdw_port_field_rejected() {
    let result = load("[hdw_port]\nbaud = 115200\n");
    assert!(matches!(result, Err(ConfigError::ParseError(_))));
}

// Sizes past 4 GiB only exist on 64-bit targets.
#[cfg(target_pointer_width = "64")]
#[test]
fn payload_limit_excludes_control_block() {
    let mut config = ChannelConfig::default();

    config.region.size = u32::MAX as usize + 64;
    assert!(config.validate().is_ok());

    config.region.size = u32::MAX as usize + 65;
    assert!(matches!(
        config.validate(),
        Err(ConfigError::ValidationError(_))
    ));
}
