use forge_core::{ForgeConfig, MAX_CAPABILITIES};
use std::fs;
use std::path::PathBuf;

#[test]
fn example_config_parses_and_validates() {
    let path = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../forge.example.toml");
    let contents = fs::read_to_string(&path).expect("read forge.example.toml");

    let config = ForgeConfig::from_toml_str(&contents).expect("parse example config");
    assert_eq!(config.pipeline.max_capabilities, MAX_CAPABILITIES);
    assert_eq!(config.provider.analysis_model(), config.provider.model);
    assert!(!config.logging.json);
}
