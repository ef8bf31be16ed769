use ocr_relay::config::Config;

#[test]
fn parse_example_config() {
    let raw = include_str!("../ocr-relay.example.toml");
    let cfg: Config = toml::from_str(raw).expect("parse TOML");
    assert_eq!(cfg.poller.interval_ms, 500);
    assert_eq!(cfg.poller.idle_ticks, 20);
    assert!(!cfg.handoff.endpoint.is_empty());
    assert!(!cfg.pipeline.extensions.is_empty());
}

#[test]
fn defaults_cover_missing_sections() {
    let cfg: Config = toml::from_str("[pipeline]\nwatch_dir = \"/in\"\noutput_dir = \"/out\"\nextensions = [\".tif\"]\nprofile = \"\"\n")
        .expect("parse TOML");
    assert_eq!(cfg.pipeline.watch_dir, "/in");
    assert_eq!(cfg.poller.failure_phrases.len(), 3);
    assert_eq!(cfg.handoff.endpoint, "ocr-relay-handoff");
}

#[test]
fn profile_path_is_none_when_empty() {
    let cfg = Config::default();
    assert!(cfg.pipeline.profile_path().is_none());
}
