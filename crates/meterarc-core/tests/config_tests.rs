use meterarc_core::{parse_range, Config, StoreMode};

#[test]
fn defaults_expand_paths() {
    let cfg = Config::load(None).expect("load default config");
    assert!(
        !cfg.store.path.to_string_lossy().contains('~'),
        "store path should be expanded"
    );
}

#[test]
fn parse_range_supports_shortcuts() {
    let dur = parse_range("1h").expect("parse duration");
    assert_eq!(dur.whole_hours(), 1);
    let dur2 = parse_range("30s").expect("parse duration");
    assert_eq!(dur2.whole_seconds(), 30);
}

#[test]
fn default_synthetic_universe_builds() {
    let cfg = Config::default();
    assert_eq!(cfg.store.mode, StoreMode::Synthetic);
    let source = cfg.synthetic.build().expect("build generator");
    assert_eq!(source.groups().len(), 1);
    assert!(source.span().min < source.span().max);
}

#[test]
fn synthetic_section_parses_from_toml() {
    let cfg: Config = toml::from_str(
        r#"
        [store]
        mode = "synthetic"

        [synthetic]
        seed = 5
        start = "2024-06-01T00:00:00Z"
        end = "2024-06-02T00:00:00Z"
        groups = [{ id = "b6f9f6a0-5c72-4d66-9e0c-3f1a2d4c8e10", name = "Lab" }]
        quantities = ["U1"]
        "#,
    )
    .expect("parse config");
    assert_eq!(cfg.synthetic.seed, 5);
    let source = cfg.synthetic.build().expect("build generator");
    assert_eq!(source.groups()[0].name, "Lab");
}
