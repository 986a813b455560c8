use magbank::config::Config;
use std::fs;

#[test]
fn save_and_load_yaml_roundtrip() {
    let tmp_dir = tempfile::tempdir().unwrap();
    let path = tmp_dir.path().join("config.yaml");

    let mut cfg = Config::default();
    cfg.session.debounce_s = 30.0;
    cfg.counters.interfaces = vec!["eth0".to_string(), "usb0".to_string()];
    cfg.logging.file = path.with_extension("log").to_string_lossy().to_string();

    cfg.save_to_file(&path).unwrap();
    let loaded = Config::from_file(&path).unwrap();

    assert!((loaded.session.debounce_s - 30.0).abs() < f64::EPSILON);
    assert_eq!(loaded.counters.interfaces, cfg.counters.interfaces);
    assert_eq!(loaded.logging.file, cfg.logging.file);
}

#[test]
fn config_validation_errors() {
    let mut cfg = Config::default();

    cfg.session.charge_threshold_w = 0.0;
    assert!(cfg.validate().is_err());

    cfg = Config::default();
    cfg.session.temperature_alpha = 1.5;
    assert!(cfg.validate().is_err());

    cfg = Config::default();
    cfg.session.sample_interval_ms = 0;
    assert!(cfg.validate().is_err());

    cfg = Config::default();
    cfg.session.protocol_vote_window = 0;
    assert!(cfg.validate().is_err());

    cfg = Config::default();
    cfg.device.read_timeout_ms = 0;
    assert!(cfg.validate().is_err());

    cfg = Config::default();
    cfg.refresh_interval_ms = 0;
    assert!(cfg.validate().is_err());
}

#[test]
fn device_section_accepts_hex_ids() {
    let yaml = "device:\n  vendor_id: 0x2E3C\n  product_id: 0x5558\n  read_timeout_ms: 250\n";
    let cfg: Config = serde_yaml::from_str(yaml).unwrap();
    assert_eq!(cfg.device.vendor_id, 0x2E3C);
    assert_eq!(cfg.device.read_timeout_ms, 250);
    assert_eq!(cfg.device.endpoint_in, 0x83);
}

#[test]
fn from_file_with_invalid_yaml_fails() {
    let tmp = tempfile::NamedTempFile::new().unwrap();
    fs::write(tmp.path(), b"bad: [unclosed").unwrap();
    let err = Config::from_file(tmp.path()).unwrap_err();
    let msg = format!("{}", err);
    assert!(msg.contains("Serialization error"));
}

#[test]
fn from_missing_file_is_io_error() {
    let tmp_dir = tempfile::tempdir().unwrap();
    let err = Config::from_file(tmp_dir.path().join("absent.yaml")).unwrap_err();
    assert!(format!("{}", err).contains("I/O error"));
}
