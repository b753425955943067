//! Integration tests for configuration parsing
//!
//! The config structs live in the binary crate, so these tests parse the
//! documented toml shapes generically and check the fields a user would set.

mod probe_config {
    const MINIMAL_CONFIG: &str = r#"
[probe]
log_level = "info"

[device]
vendor_id = "0xffff"
product_id = "0xffff"

[transfer]
"#;

    const FULL_CONFIG: &str = r#"
[probe]
log_level = "debug"
usb_debug_level = 4

[device]
vendor_id = "0x0483"
product_id = "0x5740"
interfaces = [0, 1]
open_deadline_secs = 0
teardown = "fail-fast"

[transfer]
endpoint_out = 7
endpoint_in = 133
recv_timeout_ms = 2500
read_len = 64
"#;

    #[test]
    fn test_parse_minimal_config() {
        let config: toml::Value = toml::from_str(MINIMAL_CONFIG).unwrap();

        let probe = config.get("probe").unwrap();
        assert_eq!(probe.get("log_level").unwrap().as_str().unwrap(), "info");

        let device = config.get("device").unwrap();
        assert_eq!(device.get("vendor_id").unwrap().as_str().unwrap(), "0xffff");
        assert_eq!(
            device.get("product_id").unwrap().as_str().unwrap(),
            "0xffff"
        );
    }

    #[test]
    fn test_parse_full_config() {
        let config: toml::Value = toml::from_str(FULL_CONFIG).unwrap();

        let probe = config.get("probe").unwrap();
        assert_eq!(probe.get("usb_debug_level").unwrap().as_integer().unwrap(), 4);

        let device = config.get("device").unwrap();
        let interfaces: Vec<i64> = device
            .get("interfaces")
            .unwrap()
            .as_array()
            .unwrap()
            .iter()
            .map(|v| v.as_integer().unwrap())
            .collect();
        assert_eq!(interfaces, vec![0, 1]);
        assert_eq!(
            device.get("open_deadline_secs").unwrap().as_integer().unwrap(),
            0
        );
        assert_eq!(
            device.get("teardown").unwrap().as_str().unwrap(),
            "fail-fast"
        );

        let transfer = config.get("transfer").unwrap();
        assert_eq!(transfer.get("endpoint_out").unwrap().as_integer().unwrap(), 7);
        assert_eq!(transfer.get("endpoint_in").unwrap().as_integer().unwrap(), 133);
        assert_eq!(
            transfer.get("recv_timeout_ms").unwrap().as_integer().unwrap(),
            2500
        );
        assert_eq!(transfer.get("read_len").unwrap().as_integer().unwrap(), 64);
    }

    #[test]
    fn test_config_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");

        std::fs::write(&path, FULL_CONFIG).unwrap();
        let content = std::fs::read_to_string(&path).unwrap();
        let parsed: toml::Value = toml::from_str(&content).unwrap();

        assert_eq!(
            parsed["device"]["vendor_id"].as_str().unwrap(),
            "0x0483"
        );
        assert_eq!(
            parsed["probe"]["log_level"].as_str().unwrap(),
            "debug"
        );
    }

    #[test]
    fn test_malformed_config_rejected() {
        let broken = "[device\nvendor_id = ";
        assert!(toml::from_str::<toml::Value>(broken).is_err());
    }
}
