use super::*;

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            vendor_id: 0x2E3C,
            product_id: 0x5558,
            interface: 3,
            endpoint_out: 0x03,
            endpoint_in: 0x83,
            read_timeout_ms: 1000,
            max_consecutive_failures: 5,
            reconnect_interval_ms: 2000,
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            charge_threshold_w: 1.0,
            debounce_s: 10.0,
            temperature_alpha: 0.1,
            sample_interval_ms: 10,
            protocol_vote_window: 5,
        }
    }
}

impl Default for CountersConfig {
    fn default() -> Self {
        Self {
            sysfs_root: PathBuf::from("/sys/class/net"),
            interfaces: Vec::new(),
            refresh_interval_ms: 1000,
        }
    }
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            charge_s: 15.0,
            ramp_s: 5.0,
            idle_s: 10.0,
            voltage_v: 5.0,
            current_a: 2.0,
            realtime: true,
            repeat: false,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "INFO".to_string(),
            file: "/tmp/magbank.log".to_string(),
            backup_count: 5,
            console_output: true,
            json_format: false,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            device: DeviceConfig::default(),
            session: SessionConfig::default(),
            counters: CountersConfig::default(),
            simulation: SimulationConfig::default(),
            logging: LoggingConfig::default(),
            refresh_interval_ms: 1000,
            simulate: false,
        }
    }
}
