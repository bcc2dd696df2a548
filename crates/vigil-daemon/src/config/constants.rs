pub const DEFAULT_API_PORT: u16 = 8470;
pub const DEFAULT_CONFIG_FILE: &str = "vigil.toml";
pub const DEFAULT_STORE_DIR: &str = "store";
pub const PID_FILE: &str = "vigil.pid";

/// Upper bound for exponential restart cooldowns.
pub const MAX_RESTART_COOLDOWN_SECS: u64 = 60;
