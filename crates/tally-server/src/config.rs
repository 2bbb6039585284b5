use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind_addr: String,
    pub db_path: PathBuf,
    pub max_body_bytes: usize,
    /// Seed a default admin account (username `admin`) when the users
    /// table is empty, so a fresh install can log in at all.
    pub seed_default_admin: bool,
    pub default_admin_pin: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:8088".to_string(),
            db_path: PathBuf::from("data/tally.db"),
            max_body_bytes: 256 * 1024,
            seed_default_admin: true,
            default_admin_pin: "1234".to_string(),
        }
    }
}
