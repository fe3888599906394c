use std::env;

pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 5 * 1024 * 1024;

#[derive(Clone, Debug, PartialEq)]
pub enum StorageConfig {
    Local {
        upload_dir: String,
    },
    R2 {
        bucket: String,
        account_id: String,
        access_key: String,
        secret_key: String,
    },
}

#[derive(Clone, Debug)]
pub struct Config {
    pub database_url: String,
    pub server_host: String,
    pub server_port: u16,
    pub jwt_secret: String,
    pub client_url: String,
    pub storage: StorageConfig,
    pub max_upload_bytes: usize,
    pub default_page_size: u32,
    pub max_page_size: u32,
    pub enable_university_seed: bool,
    pub rate_limit_enabled: bool,
    pub rate_limit_requests: u32,
    pub rate_limit_window_secs: u64,
}

fn parse_or<T: std::str::FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

impl Config {
    pub fn from_env() -> Result<Self, env::VarError> {
        dotenvy::dotenv().ok();

        let storage = match env::var("STORAGE_BACKEND")
            .unwrap_or_else(|_| "local".to_string())
            .as_str()
        {
            "r2" => StorageConfig::R2 {
                bucket: env::var("R2_BUCKET")?,
                account_id: env::var("R2_ACCOUNT_ID")?,
                access_key: env::var("R2_ACCESS_KEY_ID")?,
                secret_key: env::var("R2_SECRET_ACCESS_KEY")?,
            },
            _ => StorageConfig::Local {
                upload_dir: env::var("UPLOAD_DIR").unwrap_or_else(|_| "uploads".to_string()),
            },
        };

        Ok(Config {
            database_url: env::var("DATABASE_URL")?,
            server_host: env::var("SERVER_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            server_port: parse_or("SERVER_PORT", 5000),
            jwt_secret: env::var("JWT_SECRET")?,
            client_url: env::var("CLIENT_URL")
                .unwrap_or_else(|_| "http://localhost:3000".to_string()),
            storage,
            max_upload_bytes: parse_or("MAX_UPLOAD_BYTES", DEFAULT_MAX_UPLOAD_BYTES),
            default_page_size: parse_or("DEFAULT_PAGE_SIZE", 12u32).max(1),
            max_page_size: parse_or("MAX_PAGE_SIZE", 100u32).max(1),
            enable_university_seed: parse_or("ENABLE_UNIVERSITY_SEED", false),
            rate_limit_enabled: parse_or("RATE_LIMIT_ENABLED", true),
            rate_limit_requests: parse_or("RATE_LIMIT_REQUESTS", 100u32),
            rate_limit_window_secs: parse_or("RATE_LIMIT_WINDOW_SECS", 15 * 60u64),
        })
    }

    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.server_host, self.server_port)
    }
}
