#![forbid(unsafe_code)]

use std::env;
use std::path::PathBuf;
use tally_model::{PeriodKey, Role, UserDirectoryEntry};
use tally_server::{build_router, AppState, ServerConfig};
use tally_store::SyncStore;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

fn env_bool(name: &str, default: bool) -> bool {
    env::var(name)
        .ok()
        .and_then(|v| match v.as_str() {
            "1" | "true" | "TRUE" | "yes" | "YES" => Some(true),
            "0" | "false" | "FALSE" | "no" | "NO" => Some(false),
            _ => None,
        })
        .unwrap_or(default)
}

fn env_string(name: &str, default: &str) -> String {
    env::var(name).unwrap_or_else(|_| default.to_string())
}

fn config_from_env() -> ServerConfig {
    let defaults = ServerConfig::default();
    ServerConfig {
        bind_addr: env_string("TALLY_BIND", &defaults.bind_addr),
        db_path: PathBuf::from(env_string(
            "TALLY_DB",
            defaults.db_path.to_str().unwrap_or("data/tally.db"),
        )),
        max_body_bytes: defaults.max_body_bytes,
        seed_default_admin: env_bool("TALLY_SEED_ADMIN", defaults.seed_default_admin),
        default_admin_pin: env_string("TALLY_ADMIN_PIN", &defaults.default_admin_pin),
    }
}

fn seed(store: &SyncStore, config: &ServerConfig) {
    if config.seed_default_admin {
        let admin = UserDirectoryEntry {
            id: "u1".to_string(),
            name: "General Manager".to_string(),
            role: Role::Admin,
            dept: "executive".to_string(),
        };
        if let Err(e) = store.add_user(&admin, "admin", &config.default_admin_pin) {
            error!("admin seed failed: {e}");
        }
    }
    // Make the current month visible to bootstrap before any write lands.
    let current = tally_store::now_rfc3339()[..7].to_string();
    if let Ok(period) = PeriodKey::parse(&current) {
        if let Err(e) = store.ensure_period(&period) {
            error!("period seed failed: {e}");
        }
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = config_from_env();
    if let Some(parent) = config.db_path.parent() {
        if let Err(e) = std::fs::create_dir_all(parent) {
            error!("cannot create data directory {:?}: {e}", parent);
            std::process::exit(1);
        }
    }
    let store = match SyncStore::open(&config.db_path) {
        Ok(v) => v,
        Err(e) => {
            error!("cannot open store at {:?}: {e}", config.db_path);
            std::process::exit(1);
        }
    };
    seed(&store, &config);

    let bind_addr = config.bind_addr.clone();
    let app = build_router(AppState::new(store, config));
    let listener = match tokio::net::TcpListener::bind(&bind_addr).await {
        Ok(v) => v,
        Err(e) => {
            error!("cannot bind {bind_addr}: {e}");
            std::process::exit(1);
        }
    };
    info!("tally server listening on {bind_addr}");
    if let Err(e) = axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await
    {
        error!("server error: {e}");
        std::process::exit(1);
    }
}
