/*
 * Responsibility
 * - tracing + panic hook
 * - Config -> keys -> AppState -> v3 routes -> admin bootstrap
 * - axum::serve() on the configured address
 */
use std::sync::Arc;
use std::{panic, process};

use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::api;
use crate::config::Config;
use crate::error::AppError;
use crate::server;
use crate::services::auth::keys::KeyMaterial;
use crate::services::auth::management::{InMemoryUserManagement, RestUserManagement};
use crate::services::auth::user::{GLOBAL_ADMIN_SCOPE, RestUser};
use crate::state::AppState;

fn init_tracing() {
    // RUST_LOG wins when set, e.g. RUST_LOG=info,cluster_rest=debug,tower_http=debug
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info,tower_http=info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

fn init_panic_hook(abort_on_panic: bool) {
    let default_hook = panic::take_hook();

    panic::set_hook(Box::new(move |info| {
        // stderr may be hidden depending on how the process is launched
        tracing::error!(?info, "panic");

        if abort_on_panic {
            process::abort();
        } else {
            default_hook(info);
        }
    }))
}

pub async fn run() -> Result<(), AppError> {
    init_tracing();
    let config = Config::from_env()?;
    init_panic_hook(!config.app_env.is_production());

    info!(
        "starting cluster rest in {:?} mode on {}",
        config.app_env,
        config.addr
    );

    let state = build_state(&config)?;
    let app = server::router(state);

    let listener = tokio::net::TcpListener::bind(config.addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<std::net::SocketAddr>(),
    )
    .await?;

    Ok(())
}

pub fn build_state(config: &Config) -> Result<AppState, AppError> {
    let keys = KeyMaterial::load_or_generate(&config.key_dir)?;
    let users: Arc<dyn RestUserManagement> = Arc::new(InMemoryUserManagement::new());

    let state = AppState::new(config.rest.clone(), &keys, users)?;
    api::v3::register(&state)?;
    bootstrap_admin(&state, config)?;

    info!(handlers = state.registry.registered_handlers().len(), "http handlers registered");
    Ok(state)
}

/// Create the admin user on first start when a password is configured.
fn bootstrap_admin(state: &AppState, config: &Config) -> Result<(), AppError> {
    if state.users().find_user_by_name(&config.admin_username).is_some() {
        return Ok(());
    }
    let Some(password) = config.admin_password.as_deref() else {
        warn!(
            username = %config.admin_username,
            "no admin user exists and REST_ADMIN_PASSWORD is unset; basic auth has no users"
        );
        return Ok(());
    };

    let admin = RestUser::builder(&config.admin_username)
        .scope(GLOBAL_ADMIN_SCOPE)
        .password(password, state.password_hasher())?
        .actor("system")
        .build()?;
    state.users().save_user(admin.clone())?;

    info!(user_id = %admin.id(), username = %admin.username(), "created admin user");
    Ok(())
}
