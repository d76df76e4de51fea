use std::sync::Arc;

use axum::Router;
use tower_governor::{governor::GovernorConfigBuilder, GovernorLayer};

use crate::{
    config::Config,
    error::{AppError, Result},
    state::AppState,
};

/// Limits credential submissions per client IP.
///
/// Over-limit requests get `429 Too Many Requests` before reaching the
/// handler. The key is the peer address, so the server must be run with
/// `into_make_service_with_connect_info::<SocketAddr>()`.
pub fn limit_credential_attempts(routes: Router<AppState>, config: &Config) -> Result<Router<AppState>> {
    let governor_conf = Arc::new(
        GovernorConfigBuilder::default()
            .per_second(config.auth_rate_replenish_secs)
            .burst_size(config.auth_rate_burst)
            .finish()
            .ok_or_else(|| {
                AppError::Internal(format!(
                    "Invalid rate limit: one every {}s with burst {}",
                    config.auth_rate_replenish_secs, config.auth_rate_burst
                ))
            })?,
    );

    // Forget idle clients so the limiter's map does not grow forever.
    let limiter = governor_conf.limiter().clone();
    tokio::spawn(async move {
        loop {
            tokio::time::sleep(std::time::Duration::from_secs(60)).await;
            limiter.retain_recent();
        }
    });

    tracing::info!(
        "✅ Credential rate limit: burst {}, one more every {}s",
        config.auth_rate_burst,
        config.auth_rate_replenish_secs
    );

    Ok(routes.layer(GovernorLayer::new(governor_conf)))
}
