pub mod config;
pub mod dispatcher;
pub mod errors;
pub mod event;
pub mod integration;
pub mod metrics_defs;
pub mod patterns;
pub mod round_robin;
pub mod service;

#[cfg(test)]
mod testutils;

use crate::dispatcher::{Dispatcher, RedmineConnector};
use crate::errors::{BridgeError, Result};
use crate::service::BridgeService;
use shared::admin_service::AdminService;
use shared::http::run_http_service;
use std::sync::Arc;

pub async fn run(config: config::Config) -> Result<()> {
    config.validate()?;

    let dispatcher = Dispatcher::new(
        config.sentry_url_prefix.clone(),
        Arc::new(RedmineConnector::new()),
    );
    let bridge_service = BridgeService::new(dispatcher, config.projects.clone());
    let bridge_task = run_http_service(
        &config.listener.host,
        config.listener.port,
        bridge_service,
    );

    let admin_service = AdminService::<_, BridgeError>::new(|| true);
    let admin_task = run_http_service(
        &config.admin_listener.host,
        config.admin_listener.port,
        admin_service,
    );

    tokio::try_join!(bridge_task, admin_task)?;
    Ok(())
}
