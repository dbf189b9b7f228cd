use crate::config::Config;
use crate::resolver::{self, EmailAddress};
use crate::template;
use axum::extract::{Query, State};
use axum::http::{header, HeaderName, StatusCode};
use axum::routing::get;
use axum::Router;
use serde::Deserialize;
use std::sync::Arc;

/// Read-only state shared by all request handlers.
pub struct AppState {
    pub config: Config,
}

pub struct Server {
    state: Arc<AppState>,
}

#[derive(Debug, Deserialize)]
pub struct ConfigQuery {
    pub emailaddress: Option<String>,
}

impl Server {
    /// Validates that every configured domain and user address renders
    /// before the listener ever accepts a request.
    pub fn new(config: Config) -> anyhow::Result<Self> {
        let mut probes: Vec<String> = resolver::servable_domains(&config)
            .into_iter()
            .map(|domain| format!("postmaster@{domain}"))
            .collect();
        probes.extend(config.user.keys().cloned());

        for probe in &probes {
            let address = EmailAddress::parse(probe).ok_or_else(|| {
                anyhow::anyhow!("configured entry does not form a valid address: {probe}")
            })?;
            let resolved = resolver::resolve(&config, &address)?;
            template::render(&resolved, &address)?;
        }

        Ok(Server {
            state: Arc::new(AppState { config }),
        })
    }

    pub fn router(&self) -> Router {
        Router::new()
            .route("/mail/config-v1.1.xml", get(serve_config))
            .route(
                "/.well-known/autoconfig/mail/config-v1.1.xml",
                get(serve_config),
            )
            .with_state(self.state.clone())
    }

    pub async fn run(&self, bind: &str) -> anyhow::Result<()> {
        log::info!("Starting autoconfig server on: {bind}");
        let listener = tokio::net::TcpListener::bind(bind).await?;
        axum::serve(listener, self.router())
            .with_graceful_shutdown(shutdown_signal())
            .await?;
        Ok(())
    }
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => log::info!("Received shutdown signal, draining connections"),
        Err(e) => log::error!("Failed to install shutdown handler: {e}"),
    }
}

async fn serve_config(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ConfigQuery>,
) -> Result<([(HeaderName, &'static str); 1], String), StatusCode> {
    let address = query
        .emailaddress
        .as_deref()
        .and_then(EmailAddress::parse)
        .ok_or(StatusCode::BAD_REQUEST)?;

    let resolved = match resolver::resolve(&state.config, &address) {
        Ok(resolved) => resolved,
        Err(e) => {
            log::debug!("{e}");
            return Err(StatusCode::NOT_FOUND);
        }
    };

    match template::render(&resolved, &address) {
        Ok(xml) => Ok(([(header::CONTENT_TYPE, "application/xml")], xml)),
        Err(e) => {
            log::error!("Template render failed for {}: {e}", address.domain);
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}
