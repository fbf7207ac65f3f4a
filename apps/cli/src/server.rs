//! HTTP query endpoint over the product cache.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::{Query, State};
use axum::routing::get;
use axum::{Json, Router};
use color_eyre::eyre::{Result, eyre};
use serde::{Deserialize, Serialize};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use storefinder_core::ProductCache;
use storefinder_shared::ProductView;

/// State shared by every handler.
#[derive(Clone)]
pub(crate) struct AppState {
    pub cache: Arc<ProductCache>,
    pub sections: usize,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ProductQuery {
    pattern: Option<String>,
}

#[derive(Debug, Serialize)]
pub(crate) struct Health {
    status: &'static str,
    products: usize,
    sections: usize,
}

pub(crate) fn router(state: AppState) -> Router {
    Router::new()
        .route("/products", get(products))
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// `GET /products?pattern=`: cached products whose name contains `pattern`.
///
/// A missing or empty pattern yields an empty list rather than the whole
/// cache. Query strings that do not deserialize are rejected with 400 by the
/// extractor.
async fn products(
    State(state): State<AppState>,
    Query(query): Query<ProductQuery>,
) -> Json<Vec<ProductView>> {
    let pattern = query.pattern.unwrap_or_default();
    if pattern.is_empty() {
        return Json(Vec::new());
    }
    let views = state
        .cache
        .search(&pattern)
        .iter()
        .map(ProductView::from)
        .collect();
    Json(views)
}

async fn health(State(state): State<AppState>) -> Json<Health> {
    Json(Health {
        status: "ok",
        products: state.cache.len(),
        sections: state.sections,
    })
}

/// Serve `state` on `addr` until `shutdown` resolves.
pub(crate) async fn serve(
    addr: SocketAddr,
    state: AppState,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| eyre!("cannot bind {addr}: {e}"))?;
    info!(%addr, "query server listening");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown)
        .await?;

    info!("query server stopped");
    Ok(())
}

/// Resolves on Ctrl-C, or SIGTERM on unix.
pub(crate) async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "cannot listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "cannot listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("shutdown signal received");
}
