use std::{io, net::SocketAddr, sync::Arc};

use axum::{extract::State, http::StatusCode, routing::get, Router};
use tokio::{net::TcpListener, signal};

use crate::{Combiner, Response};

struct AppState {
    combiner: Combiner,
    urls: Vec<String>,
}

/// `GET /` and `GET /calendar.ics` serve the combined feed.
pub fn router(combiner: Combiner, urls: Vec<String>) -> Router {
    Router::new()
        .route("/", get(handle_calendar))
        .route("/calendar.ics", get(handle_calendar))
        .fallback(|| async { (StatusCode::NOT_FOUND, "Not Found") })
        .with_state(Arc::new(AppState { combiner, urls }))
}

async fn handle_calendar(State(state): State<Arc<AppState>>) -> Response {
    state.combiner.combine(&state.urls).await
}

/// Serves until Ctrl-C is received.
pub async fn serve(addr: SocketAddr, router: Router) -> io::Result<()> {
    let listener = TcpListener::bind(addr).await?;
    tracing::info!(addr = %listener.local_addr()?, "listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
}

async fn shutdown_signal() {
    if let Err(err) = signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to listen for Ctrl-C");
        std::future::pending::<()>().await;
    }

    tracing::info!("shutting down");
}
