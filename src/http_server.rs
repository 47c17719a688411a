use std::net::SocketAddr;

use axum::{Router, http::StatusCode, routing::get};
use tokio::{net::TcpListener, signal};

#[must_use]
pub fn app() -> Router {
    Router::new()
        .route("/livez", get(handler))
        .route("/readyz", get(handler))
}

/// # Errors
///
/// Will return `Err` if `addr` cannot be bound or the server fails.
pub async fn run(addr: SocketAddr) -> std::io::Result<()> {
    let listener = TcpListener::bind(addr).await?;

    tracing::info!(addr =% addr, "server started");

    axum::serve(listener, app())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("server stopped");

    Ok(())
}

#[allow(clippy::unused_async)]
async fn handler() -> StatusCode {
    StatusCode::OK
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(error) = signal::ctrl_c().await {
            tracing::error!(error =% error, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut terminate) => {
                terminate.recv().await;
            }
            Err(error) => {
                tracing::error!(error =% error, "failed to install signal handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("signal received, starting graceful shutdown");
}

#[cfg(test)]
mod tests {
    use axum::{body::Body, http::Request, http::StatusCode};
    use tower::ServiceExt;

    use super::app;

    #[tokio::test]
    async fn livez() {
        // act
        let response = app()
            .oneshot(Request::get("/livez").body(Body::empty()).unwrap())
            .await
            .unwrap();

        // assert
        assert_eq!(StatusCode::OK, response.status());
    }

    #[tokio::test]
    async fn readyz() {
        // act
        let response = app()
            .oneshot(Request::get("/readyz").body(Body::empty()).unwrap())
            .await
            .unwrap();

        // assert
        assert_eq!(StatusCode::OK, response.status());
    }

    #[tokio::test]
    async fn unknown_route() {
        // act
        let response = app()
            .oneshot(Request::get("/metrics").body(Body::empty()).unwrap())
            .await
            .unwrap();

        // assert
        assert_eq!(StatusCode::NOT_FOUND, response.status());
    }
}
