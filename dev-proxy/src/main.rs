use anyhow::Result;
use axum::body::{to_bytes, Body};
use axum::extract::{Request, State};
use axum::http::{header, HeaderMap, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::Router;
use clap::Parser;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Largest request body forwarded upstream
const MAX_BODY_BYTES: usize = 16 * 1024 * 1024;

#[derive(Parser, Debug)]
#[command(name = "dev-proxy", about = "Dryer development reverse proxy")]
struct Args {
    /// Address to listen on
    #[arg(short, long, default_value = "0.0.0.0:8080")]
    listen: SocketAddr,

    /// Device API base URL
    #[arg(long, env = "DRYER_BACKEND", default_value = "http://localhost:8000")]
    backend: String,

    /// Frontend dev server base URL
    #[arg(long, env = "DRYER_FRONTEND", default_value = "http://localhost:5173")]
    frontend: String,
}

struct Proxy {
    client: reqwest::Client,
    backend: String,
    frontend: String,
}

impl Proxy {
    fn new(backend: impl Into<String>, frontend: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            backend: backend.into().trim_end_matches('/').to_string(),
            frontend: frontend.into().trim_end_matches('/').to_string(),
        }
    }

    /// `/api/...` goes to the backend, everything else to the frontend
    fn target_for(&self, uri: &Uri) -> String {
        let path_and_query = uri.path_and_query().map(|pq| pq.as_str()).unwrap_or("/");
        let base = if uri.path().starts_with("/api/") {
            &self.backend
        } else {
            &self.frontend
        };
        format!("{}{}", base, path_and_query)
    }
}

fn forwarded_headers(headers: &HeaderMap) -> HeaderMap {
    let mut headers = headers.clone();
    // reqwest frames the buffered body itself
    for name in [
        header::HOST,
        header::CONTENT_LENGTH,
        header::TRANSFER_ENCODING,
        header::CONNECTION,
    ] {
        headers.remove(name);
    }
    headers
}

fn router(proxy: Arc<Proxy>) -> Router {
    Router::new()
        .fallback(forward)
        .with_state(proxy)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

async fn forward(State(proxy): State<Arc<Proxy>>, request: Request) -> Response {
    let allowed = [
        Method::GET,
        Method::POST,
        Method::PUT,
        Method::PATCH,
        Method::DELETE,
    ];
    if !allowed.contains(request.method()) {
        return StatusCode::METHOD_NOT_ALLOWED.into_response();
    }

    let target = proxy.target_for(request.uri());
    let (parts, body) = request.into_parts();
    let body = match to_bytes(body, MAX_BODY_BYTES).await {
        Ok(body) => body,
        Err(e) => return (StatusCode::PAYLOAD_TOO_LARGE, e.to_string()).into_response(),
    };

    let upstream = proxy
        .client
        .request(parts.method, &target)
        .headers(forwarded_headers(&parts.headers))
        .body(body)
        .send()
        .await;

    let upstream = match upstream {
        Ok(upstream) => upstream,
        Err(e) => {
            error!("Upstream {} failed: {}", target, e);
            return (StatusCode::BAD_GATEWAY, e.to_string()).into_response();
        }
    };

    let status = upstream.status();
    let mut headers = upstream.headers().clone();
    headers.remove(header::TRANSFER_ENCODING);
    headers.remove(header::CONTENT_LENGTH);
    match upstream.bytes().await {
        Ok(bytes) => (status, headers, Body::from(bytes)).into_response(),
        Err(e) => {
            error!("Reading upstream {} failed: {}", target, e);
            (StatusCode::BAD_GATEWAY, e.to_string()).into_response()
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .init();

    let args = Args::parse();
    info!("Dev proxy starting on {}", args.listen);
    info!("  /api/* -> {}", args.backend);
    info!("  /*     -> {}", args.frontend);

    let app = router(Arc::new(Proxy::new(args.backend, args.frontend)));
    let listener = tokio::net::TcpListener::bind(args.listen).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
