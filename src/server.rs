//! Serving plumbing shared by the gateway and both downstream services.

use std::any::Any;
use std::future::Future;
use std::net::{IpAddr, Ipv4Addr, SocketAddr, UdpSocket};

use axum::response::{IntoResponse, Response};
use axum::Router;
use chrono::{SecondsFormat, Utc};
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio::signal::ctrl_c;
#[cfg(unix)]
use tokio::signal::unix::{signal, SignalKind};
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::error::ServiceError;

/// Identity a process reports in health and metadata bodies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceInfo {
    pub name: String,
    pub hostname: String,
    pub address: String,
    /// Concrete addresses the listener is reachable on.
    pub interfaces: Vec<IpAddr>,
}

impl ServiceInfo {
    pub fn new(name: impl Into<String>, hostname: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            hostname: hostname.into(),
            address: String::new(),
            interfaces: Vec::new(),
        }
    }

    /// Record the address the listener actually bound, resolving a wildcard
    /// bind to the local addresses behind it.
    pub fn bound_to(mut self, addr: SocketAddr) -> Self {
        self.address = addr.to_string();
        self.interfaces = local_addresses(addr.ip());
        self
    }
}

fn local_addresses(bound: IpAddr) -> Vec<IpAddr> {
    if !bound.is_unspecified() {
        return vec![bound];
    }

    let mut found = vec![IpAddr::V4(Ipv4Addr::LOCALHOST)];
    // Connecting a UDP socket sends nothing; the kernel only picks a route.
    let routed = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0))
        .and_then(|socket| {
            socket.connect((Ipv4Addr::new(192, 0, 2, 1), 9))?;
            socket.local_addr()
        })
        .map(|addr| addr.ip());
    if let Ok(ip) = routed {
        if !ip.is_unspecified() && !found.contains(&ip) {
            found.push(ip);
        }
    }
    found
}

/// Current time as an RFC 3339 string with millisecond precision.
pub fn timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Downstream `/health` body. Status follows store connectivity.
pub fn store_health(info: &ServiceInfo, connected: bool) -> Value {
    let interfaces: Vec<Value> = info
        .interfaces
        .iter()
        .map(|ip| {
            json!({
                "address": ip.to_string(),
                "family": if ip.is_ipv4() { "IPv4" } else { "IPv6" },
            })
        })
        .collect();

    json!({
        "status": if connected { "healthy" } else { "degraded" },
        "service": info.name,
        "timestamp": timestamp(),
        "hostname": info.hostname,
        "network": { "address": info.address, "interfaces": interfaces },
        "database": {
            "status": if connected { "connected" } else { "disconnected" }
        }
    })
}

/// Wrap a router with CORS, request tracing and panic recovery.
pub fn layers(router: Router) -> Router {
    router
        .layer(CatchPanicLayer::custom(panic_response))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

fn panic_response(panic: Box<dyn Any + Send + 'static>) -> Response {
    let details = if let Some(msg) = panic.downcast_ref::<String>() {
        msg.clone()
    } else if let Some(msg) = panic.downcast_ref::<&str>() {
        msg.to_string()
    } else {
        "handler panicked".to_string()
    };

    error!(%details, "handler panicked");
    ServiceError::Unhandled(details).into_response()
}

/// Bind every interface on `port`.
pub async fn bind(port: u16) -> std::io::Result<TcpListener> {
    let listener = TcpListener::bind(("0.0.0.0", port)).await?;
    info!(address = %listener.local_addr()?, "listening");
    Ok(listener)
}

/// Serve `router` until `shutdown` resolves, then drain in-flight requests.
pub async fn serve<F>(listener: TcpListener, router: Router, shutdown: F) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown)
        .await
}

/// Resolves on Ctrl+C or, on unix, SIGTERM.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        match ctrl_c().await {
            Ok(()) => info!("Received Ctrl+C, shutting down"),
            Err(err) => {
                error!(%err, "failed to install Ctrl+C handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                info!("Received terminate signal, shutting down");
            }
            Err(err) => {
                error!(%err, "failed to install signal handler");
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
}
