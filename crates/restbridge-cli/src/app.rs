//! Wires configuration into a running gateway: descriptor fetch, schema
//! parse, initial route table, HTTP router, reload-signal listener, and
//! graceful shutdown.

use std::sync::Arc;
use std::time::Duration;

use restbridge_runtime::{router, GatewayState, GrpcGateway, ReloadableTable, Route, RouteTable};
use restbridge_schema::{DescriptorSource, LocalSource, RemoteSource};
use tokio::net::TcpListener;

use crate::channel;
use crate::config::{AppConfig, DescriptorKind};
use crate::error::BootstrapError;

/// A bootstrapped gateway, ready to [`run`](App::run).
pub struct App {
    state: GatewayState,
    source: DescriptorSource,
    http_addr: String,
    graceful_timeout: Duration,
}

impl App {
    /// Build the backend channel, fetch and parse the initial descriptor
    /// set, and assemble the gateway state.
    ///
    /// # Errors
    ///
    /// Returns [`BootstrapError`] if the backend channel can't be
    /// established or the initial descriptor fetch/parse fails. A failure
    /// here is fatal to the process: there is no prior live table to fall
    /// back to.
    pub async fn bootstrap(config: AppConfig) -> Result<Self, BootstrapError> {
        let grpc_channel = channel::connect(&config.gateways.grpc.client).await?;
        let source = build_source(&config, grpc_channel.clone());

        let table = fetch_and_build(&source).await?;
        tracing::info!(routes = table.len(), "initial route table installed");

        let state = GatewayState {
            table: Arc::new(ReloadableTable::new(table)),
            grpc: GrpcGateway::new(grpc_channel),
            codec: restbridge_runtime::codec::JsonCodec::default(),
            request_timeout: config.gateways.grpc.client.request_timeout,
        };

        Ok(Self {
            state,
            source,
            http_addr: config.transport.http.addr.clone(),
            graceful_timeout: config.transport.http.server.graceful_timeout,
        })
    }

    /// Install the reload-signal listener, bind the HTTP listener, and
    /// serve until a shutdown signal arrives.
    ///
    /// # Errors
    ///
    /// Returns [`BootstrapError::ListenerBindFailed`] if the configured
    /// address can't be bound.
    pub async fn run(self) -> Result<(), BootstrapError> {
        spawn_reload_listener(self.state.table.clone(), self.source.clone());

        let listener = TcpListener::bind(&self.http_addr)
            .await
            .map_err(|source| BootstrapError::ListenerBindFailed {
                addr: self.http_addr.clone(),
                source,
            })?;
        tracing::info!(addr = %self.http_addr, "listening");

        let app = router(self.state);
        let graceful_timeout = self.graceful_timeout;
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal(graceful_timeout))
            .await
            .map_err(|e| BootstrapError::ListenerBindFailed {
                addr: self.http_addr,
                source: e,
            })?;

        Ok(())
    }
}

fn build_source(config: &AppConfig, channel: tonic::transport::Channel) -> DescriptorSource {
    match config.descriptors.kind {
        DescriptorKind::Local => {
            let local = config
                .descriptors
                .local
                .as_ref()
                .expect("validated: descriptors.local set when kind is local");
            DescriptorSource::Local(LocalSource::new(local.dir.clone()))
        }
        DescriptorKind::Remote => {
            let remote = config
                .descriptors
                .remote
                .as_ref()
                .expect("validated: descriptors.remote set when kind is remote");
            DescriptorSource::Remote(RemoteSource::new(
                channel,
                remote.reflection_service_name.clone(),
                remote.exclude.clone(),
                remote.timeout,
            ))
        }
    }
}

/// Fetch descriptors, parse them, and build a fresh [`RouteTable`],
/// logging every registered route.
///
/// # Errors
///
/// Returns [`BootstrapError::DescriptorUnavailable`] if the fetch fails,
/// [`BootstrapError::SchemaInvalid`] if parsing produced any errors, or
/// [`BootstrapError::TableInvalid`] if a parsed route couldn't be
/// registered.
async fn fetch_and_build(source: &DescriptorSource) -> Result<RouteTable, BootstrapError> {
    let raw = source
        .fetch()
        .await
        .map_err(BootstrapError::DescriptorUnavailable)?;

    let result = restbridge_schema::parse(&raw);
    if !result.ok() {
        for error in &result.errors {
            tracing::warn!(%error, "descriptor parse error");
        }
        return Err(BootstrapError::SchemaInvalid {
            count: result.errors.len(),
        });
    }

    for route in &result.routes {
        log_route(route);
    }

    restbridge_schema::build_table(result.routes).map_err(|errors| {
        for error in &errors {
            tracing::warn!(%error, "route registration error");
        }
        BootstrapError::TableInvalid(format!("{} error(s)", errors.len()))
    })
}

fn log_route(route: &Route) {
    tracing::info!(
        method = %route.method,
        pattern = %route.pattern,
        rpc = %route.rpc.full_path(),
        "route registered"
    );
}

/// Watch for the reload signal (`SIGUSR1`) and, on receipt, refetch and
/// reparse descriptors, installing the result only on success. A failed
/// reload is logged and leaves the live table untouched.
fn spawn_reload_listener(table: Arc<ReloadableTable>, source: DescriptorSource) {
    tokio::spawn(async move {
        let mut reload = match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::user_defined1())
        {
            Ok(signal) => signal,
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGUSR1 handler; reload disabled");
                return;
            }
        };

        loop {
            reload.recv().await;
            tracing::info!("reload signal received");
            match fetch_and_build(&source).await {
                Ok(new_table) => {
                    let routes = new_table.len();
                    table.store(new_table);
                    tracing::info!(routes, "reload succeeded, new route table installed");
                }
                Err(e) => {
                    tracing::error!(error = %e, "reload failed, keeping current route table");
                }
            }
        }
    });
}

/// Resolves once `SIGINT` or `SIGTERM` (or their platform equivalents)
/// arrives, giving [`axum::serve`]'s graceful-shutdown machinery its cue
/// to stop accepting connections and start the drain timer.
async fn shutdown_signal(graceful_timeout: Duration) {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install SIGINT handler");
    };

    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }
    tracing::info!(?graceful_timeout, "shutdown signal received, draining in-flight requests");
}
