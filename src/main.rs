use std::{net::SocketAddr, process};

use clap::Parser;
use quire::{
    config::{self, CacheBackendKind, CliArgs, Command},
    infra::{bootstrap::build_application, error::InfraError, http::blog_registry, telemetry},
};
use tokio::{net::TcpListener, sync::watch, task::JoinError};
use tracing::{Dispatch, Level, dispatcher, error, info, warn};
use tracing_subscriber::fmt as tracing_fmt;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        report_application_error(&error);
        process::exit(1);
    }
}

fn report_application_error(error: &InfraError) {
    if dispatcher::has_been_set() {
        error!(error = %error, "application error");
        return;
    }

    let subscriber = tracing_fmt().with_max_level(Level::ERROR).finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(error = %error, "application error");
    });
}

async fn run() -> Result<(), InfraError> {
    let cli_args = CliArgs::parse();

    match cli_args.command.clone() {
        Some(Command::Routes) => print_routes(),
        Some(Command::Serve(_)) | None => {
            let settings = config::load(&cli_args)?;
            telemetry::init(&settings.logging)?;
            run_serve(settings).await
        }
    }
}

fn print_routes() -> Result<(), InfraError> {
    let registry = blog_registry()?;
    print!("{}", registry.describe());
    Ok(())
}

async fn run_serve(settings: config::Settings) -> Result<(), InfraError> {
    let app = build_application(&settings).await?;
    let backend = match &app.cache.config.backend {
        CacheBackendKind::Memory => "memory",
        CacheBackendKind::Redis { .. } => "redis",
    };
    info!(
        target = "quire::startup",
        resources = app.registry.len(),
        cache_enabled = app.cache.config.enabled,
        backend,
        "resource cache policies loaded"
    );

    let listener = TcpListener::bind(settings.server.addr).await?;
    info!(target = "quire::startup", addr = %settings.server.addr, "listening");

    let (stopping_tx, mut stopping_rx) = watch::channel(false);
    let server = axum::serve(
        listener,
        app.router
            .into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(async move {
        shutdown_signal().await;
        let _ = stopping_tx.send(true);
    });
    let mut server = tokio::spawn(async move { server.await });

    tokio::select! {
        joined = &mut server => return finish(joined),
        _ = stopping_rx.wait_for(|stopping| *stopping) => {}
    }

    let grace = settings.server.graceful_shutdown;
    match tokio::time::timeout(grace, server).await {
        Ok(joined) => finish(joined),
        Err(_) => {
            warn!(
                target = "quire::startup",
                grace_secs = grace.as_secs(),
                "graceful shutdown timed out with requests in flight"
            );
            Ok(())
        }
    }
}

fn finish(joined: Result<std::io::Result<()>, JoinError>) -> Result<(), InfraError> {
    match joined {
        Ok(result) => result.map_err(|err| InfraError::server(err.to_string())),
        Err(err) => Err(InfraError::server(format!("server task failed: {err}"))),
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!(error = %err, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                error!(error = %err, "failed to listen for SIGTERM");
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
    info!(target = "quire::startup", "shutdown signal received");
}
