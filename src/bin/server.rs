use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Mutex;
use tracing::{error, info, warn};

use windscope::ballistics::PointMassSimulator;
use windscope::engine::SolutionEngine;
use windscope::link::{self, LinkHandle, SystemPortOpener};
use windscope::protocol::{self, ErrorKind, Request, RequestType, Response, ResponseResult, StatusReport};
use windscope::store::{now_millis, TelemetryStore};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    println!("🌬️  Windscope Telemetry Solver");
    println!("==============================");

    // Optional first argument names a config file; defaults cover the rest
    let config_path = std::env::args().nth(1);
    let config = windscope::config::load(config_path.as_deref())?;

    let store = Arc::new(TelemetryStore::new(config.environment.initial_reading()));
    let engine = Arc::new(SolutionEngine::new(
        Arc::new(PointMassSimulator::new()),
        Arc::clone(&store),
        config.engine.engine_settings(),
    ));

    // Start the serial receiver thread
    let link_handle = link::spawn(
        config.link.link_config(),
        Arc::clone(&store),
        Arc::new(SystemPortOpener),
    );
    let link_handle = Arc::new(Mutex::new(link_handle));

    // Start TCP server
    let listener = TcpListener::bind(&config.server.bind_addr).await?;
    info!("🌐 TCP server listening on {}", config.server.bind_addr);

    let server_engine = Arc::clone(&engine);
    let server_store = Arc::clone(&store);
    let server_link = Arc::clone(&link_handle);
    let tcp_server = tokio::spawn(async move {
        run_server(listener, server_engine, server_store, server_link).await;
    });

    // Run until Ctrl+C
    tokio::signal::ctrl_c().await?;
    println!();
    info!("Shutdown requested");

    tcp_server.abort();
    if let Err(e) = link_handle.lock().await.stop() {
        error!("Telemetry link shutdown error: {}", e);
    }

    println!("🌬️  Windscope stopped");
    Ok(())
}

async fn run_server(
    listener: TcpListener,
    engine: Arc<SolutionEngine>,
    store: Arc<TelemetryStore>,
    link: Arc<Mutex<LinkHandle>>,
) {
    loop {
        match listener.accept().await {
            Ok((stream, addr)) => {
                info!("🔗 New client connected: {}", addr);
                let client_engine = Arc::clone(&engine);
                let client_store = Arc::clone(&store);
                let client_link = Arc::clone(&link);

                tokio::spawn(async move {
                    if let Err(e) =
                        handle_client(stream, client_engine, client_store, client_link).await
                    {
                        warn!("Client {} error: {}", addr, e);
                    }
                    info!("🔌 Client {} disconnected", addr);
                });
            }
            Err(e) => {
                error!("Failed to accept connection: {}", e);
            }
        }
    }
}

async fn handle_client(
    stream: TcpStream,
    engine: Arc<SolutionEngine>,
    store: Arc<TelemetryStore>,
    link: Arc<Mutex<LinkHandle>>,
) -> Result<(), Box<dyn std::error::Error>> {
    let (reader, mut writer) = stream.into_split();
    let mut buf_reader = BufReader::new(reader);

    let mut line = String::new();
    loop {
        line.clear();
        match buf_reader.read_line(&mut line).await {
            Ok(0) => break, // Client disconnected
            Ok(_) => {
                let trimmed = line.trim();
                if trimmed.is_empty() {
                    continue;
                }

                let response = match protocol::parse_request(trimmed) {
                    Ok(request) => {
                        info!("📨 Request {}: {:?}", request.id, request.request_type);
                        dispatch(&request, &engine, &store, &link).await
                    }
                    Err(e) => {
                        warn!("Failed to parse request: {}", e);
                        protocol::error_response(
                            0,
                            now_millis(),
                            ErrorKind::BadRequest,
                            &e.to_string(),
                        )
                    }
                };

                match protocol::encode_response(&response) {
                    Ok(json) => {
                        writer.write_all(json.as_bytes()).await?;
                        writer.write_all(b"\n").await?;
                        info!("📤 Sent response to request {}", response.id);
                    }
                    Err(e) => {
                        error!("Failed to encode response: {}", e);
                    }
                }
            }
            Err(e) => return Err(e.into()),
        }
    }

    Ok(())
}

async fn dispatch(
    request: &Request,
    engine: &SolutionEngine,
    store: &TelemetryStore,
    link: &Mutex<LinkHandle>,
) -> Response {
    let timestamp = now_millis();
    let result = match &request.request_type {
        RequestType::Ping => ResponseResult::Pong,
        RequestType::Solve(solve) => match engine.solve(solve) {
            Ok(solution) => ResponseResult::Solution(solution),
            Err(e) => {
                warn!("Solve failed for request {}: {}", request.id, e);
                return protocol::solve_error_response(request.id, timestamp, &e);
            }
        },
        RequestType::Environment => ResponseResult::Environment {
            reading: store.latest_reading(),
            link: link.lock().await.report(),
        },
        RequestType::Messages => ResponseResult::Messages {
            messages: store.drain_backlog(),
        },
        RequestType::Status => ResponseResult::Status(StatusReport {
            simulator: engine.simulator_name().to_string(),
            settings: *engine.settings(),
            cache: engine.cache_stats(),
            store: store.stats(),
            link: link.lock().await.report(),
        }),
    };

    Response {
        id: request.id,
        timestamp,
        result,
    }
}
