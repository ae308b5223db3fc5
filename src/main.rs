use clap::Parser;
use pingora_core::server::configuration::Opt;
use pingora_core::server::Server;
use pixelrelay::config::Config;
use pixelrelay::proxy::TransformProxy;
use pixelrelay::transform::codecs;
use std::path::PathBuf;

/// pixelrelay - remote image transform service built on Cloudflare's Pingora
#[derive(Parser, Debug)]
#[command(name = "pixelrelay")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to configuration file (defaults apply when omitted)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Daemon mode
    #[arg(short = 'd', long)]
    daemon: bool,

    /// Test configuration and exit
    #[arg(long)]
    test: bool,
}

fn exit_with(message: &str, error: impl std::fmt::Display) -> ! {
    eprintln!("{}: {}", message, error);
    std::process::exit(1);
}

fn main() {
    let args = Args::parse();

    // Configuration decides the log format, so it loads before logging starts
    let config = Config::load(args.config.as_deref())
        .unwrap_or_else(|e| exit_with("Failed to load configuration", e));

    pixelrelay::logging::init_subscriber(config.logging.format)
        .unwrap_or_else(|e| exit_with("Failed to initialize logging subsystem", e));

    tracing::info!(
        config_file = %args.config.as_ref().map(|p| p.display().to_string()).unwrap_or_else(|| "<defaults>".to_string()),
        server_address = %config.server.address,
        server_port = config.server.port,
        allow_list = ?config.transform.allow_list,
        strict_pipeline = config.transform.strict_pipeline,
        cache_enabled = config.cache.enabled,
        "Configuration loaded successfully"
    );

    if args.test {
        tracing::info!("Configuration test passed");
        return;
    }

    // Codecs and the operation registry are ready before the first request
    codecs::init();

    let opt = Opt {
        daemon: args.daemon,
        ..Default::default()
    };

    let mut server =
        Server::new(Some(opt)).unwrap_or_else(|e| exit_with("Failed to create Pingora server", e));
    server.bootstrap();

    let listen_addr = config.server.listen_addr();
    let proxy = TransformProxy::new(config)
        .unwrap_or_else(|e| exit_with("Failed to create transform proxy", e));

    let mut proxy_service = pingora_proxy::http_proxy_service(&server.configuration, proxy);
    proxy_service.add_tcp(&listen_addr);

    tracing::info!(address = %listen_addr, "Starting pixelrelay");

    server.add_service(proxy_service);
    server.run_forever();
}
