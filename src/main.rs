use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tokio::signal;
use tracing::{error, info, warn};

use bookwatch::adapter::WsTransport;
use bookwatch::config::Config;
use bookwatch::domain::Symbol;
use bookwatch::error::Error;
use bookwatch::feed::WatchClient;
use bookwatch::port::{ExchangeDescriptor, StaticDescriptor};

/// Watch live order books from a streaming venue feed.
#[derive(Parser)]
#[command(name = "bookwatch", version, about)]
struct Args {
    /// Path to the TOML configuration file.
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,

    /// Watch only this symbol (canonical name) instead of every configured one.
    #[arg(short, long)]
    symbol: Option<String>,

    /// Depth limit for printed views; overrides the configured value.
    #[arg(short, long)]
    depth: Option<usize>,
}

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();
    let args = Args::parse();

    let config = match Config::load(&args.config) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load config: {e}");
            std::process::exit(1);
        }
    };

    config.init_logging();
    info!("bookwatch starting");

    let mut symbols = config.symbols();
    if let Some(name) = &args.symbol {
        symbols.retain(|s| s.name() == name.as_str());
    }
    if symbols.is_empty() {
        eprintln!("No symbols to watch; add [[symbols]] entries to the config");
        std::process::exit(1);
    }

    let depth = args.depth.or(config.feed.depth);
    let descriptor: Arc<dyn ExchangeDescriptor> = Arc::new(StaticDescriptor::new(
        config.feed.channel.clone(),
        symbols.clone(),
    ));
    let client = Arc::new(WatchClient::new(descriptor));

    let session = tokio::spawn({
        let client = client.clone();
        let url = config.network.ws_url.clone();
        async move { client.run(WsTransport::new(url)).await }
    });

    for symbol in symbols {
        tokio::spawn(watch_loop(client.clone(), symbol, depth));
    }

    tokio::select! {
        result = session => {
            match result {
                Ok(Ok(())) => info!("Feed session ended"),
                Ok(Err(e)) => {
                    error!(error = %e, "Fatal error");
                    std::process::exit(1);
                }
                Err(e) => {
                    error!(error = %e, "Session task panicked");
                    std::process::exit(1);
                }
            }
        }
        _ = signal::ctrl_c() => {
            info!("Shutdown signal received");
        }
    }

    info!(
        frames = client.stats().frames_routed(),
        out_of_sequence = client.stats().out_of_sequence(),
        protocol_errors = client.stats().protocol_errors(),
        "bookwatch stopped"
    );
}

/// Re-watch a symbol forever, logging top of book on every update.
async fn watch_loop(client: Arc<WatchClient>, symbol: Symbol, depth: Option<usize>) {
    loop {
        match client.watch(&symbol, depth).await {
            Ok(view) => {
                info!(
                    symbol = %symbol,
                    best_bid = ?view.best_bid().map(|l| (l.price(), l.size())),
                    best_ask = ?view.best_ask().map(|l| (l.price(), l.size())),
                    bids = view.bids().len(),
                    asks = view.asks().len(),
                    "Book updated"
                );
            }
            Err(Error::Watch(e)) => {
                warn!(symbol = %symbol, error = %e, "Watch terminated");
                return;
            }
            Err(e) => {
                error!(symbol = %symbol, error = %e, "Watch failed");
                return;
            }
        }
    }
}
