mod bt;
mod cli;

use anyhow::Result;
use clap::Parser;
use tokio::time::MissedTickBehavior;

use gpsrelay::{Config, Event, Feed, FixSource, LocationSample, Relay};

use cli::*;


#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let args = Args::parse();

    let level = match args.verbose {
        0 => tracing::Level::INFO,
        1 => tracing::Level::DEBUG,
        _ => tracing::Level::TRACE,
    };

    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();

    let config = Config::from_raw(args.channel, args.interval, &args.connect)?;

    // set up adapter
    let session = bluer::Session::new().await?;
    let adapter = bt::BluezAdapter::new(session).await?;
    tracing::info!(adapter=%adapter.name(), "using bluetooth adapter");

    // set up relay
    let feed = Feed::new();
    feed.update_location(sample(&args));

    let (events, mut rx) = gpsrelay::event::channel();
    let relay = Relay::new(adapter, feed.clone(), events);

    relay.apply(&config).await;
    tracing::info!(channel=%config.channel, peer=%config.forced_peer, "relay started");

    // keep the fix fresh until interrupted
    let mut ticker = tokio::time::interval(config.update_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            res = &mut shutdown => {
                res?;
                break;
            },
            _ = ticker.tick() => {
                feed.update_location(sample(&args));
            },
            Some(event) = rx.recv() => {
                print_event(&event);
            },
        }
    }

    tracing::info!("shutting down");
    relay.stop().await;

    Ok(())
}

fn sample(args: &Args) -> LocationSample {
    LocationSample {
        timestamp_ms: chrono::Utc::now().timestamp_millis(),
        latitude: args.latitude,
        longitude: args.longitude,
        altitude: args.altitude,
        speed: 0.0,
        bearing: 0.0,
        accuracy: args.accuracy,
        satellites: args.satellites,
        source: FixSource::Network,
    }
}

fn print_event(event: &Event) {
    match event {
        Event::StateChanged(state) => {
            println!("state: {state}");
        },
        Event::DeviceConnected(peer) => {
            println!("connected: {peer}");
        },
        Event::DeviceDisconnected(peer) => {
            println!("disconnected: {peer}");
        },
        Event::Devices(peers) => {
            println!("devices:");
            for peer in peers {
                println!("  {peer}");
            }
        },
        Event::Location { latitude, longitude, source } => {
            tracing::debug!(%latitude, %longitude, %source, "location broadcast");
        },
    }
}
