//! usbpassd: the usbpass daemon.
//!
//! Wires the passthrough controller to its surroundings: a command channel
//! fed by the producers (bundle configuration source, USB hotplug watcher,
//! VM lifecycle manager), QMP hypervisor glue for the connect/disconnect
//! side, and signal-driven graceful shutdown.

use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use usbpass_core::{Config, Notifier, UsbPassController};

mod dispatch;
mod qemu;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load()?;
    init_tracing(&config.log_level);

    info!("usbpassd starting");

    let notifier = Notifier::new();
    let glue = qemu::QemuHotplug::new(&config);
    let controller = Arc::new(
        UsbPassController::new(glue.connect_callback(), glue.disconnect_callback())
            .with_notifier(notifier.clone()),
    );

    // Mirror passthrough transitions into the daemon log; other observers
    // (future API surfaces) attach to the same notifier.
    let mut observer = notifier.watch();
    tokio::spawn(async move {
        loop {
            match observer.recv().await {
                Ok(event) if event.is_transition() => {
                    debug!(kind = event.kind(), "passthrough transition");
                }
                Ok(_) => {}
                Err(broadcast::error::RecvError::Lagged(_)) => {}
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    });

    // Producers feed this channel; senders are handed out by the embedding
    // integration.
    let (command_tx, command_rx) =
        tokio::sync::mpsc::channel::<dispatch::ControllerCommand>(config.command_queue_depth);
    let dispatcher = tokio::spawn(dispatch::run(controller.clone(), command_rx));

    info!("usbpassd ready");

    wait_for_shutdown().await;

    info!("usbpassd shutting down");
    drop(command_tx);
    dispatcher.await?;

    if config.drain_on_shutdown {
        let controller = controller.clone();
        tokio::task::spawn_blocking(move || controller.drain()).await?;
    }

    info!("usbpassd stopped");
    Ok(())
}

/// Block until the daemon is asked to stop.
///
/// SIGINT and SIGTERM both lead into the drain sequence above; with a
/// single consumer there is no fan-out to manage.
#[cfg(unix)]
async fn wait_for_shutdown() {
    use tokio::signal::unix::{signal, SignalKind};

    let mut term = signal(SignalKind::terminate()).expect("failed to install SIGTERM handler");
    tokio::select! {
        _ = tokio::signal::ctrl_c() => info!("Interrupt received"),
        _ = term.recv() => info!("Termination requested"),
    }
}

#[cfg(not(unix))]
async fn wait_for_shutdown() {
    let _ = tokio::signal::ctrl_c().await;
    info!("Interrupt received");
}

/// Initialize the tracing subscriber.
///
/// `RUST_LOG` takes precedence; the configured level applies otherwise.
fn init_tracing(default_level: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(true).with_level(true))
        .init();
}
