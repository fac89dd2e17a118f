use std::sync::Arc;

use futures::StreamExt;
use tokio::pin;
use tracing::{info, warn};

use crate::{
    cli::{
        CommandResult,
        formatting::{format_pair, format_success, format_warning},
    },
    config::Config,
    services::audio::{AudioHardware, SharingEvent, SharingService, SharingState},
};

/// Starts sharing and keeps it running until Ctrl-C
///
/// Lifecycle events are printed as they arrive. Sharing that stops on its
/// own, for example after a device disconnects, ends the command.
pub(super) async fn run(hardware: Arc<dyn AudioHardware>, config: &Config) -> CommandResult {
    let service = SharingService::start(hardware, config).await?;

    if let Err(error) = service.start_sharing().await {
        service.shutdown().await?;
        return Err(error.into());
    }

    let status = service.status().await?;
    if let Some(pair) = &status.pair {
        println!("{}", format_pair(pair));
    }
    println!("{}", format_success(&format!("Sharing: {}", status.state)));
    println!("Press Ctrl-C to stop");

    let events = service.events();
    pin!(events);
    loop {
        tokio::select! {
            signal = tokio::signal::ctrl_c() => {
                if let Err(error) = signal {
                    warn!("Unable to listen for Ctrl-C: {error}");
                }
                info!("Interrupted, stopping");
                break;
            }
            event = events.next() => match event {
                Some(SharingEvent::StateChanged(SharingState::Inactive)) | None => break,
                Some(SharingEvent::StateChanged(state)) => println!("Sharing: {state}"),
                Some(SharingEvent::ConfigurationInvalidated) => {
                    println!("{}", format_warning("A shared device went away, stopping"));
                }
                Some(SharingEvent::RestoreWarning { message })
                | Some(SharingEvent::OperationFailed { message }) => {
                    println!("{}", format_warning(&message));
                }
                Some(SharingEvent::DevicesChanged(devices)) => {
                    println!("{} compatible device(s) connected", devices.len());
                }
            }
        }
    }

    service.shutdown().await?;
    Ok(format!("Sharing: {}", SharingState::Inactive))
}
