//! Startup orchestration.
//!
//! # Responsibilities
//! - Build the shared callback emitter and local dispatcher
//! - Create one isolated supplier channel per identity
//! - Bind the callback receiver, then start the channels
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - Subsystems initialize in order, not concurrently
//! - Every identity gets its own correlator, pending table and reconnect loop

use std::time::Duration;

use thiserror::Error;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tracing::Instrument;

use crate::callback::{CallbackEmitter, CallbackError};
use crate::channel::{ChannelEndpoint, ChannelError, SupplierChannel};
use crate::config::RelayConfig;
use crate::correlator::Correlator;
use crate::dispatch::{DispatchError, LocalDispatcher};
use crate::lifecycle::Shutdown;
use crate::receiver::CallbackReceiver;

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("callback emitter: {0}")]
    Callback(#[from] CallbackError),

    #[error("local dispatcher: {0}")]
    Dispatch(#[from] DispatchError),

    #[error("supplier channel: {0}")]
    Channel(#[from] ChannelError),

    #[error("failed to bind callback receiver on {address}: {source}")]
    Bind {
        address: String,
        source: std::io::Error,
    },

    #[error("callback receiver failed: {0}")]
    Serve(std::io::Error),
}

/// The assembled relay, ready to run.
pub struct Relay {
    channels: Vec<SupplierChannel>,
    receiver: Option<CallbackReceiver>,
    receiver_address: String,
}

impl Relay {
    pub fn new(config: &RelayConfig) -> Result<Self, StartupError> {
        let emitter = CallbackEmitter::new(
            &config.server_url,
            config.callback_route(),
            Duration::from_secs(config.timeouts.callback_secs),
        )?;
        let dispatcher = LocalDispatcher::from_config(config)?;
        let reply_timeout = Duration::from_secs(config.timeouts.reply_secs);
        let reconnect_delay = Duration::from_millis(config.channel.reconnect_delay_ms);

        let channels = config
            .suppliers
            .iter()
            .map(|supplier| {
                let endpoint = ChannelEndpoint::new(
                    &config.server_url,
                    &config.channel.path,
                    &config.channel.namespace,
                    supplier,
                    config.credential_placement(),
                )?;
                let correlator = Correlator::new(
                    supplier.clone(),
                    dispatcher.clone(),
                    emitter.clone(),
                    reply_timeout,
                );
                Ok(SupplierChannel::new(endpoint, reconnect_delay, correlator))
            })
            .collect::<Result<Vec<_>, StartupError>>()?;

        let receiver = config
            .receiver
            .enabled
            .then(|| CallbackReceiver::new(config, emitter.clone()));

        tracing::info!(
            tenancy = ?config.tenancy,
            suppliers = channels.len(),
            local_api = %config.local_api_base(),
            local_api_mode = ?dispatcher.mode(),
            callback_route = ?config.callback_route(),
            receiver = config.receiver.enabled,
            "Relay assembled"
        );

        Ok(Self {
            channels,
            receiver,
            receiver_address: config.receiver.bind_address.clone(),
        })
    }

    pub fn channels(&self) -> &[SupplierChannel] {
        &self.channels
    }

    /// Run every channel and the receiver until `shutdown` fires.
    pub async fn run(self, shutdown: &Shutdown) -> Result<(), StartupError> {
        let mut stop = shutdown.subscribe();

        let listener = match &self.receiver {
            Some(_) => Some(
                TcpListener::bind(&self.receiver_address)
                    .await
                    .map_err(|source| StartupError::Bind {
                        address: self.receiver_address.clone(),
                        source,
                    })?,
            ),
            None => None,
        };

        let tasks: Vec<_> = self
            .channels
            .into_iter()
            .map(|channel| {
                let span = tracing::info_span!("supplier", code = %channel.supplier().code);
                tokio::spawn(channel.run(shutdown.subscribe()).instrument(span))
            })
            .collect();

        let served = match (self.receiver, listener) {
            (Some(receiver), Some(listener)) => receiver
                .run(listener, stop)
                .await
                .map_err(StartupError::Serve),
            _ => {
                let _ = stop.recv().await;
                Ok(())
            }
        };

        join_channels(served, shutdown, tasks).await
    }
}

/// Wait for every channel task. A failed receiver stops the channels first.
async fn join_channels(
    served: Result<(), StartupError>,
    shutdown: &Shutdown,
    tasks: Vec<JoinHandle<()>>,
) -> Result<(), StartupError> {
    if let Err(e) = &served {
        tracing::error!(error = %e, "Callback receiver stopped, shutting down channels");
        shutdown.trigger();
    }

    for task in tasks {
        if let Err(e) = task.await {
            tracing::error!(error = %e, "Supplier channel task failed");
        }
    }
    tracing::info!("Relay stopped");
    served
}
