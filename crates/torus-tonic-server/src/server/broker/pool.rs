//! Connections from the broker to its workers.
//!
//! Workers are addressed by index: band `i` of a generation always goes to
//! worker `i`. Channels are connected lazily, so a broker can start before
//! its workers and a dead worker only shows up when a band is sent to it.

use crate::server::telemetry::increment_band_errors;
use bytes::Bytes;
use core::time::Duration;
use tokio::time::timeout;
use tonic::{
    codec::CompressionEncoding,
    transport::{Channel, Endpoint},
};
use torus_tonic_core::{
    Error,
    proto::{BandRequest, worker_client::WorkerClient},
};

#[derive(Debug, Clone)]
struct WorkerHandle {
    addr: String,
    client: WorkerClient<Channel>,
}

/// Fixed, ordered set of worker clients with a per-call deadline.
#[derive(Debug, Clone)]
pub struct WorkerPool {
    workers: Vec<WorkerHandle>,
    band_timeout: Duration,
}

impl WorkerPool {
    /// Builds lazily-connected clients for `addrs` (`host:port`, or a full
    /// `http://` URI).
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidRequest`] if an address is not a valid URI.
    pub fn connect_lazy(addrs: &[String], band_timeout: Duration) -> Result<Self, Error> {
        let workers = addrs
            .iter()
            .map(|addr| {
                let uri = if addr.contains("://") {
                    addr.clone()
                } else {
                    format!("http://{addr}")
                };
                let endpoint =
                    Endpoint::from_shared(uri).map_err(|e| Error::InvalidRequest {
                        reason: format!("invalid worker address {addr}: {e}"),
                    })?;
                let channel = endpoint
                    .connect_timeout(band_timeout)
                    .tcp_nodelay(true)
                    .connect_lazy();
                let client = WorkerClient::new(channel)
                    .send_compressed(CompressionEncoding::Zstd)
                    .accept_compressed(CompressionEncoding::Zstd)
                    .max_decoding_message_size(usize::MAX)
                    .max_encoding_message_size(usize::MAX);
                Ok(WorkerHandle {
                    addr: addr.clone(),
                    client,
                })
            })
            .collect::<Result<Vec<_>, Error>>()?;

        Ok(Self {
            workers,
            band_timeout,
        })
    }

    pub fn len(&self) -> usize {
        self.workers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.workers.is_empty()
    }

    pub fn addr(&self, index: usize) -> Option<&str> {
        self.workers.get(index).map(|w| w.addr.as_str())
    }

    /// Sends one band to worker `index` and waits for the result, at most
    /// for the band deadline.
    ///
    /// # Errors
    ///
    /// - [`Error::WorkerTimeout`] if the deadline passes.
    /// - [`Error::WorkerUnavailable`] if the call fails or `index` is out of
    ///   range.
    pub async fn compute_band(&self, index: usize, req: BandRequest) -> Result<Bytes, Error> {
        let Some(worker) = self.workers.get(index) else {
            return Err(Error::WorkerUnavailable {
                worker: format!("#{index}"),
                reason: format!("only {} workers configured", self.workers.len()),
            });
        };

        let mut client = worker.client.clone();
        let result = match timeout(self.band_timeout, client.compute_band(req)).await {
            Ok(Ok(resp)) => Ok(resp.into_inner().band),
            Ok(Err(status)) => Err(Error::WorkerUnavailable {
                worker: worker.addr.clone(),
                reason: status.message().to_owned(),
            }),
            Err(_) => Err(Error::WorkerTimeout {
                worker: worker.addr.clone(),
                after_ms: self.band_timeout.as_millis() as u64,
            }),
        };

        if let Err(e) = &result {
            increment_band_errors();
            tracing::warn!(worker = %worker.addr, "Band failed: {e}");
        }
        result
    }

    /// Tells every worker to shut down and waits, at most for the band
    /// deadline each, for the acknowledgements.
    ///
    /// Failures are logged and otherwise ignored; a worker that is already
    /// gone needs no kill.
    pub async fn kill_all(&self) {
        let kills = self.workers.iter().map(|worker| async move {
            let mut client = worker.client.clone();
            let req = BandRequest {
                kill: true,
                ..Default::default()
            };
            match timeout(self.band_timeout, client.compute_band(req)).await {
                Ok(Ok(_)) => tracing::debug!(worker = %worker.addr, "Worker acknowledged kill"),
                Ok(Err(status)) => {
                    tracing::warn!(worker = %worker.addr, "Kill failed: {}", status.message());
                }
                Err(_) => tracing::warn!(worker = %worker.addr, "Kill timed out"),
            }
        });

        futures::future::join_all(kills).await;
        tracing::info!("Kill sent to {} workers", self.workers.len());
    }
}
