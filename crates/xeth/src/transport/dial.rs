use std::io;
use std::time::Duration;

use tracing::{debug, trace};

use super::StopSignal;
use crate::error::{Error, Result, is_transient_io};

/// Retry `attempt` every `interval` until it connects.
///
/// `EAGAIN` and `ECONNREFUSED` mean the driver is not listening yet and are
/// retried; anything else fails with [`Error::Connect`]. A stop request
/// aborts with [`Error::Stopped`].
pub(crate) async fn dial<T, F>(
    device: &str,
    interval: Duration,
    stop: &mut StopSignal,
    mut attempt: F,
) -> Result<T>
where
    F: FnMut() -> io::Result<T>,
{
    let mut attempts = 0u64;
    loop {
        if stop.is_stopped() {
            return Err(Error::Stopped);
        }
        attempts += 1;
        match attempt() {
            Ok(conn) => {
                debug!(device, attempts, "connected");
                return Ok(conn);
            }
            Err(e) if is_transient_io(&e) => {
                trace!(device, error = %e, "driver not ready");
            }
            Err(source) => {
                return Err(Error::Connect {
                    device: device.to_string(),
                    source,
                });
            }
        }
        tokio::select! {
            biased;
            _ = stop.stopped() => return Err(Error::Stopped),
            _ = tokio::time::sleep(interval) => {}
        }
    }
}
