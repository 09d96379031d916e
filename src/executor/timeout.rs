//! Timeout governor for test bodies
//!
//! A timed-out body is asked to stop through its [`CancelSignal`] and given a
//! grace period. Past that it is reported as hung and its handle goes back to
//! the caller, which must keep the unit's resources until the handle
//! resolves. The engine never aborts user code.

use std::time::Duration;
use tokio::task::{JoinError, JoinHandle};

use super::CancelSignal;

/// How a governed body ended
#[derive(Debug)]
pub enum Governed<T> {
    Completed(T),
    /// Timed out and stopped within the grace period
    Cancelled,
    /// Timed out and still running after the grace period
    Hung(JoinHandle<T>),
}

pub async fn govern<T>(
    mut handle: JoinHandle<T>,
    cancel: &CancelSignal,
    limit: Option<Duration>,
    grace: Duration,
) -> Result<Governed<T>, JoinError> {
    let Some(limit) = limit else {
        return handle.await.map(Governed::Completed);
    };

    match tokio::time::timeout(limit, &mut handle).await {
        Ok(result) => result.map(Governed::Completed),
        Err(_) => {
            cancel.cancel();
            match tokio::time::timeout(grace, &mut handle).await {
                Ok(_) => Ok(Governed::Cancelled),
                Err(_) => Ok(Governed::Hung(handle)),
            }
        }
    }
}
