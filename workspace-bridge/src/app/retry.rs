use std::fmt::Display;
use std::future::Future;
use tracing::debug;

/// Runs `operation` up to `attempts` times back to back and returns the
/// first success, or the last failure once every attempt has failed.
///
/// There is no delay between attempts. `attempts` of zero behaves as one.
pub async fn retry<T, E, F, Fut>(attempts: usize, what: &str, mut operation: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
{
    let attempts = attempts.max(1);
    let mut attempt = 1;
    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(err) if attempt < attempts => {
                debug!(%err, attempt, attempts, "{what} failed, retrying");
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}
