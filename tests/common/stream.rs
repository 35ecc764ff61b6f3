//! Stream collection for walk tests.

use futures_core::Stream;
use std::future::poll_fn;
use std::pin::Pin;

/// Collect at most `limit` items, so a runaway walk cannot hang a test.
pub async fn collect_stream<S, T, E>(mut stream: S, limit: usize) -> Vec<Result<T, E>>
where
    S: Stream<Item = Result<T, E>> + Unpin,
{
    let mut results = Vec::new();
    while results.len() < limit {
        match poll_fn(|cx| Pin::new(&mut stream).poll_next(cx)).await {
            Some(result) => results.push(result),
            None => break,
        }
    }
    results
}
