//! "First successful of" combinator
//!
//! Portal path discovery, the channel-listing cascade, `create_link`
//! candidates and proxy user-agent rotation all try an ordered list of
//! candidates and keep the first one that yields something usable. They all
//! go through [`first_successful`] so the ordering and short-circuit rules
//! live in one place.

use std::future::Future;

/// Try `attempt` on each candidate in order and return the first `Some`.
///
/// Candidates are awaited sequentially; later candidates are never started
/// once one succeeds.
pub async fn first_successful<C, T, F, Fut>(
    candidates: impl IntoIterator<Item = C>,
    mut attempt: F,
) -> Option<T>
where
    F: FnMut(C) -> Fut,
    Fut: Future<Output = Option<T>>,
{
    for candidate in candidates {
        if let Some(value) = attempt(candidate).await {
            return Some(value);
        }
    }
    None
}
