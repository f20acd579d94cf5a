//! Page-existence probing and last-page discovery.
//!
//! The page store has no "how many pages?" endpoint, so the true extent of a
//! magazine has to be measured: probe single pages at the cheapest raster
//! tier and classify by HTTP status alone. An adaptive step search jumps
//! forward while pages exist and halves its stride on every miss, pinning
//! the exists/missing boundary to a single page in
//! O(log(initial jump) + final linear walk) probes.
//!
//! ## Why a trait seam?
//!
//! The discovery loop's correctness is independent of HTTP. Putting the
//! probe behind [`PageProber`] lets the tests drive it with a synthetic
//! oracle (pages `0..=N` exist) and assert probe counts, while production
//! uses [`HttpProber`] over the real store.

use crate::error::MagdownError;
use crate::url::PageUrl;
use std::time::Duration;
use tracing::{debug, trace};

/// Outcome of checking one page.
///
/// Only 200 and 404 are expected from the store; any other status is carried
/// out as data and treated as fatal by the discovery loop — never retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeResult {
    /// HTTP 200 — the page exists.
    Exists,
    /// HTTP 404 — the page does not exist.
    Missing,
    /// Anything else.
    UnexpectedStatus(u16),
}

/// A lightweight existence check for one remote page.
pub trait PageProber {
    /// Probe one zero-based page index. Transport failures are fatal.
    fn probe(
        &self,
        index: u32,
    ) -> impl std::future::Future<Output = Result<ProbeResult, MagdownError>> + Send;
}

/// Probes the real page store over HTTP, body discarded.
pub struct HttpProber {
    client: reqwest::Client,
    template: PageUrl,
}

impl HttpProber {
    pub fn new(client: reqwest::Client, template: PageUrl) -> Self {
        Self { client, template }
    }
}

impl PageProber for HttpProber {
    async fn probe(&self, index: u32) -> Result<ProbeResult, MagdownError> {
        let url = self.template.probe_url(index);
        trace!(%url, "probing");
        let response =
            self.client
                .get(&url)
                .send()
                .await
                .map_err(|e| MagdownError::Transport {
                    url: url.clone(),
                    reason: e.to_string(),
                })?;
        Ok(match response.status().as_u16() {
            200 => ProbeResult::Exists,
            404 => ProbeResult::Missing,
            code => ProbeResult::UnexpectedStatus(code),
        })
    }
}

/// Initial forward stride, and also the consecutive-miss budget.
pub const INITIAL_JUMP: u32 = 20;

/// Result of a completed discovery run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Discovery {
    /// Highest zero-based page index that exists.
    pub last_page: u32,
    /// Probes spent finding it.
    pub probes: u32,
}

/// Find the highest zero-based page index that exists, starting at `start`.
///
/// Strategy: while pages exist, jump forward `jump` pages at a time. On a
/// miss, remember the miss, halve the stride (floor 1) and step back. The
/// search ends when the last known good page sits directly below the nearest
/// known bad one. `delay_ms` sleeps between successive probes as courtesy to
/// the host; it does not affect the search itself.
///
/// # Errors
/// - [`MagdownError::DiscoveryExhausted`] after [`INITIAL_JUMP`] consecutive
///   misses with no page ever found.
/// - [`MagdownError::UnexpectedProbeStatus`] on any status other than
///   200/404 — the store is telling us something probing cannot fix.
pub async fn discover_last_page<P: PageProber>(
    prober: &P,
    start: u32,
    delay_ms: u64,
) -> Result<Discovery, MagdownError> {
    let mut jump = INITIAL_JUMP;
    let mut index = start;
    let mut last_good: Option<u32> = None;
    let mut last_bad: Option<u32> = None;
    let mut misses: u32 = 0;
    let mut probes: u32 = 0;

    loop {
        probes += 1;
        match prober.probe(index).await? {
            ProbeResult::Exists => {
                debug!(page = index, "exists");
                last_good = Some(index);
                misses = 0;
                if last_bad == Some(index + 1) {
                    // Gap closed to a single page: boundary pinned.
                    debug!(last_page = index, probes, "discovery complete");
                    return Ok(Discovery {
                        last_page: index,
                        probes,
                    });
                }
                index += jump;
            }
            ProbeResult::Missing => {
                debug!(page = index, jump, "missing");
                last_bad = Some(index);
                misses += 1;
                if last_good.is_none() && misses >= INITIAL_JUMP {
                    return Err(MagdownError::DiscoveryExhausted { start, misses });
                }
                jump = (jump / 2).max(1);
                index = index.saturating_sub(jump);
            }
            ProbeResult::UnexpectedStatus(status) => {
                return Err(MagdownError::UnexpectedProbeStatus {
                    page: index,
                    status,
                });
            }
        }

        if delay_ms > 0 {
            tokio::time::sleep(Duration::from_millis(delay_ms)).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Synthetic store: pages `0..page_count` exist. Records every probe.
    struct Oracle {
        page_count: u32,
        probed: Mutex<Vec<u32>>,
    }

    impl Oracle {
        fn new(page_count: u32) -> Self {
            Self {
                page_count,
                probed: Mutex::new(Vec::new()),
            }
        }

        fn probe_count(&self) -> usize {
            self.probed.lock().unwrap().len()
        }
    }

    impl PageProber for Oracle {
        async fn probe(&self, index: u32) -> Result<ProbeResult, MagdownError> {
            self.probed.lock().unwrap().push(index);
            Ok(if index < self.page_count {
                ProbeResult::Exists
            } else {
                ProbeResult::Missing
            })
        }
    }

    /// Always returns the given status.
    struct FixedStatus(u16);

    impl PageProber for FixedStatus {
        async fn probe(&self, _index: u32) -> Result<ProbeResult, MagdownError> {
            Ok(ProbeResult::UnexpectedStatus(self.0))
        }
    }

    #[tokio::test]
    async fn finds_boundary_of_42_page_magazine() {
        let oracle = Oracle::new(42);
        let found = discover_last_page(&oracle, 0, 0).await.unwrap();
        assert_eq!(found.last_page, 41);
        assert_eq!(found.probes as usize, oracle.probe_count());
    }

    #[tokio::test]
    async fn probe_count_is_logarithmic_not_linear() {
        let oracle = Oracle::new(42);
        discover_last_page(&oracle, 0, 0).await.unwrap();
        // 3 forward jumps + ~log2(20) narrowing + short linear walk.
        assert!(
            oracle.probe_count() <= 12,
            "took {} probes",
            oracle.probe_count()
        );
    }

    #[tokio::test]
    async fn empty_store_exhausts_miss_budget() {
        let oracle = Oracle::new(0);
        let err = discover_last_page(&oracle, 0, 0).await.unwrap_err();
        match err {
            MagdownError::DiscoveryExhausted { misses, .. } => {
                assert_eq!(misses, INITIAL_JUMP)
            }
            other => panic!("expected exhaustion, got {other:?}"),
        }
        // The clamp keeps every probe at a valid (non-negative) index.
        assert!(oracle.probed.lock().unwrap().iter().all(|&i| i == 0));
    }

    #[tokio::test]
    async fn single_page_store_resolves_to_zero() {
        let oracle = Oracle::new(1);
        let found = discover_last_page(&oracle, 0, 0).await.unwrap();
        assert_eq!(found.last_page, 0);
    }

    #[tokio::test]
    async fn start_past_the_end_still_converges() {
        // Start probing at 30 when only 0..=9 exist: all early probes miss,
        // the stride collapses and the walk backs into the boundary.
        let oracle = Oracle::new(10);
        let found = discover_last_page(&oracle, 30, 0).await.unwrap();
        assert_eq!(found.last_page, 9);
    }

    #[tokio::test]
    async fn large_magazine_from_midpoint() {
        let oracle = Oracle::new(250);
        let found = discover_last_page(&oracle, 100, 0).await.unwrap();
        assert_eq!(found.last_page, 249);
    }

    #[tokio::test]
    async fn unexpected_status_is_fatal_not_retried() {
        let prober = FixedStatus(503);
        let err = discover_last_page(&prober, 0, 0).await.unwrap_err();
        match err {
            MagdownError::UnexpectedProbeStatus { status, .. } => assert_eq!(status, 503),
            other => panic!("expected UnexpectedProbeStatus, got {other:?}"),
        }
    }
}
