//! Adviser linking codes
//!
//! Codes are three groups of four uppercase letters (`XXXX-XXXX-XXXX`).
//! The issuer only guarantees a code was free when it was checked; the
//! store's unique constraint on insert closes the race between requests.

use capstone_kernel::{PolicyError, PolicyResult, PortalStore};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Default ceiling on candidates tried per issuance.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 10;

const GROUPS: usize = 3;
const GROUP_LEN: usize = 4;

/// Draw one candidate code from `rng`.
pub fn generate_candidate<R: Rng + ?Sized>(rng: &mut R) -> String {
    let mut code = String::with_capacity(GROUPS * GROUP_LEN + GROUPS - 1);
    for group in 0..GROUPS {
        if group > 0 {
            code.push('-');
        }
        for _ in 0..GROUP_LEN {
            code.push(char::from(rng.gen_range(b'A'..=b'Z')));
        }
    }
    code
}

/// Issues adviser codes absent from the store's code index.
#[derive(Clone)]
pub struct CodeIssuer {
    store: Arc<dyn PortalStore>,
    max_attempts: u32,
}

impl CodeIssuer {
    pub fn new(store: Arc<dyn PortalStore>) -> Self {
        Self::with_max_attempts(store, DEFAULT_MAX_ATTEMPTS)
    }

    pub fn with_max_attempts(store: Arc<dyn PortalStore>, max_attempts: u32) -> Self {
        Self {
            store,
            max_attempts: max_attempts.max(1),
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Issue a code from a freshly seeded RNG.
    pub async fn issue_unique_code(&self) -> PolicyResult<String> {
        let attempts = AtomicU32::new(0);
        self.issue_counted(&mut StdRng::from_entropy(), &attempts)
            .await
    }

    /// Issue a code drawing candidates from `rng`.
    pub async fn issue_with_rng<R: Rng + Send>(&self, rng: &mut R) -> PolicyResult<String> {
        let attempts = AtomicU32::new(0);
        self.issue_counted(rng, &attempts).await
    }

    /// [`issue_unique_code`](Self::issue_unique_code) with a wall-clock ceiling.
    ///
    /// A stalled store is reported as `IssuanceTimedOut`, which callers may
    /// retry, with the number of candidates tried before the deadline.
    pub async fn issue_with_timeout(&self, deadline: Duration) -> PolicyResult<String> {
        let attempts = AtomicU32::new(0);
        let mut rng = StdRng::from_entropy();
        match tokio::time::timeout(deadline, self.issue_counted(&mut rng, &attempts)).await {
            Ok(result) => result,
            Err(_) => {
                let tried = attempts.load(Ordering::SeqCst);
                warn!(attempts = tried, ?deadline, "code issuance timed out");
                Err(PolicyError::IssuanceTimedOut {
                    attempts: tried,
                    waited_ms: u64::try_from(deadline.as_millis()).unwrap_or(u64::MAX),
                })
            }
        }
    }

    async fn issue_counted<R: Rng + Send>(
        &self,
        rng: &mut R,
        attempts: &AtomicU32,
    ) -> PolicyResult<String> {
        for attempt in 1..=self.max_attempts {
            attempts.store(attempt, Ordering::SeqCst);
            let candidate = generate_candidate(rng);

            // deleted holders still count; their codes may be restored
            if self.store.find_adviser_by_code(&candidate).await?.is_none() {
                info!(attempt, "issued adviser code");
                return Ok(candidate);
            }
            debug!(attempt, "adviser code collision");
        }

        warn!(attempts = self.max_attempts, "adviser code space exhausted");
        Err(PolicyError::CodeSpaceExhausted {
            attempts: self.max_attempts,
        })
    }
}
