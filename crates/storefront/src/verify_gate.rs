//! One OTP verification in flight per session.
//!
//! The session store only sees a request's changes once its response is
//! written, so a `Verifying` step in the session cannot stop a second
//! submit that arrives while the first verify call is still out. The gate
//! is an in-process entry per session key, claimed atomically.

use std::time::Duration;

use moka::future::Cache;

/// Sessions with a verify call in flight.
#[derive(Clone)]
pub struct VerifyGate {
    in_flight: Cache<String, ()>,
}

impl VerifyGate {
    /// Create a gate. An entry left behind by a request that never released
    /// it lapses after `hold`.
    #[must_use]
    pub fn new(hold: Duration) -> Self {
        Self {
            in_flight: Cache::builder()
                .max_capacity(100_000)
                .time_to_live(hold)
                .build(),
        }
    }

    /// Claim the gate for `key`, or `None` if another request holds it.
    pub async fn try_claim(&self, key: &str) -> Option<VerifyPermit> {
        let entry = self.in_flight.entry_by_ref(key).or_insert(()).await;
        entry.is_fresh().then(|| VerifyPermit {
            gate: self.clone(),
            key: Some(key.to_owned()),
        })
    }

    async fn release(&self, key: &str) {
        self.in_flight.invalidate(key).await;
    }
}

/// Held for the duration of one verify call.
pub struct VerifyPermit {
    gate: VerifyGate,
    key: Option<String>,
}

impl VerifyPermit {
    /// Open the gate again.
    pub async fn release(mut self) {
        if let Some(key) = self.key.take() {
            self.gate.release(&key).await;
        }
    }
}

impl Drop for VerifyPermit {
    fn drop(&mut self) {
        // Early return without `release`: open the gate in the background
        if let Some(key) = self.key.take() {
            let gate = self.gate.clone();
            tokio::spawn(async move { gate.release(&key).await });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_second_claim_is_refused_until_release() {
        let gate = VerifyGate::new(Duration::from_secs(30));

        let permit = gate.try_claim("s1").await;
        assert!(permit.is_some());
        assert!(gate.try_claim("s1").await.is_none());
        assert!(gate.try_claim("s2").await.is_some());

        if let Some(permit) = permit {
            permit.release().await;
        }
        assert!(gate.try_claim("s1").await.is_some());
    }

    #[tokio::test]
    async fn test_dropped_permit_opens_gate() {
        let gate = VerifyGate::new(Duration::from_secs(30));
        drop(gate.try_claim("s1").await);
        tokio::task::yield_now().await;
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(gate.try_claim("s1").await.is_some());
    }
}
