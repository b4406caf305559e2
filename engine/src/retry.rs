//! Bounded optimistic retry around admission.
//!
//! Laboratories are exclusive per date and registered dynamically, so their
//! races surface as storage-layer rejections rather than pre-check misses.
//! This wrapper re-reads availability and retries a bounded number of times,
//! and only on the race signal; every policy rejection is final.
//!
//! The decision of whether to keep going is a pure function of the attempt
//! count, so retry policy is unit-testable without a store.

use std::sync::Arc;
use std::time::Duration;

use catalog::store::CatalogStore;
use reservation::store::ReservationStore;

use crate::admission::AdmissionController;
use crate::availability::AvailabilityQuery;
use crate::error::AdmissionError;
use crate::types::{AdmissionOutcome, AdmissionRequest};

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff: Duration::from_millis(500),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryStep {
    RetryAfter(Duration),
    GiveUp,
}

/// What to do once `attempts_used` admissions have already been tried.
pub fn next_step(attempts_used: u32, policy: &RetryPolicy) -> RetryStep {
    if attempts_used >= policy.max_attempts {
        RetryStep::GiveUp
    } else {
        RetryStep::RetryAfter(policy.backoff)
    }
}

pub struct ConflictRetry<C: CatalogStore, R: ReservationStore> {
    admission: Arc<AdmissionController<C, R>>,
    availability: Arc<AvailabilityQuery<C, R>>,
    reservations: Arc<R>,
    policy: RetryPolicy,
}

impl<C, R> ConflictRetry<C, R>
where
    C: CatalogStore + 'static,
    R: ReservationStore + 'static,
{
    pub fn new(
        admission: Arc<AdmissionController<C, R>>,
        availability: Arc<AvailabilityQuery<C, R>>,
        reservations: Arc<R>,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            admission,
            availability,
            reservations,
            policy,
        }
    }

    /// `admit`, retried on lost races up to the policy bound.
    pub async fn admit_with_retry(
        &self,
        req: AdmissionRequest,
    ) -> anyhow::Result<AdmissionOutcome> {
        let mut attempts_used = 0u32;
        loop {
            let outcome = self.admission.admit(req.clone()).await?;
            attempts_used += 1;

            match outcome {
                AdmissionOutcome::Rejected(AdmissionError::RaceLost) => {}
                other => return Ok(other),
            }

            match next_step(attempts_used, &self.policy) {
                RetryStep::GiveUp => {
                    tracing::info!(
                        kind = %req.kind,
                        date = %req.date,
                        attempts_used,
                        "admission kept losing races; giving up"
                    );
                    return Ok(AdmissionOutcome::Rejected(AdmissionError::RaceLost));
                }
                RetryStep::RetryAfter(backoff) => {
                    // Fresh read before racing again: if the winner filled the
                    // date, tell the caller who holds it instead of retrying.
                    let Some(avail) =
                        self.availability.availability(&req.kind, req.date).await?
                    else {
                        return Ok(AdmissionOutcome::Rejected(AdmissionError::NotFound));
                    };

                    if req.slots.is_empty() && avail.remaining == 0 {
                        let held_by = self
                            .reservations
                            .holders_for(&req.kind, req.date)
                            .await?
                            .into_iter()
                            .next();
                        return Ok(AdmissionOutcome::Rejected(
                            AdmissionError::CapacityExceeded { held_by },
                        ));
                    }

                    tokio::time::sleep(backoff).await;
                }
            }
        }
    }
}
