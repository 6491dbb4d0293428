//! Delete-then-verify loop.
//!
//! The phoenix DELETE call can answer 200 while the device survives, so its
//! response is only logged. A target counts as deleted once the control
//! endpoint returns 404 for its entity id. Each target gets a bounded number
//! of attempts; targets still present afterwards are handed back as failures.

use crate::api::{RequestId, SmartHomeApi};
use crate::report::Reporter;
use crate::targets::DeletionTarget;
use async_trait::async_trait;
use std::io::Write;
use std::time::Duration;

pub const MAX_ATTEMPTS: u32 = 4;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    /// Pause between attempts. Off unless configured.
    pub delay: Option<Duration>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: MAX_ATTEMPTS,
            delay: None,
        }
    }
}

impl RetryPolicy {
    pub fn with_delay(mut self, delay: Option<Duration>) -> Self {
        self.delay = delay;
        self
    }
}

/// Waits between attempts. Injected so tests never sleep for real.
#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeletionState {
    Confirmed { attempts: u32 },
    Exhausted { attempts: u32 },
}

#[derive(Debug, Clone, PartialEq)]
pub struct DeletionOutcome {
    pub target: DeletionTarget,
    pub state: DeletionState,
}

impl DeletionOutcome {
    pub fn succeeded(&self) -> bool {
        matches!(self.state, DeletionState::Confirmed { .. })
    }

    pub fn attempts(&self) -> u32 {
        match self.state {
            DeletionState::Confirmed { attempts } | DeletionState::Exhausted { attempts } => attempts,
        }
    }
}

/// Deletes one target and confirms it is gone.
///
/// A transport error or timeout on either call uses up the attempt, the same
/// as a verify call that did not return 404.
pub async fn delete_and_verify<A, S, W>(
    api: &A,
    target: &DeletionTarget,
    policy: &RetryPolicy,
    sleeper: &S,
    reporter: &mut Reporter<W>,
) -> DeletionOutcome
where
    A: SmartHomeApi + ?Sized,
    S: Sleeper + ?Sized,
    W: Write,
{
    for attempt in 1..=policy.max_attempts {
        let delete_id = RequestId::new();
        match api.delete_device(&target.device_id_for_url, &delete_id).await {
            Ok(status) => tracing::debug!(entity = %target.entity_id, attempt, status, "delete sent"),
            Err(err) => tracing::warn!(entity = %target.entity_id, attempt, error = %err, "delete call failed"),
        }

        let verify_id = RequestId::new();
        let deleted = match api.check_device_deleted(&target.entity_id, &verify_id).await {
            Ok(deleted) => deleted,
            Err(err) => {
                tracing::warn!(entity = %target.entity_id, attempt, error = %err, "verify call failed");
                false
            }
        };

        if deleted {
            reporter.deleted(target, attempt);
            return DeletionOutcome {
                target: target.clone(),
                state: DeletionState::Confirmed { attempts: attempt },
            };
        }

        reporter.attempt_failed(target, attempt);
        if attempt < policy.max_attempts {
            if let Some(delay) = policy.delay {
                sleeper.sleep(delay).await;
            }
        }
    }

    DeletionOutcome {
        target: target.clone(),
        state: DeletionState::Exhausted {
            attempts: policy.max_attempts,
        },
    }
}

/// Runs every target through [`delete_and_verify`] and returns the ones that
/// could not be confirmed, in order.
pub async fn delete_all<A, S, W>(
    api: &A,
    targets: &[DeletionTarget],
    policy: &RetryPolicy,
    sleeper: &S,
    reporter: &mut Reporter<W>,
) -> Vec<DeletionTarget>
where
    A: SmartHomeApi + ?Sized,
    S: Sleeper + ?Sized,
    W: Write,
{
    let mut failures = Vec::new();
    for target in targets {
        reporter.target_started(target);
        let outcome = delete_and_verify(api, target, policy, sleeper, reporter).await;
        if !outcome.succeeded() {
            failures.push(outcome.target);
        }
    }
    failures
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::{CleanupError, CleanupResult};
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// Reports "still there" for the first `misses` verify calls per entity.
    #[derive(Default)]
    struct FlakyApi {
        misses: HashMap<String, usize>,
        fail_transport: bool,
        deletes: Mutex<Vec<(String, String)>>,
        verifies: Mutex<Vec<(String, String)>>,
    }

    impl FlakyApi {
        fn with_misses(entity_id: &str, misses: usize) -> Self {
            let mut api = FlakyApi::default();
            api.misses.insert(entity_id.to_string(), misses);
            api
        }
    }

    #[async_trait]
    impl SmartHomeApi for FlakyApi {
        async fn list_entities(&self) -> CleanupResult<Option<serde_json::Value>> {
            Ok(None)
        }

        async fn list_endpoints(&self, _request_id: &RequestId) -> CleanupResult<Option<serde_json::Value>> {
            Ok(None)
        }

        async fn delete_device(&self, device_id: &str, request_id: &RequestId) -> CleanupResult<u16> {
            self.deletes
                .lock()
                .unwrap()
                .push((device_id.to_string(), request_id.to_string()));
            if self.fail_transport {
                return Err(CleanupError::Timeout("delete".into(), 10));
            }
            Ok(200)
        }

        async fn check_device_deleted(&self, entity_id: &str, request_id: &RequestId) -> CleanupResult<bool> {
            let mut verifies = self.verifies.lock().unwrap();
            verifies.push((entity_id.to_string(), request_id.to_string()));
            if self.fail_transport {
                return Err(CleanupError::Timeout("verify".into(), 10));
            }
            let seen = verifies.iter().filter(|(id, _)| id == entity_id).count();
            let misses = self.misses.get(entity_id).copied().unwrap_or(0);
            Ok(seen > misses)
        }
    }

    #[derive(Default)]
    struct RecordingSleeper {
        calls: Mutex<Vec<Duration>>,
    }

    #[async_trait]
    impl Sleeper for RecordingSleeper {
        async fn sleep(&self, duration: Duration) {
            self.calls.lock().unwrap().push(duration);
        }
    }

    fn target(id: &str) -> DeletionTarget {
        DeletionTarget {
            name: format!("Device {}", id),
            entity_id: id.to_string(),
            device_id_for_url: format!("light%23{}", id),
            description: format!("light.{} via Home Assistant", id),
        }
    }

    async fn run(api: &FlakyApi, policy: RetryPolicy) -> (DeletionOutcome, String) {
        let mut reporter = Reporter::new(Vec::new());
        let outcome = delete_and_verify(api, &target("e1"), &policy, &TokioSleeper, &mut reporter).await;
        (outcome, String::from_utf8(reporter.into_inner()).unwrap())
    }

    #[tokio::test]
    async fn test_confirmed_after_n_plus_one_attempts() {
        for misses in 0..MAX_ATTEMPTS as usize {
            let api = FlakyApi::with_misses("e1", misses);
            let (outcome, _) = run(&api, RetryPolicy::default()).await;
            assert_eq!(
                outcome.state,
                DeletionState::Confirmed {
                    attempts: misses as u32 + 1
                }
            );
            assert_eq!(api.deletes.lock().unwrap().len(), misses + 1);
        }
    }

    #[tokio::test]
    async fn test_exhausted_after_exactly_four_attempts() {
        for misses in [4, 5, 100] {
            let api = FlakyApi::with_misses("e1", misses);
            let (outcome, text) = run(&api, RetryPolicy::default()).await;
            assert!(!outcome.succeeded());
            assert_eq!(outcome.attempts(), 4);
            assert_eq!(api.deletes.lock().unwrap().len(), 4);
            assert_eq!(api.verifies.lock().unwrap().len(), 4);
            assert!(text.contains("Attempt 4."));
            assert!(!text.contains("Attempt 5."));
        }
    }

    #[tokio::test]
    async fn test_every_call_gets_a_fresh_request_id() {
        let api = FlakyApi::with_misses("e1", 10);
        run(&api, RetryPolicy::default()).await;

        let mut ids: Vec<String> = api.deletes.lock().unwrap().iter().map(|(_, id)| id.clone()).collect();
        ids.extend(api.verifies.lock().unwrap().iter().map(|(_, id)| id.clone()));
        let total = ids.len();
        ids.sort();
        ids.dedup();
        assert_eq!(total, 8);
        assert_eq!(ids.len(), total);
    }

    #[tokio::test]
    async fn test_delete_uses_url_id_and_verify_uses_entity_id() {
        let api = FlakyApi::with_misses("e1", 0);
        run(&api, RetryPolicy::default()).await;
        assert_eq!(api.deletes.lock().unwrap()[0].0, "light%23e1");
        assert_eq!(api.verifies.lock().unwrap()[0].0, "e1");
    }

    #[tokio::test]
    async fn test_transport_errors_consume_attempts() {
        let api = FlakyApi {
            fail_transport: true,
            ..Default::default()
        };
        let (outcome, _) = run(&api, RetryPolicy::default()).await;
        assert_eq!(outcome.state, DeletionState::Exhausted { attempts: 4 });
    }

    #[tokio::test]
    async fn test_delay_only_between_attempts() {
        let api = FlakyApi::with_misses("e1", 10);
        let sleeper = RecordingSleeper::default();
        let policy = RetryPolicy::default().with_delay(Some(Duration::from_millis(200)));
        let mut reporter = Reporter::new(Vec::new());
        delete_and_verify(&api, &target("e1"), &policy, &sleeper, &mut reporter).await;
        assert_eq!(*sleeper.calls.lock().unwrap(), vec![Duration::from_millis(200); 3]);

        let quick = FlakyApi::with_misses("e1", 0);
        let sleeper = RecordingSleeper::default();
        delete_and_verify(&quick, &target("e1"), &policy, &sleeper, &mut reporter).await;
        assert!(sleeper.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_delete_all_collects_only_failures() {
        let mut api = FlakyApi::with_misses("stuck", 99);
        api.misses.insert("slow".into(), 2);
        let targets = vec![target("ok"), target("stuck"), target("slow")];
        let mut reporter = Reporter::new(Vec::new());
        let failures = delete_all(&api, &targets, &RetryPolicy::default(), &TokioSleeper, &mut reporter).await;
        assert_eq!(failures, vec![target("stuck")]);
        assert_eq!(api.deletes.lock().unwrap().len(), 1 + 4 + 3);
    }
}
