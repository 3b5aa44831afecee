//! Confirmation polling
//!
//! After submission the poller waits, fetches the transaction and looks for
//! the module's execution in its metadata:
//!
//! ```text
//! Submitted ──► Waiting ──► Fetching ──┬──► Found(outcome)
//!                  ▲                   ├──► NotFound
//!                  └── not validated ──┘
//! ```
//!
//! Waits grow by a capped backoff factor. The loop ends with
//! `ConfirmationTimeout` once the ledger passes the transaction's validity
//! window, or `TimedOut` when the caller's deadline expires first. Dropping
//! the future cancels the wait.
//!
//! The open ledger moves past the window as soon as the last eligible ledger
//! closes, which is before that ledger is validated. A transaction already
//! included in a ledger inside the window is therefore waited on until it
//! validates, and a missing one gets one more fetch before the poller gives up.

use std::sync::Arc;
use std::time::Duration;

use relay_core::{AccountId, Hash256};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{RelayError, Result};
use crate::ledger::{LedgerClient, ModuleExecution, TransactionRecord, EXECUTION_ACCEPTED, EXECUTION_ROLLED_BACK};

/// Backoff and deadline for one confirmation
#[derive(Clone, Debug, PartialEq)]
pub struct PollSettings {
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub backoff_factor: f64,
    /// Upper bound on the whole wait
    pub deadline: Duration,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(8),
            backoff_factor: 2.0,
            deadline: Duration::from_secs(120),
        }
    }
}

/// Shortest wait between two fetches
const MIN_DELAY: Duration = Duration::from_millis(100);

impl PollSettings {
    fn first_delay(&self) -> Duration {
        self.initial_delay.max(MIN_DELAY)
    }

    fn next_delay(&self, current: Duration) -> Duration {
        let scaled = current.as_secs_f64() * self.backoff_factor.max(1.0);
        Duration::try_from_secs_f64(scaled)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
            .max(MIN_DELAY)
    }
}

/// How the module treated the instruction
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionClass {
    Accepted,
    Rejected,
    /// Rejected by the sequence check
    ReplayRejected,
}

/// Module execution decoded for the caller
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionOutcome {
    pub account: AccountId,
    pub return_code: u64,
    /// Return string as text
    pub return_string: String,
    pub result: Option<u8>,
}

impl ExecutionOutcome {
    pub fn from_execution(execution: &ModuleExecution) -> Self {
        let bytes = hex::decode(&execution.return_string_hex).unwrap_or_else(|_| {
            execution.return_string_hex.as_bytes().to_vec()
        });
        let text = String::from_utf8_lossy(&bytes);
        Self {
            account: execution.account,
            return_code: execution.return_code,
            return_string: text.trim_end_matches('\0').to_string(),
            result: execution.result,
        }
    }

    /// Accepted, rejected, or rejected as a replay.
    ///
    /// The ledger does not say why a module rolled back, so replays are told
    /// apart by the sequence check's return string.
    pub fn classify(&self) -> ExecutionClass {
        let accepted = match self.result {
            Some(EXECUTION_ACCEPTED) => true,
            Some(EXECUTION_ROLLED_BACK) => false,
            _ => self.return_code == 0,
        };
        if accepted {
            ExecutionClass::Accepted
        } else if self.return_string.to_lowercase().contains("sequence") {
            ExecutionClass::ReplayRejected
        } else {
            ExecutionClass::Rejected
        }
    }
}

/// Result of a finished wait
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Confirmation {
    /// Validated with an execution on the module account
    Found(ExecutionOutcome),
    /// Validated, but the module did not run
    NotFound,
}

/// Poller state, logged as it changes
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PollState {
    Submitted,
    Waiting { attempt: u32 },
    Fetching { attempt: u32 },
    Done,
}

/// Waits for a submitted transaction's module outcome
pub struct ConfirmationPoller<L: ?Sized> {
    ledger: Arc<L>,
    settings: PollSettings,
}

impl<L: LedgerClient + ?Sized> ConfirmationPoller<L> {
    pub fn new(ledger: Arc<L>, settings: PollSettings) -> Self {
        Self { ledger, settings }
    }

    pub fn settings(&self) -> &PollSettings {
        &self.settings
    }

    /// Wait up to `timeout_ledgers` ledgers past the current one
    pub async fn confirm(
        &self,
        tx_id: &Hash256,
        module: &AccountId,
        timeout_ledgers: u32,
    ) -> Result<Confirmation> {
        let current = self.ledger.current_ledger().await?;
        self.confirm_until(tx_id, module, current.saturating_add(timeout_ledgers))
            .await
    }

    /// Wait until the ledger passes `last_ledger`
    pub async fn confirm_until(
        &self,
        tx_id: &Hash256,
        module: &AccountId,
        last_ledger: u32,
    ) -> Result<Confirmation> {
        match tokio::time::timeout(self.settings.deadline, self.poll(tx_id, module, last_ledger)).await {
            Ok(result) => result,
            Err(_) => {
                warn!(tx = %tx_id, "deadline expired before confirmation");
                Err(RelayError::TimedOut(*tx_id))
            }
        }
    }

    async fn poll(&self, tx_id: &Hash256, module: &AccountId, last_ledger: u32) -> Result<Confirmation> {
        let mut state = PollState::Submitted;
        let mut delay = self.settings.first_delay();
        let mut attempt = 0u32;
        let mut window_passed = false;
        debug!(tx = %tx_id, ?state, last_ledger, "confirmation started");

        loop {
            attempt += 1;
            state = PollState::Waiting { attempt };
            debug!(tx = %tx_id, ?state, delay_ms = delay.as_millis() as u64, "waiting");
            countdown(delay).await;

            state = PollState::Fetching { attempt };
            debug!(tx = %tx_id, ?state, "fetching");
            let included = match self.ledger.fetch_transaction(tx_id).await? {
                Some(record) if record.validated => {
                    state = PollState::Done;
                    debug!(tx = %tx_id, ?state, "validated");
                    return Ok(find_outcome(&record, module));
                }
                Some(record) => record.ledger_index,
                None => None,
            };

            let current = self.ledger.current_ledger().await?;
            if current > last_ledger {
                match included {
                    Some(index) if index <= last_ledger => {
                        debug!(tx = %tx_id, index, current, "included in window, awaiting validation");
                    }
                    _ if !window_passed => {
                        window_passed = true;
                        debug!(tx = %tx_id, current, last_ledger, "window passed, fetching once more");
                    }
                    _ => {
                        warn!(tx = %tx_id, current, last_ledger, "validity window passed");
                        return Err(RelayError::ConfirmationTimeout {
                            tx_id: *tx_id,
                            last_ledger,
                        });
                    }
                }
            }
            delay = self.settings.next_delay(delay);
        }
    }
}

/// Sleep for `total`, logging the remaining whole seconds
async fn countdown(total: Duration) {
    let tick = Duration::from_secs(1);
    let mut remaining = total;
    while !remaining.is_zero() {
        debug!(remaining_secs = remaining.as_secs_f32().ceil() as u64, "countdown");
        let step = remaining.min(tick);
        tokio::time::sleep(step).await;
        remaining -= step;
    }
}

/// Module outcome in a validated transaction's metadata
pub fn find_outcome(record: &TransactionRecord, module: &AccountId) -> Confirmation {
    match record.executions.iter().find(|e| e.account == *module) {
        Some(execution) => {
            let outcome = ExecutionOutcome::from_execution(execution);
            info!(
                tx = %record.id,
                code = outcome.return_code,
                result = %outcome.return_string,
                "module returned"
            );
            Confirmation::Found(outcome)
        }
        None => {
            info!(tx = %record.id, "no execution for module account");
            Confirmation::NotFound
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::SubmitResult;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use relay_protocol::StateEntry;
    use std::collections::VecDeque;

    const MODULE: AccountId = AccountId::new([9; 20]);

    /// Replays scripted fetch results; the ledger index rises on each query
    struct ScriptedLedger {
        fetches: Mutex<VecDeque<Option<TransactionRecord>>>,
        ledger: Mutex<u32>,
    }

    impl ScriptedLedger {
        fn new(fetches: Vec<Option<TransactionRecord>>) -> Arc<Self> {
            Arc::new(Self {
                fetches: Mutex::new(fetches.into()),
                ledger: Mutex::new(100),
            })
        }
    }

    #[async_trait]
    impl LedgerClient for ScriptedLedger {
        async fn submit(&self, _blob: &[u8]) -> Result<SubmitResult> {
            unreachable!()
        }

        async fn fetch_transaction(&self, _id: &Hash256) -> Result<Option<TransactionRecord>> {
            Ok(self.fetches.lock().pop_front().flatten())
        }

        async fn fetch_account_state(&self, _account: &AccountId) -> Result<Vec<StateEntry>> {
            Ok(Vec::new())
        }

        async fn account_sequence(&self, _account: &AccountId) -> Result<u32> {
            Ok(1)
        }

        async fn current_ledger(&self) -> Result<u32> {
            let mut ledger = self.ledger.lock();
            *ledger += 1;
            Ok(*ledger)
        }
    }

    fn record(validated: bool, executions: Vec<ModuleExecution>) -> TransactionRecord {
        record_in(Some(101), validated, executions)
    }

    fn record_in(ledger_index: Option<u32>, validated: bool, executions: Vec<ModuleExecution>) -> TransactionRecord {
        TransactionRecord {
            id: Hash256::new([1; 32]),
            validated,
            ledger_index,
            result: Some("tesSUCCESS".to_string()),
            executions,
        }
    }

    fn execution(account: AccountId, text: &str, result: u8, code: u64) -> ModuleExecution {
        ModuleExecution {
            account,
            return_code: code,
            return_string_hex: hex::encode_upper(text),
            result: Some(result),
        }
    }

    fn settings() -> PollSettings {
        PollSettings {
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(2),
            backoff_factor: 2.0,
            deadline: Duration::from_secs(60),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_found_after_pending() {
        let ledger = ScriptedLedger::new(vec![
            None,
            Some(record(false, Vec::new())),
            Some(record(
                true,
                vec![
                    execution(AccountId::new([1; 20]), "other", EXECUTION_ACCEPTED, 0),
                    execution(MODULE, "Liteacc: [2] User balance is 5", EXECUTION_ACCEPTED, 0),
                ],
            )),
        ]);
        let poller = ConfirmationPoller::new(ledger, settings());
        let confirmation = poller.confirm(&Hash256::new([1; 32]), &MODULE, 20).await.unwrap();

        match confirmation {
            Confirmation::Found(outcome) => {
                assert_eq!(outcome.return_string, "Liteacc: [2] User balance is 5");
                assert_eq!(outcome.classify(), ExecutionClass::Accepted);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_validated_without_execution() {
        let ledger = ScriptedLedger::new(vec![Some(record(true, Vec::new()))]);
        let poller = ConfirmationPoller::new(ledger, settings());
        let confirmation = poller.confirm(&Hash256::new([1; 32]), &MODULE, 20).await.unwrap();
        assert_eq!(confirmation, Confirmation::NotFound);
    }

    #[tokio::test(start_paused = true)]
    async fn test_window_passes() {
        let ledger = ScriptedLedger::new(Vec::new());
        let poller = ConfirmationPoller::new(ledger, settings());
        let err = poller.confirm(&Hash256::new([1; 32]), &MODULE, 3).await.unwrap_err();
        assert!(matches!(err, RelayError::ConfirmationTimeout { last_ledger: 104, .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_validates_in_last_ledger_after_it_closes() {
        // Included in ledger 101 while the open ledger is already 102 and beyond
        let accepted = execution(MODULE, "Liteacc: [2] User balance is 5", EXECUTION_ACCEPTED, 0);
        let ledger = ScriptedLedger::new(vec![
            Some(record_in(Some(101), false, Vec::new())),
            Some(record_in(Some(101), false, Vec::new())),
            Some(record_in(Some(101), true, vec![accepted])),
        ]);
        let poller = ConfirmationPoller::new(ledger, settings());
        let confirmation = poller
            .confirm_until(&Hash256::new([1; 32]), &MODULE, 101)
            .await
            .unwrap();
        assert!(matches!(confirmation, Confirmation::Found(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_fetches_once_more_after_window() {
        let ledger = ScriptedLedger::new(vec![
            Some(record_in(None, false, Vec::new())),
            Some(record_in(Some(100), true, Vec::new())),
        ]);
        let poller = ConfirmationPoller::new(ledger, settings());
        let confirmation = poller
            .confirm_until(&Hash256::new([1; 32]), &MODULE, 100)
            .await
            .unwrap();
        assert_eq!(confirmation, Confirmation::NotFound);
    }

    #[tokio::test(start_paused = true)]
    async fn test_included_outside_window_times_out() {
        let ledger = ScriptedLedger::new(vec![
            Some(record_in(Some(103), false, Vec::new())),
            Some(record_in(Some(103), false, Vec::new())),
            Some(record_in(Some(103), false, Vec::new())),
        ]);
        let poller = ConfirmationPoller::new(ledger, settings());
        let err = poller
            .confirm_until(&Hash256::new([1; 32]), &MODULE, 100)
            .await
            .unwrap_err();
        assert!(matches!(err, RelayError::ConfirmationTimeout { last_ledger: 100, .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline() {
        let ledger = ScriptedLedger::new(Vec::new());
        let poller = ConfirmationPoller::new(
            ledger,
            PollSettings {
                deadline: Duration::from_secs(5),
                ..settings()
            },
        );
        let err = poller
            .confirm(&Hash256::new([1; 32]), &MODULE, 1_000_000)
            .await
            .unwrap_err();
        assert!(matches!(err, RelayError::TimedOut(_)));
    }

    #[test]
    fn test_backoff_is_capped() {
        let s = settings();
        let mut delay = s.initial_delay;
        for _ in 0..10 {
            delay = s.next_delay(delay);
        }
        assert_eq!(delay, s.max_delay);
    }

    #[test]
    fn test_extreme_backoff_is_clamped() {
        for factor in [1e30, f64::INFINITY, f64::NAN] {
            let s = PollSettings {
                backoff_factor: factor,
                ..settings()
            };
            let delay = s.next_delay(s.first_delay());
            assert!(delay <= s.max_delay, "factor {} gave {:?}", factor, delay);
            assert!(delay >= MIN_DELAY);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_initial_delay_still_waits() {
        let ledger = ScriptedLedger::new(Vec::new());
        let poller = ConfirmationPoller::new(
            ledger,
            PollSettings {
                initial_delay: Duration::ZERO,
                backoff_factor: 1.0,
                ..settings()
            },
        );
        let started = tokio::time::Instant::now();
        let err = poller.confirm_until(&Hash256::new([1; 32]), &MODULE, 102).await.unwrap_err();
        assert!(matches!(err, RelayError::ConfirmationTimeout { .. }));
        assert!(started.elapsed() >= MIN_DELAY * 3);
    }

    #[test]
    fn test_classify() {
        let outcome = |text: &str, result: u8, code: u64| {
            ExecutionOutcome::from_execution(&execution(MODULE, text, result, code))
        };
        assert_eq!(
            outcome("Liteacc: [3] Last sequence is >= provided sequence number.", EXECUTION_ROLLED_BACK, 130).classify(),
            ExecutionClass::ReplayRejected
        );
        assert_eq!(
            outcome("Liteacc: [3] Invalid signature in memo.", EXECUTION_ROLLED_BACK, 60).classify(),
            ExecutionClass::Rejected
        );
        assert_eq!(
            outcome("Blacklist: Processed + 1", EXECUTION_ACCEPTED, 0).classify(),
            ExecutionClass::Accepted
        );
    }

    #[test]
    fn test_return_string_trims_nul() {
        let mut exec = execution(MODULE, "ok", EXECUTION_ACCEPTED, 0);
        exec.return_string_hex.push_str("00");
        assert_eq!(ExecutionOutcome::from_execution(&exec).return_string, "ok");
    }
}
