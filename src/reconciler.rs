//! Client State Reconciler
//!
//! Fetches the transaction ledger after every state-changing action and
//! derives the displayed balance from it. Overlapping refreshes are ordered
//! by request: each fetch takes a sequence number when it is issued and its
//! result is applied only if no later-issued fetch has been applied already.

use async_trait::async_trait;
use parking_lot::Mutex;
use rust_decimal::Decimal;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, info, warn};

use crate::api::error::LedgerFetchError;
use crate::ledger::{compute_balance, Balance, Ledger, Reconciliation};
use crate::models::GameId;

/// Anything that can produce the current ledger for a session.
#[async_trait]
pub trait LedgerSource: Send + Sync {
    async fn fetch_ledger(&self, game_id: &GameId) -> Result<Ledger, LedgerFetchError>;
}

/// Render target for the reconciled balance.
pub trait BalanceSink: Send + Sync {
    fn show_balance(&self, update: &BalanceUpdate);
}

/// What gets rendered after a successful reconciliation.
#[derive(Debug, Clone, PartialEq)]
pub struct BalanceUpdate {
    pub seq: u64,
    pub balance: Balance,
    pub applied: usize,
    pub skipped: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RefreshOutcome {
    Applied {
        seq: u64,
        ledger: Ledger,
        reconciliation: Reconciliation,
    },
    /// A later-issued fetch was applied first; this result was dropped.
    StaleResponseDiscarded { seq: u64, latest: u64 },
}

impl RefreshOutcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, RefreshOutcome::Applied { .. })
    }
}

#[derive(Debug, Default)]
struct Displayed {
    last_applied: u64,
    balance: Option<Balance>,
}

/// Per-session reconciler. Share it behind an `Arc` to refresh concurrently.
#[derive(Debug)]
pub struct Reconciler {
    starting_balance: Decimal,
    next_seq: AtomicU64,
    displayed: Mutex<Displayed>,
}

impl Reconciler {
    pub fn new(starting_balance: Decimal) -> Self {
        Self {
            starting_balance,
            next_seq: AtomicU64::new(1),
            displayed: Mutex::new(Displayed::default()),
        }
    }

    pub fn starting_balance(&self) -> Decimal {
        self.starting_balance
    }

    /// Balance currently on display, if any refresh has been applied.
    pub fn displayed_balance(&self) -> Option<Balance> {
        self.displayed.lock().balance
    }

    pub fn last_applied_seq(&self) -> u64 {
        self.displayed.lock().last_applied
    }

    /// Reserve the sequence number for a fetch about to be issued.
    pub fn issue(&self) -> u64 {
        self.next_seq.fetch_add(1, Ordering::SeqCst)
    }

    /// Apply a fetched ledger under `seq` unless a newer one is already shown.
    ///
    /// The staleness check, state update and render happen under one lock so a
    /// stale result can never be rendered over a fresh one.
    pub fn apply(&self, seq: u64, ledger: Ledger, sink: &dyn BalanceSink) -> RefreshOutcome {
        let mut displayed = self.displayed.lock();
        if seq <= displayed.last_applied {
            debug!(
                seq,
                latest = displayed.last_applied,
                "discarding stale ledger response"
            );
            return RefreshOutcome::StaleResponseDiscarded {
                seq,
                latest: displayed.last_applied,
            };
        }

        let reconciliation = compute_balance(&ledger, self.starting_balance);
        displayed.last_applied = seq;
        displayed.balance = Some(reconciliation.balance);

        sink.show_balance(&BalanceUpdate {
            seq,
            balance: reconciliation.balance,
            applied: reconciliation.applied,
            skipped: reconciliation.skipped(),
        });

        info!(
            seq,
            records = ledger.len(),
            skipped = reconciliation.skipped(),
            balance = %reconciliation.balance.amount(),
            "ledger reconciled"
        );

        RefreshOutcome::Applied {
            seq,
            ledger,
            reconciliation,
        }
    }

    /// Fetch the ledger, recompute the balance and render it.
    ///
    /// On fetch failure nothing is rendered and the displayed balance stays
    /// as it was.
    pub async fn refresh_and_display<L>(
        &self,
        source: &L,
        game_id: &GameId,
        sink: &dyn BalanceSink,
    ) -> Result<RefreshOutcome, LedgerFetchError>
    where
        L: LedgerSource + ?Sized,
    {
        let seq = self.issue();
        match source.fetch_ledger(game_id).await {
            Ok(ledger) => Ok(self.apply(seq, ledger, sink)),
            Err(e) => {
                warn!(seq, game_id = %game_id, error = %e, "ledger refresh failed, keeping previous balance");
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::error::ApiError;
    use crate::ledger::TransactionRecord;
    use std::collections::HashMap;
    use std::sync::Arc;
    use tokio::sync::oneshot;

    #[derive(Default)]
    struct RecordingSink {
        shown: Mutex<Vec<BalanceUpdate>>,
    }

    impl RecordingSink {
        fn balances(&self) -> Vec<Decimal> {
            self.shown.lock().iter().map(|u| u.balance.amount()).collect()
        }
    }

    impl BalanceSink for RecordingSink {
        fn show_balance(&self, update: &BalanceUpdate) {
            self.shown.lock().push(update.clone());
        }
    }

    struct FixedSource(Result<Vec<TransactionRecord>, ()>);

    #[async_trait]
    impl LedgerSource for FixedSource {
        async fn fetch_ledger(&self, _game_id: &GameId) -> Result<Ledger, LedgerFetchError> {
            match &self.0 {
                Ok(records) => Ok(Ledger::new(records.clone())),
                Err(()) => Err(ApiError::Timeout {
                    endpoint: "/game/history",
                }
                .into()),
            }
        }
    }

    /// Each fetch blocks until the test releases it with a ledger, so
    /// responses can be delivered out of order.
    #[derive(Default)]
    struct GatedSource {
        gates: Mutex<HashMap<String, oneshot::Receiver<Ledger>>>,
    }

    #[async_trait]
    impl LedgerSource for GatedSource {
        async fn fetch_ledger(&self, game_id: &GameId) -> Result<Ledger, LedgerFetchError> {
            let rx = self
                .gates
                .lock()
                .remove(game_id.as_str())
                .expect("gate registered");
            Ok(rx.await.expect("gate released"))
        }
    }

    fn deposit(amount: i64) -> TransactionRecord {
        TransactionRecord::deposit("2025-01-01", Decimal::from(amount), "test")
    }

    #[tokio::test]
    async fn refresh_renders_reconciled_balance() {
        let reconciler = Reconciler::new(Decimal::from(5000));
        let sink = RecordingSink::default();
        let source = FixedSource(Ok(vec![deposit(1200)]));

        let outcome = reconciler
            .refresh_and_display(&source, &GameId::new("g"), &sink)
            .await
            .unwrap();

        assert!(outcome.is_applied());
        assert_eq!(sink.balances(), vec![Decimal::from(6200)]);
        assert_eq!(
            reconciler.displayed_balance().map(|b| b.amount()),
            Some(Decimal::from(6200))
        );
    }

    #[tokio::test]
    async fn failed_fetch_keeps_previous_balance() {
        let reconciler = Reconciler::new(Decimal::from(5000));
        let sink = RecordingSink::default();
        let game = GameId::new("g");

        reconciler
            .refresh_and_display(&FixedSource(Ok(vec![deposit(100)])), &game, &sink)
            .await
            .unwrap();
        let err = reconciler
            .refresh_and_display(&FixedSource(Err(())), &game, &sink)
            .await
            .unwrap_err();

        assert!(matches!(err.0, ApiError::Timeout { .. }));
        assert_eq!(sink.balances(), vec![Decimal::from(5100)]);
        assert_eq!(
            reconciler.displayed_balance().map(|b| b.amount()),
            Some(Decimal::from(5100))
        );
        assert_eq!(reconciler.last_applied_seq(), 1);
    }

    #[test]
    fn lower_sequence_arriving_late_is_discarded() {
        let reconciler = Reconciler::new(Decimal::from(5000));
        let sink = RecordingSink::default();

        let first = reconciler.issue();
        let second = reconciler.issue();
        assert!(second > first);

        let applied = reconciler.apply(second, Ledger::new(vec![deposit(2000)]), &sink);
        assert!(applied.is_applied());

        let stale = reconciler.apply(first, Ledger::new(vec![deposit(1)]), &sink);
        assert_eq!(
            stale,
            RefreshOutcome::StaleResponseDiscarded {
                seq: first,
                latest: second
            }
        );
        assert_eq!(sink.balances(), vec![Decimal::from(7000)]);
    }

    #[test]
    fn in_order_responses_both_apply() {
        let reconciler = Reconciler::new(Decimal::from(5000));
        let sink = RecordingSink::default();

        let first = reconciler.issue();
        let second = reconciler.issue();
        reconciler.apply(first, Ledger::new(vec![deposit(1)]), &sink);
        reconciler.apply(second, Ledger::new(vec![deposit(2)]), &sink);

        assert_eq!(sink.balances(), vec![Decimal::from(5001), Decimal::from(5002)]);
    }

    #[tokio::test]
    async fn overlapping_refreshes_last_issued_wins() {
        let reconciler = Arc::new(Reconciler::new(Decimal::from(5000)));
        let sink = Arc::new(RecordingSink::default());
        let source = Arc::new(GatedSource::default());

        let (tx_a, rx_a) = oneshot::channel();
        let (tx_b, rx_b) = oneshot::channel();
        source.gates.lock().insert("a".to_string(), rx_a);
        source.gates.lock().insert("b".to_string(), rx_b);

        // Issue A, then B, letting each reach its suspend point in order
        let a = {
            let (r, s, src) = (reconciler.clone(), sink.clone(), source.clone());
            tokio::spawn(async move {
                r.refresh_and_display(src.as_ref(), &GameId::new("a"), s.as_ref())
                    .await
            })
        };
        while reconciler.issue_peek() < 2 {
            tokio::task::yield_now().await;
        }
        let b = {
            let (r, s, src) = (reconciler.clone(), sink.clone(), source.clone());
            tokio::spawn(async move {
                r.refresh_and_display(src.as_ref(), &GameId::new("b"), s.as_ref())
                    .await
            })
        };
        while reconciler.issue_peek() < 3 {
            tokio::task::yield_now().await;
        }

        // B resolves first, A second
        tx_b.send(Ledger::new(vec![deposit(300)])).unwrap();
        let b_outcome = b.await.unwrap().unwrap();
        tx_a.send(Ledger::new(vec![deposit(100)])).unwrap();
        let a_outcome = a.await.unwrap().unwrap();

        assert!(b_outcome.is_applied());
        assert_eq!(
            a_outcome,
            RefreshOutcome::StaleResponseDiscarded { seq: 1, latest: 2 }
        );
        assert_eq!(sink.balances(), vec![Decimal::from(5300)]);
        assert_eq!(
            reconciler.displayed_balance().map(|b| b.amount()),
            Some(Decimal::from(5300))
        );
    }

    impl Reconciler {
        fn issue_peek(&self) -> u64 {
            self.next_seq.load(Ordering::SeqCst)
        }
    }
}
