//! Payment processor trait and in-memory implementation.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use domain::Money;

/// A charge request against a previously captured payment instrument.
#[derive(Debug, Clone, PartialEq)]
pub struct ChargeRequest {
    pub amount: Money,

    /// ISO currency code, lowercase (e.g., "usd").
    pub currency: String,

    /// Opaque handle to the captured-not-charged instrument.
    pub payment_method: String,

    /// Deduplication key; the processor collapses repeated charge attempts
    /// carrying the same key into one real charge.
    pub idempotency_key: String,
}

/// Permanent decline classification, as reported by the processor.
///
/// The classification is typed at the processor boundary; callers branch on
/// the variant, never on error-message text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeclineCode {
    CardDeclined,
    InsufficientFunds,
    InvalidPaymentMethod,
}

impl std::fmt::Display for DeclineCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            DeclineCode::CardDeclined => "card_declined",
            DeclineCode::InsufficientFunds => "insufficient_funds",
            DeclineCode::InvalidPaymentMethod => "invalid_payment_method",
        };
        write!(f, "{name}")
    }
}

/// Outcome of one charge attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum ChargeOutcome {
    /// The charge went through; the processor assigned a payment reference.
    Succeeded { payment_reference: String },

    /// The instrument was refused; retrying cannot succeed.
    PermanentlyFailed(DeclineCode),

    /// Network, timeout, or processor-side error; a later retry may
    /// succeed. Includes an idempotency-key conflict from a genuinely
    /// concurrent duplicate attempt.
    TransientlyFailed(String),
}

/// Trait for payment processing operations.
#[async_trait]
pub trait PaymentProcessor: Send + Sync {
    /// Performs one charge attempt.
    ///
    /// A repeated call with an already completed idempotency key must not
    /// produce a second real charge.
    async fn charge(&self, request: ChargeRequest) -> ChargeOutcome;
}

#[derive(Debug, Default)]
struct InMemoryProcessorState {
    /// Completed outcomes by idempotency key, replayed on duplicates.
    completed: HashMap<String, ChargeOutcome>,
    /// Scripted outcomes consumed before any real charge is performed.
    scripted: VecDeque<ChargeOutcome>,
    /// Real charges performed: (idempotency key, amount in minor units).
    charges: Vec<(String, i64)>,
    requests: u32,
    next_id: u32,
}

/// In-memory payment processor for testing.
///
/// Defaults to approving every charge. Failures are scripted per call with
/// [`fail_next_with`](Self::fail_next_with) and
/// [`fail_next_transient`](Self::fail_next_transient).
#[derive(Debug, Clone, Default)]
pub struct InMemoryPaymentProcessor {
    state: Arc<RwLock<InMemoryProcessorState>>,
}

impl InMemoryPaymentProcessor {
    /// Creates a new in-memory payment processor.
    pub fn new() -> Self {
        Self::default()
    }

    /// Scripts a permanent decline for the next charge attempt.
    pub fn fail_next_with(&self, code: DeclineCode) {
        self.state
            .write()
            .unwrap()
            .scripted
            .push_back(ChargeOutcome::PermanentlyFailed(code));
    }

    /// Scripts a transient failure for the next charge attempt.
    pub fn fail_next_transient(&self, reason: impl Into<String>) {
        self.state
            .write()
            .unwrap()
            .scripted
            .push_back(ChargeOutcome::TransientlyFailed(reason.into()));
    }

    /// Returns the number of real charges performed.
    pub fn charge_count(&self) -> usize {
        self.state.read().unwrap().charges.len()
    }

    /// Returns the number of charge requests received, including
    /// idempotent replays and scripted failures.
    pub fn request_count(&self) -> u32 {
        self.state.read().unwrap().requests
    }

    /// Returns the amount charged under the given idempotency key, if a
    /// real charge was performed for it.
    pub fn charged_amount(&self, idempotency_key: &str) -> Option<i64> {
        self.state
            .read()
            .unwrap()
            .charges
            .iter()
            .find(|(key, _)| key == idempotency_key)
            .map(|(_, amount)| *amount)
    }
}

#[async_trait]
impl PaymentProcessor for InMemoryPaymentProcessor {
    async fn charge(&self, request: ChargeRequest) -> ChargeOutcome {
        let mut state = self.state.write().unwrap();
        state.requests += 1;

        // Idempotent replay: a completed key never charges again.
        if let Some(outcome) = state.completed.get(&request.idempotency_key) {
            return outcome.clone();
        }

        if let Some(outcome) = state.scripted.pop_front() {
            // Transient failures leave the key unused so a retry can
            // succeed; permanent declines are recorded for replay.
            if matches!(outcome, ChargeOutcome::PermanentlyFailed(_)) {
                state
                    .completed
                    .insert(request.idempotency_key.clone(), outcome.clone());
            }
            return outcome;
        }

        state.next_id += 1;
        let payment_reference = format!("ch_{:04}", state.next_id);
        state.charges.push((
            request.idempotency_key.clone(),
            request.amount.minor_units(),
        ));
        let outcome = ChargeOutcome::Succeeded { payment_reference };
        state
            .completed
            .insert(request.idempotency_key, outcome.clone());
        outcome
    }
}
