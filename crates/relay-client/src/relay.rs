//! Relay client
//!
//! Wraps signed envelopes in carrier payments from a configured real account
//! to the module account, submits them and hands back a receipt for the
//! confirmation poller.

use std::sync::Arc;

use parking_lot::Mutex;
use relay_core::instruction::{Instruction, InstructionRecord, ListOperation, ListUpdate, Proposal};
use relay_core::sequence::SequenceCounter;
use relay_core::{AccountId, Drops, Hash256, Tag};
use relay_crypto::{KeyPair, PublicKey};
use relay_protocol::{
    check_proposal, proposal_id, proposal_memo, CarrierPayment, Memo, MemoTriple,
    SignedEnvelope, StateSnapshot, VirtualLedger, DEFAULT_FAMILY,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::RelayConfig;
use crate::confirm::{Confirmation, ConfirmationPoller, PollSettings};
use crate::error::{RelayError, Result};
use crate::ledger::LedgerClient;

/// Carrier transaction parameters
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RelayOptions {
    /// Memo type family
    pub family: String,
    pub fee: Drops,
    /// Default value attached to an instruction
    pub value: Drops,
    /// Validity window in ledgers
    pub timeout_ledgers: u32,
}

impl Default for RelayOptions {
    fn default() -> Self {
        Self {
            family: DEFAULT_FAMILY.to_string(),
            fee: Drops(10_000),
            value: Drops(100_000),
            timeout_ledgers: 20,
        }
    }
}

/// What the network said about a submitted carrier payment
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmissionReceipt {
    pub tx_id: Hash256,
    /// Engine result code
    pub code: String,
    pub message: String,
    /// Ledger open at submission
    pub submitted_ledger: u32,
    /// Last ledger the payment may be validated in
    pub last_ledger_sequence: u32,
}

/// Relays signed instructions to one module account
pub struct RelayClient<L: ?Sized> {
    ledger: Arc<L>,
    carrier: AccountId,
    carrier_key: KeyPair,
    module: AccountId,
    options: RelayOptions,
    poller: ConfirmationPoller<L>,
    /// Highest carrier sequence handed out by this client
    carrier_sequence: Mutex<Option<u32>>,
}

impl<L: LedgerClient + ?Sized> RelayClient<L> {
    pub fn new(
        ledger: Arc<L>,
        carrier: AccountId,
        carrier_key: KeyPair,
        module: AccountId,
        options: RelayOptions,
        poll: PollSettings,
    ) -> Self {
        Self {
            poller: ConfirmationPoller::new(ledger.clone(), poll),
            ledger,
            carrier,
            carrier_key,
            module,
            options,
            carrier_sequence: Mutex::new(None),
        }
    }

    /// Build from configuration; carrier and module must be set
    pub fn from_config(ledger: Arc<L>, config: &RelayConfig) -> Result<Self> {
        let options = RelayOptions {
            family: config.module.family.clone(),
            fee: config.fee(),
            value: config.value(),
            timeout_ledgers: config.relay.timeout_ledgers,
        };
        Ok(Self::new(
            ledger,
            config.carrier_account()?,
            config.carrier_key()?,
            config.module_account()?,
            options,
            config.poll_settings(),
        ))
    }

    pub fn ledger(&self) -> &Arc<L> {
        &self.ledger
    }

    pub fn module(&self) -> &AccountId {
        &self.module
    }

    pub fn carrier(&self) -> &AccountId {
        &self.carrier
    }

    pub fn options(&self) -> &RelayOptions {
        &self.options
    }

    /// Relay a signed envelope with `value` attached
    pub async fn relay(&self, envelope: &SignedEnvelope, value: Drops) -> Result<SubmissionReceipt> {
        let memos = MemoTriple::encode(envelope, &self.options.family).into_memos();
        self.submit_payment(value, memos, None, None).await
    }

    /// Sign `record` with `signer` and relay it with the default value
    pub async fn relay_record(
        &self,
        record: &InstructionRecord,
        signer: &KeyPair,
    ) -> Result<SubmissionReceipt> {
        let envelope = SignedEnvelope::sign_record(record, signer)?;
        self.relay(&envelope, self.options.value).await
    }

    /// Sign and relay a list update with a sequence past the module's last one.
    ///
    /// `counter` is the caller's counter for `admin`; it is advanced even if
    /// the submission later fails.
    pub async fn update_list(
        &self,
        operation: ListOperation,
        accounts: Vec<AccountId>,
        admin: &KeyPair,
        counter: &mut SequenceCounter,
    ) -> Result<SubmissionReceipt> {
        let view = self.virtual_ledger().await?;
        let sequence = view.next_list_sequence(counter)?;
        debug!(module = %self.module, sequence, accounts = accounts.len(), "list update");
        let record: InstructionRecord = ListUpdate {
            sequence,
            operation,
            accounts,
        }
        .into();
        self.relay_record(&record, admin).await
    }

    /// Create or credit the virtual actor owning `public_key`
    pub async fn deposit(&self, public_key: &PublicKey, amount: Drops) -> Result<SubmissionReceipt> {
        let invoice = Hash256::new(*public_key.raw());
        self.submit_payment(amount, Vec::new(), None, Some(invoice)).await
    }

    /// Credit an existing virtual actor by tag
    pub async fn top_up(&self, tag: Tag, amount: Drops) -> Result<SubmissionReceipt> {
        self.submit_payment(amount, Vec::new(), Some(tag), None).await
    }

    /// Submit an unsigned transaction to a notary module
    pub async fn propose(&self, proposal: &Proposal) -> Result<(Hash256, SubmissionReceipt)> {
        let current = self.ledger.current_ledger().await?;
        check_proposal(proposal, current)?;
        let id = proposal_id(proposal)?;
        let memo = proposal_memo(&proposal.to_bytes()?);
        let receipt = self
            .submit_payment(self.options.value, vec![memo], None, None)
            .await?;
        info!(proposal = %id, tx = %receipt.tx_id, "proposal submitted");
        Ok((id, receipt))
    }

    /// Add the carrier account's endorsement to a pending proposal
    pub async fn endorse(&self, proposal: &Hash256) -> Result<SubmissionReceipt> {
        self.submit_payment(self.options.value, Vec::new(), None, Some(*proposal))
            .await
    }

    /// Snapshot of the module's state as a virtual ledger
    pub async fn virtual_ledger(&self) -> Result<VirtualLedger> {
        let entries = self.ledger.fetch_account_state(&self.module).await?;
        let snapshot: StateSnapshot = entries.into_iter().collect();
        debug!(module = %self.module, entries = snapshot.len(), "module state loaded");
        Ok(VirtualLedger::new(self.module, snapshot))
    }

    /// Wait for the module's verdict on a receipt
    pub async fn confirm(&self, receipt: &SubmissionReceipt) -> Result<Confirmation> {
        self.poller
            .confirm_until(&receipt.tx_id, &self.module, receipt.last_ledger_sequence)
            .await
    }

    /// Carrier sequence above anything already handed out
    async fn next_carrier_sequence(&self) -> Result<u32> {
        let fetched = self.ledger.account_sequence(&self.carrier).await?;
        let mut cached = self.carrier_sequence.lock();
        let sequence = match *cached {
            Some(last) if last >= fetched => last.checked_add(1).ok_or_else(|| {
                RelayError::Config("carrier sequence exhausted".to_string())
            })?,
            _ => fetched,
        };
        *cached = Some(sequence);
        Ok(sequence)
    }

    async fn submit_payment(
        &self,
        amount: Drops,
        memos: Vec<Memo>,
        destination_tag: Option<Tag>,
        invoice_id: Option<Hash256>,
    ) -> Result<SubmissionReceipt> {
        let submitted_ledger = self.ledger.current_ledger().await?;
        let last_ledger_sequence = submitted_ledger.saturating_add(self.options.timeout_ledgers);
        let sequence = self.next_carrier_sequence().await?;

        let payment = CarrierPayment {
            account: self.carrier,
            destination: self.module,
            amount,
            fee: self.options.fee,
            sequence,
            destination_tag,
            last_ledger_sequence: Some(last_ledger_sequence),
            invoice_id,
            memos,
        };
        let signed = payment.sign(&self.carrier_key)?;
        debug!(tx = %signed.id, sequence, bytes = signed.blob.len(), "submitting carrier payment");

        let result = match self.ledger.submit(&signed.blob).await {
            Ok(result) => result,
            Err(e) => {
                warn!(tx = %signed.id, error = %e, "submission failed");
                *self.carrier_sequence.lock() = None;
                return Err(e);
            }
        };
        if !result.is_accepted() {
            warn!(tx = %signed.id, code = %result.code, "submission rejected");
            *self.carrier_sequence.lock() = None;
            return Err(RelayError::SubmissionRejected {
                code: result.code,
                message: result.message,
            });
        }
        info!(tx = %signed.id, code = %result.code, last_ledger_sequence, "submission accepted");
        Ok(SubmissionReceipt {
            tx_id: signed.id,
            code: result.code,
            message: result.message,
            submitted_ledger,
            last_ledger_sequence,
        })
    }
}
