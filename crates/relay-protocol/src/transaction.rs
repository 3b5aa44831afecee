//! Carrier payments
//!
//! An ordinary payment from a real account to the module account. Its own
//! signature authenticates transport only; the instruction it carries is
//! authorized separately by the envelope inside its memos.

use relay_core::codec::{sf, StObject};
use relay_core::instruction::{Instruction, Proposal};
use relay_core::{AccountId, Drops, Hash256, Tag};
use relay_crypto::{prefixed_hash, sha512_half, sign, verify_bytes, HashPrefix, KeyPair};

use crate::error::{ProtocolError, Result};
use crate::memo::{memos_from_transaction, memos_value, Memo};

/// `TransactionType` code of a payment
pub const PAYMENT_TRANSACTION_TYPE: u16 = 0;

/// Ledgers a proposal must stay valid for before a notary module takes it
pub const MINIMUM_PROPOSAL_LIFETIME: u32 = 60;

/// Payment carrying memos to a module account
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CarrierPayment {
    pub account: AccountId,
    pub destination: AccountId,
    pub amount: Drops,
    pub fee: Drops,
    pub sequence: u32,
    pub destination_tag: Option<Tag>,
    pub last_ledger_sequence: Option<u32>,
    pub invoice_id: Option<Hash256>,
    pub memos: Vec<Memo>,
}

impl CarrierPayment {
    /// Canonical object with the given signing key bytes
    pub fn to_object(&self, signing_pub_key: Vec<u8>) -> Result<StObject> {
        let mut tx = StObject::new();
        tx.set(sf::TRANSACTION_TYPE, PAYMENT_TRANSACTION_TYPE)?;
        tx.set(sf::ACCOUNT, self.account)?;
        tx.set(sf::DESTINATION, self.destination)?;
        tx.set(sf::AMOUNT, self.amount)?;
        tx.set(sf::FEE, self.fee)?;
        tx.set(sf::SEQUENCE, self.sequence)?;
        tx.set(sf::SIGNING_PUB_KEY, signing_pub_key)?;
        if let Some(tag) = self.destination_tag {
            tx.set(sf::DESTINATION_TAG, tag)?;
        }
        if let Some(last) = self.last_ledger_sequence {
            tx.set(sf::LAST_LEDGER_SEQUENCE, last)?;
        }
        if let Some(invoice) = self.invoice_id {
            tx.set(sf::INVOICE_ID, invoice)?;
        }
        if !self.memos.is_empty() {
            tx.set(sf::MEMOS, memos_value(&self.memos)?)?;
        }
        Ok(tx)
    }

    /// Object left for other signers: empty signing key, no signature
    pub fn to_unsigned_object(&self) -> Result<StObject> {
        self.to_object(Vec::new())
    }

    /// Sign with the carrier key over `STX\0 ‖ signing fields`
    pub fn sign(&self, key_pair: &KeyPair) -> Result<SignedTransaction> {
        let mut tx = self.to_object(key_pair.public_key().to_prefixed())?;
        let mut message = HashPrefix::TransactionSign.bytes().to_vec();
        message.extend_from_slice(&tx.to_signing_bytes());
        tx.set(sf::TXN_SIGNATURE, sign(&message, key_pair).to_vec())?;
        Ok(SignedTransaction::from_object(&tx))
    }

    pub fn from_object(tx: &StObject) -> Result<Self> {
        let kind = tx.u16(sf::TRANSACTION_TYPE)?;
        if kind != PAYMENT_TRANSACTION_TYPE {
            return Err(ProtocolError::InvalidTransaction(format!(
                "transaction type {} is not a payment",
                kind
            )));
        }
        Ok(Self {
            account: tx.account(sf::ACCOUNT)?,
            destination: tx.account(sf::DESTINATION)?,
            amount: tx.amount(sf::AMOUNT)?,
            fee: tx.amount(sf::FEE)?,
            sequence: tx.u32(sf::SEQUENCE)?,
            destination_tag: tx.opt_u32(sf::DESTINATION_TAG)?,
            last_ledger_sequence: tx.opt_u32(sf::LAST_LEDGER_SEQUENCE)?,
            invoice_id: if tx.contains(sf::INVOICE_ID) {
                Some(tx.hash256(sf::INVOICE_ID)?)
            } else {
                None
            },
            memos: memos_from_transaction(tx)?,
        })
    }
}

/// Signed transaction ready for submission
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SignedTransaction {
    pub id: Hash256,
    pub blob: Vec<u8>,
}

impl SignedTransaction {
    fn from_object(tx: &StObject) -> Self {
        let blob = tx.to_bytes();
        Self {
            id: transaction_id(&blob),
            blob,
        }
    }

    pub fn blob_hex(&self) -> String {
        hex::encode_upper(&self.blob)
    }
}

/// Transaction id: SHA-512-half of `TXN\0 ‖ blob`
pub fn transaction_id(blob: &[u8]) -> Hash256 {
    prefixed_hash(HashPrefix::TransactionId, blob)
}

/// Check the single signature of a decoded transaction
pub fn verify_transaction(tx: &StObject) -> Result<()> {
    let public_key = tx.blob(sf::SIGNING_PUB_KEY)?;
    let signature = tx.blob(sf::TXN_SIGNATURE)?;
    let mut message = HashPrefix::TransactionSign.bytes().to_vec();
    message.extend_from_slice(&tx.to_signing_bytes());
    verify_bytes(&message, signature, public_key)?;
    Ok(())
}

/// Id endorsers quote for a proposal: SHA-512-half of its bytes
pub fn proposal_id(proposal: &Proposal) -> Result<Hash256> {
    Ok(sha512_half(&proposal.to_bytes()?))
}

/// Check a proposal is something a notary module will take
pub fn check_proposal(proposal: &Proposal, current_ledger: u32) -> Result<()> {
    let tx = &proposal.transaction;
    if !tx.contains(sf::TRANSACTION_TYPE) {
        return Err(ProtocolError::InvalidTransaction(
            "proposal has no TransactionType".to_string(),
        ));
    }
    let last = tx
        .opt_u32(sf::LAST_LEDGER_SEQUENCE)?
        .ok_or_else(|| ProtocolError::InvalidTransaction("proposal has no LastLedgerSequence".to_string()))?;
    if last < current_ledger.saturating_add(MINIMUM_PROPOSAL_LIFETIME) {
        return Err(ProtocolError::InvalidTransaction(format!(
            "proposal expires at ledger {}, needs at least {}",
            last,
            current_ledger.saturating_add(MINIMUM_PROPOSAL_LIFETIME)
        )));
    }
    Ok(())
}
