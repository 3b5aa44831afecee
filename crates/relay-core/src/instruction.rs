//! Instruction records
//!
//! Typed payloads a virtual actor signs and a module decodes. Each record maps
//! to a fixed set of canonical fields, so its bytes depend only on its values.

use serde::{Deserialize, Serialize};

use crate::codec::{sf, StObject, Value};
use crate::error::{CodecError, Result};
use crate::types::{AccountId, Drops, Tag};

/// Length of a prefixed Ed25519 public key as carried in records
pub const PREFIXED_KEY_LEN: usize = 33;

/// Prefix byte marking an Ed25519 public key
pub const ED25519_KEY_PREFIX: u8 = 0xED;

/// Conversion between a record and its canonical object
pub trait Instruction: Sized {
    /// Build the canonical object. Fails only for out-of-range values.
    fn to_object(&self) -> Result<StObject>;

    /// Read a record back from a decoded object
    fn from_object(object: &StObject) -> Result<Self>;

    /// Canonical bytes
    fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(self.to_object()?.to_bytes())
    }

    /// Decode canonical bytes
    fn from_bytes(bytes: &[u8]) -> Result<Self> {
        Self::from_object(&StObject::from_bytes(bytes)?)
    }
}

fn check_public_key(key: &[u8]) -> Result<()> {
    if key.len() != PREFIXED_KEY_LEN || key[0] != ED25519_KEY_PREFIX {
        return Err(CodecError::InvalidValue {
            field: "PublicKey",
            reason: format!("expected {} bytes starting with ED, got {}", PREFIXED_KEY_LEN, key.len()),
        });
    }
    Ok(())
}

/// Payment out of a virtual actor's balance
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LitePayment {
    pub sequence: u32,
    /// Tag of the paying virtual actor
    pub source_tag: Tag,
    /// Prefixed public key of the paying virtual actor
    #[serde(with = "hex::serde")]
    pub public_key: Vec<u8>,
    pub destination: AccountId,
    pub destination_tag: Option<Tag>,
    pub amount: Drops,
}

impl Instruction for LitePayment {
    fn to_object(&self) -> Result<StObject> {
        check_public_key(&self.public_key)?;
        let mut object = StObject::new();
        object.set(sf::SEQUENCE, self.sequence)?;
        object.set(sf::SOURCE_TAG, self.source_tag)?;
        object.set(sf::PUBLIC_KEY, self.public_key.clone())?;
        object.set(sf::DESTINATION, self.destination)?;
        if let Some(tag) = self.destination_tag {
            object.set(sf::DESTINATION_TAG, tag)?;
        }
        object.set(sf::AMOUNT, self.amount)?;
        Ok(object)
    }

    fn from_object(object: &StObject) -> Result<Self> {
        let public_key = object.blob(sf::PUBLIC_KEY)?.to_vec();
        check_public_key(&public_key)?;
        Ok(Self {
            sequence: object.u32(sf::SEQUENCE)?,
            source_tag: object.u32(sf::SOURCE_TAG)?,
            public_key,
            destination: object.account(sf::DESTINATION)?,
            destination_tag: object.opt_u32(sf::DESTINATION_TAG)?,
            amount: object.amount(sf::AMOUNT)?,
        })
    }
}

/// List membership change
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ListOperation {
    Remove = 0,
    Add = 1,
}

impl ListOperation {
    pub fn flags(self) -> u32 {
        self as u32
    }

    pub fn from_flags(flags: u32) -> Result<Self> {
        match flags {
            0 => Ok(Self::Remove),
            1 => Ok(Self::Add),
            other => Err(CodecError::InvalidValue {
                field: "Flags",
                reason: format!("unknown list operation {}", other),
            }),
        }
    }
}

/// Add or remove accounts from a module-held list
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListUpdate {
    pub sequence: u32,
    pub operation: ListOperation,
    pub accounts: Vec<AccountId>,
}

impl Instruction for ListUpdate {
    fn to_object(&self) -> Result<StObject> {
        let template = self
            .accounts
            .iter()
            .map(|account| (sf::ACCOUNT, Value::Account(*account)))
            .collect();
        StObject::new()
            .with(sf::SEQUENCE, self.sequence)?
            .with(sf::FLAGS, self.operation.flags())?
            .with(sf::TEMPLATE, Value::Array(template))
    }

    fn from_object(object: &StObject) -> Result<Self> {
        let accounts = object
            .array(sf::TEMPLATE)?
            .iter()
            .map(|(field, value)| match value {
                Value::Account(account) if *field == sf::ACCOUNT => Ok(*account),
                other => Err(CodecError::WrongType {
                    field: "Template",
                    found: other.type_code().name(),
                }),
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            sequence: object.u32(sf::SEQUENCE)?,
            operation: ListOperation::from_flags(object.u32(sf::FLAGS)?)?,
            accounts,
        })
    }
}

/// Transaction proposed to a notary module for endorsement.
///
/// The record is the proposed transaction itself; it travels unsigned and is
/// identified by the hash of its bytes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Proposal {
    pub transaction: StObject,
}

impl Instruction for Proposal {
    fn to_object(&self) -> Result<StObject> {
        if self.transaction.is_empty() {
            return Err(CodecError::InvalidValue {
                field: "Proposal",
                reason: "empty transaction".to_string(),
            });
        }
        Ok(self.transaction.clone())
    }

    fn from_object(object: &StObject) -> Result<Self> {
        Ok(Self {
            transaction: object.clone(),
        })
    }
}

/// Record kinds understood by the relay
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum InstructionKind {
    Payment,
    ListUpdate,
    Proposal,
}

/// Any instruction record
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum InstructionRecord {
    Payment(LitePayment),
    ListUpdate(ListUpdate),
    Proposal(Proposal),
}

impl InstructionRecord {
    pub fn kind(&self) -> InstructionKind {
        match self {
            Self::Payment(_) => InstructionKind::Payment,
            Self::ListUpdate(_) => InstructionKind::ListUpdate,
            Self::Proposal(_) => InstructionKind::Proposal,
        }
    }

    /// Sequence used for replay protection, if the kind carries one
    pub fn sequence(&self) -> Option<u32> {
        match self {
            Self::Payment(p) => Some(p.sequence),
            Self::ListUpdate(l) => Some(l.sequence),
            Self::Proposal(_) => None,
        }
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        match self {
            Self::Payment(p) => p.to_bytes(),
            Self::ListUpdate(l) => l.to_bytes(),
            Self::Proposal(p) => p.to_bytes(),
        }
    }

    /// Decode bytes as a record of a known kind
    pub fn from_bytes(kind: InstructionKind, bytes: &[u8]) -> Result<Self> {
        Ok(match kind {
            InstructionKind::Payment => Self::Payment(LitePayment::from_bytes(bytes)?),
            InstructionKind::ListUpdate => Self::ListUpdate(ListUpdate::from_bytes(bytes)?),
            InstructionKind::Proposal => Self::Proposal(Proposal::from_bytes(bytes)?),
        })
    }
}

impl From<LitePayment> for InstructionRecord {
    fn from(p: LitePayment) -> Self {
        Self::Payment(p)
    }
}

impl From<ListUpdate> for InstructionRecord {
    fn from(l: ListUpdate) -> Self {
        Self::ListUpdate(l)
    }
}

impl From<Proposal> for InstructionRecord {
    fn from(p: Proposal) -> Self {
        Self::Proposal(p)
    }
}
