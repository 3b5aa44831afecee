//! End-to-end relay tests against the in-memory ledger

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use relay_client::mock::{LiteAccountModule, ListModule, MockLedger, NotaryModule};
use relay_client::{
    Confirmation, ExecutionClass, ExecutionOutcome, LedgerClient, PollSettings, RelayClient,
    RelayError, RelayOptions, SubmitResult, TransactionRecord,
};
use relay_core::codec::{sf, StObject};
use relay_core::instruction::{InstructionRecord, ListOperation, ListUpdate, LitePayment, Proposal};
use relay_core::sequence::SequenceCounter;
use relay_core::{AccountId, Drops, Hash256};
use relay_crypto::KeyPair;
use relay_protocol::{MemoTriple, SignedEnvelope, Slot, StateEntry, TagIndex};

const CARRIER: AccountId = AccountId::new([0x11; 20]);
const MODULE: AccountId = AccountId::new([0x22; 20]);
const PAYEE: AccountId = AccountId::new([0x33; 20]);

fn poll() -> PollSettings {
    PollSettings {
        initial_delay: Duration::from_millis(200),
        max_delay: Duration::from_secs(2),
        backoff_factor: 2.0,
        deadline: Duration::from_secs(60),
    }
}

fn client(ledger: &Arc<MockLedger>, carrier: AccountId, family: &str) -> RelayClient<MockLedger> {
    RelayClient::new(
        ledger.clone(),
        carrier,
        KeyPair::generate(),
        MODULE,
        RelayOptions {
            family: family.to_string(),
            ..Default::default()
        },
        poll(),
    )
}

fn lite_ledger() -> Arc<MockLedger> {
    let ledger = Arc::new(MockLedger::new(100));
    ledger.fund(CARRIER);
    ledger.install(MODULE, Arc::new(LiteAccountModule::new()));
    ledger
}

fn outcome(confirmation: Confirmation) -> ExecutionOutcome {
    match confirmation {
        Confirmation::Found(outcome) => outcome,
        Confirmation::NotFound => panic!("module did not execute"),
    }
}

fn payment(key: &KeyPair, tag: u32, sequence: u32, amount: u64) -> InstructionRecord {
    LitePayment {
        sequence,
        source_tag: tag,
        public_key: key.public_key().to_prefixed(),
        destination: PAYEE,
        destination_tag: Some(42),
        amount: Drops(amount),
    }
    .into()
}

#[tokio::test(start_paused = true)]
async fn test_deposit_then_pay() {
    let ledger = lite_ledger();
    let relay = client(&ledger, CARRIER, "liteacc");
    let actor = KeyPair::generate();

    let receipt = relay.deposit(actor.public_key(), Drops(5_000_000)).await.unwrap();
    let created = outcome(relay.confirm(&receipt).await.unwrap());
    assert_eq!(
        created.return_string,
        "Liteacc: [1] New user's balance is 4000000 and dest tag is 1"
    );

    let view = relay.virtual_ledger().await.unwrap();
    let tag = view.tag_of(actor.public_key()).unwrap().unwrap();
    assert_eq!(tag, 1);

    let mut counter = SequenceCounter::new(0);
    let sequence = view.next_sequence_for(tag, &mut counter).unwrap();
    let receipt = relay
        .relay_record(&payment(&actor, tag, sequence, 1_000_000), &actor)
        .await
        .unwrap();
    let paid = outcome(relay.confirm(&receipt).await.unwrap());
    assert_eq!(paid.classify(), ExecutionClass::Accepted);
    assert!(paid.return_string.contains("Successfully emitted"));
    assert_eq!(
        paid.return_string,
        "Liteacc: [3] Successfully emitted 1000000, new balance: 2900000"
    );

    let view = relay.virtual_ledger().await.unwrap();
    assert_eq!(view.lookup_sequence(tag).unwrap(), Some(sequence));
    assert_eq!(view.lookup_balance(actor.public_key()).unwrap(), Some(Drops(2_900_000)));
}

#[tokio::test(start_paused = true)]
async fn test_tag_follows_counter() {
    let ledger = lite_ledger();
    ledger.write_slot(&MODULE, &Slot::Counter, 5u32.to_be_bytes().to_vec());
    let relay = client(&ledger, CARRIER, "liteacc");
    let actor = KeyPair::generate();

    let view = relay.virtual_ledger().await.unwrap();
    assert_eq!(view.allocate_tag().unwrap(), 6);

    let receipt = relay.deposit(actor.public_key(), Drops(2_000_000)).await.unwrap();
    let created = outcome(relay.confirm(&receipt).await.unwrap());
    assert!(created.return_string.ends_with("dest tag is 6"));

    let view = relay.virtual_ledger().await.unwrap();
    assert_eq!(view.counter().unwrap(), 6);

    let mut index = TagIndex::new();
    assert_eq!(index.refresh(&view).unwrap(), 1);
    assert_eq!(index.get(6), Some(actor.public_key()));
}

#[tokio::test(start_paused = true)]
async fn test_replayed_envelope_rejected() {
    let ledger = lite_ledger();
    let relay = client(&ledger, CARRIER, "liteacc");
    let actor = KeyPair::generate();

    let receipt = relay.deposit(actor.public_key(), Drops(5_000_000)).await.unwrap();
    relay.confirm(&receipt).await.unwrap();

    let envelope = SignedEnvelope::sign_record(&payment(&actor, 1, 7, 10_000), &actor).unwrap();
    let first = relay.relay(&envelope, Drops(100_000)).await.unwrap();
    assert_eq!(
        outcome(relay.confirm(&first).await.unwrap()).classify(),
        ExecutionClass::Accepted
    );

    let second = relay.relay(&envelope, Drops(100_000)).await.unwrap();
    assert_ne!(first.tx_id, second.tx_id);
    let replay = outcome(relay.confirm(&second).await.unwrap());
    assert_eq!(replay.classify(), ExecutionClass::ReplayRejected);
    assert_eq!(
        replay.return_string,
        "Liteacc: [3] Last sequence is >= provided sequence number."
    );
}

#[tokio::test(start_paused = true)]
async fn test_list_update() {
    let admin = KeyPair::generate();
    let ledger = Arc::new(MockLedger::new(100));
    ledger.fund(CARRIER);
    ledger.install(MODULE, Arc::new(ListModule::new(*admin.public_key())));
    let relay = client(&ledger, CARRIER, "blacklist");

    let listed = AccountId::new([0x5A; 20]);
    let record: InstructionRecord = ListUpdate {
        sequence: 1_700_000_000,
        operation: ListOperation::Add,
        accounts: vec![listed],
    }
    .into();
    let envelope = SignedEnvelope::sign_record(&record, &admin).unwrap();

    let memos = MemoTriple::encode(&envelope, "blacklist").into_memos();
    let decoded = MemoTriple::decode(&memos).unwrap();
    assert_eq!(decoded, envelope);
    decoded.verify().unwrap();

    let receipt = relay.relay(&decoded, Drops(100_000)).await.unwrap();
    let result = outcome(relay.confirm(&receipt).await.unwrap());
    assert_eq!(result.return_string, "Blacklist: Processed + 1");
    assert!(ListModule::is_listed(&ledger.state_of(&MODULE), &MODULE, &listed));
}

#[tokio::test(start_paused = true)]
async fn test_list_update_follows_module_sequence() {
    let admin = KeyPair::generate();
    let ledger = Arc::new(MockLedger::new(100));
    ledger.fund(CARRIER);
    ledger.install(MODULE, Arc::new(ListModule::new(*admin.public_key())));
    ledger.write_slot(&MODULE, &Slot::ListSequence, 1_700_000_000u32.to_be_bytes().to_vec());
    let relay = client(&ledger, CARRIER, "blacklist");

    // Fresh counter, as from an empty data dir
    let mut counter = SequenceCounter::default();
    let listed = AccountId::new([0x5B; 20]);
    let receipt = relay
        .update_list(ListOperation::Add, vec![listed], &admin, &mut counter)
        .await
        .unwrap();
    let result = outcome(relay.confirm(&receipt).await.unwrap());
    assert_eq!(result.classify(), ExecutionClass::Accepted);
    assert_eq!(counter.last(), 1_700_000_001);

    let view = relay.virtual_ledger().await.unwrap();
    assert_eq!(view.lookup_list_sequence().unwrap(), Some(1_700_000_001));
    assert!(view.is_listed(&listed));

    let receipt = relay
        .update_list(ListOperation::Remove, vec![listed], &admin, &mut counter)
        .await
        .unwrap();
    let result = outcome(relay.confirm(&receipt).await.unwrap());
    assert_eq!(result.return_string, "Blacklist: Processed - 1");
    assert!(!relay.virtual_ledger().await.unwrap().is_listed(&listed));
}

#[tokio::test(start_paused = true)]
async fn test_proposal_endorsed_by_quorum() {
    let alice = AccountId::new([0xA1; 20]);
    let bob = AccountId::new([0xB0; 20]);
    let ledger = Arc::new(MockLedger::new(100));
    ledger.fund(alice);
    ledger.fund(bob);
    ledger.install(MODULE, Arc::new(NotaryModule::new(vec![(alice, 1), (bob, 1)], 2)));
    let proposer = client(&ledger, alice, "notary");
    let endorser = client(&ledger, bob, "notary");

    let transaction = StObject::new()
        .with(sf::TRANSACTION_TYPE, 0u16)
        .and_then(|tx| tx.with(sf::ACCOUNT, MODULE))
        .and_then(|tx| tx.with(sf::DESTINATION, PAYEE))
        .and_then(|tx| tx.with(sf::AMOUNT, Drops(1_000_000)))
        .and_then(|tx| tx.with(sf::LAST_LEDGER_SEQUENCE, 1_000u32))
        .unwrap();
    let (id, receipt) = proposer.propose(&Proposal { transaction }).await.unwrap();
    let waiting = outcome(proposer.confirm(&receipt).await.unwrap());
    assert!(waiting.return_string.ends_with(&id.to_hex()));

    let receipt = endorser.endorse(&id).await.unwrap();
    let emitted = outcome(endorser.confirm(&receipt).await.unwrap());
    assert_eq!(emitted.return_string, "Notary: Emitted multisigned txn");
    assert!(ledger.state_of(&MODULE).is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_short_proposal_refused_locally() {
    let ledger = lite_ledger();
    let relay = client(&ledger, CARRIER, "notary");
    let transaction = StObject::new()
        .with(sf::TRANSACTION_TYPE, 0u16)
        .and_then(|tx| tx.with(sf::LAST_LEDGER_SEQUENCE, 110u32))
        .unwrap();
    let err = relay.propose(&Proposal { transaction }).await.unwrap_err();
    assert!(matches!(err, RelayError::Protocol(_)));
}

#[tokio::test(start_paused = true)]
async fn test_window_passes_without_validation() {
    let ledger = lite_ledger();
    ledger.hold_validation(true);
    ledger.set_auto_advance(true);
    let relay = RelayClient::new(
        ledger.clone(),
        CARRIER,
        KeyPair::generate(),
        MODULE,
        RelayOptions {
            timeout_ledgers: 3,
            ..Default::default()
        },
        poll(),
    );

    let receipt = relay
        .deposit(KeyPair::generate().public_key(), Drops(2_000_000))
        .await
        .unwrap();
    let err = relay.confirm(&receipt).await.unwrap_err();
    match err {
        RelayError::ConfirmationTimeout { tx_id, last_ledger } => {
            assert_eq!(tx_id, receipt.tx_id);
            assert_eq!(last_ledger, receipt.last_ledger_sequence);
        }
        other => panic!("unexpected {:?}", other),
    }
}

#[tokio::test(start_paused = true)]
async fn test_deadline_expires() {
    let ledger = lite_ledger();
    ledger.hold_validation(true);
    let relay = RelayClient::new(
        ledger.clone(),
        CARRIER,
        KeyPair::generate(),
        MODULE,
        RelayOptions::default(),
        PollSettings {
            deadline: Duration::from_secs(3),
            ..poll()
        },
    );

    let receipt = relay
        .deposit(KeyPair::generate().public_key(), Drops(2_000_000))
        .await
        .unwrap();
    assert!(matches!(
        relay.confirm(&receipt).await,
        Err(RelayError::TimedOut(id)) if id == receipt.tx_id
    ));

    ledger.close_ledger();
    assert!(matches!(relay.confirm(&receipt).await, Ok(Confirmation::Found(_))));
}

#[tokio::test(start_paused = true)]
async fn test_unfunded_carrier() {
    let ledger = Arc::new(MockLedger::new(100));
    let relay = client(&ledger, CARRIER, "liteacc");
    let err = relay
        .deposit(KeyPair::generate().public_key(), Drops(2_000_000))
        .await
        .unwrap_err();
    assert!(matches!(err, RelayError::Rpc(_)));
}

#[tokio::test(start_paused = true)]
async fn test_carrier_sequences_do_not_repeat() {
    let ledger = lite_ledger();
    let relay = client(&ledger, CARRIER, "liteacc");
    let a = KeyPair::generate();
    let b = KeyPair::generate();

    let (first, second) = tokio::join!(
        relay.deposit(a.public_key(), Drops(2_000_000)),
        relay.deposit(b.public_key(), Drops(2_000_000)),
    );
    let (first, second) = (first.unwrap(), second.unwrap());
    assert_ne!(first.tx_id, second.tx_id);

    let view = relay.virtual_ledger().await.unwrap();
    assert_eq!(view.enumerate().unwrap().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_module_not_installed() {
    let ledger = Arc::new(MockLedger::new(100));
    ledger.fund(CARRIER);
    let relay = client(&ledger, CARRIER, "liteacc");
    let receipt = relay
        .deposit(KeyPair::generate().public_key(), Drops(2_000_000))
        .await
        .unwrap();
    assert_eq!(relay.confirm(&receipt).await.unwrap(), Confirmation::NotFound);
}

/// Mock ledger whose next submission is lost in transit
struct DroppingLedger {
    inner: Arc<MockLedger>,
    drop_next: AtomicBool,
}

#[async_trait]
impl LedgerClient for DroppingLedger {
    async fn submit(&self, blob: &[u8]) -> relay_client::Result<SubmitResult> {
        if self.drop_next.swap(false, Ordering::SeqCst) {
            return Err(RelayError::Transport("connection reset".to_string()));
        }
        self.inner.submit(blob).await
    }

    async fn fetch_transaction(&self, id: &Hash256) -> relay_client::Result<Option<TransactionRecord>> {
        self.inner.fetch_transaction(id).await
    }

    async fn fetch_account_state(&self, account: &AccountId) -> relay_client::Result<Vec<StateEntry>> {
        self.inner.fetch_account_state(account).await
    }

    async fn account_sequence(&self, account: &AccountId) -> relay_client::Result<u32> {
        self.inner.account_sequence(account).await
    }

    async fn current_ledger(&self) -> relay_client::Result<u32> {
        self.inner.current_ledger().await
    }
}

#[tokio::test(start_paused = true)]
async fn test_carrier_sequence_reused_after_transport_error() {
    let ledger = Arc::new(DroppingLedger {
        inner: lite_ledger(),
        drop_next: AtomicBool::new(true),
    });
    let relay = RelayClient::new(
        ledger.clone(),
        CARRIER,
        KeyPair::generate(),
        MODULE,
        RelayOptions::default(),
        poll(),
    );
    let actor = KeyPair::generate();

    let err = relay.deposit(actor.public_key(), Drops(2_000_000)).await.unwrap_err();
    assert!(matches!(err, RelayError::Transport(_)));

    // The lost transaction never consumed its sequence
    let receipt = relay.deposit(actor.public_key(), Drops(2_000_000)).await.unwrap();
    assert_eq!(receipt.code, "tesSUCCESS");
    assert!(matches!(relay.confirm(&receipt).await, Ok(Confirmation::Found(_))));
}
