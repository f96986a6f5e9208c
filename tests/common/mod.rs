//! Counting and gated fakes for the pet contract, the FHE engine and the wallet.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU8, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use alloy_primitives::{Address, B256, Bytes, U256, keccak256};
use async_trait::async_trait;
use secrecy::SecretString;
use tokio::sync::Notify;

use petlife::contract::events::PET_CREATED_EVENT_SIGNATURE;
use petlife::contract::{
    CiphertextHandle, ContractBindingResolver, DeploymentEntry, DeploymentTable, LogEntry,
    PetCall, PetInfo, PetReader, TxHash, TxReceipt, WalletSigner,
};
use petlife::error::{ContractError, EngineError, SignerError};
use petlife::fhe::{
    AuthorizationPayload, ClearPlaintext, DecryptRequest, DecryptedValues,
    DecryptionAuthorization, DecryptionAuthorizationCache, EncryptedInput, EncryptedValues,
    EphemeralKeypair, FheEngine,
};
use petlife::identity::IdentityContext;
use petlife::pet::PetSessionController;
use petlife::store::MemoryStore;

pub const HARDHAT: u64 = 31_337;
pub const SEPOLIA: u64 = 11_155_111;
pub const CREATED_TOKEN_ID: u64 = 7;

pub fn contract() -> Address {
    Address::repeat_byte(0xc0)
}

pub fn handle(byte: u8) -> CiphertextHandle {
    CiphertextHandle::new(B256::repeat_byte(byte))
}

pub fn uint(value: u64) -> ClearPlaintext {
    ClearPlaintext::Uint(U256::from(value))
}

/// Pauses the first armed call until the test opens it.
#[derive(Default)]
pub struct Gate {
    armed: AtomicBool,
    entered: Notify,
    release: Notify,
}

impl Gate {
    pub fn arm(&self) {
        self.armed.store(true, Ordering::SeqCst);
    }

    pub async fn pass(&self) {
        if self.armed.swap(false, Ordering::SeqCst) {
            self.entered.notify_one();
            self.release.notified().await;
        }
    }

    pub async fn entered(&self) {
        self.entered.notified().await;
    }

    pub fn open(&self) {
        self.release.notify_one();
    }
}

#[derive(Debug, Clone, Copy)]
pub struct PetRecord {
    pub hunger: CiphertextHandle,
    pub happiness: CiphertextHandle,
    pub growth: CiphertextHandle,
    pub info: PetInfo,
}

impl PetRecord {
    pub fn new(hunger: u8, happiness: u8, growth: u8) -> Self {
        Self {
            hunger: handle(hunger),
            happiness: handle(happiness),
            growth: handle(growth),
            info: PetInfo {
                level: 1,
                last_interaction: 1_700_000_000,
            },
        }
    }
}

/// In-memory pet contract shared by the reader and every wallet.
#[derive(Default)]
pub struct FakeChain {
    pets: Mutex<HashMap<u64, PetRecord>>,
    next_handle: AtomicU8,
    pub status_reads: AtomicUsize,
    pub read_gate: Gate,
    pub fail_reads: AtomicBool,
}

impl FakeChain {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            next_handle: AtomicU8::new(0x40),
            ..Self::default()
        })
    }

    pub fn insert(&self, token_id: u64, record: PetRecord) {
        self.pets.lock().unwrap().insert(token_id, record);
    }

    pub fn pet(&self, token_id: u64) -> Option<PetRecord> {
        self.pets.lock().unwrap().get(&token_id).copied()
    }

    pub fn reads(&self) -> usize {
        self.status_reads.load(Ordering::SeqCst)
    }

    fn fresh_handle(&self) -> CiphertextHandle {
        handle(self.next_handle.fetch_add(1, Ordering::SeqCst))
    }

    fn apply(&self, call: &PetCall) {
        let mut pets = self.pets.lock().unwrap();
        match call {
            PetCall::CreatePet { .. } => {
                pets.insert(CREATED_TOKEN_ID, PetRecord::new(0x31, 0x32, 0x33));
            }
            PetCall::Feed { token_id, .. } => {
                if let Some(pet) = pets.get_mut(token_id) {
                    pet.hunger = self.fresh_handle();
                    pet.info.last_interaction += 60;
                }
            }
            PetCall::Play { token_id, .. } | PetCall::Rest { token_id, .. } => {
                if let Some(pet) = pets.get_mut(token_id) {
                    pet.happiness = self.fresh_handle();
                    pet.info.last_interaction += 60;
                }
            }
            PetCall::LevelUp { token_id, .. } => {
                if let Some(pet) = pets.get_mut(token_id) {
                    pet.info.level += 1;
                }
            }
        }
    }

    fn read(&self, token_id: u64) -> Result<PetRecord, ContractError> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(ContractError::Transport("connection refused".to_string()));
        }
        self.pet(token_id)
            .ok_or_else(|| ContractError::Reverted("pet does not exist".to_string()))
    }
}

#[async_trait]
impl PetReader for FakeChain {
    async fn get_hunger(
        &self,
        _contract: Address,
        token_id: u64,
    ) -> Result<CiphertextHandle, ContractError> {
        self.status_reads.fetch_add(1, Ordering::SeqCst);
        self.read_gate.pass().await;
        self.read(token_id).map(|pet| pet.hunger)
    }

    async fn get_happiness(
        &self,
        _contract: Address,
        token_id: u64,
    ) -> Result<CiphertextHandle, ContractError> {
        self.read(token_id).map(|pet| pet.happiness)
    }

    async fn get_growth(
        &self,
        _contract: Address,
        token_id: u64,
    ) -> Result<CiphertextHandle, ContractError> {
        self.read(token_id).map(|pet| pet.growth)
    }

    async fn get_pet_info(
        &self,
        _contract: Address,
        token_id: u64,
    ) -> Result<PetInfo, ContractError> {
        self.read(token_id).map(|pet| pet.info)
    }
}

/// FHE engine that "decrypts" from a lookup table.
#[derive(Default)]
pub struct FakeEngine {
    plaintexts: Mutex<HashMap<CiphertextHandle, ClearPlaintext>>,
    pub decrypt_batches: Mutex<Vec<Vec<CiphertextHandle>>>,
    pub encryptions: Mutex<Vec<Vec<u32>>>,
    pub keypairs: AtomicUsize,
    pub decrypt_gate: Gate,
    pub fail_decrypt: AtomicBool,
}

impl FakeEngine {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set_plaintext(&self, handle: CiphertextHandle, clear: ClearPlaintext) {
        self.plaintexts.lock().unwrap().insert(handle, clear);
    }

    pub fn batches(&self) -> Vec<Vec<CiphertextHandle>> {
        self.decrypt_batches.lock().unwrap().clone()
    }

    pub fn encryption_count(&self) -> usize {
        self.encryptions.lock().unwrap().len()
    }
}

#[async_trait]
impl FheEngine for FakeEngine {
    fn generate_keypair(&self) -> Result<EphemeralKeypair, EngineError> {
        let n = self.keypairs.fetch_add(1, Ordering::SeqCst);
        Ok(EphemeralKeypair {
            public_key: format!("0xpub{n}"),
            private_key: SecretString::from(format!("0xpriv{n}")),
        })
    }

    fn create_authorization_payload(
        &self,
        public_key: &str,
        contract_addresses: &[Address],
        start_timestamp: i64,
        duration_days: u32,
    ) -> Result<AuthorizationPayload, EngineError> {
        Ok(AuthorizationPayload(serde_json::json!({
            "publicKey": public_key,
            "contractAddresses": contract_addresses,
            "startTimestamp": start_timestamp,
            "durationDays": duration_days,
        })))
    }

    async fn encrypt(&self, input: EncryptedInput) -> Result<EncryptedValues, EngineError> {
        let values = input.values().to_vec();
        let mut encryptions = self.encryptions.lock().unwrap();
        encryptions.push(values.clone());
        let seed = encryptions.len() as u8;
        Ok(EncryptedValues {
            handles: values.iter().map(|_| B256::repeat_byte(0xe0 | seed)).collect(),
            input_proof: Bytes::from(vec![seed; 4]),
        })
    }

    async fn user_decrypt(
        &self,
        requests: &[DecryptRequest],
        _authorization: &DecryptionAuthorization,
    ) -> Result<DecryptedValues, EngineError> {
        self.decrypt_batches
            .lock()
            .unwrap()
            .push(requests.iter().map(|request| request.handle).collect());
        self.decrypt_gate.pass().await;
        if self.fail_decrypt.load(Ordering::SeqCst) {
            return Err(EngineError::Decryption("relayer unavailable".to_string()));
        }
        let plaintexts = self.plaintexts.lock().unwrap();
        Ok(requests
            .iter()
            .filter_map(|request| {
                plaintexts
                    .get(&request.handle)
                    .map(|clear| (request.handle, *clear))
            })
            .collect())
    }
}

/// Wallet account that applies its calls to the shared [`FakeChain`].
pub struct FakeWallet {
    address: Address,
    chain: Arc<FakeChain>,
    pending: Mutex<HashMap<TxHash, Vec<LogEntry>>>,
    pub sent: Mutex<Vec<PetCall>>,
    pub signatures: AtomicUsize,
    pub receipt_gate: Gate,
    pub decline_signatures: AtomicBool,
    pub omit_creation_event: AtomicBool,
    pub revert: AtomicBool,
}

impl FakeWallet {
    pub fn new(address: Address, chain: Arc<FakeChain>) -> Arc<Self> {
        Arc::new(Self {
            address,
            chain,
            pending: Mutex::new(HashMap::new()),
            sent: Mutex::new(Vec::new()),
            signatures: AtomicUsize::new(0),
            receipt_gate: Gate::default(),
            decline_signatures: AtomicBool::new(false),
            omit_creation_event: AtomicBool::new(false),
            revert: AtomicBool::new(false),
        })
    }

    pub fn signature_count(&self) -> usize {
        self.signatures.load(Ordering::SeqCst)
    }

    pub fn sent_functions(&self) -> Vec<&'static str> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .map(PetCall::function_name)
            .collect()
    }

    fn creation_logs(&self) -> Vec<LogEntry> {
        if self.omit_creation_event.load(Ordering::SeqCst) {
            return Vec::new();
        }
        vec![LogEntry {
            address: contract(),
            topics: vec![
                keccak256(PET_CREATED_EVENT_SIGNATURE.as_bytes()),
                B256::from(U256::from(CREATED_TOKEN_ID).to_be_bytes::<32>()),
                self.address.into_word(),
            ],
            data: Bytes::new(),
        }]
    }
}

#[async_trait]
impl WalletSigner for FakeWallet {
    fn address(&self) -> Address {
        self.address
    }

    async fn sign_typed_data(
        &self,
        _payload: &AuthorizationPayload,
    ) -> Result<String, SignerError> {
        if self.decline_signatures.load(Ordering::SeqCst) {
            return Err(SignerError::Rejected);
        }
        let n = self.signatures.fetch_add(1, Ordering::SeqCst);
        Ok(format!("0xsignature{n}"))
    }

    async fn send(&self, call: PetCall) -> Result<TxHash, ContractError> {
        let mut sent = self.sent.lock().unwrap();
        let tx_hash = B256::repeat_byte(0x70 + sent.len() as u8);
        let logs = match call {
            PetCall::CreatePet { .. } => self.creation_logs(),
            _ => Vec::new(),
        };
        if !self.revert.load(Ordering::SeqCst) {
            self.chain.apply(&call);
        }
        sent.push(call);
        self.pending.lock().unwrap().insert(tx_hash, logs);
        Ok(tx_hash)
    }

    async fn wait_for_receipt(&self, tx_hash: TxHash) -> Result<TxReceipt, ContractError> {
        self.receipt_gate.pass().await;
        let logs = self
            .pending
            .lock()
            .unwrap()
            .remove(&tx_hash)
            .ok_or(ContractError::Dropped {
                tx_hash: tx_hash.to_string(),
            })?;
        let status = if self.revert.load(Ordering::SeqCst) {
            0
        } else {
            1
        };
        Ok(TxReceipt {
            tx_hash,
            status,
            logs,
        })
    }
}

/// A controller wired to fakes, on hardhat with a connected wallet.
pub struct Harness {
    pub identity: Arc<IdentityContext>,
    pub chain: Arc<FakeChain>,
    pub engine: Arc<FakeEngine>,
    pub wallet: Arc<FakeWallet>,
    pub store: Arc<MemoryStore>,
    pub controller: PetSessionController,
}

impl Harness {
    pub fn deployments() -> DeploymentTable {
        DeploymentTable::from_entries([
            DeploymentEntry {
                chain_id: HARDHAT,
                chain_name: Some("hardhat".to_string()),
                address: contract(),
            },
            DeploymentEntry {
                chain_id: SEPOLIA,
                chain_name: Some("sepolia".to_string()),
                address: contract(),
            },
        ])
    }

    pub fn new() -> Self {
        Self::with_deployments(Self::deployments())
    }

    pub fn with_deployments(table: DeploymentTable) -> Self {
        let identity = Arc::new(IdentityContext::new());
        identity.set_chain(Some(HARDHAT));

        let chain = FakeChain::new();
        let engine = FakeEngine::new();
        let wallet = FakeWallet::new(Address::repeat_byte(0xab), chain.clone());
        identity.set_signer(Some(wallet.clone() as Arc<dyn WalletSigner>));

        let store = Arc::new(MemoryStore::new());
        let authorizations = DecryptionAuthorizationCache::new(store.clone(), 365);
        let controller = PetSessionController::new(
            identity.clone(),
            ContractBindingResolver::new(table),
            authorizations,
        );
        controller.set_engine(Some(engine.clone() as Arc<dyn FheEngine>));
        controller.set_reader(Some(chain.clone() as Arc<dyn PetReader>));

        Self {
            identity,
            chain,
            engine,
            wallet,
            store,
            controller,
        }
    }

    /// Install a second account on the same chain.
    pub fn switch_signer(&self, byte: u8) -> Arc<FakeWallet> {
        let wallet = FakeWallet::new(Address::repeat_byte(byte), self.chain.clone());
        self.identity
            .set_signer(Some(wallet.clone() as Arc<dyn WalletSigner>));
        wallet
    }
}
