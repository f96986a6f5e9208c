//! Pet session state machine.
//!
//! Every operation follows the same shape: evaluate the guard (a false guard
//! is a silent no-op), acquire the busy flag, capture an [`OperationScope`],
//! talk to the collaborators, then re-check the scope right before each
//! commit. Results that arrive after the chain, contract, signer or token
//! changed are dropped instead of committed.

use std::sync::{Arc, PoisonError, RwLock};

use alloy_primitives::{Address, U256};
use tokio::sync::watch;
use tokio_stream::wrappers::WatchStream;
use tracing::Instrument;
use uuid::Uuid;

use super::guards::{BusyPermit, Operation, OperationGuards};
use super::scope::OperationScope;
use super::state::{
    Attribute, AttributeView, OperationOutcome, PetSession, PetSnapshot, PetState, PetStatusRead,
};
use crate::contract::{
    CiphertextHandle, ContractBinding, ContractBindingResolver, EncryptedArg, PetAction, PetCall,
    PetReader, TxReceipt, WalletSigner, decode_created_token_id,
};
use crate::error::{ContractError, EngineError};
use crate::fhe::{
    ClearValue, DecryptRequest, DecryptionAuthorizationCache, EncryptedInput, EncryptedKind,
    FheEngine,
};
use crate::identity::IdentityContext;

/// Decrypted growth needed before `levelUp` is offered.
pub const LEVEL_UP_GROWTH_THRESHOLD: u64 = 100;

/// Collaborators and context for a contract read.
struct ReadPlan {
    scope: OperationScope,
    reader: Arc<dyn PetReader>,
    contract: Address,
    token_id: u64,
}

/// Collaborators and context for a wallet-backed operation.
struct WritePlan {
    scope: OperationScope,
    contract: Address,
    signer: Arc<dyn WalletSigner>,
}

impl WritePlan {
    fn token_id(&self) -> Option<u64> {
        self.scope.token_id
    }
}

/// Owns one pet session and serializes the operations on it.
pub struct PetSessionController {
    identity: Arc<IdentityContext>,
    resolver: ContractBindingResolver,
    authorizations: DecryptionAuthorizationCache,
    engine: RwLock<Option<Arc<dyn FheEngine>>>,
    reader: RwLock<Option<Arc<dyn PetReader>>>,
    guards: OperationGuards,
    state: watch::Sender<PetState>,
}

impl PetSessionController {
    pub fn new(
        identity: Arc<IdentityContext>,
        resolver: ContractBindingResolver,
        authorizations: DecryptionAuthorizationCache,
    ) -> Self {
        let controller = Self {
            identity,
            resolver,
            authorizations,
            engine: RwLock::new(None),
            reader: RwLock::new(None),
            guards: OperationGuards::new(),
            state: watch::Sender::new(PetState::default()),
        };
        controller.sync_deployment_message();
        controller
    }

    pub fn identity(&self) -> &Arc<IdentityContext> {
        &self.identity
    }

    /// Install or remove the FHE engine (e.g. once the relayer SDK loads).
    pub fn set_engine(&self, engine: Option<Arc<dyn FheEngine>>) {
        *self.engine.write().unwrap_or_else(PoisonError::into_inner) = engine;
    }

    /// Install or remove the read-only contract provider.
    pub fn set_reader(&self, reader: Option<Arc<dyn PetReader>>) {
        *self.reader.write().unwrap_or_else(PoisonError::into_inner) = reader;
    }

    fn engine(&self) -> Option<Arc<dyn FheEngine>> {
        self.engine
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn reader(&self) -> Option<Arc<dyn PetReader>> {
        self.reader
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Binding for the live chain id.
    pub fn binding(&self) -> ContractBinding {
        self.resolver.resolve(self.identity.chain_id())
    }

    pub fn token_id(&self) -> Option<u64> {
        self.state.borrow().session.token_id
    }

    pub fn session(&self) -> PetSession {
        self.state.borrow().session.clone()
    }

    pub fn message(&self) -> String {
        self.state.borrow().message.clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<PetState> {
        self.state.subscribe()
    }

    pub fn updates(&self) -> WatchStream<PetState> {
        WatchStream::new(self.state.subscribe())
    }

    pub fn snapshot(&self) -> PetSnapshot {
        let binding = self.binding();
        let state = self.state.borrow().clone();
        PetSnapshot {
            chain_id: binding.chain_id,
            contract_address: binding.deployed_address(),
            is_deployed: binding.is_deployed(),
            token_id: state.session.token_id,
            hunger: AttributeView::from(&state.session.hunger),
            happiness: AttributeView::from(&state.session.happiness),
            growth: AttributeView::from(&state.session.growth),
            level: state.session.level,
            last_interaction: state.session.last_interaction,
            busy: self.guards.flags(),
            message: state.message,
            can_create: self.can_create(),
            can_interact: self.can_interact(),
            can_decrypt: self.can_decrypt(),
            can_refresh: self.can_refresh(),
            can_level_up: self.can_level_up(),
        }
    }

    // ── Identity changes ───────────────────────────────────────

    /// Switch the live chain and update the deployment warning.
    pub fn switch_chain(&self, chain_id: Option<u64>) {
        self.identity.set_chain(chain_id);
        self.sync_deployment_message();
    }

    /// Show the deployment warning when the chain is known but the contract
    /// is not deployed there; clear the message otherwise.
    pub fn sync_deployment_message(&self) {
        let binding = self.binding();
        match binding.deployment_warning() {
            Some(warning) => {
                tracing::warn!(chain_id = ?binding.chain_id, "{warning}");
                self.set_message(warning);
            }
            None => self.set_message(""),
        }
    }

    /// Start a new session for `token_id`, then read its status.
    pub async fn select_pet(&self, token_id: Option<u64>) -> OperationOutcome {
        self.state
            .send_modify(|state| state.session = PetSession::for_token(token_id));
        tracing::info!(token_id = ?token_id, "Pet session started");
        match token_id {
            Some(_) => self.refresh().await,
            None => OperationOutcome::Committed,
        }
    }

    // ── Guards ─────────────────────────────────────────────────

    fn plan_read(&self) -> Option<ReadPlan> {
        let token_id = self.token_id()?;
        let binding = self.binding();
        let chain_id = binding.chain_id?;
        let contract = binding.deployed_address()?;
        let reader = self.reader()?;
        Some(ReadPlan {
            scope: OperationScope {
                chain_id: Some(chain_id),
                contract,
                signer: None,
                token_id: Some(token_id),
            },
            reader,
            contract,
            token_id,
        })
    }

    /// `needs_token`: `Some(true)` requires a selected pet, `Some(false)`
    /// requires none, `None` does not care.
    fn plan_write(&self, needs_token: Option<bool>) -> Option<WritePlan> {
        let binding = self.binding();
        let contract = binding.deployed_address()?;
        let (signer_id, signer) = self.identity.current_signer()?;
        let token_id = self.token_id();
        match (needs_token, token_id) {
            (Some(true), None) | (Some(false), Some(_)) => return None,
            _ => {}
        }
        Some(WritePlan {
            scope: OperationScope {
                chain_id: binding.chain_id,
                contract,
                signer: Some(signer_id),
                token_id,
            },
            contract,
            signer,
        })
    }

    fn growth_ready(&self) -> bool {
        self.state
            .borrow()
            .session
            .growth
            .current_clear()
            .and_then(|clear| clear.as_uint())
            .is_some_and(|growth| growth >= U256::from(LEVEL_UP_GROWTH_THRESHOLD))
    }

    pub fn can_refresh(&self) -> bool {
        self.plan_read().is_some() && self.guards.can_start(Operation::Refresh)
    }

    pub fn can_decrypt(&self) -> bool {
        self.engine().is_some()
            && self.plan_write(Some(true)).is_some()
            && !self.session().decryptable_handles().is_empty()
            && self.guards.can_start(Operation::Decrypt)
    }

    pub fn can_interact(&self) -> bool {
        self.engine().is_some()
            && self.plan_write(Some(true)).is_some()
            && self.guards.can_start(Operation::Interact)
    }

    pub fn can_create(&self) -> bool {
        self.engine().is_some()
            && self.plan_write(Some(false)).is_some()
            && self.guards.can_start(Operation::Create)
    }

    pub fn can_level_up(&self) -> bool {
        self.plan_write(Some(true)).is_some()
            && self.growth_ready()
            && self.guards.can_start(Operation::LevelUp)
    }

    // ── Shared plumbing ────────────────────────────────────────

    fn set_message(&self, message: impl Into<String>) {
        let message = message.into();
        self.state.send_if_modified(|state| {
            if state.message == message {
                return false;
            }
            state.message = message;
            true
        });
    }

    /// Clear the status line only if it still shows `expected`.
    fn retract_message(&self, expected: &str) {
        self.state.send_if_modified(|state| {
            if state.message != expected {
                return false;
            }
            state.message.clear();
            true
        });
    }

    fn publish_busy(&self) {
        let flags = self.guards.flags();
        self.state.send_if_modified(|state| {
            if state.busy == flags {
                return false;
            }
            state.busy = flags;
            true
        });
    }

    fn acquire(&self, operation: Operation) -> Option<BusyPermit<'_>> {
        let permit = self.guards.try_acquire(operation)?;
        self.publish_busy();
        Some(permit)
    }

    fn release(&self, permit: BusyPermit<'_>) {
        drop(permit);
        self.publish_busy();
    }

    fn is_current(&self, scope: &OperationScope) -> bool {
        scope.is_current(
            &self.identity,
            self.binding().deployed_address(),
            self.token_id(),
        )
    }

    fn span(operation: Operation, token_id: Option<u64>) -> tracing::Span {
        tracing::info_span!(
            "pet_operation",
            operation = operation.as_str(),
            operation_id = %Uuid::new_v4(),
            token_id = ?token_id,
        )
    }

    // ── refresh ────────────────────────────────────────────────

    /// Re-read the three handles and the pet info.
    pub async fn refresh(&self) -> OperationOutcome {
        let Some(plan) = self.plan_read() else {
            return OperationOutcome::Skipped;
        };
        let Some(permit) = self.acquire(Operation::Refresh) else {
            return OperationOutcome::Skipped;
        };

        let span = Self::span(Operation::Refresh, Some(plan.token_id));
        let outcome = self.run_refresh(plan).instrument(span).await;
        self.release(permit);
        outcome
    }

    async fn run_refresh(&self, plan: ReadPlan) -> OperationOutcome {
        let ReadPlan {
            scope,
            reader,
            contract,
            token_id,
        } = plan;

        let read = tokio::try_join!(
            reader.get_hunger(contract, token_id),
            reader.get_happiness(contract, token_id),
            reader.get_growth(contract, token_id),
            reader.get_pet_info(contract, token_id),
        );

        let (hunger, happiness, growth, info) = match read {
            Ok(read) => read,
            Err(e) => {
                tracing::warn!(error = %e, "Pet status read failed");
                if !self.is_current(&scope) {
                    return OperationOutcome::Cancelled;
                }
                let message = format!("Failed to get pet status: {e}");
                self.set_message(message.clone());
                return OperationOutcome::Failed(message);
            }
        };

        if !self.is_current(&scope) {
            tracing::debug!("Context changed during refresh; discarding result");
            return OperationOutcome::Cancelled;
        }

        let status = PetStatusRead {
            hunger,
            happiness,
            growth,
            info,
        };
        self.state
            .send_modify(|state| state.session.apply_status(status));
        tracing::debug!(level = info.level, "Pet status refreshed");
        OperationOutcome::Committed
    }

    // ── decrypt ────────────────────────────────────────────────

    /// Decrypt every recorded, non-zero handle of the current pet.
    pub async fn decrypt(&self) -> OperationOutcome {
        let Some(engine) = self.engine() else {
            return OperationOutcome::Skipped;
        };
        let Some(plan) = self.plan_write(Some(true)) else {
            return OperationOutcome::Skipped;
        };
        let handles = self.session().decryptable_handles();
        if handles.is_empty() {
            return OperationOutcome::Skipped;
        }
        let Some(permit) = self.acquire(Operation::Decrypt) else {
            return OperationOutcome::Skipped;
        };

        self.set_message("Starting decryption...");
        let span = Self::span(Operation::Decrypt, plan.token_id());
        let outcome = self
            .run_decrypt(plan, engine, handles)
            .instrument(span)
            .await;
        self.release(permit);
        outcome
    }

    async fn run_decrypt(
        &self,
        plan: WritePlan,
        engine: Arc<dyn FheEngine>,
        handles: Vec<(Attribute, CiphertextHandle)>,
    ) -> OperationOutcome {
        let authorization = match self
            .authorizations
            .load_or_sign(engine.as_ref(), &[plan.contract], plan.signer.as_ref())
            .await
        {
            Ok(authorization) => authorization,
            Err(e) => {
                tracing::warn!(error = %e, "Decryption authorization unavailable");
                if !self.is_current(&plan.scope) {
                    return OperationOutcome::Cancelled;
                }
                self.set_message(format!("Unable to build FHEVM decryption signature: {e}"));
                return OperationOutcome::AuthorizationUnavailable;
            }
        };

        if !self.is_current(&plan.scope) {
            self.set_message("Operation cancelled");
            return OperationOutcome::Cancelled;
        }

        self.set_message("Decrypting pet status...");

        let requests: Vec<(Attribute, DecryptRequest)> = handles
            .into_iter()
            .filter(|(_, handle)| !handle.is_zero())
            .map(|(attribute, handle)| {
                (
                    attribute,
                    DecryptRequest {
                        handle,
                        contract_address: plan.contract,
                        kind: EncryptedKind::Euint32,
                    },
                )
            })
            .collect();
        if requests.is_empty() {
            self.set_message("No encrypted data to decrypt");
            return OperationOutcome::NothingToDecrypt;
        }

        let batch: Vec<DecryptRequest> = requests.iter().map(|(_, request)| *request).collect();
        let results = match engine.user_decrypt(&batch, &authorization).await {
            Ok(results) => results,
            Err(e) => {
                tracing::warn!(error = %e, "User decryption failed");
                if !self.is_current(&plan.scope) {
                    self.set_message("Operation cancelled");
                    return OperationOutcome::Cancelled;
                }
                let message = format!("Decryption failed: {e}");
                self.set_message(message.clone());
                return OperationOutcome::Failed(message);
            }
        };

        if !self.is_current(&plan.scope) {
            self.set_message("Operation cancelled");
            return OperationOutcome::Cancelled;
        }

        self.state.send_modify(|state| {
            for (attribute, request) in &requests {
                if let Some(clear) = results.get(&request.handle) {
                    state.session.slot_mut(*attribute).clear = Some(ClearValue {
                        handle: request.handle,
                        clear: *clear,
                    });
                }
            }
        });
        tracing::info!(
            requested = requests.len(),
            decrypted = results.len(),
            "Decryption completed"
        );
        self.set_message("Decryption completed!");
        OperationOutcome::Committed
    }

    // ── interact ───────────────────────────────────────────────

    /// Feed, play with or rest the pet by an encrypted `magnitude`.
    pub async fn interact(&self, action: PetAction, magnitude: u32) -> OperationOutcome {
        if magnitude == 0 {
            return OperationOutcome::Skipped;
        }
        let Some(engine) = self.engine() else {
            return OperationOutcome::Skipped;
        };
        let Some(plan) = self.plan_write(Some(true)) else {
            return OperationOutcome::Skipped;
        };
        let Some(permit) = self.acquire(Operation::Interact) else {
            return OperationOutcome::Skipped;
        };

        self.set_message(format!("Starting {action}..."));
        let span = Self::span(Operation::Interact, plan.token_id());
        let outcome = self
            .run_interact(plan, engine, action, magnitude)
            .instrument(span)
            .await;
        self.release(permit);
        outcome
    }

    async fn run_interact(
        &self,
        plan: WritePlan,
        engine: Arc<dyn FheEngine>,
        action: PetAction,
        magnitude: u32,
    ) -> OperationOutcome {
        let Some(token_id) = plan.token_id() else {
            return OperationOutcome::Skipped;
        };
        let fail = |e: &dyn std::fmt::Display| {
            tracing::warn!(action = %action, error = %e, "Interaction failed");
            if !self.is_current(&plan.scope) {
                return OperationOutcome::Cancelled;
            }
            let message = format!("{action} failed: {e}");
            self.set_message(message.clone());
            OperationOutcome::Failed(message)
        };

        let input = match encrypt_single(
            engine.as_ref(),
            plan.contract,
            plan.signer.address(),
            magnitude,
        )
        .await
        {
            Ok(input) => input,
            Err(e) => return fail(&e),
        };

        if !self.is_current(&plan.scope) {
            self.set_message("Operation cancelled");
            return OperationOutcome::Cancelled;
        }

        self.set_message(format!("Calling {action}..."));
        let call = action.into_call(plan.contract, token_id, input);
        let receipt = match self.send_and_wait(&plan, call).await {
            Ok(receipt) => receipt,
            Err(e) => return fail(&e),
        };

        if !self.is_current(&plan.scope) {
            // The transaction landed, so the pet's handles did change; a read
            // for the live context is still worthwhile when only the signer
            // moved. Nothing tied to the old context is shown.
            tracing::info!(action = %action, "Context changed after send; suppressing completion");
            if self.is_current(&plan.scope.ignoring_signer()) {
                self.refresh().await;
            }
            return OperationOutcome::Cancelled;
        }

        self.set_message(format!("{action} completed! Status: {}", receipt.status));
        tracing::info!(action = %action, tx_hash = %receipt.tx_hash, "Interaction completed");
        self.refresh().await;
        OperationOutcome::Committed
    }

    // ── create ─────────────────────────────────────────────────

    /// Mint a pet with encrypted initial stats.
    pub async fn create(
        &self,
        hunger: u32,
        happiness: u32,
        growth: u32,
        metadata_uri: &str,
    ) -> OperationOutcome {
        let Some(engine) = self.engine() else {
            return OperationOutcome::Skipped;
        };
        let Some(plan) = self.plan_write(Some(false)) else {
            return OperationOutcome::Skipped;
        };
        let Some(permit) = self.acquire(Operation::Create) else {
            return OperationOutcome::Skipped;
        };

        self.set_message("Creating pet...");
        let span = Self::span(Operation::Create, None);
        let outcome = self
            .run_create(plan, engine, [hunger, happiness, growth], metadata_uri)
            .instrument(span)
            .await;
        self.release(permit);
        outcome
    }

    async fn run_create(
        &self,
        plan: WritePlan,
        engine: Arc<dyn FheEngine>,
        stats: [u32; 3],
        metadata_uri: &str,
    ) -> OperationOutcome {
        let fail = |e: &dyn std::fmt::Display| {
            tracing::warn!(error = %e, "Pet creation failed");
            if !self.is_current(&plan.scope) {
                return OperationOutcome::Cancelled;
            }
            let message = format!("Create pet failed: {e}");
            self.set_message(message.clone());
            OperationOutcome::Failed(message)
        };

        // createPet verifies each stat against its own proof, so every value
        // is encrypted on its own.
        let user = plan.signer.address();
        let mut inputs = Vec::with_capacity(stats.len());
        for value in stats {
            match encrypt_single(engine.as_ref(), plan.contract, user, value).await {
                Ok(input) => inputs.push(input),
                Err(e) => return fail(&e),
            }
        }
        let [hunger, happiness, growth]: [EncryptedArg; 3] = match inputs.try_into() {
            Ok(inputs) => inputs,
            Err(_) => return fail(&"engine returned an incomplete input set"),
        };

        if !self.is_current(&plan.scope) {
            self.set_message("Operation cancelled");
            return OperationOutcome::Cancelled;
        }

        self.set_message("Sending create pet transaction...");
        let call = PetCall::CreatePet {
            contract: plan.contract,
            hunger,
            happiness,
            growth,
            metadata_uri: metadata_uri.to_string(),
        };
        let receipt = match self.send_and_wait(&plan, call).await {
            Ok(receipt) => receipt,
            Err(e) => return fail(&e),
        };

        let Some(created) = decode_created_token_id(&receipt.logs, plan.contract) else {
            tracing::warn!(tx_hash = %receipt.tx_hash, "No creation event in receipt");
            if !self.is_current(&plan.scope) {
                return OperationOutcome::Cancelled;
            }
            self.set_message("Pet created but could not get token ID. Please refresh.");
            return OperationOutcome::CreatedWithoutTokenId;
        };

        tracing::info!(
            token_id = created.token_id,
            source = created.source,
            tx_hash = %receipt.tx_hash,
            "Pet created"
        );

        if !self.is_current(&plan.scope) {
            tracing::info!("Context changed during create; token not selected");
            return OperationOutcome::Cancelled;
        }

        self.set_message(format!("Pet created! Token ID: {}", created.token_id));
        self.state
            .send_modify(|state| state.session = PetSession::for_token(Some(created.token_id)));
        self.refresh().await;
        OperationOutcome::Committed
    }

    // ── level up ───────────────────────────────────────────────

    /// Level the pet up once its decrypted growth reaches the threshold.
    pub async fn level_up(&self) -> OperationOutcome {
        let Some(plan) = self.plan_write(Some(true)) else {
            return OperationOutcome::Skipped;
        };
        if !self.growth_ready() {
            return OperationOutcome::Skipped;
        }
        let Some(permit) = self.acquire(Operation::LevelUp) else {
            return OperationOutcome::Skipped;
        };

        self.set_message("Leveling up pet...");
        let span = Self::span(Operation::LevelUp, plan.token_id());
        let outcome = self.run_level_up(plan).instrument(span).await;
        self.release(permit);
        outcome
    }

    async fn run_level_up(&self, plan: WritePlan) -> OperationOutcome {
        let Some(token_id) = plan.token_id() else {
            return OperationOutcome::Skipped;
        };

        let call = PetCall::LevelUp {
            contract: plan.contract,
            token_id,
        };
        if let Err(e) = self.send_and_wait(&plan, call).await {
            tracing::warn!(error = %e, "Level up failed");
            if !self.is_current(&plan.scope) {
                return OperationOutcome::Cancelled;
            }
            let message = format!("Level up failed: {e}");
            self.set_message(message.clone());
            return OperationOutcome::Failed(message);
        }

        if !self.is_current(&plan.scope) {
            tracing::info!("Context changed during level up; suppressing completion");
            return OperationOutcome::Cancelled;
        }

        self.set_message("Pet leveled up!");
        self.refresh().await;
        OperationOutcome::Committed
    }

    /// Submit `call`, wait for inclusion and treat a reverted receipt as an error.
    ///
    /// The waiting notice is only shown while `plan` is current and is taken
    /// back if the context moves on before the receipt arrives.
    async fn send_and_wait(
        &self,
        plan: &WritePlan,
        call: PetCall,
    ) -> Result<TxReceipt, ContractError> {
        let function = call.function_name();
        let tx_hash = plan.signer.send(call).await?;
        tracing::debug!(function, tx_hash = %tx_hash, "Transaction submitted");

        let waiting = format!("Waiting for transaction {tx_hash}...");
        if self.is_current(&plan.scope) {
            self.set_message(waiting.clone());
        }
        let receipt = plan.signer.wait_for_receipt(tx_hash).await;
        if !self.is_current(&plan.scope) {
            self.retract_message(&waiting);
        }

        let receipt = receipt?;
        if !receipt.succeeded() {
            return Err(ContractError::Reverted(format!(
                "{function} transaction {tx_hash} reverted"
            )));
        }
        Ok(receipt)
    }
}

async fn encrypt_single(
    engine: &dyn FheEngine,
    contract: Address,
    user: Address,
    value: u32,
) -> Result<EncryptedArg, EngineError> {
    let values = engine
        .encrypt(EncryptedInput::new(contract, user).add32(value))
        .await?;
    values.single()
}
