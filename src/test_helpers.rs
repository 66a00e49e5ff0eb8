//! In-memory lottery used by the tests in place of a node.

use crate::{
    contract::LotteryStatus,
    controller::{
        ChainError,
        ChainResult,
        LotteryController,
        LotteryReads,
        LotteryWallet,
        DEFAULT_MIN_ENTRY_ETH,
    },
};
use alloy::primitives::{
    Address,
    TxHash,
    U256,
    utils::parse_ether,
};
use std::{
    collections::HashMap,
    sync::{
        Arc,
        Mutex,
        MutexGuard,
    },
};
use tokio::sync::Notify;

pub type FakeController = LotteryController<FakeReader, FakeWallet>;

#[derive(Clone, Debug)]
enum PendingAction {
    Enter { player: Address, value: U256 },
    Withdraw { player: Address },
}

#[derive(Debug)]
struct FakeState {
    players: Vec<Address>,
    recent_winner: Address,
    winner_balances: HashMap<Address, U256>,
    balances: HashMap<Address, U256>,
    entrance_fee: U256,
    status: LotteryStatus,
    network_calls: usize,
    submissions: usize,
    /// Reads left before every read fails with the given reason.
    read_failure: Option<(usize, String)>,
    reads_paused: bool,
    revert_next: Option<String>,
    hold_confirmations: bool,
    pending: HashMap<TxHash, PendingAction>,
    tx_count: u8,
}

/// Shared chain state; readers and wallets created from it see the same
/// contract.
#[derive(Clone, Debug)]
pub struct FakeChain {
    state: Arc<Mutex<FakeState>>,
    release: Arc<Notify>,
    reads_resumed: Arc<Notify>,
}

impl Default for FakeChain {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeChain {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(FakeState {
                players: Vec::new(),
                recent_winner: Address::ZERO,
                winner_balances: HashMap::new(),
                balances: HashMap::new(),
                entrance_fee: parse_ether(DEFAULT_MIN_ENTRY_ETH).unwrap(),
                status: LotteryStatus::Open,
                network_calls: 0,
                submissions: 0,
                read_failure: None,
                reads_paused: false,
                revert_next: None,
                hold_confirmations: false,
                pending: HashMap::new(),
                tx_count: 0,
            })),
            release: Arc::new(Notify::new()),
            reads_resumed: Arc::new(Notify::new()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().unwrap()
    }

    pub fn reader(&self) -> FakeReader {
        FakeReader {
            chain: self.clone(),
        }
    }

    /// Wallet for `address`, funded with `balance` wei.
    pub fn wallet(&self, address: Address, balance: U256) -> FakeWallet {
        self.lock().balances.insert(address, balance);
        FakeWallet {
            chain: self.clone(),
            address,
        }
    }

    pub fn add_player(&self, player: Address) {
        self.lock().players.push(player);
    }

    pub fn pick_winner(&self, winner: Address, prize: U256) {
        let mut state = self.lock();
        state.recent_winner = winner;
        state.winner_balances.insert(winner, prize);
        state.players.clear();
    }

    pub fn set_status(&self, status: LotteryStatus) {
        self.lock().status = status;
    }

    pub fn fail_reads(&self, reason: Option<&str>) {
        self.lock().read_failure = reason.map(|reason| (0, reason.to_string()));
    }

    /// Let `reads` more reads succeed, then fail every read with `reason`.
    pub fn fail_reads_after(&self, reads: usize, reason: &str) {
        self.lock().read_failure = Some((reads, reason.to_string()));
    }

    /// Park every read until [`Self::resume_reads`].
    pub fn pause_reads(&self) {
        self.lock().reads_paused = true;
    }

    pub fn resume_reads(&self) {
        self.lock().reads_paused = false;
        self.reads_resumed.notify_waiters();
    }

    async fn read_gate(&self) {
        loop {
            let resumed = self.reads_resumed.notified();
            if !self.lock().reads_paused {
                return;
            }
            resumed.await;
        }
    }

    pub fn revert_next_transaction(&self, reason: &str) {
        self.lock().revert_next = Some(reason.to_string());
    }

    /// Keep submitted transactions unconfirmed until [`Self::release_confirmation`].
    pub fn hold_confirmations(&self) {
        self.lock().hold_confirmations = true;
    }

    pub fn release_confirmation(&self) {
        self.lock().hold_confirmations = false;
        self.release.notify_one();
    }

    pub fn network_calls(&self) -> usize {
        self.lock().network_calls
    }

    pub fn submissions(&self) -> usize {
        self.lock().submissions
    }

    pub fn players(&self) -> Vec<Address> {
        self.lock().players.clone()
    }

    pub fn balance_of(&self, address: Address) -> U256 {
        self.lock().balances.get(&address).copied().unwrap_or_default()
    }

    async fn read<T>(&self, f: impl FnOnce(&FakeState) -> T) -> ChainResult<T> {
        self.read_gate().await;
        let mut state = self.lock();
        state.network_calls += 1;
        if let Some((remaining, reason)) = state.read_failure.as_mut() {
            if *remaining == 0 {
                return Err(ChainError::new(reason.clone()));
            }
            *remaining -= 1;
        }
        Ok(f(&*state))
    }

    fn submit(&self, action: PendingAction) -> ChainResult<TxHash> {
        let mut state = self.lock();
        state.network_calls += 1;
        state.submissions += 1;
        state.tx_count = state.tx_count.wrapping_add(1);
        let hash = TxHash::with_last_byte(state.tx_count);
        state.pending.insert(hash, action);
        Ok(hash)
    }

    async fn confirm(&self, hash: TxHash) -> ChainResult<()> {
        let held = {
            let mut state = self.lock();
            state.network_calls += 1;
            state.hold_confirmations
        };
        if held {
            self.release.notified().await;
        }
        let mut state = self.lock();
        let action = state
            .pending
            .remove(&hash)
            .ok_or_else(|| ChainError::new(format!("unknown transaction {hash}")))?;
        if let Some(reason) = state.revert_next.take() {
            return Err(ChainError::new(reason));
        }
        match action {
            PendingAction::Enter { player, value } => {
                let balance = state.balances.entry(player).or_default();
                *balance = balance.saturating_sub(value);
                state.players.push(player);
            }
            PendingAction::Withdraw { player } => {
                let reward = state
                    .winner_balances
                    .get(&player)
                    .copied()
                    .unwrap_or_default();
                if reward.is_zero() {
                    return Err(ChainError::new("no reward to withdraw"));
                }
                state.winner_balances.insert(player, U256::ZERO);
                *state.balances.entry(player).or_default() += reward;
            }
        }
        Ok(())
    }
}

async fn read_players_length(chain: &FakeChain) -> ChainResult<u64> {
    chain.read(|s| s.players.len() as u64).await
}

async fn read_player(chain: &FakeChain, index: u64) -> ChainResult<Address> {
    chain
        .read(|s| s.players.get(index as usize).copied())
        .await?
        .ok_or_else(|| ChainError::new(format!("no player at index {index}")))
}

async fn read_winner_balance(chain: &FakeChain, winner: Address) -> ChainResult<U256> {
    chain
        .read(|s| s.winner_balances.get(&winner).copied().unwrap_or_default())
        .await
}

#[derive(Clone, Debug)]
pub struct FakeReader {
    chain: FakeChain,
}

impl LotteryReads for FakeReader {
    async fn players_length(&self) -> ChainResult<u64> {
        read_players_length(&self.chain).await
    }

    async fn player_by_index(&self, index: u64) -> ChainResult<Address> {
        read_player(&self.chain, index).await
    }

    async fn recent_winner(&self) -> ChainResult<Address> {
        self.chain.read(|s| s.recent_winner).await
    }

    async fn winner_balance(&self, winner: Address) -> ChainResult<U256> {
        read_winner_balance(&self.chain, winner).await
    }

    async fn entrance_fee(&self) -> ChainResult<U256> {
        self.chain.read(|s| s.entrance_fee).await
    }

    async fn lottery_status(&self) -> ChainResult<LotteryStatus> {
        self.chain.read(|s| s.status).await
    }
}

#[derive(Clone, Debug)]
pub struct FakeWallet {
    chain: FakeChain,
    address: Address,
}

impl LotteryReads for FakeWallet {
    async fn players_length(&self) -> ChainResult<u64> {
        read_players_length(&self.chain).await
    }

    async fn player_by_index(&self, index: u64) -> ChainResult<Address> {
        read_player(&self.chain, index).await
    }

    async fn recent_winner(&self) -> ChainResult<Address> {
        self.chain.read(|s| s.recent_winner).await
    }

    async fn winner_balance(&self, winner: Address) -> ChainResult<U256> {
        read_winner_balance(&self.chain, winner).await
    }

    async fn entrance_fee(&self) -> ChainResult<U256> {
        self.chain.read(|s| s.entrance_fee).await
    }

    async fn lottery_status(&self) -> ChainResult<LotteryStatus> {
        self.chain.read(|s| s.status).await
    }
}

impl LotteryWallet for FakeWallet {
    fn address(&self) -> Address {
        self.address
    }

    async fn balance(&self) -> ChainResult<U256> {
        let address = self.address;
        self.chain
            .read(|s| s.balances.get(&address).copied().unwrap_or_default())
            .await
    }

    async fn submit_entry(&self, value: U256) -> ChainResult<TxHash> {
        self.chain.submit(PendingAction::Enter {
            player: self.address,
            value,
        })
    }

    async fn submit_withdrawal(&self) -> ChainResult<TxHash> {
        self.chain.submit(PendingAction::Withdraw {
            player: self.address,
        })
    }

    async fn wait_for_confirmation(&self, hash: TxHash) -> ChainResult<()> {
        self.chain.confirm(hash).await
    }
}

pub struct TestContext {
    chain: FakeChain,
    controller: Arc<FakeController>,
    alice: Address,
}

impl Default for TestContext {
    fn default() -> Self {
        Self::new()
    }
}

impl TestContext {
    /// Empty lottery, Alice funded with 1 ETH but not connected yet.
    pub fn new() -> Self {
        let chain = FakeChain::new();
        let min_entry = parse_ether(DEFAULT_MIN_ENTRY_ETH).unwrap();
        let controller = Arc::new(LotteryController::new(chain.reader(), min_entry));
        let alice = Address::repeat_byte(0xa1);
        chain.wallet(alice, parse_ether("1").unwrap());
        Self {
            chain,
            controller,
            alice,
        }
    }

    pub fn chain(&self) -> &FakeChain {
        &self.chain
    }

    pub fn controller(&self) -> Arc<FakeController> {
        self.controller.clone()
    }

    pub fn alice(&self) -> Address {
        self.alice
    }

    pub fn alice_wallet(&self) -> FakeWallet {
        FakeWallet {
            chain: self.chain.clone(),
            address: self.alice,
        }
    }

    pub fn connect_alice(&self) {
        self.controller.connect(self.alice_wallet()).unwrap();
    }
}
