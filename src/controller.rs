//! Sequencing of reads and writes against the lottery contract.
//!
//! The controller owns the only mutable state of the client: the last
//! successful [`LotterySnapshot`], the current [`Phase`] and, while a
//! transaction is outstanding, the [`PendingTransaction`]. Every operation
//! either replaces the snapshot wholesale or leaves it untouched.

use crate::{
    contract::LotteryStatus,
    format::format_eth,
};
use alloy::primitives::{
    Address,
    TxHash,
    U256,
    utils::parse_ether,
};
use std::{
    future::Future,
    sync::{
        Mutex,
        MutexGuard,
    },
};
use thiserror::Error;
use tracing::{
    debug,
    info,
    warn,
};

pub const DEFAULT_MIN_ENTRY_ETH: &str = "0.01";

/// Failure reported by the chain side of the seam.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
#[error("{reason}")]
pub struct ChainError {
    pub reason: String,
}

impl ChainError {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

pub type ChainResult<T> = Result<T, ChainError>;

/// Read-only view of the lottery contract.
pub trait LotteryReads: Send + Sync {
    fn players_length(&self) -> impl Future<Output = ChainResult<u64>> + Send;

    fn player_by_index(
        &self,
        index: u64,
    ) -> impl Future<Output = ChainResult<Address>> + Send;

    fn recent_winner(&self) -> impl Future<Output = ChainResult<Address>> + Send;

    fn winner_balance(
        &self,
        winner: Address,
    ) -> impl Future<Output = ChainResult<U256>> + Send;

    fn entrance_fee(&self) -> impl Future<Output = ChainResult<U256>> + Send;

    fn lottery_status(&self) -> impl Future<Output = ChainResult<LotteryStatus>> + Send;
}

/// A connected wallet: reads through its own connection and can sign.
pub trait LotteryWallet: LotteryReads + Clone {
    fn address(&self) -> Address;

    fn balance(&self) -> impl Future<Output = ChainResult<U256>> + Send;

    /// Submit `enterLottery` carrying `value` wei, returning once the wallet
    /// has handed the transaction to the network.
    fn submit_entry(&self, value: U256) -> impl Future<Output = ChainResult<TxHash>> + Send;

    /// Submit `windrawReward`.
    fn submit_withdrawal(&self) -> impl Future<Output = ChainResult<TxHash>> + Send;

    /// Resolves once the transaction is mined; a reverted receipt is an error.
    fn wait_for_confirmation(
        &self,
        hash: TxHash,
    ) -> impl Future<Output = ChainResult<()>> + Send;
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ErrorKind {
    Validation,
    Network,
    Transaction,
    Busy,
}

#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum ClientError {
    #[error("Please connect your wallet first")]
    NotConnected,
    #[error("Please enter a valid amount (got '{input}')")]
    InvalidAmount { input: String },
    #[error("Entry of {amount} ETH is below the minimum of {minimum} ETH")]
    BelowMinimum { amount: String, minimum: String },
    #[error("Insufficient balance: have {balance} ETH, need {required} ETH")]
    InsufficientBalance { balance: String, required: String },
    #[error("Could not unlock wallet: {0}")]
    Wallet(String),
    #[error("Another action is still in progress")]
    Busy,
    #[error("Failed to fetch contract data: {0}")]
    Read(ChainError),
    #[error("Transaction failed: {0}")]
    Transaction(ChainError),
}

impl ClientError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ClientError::NotConnected
            | ClientError::InvalidAmount { .. }
            | ClientError::BelowMinimum { .. }
            | ClientError::InsufficientBalance { .. }
            | ClientError::Wallet(_) => ErrorKind::Validation,
            ClientError::Busy => ErrorKind::Busy,
            ClientError::Read(_) => ErrorKind::Network,
            ClientError::Transaction(_) => ErrorKind::Transaction,
        }
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct WinnerRecord {
    pub address: Address,
    pub balance: U256,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct LotterySnapshot {
    pub participants: Vec<Address>,
    /// `None` until the contract has picked a winner.
    pub winner: Option<WinnerRecord>,
    pub entrance_fee: U256,
    pub status: LotteryStatus,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct PendingTransaction {
    pub hash: TxHash,
    pub confirmed: bool,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Activity {
    Refreshing,
    Entering,
    Claiming,
    Connecting,
}

#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub enum Phase {
    #[default]
    Idle,
    Loading(Activity),
    Succeeded {
        activity: Activity,
        message: String,
    },
    Failed {
        activity: Activity,
        error: ClientError,
    },
}

impl Phase {
    pub fn is_loading(&self) -> bool {
        matches!(self, Phase::Loading(_))
    }

    /// An entry or withdrawal is between submission and its refreshed state.
    pub fn in_transaction(&self) -> bool {
        matches!(
            self,
            Phase::Loading(Activity::Entering | Activity::Claiming)
        )
    }

    /// Refreshes never block user actions; transactions and a wallet unlock do.
    fn blocks_user_actions(&self) -> bool {
        self.in_transaction() || *self == Phase::Loading(Activity::Connecting)
    }

    /// Outcome of a user action; a background refresh puts it back afterwards.
    fn is_settled_notice(&self) -> bool {
        match self {
            Phase::Succeeded { activity, .. } | Phase::Failed { activity, .. } => {
                *activity != Activity::Refreshing
            }
            _ => false,
        }
    }
}

/// Everything the view needs to render one frame.
#[derive(Clone, Debug)]
pub struct ControllerView {
    pub account: Option<Address>,
    pub snapshot: Option<LotterySnapshot>,
    pub phase: Phase,
    pub pending_tx: Option<PendingTransaction>,
    pub min_entry: U256,
}

impl ControllerView {
    pub fn is_winner(&self) -> bool {
        match (&self.account, &self.snapshot) {
            (Some(account), Some(snapshot)) => snapshot
                .winner
                .as_ref()
                .is_some_and(|winner| winner.address == *account),
            _ => false,
        }
    }
}

struct ControllerState<W> {
    session: Option<W>,
    snapshot: Option<LotterySnapshot>,
    phase: Phase,
    /// Notice to restore once a background refresh succeeds.
    resume: Option<Phase>,
    pending_tx: Option<PendingTransaction>,
    /// Bumped by every user action; a refresh started under an older value
    /// drops its result.
    epoch: u64,
}

pub struct LotteryController<R, W> {
    read_only: R,
    min_entry: U256,
    state: Mutex<ControllerState<W>>,
}

impl<R, W> LotteryController<R, W>
where
    R: LotteryReads,
    W: LotteryWallet,
{
    pub fn new(read_only: R, min_entry: U256) -> Self {
        Self {
            read_only,
            min_entry,
            state: Mutex::new(ControllerState {
                session: None,
                snapshot: None,
                phase: Phase::Idle,
                resume: None,
                pending_tx: None,
                epoch: 0,
            }),
        }
    }

    fn state(&self) -> MutexGuard<'_, ControllerState<W>> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn min_entry(&self) -> U256 {
        self.min_entry
    }

    pub fn view(&self) -> ControllerView {
        let state = self.state();
        ControllerView {
            account: state.session.as_ref().map(|w| w.address()),
            snapshot: state.snapshot.clone(),
            phase: state.phase.clone(),
            pending_tx: state.pending_tx.clone(),
            min_entry: self.min_entry,
        }
    }

    pub fn account(&self) -> Option<Address> {
        self.state().session.as_ref().map(|w| w.address())
    }

    pub fn is_winner(&self) -> bool {
        self.view().is_winner()
    }

    /// Mark the start of `activity`. A refresh waits for anything loading;
    /// user actions only wait for a transaction or wallet unlock and take over
    /// from a running refresh.
    fn begin(&self, activity: Activity) -> Result<(Option<W>, u64), ClientError> {
        let mut state = self.state();
        let busy = match activity {
            Activity::Refreshing => state.phase.is_loading(),
            _ => state.phase.blocks_user_actions(),
        };
        if busy {
            debug!(?activity, phase = ?state.phase, "rejected while busy");
            return Err(ClientError::Busy);
        }
        if activity == Activity::Refreshing {
            let notice = state.phase.is_settled_notice().then(|| state.phase.clone());
            state.resume = notice;
        } else {
            state.epoch += 1;
            state.resume = None;
        }
        state.phase = Phase::Loading(activity);
        Ok((state.session.clone(), state.epoch))
    }

    fn fail(&self, activity: Activity, error: ClientError) -> ClientError {
        warn!(?activity, %error, "lottery action failed");
        let mut state = self.state();
        state.pending_tx = None;
        state.resume = None;
        state.phase = Phase::Failed {
            activity,
            error: error.clone(),
        };
        error
    }

    fn succeed(&self, activity: Activity, message: impl Into<String>) {
        let message = message.into();
        info!(?activity, %message, "lottery action succeeded");
        let mut state = self.state();
        state.pending_tx = None;
        state.resume = None;
        state.phase = Phase::Succeeded { activity, message };
    }

    /// Show the wallet unlock as in progress; finished by [`Self::connect`] or
    /// [`Self::connect_failed`].
    pub fn begin_connect(&self) -> Result<(), ClientError> {
        self.begin(Activity::Connecting).map(|_| ())
    }

    pub fn connect_failed(&self, reason: impl Into<String>) -> ClientError {
        self.fail(Activity::Connecting, ClientError::Wallet(reason.into()))
    }

    /// Attach a wallet session. Takes effect for the next read.
    pub fn connect(&self, wallet: W) -> Result<Address, ClientError> {
        let mut state = self.state();
        if state.phase.in_transaction() {
            return Err(ClientError::Busy);
        }
        let address = wallet.address();
        info!(%address, "wallet connected");
        state.epoch += 1;
        state.resume = None;
        state.session = Some(wallet);
        state.phase = Phase::Succeeded {
            activity: Activity::Connecting,
            message: format!("Connected {address}"),
        };
        Ok(address)
    }

    pub fn disconnect(&self) -> Result<(), ClientError> {
        let mut state = self.state();
        if state.phase.blocks_user_actions() {
            return Err(ClientError::Busy);
        }
        if let Some(wallet) = state.session.take() {
            info!(address = %wallet.address(), "wallet disconnected");
        }
        state.epoch += 1;
        state.resume = None;
        state.phase = Phase::Idle;
        Ok(())
    }

    /// Re-read the full lottery state and replace the snapshot.
    ///
    /// Returns [`ClientError::Busy`] without committing anything when a user
    /// action started while the reads were running.
    pub async fn fetch_state(&self) -> Result<LotterySnapshot, ClientError> {
        let (session, epoch) = self.begin(Activity::Refreshing)?;
        let result = self.read_snapshot(session.as_ref()).await;
        let mut state = self.state();
        if state.epoch != epoch {
            debug!("refresh superseded by a user action; result dropped");
            return Err(ClientError::Busy);
        }
        match result {
            Ok(snapshot) => {
                state.snapshot = Some(snapshot.clone());
                state.phase = state.resume.take().unwrap_or(Phase::Idle);
                Ok(snapshot)
            }
            Err(err) => {
                let error = ClientError::Read(err);
                warn!(%error, "refresh failed");
                state.resume = None;
                state.phase = Phase::Failed {
                    activity: Activity::Refreshing,
                    error: error.clone(),
                };
                Err(error)
            }
        }
    }

    /// Enter the lottery with `amount` ETH (decimal string as typed).
    pub async fn enter(&self, amount: &str) -> Result<TxHash, ClientError> {
        let (session, _) = self.begin(Activity::Entering)?;
        let Some(wallet) = session else {
            return Err(self.fail(Activity::Entering, ClientError::NotConnected));
        };
        let value = match self.validate_amount(amount) {
            Ok(value) => value,
            Err(err) => return Err(self.fail(Activity::Entering, err)),
        };

        let balance = match wallet.balance().await {
            Ok(balance) => balance,
            Err(err) => {
                return Err(self.fail(Activity::Entering, ClientError::Read(err)));
            }
        };
        if balance < value {
            let err = ClientError::InsufficientBalance {
                balance: format_eth(balance),
                required: format_eth(value),
            };
            return Err(self.fail(Activity::Entering, err));
        }

        let hash = match wallet.submit_entry(value).await {
            Ok(hash) => hash,
            Err(err) => {
                return Err(self.fail(Activity::Entering, ClientError::Transaction(err)));
            }
        };
        info!(%hash, value = %format_eth(value), "entry submitted");
        self.confirm_and_refresh(&wallet, Activity::Entering, hash, "Transaction successful!")
            .await
    }

    /// Withdraw the winner's reward.
    pub async fn claim(&self) -> Result<TxHash, ClientError> {
        let (session, _) = self.begin(Activity::Claiming)?;
        let Some(wallet) = session else {
            return Err(self.fail(Activity::Claiming, ClientError::NotConnected));
        };
        let hash = match wallet.submit_withdrawal().await {
            Ok(hash) => hash,
            Err(err) => {
                return Err(self.fail(Activity::Claiming, ClientError::Transaction(err)));
            }
        };
        info!(%hash, "withdrawal submitted");
        self.confirm_and_refresh(&wallet, Activity::Claiming, hash, "Prize claimed!")
            .await
    }

    async fn confirm_and_refresh(
        &self,
        wallet: &W,
        activity: Activity,
        hash: TxHash,
        success: &str,
    ) -> Result<TxHash, ClientError> {
        self.state().pending_tx = Some(PendingTransaction {
            hash,
            confirmed: false,
        });
        if let Err(err) = wallet.wait_for_confirmation(hash).await {
            return Err(self.fail(activity, ClientError::Transaction(err)));
        }
        if let Some(pending) = self.state().pending_tx.as_mut() {
            pending.confirmed = true;
        }
        info!(%hash, "transaction confirmed");

        match self.read_snapshot(Some(wallet)).await {
            Ok(snapshot) => {
                self.state().snapshot = Some(snapshot);
                self.succeed(activity, success);
            }
            Err(err) => {
                // the transaction itself went through
                self.fail(activity, ClientError::Read(err));
            }
        }
        Ok(hash)
    }

    fn validate_amount(&self, amount: &str) -> Result<U256, ClientError> {
        let trimmed = amount.trim();
        let invalid = || ClientError::InvalidAmount {
            input: trimmed.to_string(),
        };
        // plain decimal only; parse_ether would also take signs and underscores
        let well_formed = trimmed.chars().any(|c| c.is_ascii_digit())
            && trimmed.chars().all(|c| c.is_ascii_digit() || c == '.')
            && trimmed.matches('.').count() <= 1;
        if !well_formed {
            return Err(invalid());
        }
        let value = parse_ether(trimmed).map_err(|_| invalid())?;
        if value < self.min_entry {
            return Err(ClientError::BelowMinimum {
                amount: format_eth(value),
                minimum: format_eth(self.min_entry),
            });
        }
        Ok(value)
    }

    async fn read_snapshot(&self, wallet: Option<&W>) -> ChainResult<LotterySnapshot> {
        match wallet {
            Some(wallet) => read_snapshot(wallet).await,
            None => read_snapshot(&self.read_only).await,
        }
    }
}

async fn read_snapshot<C: LotteryReads>(contract: &C) -> ChainResult<LotterySnapshot> {
    let count = contract.players_length().await?;
    let mut participants = Vec::with_capacity(count.min(1024) as usize);
    for index in 0..count {
        participants.push(contract.player_by_index(index).await?);
    }
    let winner_address = contract.recent_winner().await?;
    let winner = if winner_address == Address::ZERO {
        None
    } else {
        let balance = contract.winner_balance(winner_address).await?;
        Some(WinnerRecord {
            address: winner_address,
            balance,
        })
    };
    let entrance_fee = contract.entrance_fee().await?;
    let status = contract.lottery_status().await?;
    debug!(players = participants.len(), ?winner, "read lottery snapshot");
    Ok(LotterySnapshot {
        participants,
        winner,
        entrance_fee,
        status,
    })
}
