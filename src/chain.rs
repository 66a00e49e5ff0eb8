//! JSON-RPC implementation of the controller's chain seam.

use crate::{
    contract::{
        Lottery,
        LotteryStatus,
        revert_reason,
    },
    controller::{
        ChainError,
        ChainResult,
        LotteryReads,
        LotteryWallet,
    },
};
use alloy::{
    contract::Error as ContractError,
    network::EthereumWallet,
    primitives::{
        Address,
        Bytes,
        TxHash,
        U256,
    },
    providers::{
        DynProvider,
        Provider,
        ProviderBuilder,
    },
    signers::local::PrivateKeySigner,
    transports::TransportError,
};
use std::time::Duration;
use tracing::{
    debug,
    trace,
};
use url::Url;

pub const DEFAULT_CONFIRMATION_POLL: Duration = Duration::from_millis(2_000);

type LotteryInstance = Lottery::LotteryInstance<DynProvider>;

fn contract_error(err: ContractError) -> ChainError {
    if let Some(decoded) = err.as_decoded_interface_error::<Lottery::LotteryErrors>() {
        return ChainError::new(revert_reason(&decoded));
    }
    ChainError::new(err.to_string())
}

fn rpc_error(err: TransportError) -> ChainError {
    ChainError::new(err.to_string())
}

async fn players_length(contract: &LotteryInstance) -> ChainResult<u64> {
    let len = contract
        .getPlayersLength()
        .call()
        .await
        .map_err(contract_error)?;
    Ok(len.saturating_to::<u64>())
}

async fn player_by_index(contract: &LotteryInstance, index: u64) -> ChainResult<Address> {
    contract
        .getPlayerByIndex(U256::from(index))
        .call()
        .await
        .map_err(contract_error)
}

async fn recent_winner(contract: &LotteryInstance) -> ChainResult<Address> {
    contract
        .getRecentWinner()
        .call()
        .await
        .map_err(contract_error)
}

async fn winner_balance(contract: &LotteryInstance, winner: Address) -> ChainResult<U256> {
    contract
        .getWinnerBalance(winner)
        .call()
        .await
        .map_err(contract_error)
}

async fn entrance_fee(contract: &LotteryInstance) -> ChainResult<U256> {
    contract
        .getEntranceFee()
        .call()
        .await
        .map_err(contract_error)
}

async fn lottery_status(contract: &LotteryInstance) -> ChainResult<LotteryStatus> {
    let raw = contract
        .getLotteryState()
        .call()
        .await
        .map_err(contract_error)?;
    Ok(LotteryStatus::from(raw))
}

/// Reads through a plain HTTP endpoint; used while no wallet is connected.
#[derive(Clone)]
pub struct RpcReader {
    provider: DynProvider,
    contract: LotteryInstance,
}

impl RpcReader {
    pub fn connect(rpc_url: Url, lottery: Address) -> Self {
        debug!(%rpc_url, %lottery, "building read-only provider");
        let provider = ProviderBuilder::new().connect_http(rpc_url).erased();
        let contract = Lottery::new(lottery, provider.clone());
        Self { provider, contract }
    }

    pub fn lottery_address(&self) -> Address {
        *self.contract.address()
    }

    /// Deployed bytecode at the lottery address.
    pub async fn deployed_code(&self) -> ChainResult<Bytes> {
        self.provider
            .get_code_at(self.lottery_address())
            .await
            .map_err(rpc_error)
    }
}

impl LotteryReads for RpcReader {
    async fn players_length(&self) -> ChainResult<u64> {
        players_length(&self.contract).await
    }

    async fn player_by_index(&self, index: u64) -> ChainResult<Address> {
        player_by_index(&self.contract, index).await
    }

    async fn recent_winner(&self) -> ChainResult<Address> {
        recent_winner(&self.contract).await
    }

    async fn winner_balance(&self, winner: Address) -> ChainResult<U256> {
        winner_balance(&self.contract, winner).await
    }

    async fn entrance_fee(&self) -> ChainResult<U256> {
        entrance_fee(&self.contract).await
    }

    async fn lottery_status(&self) -> ChainResult<LotteryStatus> {
        lottery_status(&self.contract).await
    }
}

/// Signing connection for an unlocked keystore.
#[derive(Clone)]
pub struct RpcWallet {
    address: Address,
    provider: DynProvider,
    contract: LotteryInstance,
    confirmation_poll: Duration,
}

impl RpcWallet {
    pub fn connect(
        rpc_url: Url,
        lottery: Address,
        signer: PrivateKeySigner,
        confirmation_poll: Duration,
    ) -> Self {
        let address = signer.address();
        debug!(%rpc_url, %address, "building signing provider");
        let provider = ProviderBuilder::new()
            .wallet(EthereumWallet::from(signer))
            .connect_http(rpc_url)
            .erased();
        let contract = Lottery::new(lottery, provider.clone());
        Self {
            address,
            provider,
            contract,
            confirmation_poll,
        }
    }
}

impl LotteryReads for RpcWallet {
    async fn players_length(&self) -> ChainResult<u64> {
        players_length(&self.contract).await
    }

    async fn player_by_index(&self, index: u64) -> ChainResult<Address> {
        player_by_index(&self.contract, index).await
    }

    async fn recent_winner(&self) -> ChainResult<Address> {
        recent_winner(&self.contract).await
    }

    async fn winner_balance(&self, winner: Address) -> ChainResult<U256> {
        winner_balance(&self.contract, winner).await
    }

    async fn entrance_fee(&self) -> ChainResult<U256> {
        entrance_fee(&self.contract).await
    }

    async fn lottery_status(&self) -> ChainResult<LotteryStatus> {
        lottery_status(&self.contract).await
    }
}

impl LotteryWallet for RpcWallet {
    fn address(&self) -> Address {
        self.address
    }

    async fn balance(&self) -> ChainResult<U256> {
        self.provider
            .get_balance(self.address)
            .await
            .map_err(rpc_error)
    }

    async fn submit_entry(&self, value: U256) -> ChainResult<TxHash> {
        let pending = self
            .contract
            .enterLottery()
            .value(value)
            .send()
            .await
            .map_err(contract_error)?;
        Ok(*pending.tx_hash())
    }

    async fn submit_withdrawal(&self) -> ChainResult<TxHash> {
        let pending = self
            .contract
            .windrawReward()
            .send()
            .await
            .map_err(contract_error)?;
        Ok(*pending.tx_hash())
    }

    async fn wait_for_confirmation(&self, hash: TxHash) -> ChainResult<()> {
        loop {
            let receipt = self
                .provider
                .get_transaction_receipt(hash)
                .await
                .map_err(rpc_error)?;
            match receipt {
                Some(receipt) if receipt.status() => return Ok(()),
                Some(_) => return Err(ChainError::new("transaction reverted")),
                None => {
                    trace!(%hash, "receipt not available yet");
                    tokio::time::sleep(self.confirmation_poll).await;
                }
            }
        }
    }
}
