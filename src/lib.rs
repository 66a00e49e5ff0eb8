pub mod chain;
pub mod contract;
pub mod controller;
pub mod deployment;
pub mod floaters;
pub mod format;
pub mod wallets;

pub mod test_helpers;

pub use chain::{
    RpcReader,
    RpcWallet,
};
pub use controller::LotteryController;

/// Controller wired to a live JSON-RPC endpoint.
pub type RpcController = LotteryController<RpcReader, RpcWallet>;
