use alloy::{
    primitives::{
        Address,
        address,
    },
    sol,
};

/// Lottery deployment the client was built against.
pub const SEPOLIA_LOTTERY_ADDRESS: Address =
    address!("8c9207baa0eb7ba6f969c6da3dd1ec672e22b8b5");

sol! {
    /// External interface of the deployed lottery. Only the methods the client
    /// calls are listed; the rest of the contract's ABI is irrelevant here.
    #[sol(rpc)]
    contract Lottery {
        error Lottery__InvalidEntranceFee();
        error Lottery__NotEnoughBalance();
        error Lottery__NotEnoughPlayers();
        error Lottery__NotOpen();
        error Lottery__TransferFailed();
        error Lottery__UpkeepNotNeeded();

        event LotteryEntered(address player);
        event WinnerPicked(address winner, uint256 balance);
        event LotteryClaimed(address winner, uint256 balance);

        function enterLottery() external payable;
        function windrawReward() external;

        function getEntranceFee() external view returns (uint256);
        // `enum LotteryState { OPEN, CALCULATING }` on chain, ABI-encoded as uint8
        function getLotteryState() external view returns (uint8);
        function getPlayersLength() external view returns (uint256);
        function getPlayerByIndex(uint256 index) external view returns (address);
        function getRecentWinner() external view returns (address);
        function getWinnerBalance(address winner) external view returns (uint256);
    }
}

/// Human readable reason for one of the lottery's custom errors.
pub fn revert_reason(error: &Lottery::LotteryErrors) -> &'static str {
    use Lottery::LotteryErrors::*;
    match error {
        Lottery__InvalidEntranceFee(_) => "entrance fee too low",
        Lottery__NotEnoughBalance(_) => "no reward to withdraw",
        Lottery__NotEnoughPlayers(_) => "not enough players",
        Lottery__NotOpen(_) => "lottery is not open",
        Lottery__TransferFailed(_) => "prize transfer failed",
        Lottery__UpkeepNotNeeded(_) => "upkeep not needed",
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum LotteryStatus {
    Open,
    Calculating,
    Unknown(u8),
}

impl From<u8> for LotteryStatus {
    fn from(raw: u8) -> Self {
        match raw {
            0 => LotteryStatus::Open,
            1 => LotteryStatus::Calculating,
            other => LotteryStatus::Unknown(other),
        }
    }
}

impl std::fmt::Display for LotteryStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LotteryStatus::Open => write!(f, "Open"),
            LotteryStatus::Calculating => write!(f, "Drawing winner"),
            LotteryStatus::Unknown(raw) => write!(f, "Unknown ({raw})"),
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]
    use super::*;
    use alloy::sol_types::SolInterface;

    #[test]
    fn lottery_status__from_raw__maps_known_and_unknown_values() {
        assert_eq!(LotteryStatus::Open, LotteryStatus::from(0));
        assert_eq!(LotteryStatus::Calculating, LotteryStatus::from(1));
        assert_eq!(LotteryStatus::Unknown(7), LotteryStatus::from(7));
    }

    #[test]
    fn revert_reason__decoded_custom_error__is_readable() {
        // given
        let encoded = Lottery::LotteryErrors::Lottery__NotOpen(Lottery::Lottery__NotOpen {})
            .abi_encode();

        // when
        let decoded = Lottery::LotteryErrors::abi_decode(&encoded).unwrap();

        // then
        assert_eq!("lottery is not open", revert_reason(&decoded));
    }
}
