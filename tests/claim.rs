use alloy::primitives::{
    Address,
    U256,
    utils::parse_ether,
};
use lottery_client::{
    controller::{
        Activity,
        ClientError,
        ErrorKind,
        Phase,
        WinnerRecord,
    },
    test_helpers::TestContext,
};

#[tokio::test]
async fn claim__winner__zeroes_reward_and_pays_out() {
    let ctx = TestContext::new();
    let controller = ctx.controller();
    // given
    let prize = parse_ether("0.5").unwrap();
    ctx.chain().pick_winner(ctx.alice(), prize);
    ctx.connect_alice();
    controller.fetch_state().await.unwrap();
    assert!(controller.is_winner());

    // when
    controller.claim().await.unwrap();

    // then
    let snapshot = controller.fetch_state().await.unwrap();
    let expected = Some(WinnerRecord {
        address: ctx.alice(),
        balance: U256::ZERO,
    });
    assert_eq!(expected, snapshot.winner);
    assert_eq!(parse_ether("1.5").unwrap(), ctx.chain().balance_of(ctx.alice()));
}

#[tokio::test]
async fn claim__success__reports_prize_claimed() {
    let ctx = TestContext::new();
    let controller = ctx.controller();
    // given
    ctx.chain().pick_winner(ctx.alice(), parse_ether("0.1").unwrap());
    ctx.connect_alice();

    // when
    controller.claim().await.unwrap();

    // then
    assert_eq!(
        Phase::Succeeded {
            activity: Activity::Claiming,
            message: "Prize claimed!".to_string(),
        },
        controller.view().phase
    );
}

#[tokio::test]
async fn claim__nothing_to_withdraw__is_a_transaction_error() {
    let ctx = TestContext::new();
    let controller = ctx.controller();
    // given
    ctx.chain().pick_winner(ctx.alice(), parse_ether("0.1").unwrap());
    ctx.connect_alice();
    controller.claim().await.unwrap();

    // when
    let err = controller.claim().await.unwrap_err();

    // then
    assert_eq!(ErrorKind::Transaction, err.kind());
    assert_eq!("Transaction failed: no reward to withdraw", err.to_string());
}

#[tokio::test]
async fn claim__without_wallet__asks_to_connect() {
    let ctx = TestContext::new();
    let controller = ctx.controller();

    let err = controller.claim().await.unwrap_err();

    assert_eq!(ClientError::NotConnected, err);
    assert_eq!(0, ctx.chain().submissions());
}

#[tokio::test]
async fn is_winner__only_for_connected_recent_winner() {
    let ctx = TestContext::new();
    let controller = ctx.controller();
    // given
    let bob = Address::repeat_byte(0xb0);
    ctx.chain().pick_winner(bob, parse_ether("0.3").unwrap());

    // when
    controller.fetch_state().await.unwrap();

    // then
    assert!(!controller.is_winner(), "no wallet connected");
    ctx.connect_alice();
    assert!(!controller.is_winner(), "alice did not win");
    controller.disconnect().unwrap();
    controller
        .connect(ctx.chain().wallet(bob, U256::ZERO))
        .unwrap();
    assert!(controller.is_winner());
}
