use alloy::primitives::{
    Address,
    utils::parse_ether,
};
use lottery_client::{
    contract::LotteryStatus,
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
async fn fetch_state__empty_lottery__has_no_participants_or_winner() {
    let ctx = TestContext::new();
    let controller = ctx.controller();

    let snapshot = controller.fetch_state().await.unwrap();

    assert!(snapshot.participants.is_empty());
    assert_eq!(None, snapshot.winner);
    assert_eq!(parse_ether("0.01").unwrap(), snapshot.entrance_fee);
    assert_eq!(LotteryStatus::Open, snapshot.status);
    assert_eq!(Phase::Idle, controller.view().phase);
}

#[tokio::test]
async fn fetch_state__reads_without_wallet() {
    let ctx = TestContext::new();
    let controller = ctx.controller();
    // given
    let players = [Address::repeat_byte(1), Address::repeat_byte(2)];
    for player in players {
        ctx.chain().add_player(player);
    }
    ctx.chain().set_status(LotteryStatus::Calculating);

    // when
    let snapshot = controller.fetch_state().await.unwrap();

    // then
    assert_eq!(players.to_vec(), snapshot.participants);
    assert_eq!(LotteryStatus::Calculating, snapshot.status);
    assert_eq!(None, controller.account());
}

#[tokio::test]
async fn fetch_state__winner_picked__reports_unclaimed_balance() {
    let ctx = TestContext::new();
    let controller = ctx.controller();
    // given
    let winner = Address::repeat_byte(7);
    ctx.chain().add_player(winner);
    ctx.chain().pick_winner(winner, parse_ether("0.25").unwrap());

    // when
    let snapshot = controller.fetch_state().await.unwrap();

    // then
    let expected = Some(WinnerRecord {
        address: winner,
        balance: parse_ether("0.25").unwrap(),
    });
    assert_eq!(expected, snapshot.winner);
    assert!(snapshot.participants.is_empty());
}

#[tokio::test]
async fn fetch_state__read_failure__keeps_previous_snapshot() {
    let ctx = TestContext::new();
    let controller = ctx.controller();
    // given
    ctx.chain().add_player(Address::repeat_byte(3));
    let before = controller.fetch_state().await.unwrap();
    ctx.chain().add_player(Address::repeat_byte(4));
    ctx.chain().fail_reads(Some("connection refused"));

    // when
    let err = controller.fetch_state().await.unwrap_err();

    // then
    assert_eq!(ErrorKind::Network, err.kind());
    assert_eq!(
        "Failed to fetch contract data: connection refused",
        err.to_string()
    );
    let view = controller.view();
    assert_eq!(Some(before), view.snapshot);
    assert!(matches!(
        view.phase,
        Phase::Failed {
            activity: Activity::Refreshing,
            error: ClientError::Read(_),
        }
    ));
}

#[tokio::test]
async fn fetch_state__recovers_after_failure() {
    let ctx = TestContext::new();
    let controller = ctx.controller();
    // given
    ctx.chain().fail_reads(Some("timeout"));
    controller.fetch_state().await.unwrap_err();
    ctx.chain().fail_reads(None);
    ctx.chain().add_player(Address::repeat_byte(5));

    // when
    let snapshot = controller.fetch_state().await.unwrap();

    // then
    assert_eq!(vec![Address::repeat_byte(5)], snapshot.participants);
    let view = controller.view();
    assert_eq!(Some(snapshot), view.snapshot);
    assert_eq!(Phase::Idle, view.phase);
}

#[tokio::test]
async fn fetch_state__fails_mid_participants__keeps_previous_snapshot() {
    let ctx = TestContext::new();
    let controller = ctx.controller();
    // given
    ctx.chain().add_player(Address::repeat_byte(1));
    ctx.chain().add_player(Address::repeat_byte(2));
    let before = controller.fetch_state().await.unwrap();
    ctx.chain().add_player(Address::repeat_byte(3));
    // length and the first player succeed, the second player read fails
    ctx.chain().fail_reads_after(2, "connection reset");

    // when
    let err = controller.fetch_state().await.unwrap_err();

    // then
    assert_eq!(
        "Failed to fetch contract data: connection reset",
        err.to_string()
    );
    assert_eq!(Some(before), controller.view().snapshot);
}

#[tokio::test]
async fn fetch_state__superseded_by_entry__drops_its_result() {
    let ctx = TestContext::new();
    let controller = ctx.controller();
    // given
    ctx.connect_alice();
    ctx.chain().pause_reads();
    let refresh = tokio::spawn({
        let controller = controller.clone();
        async move { controller.fetch_state().await }
    });
    while controller.view().phase != Phase::Loading(Activity::Refreshing) {
        tokio::task::yield_now().await;
    }

    // when
    let entry = tokio::spawn({
        let controller = controller.clone();
        async move { controller.enter("0.02").await }
    });
    while controller.view().phase != Phase::Loading(Activity::Entering) {
        tokio::task::yield_now().await;
    }
    ctx.chain().resume_reads();

    // then
    assert_eq!(Err(ClientError::Busy), refresh.await.unwrap());
    entry.await.unwrap().unwrap();
    let view = controller.view();
    assert_eq!(
        Phase::Succeeded {
            activity: Activity::Entering,
            message: "Transaction successful!".to_string(),
        },
        view.phase
    );
    assert_eq!(vec![ctx.alice()], view.snapshot.unwrap().participants);
}
