use alloy::primitives::{
    Address,
    utils::parse_ether,
};
use lottery_client::{
    controller::{
        Activity,
        ClientError,
        ErrorKind,
        Phase,
    },
    test_helpers::TestContext,
};

#[tokio::test]
async fn enter__adds_caller_to_participants() {
    let ctx = TestContext::new();
    let controller = ctx.controller();
    // given
    ctx.chain().add_player(Address::repeat_byte(0x01));
    ctx.connect_alice();

    // when
    let hash = controller.enter("0.02").await.unwrap();

    // then
    let view = controller.view();
    let snapshot = view.snapshot.unwrap();
    assert_eq!(
        vec![Address::repeat_byte(0x01), ctx.alice()],
        snapshot.participants
    );
    assert_eq!(
        Phase::Succeeded {
            activity: Activity::Entering,
            message: "Transaction successful!".to_string(),
        },
        view.phase
    );
    let pending = view.pending_tx;
    assert!(pending.is_none(), "pending tx {hash} should be cleared");
    assert_eq!(parse_ether("0.98").unwrap(), ctx.chain().balance_of(ctx.alice()));
}

#[tokio::test]
async fn enter__below_minimum__makes_no_network_calls() {
    let ctx = TestContext::new();
    let controller = ctx.controller();
    // given
    ctx.connect_alice();
    let calls_before = ctx.chain().network_calls();

    // when
    let result = controller.enter("0.005").await;

    // then
    let err = result.unwrap_err();
    assert_eq!(ErrorKind::Validation, err.kind());
    assert_eq!(calls_before, ctx.chain().network_calls());
    assert!(matches!(view_error(&controller.view().phase), Some(ClientError::BelowMinimum { .. })));
}

#[tokio::test]
async fn enter__unparseable_amount__is_a_validation_error() {
    let ctx = TestContext::new();
    let controller = ctx.controller();
    ctx.connect_alice();

    for input in ["", "abc", "-1", "0.0.1"] {
        let err = controller.enter(input).await.unwrap_err();
        assert_eq!(ErrorKind::Validation, err.kind(), "input {input:?}");
    }
    assert_eq!(0, ctx.chain().network_calls());
}

#[tokio::test]
async fn enter__insufficient_balance__submits_nothing() {
    let ctx = TestContext::new();
    let controller = ctx.controller();
    // given
    ctx.connect_alice();

    // when
    let err = controller.enter("2").await.unwrap_err();

    // then
    assert!(matches!(err, ClientError::InsufficientBalance { .. }));
    assert_eq!(0, ctx.chain().submissions());
    assert!(ctx.chain().players().is_empty());
}

#[tokio::test]
async fn enter__without_wallet__asks_to_connect() {
    let ctx = TestContext::new();
    let controller = ctx.controller();

    let err = controller.enter("0.01").await.unwrap_err();

    assert_eq!(ClientError::NotConnected, err);
    assert_eq!("Please connect your wallet first", err.to_string());
    assert_eq!(0, ctx.chain().network_calls());
}

#[tokio::test]
async fn enter__while_previous_entry_pending__is_busy() {
    let ctx = TestContext::new();
    let controller = ctx.controller();
    // given
    ctx.connect_alice();
    ctx.chain().hold_confirmations();
    let first = tokio::spawn({
        let controller = controller.clone();
        async move { controller.enter("0.01").await }
    });
    while controller.view().pending_tx.is_none() {
        tokio::task::yield_now().await;
    }

    // when
    let second = controller.enter("0.01").await;

    // then
    assert_eq!(Err(ClientError::Busy), second);
    assert_eq!(1, ctx.chain().submissions());
    assert_eq!(Phase::Loading(Activity::Entering), controller.view().phase);

    ctx.chain().release_confirmation();
    first.await.unwrap().unwrap();
    assert_eq!(vec![ctx.alice()], ctx.chain().players());
}

#[tokio::test]
async fn enter__reverted__keeps_previous_snapshot() {
    let ctx = TestContext::new();
    let controller = ctx.controller();
    // given
    ctx.connect_alice();
    let before = controller.fetch_state().await.unwrap();
    ctx.chain().revert_next_transaction("lottery is not open");

    // when
    let err = controller.enter("0.01").await.unwrap_err();

    // then
    assert_eq!(ErrorKind::Transaction, err.kind());
    assert_eq!("Transaction failed: lottery is not open", err.to_string());
    let view = controller.view();
    assert_eq!(Some(before), view.snapshot);
    assert!(view.pending_tx.is_none());
}

#[tokio::test]
async fn enter__refresh_after_confirmation_fails__still_reports_hash() {
    let ctx = TestContext::new();
    let controller = ctx.controller();
    // given
    ctx.connect_alice();
    ctx.chain().hold_confirmations();
    let entry = tokio::spawn({
        let controller = controller.clone();
        async move { controller.enter("0.01").await }
    });
    while controller.view().pending_tx.is_none() {
        tokio::task::yield_now().await;
    }

    // when
    ctx.chain().fail_reads(Some("rpc unavailable"));
    ctx.chain().release_confirmation();
    let result = entry.await.unwrap();

    // then
    assert!(result.is_ok());
    assert_eq!(vec![ctx.alice()], ctx.chain().players());
    assert!(matches!(
        view_error(&controller.view().phase),
        Some(ClientError::Read(_))
    ));
}

fn view_error(phase: &Phase) -> Option<&ClientError> {
    match phase {
        Phase::Failed { error, .. } => Some(error),
        _ => None,
    }
}
