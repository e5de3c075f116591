mod common;

use common::TestWorld;
use lockerbook::domain::payment::InstrumentKind;
use lockerbook::error::BookingError;

#[tokio::test]
async fn test_fingerprint_dedup_same_tenant() {
    let world = TestWorld::new();
    world.seed_tenant(1).await;

    let first = world.register(1, "tok_card_visa4242").await.unwrap();
    let second = world.register(1, "tok_card_visa4242").await.unwrap();

    assert_eq!(first.id, second.id);
    assert_eq!(first, second);
    // Only one gateway-side registration happened.
    assert_eq!(world.gateway.instruments_attached().await, 1);
}

#[tokio::test]
async fn test_same_instrument_different_tenants() {
    let world = TestWorld::new();
    world.seed_tenant(1).await;
    world.seed_tenant(2).await;

    let a = world.register(1, "tok_card_visa4242").await.unwrap();
    let b = world.register(2, "tok_card_visa4242").await.unwrap();

    // The fingerprint matches but the dedup key is per tenant.
    assert_eq!(a.fingerprint, b.fingerprint);
    assert_ne!(a.id, b.id);
    assert_eq!(world.gateway.instruments_attached().await, 2);
}

#[tokio::test]
async fn test_instrument_kind_is_tagged() {
    let world = TestWorld::new();
    world.seed_tenant(1).await;

    let card = world.register(1, "tok_card_visa4242").await.unwrap();
    assert_eq!(card.kind, InstrumentKind::Card);
    assert_eq!(card.last4, "4242");

    let bank = world.register(1, "tok_bank_chk9001").await.unwrap();
    assert_eq!(bank.kind, InstrumentKind::BankAccount);
    assert_ne!(card.fingerprint, bank.fingerprint);
}

#[tokio::test]
async fn test_declined_instrument_persists_nothing() {
    let world = TestWorld::new();
    world.seed_tenant(1).await;
    world.gateway.decline_token("tok_card_badcard").await;

    let err = world.register(1, "tok_card_badcard").await.unwrap_err();
    assert!(matches!(err, BookingError::InstrumentRejected(_)));
    assert!(!err.is_retryable());
    assert_eq!(world.gateway.instruments_attached().await, 0);

    // A later register of a good instrument still gets a fresh record.
    let ok = world.register(1, "tok_card_visa4242").await.unwrap();
    assert_eq!(ok.last4, "4242");
}

#[tokio::test]
async fn test_unknown_tenant_is_not_found() {
    let world = TestWorld::new();
    let err = world.register(404, "tok_card_visa4242").await.unwrap_err();
    assert!(matches!(err, BookingError::NotFound(_)));
}

#[tokio::test]
async fn test_malformed_token_is_rejected_before_gateway_state() {
    let world = TestWorld::new();
    world.seed_tenant(1).await;

    let err = world.register(1, "not-a-token").await.unwrap_err();
    assert!(matches!(err, BookingError::Validation(_)));
    assert_eq!(world.gateway.instruments_attached().await, 0);
}
