mod common;

use common::{person, setup, Person};
use redmodel::{Cmd, Error, RespValue};

#[tokio::test]
async fn test_first_error_wins() {
    let fx = setup();
    let mut existing = person("Alice", 30);
    existing.id = "a1".to_string();
    let mut fresh = person("Bob", 40);

    let mut tx = fx.people.pool().transaction();
    tx.save_fields(&fx.people, &existing, &["Nope"]);
    tx.save(&fx.people, &mut fresh);
    assert!(tx.error().is_some());
    assert!(tx.is_empty());

    let err = tx.exec().await.unwrap_err();
    assert!(matches!(err, Error::UnknownField { .. }));
    assert_eq!(fx.store.key_count(), 0);
}

#[tokio::test]
async fn test_handlers_see_earlier_writes() {
    let fx = setup();
    let mut a = person("A", 1);
    let mut b = person("B", 2);
    let mut count = 0;
    let mut found = Person::default();

    a.id = "a".to_string();
    let mut tx = fx.people.pool().transaction();
    tx.save(&fx.people, &mut a);
    tx.save(&fx.people, &mut b);
    tx.count(&fx.people, &mut count);
    tx.find(&fx.people, "a", &mut found);
    tx.exec().await.unwrap();

    assert_eq!(count, 2);
    assert_eq!(found, a);
}

#[tokio::test]
async fn test_missing_find_fails_the_batch() {
    let fx = setup();
    let mut out = Person::default();
    let mut exists = true;

    let mut tx = fx.people.pool().transaction();
    tx.exists(&fx.people, "ghost", &mut exists);
    tx.find(&fx.people, "ghost", &mut out);
    let err = tx.exec().await.unwrap_err();

    assert!(err.is_not_found());
    assert!(!exists);
}

#[tokio::test]
async fn test_empty_transaction_is_ok() {
    let fx = setup();
    fx.people.pool().transaction().exec().await.unwrap();
}

#[tokio::test]
async fn test_raw_commands_and_handlers() {
    let fx = setup();
    let mut seen = Vec::new();

    let mut tx = fx.people.pool().transaction();
    tx.command(Cmd::new("SADD").arg("s").arg("x").arg("y"), None);
    tx.command(
        Cmd::new("SCARD").arg("s"),
        Some(Box::new(|reply: RespValue| {
            seen.push(reply.into_integer()?);
            Ok(())
        })),
    );
    assert_eq!(tx.len(), 2);
    tx.exec().await.unwrap();

    assert_eq!(seen, vec![2]);
}

#[tokio::test]
async fn test_store_error_is_reported() {
    let fx = setup();
    fx.store
        .execute(&Cmd::new("HSET").arg("Person:all").arg("f").arg("v"));

    let err = fx.people.count().await.unwrap_err();
    match err {
        Error::Store(msg) => assert!(msg.starts_with("WRONGTYPE")),
        other => panic!("unexpected error: {}", other),
    }
}

#[tokio::test]
async fn test_pool_reuses_connections() {
    let fx = setup();
    fx.people.count().await.unwrap();
    fx.people.count().await.unwrap();
    assert_eq!(fx.people.pool().idle_count(), 1);
}
