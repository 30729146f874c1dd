mod common;

use common::{person, save_all, setup, Person};
use redmodel::{Direction, Error, FilterOp};

fn names(people: &[Person]) -> Vec<&str> {
    people.iter().map(|p| p.name.as_str()).collect()
}

fn ages(people: &[Person]) -> Vec<i64> {
    people.iter().map(|p| p.age).collect()
}

#[tokio::test]
async fn test_order_by_string_is_byte_order() {
    let fx = setup();
    let mut records = vec![person("bob", 1), person("Zed", 2), person("Alice", 3)];
    save_all(&fx.people, &mut records).await;

    let asc = fx.people.query().order("Name", Direction::Ascending).run().await.unwrap();
    assert_eq!(names(&asc), vec!["Alice", "Zed", "bob"]);

    let desc = fx.people.query().order("Name", Direction::Descending).run().await.unwrap();
    assert_eq!(names(&desc), vec!["bob", "Zed", "Alice"]);
}

#[tokio::test]
async fn test_order_by_numeric_and_boolean() {
    let fx = setup();
    let mut records = vec![person("a", 30), person("b", -5), person("c", 12)];
    records[2].active = true;
    save_all(&fx.people, &mut records).await;

    let by_age = fx.people.query().order("Age", Direction::Descending).run().await.unwrap();
    assert_eq!(ages(&by_age), vec![30, 12, -5]);

    let by_active = fx
        .people
        .query()
        .order("Active", Direction::Descending)
        .limit(1)
        .run()
        .await
        .unwrap();
    assert_eq!(names(&by_active), vec!["c"]);
}

#[tokio::test]
async fn test_pagination_over_many_records() {
    let fx = setup();
    let mut records: Vec<Person> = (0..10_000).map(|i| person(&format!("p{}", i), i)).collect();
    save_all(&fx.people, &mut records).await;

    let first = fx.people.query().order("Age", Direction::Ascending).limit(10).run().await.unwrap();
    assert_eq!(ages(&first), (0..10i64).collect::<Vec<_>>());

    let all = fx.people.query().limit(0).run().await.unwrap();
    assert_eq!(all.len(), 10_000);

    let page = fx
        .people
        .query()
        .order("Age", Direction::Ascending)
        .offset(100)
        .limit(3)
        .run()
        .await
        .unwrap();
    assert_eq!(ages(&page), vec![100, 101, 102]);

    let tail = fx.people.query().offset(9_995).limit(10).run().await.unwrap();
    assert_eq!(tail.len(), 5);

    assert_eq!(fx.people.query().count().await.unwrap(), 10_000);
    assert_eq!(fx.people.query().offset(9_995).limit(10).count().await.unwrap(), 5);
    assert_eq!(fx.people.query().limit(10).count().await.unwrap(), 10);
}

#[tokio::test]
async fn test_projection() {
    let fx = setup();
    let mut p = person("Alice", 30);
    p.bio = "hi".to_string();
    fx.people.save(&mut p).await.unwrap();

    let excluded = fx.people.query().exclude(&["Name"]).run_one().await.unwrap();
    assert_eq!(excluded.id, p.id);
    assert_eq!(excluded.name, "");
    assert_eq!(excluded.age, 30);
    assert_eq!(excluded.bio, "hi");

    let included = fx.people.query().include(&["Age"]).run_one().await.unwrap();
    assert_eq!(included.age, 30);
    assert_eq!(included.bio, "");
}

#[tokio::test]
async fn test_numeric_filters() {
    let fx = setup();
    let mut records: Vec<Person> = (1..=5).map(|i| person(&format!("p{}", i), i * 10)).collect();
    save_all(&fx.people, &mut records).await;

    let cases = [
        (FilterOp::Equal, vec![30]),
        (FilterOp::NotEqual, vec![10, 20, 40, 50]),
        (FilterOp::Greater, vec![40, 50]),
        (FilterOp::GreaterOrEqual, vec![30, 40, 50]),
        (FilterOp::Less, vec![10, 20]),
        (FilterOp::LessOrEqual, vec![10, 20, 30]),
    ];
    for (op, expected) in cases {
        let found = fx.people.query().filter("Age", op, 30).run().await.unwrap();
        assert_eq!(ages(&found), expected, "Age {} 30", op);
        let count = fx.people.query().filter("Age", op, 30).count().await.unwrap();
        assert_eq!(count, expected.len());
    }

    let top = fx
        .people
        .query()
        .filter("Age", FilterOp::Greater, 15)
        .order("Age", Direction::Descending)
        .limit(2)
        .run()
        .await
        .unwrap();
    assert_eq!(ages(&top), vec![50, 40]);
}

#[tokio::test]
async fn test_string_filters() {
    let fx = setup();
    let mut records = vec![
        person("alice", 1),
        person("bob", 2),
        person("bobby", 3),
        person("carol", 4),
    ];
    save_all(&fx.people, &mut records).await;

    let cases = [
        (FilterOp::Equal, vec!["bob"]),
        (FilterOp::NotEqual, vec!["alice", "bobby", "carol"]),
        (FilterOp::Greater, vec!["bobby", "carol"]),
        (FilterOp::GreaterOrEqual, vec!["bob", "bobby", "carol"]),
        (FilterOp::Less, vec!["alice"]),
        (FilterOp::LessOrEqual, vec!["alice", "bob"]),
    ];
    for (op, expected) in cases {
        let found = fx.people.query().filter("Name", op, "bob").run().await.unwrap();
        assert_eq!(names(&found), expected, "Name {} bob", op);
    }
}

#[tokio::test]
async fn test_filter_with_order_on_other_field() {
    let fx = setup();
    let mut records = vec![person("d", 4), person("a", 1), person("c", 3), person("b", 2)];
    records[0].active = true;
    records[2].active = true;
    records[3].active = true;
    save_all(&fx.people, &mut records).await;

    let active_by_age = fx
        .people
        .query()
        .filter("Active", FilterOp::Equal, true)
        .order("Age", Direction::Descending)
        .run()
        .await
        .unwrap();
    assert_eq!(names(&active_by_age), vec!["d", "c", "b"]);

    let young_by_name = fx
        .people
        .query()
        .filter("Age", FilterOp::LessOrEqual, 3)
        .order("Name", Direction::Ascending)
        .offset(1)
        .run()
        .await
        .unwrap();
    assert_eq!(names(&young_by_name), vec!["b", "c"]);

    assert!(fx.store.keys().iter().all(|k| !k.starts_with("tmp:")));
}

#[tokio::test]
async fn test_ids_and_run_one() {
    let fx = setup();
    let mut records = vec![person("a", 2), person("b", 1)];
    save_all(&fx.people, &mut records).await;

    let ids = fx.people.query().order("Age", Direction::Ascending).ids().await.unwrap();
    assert_eq!(ids, vec![records[1].id.clone(), records[0].id.clone()]);

    let none = fx
        .people
        .query()
        .filter("Age", FilterOp::Greater, 100)
        .run_one()
        .await;
    assert!(matches!(&none, Err(e) if e.is_not_found()));
}

#[tokio::test]
async fn test_query_inside_transaction() {
    let fx = setup();
    let mut p = person("Alice", 30);
    let mut found = Vec::new();
    let mut n = 0;

    let query = fx.people.query().filter("Name", FilterOp::Equal, "Alice");
    let mut tx = fx.people.pool().transaction();
    tx.save(&fx.people, &mut p);
    tx.query(&query, &mut found);
    tx.query_count(&query, &mut n);
    tx.exec().await.unwrap();

    assert_eq!(n, 1);
    assert_eq!(names(&found), vec!["Alice"]);
}

#[tokio::test]
async fn test_invalid_queries() {
    let fx = setup();
    let q = fx.people.query();

    assert!(matches!(
        q.clone().order("Bio", Direction::Ascending).run().await,
        Err(Error::FieldNotIndexed { .. })
    ));
    assert!(matches!(
        q.clone().filter("Missing", FilterOp::Equal, 1).run().await,
        Err(Error::UnknownField { .. })
    ));
    assert!(matches!(
        q.clone().include(&["Name"]).exclude(&["Age"]).run().await,
        Err(Error::Query(_))
    ));
    assert!(matches!(
        q.clone()
            .filter("Age", FilterOp::Equal, 1)
            .filter("Age", FilterOp::Equal, 2)
            .run()
            .await,
        Err(Error::Query(_))
    ));
    assert!(matches!(
        q.clone().filter("Age", FilterOp::Equal, "one").count().await,
        Err(Error::Query(_))
    ));
    assert!(matches!(
        q.clone().include(&["Nope"]).ids().await,
        Err(Error::UnknownField { .. })
    ));
}
