use orderdesk_core::db::open_db_in_memory;
use orderdesk_core::{
    IdGenerator, Order, OrderFilter, OrderRepository, OrderService, OrderStatus,
    SqliteOrderRepository, StoreError, TimeWindow, WriteOutcome,
};
use chrono::NaiveDate;
use serde_json::json;
use std::cell::Cell;

fn create(repo: &impl OrderRepository, order: Order) -> Order {
    match repo.create_or_update_order(order, false).unwrap() {
        WriteOutcome::Created(created) => created,
        other => panic!("expected Created, got {other:?}"),
    }
}

#[test]
fn create_without_id_assigns_five_char_alphanumeric_id() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteOrderRepository::new(&conn);

    let first = create(&repo, Order::new("active", "2024-01-01"));
    let second = create(&repo, Order::new("active", "2024-01-01"));

    let first_id = first.id().unwrap();
    assert_eq!(first_id.len(), 5);
    assert!(first_id.chars().all(|c| c.is_ascii_alphanumeric()));
    assert_eq!(first.status(), Some("active"));
    assert_ne!(first.id(), second.id());
}

#[test]
fn create_and_get_roundtrip_preserves_extension_fields() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteOrderRepository::new(&conn);

    let created = create(
        &repo,
        Order::new("completed", "2023-12-31")
            .with_field("customer", "acme")
            .with_field("lines", json!([{"sku": "A-1", "qty": 3}])),
    );

    let loaded = repo.get_order(created.id().unwrap()).unwrap().unwrap();
    assert_eq!(loaded, created);
    assert_eq!(loaded.extra["lines"][0]["qty"], json!(3));
}

#[test]
fn get_unknown_id_returns_none() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteOrderRepository::new(&conn);

    assert!(repo.get_order("nope1").unwrap().is_none());
}

#[test]
fn update_with_id_sets_supplied_fields_and_keeps_the_rest() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteOrderRepository::new(&conn);
    let created = create(
        &repo,
        Order::new("active", "2024-01-01").with_field("customer", "acme"),
    );

    let mut patch = Order::default().with_field("courier", "dhl");
    patch.id = created.id.clone();
    patch.status = Some(Some("completed".to_string()));
    let outcome = repo.create_or_update_order(patch, false).unwrap();

    assert_eq!(outcome.matched_count(), 1);
    let updated = outcome.into_order().unwrap();
    assert_eq!(updated.id, created.id);
    assert_eq!(updated.status(), Some("completed"));
    assert_eq!(updated.date(), Some("2024-01-01"));
    assert_eq!(updated.extra["customer"], json!("acme"));
    assert_eq!(updated.extra["courier"], json!("dhl"));

    let loaded = repo.get_order(created.id().unwrap()).unwrap().unwrap();
    assert_eq!(loaded, updated);
}

#[test]
fn update_with_explicit_nulls_clears_known_and_extension_fields() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteOrderRepository::new(&conn);
    let created = create(
        &repo,
        Order::new("active", "2024-01-01").with_field("note", "rush"),
    );
    let id = created.id().unwrap();

    let patch: Order =
        serde_json::from_value(json!({"id": id, "status": null, "note": null})).unwrap();
    let outcome = repo.create_or_update_order(patch, false).unwrap();
    assert_eq!(outcome.matched_count(), 1);

    let loaded = repo.get_order(id).unwrap().unwrap();
    assert_eq!(loaded.status, Some(None));
    assert_eq!(loaded.date(), Some("2024-01-01"));
    assert_eq!(loaded.extra["note"], serde_json::Value::Null);
    assert_eq!(
        serde_json::to_value(&loaded).unwrap(),
        json!({"id": id, "status": null, "date": "2024-01-01", "note": null})
    );

    let active = repo
        .query_orders(&OrderFilter::all().eq("status", "active"))
        .unwrap();
    assert!(active.is_empty());
}

#[test]
fn not_equal_filter_matches_orders_missing_the_field() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteOrderRepository::new(&conn);
    create(&repo, Order::new("active", "2024-01-01"));
    let done = create(&repo, Order::new("completed", "2024-01-01"));
    let bare = create(&repo, Order::default().with_field("note", "no status"));

    let filter = OrderFilter::from_json(&json!({"status": {"$ne": "active"}})).unwrap();
    let ids: Vec<_> = repo
        .query_orders(&filter)
        .unwrap()
        .into_iter()
        .map(|o| o.id)
        .collect();
    assert_eq!(ids, vec![done.id, bare.id]);
}

#[test]
fn update_unknown_id_without_upsert_changes_nothing() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteOrderRepository::new(&conn);
    create(&repo, Order::new("active", "2024-01-01"));

    let mut order = Order::new("active", "2024-01-02");
    order.id = Some("doesnotexist".to_string());
    let outcome = repo.create_or_update_order(order, false).unwrap();

    assert_eq!(outcome, WriteOutcome::NoMatch);
    assert_eq!(outcome.matched_count(), 0);
    assert!(repo.get_order("doesnotexist").unwrap().is_none());
    assert_eq!(repo.query_orders(&OrderFilter::all()).unwrap().len(), 1);
}

#[test]
fn update_unknown_id_with_upsert_inserts_with_that_exact_id() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteOrderRepository::new(&conn);

    let mut order = Order::new("active", "2024-01-02");
    order.id = Some("doesnotexist".to_string());
    let outcome = repo.create_or_update_order(order.clone(), true).unwrap();

    assert_eq!(outcome, WriteOutcome::Upserted(order.clone()));
    assert_eq!(repo.get_order("doesnotexist").unwrap(), Some(order));
}

#[test]
fn empty_id_is_treated_as_missing_and_replaced() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteOrderRepository::new(&conn);

    let mut order = Order::new("active", "2024-01-01");
    order.id = Some(String::new());
    let created = create(&repo, order);

    assert_eq!(created.id().map(str::len), Some(5));
}

#[test]
fn query_with_empty_filter_returns_all_and_status_filter_returns_subset() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteOrderRepository::new(&conn);
    let active_a = create(&repo, Order::new("active", "2024-01-01"));
    let done = create(&repo, Order::new("completed", "2024-01-01"));
    let active_b = create(&repo, Order::new("active", "2024-01-02"));

    let all = repo.query_orders(&OrderFilter::all()).unwrap();
    assert_eq!(all.len(), 3);

    let active = repo
        .query_orders(&OrderFilter::all().eq("status", "active"))
        .unwrap();
    let active_ids: Vec<_> = active.iter().map(|o| o.id.clone()).collect();
    assert_eq!(active_ids, vec![active_a.id, active_b.id]);
    assert!(!active.iter().any(|o| o.id == done.id));

    let none = repo
        .query_orders(&OrderFilter::all().eq("status", "cancelled"))
        .unwrap();
    assert!(none.is_empty());
}

#[test]
fn query_accepts_document_store_filter_json() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteOrderRepository::new(&conn);
    create(&repo, Order::new("active", "2023-06-01").with_field("total", 120));
    create(&repo, Order::new("active", "2024-06-01").with_field("total", 80));
    create(&repo, Order::new("completed", "2023-01-01").with_field("total", 300));

    let filter = OrderFilter::from_json(&json!({
        "$and": [{"status": "active"}],
        "date": {"$lt": "2024-01-01"}
    }))
    .unwrap();
    let matched = repo.query_orders(&filter).unwrap();
    assert_eq!(matched.len(), 1);
    assert_eq!(matched[0].date(), Some("2023-06-01"));

    let big = repo
        .query_orders(&OrderFilter::from_json(&json!({"total": {"$gte": 100}})).unwrap())
        .unwrap();
    assert_eq!(big.len(), 2);
}

#[test]
fn malformed_filter_surfaces_as_store_error() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteOrderRepository::new(&conn);

    let err = repo
        .query_orders(&OrderFilter::all().eq("bad field", "x"))
        .unwrap_err();
    assert!(matches!(err, StoreError::InvalidFilter(_)));
}

#[test]
fn delete_reports_one_then_zero_and_order_disappears() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteOrderRepository::new(&conn);
    let created = create(&repo, Order::new("active", "2024-01-01"));
    let id = created.id().unwrap();

    assert_eq!(repo.delete_order(id).unwrap(), 1);
    assert!(repo.get_order(id).unwrap().is_none());
    assert_eq!(repo.delete_order(id).unwrap(), 0);
    assert_eq!(repo.delete_order("ghost").unwrap(), 0);
}

struct FixedIds {
    next: Cell<u32>,
}

impl IdGenerator for FixedIds {
    fn generate(&self, _length: usize) -> String {
        let n = self.next.get();
        self.next.set(n + 1);
        format!("id{n:03}")
    }
}

#[test]
fn injected_generator_supplies_ids_and_collisions_surface_as_errors() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteOrderRepository::with_id_generator(&conn, FixedIds { next: Cell::new(0) });

    let created = create(&repo, Order::new("active", "2024-01-01"));
    assert_eq!(created.id(), Some("id000"));

    let mut clashing = Order::new("active", "2024-01-01");
    clashing.id = Some("id001".to_string());
    repo.create_or_update_order(clashing, true).unwrap();

    let err = repo
        .create_or_update_order(Order::new("active", "2024-01-02"), false)
        .unwrap_err();
    assert!(matches!(err, StoreError::Db(_)));
}

#[test]
fn service_filters_by_status_and_time_window() {
    let conn = open_db_in_memory().unwrap();
    let service = OrderService::new(SqliteOrderRepository::new(&conn));
    let today = NaiveDate::from_ymd_opt(2024, 5, 10).unwrap();

    for (status, date) in [
        ("active", "2024-05-10"),
        ("completed", "2024-05-09"),
        ("active", "2024-04-30"),
        ("active", "2024-05-11"),
    ] {
        service
            .create_or_update_order(Order::new(status, date), false)
            .unwrap();
    }

    assert_eq!(service.all_orders().unwrap().len(), 4);
    assert_eq!(
        service.orders_with_status(OrderStatus::Active).unwrap().len(),
        3
    );
    assert_eq!(
        service
            .orders_with_status(OrderStatus::Completed)
            .unwrap()
            .len(),
        1
    );

    let todays = service.orders_in_window(TimeWindow::Today, today).unwrap();
    assert_eq!(todays.len(), 1);
    assert_eq!(todays[0].date(), Some("2024-05-10"));

    let past = service.orders_in_window(TimeWindow::Past, today).unwrap();
    let mut past_dates: Vec<_> = past.iter().filter_map(Order::date).collect();
    past_dates.sort();
    assert_eq!(past_dates, vec!["2024-04-30", "2024-05-09"]);
}

#[test]
fn seeding_upserts_fixed_ids_and_is_repeatable() {
    let conn = open_db_in_memory().unwrap();
    let service = OrderService::new(SqliteOrderRepository::new(&conn));
    let mut fixed = Order::new("active", "2024-01-01");
    fixed.id = Some("seed1".to_string());
    let demo = vec![fixed.clone(), Order::new("completed", "2023-12-01")];

    let first = service.seed_orders(demo.clone()).unwrap();
    assert_eq!(first.upserted, 1);
    assert_eq!(first.created, 1);

    let second = service.seed_orders(vec![fixed]).unwrap();
    assert_eq!(second.updated, 1);
    assert_eq!(second.total(), 1);
    assert_eq!(service.all_orders().unwrap().len(), 2);
}

#[test]
fn ordinary_update_never_upserts() {
    let conn = open_db_in_memory().unwrap();
    let service = OrderService::new(SqliteOrderRepository::new(&conn));

    let mut order = Order::new("active", "2024-01-01");
    order.id = Some("zzzzz".to_string());
    assert_eq!(service.update_order(order).unwrap(), WriteOutcome::NoMatch);
    assert!(service.get_order("zzzzz").unwrap().is_none());
}
