use std::sync::Arc;

use sql_drivers::config::keys;
use sql_drivers::test_utils::{MockDriver, MockStatement};
use sql_drivers::{Connection, ConnectionConfig, Driver, Statement};

fn open_with_cache(size: &str) -> (Connection, Arc<sql_drivers::test_utils::EventLog>) {
    let mock = MockDriver::new();
    let log = mock.log();
    let driver: Arc<dyn Driver> = Arc::new(mock);
    let config = ConnectionConfig::new("mock").with(keys::STMT_CACHE_SIZE, size);
    let conn = Connection::open(driver, &config).unwrap();
    (conn, log)
}

#[test]
fn capacity_two_evicts_first_of_three() {
    let (mut conn, log) = open_with_cache("2");

    for sql in ["A", "B", "C"] {
        let stmt = conn.prepare(sql).unwrap();
        assert!(stmt.returns_to_cache());
        Statement::dispose(stmt);
    }
    assert_eq!(conn.cached_statement_count(), 2);
    // A went out when C came in
    assert_eq!(log.count_of("drop statement: A"), 1);

    // A misses, so the backend prepares it a second time
    let a = conn.prepare("A").unwrap();
    assert_eq!(log.count_of("prepare statement: A"), 2);
    drop(a);

    // C hits, no further backend preparation
    let c = conn.prepare("C").unwrap();
    assert_eq!(log.count_of("prepare statement: C"), 1);
    drop(c);
}

#[test]
fn cached_statement_comes_back_reset() {
    let (mut conn, _log) = open_with_cache("4");

    let mut stmt = conn.prepare("SELECT ?").unwrap();
    stmt.downcast_mut::<MockStatement>().unwrap().bind("42");
    drop(stmt);

    let reused = conn.prepare("SELECT ?").unwrap();
    assert!(reused.downcast_ref::<MockStatement>().unwrap().params().is_empty());
}

#[test]
fn inactive_cache_destroys_on_disposal() {
    let (mut conn, log) = open_with_cache("0");

    let stmt = conn.prepare("A").unwrap();
    assert!(!stmt.returns_to_cache());
    drop(stmt);

    assert_eq!(conn.cached_statement_count(), 0);
    assert_eq!(log.count_of("drop statement: A"), 1);
    // every use prepares fresh
    let again = conn.prepare("A").unwrap();
    assert_eq!(log.count_of("prepare statement: A"), 2);
    drop(again);
}

#[test]
fn negative_cache_size_disables_the_cache() {
    let (mut conn, log) = open_with_cache("-5");
    let stmt = conn.prepare("A").unwrap();
    assert!(!stmt.returns_to_cache());
    drop(stmt);
    assert_eq!(log.count_of("drop statement: A"), 1);
}

#[test]
fn uncached_prepared_statement_bypasses_an_active_cache() {
    let (mut conn, log) = open_with_cache("4");

    let stmt = conn.get_prepared_uncached_statement("A").unwrap();
    assert!(!stmt.returns_to_cache());
    drop(stmt);
    assert_eq!(conn.cached_statement_count(), 0);
    assert_eq!(log.count_of("drop statement: A"), 1);
}

#[test]
fn unprepared_statements_are_never_cached() {
    let (mut conn, log) = open_with_cache("4");

    let stmt = conn.get_statement("A").unwrap();
    assert!(!stmt.returns_to_cache());
    assert!(!stmt.downcast_ref::<MockStatement>().unwrap().prepared());
    drop(stmt);
    assert_eq!(conn.cached_statement_count(), 0);
    assert_eq!(log.count_of("drop statement: A"), 1);
}

#[test]
fn clearing_the_cache_releases_backend_statements() {
    let (mut conn, log) = open_with_cache("4");
    for sql in ["A", "B"] {
        let stmt = conn.prepare(sql).unwrap();
        drop(stmt);
    }
    assert_eq!(conn.cached_statement_count(), 2);

    conn.clear_cache();
    assert_eq!(conn.cached_statement_count(), 0);
    assert_eq!(log.count_of("drop statement: A"), 1);
    assert_eq!(log.count_of("drop statement: B"), 1);
}
