use std::sync::Arc;

use sql_drivers::test_utils::{MockDriver, RecordingPool};
use sql_drivers::{Connection, ConnectionConfig, ConnectionPool, Driver};

fn pooled_connection() -> (Connection, Arc<RecordingPool>, Arc<sql_drivers::test_utils::EventLog>)
{
    let mock = MockDriver::new();
    let log = mock.log();
    let driver: Arc<dyn Driver> = Arc::new(mock);
    let mut conn = Connection::open(driver, &ConnectionConfig::new("mock")).unwrap();
    let pool = RecordingPool::new();
    conn.set_pool(Arc::clone(&pool) as Arc<dyn ConnectionPool>);
    (conn, pool, log)
}

#[test]
fn recyclable_connection_returns_to_its_pool() {
    let (conn, pool, log) = pooled_connection();
    assert!(conn.recyclable());

    Connection::dispose(conn);
    assert_eq!(pool.len(), 1);
    // the session was handed over alive
    assert_eq!(log.count_of("drop connection"), 0);

    // and is still usable when the pool hands it out again
    let mut reused = pool.drain().pop().unwrap();
    let stmt = reused.prepare("SELECT 1").unwrap();
    drop(stmt);
    assert_eq!(log.count_of("prepare statement: SELECT 1"), 1);
}

#[test]
fn non_recyclable_connection_is_destroyed_not_pooled() {
    let (mut conn, pool, log) = pooled_connection();
    conn.set_recyclable(false);

    Connection::dispose(conn);
    assert!(pool.is_empty());
    assert_eq!(log.count_of("drop connection"), 1);
}

#[test]
fn unpooled_disposal_clears_the_cache_first() {
    let mock = MockDriver::new();
    let log = mock.log();
    let driver: Arc<dyn Driver> = Arc::new(mock);
    let mut conn = Connection::open(driver, &ConnectionConfig::new("mock")).unwrap();

    let stmt = conn.prepare("A").unwrap();
    drop(stmt);
    Connection::dispose(conn);

    let stmt_dropped = log.position("drop statement: A").unwrap();
    let conn_dropped = log.position("drop connection").unwrap();
    assert!(stmt_dropped < conn_dropped);
}
