use coop_pool::{OwnershipMode, PoolConfig, PoolError, ResourcePool, TaskId, TokioScheduler};

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::sleep;

// Helper to initialize tracing for tests. Once ensures it runs a single time
// across the whole test binary.
fn setup_tracing_for_test() {
  use std::sync::Once;
  use tracing_subscriber::{fmt, EnvFilter};
  static TRACING_INIT: Once = Once::new();

  TRACING_INIT.call_once(|| {
    let filter =
      EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,coop_pool=trace"));

    fmt::Subscriber::builder()
      .with_env_filter(filter)
      .with_test_writer()
      .try_init()
      .ok();
  });
}

fn new_pool(name: &str, config: PoolConfig) -> Arc<ResourcePool<TokioScheduler>> {
  ResourcePool::new(name, config, TokioScheduler::current()).unwrap()
}

// Polls the pool until the expected number of waiters is queued, so tests
// can order arrivals without relying on fixed sleeps.
async fn wait_until_waiting(pool: &Arc<ResourcePool<TokioScheduler>>, expected: usize) {
  let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
  while pool.info().waiting != expected {
    if tokio::time::Instant::now() > deadline {
      panic!(
        "pool never reached {} waiters, info: {:?}",
        expected,
        pool.info()
      );
    }
    sleep(Duration::from_millis(2)).await;
  }
}

#[tokio::test]
async fn test_fresh_pool_info() {
  setup_tracing_for_test();
  let pool = new_pool("fresh_info", PoolConfig::new(5));

  let info = pool.info();
  assert_eq!(info.waiting, 0);
  assert_eq!(info.owned, 0);
  assert_eq!(info.limit, 5);
  assert!(pool.can_be_acquired());
}

#[tokio::test]
async fn test_zero_limit_is_rejected() {
  setup_tracing_for_test();
  let result = ResourcePool::new("zero_limit", PoolConfig::new(0), TokioScheduler::current());
  assert!(matches!(result, Err(PoolError::InvalidConfiguration(_))));
}

#[tokio::test]
async fn test_acquire_and_release_fast_path() {
  setup_tracing_for_test();
  let pool = new_pool("fast_path", PoolConfig::new(2));
  let task = TaskId::fresh();

  pool.acquire(task, None).await.unwrap();
  assert!(pool.already_acquired(task));
  assert_eq!(pool.info().owned, 1);
  assert!(pool.can_be_acquired());

  pool.release(task).unwrap();
  assert!(!pool.already_acquired(task));
  assert_eq!(pool.info().owned, 0);
}

#[tokio::test]
async fn test_release_without_holding_is_not_held() {
  setup_tracing_for_test();
  let pool = new_pool("double_release", PoolConfig::new(1));
  let owner = TaskId::fresh();
  let stranger = TaskId::fresh();

  pool.acquire(owner, None).await.unwrap();
  assert_eq!(pool.release(stranger), Err(PoolError::NotHeld));

  // The failed release must not have mutated anything.
  let info = pool.info();
  assert_eq!(info.owned, 1);
  assert_eq!(info.waiting, 0);
  assert!(pool.already_acquired(owner));

  pool.release(owner).unwrap();
  assert_eq!(pool.release(owner), Err(PoolError::NotHeld));
}

#[tokio::test]
async fn test_exclusive_reacquire_is_rejected() {
  setup_tracing_for_test();
  let pool = new_pool("exclusive_reacquire", PoolConfig::new(3));
  let task = TaskId::fresh();

  pool.acquire(task, None).await.unwrap();
  assert_eq!(pool.acquire(task, None).await, Err(PoolError::AlreadyHeld));
  assert_eq!(pool.try_acquire(task), Err(PoolError::AlreadyHeld));
  assert_eq!(pool.info().owned, 1);
}

#[tokio::test]
async fn test_counting_reacquire_accumulates() {
  setup_tracing_for_test();
  let pool = new_pool(
    "counting_reacquire",
    PoolConfig::new(3).ownership_mode(OwnershipMode::Counting),
  );
  let task = TaskId::fresh();

  pool.acquire(task, None).await.unwrap();
  pool.acquire(task, None).await.unwrap();
  assert!(pool.try_acquire(task).unwrap());
  assert_eq!(pool.held_count(task), 3);
  assert_eq!(pool.info().owned, 3);
  assert!(!pool.can_be_acquired());

  // The held count must reach zero before the task stops being an owner.
  pool.release(task).unwrap();
  pool.release(task).unwrap();
  assert!(pool.already_acquired(task));
  assert_eq!(pool.held_count(task), 1);

  pool.release(task).unwrap();
  assert!(!pool.already_acquired(task));
  assert_eq!(pool.release(task), Err(PoolError::NotHeld));
}

#[tokio::test]
async fn test_try_acquire_on_saturated_pool_leaves_no_trace() {
  setup_tracing_for_test();
  let pool = new_pool("try_acquire_saturated", PoolConfig::new(1));
  let holder = TaskId::fresh();
  let prober = TaskId::fresh();

  pool.acquire(holder, None).await.unwrap();
  assert!(!pool.try_acquire(prober).unwrap());
  assert_eq!(pool.info().waiting, 0);
  assert!(!pool.already_acquired(prober));

  pool.release(holder).unwrap();
  assert!(pool.try_acquire(prober).unwrap());
  assert!(pool.already_acquired(prober));
}

#[tokio::test]
async fn test_third_task_waits_and_gets_freed_unit() {
  setup_tracing_for_test();
  let pool = new_pool("limit_two_three_tasks", PoolConfig::new(2));
  let t1 = TaskId::fresh();
  let t2 = TaskId::fresh();
  let t3 = TaskId::fresh();

  pool.acquire(t1, None).await.unwrap();
  pool.acquire(t2, None).await.unwrap();

  let waiter = {
    let pool = pool.clone();
    tokio::spawn(async move { pool.acquire(t3, None).await })
  };
  wait_until_waiting(&pool, 1).await;

  pool.release(t1).unwrap();
  tokio::time::timeout(Duration::from_secs(2), waiter)
    .await
    .expect("t3 was never granted")
    .unwrap()
    .unwrap();

  // T3 got T1's unit; T2 never lost its own.
  assert!(pool.already_acquired(t3));
  assert!(pool.already_acquired(t2));
  assert!(!pool.already_acquired(t1));
  assert_eq!(pool.info().owned, 2);
}

#[tokio::test]
async fn test_waiters_are_granted_in_arrival_order() {
  setup_tracing_for_test();
  let pool = new_pool("fifo_order", PoolConfig::new(1));
  let holder = TaskId::fresh();
  let first = TaskId::fresh();
  let second = TaskId::fresh();
  let order: Arc<Mutex<Vec<TaskId>>> = Arc::new(Mutex::new(Vec::new()));

  pool.acquire(holder, None).await.unwrap();

  let spawn_waiter = |task: TaskId| {
    let pool = pool.clone();
    let order = order.clone();
    tokio::spawn(async move {
      pool.acquire(task, None).await.unwrap();
      order.lock().unwrap().push(task);
      pool.release(task).unwrap();
    })
  };

  let first_handle = spawn_waiter(first);
  wait_until_waiting(&pool, 1).await;
  let second_handle = spawn_waiter(second);
  wait_until_waiting(&pool, 2).await;

  pool.release(holder).unwrap();
  tokio::time::timeout(Duration::from_secs(2), async {
    first_handle.await.unwrap();
    second_handle.await.unwrap();
  })
  .await
  .expect("waiters never drained");

  assert_eq!(*order.lock().unwrap(), vec![first, second]);
  assert_eq!(pool.info().owned, 0);
}

#[tokio::test]
async fn test_scoped_acquire_releases_on_normal_exit() {
  setup_tracing_for_test();
  let pool = new_pool("scoped_normal", PoolConfig::new(1));
  let task = TaskId::fresh();

  let probe = pool.clone();
  let value = pool
    .acquire_scoped(task, None, || async move {
      assert!(probe.already_acquired(task));
      "payload"
    })
    .await
    .unwrap();

  assert_eq!(value, "payload");
  assert!(!pool.already_acquired(task));
  assert_eq!(pool.info().owned, 0);
}

#[tokio::test]
async fn test_scoped_acquire_releases_when_body_reports_failure() {
  setup_tracing_for_test();
  let pool = new_pool("scoped_failure", PoolConfig::new(1));
  let task = TaskId::fresh();

  let outcome: Result<Result<(), String>, PoolError> = pool
    .acquire_scoped(task, None, || async { Err("boom".to_string()) })
    .await;

  // The body's own failure propagates through the output; the unit is back.
  assert_eq!(outcome.unwrap(), Err("boom".to_string()));
  assert_eq!(pool.info().owned, 0);
}

#[tokio::test]
async fn test_scoped_acquire_releases_on_panic() {
  setup_tracing_for_test();
  let pool = new_pool("scoped_panic", PoolConfig::new(1));
  let task = TaskId::fresh();

  let joined = {
    let pool = pool.clone();
    tokio::spawn(async move {
      pool
        .acquire_scoped(task, None, || async { panic!("scoped body panicked") })
        .await
    })
    .await
  };

  assert!(joined.is_err());
  assert_eq!(pool.info().owned, 0);
  assert!(pool.can_be_acquired());
}

#[tokio::test]
async fn test_scoped_acquire_never_runs_body_when_denied() {
  setup_tracing_for_test();
  let pool = new_pool("scoped_denied", PoolConfig::new(1));
  let task = TaskId::fresh();
  let body_ran = Arc::new(AtomicBool::new(false));

  pool.acquire(task, None).await.unwrap();

  let flag = body_ran.clone();
  let outcome = pool
    .acquire_scoped(task, None, || async move {
      flag.store(true, Ordering::SeqCst);
    })
    .await;

  assert_eq!(outcome, Err(PoolError::AlreadyHeld));
  assert!(!body_ran.load(Ordering::SeqCst));
  // The denied call must not have released the held unit either.
  assert!(pool.already_acquired(task));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_limit_is_never_exceeded_under_contention() {
  setup_tracing_for_test();
  let limit = 3;
  let pool = new_pool("contention", PoolConfig::new(limit));

  let mut handles = Vec::new();
  for _ in 0..24 {
    let pool = pool.clone();
    handles.push(tokio::spawn(async move {
      let task = TaskId::fresh();
      for _ in 0..10 {
        pool.acquire(task, None).await.unwrap();
        let info = pool.info();
        assert!(info.owned <= limit, "owned {} exceeded limit", info.owned);
        sleep(Duration::from_millis(rand::random_range(0..3))).await;
        pool.release(task).unwrap();
      }
    }));
  }
  for handle in handles {
    handle.await.unwrap();
  }

  let info = pool.info();
  assert_eq!(info.owned, 0);
  assert_eq!(info.waiting, 0);
}
