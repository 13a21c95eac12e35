//! Keyed single-flight memoization.
//!
//! The first caller for a key runs the initializer; concurrent callers for the
//! same key wait on it and receive a clone of the same result. Results
//! (including errors) stay cached for the lifetime of the [`SingleFlight`].

use std::collections::HashMap;
use std::future::Future;
use std::hash::Hash;
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::OnceCell;

pub struct SingleFlight<K, V> {
  cells: Mutex<HashMap<K, Arc<OnceCell<V>>>>,
}

impl<K, V> Default for SingleFlight<K, V> {
  fn default() -> Self {
    Self {
      cells: Mutex::new(HashMap::new()),
    }
  }
}

impl<K, V> SingleFlight<K, V>
where
  K: Eq + Hash + Clone,
  V: Clone,
{
  pub fn new() -> Self {
    Self::default()
  }

  /// Return the cached value for `key`, running `init` if no caller has yet.
  ///
  /// If the task driving `init` is cancelled mid-flight, the next waiter runs
  /// its own initializer.
  pub async fn get_or_run<F, Fut>(&self, key: K, init: F) -> V
  where
    F: FnOnce() -> Fut,
    Fut: Future<Output = V>,
  {
    let cell = self.cell(key);
    cell.get_or_init(init).await.clone()
  }

  /// Return the value for `key` if it has finished initializing.
  pub fn get(&self, key: &K) -> Option<V> {
    let cells = self.cells.lock().unwrap_or_else(PoisonError::into_inner);
    cells.get(key).and_then(|cell| cell.get().cloned())
  }

  /// Number of keys that have been requested.
  pub fn len(&self) -> usize {
    self.cells.lock().unwrap_or_else(PoisonError::into_inner).len()
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }

  fn cell(&self, key: K) -> Arc<OnceCell<V>> {
    let mut cells = self.cells.lock().unwrap_or_else(PoisonError::into_inner);
    cells.entry(key).or_default().clone()
  }
}

#[cfg(test)]
mod tests {
  use std::sync::atomic::{AtomicUsize, Ordering};
  use std::time::Duration;

  use super::*;

  #[tokio::test]
  async fn runs_initializer_once_per_key() {
    let flight: SingleFlight<&str, usize> = SingleFlight::new();
    let calls = AtomicUsize::new(0);

    let a = flight
      .get_or_run("a", || async { calls.fetch_add(1, Ordering::SeqCst) + 100 })
      .await;
    let again = flight
      .get_or_run("a", || async { calls.fetch_add(1, Ordering::SeqCst) + 100 })
      .await;
    let b = flight
      .get_or_run("b", || async { calls.fetch_add(1, Ordering::SeqCst) + 100 })
      .await;

    assert_eq!(a, 100);
    assert_eq!(again, 100);
    assert_eq!(b, 101);
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert_eq!(flight.len(), 2);
  }

  #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
  async fn concurrent_callers_share_one_run() {
    let flight: Arc<SingleFlight<u32, Result<String, String>>> = Arc::new(SingleFlight::new());
    let calls = Arc::new(AtomicUsize::new(0));

    let mut handles = Vec::new();
    for _ in 0..10 {
      let flight = flight.clone();
      let calls = calls.clone();
      handles.push(tokio::spawn(async move {
        flight
          .get_or_run(7, || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(20)).await;
            Err::<String, _>("boom".to_string())
          })
          .await
      }));
    }

    for handle in handles {
      assert_eq!(handle.await.unwrap(), Err("boom".to_string()));
    }
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(flight.get(&7), Some(Err("boom".to_string())));
  }

  #[test]
  fn get_is_none_before_initialization() {
    let flight: SingleFlight<u32, u32> = SingleFlight::new();
    assert_eq!(flight.get(&1), None);
    assert!(flight.is_empty());
  }
}
