// In-flight request coalescing.
// Concurrent callers asking for the same key share one running task and its result.

use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;
use std::sync::{Mutex, MutexGuard, PoisonError};

use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use tracing::debug;

type SharedTask<V> = Shared<BoxFuture<'static, V>>;

struct Entry<V: Clone> {
    task: SharedTask<V>,
    waiters: usize,
}

/// Registry of running tasks keyed by `K`.
///
/// An entry lives only while its task runs; the next call after completion starts fresh.
/// When every waiter of an unfinished task is dropped, the entry and the task go with it.
pub struct InFlight<K, V: Clone> {
    tasks: Mutex<HashMap<K, Entry<V>>>,
}

impl<K, V: Clone> Default for InFlight<K, V> {
    fn default() -> Self {
        Self {
            tasks: Mutex::new(HashMap::new()),
        }
    }
}

impl<K, V: Clone> fmt::Debug for InFlight<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let running = self.tasks.lock().map(|t| t.len()).unwrap_or(0);
        f.debug_struct("InFlight").field("running", &running).finish()
    }
}

fn lock<K, V: Clone>(tasks: &Mutex<HashMap<K, Entry<V>>>) -> MutexGuard<'_, HashMap<K, Entry<V>>> {
    tasks.lock().unwrap_or_else(PoisonError::into_inner)
}

/// One caller's registration; releases it on drop, including when the caller is cancelled.
struct Waiter<'a, K: Eq + Hash, V: Clone> {
    tasks: &'a Mutex<HashMap<K, Entry<V>>>,
    key: K,
    task: SharedTask<V>,
    completed: bool,
}

impl<K: Eq + Hash, V: Clone> Drop for Waiter<'_, K, V> {
    fn drop(&mut self) {
        let mut tasks = lock(self.tasks);
        let Some(entry) = tasks.get_mut(&self.key) else {
            return;
        };
        if !entry.task.ptr_eq(&self.task) {
            return;
        }
        entry.waiters = entry.waiters.saturating_sub(1);
        if self.completed || entry.waiters == 0 {
            tasks.remove(&self.key);
        }
    }
}

impl<K, V> InFlight<K, V>
where
    K: Eq + Hash + Clone + fmt::Debug,
    V: Clone + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// Await the task running for `key`, starting it with `start` if there is none.
    ///
    /// Dropping the last waiter before the task finishes drops the task.
    pub async fn run<F>(&self, key: K, start: F) -> V
    where
        F: FnOnce() -> BoxFuture<'static, V>,
    {
        let task = {
            let mut tasks = lock(&self.tasks);
            match tasks.get_mut(&key) {
                Some(entry) => {
                    debug!(?key, "joining in-flight task");
                    entry.waiters += 1;
                    entry.task.clone()
                }
                None => {
                    let task = start().shared();
                    tasks.insert(
                        key.clone(),
                        Entry {
                            task: task.clone(),
                            waiters: 1,
                        },
                    );
                    task
                }
            }
        };

        let mut waiter = Waiter {
            tasks: &self.tasks,
            key,
            task: task.clone(),
            completed: false,
        };
        let value = task.await;
        waiter.completed = true;
        value
    }

    /// Number of tasks currently registered.
    pub fn len(&self) -> usize {
        lock(&self.tasks).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
