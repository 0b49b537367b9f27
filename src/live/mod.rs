pub mod reorder;

use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::auth::UserId;
use crate::core::task::Task;
use crate::store::{Result, Subscription, TaskFilter, TaskStore};

/// Merge the owned and shared-with result sets into the one list a viewer
/// sees. Owned entries come first, the first occurrence of an id wins (so a
/// task both owned and shared with the viewer shows its owned copy), then a
/// stable sort ascending by order. Ties keep their concatenation order.
pub fn merge_task_sets(owned: &[Task], shared: &[Task]) -> Vec<Task> {
    let mut merged: Vec<Task> = Vec::with_capacity(owned.len() + shared.len());
    for task in owned.iter().chain(shared) {
        if merged.iter().all(|seen| seen.id != task.id) {
            merged.push(task.clone());
        }
    }
    merged.sort_by_key(|t| t.order);
    merged
}

/// Optional narrowing applied to both underlying queries. Changing it means
/// dropping the list and spawning a new one.
#[derive(Debug, Clone, Copy, Default)]
pub struct ListSelector {
    pub category: Option<Uuid>,
    pub completed: Option<bool>,
}

enum Command {
    Reorder { from: usize, to: usize },
}

/// Live merged view of everything one viewer can see.
///
/// Two store subscriptions feed a single driver task, owned-by and
/// shared-with. Each delivery replaces that side wholesale and the merge is
/// recomputed, so consumers always observe a complete list, never a patch.
/// Dropping the handle stops the driver and tears down both subscriptions.
pub struct LiveTaskList {
    view: watch::Receiver<Vec<Task>>,
    commands: mpsc::UnboundedSender<Command>,
    driver: JoinHandle<()>,
}

impl LiveTaskList {
    pub async fn spawn(
        store: Arc<dyn TaskStore>,
        viewer: UserId,
        selector: ListSelector,
    ) -> Result<Self> {
        let mut owned_filter = TaskFilter::owned_by(viewer);
        let mut shared_filter = TaskFilter::shared_with(viewer);
        if let Some(category) = selector.category {
            owned_filter = owned_filter.with_category(category);
            shared_filter = shared_filter.with_category(category);
        }
        if let Some(completed) = selector.completed {
            owned_filter = owned_filter.with_completed(completed);
            shared_filter = shared_filter.with_completed(completed);
        }

        let owned_sub = store.subscribe_tasks(owned_filter).await?;
        let shared_sub = store.subscribe_tasks(shared_filter).await?;

        let (view_tx, view_rx) = watch::channel(Vec::new());
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();

        let driver = tokio::spawn(drive(store, owned_sub, shared_sub, view_tx, cmd_rx));

        Ok(Self {
            view: view_rx,
            commands: cmd_tx,
            driver,
        })
    }

    /// Channel carrying the merged list. It holds the latest value; await
    /// `changed` on a clone to follow recomputes.
    pub fn view(&self) -> watch::Receiver<Vec<Task>> {
        self.view.clone()
    }

    /// The list as of the latest recompute.
    pub fn current(&self) -> Vec<Task> {
        self.view.borrow().clone()
    }

    /// Move the entry at `from` to `to` and renumber the whole list.
    ///
    /// The renumbered list is published immediately, then the changed
    /// positions are persisted as one batched commit. A failed commit is
    /// logged and the optimistic state stays up; the next store delivery
    /// reconverges the view. Out-of-range indices and `from == to` are
    /// ignored.
    pub fn reorder(&self, from: usize, to: usize) {
        if self.commands.send(Command::Reorder { from, to }).is_err() {
            log::warn!("Reorder dropped, live list driver is gone");
        }
    }
}

impl Drop for LiveTaskList {
    fn drop(&mut self) {
        self.driver.abort();
    }
}

async fn drive(
    store: Arc<dyn TaskStore>,
    mut owned_sub: Subscription<Task>,
    mut shared_sub: Subscription<Task>,
    view: watch::Sender<Vec<Task>>,
    mut commands: mpsc::UnboundedReceiver<Command>,
) {
    let mut owned: Vec<Task> = Vec::new();
    let mut shared: Vec<Task> = Vec::new();

    loop {
        tokio::select! {
            delivery = owned_sub.next() => match delivery {
                Some(set) => {
                    owned = set;
                    let _ = view.send(merge_task_sets(&owned, &shared));
                }
                None => break,
            },
            delivery = shared_sub.next() => match delivery {
                Some(set) => {
                    shared = set;
                    let _ = view.send(merge_task_sets(&owned, &shared));
                }
                None => break,
            },
            command = commands.recv() => match command {
                Some(Command::Reorder { from, to }) => {
                    let current = view.borrow().clone();
                    let Some((reordered, changes)) = reorder::reindex(&current, from, to) else {
                        continue;
                    };
                    let _ = view.send(reordered);
                    if let Err(e) = store.update_task_orders(&changes).await {
                        log::warn!("Failed to persist reorder: {}", e);
                    }
                }
                None => break,
            },
        }
    }
}
