use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex as StdMutex, MutexGuard};

use async_trait::async_trait;
use chrono::NaiveDate;
use tokio::sync::{RwLock, mpsc};
use uuid::Uuid;

use crate::auth::UserId;
use crate::core::category::{Category, NewCategory};
use crate::core::habit::{Habit, NewHabit};
use crate::core::note::{NewNote, Note, NotePatch};
use crate::core::profile::UserProfile;
use crate::core::task::{NewTask, Task, TaskPatch};

use super::file::{self, Snapshot};
use super::{
    CategoryStore, HabitStore, NoteFilter, NoteStore, ProfileStore, Result, StoreError,
    Subscription, TaskFilter, TaskStore, WatchGuard,
};

/// In-process document store with the push model of the hosted backend it
/// stands in for: each watcher receives the full matching result set on
/// subscribe and again after every commit that changes it. Writes are
/// last-write-wins. With a backing path the whole store is rewritten as a
/// JSON snapshot after each commit.
#[derive(Clone)]
pub struct MemoryStore {
    inner: Arc<StoreInner>,
}

struct StoreInner {
    data: RwLock<Collections>,
    task_watchers: WatcherMap<Task, TaskFilter>,
    category_watchers: WatcherMap<Category, UserId>,
    note_watchers: WatcherMap<Note, NoteFilter>,
    habit_watchers: WatcherMap<Habit, UserId>,
    next_watcher: AtomicU64,
    path: Option<PathBuf>,
}

#[derive(Default)]
struct Collections {
    tasks: HashMap<Uuid, Task>,
    categories: HashMap<Uuid, Category>,
    notes: HashMap<Uuid, Note>,
    habits: HashMap<Uuid, Habit>,
    profiles: HashMap<UserId, UserProfile>,
}

struct Watcher<T, F> {
    filter: F,
    tx: mpsc::UnboundedSender<Vec<T>>,
    last_sent: Vec<T>,
}

type WatcherMap<T, F> = StdMutex<HashMap<u64, Watcher<T, F>>>;

fn lock<T>(mutex: &StdMutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Push the recomputed result set to every watcher whose set changed.
/// Watchers with a gone receiver are dropped along the way.
fn notify<T, F>(watchers: &WatcherMap<T, F>, compute: impl Fn(&F) -> Vec<T>)
where
    T: Clone + PartialEq,
{
    let mut watchers = lock(watchers);
    watchers.retain(|_, watcher| {
        let set = compute(&watcher.filter);
        if set == watcher.last_sent {
            return true;
        }
        match watcher.tx.send(set.clone()) {
            Ok(()) => {
                watcher.last_sent = set;
                true
            }
            Err(_) => false,
        }
    });
}

fn register<T, F>(
    inner: &Arc<StoreInner>,
    project: fn(&StoreInner) -> &WatcherMap<T, F>,
    filter: F,
    initial: Vec<T>,
) -> Subscription<T>
where
    T: Clone + Send + 'static,
    F: Send + 'static,
{
    let id = inner.next_watcher.fetch_add(1, Ordering::Relaxed);
    let (tx, rx) = mpsc::unbounded_channel();
    let _ = tx.send(initial.clone());
    lock(project(inner)).insert(
        id,
        Watcher {
            filter,
            tx,
            last_sent: initial,
        },
    );

    let weak = Arc::downgrade(inner);
    let guard = WatchGuard::new(move || {
        if let Some(inner) = weak.upgrade() {
            lock(project(&inner)).remove(&id);
        }
    });
    Subscription::new(rx, guard)
}

impl Collections {
    /// Result sets are delivered sorted by id, the backend's default order.
    /// Display order is the consumer's concern.
    fn tasks_matching(&self, filter: &TaskFilter) -> Vec<Task> {
        let mut set: Vec<Task> = self
            .tasks
            .values()
            .filter(|t| filter.matches(t))
            .cloned()
            .collect();
        set.sort_by_key(|t| t.id);
        set
    }

    fn categories_of(&self, owner: &UserId) -> Vec<Category> {
        let mut set: Vec<Category> = self
            .categories
            .values()
            .filter(|c| c.owner == *owner)
            .cloned()
            .collect();
        set.sort_by_key(|c| c.id);
        set
    }

    fn notes_matching(&self, filter: &NoteFilter) -> Vec<Note> {
        let mut set: Vec<Note> = self
            .notes
            .values()
            .filter(|n| filter.matches(n))
            .cloned()
            .collect();
        set.sort_by_key(|n| n.id);
        set
    }

    fn habits_of(&self, owner: &UserId) -> Vec<Habit> {
        let mut set: Vec<Habit> = self
            .habits
            .values()
            .filter(|h| h.owner == *owner)
            .cloned()
            .collect();
        set.sort_by_key(|h| h.id);
        set
    }

    fn to_snapshot(&self) -> Snapshot {
        let mut snapshot = Snapshot {
            tasks: self.tasks.values().cloned().collect(),
            categories: self.categories.values().cloned().collect(),
            notes: self.notes.values().cloned().collect(),
            habits: self.habits.values().cloned().collect(),
            profiles: self.profiles.values().cloned().collect(),
        };
        // Stable file layout regardless of map iteration order
        snapshot.tasks.sort_by_key(|t| t.id);
        snapshot.categories.sort_by_key(|c| c.id);
        snapshot.notes.sort_by_key(|n| n.id);
        snapshot.habits.sort_by_key(|h| h.id);
        snapshot.profiles.sort_by_key(|p| p.user_id);
        snapshot
    }
}

impl StoreInner {
    fn notify_tasks(&self, data: &Collections) {
        notify(&self.task_watchers, |filter| data.tasks_matching(filter));
    }

    fn notify_categories(&self, data: &Collections) {
        notify(&self.category_watchers, |owner| data.categories_of(owner));
    }

    fn notify_notes(&self, data: &Collections) {
        notify(&self.note_watchers, |filter| data.notes_matching(filter));
    }

    fn notify_habits(&self, data: &Collections) {
        notify(&self.habit_watchers, |owner| data.habits_of(owner));
    }

    fn persist(&self, data: &Collections) {
        let Some(path) = &self.path else {
            return;
        };
        if let Err(e) = file::save_snapshot(path, &data.to_snapshot()) {
            log::error!("Failed to save store to {}: {}", path.display(), e);
        }
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::with_snapshot(Snapshot::default(), None)
    }

    /// Open a store backed by a JSON snapshot. The file is read once here
    /// and rewritten after every commit.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let snapshot = file::load_snapshot(&path);
        Self::with_snapshot(snapshot, Some(path))
    }

    fn with_snapshot(snapshot: Snapshot, path: Option<PathBuf>) -> Self {
        let mut collections = Collections::default();
        for task in snapshot.tasks {
            collections.tasks.insert(task.id, task);
        }
        for category in snapshot.categories {
            collections.categories.insert(category.id, category);
        }
        for note in snapshot.notes {
            collections.notes.insert(note.id, note);
        }
        for habit in snapshot.habits {
            collections.habits.insert(habit.id, habit);
        }
        for profile in snapshot.profiles {
            collections.profiles.insert(profile.user_id, profile);
        }

        Self {
            inner: Arc::new(StoreInner {
                data: RwLock::new(collections),
                task_watchers: StdMutex::new(HashMap::new()),
                category_watchers: StdMutex::new(HashMap::new()),
                note_watchers: StdMutex::new(HashMap::new()),
                habit_watchers: StdMutex::new(HashMap::new()),
                next_watcher: AtomicU64::new(0),
                path,
            }),
        }
    }

    #[cfg(test)]
    pub(crate) fn task_watcher_count(&self) -> usize {
        lock(&self.inner.task_watchers).len()
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TaskStore for MemoryStore {
    async fn subscribe_tasks(&self, filter: TaskFilter) -> Result<Subscription<Task>> {
        // Holding the read guard keeps commits out between the snapshot and
        // the watcher landing in the registry, so nothing is missed.
        let data = self.inner.data.read().await;
        let initial = data.tasks_matching(&filter);
        Ok(register(&self.inner, |s| &s.task_watchers, filter, initial))
    }

    async fn create_task(&self, new: NewTask) -> Result<Task> {
        let mut data = self.inner.data.write().await;
        let next_order = data
            .tasks
            .values()
            .filter(|t| t.owner == new.owner)
            .map(|t| t.order)
            .max()
            .map_or(0, |m| m.saturating_add(1));

        let mut task = Task::new(new.owner, new.name);
        task.category = new.category;
        task.priority = new.priority;
        task.order = next_order;
        data.tasks.insert(task.id, task.clone());

        self.inner.notify_tasks(&data);
        self.inner.persist(&data);
        Ok(task)
    }

    async fn get_task(&self, id: Uuid) -> Result<Option<Task>> {
        Ok(self.inner.data.read().await.tasks.get(&id).cloned())
    }

    async fn update_task(&self, id: Uuid, patch: TaskPatch) -> Result<()> {
        let mut data = self.inner.data.write().await;
        let task = data.tasks.get_mut(&id).ok_or(StoreError::NotFound(id))?;
        patch.apply(task);

        self.inner.notify_tasks(&data);
        self.inner.persist(&data);
        Ok(())
    }

    async fn update_task_orders(&self, changes: &[(Uuid, u32)]) -> Result<()> {
        if changes.is_empty() {
            return Ok(());
        }
        let mut data = self.inner.data.write().await;

        // Validate first so one bad id leaves every order untouched.
        for (id, _) in changes {
            if !data.tasks.contains_key(id) {
                return Err(StoreError::NotFound(*id));
            }
        }
        for (id, order) in changes {
            if let Some(task) = data.tasks.get_mut(id) {
                task.order = *order;
            }
        }

        self.inner.notify_tasks(&data);
        self.inner.persist(&data);
        Ok(())
    }

    async fn delete_task(&self, id: Uuid) -> Result<()> {
        let mut data = self.inner.data.write().await;
        if data.tasks.remove(&id).is_none() {
            return Err(StoreError::NotFound(id));
        }

        self.inner.notify_tasks(&data);
        self.inner.persist(&data);
        Ok(())
    }
}

#[async_trait]
impl CategoryStore for MemoryStore {
    async fn subscribe_categories(&self, owner: UserId) -> Result<Subscription<Category>> {
        let data = self.inner.data.read().await;
        let initial = data.categories_of(&owner);
        Ok(register(
            &self.inner,
            |s| &s.category_watchers,
            owner,
            initial,
        ))
    }

    async fn create_category(&self, new: NewCategory) -> Result<Category> {
        let mut data = self.inner.data.write().await;
        let category = Category::new(new.owner, new.name, new.color);
        data.categories.insert(category.id, category.clone());

        self.inner.notify_categories(&data);
        self.inner.persist(&data);
        Ok(category)
    }

    async fn delete_category(&self, id: Uuid) -> Result<()> {
        let mut data = self.inner.data.write().await;
        if data.categories.remove(&id).is_none() {
            return Err(StoreError::NotFound(id));
        }
        // Tasks keep the dangling id and render uncategorized.

        self.inner.notify_categories(&data);
        self.inner.persist(&data);
        Ok(())
    }
}

#[async_trait]
impl NoteStore for MemoryStore {
    async fn subscribe_notes(&self, filter: NoteFilter) -> Result<Subscription<Note>> {
        let data = self.inner.data.read().await;
        let initial = data.notes_matching(&filter);
        Ok(register(&self.inner, |s| &s.note_watchers, filter, initial))
    }

    async fn create_note(&self, new: NewNote) -> Result<Note> {
        let mut data = self.inner.data.write().await;
        let mut note = Note::new(new.owner, new.title);
        note.content = new.content;
        data.notes.insert(note.id, note.clone());

        self.inner.notify_notes(&data);
        self.inner.persist(&data);
        Ok(note)
    }

    async fn get_note(&self, id: Uuid) -> Result<Option<Note>> {
        Ok(self.inner.data.read().await.notes.get(&id).cloned())
    }

    async fn update_note(&self, id: Uuid, patch: NotePatch) -> Result<()> {
        let mut data = self.inner.data.write().await;
        let note = data.notes.get_mut(&id).ok_or(StoreError::NotFound(id))?;
        patch.apply(note);

        self.inner.notify_notes(&data);
        self.inner.persist(&data);
        Ok(())
    }

    async fn delete_note(&self, id: Uuid) -> Result<()> {
        let mut data = self.inner.data.write().await;
        if data.notes.remove(&id).is_none() {
            return Err(StoreError::NotFound(id));
        }

        self.inner.notify_notes(&data);
        self.inner.persist(&data);
        Ok(())
    }
}

#[async_trait]
impl HabitStore for MemoryStore {
    async fn subscribe_habits(&self, owner: UserId) -> Result<Subscription<Habit>> {
        let data = self.inner.data.read().await;
        let initial = data.habits_of(&owner);
        Ok(register(&self.inner, |s| &s.habit_watchers, owner, initial))
    }

    async fn create_habit(&self, new: NewHabit) -> Result<Habit> {
        let mut data = self.inner.data.write().await;
        let habit = Habit::new(new.owner, new.name);
        data.habits.insert(habit.id, habit.clone());

        self.inner.notify_habits(&data);
        self.inner.persist(&data);
        Ok(habit)
    }

    async fn get_habit(&self, id: Uuid) -> Result<Option<Habit>> {
        Ok(self.inner.data.read().await.habits.get(&id).cloned())
    }

    async fn set_habit_completions(&self, id: Uuid, completions: Vec<NaiveDate>) -> Result<()> {
        let mut data = self.inner.data.write().await;
        let habit = data.habits.get_mut(&id).ok_or(StoreError::NotFound(id))?;

        let mut completions = completions;
        completions.sort();
        completions.dedup();
        habit.completions = completions;

        self.inner.notify_habits(&data);
        self.inner.persist(&data);
        Ok(())
    }

    async fn delete_habit(&self, id: Uuid) -> Result<()> {
        let mut data = self.inner.data.write().await;
        if data.habits.remove(&id).is_none() {
            return Err(StoreError::NotFound(id));
        }

        self.inner.notify_habits(&data);
        self.inner.persist(&data);
        Ok(())
    }
}

#[async_trait]
impl ProfileStore for MemoryStore {
    async fn upsert_profile(&self, profile: UserProfile) -> Result<()> {
        let mut data = self.inner.data.write().await;
        data.profiles.insert(profile.user_id, profile);
        self.inner.persist(&data);
        Ok(())
    }

    async fn get_profile(&self, user: UserId) -> Result<Option<UserProfile>> {
        Ok(self.inner.data.read().await.profiles.get(&user).cloned())
    }

    async fn list_profiles(&self) -> Result<Vec<UserProfile>> {
        let data = self.inner.data.read().await;
        let mut profiles: Vec<UserProfile> = data.profiles.values().cloned().collect();
        profiles.sort_by_key(|p| p.user_id);
        Ok(profiles)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ada() -> UserId {
        UserId::from_email("ada@example.com")
    }

    fn grace() -> UserId {
        UserId::from_email("grace@example.com")
    }

    #[tokio::test]
    async fn create_assigns_next_order_per_owner() {
        let store = MemoryStore::new();
        let first = store.create_task(NewTask::new(ada(), "One")).await.unwrap();
        let second = store.create_task(NewTask::new(ada(), "Two")).await.unwrap();
        let other = store
            .create_task(NewTask::new(grace(), "Theirs"))
            .await
            .unwrap();

        assert_eq!(first.order, 0);
        assert_eq!(second.order, 1);
        assert_eq!(other.order, 0);
    }

    #[tokio::test]
    async fn create_appends_after_highest_order() {
        let store = MemoryStore::new();
        let task = store.create_task(NewTask::new(ada(), "One")).await.unwrap();
        store.update_task_orders(&[(task.id, 7)]).await.unwrap();

        let next = store.create_task(NewTask::new(ada(), "Two")).await.unwrap();
        assert_eq!(next.order, 8);
    }

    #[tokio::test]
    async fn create_saturates_at_the_order_ceiling() {
        let store = MemoryStore::new();
        let task = store.create_task(NewTask::new(ada(), "One")).await.unwrap();
        store
            .update_task_orders(&[(task.id, u32::MAX)])
            .await
            .unwrap();

        let next = store.create_task(NewTask::new(ada(), "Two")).await.unwrap();
        assert_eq!(next.order, u32::MAX);
    }

    #[tokio::test]
    async fn subscribe_delivers_current_set_immediately() {
        let store = MemoryStore::new();
        store.create_task(NewTask::new(ada(), "One")).await.unwrap();
        store.create_task(NewTask::new(ada(), "Two")).await.unwrap();

        let mut sub = store.subscribe_tasks(TaskFilter::owned_by(ada())).await.unwrap();
        let initial = sub.next().await.unwrap();
        assert_eq!(initial.len(), 2);
    }

    #[tokio::test]
    async fn matching_commit_pushes_new_result_set() {
        let store = MemoryStore::new();
        let mut sub = store.subscribe_tasks(TaskFilter::owned_by(ada())).await.unwrap();
        assert!(sub.next().await.unwrap().is_empty());

        let task = store.create_task(NewTask::new(ada(), "One")).await.unwrap();
        let delivered = sub.next().await.unwrap();
        assert_eq!(delivered.len(), 1);
        assert_eq!(delivered[0].id, task.id);
    }

    #[tokio::test]
    async fn subscription_drives_stream_combinators() {
        use futures::StreamExt;

        let store = MemoryStore::new();
        let sub = store.subscribe_tasks(TaskFilter::owned_by(ada())).await.unwrap();
        store.create_task(NewTask::new(ada(), "One")).await.unwrap();

        let sets: Vec<Vec<Task>> = sub.take(2).collect().await;
        assert!(sets[0].is_empty());
        assert_eq!(sets[1].len(), 1);
    }

    #[tokio::test]
    async fn unrelated_commit_is_silent() {
        let store = MemoryStore::new();
        let mut sub = store.subscribe_tasks(TaskFilter::owned_by(ada())).await.unwrap();
        assert!(sub.next().await.unwrap().is_empty());

        store
            .create_task(NewTask::new(grace(), "Theirs"))
            .await
            .unwrap();
        assert!(sub.try_next().is_none());
    }

    #[tokio::test]
    async fn order_batch_is_all_or_nothing() {
        let store = MemoryStore::new();
        let a = store.create_task(NewTask::new(ada(), "A")).await.unwrap();
        let b = store.create_task(NewTask::new(ada(), "B")).await.unwrap();

        let err = store
            .update_task_orders(&[(a.id, 1), (Uuid::new_v4(), 0), (b.id, 0)])
            .await
            .unwrap_err();
        assert!(err.is_not_found());

        assert_eq!(store.get_task(a.id).await.unwrap().unwrap().order, 0);
        assert_eq!(store.get_task(b.id).await.unwrap().unwrap().order, 1);
    }

    #[tokio::test]
    async fn order_batch_notifies_once() {
        let store = MemoryStore::new();
        let a = store.create_task(NewTask::new(ada(), "A")).await.unwrap();
        let b = store.create_task(NewTask::new(ada(), "B")).await.unwrap();

        let mut sub = store.subscribe_tasks(TaskFilter::owned_by(ada())).await.unwrap();
        sub.next().await.unwrap();

        store
            .update_task_orders(&[(a.id, 1), (b.id, 0)])
            .await
            .unwrap();

        let delivered = sub.next().await.unwrap();
        let orders: HashMap<Uuid, u32> = delivered.iter().map(|t| (t.id, t.order)).collect();
        assert_eq!(orders[&a.id], 1);
        assert_eq!(orders[&b.id], 0);
        assert!(sub.try_next().is_none());
    }

    #[tokio::test]
    async fn sharing_moves_task_into_shared_result_set() {
        let store = MemoryStore::new();
        let task = store.create_task(NewTask::new(ada(), "Ours")).await.unwrap();

        let mut sub = store
            .subscribe_tasks(TaskFilter::shared_with(grace()))
            .await
            .unwrap();
        assert!(sub.next().await.unwrap().is_empty());

        store
            .update_task(
                task.id,
                TaskPatch {
                    shared_with: Some(vec![grace()]),
                    ..TaskPatch::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(sub.next().await.unwrap().len(), 1);

        store
            .update_task(
                task.id,
                TaskPatch {
                    shared_with: Some(Vec::new()),
                    ..TaskPatch::default()
                },
            )
            .await
            .unwrap();
        assert!(sub.next().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn dropped_subscription_is_unregistered() {
        let store = MemoryStore::new();
        let sub = store.subscribe_tasks(TaskFilter::owned_by(ada())).await.unwrap();
        assert_eq!(store.task_watcher_count(), 1);

        drop(sub);
        assert_eq!(store.task_watcher_count(), 0);

        // Commits after teardown still go through.
        store.create_task(NewTask::new(ada(), "One")).await.unwrap();
    }

    #[tokio::test]
    async fn subscription_ends_when_store_is_dropped() {
        let store = MemoryStore::new();
        let mut sub = store.subscribe_tasks(TaskFilter::owned_by(ada())).await.unwrap();

        drop(store);
        assert!(sub.next().await.unwrap().is_empty()); // queued initial set
        assert!(sub.next().await.is_none());
    }

    #[tokio::test]
    async fn update_on_missing_task_is_not_found() {
        let store = MemoryStore::new();
        let err = store
            .update_task(Uuid::new_v4(), TaskPatch::default())
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn note_soft_delete_then_purge() {
        let store = MemoryStore::new();
        let note = store
            .create_note(NewNote::new(ada(), "Groceries", "milk"))
            .await
            .unwrap();

        store
            .update_note(
                note.id,
                NotePatch {
                    deleted: Some(true),
                    ..NotePatch::default()
                },
            )
            .await
            .unwrap();
        assert!(store.get_note(note.id).await.unwrap().unwrap().deleted);

        store.delete_note(note.id).await.unwrap();
        assert!(store.get_note(note.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn habit_completions_are_normalized() {
        let store = MemoryStore::new();
        let habit = store
            .create_habit(NewHabit::new(ada(), "Stretch"))
            .await
            .unwrap();

        let d1 = NaiveDate::from_ymd_opt(2025, 3, 9).unwrap();
        let d2 = NaiveDate::from_ymd_opt(2025, 3, 10).unwrap();
        store
            .set_habit_completions(habit.id, vec![d2, d1, d2])
            .await
            .unwrap();

        let stored = store.get_habit(habit.id).await.unwrap().unwrap();
        assert_eq!(stored.completions, vec![d1, d2]);
    }

    #[tokio::test]
    async fn category_subscription_tracks_owner_only() {
        let store = MemoryStore::new();
        let mut sub = store.subscribe_categories(ada()).await.unwrap();
        assert!(sub.next().await.unwrap().is_empty());

        store
            .create_category(NewCategory::new(grace(), "Work", "#202020"))
            .await
            .unwrap();
        assert!(sub.try_next().is_none());

        let own = store
            .create_category(NewCategory::new(ada(), "Home", "#7a5cff"))
            .await
            .unwrap();
        let delivered = sub.next().await.unwrap();
        assert_eq!(delivered.len(), 1);
        assert_eq!(delivered[0].id, own.id);
    }

    #[tokio::test]
    async fn snapshot_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");

        let task_id;
        {
            let store = MemoryStore::open(&path);
            let task = store.create_task(NewTask::new(ada(), "Keep me")).await.unwrap();
            task_id = task.id;
            store
                .create_note(NewNote::new(ada(), "Groceries", "milk"))
                .await
                .unwrap();
            store
                .upsert_profile(UserProfile {
                    user_id: ada(),
                    display_name: Some("Ada".into()),
                    email: Some("ada@example.com".into()),
                })
                .await
                .unwrap();
        }

        let reopened = MemoryStore::open(&path);
        let task = reopened.get_task(task_id).await.unwrap().unwrap();
        assert_eq!(task.name, "Keep me");
        assert_eq!(reopened.list_profiles().await.unwrap().len(), 1);
    }
}
