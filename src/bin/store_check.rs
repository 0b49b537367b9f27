use std::collections::BTreeMap;

use docket::auth::UserId;
use docket::config::DocketConfig;
use docket::core::task::Task;
use docket::live::merge_task_sets;
use docket::store::memory::MemoryStore;
use docket::store::{ProfileStore, StoreError, TaskFilter, TaskStore};

async fn snapshot(store: &MemoryStore, filter: TaskFilter) -> Result<Vec<Task>, StoreError> {
    let mut sub = store.subscribe_tasks(filter).await?;
    Ok(sub.next().await.unwrap_or_default())
}

fn docket_log_level() -> log::LevelFilter {
    if docket::debug_logging() {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    }
}

#[tokio::main]
async fn main() {
    let config = DocketConfig::load();

    // Set up logging to the systemd user journal (`journalctl --user -t docket-store-check -f`).
    // Wrapper filters: docket crate at info/debug (per config), everything else at warn.
    {
        struct FilteredJournal {
            inner: systemd_journal_logger::JournalLog,
        }

        impl log::Log for FilteredJournal {
            fn enabled(&self, metadata: &log::Metadata) -> bool {
                let target = metadata.target();
                if target.starts_with("docket") || target.starts_with("store_check") {
                    metadata.level() <= docket_log_level()
                } else {
                    metadata.level() <= log::LevelFilter::Warn
                }
            }
            fn log(&self, record: &log::Record) {
                if self.enabled(record.metadata()) {
                    self.inner.log(record);
                }
            }
            fn flush(&self) {
                self.inner.flush();
            }
        }

        let journal = systemd_journal_logger::JournalLog::new()
            .unwrap()
            .with_syslog_identifier("docket-store-check".to_string());

        docket::set_debug_logging(config.debug_logging);

        log::set_boxed_logger(Box::new(FilteredJournal { inner: journal })).unwrap();
        // Global max must be Debug so docket debug logs can pass through when toggled
        log::set_max_level(log::LevelFilter::Debug);
    }

    let store_path = std::env::args()
        .nth(1)
        .map(std::path::PathBuf::from)
        .unwrap_or_else(|| config.store_path());

    println!("=== Store Check: {} ===\n", store_path.display());

    let store = MemoryStore::open(&store_path);

    let all_tasks = match snapshot(&store, TaskFilter::default()).await {
        Ok(tasks) => tasks,
        Err(e) => {
            println!("Failed to read tasks: {}", e);
            return;
        }
    };
    let profiles = store.list_profiles().await.unwrap_or_default();
    println!("{} tasks, {} profiles\n", all_tasks.len(), profiles.len());

    // Merged view per known user, built exactly as the live list builds it
    for profile in &profiles {
        let viewer = profile.user_id;
        println!("--- {} ---", profile.label());

        let owned = snapshot(&store, TaskFilter::owned_by(viewer)).await;
        let shared = snapshot(&store, TaskFilter::shared_with(viewer)).await;
        match (owned, shared) {
            (Ok(owned), Ok(shared)) => {
                let merged = merge_task_sets(&owned, &shared);
                if merged.is_empty() {
                    println!("  (no tasks)");
                }
                for task in &merged {
                    let mark = if task.completed { "x" } else { " " };
                    let origin = if task.owner == viewer { "" } else { " (shared)" };
                    println!("  [{}] {:>3}  {}{}", mark, task.order, task.name, origin);
                }
            }
            (Err(e), _) | (_, Err(e)) => println!("  Error reading tasks: {}", e),
        }
        println!();
    }

    // Order density per owner, active tasks only
    println!("--- Order density (active tasks per owner) ---");
    let mut by_owner: BTreeMap<UserId, Vec<&Task>> = BTreeMap::new();
    for task in all_tasks.iter().filter(|t| !t.completed) {
        by_owner.entry(task.owner).or_default().push(task);
    }

    let mut findings = 0;
    for (owner, tasks) in &by_owner {
        let label = profiles
            .iter()
            .find(|p| p.user_id == *owner)
            .map(|p| p.label())
            .unwrap_or_else(|| owner.to_string());

        let mut orders: Vec<u32> = tasks.iter().map(|t| t.order).collect();
        orders.sort_unstable();

        if let Some(first) = orders.first() {
            if *first != 0 {
                println!("  {}: orders start at {} instead of 0", label, first);
                findings += 1;
            }
        }
        for pair in orders.windows(2) {
            if pair[0] == pair[1] {
                println!("  {}: duplicate order {}", label, pair[0]);
                findings += 1;
            } else if pair[1] > pair[0] + 1 {
                println!("  {}: gap between {} and {}", label, pair[0], pair[1]);
                findings += 1;
            }
        }
    }
    if findings == 0 {
        println!("  All dense!");
    }

    println!("\n=== Done ===");
}
