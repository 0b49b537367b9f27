use uuid::Uuid;

use crate::core::task::Task;

/// Move one entry and renumber every position to match the new arrangement.
///
/// Positions come out dense and 0-based whatever they were before, and the
/// returned `(id, order)` pairs cover exactly the entries whose position
/// changed, ready for one batched write. `None` when the indices do not
/// describe a move: out of range, or source equals destination.
pub fn reindex(tasks: &[Task], from: usize, to: usize) -> Option<(Vec<Task>, Vec<(Uuid, u32)>)> {
    if from == to || from >= tasks.len() || to >= tasks.len() {
        return None;
    }

    let mut reordered = tasks.to_vec();
    let moved = reordered.remove(from);
    reordered.insert(to, moved);

    let mut changes = Vec::new();
    for (index, task) in reordered.iter_mut().enumerate() {
        let order = index as u32;
        if task.order != order {
            task.order = order;
            changes.push((task.id, order));
        }
    }
    Some((reordered, changes))
}
