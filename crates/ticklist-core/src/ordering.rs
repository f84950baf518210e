use crate::task::Task;

/// Display order: incomplete tasks first, each group keeping store order.
pub fn project(tasks: &[Task]) -> Vec<Task> {
    let mut projected = tasks.to_vec();
    // sort_by_key is stable, so ties keep their input order.
    projected.sort_by_key(|task| task.completed);
    projected
}
