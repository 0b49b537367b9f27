pub mod category;
pub mod habit;
pub mod note;
pub mod profile;
pub mod task;

pub use category::CategoryService;
pub use habit::HabitService;
pub use note::NoteService;
pub use profile::ProfileService;
pub use task::TaskService;
