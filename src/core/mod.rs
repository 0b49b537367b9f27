pub mod category;
pub mod habit;
pub mod note;
pub mod profile;
pub mod task;
