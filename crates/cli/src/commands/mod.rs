pub mod check;
pub mod deps;
pub mod find;
pub mod targets;

pub use check::check_command;
pub use deps::{deps_command, project_deps_command};
pub use find::{find_command, projects_command};
pub use targets::targets_command;
