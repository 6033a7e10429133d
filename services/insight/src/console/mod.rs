pub mod command;
pub mod explorer;
pub mod render;
pub mod session;
pub mod state;

pub use command::{parse_command, BrowseTarget, Command, CommandError};
pub use explorer::{Browsed, ExplorerPage};
pub use session::{ConsoleSession, Outcome};
pub use state::AppState;
