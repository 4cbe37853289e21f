mod empty;
mod reader;

pub use empty::empty_snapshot;
pub use reader::{load_snapshot, parse_snapshot};
