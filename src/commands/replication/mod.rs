mod psync;
mod replconf;

pub use psync::psync;
pub use replconf::{replconf, ReplconfArguments};
