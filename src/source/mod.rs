// Raw source readers: kernel files and diagnostic command output. No metric state lives here.

mod command;
mod fs;

pub use command::{CommandRunner, DEFAULT_COMMAND_TIMEOUT, SystemCommand};
pub use fs::{FileSystem, MemoryFs, RealFs};
