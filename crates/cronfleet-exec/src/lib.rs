//! Shell execution core.
//!
//! Runs one command to completion or cancellation. The command is materialised as a temporary
//! script, launched in its own process group and its combined stdout/stderr is streamed into an
//! [`OutputBuffer`] as it arrives, so a cancelled run still returns everything it printed.

mod error;
pub use error::ExecError;

mod entity;
pub use entity::{clean_html_entities, contains_html_entity};

mod buffer;
pub use buffer::OutputBuffer;

mod shell;
pub use shell::{ShellOutput, exec_shell, exec_shell_with_buffer};

mod util;

pub mod prelude {
    pub use crate::error::ExecError;
    pub use crate::{OutputBuffer, ShellOutput, exec_shell, exec_shell_with_buffer};
}
