//! Script discovery and invocation.
//!
//! Build and test scripts are opaque external programs: the workflow only
//! locates them, runs them with a fixed argument contract, and observes
//! the exit status.

pub mod executor;
pub mod finder;
pub mod shell;
pub mod subprocess;

pub use executor::{ScriptError, ScriptExecutor, ScriptInput, ScriptOutput};
pub use finder::ScriptFinder;
pub use shell::ShellExecutor;

/// Shared test helpers for executor tests.
#[cfg(test)]
pub(crate) mod test_helpers {
    use std::io::Write;
    use std::time::Duration;

    use super::executor::ScriptInput;

    /// No args, no env vars, the system temp dir, and a 5-second timeout.
    pub fn default_input() -> ScriptInput {
        ScriptInput::new(std::env::temp_dir(), Duration::from_secs(5))
    }

    /// Create a temporary bash script from the given body.
    pub fn write_temp_script(body: &str) -> tempfile::NamedTempFile {
        let mut f = tempfile::Builder::new()
            .suffix(".sh")
            .tempfile()
            .expect("create temp file");
        writeln!(f, "#!/bin/bash").expect("write shebang");
        write!(f, "{body}").expect("write body");
        f.flush().expect("flush");
        f
    }
}
