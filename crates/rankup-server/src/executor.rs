//! Permission command output.
//!
//! The console host has no permission plugin of its own, so rendered
//! promotion commands are written one per line to the host's command
//! stream (stdout in production).

use std::io::Write;

use rankup_core::permissions::{CommandExecutor, PermissionError};
use tracing::debug;

/// Writes each permission command as a line to `W`.
#[derive(Debug)]
pub struct LineExecutor<W> {
    writer: W,
}

impl<W: Write> LineExecutor<W> {
    /// Create an executor writing to `writer`.
    pub const fn new(writer: W) -> Self {
        Self { writer }
    }

    /// The underlying writer.
    pub const fn get_ref(&self) -> &W {
        &self.writer
    }
}

impl<W: Write> CommandExecutor for LineExecutor<W> {
    fn execute(&mut self, command: &str) -> Result<(), PermissionError> {
        writeln!(self.writer, "{command}")
            .and_then(|()| self.writer.flush())
            .map_err(|e| PermissionError::CommandFailed {
                command: command.to_owned(),
                reason: e.to_string(),
            })?;
        debug!(command, "Permission command issued");
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn commands_are_written_one_per_line() {
        let mut executor = LineExecutor::new(Vec::new());
        executor.execute("lp user Steve parent set Regular").unwrap();
        executor.execute("lp user Alex parent set Newbie").unwrap();
        assert_eq!(
            String::from_utf8(executor.get_ref().clone()).unwrap(),
            "lp user Steve parent set Regular\nlp user Alex parent set Newbie\n"
        );
    }

    #[test]
    fn write_failure_becomes_command_failed() {
        struct Broken;
        impl Write for Broken {
            fn write(&mut self, _buf: &[u8]) -> std::io::Result<usize> {
                Err(std::io::Error::other("pipe closed"))
            }
            fn flush(&mut self) -> std::io::Result<()> {
                Ok(())
            }
        }

        let mut executor = LineExecutor::new(Broken);
        let err = executor.execute("lp user Steve parent set Regular").unwrap_err();
        assert!(matches!(err, PermissionError::CommandFailed { .. }));
    }
}
