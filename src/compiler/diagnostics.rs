use std::fmt::Display;

use tracing::Level;

use crate::{dyn_event, prelude::*};

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum_macros::Display)]
#[strum(serialize_all = "lowercase")]
pub enum Severity {
    Fatal,
    Warning,
}

impl Severity {
    fn level(self) -> Level {
        match self {
            Severity::Fatal => Level::ERROR,
            Severity::Warning => Level::WARN,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub severity: Severity,
    pub position: Position,
    pub message: String,
}

impl Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}:{}:{}: {}",
            self.severity, self.position.line, self.position.column, self.message
        )
    }
}

/// User-facing problems, in the order they were reported. Passes keep going
/// after reporting so one run surfaces every independent error.
#[derive(Debug, Default, Clone)]
pub struct Diagnostics {
    reported: Vec<Diagnostic>,
    saw_fatal: bool,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fatal(&mut self, position: Position, message: impl Into<String>) {
        self.saw_fatal = true;
        self.report(Severity::Fatal, position, message.into());
    }

    pub fn warn(&mut self, position: Position, message: impl Into<String>) {
        self.report(Severity::Warning, position, message.into());
    }

    fn report(&mut self, severity: Severity, position: Position, message: String) {
        let level = severity.level();
        dyn_event!(level, "{severity}:{position}: {message}");
        self.reported.push(Diagnostic {
            severity,
            position,
            message,
        });
    }

    pub fn has_fatal(&self) -> bool {
        self.saw_fatal
    }

    pub fn len(&self) -> usize {
        self.reported.len()
    }

    pub fn is_empty(&self) -> bool {
        self.reported.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.reported.iter()
    }

    pub fn messages(&self) -> Vec<&str> {
        self.reported.iter().map(|d| d.message.as_str()).collect()
    }
}

impl Display for Diagnostics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for diagnostic in &self.reported {
            writeln!(f, "{diagnostic}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn warnings_do_not_count_as_fatal() {
        let mut diagnostics = Diagnostics::new();
        diagnostics.warn(Position::new(1, 2), "integer literal too large; using max value");
        assert!(!diagnostics.has_fatal());

        diagnostics.fatal(Position::new(3, 4), "Undeclared identifier");
        assert!(diagnostics.has_fatal());
        assert_eq!(diagnostics.len(), 2);
    }

    #[test]
    fn renders_one_line_per_diagnostic() {
        let mut diagnostics = Diagnostics::new();
        diagnostics.fatal(Position::PROGRAM, "No main function");
        diagnostics.warn(Position::new(7, 1), "Struct variables unsupported");

        insta::assert_snapshot!(diagnostics.to_string(), @r###"
        fatal:0:0: No main function
        warning:7:1: Struct variables unsupported
        "###);
    }
}
