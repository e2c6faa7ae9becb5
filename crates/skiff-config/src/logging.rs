use strum::{Display, EnumString};

/// Minimum severity applied to each configured log module.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, EnumString, Display)]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum Severity {
    /// Everything, including per-iteration chatter.
    Trace,
    /// Developer diagnostics.
    Debug,
    /// Lifecycle milestones.
    #[default]
    Info,
    /// Recoverable problems.
    #[strum(to_string = "warn", serialize = "warning")]
    Warn,
    /// Failures.
    #[strum(to_string = "error", serialize = "critical")]
    Error,
}

impl Severity {
    /// Lowercase level name understood by tracing filter directives.
    #[must_use]
    pub const fn as_directive(self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}

/// Errors encountered while parsing a [`Severity`] from text.
pub type SeverityParseError = strum::ParseError;

/// Logger configuration applied once at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogSettings {
    /// Minimum severity for every listed module.
    pub level: Severity,
    /// Modules that receive `level`; anything else stays silent.
    pub modules: Vec<String>,
    /// Whether to colour the level with ANSI escapes.
    pub color: bool,
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case("info", Severity::Info)]
    #[case("DEBUG", Severity::Debug)]
    #[case("warning", Severity::Warn)]
    #[case("warn", Severity::Warn)]
    #[case("critical", Severity::Error)]
    #[case("Trace", Severity::Trace)]
    fn parses_severity_names(#[case] input: &str, #[case] expected: Severity) {
        let parsed: Severity = input.parse().expect("severity should parse");
        assert_eq!(parsed, expected);
    }

    #[test]
    fn rejects_unknown_severity() {
        assert!("verbose".parse::<Severity>().is_err());
    }

    #[test]
    fn display_matches_directive_name() {
        for severity in [
            Severity::Trace,
            Severity::Debug,
            Severity::Info,
            Severity::Warn,
            Severity::Error,
        ] {
            assert_eq!(severity.to_string(), severity.as_directive());
        }
    }
}
