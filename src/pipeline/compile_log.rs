use std::fmt;

const ERROR_TAG: &str = "ERROR:";

/// One `ERROR:` line of a driver info log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompileError {
    /// Source line, when the driver reported one as `<string>:<line>`.
    pub line: Option<usize>,
    pub message: String,
}

impl CompileError {
    fn parse(text: &str) -> Self {
        let body = text[ERROR_TAG.len()..].trim();
        // "0:12: 'token' : message"
        let mut parts = body.splitn(3, ':');
        let (string, line, rest) = (parts.next(), parts.next(), parts.next());
        let line = match (string, line) {
            (Some(s), Some(l)) if s.trim().parse::<u32>().is_ok() => l.trim().parse().ok(),
            _ => None,
        };
        let message = match (line, rest) {
            (Some(_), Some(rest)) => rest.trim().to_string(),
            _ => body.to_string(),
        };
        Self { line, message }
    }
}

/// The info log of one compile attempt, raw and parsed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompileLog {
    raw: String,
    errors: Vec<CompileError>,
}

impl CompileLog {
    pub fn parse(raw: impl Into<String>) -> Self {
        let raw = raw.into();
        let errors = raw
            .lines()
            .map(str::trim_start)
            .filter(|l| l.starts_with(ERROR_TAG))
            .map(CompileError::parse)
            .collect();
        Self { raw, errors }
    }

    pub fn raw(&self) -> &str {
        &self.raw
    }

    pub fn errors(&self) -> &[CompileError] {
        &self.errors
    }

    /// Number of `ERROR:`-tagged lines. Summary trailers are not counted.
    pub fn error_count(&self) -> usize {
        self.errors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.raw.trim().is_empty()
    }
}

impl fmt::Display for CompileLog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_only_error_lines() {
        let log = CompileLog::parse(
            "WARNING: 0:1: extension not supported\n\
             ERROR: 0:4: Unknown variable: gl_FragColor\n\
             ERROR: 0:9: Expected Semicolon, found RightBrace\n\
             2 compilation errors.  No code generated.\n",
        );
        assert_eq!(log.error_count(), 2);
        assert_eq!(log.errors()[0].line, Some(4));
        assert_eq!(log.errors()[0].message, "Unknown variable: gl_FragColor");
        assert_eq!(log.errors()[1].line, Some(9));
    }

    #[test]
    fn empty_log_is_clean() {
        let log = CompileLog::parse("");
        assert!(log.is_empty());
        assert_eq!(log.error_count(), 0);
        assert_eq!(log.to_string(), "");
    }

    #[test]
    fn errors_without_a_location_keep_their_text() {
        let log = CompileLog::parse("ERROR: Missing entry point\n");
        assert_eq!(log.error_count(), 1);
        assert_eq!(log.errors()[0].line, None);
        assert_eq!(log.errors()[0].message, "Missing entry point");
    }
}
