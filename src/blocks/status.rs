use std::error::Error as _;

use super::BlockError;

/// Error state shown on a block.
///
/// Configuration errors come from the block's settings (for example an
/// equation that fails to parse) and stay until the block is reconfigured.
/// A runtime error comes from the last update and is cleared by the next
/// successful one.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Status {
    configuration: Vec<BlockError>,
    runtime: Option<BlockError>,
}

impl Status {
    #[must_use]
    pub fn has_error(&self) -> bool {
        !self.configuration.is_empty() || self.runtime.is_some()
    }

    /// All recorded errors joined into one line, with their causes.
    #[must_use]
    pub fn message(&self) -> Option<String> {
        let messages: Vec<String> = self
            .configuration
            .iter()
            .chain(&self.runtime)
            .map(describe)
            .collect();
        (!messages.is_empty()).then(|| messages.join("; "))
    }

    #[must_use]
    pub fn configuration_errors(&self) -> &[BlockError] {
        &self.configuration
    }

    #[must_use]
    pub fn runtime_error(&self) -> Option<&BlockError> {
        self.runtime.as_ref()
    }

    pub(crate) fn set_configuration_errors(&mut self, errors: Vec<BlockError>) {
        self.configuration = errors;
    }

    pub(crate) fn record_runtime(&mut self, error: BlockError) {
        self.runtime = Some(error);
    }

    pub(crate) fn clear_runtime(&mut self) {
        self.runtime = None;
    }
}

fn describe(error: &BlockError) -> String {
    let mut message = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::support::equation::EvalError;

    #[test]
    fn runtime_errors_clear() {
        let mut status = Status::default();
        assert!(!status.has_error());
        assert_eq!(status.message(), None);

        status.record_runtime(EvalError::UnboundVariable("k".into()).into());
        assert!(status.has_error());
        assert_eq!(
            status.message().as_deref(),
            Some("evaluation failed: unbound variable `k`")
        );

        status.clear_runtime();
        assert!(!status.has_error());
    }

    #[test]
    fn configuration_errors_persist() {
        let mut status = Status::default();
        status.set_configuration_errors(vec![BlockError::EquationSyntax { text: "xy".into() }]);
        status.clear_runtime();
        assert!(status.has_error());
        assert_eq!(status.message().as_deref(), Some("equation `xy` has no `=`"));
    }
}
