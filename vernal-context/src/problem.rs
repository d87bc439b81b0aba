//! Configuration problems are collected during resolution instead of failing immediately, so that
//! multiple independent issues can be reported together.

use crate::error::ContextError;
use derive_more::Display;
#[cfg(test)]
use mockall::automock;
use tracing::warn;

#[derive(Clone, Copy, Eq, PartialEq, Hash, Debug, Display)]
pub enum ProblemKind {
    #[display(fmt = "circular import")]
    CircularImport,
    #[display(fmt = "duplicate factory method")]
    DuplicateFactoryMethod,
    #[display(fmt = "abstract factory method")]
    AbstractFactoryMethod,
}

/// A single configuration problem related to some declaration source.
#[derive(Clone, Eq, PartialEq, Debug, Display)]
#[display(fmt = "{} in '{}': {}", kind, source_name, message)]
pub struct Problem {
    pub kind: ProblemKind,
    pub source_name: String,
    pub message: String,
}

impl Problem {
    /// Reports an attempt by `unit` to import `imported`, which is already on the import stack.
    pub fn circular_import(unit: &str, imported: &str, import_stack: &str) -> Self {
        Self {
            kind: ProblemKind::CircularImport,
            source_name: imported.to_string(),
            message: format!(
                "Illegal attempt by '{unit}' to import '{imported}' as '{imported}' is already present in the current import stack {import_stack}"
            ),
        }
    }
}

/// Sink for configuration problems.
#[cfg_attr(test, automock)]
pub trait ProblemReporter {
    fn error(&mut self, problem: Problem);

    fn warning(&mut self, problem: Problem);
}

/// Reporter remembering all problems, which can then be turned into a single error.
#[derive(Default, Clone, Debug)]
pub struct CollectingProblemReporter {
    errors: Vec<Problem>,
    warnings: Vec<Problem>,
}

impl CollectingProblemReporter {
    #[inline]
    pub fn errors(&self) -> &[Problem] {
        &self.errors
    }

    #[inline]
    pub fn warnings(&self) -> &[Problem] {
        &self.warnings
    }

    /// Fails with all collected errors, if any.
    pub fn into_result(self) -> Result<(), ContextError> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(ContextError::ConfigurationProblems(self.errors))
        }
    }
}

impl ProblemReporter for CollectingProblemReporter {
    fn error(&mut self, problem: Problem) {
        warn!(%problem, "Configuration problem detected.");
        self.errors.push(problem);
    }

    fn warning(&mut self, problem: Problem) {
        warn!(%problem, "Configuration warning.");
        self.warnings.push(problem);
    }
}

#[cfg(test)]
mod tests {
    use crate::error::ContextError;
    use crate::problem::{CollectingProblemReporter, Problem, ProblemKind, ProblemReporter};

    #[test]
    fn should_collect_errors_into_single_error() {
        let mut reporter = CollectingProblemReporter::default();
        reporter.error(Problem::circular_import("a", "b", "[a->b]"));
        reporter.error(Problem::circular_import("c", "d", "[c->d]"));
        reporter.warning(Problem {
            kind: ProblemKind::AbstractFactoryMethod,
            source_name: "e".to_string(),
            message: "".to_string(),
        });

        assert_eq!(reporter.warnings().len(), 1);
        assert!(matches!(
            reporter.into_result().unwrap_err(),
            ContextError::ConfigurationProblems(problems) if problems.len() == 2
        ));
    }

    #[test]
    fn should_pass_without_errors() {
        assert!(CollectingProblemReporter::default().into_result().is_ok());
    }
}
