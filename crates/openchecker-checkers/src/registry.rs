//! Command to checker lookup.

use openchecker_core::Command;
use std::collections::HashMap;
use std::sync::Arc;

use crate::checkers::{
    BinaryChecker, ChangedFilesDetector, DependencyChecker, DependencyUpdateToolChecker,
    DocContentChecker, LanguagesDetector, MaintainersChecker, OatScanner, OsvScanner,
    ReadmeChecker, ReadmeOpensourceChecker, ReleaseChecker, Scancode, SonarScanner, UrlChecker,
};
use crate::{Checker, CheckerContext};

#[derive(Clone, Default)]
pub struct CheckerRegistry {
    checkers: HashMap<Command, Arc<dyn Checker>>,
}

impl CheckerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry with every built-in checker.
    pub fn builtin(ctx: CheckerContext) -> Self {
        let ctx = Arc::new(ctx);
        let mut registry = Self::new();

        registry.register(Arc::new(OsvScanner));
        registry.register(Arc::new(Scancode));
        registry.register(Arc::new(BinaryChecker::new(ctx.clone())));
        registry.register(Arc::new(ReleaseChecker::new(ctx.clone())));
        registry.register(Arc::new(UrlChecker::new(ctx.clone())));
        registry.register(Arc::new(SonarScanner::new(ctx.clone())));
        registry.register(Arc::new(DependencyChecker::new(&ctx)));
        registry.register(Arc::new(ReadmeChecker));
        registry.register(Arc::new(MaintainersChecker));
        registry.register(Arc::new(ReadmeOpensourceChecker));
        registry.register(Arc::new(DocContentChecker::build_doc(ctx.clone())));
        registry.register(Arc::new(DocContentChecker::api_doc(ctx.clone())));
        registry.register(Arc::new(LanguagesDetector));
        registry.register(Arc::new(ChangedFilesDetector));
        registry.register(Arc::new(OatScanner::new(ctx)));
        registry.register(Arc::new(DependencyUpdateToolChecker));

        registry
    }

    /// Register a checker under its own command, replacing any earlier one.
    pub fn register(&mut self, checker: Arc<dyn Checker>) -> Option<Arc<dyn Checker>> {
        self.checkers.insert(checker.command(), checker)
    }

    pub fn get(&self, command: Command) -> Option<Arc<dyn Checker>> {
        self.checkers.get(&command).cloned()
    }

    /// Registered commands in canonical order.
    pub fn commands(&self) -> Vec<Command> {
        Command::ALL
            .into_iter()
            .filter(|c| self.checkers.contains_key(c))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.checkers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.checkers.is_empty()
    }
}

impl std::fmt::Debug for CheckerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CheckerRegistry")
            .field("commands", &self.commands())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{CheckInput, Result};
    use async_trait::async_trait;
    use openchecker_config::{Credentials, ToolsConfig};
    use serde_json::{Value, json};

    struct Fixed(Value);

    #[async_trait]
    impl Checker for Fixed {
        fn command(&self) -> Command {
            Command::ReadmeChecker
        }

        async fn check(&self, _input: &CheckInput<'_>) -> Result<Value> {
            Ok(self.0.clone())
        }
    }

    #[test]
    fn test_builtin_registers_every_command() {
        let ctx = CheckerContext::new(Credentials::default(), ToolsConfig::default()).unwrap();
        let registry = CheckerRegistry::builtin(ctx);

        assert_eq!(registry.len(), Command::ALL.len());
        assert_eq!(registry.commands(), Command::ALL.to_vec());
        for command in Command::ALL {
            assert_eq!(registry.get(command).unwrap().command(), command);
        }
    }

    #[test]
    fn test_register_replaces() {
        let mut registry = CheckerRegistry::new();
        assert!(registry.register(Arc::new(Fixed(json!(1)))).is_none());
        assert!(registry.register(Arc::new(Fixed(json!(2)))).is_some());
        assert_eq!(registry.len(), 1);
        assert!(registry.get(Command::OsvScanner).is_none());
    }
}
