use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use sea_orm::DatabaseConnection;
use serde_json::Value;

use super::{JobError, JobOutput};

/// How a job relates to the store
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobClass {
    /// No connection requirements
    Plain,
    /// Needs a live connection; the dispatcher checks it before running
    PersistenceBound,
}

/// Resources handed to every job run
#[derive(Clone)]
pub struct JobContext {
    pub db: DatabaseConnection,
}

/// A named unit of background work
#[async_trait]
pub trait Job: Send + Sync + 'static {
    fn name(&self) -> &'static str;

    fn class(&self) -> JobClass {
        JobClass::Plain
    }

    async fn run(&self, ctx: &JobContext, args: Value) -> Result<JobOutput, JobError>;
}

/// Job name to handler table
#[derive(Clone, Default)]
pub struct JobRegistry {
    jobs: HashMap<&'static str, Arc<dyn Job>>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a job under its own name, replacing any previous entry
    pub fn register(&mut self, job: impl Job) -> &mut Self {
        let name = job.name();
        if self.jobs.insert(name, Arc::new(job)).is_some() {
            tracing::warn!(job = name, "Job registered twice, keeping the latest handler");
        }
        self
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Job>> {
        self.jobs.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.jobs.contains_key(name)
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.jobs.keys().copied().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Echo;

    #[async_trait]
    impl Job for Echo {
        fn name(&self) -> &'static str {
            "echo"
        }

        async fn run(&self, _ctx: &JobContext, args: Value) -> Result<JobOutput, JobError> {
            Ok(JobOutput::Message(args.to_string()))
        }
    }

    #[test]
    fn test_register_and_lookup() {
        let mut registry = JobRegistry::new();
        registry.register(Echo);
        assert!(registry.contains("echo"));
        assert!(registry.get("missing").is_none());
        let job = registry.get("echo").unwrap();
        assert_eq!(job.class(), JobClass::Plain);
        assert_eq!(registry.names(), vec!["echo"]);
    }

    #[test]
    fn test_register_replaces() {
        let mut registry = JobRegistry::new();
        registry.register(Echo).register(Echo);
        assert_eq!(registry.names().len(), 1);
    }
}
