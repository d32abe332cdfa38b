// Step runner: named, ordered, individually skippable units of work
//
// Steps are registered in declaration order before the run starts and
// the skip set is fixed at construction, so execution order is always
// registration order filtered by the skip set. Step bodies are lazy
// futures: a skipped step is never polled and produces no output.

use async_trait::async_trait;
use futures::future::BoxFuture;
use std::collections::HashSet;
use std::future::Future;
use tracing::{debug, error, info};

use crate::errors::TaskError;

struct Step {
    name: String,
    action: BoxFuture<'static, Result<(), TaskError>>,
}

/// Ordered list of registered steps plus the skip set for one run
pub struct StepRunner {
    steps: Vec<Step>,
    skip: HashSet<String>,
}

impl StepRunner {
    /// Create a runner; the skip set is evaluated here, once, before
    /// any step can run.
    pub fn new<I, S>(skip: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            steps: Vec::new(),
            skip: skip.into_iter().map(Into::into).collect(),
        }
    }

    /// Register a step. Registration order is execution order.
    pub fn register<F>(&mut self, name: impl Into<String>, action: F)
    where
        F: Future<Output = Result<(), TaskError>> + Send + 'static,
    {
        self.steps.push(Step {
            name: name.into(),
            action: Box::pin(action),
        });
    }

    /// Names of the registered steps, in execution order.
    pub fn step_names(&self) -> Vec<&str> {
        self.steps.iter().map(|step| step.name.as_str()).collect()
    }

    /// Execute the registered steps in order, skipping by name. The
    /// first failing step aborts the run; its name is logged before the
    /// error propagates.
    pub async fn run(self) -> Result<(), TaskError> {
        for step in self.steps {
            if self.skip.contains(&step.name) {
                debug!(step = %step.name, "step skipped");
                continue;
            }

            info!(step = %step.name, "running step");
            if let Err(err) = step.action.await {
                error!(step = %step.name, error = %err, "step failed");
                return Err(err);
            }
        }

        Ok(())
    }
}

/// Base contract for a publishing task.
///
/// Concrete tasks override `run` with their own step sequence, usually
/// by building a [`StepRunner`]; the provided default signals that the
/// base task defines no steps.
#[async_trait]
pub trait AmiTask: Send + Sync {
    fn name(&self) -> &str {
        "ami-task"
    }

    async fn run(&self) -> Result<(), TaskError> {
        Err(TaskError::NotImplemented)
    }
}
