//! Continue/abort decisions after a failed task
//!
//! The executor stops at a failed task and asks a [`FailurePolicy`] what to
//! do. Returning `None` means no decision could be made (non-interactive
//! session, cancelled prompt) and is treated as [`Decision::Abort`].

use super::error::TaskError;
use crate::recipe::RecipeTask;
use std::collections::VecDeque;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Continue,
    Abort,
}

/// What the policy is told about a failure.
#[derive(Debug)]
pub struct TaskFailure<'a> {
    /// Zero-based position of the task in the recipe
    pub index: usize,
    pub total: usize,
    pub task: &'a RecipeTask,
    pub error: &'a TaskError,
}

impl TaskFailure<'_> {
    /// The answer a prompt should suggest by default.
    pub fn recommended(&self) -> Decision {
        Decision::Abort
    }
}

pub trait FailurePolicy {
    fn decide(&mut self, failure: &TaskFailure<'_>) -> Option<Decision>;
}

impl<F> FailurePolicy for F
where
    F: FnMut(&TaskFailure<'_>) -> Option<Decision>,
{
    fn decide(&mut self, failure: &TaskFailure<'_>) -> Option<Decision> {
        self(failure)
    }
}

/// Abort on the first failure.
#[derive(Debug, Default, Clone, Copy)]
pub struct AlwaysAbort;

impl FailurePolicy for AlwaysAbort {
    fn decide(&mut self, _failure: &TaskFailure<'_>) -> Option<Decision> {
        Some(Decision::Abort)
    }
}

/// Continue past every failure.
#[derive(Debug, Default, Clone, Copy)]
pub struct AlwaysContinue;

impl FailurePolicy for AlwaysContinue {
    fn decide(&mut self, _failure: &TaskFailure<'_>) -> Option<Decision> {
        Some(Decision::Continue)
    }
}

/// Answers from a fixed queue; `None` once it runs dry.
#[derive(Debug, Default, Clone)]
pub struct Scripted {
    answers: VecDeque<Decision>,
    asked: Vec<usize>,
}

impl Scripted {
    pub fn new(answers: impl IntoIterator<Item = Decision>) -> Self {
        Self {
            answers: answers.into_iter().collect(),
            asked: Vec::new(),
        }
    }

    /// Indices of the tasks the policy was consulted for, in order.
    pub fn asked(&self) -> &[usize] {
        &self.asked
    }
}

impl FailurePolicy for Scripted {
    fn decide(&mut self, failure: &TaskFailure<'_>) -> Option<Decision> {
        self.asked.push(failure.index);
        self.answers.pop_front()
    }
}
