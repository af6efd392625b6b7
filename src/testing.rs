//! Scripted stand-ins for external tools and the operator.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use crate::device::confirm::Confirm;
use crate::error::Result;
use crate::util::command::{CommandOutput, CommandSpec, Pending, Runner};

type Handler = Box<dyn Fn(&CommandSpec) -> CommandOutput>;

pub struct FakeRunner {
    handler: Handler,
    calls: RefCell<Vec<CommandSpec>>,
    polls_before_done: usize,
    cancelled: Rc<Cell<usize>>,
    dry_run: bool,
}

impl FakeRunner {
    pub fn new(handler: impl Fn(&CommandSpec) -> CommandOutput + 'static) -> Self {
        Self {
            handler: Box::new(handler),
            calls: RefCell::new(Vec::new()),
            polls_before_done: 0,
            cancelled: Rc::new(Cell::new(0)),
            dry_run: false,
        }
    }

    /// Mutating commands are recorded but never reach the handler, the way
    /// `SystemRunner` skips them under dry-run.
    pub fn in_dry_run(mut self) -> Self {
        self.dry_run = true;
        self
    }

    /// Spawned commands stopped through [`Pending::cancel`].
    pub fn cancelled(&self) -> usize {
        self.cancelled.get()
    }

    fn answer(&self, spec: &CommandSpec) -> CommandOutput {
        if self.dry_run && spec.mutating {
            return CommandOutput::default();
        }
        (self.handler)(spec)
    }

    /// Spawned commands report "still running" this many times first.
    pub fn with_polls(mut self, polls: usize) -> Self {
        self.polls_before_done = polls;
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.borrow().iter().map(|spec| spec.to_string()).collect()
    }

    pub fn call_count(&self) -> usize {
        self.calls.borrow().len()
    }

    pub fn count(&self, prefix: &str) -> usize {
        self.calls()
            .iter()
            .filter(|call| call.starts_with(prefix))
            .count()
    }
}

impl Runner for FakeRunner {
    fn run(&self, spec: &CommandSpec) -> Result<CommandOutput> {
        self.calls.borrow_mut().push(spec.clone());
        Ok(self.answer(spec))
    }

    fn spawn(&self, spec: &CommandSpec) -> Result<Box<dyn Pending>> {
        self.calls.borrow_mut().push(spec.clone());
        Ok(Box::new(FakePending {
            remaining: self.polls_before_done,
            output: Some(self.answer(spec)),
            cancelled: Rc::clone(&self.cancelled),
        }))
    }

    fn dry_run(&self) -> bool {
        self.dry_run
    }
}

struct FakePending {
    remaining: usize,
    output: Option<CommandOutput>,
    cancelled: Rc<Cell<usize>>,
}

impl Pending for FakePending {
    fn poll(&mut self) -> Result<Option<CommandOutput>> {
        if self.remaining > 0 {
            self.remaining -= 1;
            return Ok(None);
        }
        Ok(self.output.take())
    }

    fn cancel(&mut self) -> Result<()> {
        self.cancelled.set(self.cancelled.get() + 1);
        self.remaining = 0;
        Ok(())
    }
}

pub fn ok(stdout: &str) -> CommandOutput {
    CommandOutput {
        code: 0,
        stdout: stdout.to_string(),
        stderr: String::new(),
    }
}

pub fn fail(code: i32) -> CommandOutput {
    CommandOutput {
        code,
        stdout: String::new(),
        stderr: "failed".to_string(),
    }
}

pub struct FixedConfirm {
    answer: bool,
    asked: Cell<usize>,
}

impl FixedConfirm {
    pub fn new(answer: bool) -> Self {
        Self {
            answer,
            asked: Cell::new(0),
        }
    }

    pub fn asked(&self) -> usize {
        self.asked.get()
    }
}

impl Confirm for FixedConfirm {
    fn confirm(&self, _prompt: &str) -> Result<bool> {
        self.asked.set(self.asked.get() + 1);
        Ok(self.answer)
    }
}
