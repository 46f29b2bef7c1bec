// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Scripted command runner for scenario tests.

use crate::error::VcsResult;
use crate::runner::{ensure_invokes_program, CommandOutput, CommandRunner, VcsCommand, GIT};
use std::cell::RefCell;
use std::collections::VecDeque;

struct Rule {
    prefix: Vec<String>,
    responses: VecDeque<CommandOutput>,
}

type Observer = Box<dyn Fn(&VcsCommand)>;

/// Replays canned outputs keyed by argument prefix and records every call.
///
/// The longest matching prefix wins. Each rule's responses are consumed in
/// order and the last one repeats. Unscripted commands succeed with empty
/// output. The program guard still applies.
#[derive(Default)]
pub struct ScriptedRunner {
    rules: RefCell<Vec<Rule>>,
    calls: RefCell<Vec<VcsCommand>>,
    observers: Vec<Observer>,
}

impl ScriptedRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue `output` for commands whose arguments start with `prefix`.
    pub fn on(self, prefix: &[&str], output: CommandOutput) -> Self {
        {
            let mut rules = self.rules.borrow_mut();
            let prefix: Vec<String> = prefix.iter().map(|s| s.to_string()).collect();
            match rules.iter_mut().find(|rule| rule.prefix == prefix) {
                Some(rule) => rule.responses.push_back(output),
                None => rules.push(Rule {
                    prefix,
                    responses: VecDeque::from([output]),
                }),
            }
        }
        self
    }

    /// Run `observer` on every accepted command before answering it.
    pub fn observe(mut self, observer: impl Fn(&VcsCommand) + 'static) -> Self {
        self.observers.push(Box::new(observer));
        self
    }

    pub fn calls(&self) -> Vec<VcsCommand> {
        self.calls.borrow().clone()
    }

    /// Recorded command lines, e.g. `"git push"`.
    pub fn command_lines(&self) -> Vec<String> {
        self.calls.borrow().iter().map(VcsCommand::display).collect()
    }

    pub fn count(&self, prefix: &[&str]) -> usize {
        self.calls
            .borrow()
            .iter()
            .filter(|cmd| cmd.has_args_prefix(prefix))
            .count()
    }

    fn respond(&self, command: &VcsCommand) -> CommandOutput {
        let mut rules = self.rules.borrow_mut();
        let best = rules
            .iter_mut()
            .filter(|rule| {
                let prefix: Vec<&str> = rule.prefix.iter().map(String::as_str).collect();
                command.has_args_prefix(&prefix)
            })
            .max_by_key(|rule| rule.prefix.len());

        match best {
            Some(rule) if rule.responses.len() > 1 => rule.responses.pop_front().unwrap_or_default(),
            Some(rule) => rule.responses.front().cloned().unwrap_or_default(),
            None => CommandOutput::ok(""),
        }
    }
}

impl CommandRunner for ScriptedRunner {
    fn run(&self, command: &VcsCommand) -> VcsResult<CommandOutput> {
        ensure_invokes_program(command, GIT)?;
        for observer in &self.observers {
            observer(command);
        }
        self.calls.borrow_mut().push(command.clone());
        Ok(self.respond(command))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::VcsError;

    #[test]
    fn replays_in_order_then_repeats_last() {
        let runner = ScriptedRunner::new()
            .on(&["status"], CommandOutput::ok("first"))
            .on(&["status"], CommandOutput::ok("second"));

        let status = VcsCommand::git(["status"]);
        assert_eq!(runner.run(&status).unwrap().output, "first");
        assert_eq!(runner.run(&status).unwrap().output, "second");
        assert_eq!(runner.run(&status).unwrap().output, "second");
        assert_eq!(runner.count(&["status"]), 3);
    }

    #[test]
    fn longest_prefix_wins() {
        let runner = ScriptedRunner::new()
            .on(&["branch"], CommandOutput::ok("generic"))
            .on(&["branch", "--remotes"], CommandOutput::ok("origin/main"));
        let out = runner.run(&VcsCommand::git(["branch", "--remotes"])).unwrap();
        assert_eq!(out.output, "origin/main");
    }

    #[test]
    fn guard_still_applies() {
        let runner = ScriptedRunner::new();
        let err = runner.run(&VcsCommand::raw(["curl", "example.com"])).unwrap_err();
        assert!(matches!(err, VcsError::InvalidCommand { .. }));
        assert!(runner.calls().is_empty());
    }
}
