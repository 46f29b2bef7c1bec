// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Interactive questions, injectable so headless callers can answer them.

use crate::error::{CredentialError, Result};
use crate::secret::Secret;
use std::cell::RefCell;
use std::collections::VecDeque;
use std::io::{BufRead, Write};
use std::process::{Command, Stdio};

pub trait Prompter {
    fn confirm(&self, question: &str) -> Result<bool>;
    fn secret_input(&self, question: &str) -> Result<Secret>;
    fn text_input(&self, question: &str) -> Result<String>;
}

/// Prompts on stderr and reads answers from stdin. Blocks without timeout.
#[derive(Debug, Default, Clone, Copy)]
pub struct ConsolePrompter;

impl ConsolePrompter {
    fn ask(question: &str) -> Result<String> {
        eprint!("{question}");
        std::io::stderr().flush()?;
        let mut buf = String::new();
        let read = std::io::stdin().lock().read_line(&mut buf)?;
        if read == 0 {
            return Err(CredentialError::Prompt("stdin closed".to_string()));
        }
        Ok(buf.trim_end_matches(['\r', '\n']).to_string())
    }

    /// Toggle terminal echo through `stty`; a no-op when stdin is not a terminal.
    fn set_echo(enabled: bool) {
        let _ = Command::new("stty")
            .arg(if enabled { "echo" } else { "-echo" })
            .stdin(Stdio::inherit())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status();
    }
}

impl Prompter for ConsolePrompter {
    fn confirm(&self, question: &str) -> Result<bool> {
        let answer = Self::ask(&format!("{question} [y/N] "))?;
        Ok(matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes"))
    }

    fn secret_input(&self, question: &str) -> Result<Secret> {
        Self::set_echo(false);
        let answer = Self::ask(question);
        Self::set_echo(true);
        eprintln!();
        answer.map(Secret::new)
    }

    fn text_input(&self, question: &str) -> Result<String> {
        Self::ask(question).map(|s| s.trim().to_string())
    }
}

/// Answers from a queue, for tests and scripted runs.
#[derive(Debug, Default)]
pub struct ScriptedPrompter {
    confirms: RefCell<VecDeque<bool>>,
    secrets: RefCell<VecDeque<Secret>>,
    texts: RefCell<VecDeque<String>>,
    asked: RefCell<Vec<String>>,
}

impl ScriptedPrompter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn confirm_with(self, answer: bool) -> Self {
        self.confirms.borrow_mut().push_back(answer);
        self
    }

    pub fn secret(self, answer: &str) -> Self {
        self.secrets.borrow_mut().push_back(Secret::new(answer));
        self
    }

    pub fn text(self, answer: &str) -> Self {
        self.texts.borrow_mut().push_back(answer.to_string());
        self
    }

    /// Questions asked so far, in order.
    pub fn asked(&self) -> Vec<String> {
        self.asked.borrow().clone()
    }

    fn record(&self, question: &str) {
        self.asked.borrow_mut().push(question.to_string());
    }

    fn exhausted(question: &str) -> CredentialError {
        CredentialError::Prompt(format!("no scripted answer for: {question}"))
    }
}

impl Prompter for ScriptedPrompter {
    fn confirm(&self, question: &str) -> Result<bool> {
        self.record(question);
        self.confirms
            .borrow_mut()
            .pop_front()
            .ok_or_else(|| Self::exhausted(question))
    }

    fn secret_input(&self, question: &str) -> Result<Secret> {
        self.record(question);
        self.secrets
            .borrow_mut()
            .pop_front()
            .ok_or_else(|| Self::exhausted(question))
    }

    fn text_input(&self, question: &str) -> Result<String> {
        self.record(question);
        self.texts
            .borrow_mut()
            .pop_front()
            .ok_or_else(|| Self::exhausted(question))
    }
}

/// Declines every confirmation and refuses input requests.
#[derive(Debug, Default, Clone, Copy)]
pub struct NonInteractivePrompter;

impl Prompter for NonInteractivePrompter {
    fn confirm(&self, question: &str) -> Result<bool> {
        tracing::debug!(question, "non-interactive: declining");
        Ok(false)
    }

    fn secret_input(&self, question: &str) -> Result<Secret> {
        Err(CredentialError::Prompt(format!("input required in non-interactive mode: {question}")))
    }

    fn text_input(&self, question: &str) -> Result<String> {
        Err(CredentialError::Prompt(format!("input required in non-interactive mode: {question}")))
    }
}
