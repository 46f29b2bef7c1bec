// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Command execution for the `gk` binary.
#![allow(clippy::disallowed_methods)] // CLI is allowed to print to stdout/stderr

use crate::{Cli, Commands, ACCOUNT_ENV, TOKEN_ENV};
use anyhow::{bail, Context, Result};
use gk_core::{
    clone_repository, Collaborators, GkConfig, LocalFileSystem, PushOutcome, SyncConfig, SyncOrchestrator,
    TomlSettingsStore,
};
use gk_credentials::{ConsolePrompter, KeyctlVault, Prompter, Secret};
use gk_repo::{BranchLifecycle, CommitRecord, Identity, Listing, ProcessRunner};

/// Confirms every question, delegating input requests.
pub struct AssumeYes<'a>(pub &'a dyn Prompter);

impl Prompter for AssumeYes<'_> {
    fn confirm(&self, question: &str) -> gk_credentials::Result<bool> {
        tracing::debug!(question, "confirmed by flag");
        Ok(true)
    }

    fn secret_input(&self, question: &str) -> gk_credentials::Result<Secret> {
        self.0.secret_input(question)
    }

    fn text_input(&self, question: &str) -> gk_credentials::Result<String> {
        self.0.text_input(question)
    }
}

fn env_value(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}

pub fn run(cli: Cli) -> Result<()> {
    let app = GkConfig::load(cli.config.as_deref(), cli.to_json_overrides())?;
    let cwd = std::env::current_dir().context("reading current directory")?;
    let target = cli.target(&cwd);

    if let Some(url) = &target.url {
        if !target.path.exists() {
            let parent = target.path.parent().unwrap_or(&cwd);
            let runner = ProcessRunner::new(&app.program, parent);
            clone_repository(&runner, url, &target.path)?;
        }
    }
    if cli.init && !target.path.exists() {
        std::fs::create_dir_all(&target.path)
            .with_context(|| format!("creating {}", target.path.display()))?;
    }

    let identity = Identity {
        name: cli.author.clone(),
        email: cli.email.clone(),
    };
    let config = SyncConfig {
        repo_path: target.path.clone(),
        remote_url: target.url.clone(),
        identity: (!identity.is_empty()).then_some(identity),
        token: None,
        env_token: env_value(TOKEN_ENV).map(Secret::new),
        env_account: env_value(ACCOUNT_ENV),
        app,
    };

    let runner = ProcessRunner::new(&config.app.program, &target.path);
    let vault = KeyctlVault::default();
    let console = ConsolePrompter;
    let assume_yes = AssumeYes(&console);
    let prompter: &dyn Prompter = if cli.init { &assume_yes } else { &console };
    let settings_path = TomlSettingsStore::default_path().context("no configuration directory on this platform")?;
    let settings = TomlSettingsStore::new(settings_path);

    let mut sync = SyncOrchestrator::new(
        config,
        Collaborators {
            runner: &runner,
            vault: &vault,
            prompter,
            settings: &settings,
            filesystem: &LocalFileSystem,
        },
    );
    sync.init()?;

    let scope = cli.identity_scope();
    match cli.command {
        Commands::Push { message, force, yes, .. } => push(&mut sync, &console, message.as_deref(), force, yes),
        Commands::Pull { branch: None } => {
            print_text(&sync.pull()?);
            Ok(())
        }
        Commands::Pull { branch: Some(branch) } => {
            let lifecycle = sync.pull_branch(&branch)?;
            println!("{branch}: {lifecycle:?}");
            Ok(())
        }
        Commands::Status { .. } => {
            let snapshot = sync.status()?;
            print_text(&snapshot.raw);
            let state = sync.state();
            println!(
                "commit needed: {}, push needed: {}",
                state.commit_needed, state.push_needed
            );
            Ok(())
        }
        Commands::Commit { message, .. } => {
            if sync.commit(message.as_deref())? {
                println!("committed");
            } else {
                println!("nothing to commit");
            }
            Ok(())
        }
        Commands::Add { .. } => sync.add().map_err(Into::into),
        Commands::Log { last: true, json, .. } => {
            let records: Vec<CommitRecord> = sync.last_commit().into_iter().collect();
            print_records(&records, json)
        }
        Commands::Log {
            last: false,
            revision,
            json,
        } => print_records(&sync.history(revision.as_deref()), json),
        Commands::Branch { name, delete: true, .. } => {
            if !sync.delete_branch(&name)? {
                println!("kept {name}");
            }
            Ok(())
        }
        Commands::Branch {
            name, from: Some(source), ..
        } => {
            let lifecycle = sync.create_branch_from(&name, &source)?;
            println!("{name}: {lifecycle:?}");
            Ok(())
        }
        Commands::Branch { name, create, .. } => {
            let lifecycle = sync.branch(&name, create)?;
            println!("{name}: {lifecycle:?}");
            Ok(())
        }
        Commands::Merge { from, into } => {
            let into = into.unwrap_or_else(|| sync.config().app.trunk.clone());
            let result = sync.merge(&from, &into);
            report_merge(&into, result)?;
            println!("merged {from} into {into}");
            Ok(())
        }
        Commands::CatchUp { branch } => {
            let result = sync.merge_main_into(&branch);
            report_merge(&branch, result)?;
            println!("{branch} is up to date with {}", sync.config().app.trunk);
            Ok(())
        }
        Commands::Sources { .. } => {
            match sync.merge_sources()? {
                Listing::Available(refs) => {
                    for (name, entry) in refs {
                        println!("{}\t{:?}\t{name}\t{}", entry.id, entry.kind, entry.path);
                    }
                }
                Listing::Unavailable { diagnostic } => bail!("remote refs unavailable: {diagnostic}"),
            }
            Ok(())
        }
        Commands::Identity { .. } => {
            let identity = sync.state().user_identity.clone();
            sync.set_identity(identity, scope.unwrap_or_default())?;
            Ok(())
        }
    }
}

fn push(
    sync: &mut SyncOrchestrator<'_>,
    console: &dyn Prompter,
    message: Option<&str>,
    force: bool,
    yes: bool,
) -> Result<()> {
    match sync.push(message, force) {
        Ok(outcome) => {
            report_push(outcome);
            Ok(())
        }
        Err(err) if err.is_rejected_push() => {
            eprintln!("{err}");
            if yes || console.confirm("The remote has diverged. Force push?")? {
                report_push(sync.push(message, true)?);
                Ok(())
            } else {
                bail!("push rejected; pull and merge before pushing again")
            }
        }
        Err(err) => Err(err.into()),
    }
}

fn report_merge(target: &str, result: gk_core::Result<BranchLifecycle>) -> Result<()> {
    match result {
        Ok(_) => Ok(()),
        Err(err) => {
            if let Some(lifecycle) = err.merge_lifecycle() {
                eprintln!("{target}: {lifecycle:?}; resolve the conflicts and commit before retrying");
            }
            Err(err.into())
        }
    }
}

fn report_push(outcome: PushOutcome) {
    match (outcome.committed, outcome.pushed) {
        (true, true) => println!("committed and pushed"),
        (false, true) => println!("pushed"),
        (true, false) => println!("committed"),
        (false, false) => println!("everything up to date"),
    }
}

fn print_text(text: &str) {
    let text = text.trim_end();
    if !text.is_empty() {
        println!("{text}");
    }
}

fn print_record(record: &CommitRecord) {
    println!("commit {}", record.id);
    if let Some(parents) = &record.parent_merge_ids {
        println!("Merge: {}", parents.join(" "));
    }
    if let Some(author) = &record.author {
        println!("Author: {author}");
    }
    if let Some(timestamp) = &record.timestamp {
        println!("Date:   {timestamp}");
    }
    println!();
    if let Some(message) = &record.message {
        println!("    {message}");
    }
    for line in &record.description_lines {
        println!("    {line}");
    }
    println!();
}

fn print_records(records: &[CommitRecord], as_json: bool) -> Result<()> {
    if as_json {
        println!("{}", serde_json::to_string_pretty(records)?);
    } else {
        records.iter().for_each(print_record);
    }
    Ok(())
}
