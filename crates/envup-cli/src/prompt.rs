//! Terminal implementation of the interactive selector.

use std::io::{BufRead, IsTerminal, Write};

use envup_core::local::FileStore;
use envup_core::select::Selector;
use envup_core::{EnvUpError, Result};

pub struct PromptSelector<'a> {
    store: &'a FileStore,
}

impl<'a> PromptSelector<'a> {
    pub fn new(store: &'a FileStore) -> Self {
        Self { store }
    }
}

impl Selector for PromptSelector<'_> {
    fn choose_application(&self, prompt: &str) -> Result<String> {
        let apps = self.store.list_applications()?;
        choose(prompt, None, &apps, "no applications found in .envup/apps")
    }

    fn choose_environment(&self, prompt: &str, help: &str, app: &str) -> Result<String> {
        let envs: Vec<String> = self
            .store
            .load_application(app)?
            .environments
            .into_iter()
            .map(|e| e.name)
            .collect();
        choose(
            prompt,
            Some(help),
            &envs,
            &format!("no environments found in application {app}"),
        )
    }
}

/// Single options are taken without asking. Otherwise the options are listed
/// and a number is read from stdin.
fn choose(prompt: &str, help: Option<&str>, options: &[String], empty: &str) -> Result<String> {
    match options {
        [] => return Err(EnvUpError::Validation(empty.to_string())),
        [only] => return Ok(only.clone()),
        _ => {}
    }
    if !std::io::stdin().is_terminal() {
        return Err(EnvUpError::Validation(format!(
            "{prompt} (no terminal to prompt on; pass the value as a flag)"
        )));
    }

    let mut stderr = std::io::stderr();
    writeln!(stderr, "{prompt}")?;
    if let Some(help) = help {
        writeln!(stderr, "  {}", help.replace('\n', "\n  "))?;
    }
    for (i, option) in options.iter().enumerate() {
        writeln!(stderr, "  {}) {option}", i + 1)?;
    }
    write!(stderr, "> ")?;
    stderr.flush()?;

    let mut line = String::new();
    std::io::stdin().lock().read_line(&mut line)?;
    parse_choice(line.trim(), options)
}

fn parse_choice(input: &str, options: &[String]) -> Result<String> {
    if let Some(found) = options.iter().find(|o| o.as_str() == input) {
        return Ok(found.clone());
    }
    input
        .parse::<usize>()
        .ok()
        .and_then(|n| n.checked_sub(1))
        .and_then(|i| options.get(i))
        .cloned()
        .ok_or_else(|| EnvUpError::Validation(format!("invalid choice '{input}'")))
}
