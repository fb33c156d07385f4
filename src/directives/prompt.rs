//! `{% prompt title label default cacheKey isSecret defaultToCachedValue %}`

use std::io::{self, BufRead, Write};
use std::time::Duration;

use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode};
use dialoguer::console::Term;
use dialoguer::Input;
use futures::future::BoxFuture;
use tracing::debug;

use super::{Directive, DirectiveContext};
use crate::cache::CacheSetOptions;
use crate::errors::{ReqchainError, Result};
use crate::signals;

/// Remembered answers expire after this long
pub const PROMPT_CACHE_TTL: Duration = Duration::from_secs(60);

const PROMPT_ARGS: usize = 6;

/// What to ask the operator
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptRequest<'a> {
    pub title: &'a str,
    pub label: &'a str,
    pub default: &'a str,
    pub secret: bool,
}

/// Source of operator input
pub trait Prompter: Send + Sync {
    /// One line of input; an empty answer is returned as-is
    fn prompt(&self, request: &PromptRequest<'_>) -> Result<String>;
}

/// Reads from the controlling terminal (stderr for output)
#[derive(Debug, Default, Clone, Copy)]
pub struct TerminalPrompter;

impl Prompter for TerminalPrompter {
    fn prompt(&self, request: &PromptRequest<'_>) -> Result<String> {
        let message = if request.title.is_empty() || request.title == request.label {
            request.label.to_string()
        } else {
            format!("{} - {}", request.title, request.label)
        };

        if !atty::is(atty::Stream::Stdin) {
            return read_stdin_line(&message);
        }
        if request.secret {
            return read_masked(&message);
        }

        Input::<String>::new()
            .with_prompt(message)
            .allow_empty(true)
            .interact_text_on(&Term::stderr())
            .map_err(|e| ReqchainError::Prompt(e.to_string()))
    }
}

/// Answers every prompt with its default (non-interactive runs)
#[derive(Debug, Default, Clone, Copy)]
pub struct NonInteractivePrompter;

impl Prompter for NonInteractivePrompter {
    fn prompt(&self, request: &PromptRequest<'_>) -> Result<String> {
        Ok(request.default.to_string())
    }
}

fn read_stdin_line(message: &str) -> Result<String> {
    eprint!("{}: ", message);
    io::stderr().flush().ok();
    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}

/// Raw-mode line editor echoing `*` per character; Ctrl+C ends the process
fn read_masked(message: &str) -> Result<String> {
    let mut stderr = io::stderr();
    write!(stderr, "{}: ", message)?;
    stderr.flush()?;

    enable_raw_mode()?;
    let result = masked_loop(&mut stderr);
    disable_raw_mode()?;
    writeln!(stderr)?;

    match result {
        Ok(Some(value)) => Ok(value),
        Ok(None) => signals::exit_interrupted(),
        Err(e) => Err(e),
    }
}

/// `None` means the operator pressed Ctrl+C
fn masked_loop(out: &mut impl Write) -> Result<Option<String>> {
    let mut value = String::new();
    loop {
        let Event::Key(KeyEvent { code, modifiers, kind, .. }) = event::read()? else {
            continue;
        };
        if kind == KeyEventKind::Release {
            continue;
        }
        match code {
            KeyCode::Char('c') if modifiers.contains(KeyModifiers::CONTROL) => return Ok(None),
            KeyCode::Enter => return Ok(Some(value)),
            KeyCode::Backspace => {
                if value.pop().is_some() {
                    write!(out, "\u{8} \u{8}")?;
                }
            }
            KeyCode::Char(c) => {
                value.push(c);
                write!(out, "*")?;
            }
            _ => {}
        }
        out.flush()?;
    }
}

fn parse_bool(value: &str) -> bool {
    matches!(value.trim().to_ascii_lowercase().as_str(), "true" | "1" | "yes")
}

pub struct PromptDirective;

impl Directive for PromptDirective {
    fn name(&self) -> &'static str {
        "prompt"
    }

    fn evaluate<'a>(&'a self, args: &'a [String], ctx: &'a DirectiveContext<'a>) -> BoxFuture<'a, Result<String>> {
        Box::pin(async move {
            if args.len() != PROMPT_ARGS {
                return Err(ReqchainError::directive(
                    "prompt",
                    format!("expected {} arguments, got {}", PROMPT_ARGS, args.len()),
                ));
            }
            let (title, label, default, cache_key) = (&args[0], &args[1], &args[2], &args[3]);
            let secret = parse_bool(&args[4]);
            let use_cached = parse_bool(&args[5]);
            let cache_key = (!cache_key.is_empty()).then(|| format!("prompt:{}", cache_key));

            if let (true, Some(key)) = (use_cached, &cache_key) {
                if let Some(entry) = ctx.cache.get(key)? {
                    debug!(key = %key, "prompt answered from cache");
                    return Ok(entry.value);
                }
            }

            let answer = ctx.prompter.prompt(&PromptRequest {
                title,
                label,
                default,
                secret,
            })?;
            let value = if answer.is_empty() { default.clone() } else { answer };

            if let Some(key) = &cache_key {
                ctx.cache
                    .set(key, &value, CacheSetOptions::with_ttl(PROMPT_CACHE_TTL))?;
            }
            Ok(value)
        })
    }
}
