//! Confirmation sources for the interactive session.

use colored::*;
use std::collections::VecDeque;
use std::io::{self, BufRead, Write};

/// Answers yes/no questions.
pub trait Prompter {
    /// Asks `question`; `Ok(true)` means the user agreed.
    fn confirm(&mut self, question: &str) -> io::Result<bool>;
}

/// Reads answers from a line-based input, writing questions to an output.
///
/// Accepts `y`/`yes` and `n`/`no` in any case. An empty answer or end of
/// input counts as "no"; anything else asks again.
pub struct TerminalPrompter<R, W> {
    input: R,
    output: W,
}

impl TerminalPrompter<io::StdinLock<'static>, io::Stdout> {
    /// A prompter on the process's stdin and stdout.
    pub fn stdio() -> Self {
        Self::new(io::stdin().lock(), io::stdout())
    }
}

impl<R: BufRead, W: Write> TerminalPrompter<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }
}

impl<R: BufRead, W: Write> Prompter for TerminalPrompter<R, W> {
    fn confirm(&mut self, question: &str) -> io::Result<bool> {
        loop {
            write!(self.output, "{} {} ", question, "[y/N]".dimmed())?;
            self.output.flush()?;

            let mut line = String::new();
            if self.input.read_line(&mut line)? == 0 {
                writeln!(self.output)?;
                return Ok(false);
            }

            match line.trim().to_lowercase().as_str() {
                "y" | "yes" => return Ok(true),
                "" | "n" | "no" => return Ok(false),
                _ => writeln!(self.output, "Please answer y or n.")?,
            }
        }
    }
}

/// Agrees to every question without asking.
#[derive(Debug, Default, Clone, Copy)]
pub struct AlwaysYes;

impl Prompter for AlwaysYes {
    fn confirm(&mut self, _question: &str) -> io::Result<bool> {
        Ok(true)
    }
}

/// Replays a fixed sequence of answers and records the questions asked.
///
/// Once the answers run out every further question is declined.
#[derive(Debug, Default, Clone)]
pub struct ScriptedPrompter {
    answers: VecDeque<bool>,
    pub asked: Vec<String>,
}

impl ScriptedPrompter {
    pub fn new(answers: &[bool]) -> Self {
        Self {
            answers: answers.iter().copied().collect(),
            asked: Vec::new(),
        }
    }
}

impl Prompter for ScriptedPrompter {
    fn confirm(&mut self, question: &str) -> io::Result<bool> {
        self.asked.push(question.to_string());
        Ok(self.answers.pop_front().unwrap_or(false))
    }
}
