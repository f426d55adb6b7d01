//! Operator console and confirmation prompts

use std::collections::VecDeque;
use std::io::{self, BufRead, Write};

/// Line-oriented operator I/O
///
/// Interactive code only talks to this trait so it can be driven by a
/// script in tests.
pub trait Console {
    /// Show `prompt` and read one line without its terminator.
    /// `None` means end of input.
    fn read_line(&mut self, prompt: &str) -> Option<String>;

    fn write_line(&mut self, line: &str);
}

/// Console over the process's stdin and stdout
#[derive(Debug, Default)]
pub struct StdConsole;

impl Console for StdConsole {
    fn read_line(&mut self, prompt: &str) -> Option<String> {
        let mut stdout = io::stdout().lock();
        if let Err(e) = write!(stdout, "{}", prompt).and_then(|_| stdout.flush()) {
            tracing::debug!(error = %e, "Failed to write prompt");
        }
        drop(stdout);

        let mut line = String::new();
        match io::stdin().lock().read_line(&mut line) {
            Ok(0) => None,
            Ok(_) => Some(strip_terminator(line)),
            Err(e) => {
                tracing::warn!(error = %e, "Failed to read from stdin");
                None
            }
        }
    }

    fn write_line(&mut self, line: &str) {
        println!("{}", line);
    }
}

/// Console fed from a fixed list of inputs, recording everything shown
#[derive(Debug, Default)]
pub struct ScriptedConsole {
    inputs: VecDeque<String>,
    output: Vec<String>,
}

impl ScriptedConsole {
    pub fn new<I, S>(inputs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            inputs: inputs.into_iter().map(Into::into).collect(),
            output: Vec::new(),
        }
    }

    /// Prompts and lines written so far
    pub fn output(&self) -> &[String] {
        &self.output
    }

    /// True if any written line contains `needle`
    pub fn contains(&self, needle: &str) -> bool {
        self.output.iter().any(|line| line.contains(needle))
    }

    /// Inputs not consumed yet
    pub fn remaining(&self) -> usize {
        self.inputs.len()
    }
}

impl Console for ScriptedConsole {
    fn read_line(&mut self, prompt: &str) -> Option<String> {
        self.output.push(prompt.to_string());
        self.inputs.pop_front()
    }

    fn write_line(&mut self, line: &str) {
        self.output.push(line.to_string());
    }
}

fn strip_terminator(mut line: String) -> String {
    if line.ends_with('\n') {
        line.pop();
        if line.ends_with('\r') {
            line.pop();
        }
    }
    line
}

/// Ask the operator to confirm
///
/// With `required_phrase` the answer must match it exactly. Otherwise `yes`
/// or `y` in any case affirms. End of input always refuses.
pub fn confirm(console: &mut dyn Console, prompt: &str, required_phrase: Option<&str>) -> bool {
    match required_phrase {
        Some(phrase) => {
            console.write_line(&format!("Type '{}' to confirm:", phrase));
            match console.read_line(prompt) {
                Some(answer) => answer == phrase,
                None => false,
            }
        }
        None => match console.read_line(prompt) {
            Some(answer) => matches!(answer.trim().to_lowercase().as_str(), "yes" | "y"),
            None => false,
        },
    }
}
