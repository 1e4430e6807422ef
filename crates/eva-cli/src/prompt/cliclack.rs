use std::io::{self, Write};

use anyhow::Result;
use cliclack::{input, spinner, ProgressBar};

use super::{Input, Prompt};

pub struct CliclackPrompt {
    spinner: Option<ProgressBar>,
}

impl CliclackPrompt {
    pub fn new() -> Self {
        CliclackPrompt { spinner: None }
    }
}

impl Default for CliclackPrompt {
    fn default() -> Self {
        Self::new()
    }
}

impl Prompt for CliclackPrompt {
    fn render(&mut self, content: &str) {
        println!("{}", content);
        let _ = io::stdout().flush();
    }

    fn get_input(&mut self) -> Result<Input> {
        let result: io::Result<String> = input("Message:").placeholder("").interact();
        match result {
            Ok(text) => Ok(Input::parse(&text)),
            // Ctrl+C or Esc
            Err(e) if e.kind() == io::ErrorKind::Interrupted => Ok(Input::Exit),
            Err(e) => Err(e.into()),
        }
    }

    fn show_busy(&mut self) {
        let busy = spinner();
        busy.start("Processing...");
        self.spinner = Some(busy);
    }

    fn hide_busy(&mut self) {
        if let Some(busy) = self.spinner.take() {
            busy.stop("");
        }
    }

    fn close(&self) {
        println!("Bye");
    }
}
