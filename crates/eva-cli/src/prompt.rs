use anyhow::Result;

pub mod cliclack;

/// Terminal front end of a session
pub trait Prompt {
    fn render(&mut self, content: &str);
    fn get_input(&mut self) -> Result<Input>;
    fn show_busy(&mut self);
    fn hide_busy(&mut self);
    fn close(&self);
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Input {
    /// Nothing usable was entered, ask again
    AskAgain,
    Message(String),
    Exit,
}

impl Input {
    pub fn parse(raw: &str) -> Self {
        let text = raw.trim();
        if text.eq_ignore_ascii_case("exit") {
            Input::Exit
        } else if text.is_empty() {
            Input::AskAgain
        } else {
            Input::Message(text.to_string())
        }
    }
}
