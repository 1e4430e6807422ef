use anyhow::Result;
use console::style;
use eva::dispatcher::Dispatcher;
use eva::handler::TurnResult;
use eva::handlers::HandlerId;
use eva::models::message::MessageContent;
use eva::models::transcript::Transcript;

use crate::prompt::{Input, Prompt};

const SEPARATOR_WIDTH: usize = 60;

pub struct Session<'a> {
    dispatcher: Dispatcher,
    prompt: Box<dyn Prompt + 'a>,
    verbose: bool,
}

impl<'a> Session<'a> {
    pub fn new(dispatcher: Dispatcher, prompt: Box<impl Prompt + 'a>, verbose: bool) -> Self {
        Session {
            dispatcher,
            prompt,
            verbose,
        }
    }

    /// Answer queries until the user types `exit`
    pub async fn start(&mut self) -> Result<()> {
        self.prompt.render(&format!(
            "EVA is ready {}\n",
            style("- type \"exit\" to end the session").dim()
        ));

        loop {
            match self.prompt.get_input()? {
                Input::Message(query) => self.process(&query).await,
                Input::AskAgain => continue,
                Input::Exit => break,
            }
        }
        self.prompt.close();
        Ok(())
    }

    /// Answer a single query and return
    pub async fn headless_start(&mut self, query: &str) -> Result<()> {
        self.process(query).await;
        Ok(())
    }

    async fn process(&mut self, query: &str) {
        self.prompt.show_busy();
        let result = self.dispatcher.run_turn(query).await;
        self.prompt.hide_busy();

        self.prompt.render(&format_reply(&result));
        if self.verbose {
            self.prompt.render(&format_transcript(&result.transcript));
        }
        self.prompt.render(&"-".repeat(SEPARATOR_WIDTH));
    }
}

pub fn responder_emoji(id: HandlerId) -> &'static str {
    match id {
        HandlerId::GeneralChatAgent => "💬",
        HandlerId::SlackMgmtAgent => "📱",
        HandlerId::GithubMgmtAgent => "💻",
        HandlerId::TherapistAgent => "❤️‍🩹",
        HandlerId::LogicalAgent => "💡",
        HandlerId::CkbAgent => "📚",
        HandlerId::EmailMgmtAgent => "📧",
        HandlerId::CalendarMgmtAgent => "📅",
        HandlerId::WebSearchAgent => "🌐",
        HandlerId::CustomerServiceAgent => "🤝",
        HandlerId::HubspotMgmtAgent => "📈",
    }
}

pub fn format_reply(result: &TurnResult) -> String {
    if result.final_response.trim().is_empty() {
        return "🤖 Assistant: No clear response generated. 🤷".to_string();
    }
    format!(
        "\n{} Assistant ({}): {}",
        responder_emoji(result.responder),
        result.responder,
        result.final_response
    )
}

/// One line per message content, for `--verbose`
pub fn format_transcript(transcript: &Transcript) -> String {
    let mut lines = Vec::new();
    for message in transcript.messages() {
        let role = serde_json::to_value(message.role)
            .ok()
            .and_then(|v| v.as_str().map(String::from))
            .unwrap_or_default();
        for content in &message.content {
            let line = match content {
                MessageContent::Text(text) if text.text.is_empty() => continue,
                MessageContent::Text(text) => text.text.clone(),
                MessageContent::ToolRequest(request) => match &request.tool_call {
                    Ok(call) => format!("→ {} {}", call.name, call.arguments),
                    Err(e) => format!("→ invalid request: {}", e),
                },
                MessageContent::ToolResponse(response) => response.output.clone(),
            };
            lines.push(format!("{} {}", style(format!("[{}]", role)).dim(), line));
        }
    }
    lines.join("\n")
}
