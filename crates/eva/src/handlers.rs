use indoc::indoc;
use serde::{Deserialize, Serialize};
use strum::IntoEnumIterator;
use strum_macros::{AsRefStr, Display, EnumIter, EnumString};

use crate::errors::{AgentError, AgentResult};
use crate::prompt_template::load_prompt_file;

/// Closed set of handlers a query can be routed to
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    EnumIter,
    EnumString,
    Display,
    AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum HandlerId {
    GeneralChatAgent,
    SlackMgmtAgent,
    GithubMgmtAgent,
    TherapistAgent,
    LogicalAgent,
    CkbAgent,
    EmailMgmtAgent,
    CalendarMgmtAgent,
    WebSearchAgent,
    CustomerServiceAgent,
    HubspotMgmtAgent,
}

impl HandlerId {
    /// Used whenever routing cannot be determined
    pub const FALLBACK: HandlerId = HandlerId::GeneralChatAgent;

    /// Every identifier, in catalog order
    pub fn all() -> Vec<HandlerId> {
        HandlerId::iter().collect()
    }
}

/// Static configuration of one handler
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HandlerDescriptor {
    pub id: HandlerId,
    /// One line shown to the router
    pub description: String,
    /// System prompt sent ahead of the query
    pub preamble: String,
    /// Name of the capability this handler may invoke, looked up in the registry
    pub capability: Option<String>,
}

impl HandlerDescriptor {
    pub fn new<D, P>(id: HandlerId, description: D, preamble: P) -> Self
    where
        D: Into<String>,
        P: Into<String>,
    {
        Self {
            id,
            description: description.into(),
            preamble: preamble.into(),
            capability: None,
        }
    }

    pub fn with_capability<S: Into<String>>(mut self, name: S) -> Self {
        self.capability = Some(name.into());
        self
    }
}

#[derive(Serialize)]
struct PreambleContext<'a> {
    instructions: &'a str,
    capability: Option<&'a str>,
}

struct Specialist {
    id: HandlerId,
    description: &'static str,
    instructions: &'static str,
    capability: Option<&'static str>,
}

const SPECIALISTS: &[Specialist] = &[
    Specialist {
        id: HandlerId::CkbAgent,
        description: "For queries requiring information from our internal knowledge base (e.g., 'how does X work?', 'what are the specs for Y?').",
        instructions: indoc! {"
            You are an AI assistant specialized in retrieving information from our internal knowledge base. \
            Answer questions based on the knowledge provided to you. If the information is not in the CKB, state that clearly."},
        capability: Some("run_ckb_dev_tool"),
    },
    Specialist {
        id: HandlerId::EmailMgmtAgent,
        description: "For tasks related to managing Gmail inbox (e.g., 'read new emails', 'draft a reply to X', 'search for email from Y').",
        instructions: indoc! {"
            You are an AI assistant for managing Gmail. You can read emails, draft replies, and search the inbox. \
            Always confirm actions like sending emails or deleting messages."},
        capability: Some("run_email_mgmt_dev_tool"),
    },
    Specialist {
        id: HandlerId::CalendarMgmtAgent,
        description: "For tasks related to Google Calendar (e.g., 'create an event', 'check my schedule for tomorrow', 'find free slots').",
        instructions: indoc! {"
            You are an AI assistant for Google Calendar. You can create events, check schedules, and find free slots. \
            Clarify details like event titles, dates, times, and attendees."},
        capability: Some("run_calendar_mgmt_dev_tool"),
    },
    Specialist {
        id: HandlerId::WebSearchAgent,
        description: "For general web searches, current events, or information not in the CKB (e.g., 'what's the weather?', 'who won the game?').",
        instructions: indoc! {"
            You are a web search assistant. You can find information on the internet about current events, facts, or general knowledge. \
            Provide concise summaries and cite sources if possible."},
        capability: Some("run_web_search_dev_tool"),
    },
    Specialist {
        id: HandlerId::CustomerServiceAgent,
        description: "For customer-facing queries about Elevated Vector Automation, its products, or services (e.g., 'tell me about your company', 'what services do you offer?').",
        instructions: indoc! {"
            You are a customer service representative for Elevated Vector Automation. \
            Answer questions about our company, products, and services. Be polite and helpful. \
            If you cannot answer, say you will find someone who can."},
        capability: Some("run_customer_service_dev_tool"),
    },
    Specialist {
        id: HandlerId::SlackMgmtAgent,
        description: "For tasks related to sending messages to Slack channels, listing Slack channels, or other Slack interactions.",
        instructions: indoc! {"
            You are a helpful AI assistant specialized in managing Slack interactions. \
            You can post messages to channels/users and list available channels. \
            When asked to post a message, confirm the channel ID and the message content. \
            When asked to list channels, provide the retrieved list."},
        capability: Some("run_slack_dev_tool"),
    },
    Specialist {
        id: HandlerId::GithubMgmtAgent,
        description: "For tasks related to GitHub, such as creating or managing issues, listing repositories, commenting on issues, or getting repository details.",
        instructions: indoc! {"
            You are a helpful AI assistant specialized in GitHub repository management. \
            You can create issues, get issue details, list issues, comment on issues, list repositories, and get repository details. \
            Always ask for repository names (e.g., 'owner/repo') and issue numbers when needed."},
        capability: Some("run_github_dev_tool"),
    },
    Specialist {
        id: HandlerId::HubspotMgmtAgent,
        description: "For CRM tasks in HubSpot (e.g., 'create a new contact', 'log a sales call', 'find company X details').",
        instructions: indoc! {"
            You are an AI assistant for HubSpot CRM. You can manage contacts, companies, deals, and tasks. \
            Confirm details before creating or updating records."},
        capability: Some("run_hubspot_mgmt_dev_tool"),
    },
    Specialist {
        id: HandlerId::TherapistAgent,
        description: "For emotional support, therapy, feelings, or personal problems.",
        instructions: indoc! {"
            You are a compassionate therapist. Focus on the emotional aspects of the user's message.
            Show empathy, validate their feelings, and help them process their emotions.
            Ask thoughtful questions to help them explore their feelings more deeply.
            Avoid giving logical solutions unless explicitly asked."},
        capability: Some("run_therapist_dev_tool"),
    },
    Specialist {
        id: HandlerId::LogicalAgent,
        description: "For facts, information, logical analysis, or practical solutions.",
        instructions: indoc! {"
            You are a purely logical assistant. Focus only on facts and information.
            Provide clear, concise answers based on logic and evidence.
            Do not address emotions or provide emotional support.
            Be direct and straightforward in your responses."},
        capability: Some("run_logical_dev_tool"),
    },
    Specialist {
        id: HandlerId::GeneralChatAgent,
        description: "For general conversation, greetings, or if no other specialist is suitable. This agent can also echo messages and provide the current date/time.",
        instructions: indoc! {"
            You are EVA, a friendly and helpful general-purpose AI assistant. \
            Engage in conversation and answer general queries. You can echo messages and provide the current date/time if asked. \
            For other general questions, answer directly."},
        capability: None,
    },
];

/// The default descriptor table, one entry per [`HandlerId`], in router catalog order.
pub fn default_catalog() -> AgentResult<Vec<HandlerDescriptor>> {
    SPECIALISTS
        .iter()
        .map(|s| {
            let context = PreambleContext {
                instructions: s.instructions,
                capability: s.capability,
            };
            let preamble = load_prompt_file("handler.md", &context)
                .map_err(|e| AgentError::Internal(e.to_string()))?;
            let descriptor = HandlerDescriptor::new(s.id, s.description, preamble.trim_end());
            Ok(match s.capability {
                Some(name) => descriptor.with_capability(name),
                None => descriptor,
            })
        })
        .collect()
}
