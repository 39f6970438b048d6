use serde::{ Serialize, Deserialize };

pub const ROLE_USER: &str = "user";
pub const ROLE_ASSISTANT: &str = "assistant";

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub role: String,
    pub content: String,
    pub timestamp: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub intent: Option<String>,
    #[serde(default)]
    pub error: bool,
}

impl ConversationTurn {
    pub fn user(content: &str, intent: Option<&str>) -> Self {
        Self {
            role: ROLE_USER.to_string(),
            content: content.to_string(),
            timestamp: chrono::Utc::now().timestamp(),
            intent: intent.map(str::to_string),
            error: false,
        }
    }

    pub fn assistant(content: &str) -> Self {
        Self {
            role: ROLE_ASSISTANT.to_string(),
            content: content.to_string(),
            timestamp: chrono::Utc::now().timestamp(),
            intent: None,
            error: false,
        }
    }

    pub fn with_error(mut self) -> Self {
        self.error = true;
        self
    }
}

/// Conversation metadata plus (optionally) a window of its turns. Listing
/// endpoints return it with `turns` empty.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Conversation {
    pub id: String,
    pub user_id: String,
    pub title: String,
    pub created_at: i64,
    pub last_activity: i64,
    #[serde(default)]
    pub turns: Vec<ConversationTurn>,
}

/// Titles come from the first user message, trimmed to something listable.
pub fn derive_title(first_message: &str) -> String {
    const MAX_TITLE_LEN: usize = 60;
    let trimmed = first_message.trim();
    if trimmed.is_empty() {
        return "New conversation".to_string();
    }
    let mut title: String = trimmed.chars().take(MAX_TITLE_LEN).collect();
    if trimmed.chars().count() > MAX_TITLE_LEN {
        title.push('…');
    }
    title
}
