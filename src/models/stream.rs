use serde::{ Serialize, Deserialize };

/// Body of both chat endpoints.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    pub user_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conversation_id: Option<String>,
}

/// One framed record in a per-request event stream. Emission order is fixed:
/// `start`, `conversation_id`, `intent`, zero or more `content`, then exactly
/// one of `complete` | `error`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "type")]
pub enum StreamEvent {
    #[serde(rename = "start")] Start {
        message: String,
    },
    #[serde(rename = "conversation_id")] ConversationId {
        conversation_id: String,
    },
    #[serde(rename = "intent")] Intent {
        intent: String,
    },
    #[serde(rename = "content")] Content {
        content: String,
    },
    #[serde(rename = "complete")] Complete {
        response_time: f64,
    },
    #[serde(rename = "error")] Error {
        message: String,
    },
}

/// Aggregate response of the non-streaming endpoint.
#[derive(Serialize, Deserialize, Debug)]
pub struct ChatResponse {
    pub response: String,
    pub intent: String,
    pub conversation_id: Option<String>,
    pub response_time: f64,
}
