use plume_protocol::{Message, Part, Role};

/// Flat request form a provider expects: one role, one text body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderMessage {
    pub role: Role,
    pub content: String,
}

impl ProviderMessage {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }
}

/// Provider-ready view of a conversation: system turns folded into a single
/// preamble, user/assistant turns flattened in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestParts {
    pub preamble: Option<String>,
    pub messages: Vec<ProviderMessage>,
}

/// Normalizes a conversation history for a provider request.
///
/// Drops turns whose rendered content is empty (such as the provisional
/// assistant shell a send appends before the first delta) and strips
/// intermediate reasoning so it survives only on the final assistant turn.
/// Pure and idempotent; relative order of the remaining turns is preserved.
pub fn normalize(messages: &[Message]) -> Vec<Message> {
    let last_assistant = messages
        .iter()
        .rposition(|message| message.role == Role::Assistant);

    messages
        .iter()
        .enumerate()
        .filter_map(|(index, message)| {
            let mut message = message.clone();
            if message.role == Role::Assistant && Some(index) != last_assistant {
                message
                    .parts
                    .retain(|part| !matches!(part, Part::Reasoning { .. }));
            }

            // Opaque parts (reasoning, unknown kinds) keep a message alive
            // even when it renders to nothing.
            let has_opaque = message
                .parts
                .iter()
                .any(|part| matches!(part, Part::Reasoning { .. } | Part::Other(_)));
            if message.is_blank() && !has_opaque {
                return None;
            }

            Some(message)
        })
        .collect()
}

/// Flattens normalized messages into the shape `AgentClient` consumes.
pub fn flatten(messages: &[Message]) -> RequestParts {
    let mut preamble_parts = Vec::new();
    let mut flattened = Vec::new();

    for message in messages {
        let content = message.text();
        match message.role {
            Role::System => {
                if !content.trim().is_empty() {
                    preamble_parts.push(content);
                }
            }
            Role::User | Role::Assistant => {
                flattened.push(ProviderMessage::new(message.role, content));
            }
        }
    }

    let preamble = if preamble_parts.is_empty() {
        None
    } else {
        Some(preamble_parts.join("\n\n"))
    };

    RequestParts {
        preamble,
        messages: flattened,
    }
}
