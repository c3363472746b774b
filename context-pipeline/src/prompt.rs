use common::storage::types::profile::Profile;
use serde::Deserialize;

use crate::retriever::RetrievedContextItem;

/// How many prior turns of the caller-supplied history make it into the prompt.
pub const HISTORY_WINDOW: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptRole {
    System,
    User,
    Assistant,
}

/// One entry of the ordered message list sent to the completion endpoint.
#[derive(Debug, Clone, PartialEq)]
pub struct PromptMessage {
    pub role: PromptRole,
    pub content: String,
}

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum HistoryRole {
    User,
    Assistant,
}

/// A prior conversation turn as supplied by the caller.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct HistoryTurn {
    pub role: HistoryRole,
    pub content: String,
}

impl From<HistoryRole> for PromptRole {
    fn from(role: HistoryRole) -> Self {
        match role {
            HistoryRole::User => PromptRole::User,
            HistoryRole::Assistant => PromptRole::Assistant,
        }
    }
}

/// Builds the ordered message list for one completion call: a single system
/// message (persona, then user details, then retrieved context, each block only
/// when present), the most recent history window in original order, and the new
/// user message last. Deterministic, no truncation of the system block.
pub fn compose(
    persona: &str,
    profile: Option<&Profile>,
    retrieved: &[RetrievedContextItem],
    history: &[HistoryTurn],
    user_message: &str,
) -> Vec<PromptMessage> {
    let window = history.len().min(HISTORY_WINDOW);
    let mut messages = Vec::with_capacity(window + 2);

    messages.push(PromptMessage {
        role: PromptRole::System,
        content: system_message(persona, profile, retrieved),
    });

    let skipped = history.len().saturating_sub(HISTORY_WINDOW);
    for turn in history.iter().skip(skipped) {
        messages.push(PromptMessage {
            role: turn.role.into(),
            content: turn.content.clone(),
        });
    }

    messages.push(PromptMessage {
        role: PromptRole::User,
        content: user_message.to_owned(),
    });

    messages
}

fn system_message(
    persona: &str,
    profile: Option<&Profile>,
    retrieved: &[RetrievedContextItem],
) -> String {
    let mut content = persona.to_owned();

    let lines = profile.map(profile_lines).unwrap_or_default();
    if !lines.is_empty() {
        content.push_str("\n\nAbout the user:\n");
        content.push_str(&lines.join("\n"));
    }

    if !retrieved.is_empty() {
        content.push_str("\n\nRelevant past context:\n");
        let bullets: Vec<String> = retrieved
            .iter()
            .map(|item| format!("- {}", item.content))
            .collect();
        content.push_str(&bullets.join("\n"));
    }

    content
}

// One line per present attribute, in a fixed order. An absent field must not
// produce a line at all.
fn profile_lines(profile: &Profile) -> Vec<String> {
    let mut lines = Vec::new();

    if let Some(nickname) = &profile.nickname {
        lines.push(format!("Nickname: {nickname}"));
    }
    if let Some(age) = profile.age {
        lines.push(format!("Age: {age}"));
    }
    if let Some(gender) = &profile.gender {
        lines.push(format!("Gender: {gender}"));
    }
    if let Some(height) = profile.height {
        match &profile.height_unit {
            Some(unit) => lines.push(format!("Height: {height} {unit}")),
            None => lines.push(format!("Height: {height}")),
        }
    }
    if let Some(weight) = profile.weight {
        match &profile.weight_unit {
            Some(unit) => lines.push(format!("Weight: {weight} {unit}")),
            None => lines.push(format!("Weight: {weight}")),
        }
    }
    if let Some(bio) = &profile.bio {
        lines.push(format!("Bio: {bio}"));
    }

    lines
}
