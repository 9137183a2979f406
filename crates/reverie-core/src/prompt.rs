//! Prompt context rendering from composed state.

use crate::compose::ComposedState;
use reverie_memory::Memory;

/// Render a prompt template against composed state and the anchor
/// message.
///
/// Supported placeholders: `{{agent_name}}`, `{{bio}}`, `{{lore}}`,
/// `{{knowledge}}`, `{{recent_messages}}`, `{{goals}}`, `{{providers}}`,
/// `{{attachments}}`, and `{{message}}`. Unknown placeholders are left
/// in place.
pub fn render_context(template: &str, state: &ComposedState, anchor: &Memory) -> String {
    let knowledge = state
        .knowledge
        .iter()
        .map(|entry| entry.item.content.text.as_str())
        .collect::<Vec<_>>()
        .join("\n");
    let goals = state
        .goals
        .iter()
        .map(|goal| format!("{} ({})", goal.name, goal.status))
        .collect::<Vec<_>>()
        .join("\n");
    let attachments = state
        .attachments
        .iter()
        .map(|attachment| {
            format!(
                "{}: {}",
                attachment.title,
                attachment.text.as_deref().unwrap_or("")
            )
        })
        .collect::<Vec<_>>()
        .join("\n");

    template
        .replace("{{agent_name}}", &state.agent_name)
        .replace("{{bio}}", &state.bio)
        .replace("{{lore}}", &state.lore)
        .replace("{{knowledge}}", &knowledge)
        .replace("{{recent_messages}}", &state.recent_messages_text)
        .replace("{{goals}}", &goals)
        .replace("{{providers}}", &state.providers_text)
        .replace("{{attachments}}", &attachments)
        .replace("{{message}}", &anchor.content.text)
}
