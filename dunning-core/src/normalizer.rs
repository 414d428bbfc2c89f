//! Conversation event normalization.
//!
//! Turns a raw realtime event log into a role-labeled [`Transcript`]. Events
//! whose kind is not in the policy allowlist are dropped. Events that pass the
//! allowlist always produce exactly one message, in input order; when their
//! payload does not hold the expected text a sentinel takes its place.

use serde::{Deserialize, Serialize};

use crate::events::{ConversationItem, EventKind, RawSessionEvent};

/// Content for an item whose content part carries no text or transcript.
pub const EMPTY_MESSAGE: &str = "(empty message)";

/// Content for a recognized event whose payload has the wrong shape.
pub const UNHANDLED_EVENT: &str = "(unhandled event)";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizedMessage {
    pub role: Role,
    pub content: String,
}

impl NormalizedMessage {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }
}

/// Messages in conversation order. Serializes as a bare JSON array.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Transcript(Vec<NormalizedMessage>);

impl Transcript {
    pub fn messages(&self) -> &[NormalizedMessage] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, NormalizedMessage> {
        self.0.iter()
    }

    /// Compact JSON text of the message array.
    pub fn to_json(&self) -> String {
        serde_json::to_string(&self.0).unwrap_or_else(|_| "[]".to_string())
    }
}

impl From<Vec<NormalizedMessage>> for Transcript {
    fn from(messages: Vec<NormalizedMessage>) -> Self {
        Self(messages)
    }
}

impl<'a> IntoIterator for &'a Transcript {
    type Item = &'a NormalizedMessage;
    type IntoIter = std::slice::Iter<'a, NormalizedMessage>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizerPolicy {
    /// Allowlist of event kinds; anything else is left out of the transcript.
    pub recognized: Vec<EventKind>,
    /// Role given to `response.audio_transcript.done` messages.
    pub transcript_role: Role,
}

impl Default for NormalizerPolicy {
    fn default() -> Self {
        Self {
            recognized: EventKind::ALL.to_vec(),
            transcript_role: Role::System,
        }
    }
}

impl NormalizerPolicy {
    pub fn recognizes(&self, kind: EventKind) -> bool {
        self.recognized.contains(&kind)
    }
}

pub fn normalize(events: &[RawSessionEvent], policy: &NormalizerPolicy) -> Transcript {
    let messages: Vec<NormalizedMessage> = events
        .iter()
        .filter_map(|event| normalize_event(event, policy))
        .collect();

    tracing::debug!(
        events = events.len(),
        messages = messages.len(),
        "Normalized session events"
    );

    Transcript(messages)
}

fn normalize_event(event: &RawSessionEvent, policy: &NormalizerPolicy) -> Option<NormalizedMessage> {
    if !policy.recognizes(event.kind()?) {
        return None;
    }

    let message = match event {
        RawSessionEvent::ItemCreated { item: Some(item) } => {
            NormalizedMessage::new(item_role(item), item_content(item))
        }
        RawSessionEvent::ItemCreated { item: None } => {
            NormalizedMessage::new(Role::User, UNHANDLED_EVENT)
        }
        RawSessionEvent::AudioTranscriptDone { transcript } => {
            NormalizedMessage::new(policy.transcript_role, transcript_or_sentinel(transcript))
        }
        RawSessionEvent::InputAudioTranscriptionCompleted { transcript } => {
            NormalizedMessage::new(Role::User, transcript_or_sentinel(transcript))
        }
        RawSessionEvent::Unrecognized { .. } => return None,
    };

    Some(message)
}

/// Items are the caller's unless they explicitly belong to the model or the
/// session.
fn item_role(item: &ConversationItem) -> Role {
    match item.role.as_deref() {
        Some("assistant") => Role::Assistant,
        Some("system") => Role::System,
        _ => Role::User,
    }
}

fn item_content(item: &ConversationItem) -> String {
    let located = item.content.first().and_then(|part| {
        if part.is_audio() {
            part.transcript.clone()
        } else {
            part.text.clone()
        }
    });
    located.unwrap_or_else(|| EMPTY_MESSAGE.to_string())
}

fn transcript_or_sentinel(transcript: &Option<String>) -> String {
    transcript
        .clone()
        .unwrap_or_else(|| UNHANDLED_EVENT.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn events(value: serde_json::Value) -> Vec<RawSessionEvent> {
        serde_json::from_value(value).expect("event list should decode")
    }

    fn user_text(text: &str) -> serde_json::Value {
        json!({
            "type": "conversation.item.created",
            "item": { "content": [{ "type": "input_text", "text": text }] }
        })
    }

    #[test]
    fn test_item_created_text_becomes_user_message() {
        let input = events(json!([user_text("Hello")]));
        let transcript = normalize(&input, &NormalizerPolicy::default());
        assert_eq!(
            transcript.messages(),
            &[NormalizedMessage::new(Role::User, "Hello")]
        );
    }

    #[test]
    fn test_audio_transcript_uses_configured_role() {
        let input = events(json!([
            { "type": "response.audio_transcript.done", "transcript": "Sure, I can pay Friday." }
        ]));

        let transcript = normalize(&input, &NormalizerPolicy::default());
        assert_eq!(
            transcript.messages(),
            &[NormalizedMessage::new(Role::System, "Sure, I can pay Friday.")]
        );

        let policy = NormalizerPolicy {
            transcript_role: Role::Assistant,
            ..NormalizerPolicy::default()
        };
        let transcript = normalize(&input, &policy);
        assert_eq!(transcript.messages()[0].role, Role::Assistant);
    }

    #[test]
    fn test_empty_input_yields_empty_transcript() {
        let transcript = normalize(&[], &NormalizerPolicy::default());
        assert!(transcript.is_empty());
        assert_eq!(transcript.to_json(), "[]");
    }

    #[test]
    fn test_audio_item_reads_transcript_not_text() {
        let input = events(json!([{
            "type": "conversation.item.created",
            "item": {
                "role": "user",
                "content": [{ "type": "input_audio", "text": "ignored", "transcript": "I lost my job" }]
            }
        }]));
        let transcript = normalize(&input, &NormalizerPolicy::default());
        assert_eq!(transcript.messages()[0].content, "I lost my job");
    }

    #[test]
    fn test_missing_item_content_yields_empty_message_sentinel() {
        let input = events(json!([
            { "type": "conversation.item.created", "item": { "content": [{ "type": "input_audio", "transcript": null }] } },
            { "type": "conversation.item.created", "item": { "content": [] } },
            { "type": "conversation.item.created", "item": {} }
        ]));
        let transcript = normalize(&input, &NormalizerPolicy::default());
        assert_eq!(transcript.len(), 3);
        assert!(transcript
            .iter()
            .all(|m| m.role == Role::User && m.content == EMPTY_MESSAGE));
    }

    #[test]
    fn test_malformed_recognized_events_yield_unhandled_sentinel() {
        let input = events(json!([
            { "type": "conversation.item.created", "item": "not-an-object" },
            { "type": "response.audio_transcript.done" },
            { "type": "conversation.item.input_audio_transcription.completed", "transcript": ["x"] }
        ]));
        let transcript = normalize(&input, &NormalizerPolicy::default());
        let contents: Vec<&str> = transcript.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec![UNHANDLED_EVENT; 3]);
    }

    #[test]
    fn test_unrecognized_kinds_are_excluded_entirely() {
        let input = events(json!([
            { "type": "session.created", "session": {} },
            user_text("first"),
            { "type": "response.audio.delta", "delta": "AAAA" },
            { "no_type": true },
            { "type": "response.audio_transcript.done", "transcript": "second" }
        ]));
        let transcript = normalize(&input, &NormalizerPolicy::default());
        let contents: Vec<&str> = transcript.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["first", "second"]);
    }

    #[test]
    fn test_allowlist_excludes_known_kinds_not_configured() {
        let input = events(json!([
            user_text("typed"),
            { "type": "conversation.item.input_audio_transcription.completed", "transcript": "spoken" },
            { "type": "response.audio_transcript.done", "transcript": "reply" }
        ]));
        let policy = NormalizerPolicy {
            recognized: vec![EventKind::AudioTranscriptDone],
            transcript_role: Role::Assistant,
        };
        let transcript = normalize(&input, &policy);
        assert_eq!(
            transcript.messages(),
            &[NormalizedMessage::new(Role::Assistant, "reply")]
        );
    }

    #[test]
    fn test_order_preserved_across_kinds() {
        let input = events(json!([
            { "type": "response.audio_transcript.done", "transcript": "Hello, is this Peter?" },
            { "type": "conversation.item.input_audio_transcription.completed", "transcript": "Yes it is." },
            { "type": "rate_limits.updated" },
            user_text("typed note"),
            { "type": "response.audio_transcript.done", "transcript": "Thank you." }
        ]));
        let transcript = normalize(&input, &NormalizerPolicy::default());
        let pairs: Vec<(Role, &str)> = transcript
            .iter()
            .map(|m| (m.role, m.content.as_str()))
            .collect();
        assert_eq!(
            pairs,
            vec![
                (Role::System, "Hello, is this Peter?"),
                (Role::User, "Yes it is."),
                (Role::User, "typed note"),
                (Role::System, "Thank you."),
            ]
        );
    }

    #[test]
    fn test_assistant_items_keep_their_role() {
        let input = events(json!([{
            "type": "conversation.item.created",
            "item": { "role": "assistant", "content": [{ "type": "text", "text": "Noted." }] }
        }]));
        let transcript = normalize(&input, &NormalizerPolicy::default());
        assert_eq!(
            transcript.messages(),
            &[NormalizedMessage::new(Role::Assistant, "Noted.")]
        );
    }

    #[test]
    fn test_normalize_is_idempotent() {
        let input = events(json!([
            user_text("Hello"),
            { "type": "response.audio_transcript.done" },
            { "type": "input_audio_buffer.speech_started" },
            { "type": "response.audio_transcript.done", "transcript": "Hi" }
        ]));
        let policy = NormalizerPolicy::default();
        let first = normalize(&input, &policy);
        let second = normalize(&input, &policy);
        assert_eq!(first, second);
        assert_eq!(first.to_json(), second.to_json());
    }

    #[test]
    fn test_transcript_serializes_as_role_content_array() {
        let transcript = Transcript::from(vec![
            NormalizedMessage::new(Role::User, "Hello"),
            NormalizedMessage::new(Role::System, "Hi there"),
        ]);
        assert_eq!(
            transcript.to_json(),
            r#"[{"role":"user","content":"Hello"},{"role":"system","content":"Hi there"}]"#
        );
    }
}
