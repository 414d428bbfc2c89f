//! Realtime session events as they arrive in a post-call event log.
//!
//! The realtime API emits many event kinds and their payloads drift between
//! API revisions. Only the kinds in [`EventKind`] carry conversation content;
//! everything else decodes to [`RawSessionEvent::Unrecognized`]. Decoding
//! never fails: a known kind with a malformed payload keeps its variant and
//! records the missing piece as `None`.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Event kinds that can contribute a message to a transcript.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventKind {
    #[serde(rename = "conversation.item.created")]
    ItemCreated,
    #[serde(rename = "response.audio_transcript.done")]
    AudioTranscriptDone,
    #[serde(rename = "conversation.item.input_audio_transcription.completed")]
    InputAudioTranscriptionCompleted,
}

impl EventKind {
    pub const ALL: [EventKind; 3] = [
        EventKind::ItemCreated,
        EventKind::AudioTranscriptDone,
        EventKind::InputAudioTranscriptionCompleted,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::ItemCreated => "conversation.item.created",
            EventKind::AudioTranscriptDone => "response.audio_transcript.done",
            EventKind::InputAudioTranscriptionCompleted => {
                "conversation.item.input_audio_transcription.completed"
            }
        }
    }

    pub fn from_type(kind: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.as_str() == kind)
    }
}

/// One content part of a conversation item (`input_text`, `input_audio`,
/// `text`, `audio`, ...).
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ContentPart {
    pub kind: Option<String>,
    pub text: Option<String>,
    pub transcript: Option<String>,
}

impl ContentPart {
    fn from_value(value: &Value) -> Self {
        Self {
            kind: string_field(value, "type"),
            text: string_field(value, "text"),
            transcript: string_field(value, "transcript"),
        }
    }

    /// Audio parts carry their words in `transcript`, never in `text`.
    pub fn is_audio(&self) -> bool {
        matches!(self.kind.as_deref(), Some("input_audio") | Some("audio"))
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ConversationItem {
    pub role: Option<String>,
    pub content: Vec<ContentPart>,
}

impl ConversationItem {
    fn from_value(value: &Value) -> Option<Self> {
        let obj = value.as_object()?;
        let role = obj.get("role").and_then(Value::as_str).map(str::to_string);
        let content = obj
            .get("content")
            .and_then(Value::as_array)
            .map(|parts| parts.iter().map(ContentPart::from_value).collect())
            .unwrap_or_default();
        Some(Self { role, content })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum RawSessionEvent {
    /// `conversation.item.created`; `item` is `None` when the payload has no
    /// item object.
    ItemCreated { item: Option<ConversationItem> },
    /// `response.audio_transcript.done`: the model's spoken reply.
    AudioTranscriptDone { transcript: Option<String> },
    /// `conversation.item.input_audio_transcription.completed`: the caller's
    /// speech, transcribed.
    InputAudioTranscriptionCompleted { transcript: Option<String> },
    /// Any other kind, including events with no `type` at all.
    Unrecognized { kind: String },
}

impl RawSessionEvent {
    pub fn from_value(value: &Value) -> Self {
        let kind = value.get("type").and_then(Value::as_str).unwrap_or("");
        match EventKind::from_type(kind) {
            Some(EventKind::ItemCreated) => RawSessionEvent::ItemCreated {
                item: value.get("item").and_then(ConversationItem::from_value),
            },
            Some(EventKind::AudioTranscriptDone) => RawSessionEvent::AudioTranscriptDone {
                transcript: string_field(value, "transcript"),
            },
            Some(EventKind::InputAudioTranscriptionCompleted) => {
                RawSessionEvent::InputAudioTranscriptionCompleted {
                    transcript: string_field(value, "transcript"),
                }
            }
            None => RawSessionEvent::Unrecognized {
                kind: kind.to_string(),
            },
        }
    }

    pub fn kind(&self) -> Option<EventKind> {
        match self {
            RawSessionEvent::ItemCreated { .. } => Some(EventKind::ItemCreated),
            RawSessionEvent::AudioTranscriptDone { .. } => Some(EventKind::AudioTranscriptDone),
            RawSessionEvent::InputAudioTranscriptionCompleted { .. } => {
                Some(EventKind::InputAudioTranscriptionCompleted)
            }
            RawSessionEvent::Unrecognized { .. } => None,
        }
    }
}

impl<'de> Deserialize<'de> for RawSessionEvent {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        Ok(RawSessionEvent::from_value(&value))
    }
}

fn string_field(value: &Value, key: &str) -> Option<String> {
    value.get(key).and_then(Value::as_str).map(str::to_string)
}
