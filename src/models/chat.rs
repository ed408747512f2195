use chrono::{ DateTime, Utc };
use serde::{ Serialize, Deserialize };
use std::fmt;
use uuid::Uuid;

/// Longest title accepted for a conversation, in characters.
pub const MAX_TITLE_LEN: usize = 50;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sender {
    User,
    Ai,
}

impl Sender {
    pub fn as_str(&self) -> &'static str {
        match self {
            Sender::User => "user",
            Sender::Ai => "ai",
        }
    }
}

impl fmt::Display for Sender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConversationStatus {
    #[default]
    Planning,
    Completed,
    Cancelled,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Conversation {
    pub id: String,
    pub title: String,
    pub owner_id: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub destination: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<String>,
    #[serde(default)]
    pub status: ConversationStatus,
}

impl Conversation {
    /// Builds a fresh conversation. The title must already be normalized.
    pub fn new(owner_id: &str, title: String) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            title,
            owner_id: owner_id.to_string(),
            timestamp: Utc::now(),
            last_message: None,
            destination: None,
            duration: None,
            status: ConversationStatus::default(),
        }
    }
}

/// Trims a user supplied title and caps it at [`MAX_TITLE_LEN`] characters.
/// Returns `None` when nothing is left.
pub fn normalize_title(title: &str) -> Option<String> {
    let trimmed = title.trim();
    if trimmed.is_empty() {
        return None;
    }
    Some(trimmed.chars().take(MAX_TITLE_LEN).collect())
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Activity {
    pub time: String,
    pub description: String,
    pub location: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ItineraryDay {
    pub day: u32,
    pub activities: Vec<Activity>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MapLocation {
    pub name: String,
    pub description: String,
    /// `[longitude, latitude]`
    pub coordinates: [f64; 2],
}

/// Structured data an AI reply can carry next to its text.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "metadata")]
pub enum MessagePayload {
    #[serde(rename = "itinerary")] Itinerary {
        itinerary: Vec<ItineraryDay>,
    },
    #[serde(rename = "location")] Locations {
        locations: Vec<MapLocation>,
    },
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: String,
    pub conversation_id: String,
    pub sender: Sender,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    /// Sits beside the text as top-level `type` and `metadata` keys. Messages
    /// without a recognizable `type` read back as plain text.
    #[serde(flatten, skip_serializing_if = "Option::is_none")]
    pub payload: Option<MessagePayload>,
}

/// A message before the store has assigned it an id and a timestamp.
#[derive(Clone, Debug, PartialEq)]
pub struct NewMessage {
    pub conversation_id: String,
    pub sender: Sender,
    pub content: String,
    pub payload: Option<MessagePayload>,
}

impl NewMessage {
    pub fn user(conversation_id: &str, content: &str) -> Self {
        Self {
            conversation_id: conversation_id.to_string(),
            sender: Sender::User,
            content: content.to_string(),
            payload: None,
        }
    }

    pub fn ai(conversation_id: &str, content: &str) -> Self {
        Self {
            conversation_id: conversation_id.to_string(),
            sender: Sender::Ai,
            content: content.to_string(),
            payload: None,
        }
    }

    pub fn with_payload(mut self, payload: MessagePayload) -> Self {
        self.payload = Some(payload);
        self
    }

    pub fn into_message(self, timestamp: DateTime<Utc>) -> Message {
        Message {
            id: Uuid::new_v4().to_string(),
            conversation_id: self.conversation_id,
            sender: self.sender,
            content: self.content,
            timestamp,
            payload: self.payload,
        }
    }
}

/// Timestamp for the next message of a conversation: now, but never earlier
/// than the newest message already stored.
pub fn next_timestamp(last: Option<&Message>) -> DateTime<Utc> {
    let now = Utc::now();
    match last {
        Some(prev) if prev.timestamp > now => prev.timestamp,
        _ => now,
    }
}

/// Stable ascending sort; equal timestamps keep insertion order.
pub fn sort_chronologically(messages: &mut [Message]) {
    messages.sort_by_key(|m| m.timestamp);
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn title_is_trimmed_and_capped() {
        assert_eq!(normalize_title("  Tokyo  "), Some("Tokyo".to_string()));
        assert_eq!(normalize_title("   "), None);
        let long = "x".repeat(80);
        assert_eq!(normalize_title(&long).map(|t| t.chars().count()), Some(MAX_TITLE_LEN));
    }

    #[test]
    fn payload_uses_type_and_metadata_keys() {
        let payload = MessagePayload::Locations {
            locations: vec![MapLocation {
                name: "Tsukiji Market".into(),
                description: "One of the world's largest fish markets".into(),
                coordinates: [139.7691, 35.6654],
            }],
        };
        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["type"], "location");
        assert_eq!(json["metadata"]["locations"][0]["name"], "Tsukiji Market");
        assert_eq!(json["metadata"]["locations"][0]["coordinates"][0], 139.7691);

        let raw = r#"{"type":"itinerary","metadata":{"itinerary":[{"day":1,"activities":[
            {"time":"Morning","description":"Sushi","location":"Tsukiji Market"}]}]}}"#;
        match serde_json::from_str::<MessagePayload>(raw).unwrap() {
            MessagePayload::Itinerary { itinerary } => {
                assert_eq!(itinerary[0].day, 1);
                assert_eq!(itinerary[0].activities[0].location, "Tsukiji Market");
            }
            other => panic!("unexpected payload {:?}", other),
        }
    }

    #[test]
    fn payload_keys_sit_on_the_message_itself() {
        let message = NewMessage::ai("abc", "Day plan")
            .with_payload(MessagePayload::Itinerary { itinerary: vec![] })
            .into_message(Utc::now());
        let json = serde_json::to_value(&message).unwrap();
        assert_eq!(json["type"], "itinerary");
        assert_eq!(json["metadata"]["itinerary"], serde_json::json!([]));
        assert!(json.get("payload").is_none());

        let back: Message = serde_json::from_value(json).unwrap();
        assert_eq!(back, message);
    }

    #[test]
    fn stored_reply_with_location_reads_back() {
        let raw = r#"{
            "id": "6",
            "conversationId": "abc",
            "content": "Let me mark the location for you:",
            "timestamp": "2024-12-15T10:02:30Z",
            "sender": "ai",
            "type": "location",
            "metadata": {
                "locations": [{
                    "name": "Tsukiji Market",
                    "description": "One of the world's largest fish markets, famous for fresh sushi",
                    "coordinates": [139.7691, 35.6654]
                }]
            }
        }"#;
        let message: Message = serde_json::from_str(raw).unwrap();
        assert_eq!(message.sender, Sender::Ai);
        match message.payload {
            Some(MessagePayload::Locations { ref locations }) => {
                assert_eq!(locations[0].coordinates, [139.7691, 35.6654]);
            }
            ref other => panic!("unexpected payload {:?}", other),
        }
    }

    #[test]
    fn plain_message_has_no_payload() {
        let raw = r#"{"id":"3","conversationId":"abc","content":"Sushi please",
            "timestamp":"2024-12-15T10:01:00Z","sender":"user"}"#;
        let message: Message = serde_json::from_str(raw).unwrap();
        assert!(message.payload.is_none());

        let json = serde_json::to_value(&message).unwrap();
        assert!(json.get("type").is_none());
        assert!(json.get("metadata").is_none());
    }

    #[test]
    fn next_timestamp_never_goes_backwards() {
        let future = NewMessage::user("abc", "hi").into_message(Utc::now() + Duration::seconds(30));
        assert_eq!(next_timestamp(Some(&future)), future.timestamp);
        assert!(next_timestamp(None) <= Utc::now());
    }

    #[test]
    fn sort_keeps_insertion_order_on_ties() {
        let ts = Utc::now();
        let mut messages = vec![
            NewMessage::user("abc", "second").into_message(ts + Duration::seconds(1)),
            NewMessage::user("abc", "first-a").into_message(ts),
            NewMessage::ai("abc", "first-b").into_message(ts),
        ];
        sort_chronologically(&mut messages);
        let order: Vec<_> = messages.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(order, vec!["first-a", "first-b", "second"]);
    }

    #[test]
    fn conversation_serializes_camel_case() {
        let conversation = Conversation::new("user-1", "Paris".into());
        let json = serde_json::to_value(&conversation).unwrap();
        assert_eq!(json["ownerId"], "user-1");
        assert_eq!(json["status"], "planning");
        assert!(json.get("lastMessage").is_none());
    }
}
