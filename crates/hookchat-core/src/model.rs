use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sender {
    User,
    Agent,
}

/// One transcript entry. `seq` is assigned by the owning conversation at
/// append time and is the identity key for in-place edits; the timestamp is
/// display metadata only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub seq: u64,
    pub sender: Sender,
    pub body: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conversation {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default)]
    pub next_seq: u64,
    pub messages: Vec<Message>,
}

impl Conversation {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: None,
            next_seq: 0,
            messages: Vec::new(),
        }
    }

    /// Append a message with the next sequence number and a fresh timestamp.
    pub fn push_message(&mut self, sender: Sender, body: impl Into<String>) -> &Message {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.messages.push(Message {
            seq,
            sender,
            body: body.into(),
            timestamp: Utc::now(),
        });
        self.messages.last().unwrap()
    }

    pub fn message_by_seq(&self, seq: u64) -> Option<&Message> {
        self.messages.iter().find(|m| m.seq == seq)
    }

    pub fn message_by_seq_mut(&mut self, seq: u64) -> Option<&mut Message> {
        self.messages.iter_mut().find(|m| m.seq == seq)
    }

    pub fn clear_messages(&mut self) {
        self.messages.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_assigns_monotonic_seq() {
        let mut conv = Conversation::new("c1");
        conv.push_message(Sender::User, "one");
        conv.push_message(Sender::Agent, "two");
        conv.push_message(Sender::User, "three");

        let seqs: Vec<u64> = conv.messages.iter().map(|m| m.seq).collect();
        assert_eq!(seqs, vec![0, 1, 2]);
        assert_eq!(conv.next_seq, 3);
    }

    #[test]
    fn test_seq_survives_clear() {
        let mut conv = Conversation::new("c1");
        conv.push_message(Sender::User, "one");
        conv.clear_messages();
        let msg = conv.push_message(Sender::User, "two");
        assert_eq!(msg.seq, 1);
    }

    #[test]
    fn test_lookup_by_seq() {
        let mut conv = Conversation::new("c1");
        conv.push_message(Sender::User, "hello");
        conv.push_message(Sender::Agent, "hi");

        assert_eq!(conv.message_by_seq(1).unwrap().body, "hi");
        assert!(conv.message_by_seq(7).is_none());
    }

    #[test]
    fn test_sender_serializes_lowercase() {
        let json = serde_json::to_string(&Sender::Agent).unwrap();
        assert_eq!(json, "\"agent\"");
    }
}
