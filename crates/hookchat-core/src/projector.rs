use crate::model::Conversation;

/// How many characters of the label survive before truncation.
const LABEL_LIMIT: usize = 20;

/// Fallback label for conversations with no title and no messages yet.
const EMPTY_LABEL: &str = "New Chat";

/// One row of the history list view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryEntry {
    pub id: String,
    pub label: String,
    pub is_active: bool,
}

/// Derive the history list from repository state. Entries keep the
/// collection's insertion order; the label is the explicit title if set, else
/// the first message body, else a fixed placeholder, truncated for display.
///
/// This is recomputed wholesale after every mutation, never patched.
pub fn project(conversations: &[Conversation], active_id: Option<&str>) -> Vec<HistoryEntry> {
    conversations
        .iter()
        .map(|conv| HistoryEntry {
            id: conv.id.clone(),
            label: truncate_label(&display_title(conv)),
            is_active: active_id == Some(conv.id.as_str()),
        })
        .collect()
}

/// The untruncated display title for a conversation.
pub fn display_title(conversation: &Conversation) -> String {
    if let Some(title) = &conversation.title {
        return title.clone();
    }
    conversation
        .messages
        .first()
        .map(|m| m.body.clone())
        .unwrap_or_else(|| EMPTY_LABEL.to_string())
}

fn truncate_label(title: &str) -> String {
    if title.chars().count() > LABEL_LIMIT {
        let head: String = title.chars().take(LABEL_LIMIT).collect();
        format!("{}...", head)
    } else {
        title.to_string()
    }
}

/// Case-insensitive substring filter over the rendered labels. Filtering only
/// hides entries; it never touches repository state.
pub fn filter<'a>(entries: &'a [HistoryEntry], query: &str) -> Vec<&'a HistoryEntry> {
    let needle = query.to_lowercase();
    entries
        .iter()
        .filter(|e| e.label.to_lowercase().contains(&needle))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Sender;

    fn conversation(id: &str, title: Option<&str>, first_body: Option<&str>) -> Conversation {
        let mut conv = Conversation::new(id);
        conv.title = title.map(str::to_string);
        if let Some(body) = first_body {
            conv.push_message(Sender::User, body);
        }
        conv
    }

    #[test]
    fn test_label_prefers_title_then_first_message() {
        let titled = conversation("a", Some("travel plans"), Some("where to?"));
        let untitled = conversation("b", None, Some("hello there"));
        let empty = conversation("c", None, None);

        let entries = project(&[titled, untitled, empty], Some("b"));
        assert_eq!(entries[0].label, "travel plans");
        assert_eq!(entries[1].label, "hello there");
        assert_eq!(entries[2].label, "New Chat");

        assert!(!entries[0].is_active);
        assert!(entries[1].is_active);
        assert!(!entries[2].is_active);
    }

    #[test]
    fn test_long_labels_truncate_with_ellipsis() {
        let conv = conversation("a", None, Some("a very long first message indeed"));
        let entries = project(std::slice::from_ref(&conv), None);
        assert_eq!(entries[0].label, "a very long first me...");
    }

    #[test]
    fn test_exactly_twenty_chars_untouched() {
        let body = "12345678901234567890";
        let conv = conversation("a", None, Some(body));
        let entries = project(std::slice::from_ref(&conv), None);
        assert_eq!(entries[0].label, body);
    }

    #[test]
    fn test_filter_is_case_insensitive_and_non_destructive() {
        let entries = project(
            &[
                conversation("a", Some("Rust questions"), None),
                conversation("b", Some("dinner ideas"), None),
                conversation("c", None, Some("rustling leaves")),
            ],
            None,
        );

        let hits = filter(&entries, "RUST");
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].id, "a");
        assert_eq!(hits[1].id, "c");

        // The full list is untouched.
        assert_eq!(entries.len(), 3);

        assert_eq!(filter(&entries, "").len(), 3);
        assert!(filter(&entries, "zzz").is_empty());
    }
}
