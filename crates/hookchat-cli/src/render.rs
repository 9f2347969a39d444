use hookchat_core::{HistoryEntry, Message, Sender};
use hookchat_core::session::{ConfirmDialog, HistoryView, TranscriptView};
use std::io::{self, BufRead, Write};
use std::sync::{Arc, Mutex};

const BOLD: &str = "\x1b[1m";
const ITALIC: &str = "\x1b[3m";
const DIM: &str = "\x1b[2m";
const RESET: &str = "\x1b[0m";

/// Flatten agent markdown to ANSI-styled terminal text. Bold and emphasis
/// spans become escape sequences, list items become plain bullets; everything
/// else passes through as text.
pub fn markdown_to_ansi(source: &str) -> String {
    use pulldown_cmark::{Event, Parser, Tag, TagEnd};

    let mut out = String::new();
    for event in Parser::new(source) {
        match event {
            Event::Text(text) => out.push_str(&text),
            Event::Code(code) => {
                out.push('`');
                out.push_str(&code);
                out.push('`');
            }
            Event::Start(Tag::Strong) => out.push_str(BOLD),
            Event::End(TagEnd::Strong) => out.push_str(RESET),
            Event::Start(Tag::Emphasis) => out.push_str(ITALIC),
            Event::End(TagEnd::Emphasis) => out.push_str(RESET),
            Event::Start(Tag::Item) => out.push_str("\n- "),
            Event::End(TagEnd::Paragraph) => out.push('\n'),
            Event::SoftBreak | Event::HardBreak => out.push('\n'),
            _ => {}
        }
    }
    out.trim_end().to_string()
}

/// Prints the active transcript to stdout. The pending marker is a printed
/// line; scrollback cannot be unprinted, so clearing it is a no-op and the
/// reply render that follows supersedes it.
pub struct TerminalTranscript;

impl TranscriptView for TerminalTranscript {
    fn render(&mut self, messages: &[Message]) {
        println!("{}--------------------------------{}", DIM, RESET);
        if messages.is_empty() {
            println!("{}(empty conversation){}", DIM, RESET);
            return;
        }
        for message in messages {
            let time = message.timestamp.format("%H:%M:%S");
            match message.sender {
                Sender::User => {
                    println!("{}[{}] you:{} {}", DIM, time, RESET, message.body);
                }
                Sender::Agent => {
                    println!(
                        "{}[{}] agent:{} {}",
                        DIM,
                        time,
                        RESET,
                        markdown_to_ansi(&message.body)
                    );
                }
            }
        }
    }

    fn show_pending(&mut self) {
        println!("{}agent is typing ...{}", DIM, RESET);
    }

    fn clear_pending(&mut self) {}
}

/// Records the latest projected history list. The REPL prints it on demand
/// (`/list`) and uses it to resolve 1-based indexes into conversation ids.
#[derive(Clone, Default)]
pub struct HistoryBuffer {
    entries: Arc<Mutex<Vec<HistoryEntry>>>,
}

impl HistoryBuffer {
    pub fn entries(&self) -> Vec<HistoryEntry> {
        self.entries.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Resolve a 1-based list index to a conversation id.
    pub fn id_at(&self, index: usize) -> Option<String> {
        let entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.get(index.checked_sub(1)?).map(|e| e.id.clone())
    }

    pub fn print(&self) {
        let entries = self.entries();
        if entries.is_empty() {
            println!("{}(no conversations){}", DIM, RESET);
            return;
        }
        for (i, entry) in entries.iter().enumerate() {
            let marker = if entry.is_active { "*" } else { " " };
            println!("{} {:>2}. {}", marker, i + 1, entry.label);
        }
    }
}

impl HistoryView for HistoryBuffer {
    fn render(&mut self, entries: &[HistoryEntry]) {
        *self.entries.lock().unwrap_or_else(|e| e.into_inner()) = entries.to_vec();
    }
}

/// Blocking y/N prompt on stdin.
pub struct StdinConfirm;

impl ConfirmDialog for StdinConfirm {
    fn confirm(&mut self, title: &str, text: &str) -> bool {
        print!("{} {} [y/N]: ", title, text);
        let _ = io::stdout().flush();
        let mut answer = String::new();
        if io::stdin().lock().read_line(&mut answer).is_err() {
            return false;
        }
        matches!(answer.trim(), "y" | "Y" | "yes")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_markdown_bold_becomes_ansi() {
        let out = markdown_to_ansi("this is **important** stuff");
        assert_eq!(out, format!("this is {}important{} stuff", BOLD, RESET));
    }

    #[test]
    fn test_markdown_plain_text_passthrough() {
        assert_eq!(markdown_to_ansi("just words"), "just words");
    }

    #[test]
    fn test_markdown_list_items() {
        let out = markdown_to_ansi("- one\n- two");
        assert!(out.contains("- one"));
        assert!(out.contains("- two"));
    }

    #[test]
    fn test_history_buffer_index_resolution() {
        let mut buffer = HistoryBuffer::default();
        buffer.render(&[
            HistoryEntry {
                id: "a".to_string(),
                label: "first".to_string(),
                is_active: false,
            },
            HistoryEntry {
                id: "b".to_string(),
                label: "second".to_string(),
                is_active: true,
            },
        ]);

        assert_eq!(buffer.id_at(1).as_deref(), Some("a"));
        assert_eq!(buffer.id_at(2).as_deref(), Some("b"));
        assert_eq!(buffer.id_at(0), None);
        assert_eq!(buffer.id_at(3), None);
    }
}
