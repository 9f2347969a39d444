use crate::render::{HistoryBuffer, StdinConfirm, TerminalTranscript};
use anyhow::Result;
use hookchat_core::session::Delivery;
use hookchat_core::store::Theme;
use hookchat_core::{
    ChatSession, ConversationRepository, FileStore, KeyValueStore, Settings, StateStore,
    WebhookClient,
};
use std::io::{self, BufRead, Write};
use std::sync::Arc;
use std::time::Duration;

pub async fn run(settings: Settings) -> Result<()> {
    let kv: Arc<dyn KeyValueStore> = match &settings.data_dir {
        Some(dir) => Arc::new(FileStore::with_dir(dir.clone())?),
        None => Arc::new(FileStore::new()?),
    };
    let state = StateStore::new(kv);

    let repo = ConversationRepository::hydrate(state.clone())?;
    let exchange = Arc::new(WebhookClient::with_timeout(
        &settings.webhook_url,
        Duration::from_secs(settings.request_timeout_secs),
    )?);

    let history = HistoryBuffer::default();
    let mut session = ChatSession::new(
        repo,
        exchange,
        Box::new(TerminalTranscript),
        Box::new(history.clone()),
        Box::new(StdinConfirm),
        settings.exchange_policy,
    );

    if let Some(pinned) = state.pinned_message()? {
        if pinned.visible {
            println!("pinned: {}", pinned.text);
        }
    }
    session.refresh();
    println!("type a message to send it, /help for commands");

    let stdin = io::stdin();
    loop {
        print!("> ");
        io::stdout().flush()?;

        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            break;
        }
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        if let Some(command) = line.strip_prefix('/') {
            if !handle_command(command, &mut session, &history, &state)? {
                break;
            }
        } else {
            // The pending marker is a printed line; when no render follows
            // it, say why instead of leaving it dangling.
            match session.send_message(line).await? {
                Some(Delivery::NoReply) => println!("(no reply)"),
                Some(Delivery::Discarded) => println!("(reply discarded)"),
                _ => {}
            }
        }
    }

    Ok(())
}

/// Dispatch one slash command. Returns `false` when the REPL should exit.
fn handle_command(
    input: &str,
    session: &mut ChatSession,
    history: &HistoryBuffer,
    state: &StateStore,
) -> Result<bool> {
    let mut parts = input.splitn(2, char::is_whitespace);
    let command = parts.next().unwrap_or("");
    let rest = parts.next().unwrap_or("").trim();

    match command {
        "help" => print_help(),
        "new" => {
            session.new_chat()?;
        }
        "list" => history.print(),
        "open" => match resolve_index(rest, history) {
            Some(id) => {
                if !session.open(&id) {
                    println!("conversation is gone");
                }
            }
            None => println!("usage: /open <n>"),
        },
        "rename" => {
            let mut args = rest.splitn(2, char::is_whitespace);
            let index = args.next().unwrap_or("");
            let title = args.next().unwrap_or("").trim();
            match resolve_index(index, history) {
                Some(id) => {
                    if !session.rename(&id, title)? {
                        println!("nothing renamed");
                    }
                }
                None => println!("usage: /rename <n> <title>"),
            }
        }
        "edit" => {
            let mut args = rest.splitn(2, char::is_whitespace);
            let seq = args.next().and_then(|s| s.parse::<u64>().ok());
            let body = args.next().unwrap_or("").trim();
            match seq {
                Some(seq) if !body.is_empty() => {
                    if !session.edit_message(seq, body)? {
                        println!("no such message");
                    }
                }
                _ => println!("usage: /edit <seq> <new text>"),
            }
        }
        "clear" => {
            session.clear_active()?;
        }
        "delete" => match resolve_index(rest, history) {
            Some(id) => {
                session.delete(&id)?;
            }
            None => println!("usage: /delete <n>"),
        },
        "delete-all" => {
            session.delete_all()?;
        }
        "search" => {
            let hits = session.search(rest);
            if hits.is_empty() {
                println!("no matches");
            }
            for entry in hits {
                let marker = if entry.is_active { "*" } else { " " };
                println!("{} {}", marker, entry.label);
            }
        }
        "theme" => {
            let next = match state.theme()? {
                Theme::Dark => Theme::Light,
                Theme::Light => Theme::Dark,
            };
            state.set_theme(next)?;
            println!(
                "theme: {}",
                if next == Theme::Dark { "dark" } else { "light" }
            );
        }
        "pin" => {
            if rest.is_empty() {
                println!("usage: /pin <text>");
            } else {
                state.set_pinned_message(rest, true)?;
                println!("pinned: {}", rest);
            }
        }
        "unpin" => {
            state.set_pinned_visible(false)?;
        }
        "quit" | "exit" => return Ok(false),
        other => println!("unknown command: /{} (try /help)", other),
    }
    Ok(true)
}

fn resolve_index(arg: &str, history: &HistoryBuffer) -> Option<String> {
    history.id_at(arg.parse::<usize>().ok()?)
}

fn print_help() {
    println!("commands:");
    println!("  /new                start a new conversation");
    println!("  /list               show the conversation list");
    println!("  /open <n>           switch to conversation n");
    println!("  /rename <n> <title> rename conversation n");
    println!("  /edit <seq> <text>  edit a message of the active conversation");
    println!("  /clear              empty the active conversation");
    println!("  /delete <n>         delete conversation n");
    println!("  /delete-all         delete every conversation");
    println!("  /search <q>         filter the conversation list");
    println!("  /theme              toggle the dark theme flag");
    println!("  /pin <text>         pin a note above the transcript");
    println!("  /unpin              hide the pinned note");
    println!("  /quit               exit");
}
