//! Line commands for the interactive list session

use livesync_core::ScrollMetrics;

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Search(String),
    Filter { key: String, value: String },
    Clear(String),
    Tags(Vec<String>),
    More,
    Scroll(ScrollMetrics),
    Retry,
    Refresh,
    /// Raw push-event payload, as JSON text
    Event(String),
    Show,
    Status,
    Help,
    Quit,
}

impl Command {
    pub fn parse(input: &str) -> Result<Self, String> {
        let input = input.trim();
        let (name, rest) = match input.split_once(char::is_whitespace) {
            Some((name, rest)) => (name, rest.trim()),
            None => (input, ""),
        };

        match name {
            "search" | "s" => Ok(Command::Search(rest.to_string())),
            "filter" | "f" => {
                let (key, value) = rest
                    .split_once(char::is_whitespace)
                    .ok_or_else(|| "Usage: filter <key> <value>".to_string())?;
                Ok(Command::Filter {
                    key: key.to_string(),
                    value: value.trim().to_string(),
                })
            }
            "clear" => {
                if rest.is_empty() {
                    return Err("Usage: clear <key>".to_string());
                }
                Ok(Command::Clear(rest.to_string()))
            }
            "tags" | "t" => Ok(Command::Tags(
                rest.split_whitespace().map(str::to_string).collect(),
            )),
            "more" | "m" => Ok(Command::More),
            "scroll" => parse_scroll(rest).map(Command::Scroll),
            "retry" => Ok(Command::Retry),
            "refresh" | "r" => Ok(Command::Refresh),
            "event" | "e" => {
                if rest.is_empty() {
                    return Err("Usage: event <json>".to_string());
                }
                Ok(Command::Event(rest.to_string()))
            }
            "show" | "ls" => Ok(Command::Show),
            "status" => Ok(Command::Status),
            "help" | "?" => Ok(Command::Help),
            "quit" | "exit" | "q" => Ok(Command::Quit),
            "" => Err("Empty command".to_string()),
            other => Err(format!("Unknown command: {}. Type help for available commands.", other)),
        }
    }
}

fn parse_scroll(rest: &str) -> Result<ScrollMetrics, String> {
    let usage = || "Usage: scroll <scroll_top> <scroll_height> <client_height>".to_string();
    let values = rest
        .split_whitespace()
        .map(|v| v.parse::<f64>().map_err(|_| usage()))
        .collect::<Result<Vec<_>, _>>()?;
    match values.as_slice() {
        [top, height, client] => Ok(ScrollMetrics::new(*top, *height, *client)),
        _ => Err(usage()),
    }
}

pub fn print_help() {
    println!("Available commands:");
    println!("  search <text>            - Search (debounced); empty clears it");
    println!("  filter <key> <value>     - Set a server-side filter");
    println!("  clear <key>              - Remove a server-side filter");
    println!("  tags [tag ...]           - Show only records carrying every tag");
    println!("  more                     - Load the next page");
    println!("  scroll <top> <h> <client> - Report scroll position");
    println!("  retry                    - Retry the failed page");
    println!("  refresh                  - Reload from page 1");
    println!("  event <json>             - Inject a push event");
    println!("  show                     - Print the visible records");
    println!("  status                   - Print the list state");
    println!("  quit                     - Exit");
}
