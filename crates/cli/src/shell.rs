//! Line-oriented session that keeps one cache alive across commands.

use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::debug;

use bookjourney_core::{BookService, BookServiceError, SearchRequest};

/// One parsed input line.
#[derive(Debug, PartialEq, Eq)]
pub enum ShellCommand {
    Search(String),
    Next,
    Detail { isbn: String, user_id: i64 },
    Popular,
    Status,
    Help,
    Quit,
}

impl ShellCommand {
    pub fn parse(line: &str) -> Result<Option<Self>, String> {
        let mut words = line.split_whitespace();
        let Some(command) = words.next() else {
            return Ok(None);
        };

        let command = match command {
            "search" => {
                let query = words.collect::<Vec<_>>().join(" ");
                if query.is_empty() {
                    return Err("usage: search <query>".to_string());
                }
                ShellCommand::Search(query)
            }
            "next" => ShellCommand::Next,
            "detail" => {
                let (Some(isbn), Some(user_id)) = (words.next(), words.next()) else {
                    return Err("usage: detail <isbn> <user_id>".to_string());
                };
                let user_id = user_id
                    .parse()
                    .map_err(|_| format!("invalid user id: {}", user_id))?;
                ShellCommand::Detail {
                    isbn: isbn.to_string(),
                    user_id,
                }
            }
            "popular" => ShellCommand::Popular,
            "status" => ShellCommand::Status,
            "help" => ShellCommand::Help,
            "quit" | "exit" => ShellCommand::Quit,
            other => return Err(format!("unknown command: {}", other)),
        };
        Ok(Some(command))
    }
}

const HELP: &str = "commands: search <query> | next | detail <isbn> <user_id> | popular | status | quit";

/// Read commands from stdin until EOF or `quit`, printing one JSON value per command.
pub async fn run(service: &BookService, page_size: u32) -> std::io::Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut last: Option<SearchRequest> = None;

    while let Some(line) = lines.next_line().await? {
        let command = match ShellCommand::parse(&line) {
            Ok(Some(command)) => command,
            Ok(None) => continue,
            Err(message) => {
                println!("{}", json!({ "error": message }));
                continue;
            }
        };
        debug!(?command, "Shell command");

        let output = match command {
            ShellCommand::Search(query) => {
                let request = SearchRequest::new(query, 1, page_size);
                let result = service.search(&request).await;
                last = Some(request);
                to_output(result)
            }
            ShellCommand::Next => match last.take() {
                Some(previous) => {
                    let request = previous.next_page();
                    let result = service.search(&request).await;
                    last = Some(request);
                    to_output(result)
                }
                None => json!({ "error": "no previous search" }),
            },
            ShellCommand::Detail { isbn, user_id } => {
                to_output(service.book_detail(&isbn, user_id))
            }
            ShellCommand::Popular => to_output(service.popular_book()),
            ShellCommand::Status => to_output(Ok(service.prefetch_status())),
            ShellCommand::Help => json!({ "help": HELP }),
            ShellCommand::Quit => break,
        };
        println!("{}", output);
    }

    Ok(())
}

fn to_output<T: serde::Serialize>(result: Result<T, BookServiceError>) -> Value {
    match result {
        Ok(value) => serde_json::to_value(value).unwrap_or(Value::Null),
        Err(e) => error_json(&e),
    }
}

/// JSON body describing a service error.
pub fn error_json(e: &BookServiceError) -> Value {
    json!({
        "error": e.to_string(),
        "retryable": e.is_retryable(),
        "not_found": e.is_not_found(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_search_joins_words() {
        assert_eq!(
            ShellCommand::parse("search  the left hand of darkness "),
            Ok(Some(ShellCommand::Search(
                "the left hand of darkness".to_string()
            )))
        );
    }

    #[test]
    fn test_parse_detail() {
        assert_eq!(
            ShellCommand::parse("detail 9780000000001 42"),
            Ok(Some(ShellCommand::Detail {
                isbn: "9780000000001".to_string(),
                user_id: 42,
            }))
        );
        assert!(ShellCommand::parse("detail 9780000000001").is_err());
        assert!(ShellCommand::parse("detail 9780000000001 bob").is_err());
    }

    #[test]
    fn test_parse_simple_commands() {
        assert_eq!(ShellCommand::parse("next"), Ok(Some(ShellCommand::Next)));
        assert_eq!(ShellCommand::parse("popular"), Ok(Some(ShellCommand::Popular)));
        assert_eq!(ShellCommand::parse("exit"), Ok(Some(ShellCommand::Quit)));
        assert_eq!(ShellCommand::parse("   "), Ok(None));
        assert!(ShellCommand::parse("search").is_err());
        assert!(ShellCommand::parse("borrow dune").is_err());
    }

    #[test]
    fn test_error_json() {
        let value = error_json(&BookServiceError::NoPopularBookFound);
        assert_eq!(value["error"], "No popular book found");
        assert_eq!(value["not_found"], true);
        assert_eq!(value["retryable"], false);
    }
}
