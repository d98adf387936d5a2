use std::fmt;
use std::str::FromStr;

use crate::log::LogLevel;

/// Parse failures for a single protocol line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandError {
    Empty,
    Unknown(String),
    MissingArgument {
        command: &'static str,
        argument: &'static str,
    },
    InvalidArgument {
        command: &'static str,
        reason: String,
    },
}

impl fmt::Display for CommandError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => write!(f, "empty command"),
            Self::Unknown(verb) => write!(f, "unknown command {verb}"),
            Self::MissingArgument { command, argument } => {
                write!(f, "{command} requires <{argument}>")
            }
            Self::InvalidArgument { command, reason } => write!(f, "{command}: {reason}"),
        }
    }
}

impl std::error::Error for CommandError {}

/// Target of a `CLEAR` command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClearTarget {
    All,
    Session(String),
}

/// One line of the text protocol.
///
/// Verbs are case-insensitive. Values (`PUT`, `UPDATE`) extend to the end of
/// the line and may contain spaces; keys and session ids may not.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Auth { token: String },
    Put { key: String, value: String },
    Get { key: String },
    Delete { key: String },
    Update { key: String, value: String },
    Level(Option<LogLevel>),
    Logs { n: usize },
    SessionLogs { session: String, n: usize },
    Export { session: String },
    Clear(ClearTarget),
    Shutdown,
    Quit,
}

impl Command {
    /// Whether the command may run on a connection that has not authenticated.
    #[must_use]
    pub fn allowed_before_auth(&self) -> bool {
        matches!(self, Self::Auth { .. } | Self::Quit)
    }

    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Auth { .. } => "AUTH",
            Self::Put { .. } => "PUT",
            Self::Get { .. } => "GET",
            Self::Delete { .. } => "DELETE",
            Self::Update { .. } => "UPDATE",
            Self::Level(_) => "LEVEL",
            Self::Logs { .. } => "LOGS",
            Self::SessionLogs { .. } => "SESSION_LOGS",
            Self::Export { .. } => "EXPORT",
            Self::Clear(_) => "CLEAR",
            Self::Shutdown => "SHUTDOWN",
            Self::Quit => "QUIT",
        }
    }
}

/// Splits off the next space-delimited word, skipping leading spaces.
fn next_word(s: &str) -> (&str, &str) {
    let s = s.trim_start();
    s.split_once(char::is_whitespace).unwrap_or((s, ""))
}

fn required<'a>(
    word: &'a str,
    command: &'static str,
    argument: &'static str,
) -> Result<&'a str, CommandError> {
    if word.is_empty() {
        Err(CommandError::MissingArgument { command, argument })
    } else {
        Ok(word)
    }
}

fn no_trailing(rest: &str, command: &'static str) -> Result<(), CommandError> {
    if rest.trim().is_empty() {
        Ok(())
    } else {
        Err(CommandError::InvalidArgument {
            command,
            reason: format!("unexpected trailing input {:?}", rest.trim()),
        })
    }
}

fn parse_count(word: &str, command: &'static str) -> Result<usize, CommandError> {
    let word = required(word, command, "n")?;
    word.parse::<usize>()
        .map_err(|_| CommandError::InvalidArgument {
            command,
            reason: format!("{word:?} is not a count"),
        })
}

fn key_value(rest: &str, command: &'static str) -> Result<(String, String), CommandError> {
    let (key, value) = next_word(rest);
    let key = required(key, command, "key")?;
    let value = required(value, command, "value")?;
    Ok((key.to_owned(), value.to_owned()))
}

fn single(rest: &str, command: &'static str, argument: &'static str) -> Result<String, CommandError> {
    let (word, rest) = next_word(rest);
    let word = required(word, command, argument)?;
    no_trailing(rest, command)?;
    Ok(word.to_owned())
}

impl FromStr for Command {
    type Err = CommandError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let line = line.trim_end_matches(['\r', '\n']);
        let (verb, rest) = next_word(line);
        if verb.is_empty() {
            return Err(CommandError::Empty);
        }

        match verb.to_ascii_uppercase().as_str() {
            "AUTH" => Ok(Self::Auth {
                token: single(rest, "AUTH", "token")?,
            }),
            "PUT" => {
                let (key, value) = key_value(rest, "PUT")?;
                Ok(Self::Put { key, value })
            }
            "GET" => Ok(Self::Get {
                key: single(rest, "GET", "key")?,
            }),
            "DELETE" => Ok(Self::Delete {
                key: single(rest, "DELETE", "key")?,
            }),
            "UPDATE" => {
                let (key, value) = key_value(rest, "UPDATE")?;
                Ok(Self::Update { key, value })
            }
            "LEVEL" => {
                let (word, tail) = next_word(rest);
                no_trailing(tail, "LEVEL")?;
                if word.is_empty() {
                    return Ok(Self::Level(None));
                }
                word.parse::<LogLevel>()
                    .map(|lvl| Self::Level(Some(lvl)))
                    .map_err(|e| CommandError::InvalidArgument {
                        command: "LEVEL",
                        reason: e.to_string(),
                    })
            }
            "LOGS" => {
                let (word, tail) = next_word(rest);
                no_trailing(tail, "LOGS")?;
                Ok(Self::Logs {
                    n: parse_count(word, "LOGS")?,
                })
            }
            "SESSION_LOGS" => {
                let (session, rest) = next_word(rest);
                let session = required(session, "SESSION_LOGS", "session")?.to_owned();
                let (word, tail) = next_word(rest);
                no_trailing(tail, "SESSION_LOGS")?;
                Ok(Self::SessionLogs {
                    session,
                    n: parse_count(word, "SESSION_LOGS")?,
                })
            }
            "EXPORT" => Ok(Self::Export {
                session: single(rest, "EXPORT", "session")?,
            }),
            "CLEAR" => {
                let target = single(rest, "CLEAR", "session")?;
                Ok(Self::Clear(if target == "*" {
                    ClearTarget::All
                } else {
                    ClearTarget::Session(target)
                }))
            }
            "SHUTDOWN" => {
                no_trailing(rest, "SHUTDOWN")?;
                Ok(Self::Shutdown)
            }
            "QUIT" => {
                no_trailing(rest, "QUIT")?;
                Ok(Self::Quit)
            }
            _ => Err(CommandError::Unknown(verb.to_owned())),
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]
    use super::*;

    fn parse(s: &str) -> Result<Command, CommandError> {
        s.parse()
    }

    #[test]
    fn put_value_keeps_spaces() {
        assert_eq!(
            parse("PUT name Ada Lovelace\r\n").unwrap(),
            Command::Put {
                key: "name".into(),
                value: "Ada Lovelace".into()
            }
        );
        assert_eq!(
            parse("update k  v").unwrap(),
            Command::Update {
                key: "k".into(),
                value: " v".into()
            }
        );
    }

    #[test]
    fn single_argument_commands() {
        assert_eq!(parse("GET a").unwrap(), Command::Get { key: "a".into() });
        assert_eq!(parse("delete a").unwrap(), Command::Delete { key: "a".into() });
        assert_eq!(parse("AUTH s3cret").unwrap(), Command::Auth { token: "s3cret".into() });
        assert_eq!(
            parse("EXPORT conn-2").unwrap(),
            Command::Export {
                session: "conn-2".into()
            }
        );
        assert_eq!(parse("CLEAR *").unwrap(), Command::Clear(ClearTarget::All));
        assert_eq!(
            parse("CLEAR conn-1").unwrap(),
            Command::Clear(ClearTarget::Session("conn-1".into()))
        );
    }

    #[test]
    fn log_queries() {
        assert_eq!(parse("LEVEL").unwrap(), Command::Level(None));
        assert_eq!(parse("LEVEL warn").unwrap(), Command::Level(Some(LogLevel::Warn)));
        assert_eq!(parse("LOGS 20").unwrap(), Command::Logs { n: 20 });
        assert_eq!(
            parse("SESSION_LOGS conn-4 3").unwrap(),
            Command::SessionLogs {
                session: "conn-4".into(),
                n: 3
            }
        );
        assert_eq!(parse("SHUTDOWN").unwrap(), Command::Shutdown);
        assert_eq!(parse("quit").unwrap(), Command::Quit);
    }

    #[test]
    fn rejects_malformed_lines() {
        assert_eq!(parse("   ").unwrap_err(), CommandError::Empty);
        assert_eq!(parse("FROB x").unwrap_err(), CommandError::Unknown("FROB".into()));
        assert!(matches!(
            parse("PUT onlykey").unwrap_err(),
            CommandError::MissingArgument { argument: "value", .. }
        ));
        assert!(matches!(
            parse("GET").unwrap_err(),
            CommandError::MissingArgument { argument: "key", .. }
        ));
        assert!(matches!(
            parse("GET a b").unwrap_err(),
            CommandError::InvalidArgument { .. }
        ));
        assert!(matches!(
            parse("LOGS many").unwrap_err(),
            CommandError::InvalidArgument { .. }
        ));
        assert!(matches!(
            parse("LEVEL loud").unwrap_err(),
            CommandError::InvalidArgument { .. }
        ));
        assert!(matches!(
            parse("SESSION_LOGS conn-1").unwrap_err(),
            CommandError::MissingArgument { argument: "n", .. }
        ));
    }

    #[test]
    fn only_auth_and_quit_skip_the_gate() {
        assert!(parse("AUTH t").unwrap().allowed_before_auth());
        assert!(parse("QUIT").unwrap().allowed_before_auth());
        assert!(!parse("GET k").unwrap().allowed_before_auth());
        assert!(!parse("SHUTDOWN").unwrap().allowed_before_auth());
    }
}
