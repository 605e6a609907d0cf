//! Parsing of protocol lines into commands.
//!
//! Every line maps to some [`Command`]; there is no parse failure. Requests
//! that name a known verb but leave out a required argument become
//! [`Command::MissingArgument`], and anything else becomes
//! [`Command::Unknown`], so the store task can answer both uniformly.

/// Verbs that take arguments. Used to report which command was malformed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verb {
    Get,
    Set,
    Del,
    Incr,
}

/// A single client request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Get { key: String },
    Set { key: String, value: String },
    Del { key: String },
    Incr { key: String },
    /// `QUIT` or `STOP`: close the connection without replying.
    Quit,
    /// A known verb without its required arguments.
    MissingArgument(Verb),
    /// Any other leading token, kept for logging.
    Unknown(String),
}

impl Command {
    /// Parses one line of input (with or without its trailing newline).
    ///
    /// The line is trimmed and fields are separated by runs of whitespace.
    /// Verbs are matched exactly, so `get` is an unknown command. For `SET`,
    /// the trimmed remainder after the key is the value, so values may
    /// contain inner spaces; an empty remainder is a missing argument. Extra
    /// fields after the key of `GET`, `DEL` and `INCR` are ignored.
    pub fn parse(line: &str) -> Self {
        let (verb, rest) = next_field(line.trim());
        let (key, rest) = next_field(rest);
        let key = Some(key).filter(|key| !key.is_empty()).map(str::to_string);

        match verb {
            "QUIT" | "STOP" => Command::Quit,
            "GET" => key.map_or(Command::MissingArgument(Verb::Get), |key| Command::Get {
                key,
            }),
            "DEL" => key.map_or(Command::MissingArgument(Verb::Del), |key| Command::Del {
                key,
            }),
            "INCR" => key.map_or(Command::MissingArgument(Verb::Incr), |key| {
                Command::Incr { key }
            }),
            "SET" => match (key, rest) {
                (Some(key), value) if !value.is_empty() => Command::Set {
                    key,
                    value: value.to_string(),
                },
                _ => Command::MissingArgument(Verb::Set),
            },
            other => Command::Unknown(other.to_string()),
        }
    }
}

/// Splits off the first whitespace-delimited field. The remainder has its
/// leading whitespace removed.
fn next_field(input: &str) -> (&str, &str) {
    match input.split_once(char::is_whitespace) {
        Some((field, rest)) => (field, rest.trim_start()),
        None => (input, ""),
    }
}
