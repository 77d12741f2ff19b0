//! Line-oriented command surface.
//!
//! Each input line is one command. The first word names it, the second is the
//! key or count, and for `insert`/`update` the rest of the line is the value:
//!
//! ```text
//! insert 10 Record A
//! select 10
//! update 10 Record A, revised
//! delete 10
//! generate 50
//! show | clear | save | help | quit
//! ```

use rand::Rng;

use crate::storage::{Database, DatabaseError, Key};

/// Usage text printed by `help`.
pub const HELP: &str = "\
Commands:
  insert <key> <value>   add a record
  select <key>           show one record
  update <key> <value>   replace the value of a record
  delete <key>           remove a record
  generate <count>       insert <count> records with random keys
  show                   print the records table and the index
  clear                  remove every record
  save                   write the index and records to disk
  help                   print this text
  quit | exit            leave
";

/// A parsed command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Insert { key: Key, value: String },
    Select { key: Key },
    Update { key: Key, value: String },
    Delete { key: Key },
    Generate { count: usize },
    Show,
    Clear,
    Save,
    Help,
    Quit,
}

/// Result of executing a command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Text to print; keep reading commands.
    Continue(String),
    /// Stop reading commands.
    Quit,
}

impl Command {
    /// Parse one input line.
    ///
    /// # Errors
    ///
    /// Returns a [`CommandError`] for blank lines, unknown command words,
    /// missing arguments, and keys or counts that are not integers.
    pub fn parse(line: &str) -> Result<Self, CommandError> {
        let (word, rest) = split_word(line);
        if word.is_empty() {
            return Err(CommandError::Empty);
        }

        match word.to_ascii_lowercase().as_str() {
            "insert" => {
                let (key, value) = parse_key_value("insert", rest)?;
                Ok(Self::Insert { key, value })
            }
            "update" => {
                let (key, value) = parse_key_value("update", rest)?;
                Ok(Self::Update { key, value })
            }
            "select" => Ok(Self::Select {
                key: parse_key("select", rest)?,
            }),
            "delete" => Ok(Self::Delete {
                key: parse_key("delete", rest)?,
            }),
            "generate" => {
                let (count, _) = split_word(rest);
                if count.is_empty() {
                    return Err(CommandError::MissingArgument {
                        command: "generate",
                        argument: "count",
                    });
                }
                count
                    .parse::<usize>()
                    .map(|count| Self::Generate { count })
                    .map_err(|_| CommandError::InvalidCount(count.to_string()))
            }
            "show" => Ok(Self::Show),
            "clear" => Ok(Self::Clear),
            "save" => Ok(Self::Save),
            "help" => Ok(Self::Help),
            "quit" | "exit" => Ok(Self::Quit),
            _ => Err(CommandError::Unknown(word.to_string())),
        }
    }

    /// Whether the command can change the database contents.
    #[must_use]
    pub const fn is_mutating(&self) -> bool {
        matches!(
            self,
            Self::Insert { .. }
                | Self::Update { .. }
                | Self::Delete { .. }
                | Self::Generate { .. }
                | Self::Clear
        )
    }

    /// Run the command against `db`.
    ///
    /// `rng` is only consulted by `generate`.
    ///
    /// # Errors
    ///
    /// Database errors are returned unchanged; the caller reports them and
    /// keeps going.
    pub fn execute(self, db: &mut Database, rng: &mut impl Rng) -> Result<Outcome, DatabaseError> {
        let output = match self {
            Self::Insert { key, value } => {
                db.insert(key, value)?;
                format!(
                    "Record with key {key} inserted.\n{}",
                    db.render_index()
                )
            }
            Self::Select { key } => {
                let value = db.select(key)?;
                format!("Record found: key {key}, value {value}\n")
            }
            Self::Update { key, value } => {
                db.update(key, value)?;
                format!(
                    "Record with key {key} updated.\n{}",
                    db.render_index()
                )
            }
            Self::Delete { key } => {
                db.delete(key)?;
                format!(
                    "Record with key {key} deleted.\n{}",
                    db.render_index()
                )
            }
            Self::Generate { count } => {
                let report = db.generate(count, rng)?;
                format!(
                    "Generated {} records ({} duplicate keys skipped).\n",
                    report.inserted, report.duplicates
                )
            }
            Self::Show => {
                if db.is_empty() {
                    "The tree is empty.\n".to_string()
                } else {
                    format!("{}{}", db.render_table(), db.render_index())
                }
            }
            Self::Clear => {
                db.clear()?;
                "All records removed.\n".to_string()
            }
            Self::Save => {
                db.save()?;
                format!("Saved {} records.\n", db.len())
            }
            Self::Help => HELP.to_string(),
            Self::Quit => return Ok(Outcome::Quit),
        };
        Ok(Outcome::Continue(output))
    }
}

/// Split off the first whitespace-delimited word; the remainder keeps its
/// inner spacing.
fn split_word(input: &str) -> (&str, &str) {
    let input = input.trim_start();
    match input.find(char::is_whitespace) {
        Some(end) => (&input[..end], input[end..].trim_start()),
        None => (input, ""),
    }
}

fn parse_key(command: &'static str, rest: &str) -> Result<Key, CommandError> {
    let (key, _) = split_word(rest);
    if key.is_empty() {
        return Err(CommandError::MissingArgument {
            command,
            argument: "key",
        });
    }
    key.parse::<Key>()
        .map_err(|_| CommandError::InvalidKey(key.to_string()))
}

fn parse_key_value(command: &'static str, rest: &str) -> Result<(Key, String), CommandError> {
    let key = parse_key(command, rest)?;
    let (_, value) = split_word(rest);
    let value = value.trim_end();
    if value.is_empty() {
        return Err(CommandError::MissingArgument {
            command,
            argument: "value",
        });
    }
    Ok((key, value.to_string()))
}

/// Errors produced while parsing a command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandError {
    /// The line was blank.
    Empty,
    /// The first word is not a known command.
    Unknown(String),
    /// A required argument was not given.
    MissingArgument {
        command: &'static str,
        argument: &'static str,
    },
    /// The key is not an integer.
    InvalidKey(String),
    /// The count is not a non-negative integer.
    InvalidCount(String),
}

impl std::fmt::Display for CommandError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Empty => write!(f, "empty command"),
            Self::Unknown(word) => write!(f, "unknown command '{word}' (try 'help')"),
            Self::MissingArgument { command, argument } => {
                write!(f, "{command}: missing {argument}")
            }
            Self::InvalidKey(key) => write!(f, "'{key}' is not a valid integer key"),
            Self::InvalidCount(count) => write!(f, "'{count}' is not a valid count"),
        }
    }
}

impl std::error::Error for CommandError {}
