//! services/insight/src/console/command.rs
//!
//! Defines the command protocol of the interactive console. Plain text is a
//! natural-language question; lines starting with `:` are commands.

use chrono::NaiveDate;

//=========================================================================================
// Commands Typed by the User
//=========================================================================================

/// Represents one line of console input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// A question in natural language, turned into SQL by the model.
    Ask(String),

    /// A SQL statement executed as typed.
    Sql(String),

    /// Asks the model to explain a table, the schema or any other term.
    Explain(String),

    /// Requests follow-up queries. An empty context uses the database statistics.
    Suggest(String),

    /// Statistics plus the model's analysis of them.
    Summary,

    /// Database and model status.
    Status,

    /// Lists past queries, newest first.
    History,

    /// Re-runs a past query by its 1-based position in `:history`.
    Rerun(usize),

    /// Opens an explorer listing or a single record.
    Browse(BrowseTarget),
    NextPage,
    PreviousPage,

    Help,
    Quit,

    /// A blank line.
    Empty,
}

/// What the explorer commands read from the repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BrowseTarget {
    Headers,
    HeadersBySupplier(String),
    /// Receipts dated within both days, inclusive.
    HeadersByDate(NaiveDate, NaiveDate),
    Header(i32),
    Suppliers,
    SupplierSearch(String),
    Supplier(String),
    Articles,
    ArticleSearch(String),
    Article(String),
    Category(String),
    /// Receipt lines of one article across all receipts.
    ArticleLines(String),
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum CommandError {
    #[error("Unknown command ':{0}'. Type :help for the list of commands.")]
    Unknown(String),
    #[error(":{0} needs an argument.")]
    MissingArgument(&'static str),
    #[error("'{0}' is not a valid history position.")]
    InvalidPosition(String),
    #[error("'{1}' is not a valid argument for :{0}.")]
    InvalidArgument(&'static str, String),
}

pub const HELP_TEXT: &str = "\
Type a question in plain language, or one of:
  :sql <statement>     run a SQL statement as typed
  :explain <entity>    explain a table (receipts, lines, suppliers, articles) or the schema
  :suggest [context]   suggest related queries
  :summary             database statistics with an analysis
  :status              database and model status
  :history             list recent queries
  :rerun <n>           run entry n of :history again
Database explorer:
  :headers [supplier]  receipts, newest first, optionally for one supplier code
  :dates <from> <to>   receipts dated between two days (YYYY-MM-DD)
  :header <id>         one receipt with its lines
  :lines <article>     receipt lines of one article code
  :suppliers [name]    active suppliers, or those whose name matches
  :supplier <code>     one supplier
  :articles [text]     active articles, or those whose description matches
  :article <code>      one article
  :category <name>     active articles of one category
  :next, :prev         move through the pages of the last listing
  :help                show this help
  :quit                exit";

/// Parses one line of console input.
pub fn parse_command(line: &str) -> Result<Command, CommandError> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(Command::Empty);
    }

    let Some(body) = line.strip_prefix(':') else {
        return Ok(Command::Ask(line.to_string()));
    };

    let (name, argument) = match body.split_once(char::is_whitespace) {
        Some((name, rest)) => (name, rest.trim()),
        None => (body, ""),
    };

    match name.to_ascii_lowercase().as_str() {
        "sql" => required(argument, "sql").map(Command::Sql),
        "explain" => required(argument, "explain").map(Command::Explain),
        "suggest" => Ok(Command::Suggest(argument.to_string())),
        "summary" => Ok(Command::Summary),
        "status" => Ok(Command::Status),
        "history" => Ok(Command::History),
        "rerun" => {
            let raw = required(argument, "rerun")?;
            match raw.parse::<usize>() {
                Ok(position) if position > 0 => Ok(Command::Rerun(position)),
                _ => Err(CommandError::InvalidPosition(raw)),
            }
        }
        "headers" => Ok(Command::Browse(if argument.is_empty() {
            BrowseTarget::Headers
        } else {
            BrowseTarget::HeadersBySupplier(argument.to_string())
        })),
        "dates" => parse_dates(argument).map(Command::Browse),
        "header" => {
            let raw = required(argument, "header")?;
            match raw.parse::<i32>() {
                Ok(id) => Ok(Command::Browse(BrowseTarget::Header(id))),
                Err(_) => Err(CommandError::InvalidArgument("header", raw)),
            }
        }
        "lines" => required(argument, "lines")
            .map(|code| Command::Browse(BrowseTarget::ArticleLines(code))),
        "suppliers" => Ok(Command::Browse(if argument.is_empty() {
            BrowseTarget::Suppliers
        } else {
            BrowseTarget::SupplierSearch(argument.to_string())
        })),
        "supplier" => required(argument, "supplier")
            .map(|code| Command::Browse(BrowseTarget::Supplier(code))),
        "articles" => Ok(Command::Browse(if argument.is_empty() {
            BrowseTarget::Articles
        } else {
            BrowseTarget::ArticleSearch(argument.to_string())
        })),
        "article" => required(argument, "article")
            .map(|code| Command::Browse(BrowseTarget::Article(code))),
        "category" => required(argument, "category")
            .map(|name| Command::Browse(BrowseTarget::Category(name))),
        "next" | "n" => Ok(Command::NextPage),
        "prev" | "p" => Ok(Command::PreviousPage),
        "help" | "h" | "?" => Ok(Command::Help),
        "quit" | "q" | "exit" => Ok(Command::Quit),
        other => Err(CommandError::Unknown(other.to_string())),
    }
}

fn parse_dates(argument: &str) -> Result<BrowseTarget, CommandError> {
    let raw = required(argument, "dates")?;
    let days: Vec<&str> = raw.split_whitespace().collect();
    let [from, to] = days.as_slice() else {
        return Err(CommandError::InvalidArgument("dates", raw.clone()));
    };
    let parse = |day: &str| {
        NaiveDate::parse_from_str(day, "%Y-%m-%d")
            .map_err(|_| CommandError::InvalidArgument("dates", day.to_string()))
    };
    Ok(BrowseTarget::HeadersByDate(parse(*from)?, parse(*to)?))
}

fn required(argument: &str, command: &'static str) -> Result<String, CommandError> {
    if argument.is_empty() {
        Err(CommandError::MissingArgument(command))
    } else {
        Ok(argument.to_string())
    }
}
