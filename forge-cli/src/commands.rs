//! Slash-command parsing for the interactive loop.
//!
//! Integrations and projects are addressed by their 1-based position in the
//! listing.

use crate::error::CliError;
use forge_core::ProjectIcon;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Help,
    Quit,
    Integrations,
    /// Run the setup wizard for a new service.
    Add { service_name: String },
    Remove { index: usize },
    Credentials { index: usize, key: String, value: String },
    BaseUrl { index: usize, url: String },
    Projects,
    NewProject {
        name: String,
        icon: ProjectIcon,
        integrations: Vec<usize>,
    },
    Attach { project: usize, integrations: Vec<usize> },
    Rename { project: usize, name: String },
    DeleteProject { index: usize },
    Open { index: usize },
    Close,
    /// Anything that isn't a command goes to the active project.
    Say(String),
}

pub const HELP: &str = "\
Commands:
  /integrations                       list integrations
  /add <service name>                 set up a new integration
  /remove <n>                         remove integration n from everything
  /creds <n> <key> <value>            set a credential on integration n
  /base-url <n> [url]                 set or clear the base URL of integration n
  /projects                           list projects
  /new <name> [icon=<icon>] [n ...]   create a project with integrations attached
  /attach <p> [n ...]                 replace the integrations of project p
  /rename <p> <name>                  rename project p
  /delete <p>                         delete project p
  /open <p>                           chat in project p
  /close                              leave the current project
  /quit                               exit
Anything else is sent to the open project.";

fn usage(message: &str) -> CliError {
    CliError::Usage(message.to_string())
}

fn index(raw: Option<&str>, what: &str) -> Result<usize, CliError> {
    let raw = raw.ok_or_else(|| usage(&format!("missing {} number", what)))?;
    match raw.parse::<usize>() {
        Ok(n) if n > 0 => Ok(n),
        _ => Err(usage(&format!("{} is not a valid {} number", raw, what))),
    }
}

fn indexes<'a>(raw: impl Iterator<Item = &'a str>) -> Result<Vec<usize>, CliError> {
    raw.map(|r| index(Some(r), "integration")).collect()
}

fn rest(parts: &[&str]) -> String {
    parts.join(" ")
}

pub fn parse(line: &str) -> Result<Command, CliError> {
    let line = line.trim();
    let Some(body) = line.strip_prefix('/') else {
        return Ok(Command::Say(line.to_string()));
    };

    let parts: Vec<&str> = body.split_whitespace().collect();
    let Some((&name, args)) = parts.split_first() else {
        return Err(usage("empty command, try /help"));
    };

    match name {
        "help" | "h" => Ok(Command::Help),
        "quit" | "q" | "exit" => Ok(Command::Quit),
        "integrations" | "i" => Ok(Command::Integrations),
        "add" => {
            if args.is_empty() {
                return Err(usage("usage: /add <service name>"));
            }
            Ok(Command::Add {
                service_name: rest(args),
            })
        }
        "remove" => Ok(Command::Remove {
            index: index(args.first().copied(), "integration")?,
        }),
        "creds" => {
            let index = index(args.first().copied(), "integration")?;
            let key = args
                .get(1)
                .ok_or_else(|| usage("usage: /creds <n> <key> <value>"))?;
            Ok(Command::Credentials {
                index,
                key: key.to_string(),
                value: rest(args.get(2..).unwrap_or_default()),
            })
        }
        "base-url" => Ok(Command::BaseUrl {
            index: index(args.first().copied(), "integration")?,
            url: rest(args.get(1..).unwrap_or_default()),
        }),
        "projects" | "p" => Ok(Command::Projects),
        "new" => parse_new(args),
        "attach" => Ok(Command::Attach {
            project: index(args.first().copied(), "project")?,
            integrations: indexes(args.iter().skip(1).copied())?,
        }),
        "rename" => {
            let project = index(args.first().copied(), "project")?;
            let name = rest(args.get(1..).unwrap_or_default());
            if name.is_empty() {
                return Err(usage("usage: /rename <p> <name>"));
            }
            Ok(Command::Rename { project, name })
        }
        "delete" => Ok(Command::DeleteProject {
            index: index(args.first().copied(), "project")?,
        }),
        "open" | "o" => Ok(Command::Open {
            index: index(args.first().copied(), "project")?,
        }),
        "close" => Ok(Command::Close),
        other => Err(usage(&format!("unknown command /{}, try /help", other))),
    }
}

/// `/new <name words> [icon=<icon>] [n ...]`. Trailing numbers attach
/// integrations; everything before them is the name.
fn parse_new(args: &[&str]) -> Result<Command, CliError> {
    let mut icon = ProjectIcon::default();
    let mut words = Vec::new();
    for arg in args {
        match arg.strip_prefix("icon=") {
            Some(raw) => icon = raw.parse().map_err(|e| usage(&format!("{}", e)))?,
            None => words.push(*arg),
        }
    }

    let split = words
        .iter()
        .rposition(|w| w.parse::<usize>().is_err())
        .map_or(0, |last_word| last_word + 1);
    let (name, numbers) = words.split_at(split);
    if name.is_empty() {
        return Err(usage("usage: /new <name> [icon=<icon>] [n ...]"));
    }

    Ok(Command::NewProject {
        name: rest(name),
        icon,
        integrations: indexes(numbers.iter().copied())?,
    })
}


#[cfg(test)]
mod prop_tests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        /// Any line parses or yields a usage error; plain text is passed through.
        #[test]
        fn prop_parse_is_total(line in "\\PC{0,40}") {
            match parse(&line) {
                Ok(Command::Say(text)) => prop_assert_eq!(text, line.trim()),
                Ok(_) => prop_assert!(line.trim().starts_with('/')),
                Err(e) => prop_assert!(matches!(e, CliError::Usage(_))),
            }
        }
    }
}
