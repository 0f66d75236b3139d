//! services/tutor/src/command.rs
//!
//! The line commands understood by the `tutor` shell.

use std::path::PathBuf;
use std::str::FromStr;

use tutor_core::domain::ViewState;
use tutor_core::writing_coach::Phase;

pub const HELP: &str = "\
go <view>                 switch screen (home, reading-coach, writing-coach, chat, ...)
back                      leave the article reader
signin <email> <pass>     sign in
signup <email> <pass>     create an account
confirm <token>           confirm a new account's email
signout                   sign out
draft <text>              replace the writing draft
load <file.txt|file.md>   load the draft from a file
done                      mark the draft as complete
run <phase>               style | evaluation | improvement | refinement | followup
clear                     hide the displayed analysis
save                      save the draft and its analyses
lesson [new [topic]]      show the current lesson, or generate a new one
answer <option>           answer the current question
next | prev               move through the quiz
results                   show the quiz score
recommended [refresh]     curated news and blog posts
open <n>                  read recommended item n
daily                     today's generated suggestions
chat <message>            talk to the tutor
history | essays          past quizzes or saved essays
status                    show the navigation state
quit";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Go(ViewState),
    Back,
    SignIn { email: String, password: String },
    SignUp { email: String, password: String },
    Confirm(String),
    SignOut,
    Draft(String),
    LoadDraft(PathBuf),
    Done,
    Run(Phase),
    Clear,
    Save,
    Lesson,
    NewLesson(Option<String>),
    Answer(u32),
    Next,
    Previous,
    Results,
    Recommended { refresh: bool },
    Open(usize),
    Daily,
    Chat(String),
    History,
    Essays,
    Status,
    Help,
    Quit,
}

#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("Type a command, or 'help'.")]
    Empty,
    #[error("Unknown command '{0}'. Type 'help'.")]
    Unknown(String),
    #[error("Usage: {0}")]
    Usage(&'static str),
    #[error("{0}")]
    Invalid(String),
}

impl Command {
    /// The sign-in-only screen a command works on, if any.
    pub fn screen(&self) -> Option<ViewState> {
        match self {
            Command::Draft(_)
            | Command::LoadDraft(_)
            | Command::Done
            | Command::Run(_)
            | Command::Clear
            | Command::Save => Some(ViewState::WritingCoach),
            Command::Lesson
            | Command::NewLesson(_)
            | Command::Answer(_)
            | Command::Next
            | Command::Previous
            | Command::Results => Some(ViewState::ReadingCoach),
            _ => None,
        }
    }
}

fn credentials(rest: &str, usage: &'static str) -> Result<(String, String), ParseError> {
    let mut parts = rest.split_whitespace();
    match (parts.next(), parts.next(), parts.next()) {
        (Some(email), Some(password), None) => Ok((email.to_string(), password.to_string())),
        _ => Err(ParseError::Usage(usage)),
    }
}

fn required<'a>(rest: &'a str, usage: &'static str) -> Result<&'a str, ParseError> {
    if rest.is_empty() {
        return Err(ParseError::Usage(usage));
    }
    Ok(rest)
}

impl FromStr for Command {
    type Err = ParseError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let line = line.trim();
        let (word, rest) = match line.split_once(char::is_whitespace) {
            Some((word, rest)) => (word, rest.trim()),
            None => (line, ""),
        };

        let command = match word.to_lowercase().as_str() {
            "" => return Err(ParseError::Empty),
            "go" => Command::Go(
                required(rest, "go <view>")?
                    .parse()
                    .map_err(ParseError::Invalid)?,
            ),
            "back" => Command::Back,
            "signin" => {
                let (email, password) = credentials(rest, "signin <email> <password>")?;
                Command::SignIn { email, password }
            }
            "signup" => {
                let (email, password) = credentials(rest, "signup <email> <password>")?;
                Command::SignUp { email, password }
            }
            "confirm" => Command::Confirm(required(rest, "confirm <token>")?.to_string()),
            "signout" => Command::SignOut,
            "draft" => Command::Draft(rest.to_string()),
            "load" => Command::LoadDraft(PathBuf::from(required(rest, "load <file>")?)),
            "done" => Command::Done,
            "run" => Command::Run(
                required(rest, "run <phase>")?
                    .parse()
                    .map_err(ParseError::Invalid)?,
            ),
            "clear" => Command::Clear,
            "save" => Command::Save,
            "lesson" => match rest.split_once(char::is_whitespace) {
                _ if rest.is_empty() => Command::Lesson,
                _ if rest == "new" => Command::NewLesson(None),
                Some(("new", topic)) => Command::NewLesson(Some(topic.trim().to_string())),
                _ => return Err(ParseError::Usage("lesson [new [topic]]")),
            },
            "answer" => Command::Answer(
                required(rest, "answer <option>")?
                    .parse()
                    .map_err(|_| ParseError::Usage("answer <option>"))?,
            ),
            "next" => Command::Next,
            "prev" => Command::Previous,
            "results" => Command::Results,
            "recommended" => match rest {
                "" => Command::Recommended { refresh: false },
                "refresh" => Command::Recommended { refresh: true },
                _ => return Err(ParseError::Usage("recommended [refresh]")),
            },
            "open" => Command::Open(
                required(rest, "open <n>")?
                    .parse()
                    .map_err(|_| ParseError::Usage("open <n>"))?,
            ),
            "daily" => Command::Daily,
            "chat" => Command::Chat(rest.to_string()),
            "history" => Command::History,
            "essays" => Command::Essays,
            "status" => Command::Status,
            "help" => Command::Help,
            "quit" | "exit" => Command::Quit,
            other => return Err(ParseError::Unknown(other.to_string())),
        };
        Ok(command)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_navigation_and_phases() {
        assert_eq!("go writing-coach".parse::<Command>(), Ok(Command::Go(ViewState::WritingCoach)));
        assert_eq!("  run refiner ".parse::<Command>(), Ok(Command::Run(Phase::Refinement)));
        assert!(matches!("go nowhere".parse::<Command>(), Err(ParseError::Invalid(_))));
    }

    #[test]
    fn draft_keeps_the_whole_line() {
        assert_eq!(
            "draft The dog  run fast.".parse::<Command>(),
            Ok(Command::Draft("The dog  run fast.".to_string()))
        );
        assert_eq!("draft".parse::<Command>(), Ok(Command::Draft(String::new())));
    }

    #[test]
    fn credentials_need_exactly_two_words() {
        assert_eq!(
            "signin ana@example.com hunter22".parse::<Command>(),
            Ok(Command::SignIn {
                email: "ana@example.com".to_string(),
                password: "hunter22".to_string()
            })
        );
        assert_eq!(
            "signup ana@example.com".parse::<Command>(),
            Err(ParseError::Usage("signup <email> <password>"))
        );
    }

    #[test]
    fn confirm_needs_a_token() {
        assert_eq!(
            "confirm 9f2c41".parse::<Command>(),
            Ok(Command::Confirm("9f2c41".to_string()))
        );
        assert_eq!("confirm".parse::<Command>(), Err(ParseError::Usage("confirm <token>")));
    }

    #[test]
    fn coach_commands_name_their_screen() {
        assert_eq!(Command::Run(Phase::Style).screen(), Some(ViewState::WritingCoach));
        assert_eq!(Command::Save.screen(), Some(ViewState::WritingCoach));
        assert_eq!(Command::Answer(2).screen(), Some(ViewState::ReadingCoach));
        assert_eq!(Command::Results.screen(), Some(ViewState::ReadingCoach));
        assert_eq!(Command::Daily.screen(), None);
        assert_eq!(Command::Recommended { refresh: false }.screen(), None);
    }

    #[test]
    fn lesson_variants() {
        assert_eq!("lesson".parse::<Command>(), Ok(Command::Lesson));
        assert_eq!("lesson new".parse::<Command>(), Ok(Command::NewLesson(None)));
        assert_eq!(
            "lesson new Coral Reefs".parse::<Command>(),
            Ok(Command::NewLesson(Some("Coral Reefs".to_string())))
        );
        assert!("lesson old".parse::<Command>().is_err());
    }

    #[test]
    fn rejects_unknown_and_empty_lines() {
        assert_eq!("".parse::<Command>(), Err(ParseError::Empty));
        assert_eq!("dance".parse::<Command>(), Err(ParseError::Unknown("dance".to_string())));
        assert_eq!("answer b".parse::<Command>(), Err(ParseError::Usage("answer <option>")));
    }
}
