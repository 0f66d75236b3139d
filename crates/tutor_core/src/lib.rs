pub mod chat;
pub mod daily;
pub mod domain;
pub mod history;
pub mod memory;
pub mod navigation;
pub mod ports;
pub mod prompts;
pub mod reading_coach;
pub mod recommended;
pub mod writing_coach;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use domain::{Article, ChatTurn, Lesson, ProfileDefaults, Session, SignUpOutcome, ViewState};
pub use ports::{AuthService, Clock, ContentStore, KeyValueStore, LanguageModel, PortError, PortResult,
    SystemClock};
