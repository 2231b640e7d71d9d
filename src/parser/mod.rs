pub mod types;
pub mod yaml;

pub use types::*;
pub use yaml::{default_suite, load_suite, parse_suite_content, parse_suite_file, validate_suite};

use thiserror::Error;

/// Structural problems in a scenario table
#[derive(Debug, Error)]
pub enum SuiteError {
    #[error("suite '{0}' has no scenarios")]
    Empty(String),

    #[error("scenario without a name")]
    UnnamedScenario,

    #[error("scenario '{0}' has no category")]
    MissingCategory(String),

    #[error("scenario '{0}' has no steps")]
    NoSteps(String),

    #[error("{scenario} / {step}: no expected status")]
    NoStatus { scenario: String, step: String },

    #[error("{scenario} / {step}: body and multipart are mutually exclusive")]
    BodyAndMultipart { scenario: String, step: String },

    #[error("{scenario} / {step}: field check on '{path}' has no rule")]
    EmptyFieldCheck {
        scenario: String,
        step: String,
        path: String,
    },

    #[error("{scenario} / {step}: actor '{actor}' is not configured")]
    UnknownActor {
        scenario: String,
        step: String,
        actor: String,
    },
}
