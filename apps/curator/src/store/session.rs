use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::errors::AppError;
use crate::store::{read_json, write_json_atomic};

/// Where a submitter is in the photo → prompt → title exchange.
///
/// The pending base lives inside the awaiting variants, so a session can never
/// be waiting without knowing which item it is building.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum SessionState {
    #[default]
    Idle,
    AwaitingPrompt {
        base: String,
    },
    AwaitingTitle {
        base: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Step {
    Idle,
    AwaitingPrompt,
    AwaitingTitle,
}

/// On-disk shape of one session: `{ "step": ..., "pendingBase": ... }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionRecord {
    pub step: Step,
    pub pending_base: Option<String>,
}

impl SessionState {
    pub fn step(&self) -> Step {
        match self {
            SessionState::Idle => Step::Idle,
            SessionState::AwaitingPrompt { .. } => Step::AwaitingPrompt,
            SessionState::AwaitingTitle { .. } => Step::AwaitingTitle,
        }
    }

    pub fn pending_base(&self) -> Option<&str> {
        match self {
            SessionState::Idle => None,
            SessionState::AwaitingPrompt { base } | SessionState::AwaitingTitle { base } => {
                Some(base)
            }
        }
    }

    pub fn to_record(&self) -> SessionRecord {
        SessionRecord {
            step: self.step(),
            pending_base: self.pending_base().map(str::to_string),
        }
    }
}

impl TryFrom<SessionRecord> for SessionState {
    type Error = AppError;

    fn try_from(record: SessionRecord) -> Result<Self, Self::Error> {
        match (record.step, record.pending_base) {
            (Step::Idle, None) => Ok(SessionState::Idle),
            (Step::AwaitingPrompt, Some(base)) if !base.is_empty() => {
                Ok(SessionState::AwaitingPrompt { base })
            }
            (Step::AwaitingTitle, Some(base)) if !base.is_empty() => {
                Ok(SessionState::AwaitingTitle { base })
            }
            (step, base) => Err(AppError::MalformedState(format!(
                "step {step:?} with pendingBase {base:?}"
            ))),
        }
    }
}

/// Per-submitter sessions, persisted as one mapping keyed by submitter id.
/// Every `put` rewrites the document before returning.
pub struct SessionStore {
    path: PathBuf,
    records: BTreeMap<String, SessionRecord>,
}

impl SessionStore {
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, AppError> {
        let path = path.into();
        let records = read_json(&path)?.unwrap_or_default();
        Ok(Self { path, records })
    }

    /// Current state for `submitter`; unknown submitters are idle.
    pub fn get(&self, submitter: &str) -> Result<SessionState, AppError> {
        match self.records.get(submitter) {
            None => Ok(SessionState::Idle),
            Some(record) => SessionState::try_from(record.clone()),
        }
    }

    /// Stores `state` and persists immediately. On a failed write the
    /// in-memory mapping is rolled back so memory never runs ahead of disk.
    pub fn put(&mut self, submitter: &str, state: &SessionState) -> Result<(), AppError> {
        let previous = self
            .records
            .insert(submitter.to_string(), state.to_record());
        if let Err(e) = write_json_atomic(&self.path, &self.records) {
            match previous {
                Some(record) => self.records.insert(submitter.to_string(), record),
                None => self.records.remove(submitter),
            };
            return Err(e);
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }
}
