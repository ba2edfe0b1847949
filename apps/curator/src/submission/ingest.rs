//! Ingestion: one poll cycle of the submission pipeline.
//!
//! Flow: fetch updates after the cursor → sort by sequence → for each unseen
//! update: allow-list check → commands → session load/recovery → decide →
//! side effect → commit session → reply → advance cursor.
//!
//! Errors are isolated per update. A failed update still moves the cursor so an
//! unrecoverable message is never retried forever.

use chrono::{DateTime, Utc};
use tracing::{debug, error, info, warn};

use crate::config::Layout;
use crate::errors::AppError;
use crate::staging::naming::{candidate_base, ensure_unique_base};
use crate::staging::{ArtifactKind, PermanentStores, StagingArea};
use crate::store::catalog::Catalog;
use crate::store::cursor::{Cursor, CursorStore};
use crate::store::session::{SessionState, SessionStore, Step};
use crate::submission::commands::Command;
use crate::submission::fsm::{decide, Action, Input};
use crate::submission::replies::{
    EXPECTED_PROMPT, EXPECTED_TITLE, PHOTO_SAVED, PROMPT_SAVED, RESET_DONE, SUBMISSION_COMPLETE,
    UNEXPECTED_INPUT,
};
use crate::transport::{ImageVariant, Message, Transport, Update};

#[derive(Debug, Clone)]
pub struct IngestSettings {
    /// The only chat whose messages are accepted.
    pub source_chat: i64,
    pub reset_command: String,
}

/// Counters for one poll cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub fetched: usize,
    pub handled: usize,
    pub skipped: usize,
    pub failed: usize,
    pub cursor: i64,
}

/// Result of performing an action, before the session is committed.
struct Outcome {
    next: SessionState,
    /// Artifacts written by this step, removed again if the session commit fails.
    written: Vec<(String, ArtifactKind)>,
    reply: Option<String>,
}

impl Outcome {
    fn stay(state: &SessionState) -> Self {
        Self {
            next: state.clone(),
            written: Vec::new(),
            reply: None,
        }
    }
}

pub struct Ingestor<T: Transport> {
    transport: T,
    cursor: CursorStore,
    sessions: SessionStore,
    staging: StagingArea,
    stores: PermanentStores,
    catalog: Catalog,
    settings: IngestSettings,
    clock: fn() -> DateTime<Utc>,
}

impl<T: Transport> Ingestor<T> {
    /// Opens the cursor and session documents under `layout`.
    pub fn open(transport: T, layout: &Layout, settings: IngestSettings) -> Result<Self, AppError> {
        Ok(Self {
            transport,
            cursor: CursorStore::open(&layout.cursor_file)?,
            sessions: SessionStore::open(&layout.sessions_file)?,
            staging: StagingArea::new(&layout.staging_dir),
            stores: PermanentStores::new(
                &layout.image_dir,
                &layout.prompt_dir,
                &layout.image_subdir,
                &layout.prompt_subdir,
            ),
            catalog: Catalog::new(&layout.catalog_file),
            settings,
            clock: Utc::now,
        })
    }

    #[cfg(test)]
    fn with_clock(mut self, clock: fn() -> DateTime<Utc>) -> Self {
        self.clock = clock;
        self
    }

    #[cfg(test)]
    pub(crate) fn transport(&self) -> &T {
        &self.transport
    }

    pub fn cursor(&self) -> Cursor {
        self.cursor.current()
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    /// Fetches and processes one batch. Only a failed fetch or a failed final
    /// cursor write is returned as an error.
    pub async fn run_cycle(&mut self) -> Result<CycleReport, AppError> {
        let since = self.cursor.current().last_sequence;
        let mut updates = self.transport.fetch_updates(since).await?;
        updates.sort_by_key(|u| u.sequence);

        let mut report = CycleReport {
            fetched: updates.len(),
            ..CycleReport::default()
        };

        for update in &updates {
            if self.cursor.current().covers(update.sequence) {
                report.skipped += 1;
                continue;
            }

            match self.handle_update(update).await {
                Ok(()) => report.handled += 1,
                Err(e) => {
                    report.failed += 1;
                    error!(sequence = update.sequence, "Failed to process update: {e}");
                }
            }

            self.cursor.advance(update.sequence);
            if let Err(e) = self.cursor.flush() {
                warn!(sequence = update.sequence, "Cursor not saved yet: {e}");
            }
        }

        if self.cursor.flush()? {
            debug!("Cursor saved to {}", self.cursor.path().display());
        }
        report.cursor = self.cursor.current().last_sequence;
        Ok(report)
    }

    async fn handle_update(&mut self, update: &Update) -> Result<(), AppError> {
        let Some(message) = &update.message else {
            debug!(sequence = update.sequence, "Skipping update without a message");
            return Ok(());
        };
        if message.chat_id != self.settings.source_chat {
            debug!(
                sequence = update.sequence,
                chat_id = message.chat_id,
                "Skipping message from a chat that is not allow-listed"
            );
            return Ok(());
        }

        let input = Input::classify(message, &self.settings.reset_command);
        if let Input::Text(text) = input {
            if let Some(command) = Command::parse(text) {
                let reply =
                    command.answer(&self.staging, &self.catalog, &self.settings.reset_command)?;
                self.notify(message.chat_id, &reply).await;
                return Ok(());
            }
        }

        let submitter = message.submitter_id.as_str();
        let state = self.load_session(message).await?;
        let action = decide(&state, input);
        debug!(
            sequence = update.sequence,
            submitter = %submitter,
            step = ?state.step(),
            "Applying {action:?}"
        );

        let outcome = match self.apply(&state, action).await {
            Ok(outcome) => outcome,
            Err(e) => {
                self.notify(message.chat_id, e.user_notice()).await;
                return Err(e);
            }
        };

        if outcome.next != state {
            if let Err(e) = self.sessions.put(submitter, &outcome.next) {
                for (base, kind) in &outcome.written {
                    if let Err(cleanup) = self.staging.remove(base, *kind) {
                        warn!(base = %base, "Could not roll back {kind:?}: {cleanup}");
                    }
                }
                self.notify(message.chat_id, e.user_notice()).await;
                return Err(e);
            }
        }

        if let Some(reply) = &outcome.reply {
            self.notify(message.chat_id, reply).await;
        }
        Ok(())
    }

    /// Loads the submitter's session, resetting it to idle when it cannot be resumed.
    async fn load_session(&mut self, message: &Message) -> Result<SessionState, AppError> {
        let submitter = message.submitter_id.as_str();
        let problem = match self.sessions.get(submitter) {
            Ok(state) => match self.missing_prerequisite(&state) {
                None => return Ok(state),
                Some(problem) => problem,
            },
            Err(AppError::MalformedState(reason)) => reason,
            Err(e) => return Err(e),
        };

        let err = AppError::MalformedState(problem);
        warn!(submitter = %submitter, "Resetting session: {err}");
        self.sessions.put(submitter, &SessionState::Idle)?;
        self.notify(message.chat_id, err.user_notice()).await;
        Ok(SessionState::Idle)
    }

    /// Describes the first staged artifact the session relies on that is gone.
    fn missing_prerequisite(&self, state: &SessionState) -> Option<String> {
        let (base, needed): (&str, &[ArtifactKind]) = match state {
            SessionState::Idle => return None,
            SessionState::AwaitingPrompt { base } => (base, &[ArtifactKind::Image]),
            SessionState::AwaitingTitle { base } => {
                (base, &[ArtifactKind::Image, ArtifactKind::Prompt])
            }
        };
        needed
            .iter()
            .find(|kind| !self.staging.has(base, **kind))
            .map(|kind| format!("{base} has no staged {kind:?}"))
    }

    async fn apply(&self, state: &SessionState, action: Action<'_>) -> Result<Outcome, AppError> {
        match action {
            Action::Reset => Ok(Outcome {
                next: SessionState::Idle,
                written: Vec::new(),
                reply: Some(RESET_DONE.to_string()),
            }),
            Action::Ignore => Ok(Outcome::stay(state)),
            Action::RejectUnexpected => {
                let expected = match state.step() {
                    Step::AwaitingTitle => EXPECTED_TITLE,
                    Step::AwaitingPrompt | Step::Idle => EXPECTED_PROMPT,
                };
                Ok(Outcome {
                    reply: Some(
                        UNEXPECTED_INPUT
                            .replace("{expected}", expected)
                            .replace("{reset_command}", &self.settings.reset_command),
                    ),
                    ..Outcome::stay(state)
                })
            }
            Action::StageImage { variant, caption } => self.stage_image(variant, caption).await,
            Action::StagePrompt { base, text } => {
                self.staging.write(&base, ArtifactKind::Prompt, text.as_bytes())?;
                debug!(base = %base, "Staged prompt");
                Ok(Outcome {
                    next: SessionState::AwaitingTitle { base: base.clone() },
                    written: vec![(base, ArtifactKind::Prompt)],
                    reply: Some(PROMPT_SAVED.to_string()),
                })
            }
            Action::StageTitle { base, text } => {
                self.staging.write(&base, ArtifactKind::Title, text.as_bytes())?;
                info!(base = %base, "Submission complete");
                Ok(Outcome {
                    next: SessionState::Idle,
                    written: vec![(base, ArtifactKind::Title)],
                    reply: Some(SUBMISSION_COMPLETE.to_string()),
                })
            }
        }
    }

    async fn stage_image(
        &self,
        variant: &ImageVariant,
        caption: Option<&str>,
    ) -> Result<Outcome, AppError> {
        let candidate = candidate_base((self.clock)());
        let base = ensure_unique_base(&candidate, &self.staging, &self.stores);

        let content = self.transport.download(&variant.file_ref).await?;
        self.staging.write(&base, ArtifactKind::Image, &content)?;
        info!(base = %base, bytes = content.len(), "Staged image");
        let mut written = vec![(base.clone(), ArtifactKind::Image)];

        if let Some(caption) = caption {
            match self.staging.write(&base, ArtifactKind::Prompt, caption.as_bytes()) {
                Ok(_) => {
                    written.push((base.clone(), ArtifactKind::Prompt));
                    return Ok(Outcome {
                        next: SessionState::AwaitingTitle { base },
                        written,
                        reply: Some(PROMPT_SAVED.to_string()),
                    });
                }
                // The image alone is a valid step; ask for the prompt instead.
                Err(e) => warn!(base = %base, "Could not stage caption as prompt: {e}"),
            }
        }

        Ok(Outcome {
            next: SessionState::AwaitingPrompt { base },
            written,
            reply: Some(PHOTO_SAVED.to_string()),
        })
    }

    /// Best-effort reply. A failed send is logged and otherwise ignored.
    async fn notify(&self, chat_id: i64, text: &str) {
        if let Err(e) = self.transport.send_text(chat_id, text).await {
            warn!(chat_id, "Could not send reply: {e}");
        }
    }
}
