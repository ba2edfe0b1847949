//! Submission state machine: photo → prompt → title.
//!
//! `decide` is pure. It looks at the current session and the classified input and
//! says what should happen; the ingestor performs the side effect and only then
//! commits the next state.

use crate::store::session::SessionState;
use crate::transport::{ImageVariant, Message};

/// A message reduced to what the state machine cares about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Input<'a> {
    Reset,
    Image {
        variant: &'a ImageVariant,
        caption: Option<&'a str>,
    },
    Text(&'a str),
    Unsupported,
}

impl<'a> Input<'a> {
    pub fn classify(message: &'a Message, reset_command: &str) -> Self {
        let text = message.trimmed_text();
        if text.is_some_and(|t| command_matches(t, reset_command)) {
            return Input::Reset;
        }
        if let Some(variant) = message.best_image() {
            return Input::Image {
                variant,
                caption: text,
            };
        }
        match text {
            Some(text) => Input::Text(text),
            None => Input::Unsupported,
        }
    }
}

/// `/cmd` or `/cmd@botname`, compared case-insensitively.
pub fn command_matches(text: &str, command: &str) -> bool {
    let head = text.split_whitespace().next().unwrap_or("");
    let head = head.split('@').next().unwrap_or(head);
    head.eq_ignore_ascii_case(command)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action<'a> {
    /// Abort whatever is in flight and return to idle.
    Reset,
    /// Download the image under a fresh base; a caption doubles as the prompt.
    StageImage {
        variant: &'a ImageVariant,
        caption: Option<&'a str>,
    },
    StagePrompt { base: String, text: &'a str },
    /// Writes the title marker, which completes the submission.
    StageTitle { base: String, text: &'a str },
    /// Tell the submitter the input does not fit the current step.
    RejectUnexpected,
    Ignore,
}

pub fn decide<'a>(state: &SessionState, input: Input<'a>) -> Action<'a> {
    match (state, input) {
        (_, Input::Reset) => Action::Reset,

        (SessionState::Idle, Input::Image { variant, caption }) => {
            Action::StageImage { variant, caption }
        }
        (SessionState::Idle, _) => Action::Ignore,

        (SessionState::AwaitingPrompt { base }, Input::Text(text)) => Action::StagePrompt {
            base: base.clone(),
            text,
        },
        (SessionState::AwaitingPrompt { .. }, _) => Action::RejectUnexpected,

        (SessionState::AwaitingTitle { base }, Input::Text(text)) => Action::StageTitle {
            base: base.clone(),
            text,
        },
        (SessionState::AwaitingTitle { .. }, _) => Action::RejectUnexpected,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message(text: Option<&str>, images: &[(&str, u64)]) -> Message {
        Message {
            chat_id: -100,
            submitter_id: "U1".to_string(),
            text: text.map(str::to_string),
            image_variants: images
                .iter()
                .map(|(r, res)| ImageVariant {
                    file_ref: r.to_string(),
                    resolution: *res,
                })
                .collect(),
        }
    }

    fn awaiting_prompt() -> SessionState {
        SessionState::AwaitingPrompt {
            base: "item_1000".to_string(),
        }
    }

    fn awaiting_title() -> SessionState {
        SessionState::AwaitingTitle {
            base: "item_1000".to_string(),
        }
    }

    #[test]
    fn test_reset_wins_in_every_state() {
        let msg = message(Some("/cancel"), &[]);
        for state in [SessionState::Idle, awaiting_prompt(), awaiting_title()] {
            let input = Input::classify(&msg, "/cancel");
            assert_eq!(decide(&state, input), Action::Reset, "state {state:?}");
        }
    }

    #[test]
    fn test_reset_matches_bot_suffix_and_case() {
        assert!(command_matches("/cancel@gallery_bot", "/cancel"));
        assert!(command_matches("/CANCEL", "/cancel"));
        assert!(!command_matches("/cancelled", "/cancel"));
        assert!(!command_matches("please /cancel", "/cancel"));
    }

    #[test]
    fn test_idle_image_starts_submission_with_best_variant() {
        let msg = message(None, &[("thumb", 100), ("full", 10_000)]);
        let action = decide(&SessionState::Idle, Input::classify(&msg, "/cancel"));
        match action {
            Action::StageImage { variant, caption } => {
                assert_eq!(variant.file_ref, "full");
                assert!(caption.is_none());
            }
            other => panic!("expected StageImage, got {other:?}"),
        }
    }

    #[test]
    fn test_idle_image_keeps_caption() {
        let msg = message(Some(" a cat "), &[("full", 1)]);
        let action = decide(&SessionState::Idle, Input::classify(&msg, "/cancel"));
        assert!(matches!(
            action,
            Action::StageImage {
                caption: Some("a cat"),
                ..
            }
        ));
    }

    #[test]
    fn test_idle_text_is_ignored() {
        let msg = message(Some("hello"), &[]);
        assert_eq!(
            decide(&SessionState::Idle, Input::classify(&msg, "/cancel")),
            Action::Ignore
        );
    }

    #[test]
    fn test_awaiting_prompt_accepts_text() {
        let msg = message(Some("a cat"), &[]);
        assert_eq!(
            decide(&awaiting_prompt(), Input::classify(&msg, "/cancel")),
            Action::StagePrompt {
                base: "item_1000".to_string(),
                text: "a cat"
            }
        );
    }

    #[test]
    fn test_awaiting_prompt_rejects_image_and_blank_text() {
        let photo = message(None, &[("full", 1)]);
        let blank = message(Some("   "), &[]);
        for msg in [&photo, &blank] {
            assert_eq!(
                decide(&awaiting_prompt(), Input::classify(msg, "/cancel")),
                Action::RejectUnexpected
            );
        }
    }

    #[test]
    fn test_awaiting_title_accepts_text_and_rejects_rest() {
        let title = message(Some("Cute Cat"), &[]);
        assert_eq!(
            decide(&awaiting_title(), Input::classify(&title, "/cancel")),
            Action::StageTitle {
                base: "item_1000".to_string(),
                text: "Cute Cat"
            }
        );
        let photo = message(Some("caption"), &[("full", 1)]);
        assert_eq!(
            decide(&awaiting_title(), Input::classify(&photo, "/cancel")),
            Action::RejectUnexpected
        );
    }
}
