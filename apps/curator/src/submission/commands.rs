//! Read-only chat commands. They are answered in any state and never touch the
//! submitter's session.

use crate::errors::AppError;
use crate::staging::{StagedItem, StagingArea};
use crate::store::catalog::Catalog;
use crate::submission::fsm::command_matches;
use crate::submission::replies::{
    GET_USAGE, HELP, ITEM_DETAILS, ITEM_NOT_FOUND, NOTHING_PENDING, NOTHING_UPLOADED,
    PENDING_HEADER, UPLOADED_HEADER,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command<'a> {
    Help,
    Pending,
    Uploaded,
    Get(&'a str),
}

impl<'a> Command<'a> {
    pub fn parse(text: &'a str) -> Option<Self> {
        let text = text.trim();
        if !text.starts_with('/') {
            return None;
        }
        if command_matches(text, "/start") || command_matches(text, "/help") {
            Some(Command::Help)
        } else if command_matches(text, "/pending") {
            Some(Command::Pending)
        } else if command_matches(text, "/uploaded") {
            Some(Command::Uploaded)
        } else if command_matches(text, "/get") {
            let argument = text
                .split_once(char::is_whitespace)
                .map(|(_, rest)| rest.trim())
                .unwrap_or("");
            Some(Command::Get(argument))
        } else {
            None
        }
    }

    /// Builds the reply text for this command.
    pub fn answer(
        self,
        staging: &StagingArea,
        catalog: &Catalog,
        reset_command: &str,
    ) -> Result<String, AppError> {
        match self {
            Command::Help => Ok(HELP.replace("{reset_command}", reset_command)),
            Command::Pending => {
                let titles: Vec<String> = staging
                    .scan()?
                    .into_values()
                    .filter_map(|item| match item {
                        StagedItem::Complete { title } => Some(title),
                        StagedItem::Incomplete { .. } => None,
                    })
                    .collect();
                Ok(bulleted(PENDING_HEADER, NOTHING_PENDING, &titles))
            }
            Command::Uploaded => {
                let titles: Vec<String> = catalog.load()?.into_iter().map(|r| r.title).collect();
                Ok(bulleted(UPLOADED_HEADER, NOTHING_UPLOADED, &titles))
            }
            Command::Get("") => Ok(GET_USAGE.to_string()),
            Command::Get(title) => Ok(match catalog.find_by_title(title)? {
                Some(record) => ITEM_DETAILS
                    .replace("{title}", &record.title)
                    .replace("{created_at}", &record.created_at.to_rfc3339())
                    .replace("{image}", &record.image)
                    .replace("{prompt}", &record.prompt),
                None => ITEM_NOT_FOUND.to_string(),
            }),
        }
    }
}

fn bulleted(header: &str, empty: &str, titles: &[String]) -> String {
    if titles.is_empty() {
        return empty.to_string();
    }
    let mut reply = header.to_string();
    for title in titles {
        reply.push_str("- ");
        reply.push_str(title);
        reply.push('\n');
    }
    reply
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::staging::ArtifactKind;
    use crate::store::catalog::CatalogRecord;

    #[test]
    fn test_parse_known_commands() {
        assert_eq!(Command::parse("/start"), Some(Command::Help));
        assert_eq!(Command::parse("/help@gallery_bot"), Some(Command::Help));
        assert_eq!(Command::parse("/pending"), Some(Command::Pending));
        assert_eq!(Command::parse("/uploaded"), Some(Command::Uploaded));
        assert_eq!(Command::parse("/get  Cute Cat "), Some(Command::Get("Cute Cat")));
        assert_eq!(Command::parse("/get"), Some(Command::Get("")));
    }

    #[test]
    fn test_plain_text_and_unknown_commands_are_not_commands() {
        assert_eq!(Command::parse("a cat on a mat"), None);
        assert_eq!(Command::parse("/unknown"), None);
        assert_eq!(Command::parse("/getaway"), None);
    }

    #[test]
    fn test_pending_lists_only_complete_items() {
        let dir = tempfile::tempdir().unwrap();
        let staging = StagingArea::new(dir.path().join("pending"));
        let catalog = Catalog::new(dir.path().join("data.json"));
        staging.write("item_1", ArtifactKind::Image, b"jpeg").unwrap();
        staging.write("item_2", ArtifactKind::Title, b"Sunset").unwrap();

        let reply = Command::Pending.answer(&staging, &catalog, "/cancel").unwrap();
        assert_eq!(reply, format!("{PENDING_HEADER}- Sunset\n"));
    }

    #[test]
    fn test_empty_listings_use_fallback_text() {
        let dir = tempfile::tempdir().unwrap();
        let staging = StagingArea::new(dir.path().join("pending"));
        let catalog = Catalog::new(dir.path().join("data.json"));
        assert_eq!(
            Command::Pending.answer(&staging, &catalog, "/cancel").unwrap(),
            NOTHING_PENDING
        );
        assert_eq!(
            Command::Uploaded.answer(&staging, &catalog, "/cancel").unwrap(),
            NOTHING_UPLOADED
        );
    }

    #[test]
    fn test_get_reports_record_or_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let staging = StagingArea::new(dir.path().join("pending"));
        let catalog = Catalog::new(dir.path().join("data.json"));
        catalog
            .save(&[CatalogRecord {
                image: "images/item_1000.jpg".to_string(),
                prompt: "prompts/item_1000.txt".to_string(),
                title: "Cute Cat".to_string(),
                created_at: Utc::now(),
            }])
            .unwrap();

        let found = Command::Get("cute cat").answer(&staging, &catalog, "/cancel").unwrap();
        assert!(found.contains("images/item_1000.jpg"), "got: {found}");
        let missing = Command::Get("Dog").answer(&staging, &catalog, "/cancel").unwrap();
        assert_eq!(missing, ITEM_NOT_FOUND);
        let usage = Command::Get("").answer(&staging, &catalog, "/cancel").unwrap();
        assert_eq!(usage, GET_USAGE);
    }

    #[test]
    fn test_help_mentions_configured_reset_command() {
        let dir = tempfile::tempdir().unwrap();
        let staging = StagingArea::new(dir.path());
        let catalog = Catalog::new(dir.path().join("data.json"));
        let reply = Command::Help.answer(&staging, &catalog, "/abort").unwrap();
        assert!(reply.contains("/abort"));
        assert!(!reply.contains("{reset_command}"));
    }
}
