//! Reply templates sent back to submitters.
//! Placeholders in braces are filled with `str::replace` at the call site.

pub const PHOTO_SAVED: &str = "📸 Photo saved. Now send the prompt text.";

pub const PROMPT_SAVED: &str = "✏ Prompt saved. Now send the title.";

pub const SUBMISSION_COMPLETE: &str =
    "✓ Submission recorded. It will be published on the next promotion run.";

pub const RESET_DONE: &str = "Submission cancelled. Send a photo to start again.";

pub const UNEXPECTED_INPUT: &str =
    "Expected {expected}. Send it now, or {reset_command} to start over.";

pub const EXPECTED_PROMPT: &str = "the prompt as text";

pub const EXPECTED_TITLE: &str = "the title as text";

pub const HELP: &str = "Send a photo to start a submission. \
I will then ask for the prompt and the title.\n\
{reset_command} cancels the current submission.\n\
/pending lists submissions waiting to be published.\n\
/uploaded lists published items.\n\
/get <title> shows a published item.";

pub const NOTHING_PENDING: &str = "No submissions are waiting to be published.";

pub const PENDING_HEADER: &str = "📌 Waiting to be published:\n\n";

pub const NOTHING_UPLOADED: &str = "Nothing has been published yet.";

pub const UPLOADED_HEADER: &str = "📁 Published items:\n\n";

pub const GET_USAGE: &str = "Usage: /get <title>";

pub const ITEM_NOT_FOUND: &str = "❌ No published item with that title.";

pub const ITEM_DETAILS: &str =
    "📄 Title: {title}\n📅 Date: {created_at}\n📁 Image: {image}\n📄 Prompt: {prompt}";
