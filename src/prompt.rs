use std::path::Path;

use anyhow::Context;
use anyhow::Result;

use crate::diff::CollectedDiff;

/// Template shipped with the binary.
pub const BUNDLED_TEMPLATE: &str = include_str!("../resources/prompts/pr-draft.txt");

/// Read the prompt template at `path`, or the bundled one when `None`.
pub fn load_template(path: Option<&Path>) -> Result<String> {
    match path {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("Prompt file not found at {}", path.display())),
        None => Ok(BUNDLED_TEMPLATE.to_string()),
    }
}

/// Combine the template with the change description and the collected diff.
pub fn compose_prompt(template: &str, description: &str, diff: &CollectedDiff) -> String {
    format!(
        "{}\n\
         Description of the change:\n\
         {}\n\
         \n\
         Git diff for my changes:\n\
         {}\n\
         \n\
         Content of untracked files:\n\
         {}\n",
        template.trim_end(),
        description,
        diff.diff,
        diff.untracked
    )
}
