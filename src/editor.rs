use std::io::Write;
use std::process::Command;

use anyhow::Context;
use anyhow::Result;
use tracing::warn;

/// Let the user edit `initial` in `editor`.
///
/// `editor` may carry arguments (e.g. `code --wait`). Returns the trimmed
/// file contents when the editor exits successfully, or `None` when it could
/// not be started or exited with a non-zero status. The temporary file is
/// removed in every case.
pub fn edit_text(editor: &str, initial: &str) -> Result<Option<String>> {
    let mut file = tempfile::Builder::new()
        .prefix("prdraft-")
        .suffix(".txt")
        .tempfile()
        .context("Failed to create temporary file")?;
    file.write_all(initial.as_bytes())?;
    file.flush()?;

    let mut parts = editor.split_whitespace();
    let Some(program) = parts.next() else {
        warn!("No editor configured");
        return Ok(None);
    };

    let status = match Command::new(program).args(parts).arg(file.path()).status() {
        Ok(status) => status,
        Err(e) => {
            warn!("Failed to start editor {}: {}", program, e);
            return Ok(None);
        }
    };
    if !status.success() {
        return Ok(None);
    }

    let edited = std::fs::read_to_string(file.path())
        .context("Failed to read edited file")?;
    Ok(Some(edited.trim().to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_editor_success_keeps_contents_trimmed() {
        // `true` exits 0 without touching the file
        let edited = edit_text("true", "  feat: add x \n").unwrap();
        assert_eq!(edited.as_deref(), Some("feat: add x"));
    }

    #[test]
    fn test_editor_failure_returns_none() {
        assert_eq!(edit_text("false", "value").unwrap(), None);
    }

    #[test]
    fn test_missing_editor_returns_none() {
        assert_eq!(
            edit_text("definitely-not-an-editor-7f3a", "value").unwrap(),
            None
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_editor_changes_are_read_back() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("fake-editor");
        std::fs::write(&script, "#!/bin/sh\nprintf 'edited value\\n\\n' > \"$2\"\n").unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();

        let editor = format!("{} --wait", script.display());
        let edited = edit_text(&editor, "original").unwrap();
        assert_eq!(edited.as_deref(), Some("edited value"));
    }
}
