use std::cell::Cell;
use std::io::Write;

use anyhow::Context;
use anyhow::Result;
use colored::Colorize;
use crossterm::cursor::MoveToPreviousLine;
use crossterm::event;
use crossterm::event::Event;
use crossterm::event::KeyCode;
use crossterm::event::KeyEvent;
use crossterm::event::KeyEventKind;
use crossterm::event::KeyModifiers;
use crossterm::queue;
use crossterm::terminal::Clear;
use crossterm::terminal::ClearType;
use crossterm::terminal::disable_raw_mode;
use crossterm::terminal::enable_raw_mode;
#[cfg(test)]
use mockall::automock;

use crate::editor::edit_text;

/// The user's answer to a prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Accept(String),
    Abort,
}

/// Asks the user to confirm or amend values.
#[cfg_attr(test, automock)]
pub trait Reviewer {
    /// Show `value` under `label`; the user keeps it, edits it or aborts.
    fn review(&self, label: &str, value: &str) -> Result<Decision>;

    /// Ask for free text described by `prompt`.
    fn describe(&self, prompt: &str) -> Result<Decision>;
}

#[derive(Debug, PartialEq, Eq)]
enum KeyAction {
    Edit,
    Abort,
    Accept,
}

fn key_action(key: &KeyEvent) -> KeyAction {
    match key.code {
        KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => KeyAction::Abort,
        KeyCode::Char(c) if c.eq_ignore_ascii_case(&'x') => KeyAction::Abort,
        KeyCode::Char(c) if c.eq_ignore_ascii_case(&'e') => KeyAction::Edit,
        _ => KeyAction::Accept,
    }
}

/// Resolve a field review once the key is known.
fn review_action(
    action: KeyAction,
    value: &str,
    edit: impl FnOnce(&str) -> Result<Option<String>>,
    stdout: &mut impl Write,
) -> Result<Decision> {
    match action {
        KeyAction::Abort => Ok(Decision::Abort),
        KeyAction::Accept => Ok(Decision::Accept(value.to_string())),
        KeyAction::Edit => match edit(value)? {
            Some(edited) => Ok(Decision::Accept(edited)),
            None => {
                writeln!(stdout, "Editor exited without saving. Keeping default value.")?;
                Ok(Decision::Accept(value.to_string()))
            }
        },
    }
}

/// Resolve a free-text prompt once the key is known.
fn describe_action(
    action: KeyAction,
    edit: impl FnOnce(&str) -> Result<Option<String>>,
    stdout: &mut impl Write,
) -> Result<Decision> {
    if action == KeyAction::Abort {
        return Ok(Decision::Abort);
    }
    match edit("")? {
        Some(text) => Ok(Decision::Accept(text)),
        None => {
            writeln!(stdout, "Editor exited without saving. Exiting.")?;
            Ok(Decision::Abort)
        }
    }
}

// -----------------------------------------------------------------------------
// Terminal

/// Raw mode for as long as the guard lives.
struct RawMode;

impl RawMode {
    fn enable() -> Result<Self> {
        enable_raw_mode().context("Failed to enable raw mode")?;
        Ok(Self)
    }
}

impl Drop for RawMode {
    fn drop(&mut self) {
        let _ = disable_raw_mode();
    }
}

/// Block until a single key is pressed.
fn read_key() -> Result<KeyEvent> {
    let _raw = RawMode::enable()?;
    loop {
        if let Event::Key(key) = event::read().context("Failed to read terminal event")? {
            if key.kind == KeyEventKind::Press {
                return Ok(key);
            }
        }
    }
}

/// Review prompts on the controlling terminal.
///
/// Printed lines are counted so that each prompt can be wiped once answered.
pub struct TerminalReviewer {
    editor: String,
    lines: Cell<usize>,
}

impl TerminalReviewer {
    pub fn new(editor: String) -> Self {
        Self {
            editor,
            lines: Cell::new(0),
        }
    }

    fn print(&self, text: &str) -> Result<()> {
        let mut stdout = std::io::stdout();
        writeln!(stdout, "{}", text)?;
        stdout.flush()?;
        self.lines
            .set(self.lines.get() + text.matches('\n').count() + 1);
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        let mut stdout = std::io::stdout();
        for _ in 0..self.lines.get() {
            queue!(stdout, MoveToPreviousLine(1), Clear(ClearType::CurrentLine))?;
        }
        stdout.flush()?;
        self.lines.set(0);
        Ok(())
    }

    fn ask(&self) -> Result<KeyAction> {
        let key = read_key()?;
        self.clear()?;
        Ok(key_action(&key))
    }
}

impl Reviewer for TerminalReviewer {
    fn review(&self, label: &str, value: &str) -> Result<Decision> {
        self.print(&format!("\n{}:\n{}", label, value.blue()))?;
        self.print("\nPress 'e' to edit, 'x' to exit, or any other key to confirm.")?;

        let action = self.ask()?;
        review_action(
            action,
            value,
            |current| edit_text(&self.editor, current),
            &mut std::io::stdout(),
        )
    }

    fn describe(&self, prompt: &str) -> Result<Decision> {
        self.print(&prompt.blue().to_string())?;
        self.print("Press 'x' to exit, or any other key to continue.")?;

        let action = self.ask()?;
        describe_action(
            action,
            |initial| edit_text(&self.editor, initial),
            &mut std::io::stdout(),
        )
    }
}
