//! Terminal backend for the interactive views.

use std::io::{self, Stdout, Write};
use std::panic;
use std::sync::Once;
use std::time::Duration;

use anyhow::{Context, Result};
use crossterm::cursor::{Hide, MoveTo, Show};
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::style::{Attribute, Print, SetAttribute};
use crossterm::terminal::{
    self, Clear, ClearType, EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode,
    enable_raw_mode,
};
use crossterm::{execute, queue};
use tracing::{debug, warn};

use crate::core::render::{Frame, FrameSize};
use crate::core::view::Key;

pub trait Terminal {
    fn size(&mut self) -> Result<FrameSize>;
    fn draw(&mut self, frame: &Frame) -> Result<()>;
    /// Wait up to `timeout` for one key press.
    fn poll_key(&mut self, timeout: Duration) -> Result<Option<Key>>;
}

/// Raw-mode alternate-screen terminal. The previous screen is restored on drop.
pub struct CrosstermTerminal {
    out: Stdout,
}

impl CrosstermTerminal {
    pub fn enter() -> Result<Self> {
        install_panic_hook();
        enable_raw_mode().context("enable raw mode")?;
        let mut out = io::stdout();
        if let Err(err) = execute!(out, EnterAlternateScreen, Hide) {
            let _ = disable_raw_mode();
            return Err(err).context("enter alternate screen");
        }
        debug!("terminal entered");
        Ok(Self { out })
    }
}

impl Drop for CrosstermTerminal {
    fn drop(&mut self) {
        restore_terminal(&mut self.out);
    }
}

static PANIC_HOOK: Once = Once::new();

/// Restore the screen before the panic message prints, then defer to the
/// previously installed hook. Installed at most once per process.
fn install_panic_hook() {
    PANIC_HOOK.call_once(|| {
        let previous = panic::take_hook();
        panic::set_hook(Box::new(move |info| {
            restore_terminal(&mut io::stdout());
            previous(info);
        }));
    });
}

fn restore_terminal(out: &mut impl Write) {
    if let Err(err) = leave_screen(out) {
        warn!(err = %err, "leave alternate screen failed");
    }
    if let Err(err) = disable_raw_mode() {
        warn!(err = %err, "disable raw mode failed");
    }
}

fn leave_screen(out: &mut impl Write) -> io::Result<()> {
    execute!(out, Show, LeaveAlternateScreen)
}

impl Terminal for CrosstermTerminal {
    fn size(&mut self) -> Result<FrameSize> {
        let (width, height) = terminal::size().context("query terminal size")?;
        Ok(FrameSize {
            width: usize::from(width),
            height: usize::from(height),
        })
    }

    fn draw(&mut self, frame: &Frame) -> Result<()> {
        let last = frame.size.height.saturating_sub(1);
        for (y, row) in frame.rows.iter().enumerate() {
            let y16 = u16::try_from(y).unwrap_or(u16::MAX);
            queue!(self.out, MoveTo(0, y16), Clear(ClearType::CurrentLine))?;
            if y == 0 || y == last {
                queue!(
                    self.out,
                    SetAttribute(Attribute::Reverse),
                    Print(row),
                    SetAttribute(Attribute::Reset)
                )?;
            } else {
                queue!(self.out, Print(row))?;
            }
        }
        self.out.flush().context("flush terminal")
    }

    fn poll_key(&mut self, timeout: Duration) -> Result<Option<Key>> {
        if !event::poll(timeout).context("poll terminal events")? {
            return Ok(None);
        }
        match event::read().context("read terminal event")? {
            Event::Key(key) if key.kind == KeyEventKind::Press => Ok(Some(map_key(key))),
            _ => Ok(None),
        }
    }
}

fn map_key(key: KeyEvent) -> Key {
    match key.code {
        KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => Key::Char('q'),
        KeyCode::Char(ch) => Key::Char(ch),
        KeyCode::Up => Key::Up,
        KeyCode::Down => Key::Down,
        _ => Key::Other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_keys() {
        let plain = |code| KeyEvent::new(code, KeyModifiers::NONE);
        assert_eq!(map_key(plain(KeyCode::Char('y'))), Key::Char('y'));
        assert_eq!(map_key(plain(KeyCode::Up)), Key::Up);
        assert_eq!(map_key(plain(KeyCode::Enter)), Key::Other);
        assert_eq!(
            map_key(KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL)),
            Key::Char('q')
        );
    }

    #[cfg(unix)]
    #[test]
    fn restore_shows_cursor_and_leaves_alternate_screen() {
        let mut out = Vec::new();
        restore_terminal(&mut out);
        let written = String::from_utf8(out).expect("utf8");
        assert!(written.contains("\x1b[?25h"));
        assert!(written.contains("\x1b[?1049l"));
    }

    #[test]
    fn panic_hook_installs_once_and_keeps_unwinding() {
        install_panic_hook();
        install_panic_hook();
        assert!(PANIC_HOOK.is_completed());
        let caught = panic::catch_unwind(|| panic!("boom"));
        assert!(caught.is_err());
    }
}
