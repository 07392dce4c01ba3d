// ABOUTME: Local terminal control for interactive commands.
// ABOUTME: Raw mode entry/restore behind a trait, with a crossterm implementation and a drop guard.

use crossterm::terminal;
use std::io::{self, IsTerminal};

const FALLBACK_SIZE: (u16, u16) = (80, 24);

/// Driver mode of the local terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminalMode {
    /// Line-buffered with echo.
    Cooked,
    /// Keystrokes passed through unprocessed.
    Raw,
}

/// The local terminal attached to the process's standard input.
pub trait Terminal: Send {
    /// Switch to raw mode, returning the mode that was active before.
    ///
    /// Fails with [`io::ErrorKind::Unsupported`] when standard input is not a terminal.
    fn enter_raw_mode(&mut self) -> io::Result<TerminalMode>;

    /// Put the terminal back into `previous`.
    fn restore(&mut self, previous: TerminalMode) -> io::Result<()>;

    /// Current size as (columns, rows).
    fn size(&self) -> (u16, u16);
}

/// The real terminal, driven through crossterm.
#[derive(Debug, Default, Clone, Copy)]
pub struct CrosstermTerminal;

impl Terminal for CrosstermTerminal {
    fn enter_raw_mode(&mut self) -> io::Result<TerminalMode> {
        if !io::stdin().is_terminal() {
            return Err(io::Error::new(
                io::ErrorKind::Unsupported,
                "standard input is not a terminal",
            ));
        }
        let previous = if terminal::is_raw_mode_enabled()? {
            TerminalMode::Raw
        } else {
            TerminalMode::Cooked
        };
        terminal::enable_raw_mode()?;
        Ok(previous)
    }

    fn restore(&mut self, previous: TerminalMode) -> io::Result<()> {
        match previous {
            TerminalMode::Cooked => terminal::disable_raw_mode(),
            TerminalMode::Raw => Ok(()),
        }
    }

    fn size(&self) -> (u16, u16) {
        terminal::size()
            .ok()
            .filter(|&(cols, rows)| cols > 0 && rows > 0)
            .unwrap_or(FALLBACK_SIZE)
    }
}

/// RAII guard that restores the terminal to its previous mode on drop.
pub struct RawModeGuard<'a, T: Terminal + ?Sized> {
    terminal: &'a mut T,
    previous: TerminalMode,
}

impl<'a, T: Terminal + ?Sized> RawModeGuard<'a, T> {
    /// Enter raw mode. The previous mode comes back when the guard is dropped.
    pub fn enter(terminal: &'a mut T) -> io::Result<Self> {
        let previous = terminal.enter_raw_mode()?;
        tracing::debug!("Entered raw mode (previously {:?})", previous);
        Ok(Self { terminal, previous })
    }
}

impl<T: Terminal + ?Sized> Drop for RawModeGuard<'_, T> {
    fn drop(&mut self) {
        // Nothing to propagate to from a Drop impl; the user's terminal may stay raw.
        if let Err(e) = self.terminal.restore(self.previous) {
            tracing::warn!("Failed to restore terminal mode: {}", e);
        }
    }
}
