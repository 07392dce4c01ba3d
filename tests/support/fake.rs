// ABOUTME: In-memory transport, session and terminal for runner tests.
// ABOUTME: Records every session operation and simulates a few remote commands.

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use rexec::ssh::{Error, ExecSession, PtyRequest, Result, SessionIo, Transport};
use rexec::terminal::{Terminal, TerminalMode};
use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

/// What happened on the fake transport, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Created(usize),
    Pty { session: usize, columns: u32, rows: u32 },
    Agent(usize),
    X11(usize),
    Execute { session: usize, command: String, raw: bool },
}

/// Which operations should fail.
#[derive(Debug, Clone, Copy, Default)]
pub struct Script {
    pub fail_create: bool,
    pub fail_pty: bool,
    pub fail_agent: bool,
    pub fail_x11: bool,
}

#[derive(Clone, Default)]
pub struct FakeTransport {
    script: Script,
    events: Arc<Mutex<Vec<Event>>>,
    created: Arc<AtomicUsize>,
    terminal: Option<FakeTerminal>,
}

impl FakeTransport {
    pub fn new(script: Script) -> Self {
        Self {
            script,
            ..Default::default()
        }
    }

    /// Record the terminal's mode at the moment each command executes.
    pub fn observing(mut self, terminal: &FakeTerminal) -> Self {
        self.terminal = Some(terminal.clone());
        self
    }

    pub fn events(&self) -> Vec<Event> {
        self.events.lock().clone()
    }

    pub fn sessions_created(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }

    pub fn executed(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                Event::Execute { command, .. } => Some(command),
                _ => None,
            })
            .collect()
    }
}

#[async_trait]
impl Transport for FakeTransport {
    type Session = FakeSession;

    async fn create_session(&self) -> Result<FakeSession> {
        if self.script.fail_create {
            return Err(Error::SessionCreation("channel open refused".to_string()));
        }
        let id = self.created.fetch_add(1, Ordering::SeqCst) + 1;
        self.events.lock().push(Event::Created(id));
        Ok(FakeSession {
            id,
            script: self.script,
            events: Arc::clone(&self.events),
            terminal: self.terminal.clone(),
        })
    }
}

pub struct FakeSession {
    id: usize,
    script: Script,
    events: Arc<Mutex<Vec<Event>>>,
    terminal: Option<FakeTerminal>,
}

impl FakeSession {
    pub fn id(&self) -> usize {
        self.id
    }

    fn record(&self, event: Event) {
        self.events.lock().push(event);
    }
}

#[async_trait]
impl ExecSession for FakeSession {
    async fn request_pty(&mut self, request: &PtyRequest) -> Result<()> {
        if self.script.fail_pty {
            return Err(Error::PtyRequest("server refused pty allocation".to_string()));
        }
        self.record(Event::Pty {
            session: self.id,
            columns: request.columns,
            rows: request.rows,
        });
        Ok(())
    }

    async fn attach_agent_forwarding(&mut self) -> Result<()> {
        if self.script.fail_agent {
            return Err(Error::AgentForward("SSH_AUTH_SOCK is not set".to_string()));
        }
        self.record(Event::Agent(self.id));
        Ok(())
    }

    async fn attach_x11_forwarding(&mut self) -> Result<()> {
        if self.script.fail_x11 {
            return Err(Error::X11Forward("DISPLAY is not set".to_string()));
        }
        self.record(Event::X11(self.id));
        Ok(())
    }

    /// Simulated commands: `echo WORDS`, `warn WORDS` (to stderr), `cat`,
    /// `exit N` and `hang`. Anything else exits with 127.
    async fn execute(&mut self, command: &str, io: SessionIo) -> Result<()> {
        let raw = self
            .terminal
            .as_ref()
            .is_some_and(|t| t.mode() == TerminalMode::Raw);
        self.record(Event::Execute {
            session: self.id,
            command: command.to_string(),
            raw,
        });

        let SessionIo {
            mut input,
            output,
            error,
        } = io;
        let (program, args) = command.split_once(' ').unwrap_or((command, ""));
        match program {
            "echo" => {
                let _ = output.send(Bytes::from(format!("{args}\n"))).await;
                Ok(())
            }
            "warn" => {
                let _ = error.send(Bytes::from(format!("{args}\n"))).await;
                Ok(())
            }
            "cat" => {
                while let Some(chunk) = input.recv().await {
                    let _ = output.send(chunk).await;
                }
                Ok(())
            }
            "exit" => match args.parse::<u32>() {
                Ok(0) => Ok(()),
                Ok(code) => Err(Error::ExitStatus(code)),
                Err(_) => Err(Error::ExitStatus(2)),
            },
            "hang" => std::future::pending::<Result<()>>().await,
            _ => Err(Error::ExitStatus(127)),
        }
    }
}

/// Terminal state shared between a test and its connection.
#[derive(Debug)]
pub struct TerminalState {
    pub mode: TerminalMode,
    pub entered: usize,
    pub restored: usize,
    pub fail_enter: Option<io::ErrorKind>,
}

#[derive(Clone)]
pub struct FakeTerminal {
    state: Arc<Mutex<TerminalState>>,
}

impl FakeTerminal {
    pub const SIZE: (u16, u16) = (100, 30);

    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(TerminalState {
                mode: TerminalMode::Cooked,
                entered: 0,
                restored: 0,
                fail_enter: None,
            })),
        }
    }

    /// A terminal whose raw mode entry fails with `kind`.
    pub fn failing(kind: io::ErrorKind) -> Self {
        let terminal = Self::new();
        terminal.state.lock().fail_enter = Some(kind);
        terminal
    }

    pub fn mode(&self) -> TerminalMode {
        self.state.lock().mode
    }

    pub fn entered(&self) -> usize {
        self.state.lock().entered
    }

    pub fn restored(&self) -> usize {
        self.state.lock().restored
    }
}

impl Terminal for FakeTerminal {
    fn enter_raw_mode(&mut self) -> io::Result<TerminalMode> {
        let mut state = self.state.lock();
        if let Some(kind) = state.fail_enter {
            return Err(io::Error::new(kind, "raw mode unavailable"));
        }
        state.entered += 1;
        let previous = state.mode;
        state.mode = TerminalMode::Raw;
        Ok(previous)
    }

    fn restore(&mut self, previous: TerminalMode) -> io::Result<()> {
        let mut state = self.state.lock();
        state.restored += 1;
        state.mode = previous;
        Ok(())
    }

    fn size(&self) -> (u16, u16) {
        Self::SIZE
    }
}
