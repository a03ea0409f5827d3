//! Terminal core instance
//!
//! One [`Engine`] owns one PTY and one [`Terminal`]. A reader thread is the
//! only mutator of the screen: it polls the PTY, feeds every chunk through the
//! parser in arrival order, and publishes a render snapshot after each drained
//! batch. A writer thread drains a bounded queue of key events and raw bytes
//! into the PTY.
//!
//! Everything else (rendering, search, serialization, resize) goes through the
//! terminal mutex. Rendering uses `try_lock` and falls back to the last
//! published snapshot, so it never waits on the parser.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError, TryLockError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use tracing::{debug, warn};

use crate::config::EngineConfig;
use crate::core::{RenderSnapshot, StyledLine};
use crate::error::{Error, Result};
use crate::input::{encode_key, encode_paste, KeyAction, KeyCode, KeyEvent, Modifiers};
use crate::pty::{ExitStatus, Pty, PtyCommand, PtyError, PtyResult, ReadOutcome, WindowSize};
use crate::search::HistoryView;
use crate::terminal::Terminal;

/// Bytes read from the PTY per call
const READ_BUFFER_SIZE: usize = 16 * 1024;
/// Writer poll timeout while the kernel buffer is full
const WRITE_POLL_MS: i32 = 20;

/// Work for the writer thread
#[derive(Debug)]
enum WriteRequest {
    Bytes(Vec<u8>),
    /// Encoded with the modes in effect when it is written
    Key(KeyEvent),
    Paste(String),
}

/// State shared between the engine handle and its workers
struct Shared {
    terminal: Mutex<Terminal>,
    snapshot: Mutex<Arc<RenderSnapshot>>,
    shutdown: AtomicBool,
    /// Set once the PTY reported EOF or a write failed for good
    exited: AtomicBool,
    /// After this instant the writer stops draining queued input
    drain_deadline: OnceLock<Instant>,
}

impl Shared {
    fn terminal(&self) -> MutexGuard<'_, Terminal> {
        lock(&self.terminal)
    }

    /// Parse one chunk and hand device replies to the writer
    fn apply(&self, bytes: &[u8], responses: &Sender<WriteRequest>) {
        let replies = {
            let mut terminal = self.terminal();
            terminal.process(bytes);
            terminal.take_pending_responses()
        };
        if replies.is_empty() {
            return;
        }
        if let Err(err) = responses.try_send(WriteRequest::Bytes(replies)) {
            warn!(error = %err, "dropping device reply");
        }
    }

    fn publish(&self) -> Arc<RenderSnapshot> {
        let snapshot = Arc::new(self.terminal().snapshot());
        *lock(&self.snapshot) = Arc::clone(&snapshot);
        snapshot
    }

    fn shutting_down(&self) -> bool {
        self.shutdown.load(Ordering::Acquire)
    }

    fn drain_expired(&self) -> bool {
        self.drain_deadline
            .get()
            .is_some_and(|deadline| Instant::now() >= *deadline)
    }
}

/// Sending half of the input queue
struct InputQueue {
    tx: Mutex<Option<Sender<WriteRequest>>>,
    capacity: usize,
}

impl InputQueue {
    fn new(capacity: usize) -> (Self, Receiver<WriteRequest>) {
        let (tx, rx) = bounded(capacity);
        let queue = InputQueue {
            tx: Mutex::new(Some(tx)),
            capacity,
        };
        (queue, rx)
    }

    fn sender(&self) -> Option<Sender<WriteRequest>> {
        lock(&self.tx).clone()
    }

    /// Enqueue without blocking
    fn push(&self, request: WriteRequest) -> Result<()> {
        let guard = lock(&self.tx);
        let tx = guard.as_ref().ok_or(Error::ChannelClosed)?;
        tx.try_send(request).map_err(|err| match err {
            TrySendError::Full(_) => Error::Backpressure {
                capacity: self.capacity,
            },
            TrySendError::Disconnected(_) => Error::ChannelClosed,
        })
    }

    fn close(&self) {
        lock(&self.tx).take();
    }
}

/// A running terminal core instance
pub struct Engine {
    shared: Arc<Shared>,
    pty: Arc<Pty>,
    input: InputQueue,
    reader: Option<JoinHandle<()>>,
    writer: Option<JoinHandle<()>>,
    close_grace: Duration,
    closed: bool,
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("pty", &self.pty)
            .field("closed", &self.closed)
            .finish()
    }
}

impl Engine {
    /// Launch the configured shell and start the reader and writer workers
    pub fn spawn(config: EngineConfig) -> Result<Self> {
        config.validate()?;

        let mut command = PtyCommand::new(&config.shell).args(config.args.iter().cloned());
        if let Some(dir) = &config.working_dir {
            command = command.working_dir(dir);
        }
        for (key, value) in &config.env {
            command = command.env(key, value);
        }
        let pty = Pty::spawn(&command, WindowSize::new(config.cols, config.rows))
            .map_err(Error::Spawn)?;
        let pty = Arc::new(pty);

        let terminal = Terminal::new(
            usize::from(config.cols),
            usize::from(config.rows),
            config.scrollback_lines,
        );
        let snapshot = Arc::new(terminal.snapshot());
        let shared = Arc::new(Shared {
            terminal: Mutex::new(terminal),
            snapshot: Mutex::new(snapshot),
            shutdown: AtomicBool::new(false),
            exited: AtomicBool::new(false),
            drain_deadline: OnceLock::new(),
        });

        let (input, rx) = InputQueue::new(config.write_queue_capacity);
        let responses = input.sender().ok_or(Error::ChannelClosed)?;
        let poll_ms = i32::try_from(config.poll_interval_ms).unwrap_or(i32::MAX);

        let reader = {
            let pty = Arc::clone(&pty);
            let shared = Arc::clone(&shared);
            thread::Builder::new()
                .name("vtcore-reader".into())
                .spawn(move || reader_loop(&pty, &shared, &responses, poll_ms))
                .map_err(|e| Error::Worker(format!("failed to spawn reader: {e}")))?
        };
        let writer = {
            let pty = Arc::clone(&pty);
            let worker_shared = Arc::clone(&shared);
            thread::Builder::new()
                .name("vtcore-writer".into())
                .spawn(move || writer_loop(&pty, &worker_shared, &rx))
        };
        let writer = match writer {
            Ok(handle) => handle,
            Err(e) => {
                shared.shutdown.store(true, Ordering::Release);
                let _ = reader.join();
                let _ = pty.close(Duration::from_millis(config.close_grace_ms));
                return Err(Error::Worker(format!("failed to spawn writer: {e}")));
            }
        };

        debug!(
            pid = pty.child_pid().as_raw(),
            cols = config.cols,
            rows = config.rows,
            "engine started"
        );
        Ok(Engine {
            shared,
            pty,
            input,
            reader: Some(reader),
            writer: Some(writer),
            close_grace: Duration::from_millis(config.close_grace_ms),
            closed: false,
        })
    }

    /// A consistent view of the visible screen.
    ///
    /// Never waits for the reader: if the screen is locked the last published
    /// snapshot is returned instead.
    pub fn render_snapshot(&self) -> Arc<RenderSnapshot> {
        let terminal = match self.shared.terminal.try_lock() {
            Ok(terminal) => terminal,
            Err(TryLockError::Poisoned(poisoned)) => poisoned.into_inner(),
            Err(TryLockError::WouldBlock) => return Arc::clone(&lock(&self.shared.snapshot)),
        };
        let snapshot = Arc::new(terminal.snapshot());
        drop(terminal);
        *lock(&self.shared.snapshot) = Arc::clone(&snapshot);
        snapshot
    }

    /// Run `f` against scrollback plus the live grid, e.g. for search
    pub fn with_history<R>(&self, f: impl FnOnce(HistoryView<'_>) -> R) -> R {
        let terminal = self.shared.terminal();
        f(HistoryView::of(terminal.screen()))
    }

    /// Run `f` with read access to the whole terminal state
    pub fn with_terminal<R>(&self, f: impl FnOnce(&Terminal) -> R) -> R {
        f(&self.shared.terminal())
    }

    /// Queue raw bytes for the shell. Fails fast when the queue is full.
    pub fn write(&self, bytes: &[u8]) -> Result<()> {
        if bytes.is_empty() {
            return Ok(());
        }
        self.ensure_open()?;
        self.input.push(WriteRequest::Bytes(bytes.to_vec()))
    }

    /// Translate a key event and queue it for the shell
    pub fn feed_key(&self, code: KeyCode, modifiers: Modifiers, action: KeyAction) -> Result<()> {
        self.ensure_open()?;
        if action == KeyAction::Release {
            return Ok(());
        }
        self.input
            .push(WriteRequest::Key(KeyEvent::new(code, modifiers, action)))
    }

    /// Queue pasted text, bracketed if the application asked for it
    pub fn paste(&self, text: &str) -> Result<()> {
        self.ensure_open()?;
        self.input.push(WriteRequest::Paste(text.to_string()))
    }

    fn ensure_open(&self) -> Result<()> {
        if self.closed || self.shared.exited.load(Ordering::Acquire) {
            Err(Error::ChannelClosed)
        } else {
            Ok(())
        }
    }

    /// Resize grid and PTY together. The reader cannot run in between.
    pub fn resize(&self, cols: u16, rows: u16) -> Result<()> {
        let (cols, rows) = (cols.max(1), rows.max(1));
        let mut terminal = self.shared.terminal();
        terminal.resize(usize::from(cols), usize::from(rows));
        // The child sees exactly the grid it is drawing into
        let size = WindowSize::from_grid(terminal.screen().cols(), terminal.screen().rows());
        if !self.closed {
            match self.pty.resize(size) {
                Ok(()) => {}
                // A dead child has no window to resize
                Err(PtyError::SetWinsize(_)) if !self.pty.is_alive() => {}
                Err(err) => return Err(Error::Io(err)),
            }
        }
        let snapshot = Arc::new(terminal.snapshot());
        drop(terminal);
        *lock(&self.shared.snapshot) = snapshot;
        Ok(())
    }

    /// Styled scrollback lines `[start, end)` for session save
    pub fn serialize_scrollback_window(&self, start: usize, end: usize) -> Result<Vec<StyledLine>> {
        Ok(self
            .shared
            .terminal()
            .serialize_scrollback_window(start, end)?)
    }

    /// Append saved lines to the scrollback. The live grid is never restored.
    pub fn restore_scrollback(&self, lines: &[StyledLine]) {
        self.shared.terminal().restore_scrollback(lines);
    }

    pub fn is_alive(&self) -> bool {
        self.pty.is_alive()
    }

    /// Whether the reader has seen the shell's output end
    pub fn has_exited(&self) -> bool {
        self.shared.exited.load(Ordering::Acquire)
    }

    pub fn exit_status(&self) -> Option<ExitStatus> {
        self.pty.exit_status()
    }

    pub fn pid(&self) -> i32 {
        self.pty.child_pid().as_raw()
    }

    pub fn title(&self) -> String {
        self.shared.terminal().title().to_string()
    }

    /// Stop the workers and terminate the shell. Queued input is drained for
    /// at most the grace period. Idempotent.
    pub fn close(&mut self) -> Result<Option<ExitStatus>> {
        if self.closed {
            return Ok(self.pty.exit_status());
        }
        self.closed = true;
        debug!(pid = self.pid(), "closing engine");

        let _ = self.shared.drain_deadline.set(Instant::now() + self.close_grace);
        self.shared.shutdown.store(true, Ordering::Release);
        self.input.close();

        let mut panicked = Vec::new();
        if let Some(reader) = self.reader.take() {
            if reader.join().is_err() {
                panicked.push("reader");
            }
        }
        if let Some(writer) = self.writer.take() {
            if writer.join().is_err() {
                panicked.push("writer");
            }
        }

        let status = self.pty.close(self.close_grace)?;
        self.shared.publish();
        debug!(status = ?status, "engine closed");

        if panicked.is_empty() {
            Ok(status)
        } else {
            Err(Error::Worker(format!("{} thread panicked", panicked.join(" and "))))
        }
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        if let Err(err) = self.close() {
            warn!(error = %err, "error while closing engine");
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Pump PTY output into the terminal until EOF or shutdown
fn reader_loop(pty: &Pty, shared: &Shared, responses: &Sender<WriteRequest>, poll_ms: i32) {
    debug!("reader started");
    let mut buf = vec![0u8; READ_BUFFER_SIZE];

    'outer: while !shared.shutting_down() {
        match pty.poll_read(poll_ms) {
            Ok(true) => {}
            Ok(false) => continue,
            Err(err) => {
                warn!(error = %err, "poll failed");
                break;
            }
        }

        let mut received = false;
        loop {
            match pty.read_nonblocking(&mut buf) {
                Ok(ReadOutcome::Data(n)) => {
                    shared.apply(&buf[..n], responses);
                    received = true;
                }
                Ok(ReadOutcome::WouldBlock) => break,
                Err(PtyError::Eof) => {
                    debug!("shell closed the terminal");
                    shared.exited.store(true, Ordering::Release);
                    break 'outer;
                }
                Err(err) => {
                    warn!(error = %err, "read failed");
                    shared.exited.store(true, Ordering::Release);
                    break 'outer;
                }
            }
            if shared.shutting_down() {
                break;
            }
        }
        if received {
            shared.publish();
        }
    }

    shared.publish();
    debug!("reader stopped");
}

/// Drain the input queue into the PTY until every sender is gone
fn writer_loop(pty: &Pty, shared: &Shared, rx: &Receiver<WriteRequest>) {
    debug!("writer started");
    for request in rx.iter() {
        let bytes = match request {
            WriteRequest::Bytes(bytes) => bytes,
            WriteRequest::Key(event) => encode_key(&event, &shared.terminal().screen().modes),
            WriteRequest::Paste(text) => {
                let bracketed = shared.terminal().screen().modes.bracketed_paste;
                encode_paste(&text, bracketed)
            }
        };
        if bytes.is_empty() {
            continue;
        }
        match write_chunk(pty, shared, &bytes) {
            Ok(true) => {}
            Ok(false) => {
                debug!("drain deadline passed, dropping queued input");
                break;
            }
            Err(PtyError::Eof) | Err(PtyError::Closed) => {
                debug!("shell gone, writer stopping");
                shared.exited.store(true, Ordering::Release);
                break;
            }
            Err(err) => {
                warn!(error = %err, "write failed");
                shared.exited.store(true, Ordering::Release);
                break;
            }
        }
    }
    debug!("writer stopped");
}

/// Write all of `data`. Returns `Ok(false)` if shutdown cut the write short.
fn write_chunk(pty: &Pty, shared: &Shared, mut data: &[u8]) -> PtyResult<bool> {
    while !data.is_empty() {
        let n = pty.write(data)?;
        if n > 0 {
            data = &data[n..];
            continue;
        }
        if shared.drain_expired() {
            return Ok(false);
        }
        if !pty.is_alive() {
            return Err(PtyError::Eof);
        }
        pty.poll_write(WRITE_POLL_MS)?;
    }
    Ok(true)
}
