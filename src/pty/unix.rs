//! Unix PTY implementation
//!
//! Implements PTY creation and child process management using POSIX APIs.
//! Every method takes `&self` so one channel can be shared by a reader and a
//! writer thread.

use std::ffi::{CStr, CString};
use std::os::fd::BorrowedFd;
use std::os::unix::ffi::OsStrExt;
use std::os::unix::fs::PermissionsExt;
use std::os::unix::io::{AsRawFd, RawFd};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use nix::errno::Errno;
use nix::fcntl::{fcntl, FcntlArg, FdFlag, OFlag};
use nix::libc;
use nix::poll::{poll, PollFd, PollFlags};
use nix::pty::{grantpt, posix_openpt, ptsname, unlockpt, PtyMaster};
use nix::sys::signal::{killpg, Signal};
use nix::sys::wait::{waitpid, WaitPidFlag, WaitStatus};
use nix::unistd::{fork, read, write, ForkResult, Pid};
use tracing::debug;

use super::{ExitStatus, PtyError, PtyResult, ReadOutcome, WindowSize};

/// Interval between liveness checks while waiting for the child to exit
const REAP_INTERVAL: Duration = Duration::from_millis(10);
/// Poll timeout while the kernel buffer is full on write
const WRITE_POLL_MS: i32 = 50;
/// Grace period used when a channel is dropped without `close`
const DROP_GRACE: Duration = Duration::from_millis(100);

/// What to run inside the PTY
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PtyCommand {
    program: PathBuf,
    args: Vec<String>,
    working_dir: Option<PathBuf>,
    env: Vec<(String, String)>,
}

impl PtyCommand {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            working_dir: None,
            env: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    /// Extra environment variable; overrides the inherited value
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    pub fn program(&self) -> &Path {
        &self.program
    }
}

/// A pseudoterminal with a spawned child process
pub struct Pty {
    master: PtyMaster,
    child_pid: Pid,
    /// Last size pushed to the kernel
    size: Mutex<WindowSize>,
    /// Set once the child has been reaped
    exit_status: Mutex<Option<ExitStatus>>,
    closed: AtomicBool,
}

impl std::fmt::Debug for Pty {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pty")
            .field("master_fd", &self.master.as_raw_fd())
            .field("child_pid", &self.child_pid)
            .field("closed", &self.closed.load(Ordering::Relaxed))
            .finish()
    }
}

impl Pty {
    /// Launch `shell` on a new PTY of `cols x rows`, optionally in `working_dir`
    pub fn open(
        shell: impl AsRef<Path>,
        cols: u16,
        rows: u16,
        working_dir: Option<&Path>,
    ) -> PtyResult<Self> {
        let mut command = PtyCommand::new(shell.as_ref());
        if let Some(dir) = working_dir {
            command = command.working_dir(dir);
        }
        Self::spawn(&command, WindowSize::new(cols, rows))
    }

    /// Spawn `command` attached to a new PTY.
    ///
    /// The program and working directory are validated before forking, so a
    /// missing shell is reported here rather than as an immediate EOF.
    pub fn spawn(command: &PtyCommand, size: WindowSize) -> PtyResult<Self> {
        let program = resolve_program(&command.program)?;
        if let Some(dir) = &command.working_dir {
            if !dir.is_dir() {
                return Err(PtyError::InvalidWorkingDir(dir.clone()));
            }
        }
        let exec = PreparedExec::new(&program, command)?;

        let master = posix_openpt(OFlag::O_RDWR | OFlag::O_NOCTTY).map_err(PtyError::OpenMaster)?;
        grantpt(&master).map_err(PtyError::GrantPty)?;
        unlockpt(&master).map_err(PtyError::UnlockPty)?;

        // SAFETY: ptsname is not thread-safe, but the returned string is
        // copied out before any other call could overwrite it
        let slave_name = unsafe { ptsname(&master) }.map_err(PtyError::PtsName)?;
        let slave_name = nul_free(slave_name.into_bytes(), "slave path")?;

        set_window_size(master.as_raw_fd(), size)?;
        configure_master(master.as_raw_fd())?;

        // SAFETY: the child only runs async-signal-safe calls before exec
        match unsafe { fork() }.map_err(PtyError::Fork)? {
            ForkResult::Child => exec_child(&slave_name, &exec),
            ForkResult::Parent { child } => {
                debug!(pid = child.as_raw(), program = %program.display(), "spawned child");
                Ok(Pty {
                    master,
                    child_pid: child,
                    size: Mutex::new(size),
                    exit_status: Mutex::new(None),
                    closed: AtomicBool::new(false),
                })
            }
        }
    }

    pub fn master_fd(&self) -> RawFd {
        self.master.as_raw_fd()
    }

    pub fn child_pid(&self) -> Pid {
        self.child_pid
    }

    /// Read whatever is available without blocking.
    ///
    /// Once the child has exited and its output is drained this fails with
    /// [`PtyError::Eof`].
    pub fn read_nonblocking(&self, buf: &mut [u8]) -> PtyResult<ReadOutcome> {
        match read(self.master.as_raw_fd(), buf) {
            Ok(0) => Err(PtyError::Eof),
            Ok(n) => Ok(ReadOutcome::Data(n)),
            // EAGAIN and EWOULDBLOCK are the same value on Linux
            Err(Errno::EAGAIN) | Err(Errno::EINTR) => Ok(ReadOutcome::WouldBlock),
            // Linux reports a closed slave as EIO
            Err(Errno::EIO) => Err(PtyError::Eof),
            Err(e) => Err(PtyError::Read(e)),
        }
    }

    /// Wait up to `timeout_ms` for the master to become readable.
    ///
    /// A hang-up counts as readable so the next read can report EOF.
    pub fn poll_read(&self, timeout_ms: i32) -> PtyResult<bool> {
        self.poll(PollFlags::POLLIN, timeout_ms)
    }

    /// Wait up to `timeout_ms` for room in the kernel buffer
    pub fn poll_write(&self, timeout_ms: i32) -> PtyResult<bool> {
        self.poll(PollFlags::POLLOUT, timeout_ms)
    }

    fn poll(&self, events: PollFlags, timeout_ms: i32) -> PtyResult<bool> {
        // SAFETY: The master fd is valid for the lifetime of this Pty
        let borrowed_fd = unsafe { BorrowedFd::borrow_raw(self.master.as_raw_fd()) };
        let mut fds = [PollFd::new(&borrowed_fd, events)];
        match poll(&mut fds, timeout_ms) {
            Ok(0) | Err(Errno::EINTR) => Ok(false),
            Ok(_) => Ok(fds[0].revents().is_some_and(|r| {
                r.intersects(events | PollFlags::POLLHUP | PollFlags::POLLERR)
            })),
            Err(e) => Err(PtyError::Poll(e)),
        }
    }

    /// Write as much of `data` as the kernel takes right now (possibly 0)
    pub fn write(&self, data: &[u8]) -> PtyResult<usize> {
        if self.closed.load(Ordering::Acquire) {
            return Err(PtyError::Closed);
        }
        match write(self.master.as_raw_fd(), data) {
            Ok(n) => Ok(n),
            Err(Errno::EAGAIN) | Err(Errno::EINTR) => Ok(0),
            Err(Errno::EIO) => Err(PtyError::Eof),
            Err(e) => Err(PtyError::Write(e)),
        }
    }

    /// Write all of `data`, waiting for buffer space while the child lives
    pub fn write_all(&self, mut data: &[u8]) -> PtyResult<()> {
        while !data.is_empty() {
            let n = self.write(data)?;
            if n == 0 {
                if !self.is_alive() {
                    return Err(PtyError::Eof);
                }
                self.poll_write(WRITE_POLL_MS)?;
                continue;
            }
            data = &data[n..];
        }
        Ok(())
    }

    /// Propagate a new window size to the child. No-op if unchanged.
    pub fn resize(&self, size: WindowSize) -> PtyResult<()> {
        let mut current = lock(&self.size);
        if *current == size {
            return Ok(());
        }
        set_window_size(self.master.as_raw_fd(), size)?;
        *current = size;
        drop(current);

        debug!(cols = size.cols, rows = size.rows, "resized pty");
        if self.is_alive() {
            self.signal_group(Signal::SIGWINCH)?;
        }
        Ok(())
    }

    /// Size as the kernel reports it
    pub fn window_size(&self) -> PtyResult<WindowSize> {
        get_window_size(self.master.as_raw_fd())
    }

    pub fn is_alive(&self) -> bool {
        self.reap(Some(WaitPidFlag::WNOHANG)).is_none()
    }

    /// Exit status, once the child has exited
    pub fn exit_status(&self) -> Option<ExitStatus> {
        self.reap(Some(WaitPidFlag::WNOHANG))
    }

    /// Terminate the child: SIGHUP and SIGTERM to its process group, then
    /// SIGKILL once `grace` has elapsed. Idempotent.
    pub fn close(&self, grace: Duration) -> PtyResult<Option<ExitStatus>> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(self.exit_status());
        }
        if !self.is_alive() {
            return Ok(self.exit_status());
        }

        let pid = self.child_pid.as_raw();
        debug!(pid, "sending SIGHUP and SIGTERM");
        self.signal_group(Signal::SIGHUP)?;
        self.signal_group(Signal::SIGTERM)?;

        let deadline = Instant::now() + grace;
        while Instant::now() < deadline {
            if !self.is_alive() {
                return Ok(self.exit_status());
            }
            std::thread::sleep(REAP_INTERVAL);
        }

        if self.is_alive() {
            debug!(pid, "grace period expired, sending SIGKILL");
            self.signal_group(Signal::SIGKILL)?;
            self.reap(None);
        }
        Ok(self.exit_status())
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    fn signal_group(&self, signal: Signal) -> PtyResult<()> {
        match killpg(self.child_pid, signal) {
            // Already gone
            Ok(()) | Err(Errno::ESRCH) => Ok(()),
            Err(e) => Err(PtyError::Signal(e)),
        }
    }

    /// Collect the child's status if it has exited. `None` while it runs.
    fn reap(&self, flags: Option<WaitPidFlag>) -> Option<ExitStatus> {
        let mut status = lock(&self.exit_status);
        if status.is_some() {
            return *status;
        }
        let reaped = match waitpid(self.child_pid, flags) {
            Ok(WaitStatus::Exited(_, code)) => ExitStatus::Exited(code),
            Ok(WaitStatus::Signaled(_, signal, _)) => ExitStatus::Signaled(signal as i32),
            // Still running, stopped or continued
            Ok(_) => return None,
            Err(Errno::EINTR) => return None,
            Err(_) => ExitStatus::Unknown,
        };
        debug!(pid = self.child_pid.as_raw(), status = ?reaped, "child exited");
        *status = Some(reaped);
        *status
    }
}

impl Drop for Pty {
    fn drop(&mut self) {
        if !self.is_closed() {
            let _ = self.close(DROP_GRACE);
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Everything the child needs, allocated before fork
struct PreparedExec {
    path: CString,
    working_dir: Option<CString>,
    _argv: Vec<CString>,
    _envp: Vec<CString>,
    /// NULL-terminated pointers into `_argv` and `_envp`
    argv_ptrs: Vec<*const libc::c_char>,
    envp_ptrs: Vec<*const libc::c_char>,
}

impl PreparedExec {
    fn new(program: &Path, command: &PtyCommand) -> PtyResult<Self> {
        let path = nul_free(program.as_os_str().as_bytes().to_vec(), "program path")?;

        let mut argv = vec![nul_free(
            command.program.as_os_str().as_bytes().to_vec(),
            "program path",
        )?];
        for arg in &command.args {
            argv.push(nul_free(arg.clone().into_bytes(), "argument")?);
        }

        let overridden = |key: &[u8]| {
            key == b"TERM"
                || key == b"COLORTERM"
                || command.env.iter().any(|(k, _)| k.as_bytes() == key)
        };
        let mut envp = Vec::new();
        for (key, value) in std::env::vars_os() {
            if overridden(key.as_bytes()) {
                continue;
            }
            let mut entry = key.as_bytes().to_vec();
            entry.push(b'=');
            entry.extend_from_slice(value.as_bytes());
            // Inherited entries with interior NULs cannot be passed on
            if let Ok(entry) = CString::new(entry) {
                envp.push(entry);
            }
        }
        let fixed = [("TERM", "xterm-256color"), ("COLORTERM", "truecolor")];
        for (key, value) in fixed
            .iter()
            .map(|(k, v)| (*k, *v))
            .chain(command.env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
        {
            if key.is_empty() || key.contains('=') {
                return Err(PtyError::InvalidArgument(format!(
                    "invalid environment variable name {key:?}"
                )));
            }
            envp.push(nul_free(format!("{key}={value}").into_bytes(), "environment")?);
        }

        let working_dir = command
            .working_dir
            .as_ref()
            .map(|dir| nul_free(dir.as_os_str().as_bytes().to_vec(), "working directory"))
            .transpose()?;

        let argv_ptrs = null_terminated(&argv);
        let envp_ptrs = null_terminated(&envp);
        Ok(Self {
            path,
            working_dir,
            _argv: argv,
            _envp: envp,
            argv_ptrs,
            envp_ptrs,
        })
    }
}

fn null_terminated(strings: &[CString]) -> Vec<*const libc::c_char> {
    strings
        .iter()
        .map(|s| s.as_ptr())
        .chain(std::iter::once(std::ptr::null()))
        .collect()
}

fn nul_free(bytes: Vec<u8>, what: &str) -> PtyResult<CString> {
    CString::new(bytes).map_err(|_| PtyError::InvalidArgument(format!("{what} contains a NUL byte")))
}

/// Runs in the forked child. Never returns.
fn exec_child(slave_name: &CStr, exec: &PreparedExec) -> ! {
    // SAFETY: only async-signal-safe libc calls between fork and exec; every
    // buffer they touch was allocated before the fork
    unsafe {
        libc::setsid();

        let slave = libc::open(slave_name.as_ptr(), libc::O_RDWR);
        if slave < 0 {
            libc::_exit(127);
        }
        // Make the slave our controlling terminal
        libc::ioctl(slave, libc::TIOCSCTTY as _, 0);
        for fd in [libc::STDIN_FILENO, libc::STDOUT_FILENO, libc::STDERR_FILENO] {
            if libc::dup2(slave, fd) < 0 {
                libc::_exit(127);
            }
        }
        if slave > libc::STDERR_FILENO {
            libc::close(slave);
        }

        if let Some(dir) = &exec.working_dir {
            if libc::chdir(dir.as_ptr()) < 0 {
                libc::_exit(127);
            }
        }

        // The Rust runtime ignores SIGPIPE; shells expect the default
        libc::signal(libc::SIGPIPE, libc::SIG_DFL);

        libc::execve(
            exec.path.as_ptr(),
            exec.argv_ptrs.as_ptr(),
            exec.envp_ptrs.as_ptr(),
        );
        libc::_exit(127)
    }
}

/// Close-on-exec plus non-blocking reads and writes
fn configure_master(fd: RawFd) -> PtyResult<()> {
    fcntl(fd, FcntlArg::F_SETFD(FdFlag::FD_CLOEXEC)).map_err(PtyError::SetNonBlocking)?;
    let flags = fcntl(fd, FcntlArg::F_GETFL).map_err(PtyError::SetNonBlocking)?;
    let flags = OFlag::from_bits_truncate(flags);
    fcntl(fd, FcntlArg::F_SETFL(flags | OFlag::O_NONBLOCK)).map_err(PtyError::SetNonBlocking)?;
    Ok(())
}

/// Find `program` directly or on `PATH`; it must be an executable file
fn resolve_program(program: &Path) -> PtyResult<PathBuf> {
    let not_found = || PtyError::ShellNotFound(program.to_path_buf());
    if program.as_os_str().is_empty() {
        return Err(not_found());
    }
    if program.components().count() > 1 || program.is_absolute() {
        return if is_executable(program) {
            Ok(program.to_path_buf())
        } else {
            Err(not_found())
        };
    }
    let search_path = std::env::var_os("PATH").unwrap_or_default();
    std::env::split_paths(&search_path)
        .map(|dir| dir.join(program))
        .find(|candidate| is_executable(candidate))
        .ok_or_else(not_found)
}

fn is_executable(path: &Path) -> bool {
    std::fs::metadata(path)
        .map(|meta| meta.is_file() && meta.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

/// Set the window size on a PTY file descriptor
fn set_window_size(fd: RawFd, size: WindowSize) -> PtyResult<()> {
    let winsize = libc::winsize {
        ws_row: size.rows,
        ws_col: size.cols,
        ws_xpixel: size.pixel_width,
        ws_ypixel: size.pixel_height,
    };

    // SAFETY: TIOCSWINSZ is a valid ioctl for setting window size
    let result = unsafe { libc::ioctl(fd, libc::TIOCSWINSZ, &winsize) };

    if result < 0 {
        Err(PtyError::SetWinsize(Errno::last()))
    } else {
        Ok(())
    }
}

fn get_window_size(fd: RawFd) -> PtyResult<WindowSize> {
    let mut winsize = libc::winsize {
        ws_row: 0,
        ws_col: 0,
        ws_xpixel: 0,
        ws_ypixel: 0,
    };

    // SAFETY: TIOCGWINSZ is a valid ioctl for getting window size
    let result = unsafe { libc::ioctl(fd, libc::TIOCGWINSZ, &mut winsize) };

    if result < 0 {
        Err(PtyError::SetWinsize(Errno::last()))
    } else {
        Ok(WindowSize {
            rows: winsize.ws_row,
            cols: winsize.ws_col,
            pixel_width: winsize.ws_xpixel,
            pixel_height: winsize.ws_ypixel,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Read until `needle` shows up, EOF, or the deadline passes
    fn read_until(pty: &Pty, needle: &str, timeout: Duration) -> String {
        let deadline = Instant::now() + timeout;
        let mut output = Vec::new();
        let mut buf = [0u8; 1024];
        while Instant::now() < deadline {
            if String::from_utf8_lossy(&output).contains(needle) {
                break;
            }
            if !pty.poll_read(50).unwrap() {
                continue;
            }
            match pty.read_nonblocking(&mut buf) {
                Ok(ReadOutcome::Data(n)) => output.extend_from_slice(&buf[..n]),
                Ok(ReadOutcome::WouldBlock) => {}
                Err(_) => break,
            }
        }
        String::from_utf8_lossy(&output).into_owned()
    }

    #[test]
    fn test_pty_spawn_echo() {
        let command = PtyCommand::new("/bin/echo").arg("hello");
        let pty = Pty::spawn(&command, WindowSize::new(80, 24)).unwrap();
        let output = read_until(&pty, "hello", Duration::from_secs(5));
        assert!(output.contains("hello"), "unexpected output: {output:?}");
    }

    #[test]
    fn test_pty_write_read() {
        let pty = Pty::open("/bin/cat", 80, 24, None).unwrap();
        pty.write_all(b"test\n").unwrap();
        let output = read_until(&pty, "test", Duration::from_secs(5));
        assert!(output.contains("test"), "unexpected output: {output:?}");
        pty.close(Duration::from_millis(500)).unwrap();
    }

    #[test]
    fn test_pty_environment() {
        let command = PtyCommand::new("/bin/sh")
            .args(["-c", "echo \"$TERM $VTCORE_TEST\""])
            .env("VTCORE_TEST", "yes");
        let pty = Pty::spawn(&command, WindowSize::default()).unwrap();
        let output = read_until(&pty, "xterm-256color yes", Duration::from_secs(5));
        assert!(output.contains("xterm-256color yes"), "unexpected output: {output:?}");
    }

    #[test]
    fn test_pty_working_dir() {
        let dir = tempfile::tempdir().unwrap();
        let marker = dir.path().file_name().unwrap().to_string_lossy().into_owned();
        let command = PtyCommand::new("/bin/sh")
            .args(["-c", "pwd"])
            .working_dir(dir.path());
        let pty = Pty::spawn(&command, WindowSize::default()).unwrap();
        let output = read_until(&pty, &marker, Duration::from_secs(5));
        assert!(output.contains(&marker), "unexpected output: {output:?}");
    }

    #[test]
    fn test_pty_resize() {
        let pty = Pty::open("/bin/sh", 80, 24, None).unwrap();
        pty.resize(WindowSize::new(120, 40)).unwrap();
        let size = pty.window_size().unwrap();
        assert_eq!((size.cols, size.rows), (120, 40));
        // Same size again is a no-op
        pty.resize(WindowSize::new(120, 40)).unwrap();
        pty.close(Duration::from_millis(500)).unwrap();
    }

    #[test]
    fn test_pty_missing_shell() {
        let err = Pty::open("/definitely/not/a/shell", 80, 24, None).unwrap_err();
        assert!(matches!(err, PtyError::ShellNotFound(_)));
        assert!(err.is_spawn_error());
    }

    #[test]
    fn test_pty_invalid_working_dir() {
        let err = Pty::open("/bin/sh", 80, 24, Some(Path::new("/definitely/not/a/dir"))).unwrap_err();
        assert!(matches!(err, PtyError::InvalidWorkingDir(_)));
    }

    #[test]
    fn test_pty_eof_after_exit() {
        let command = PtyCommand::new("/bin/sh").args(["-c", "exit 3"]);
        let pty = Pty::spawn(&command, WindowSize::default()).unwrap();
        let deadline = Instant::now() + Duration::from_secs(5);
        let mut buf = [0u8; 256];
        let mut saw_eof = false;
        while Instant::now() < deadline {
            pty.poll_read(50).unwrap();
            if let Err(PtyError::Eof) = pty.read_nonblocking(&mut buf) {
                saw_eof = true;
                break;
            }
        }
        assert!(saw_eof);
        while pty.is_alive() && Instant::now() < deadline {
            std::thread::sleep(REAP_INTERVAL);
        }
        assert_eq!(pty.exit_status(), Some(ExitStatus::Exited(3)));
    }

    #[test]
    fn test_pty_close_escalates_to_sigkill() {
        let command = PtyCommand::new("/bin/sh").args(["-c", "trap '' HUP TERM; echo ready; sleep 30"]);
        let pty = Pty::spawn(&command, WindowSize::default()).unwrap();
        read_until(&pty, "ready", Duration::from_secs(5));

        let status = pty.close(Duration::from_millis(200)).unwrap();
        assert_eq!(status, Some(ExitStatus::Signaled(libc::SIGKILL)));
        assert!(!pty.is_alive());
        assert!(matches!(pty.write(b"x"), Err(PtyError::Closed)));
        // Second close is a no-op
        assert_eq!(pty.close(Duration::ZERO).unwrap(), status);
    }
}
