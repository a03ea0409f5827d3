//! PTY channel tests against real child processes

use std::path::Path;
use std::time::{Duration, Instant};

use vtcore::pty::{ExitStatus, Pty, PtyCommand, PtyError, ReadOutcome, WindowSize};

/// Collect output until `needle` appears, the child closes, or time runs out
fn read_until(pty: &Pty, needle: &str, timeout: Duration) -> (String, bool) {
    let deadline = Instant::now() + timeout;
    let mut output = Vec::new();
    let mut buf = [0u8; 4096];
    let mut eof = false;
    while Instant::now() < deadline && !String::from_utf8_lossy(&output).contains(needle) {
        if !pty.poll_read(50).unwrap() {
            continue;
        }
        match pty.read_nonblocking(&mut buf) {
            Ok(ReadOutcome::Data(n)) => output.extend_from_slice(&buf[..n]),
            Ok(ReadOutcome::WouldBlock) => {}
            Err(PtyError::Eof) => {
                eof = true;
                break;
            }
            Err(e) => panic!("read failed: {e}"),
        }
    }
    (String::from_utf8_lossy(&output).into_owned(), eof)
}

#[test]
fn shell_round_trip() {
    let pty = Pty::open("/bin/sh", 80, 24, None).unwrap();
    assert!(pty.is_alive());
    pty.write_all(b"echo vtcore-$((6 * 7))\n").unwrap();
    let (output, _) = read_until(&pty, "vtcore-42", Duration::from_secs(5));
    assert!(output.contains("vtcore-42"), "unexpected output: {output:?}");

    let status = pty.close(Duration::from_millis(500)).unwrap();
    assert!(status.is_some());
    assert!(!pty.is_alive());
}

#[test]
fn read_never_blocks_without_output() {
    let pty = Pty::open("/bin/cat", 80, 24, None).unwrap();
    std::thread::sleep(Duration::from_millis(50));
    let mut buf = [0u8; 64];
    let start = Instant::now();
    let outcome = pty.read_nonblocking(&mut buf).unwrap();
    assert_eq!(outcome, ReadOutcome::WouldBlock);
    assert!(start.elapsed() < Duration::from_secs(1));
    pty.close(Duration::from_millis(500)).unwrap();
}

#[test]
fn child_exit_reports_eof_and_status() {
    let command = PtyCommand::new("/bin/sh").args(["-c", "echo bye; exit 7"]);
    let pty = Pty::spawn(&command, WindowSize::default()).unwrap();
    let (output, eof) = read_until(&pty, "\u{0}never", Duration::from_secs(5));
    assert!(output.contains("bye"));
    assert!(eof);

    let deadline = Instant::now() + Duration::from_secs(5);
    while pty.is_alive() && Instant::now() < deadline {
        std::thread::sleep(Duration::from_millis(10));
    }
    assert_eq!(pty.exit_status(), Some(ExitStatus::Exited(7)));
}

#[test]
fn resize_reaches_child() {
    let pty = Pty::open("/bin/sh", 80, 24, None).unwrap();
    pty.resize(WindowSize::new(100, 30)).unwrap();
    pty.write_all(b"stty size\n").unwrap();
    let (output, _) = read_until(&pty, "30 100", Duration::from_secs(5));
    assert!(output.contains("30 100"), "unexpected output: {output:?}");
    pty.close(Duration::from_millis(500)).unwrap();
}

#[test]
fn spawn_errors_are_reported_before_fork() {
    let err = Pty::open("/no/such/shell", 80, 24, None).unwrap_err();
    assert!(matches!(err, PtyError::ShellNotFound(_)));

    let err = Pty::open("definitely-not-a-command-vtcore", 80, 24, None).unwrap_err();
    assert!(matches!(err, PtyError::ShellNotFound(_)));

    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("gone");
    let err = Pty::open("/bin/sh", 80, 24, Some(&missing)).unwrap_err();
    assert!(matches!(err, PtyError::InvalidWorkingDir(_)));

    // A directory is not an executable
    let err = Pty::open(Path::new("/"), 80, 24, None).unwrap_err();
    assert!(err.is_spawn_error());
}

#[test]
fn write_after_close_fails() {
    let pty = Pty::open("/bin/cat", 80, 24, None).unwrap();
    pty.close(Duration::from_millis(500)).unwrap();
    assert!(matches!(pty.write(b"x"), Err(PtyError::Closed)));
    // Idempotent
    pty.close(Duration::from_millis(500)).unwrap();
}
