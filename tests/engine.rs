//! Engine tests: a real shell behind the reader and writer workers

use std::thread;
use std::time::{Duration, Instant};

use vtcore::core::RenderSnapshot;
use vtcore::pty::ExitStatus;
use vtcore::search::SearchEngine;
use vtcore::{Engine, EngineConfig, Error, KeyAction, KeyCode, Modifiers};

const TIMEOUT: Duration = Duration::from_secs(10);

fn sh(args: &[&str]) -> EngineConfig {
    EngineConfig {
        shell: "/bin/sh".into(),
        args: args.iter().map(|s| s.to_string()).collect(),
        cols: 60,
        rows: 10,
        close_grace_ms: 200,
        ..EngineConfig::default()
    }
}

fn wait_for(engine: &Engine, what: impl Fn(&RenderSnapshot) -> bool) -> bool {
    let deadline = Instant::now() + TIMEOUT;
    while Instant::now() < deadline {
        if what(&engine.render_snapshot()) {
            return true;
        }
        thread::sleep(Duration::from_millis(10));
    }
    false
}

fn screen_contains(engine: &Engine, needle: &str) -> bool {
    wait_for(engine, |snap| snap.to_text().contains(needle))
}

#[test]
fn shell_output_reaches_snapshot() {
    let mut engine = Engine::spawn(sh(&[])).unwrap();
    engine.write(b"echo hello-$((1 + 1))\n").unwrap();
    assert!(screen_contains(&engine, "hello-2"));

    let snap = engine.render_snapshot();
    assert_eq!((snap.cols, snap.rows), (60, 10));
    assert!(snap.cursor.row < 10 && snap.cursor.col < 60);
    engine.close().unwrap();
}

#[test]
fn keys_are_translated_and_written() {
    let mut engine = Engine::spawn(sh(&[])).unwrap();
    for c in "echo keyed-$((2 + 3))".chars() {
        engine
            .feed_key(KeyCode::Char(c), Modifiers::NONE, KeyAction::Press)
            .unwrap();
        // Releases are accepted and produce nothing
        engine
            .feed_key(KeyCode::Char(c), Modifiers::NONE, KeyAction::Release)
            .unwrap();
    }
    engine
        .feed_key(KeyCode::Enter, Modifiers::NONE, KeyAction::Press)
        .unwrap();
    assert!(screen_contains(&engine, "keyed-5"));
    engine.close().unwrap();
}

#[test]
fn resize_updates_grid_and_child() {
    let mut engine = Engine::spawn(sh(&[])).unwrap();
    engine.resize(100, 30).unwrap();
    let snap = engine.render_snapshot();
    assert_eq!((snap.cols, snap.rows), (100, 30));

    engine.write(b"stty size\n").unwrap();
    assert!(screen_contains(&engine, "30 100"));
    engine.close().unwrap();
}

#[test]
fn title_from_osc() {
    let mut engine = Engine::spawn(sh(&[])).unwrap();
    engine.write(b"printf '\\033]0;vt-title\\007'\n").unwrap();
    assert!(wait_for(&engine, |snap| snap.title == "vt-title"));
    assert_eq!(engine.title(), "vt-title");
    engine.close().unwrap();
}

#[test]
fn exited_shell_freezes_screen_and_rejects_writes() {
    let mut engine = Engine::spawn(sh(&["-c", "echo last words; exit 3"])).unwrap();
    assert!(screen_contains(&engine, "last words"));

    let deadline = Instant::now() + TIMEOUT;
    while (engine.is_alive() || !engine.has_exited()) && Instant::now() < deadline {
        thread::sleep(Duration::from_millis(10));
    }
    assert!(!engine.is_alive());
    assert_eq!(engine.exit_status(), Some(ExitStatus::Exited(3)));
    assert!(matches!(engine.write(b"x"), Err(Error::ChannelClosed)));
    assert!(matches!(
        engine.feed_key(KeyCode::Enter, Modifiers::NONE, KeyAction::Press),
        Err(Error::ChannelClosed)
    ));

    // Content stays for inspection
    assert!(engine.render_snapshot().to_text().contains("last words"));
    engine.close().unwrap();
}

#[test]
fn close_is_idempotent() {
    let mut engine = Engine::spawn(sh(&[])).unwrap();
    let first = engine.close().unwrap();
    assert!(first.is_some());
    assert_eq!(engine.close().unwrap(), first);
    assert!(!engine.is_alive());
    assert!(matches!(engine.write(b"x"), Err(Error::ChannelClosed)));
}

#[test]
fn spawn_failure_is_a_spawn_error() {
    let config = EngineConfig::with_shell("/no/such/shell");
    assert!(matches!(Engine::spawn(config), Err(Error::Spawn(_))));

    let mut config = sh(&[]);
    config.rows = 0;
    assert!(matches!(Engine::spawn(config), Err(Error::Config(_))));
}

#[test]
fn scrollback_serializes_and_searches() {
    let script = "i=1; while [ $i -le 30 ]; do echo row$i; i=$((i + 1)); done; echo finished; sleep 30";
    let mut engine = Engine::spawn(sh(&["-c", script])).unwrap();
    assert!(screen_contains(&engine, "finished"));

    let archived = engine.render_snapshot().scrollback_lines;
    assert!(archived >= 20, "only {archived} lines archived");
    let window = engine.serialize_scrollback_window(0, archived).unwrap();
    assert_eq!(window.len(), archived);
    assert_eq!(window[0].text, "row1");
    assert!(matches!(
        engine.serialize_scrollback_window(0, archived + 1),
        Err(Error::Scrollback(_))
    ));

    let mut search = SearchEngine::new();
    search.set_query(r"^row1\d$", true, true).unwrap();
    let hits = engine.with_history(|view| search.find_all(&view));
    assert_eq!(hits.len(), 10);
    assert_eq!(hits[0].line, 9);

    // Restored lines land after the existing history
    engine.restore_scrollback(&window[..2]);
    let after = engine.serialize_scrollback_window(0, archived + 2).unwrap();
    assert_eq!(after[archived].text, "row1");
    assert_eq!(after[archived + 1].text, "row2");

    engine.close().unwrap();
}
