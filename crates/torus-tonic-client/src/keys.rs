//! Key commands from standard input.

use std::io::BufRead;
use tokio::sync::mpsc;

/// Forwards the first character of each non-empty stdin line. The receiver
/// closes when stdin does.
///
/// Reading happens on a plain thread so a pending read never holds up
/// runtime shutdown.
pub fn stdin_keys() -> mpsc::Receiver<char> {
    let (tx, rx) = mpsc::channel(16);

    std::thread::spawn(move || {
        for line in std::io::stdin().lock().lines() {
            let line = match line {
                Ok(line) => line,
                Err(e) => {
                    tracing::warn!("Failed to read stdin: {e}");
                    break;
                }
            };
            let Some(key) = line.trim().chars().next() else {
                continue;
            };
            if tx.blocking_send(key).is_err() {
                break;
            }
        }
    });

    rx
}
