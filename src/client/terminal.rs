use crate::client::UserCommand;
use crate::ports::Alert;
use crate::types::alarm::Alarm;

use std::io::Write;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

const BELL_INTERVAL: Duration = Duration::from_millis(600);

/// Rings the terminal bell until stopped.
#[derive(Default)]
pub struct TerminalAlert {
    bell: Option<JoinHandle<()>>,
}

impl Alert for TerminalAlert {
    fn start(&mut self, alarm: &Alarm) {
        self.stop();
        println!();
        println!("*** {} ({}) ***", alarm.label, alarm.time);
        println!("[d] dismiss  [s] snooze  [q] quit");
        self.bell = Some(tokio::spawn(async {
            let mut interval = tokio::time::interval(BELL_INTERVAL);
            loop {
                interval.tick().await;
                let mut stdout = std::io::stdout();
                let _ = stdout.write_all(b"\x07");
                let _ = stdout.flush();
            }
        }));
    }

    fn stop(&mut self) {
        if let Some(bell) = self.bell.take() {
            bell.abort();
        }
    }
}

impl Drop for TerminalAlert {
    fn drop(&mut self) {
        self.stop();
    }
}

pub(crate) fn parse_command(line: &str) -> Option<UserCommand> {
    match line.trim().to_ascii_lowercase().as_str() {
        "d" | "dismiss" => Some(UserCommand::Dismiss),
        "s" | "snooze" => Some(UserCommand::Snooze),
        "q" | "quit" | "exit" => Some(UserCommand::Quit),
        _ => None,
    }
}

/// Forwards recognised stdin lines as commands. End of input counts as quit.
pub fn spawn_stdin_commands() -> mpsc::Receiver<UserCommand> {
    let (sender, receiver) = mpsc::channel(8);
    tokio::spawn(async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        loop {
            match lines.next_line().await {
                Ok(Some(line)) => {
                    let Some(command) = parse_command(&line) else {
                        if !line.trim().is_empty() {
                            println!("unknown command: {}", line.trim());
                        }
                        continue;
                    };
                    if sender.send(command).await.is_err() {
                        break;
                    }
                }
                Ok(None) => {
                    let _ = sender.send(UserCommand::Quit).await;
                    break;
                }
                Err(err) => {
                    tracing::warn!(error = %err, "failed to read stdin");
                    let _ = sender.send(UserCommand::Quit).await;
                    break;
                }
            }
        }
    });
    receiver
}
