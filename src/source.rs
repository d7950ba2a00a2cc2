use anyhow::{Context, Result};
use parking_lot::Mutex;
use std::io::{BufRead, BufReader};
use std::process::{Child, Command, Stdio};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tokio::sync::mpsc::Sender;

use crate::types::SourceMessage;

/// Manages the helper process that watches the host media player and
/// prints one JSON message per line.
#[derive(Clone, Default)]
pub struct MediaSource {
    child: Arc<Mutex<Option<Child>>>,
}

impl MediaSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start delivering messages into `tx`. With an empty command the
    /// messages are read from our own stdin instead of a helper.
    pub fn spawn(&self, command: &[String], tx: Sender<SourceMessage>) -> Result<()> {
        let Some((program, args)) = command.split_first() else {
            log::info!("No media source command configured, reading events from stdin");
            thread::spawn(move || {
                let stdin = std::io::stdin();
                Self::read_messages(stdin.lock(), &tx);
            });
            return Ok(());
        };

        log::info!("Spawning media source: {} {:?}", program, args);

        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .with_context(|| format!("Failed to spawn media source {program:?}"))?;

        log::info!("Media source spawned with PID: {}", child.id());

        let stdout = child
            .stdout
            .take()
            .context("Failed to capture media source stdout")?;

        let stderr = child
            .stderr
            .take()
            .context("Failed to capture media source stderr")?;

        *self.child.lock() = Some(child);

        thread::spawn(move || {
            Self::read_messages(BufReader::new(stdout), &tx);
        });

        thread::spawn(move || {
            Self::read_stderr(BufReader::new(stderr));
        });

        Ok(())
    }

    fn parse_line(line: &str) -> Option<SourceMessage> {
        let line = line.trim();
        if line.is_empty() {
            return None;
        }

        log::debug!("Media source stdout: {}", line);

        match serde_json::from_str::<SourceMessage>(line) {
            Ok(message) => Some(message),
            Err(e) => {
                log::error!("Failed to parse media source message: {} - {}", e, line);
                None
            }
        }
    }

    /// Forward JSON messages until the stream ends or nobody is listening
    fn read_messages<R: BufRead>(reader: R, tx: &Sender<SourceMessage>) {
        for line in reader.lines() {
            match line {
                Ok(line) => {
                    let Some(message) = Self::parse_line(&line) else {
                        continue;
                    };
                    if tx.blocking_send(message).is_err() {
                        log::debug!("Event loop is gone, stopping media source reader");
                        break;
                    }
                }
                Err(e) => {
                    log::error!("Error reading media source output: {}", e);
                    break;
                }
            }
        }

        log::warn!("Media source reader stopped");
    }

    fn read_stderr<R: BufRead>(reader: R) {
        for line in reader.lines() {
            match line {
                Ok(line) => {
                    if !line.trim().is_empty() {
                        log::info!("[source] {}", line);
                    }
                }
                Err(e) => {
                    log::error!("Error reading media source stderr: {}", e);
                    break;
                }
            }
        }
    }

    pub fn is_running(&self) -> bool {
        let mut child_guard = self.child.lock();
        let Some(child) = child_guard.as_mut() else {
            return false;
        };

        match child.try_wait() {
            Ok(Some(status)) => {
                log::warn!("Media source has exited with {}", status);
                false
            }
            Ok(None) => true,
            Err(e) => {
                log::error!("Error checking media source status: {}", e);
                false
            }
        }
    }

    /// Ask the helper to exit, then force it after a grace period
    pub fn stop(&self) -> Result<()> {
        let Some(mut child) = self.child.lock().take() else {
            return Ok(());
        };

        log::info!("Stopping media source with PID {}...", child.id());

        #[cfg(unix)]
        {
            use nix::sys::signal::{kill, Signal};
            use nix::unistd::Pid;

            if let Err(e) = kill(Pid::from_raw(child.id() as i32), Signal::SIGTERM) {
                log::warn!("Failed to send SIGTERM to media source: {}", e);
            }
        }

        #[cfg(not(unix))]
        child.kill().ok();

        let max_wait = Duration::from_millis(2000);
        let check_interval = Duration::from_millis(100);
        let mut waited = Duration::ZERO;

        while waited < max_wait {
            thread::sleep(check_interval);
            waited += check_interval;

            match child.try_wait() {
                Ok(Some(status)) => {
                    log::info!("Media source exited with status: {}", status);
                    return Ok(());
                }
                Ok(None) => continue,
                Err(e) => {
                    log::error!("Error checking media source status: {}", e);
                    break;
                }
            }
        }

        log::warn!("Media source didn't stop after {:?}, killing it", max_wait);
        child.kill().context("Failed to kill media source")?;
        child.wait().context("Failed to wait for media source")?;
        log::info!("Media source forcefully terminated");

        Ok(())
    }
}

impl Drop for MediaSource {
    fn drop(&mut self) {
        // Clones share the child; only the last one tears it down
        if Arc::strong_count(&self.child) > 1 {
            return;
        }
        if let Err(e) = self.stop() {
            log::error!("Error stopping media source in Drop: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use tokio::sync::mpsc;

    use super::*;
    use crate::types::PlaybackState;

    #[test]
    fn skips_blank_and_malformed_lines() {
        let input = concat!(
            "\n",
            "{\"type\":\"playback_state\",\"state\":\"playing\"}\n",
            "not json\n",
            "   \n",
            "{\"type\":\"unknown_kind\"}\n",
            "{\"type\":\"now_playing\",\"title\":\"Innuendo\",\"artist\":\"Queen\"}\n",
        );
        let (tx, mut rx) = mpsc::channel(8);

        MediaSource::read_messages(Cursor::new(input), &tx);

        assert_eq!(
            rx.try_recv().unwrap(),
            SourceMessage::PlaybackState {
                state: PlaybackState::Playing
            }
        );
        assert_eq!(
            rx.try_recv().unwrap(),
            SourceMessage::NowPlaying {
                title: Some("Innuendo".into()),
                artist: Some("Queen".into())
            }
        );
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn stops_reading_when_receiver_is_gone() {
        let input = "{\"type\":\"nothing_playing\"}\n{\"type\":\"nothing_playing\"}\n";
        let (tx, rx) = mpsc::channel(8);
        drop(rx);

        // Returns instead of looping forever or panicking
        MediaSource::read_messages(Cursor::new(input), &tx);
    }

    #[test]
    fn missing_program_is_an_error() {
        let source = MediaSource::new();
        let (tx, _rx) = mpsc::channel(1);
        let command = vec!["/definitely/not/a/real/helper".to_string()];
        assert!(source.spawn(&command, tx).is_err());
        assert!(!source.is_running());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn forwards_helper_output() {
        let source = MediaSource::new();
        let (tx, mut rx) = mpsc::channel(8);
        let command = vec![
            "sh".to_string(),
            "-c".to_string(),
            r#"echo '{"type":"now_playing","title":"Bohemian Rhapsody","artist":"Queen"}'; echo 'helper ready' >&2"#
                .to_string(),
        ];

        source.spawn(&command, tx).unwrap();

        let message = tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(
            message,
            SourceMessage::NowPlaying {
                title: Some("Bohemian Rhapsody".into()),
                artist: Some("Queen".into())
            }
        );

        // The helper exits after printing, which closes the channel
        let closed = tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .unwrap();
        assert!(closed.is_none());
    }

    #[cfg(unix)]
    #[test]
    fn stop_terminates_long_running_helper() {
        let source = MediaSource::new();
        let (tx, _rx) = mpsc::channel(8);
        let command = vec!["sleep".to_string(), "30".to_string()];

        source.spawn(&command, tx).unwrap();
        assert!(source.is_running());

        source.stop().unwrap();
        assert!(!source.is_running());

        // Second stop is a no-op
        source.stop().unwrap();
    }
}
