//! Terminal implementations of the operator seams.
//!
//! Uses dialoguer for yes/no prompts and console for the countdown line.

use std::io::{self, Write};
use std::thread;
use std::time::{Duration, Instant};

use console::{Term, style};
use dialoguer::{Confirm, theme::ColorfulTheme};
use tracing::warn;

use ecsroll_core::prelude::*;

/// Asks on the terminal, re-asking until the operator answers y or n.
#[derive(Default)]
pub struct ConfirmPrompter {
    theme: ColorfulTheme,
}

impl ConfirmPrompter {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Prompter for ConfirmPrompter {
    fn confirm(&mut self, message: &str) -> anyhow::Result<bool> {
        let answer = Confirm::with_theme(&self.theme)
            .with_prompt(message)
            .interact()?;
        Ok(answer)
    }
}

/// Sleeps while rendering `message... mm:ss` on stderr.
pub struct CountdownPacer {
    term: Term,
}

impl CountdownPacer {
    pub fn new() -> Self {
        Self::with_term(Term::stderr())
    }

    fn with_term(term: Term) -> Self {
        Self { term }
    }

    /// Sleep for `duration`, redrawing the countdown once a second on a terminal.
    fn countdown(&self, message: &str, duration: Duration) -> io::Result<()> {
        if !self.term.is_term() {
            self.term
                .write_line(&format!("{}... ({})", message, format_countdown(duration.as_secs())))?;
            thread::sleep(duration);
            return Ok(());
        }

        let whole = duration.as_secs();
        for remaining in (1..=whole).rev() {
            self.term.clear_line()?;
            self.term
                .write_str(&format!("{}... {}", message, format_countdown(remaining)))?;
            thread::sleep(Duration::from_secs(1));
        }
        thread::sleep(duration.saturating_sub(Duration::from_secs(whole)));
        self.term.clear_line()?;
        self.term
            .write_line(&format!("{}... {}", message, style("done").dim()))
    }
}

impl Default for CountdownPacer {
    fn default() -> Self {
        Self::new()
    }
}

impl Pacer for CountdownPacer {
    fn pause(&mut self, message: &str, duration: Duration) {
        let started = Instant::now();
        if let Err(err) = self.countdown(message, duration) {
            warn!(%err, "failed to render countdown");
            // Still honour the full wait.
            thread::sleep(duration.saturating_sub(started.elapsed()));
        }
    }
}

/// `mm:ss`; minutes are not wrapped into hours.
pub fn format_countdown(seconds: u64) -> String {
    format!("{:02}:{:02}", seconds / 60, seconds % 60)
}

/// Prints snapshots as a fixed-column table.
pub struct TableReporter<W: Write = io::Stdout> {
    writer: W,
}

impl TableReporter<io::Stdout> {
    pub fn new() -> Self {
        Self::with_writer(io::stdout())
    }
}

impl Default for TableReporter<io::Stdout> {
    fn default() -> Self {
        Self::new()
    }
}

impl<W: Write> TableReporter<W> {
    /// Create a reporter with a custom writer (stderr, or a buffer in tests).
    pub fn with_writer(writer: W) -> Self {
        Self { writer }
    }

    fn render(&mut self, heading: &str, snapshot: &ClusterSnapshot) -> io::Result<()> {
        writeln!(self.writer)?;
        writeln!(self.writer, "{}", style(heading).bold())?;

        if snapshot.is_empty() {
            writeln!(self.writer, "(no container instances)")?;
            return Ok(());
        }

        let arn_width = snapshot
            .iter()
            .map(|r| r.scheduler_id.len())
            .max()
            .unwrap_or(0)
            .max("containerInstanceArn".len());

        writeln!(
            self.writer,
            "{:<20} {:<arn_width$} {:<10} {:>17} {:>17}",
            "ec2InstanceId",
            "containerInstanceArn",
            "status",
            "runningTasksCount",
            "pendingTasksCount",
        )?;
        writeln!(self.writer, "{}", "-".repeat(20 + arn_width + 10 + 17 + 17 + 4))?;

        for record in snapshot {
            writeln!(
                self.writer,
                "{:<20} {:<arn_width$} {:<10} {:>17} {:>17}",
                record.compute_id,
                record.scheduler_id,
                record.status.as_str(),
                record.running_task_count,
                record.pending_task_count,
            )?;
        }
        self.writer.flush()
    }
}

impl<W: Write> Reporter for TableReporter<W> {
    fn snapshot(&mut self, heading: &str, snapshot: &ClusterSnapshot) {
        if let Err(err) = self.render(heading, snapshot) {
            warn!(%err, "failed to print cluster snapshot");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(compute_id: &str, status: InstanceStatus, running: u32) -> InstanceRecord {
        InstanceRecord {
            compute_id: compute_id.to_string(),
            scheduler_id: format!("arn:aws:ecs:us-east-1:123:container-instance/prod/{compute_id}"),
            status,
            running_task_count: running,
            pending_task_count: 0,
        }
    }

    fn rendered(heading: &str, snapshot: &ClusterSnapshot) -> String {
        let mut reporter = TableReporter::with_writer(Vec::new());
        reporter.snapshot(heading, snapshot);
        String::from_utf8(reporter.writer).unwrap()
    }

    #[test]
    fn countdown_is_minutes_and_seconds() {
        assert_eq!(format_countdown(0), "00:00");
        assert_eq!(format_countdown(9), "00:09");
        assert_eq!(format_countdown(90), "01:30");
        assert_eq!(format_countdown(3_725), "62:05");
    }

    #[cfg(unix)]
    #[test]
    fn countdown_write_failure_still_waits_out_the_pause() {
        // The peer is dropped, so every write fails with a broken pipe.
        let (stream, _) = std::os::unix::net::UnixStream::pair().unwrap();
        let mut pacer =
            CountdownPacer::with_term(Term::read_write_pair(stream.try_clone().unwrap(), stream));
        assert!(
            pacer
                .countdown("Waiting for ASG", Duration::ZERO)
                .is_err()
        );

        let started = Instant::now();
        pacer.pause("Waiting for ASG", Duration::from_millis(20));
        assert!(started.elapsed() >= Duration::from_millis(20));
    }

    #[test]
    fn adapters_have_defaults() {
        let _prompter = ConfirmPrompter::default();
        let _pacer = CountdownPacer::default();
        let mut reporter = TableReporter::default();
        assert!(reporter.writer.flush().is_ok());
    }

    #[test]
    fn table_lists_every_member_with_header() {
        let snapshot = ClusterSnapshot::new(vec![
            record("i-0aaa", InstanceStatus::Active, 3),
            record("i-0bbb", InstanceStatus::Draining, 0),
        ]);
        let out = rendered("Current cluster members:", &snapshot);

        assert!(out.contains("Current cluster members:"));
        assert!(out.contains("ec2InstanceId"));
        assert!(out.contains("pendingTasksCount"));

        let rows: Vec<&str> = out.lines().filter(|l| l.starts_with("i-0")).collect();
        assert_eq!(rows.len(), 2);
        assert!(rows[0].contains("container-instance/prod/i-0aaa"));
        assert!(rows[0].contains("ACTIVE"));
        assert!(rows[1].contains("DRAINING"));
        assert!(rows[0].trim_end().ends_with('0'));
    }

    #[test]
    fn table_columns_line_up() {
        let snapshot = ClusterSnapshot::new(vec![
            record("i-1", InstanceStatus::Active, 12),
            record("i-0123456789abcdef0", InstanceStatus::Active, 1),
        ]);
        let out = rendered("members", &snapshot);
        let status_columns: Vec<usize> = out
            .lines()
            .filter(|l| l.starts_with("i-"))
            .map(|l| l.find("ACTIVE").unwrap())
            .collect();
        assert_eq!(status_columns[0], status_columns[1]);
    }

    #[test]
    fn empty_snapshot_says_so() {
        let out = rendered("members", &ClusterSnapshot::default());
        assert!(out.contains("(no container instances)"));
        assert!(!out.contains("ec2InstanceId"));
    }
}
