//! Plain/table rendering for humans, matching `rich.Console` + `--json` in
//! the original `cli.py`; `prettytable-rs` stands in for `rich.table.Table`.

use prettytable::{format, row, Table};
use queuectl_core::Job;

pub fn job_table(jobs: &[Job]) -> Table {
    let mut table = Table::new();
    table.set_format(*format::consts::FORMAT_BOX_CHARS);
    table.set_titles(row!["ID", "Command", "State", "Attempts", "Priority", "Created"]);

    for job in jobs.iter().take(50) {
        table.add_row(row![
            truncate(&job.id, 12),
            truncate(&job.command, 40),
            job.state,
            format!("{}/{}", job.attempts, job.max_retries),
            job.priority,
            job.created_at.format("%Y-%m-%d %H:%M:%S"),
        ]);
    }

    table
}

pub fn dlq_table(jobs: &[Job]) -> Table {
    let mut table = Table::new();
    table.set_format(*format::consts::FORMAT_BOX_CHARS);
    table.set_titles(row!["ID", "Command", "Attempts", "Exit Code", "Updated"]);

    for job in jobs {
        table.add_row(row![
            truncate(&job.id, 12),
            truncate(&job.command, 40),
            job.attempts,
            job.last_exit_code
                .map(|c| c.to_string())
                .unwrap_or_else(|| "N/A".into()),
            job.updated_at.format("%Y-%m-%d %H:%M:%S"),
        ]);
    }

    table
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        format!("{}...", s.chars().take(max).collect::<String>())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use queuectl_core::model::JobState;
    use queuectl_core::time::utcnow;

    fn job_with_id(id: &str) -> Job {
        let now = utcnow();
        Job {
            id: id.to_string(),
            command: "echo hi".into(),
            state: JobState::Pending,
            attempts: 0,
            max_retries: 3,
            backoff_base: 2.0,
            priority: 0,
            run_at: now,
            timeout_s: None,
            created_at: now,
            updated_at: now,
            locked_by: None,
            locked_at: None,
            last_exit_code: None,
            stdout: None,
            stderr: None,
            duration_ms: None,
        }
    }

    #[test]
    fn job_table_does_not_panic_on_multibyte_id() {
        // A 12-byte prefix of this id would fall inside a 3-byte UTF-8
        // character, which a raw byte slice would panic on.
        let job = job_with_id("日本語日本語日本語-rest-of-id");
        let _ = job_table(&[job]);
    }

    #[test]
    fn dlq_table_does_not_panic_on_multibyte_id() {
        let job = job_with_id("日本語日本語日本語-rest-of-id");
        let _ = dlq_table(&[job]);
    }
}
