use jobtrack_core::{JobKind, JobRowView, NoticeLevel, ResourceStatus, TrackerView};

pub(crate) fn progress_line(row: &JobRowView) -> String {
    let mut line = format!("[{}] {:?}", row.kind, row.status);
    if row.progress > 0 {
        line.push_str(&format!(" {}%", row.progress));
    }
    if let Some(poll) = row.poll {
        line.push_str(&format!(" (poll {}/{})", poll.attempts, poll.max_attempts));
    }
    if !row.message.is_empty() {
        line.push_str(" - ");
        line.push_str(&row.message);
    }
    line
}

pub(crate) fn print_progress(view: &TrackerView, kind: JobKind) {
    if let Some(row) = view.jobs.iter().find(|row| row.kind == kind) {
        println!("{}", progress_line(row));
    }
}

pub(crate) fn print_summary(view: &TrackerView, kind: JobKind) {
    for notice in view.notices.iter().filter(|notice| notice.kind == kind) {
        match notice.level {
            NoticeLevel::Blocking => eprintln!("error: {}", notice.text),
            NoticeLevel::Soft => eprintln!("warning: {}", notice.text),
        }
    }
    match kind {
        JobKind::Populate => {
            for section in &view.sections {
                println!("\n## {}\n{}", section.name, section.content);
            }
        }
        JobKind::Identify | JobKind::Ingest => {
            for reference in &view.resources {
                let marker = match reference.status {
                    ResourceStatus::Ingested => "+",
                    ResourceStatus::Error => "!",
                    ResourceStatus::Skipped => "-",
                    ResourceStatus::Pending | ResourceStatus::Processing => " ",
                };
                println!("{marker} {} {}", reference.id, reference.status_message);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jobtrack_core::{JobStatus, PollMode, PollRowView};
    use pretty_assertions::assert_eq;

    #[test]
    fn progress_line_shows_poll_budget() {
        let row = JobRowView {
            kind: JobKind::Ingest,
            status: JobStatus::Polling,
            progress: 66,
            message: "2 of 3 settled".into(),
            poll: Some(PollRowView {
                mode: PollMode::Primary,
                attempts: 3,
                max_attempts: 15,
            }),
        };

        assert_eq!(progress_line(&row), "[ingest] Polling 66% (poll 3/15) - 2 of 3 settled");
    }
}
