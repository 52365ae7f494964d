use colored::{ColoredString, Colorize};
use drover_core::{Job, JobSnapshot, JobStatus, ps};

pub fn paint_status(text: &str, status: JobStatus) -> ColoredString {
    match status {
        JobStatus::Running => text.green(),
        JobStatus::Paused => text.yellow(),
        JobStatus::Success => text.cyan(),
        JobStatus::Failed => text.red(),
        JobStatus::Unbound => text.dimmed(),
    }
}

pub fn humanize_secs(total: i64) -> String {
    let total = total.max(0);
    let hours = total / 3600;
    let minutes = (total % 3600) / 60;
    let seconds = total % 60;
    if hours > 0 {
        format!("{hours}h {minutes}m {seconds}s")
    } else if minutes > 0 {
        format!("{minutes}m {seconds}s")
    } else {
        format!("{seconds}s")
    }
}

pub fn print_table(rows: &[JobSnapshot], verbose: bool) {
    if rows.is_empty() {
        println!("No jobs yet. Start one with: drover run <command>");
        return;
    }

    let mut header = vec!["#", "Name", "PID"];
    if verbose {
        header.push("Command");
    }
    header.extend(["Status", "RC", "Runtime"]);
    let status_col = header.len() - 3;

    let mut table: Vec<Vec<String>> = Vec::with_capacity(rows.len());
    for snap in rows {
        let mut cells = vec![
            snap.id.to_string(),
            snap.name.clone().unwrap_or_else(|| "-".to_string()),
            snap.pid.map_or_else(|| "-".to_string(), |p| p.to_string()),
        ];
        if verbose {
            cells.push(snap.command.clone());
        }
        cells.push(snap.status.to_string());
        cells.push(
            snap.return_code
                .map_or_else(|| "-".to_string(), |c| c.to_string()),
        );
        cells.push(
            snap.runtime_secs
                .map_or_else(|| "-".to_string(), humanize_secs),
        );
        table.push(cells);
    }

    let mut widths: Vec<usize> = header.iter().map(|h| h.len()).collect();
    for cells in &table {
        for (i, cell) in cells.iter().enumerate() {
            widths[i] = widths[i].max(cell.len());
        }
    }

    let mut head = Vec::with_capacity(header.len());
    for (i, title) in header.iter().enumerate() {
        head.push(format!("{title:<width$}", width = widths[i]));
    }
    println!("{}", head.join("  ").trim_end().bold());

    // Pad before painting so escape codes stay out of the width math.
    for (snap, cells) in rows.iter().zip(&table) {
        let mut line = Vec::with_capacity(cells.len());
        for (i, cell) in cells.iter().enumerate() {
            let padded = format!("{cell:<width$}", width = widths[i]);
            if i == status_col {
                line.push(paint_status(&padded, snap.status).to_string());
            } else {
                line.push(padded);
            }
        }
        println!("{}", line.join("  ").trim_end());
    }
}

pub fn print_detail(job: &Job, snap: &JobSnapshot, verbose: bool) {
    let title = match &snap.name {
        Some(name) => format!("Job {} ({name})", snap.id),
        None => format!("Job {}", snap.id),
    };
    println!("{}", title.bold());
    println!(
        "  {:<9} {}",
        "Status:",
        paint_status(&snap.status.to_string(), snap.status)
    );
    print_kv("Command", Some(snap.command.clone()));
    print_kv("PID", snap.pid.map(|p| p.to_string()));
    print_kv("RC", snap.return_code.map(|c| c.to_string()));
    print_kv(
        "Started",
        snap.started_at
            .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string()),
    );
    print_kv("Runtime", snap.runtime_secs.map(humanize_secs));

    if !verbose {
        return;
    }
    print_kv("Stdout", Some(job.stdout_path().display().to_string()));
    print_kv("Stderr", Some(job.stderr_path().display().to_string()));
    if let Some(pid) = snap.pid {
        print_kv("User", ps::username(pid));
        print_kv("Parent", ps::ppid(pid).map(|p| p.to_string()));
        print_kv("Workdir", ps::cwd(pid).map(|p| p.display().to_string()));
        if let Some(env) = ps::environ(pid) {
            println!("  Environment ({} vars):", env.len());
            for (key, value) in env {
                println!("    {key}={value}");
            }
        }
    }
}

fn print_kv(label: &str, value: Option<String>) {
    let tag = format!("{label}:");
    let shown = value.unwrap_or_else(|| "-".to_string());
    println!("  {tag:<9} {shown}");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn humanize_covers_the_three_shapes() {
        assert_eq!(humanize_secs(45), "45s");
        assert_eq!(humanize_secs(125), "2m 5s");
        assert_eq!(humanize_secs(3725), "1h 2m 5s");
    }

    #[test]
    fn humanize_clamps_clock_skew() {
        assert_eq!(humanize_secs(-3), "0s");
    }
}
