//! Disk usage probe for the Echo storage directory.
//!
//! Shells out to `df -B1 <path>`, which reports usage for whatever mount
//! the storage directory lives on, and parses the data row of the columnar
//! report. Probe failures are expected to degrade gracefully: callers log
//! and omit usage from the affected notification instead of failing it.

use std::path::Path;

use echo_protocol::types::DiskUsage;

/// Errors from the disk usage probe.
#[derive(Debug, thiserror::Error)]
pub enum ProbeError {
    #[error("failed to run df: {0}")]
    Spawn(#[from] std::io::Error),

    #[error("df exited with {status}: {stderr}")]
    Failed {
        status: std::process::ExitStatus,
        stderr: String,
    },

    #[error("unparseable df report: {0}")]
    Parse(String),
}

/// Queries total/used/free byte counts for the mount holding `path`.
pub async fn usage(path: &Path) -> Result<DiskUsage, ProbeError> {
    let output = tokio::process::Command::new("df")
        .arg("-B1")
        .arg(path)
        .output()
        .await?;

    if !output.status.success() {
        return Err(ProbeError::Failed {
            status: output.status,
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }

    parse_report(&String::from_utf8_lossy(&output.stdout))
}

/// Parses a `df -B1` report.
///
/// The report looks like:
///
/// ```text
/// Filesystem      1B-blocks       Used  Available Use% Mounted on
/// /dev/sda1      2883216560 1613121452 1123565624  59% /mnt/storage
/// ```
///
/// The second line is the data row for the queried path; columns two
/// through four are total, used and available bytes.
fn parse_report(report: &str) -> Result<DiskUsage, ProbeError> {
    let row = report
        .trim()
        .lines()
        .nth(1)
        .ok_or_else(|| ProbeError::Parse("report has no data row".into()))?;

    let columns: Vec<&str> = row.split_whitespace().collect();
    if columns.len() < 4 {
        return Err(ProbeError::Parse(format!(
            "expected at least 4 columns, got {}: {row:?}",
            columns.len()
        )));
    }

    let numeric = |column: &str| {
        column
            .parse::<u64>()
            .map_err(|_| ProbeError::Parse(format!("non-numeric column {column:?} in {row:?}")))
    };

    Ok(DiskUsage {
        total: numeric(columns[1])?,
        used: numeric(columns[2])?,
        free: numeric(columns[3])?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
Filesystem      1B-blocks       Used  Available Use% Mounted on
/dev/sda1      2883216560 1613121452 1123565624  59% /mnt/wdred
";

    #[test]
    fn parses_sample_report() {
        let usage = parse_report(SAMPLE).unwrap();
        assert_eq!(usage.total, 2_883_216_560);
        assert_eq!(usage.used, 1_613_121_452);
        assert_eq!(usage.free, 1_123_565_624);
    }

    #[test]
    fn parse_is_whitespace_independent() {
        let report = "Filesystem 1B-blocks Used Available Use% Mounted on\n\
                      /dev/root \t 1000 \t  400 \t\t 600   40% /\n";
        let usage = parse_report(report).unwrap();
        assert_eq!(usage.total, 1000);
        assert_eq!(usage.used, 400);
        assert_eq!(usage.free, 600);
    }

    #[test]
    fn parse_rejects_header_only_report() {
        let result = parse_report("Filesystem 1B-blocks Used Available Use% Mounted on\n");
        assert!(matches!(result, Err(ProbeError::Parse(_))));
    }

    #[test]
    fn parse_rejects_missing_columns() {
        let result = parse_report("header line\n/dev/sda1 1234\n");
        assert!(matches!(result, Err(ProbeError::Parse(_))));
    }

    #[test]
    fn parse_rejects_non_numeric_columns() {
        let result = parse_report("header line\n/dev/sda1 total used free 0% /\n");
        assert!(matches!(result, Err(ProbeError::Parse(_))));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn probes_a_real_directory() {
        let tmp = tempfile::tempdir().unwrap();
        let usage = usage(tmp.path()).await.unwrap();
        assert!(usage.total > 0);
    }

    #[tokio::test]
    async fn probe_fails_for_missing_path() {
        let result = usage(Path::new("/definitely/not/a/mount")).await;
        assert!(result.is_err());
    }
}
