use crate::crds::ClusterScan;

/// Which child workload a `ClusterScan` converges to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanMode<'a> {
    /// Non-empty schedule: a `CronJob` owns the execution cadence
    Recurring { schedule: &'a str },
    /// Empty schedule: a single `Job`
    OneShot,
}

impl<'a> ScanMode<'a> {
    /// Select the mode from `spec.schedule` alone. The expression is not
    /// parsed; an invalid cron string is still recurring and is left for the
    /// `CronJob` controller to reject.
    #[must_use]
    pub fn select(scan: &'a ClusterScan) -> Self {
        if scan.spec.schedule.is_empty() {
            Self::OneShot
        } else {
            Self::Recurring {
                schedule: &scan.spec.schedule,
            }
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Recurring { .. } => "recurring",
            Self::OneShot => "one-shot",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crds::ClusterScanSpec;
    use k8s_openapi::api::batch::v1::JobTemplateSpec;

    fn scan_with_schedule(schedule: &str) -> ClusterScan {
        ClusterScan::new(
            "scan-a",
            ClusterScanSpec {
                schedule: schedule.to_string(),
                job_template: JobTemplateSpec::default(),
            },
        )
    }

    #[test]
    fn empty_schedule_is_one_shot() {
        let scan = scan_with_schedule("");
        assert_eq!(ScanMode::select(&scan), ScanMode::OneShot);
    }

    #[test]
    fn cron_schedule_is_recurring() {
        let scan = scan_with_schedule("0 2 * * *");
        assert_eq!(
            ScanMode::select(&scan),
            ScanMode::Recurring {
                schedule: "0 2 * * *"
            }
        );
    }

    #[test]
    fn malformed_schedule_is_still_recurring() {
        for schedule in ["not-a-cron", " ", "@every 5m", "61 * * * *"] {
            let scan = scan_with_schedule(schedule);
            assert!(
                matches!(ScanMode::select(&scan), ScanMode::Recurring { .. }),
                "schedule {schedule:?} should select recurring mode"
            );
        }
    }
}
