use std::fmt::Display;
use std::sync::{Arc, Mutex};

use tracing::{error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportLevel {
    Info,
    Warn,
    Error,
    /// 构建必须停止
    Fatal,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Report {
    pub level: ReportLevel,
    pub message: String,
}

/// 构建期间的报告通道
///
/// 每条报告都会写入日志并被记录下来，供命令行汇总与测试检查。
#[derive(Debug, Clone, Default)]
pub struct Reporter {
    reports: Arc<Mutex<Vec<Report>>>,
}

impl Reporter {
    pub fn new() -> Self {
        Self::default()
    }

    fn record(&self, level: ReportLevel, message: String) {
        let mut reports = self.reports.lock().unwrap_or_else(|e| e.into_inner());
        reports.push(Report { level, message });
    }

    pub fn info(&self, message: impl Into<String>) {
        let message = message.into();
        info!("{}", message);
        self.record(ReportLevel::Info, message);
    }

    pub fn warn(&self, message: impl Into<String>) {
        let message = message.into();
        warn!("{}", message);
        self.record(ReportLevel::Warn, message);
    }

    /// 报告非致命错误，附带详细信息
    pub fn error<E: Display>(&self, message: impl Into<String>, details: &[E]) {
        let mut message = message.into();
        for detail in details {
            message.push_str("\n  ");
            message.push_str(&detail.to_string());
        }
        error!("{}", message);
        self.record(ReportLevel::Error, message);
    }

    /// 报告致命错误；调用方随后应中止构建
    pub fn panic_on_build(&self, message: impl Into<String>) {
        let message = message.into();
        error!("{}", message);
        self.record(ReportLevel::Fatal, message);
    }

    pub fn reports(&self) -> Vec<Report> {
        self.reports.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn count(&self, level: ReportLevel) -> usize {
        self.reports
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .filter(|r| r.level == level)
            .count()
    }

    pub fn has_fatal(&self) -> bool {
        self.count(ReportLevel::Fatal) > 0
    }

    pub fn clear(&self) {
        self.reports.lock().unwrap_or_else(|e| e.into_inner()).clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_reports_across_clones() {
        let reporter = Reporter::new();
        let shared = reporter.clone();

        shared.warn("careful");
        shared.error("There was an error fetching blog posts.", &["bad date", "no slug"]);

        let reports = reporter.reports();
        assert_eq!(reports.len(), 2);
        assert_eq!(reports[1].level, ReportLevel::Error);
        assert!(reports[1].message.contains("bad date"));
        assert!(reports[1].message.contains("no slug"));
        assert!(!reporter.has_fatal());

        reporter.panic_on_build("missing directory");
        assert!(reporter.has_fatal());
    }
}
