use crate::commands::CommandReport;
use crate::partset::subject::parse_subject;

pub fn run(subject: &str) -> CommandReport {
    let mut report = CommandReport::new("parse");
    let parsed = parse_subject(subject);

    report.detail(format!("subject={subject}"));
    report.detail(format!("base={}", parsed.base));
    match parsed.part {
        Some(part) => report.detail(format!("part={part}")),
        None => report.detail("part=none"),
    }
    report.detail(format!("trackable={}", parsed.is_trackable()));
    report
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reports_base_and_part() {
        let report = run("Report - 2");
        assert!(report.ok);
        assert!(report.details.contains(&"base=Report".to_string()));
        assert!(report.details.contains(&"part=2".to_string()));
        assert!(report.details.contains(&"trackable=true".to_string()));
    }

    #[test]
    fn untracked_subject_is_not_an_issue() {
        let report = run("Weekly digest");
        assert!(report.ok);
        assert!(report.details.contains(&"part=none".to_string()));
        assert!(report.details.contains(&"trackable=false".to_string()));
    }
}
