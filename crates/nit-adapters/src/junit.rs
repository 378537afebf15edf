//! JUnit-XML report parsing.
//!
//! The structured path for pytest, JUnit 5 (surefire), gtest, and every
//! other tool that can emit the de-facto-standard XML schema.

use quick_xml::events::Event;
use quick_xml::Reader;

use crate::types::{AdapterError, CaseResult, CaseStatus, RunResult};

/// Parse a JUnit XML document into a `RunResult`.
pub fn parse_junit_xml(xml: &str) -> Result<RunResult, AdapterError> {
    let mut reader = Reader::from_reader(xml.as_bytes());
    reader.trim_text(true);

    let mut cases: Vec<CaseResult> = Vec::new();
    let mut buf = Vec::new();

    // Depth tracking: inside a <testcase>, a nested <failure>, <error>,
    // or <skipped> element overrides the default passed status.
    let mut current: Option<CaseResult> = None;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) | Ok(Event::Empty(e)) => {
                let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                match name.as_str() {
                    "testcase" => {
                        if let Some(done) = current.take() {
                            cases.push(done);
                        }
                        let mut case = CaseResult {
                            name: String::new(),
                            status: CaseStatus::Passed,
                            duration_ms: 0.0,
                            failure_message: String::new(),
                            file_path: String::new(),
                        };
                        let mut classname = String::new();
                        for attr in e.attributes().flatten() {
                            let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
                            let value = attr.unescape_value().unwrap_or_default().into_owned();
                            match key.as_str() {
                                "name" => case.name = value,
                                "classname" => classname = value,
                                "time" => {
                                    case.duration_ms =
                                        value.parse::<f64>().unwrap_or(0.0) * 1000.0;
                                }
                                "file" => case.file_path = value,
                                _ => {}
                            }
                        }
                        if !classname.is_empty() {
                            case.name = format!("{classname}::{}", case.name);
                        }
                        current = Some(case);
                    }
                    "failure" => {
                        if let Some(case) = current.as_mut() {
                            case.status = CaseStatus::Failed;
                            case.failure_message = attr_message(&e);
                        }
                    }
                    "error" => {
                        if let Some(case) = current.as_mut() {
                            case.status = CaseStatus::Error;
                            case.failure_message = attr_message(&e);
                        }
                    }
                    "skipped" => {
                        if let Some(case) = current.as_mut() {
                            case.status = CaseStatus::Skipped;
                        }
                    }
                    _ => {}
                }
            }
            Ok(Event::End(e)) => {
                if e.name().as_ref() == b"testcase" {
                    if let Some(done) = current.take() {
                        cases.push(done);
                    }
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(AdapterError::ReportParse(format!("JUnit XML: {e}"))),
            _ => {}
        }
        buf.clear();
    }
    if let Some(done) = current.take() {
        cases.push(done);
    }

    Ok(RunResult::from_cases(cases, String::new()))
}

fn attr_message(e: &quick_xml::events::BytesStart<'_>) -> String {
    e.attributes()
        .flatten()
        .find(|a| a.key.as_ref() == b"message")
        .map(|a| a.unescape_value().unwrap_or_default().into_owned())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<testsuites>
  <testsuite name="pytest" tests="4" failures="1" errors="0" skipped="1">
    <testcase classname="tests.test_calc" name="test_add" time="0.002" />
    <testcase classname="tests.test_calc" name="test_subtract" time="0.001" />
    <testcase classname="tests.test_calc" name="test_divide" time="0.003">
      <failure message="ZeroDivisionError: division by zero">traceback</failure>
    </testcase>
    <testcase classname="tests.test_calc" name="test_slow" time="0.000">
      <skipped />
    </testcase>
  </testsuite>
</testsuites>
"#;

    #[test]
    fn parses_counts_and_statuses() {
        let result = parse_junit_xml(SAMPLE).unwrap();
        assert_eq!(result.passed, 2);
        assert_eq!(result.failed, 1);
        assert_eq!(result.skipped, 1);
        assert_eq!(result.errors, 0);
        assert_eq!(result.total(), 4);
        assert!(!result.success);
    }

    #[test]
    fn parses_failure_message_and_names() {
        let result = parse_junit_xml(SAMPLE).unwrap();
        let failed: Vec<&CaseResult> = result
            .test_cases
            .iter()
            .filter(|c| c.status == CaseStatus::Failed)
            .collect();
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].name, "tests.test_calc::test_divide");
        assert!(failed[0].failure_message.contains("ZeroDivisionError"));
        assert!(failed[0].duration_ms > 0.0);
    }

    #[test]
    fn all_passed_is_success() {
        let xml = r#"<testsuite tests="1"><testcase name="t" time="0.1"/></testsuite>"#;
        let result = parse_junit_xml(xml).unwrap();
        assert!(result.success);
        assert_eq!(result.passed, 1);
    }

    #[test]
    fn malformed_xml_is_an_error() {
        assert!(parse_junit_xml("<testsuite><unclosed").is_err());
    }
}
