use super::types::{CategoryResults, CheckResult, RunReport};
use anyhow::Result;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use std::io::Cursor;
use std::path::Path;

fn seconds(ms: u64) -> String {
    format!("{:.3}", ms as f64 / 1000.0)
}

fn category_time(category: &CategoryResults) -> u64 {
    category.results.iter().filter_map(|r| r.duration_ms).sum()
}

/// Render a run as JUnit XML: one `<testsuite>` per category, one `<testcase>` per check
pub fn generate_junit_xml(report: &RunReport) -> Result<String> {
    let mut writer = Writer::new_with_indent(Cursor::new(Vec::new()), b' ', 2);
    writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;

    let summary = &report.summary;
    let mut suites_start = BytesStart::new("testsuites");
    suites_start.push_attribute(("name", "lumi-api-tester"));
    suites_start.push_attribute(("tests", summary.total_checks.to_string().as_str()));
    suites_start.push_attribute(("failures", summary.failed.to_string().as_str()));
    suites_start.push_attribute((
        "time",
        seconds(summary.total_duration_ms.unwrap_or(0)).as_str(),
    ));
    writer.write_event(Event::Start(suites_start))?;

    for category in &report.categories {
        let mut suite_start = BytesStart::new("testsuite");
        suite_start.push_attribute(("name", category.name.as_str()));
        suite_start.push_attribute(("id", report.session_id.as_str()));
        suite_start.push_attribute((
            "tests",
            (category.passed + category.failed).to_string().as_str(),
        ));
        suite_start.push_attribute(("failures", category.failed.to_string().as_str()));
        suite_start.push_attribute(("time", seconds(category_time(category)).as_str()));
        suite_start.push_attribute(("timestamp", report.generated_at.as_str()));
        writer.write_event(Event::Start(suite_start))?;

        for result in &category.results {
            write_test_case(&mut writer, &category.name, result)?;
        }

        writer.write_event(Event::End(BytesEnd::new("testsuite")))?;
    }

    writer.write_event(Event::End(BytesEnd::new("testsuites")))?;

    let xml = String::from_utf8(writer.into_inner().into_inner())?;
    Ok(xml)
}

fn write_test_case<W: std::io::Write>(
    writer: &mut Writer<W>,
    category: &str,
    result: &CheckResult,
) -> Result<()> {
    let mut case_start = BytesStart::new("testcase");
    case_start.push_attribute(("name", result.test_name.as_str()));
    case_start.push_attribute(("classname", category));
    case_start.push_attribute(("time", seconds(result.duration_ms.unwrap_or(0)).as_str()));

    if result.success {
        writer.write_event(Event::Empty(case_start))?;
        return Ok(());
    }

    writer.write_event(Event::Start(case_start))?;

    let mut fail_start = BytesStart::new("failure");
    fail_start.push_attribute(("message", result.message.as_str()));
    fail_start.push_attribute(("type", "AssertionError"));
    writer.write_event(Event::Start(fail_start))?;
    let body = match &result.response {
        Some(snapshot) => format!("{}\n{}", result.message, snapshot),
        None => result.message.clone(),
    };
    writer.write_event(Event::Text(BytesText::new(&body)))?;
    writer.write_event(Event::End(BytesEnd::new("failure")))?;

    writer.write_event(Event::End(BytesEnd::new("testcase")))?;
    Ok(())
}

/// Write `junit.xml` into `output_dir`
pub fn write_report(report: &RunReport, output_dir: &Path) -> Result<()> {
    let xml = generate_junit_xml(report)?;
    let path = output_dir.join("junit.xml");
    std::fs::write(&path, xml)?;
    println!("    Generated JUnit report: {}", path.display());
    Ok(())
}
