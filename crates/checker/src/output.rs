//! Report rendering

use anyhow::Result;
use clap::ValueEnum;
use colored::Colorize;
use reserve_lib::{ComparisonKey, Delivery, DiffResult, Report, ServiceCategory};
use std::fmt::{self, Write};
use tabled::{settings::Style, Table, Tabled};

/// Output format for the report
#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text (default)
    #[default]
    Text,
    /// JSON format
    Json,
    /// HTML document, as sent in the report email
    Html,
}

#[derive(Tabled)]
struct ExpiringRow {
    #[tabled(rename = "Service")]
    service: &'static str,
    #[tabled(rename = "Reservation")]
    key: String,
    #[tabled(rename = "Expires In")]
    expires_in: String,
}

#[derive(Tabled)]
struct DiffRow {
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = "Count")]
    count: u64,
    #[tabled(rename = "Type")]
    key: String,
    #[tabled(rename = "Details")]
    details: String,
}

#[derive(Tabled)]
struct FailureRow {
    #[tabled(rename = "Account")]
    account: String,
    #[tabled(rename = "Service")]
    service: String,
    #[tabled(rename = "Reason")]
    reason: String,
}

/// Render the report in the requested format
pub fn render(report: &Report, delivery: Delivery, format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Json => Ok(serde_json::to_string_pretty(report)?),
        OutputFormat::Text => Ok(render_text(report, delivery)?),
        OutputFormat::Html => Ok(render_html(report, delivery)?),
    }
}

/// Email subject for a delivery
pub fn subject(delivery: Delivery) -> &'static str {
    match delivery {
        Delivery::ExpiryNoticeOnly => "Expiring Reserved Instances Report",
        Delivery::FullReport => "Reserved Instance Report",
    }
}

/// Services shown in the per-service sections; none for an expiry notice
fn services_for(delivery: Delivery) -> &'static [ServiceCategory] {
    match delivery {
        Delivery::ExpiryNoticeOnly => &[],
        Delivery::FullReport => &ServiceCategory::ALL,
    }
}

fn expiry_details(report: &Report, key: &ComparisonKey) -> String {
    let days = report.expiry_for(key);
    if days.is_empty() {
        return String::new();
    }
    let days: Vec<String> = days.iter().map(u32::to_string).collect();
    format!("Expires in {} days", days.join(", "))
}

/// Text report
pub fn render_text(report: &Report, delivery: Delivery) -> Result<String, fmt::Error> {
    let mut out = String::new();

    render_expiring(&mut out, report)?;

    if delivery == Delivery::FullReport {
        heading(&mut out, "Reserved Instances Report")?;
    }
    for &service in services_for(delivery) {
        if let Some(diff) = report.service(service) {
            render_service(&mut out, report, service, diff)?;
        }
    }

    if !report.failures.is_empty() {
        heading(&mut out, "Accounts Not Reconciled")?;
        let rows: Vec<FailureRow> = report
            .failures
            .iter()
            .map(|f| FailureRow {
                account: f.account.clone(),
                service: f.service.label().to_string(),
                reason: f.reason.clone(),
            })
            .collect();
        writeln!(out, "{}", table(rows))?;
        writeln!(out)?;
    }

    write!(
        out,
        "Generated {} ({})",
        report.generated_at.format("%Y-%m-%d %H:%M:%S UTC"),
        delivery
    )?;
    Ok(out)
}

fn table<T: Tabled>(rows: Vec<T>) -> String {
    Table::new(rows).with(Style::rounded()).to_string()
}

fn heading(out: &mut String, title: &str) -> fmt::Result {
    writeln!(out, "{}", title.bold())?;
    writeln!(out, "{}", "=".repeat(58))
}

fn render_expiring(out: &mut String, report: &Report) -> fmt::Result {
    heading(out, "Expiring Reserved Instances Report")?;

    let expiring = report.expiring();
    if expiring.is_empty() {
        writeln!(
            out,
            "No reservations expire in the next {} days.",
            report.horizon_days
        )?;
    } else {
        writeln!(
            out,
            "Reserved instances expiring in {} days or less:",
            report.horizon_days
        )?;
        let rows: Vec<ExpiringRow> = expiring
            .into_iter()
            .map(|(key, days)| ExpiringRow {
                service: key.service().label(),
                key: key.to_string(),
                expires_in: format!("{} days", days),
            })
            .collect();
        writeln!(out, "{}", table(rows))?;
    }
    writeln!(out)
}

fn render_service(
    out: &mut String,
    report: &Report,
    service: ServiceCategory,
    diff: &DiffResult,
) -> fmt::Result {
    let label = service.label();
    writeln!(
        out,
        "{}",
        format!("Below is the report on {} reserved instances:", label).bold()
    )?;

    let mut rows = Vec::new();
    for (key, count) in &diff.unused_reservations {
        rows.push(DiffRow {
            status: "UNUSED RESERVATION!".yellow().to_string(),
            count: *count,
            key: key.to_string(),
            details: expiry_details(report, key),
        });
    }
    for (key, count) in &diff.unreserved_instances {
        rows.push(DiffRow {
            status: "NOT RESERVED!".red().to_string(),
            count: *count,
            key: key.to_string(),
            details: report.ids_for(key).join(", "),
        });
    }

    if !rows.is_empty() {
        writeln!(out, "{}", table(rows))?;
    }
    if !diff.has_unused() {
        writeln!(out, "You have no unused {} reservations.", label)?;
    }
    if !diff.has_unreserved() {
        writeln!(out, "You have no unreserved {} instances.", label)?;
    }

    writeln!(
        out,
        "({}) running on-demand {} instances",
        diff.qty_running_instances, label
    )?;
    writeln!(out, "({}) {} reservations", diff.qty_reserved_instances, label)?;
    writeln!(
        out,
        "({}) Unreserved {} reservations",
        diff.qty_unreserved_instances, label
    )?;
    writeln!(out)
}

fn escape(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            c => escaped.push(c),
        }
    }
    escaped
}

/// HTML report with the same sections as the text report
pub fn render_html(report: &Report, delivery: Delivery) -> Result<String, fmt::Error> {
    let mut out = String::new();
    writeln!(out, "<!DOCTYPE html>")?;
    writeln!(out, "<html>")?;
    writeln!(out, "<head><meta charset=\"utf-8\"><title>{}</title></head>", subject(delivery))?;
    writeln!(out, "<body>")?;

    writeln!(out, "<h2>Expiring Reserved Instances Report</h2>")?;
    let expiring = report.expiring();
    if expiring.is_empty() {
        writeln!(
            out,
            "<p>No reservations expire in the next {} days.</p>",
            report.horizon_days
        )?;
    } else {
        writeln!(
            out,
            "<p>Reserved instances expiring in {} days or less:</p>",
            report.horizon_days
        )?;
        writeln!(out, "<table border=\"1\">")?;
        writeln!(out, "<tr><th>Service</th><th>Reservation</th><th>Expires In</th></tr>")?;
        for (key, days) in expiring {
            writeln!(
                out,
                "<tr><td>{}</td><td>{}</td><td>{} days</td></tr>",
                key.service().label(),
                escape(&key.to_string()),
                days
            )?;
        }
        writeln!(out, "</table>")?;
    }

    if delivery == Delivery::FullReport {
        writeln!(out, "<h2>Reserved Instances Report</h2>")?;
    }
    for &service in services_for(delivery) {
        if let Some(diff) = report.service(service) {
            render_service_html(&mut out, report, service, diff)?;
        }
    }

    if !report.failures.is_empty() {
        writeln!(out, "<h2>Accounts Not Reconciled</h2>")?;
        writeln!(out, "<table border=\"1\">")?;
        writeln!(out, "<tr><th>Account</th><th>Service</th><th>Reason</th></tr>")?;
        for failure in &report.failures {
            writeln!(
                out,
                "<tr><td>{}</td><td>{}</td><td>{}</td></tr>",
                escape(&failure.account),
                failure.service.label(),
                escape(&failure.reason)
            )?;
        }
        writeln!(out, "</table>")?;
    }

    writeln!(
        out,
        "<p><small>Generated {} ({})</small></p>",
        report.generated_at.format("%Y-%m-%d %H:%M:%S UTC"),
        delivery
    )?;
    writeln!(out, "</body>")?;
    write!(out, "</html>")?;
    Ok(out)
}

fn render_service_html(
    out: &mut String,
    report: &Report,
    service: ServiceCategory,
    diff: &DiffResult,
) -> fmt::Result {
    let label = service.label();
    writeln!(out, "<h3>Below is the report on {} reserved instances:</h3>", label)?;

    if diff.has_unused() || diff.has_unreserved() {
        writeln!(out, "<table border=\"1\">")?;
        writeln!(out, "<tr><th>Status</th><th>Count</th><th>Type</th><th>Details</th></tr>")?;
        for (key, count) in &diff.unused_reservations {
            writeln!(
                out,
                "<tr><td><b>UNUSED RESERVATION!</b></td><td>{}</td><td>{}</td><td>{}</td></tr>",
                count,
                escape(&key.to_string()),
                expiry_details(report, key)
            )?;
        }
        for (key, count) in &diff.unreserved_instances {
            writeln!(
                out,
                "<tr><td><b>NOT RESERVED!</b></td><td>{}</td><td>{}</td><td>{}</td></tr>",
                count,
                escape(&key.to_string()),
                escape(&report.ids_for(key).join(", "))
            )?;
        }
        writeln!(out, "</table>")?;
    }
    if !diff.has_unused() {
        writeln!(out, "<p>You have no unused {} reservations.</p>", label)?;
    }
    if !diff.has_unreserved() {
        writeln!(out, "<p>You have no unreserved {} instances.</p>", label)?;
    }

    writeln!(out, "<ul>")?;
    writeln!(
        out,
        "<li>({}) running on-demand {} instances</li>",
        diff.qty_running_instances, label
    )?;
    writeln!(out, "<li>({}) {} reservations</li>", diff.qty_reserved_instances, label)?;
    writeln!(
        out,
        "<li>({}) Unreserved {} reservations</li>",
        diff.qty_unreserved_instances, label
    )?;
    writeln!(out, "</ul>")
}
