use std::time::Duration;

use crate::chain::wei_to_ether;
use crate::rpc_manager::EndpointReport;
use crate::transfer::{RunStats, TransferReceipt};

/// Draw `rows` as `label: value` lines inside a box headed by `title`.
pub fn boxed(title: &str, rows: &[(&str, String)]) -> String {
    let label_width = rows.iter().map(|(label, _)| label.chars().count()).max().unwrap_or(0);
    let lines: Vec<String> = rows
        .iter()
        .map(|(label, value)| format!("{:<width$}  {}", label, value, width = label_width))
        .collect();

    let inner = lines
        .iter()
        .map(|line| line.chars().count())
        .chain(std::iter::once(title.chars().count()))
        .max()
        .unwrap_or(0)
        + 2;

    let mut out = String::new();
    out.push_str(&format!("╔{}╗\n", "═".repeat(inner)));
    out.push_str(&format!("║ {:<width$} ║\n", title, width = inner - 2));
    out.push_str(&format!("╠{}╣\n", "═".repeat(inner)));
    for line in &lines {
        out.push_str(&format!("║ {:<width$} ║\n", line, width = inner - 2));
    }
    out.push_str(&format!("╚{}╝", "═".repeat(inner)));
    out
}

pub fn transfer_box(receipt: &TransferReceipt, link: Option<String>) -> String {
    let mut rows = vec![
        ("Source", format!("#{} {}", receipt.source_index + 1, receipt.from)),
        ("Balance", format!("{} ETH", wei_to_ether(receipt.balance))),
        ("Receiver", receipt.to.to_string()),
        ("Amount", format!("{} ETH", wei_to_ether(receipt.value))),
        ("Tx hash", receipt.hash.to_string()),
        ("Next in", format_delay(receipt.next_delay)),
    ];
    if let Some(link) = link {
        rows.push(("Explorer", link));
    }
    boxed("Transfer sent", &rows)
}

pub fn endpoint_report(reports: &[EndpointReport], expected_chain_id: u64) -> String {
    let mut report = String::new();
    report.push_str("RPC Endpoints Report:\n");
    report.push_str("---------------------\n");

    for endpoint in reports {
        let line = match &endpoint.outcome {
            Ok(id) if *id == expected_chain_id => format!(
                "✅ {}: chain {}, {}ms\n",
                endpoint.url,
                id,
                endpoint.elapsed.as_millis()
            ),
            Ok(id) => format!(
                "⚠️ {}: chain {} (expected {}), {}ms\n",
                endpoint.url,
                id,
                expected_chain_id,
                endpoint.elapsed.as_millis()
            ),
            Err(e) => format!("❌ {}: {}\n", endpoint.url, e),
        };
        report.push_str(&line);
    }

    report
}

pub fn summary_box(stats: &RunStats, elapsed: Duration) -> String {
    boxed(
        "Run summary",
        &[
            ("Cycles", stats.cycles.to_string()),
            ("Transfers sent", stats.sent.to_string()),
            ("Failures", stats.failed.to_string()),
            ("Elapsed", format!("{}s", elapsed.as_secs())),
        ],
    )
}

pub fn format_delay(delay: Duration) -> String {
    let secs = delay.as_secs();
    match secs {
        0 => format!("{}ms", delay.as_millis()),
        1..=59 => format!("{}s", secs),
        _ => format!("{}m {}s", secs / 60, secs % 60),
    }
}
