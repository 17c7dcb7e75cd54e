use chrono::{Local, NaiveDate};
use circrep_core::{AppConfig, CircuitRow};
use circrep_report::{reconcile, CircuitReport};
use circrep_telemetry::SoapTelemetryClient;

/// Fetch one circuit, reconcile it and print what its report would contain.
///
/// # Errors
///
/// Returns an error if the telemetry client cannot be built or the fetch
/// fails.
pub(crate) async fn run_preview(
    config: &AppConfig,
    node_id: &str,
    interface_id: &str,
    today: Option<NaiveDate>,
) -> anyhow::Result<()> {
    let client = SoapTelemetryClient::new(config)?;
    let records = client.circuit_status(node_id, interface_id).await?;

    let row = CircuitRow {
        row_number: 1,
        node_id: node_id.to_owned(),
        interface_id: interface_id.to_owned(),
        ..CircuitRow::default()
    };
    let today = today.unwrap_or_else(|| Local::now().date_naive());
    let report = reconcile(&records, &row, today);

    println!("records fetched: {}", records.len());
    for line in preview_lines(&report) {
        println!("{line}");
    }
    Ok(())
}

fn preview_lines(report: &CircuitReport) -> Vec<String> {
    let reported = report
        .grid
        .cells()
        .filter(|c| c.raw_inbound != 0 || c.raw_outbound != 0)
        .count();
    vec![
        format!("circuit:   {}", report.defaults.circuit_code),
        format!("name:      {}", report.defaults.display_name),
        format!("bandwidth: {}", report.defaults.bandwidth_label),
        format!(
            "period:    {} .. {} ({} days, {} hourly slots)",
            report.period.start,
            report.period.end,
            report.period.day_count(),
            report.grid.cell_count()
        ),
        format!("non-zero slots: {reported}"),
        format!(
            "average in/out: {} / {}",
            report.grand_total.inbound, report.grand_total.outbound
        ),
    ]
}
