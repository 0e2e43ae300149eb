//! Output helpers shared by the `ecotrace` binary.

use std::fmt::Write as _;

use anyhow::Context;
use clap::ValueEnum;
use ecotrace_core::models::{AuthContext, PublicBatchView, TransportPage, TransportStats};
use ecotrace_core::{batch_follow_up, sidebar, LogFormat};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    Json,
    #[default]
    Table,
}

/// Truncate a string to max_len characters, appending "..." if truncated.
pub fn truncate_string(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}

/// Initialize tracing for the CLI. Logs go to stderr so stdout stays
/// machine-readable.
pub fn init_tracing(format: LogFormat) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    match format {
        LogFormat::Text => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init(),
        LogFormat::Json => tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init(),
    }
}

pub fn print_json(value: &impl Serialize) -> anyhow::Result<()> {
    let out = serde_json::to_string_pretty(value).context("Serialize response")?;
    println!("{}", out);
    Ok(())
}

/// `.env` lines that make later invocations run as `auth`.
pub fn env_lines(auth: &AuthContext) -> String {
    format!(
        "ECOTRACE_TOKEN={}\nECOTRACE_ROLE={}\nECOTRACE_USER={}\n",
        auth.token(),
        auth.role,
        auth.display_name
    )
}

pub fn render_sidebar(auth: &AuthContext) -> String {
    let mut out = format!("Signed in as {} ({})\n", auth.display_name, auth.role);
    let entries = sidebar(auth.role);
    if entries.is_empty() {
        out.push_str("No screens for this role.\n");
    }
    for entry in entries {
        let _ = writeln!(out, "  {:<18} {}", entry.label, entry.route);
    }
    out
}

pub fn render_transport_table(page: &TransportPage, skip: u64) -> String {
    let mut out = String::from("\n=== My Transports ===\n\n");
    let shown_to = skip + page.items.len() as u64;
    let _ = writeln!(
        out,
        "Total: {} transports (showing {} to {} of {})",
        page.total,
        if page.items.is_empty() { skip } else { skip + 1 },
        shown_to.min(page.total),
        page.total
    );

    if page.items.is_empty() {
        out.push_str("\nNo transports found.\n");
        return out;
    }

    let _ = writeln!(
        out,
        "\n{:<6} {:<6} {:<24} {:<24} {:>10} {:>12} {:>17}",
        "ID", "Batch", "Origin", "Destination", "Km", "CO2 (kg)", "Created"
    );
    let _ = writeln!(out, "{}", "-".repeat(105));
    for item in &page.items {
        let _ = writeln!(
            out,
            "{:<6} {:<6} {:<24} {:<24} {:>10.1} {:>12} {:>17}",
            item.id,
            item.batch_id,
            truncate_string(&item.origin, 24),
            truncate_string(&item.destination, 24),
            item.distance_km,
            item.transport_emission
                .map(|e| format!("{:.2}", e))
                .unwrap_or_else(|| "-".to_string()),
            item.created_at
                .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
                .unwrap_or_else(|| "-".to_string()),
        );
    }

    if shown_to < page.total {
        out.push_str("\n... (more transports available, use --page to see more)\n");
    }
    out
}

pub fn render_stats(stats: &TransportStats) -> String {
    format!(
        "Transports:        {}\nTotal distance:    {:.1} km\nTotal emission:    {:.2} kg CO2\nAvg emission / km: {:.3} kg\n",
        stats.total_transports, stats.total_distance, stats.total_emission, stats.avg_emission_per_km
    )
}

pub fn render_public_batch(
    batch_id: i64,
    view: &PublicBatchView,
    auth: Option<&AuthContext>,
) -> String {
    let mut out = format!("\n=== {} ===\n", view.product.name);
    if let Some(brand) = &view.product.brand {
        let _ = writeln!(out, "Brand:         {}", brand);
    }
    let _ = writeln!(
        out,
        "Status:        {}{}",
        view.batch.status,
        if view.batch.is_approved() { " (verified)" } else { "" }
    );
    if let Some(manufactured) = &view.batch.manufactured {
        let _ = writeln!(out, "Manufactured:  {}", manufactured);
    }
    if let Some(expiry) = &view.batch.expiry {
        let _ = writeln!(out, "Expiry:        {}", expiry);
    }
    if let Some(location) = &view.batch.location {
        let _ = writeln!(out, "Location:      {}", location);
    }
    let materials = view.batch.materials();
    if !materials.is_empty() {
        let _ = writeln!(out, "Materials:     {}", materials.join(", "));
    }
    if let Some(score) = view.sustainability_score() {
        let _ = writeln!(out, "Eco score:     {:.0}", score);
    }

    let _ = writeln!(
        out,
        "\nJourney ({} legs, {:.1} km):",
        view.transport.len(),
        view.total_transport_distance_km()
    );
    for leg in &view.transport {
        let _ = writeln!(
            out,
            "  {} -> {} ({:.1} km)",
            leg.origin, leg.destination, leg.distance_km
        );
    }

    let verified = view.lab_reports.iter().filter(|r| r.verified).count();
    let _ = writeln!(
        out,
        "\nLab reports: {} ({} verified)",
        view.lab_reports.len(),
        verified
    );

    if let Some((label, route)) = auth.and_then(|a| batch_follow_up(a.role, batch_id)) {
        let _ = writeln!(out, "\n{}: {}", label, route);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use ecotrace_core::models::{
        AiScore, BatchSummary, ProductSummary, Role, TransportLeg, TransportRecord,
    };

    #[test]
    fn truncate_string_short() {
        assert_eq!(truncate_string("hello", 10), "hello");
        assert_eq!(truncate_string("", 5), "");
    }

    #[test]
    fn truncate_string_long() {
        assert_eq!(truncate_string("hello world", 8), "hello...");
        assert_eq!(truncate_string("abc", 2), "...");
    }

    #[test]
    fn truncate_string_multibyte() {
        assert_eq!(truncate_string("Zürich Hauptbahnhof", 9), "Zürich...");
    }

    #[test]
    fn env_lines_for_login() {
        let auth = AuthContext::new(Role::Transporter, "jwt").with_display_name("Tess");
        assert_eq!(
            env_lines(&auth),
            "ECOTRACE_TOKEN=jwt\nECOTRACE_ROLE=transporter\nECOTRACE_USER=Tess\n"
        );
    }

    #[test]
    fn sidebar_lists_role_screens() {
        let out = render_sidebar(&AuthContext::new(Role::Transporter, "t"));
        assert!(out.contains("My Transports"));
        assert!(out.contains("/transporter/create"));

        let out = render_sidebar(&AuthContext::new(Role::Consumer, "t"));
        assert!(out.contains("No screens"));
    }

    fn record(id: i64) -> TransportRecord {
        TransportRecord {
            id,
            batch_id: 17,
            origin: "Warehouse A".to_string(),
            destination: "Store 4".to_string(),
            distance_km: 120.5,
            fuel_type: None,
            vehicle_type: None,
            notes: None,
            transport_emission: Some(12.0),
            transporter_id: None,
            created_at: None,
        }
    }

    #[test]
    fn transport_table_paging_hint() {
        let page = TransportPage {
            items: vec![record(1), record(2)],
            total: 5,
        };
        let out = render_transport_table(&page, 0);
        assert!(out.contains("showing 1 to 2 of 5"));
        assert!(out.contains("Warehouse A"));
        assert!(out.contains("12.00"));
        assert!(out.contains("use --page"));

        let empty = TransportPage {
            items: vec![],
            total: 0,
        };
        assert!(render_transport_table(&empty, 0).contains("No transports found."));
    }

    #[test]
    fn stats_block() {
        let stats = TransportStats {
            total_transports: 4,
            total_distance: 800.0,
            total_emission: 120.0,
            avg_emission_per_km: 0.15,
        };
        let out = render_stats(&stats);
        assert!(out.contains("Transports:        4"));
        assert!(out.contains("800.0 km"));
    }

    #[test]
    fn public_batch_with_follow_up() {
        let view = PublicBatchView {
            product: ProductSummary {
                name: "Oat Milk".to_string(),
                brand: None,
            },
            batch: BatchSummary {
                status: "approved".to_string(),
                manufactured: Some("2024-01-05".to_string()),
                expiry: None,
                location: None,
                base_carbon: None,
                material_info: Some("oats, water".to_string()),
            },
            transport: vec![TransportLeg {
                origin: "Plant".to_string(),
                destination: "Warehouse A".to_string(),
                distance_km: 40.0,
                emission: None,
            }],
            lab_reports: vec![],
            ai_score: Some(AiScore {
                final_score: Some(81.0),
            }),
        };

        let transporter = AuthContext::new(Role::Transporter, "t");
        let out = render_public_batch(17, &view, Some(&transporter));
        assert!(out.contains("approved (verified)"));
        assert!(out.contains("Materials:     oats, water"));
        assert!(out.contains("Plant -> Warehouse A (40.0 km)"));
        assert!(out.contains("Update Transport: /transporter/create?batch=17"));

        let anonymous = render_public_batch(17, &view, None);
        assert!(!anonymous.contains("Update Transport"));
    }
}
