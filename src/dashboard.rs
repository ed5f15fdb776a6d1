//! Text rendering of a snapshot for the dashboard binary.

use std::fmt::Write as _;

use crate::summary::AggregateSummary;
use crate::GeoPoint;

pub const NO_DATA_MESSAGE: &str = "No live data available yet";

pub fn render_summary(summary: &AggregateSummary, booth: GeoPoint) -> String {
    let mut out = String::new();
    // Writing into a String cannot fail.
    let _ = writeln!(out, "Total detections: {}", summary.total_detections);

    let _ = writeln!(out, "\nBy type:");
    for (label, count, pct) in summary.class_breakdown() {
        let _ = writeln!(out, "  {:<14} {:>6}  {:>5.1}%", label, count, pct);
    }

    let _ = writeln!(out, "\nBy category:");
    for (category, count, pct) in summary.category_breakdown() {
        let _ = writeln!(out, "  {:<14} {:>6}  {:>5.1}%", category, count, pct);
    }

    let last = &summary.last_event;
    let _ = writeln!(
        out,
        "\nLatest: {} ({}) at {:.6}, {:.6}",
        last.friendly_label, last.category, last.latitude, last.longitude
    );
    let _ = writeln!(
        out,
        "Distance from booth: {:.0} m",
        booth.distance_m(&last.location())
    );
    let _ = write!(out, "Updated: {}", summary.updated_at.to_rfc3339());
    out
}
