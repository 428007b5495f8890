//! Rendering change sets as a terminal table, CSV or JSON

use anyhow::Result;
use std::fmt::Write as _;
use std::io::Write;

use crate::models::HoldingChange;
use crate::watchtower::EtfChangeSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Table,
    Csv,
    Json,
}

pub fn write_change_sets<W: Write>(sets: &[EtfChangeSet], format: OutputFormat, writer: &mut W) -> Result<()> {
    match format {
        OutputFormat::Table => {
            writer.write_all(render_table(sets).as_bytes())?;
        }
        OutputFormat::Csv => {
            let changes: Vec<&HoldingChange> = sets.iter().flat_map(|s| s.changes.iter()).collect();
            write_csv(&changes, &mut *writer)?;
        }
        OutputFormat::Json => {
            serde_json::to_writer_pretty(&mut *writer, sets)?;
            writeln!(writer)?;
        }
    }
    writer.flush()?;
    Ok(())
}

/// One CSV row per change, header included
pub fn write_csv<W: Write>(changes: &[&HoldingChange], writer: W) -> Result<()> {
    let mut csv_writer = csv::Writer::from_writer(writer);
    for change in changes {
        csv_writer.serialize(change)?;
    }
    csv_writer.flush()?;
    Ok(())
}

pub fn render_table(sets: &[EtfChangeSet]) -> String {
    let mut out = String::new();

    if sets.is_empty() {
        out.push_str("No changes found.\n");
        return out;
    }

    for set in sets {
        let _ = writeln!(
            out,
            "\n📈 {}  {} → {}  ({} buys, {} sells, {} new, {} exited)",
            set.etf_ticker,
            set.prev_date,
            set.curr_date,
            set.summary.buys,
            set.summary.sells,
            set.summary.new_positions,
            set.summary.exited_positions
        );

        if set.changes.is_empty() {
            out.push_str("   No changes\n");
            continue;
        }

        let _ = writeln!(
            out,
            "   {:<6} {:<10} {:>16} {:>16} {:>16} {:>9}  {}",
            "ACTION", "TICKER", "PREV", "CURR", "DELTA", "PCT", "NAME"
        );
        for change in &set.changes {
            let pct = change
                .pct_change
                .map(|p| format!("{:+.2}%", p))
                .unwrap_or_else(|| "new".to_string());
            let _ = writeln!(
                out,
                "   {:<6} {:<10} {:>16.2} {:>16.2} {:>+16.2} {:>9}  {}",
                change.action.to_string(),
                change.holding_ticker,
                change.prev_shares,
                change.curr_shares,
                change.share_delta,
                pct,
                change.holding_name.as_deref().unwrap_or("")
            );
        }
    }

    out
}
