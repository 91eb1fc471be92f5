use anyhow::Result;
use chrono::Utc;
use colored::Colorize;
use ordsim_core::{Outcome, SimulationConfig, SimulationRun, StratumKey, TrialSummary};
use serde::Serialize;
use std::collections::BTreeMap;
use std::io::Write;
use std::time::Duration;

/// Participants and treated count for one age × SOFA stratum.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StratumRow {
    pub age_bucket: u8,
    pub sofa_bucket: u8,
    pub participants: usize,
    pub treated: usize,
}

#[derive(Debug, Serialize)]
struct RunReport<'a> {
    generated_at: String,
    config: &'a SimulationConfig,
    treated: usize,
    missing_injected: usize,
    strata: Vec<StratumRow>,
    summary: &'a TrialSummary,
}

pub fn stratum_rows(run: &SimulationRun) -> Vec<StratumRow> {
    let mut rows: BTreeMap<StratumKey, StratumRow> = BTreeMap::new();
    for participant in &run.reallocation.participants {
        let row = rows
            .entry(participant.stratum)
            .or_insert_with(|| StratumRow {
                age_bucket: participant.stratum.age_bucket,
                sofa_bucket: participant.stratum.sofa_bucket,
                participants: 0,
                treated: 0,
            });
        row.participants += 1;
        if participant.tx.is_treated() {
            row.treated += 1;
        }
    }
    rows.into_values().collect()
}

fn timestamp() -> String {
    Utc::now().format("%Y-%m-%dT%H:%M:%SZ").to_string()
}

pub fn generate_console_report(
    out: &mut dyn Write,
    run: &SimulationRun,
    summary: &TrialSummary,
    duration: Duration,
) -> Result<()> {
    writeln!(out)?;
    writeln!(out, "{}", "📊 Simulation Summary".bright_cyan().bold())?;
    writeln!(out, "{}", "=====================".cyan())?;
    writeln!(out, "Generated: {}", timestamp())?;
    writeln!(
        out,
        "Allocation prob: {}  Seed: {}",
        run.config.allocation_prob, run.config.seed
    )?;
    writeln!(out, "Participants: {}", summary.participants)?;
    writeln!(out, "Rows: {}", summary.rows)?;
    writeln!(
        out,
        "Treated: {}",
        run.reallocation.treated_count().to_string().green()
    )?;
    if run.config.missingness.is_some() {
        writeln!(
            out,
            "Missing observations injected: {}",
            run.missing_injected.to_string().yellow()
        )?;
    }
    writeln!(out, "Elapsed: {duration:?}")?;
    writeln!(out)?;

    writeln!(out, "{}", "🧮 Strata".bright_yellow().bold())?;
    writeln!(out, "{}", "=========".yellow())?;
    for row in stratum_rows(run) {
        writeln!(
            out,
            "   age Q{} × SOFA Q{}: {} participants, {} treated",
            row.age_bucket + 1,
            row.sofa_bucket + 1,
            row.participants,
            row.treated
        )?;
    }
    writeln!(out)?;

    for arm in &summary.arms {
        writeln!(out, "{} {}", "▶".bright_blue(), arm.tx.to_string().bold())?;
        writeln!(out, "   Participants: {}", arm.participants)?;
        writeln!(
            out,
            "   Deaths: {} ({:.1}%)",
            arm.deaths.to_string().red(),
            arm.mortality * 100.0
        )?;
        writeln!(out, "   Discharged home: {}", arm.discharged)?;
        writeln!(out, "   Died after discharge: {}", arm.died_after_discharge)?;
        writeln!(
            out,
            "   Mean hospital-free days (survivors): {:.2}",
            arm.mean_hospital_free_days
        )?;
    }
    Ok(())
}

pub fn generate_json_report(
    out: &mut dyn Write,
    run: &SimulationRun,
    summary: &TrialSummary,
) -> Result<()> {
    let report = RunReport {
        generated_at: timestamp(),
        config: &run.config,
        treated: run.reallocation.treated_count(),
        missing_injected: run.missing_injected,
        strata: stratum_rows(run),
        summary,
    };
    let json_output = serde_json::to_string_pretty(&report)?;
    writeln!(out, "{json_output}")?;
    Ok(())
}

pub fn generate_markdown_report(
    out: &mut dyn Write,
    run: &SimulationRun,
    summary: &TrialSummary,
) -> Result<()> {
    writeln!(out, "# Ordinal Trial Simulation\n")?;
    writeln!(out, "_Generated {}_\n", timestamp())?;

    writeln!(out, "## Configuration\n")?;
    writeln!(out, "- **Allocation prob**: {}", run.config.allocation_prob)?;
    writeln!(out, "- **Seed**: {}", run.config.seed)?;
    writeln!(
        out,
        "- **Follow-up completed**: {}",
        run.config.complete_follow_up
    )?;
    match &run.config.missingness {
        Some(m) => writeln!(
            out,
            "- **Missingness**: alive {}, dead {} ({} observations)\n",
            m.prob_missing_given_alive, m.prob_missing_given_dead, run.missing_injected
        )?,
        None => writeln!(out, "- **Missingness**: none\n")?,
    }

    writeln!(out, "## Arms\n")?;
    writeln!(
        out,
        "| Arm | Participants | Deaths | Mortality | Discharged | Died after discharge | Mean HFD |"
    )?;
    writeln!(out, "|---|---|---|---|---|---|---|")?;
    for arm in &summary.arms {
        writeln!(
            out,
            "| {} | {} | {} | {:.3} | {} | {} | {:.2} |",
            arm.tx,
            arm.participants,
            arm.deaths,
            arm.mortality,
            arm.discharged,
            arm.died_after_discharge,
            arm.mean_hospital_free_days
        )?;
    }

    writeln!(out, "\n## Strata\n")?;
    writeln!(out, "| Age quartile | SOFA quartile | Participants | Treated |")?;
    writeln!(out, "|---|---|---|---|")?;
    for row in stratum_rows(run) {
        writeln!(
            out,
            "| Q{} | Q{} | {} | {} |",
            row.age_bucket + 1,
            row.sofa_bucket + 1,
            row.participants,
            row.treated
        )?;
    }
    Ok(())
}

/// Daily state-occupancy table, one line per arm and day.
pub fn generate_csv_report(out: &mut dyn Write, summary: &TrialSummary) -> Result<()> {
    writeln!(
        out,
        "tx,time,dead,vent_ards,in_hospital,home,missing,proportion_home"
    )?;
    for cell in &summary.occupancy {
        let [dead, vent, hospital, home] = cell.counts;
        writeln!(
            out,
            "{},{},{dead},{vent},{hospital},{home},{},{:.4}",
            cell.tx.key(),
            cell.time,
            cell.missing,
            cell.proportion(Outcome::Home)
        )?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ordsim_core::{
        Dataset, OrdinalSum, ParticipantId, Record, SimulationConfig, Treatment, simulate,
    };

    fn run() -> SimulationRun {
        let mut records = Vec::new();
        for id in 1..=6u32 {
            for time in 1..=3u8 {
                records.push(Record {
                    id: ParticipantId(id),
                    time,
                    y: Some(if time == 1 { Outcome::VentArds } else { Outcome::Home }),
                    yprev: None,
                    age: 50.0 + f64::from(id),
                    sofa: f64::from(id % 3),
                    tx: Treatment::Control,
                    gap: None,
                });
            }
        }
        simulate(
            &Dataset::from_records(records),
            &SimulationConfig::default(),
            &OrdinalSum,
        )
        .unwrap()
    }

    #[test]
    fn strata_rows_cover_every_participant() {
        let run = run();
        let rows = stratum_rows(&run);
        assert_eq!(rows.iter().map(|r| r.participants).sum::<usize>(), 6);
        assert_eq!(
            rows.iter().map(|r| r.treated).sum::<usize>(),
            run.reallocation.treated_count()
        );
    }

    #[test]
    fn csv_report_has_header_and_one_line_per_cell() {
        let run = run();
        let summary = run.summary().unwrap();
        let mut buffer = Vec::new();
        generate_csv_report(&mut buffer, &summary).unwrap();
        let text = String::from_utf8(buffer).unwrap();
        let mut lines = text.lines();
        assert!(lines.next().unwrap().starts_with("tx,time,dead"));
        assert_eq!(lines.count(), summary.occupancy.len());
    }

    #[test]
    fn json_report_parses() {
        let run = run();
        let summary = run.summary().unwrap();
        let mut buffer = Vec::new();
        generate_json_report(&mut buffer, &run, &summary).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&buffer).unwrap();
        assert_eq!(value["summary"]["participants"], 6);
        assert!(value["strata"].is_array());
    }

    #[test]
    fn markdown_report_lists_arms() {
        let run = run();
        let summary = run.summary().unwrap();
        let mut buffer = Vec::new();
        generate_markdown_report(&mut buffer, &run, &summary).unwrap();
        let text = String::from_utf8(buffer).unwrap();
        assert!(text.starts_with("# Ordinal Trial Simulation"));
        assert!(text.contains("## Arms"));
    }
}
