//! Output rendering and formatting

use crate::plan::PlanReport;
use crate::report::{CommandOutput, Inspection};
use comfy_table::{
    presets::{ASCII_FULL, UTF8_FULL},
    Attribute, Cell, Color, ContentArrangement, Table,
};
use console::{Style, Term};
use rackfit_resources::{PoolDetails, PoolStats, SlotCounts, ValidationReport};
use rackfit_types::{ColorChoice, OutputFormat, ResourceType};
use std::collections::BTreeMap;
use std::fmt::Display;
use std::io;

/// Output renderer for CLI results
#[derive(Clone)]
pub struct OutputRenderer {
    /// Output format
    format: OutputFormat,
    /// Color configuration
    color_choice: ColorChoice,
    /// Terminal instance
    term: Term,
}

impl OutputRenderer {
    /// Create new output renderer
    pub fn new(format: OutputFormat, color_choice: ColorChoice) -> Self {
        Self {
            format,
            color_choice,
            term: Term::stdout(),
        }
    }

    /// Render command output
    pub fn render(&self, output: &CommandOutput) -> io::Result<()> {
        if self.format == OutputFormat::Json {
            self.render_json(output)
        } else {
            self.render_table(output)
        }
    }

    /// Render as JSON
    fn render_json(&self, output: &CommandOutput) -> io::Result<()> {
        let json = output.to_json().map_err(io::Error::other)?;
        println!("{json}");
        Ok(())
    }

    /// Render as formatted table
    fn render_table(&self, output: &CommandOutput) -> io::Result<()> {
        match output {
            CommandOutput::Validation(report) => self.render_validation(report),
            CommandOutput::Inspection(inspection) => self.render_inspection(inspection),
            CommandOutput::Plan(report) => self.render_plan(report),
        }
    }

    fn render_validation(&self, report: &ValidationReport) -> io::Result<()> {
        if report.valid {
            println!("{} Build file is structurally valid.", self.ok_tag());
            return Ok(());
        }

        println!(
            "{} Build file has {} structural problem(s):",
            self.error_tag(),
            report.errors.len()
        );
        for error in &report.errors {
            println!("  - {error}");
        }
        Ok(())
    }

    fn render_inspection(&self, inspection: &Inspection) -> io::Result<()> {
        println!("{}", self.style_heading("Resource pools"));
        println!("{}", self.stats_table(&inspection.stats));
        println!();

        if !inspection.absent.is_empty() {
            println!(
                "Not provided by this platform: {}",
                join(inspection.absent.iter().map(|r| r.label()))
            );
        }
        self.render_bottlenecks(&inspection.bottlenecks, Some(inspection.bottleneck_threshold));
        Ok(())
    }

    fn render_plan(&self, report: &PlanReport) -> io::Result<()> {
        println!("{}", self.style_heading("Placements"));

        let mut table = self.table();
        table.set_header(vec![
            header("Component"),
            header("UUID"),
            header("Placed in"),
            header("Lanes"),
            header("Result"),
        ]);

        for placement in &report.placements {
            let result = match (&placement.error, &placement.note) {
                (Some(error), _) => Cell::new(error).fg(Color::Red),
                (None, Some(note)) => Cell::new(note).fg(Color::Blue),
                (None, None) => Cell::new("placed").fg(Color::Green),
            };
            table.add_row(vec![
                Cell::new(&placement.component),
                Cell::new(if placement.uuid.is_empty() {
                    "-"
                } else {
                    placement.uuid.as_str()
                }),
                Cell::new(if placement.bound_to.is_empty() {
                    "-".to_string()
                } else {
                    placement.bound_to.join(", ")
                }),
                Cell::new(placement.lanes),
                result,
            ]);
        }
        println!("{table}");
        println!();

        if report.failed == 0 {
            println!(
                "{} All {} component(s) placed.",
                self.ok_tag(),
                report.placements.len()
            );
        } else {
            println!(
                "{} {} of {} component(s) could not be placed.",
                self.error_tag(),
                report.failed,
                report.placements.len()
            );
        }
        println!();

        println!("{}", self.style_heading("Remaining capacity"));
        println!("{}", self.stats_table(&report.stats));
        self.render_bottlenecks(&report.bottlenecks, None);
        Ok(())
    }

    fn render_bottlenecks(&self, bottlenecks: &[ResourceType], threshold: Option<f64>) {
        if bottlenecks.is_empty() {
            return;
        }
        let names = join(bottlenecks.iter().map(|r| r.label()));
        match threshold {
            Some(threshold) => println!(
                "{} Bottlenecks (below {:.0}% free): {names}",
                self.warn_tag(),
                threshold * 100.0
            ),
            None => println!("{} Bottlenecks: {names}", self.warn_tag()),
        }
    }

    fn stats_table(&self, stats: &BTreeMap<ResourceType, PoolStats>) -> Table {
        let mut table = self.table();
        table.set_header(vec![
            header("Resource"),
            header("Total"),
            header("Used"),
            header("Available"),
            header("Utilization"),
            header("Allocations"),
            header("Details"),
        ]);

        for stat in stats.values() {
            let utilization = format!("{:.2}%", stat.utilization_percent);
            let utilization = if stat.total == 0 {
                Cell::new("-")
            } else if stat.available == 0 {
                Cell::new(utilization).fg(Color::Red)
            } else if stat.utilization_percent >= 80.0 {
                Cell::new(utilization).fg(Color::Yellow)
            } else {
                Cell::new(utilization)
            };

            table.add_row(vec![
                Cell::new(stat.resource.label()),
                Cell::new(stat.total),
                Cell::new(stat.used),
                Cell::new(stat.available),
                utilization,
                Cell::new(stat.allocations),
                Cell::new(describe_details(&stat.details)),
            ]);
        }
        table
    }

    fn table(&self) -> Table {
        let mut table = Table::new();
        let preset = if self.format == OutputFormat::Plain {
            ASCII_FULL
        } else {
            UTF8_FULL
        };
        table
            .load_preset(preset)
            .set_content_arrangement(ContentArrangement::Dynamic);
        if !self.supports_color() {
            table.force_no_tty();
        }
        table
    }

    fn ok_tag(&self) -> String {
        self.styled("[OK]", Style::new().green().bold())
    }

    fn warn_tag(&self) -> String {
        self.styled("[WARN]", Style::new().yellow().bold())
    }

    fn error_tag(&self) -> String {
        self.styled("[ERROR]", Style::new().red().bold())
    }

    fn style_heading(&self, text: &str) -> String {
        self.styled(text, Style::new().bold())
    }

    fn styled(&self, text: &str, style: Style) -> String {
        if self.supports_color() {
            style.apply_to(text).to_string()
        } else {
            text.to_string()
        }
    }

    /// Check if color output is supported
    fn supports_color(&self) -> bool {
        if self.format == OutputFormat::Plain {
            return false;
        }
        match self.color_choice {
            ColorChoice::Always => true,
            ColorChoice::Never => false,
            ColorChoice::Auto => self.term.features().colors_supported(),
        }
    }
}

fn header(text: &str) -> Cell {
    Cell::new(text).add_attribute(Attribute::Bold)
}

fn join<T: Display>(items: impl Iterator<Item = T>) -> String {
    items.map(|item| item.to_string()).collect::<Vec<_>>().join(", ")
}

/// One-line summary of a pool's breakdown
fn describe_details(details: &PoolDetails) -> String {
    match details {
        PoolDetails::Lanes {
            cpu_lanes,
            chipset_lanes,
            reserved_lanes,
            exempt_lanes,
            ..
        } => format!(
            "cpu {cpu_lanes} + chipset {chipset_lanes}, {reserved_lanes} reserved onboard, {exempt_lanes} exempt"
        ),
        PoolDetails::PcieSlots { by_size, .. } => describe_counts(by_size),
        PoolDetails::RamSlots {
            slot_type,
            channels,
            slots_per_channel,
            ..
        } => {
            let slot_type = if slot_type.is_empty() {
                "slots"
            } else {
                slot_type.as_str()
            };
            format!("{slot_type}, {channels} channel(s) x {slots_per_channel}")
        }
        PoolDetails::M2Slots {
            by_source,
            lane_consuming_allocations,
            ..
        } => format!(
            "{}; {lane_consuming_allocations} lane-consuming",
            describe_counts(by_source)
        ),
        PoolDetails::U2Slots { by_source, .. } => describe_counts(by_source),
        PoolDetails::SataPorts {
            by_source,
            reserved,
        } => format!("{}; {reserved} reserved", describe_counts(by_source)),
    }
}

fn describe_counts<K: Display>(counts: &BTreeMap<K, SlotCounts>) -> String {
    if counts.is_empty() {
        return "-".to_string();
    }
    join(
        counts
            .iter()
            .map(|(key, count)| format!("{key} {}/{} free", count.available, count.total)),
    )
}
