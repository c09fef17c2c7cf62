//! Output formatting: table, JSON, YAML, plain.
//!
//! Renders data in the format selected by `--output`. Table uses `tabled`,
//! structured formats use serde, plain emits `key=value` lines.

use std::io::{self, IsTerminal, Write};

use owo_colors::OwoColorize;
use tabled::{Table, Tabled, settings::Style};

use crate::cli::{ColorMode, OutputFormat};
use crate::error::CliError;

// ── Color helpers ────────────────────────────────────────────────────

/// Determine whether color output should be enabled.
pub fn should_color(mode: &ColorMode) -> bool {
    match mode {
        ColorMode::Always => true,
        ColorMode::Never => false,
        ColorMode::Auto => io::stdout().is_terminal() && std::env::var("NO_COLOR").is_err(),
    }
}

/// Semantic tint for flow and status text.
#[derive(Debug, Clone, Copy)]
pub enum Tint {
    Solar,
    Battery,
    Grid,
    Home,
    Warn,
    Muted,
}

pub fn paint(text: &str, tint: Tint, color: bool) -> String {
    if !color {
        return text.to_owned();
    }
    match tint {
        Tint::Solar => text.yellow().to_string(),
        Tint::Battery => text.green().to_string(),
        Tint::Grid => text.blue().to_string(),
        Tint::Home => text.cyan().to_string(),
        Tint::Warn => text.red().bold().to_string(),
        Tint::Muted => text.dimmed().to_string(),
    }
}

// ── Render dispatchers ───────────────────────────────────────────────

/// Render a list of serde-serializable items in the chosen format.
///
/// - `table`: `to_row` builds a `Tabled` row per item
/// - `json` / `json-compact` / `yaml`: serializes the original data
/// - `plain`: `plain_fn` emits one line per item
pub fn render_list<T, R>(
    format: &OutputFormat,
    data: &[T],
    to_row: impl Fn(&T) -> R,
    plain_fn: impl Fn(&T) -> String,
) -> Result<String, CliError>
where
    T: serde::Serialize,
    R: Tabled,
{
    Ok(match format {
        OutputFormat::Table => {
            let rows: Vec<R> = data.iter().map(to_row).collect();
            render_table(&rows)
        }
        OutputFormat::Json => serde_json::to_string_pretty(data)?,
        OutputFormat::JsonCompact => serde_json::to_string(data)?,
        OutputFormat::Yaml => serde_yaml::to_string(data)?,
        OutputFormat::Plain => data.iter().map(plain_fn).collect::<Vec<_>>().join("\n"),
    })
}

/// Render a single serde-serializable item in the chosen format.
///
/// Table rendering uses `detail_fn`, since detail views are laid out by
/// hand rather than through `Tabled`.
pub fn render_single<T>(
    format: &OutputFormat,
    data: &T,
    detail_fn: impl Fn(&T) -> String,
    plain_fn: impl Fn(&T) -> String,
) -> Result<String, CliError>
where
    T: serde::Serialize,
{
    Ok(match format {
        OutputFormat::Table => detail_fn(data),
        OutputFormat::Json => serde_json::to_string_pretty(data)?,
        OutputFormat::JsonCompact => serde_json::to_string(data)?,
        OutputFormat::Yaml => serde_yaml::to_string(data)?,
        OutputFormat::Plain => plain_fn(data),
    })
}

/// Print the rendered output to stdout, respecting quiet mode.
pub fn print_output(output: &str, quiet: bool) {
    if quiet || output.is_empty() {
        return;
    }
    let mut stdout = io::stdout().lock();
    let _ = writeln!(stdout, "{output}");
}

pub fn render_table<R: Tabled>(rows: &[R]) -> String {
    Table::new(rows).with(Style::rounded()).to_string()
}

// ── Units ────────────────────────────────────────────────────────────

/// `2048.0` → `"2.05 kW"`, `512.0` → `"512 W"`.
pub fn format_power(watts: f64) -> String {
    let magnitude = watts.abs();
    if magnitude >= 1000.0 {
        format!("{:.2} kW", magnitude / 1000.0)
    } else {
        format!("{magnitude:.0} W")
    }
}

/// `18432.0` → `"18.4 kWh"`.
pub fn format_energy(watt_hours: f64) -> String {
    if watt_hours.abs() >= 1000.0 {
        format!("{:.1} kWh", watt_hours / 1000.0)
    } else {
        format!("{watt_hours:.0} Wh")
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn power_switches_to_kilowatts() {
        assert_eq!(format_power(2048.0), "2.05 kW");
        assert_eq!(format_power(-512.0), "512 W");
        assert_eq!(format_power(0.0), "0 W");
    }

    #[test]
    fn energy_switches_to_kilowatt_hours() {
        assert_eq!(format_energy(18_432.0), "18.4 kWh");
        assert_eq!(format_energy(640.0), "640 Wh");
    }

    #[test]
    fn plain_text_is_left_alone_without_color() {
        assert_eq!(paint("solar", Tint::Solar, false), "solar");
        assert_ne!(paint("solar", Tint::Solar, true), "solar");
    }

    #[test]
    fn list_renders_as_json_array() {
        #[derive(serde::Serialize)]
        struct Item {
            id: u64,
        }
        #[derive(Tabled)]
        struct Row {
            id: u64,
        }

        let items = [Item { id: 42 }, Item { id: 43 }];
        let json = render_list(
            &OutputFormat::JsonCompact,
            &items,
            |i| Row { id: i.id },
            |i| i.id.to_string(),
        )
        .unwrap();
        assert_eq!(json, r#"[{"id":42},{"id":43}]"#);

        let plain = render_list(&OutputFormat::Plain, &items, |i| Row { id: i.id }, |i| {
            i.id.to_string()
        })
        .unwrap();
        assert_eq!(plain, "42\n43");
    }
}
