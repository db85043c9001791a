// Entry point and console menu for the fleet KPI dashboard.
//
// - Option [1] loads the CSV (memoized by path and modification time).
// - Option [2] sets the date/model/vehicle filters.
// - Option [3] recomputes every KPI for the current filters, previews the
//   tables and writes them out.
// - Option [4] exports the filtered rows in the source schema.
// - Option [5] drops the cached dataset and reads the file again.
mod config;
mod error;
mod filter;
mod loader;
mod output;
mod reports;
mod types;
mod util;

#[cfg(test)]
mod fixtures;

use chrono::NaiveDate;
use config::Config;
use filter::{DateRange, FilterOptions, Filters, Selection};
use loader::{DatasetCache, LoadReport};
use log::{error, info};
use once_cell::sync::Lazy;
use serde::Serialize;
use std::io::{self, BufRead, Write};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tabled::Tabled;
use types::{Dashboard, Dataset};

// The dataset is loaded once and shared read-only; filters change per
// interaction.
static APP_STATE: Lazy<Mutex<AppState>> = Lazy::new(|| Mutex::new(AppState::default()));

#[derive(Default)]
struct AppState {
    cache: DatasetCache,
    data: Option<Arc<Dataset>>,
    filters: Filters,
}

fn app_state() -> MutexGuard<'static, AppState> {
    APP_STATE.lock().unwrap_or_else(PoisonError::into_inner)
}

/// One trimmed line, or `None` once the input is exhausted (or unreadable).
fn read_line_from<R: BufRead>(input: &mut R) -> Option<String> {
    let mut buf = String::new();
    match input.read_line(&mut buf) {
        Ok(0) | Err(_) => None,
        Ok(_) => Some(buf.trim().to_string()),
    }
}

fn prompt(label: &str) -> Option<String> {
    print!("{}", label);
    let _ = io::stdout().flush();
    read_line_from(&mut io::stdin().lock())
}

fn read_choice() -> Option<String> {
    prompt("Enter choice: ")
}

/// Ask whether to go back to the main menu after generating reports.
/// End of input counts as "no".
fn prompt_back_to_menu() -> bool {
    loop {
        let Some(answer) = prompt("Back to Report Selection (Y/N): ") else {
            println!();
            return false;
        };
        match answer.to_uppercase().as_str() {
            "Y" => return true,
            "N" => return false,
            _ => println!("Invalid choice. Please enter Y or N."),
        }
    }
}

fn current_data() -> Option<(Arc<Dataset>, Filters)> {
    let state = app_state();
    let current = state
        .data
        .as_ref()
        .map(|d| (Arc::clone(d), state.filters.clone()));
    current
}

fn print_load_report(report: &LoadReport, from_cache: bool) {
    let span = report
        .date_span
        .map(|(a, b)| format!("{} to {}", a, b))
        .unwrap_or_else(|| util::NO_DATA.to_string());
    println!(
        "Dataset ready{}: {} rows, {} vehicles, {} models ({})",
        if from_cache { " (cached)" } else { "" },
        util::format_int(report.total_rows),
        util::format_int(report.vehicles),
        util::format_int(report.models),
        span
    );
    if report.inconsistent_vehicles > 0 {
        println!(
            "Note: {} vehicles appear under more than one model.",
            util::format_int(report.inconsistent_vehicles)
        );
    }
    println!();
}

/// Handle options [1] and [5]. A failed load leaves nothing loaded.
fn handle_load(config: &Config, force: bool) {
    let mut state = app_state();
    if force && state.cache.invalidate(&config.data_path) {
        info!("invalidated cached {}", config.data_path.display());
    }
    match state.cache.load(&config.data_path) {
        Ok(loaded) => {
            print_load_report(&loaded.report, loaded.from_cache);
            // Keep the user's filters only when the very same dataset is back.
            let unchanged = state
                .data
                .as_ref()
                .is_some_and(|d| Arc::ptr_eq(d, &loaded.dataset));
            if !unchanged {
                state.filters = Filters::for_dataset(&loaded.dataset);
            }
            state.data = Some(loaded.dataset);
        }
        Err(e) => {
            error!("load of {} failed: {}", config.data_path.display(), e);
            eprintln!("Failed to load file: {}\n", e);
            state.data = None;
        }
    }
}

// The filter prompts return `None` only when stdin runs out.

fn prompt_date(label: &str, current: Option<NaiveDate>) -> Option<Option<NaiveDate>> {
    let shown = current
        .map(|d| d.to_string())
        .unwrap_or_else(|| "open".to_string());
    loop {
        let input = prompt(&format!("{} (YYYY-MM-DD, '.' keeps {}, blank = open): ", label, shown))?;
        if input == "." {
            return Some(current);
        }
        if input.is_empty() {
            return Some(None);
        }
        match util::parse_date_safe(Some(input.as_str())) {
            Some(d) => return Some(Some(d)),
            None => println!("Invalid date. Use YYYY-MM-DD."),
        }
    }
}

fn prompt_selection(label: &str, choices: &[String]) -> Option<Selection> {
    println!("{}:", label);
    for (i, c) in choices.iter().enumerate() {
        println!("  [{}] {}", i + 1, c);
    }
    loop {
        let input = prompt("Choose by number or name (blank = All): ")?;
        match FilterOptions::resolve(&input, choices) {
            Some(sel) => return Some(sel),
            None => println!("Unknown choice {:?}.", input),
        }
    }
}

fn prompt_filters(options: &FilterOptions, current: &Filters) -> Option<Filters> {
    let date_range = DateRange {
        start: prompt_date("Start date", current.date_range.start)?,
        end: prompt_date("End date", current.date_range.end)?,
    };
    if date_range.bounds().is_none() && (date_range.start.is_some() || date_range.end.is_some()) {
        println!("Only one end of the period is set; no date filter will be applied.");
    }
    Some(Filters {
        date_range,
        model: prompt_selection("Model", &options.models)?,
        vehicle: prompt_selection("Vehicle", &options.vehicles)?,
    })
}

/// Handle option [2]: interactively replace the active filters.
fn handle_set_filters() {
    let Some((data, current)) = current_data() else {
        println!("Error: No data loaded. Please load the CSV file first (option 1).\n");
        return;
    };
    let options = FilterOptions::from_dataset(&data);
    if let Some((min, max)) = options.date_bounds {
        println!("Available period: {} to {}", min, max);
    }
    let Some(filters) = prompt_filters(&options, &current) else {
        println!("\nInput closed; filters left unchanged.");
        return;
    };
    let rows = filters.apply(&data).len();
    println!(
        "Filters set: model={}, vehicle={} ({} rows match)\n",
        filters.model.label(),
        filters.vehicle.label(),
        util::format_int(rows)
    );
    app_state().filters = filters;
}

fn emit<T>(config: &Config, title: &str, file: &str, rows: &[T])
where
    T: Serialize + Tabled + Clone,
{
    let path = config.output_file(file);
    if let Err(e) = output::write_csv(&path, rows) {
        error!("writing {} failed: {}", path.display(), e);
        eprintln!("Write error: {}", e);
    }
    println!("{}\n", title);
    output::preview_table_rows(rows, config.preview_rows);
    println!("(Full table exported to {})\n", path.display());
}

fn print_headline(config: &Config, dashboard: &Dashboard) {
    let h = &dashboard.headline;
    println!("KM Total: {}", util::format_number(h.total_km, 0));
    println!(
        "Avg Consumption: {}",
        util::format_optional(h.avg_consumption, 2, " KM/L")
    );
    println!(
        "Total Cost: {}",
        util::format_currency(&config.currency_symbol, h.total_cost)
    );
    println!(
        "Cost per KM: {}",
        util::format_currency(&config.currency_symbol, h.cost_per_km)
    );
    println!("Total Accidents: {}\n", util::format_int(h.total_accidents));
}

/// Handle option [3]: recompute everything for the active filters.
fn handle_generate_reports(config: &Config) {
    let Some((data, filters)) = current_data() else {
        println!("Error: No data loaded. Please load the CSV file first (option 1).\n");
        return;
    };

    let view = filters.apply(&data);
    let dashboard = reports::build_dashboard(&view, &filters);
    println!(
        "Generating reports for {} rows (model={}, vehicle={})...\n",
        util::format_int(dashboard.rows_in_view),
        filters.model.label(),
        filters.vehicle.label()
    );
    print_headline(config, &dashboard);

    println!("== Costs ==\n");
    emit(config, "Costs by Category", "report_cost_by_category.csv", &dashboard.costs.by_category);
    emit(config, "Costs over Time", "report_cost_over_time.csv", &dashboard.costs.over_time);
    emit(config, "Top 10 Vehicles by Cost", "report_cost_ranking.csv", &dashboard.costs.top_vehicles);

    println!("== Operations ==\n");
    emit(
        config,
        "Average Consumption by Model",
        "report_consumption_by_model.csv",
        &dashboard.operations.consumption_by_model,
    );
    emit(
        config,
        "Top 10 Most Used Vehicles",
        "report_km_by_vehicle.csv",
        &dashboard.operations.top_vehicles_by_km,
    );
    emit(config, "Daily Operation", "report_daily_operations.csv", &dashboard.operations.daily);

    println!("== Maintenance ==\n");
    emit(
        config,
        "Maintenance Cost by Model",
        "report_maintenance_by_model.csv",
        &dashboard.maintenance.cost_by_model,
    );
    emit(
        config,
        "Top 10 Vehicles by Downtime",
        "report_downtime_by_vehicle.csv",
        &dashboard.maintenance.top_vehicles_by_downtime,
    );
    emit(
        config,
        "Fleet Availability (10 lowest, %)",
        "report_availability.csv",
        &dashboard.maintenance.lowest_availability,
    );

    println!("== Safety ==\n");
    emit(
        config,
        "Accidents by Model",
        "report_accidents_by_model.csv",
        &dashboard.safety.accidents_by_model,
    );
    emit(config, "Fines by Model", "report_fines_by_model.csv", &dashboard.safety.fines_by_model);
    emit(
        config,
        "Accidents per Million KM",
        "report_accident_rate.csv",
        &dashboard.safety.accident_rate_by_model,
    );

    println!("== Raw Data ==\n");
    let raw: Vec<_> = view.iter().take(config.preview_rows).cloned().collect();
    output::preview_table_rows(&raw, config.preview_rows);

    let summary_path = config.output_file("dashboard.json");
    if let Err(e) = output::write_json(&summary_path, &dashboard) {
        error!("writing {} failed: {}", summary_path.display(), e);
        eprintln!("Write error: {}", e);
    }
    println!("Dashboard summary saved to {}\n", summary_path.display());
}

/// Handle option [4]: export the filtered rows in the source schema.
fn handle_export(config: &Config) {
    let Some((data, filters)) = current_data() else {
        println!("Error: No data loaded. Please load the CSV file first (option 1).\n");
        return;
    };
    let path = config.export_path();
    match output::export_view(&path, &filters.apply(&data)) {
        Ok(n) => println!(
            "Exported {} filtered rows to {}\n",
            util::format_int(n),
            path.display()
        ),
        Err(e) => {
            error!("export to {} failed: {}", path.display(), e);
            eprintln!("Export failed: {}\n", e);
        }
    }
}

fn main() {
    dotenvy::dotenv().ok();
    env_logger::init();

    let config = match Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("{}", e);
            std::process::exit(2);
        }
    };
    info!(
        "data file {}, output dir {}",
        config.data_path.display(),
        config.output_dir.display()
    );

    loop {
        println!("Fleet KPI Dashboard");
        println!("[1] Load the file");
        println!("[2] Set filters");
        println!("[3] Generate reports");
        println!("[4] Export filtered data");
        println!("[5] Reload the file");
        println!("[0] Exit\n");
        let Some(choice) = read_choice() else {
            println!("\nExiting the program.");
            break;
        };
        match choice.as_str() {
            "1" => handle_load(&config, false),
            "2" => handle_set_filters(),
            "3" => {
                println!();
                handle_generate_reports(&config);
                if !prompt_back_to_menu() {
                    println!("Exiting the program.");
                    break;
                }
            }
            "4" => handle_export(&config),
            "5" => handle_load(&config, true),
            "0" => {
                println!("Exiting the program.");
                break;
            }
            _ => println!("Invalid choice. Please enter a number from 0 to 5.\n"),
        }
    }
}
