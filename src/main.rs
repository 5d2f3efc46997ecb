// Entry point and high-level CLI flow.
//
// - With `--view`, the binary runs the pipeline once and exports that view.
// - Otherwise it shows a menu: option [1] loads and merges every source
//   listed in the config, option [2] exports a view of the merged table.
//   After an export the user can go back to the menu or exit.
use arthropod_monthly::output::{self, generate_summary};
use arthropod_monthly::pipeline::{self, PipelineOutput};
use arthropod_monthly::util::format_int;
use arthropod_monthly::view::{build_view, ViewChoice};
use arthropod_monthly::PipelineConfig;
use clap::Parser;
use log::{error, info};
use std::error::Error;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "arthropod_monthly")]
#[command(about = "Merge arthropod sightings with air quality and weather on a monthly grid", long_about = None)]
struct Cli {
    /// Pipeline configuration file
    #[arg(short, long, default_value = "pipeline.toml")]
    config: PathBuf,

    /// Run once and export this view (time_series, seasonal, annual) without the menu
    #[arg(long)]
    view: Option<String>,

    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

// Loaded data lives here between menu picks so the files are only read once.
struct AppState {
    config: PipelineConfig,
    data: Option<PipelineOutput>,
}

/// Next trimmed line from `input`, or `None` once the input is closed.
fn read_trimmed_line<R: BufRead>(input: &mut R) -> Option<String> {
    let mut buf = String::new();
    match input.read_line(&mut buf) {
        Ok(0) | Err(_) => None,
        Ok(_) => Some(buf.trim().to_string()),
    }
}

fn prompt(text: &str) -> Option<String> {
    print!("{}", text);
    let _ = io::stdout().flush();
    read_trimmed_line(&mut io::stdin().lock())
}

/// Read a single line of input after printing the common "Enter choice:" prompt.
fn read_choice() -> Option<String> {
    prompt("Enter choice: ")
}

/// Returns `true` if the user chose `Y`, `false` if they chose `N` or
/// closed stdin.
fn prompt_back_to_menu() -> bool {
    loop {
        let Some(answer) = prompt("Back to View Selection (Y/N): ") else {
            return false;
        };
        match answer.to_uppercase().as_str() {
            "Y" => return true,
            "N" => return false,
            _ => println!("Invalid choice. Please enter Y or N."),
        }
    }
}

/// Handle option [1]: run the pipeline and keep the merged table.
fn handle_load(state: &mut AppState) {
    match pipeline::run(&state.config) {
        Ok(out) => {
            let total: usize = out.reports.iter().map(|r| r.total_rows).sum();
            let kept: usize = out.reports.iter().map(|r| r.kept_rows).sum();
            let unparsable: usize = out.reports.iter().map(|r| r.parse_errors).sum();
            println!(
                "Processing sources... ({} rows read, {} kept for {} to {})",
                format_int(total),
                format_int(kept),
                out.window.start.date(),
                out.window.end.date()
            );
            println!(
                "Note: {} rows skipped due to unparsable dates or readings.",
                format_int(unparsable)
            );
            for source in out.empty_sources() {
                println!("Warning: {} produced no usable rows.", source);
            }
            println!(
                "Merged {} column(s) onto {} months.\n",
                out.merged.columns.len(),
                format_int(out.grid.len())
            );
            state.data = Some(out);
        }
        Err(e) => {
            eprintln!("Failed to build the monthly table: {}\n", e);
        }
    }
}

/// Build a view, write `<view>.csv` and `summary.json`, print a preview.
fn export_view(
    config: &PipelineConfig,
    data: &PipelineOutput,
    choice: ViewChoice,
) -> arthropod_monthly::Result<()> {
    let dir = &config.output.directory;
    std::fs::create_dir_all(dir).map_err(|source| arthropod_monthly::PipelineError::Io {
        path: dir.clone(),
        source,
    })?;

    let view = build_view(choice, &data.merged)?;
    let file = dir.join(format!("{}.csv", choice.file_stem()));
    output::write_csv(&file, &view)?;
    println!("{}", choice.title());
    println!(
        "({} to {})\n",
        data.window.start.date(),
        data.window.end.date()
    );
    output::preview_table_rows(&view, config.output.preview_rows);
    println!("(Full table exported to {})\n", file.display());

    let summary = generate_summary(data);
    println!("Summary Stats:");
    for column in &summary.columns {
        println!("  {}", column.describe());
    }
    println!();
    let summary_file = dir.join("summary.json");
    output::write_json(&summary_file, &summary)?;
    info!("summary written to {}", summary_file.display());
    Ok(())
}

enum ExportOutcome {
    Exported,
    Skipped,
    InputClosed,
}

/// Handle option [2]: ask for a view and export it.
fn handle_export(state: &AppState) -> ExportOutcome {
    let Some(data) = state.data.as_ref() else {
        println!("Error: No data loaded. Please load the sources first (option 1).\n");
        return ExportOutcome::Skipped;
    };
    println!("Select a view:");
    for (i, choice) in ViewChoice::ALL.iter().enumerate() {
        println!("[{}] {}", i + 1, choice.title());
    }
    let Some(answer) = read_choice() else {
        return ExportOutcome::InputClosed;
    };
    let Some(choice) = ViewChoice::parse(&answer) else {
        println!("Unrecognized view. Valid options: time_series, seasonal, annual.\n");
        return ExportOutcome::Skipped;
    };
    println!();
    if let Err(e) = export_view(&state.config, data, choice) {
        eprintln!("Export error: {}", e);
    }
    ExportOutcome::Exported
}

fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();

    let log_level = match cli.verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level)).init();

    let config = PipelineConfig::from_file(&cli.config)?;

    if let Some(mode) = cli.view {
        let choice = ViewChoice::parse(&mode)
            .ok_or_else(|| format!("unrecognized view '{mode}' (time_series, seasonal, annual)"))?;
        let data = pipeline::run(&config).inspect_err(|e| error!("pipeline failed: {e}"))?;
        export_view(&config, &data, choice)?;
        return Ok(());
    }

    let mut state = AppState { config, data: None };
    loop {
        println!("Select an option:");
        println!("[1] Load and merge sources");
        println!("[2] Export a view\n");
        let Some(choice) = read_choice() else {
            break;
        };
        match choice.as_str() {
            "1" => handle_load(&mut state),
            "2" => {
                println!();
                let exit = match handle_export(&state) {
                    ExportOutcome::Exported => !prompt_back_to_menu(),
                    ExportOutcome::Skipped => false,
                    ExportOutcome::InputClosed => true,
                };
                if exit {
                    break;
                }
            }
            _ => println!("Invalid choice. Please enter 1 or 2.\n"),
        }
    }
    println!("Exiting the program.");
    Ok(())
}
