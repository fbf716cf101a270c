use std::path::{Path, PathBuf};
use std::process;

// this cannot be crate::ScenarioReport from main.rs, since cargo treats
// lib.rs and main.rs as separate crates
use crate::{evaluate_scenario_file, write_report, ScenarioReport};

pub struct Config {
    pub report_path: PathBuf,
}

/// `files/scenario.toml` -> `files/scenario.json`, any other name gets
/// `.json` appended.
pub fn report_path(config_path: &Path) -> PathBuf {
    match config_path.extension() {
        Some(ext) if ext == "toml" => config_path.with_extension("json"),
        _ => {
            let mut name = config_path.as_os_str().to_owned();
            name.push(".json");
            PathBuf::from(name)
        }
    }
}

impl Config {
    pub fn run(args: &[String]) -> Result<Config, Box<dyn std::error::Error>> {
        if args.len() < 2 {
            return Err("not enough arguments".into());
        }

        if args.len() > 2 {
            return Err("too many arguments, expecting only 2, such as `rancost filepath`".into());
        }

        match args[1].as_str() {
            "--version" | "-v" => {
                print_version();
                process::exit(0);
            }
            "--help" | "-h" => {
                print_help();
                process::exit(0);
            }
            _ => {}
        }

        let cwd = std::env::current_dir()?;
        // rancost arg[1], such as rancost files/scenario.toml
        let file_path = &args[1];
        println!("Scenario Path: {}", file_path);
        let full_path = cwd.join(file_path);
        println!("Full Path: {}", full_path.display());

        let report = evaluate_scenario_file(&full_path)?;
        print_report(&report);

        let report_path = report_path(&full_path);
        write_report(&report, &report_path)?;
        println!("Report written to: {}", report_path.display());

        Ok(Config { report_path })
    }
}

pub fn print_version() {
    println!("rancost {}", env!("CARGO_PKG_VERSION"));
}

pub fn print_error(error: &str) {
    const RED: &str = "\x1b[31m";
    const RESET: &str = "\x1b[0m";
    println!("{}Problem running scenario: {error}{}", RED, RESET);
}

pub fn print_help() {
    // ANSI color codes
    const BOLD: &str = "\x1b[1m";
    const CYAN: &str = "\x1b[36m";
    const GREEN: &str = "\x1b[32m";
    const YELLOW: &str = "\x1b[33m";
    const RESET: &str = "\x1b[0m";

    println!("📡 RAN cost and link budget simulator{}", RESET);
    println!();
    println!("{}{}VERSION:{}", BOLD, YELLOW, RESET);
    println!("    {}{}{}", GREEN, env!("CARGO_PKG_VERSION"), RESET);
    println!();
    println!("{}{}USAGE:{}", BOLD, YELLOW, RESET);
    println!("    {} rancost <FILE_PATH>{}", GREEN, RESET);
    println!();
    println!("     FILE_PATH: path to a scenario toml file");
    println!();
    println!("     The scenario is evaluated (link budget, traffic, CPU, cost) and a");
    println!("     json report is written next to the source file.");
    println!();
    println!("{}{}OPTIONS:{}", BOLD, YELLOW, RESET);
    println!(
        "    {}  -v, --version{}{}    Print version information",
        GREEN, RESET, RESET
    );
    println!(
        "    {}  -h, --help{}{}       Print help information",
        GREEN, RESET, RESET
    );
    println!();
    println!("{}{}ENVIRONMENT:{}", BOLD, YELLOW, RESET);
    println!("    {}  RUST_LOG{}         Log filter, such as `rancost=debug`", GREEN, RESET);
    println!();
    println!("{}{}EXAMPLES:{}", BOLD, YELLOW, RESET);
    println!("    {} # Single file (Relative path){}", CYAN, RESET);
    println!("    {} rancost files/scenario.toml{}", GREEN, RESET);
    println!();
}

pub fn print_report(report: &ScenarioReport) {
    println!();
    println!("Link Budget:");
    println!("------------");
    println!(
        "{:<8} {:>10} {:>8} {:>10} {:>8} {:>8} {:>12}",
        "UE", "Dist (m)", "PL (dB)", "Rx (dBm)", "SINR", "SE", "Cap (Mbps)"
    );
    for r in &report.link_budget {
        // `{:>8.2}` aligns positive and negative numbers on the decimal
        println!(
            "{:<8} {:>10.1} {:>8.2} {:>10.2} {:>8.2} {:>8.4} {:>12.2}",
            r.id,
            r.distance,
            r.path_loss,
            r.received_power,
            r.sinr,
            r.spectral_efficiency,
            r.capacity_mbps
        );
    }
    println!("Receiver density:\t{:>10.2} UE/km²", report.receiver_density);
    println!("Mean capacity:\t\t{:>10.4} Gbps", report.mean_capacity_gbps);

    let t = &report.traffic;
    println!();
    println!("Traffic ({}):", t.duplex_mode);
    println!("------------");
    println!("Resource blocks:\t{:>10.0}", t.resource_blocks);
    println!("Cell DL:\t\t{:>10.4} Gbps", t.max_cell_throughput.dl);
    println!("Cell UL:\t\t{:>10.4} Gbps", t.max_cell_throughput.ul);
    println!("eCPRI:\t\t\t{:>10.4} Gbps", t.ecpri);
    println!("F1-C:\t\t\t{:>10.4} Gbps", t.f1c);
    println!("F1-U:\t\t\t{:>10.4} Gbps", t.f1u);
    println!("CU-UP northbound:\t{:>10.4} Gbps", t.cuup_northbound);
    println!("Core:\t\t\t{:>10.4} Gbps", t.core);

    println!();
    println!("CPU Utilization:");
    println!("----------------");
    println!("DU:\t{:>8.2} %", report.cpu.du_utils);
    println!("CU-CP:\t{:>8.2} %", report.cpu.cucp_utils);
    println!("CU-UP:\t{:>8.2} %", report.cpu.cuup_utils);

    println!();
    println!("Cost (USD/km²):");
    println!("---------------");
    for (item, cost) in &report.cost.cost_breakdown {
        println!("{:<32}{:>14.2}", item, cost);
    }
    println!("{:<32}{:>14.2}", "Total", report.total_cost);

    if let Some(operators) = &report.dimensioning {
        println!();
        println!("Dimensioning:");
        println!("-------------");
        for op in operators {
            match &op.result {
                Some(d) => println!(
                    "MNC {:<4} range {:>8.1} m, coverage sites {:>8.1}, capacity sites {:>8.1}, load {:>3} %",
                    op.mnc, d.cell_range_m, d.sites_for_coverage, d.sites_for_capacity, d.cell_load
                ),
                None => println!("MNC {:<4} no feasible cell load", op.mnc),
            }
        }
    }
    println!();
}
