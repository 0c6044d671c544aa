//! Lagrangian search CLI - Run a coefficient search from JSON
//! configuration.

use std::fs;
use std::path::PathBuf;

use lagrangian_search::{
    compute::{JsonSnapshotSink, SearchEngine},
    schema::{RunStatus, SearchConfig, digits_solved},
};

fn main() {
    env_logger::init();

    let args: Vec<String> = std::env::args().collect();

    if args.len() < 2 {
        eprintln!("Usage: {} <config.json> [generations]", args[0]);
        eprintln!();
        eprintln!("Run an evolutionary Lagrangian coefficient search.");
        eprintln!();
        eprintln!("Arguments:");
        eprintln!("  config.json  Path to search configuration file");
        eprintln!("  generations  Generation cap override");
        eprintln!();
        eprintln!("Use --example to print a default configuration.");
        std::process::exit(1);
    }

    if args[1] == "--example" {
        print_example_config();
        return;
    }

    let config_path = PathBuf::from(&args[1]);
    let config_str = fs::read_to_string(&config_path).unwrap_or_else(|e| {
        eprintln!("Error reading config file: {}", e);
        std::process::exit(1);
    });

    let mut config: SearchConfig = serde_json::from_str(&config_str).unwrap_or_else(|e| {
        eprintln!("Error parsing config: {}", e);
        std::process::exit(1);
    });

    if let Some(cap) = args.get(2).and_then(|s| s.parse().ok()) {
        config.ga.max_generations = cap;
    }

    println!("Lagrangian Coefficient Search");
    println!("=============================");
    println!("Population: {}", config.ga.population_size);
    println!("Generations: {}", config.ga.max_generations);
    println!(
        "Strict tolerances: c < {:.1e}, G < {:.1e}",
        config.tolerances.strict_c, config.tolerances.strict_g
    );
    println!();

    let snapshot_path = config_path.with_extension("best.json");
    let mut engine = SearchEngine::new(config)
        .with_snapshot_sink(Box::new(JsonSnapshotSink::new(&snapshot_path)));

    let result = engine.run_with_callback(|update| {
        if update.generation % 25 != 0 && update.status == RunStatus::Running {
            return;
        }
        match &update.best {
            Some(best) => {
                let (c_digits, alpha_digits, g_digits) = best.digits();
                println!(
                    "  gen {:>5}: fitness {:>12.6e}  digits c/alpha/G {:>2}/{:>2}/{:>2}  \
                     {:.0} evals/s{}{}",
                    update.generation,
                    best.fitness,
                    c_digits,
                    alpha_digits,
                    g_digits,
                    update.evaluations_per_second,
                    if update.locked_mode { "  [locked]" } else { "" },
                    if update.stagnation > 0 {
                        format!("  stagnant {}", update.stagnation)
                    } else {
                        String::new()
                    },
                );
            }
            None => println!("  gen {:>5}: no viable candidate yet", update.generation),
        }
    });

    println!();
    println!("Finished: {:?}", result.status);
    println!(
        "  {} generations, {} evaluations ({:.0}/s)",
        result.generations, result.total_evaluations, result.evaluations_per_second
    );

    match &result.best {
        Some(best) => {
            println!();
            println!("Best candidate (generation {}):", best.generation);
            let genes = best.chromosome.genes();
            println!(
                "  coefficients: [{:.12e}, {:.12e}, {:.12e}, {:.12e}, {:.12e}, {:.12e}]",
                genes[0], genes[1], genes[2], genes[3], genes[4], genes[5]
            );
            println!("  fitness:  {:.6e}", best.fitness);
            println!(
                "  c:        {:.6e}  (delta {:.3e}, {} digits)",
                best.c_model,
                best.delta_c,
                digits_solved(best.delta_c)
            );
            println!(
                "  alpha:    {:.12e}  (delta {:.3e}, {} digits)",
                best.alpha_model,
                best.delta_alpha,
                digits_solved(best.delta_alpha)
            );
            println!(
                "  G:        {:.6e}  (delta {:.3e}, {} digits)",
                best.g_model,
                best.delta_g,
                digits_solved(best.delta_g)
            );
            println!("  phi0:     {:.6e}", best.phi0);
            println!("  elegance: {:.4}", best.elegance);
            println!();
            println!("Best candidate written to {}", snapshot_path.display());
        }
        None => println!("No candidate survived the constraint gate."),
    }
}

fn print_example_config() {
    let config = SearchConfig::default();
    match serde_json::to_string_pretty(&config) {
        Ok(json) => println!("{}", json),
        Err(e) => {
            eprintln!("Error serializing example config: {}", e);
            std::process::exit(1);
        }
    }
}
