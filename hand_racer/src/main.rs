//! hand_racer — interactive entry point.

use std::io::{self, Write};
use std::path::PathBuf;

use drive_core::cars;
use hand_racer::app::{run, AppConfig};

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    println!();
    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("║          Hand Racer — steer with your bare hands             ║");
    println!("╚══════════════════════════════════════════════════════════════╝");
    println!();

    #[cfg(feature = "leap")]
    println!("  Mode: LeapMotion hardware");
    #[cfg(not(feature = "leap"))]
    println!("  Mode: Keyboard hand rig  (use --features leap for hardware)");
    println!();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let mut cfg = match flag_value(&args, "--config") {
        Some(path) => match AppConfig::load(&PathBuf::from(path)) {
            Ok(c) => c,
            Err(e) => {
                eprintln!("Error: {}", e);
                std::process::exit(1);
            }
        },
        None => AppConfig::default(),
    };
    if let Some(seed) = flag_value(&args, "--seed").and_then(|s| s.parse().ok()) {
        cfg.seed = Some(seed);
    }
    if args.iter().any(|a| a == "--mute") {
        cfg.mute = true;
    }

    if args.iter().any(|a| a == "--quick") {
        println!("  Quick-start: saved profile and car\n");
    } else {
        configure_interactively(&mut cfg);
    }

    println!();
    println!("  Opening the track window…");
    println!();

    if let Err(e) = run(cfg) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn flag_value<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.iter().position(|a| a == flag).and_then(|i| args.get(i + 1)).map(String::as_str)
}

fn configure_interactively(cfg: &mut AppConfig) {
    let name = read_line("  Driver name (blank keeps the saved one): ");
    if !name.trim().is_empty() {
        cfg.player_name = name.trim().chars().take(12).collect();
    }

    println!("  Car (must already be in your garage):");
    let catalog = cars::catalog();
    for (i, car) in catalog.iter().enumerate() {
        println!("    {}. {:<10} {:>5} coins", i + 1, car.name, car.price);
    }
    let pick = read_line("  Choice (blank keeps the saved one): ");
    if let Some(car) = pick.trim().parse::<usize>().ok().and_then(|n| catalog.get(n.wrapping_sub(1))) {
        cfg.car = Some(car.id.clone());
    }

    if !cfg.mute {
        println!("  Engine sound (GM program 0–127):");
        println!("    30=Distortion Guitar  38=Synth Bass  62=Brass  81=Lead Saw");
        cfg.instrument = read_line("  Program (default 30): ")
            .trim().parse::<u8>().unwrap_or(cfg.instrument).min(127);
    }
}

fn read_line(prompt: &str) -> String {
    print!("{}", prompt);
    io::stdout().flush().ok();
    let mut buf = String::new();
    io::stdin().read_line(&mut buf).ok();
    buf
}
