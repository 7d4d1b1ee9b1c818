use std::io::Write;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use anyhow::Result;
use clap::Parser;
use pg_audio::capture::synthetic::{SyntheticBackend, Waveform};
use pg_audio::capture::{self, CaptureBackend, NullBackend};
use pg_audio::engine::{Engine, StartResult};
use pg_core::config::EngineConfig;

pub mod cli;
pub mod meter;

use cli::BackendChoice;

fn main() -> Result<()> {
    // 1. Parser CLI
    let cli = cli::Cli::parse();

    // 2. Initialiser le logging
    env_logger::Builder::new()
        .filter_level(cli.log_level.parse().unwrap_or(log::LevelFilter::Warn))
        .init();

    // 3. Charger la config et choisir le backend
    let config = resolve_config(&cli)?;
    let backend = make_backend(&cli.backend_choice()?)?;

    // 4. Ctrl-C : demande d'arrêt propre
    let running = Arc::new(AtomicBool::new(true));
    let flag = Arc::clone(&running);
    ctrlc::set_handler(move || flag.store(false, Ordering::Relaxed))?;

    // 5. Démarrer le moteur
    let engine = Engine::with_backend(config, backend);
    match engine.start() {
        StartResult::Started => log::info!("Capture active"),
        StartResult::Unavailable => {
            log::warn!("Aucune entrée audio : affichage des niveaux neutres.");
        }
        StartResult::Error(reason) => anyhow::bail!("Démarrage audio impossible : {reason}"),
    }

    // 6. Boucle d'affichage
    let result = run_meters(&engine, &cli, &running);

    // 7. Arrêter le moteur (TOUJOURS, même en cas d'erreur)
    engine.stop();
    let stats = engine.stats();
    println!();
    log::info!(
        "Frames traitées : {}, perdues : {}, en erreur : {}",
        stats.frames_processed,
        stats.frames_dropped,
        stats.frames_failed
    );

    result
}

/// Poll the engine at `--fps` and redraw the meter line until stopped.
fn run_meters(engine: &Engine, cli: &cli::Cli, running: &AtomicBool) -> Result<()> {
    let period = Duration::from_secs_f64(1.0 / f64::from(cli.fps.clamp(1, 240)));
    let deadline = (cli.duration > 0).then(|| Instant::now() + Duration::from_secs(cli.duration));
    let mut stdout = std::io::stdout().lock();

    while running.load(Ordering::Relaxed) {
        if deadline.is_some_and(|d| Instant::now() >= d) {
            break;
        }
        let line = meter::render_line(&engine.snapshot(), cli.width);
        write!(stdout, "\r{line}")?;
        stdout.flush()?;
        std::thread::sleep(period);
    }
    Ok(())
}

fn make_backend(choice: &BackendChoice) -> Result<Arc<dyn CaptureBackend>> {
    Ok(match choice {
        BackendChoice::Mic => capture::default_backend(),
        BackendChoice::Synthetic { tone_hz } => Arc::new(SyntheticBackend::new(Waveform::Pulse {
            freq_hz: *tone_hz,
            amplitude: 0.8,
            period_frames: 22,
        })),
        #[cfg(feature = "file")]
        BackendChoice::File(path) => Arc::new(pg_audio::capture::file::FileBackend::new(path)),
        #[cfg(not(feature = "file"))]
        BackendChoice::File(_) => {
            anyhow::bail!("Lecture de fichier non compilée (feature \"file\").")
        }
        BackendChoice::Null => Arc::new(NullBackend),
    })
}

/// Load --config, or fall back to defaults when the file does not exist.
fn resolve_config(cli: &cli::Cli) -> Result<EngineConfig> {
    if cli.config.exists() {
        pg_core::config::load_config(&cli.config)
    } else {
        log::warn!(
            "Config introuvable : {}. Utilisation des défauts.",
            cli.config.display()
        );
        Ok(EngineConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shipped_config_matches_defaults() {
        let config = pg_core::config::parse_config(include_str!("../../../config/default.toml"))
            .expect("default.toml");
        assert_eq!(config, EngineConfig::default());
    }

    #[test]
    fn missing_config_falls_back_to_defaults() {
        let cli = cli::Cli::parse_from(["pulsegrid", "--config", "/nonexistent/pulsegrid.toml"]);
        assert_eq!(resolve_config(&cli).ok(), Some(EngineConfig::default()));
    }

    #[test]
    fn null_backend_is_unavailable() {
        let backend = make_backend(&BackendChoice::Null).expect("backend");
        let engine = Engine::with_backend(EngineConfig::default(), backend);
        assert_eq!(engine.start(), StartResult::Unavailable);
    }
}
