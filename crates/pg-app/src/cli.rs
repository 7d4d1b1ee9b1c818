use std::path::PathBuf;

use clap::Parser;

/// pulsegrid : audio feature meters (bass / mid / high / volume / beat).
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Source audio : "mic", "synthetic", "file" ou "null".
    #[arg(long, default_value = "mic")]
    pub backend: String,

    /// Fichier audio rejoué avec --backend file (WAV, MP3, FLAC, OGG).
    #[arg(long)]
    pub file: Option<PathBuf>,

    /// Fréquence de la sinusoïde pour --backend synthetic.
    #[arg(long, default_value_t = 150.0)]
    pub tone_hz: f32,

    /// Fichier de configuration TOML. Défaut : config/default.toml.
    #[arg(short, long, default_value = "config/default.toml")]
    pub config: PathBuf,

    /// Cadence d'affichage des mesures (lectures de snapshot par seconde).
    #[arg(long, default_value_t = 60)]
    pub fps: u32,

    /// Durée en secondes avant arrêt automatique (0 = jusqu'à Ctrl-C).
    #[arg(long, default_value_t = 0)]
    pub duration: u64,

    /// Largeur d'une barre en caractères.
    #[arg(long, default_value_t = 20)]
    pub width: usize,

    /// Niveau de log : error, warn, info, debug, trace.
    #[arg(long, default_value = "warn")]
    pub log_level: String,
}

/// Backend sélectionné sur la ligne de commande.
#[derive(Clone, Debug, PartialEq)]
pub enum BackendChoice {
    Mic,
    Synthetic { tone_hz: f32 },
    File(PathBuf),
    Null,
}

impl Cli {
    /// Resolve `--backend` and its companion flags.
    ///
    /// # Errors
    /// Returns an error for an unknown backend name, or `file` without `--file`.
    pub fn backend_choice(&self) -> anyhow::Result<BackendChoice> {
        match self.backend.as_str() {
            "mic" => Ok(BackendChoice::Mic),
            "synthetic" => Ok(BackendChoice::Synthetic {
                tone_hz: self.tone_hz,
            }),
            "file" => match self.file {
                Some(ref path) => Ok(BackendChoice::File(path.clone())),
                None => anyhow::bail!("--backend file requiert --file <chemin>."),
            },
            "null" => Ok(BackendChoice::Null),
            other => anyhow::bail!(
                "Backend inconnu : {other}. Choix possibles : mic, synthetic, file, null."
            ),
        }
    }
}
