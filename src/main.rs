use anyhow::{bail, Context, Result};
use clap::{error::ErrorKind, CommandFactory, Parser};
use ghostkeys::{
    config::{load_control_sequence, ConfigStore, FileConfigStore, DEFAULT_CONTROL_FILE},
    host::{FileWords, SimulatedHost, StaticWords, WordSource},
    logging::{init_logging, LogConfig, LogFormat},
    run_session,
    schedule::{Preset, ScheduleSource},
    SessionReport,
};
use itertools::Itertools;
use rand::{rngs::StdRng, SeedableRng};
use std::{path::PathBuf, time::Duration};
use tracing::{info, warn};

/// human-paced typing driver with adaptive wpm cadence
#[derive(Parser, Debug, Clone)]
#[clap(
    version,
    about,
    long_about = "Types a word list at a human-looking pace. A WPM schedule (from a style preset or a persisted control file) sets the target, a PID-tracked cadence controller turns it into per-key delays, and a polling watcher stops the session once the test reports it is over."
)]
pub struct Cli {
    /// text to type
    #[clap(short = 't', long, conflicts_with = "words_file")]
    text: Option<String>,

    /// file of whitespace-separated words to type
    #[clap(short = 'f', long)]
    words_file: Option<PathBuf>,

    /// typing style; defaults to the preset in the config file
    #[clap(short = 'p', long, value_enum)]
    preset: Option<Preset>,

    /// json array of wpm targets that replaces the first session's schedule
    #[clap(long, default_value = DEFAULT_CONTROL_FILE)]
    control: PathBuf,

    /// config file to use instead of the platform default
    #[clap(short = 'c', long)]
    config: Option<PathBuf>,

    /// number of sessions to run back to back
    #[clap(short = 'n', long, default_value_t = 1)]
    sessions: usize,

    /// length of the simulated test clock in seconds
    #[clap(short = 's', long, default_value_t = 60)]
    test_secs: u64,

    /// seed the random source for a reproducible run
    #[clap(long)]
    seed: Option<u64>,

    /// do not echo typed text
    #[clap(short = 'q', long)]
    quiet: bool,

    /// log encoding on stderr
    #[clap(long, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,
}

impl Cli {
    fn word_source(&self) -> Box<dyn WordSource> {
        match (&self.text, &self.words_file) {
            (Some(text), _) => Box::new(StaticWords::from_text(text)),
            (None, Some(path)) => Box::new(FileWords::new(path)),
            (None, None) => {
                let mut cmd = Cli::command();
                cmd.error(
                    ErrorKind::MissingRequiredArgument,
                    "one of --text or --words-file is required",
                )
                .exit()
            }
        }
    }

    fn config_store(&self) -> FileConfigStore {
        self.config
            .as_ref()
            .map(FileConfigStore::with_path)
            .unwrap_or_default()
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&LogConfig {
        format: cli.log_format,
        ..LogConfig::default()
    })?;

    let words = cli
        .word_source()
        .word_list()
        .await
        .context("failed to load word list")?;
    if words.is_empty() {
        bail!("word list is empty");
    }
    info!(words = words.len(), "loaded word list");

    let config = cli.config_store().load();
    let preset = cli.preset.unwrap_or(config.preset);

    let control = match load_control_sequence(&cli.control) {
        Ok(Some(schedule)) => {
            info!(
                path = %cli.control.display(),
                schedule = %schedule.as_slice().iter().join(", "),
                "loaded wpm control sequence"
            );
            Some(schedule)
        }
        Ok(None) => None,
        Err(e) => {
            warn!(error = %e, "control sequence ignored; using preset");
            None
        }
    };
    let mut schedules = ScheduleSource::new(control);

    let mut rng = match cli.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };

    for n in 1..=cli.sessions.max(1) {
        let (schedule, origin) = schedules.next_schedule(preset, words.len(), &mut rng);
        info!(
            session = n,
            origin = ?origin,
            schedule = %schedule.as_slice().iter().join(", "),
            "wpm schedule"
        );

        let mut host = SimulatedHost::new(words.clone(), Duration::from_secs(cli.test_secs))
            .with_echo(!cli.quiet);
        let probe = host.clone();
        let session_rng = StdRng::from_rng(&mut rng)?;
        let report = run_session(
            &mut host,
            probe,
            &words,
            &schedule,
            &config.typing,
            session_rng,
        )
        .await;

        print_report(n, &report);
    }

    Ok(())
}

fn print_report(n: usize, report: &SessionReport) {
    let m = &report.metrics;
    println!(
        "session {n}: {:.2} wpm (target {}), accuracy {:.2}%, {} correct / {} wrong, ended: {}",
        report.final_wpm,
        report.last_target_wpm,
        report.accuracy,
        m.correct_words,
        m.wrong_words,
        report.end_reason,
    );
    if let (Some(avg), Some(sd)) = (report.delay_mean_ms, report.delay_std_dev_ms) {
        println!("  cadence: {avg:.1} ms/key (sd {sd:.1} ms), {} typo bursts", m.typo_bursts);
    }
}
