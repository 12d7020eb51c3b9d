use std::path::{Path, PathBuf};
use std::sync::Arc;

use audio_racer_core::assets::ERROR_CLIP_KEY;
use audio_racer_core::net::{ChannelTransport, NetSession};
use audio_racer_core::race::{Multiplayer, SingleRace, TimeTrial};
use audio_racer_core::timeline::ManualStopwatch;
use audio_racer_core::world::{
    CruiseVehicle, Key, RoadKind, RoadSegment, ScriptedInput, SegmentTrack, Severity, Surface,
    Track,
};
use audio_racer_core::{
    AppConfig, AssetStore, ClipManifest, DriverStatus, HighscoreStore, RaceError, RaceMode,
    RaceModeDriver, RaceSetup, VirtualMixer,
};
use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

fn main() -> audio_racer_core::Result<()> {
    init_tracing();

    let cli = Cli::parse();

    match cli.command {
        Commands::Race(args) => run_race(args),
        Commands::Highscores { file, config } => list_highscores(file, config.as_deref()),
        Commands::Manifest { output } => write_demo_manifest(&output),
    }
}

fn run_race(args: RaceArgs) -> audio_racer_core::Result<()> {
    let config = load_config(args.config.as_deref())?;
    let mut settings = config.race;
    if args.seed.is_some() {
        settings.seed = args.seed;
    }

    let manifest_path = args.manifest.unwrap_or(config.assets.manifest_path);
    let assets = AssetStore::new(
        load_manifest(&manifest_path)?,
        settings.language.clone(),
        settings.default_language.clone(),
    )?;
    let track = match &args.track {
        Some(path) => {
            let parsed: SegmentTrack = serde_json::from_str(&std::fs::read_to_string(path)?)?;
            SegmentTrack::new(parsed.name(), parsed.segments().to_vec())?
        }
        None => demo_track()?,
    };

    let mut peer = None;
    let mode = match args.mode {
        ModeArg::TimeTrial => RaceMode::TimeTrial(TimeTrial::new(settings.highscore_path.clone())),
        ModeArg::SingleRace => RaceMode::SingleRace(SingleRace::new(args.opponents)),
        ModeArg::Multiplayer => {
            let (local, remote) = ChannelTransport::pair();
            peer = Some(remote);
            RaceMode::Multiplayer(Multiplayer::new(NetSession::new(Box::new(local), 0)))
        }
    };

    let mut input = ScriptedInput::default();
    for at in &args.info_at {
        input = input.press(Key::Info, *at, 0.1);
    }
    for at in &args.status_at {
        input = input.press(Key::Status, *at, 0.1);
    }
    for at in &args.pause_at {
        input = input.press(Key::Pause, *at, 0.1);
    }

    tracing::info!(mode = ?args.mode, laps = args.laps, manifest = %manifest_path.display(), "starting simulated race");

    let mixer = Arc::new(VirtualMixer::new());
    let watch = ManualStopwatch::new();
    let mut driver = RaceModeDriver::new(RaceSetup {
        settings,
        mode,
        total_laps: args.laps,
        vehicle: Box::new(CruiseVehicle::new(args.speed, 60.0)),
        track: Box::new(track),
        input: Box::new(input),
        output: mixer.clone(),
        assets,
        stopwatch: Box::new(watch.clone()),
    })?;

    let mut host_time = 0.0_f32;
    let summary = loop {
        if host_time > args.max_seconds {
            return Err(RaceError::msg(format!(
                "race did not finish within {} simulated seconds",
                args.max_seconds
            )));
        }
        watch.advance_secs(args.step);
        mixer.advance(args.step);
        if let DriverStatus::Exit(summary) = driver.run(args.step)? {
            break summary;
        }
        host_time += args.step;
    };

    for played in mixer.played() {
        println!(
            "{:>8.2}s  {:<10} {}",
            played.started_at,
            format!("{:?}", played.channel),
            played.key
        );
    }
    println!("{}", serde_json::to_string_pretty(&summary)?);

    if let Some(mut peer) = peer {
        let mut packets = 0;
        while peer.recv_packet().is_some() {
            packets += 1;
        }
        tracing::info!(packets, "state packets sent to the session");
    }
    Ok(())
}

fn list_highscores(file: Option<PathBuf>, config: Option<&Path>) -> audio_racer_core::Result<()> {
    let path = match file {
        Some(path) => path,
        None => load_config(config)?.race.highscore_path,
    };
    let store = HighscoreStore::open(&path);

    let mut empty = true;
    for (key, ms) in store.records() {
        let (track, laps) = key.rsplit_once(';').unwrap_or((key, "?"));
        println!("{track:<20} {laps:>3} laps  {}:{:06.3}", ms / 60_000, (ms % 60_000) as f64 / 1000.0);
        empty = false;
    }
    if empty {
        tracing::info!(path = %path.display(), "no highscores recorded yet");
    }
    Ok(())
}

fn write_demo_manifest(output: &Path) -> audio_racer_core::Result<()> {
    let manifest = demo_manifest();
    std::fs::write(output, serde_json::to_string_pretty(&manifest)?)?;
    tracing::info!(path = %output.display(), "wrote demo clip manifest");
    Ok(())
}

fn load_config(path: Option<&Path>) -> audio_racer_core::Result<AppConfig> {
    match path {
        Some(path) => AppConfig::load(path),
        None => Ok(AppConfig::default()),
    }
}

fn load_manifest(path: &Path) -> audio_racer_core::Result<ClipManifest> {
    if path.exists() {
        return ClipManifest::load(path);
    }
    tracing::warn!(path = %path.display(), "clip manifest not found, using the built-in demo catalogue");
    Ok(demo_manifest())
}

/// English catalogue covering every key the race engine speaks, with
/// plausible recording lengths.
fn demo_manifest() -> ClipManifest {
    let mut manifest = ClipManifest::default();
    let mut add = |key: &str, length: f32| manifest.insert("en", key, length);

    add(ERROR_CLIP_KEY, 0.4);
    for n in 0..=99_u32 {
        add(&format!("race/numbers/{n}"), if n < 20 { 0.45 } else { 0.7 });
    }
    add("race/time/minute", 0.45);
    add("race/time/minutes", 0.55);
    add("race/time/second", 0.5);
    add("race/time/seconds", 0.6);
    add("race/time/point", 0.35);

    add("race/countdown", 3.2);
    add("race/go", 0.6);
    add("race/finish", 1.1);
    add("race/your_time", 0.8);
    add("race/highscore/new", 1.4);
    add("race/highscore/current", 1.2);
    add("race/laps/final", 1.0);
    for remaining in 2..=20 {
        add(&format!("race/laps/{remaining}"), 1.1);
    }
    add("race/info/position", 0.7);
    add("race/info/lap", 0.4);
    add("race/info/time", 0.6);
    add("race/info/finished", 0.6);
    add("race/info/joined", 0.7);
    for slot in 0..=8 {
        add(&format!("race/player/{slot}"), 0.6);
        add(&format!("race/position/{}", slot + 1), 0.9);
    }

    for side in ["left", "right"] {
        for severity in ["easy", "normal", "hard", "hairpin"] {
            for variant in 1..=2 {
                add(&format!("copilot/{side}_{severity}{variant}"), 0.6);
            }
        }
    }
    for surface in Surface::ALL {
        add(&format!("copilot/surface_{}1", surface.name()), 0.8);
    }

    manifest
}

fn demo_track() -> audio_racer_core::Result<SegmentTrack> {
    let segment = |kind, surface, length| RoadSegment {
        kind,
        surface,
        length,
    };
    SegmentTrack::new(
        "demo",
        vec![
            segment(RoadKind::Straight, Surface::Asphalt, 300.0),
            segment(RoadKind::Left(Severity::Normal), Surface::Asphalt, 80.0),
            segment(RoadKind::Straight, Surface::Gravel, 200.0),
            segment(RoadKind::Right(Severity::Hairpin), Surface::Gravel, 40.0),
            segment(RoadKind::Straight, Surface::Asphalt, 250.0),
            segment(RoadKind::Right(Severity::Easy), Surface::Asphalt, 120.0),
        ],
    )
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .try_init();
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Audio-first racing game race engine", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Simulate a race against a virtual mixer and print what was spoken.
    Race(RaceArgs),
    /// List the recorded time-trial bests.
    Highscores {
        /// Highscore file; defaults to the configured path.
        #[arg(short, long)]
        file: Option<PathBuf>,
        /// Optional JSON config file.
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
    /// Write the built-in clip catalogue as a manifest to fill in.
    Manifest {
        /// Destination of the JSON manifest.
        output: PathBuf,
    },
}

#[derive(clap::Args, Debug)]
struct RaceArgs {
    #[arg(short, long, value_enum, default_value_t = ModeArg::TimeTrial)]
    mode: ModeArg,
    #[arg(short, long, default_value_t = 3)]
    laps: u32,
    /// Computer opponents in a single race.
    #[arg(long, default_value_t = 5)]
    opponents: u8,
    /// Cruising speed of the simulated car in km/h.
    #[arg(long, default_value_t = 140.0)]
    speed: f32,
    #[arg(long)]
    seed: Option<u64>,
    /// Optional JSON config file.
    #[arg(short, long)]
    config: Option<PathBuf>,
    /// Clip manifest; overrides the configured path.
    #[arg(long)]
    manifest: Option<PathBuf>,
    /// JSON track description; a built-in demo track otherwise.
    #[arg(long)]
    track: Option<PathBuf>,
    /// Host seconds at which the info key is pressed.
    #[arg(long, value_delimiter = ',')]
    info_at: Vec<f32>,
    /// Host seconds at which the status key is pressed.
    #[arg(long, value_delimiter = ',')]
    status_at: Vec<f32>,
    /// Host seconds at which the pause key is pressed.
    #[arg(long, value_delimiter = ',')]
    pause_at: Vec<f32>,
    /// Simulation step in seconds.
    #[arg(long, default_value_t = 0.05)]
    step: f32,
    #[arg(long, default_value_t = 900.0)]
    max_seconds: f32,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum ModeArg {
    TimeTrial,
    SingleRace,
    Multiplayer,
}
