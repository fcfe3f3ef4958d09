use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use std::io::{BufRead, Write};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, mpsc};
use std::time::Duration;
use takescope::analysis::{Analyzer, PlotMode, PlotRequest};
use takescope::capture::{InputDevice, MicInput, ToneInput, list_input_devices};
use takescope::commands::{self, Command, Controller, Reply};
use takescope::config::{self, CaptureFormat, RecorderConfig, Slot};
use takescope::recorder::{Recorder, RecorderEvent};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "takescope")]
#[command(about = "Record two microphone takes and plot their waveforms and spectra")]
#[command(version)]
struct Cli {
    /// Directory holding the takes and exported plots
    #[arg(long, global = true)]
    output_dir: Option<PathBuf>,

    /// Capture sample rate in Hz
    #[arg(long, global = true, default_value_t = config::DEFAULT_SAMPLE_RATE)]
    sample_rate: u32,

    /// Capture channel count
    #[arg(long, global = true, default_value_t = config::DEFAULT_CHANNELS)]
    channels: u16,

    /// Frames per capture buffer
    #[arg(long, global = true, default_value_t = config::DEFAULT_BUFFER_FRAMES)]
    buffer_frames: usize,

    /// Record a synthetic sine tone of this frequency instead of the microphone
    #[arg(long, global = true, value_name = "HZ")]
    tone: Option<f32>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Record one take until Ctrl+C
    Record {
        /// Slot to record into (1 or 2)
        #[arg(long, default_value = "1")]
        slot: Slot,

        /// Output filename, defaults to recording_<slot>.wav
        #[arg(long)]
        file: Option<PathBuf>,
    },

    /// Drive the recorder interactively with commands on stdin
    Session,

    /// Plot takes (defaults to both slot files)
    Plot {
        /// waveform, spectrum or both
        #[arg(long, default_value = "both")]
        mode: PlotMode,

        /// Save the plot as an image, defaults to plot_preview.png in the output directory
        #[arg(long)]
        export: Option<PathBuf>,

        /// Print the figure summary as JSON
        #[arg(long)]
        json: bool,

        files: Vec<PathBuf>,
    },

    /// List audio input devices
    Devices,

    /// Print the effective configuration
    Config,
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    if let Err(e) = run(cli) {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}

fn init_logging(verbose: bool) {
    let default = if verbose { "takescope=debug" } else { "takescope=info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn recorder_config(cli: &Cli) -> RecorderConfig {
    let format = CaptureFormat {
        sample_rate: cli.sample_rate,
        channels: cli.channels,
        buffer_frames: cli.buffer_frames,
    };
    let dir = cli.output_dir.clone().unwrap_or_else(config::default_output_dir);
    RecorderConfig::new(dir).with_format(format)
}

fn input_device(cli: &Cli) -> Arc<dyn InputDevice> {
    match cli.tone {
        Some(freq) => Arc::new(ToneInput::live(freq)),
        None => Arc::new(MicInput),
    }
}

fn run(cli: Cli) -> Result<()> {
    if cli.channels == 0 || cli.sample_rate == 0 || cli.buffer_frames == 0 {
        bail!("--sample-rate, --channels and --buffer-frames must be positive");
    }
    let config = recorder_config(&cli);

    match &cli.command {
        Commands::Record { slot, file } => {
            let (tx, events) = mpsc::channel();
            let recorder = Recorder::new(config, input_device(&cli))
                .context("cannot prepare output directory")?
                .with_events(tx);
            let file = file.clone().unwrap_or_else(|| slot.default_filename().into());
            run_record(&recorder, *slot, file, &events)
        }
        Commands::Session => {
            let recorder = Recorder::new(config, input_device(&cli)).context("cannot prepare output directory")?;
            run_session(Controller::new(recorder, Analyzer::default()))
        }
        Commands::Plot {
            mode,
            export,
            json,
            files,
        } => {
            let files = if files.is_empty() {
                Slot::ALL.iter().map(|&s| config.slot_path(s)).collect()
            } else {
                files.clone()
            };
            let image = export.clone().unwrap_or_else(|| config.preview_path());
            let request = PlotRequest::new(files, *mode).with_export(&image);
            let figure = Analyzer::default().plot(&request)?;
            if *json {
                println!("{}", serde_json::to_string_pretty(&figure)?);
            } else {
                println!("{}", commands::describe(&figure));
                println!("saved {}", image.display());
            }
            Ok(())
        }
        Commands::Devices => {
            for (name, is_default) in list_input_devices()? {
                let marker = if is_default { " (default)" } else { "" };
                println!("{name}{marker}");
            }
            Ok(())
        }
        Commands::Config => {
            println!("{}", serde_json::to_string_pretty(&config)?);
            Ok(())
        }
    }
}

fn run_record(recorder: &Recorder, slot: Slot, file: PathBuf, events: &mpsc::Receiver<RecorderEvent>) -> Result<()> {
    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();
    ctrlc::set_handler(move || {
        r.store(false, Ordering::SeqCst);
    })?;

    recorder
        .start(slot, &file)
        .with_context(|| format!("cannot start recording slot {slot}"))?;
    for event in events.try_iter() {
        eprintln!("{}", describe_event(&event));
    }
    eprintln!("Press Ctrl+C to stop.");

    while running.load(Ordering::SeqCst) {
        std::thread::sleep(Duration::from_millis(50));
    }

    eprintln!("Stopping capture...");
    let saved = recorder.stop(slot)?;
    for event in events.try_iter() {
        eprintln!("{}", describe_event(&event));
    }
    match saved {
        Some(path) => println!("{}", path.display()),
        None => bail!("slot {slot} was not recording"),
    }
    Ok(())
}

fn run_session(controller: Controller) -> Result<()> {
    let stdin = std::io::stdin();
    let mut stdout = std::io::stdout();
    println!("{}", commands::HELP);

    loop {
        print!("> ");
        stdout.flush()?;

        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            break;
        }
        if line.trim().is_empty() {
            continue;
        }

        let command: Command = match line.parse() {
            Ok(command) => command,
            Err(e) => {
                println!("{e}");
                continue;
            }
        };

        match controller.execute(command) {
            Ok(Reply::Message(message)) => println!("{message}"),
            Ok(Reply::Plotted { figure, saved }) => {
                println!("{}", commands::describe(&figure));
                if let Some(path) = saved {
                    println!("saved {}", path.display());
                }
            }
            Ok(Reply::Quit) => break,
            Err(e) => println!("error: {e}"),
        }
    }

    for path in controller.recorder().stop_all()? {
        println!("saved {}", path.display());
    }
    Ok(())
}

fn describe_event(event: &RecorderEvent) -> String {
    match event {
        RecorderEvent::Started { slot, path } => format!("slot {slot}: recording to {}", path.display()),
        RecorderEvent::Stopped { slot, frames } => format!("slot {slot}: stopped after {frames} frames"),
        RecorderEvent::Saved { slot, path, .. } => format!("slot {slot}: saved {}", path.display()),
    }
}
