use clap::{Arg, Command};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info, warn};

use gyromerge::config::Config;
use gyromerge::pipeline::MergePipeline;
use gyromerge::trf;

fn cli() -> Command {
    Command::new("gyromerge")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Merges a pair of action-camera recordings (video + GCSV gyro log)")
        .arg(
            Arg::new("first")
                .value_name("ID1")
                .help("Four-digit identifier of the first recording")
                .required(false),
        )
        .arg(
            Arg::new("second")
                .value_name("ID2")
                .help("Four-digit identifier of the second recording")
                .required(false),
        )
        .arg(
            Arg::new("dir")
                .short('d')
                .long("dir")
                .value_name("DIR")
                .help("Directory containing the recordings")
                .default_value("."),
        )
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("Path to a gyromerge.toml configuration file"),
        )
        .arg(
            Arg::new("trf")
                .short('t')
                .long("trf")
                .value_name("FILE")
                .num_args(1..=2)
                .help("Analyze one VidStab TRF file, or compare the stability of two")
                .conflicts_with_all(["first", "second"]),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .help("Enable verbose logging")
                .action(clap::ArgAction::SetTrue),
        )
}

#[tokio::main]
async fn main() -> ExitCode {
    let matches = cli().get_matches();

    let filter = if matches.get_flag("verbose") {
        "gyromerge=debug,info"
    } else {
        "gyromerge=info,warn"
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    if let Some(files) = matches.get_many::<String>("trf") {
        let files: Vec<PathBuf> = files.map(PathBuf::from).collect();
        let outcome = match files.as_slice() {
            [single] => trf::analyze_file(single).await.map(|_| ()),
            [first, second] => trf::compare_files(first, second).await.map(|_| ()),
            _ => unreachable!("clap caps --trf at two values"),
        };
        return match outcome {
            Ok(()) => ExitCode::SUCCESS,
            Err(e) => {
                error!("❌ {}", e);
                ExitCode::FAILURE
            }
        };
    }

    let (first, second) = match (
        matches.get_one::<String>("first"),
        matches.get_one::<String>("second"),
    ) {
        (Some(first), Some(second)) => (first.clone(), second.clone()),
        (None, None) => {
            // Invoked bare: print usage and report success.
            let _ = cli().print_help();
            return ExitCode::SUCCESS;
        }
        _ => {
            error!("expected two recording identifiers, got one");
            return ExitCode::FAILURE;
        }
    };

    let config = match matches.get_one::<String>("config") {
        Some(path) => match Config::load_from(&PathBuf::from(path)) {
            Ok(config) => config,
            Err(e) => {
                error!("Failed to load config {}: {}", path, e);
                return ExitCode::FAILURE;
            }
        },
        None => Config::load().unwrap_or_else(|e| {
            warn!("Failed to load config, using defaults: {}", e);
            Config::default()
        }),
    };

    let working_dir = PathBuf::from(matches.get_one::<String>("dir").expect("has default"));

    info!("🚀 Merging recordings {} + {}", first, second);
    info!("📁 Working directory: {}", working_dir.display());

    let pipeline = MergePipeline::new(config, working_dir);
    match pipeline.run(&first, &second).await {
        Ok(report) => {
            info!("✅ Video: {}", report.video_output.display());
            info!(
                "✅ Log:   {} ({} data rows appended)",
                report.log_output.display(),
                report.appended_rows
            );
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("❌ {}", e);
            ExitCode::FAILURE
        }
    }
}
