use anyhow::{Context, Result};
use clap::{Arg, ArgAction, ArgMatches, Command, value_parser};
use dialoguer::Confirm;
use indoc::indoc;
use log::{Level, warn};

use evtx_sessions::err::{OutputError, SessionError, SourceError};
use evtx_sessions::format::resolve_time_zone;
use evtx_sessions::{
    Correlator, EvtxSource, OutputFormat, ParserSettings, ReportSettings, RowWriter, SortKey,
    Stats, StreamEnd, assemble,
};

use std::fs::{self, File};
use std::io::{self, BufWriter, IsTerminal, Write};
use std::ops::ControlFlow;
use std::path::{Path, PathBuf};
use std::process::exit;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

const EXIT_UNKNOWN_TIMEZONE: i32 = 1;
const EXIT_UNREADABLE_INPUT: i32 = 2;
const EXIT_OUTPUT_FAILED: i32 = 3;
const EXIT_INTERRUPTED: i32 = 130;

const PROGRESS_EVERY: u64 = 1000;

struct EvtxLast {
    input: PathBuf,
    parser_settings: ParserSettings,
    report_settings: ReportSettings,
    output_format: OutputFormat,
    output_target: Option<PathBuf>,
    quiet: bool,
    partial: bool,
    verbosity_level: Option<Level>,
}

impl EvtxLast {
    pub fn from_cli_matches(matches: &ArgMatches) -> Result<Self> {
        let input = PathBuf::from(
            matches
                .get_one::<String>("INPUT")
                .expect("This is a required argument"),
        );

        // Resolved before anything touches the input.
        let time_zone = match matches.get_one::<String>("timezone") {
            Some(name) => Some(resolve_time_zone(name)?),
            None => None,
        };

        let sort_by: SortKey = matches
            .get_one::<String>("sort")
            .expect("has default")
            .parse()
            .map_err(anyhow::Error::msg)?;

        let output_format: OutputFormat = matches
            .get_one::<String>("format")
            .expect("has default")
            .parse()
            .map_err(anyhow::Error::msg)?;

        let report_settings = ReportSettings::new()
            .sort_by(sort_by)
            .format_durations(!matches.get_flag("raw-duration"))
            .format_logon_types(!matches.get_flag("numeric-type"))
            .sub_events(!matches.get_flag("no-sub-events"))
            .time_zone(time_zone);

        let num_threads = match (
            cfg!(feature = "multithreading"),
            matches.get_one::<usize>("num-threads"),
        ) {
            (true, Some(number)) => *number,
            (true, None) => 0,
            (false, _) => 1,
        };

        let parser_settings = ParserSettings::default()
            .num_threads(num_threads)
            .validate_checksums(matches.get_flag("validate-checksums"));

        let output_target = match matches.get_one::<String>("output-target") {
            Some(path) => {
                let path = PathBuf::from(path);
                Self::check_output_target(&path, !matches.get_flag("no-confirm-overwrite"))?;
                Some(path)
            }
            None => None,
        };

        let verbosity_level = match matches.get_count("verbose") {
            0 => None,
            1 => Some(Level::Info),
            2 => Some(Level::Debug),
            3 => Some(Level::Trace),
            _ => {
                eprintln!("using more than -vvv does not affect verbosity level");
                Some(Level::Trace)
            }
        };

        Ok(EvtxLast {
            input,
            parser_settings,
            report_settings,
            output_format,
            output_target,
            quiet: matches.get_flag("quiet"),
            partial: matches.get_flag("partial"),
            verbosity_level,
        })
    }

    /// Main entry point for `EvtxLast`, returns the process exit code.
    pub fn run(&self) -> Result<i32> {
        self.try_to_initialize_logging();

        let interrupted = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&interrupted);
        if let Err(e) = ctrlc::set_handler(move || flag.store(true, Ordering::SeqCst)) {
            warn!("Failed to install interrupt handler: {}", e);
        }

        let mut source = EvtxSource::open(&self.input, self.parser_settings.clone())?;
        let show_progress = !self.quiet && io::stderr().is_terminal();

        let mut correlator = Correlator::new();
        let end = correlator.consume(source.records(), |stats| {
            if show_progress && stats.records % PROGRESS_EVERY == 0 {
                eprint!("\rProcessed {} records", stats.records);
            }
            if interrupted.load(Ordering::SeqCst) {
                ControlFlow::Break(())
            } else {
                ControlFlow::Continue(())
            }
        });

        if show_progress {
            eprint!("\r");
        }
        if !self.quiet {
            self.print_summary(source.path(), &correlator.stats(), correlator.store().len());
        }

        if end == StreamEnd::Interrupted && !self.partial {
            eprintln!("Interrupted, no results written (pass --partial to keep partial results)");
            return Ok(EXIT_INTERRUPTED);
        }

        let rows = assemble(correlator.into_store().into_sessions(), &self.report_settings);

        let output: Box<dyn Write> = match &self.output_target {
            Some(path) => Box::new(BufWriter::new(Self::create_output_file(path)?)),
            None => Box::new(BufWriter::new(io::stdout().lock())),
        };

        let mut writer = RowWriter::new(output, self.output_format);
        writer
            .write_all(&rows)
            .context("Failed to write results")?;

        Ok(match end {
            StreamEnd::Exhausted => 0,
            StreamEnd::Interrupted => EXIT_INTERRUPTED,
        })
    }

    fn print_summary(&self, path: &Path, stats: &Stats, sessions: usize) {
        eprintln!(
            "{}: {} records, {} logons, {} logoffs, {} sub-events -> {} sessions",
            path.display(),
            stats.records,
            stats.logons,
            stats.logoffs,
            stats.sub_events,
            sessions
        );
        if stats.skipped + stats.decode_errors + stats.dropped > 0 {
            eprintln!(
                "skipped {} malformed records, {} undecodable records, \
                 {} unattributable sub-events",
                stats.skipped, stats.decode_errors, stats.dropped
            );
        }
    }

    /// If `prompt` is passed, will display a confirmation prompt before overwriting files.
    fn check_output_target(path: &Path, prompt: bool) -> Result<(), OutputError> {
        if path.is_dir() {
            return Err(OutputError::IsADirectory {
                path: path.to_path_buf(),
            });
        }

        if path.exists() && prompt {
            let confirmed = Confirm::new()
                .with_prompt(format!(
                    "Are you sure you want to override output file at {}",
                    path.display()
                ))
                .default(false)
                .interact()
                .unwrap_or(false);

            if !confirmed {
                return Err(OutputError::Cancelled {
                    path: path.to_path_buf(),
                });
            }
        }

        Ok(())
    }

    fn create_output_file(path: &Path) -> Result<File, OutputError> {
        let failed = |source| OutputError::FailedToCreate {
            path: path.to_path_buf(),
            source,
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            if !parent.exists() {
                fs::create_dir_all(parent).map_err(failed)?;
            }
        }

        File::create(path).map_err(failed)
    }

    fn try_to_initialize_logging(&self) {
        if let Some(level) = self.verbosity_level {
            if let Err(e) = simplelog::TermLogger::init(
                level.to_level_filter(),
                simplelog::Config::default(),
                simplelog::TerminalMode::Stderr,
                simplelog::ColorChoice::Auto,
            ) {
                eprintln!("Failed to initialize logging: {:?}", e)
            }
        }
    }
}

fn exit_code(e: &anyhow::Error) -> i32 {
    for cause in e.chain() {
        if cause.is::<SessionError>() {
            return EXIT_UNKNOWN_TIMEZONE;
        }
        if cause.is::<SourceError>() {
            return EXIT_UNREADABLE_INPUT;
        }
        if cause.is::<OutputError>() {
            return EXIT_OUTPUT_FAILED;
        }
    }
    1
}

fn cli() -> Command {
    Command::new("evtx_last")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Reconstruct logon sessions from a Windows Security EVTX file")
        .long_about(indoc!(r#"
            Reconstruct logon sessions from a Windows Security EVTX file.

            Logon (528/4624), logoff (538/551/4634/4647), reconnect (682/4778) and
            disconnect (683/4779) events are correlated by domain, user and logon id
            into one row per session. Disconnect/reconnect stretches are printed as
            extra rows with an empty user column.
        "#))
        .arg(
            Arg::new("INPUT")
                .required(true)
                .help("Path to the Windows EVTX file"),
        )
        .arg(
            Arg::new("timezone")
                .short('z')
                .long("timezone")
                .value_name("TZ")
                .help("Convert UTC timestamps to a tz database zone, e.g. 'Europe/Warsaw'"),
        )
        .arg(
            Arg::new("raw-duration")
                .short('d')
                .action(ArgAction::SetTrue)
                .help("Print duration in seconds"),
        )
        .arg(
            Arg::new("numeric-type")
                .short('n')
                .action(ArgAction::SetTrue)
                .help("Print numeric logon type"),
        )
        .arg(
            Arg::new("format")
                .short('f')
                .value_parser(OutputFormat::NAMES)
                .default_value("table")
                .help("Output format"),
        )
        .arg(
            Arg::new("no-sub-events")
                .short('u')
                .action(ArgAction::SetTrue)
                .help("Do not print disconnect/reconnect rows"),
        )
        .arg(
            Arg::new("output-target")
                .short('o')
                .value_name("PATH")
                .help("Writes output to the file specified instead of stdout, errors will still be printed to stderr. \
                       Will ask for confirmation before overwriting files, to allow overwriting, pass `--no-confirm-overwrite`. \
                       Will create parent directories if needed."),
        )
        .arg(
            Arg::new("no-confirm-overwrite")
                .long("no-confirm-overwrite")
                .action(ArgAction::SetTrue)
                .help("When set, will not ask for confirmation before overwriting files, useful for automation"),
        )
        .arg(
            Arg::new("sort")
                .short('s')
                .value_parser(SortKey::NAMES)
                .default_value("login")
                .help("Sort by..."),
        )
        .arg(
            Arg::new("quiet")
                .short('q')
                .action(ArgAction::SetTrue)
                .help("Do not print progress and status messages"),
        )
        .arg(
            Arg::new("partial")
                .long("partial")
                .action(ArgAction::SetTrue)
                .help("On Ctrl-C, still print the sessions reconstructed so far"),
        )
        .arg(
            Arg::new("num-threads")
                .long("threads")
                .value_parser(value_parser!(usize))
                .help("Sets the number of worker threads used for decoding, defaults to number of CPU cores."),
        )
        .arg(
            Arg::new("validate-checksums")
                .long("validate-checksums")
                .action(ArgAction::SetTrue)
                .help("When set, chunks with invalid checksums will not be parsed. \
                       Usually dirty files have bad checksums, so using this flag will result in fewer records."),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .action(ArgAction::Count)
                .help("-v - info, -vv - debug, -vvv - trace"),
        )
}

fn main() {
    let matches = cli().get_matches();

    let code = match EvtxLast::from_cli_matches(&matches).and_then(|app| app.run()) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{:#}", e);
            exit_code(&e)
        }
    };

    exit(code)
}
