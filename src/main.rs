use clap::{ArgAction, Parser};
use imgcaption::batch::{self, CaptionRequest, Dispatch, RunReport};
use imgcaption::config::{self, CONFIG_FILE_NAME};
use imgcaption::imaging::RustBackend;
use imgcaption::output;
use std::path::PathBuf;
use std::process::ExitCode;

fn version_string() -> &'static str {
    let on_tag = env!("ON_RELEASE_TAG");
    if on_tag == "true" {
        env!("CARGO_PKG_VERSION")
    } else {
        let hash = env!("GIT_HASH");
        if hash.is_empty() {
            "dev@unknown"
        } else {
            // Leaked once at startup, called exactly once
            Box::leak(format!("dev@{hash}").into_boxed_str())
        }
    }
}

#[derive(Parser)]
#[command(name = "imgcaption")]
#[command(about = "Stamp photos with captions built from EXIF metadata")]
#[command(long_about = "\
Stamp photos with captions built from EXIF metadata

Give it one image or a directory of images. Each image gets a caption drawn
onto it and is saved as a new file; originals are never modified.

Output:
  photo.jpg   → captioned_photo.jpg   (next to the original)
  photos/     → photos_captioned/     (sibling directory, same file names)

Caption templates:
  ##DateTime          capture date, formatted with --date-format
  ##Make ##Model      any EXIF tag of the image (see --metatags)
  ##{Make}_phone      braces when letters follow the tag name
  ####                a literal ##

  The capture date comes from the DateTime, DateTimeOriginal or
  DateTimeDigitized tag, or else from a date in the file name
  (20190116_111115.jpg, IMG-20190116-WA0003.jpg, ...).

Examples:
  imgcaption party.jpg
  imgcaption photos/ -c 'Party, ##DateTime' -a top_right
  imgcaption photos/ -c '##Make ##Model' --color white --stroke-width 2 -r
  imgcaption party.jpg -p
  imgcaption photos/ -m

Defaults can be kept in ./imgcaption.toml; run 'imgcaption --gen-config'
for a documented one.")]
#[command(version = version_string())]
struct Cli {
    /// Image file or directory of images
    #[arg(required_unless_present = "gen_config")]
    path: Option<PathBuf>,

    /// Caption template
    #[arg(short, long)]
    caption: Option<String>,

    /// strftime format for ##DateTime
    #[arg(short, long = "date-format")]
    date_format: Option<String>,

    /// Output file (for an image) or directory (for a directory)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Replace existing output files and reuse an existing output directory
    #[arg(short = 'r', long)]
    overwrite: bool,

    /// Show the result in the system image viewer instead of saving it
    #[arg(short, long)]
    preview: bool,

    /// TrueType/OpenType font file [default: bundled DejaVu Sans]
    #[arg(long)]
    font: Option<PathBuf>,

    /// Font size in pixels [default: fitted to the image width]
    #[arg(short, long, value_parser = clap::value_parser!(u32).range(1..))]
    size: Option<u32>,

    /// Caption color: a name or #rgb, #rrggbb, #rrggbbaa
    #[arg(long)]
    color: Option<String>,

    /// Outline thickness in pixels
    #[arg(long = "stroke-width", alias = "bold")]
    stroke_width: Option<u32>,

    /// Caption position: bottom_left, bottom_right, top_left, top_right, center
    #[arg(short, long = "align")]
    align: Option<String>,

    /// Caption directory images one at a time
    #[arg(long, conflicts_with = "jobs")]
    single_thread: bool,

    /// Parallel workers for directories [default: CPU cores]
    #[arg(short, long)]
    jobs: Option<usize>,

    /// Print every image's EXIF tags and exit
    #[arg(short, long)]
    metatags: bool,

    /// Config file [default: ./imgcaption.toml when present]
    #[arg(long)]
    config: Option<PathBuf>,

    /// Print a stock imgcaption.toml with all options documented
    #[arg(long)]
    gen_config: bool,

    /// More log output (-v info, -vv debug)
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

impl Cli {
    /// Flags that were given, as a TOML overlay for the config layers.
    fn config_overrides(&self) -> toml::Value {
        let mut caption = toml::Table::new();
        if let Some(template) = &self.caption {
            caption.insert("template".into(), template.clone().into());
        }
        if let Some(format) = &self.date_format {
            caption.insert("date_format".into(), format.clone().into());
        }
        if let Some(align) = &self.align {
            caption.insert("alignment".into(), align.clone().into());
        }

        let mut font = toml::Table::new();
        if let Some(path) = &self.font {
            font.insert("path".into(), path.to_string_lossy().into_owned().into());
        }
        if let Some(size) = self.size {
            font.insert("size".into(), i64::from(size).into());
        }
        if let Some(color) = &self.color {
            font.insert("color".into(), color.clone().into());
        }
        if let Some(stroke) = self.stroke_width {
            font.insert("stroke_width".into(), i64::from(stroke).into());
        }

        let mut processing = toml::Table::new();
        if let Some(jobs) = self.jobs {
            let jobs = i64::try_from(jobs).unwrap_or(i64::MAX);
            processing.insert("max_processes".into(), jobs.into());
        }

        let mut root = toml::Table::new();
        for (section, table) in [
            ("caption", caption),
            ("font", font),
            ("processing", processing),
        ] {
            if !table.is_empty() {
                root.insert(section.into(), toml::Value::Table(table));
            }
        }
        toml::Value::Table(root)
    }
}

fn init_logging(verbosity: u8) {
    let level = match verbosity {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp(None)
        .init();
}

/// Stock defaults, then the config file, then the command line.
fn load_layered_config(cli: &Cli) -> Result<config::CaptionConfig, Box<dyn std::error::Error>> {
    let file = match &cli.config {
        Some(path) if !path.is_file() => {
            return Err(format!("Config file not found: {}", path.display()).into());
        }
        Some(path) => path.clone(),
        None => PathBuf::from(CONFIG_FILE_NAME),
    };

    Ok(config::load_config(&file, Some(cli.config_overrides()))?)
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(&cli) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> Result<ExitCode, Box<dyn std::error::Error>> {
    if cli.gen_config {
        print!("{}", config::stock_config_toml());
        return Ok(ExitCode::SUCCESS);
    }
    let path = cli.path.as_deref().ok_or("missing image or directory path")?;

    let backend = RustBackend::new();
    if cli.metatags {
        output::print_metadata(&batch::dump_metadata(&backend, path)?);
        return Ok(ExitCode::SUCCESS);
    }

    let caption_config = load_layered_config(cli)?;
    let mut settings = caption_config.job_settings()?;
    settings.overwrite = cli.overwrite;
    settings.preview = cli.preview;

    let dispatch = if cli.single_thread {
        Dispatch::Sequential
    } else {
        Dispatch::Parallel {
            workers: config::effective_threads(&caption_config.processing),
        }
    };
    let request = CaptionRequest {
        path: path.to_path_buf(),
        output: cli.output.clone(),
        settings,
    };

    let (tx, rx) = std::sync::mpsc::channel();
    let printer = std::thread::spawn(move || {
        for outcome in rx {
            output::print_job_outcome(&outcome);
        }
    });
    let report = batch::caption_path(&backend, &request, dispatch, Some(tx));
    printer.join().map_err(|_| "output printer panicked")?;

    match report? {
        RunReport::Single(outcome) if outcome.is_success() => Ok(ExitCode::SUCCESS),
        RunReport::Single(_) => Ok(ExitCode::FAILURE),
        RunReport::Batch(report) => {
            output::print_batch_summary(&report);
            Ok(ExitCode::SUCCESS)
        }
    }
}
