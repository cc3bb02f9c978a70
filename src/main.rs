use std::{process::ExitCode, time::Instant};

use attendance_extract::{AttendanceExtractorBuilder, CourseNames, ExtractionOptions, TokenPage};
use tracing_subscriber::{fmt::format::FmtSpan, EnvFilter};

const USAGE: &str = "usage: attendance-extract <tokens.json> [courses.json] [options.json]";

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_span_events(FmtSpan::CLOSE)
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let mut args = std::env::args().skip(1);
    let Some(tokens_path) = args.next() else {
        eprintln!("{USAGE}");
        return ExitCode::FAILURE;
    };
    let courses_path = args.next();
    let options_path = args.next();

    match run(&tokens_path, courses_path.as_deref(), options_path.as_deref()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run(
    tokens_path: &str,
    courses_path: Option<&str>,
    options_path: Option<&str>,
) -> Result<(), Box<dyn std::error::Error>> {
    let page: TokenPage = serde_json::from_str(&std::fs::read_to_string(tokens_path)?)?;
    let options: ExtractionOptions = match options_path {
        Some(path) => serde_json::from_str(&std::fs::read_to_string(path)?)?,
        None => ExtractionOptions::default(),
    };

    let mut builder = AttendanceExtractorBuilder::new().options(options);
    if let Some(path) = courses_path {
        builder = builder.course_names(CourseNames::from_json_file(path)?);
    }
    let extractor = builder.build()?;

    let start = Instant::now();
    let extraction = extractor.extract(&page);
    log::debug!("{:?}", start.elapsed());
    log::debug!("{:#?}", extraction.diagnostics);

    println!("{}", serde_json::to_string_pretty(&extraction.entries)?);
    Ok(())
}
