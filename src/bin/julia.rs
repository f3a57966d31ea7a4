extern crate clap;
extern crate juliasched;
extern crate num;
extern crate num_cpus;

use clap::{App, Arg, ArgMatches};
use juliasched::output::{save_graymap, save_ppm};
use juliasched::report::ReportSink;
use juliasched::{
    Deployment, Error, ErrorKind, Granularity, JuliaRenderer, Policy, RasterBuffer, RenderConfig,
    ScheduleConfig,
};
use num::Complex;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::warn;
use tracing_subscriber::EnvFilter;

fn parse_pair<T>(s: &str, separator: char) -> Option<(T, T)>
where
    T: FromStr,
{
    match s.find(separator) {
        None => None,
        Some(index) => match (T::from_str(&s[..index]), T::from_str(&s[index + 1..])) {
            (Ok(l), Ok(r)) => Some((l, r)),
            _ => None,
        },
    }
}

fn parse_complex(s: &str) -> Option<Complex<f64>> {
    match parse_pair(s, ',') {
        Some((re, im)) => Some(Complex { re, im }),
        None => None,
    }
}

fn validate_pair<T: FromStr>(s: &str, separator: char, err: &str) -> Result<(), String> {
    match parse_pair::<T>(s, separator) {
        Some(_) => Ok(()),
        None => Err(err.to_string()),
    }
}

fn validate_range<T: FromStr + Ord>(
    s: &str,
    low: T,
    high: T,
    isnotanumber_err: &str,
    isnotinrange_err: &str,
) -> Result<(), String> {
    match T::from_str(s) {
        Ok(i) => {
            if i >= low && i <= high {
                Ok(())
            } else {
                Err(isnotinrange_err.to_string())
            }
        }
        Err(_) => Err(isnotanumber_err.to_string()),
    }
}

const SIZE: &str = "size";
const ITERATIONS: &str = "iterations";
const CHUNK_HEIGHT: &str = "chunk-height";
const CONSTANT: &str = "constant";
const THREADS: &str = "threads";
const POLICY: &str = "policy";
const GRANULARITY: &str = "granularity";
const WORKERS: &str = "workers";
const RANK: &str = "rank";
const OUTPUT: &str = "output";
const REFERENCE: &str = "reference";
const GRAYMAP: &str = "graymap";
const LOG_DIR: &str = "log-dir";
const SUMMARY_DIR: &str = "summary-dir";
const VERIFY: &str = "verify";

fn args<'a>() -> ArgMatches<'a> {
    App::new("julia")
        .version("0.1.0")
        .author("Elf M. Sternberg <elf.sternberg@gmail.com>")
        .about("Julia set renderer for comparing row scheduling policies")
        .arg(
            Arg::with_name(SIZE)
                .long(SIZE)
                .short("s")
                .takes_value(true)
                .default_value("19200x19200")
                .validator(|s| validate_pair::<usize>(&s, 'x', "Could not parse image size"))
                .help("Size of the raster, WIDTHxHEIGHT"),
        )
        .arg(
            Arg::with_name(ITERATIONS)
                .long(ITERATIONS)
                .short("i")
                .takes_value(true)
                .default_value("10000")
                .validator(|s| {
                    validate_range(
                        &s,
                        1u32,
                        1_000_000,
                        "Could not parse iteration count",
                        "Iteration count must be between 1 and 1000000",
                    )
                })
                .help("Iteration cap per pixel"),
        )
        .arg(
            Arg::with_name(CHUNK_HEIGHT)
                .long(CHUNK_HEIGHT)
                .short("c")
                .takes_value(true)
                .default_value("1200")
                .validator(|s| {
                    validate_range(
                        &s,
                        1usize,
                        usize::max_value(),
                        "Could not parse chunk height",
                        "Chunk height must be positive",
                    )
                })
                .help("Rows per timed chunk, and rows per worker when distributed"),
        )
        .arg(
            Arg::with_name(CONSTANT)
                .long(CONSTANT)
                .short("k")
                .takes_value(true)
                .allow_hyphen_values(true)
                .default_value("-0.7,0.27015")
                .validator(|s| validate_pair::<f64>(&s, ',', "Could not parse Julia constant"))
                .help("The Julia constant c, as RE,IM"),
        )
        .arg(
            Arg::with_name(THREADS)
                .long(THREADS)
                .short("t")
                .takes_value(true)
                .validator(|s| {
                    validate_range(
                        &s,
                        1usize,
                        1024,
                        "Could not parse thread count",
                        "Thread count must be between 1 and 1024",
                    )
                })
                .help("Threads per worker (default: available processing units)"),
        )
        .arg(
            Arg::with_name(POLICY)
                .long(POLICY)
                .short("p")
                .takes_value(true)
                .possible_values(&["static", "dynamic", "guided", "all"])
                .default_value("all")
                .help("Scheduling policy to run"),
        )
        .arg(
            Arg::with_name(GRANULARITY)
                .long(GRANULARITY)
                .short("g")
                .takes_value(true)
                .validator(|s| {
                    validate_range(
                        &s,
                        1usize,
                        usize::max_value(),
                        "Could not parse granularity",
                        "Granularity must be positive",
                    )
                })
                .help("Rows per unit of work (default: 10 for dynamic, policy default otherwise)"),
        )
        .arg(
            Arg::with_name(WORKERS)
                .long(WORKERS)
                .short("w")
                .takes_value(true)
                .default_value("1")
                .validator(|s| {
                    validate_range(
                        &s,
                        1usize,
                        usize::max_value(),
                        "Could not parse worker count",
                        "Worker count must be positive",
                    )
                })
                .help("Number of workers sharing the raster"),
        )
        .arg(
            Arg::with_name(RANK)
                .long(RANK)
                .short("r")
                .takes_value(true)
                .default_value("0")
                .validator(|s| {
                    usize::from_str(&s)
                        .map(|_| ())
                        .map_err(|_| "Could not parse rank".to_string())
                })
                .help("This worker's rank"),
        )
        .arg(
            Arg::with_name(OUTPUT)
                .long(OUTPUT)
                .short("o")
                .takes_value(true)
                .help("Directory to write one image per schedule into"),
        )
        .arg(
            Arg::with_name(REFERENCE)
                .long(REFERENCE)
                .takes_value(true)
                .help("Write a reference image with chunk boundaries marked (rank 0 only)"),
        )
        .arg(
            Arg::with_name(GRAYMAP)
                .long(GRAYMAP)
                .help("Write binary graymaps instead of plain-text pixmaps"),
        )
        .arg(
            Arg::with_name(LOG_DIR)
                .long(LOG_DIR)
                .takes_value(true)
                .default_value("logs")
                .help("Directory for per-chunk timing logs"),
        )
        .arg(
            Arg::with_name(SUMMARY_DIR)
                .long(SUMMARY_DIR)
                .takes_value(true)
                .default_value("summaries")
                .help("Directory for per-run summaries"),
        )
        .arg(
            Arg::with_name(VERIFY)
                .long(VERIFY)
                .help("Check that every schedule produced the same raster"),
        )
        .get_matches()
}

/// Fetch an argument clap has already validated.
fn value<T: FromStr>(matches: &ArgMatches, name: &str) -> T {
    matches
        .value_of(name)
        .and_then(|s| T::from_str(s).ok())
        .unwrap_or_else(|| panic!("--{} was validated but did not parse", name))
}

/// Write one image, returning whether it was written.  An unwritable
/// destination is reported and skipped; the remaining schedules still run.
fn save_image(path: &Path, raster: &RasterBuffer, max_iter: u32, graymap: bool) -> Result<bool, Error> {
    let saved = if graymap {
        save_graymap(path, raster, max_iter)
    } else {
        save_ppm(path, raster, max_iter)
    };
    match saved {
        Err(e) if e.kind() == ErrorKind::Resource => {
            warn!(path = %path.display(), error = %e, "image skipped");
            eprintln!("julia: {}", e);
            Ok(false)
        }
        Err(e) => Err(e),
        Ok(()) => Ok(true),
    }
}

fn run(matches: &ArgMatches) -> Result<(), Error> {
    let size = parse_pair(matches.value_of(SIZE).unwrap_or_default(), 'x')
        .unwrap_or_else(|| panic!("--{} was validated but did not parse", SIZE));
    let c = parse_complex(matches.value_of(CONSTANT).unwrap_or_default())
        .unwrap_or_else(|| panic!("--{} was validated but did not parse", CONSTANT));
    let config = RenderConfig {
        width: size.0,
        height: size.1,
        max_iter: value(matches, ITERATIONS),
        chunk_height: value(matches, CHUNK_HEIGHT),
        c,
    };
    let deployment = Deployment {
        workers: value(matches, WORKERS),
        rank: value(matches, RANK),
    };
    let threads = if matches.is_present(THREADS) {
        value(matches, THREADS)
    } else {
        num_cpus::get()
    };
    let policies: Vec<Policy> = match matches.value_of(POLICY) {
        Some("all") | None => Policy::ALL.to_vec(),
        Some(_) => vec![value::<Policy>(matches, POLICY)],
    };
    let graymap = matches.is_present(GRAYMAP);
    let extension = if graymap { "pgm" } else { "ppm" };
    let suffix = if deployment.is_distributed() {
        format!("_rank{}", deployment.rank)
    } else {
        String::new()
    };

    // Topology problems end the run before any pixel is computed.
    let rows = deployment.row_range(&config)?;
    let renderer = JuliaRenderer::new(&config)?;
    let sink = ReportSink {
        log_dir: matches.value_of(LOG_DIR).map(PathBuf::from),
        summary_dir: matches.value_of(SUMMARY_DIR).map(PathBuf::from),
    };

    let mut rasters: Vec<(Policy, RasterBuffer)> = vec![];
    for policy in policies {
        let schedule = match matches.value_of(GRANULARITY) {
            Some(_) => ScheduleConfig::new(
                policy,
                Granularity::Rows(value(matches, GRANULARITY)),
                threads,
            )?,
            None => ScheduleConfig::lab_default(policy, threads)?,
        };
        let result = renderer.compute_raster(deployment.rank, rows, &schedule)?;
        sink.persist(&result, &deployment, config.chunk_height);

        if deployment.is_distributed() {
            print!("Rank {}: ", deployment.rank);
        }
        println!(
            "Schedule {} finished in {:.6} seconds using {} threads.",
            policy,
            result.run.seconds(),
            threads
        );

        if let Some(dir) = matches.value_of(OUTPUT) {
            let path = Path::new(dir).join(format!("julia_{}{}.{}", policy, suffix, extension));
            save_image(&path, &result.raster, config.max_iter, graymap)?;
        }
        rasters.push((policy, result.raster));
    }

    if matches.is_present(VERIFY) {
        if let Some((first, expected)) = rasters.first() {
            for (policy, raster) in &rasters[1..] {
                if raster != expected {
                    return Err(Error::ScheduleMismatch(*first, *policy));
                }
            }
            println!("All {} schedules produced identical rasters.", rasters.len());
        }
    }

    if let Some(path) = matches.value_of(REFERENCE) {
        if deployment.rank == 0 {
            println!("Generating reference image with chunk lines...");
            let reference = renderer.compute_reference_raster()?;
            if save_image(Path::new(path), &reference, config.max_iter, graymap)? {
                println!("Reference image saved.");
            }
        }
    }
    Ok(())
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let matches = args();
    if let Err(e) = run(&matches) {
        eprintln!("julia: {}", e);
        std::process::exit(1);
    }
}
