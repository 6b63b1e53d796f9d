#[macro_use]
extern crate clap;

use std::fmt::Display;
use std::path::Path;
use std::process::exit;
use std::str::FromStr;

use clap::ArgMatches;
use hap::{
    measure_by_name, ClusterHierarchy, DirectoryStore, HapConfig, HierarchicalAffinityPropagation,
    SimilarityMatrixBuilder, Storage,
};
use num_traits::Float;
use tracing::{info, Level};

use crate::ops::{display_results, from_file, read_labels, write_labels};

mod ops;

fn main() {
    let matches = clap_app!(hap =>
        (version: "0.1.0")
        (author: "Chris N. <christopher.neely1200@gmail.com>")
        (about: "Hierarchical Affinity Propagation over map/reduce rounds")
        (@setting SubcommandRequiredElseHelp)
        (@arg VERBOSE: -v --verbose +global "Log every phase and shuffle")
        (@subcommand build =>
            (about: "Build the initial similarity generation from a vector file")
            (@arg INPUT: -i --input +takes_value +required "Path to tab-separated vectors, first column is a label")
            (@arg OUTPUT: -o --output +takes_value +required "Directory for the generation, must not exist")
            (@arg LEVELS: -l --levels +takes_value "Number of hierarchy levels, default=1")
            (@arg SCALE: -s --scale +takes_value "Diagonal scale, self-preferences drawn from (-scale, 0], default=1")
            (@arg MEASURE: -m --measure +takes_value "euclidean, squared, manhattan or cosine, default=euclidean")
            (@arg SEED: --seed +takes_value "Seed for the diagonal draws, default=random")
            (@arg PRECISION: -r --precision +takes_value "Set f32 or f64 precision, default=f64")
        )
        (@subcommand cluster =>
            (about: "Run responsibility/availability rounds and extract clusters")
            (@arg INPUT: -i --input +takes_value +required "Generation written by build")
            (@arg WORKING: -w --working +takes_value +required "Directory for intermediate generations")
            (@arg OUTPUT: -o --output +takes_value +required "Directory for the final assignments, must not exist")
            (@arg N: -n --n +takes_value +required "Number of vectors in the input generation")
            (@arg LEVELS: -l --levels +takes_value "Number of hierarchy levels, default=1")
            (@arg ITERATIONS: --iterations +takes_value "Number of rounds, at least levels, default=1")
            (@arg DAMPING: -d --damping +takes_value "Damping value in range [0, 1), default=0")
            (@arg THREADS: -t --threads +takes_value "Number of worker threads, default=4")
            (@arg PRECISION: -r --precision +takes_value "Set f32 or f64 precision, default=f64")
        )
    )
    .get_matches();

    let level = if matches.is_present("VERBOSE") {
        Level::DEBUG
    } else {
        Level::INFO
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();

    match matches.subcommand() {
        ("build", Some(m)) => match m.value_of("PRECISION").unwrap_or("f64") {
            "f32" => build::<f32>(m),
            "f64" => build::<f64>(m),
            p => {
                eprintln!("Unknown precision {}", p);
                exit(2);
            }
        },
        ("cluster", Some(m)) => match m.value_of("PRECISION").unwrap_or("f64") {
            "f32" => cluster::<f32>(m),
            "f64" => cluster::<f64>(m),
            p => {
                eprintln!("Unknown precision {}", p);
                exit(2);
            }
        },
        _ => {
            eprintln!("{}", matches.usage());
            exit(2);
        }
    }
}

fn parse_or_exit<T>(matches: &ArgMatches, name: &str, default: &str) -> T
where
    T: FromStr,
{
    matches
        .value_of(name)
        .unwrap_or(default)
        .parse::<T>()
        .unwrap_or_else(|_| {
            eprintln!("Unable to parse {}", name.to_lowercase());
            exit(1);
        })
}

fn build<F>(matches: &ArgMatches)
where
    F: Float + Default + FromStr + Display + Send + Sync,
{
    let input = Path::new(matches.value_of("INPUT").unwrap_or_default());
    if !input.exists() {
        eprintln!("Unable to locate input file {}", input.display());
        exit(1);
    }
    let output = Path::new(matches.value_of("OUTPUT").unwrap_or_default());
    let levels: usize = parse_or_exit(matches, "LEVELS", "1");
    let scale: f64 = parse_or_exit(matches, "SCALE", "1");
    let measure_name = matches.value_of("MEASURE").unwrap_or("euclidean");
    let measure = measure_by_name::<F>(measure_name).unwrap_or_else(|| {
        eprintln!("Unknown distance measure {}", measure_name);
        exit(2);
    });
    let mut builder = SimilarityMatrixBuilder::new(levels, scale);
    if matches.is_present("SEED") {
        builder = builder.seed(parse_or_exit(matches, "SEED", "0"));
    }

    let (x, labels) = from_file::<F>(input).unwrap_or_else(|e| {
        eprintln!("{}", e);
        exit(1);
    });
    let records = builder.build(&x, &*measure).unwrap_or_else(|e| {
        eprintln!("{}", e);
        exit(2);
    });
    let mut store = DirectoryStore::new();
    if let Err(e) = store.write(output, &records) {
        eprintln!("{}", e);
        exit(1);
    }
    if let Err(e) = write_labels(output, &labels) {
        eprintln!("Unable to write labels: {}", e);
        exit(1);
    }
    info!(n = x.nrows(), output = %output.display(), "generation 0 written");
}

fn cluster<F>(matches: &ArgMatches)
where
    F: Float + FromStr + Display + Send + Sync,
{
    let input = Path::new(matches.value_of("INPUT").unwrap_or_default());
    let working = Path::new(matches.value_of("WORKING").unwrap_or_default());
    let output = Path::new(matches.value_of("OUTPUT").unwrap_or_default());
    let n: usize = parse_or_exit(matches, "N", "0");
    let levels: usize = parse_or_exit(matches, "LEVELS", "1");
    let iterations: usize = parse_or_exit(matches, "ITERATIONS", "1");
    let damping: f64 = parse_or_exit(matches, "DAMPING", "0");
    let threads: usize = parse_or_exit(matches, "THREADS", "4");

    let damping = F::from(damping).unwrap_or_else(|| {
        eprintln!("Unable to parse damping");
        exit(1);
    });
    let config = HapConfig::new(n, levels, iterations, damping, threads).unwrap_or_else(|e| {
        eprintln!("{}", e);
        exit(2);
    });
    let mut store = DirectoryStore::new();
    let hap = HierarchicalAffinityPropagation::new(config);
    let assignments = hap
        .run(&mut store, input, working, output)
        .unwrap_or_else(|e| {
            eprintln!("{}", e);
            exit(1);
        });
    let labels = read_labels(input, n).unwrap_or_else(|e| {
        eprintln!("Unable to read labels: {}", e);
        exit(1);
    });
    let results = ClusterHierarchy::new(assignments, hap.config().levels());
    if let Err(e) = display_results(&results, &labels) {
        eprintln!("Unable to write results: {}", e);
        exit(1);
    }
}
