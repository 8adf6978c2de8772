//! Module compare
//! hapsim compare --fasta [-f] file --target [-t] name [--min low] [--max high] [--chunk size] [--page-size size] [--csv out]
//!
//! --fasta : the fasta file containing the named sequences to search in.
//!
//! --target gives the name of the sequence every other sequence is compared
//!         against. Must be present in the fasta file.
//!
//! --min --max : inclusive similarity range in percent, defaults to [0,100].
//!         Scores outside the range are not reported.
//!
//! --chunk : number of candidates scored per chunk (default 100). Progress is
//!         reported once per chunk and cancellation is observed at chunk
//!         boundaries.
//!
//! --page-size : number of ranked results printed per page (default 100).
//!
//! --csv : optional path, dumps the ranked results as csv.
//!
//! --min-seq-size : drop fasta records shorter than this many bases.
//!
//! Module list
//! hapsim list --fasta [-f] file
//!
//! prints the sequence names and lengths found in the fasta file, in file
//! order.

use std::fs::File;
use std::io::BufWriter;
use std::path::Path;
use std::time::SystemTime;

use clap::{Arg, ArgMatches, Command};
use cpu_time::ProcessTime;

// for logging (debug mostly, switched at run time through RUST_LOG)
use env_logger::Builder;

// our crate
use hapsim::answer::dump_csv;
use hapsim::events::JobEvent;
use hapsim::session::CompareSession;
use hapsim::utils::files::{load_fasta_file, FilterParams};
use hapsim::utils::parameters::{ComparisonRequest, JobParams, ScoreRange};

// install a logger facility
pub fn init_log() -> u64 {
    Builder::from_default_env().init();
    println!("\n ************** initializing logger *****************\n");
    return 1;
}

#[doc(hidden)]
fn parse_compare(matches: &ArgMatches) -> Result<(), anyhow::Error> {
    log::debug!("in parse_compare");
    //
    let fasta = matches
        .get_one::<String>("fasta")
        .expect("fasta file is mandatory");
    let target = matches
        .get_one::<String>("target")
        .expect("target name is mandatory");
    let min = *matches.get_one::<f32>("min").unwrap_or(&0.);
    let max = *matches.get_one::<f32>("max").unwrap_or(&100.);
    let chunk_size = *matches.get_one::<usize>("chunk").unwrap_or(&100);
    let page_size = *matches.get_one::<usize>("page_size").unwrap_or(&100);
    let min_seq_size = *matches.get_one::<usize>("min_seq_size").unwrap_or(&0);
    println!(
        "comparing against '{}', range [{}, {}], chunk size {}",
        target, min, max, chunk_size
    );
    //
    let start_t = SystemTime::now();
    let cpu_start = ProcessTime::now();
    //
    let filter_params = FilterParams::new(min_seq_size);
    let store = load_fasta_file(Path::new(fasta), &filter_params)?;
    let session = CompareSession::new(store, JobParams::new(chunk_size, 64))?;
    let request = ComparisonRequest::new(target.clone(), ScoreRange::new(min, max));
    let (job, receiver) = session.start(&request)?;
    //
    // the channel is read until the terminal event
    //
    for event in receiver.iter() {
        match event {
            JobEvent::Progress { processed, total } => {
                log::info!("progress : {} / {}", processed, total);
            }
            JobEvent::Chunk { data } => {
                log::debug!("chunk received, {} matches in range", data.len());
            }
            JobEvent::Done => {
                println!("comparison done");
                break;
            }
            JobEvent::Cancelled => {
                println!("comparison cancelled");
                break;
            }
            JobEvent::Error { message } => {
                println!("comparison failed : {}", message);
                break;
            }
        }
    }
    //
    let nb_results = job.total_results();
    println!(
        "{} of {} candidates in range [{}, {}]",
        nb_results,
        job.get_total(),
        min,
        max
    );
    let mut page_index = 0;
    loop {
        let page = job.page(page_index, page_size);
        if page.is_empty() {
            break;
        }
        println!("-- page {}", page_index + 1);
        for m in &page {
            println!("{}\t{:.2}", m.name, m.score);
        }
        page_index += 1;
    }
    //
    if let Some(csv_path) = matches.get_one::<String>("csv") {
        let out = File::create(Path::new(csv_path))?;
        let nb_dumped = dump_csv(&job.aggregator().snapshot(), BufWriter::new(out))?;
        println!("dumped {} matches in {}", nb_dumped, csv_path);
    }
    //
    log::info!(
        "compare command, system time(s) : {}, cpu time(s) : {}",
        start_t.elapsed().unwrap_or_default().as_secs(),
        cpu_start.elapsed().as_secs()
    );
    //
    Ok(())
} // end of parse_compare

#[doc(hidden)]
fn parse_list(matches: &ArgMatches) -> Result<(), anyhow::Error> {
    log::debug!("in parse_list");
    //
    let fasta = matches
        .get_one::<String>("fasta")
        .expect("fasta file is mandatory");
    let store = load_fasta_file(Path::new(fasta), &FilterParams::default())?;
    println!("{} sequences in {}", store.len(), fasta);
    for seq in store.iter() {
        println!("{}\t{}", seq.get_name(), seq.len());
    }
    //
    Ok(())
} // end of parse_list

fn main() -> Result<(), anyhow::Error> {
    let _ = init_log();
    //
    let compare_cmd = Command::new("compare")
        .about("compare a target sequence against every other sequence of a fasta file")
        .arg(
            Arg::new("fasta")
                .long("fasta")
                .short('f')
                .required(true)
                .help("fasta file containing the named sequences"),
        )
        .arg(
            Arg::new("target")
                .long("target")
                .short('t')
                .required(true)
                .help("name of the sequence to compare against"),
        )
        .arg(
            Arg::new("min")
                .long("min")
                .value_parser(clap::value_parser!(f32))
                .default_value("0")
                .help("lower similarity bound in percent, inclusive"),
        )
        .arg(
            Arg::new("max")
                .long("max")
                .value_parser(clap::value_parser!(f32))
                .default_value("100")
                .help("upper similarity bound in percent, inclusive"),
        )
        .arg(
            Arg::new("chunk")
                .long("chunk")
                .value_parser(clap::value_parser!(usize))
                .default_value("100")
                .help("number of candidates scored per chunk"),
        )
        .arg(
            Arg::new("page_size")
                .long("page-size")
                .value_parser(clap::value_parser!(usize))
                .default_value("100")
                .help("results printed per page"),
        )
        .arg(
            Arg::new("min_seq_size")
                .long("min-seq-size")
                .value_parser(clap::value_parser!(usize))
                .default_value("0")
                .help("drop records shorter than this many bases"),
        )
        .arg(
            Arg::new("csv")
                .long("csv")
                .help("dump the ranked results as csv in this file"),
        );
    //
    let list_cmd = Command::new("list")
        .about("list the sequence names of a fasta file")
        .arg(
            Arg::new("fasta")
                .long("fasta")
                .short('f')
                .required(true)
                .help("fasta file containing the named sequences"),
        );
    //
    let matches = Command::new("hapsim")
        .version("0.1.0")
        .about("haplotype similarity search")
        .subcommand_required(true)
        .subcommand(compare_cmd)
        .subcommand(list_cmd)
        .get_matches();
    //
    match matches.subcommand() {
        Some(("compare", sub_matches)) => parse_compare(sub_matches),
        Some(("list", sub_matches)) => parse_list(sub_matches),
        _ => {
            println!("expecting a compare or list subcommand");
            std::process::exit(1);
        }
    }
} // end of main
