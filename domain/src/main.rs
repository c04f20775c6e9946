use std::collections::BTreeMap;
use std::env;
use std::process;

use domain::random::{SeededRandom, ThreadRandom};
use domain::sanitize::{build_list, sanitize_keyword};
use domain::select::{select, Distribution};
use domain::{Keyword, RandomSource, RawWeight};

fn print_usage() {
    eprintln!(
        "{}\n\nUsage:\n  domain keyword <raw>\n  domain pick [--draws <n>] [--seed <s>] <url>[,<weight>]...\n\nNotes:\n  - Entries without a weight count as 0; when no weight is positive every URL is equally likely.",
        domain::about()
    );
}

fn run() -> Result<(), String> {
    let mut args = env::args().skip(1); // skip program name

    let Some(cmd) = args.next() else {
        print_usage();
        return Ok(());
    };

    match cmd.as_str() {
        "keyword" => {
            let Some(raw) = args.next() else {
                return Err("missing <raw> for keyword".into());
            };
            match sanitize_keyword(&raw) {
                Ok(k) => {
                    println!("{}", k);
                    Ok(())
                }
                Err(e) => Err(e.to_string()),
            }
        }
        "pick" => {
            let mut draws: Option<usize> = None;
            let mut seed: Option<u64> = None;
            let mut urls: Vec<String> = Vec::new();
            let mut weights: Vec<RawWeight> = Vec::new();

            // Parse simple flags: --draws <n>, --seed <s>; everything else is an entry
            let rest: Vec<String> = args.collect();
            let mut i = 0;
            while i < rest.len() {
                match rest[i].as_str() {
                    "--draws" => {
                        let val = rest.get(i + 1).ok_or("--draws requires a value")?;
                        draws = Some(val.parse().map_err(|_| format!("invalid --draws: {}", val))?);
                        i += 2;
                    }
                    "--seed" => {
                        let val = rest.get(i + 1).ok_or("--seed requires a value")?;
                        seed = Some(val.parse().map_err(|_| format!("invalid --seed: {}", val))?);
                        i += 2;
                    }
                    entry => {
                        match entry.rsplit_once(',') {
                            Some((url, w)) => {
                                urls.push(url.to_string());
                                weights.push(RawWeight::Text(w.to_string()));
                            }
                            _ => {
                                urls.push(entry.to_string());
                                weights.push(RawWeight::Missing);
                            }
                        }
                        i += 1;
                    }
                }
            }

            let keyword = Keyword::new("cli").map_err(|e| e.to_string())?;
            let list = build_list(keyword, &urls, &weights, true).map_err(|e| e.to_string())?;
            let rng: Box<dyn RandomSource> = match seed {
                Some(s) => Box::new(SeededRandom::new(s)),
                None => Box::new(ThreadRandom),
            };

            match draws {
                None => {
                    let url = select(list.entries(), rng.as_ref()).ok_or("nothing to select")?;
                    println!("{}", url);
                }
                Some(n) => {
                    let dist = Distribution::build(list.entries());
                    let shares = dist.shares(list.entries().len());
                    let mut counts: BTreeMap<usize, usize> = BTreeMap::new();
                    for _ in 0..n {
                        if let Some(idx) = dist.pick(rng.as_ref()) {
                            *counts.entry(idx).or_insert(0) += 1;
                        }
                    }
                    for (idx, entry) in list.entries().iter().enumerate() {
                        let hits = counts.get(&idx).copied().unwrap_or(0);
                        println!(
                            "{:>8} {:>7.2}% (configured {:>6.2}%)  {}",
                            hits,
                            hits as f64 * 100.0 / n.max(1) as f64,
                            shares[idx],
                            entry.url
                        );
                    }
                }
            }
            Ok(())
        }
        _ => {
            print_usage();
            Ok(())
        }
    }
}

fn main() {
    if let Err(msg) = run() {
        eprintln!("error: {}", msg);
        process::exit(1);
    }
}
