//! SopCite — citation-backed retrieval over a library of lab SOPs.

use std::path::PathBuf;

use anyhow::Context;
use tracing::info;
use tracing_subscriber::EnvFilter;

use sopcite_core::{Chunk, Settings};
use sopcite_ingest::Ingester;
use sopcite_resolve::{build_index, compose_answer, eval, format_citation, Retriever};

/// Characters of chunk text shown per query hit.
const PREVIEW_CHARS: usize = 1500;

const USAGE: &str = "SopCite — citation-backed retrieval over lab SOPs

Usage: sopcite <command>

Commands:
  ingest [sops-dir]        Load markdown SOPs into docs.jsonl
  chunk                    Chunk docs.jsonl into chunks.jsonl
  index                    Embed chunks and build the vector index
  query <text> [--k N]     Retrieve and answer with citations
  eval <gold.jsonl>        Score retrieval against a gold question set
  help                     Show this help message

Configuration: sopcite.json (or $SOPCITE_CONFIG) plus SOPCITE_* overrides.
Logging: RUST_LOG (default info).";

#[derive(Debug, PartialEq)]
enum Command {
    Ingest { sops_dir: Option<PathBuf> },
    Chunk,
    Index,
    Query { text: String, k: Option<usize> },
    Eval { gold: PathBuf },
    Help,
}

fn parse_args(args: &[String]) -> Result<Command, String> {
    let Some(command) = args.first() else {
        return Ok(Command::Help);
    };
    let rest = &args[1..];

    match command.as_str() {
        "ingest" => Ok(Command::Ingest {
            sops_dir: rest.first().map(PathBuf::from),
        }),
        "chunk" => Ok(Command::Chunk),
        "index" => Ok(Command::Index),
        "query" => {
            let mut words = Vec::new();
            let mut k = None;
            let mut iter = rest.iter();
            while let Some(arg) = iter.next() {
                if arg == "--k" || arg == "-k" {
                    let value = iter.next().ok_or("--k needs a value")?;
                    let parsed: usize = value
                        .parse()
                        .map_err(|_| format!("--k expects a positive integer, got {:?}", value))?;
                    if parsed == 0 {
                        return Err("--k must be at least 1".into());
                    }
                    k = Some(parsed);
                } else {
                    words.push(arg.as_str());
                }
            }
            if words.is_empty() {
                return Err("Usage: sopcite query <text> [--k N]".into());
            }
            Ok(Command::Query {
                text: words.join(" "),
                k,
            })
        }
        "eval" => rest
            .first()
            .map(|p| Command::Eval { gold: PathBuf::from(p) })
            .ok_or_else(|| "Usage: sopcite eval <gold.jsonl>".to_string()),
        "--help" | "-h" | "help" => Ok(Command::Help),
        other => Err(format!("Unknown command: {}. Use 'sopcite help' for usage.", other)),
    }
}

fn open_retriever(settings: &Settings) -> anyhow::Result<Retriever> {
    let embedder =
        sopcite_infer::create_embedder(&settings.paths.models_dir, settings.embedding.dimension);
    Retriever::open(&settings.paths.index_dir, embedder)
        .with_context(|| "Failed to open index. Run: sopcite index")
}

fn preview(text: &str) -> &str {
    match text.char_indices().nth(PREVIEW_CHARS) {
        Some((end, _)) => &text[..end],
        None => text,
    }
}

fn run(command: Command, mut settings: Settings) -> anyhow::Result<()> {
    match command {
        Command::Help => println!("{}", USAGE),
        Command::Ingest { sops_dir } => {
            if let Some(dir) = sops_dir {
                settings.paths.sops_dir = dir;
            }
            settings.paths.ensure_dirs()?;
            let n = Ingester::new(&settings).ingest_documents()?;
            println!("Ingested {} documents", n);
        }
        Command::Chunk => {
            let report = Ingester::new(&settings).chunk_documents()?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Command::Index => {
            let chunks: Vec<Chunk> = sopcite_store::read_jsonl(&settings.paths.chunks_file())
                .with_context(|| "Failed to read chunks. Run: sopcite chunk")?;
            let embedder = sopcite_infer::create_embedder(
                &settings.paths.models_dir,
                settings.embedding.dimension,
            );
            let manifest = build_index(&chunks, embedder.as_ref(), &settings.paths.index_dir)?;
            println!(
                "Indexed {} chunks (dim={}, model={}) into {}",
                manifest.n_chunks,
                manifest.dim,
                manifest.embedding_model,
                settings.paths.index_dir.display()
            );
        }
        Command::Query { text, k } => {
            let retriever = open_retriever(&settings)?;
            let k = k.unwrap_or(settings.retrieval.top_k);
            let hits = retriever.search(&text, k)?;

            for hit in &hits {
                println!(
                    "\n#{} score={:.4} | {}\n",
                    hit.rank,
                    hit.score,
                    format_citation(&hit.chunk)
                );
                println!("{}", preview(&hit.chunk.text));
            }

            let answer = compose_answer(&text, &hits, settings.retrieval.no_answer_threshold);
            println!("\n{}", answer.text);
        }
        Command::Eval { gold } => {
            let records = eval::load_gold(&gold)
                .with_context(|| format!("Failed to read gold set {}", gold.display()))?;
            let retriever = open_retriever(&settings)?;
            let report = eval::evaluate(
                &retriever,
                &records,
                &eval::DEFAULT_KS,
                settings.retrieval.no_answer_threshold,
            )?;
            print!("{}", report);
        }
    }
    Ok(())
}

/// Runs `command`, loading settings only for commands that touch data.
fn dispatch(
    command: Command,
    load: impl FnOnce() -> sopcite_core::Result<Settings>,
) -> anyhow::Result<()> {
    if command == Command::Help {
        println!("{}", USAGE);
        return Ok(());
    }

    let settings = load()?;
    info!(
        "SOPs: {} | data: {}",
        settings.paths.sops_dir.display(),
        settings.paths.processed_dir.display()
    );
    run(command, settings)
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let command = match parse_args(&args) {
        Ok(command) => command,
        Err(message) => {
            eprintln!("{}", message);
            std::process::exit(2);
        }
    };

    dispatch(command, Settings::load)
}

#[cfg(test)]
mod tests {
    use super::*;
    use sopcite_core::DataPaths;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_parse_commands() {
        assert_eq!(parse_args(&[]), Ok(Command::Help));
        assert_eq!(parse_args(&args(&["chunk"])), Ok(Command::Chunk));
        assert_eq!(
            parse_args(&args(&["ingest", "sops"])),
            Ok(Command::Ingest {
                sops_dir: Some(PathBuf::from("sops"))
            })
        );
        assert_eq!(
            parse_args(&args(&["eval", "gold.jsonl"])),
            Ok(Command::Eval {
                gold: PathBuf::from("gold.jsonl")
            })
        );
    }

    #[test]
    fn test_parse_query() {
        assert_eq!(
            parse_args(&args(&["query", "how", "to", "thaw", "--k", "3"])),
            Ok(Command::Query {
                text: "how to thaw".into(),
                k: Some(3)
            })
        );
        assert_eq!(
            parse_args(&args(&["query", "trypan blue"])),
            Ok(Command::Query {
                text: "trypan blue".into(),
                k: None
            })
        );
    }

    #[test]
    fn test_parse_errors() {
        assert!(parse_args(&args(&["query"])).is_err());
        assert!(parse_args(&args(&["query", "x", "--k"])).is_err());
        assert!(parse_args(&args(&["query", "x", "--k", "zero"])).is_err());
        assert!(parse_args(&args(&["query", "x", "--k", "0"])).is_err());
        assert!(parse_args(&args(&["eval"])).is_err());
        assert!(parse_args(&args(&["serve"])).is_err());
    }

    #[test]
    fn test_preview_respects_char_boundaries() {
        let text = "é".repeat(PREVIEW_CHARS + 10);
        assert_eq!(preview(&text).chars().count(), PREVIEW_CHARS);
        assert_eq!(preview("short"), "short");
    }

    #[test]
    fn test_help_skips_settings() {
        let broken = || -> sopcite_core::Result<Settings> {
            Err(sopcite_core::Error::Config("bad sopcite.json".into()))
        };
        assert!(dispatch(Command::Help, broken).is_ok());
        assert!(dispatch(Command::Chunk, broken).is_err());
    }

    #[test]
    fn test_full_pipeline() {
        let dir = tempfile::tempdir().unwrap();
        let sops = dir.path().join("sops");
        std::fs::create_dir_all(&sops).unwrap();
        std::fs::write(
            sops.join("sop-tc-002-counting.md"),
            "# Counting cells\n# QC\nMix ten microlitres of suspension with trypan blue and count live cells on the hemocytometer grid.\n",
        )
        .unwrap();

        let settings = Settings {
            paths: DataPaths::under(&dir.path().join("data"), sops),
            ..Default::default()
        };

        run(Command::Ingest { sops_dir: None }, settings.clone()).unwrap();
        run(Command::Chunk, settings.clone()).unwrap();
        run(Command::Index, settings.clone()).unwrap();
        assert!(settings.paths.index_dir.join("manifest.json").exists());

        run(
            Command::Query {
                text: "trypan blue count".into(),
                k: Some(1),
            },
            settings.clone(),
        )
        .unwrap();

        let gold = dir.path().join("gold.jsonl");
        std::fs::write(
            &gold,
            r#"{"query":"trypan blue count","expected":[{"doc_id":"sop-tc-002","section":"QC"}]}"#,
        )
        .unwrap();
        run(Command::Eval { gold }, settings).unwrap();
    }
}
