use clap::{Parser, Subcommand};
use mashaaer::config::Config;
use mashaaer::emotion::Emotion;
use mashaaer::error::{Error, Result};
use mashaaer::memory_indexer::SearchFilters;
use mashaaer::memory_store::MemoryRecord;
use mashaaer::persona::PersonaId;
use mashaaer::Mashaaer;
use std::path::PathBuf;
use tokio::io::{AsyncBufReadExt, BufReader};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Directory for JSON state, logs and the database.
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// TOML config file.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Interactive conversation. `/feedback <score>`, `/persona <name>`,
    /// `/status` and `/quit` are understood inside the loop.
    Chat {
        #[arg(long, default_value = "cli")]
        session: String,
    },
    /// Send one prompt through the provider waterfall.
    Ask {
        prompt: String,
        #[arg(long, default_value = "cli")]
        session: String,
    },
    /// Rate a persona.
    Feedback {
        #[arg(long)]
        persona: String,
        #[arg(long, conflicts_with = "negative")]
        positive: bool,
        #[arg(long)]
        negative: bool,
    },
    /// Search stored memories.
    Memories {
        #[arg(long, default_value = "")]
        query: String,
        #[arg(long)]
        emotion: Option<String>,
        #[arg(long, default_value_t = 10)]
        limit: usize,
    },
    Status,
    /// Consolidate memories and rebuild the index.
    Consolidate,
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn describe(record: &MemoryRecord) -> String {
    match record {
        MemoryRecord::Episodic(m) => format!(
            "[{}] {} ({}) {} -> {}",
            m.timestamp.format("%Y-%m-%d %H:%M"),
            m.id,
            m.emotion,
            m.input,
            m.response
        ),
        MemoryRecord::Semantic {
            category, key, value, ..
        } => format!("[fact] {}/{} = {}", category, key, value),
    }
}

async fn run_chat(app: &Mashaaer, session: &str) -> Result<()> {
    println!("مشاعر جاهز. /quit للخروج");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        if let Some(command) = line.strip_prefix('/') {
            let (name, arg) = command.split_once(' ').unwrap_or((command, ""));
            match name {
                "quit" | "exit" => break,
                "status" => print_json(&app.status())?,
                "persona" => {
                    if app.set_persona(arg.trim()) {
                        println!("✓ {}", arg.trim());
                    } else {
                        println!("✗ unknown persona: {}", arg.trim());
                    }
                }
                "feedback" => match arg.trim().parse::<f64>() {
                    Ok(score) => match app.feedback_last(session, score) {
                        Ok(()) => println!("✓ feedback {}", score),
                        Err(e) => println!("✗ {}", e),
                    },
                    Err(_) => println!("✗ usage: /feedback <score in [-1, 1]>"),
                },
                other => println!("✗ unknown command: /{}", other),
            }
            continue;
        }

        let response = app.chat(session, line).await?;
        println!(
            "[{} | {} | {}] {}",
            response.emotion.arabic(),
            response.dominant_persona,
            response.motivation_focus,
            response.text
        );
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = Config::load(args.config.as_deref())?;
    if let Some(dir) = args.data_dir {
        config.data_dir = dir;
    }
    let app = Mashaaer::open(config)?;

    match args.command {
        Command::Chat { session } => {
            let _consolidation = app.spawn_consolidation();
            run_chat(&app, &session).await?;
        }
        Command::Ask { prompt, session } => {
            let reply = app.generate(&session, &prompt).await;
            print_json(&reply)?;
        }
        Command::Feedback {
            persona,
            positive,
            negative,
        } => {
            let id = PersonaId::from_name(&persona)
                .ok_or_else(|| Error::InvalidFeedback(format!("unknown persona: {}", persona)))?;
            if positive == negative {
                return Err(Error::InvalidFeedback("pass exactly one of --positive or --negative".to_string()));
            }
            app.persona_feedback(id, positive);
            println!("✓ {} {}", id, if positive { "+" } else { "-" });
        }
        Command::Memories { query, emotion, limit } => {
            let emotion = match emotion {
                Some(label) => Some(
                    Emotion::from_label(&label)
                        .ok_or_else(|| Error::Other(format!("unknown emotion: {}", label)))?,
                ),
                None => None,
            };
            let filters = SearchFilters {
                emotion,
                ..SearchFilters::default()
            };
            let records = app.search_memories(&query, &filters, limit);
            if records.is_empty() {
                println!("No memories found");
            }
            for record in &records {
                println!("{}", describe(record));
            }
        }
        Command::Status => print_json(&app.status())?,
        Command::Consolidate => {
            let indexed = app.consolidate();
            println!("✓ consolidated, {} records indexed", indexed);
        }
    }

    Ok(())
}
