//! Run a guarded mock interview in the terminal.
//!
//! Reads the API key from the `OPENAI_API_KEY` environment variable.
//!
//! # Examples
//!
//! ```sh
//! # Job description from a file
//! rehearse --jd job.txt --difficulty hard --persona strict
//!
//! # Paste the job description, end it with a `/done` line, then answer
//! rehearse --persona friendly
//!
//! # No job description: an empty `/done` starts a general Python interview
//! rehearse --role python
//! ```
//!
//! Each line typed is one answer. `/eval` asks for a structured evaluation
//! of the last answer and `/quit` ends the interview with a summary.

use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::process;

use clap::Parser;
use rehearse::prelude::*;

/// Practice a job interview against an LLM interviewer.
///
/// Reads the API key from the OPENAI_API_KEY environment variable.
#[derive(Parser)]
#[command(name = "rehearse", version)]
struct Cli {
    /// File holding the job description (read from stdin up to a `/done` line if omitted)
    #[arg(long)]
    jd: Option<PathBuf>,

    /// Configuration file (defaults to ./rehearse.toml when present)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Question depth: easy, medium or hard
    #[arg(long, default_value = "medium")]
    difficulty: Difficulty,

    /// Interviewer tone: friendly, neutral or strict
    #[arg(long, default_value = "neutral")]
    persona: Persona,

    /// Interviewer preset: general, ai/ml, python, javascript, java or "prompt engineer"
    #[arg(long, default_value = "general")]
    role: Role,

    /// Override the configured chat model
    #[arg(long)]
    model: Option<String>,

    /// Log filter used when RUST_LOG is unset
    #[arg(long, default_value = "warn")]
    log: String,
}

const END_OF_JD: &str = "/done";

fn read_job_description(
    cli: &Cli,
    lines: &mut impl Iterator<Item = io::Result<String>>,
) -> Result<String, String> {
    if let Some(path) = &cli.jd {
        return std::fs::read_to_string(path)
            .map_err(|e| format!("failed to read {}: {e}", path.display()));
    }
    eprintln!("Paste the job description (optional), then a line with {END_OF_JD}:");
    let mut buf = String::new();
    for line in lines {
        let line = line.map_err(|e| format!("failed to read stdin: {e}"))?;
        if line.trim() == END_OF_JD {
            break;
        }
        buf.push_str(&line);
        buf.push('\n');
    }
    Ok(buf)
}

fn prompt() -> Result<(), String> {
    print!("\nyou> ");
    io::stdout()
        .flush()
        .map_err(|e| format!("failed to flush stdout: {e}"))
}

fn print_summary(session: &InterviewSession) {
    let perf = session.performance();
    println!("\n── Summary ──");
    println!("Questions scored: {}", perf.questions);
    match perf.average {
        Some(avg) => println!("Average score: {avg:.2}/5"),
        None => println!("Average score: n/a"),
    }
    println!("Requests used: {}", session.request_count());
    println!("{}", session.usage().summary());
}

async fn run(cli: Cli) -> Result<(), String> {
    let mut config = AppConfig::load_or_default(cli.config.as_deref())?;
    if let Some(model) = &cli.model {
        config.provider.model = model.clone();
    }
    let api_key = rehearse::api_key_from_env()?;
    let client = OpenAiClient::from_config(api_key, &config)?;
    let interviewer = Interviewer::new(&client, &config);
    let mut session = InterviewSession::new();

    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();

    let job_description = read_job_description(&cli, &mut lines)?;
    if job_description.trim().is_empty() {
        println!("No job description, starting a {} interview.\n", cli.role);
    } else {
        let strategy = interviewer
            .analyze_job_description(&mut session, &job_description)
            .await
            .map_err(|e| e.to_string())?;
        println!("── Interview strategy ──\n{strategy}\n");
    }

    let settings = InterviewSettings {
        difficulty: cli.difficulty,
        persona: cli.persona,
        role: cli.role,
    };
    let first = interviewer
        .start_interview(&mut session, settings)
        .await
        .map_err(|e| e.to_string())?;
    println!("interviewer> {first}");

    prompt()?;
    for line in lines {
        let line = line.map_err(|e| format!("failed to read answer: {e}"))?;
        match line.trim() {
            "/quit" => break,
            "" => {}
            "/eval" => match interviewer.evaluate_last_answer(&mut session).await {
                Ok(eval) => {
                    println!("evaluation> {}/5 {}", eval.score, eval.summary);
                    for s in &eval.strengths {
                        println!("  + {s}");
                    }
                    for w in &eval.weaknesses {
                        println!("  - {w}");
                    }
                }
                Err(e) => eprintln!("{e}"),
            },
            answer => match interviewer.submit_answer(&mut session, answer).await {
                Ok(TurnOutcome::Accepted { reply, score, .. }) => {
                    println!("interviewer> {reply}");
                    if let Some(score) = score {
                        let avg = session.performance().average.unwrap_or_default();
                        println!("[score {score}/5, average {avg:.2}]");
                    }
                }
                Ok(TurnOutcome::Rejected { rejection }) => {
                    println!("guard> {rejection}");
                    if matches!(rejection, Rejection::RateLimited { .. }) {
                        break;
                    }
                }
                Err(e) => eprintln!("Error: {e}"),
            },
        }
        prompt()?;
    }

    print_summary(&session);
    Ok(())
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(&cli.log);

    if let Err(e) = run(cli).await {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}
