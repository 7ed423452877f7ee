//! Kestrel command implementations

use anyhow::{Context, Result};
use std::io::Write;

use kestrel_agent::{AgentLoop, StopReason};
use kestrel_config::{self, Config};
use kestrel_provider::OpenAiProvider;

/// Initialize config and workspace
pub async fn init_command() -> Result<()> {
    println!("Initializing kestrel...");

    let config = kestrel_config::init().await?;

    let workspace = config.workspace_path();
    tokio::fs::create_dir_all(&workspace).await?;

    println!("Workspace: {}", workspace.display());
    println!("\nNext steps:");
    println!(
        "  1. Add your API key to {}",
        kestrel_config::config_path().display()
    );
    println!("  2. Start chatting: kestrel chat -m \"Hello!\"");

    Ok(())
}

/// Chat with the agent, one-shot or interactive
pub async fn chat_command(message: Option<String>) -> Result<()> {
    let config = Config::load().await?;

    let api_key = config.api_key().with_context(|| {
        format!(
            "no API key configured; set one in {}",
            kestrel_config::config_path().display()
        )
    })?;
    let provider = OpenAiProvider::new(api_key, config.api_base(), Some(config.default_model()));

    let mut agent = AgentLoop::from_config(provider, &config);

    if let Some(msg) = message {
        let outcome = agent.run(&msg).await?;
        print_outcome(&outcome);
        return Ok(());
    }

    println!("Interactive mode (type 'exit' to quit)");
    println!("Commands: reset, status, files");
    println!("----------------------------------------");

    loop {
        print!("> ");
        std::io::stdout().flush()?;

        let mut input = String::new();
        if std::io::stdin().read_line(&mut input)? == 0 {
            break;
        }

        let input = input.trim();
        if input.is_empty() {
            continue;
        }
        match input {
            "exit" | "quit" => break,
            "reset" => {
                agent.context_mut().clear();
                println!("Conversation reset\n");
                continue;
            }
            "status" => {
                println!("model: {}", config.default_model());
                println!("log entries: {}", agent.context().log().len());
                println!("tracked files: {}\n", agent.context().file_count());
                continue;
            }
            "files" => {
                println!("{}\n", agent.context().files_summary());
                continue;
            }
            _ => {}
        }

        match agent.run(input).await {
            Ok(outcome) => print_outcome(&outcome),
            Err(e) => eprintln!("Error: {:#}\n", e),
        }
    }

    println!("Goodbye!");
    Ok(())
}

fn print_outcome(outcome: &kestrel_agent::RunOutcome) {
    match outcome.reason {
        StopReason::Done => println!("\n{}\n", outcome.answer),
        StopReason::BudgetExhausted => {
            println!(
                "\n[stopped: iteration budget of {} exhausted]\n{}\n",
                outcome.iterations, outcome.answer
            )
        }
        StopReason::Cancelled => println!("\n[cancelled]\n"),
    }
}

/// Show configuration and capability status
pub async fn status_command() -> Result<()> {
    let config = Config::load().await?;

    println!("Kestrel status");
    println!("----------------------------------------");
    println!("config:    {}", kestrel_config::config_path().display());
    println!("workspace: {}", config.workspace_path().display());
    println!("model:     {}", config.default_model());
    println!(
        "api key:   {}",
        if config.api_key().is_some() {
            "[set]"
        } else {
            "[not set]"
        }
    );
    println!("iteration budget: {}", config.max_tool_iterations());

    println!("allowed roots:");
    for root in config.allowed_roots() {
        println!("  - {}", root.display());
    }

    Ok(())
}
