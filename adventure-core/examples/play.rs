//! Terminal playthrough driver for the adventure engine.
//!
//! Reads a theme and choices from stdin and prints the story as it grows.
//! Requires REPLICATE_API_TOKEN (a .env file works).

use std::io::{self, BufRead, Write};

use adventure_core::{ChoiceLabel, GamePhase, StoryEngine};

fn prompt_line(question: &str) -> io::Result<String> {
    print!("{question} ");
    io::stdout().flush()?;
    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;
    Ok(line.trim().to_string())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let _ = dotenvy::dotenv();
    let engine = StoryEngine::from_env()?;

    println!("=== Interactive Text Adventure ===\n");
    let theme = loop {
        let theme = prompt_line("What story do you want to live today?")?;
        if !theme.is_empty() {
            break theme;
        }
        println!("A theme is required.");
    };

    println!("\nWriting the opening...");
    engine.start(&theme).await?;

    loop {
        let view = engine.view();

        if let Some(error) = &view.error {
            println!("\nSomething went wrong: {error}");
            let answer = prompt_line("Try again? (y/n)")?;
            if answer.eq_ignore_ascii_case("y") {
                println!("Retrying...");
                engine.retry().await?;
                continue;
            }
            return Ok(());
        }

        if view.phase == GamePhase::Ended {
            println!("\n--- Epilogue ---\n{}\n", view.ending);
            println!("The adventure is over. Thanks for playing!");
            return Ok(());
        }

        println!("\n[Act {} / 3 - Turn {}]", view.act, view.turn);
        println!("\n{}\n", view.story);
        for choice in &view.choices {
            println!("  {}) {}", choice.label, choice.desc);
        }

        let label: ChoiceLabel = loop {
            let answer = prompt_line("Your choice (A/B/C):")?;
            match answer.parse() {
                Ok(label) => break label,
                Err(()) => println!("Please answer A, B, or C."),
            }
        };

        println!("\nWriting the next chapter...");
        engine.choose(label).await?;
    }
}
