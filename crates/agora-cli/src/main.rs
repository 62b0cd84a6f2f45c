//! agora - Terminal client for the Agora game server.
//!
//! Authenticates, manages saved games, and runs the interactive play loop
//! with live streamed output.

use std::io::{self, BufRead, Write};
use std::process::ExitCode;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use log::debug;

use agora_client::protocol::NewGameRequest;
use agora_client::{ClientConfig, GameClient, MessageView, Speaker, TurnUpdate};

fn main() -> ExitCode {
    env_logger::init();
    if let Err(err) = try_main() {
        let _ = writeln!(io::stderr(), "Error: {err:?}");
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}

#[tokio::main]
async fn try_main() -> Result<()> {
    let Cli {
        server,
        username,
        password,
        command,
    } = Cli::parse();

    let mut config = ClientConfig::load(None).context("loading configuration")?;
    if let Some(server) = server {
        config.server_url = server;
    }
    debug!("using server {}", config.server_url);

    let mut client = GameClient::new(&config).context("building client")?;

    match command {
        Command::Register => {
            let (username, password) = credentials(username, password)?;
            client
                .register(&username, &password)
                .await
                .context("registering")?;
            println!("Account created. You are signed in as {username}.");
            Ok(())
        }
        Command::List => {
            sign_in(&mut client, username, password).await?;
            handle_list(&client).await
        }
        Command::New { theme, num_actors } => {
            sign_in(&mut client, username, password).await?;
            let seed = NewGameRequest { theme, num_actors };
            let session_id = client.new_game(seed).await.context("creating game")?;
            println!("Started game {session_id}.");
            play_loop(&mut client).await
        }
        Command::Play { session_id } => {
            sign_in(&mut client, username, password).await?;
            client
                .resume_game(&session_id)
                .await
                .context("resuming game")?;
            play_loop(&mut client).await
        }
    }
}

#[derive(Debug, Parser)]
#[command(
    name = "agora",
    author,
    version,
    about = "Terminal client for the Agora narrative game server."
)]
struct Cli {
    /// Game server URL (overrides config file)
    #[arg(long, short = 's', env = "AGORA_SERVER_URL")]
    server: Option<String>,

    /// Username to sign in with
    #[arg(long, short = 'u', env = "AGORA_USERNAME", global = true)]
    username: Option<String>,

    /// Password (read from stdin when omitted)
    #[arg(long, short = 'p', env = "AGORA_PASSWORD", global = true)]
    password: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Create an account
    Register,

    /// List saved games
    List,

    /// Start a new game and play it
    New {
        /// Seed theme for the scenario (max 200 characters)
        #[arg(long)]
        theme: Option<String>,

        /// Number of characters, 1-5
        #[arg(long)]
        num_actors: Option<u8>,
    },

    /// Resume a saved game and play it
    Play {
        /// Session identifier from `agora list`
        session_id: String,
    },
}

fn credentials(username: Option<String>, password: Option<String>) -> Result<(String, String)> {
    let Some(username) = username else {
        bail!("--username is required (or set AGORA_USERNAME)");
    };
    let password = match password {
        Some(p) => p,
        None => {
            print!("Password: ");
            io::stdout().flush().ok();
            let mut line = String::new();
            io::stdin().lock().read_line(&mut line)?;
            line.trim_end_matches(['\r', '\n']).to_string()
        }
    };
    if password.is_empty() {
        bail!("password must not be empty");
    }
    Ok((username, password))
}

async fn sign_in(
    client: &mut GameClient,
    username: Option<String>,
    password: Option<String>,
) -> Result<()> {
    let (username, password) = credentials(username, password)?;
    client
        .login(&username, &password)
        .await
        .context("signing in")?;
    Ok(())
}

async fn handle_list(client: &GameClient) -> Result<()> {
    let games = client.list_games().await.context("listing games")?;
    if games.is_empty() {
        println!("No saved games yet.");
        return Ok(());
    }
    for game in games {
        let title = game.title.as_deref().unwrap_or("(untitled)");
        match game.updated_at {
            Some(at) => println!("{}  {}  ({})", game.id, title, at.to_rfc3339()),
            None => println!("{}  {}", game.id, title),
        }
    }
    Ok(())
}

async fn play_loop(client: &mut GameClient) -> Result<()> {
    print_briefing(client);
    print_chat(client);

    let stdin = io::stdin();
    loop {
        if client.session_id().await.is_none() {
            println!("Session is gone; returning to the shell.");
            return Ok(());
        }
        let session = client.session();
        if session.game_finished {
            print_outcome(client);
            return Ok(());
        }
        println!(
            "\n[turn {}/{}] {}",
            session.turn_current,
            session.turn_max,
            if session.player_can_write() {
                "your move (/quit to leave)"
            } else {
                "press enter to let the story advance"
            }
        );
        print!("> ");
        io::stdout().flush().ok();

        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            return Ok(()); // EOF
        }
        let text = line.trim();
        if text == "/quit" {
            return Ok(());
        }
        if text.is_empty() {
            continue;
        }

        let mut printed = 0usize;
        let outcome = client
            .send_turn(text, |update| match update {
                TurnUpdate::StreamContent(content) => {
                    // Content only grows; print the new suffix.
                    print!("{}", &content[printed..]);
                    io::stdout().flush().ok();
                    printed = content.len();
                }
                TurnUpdate::Committed(message) => {
                    if printed > 0 {
                        println!();
                        printed = 0;
                    }
                    println!("{}: {}", message.author, message.content);
                }
                TurnUpdate::GameEnded(result) => {
                    if printed > 0 {
                        println!();
                        printed = 0;
                    }
                    println!("-- the game has ended: {} --", result.reason);
                }
                TurnUpdate::Error(message) => {
                    if printed > 0 {
                        println!();
                        printed = 0;
                    }
                    let _ = writeln!(io::stderr(), "! {message}");
                }
            })
            .await;
        if printed > 0 {
            println!();
        }
        if let Err(e) = outcome {
            let _ = writeln!(io::stderr(), "! turn failed: {e}");
        }
    }
}

fn print_briefing(client: &GameClient) {
    let context = &client.session().context;
    if !context.narrativa_inicial.is_empty() {
        println!("\n{}", context.narrativa_inicial);
    }
    if !context.player_mission.is_empty() {
        println!("\nYour mission: {}", context.player_mission);
    }
    if !context.characters.is_empty() {
        println!("\nCharacters:");
        for c in &context.characters {
            match &c.personality {
                Some(p) => println!("  {} - {}", c.name, p),
                None => println!("  {}", c.name),
            }
        }
    }
}

fn print_chat(client: &GameClient) {
    for view in client.session().visible_messages() {
        if let MessageView::Committed(m) = view {
            let prefix = match m.speaker {
                Speaker::System => "*",
                Speaker::Player => ">",
                Speaker::Agent => " ",
            };
            println!("{prefix} {}: {}", m.author, m.content);
        }
    }
}

fn print_outcome(client: &GameClient) {
    let session = client.session();
    println!("\n-- game over --");
    if let Some(result) = &session.result {
        println!("Reason: {}", result.reason);
        if let Some(evaluation) = &result.mission_evaluation {
            match serde_json::to_string_pretty(evaluation) {
                Ok(rendered) => println!("Mission evaluation:\n{rendered}"),
                Err(_) => println!("Mission evaluation: {evaluation}"),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parses_seeded_new_command() {
        let cli = Cli::try_parse_from([
            "agora",
            "--username",
            "ana",
            "--password",
            "pw",
            "new",
            "--theme",
            "Toledo",
            "--num-actors",
            "3",
        ])
        .unwrap();

        assert_eq!(cli.username.as_deref(), Some("ana"));
        match cli.command {
            Command::New { theme, num_actors } => {
                assert_eq!(theme.as_deref(), Some("Toledo"));
                assert_eq!(num_actors, Some(3));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_credentials_require_username_and_nonempty_password() {
        assert!(credentials(None, Some("pw".to_string())).is_err());
        assert!(credentials(Some("ana".to_string()), Some(String::new())).is_err());

        let (username, password) =
            credentials(Some("ana".to_string()), Some("pw".to_string())).unwrap();
        assert_eq!(username, "ana");
        assert_eq!(password, "pw");
    }
}
