use std::fmt;
use std::io::{BufRead, Write};

use millionaire_core::help::HelpType;
use millionaire_core::model::{AnswerKey, Game, GameId, UserId};
use millionaire_core::rules::{DEFAULT_TIME_LIMIT_MINUTES, GameRules};
use services::{AppServices, Clock, GameService, GameServiceError, GameView};

mod render;

#[derive(Debug)]
enum ArgsError {
    MissingValue { flag: &'static str },
    UnknownArg(String),
    InvalidDbUrl { raw: String },
    InvalidTimeLimit { raw: String },
    InvalidSeed { raw: String },
    InvalidLimit { raw: String },
    MissingUser,
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
            ArgsError::InvalidDbUrl { raw } => write!(f, "invalid --db value: {raw}"),
            ArgsError::InvalidTimeLimit { raw } => {
                write!(f, "invalid --time-limit-mins value: {raw}")
            }
            ArgsError::InvalidSeed { raw } => write!(f, "invalid --seed value: {raw}"),
            ArgsError::InvalidLimit { raw } => write!(f, "invalid --limit value: {raw}"),
            ArgsError::MissingUser => write!(f, "--user (or MILLIONAIRE_USER) is required"),
        }
    }
}

impl std::error::Error for ArgsError {}

fn require_value(
    args: &mut impl Iterator<Item = String>,
    flag: &'static str,
) -> Result<String, ArgsError> {
    args.next().ok_or(ArgsError::MissingValue { flag })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Play,
    History,
    Leaderboard,
}

impl Command {
    fn from_arg(arg: &str) -> Option<Self> {
        match arg {
            "play" => Some(Self::Play),
            "history" => Some(Self::History),
            "leaderboard" => Some(Self::Leaderboard),
            _ => None,
        }
    }
}

struct Args {
    db_url: String,
    user: Option<String>,
    time_limit_mins: u32,
    seed: Option<u64>,
    limit: u32,
}

fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  cargo run -p app -- play        [--db <url>] [--user <name>] [--time-limit-mins <n>] [--seed <u64>]");
    eprintln!("  cargo run -p app -- history     [--db <url>] --user <name> [--limit <n>]");
    eprintln!("  cargo run -p app -- leaderboard [--db <url>] [--limit <n>]");
    eprintln!();
    eprintln!("Defaults:");
    eprintln!("  --db sqlite:millionaire.sqlite3");
    eprintln!("  --time-limit-mins {DEFAULT_TIME_LIMIT_MINUTES}");
    eprintln!("  --limit 10");
    eprintln!();
    eprintln!("Environment:");
    eprintln!("  MILLIONAIRE_DB_URL, MILLIONAIRE_USER, MILLIONAIRE_TIME_LIMIT_MINS, RUST_LOG");
}

impl Args {
    fn parse(args: &mut impl Iterator<Item = String>) -> Result<Self, ArgsError> {
        let mut db_url = normalize_sqlite_url(
            std::env::var("MILLIONAIRE_DB_URL")
                .unwrap_or_else(|_| "sqlite:millionaire.sqlite3".into()),
        );
        let mut user = std::env::var("MILLIONAIRE_USER").ok();
        let mut time_limit_mins = std::env::var("MILLIONAIRE_TIME_LIMIT_MINS")
            .ok()
            .and_then(|value| value.parse::<u32>().ok())
            .filter(|n| *n > 0)
            .unwrap_or_else(default_time_limit);
        let mut seed = None;
        let mut limit = 10;

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--db" => {
                    let value = require_value(args, "--db")?;
                    if value.trim().is_empty() {
                        return Err(ArgsError::InvalidDbUrl { raw: value });
                    }
                    db_url = normalize_sqlite_url(value);
                }
                "--user" => {
                    user = Some(require_value(args, "--user")?);
                }
                "--time-limit-mins" => {
                    let value = require_value(args, "--time-limit-mins")?;
                    time_limit_mins = value
                        .parse::<u32>()
                        .ok()
                        .filter(|n| *n > 0)
                        .ok_or_else(|| ArgsError::InvalidTimeLimit { raw: value.clone() })?;
                }
                "--seed" => {
                    let value = require_value(args, "--seed")?;
                    seed = Some(
                        value
                            .parse::<u64>()
                            .map_err(|_| ArgsError::InvalidSeed { raw: value.clone() })?,
                    );
                }
                "--limit" => {
                    let value = require_value(args, "--limit")?;
                    limit = value
                        .parse::<u32>()
                        .map_err(|_| ArgsError::InvalidLimit { raw: value.clone() })?;
                }
                "--help" | "-h" => {
                    print_usage();
                    std::process::exit(0);
                }
                _ => return Err(ArgsError::UnknownArg(arg)),
            }
        }

        Ok(Self {
            db_url,
            user,
            time_limit_mins,
            seed,
            limit,
        })
    }
}

fn default_time_limit() -> u32 {
    u32::try_from(DEFAULT_TIME_LIMIT_MINUTES).unwrap_or(35)
}

fn normalize_sqlite_url(raw: String) -> String {
    if raw == "sqlite::memory:" || raw.starts_with("sqlite://") {
        return raw;
    }

    let trimmed = raw.trim().to_string();
    let path_str = trimmed
        .strip_prefix("sqlite:")
        .unwrap_or(trimmed.as_str())
        .to_string();
    let path = std::path::Path::new(&path_str);
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .unwrap_or_else(|_| std::path::PathBuf::from("."))
            .join(path)
    };
    format!("sqlite://{}", absolute.display())
}

fn prepare_sqlite_file(db_url: &str) -> Result<(), Box<dyn std::error::Error>> {
    if db_url == "sqlite::memory:" {
        return Ok(());
    }

    let path = db_url
        .strip_prefix("sqlite://")
        .ok_or_else(|| ArgsError::InvalidDbUrl {
            raw: db_url.to_string(),
        })?;
    let path = path.split('?').next().unwrap_or(path);
    if path.is_empty() {
        return Err(ArgsError::InvalidDbUrl {
            raw: db_url.to_string(),
        }
        .into());
    }

    let path = std::path::Path::new(path);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    if !path.exists() {
        std::fs::OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(path)?;
    }

    Ok(())
}

/// What the player typed at the prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Move {
    Answer(AnswerKey),
    Help(HelpType),
    TakeMoney,
    Quit,
    Invalid(String),
}

fn parse_move(line: &str) -> Option<Move> {
    let input = line.trim().to_ascii_lowercase();
    match input.as_str() {
        "" => None,
        "stop" | "take" | "cash" => Some(Move::TakeMoney),
        "quit" | "exit" => Some(Move::Quit),
        "50" | "50/50" | "fifty" => Some(Move::Help(HelpType::FiftyFifty)),
        "audience" => Some(Move::Help(HelpType::AudienceHelp)),
        "friend" | "call" => Some(Move::Help(HelpType::FriendCall)),
        other => Some(if let Ok(key) = other.parse::<AnswerKey>() {
            Move::Answer(key)
        } else if let Ok(help) = other.parse::<HelpType>() {
            Move::Help(help)
        } else {
            Move::Invalid(other.to_owned())
        }),
    }
}

fn prompt(question: &str) -> std::io::Result<Option<String>> {
    print!("{question}");
    std::io::stdout().flush()?;
    let mut line = String::new();
    let read = std::io::stdin().lock().read_line(&mut line)?;
    Ok((read > 0).then_some(line))
}

async fn resume_or_start(
    games: &GameService,
    user_id: UserId,
) -> Result<Game, GameServiceError> {
    match games.create_game(user_id).await {
        Err(GameServiceError::GameInProgress(id)) => {
            println!("Resuming game {id}.");
            games.get_game(id, user_id).await
        }
        other => other,
    }
}

async fn play(app: &AppServices, user_id: UserId) -> Result<(), Box<dyn std::error::Error>> {
    let games = app.games();
    let clock = games.clock();
    let game = resume_or_start(&games, user_id).await?;
    let game_id: GameId = game.id();
    let mut view = GameView::from_game(&game, clock.now());

    while !view.status.is_terminal() {
        print!("{}", render::ladder(&view)?);
        print!("{}", render::question(&view)?);
        let Some(line) = prompt("Answer a-d, 50/50, audience, friend, stop or quit: ")? else {
            break;
        };
        let Some(mv) = parse_move(&line) else {
            continue;
        };

        let step = match mv {
            Move::Answer(key) => games.answer(game_id, user_id, key.as_str()).await.map(|outcome| {
                if outcome.answered_correctly() && outcome.result().is_none() {
                    println!("Correct!");
                }
            }),
            Move::Help(help) => games.use_help(game_id, user_id, help).await.map(|_| ()),
            Move::TakeMoney => games.take_money(game_id, user_id).await.map(|_| ()),
            Move::Quit => {
                println!("Game {game_id} stays open; run play again to resume.");
                return Ok(());
            }
            Move::Invalid(input) => {
                println!("Not a move: {input:?}");
                continue;
            }
        };
        if let Err(err) = step {
            match err {
                GameServiceError::Game(err) => println!("{err}"),
                other => return Err(other.into()),
            }
        }

        let game = games.get_game(game_id, user_id).await?;
        view = GameView::from_game(&game, clock.now());
    }

    print!("{}", render::outcome(&view)?);
    let user = app.users().get_user(user_id).await?;
    println!("{} now has {} in total.", user.name(), user.balance());
    Ok(())
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let mut argv: Vec<String> = std::env::args().skip(1).collect();

    let cmd = match argv.first().map(String::as_str) {
        None => Command::Play,
        Some("--help" | "-h") => {
            print_usage();
            return Ok(());
        }
        Some(first) if first.starts_with("--") => Command::Play,
        Some(first) => Command::from_arg(first).ok_or_else(|| {
            eprintln!("unknown subcommand: {first}");
            print_usage();
            std::io::Error::new(std::io::ErrorKind::InvalidInput, "unknown subcommand")
        })?,
    };
    if !argv.is_empty() && !argv[0].starts_with("--") {
        argv.remove(0);
    }

    let parsed = Args::parse(&mut argv.into_iter()).map_err(|e| {
        eprintln!("{e}");
        print_usage();
        e
    })?;

    prepare_sqlite_file(&parsed.db_url)?;
    let rules = GameRules::with_time_limit_minutes(parsed.time_limit_mins)?;
    let app = AppServices::new_sqlite(&parsed.db_url, Clock::system(), rules, parsed.seed).await?;
    log::info!("using database {}", parsed.db_url);

    match cmd {
        Command::Play => {
            let name = match parsed.user {
                Some(name) => name,
                None => prompt("Your name: ")?.ok_or(ArgsError::MissingUser)?,
            };
            let user = app.users().get_or_register(&name).await?;
            println!("Welcome, {}! Balance: {}", user.name(), user.balance());
            play(&app, user.id()).await
        }
        Command::History => {
            let name = parsed.user.ok_or(ArgsError::MissingUser)?;
            let user = app.users().get_or_register(&name).await?;
            let games = app.games().games_for_user(user.id(), parsed.limit).await?;
            if games.is_empty() {
                println!("{} has not played yet.", user.name());
            }
            for game in &games {
                println!("{}", render::history_line(game));
            }
            Ok(())
        }
        Command::Leaderboard => {
            let users = app.users().leaderboard(parsed.limit).await?;
            for (idx, user) in users.iter().enumerate() {
                println!("{}", render::leaderboard_line(idx + 1, user));
            }
            Ok(())
        }
    }
}

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    if let Err(err) = run().await {
        eprintln!("{err}");
        std::process::exit(2);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn moves_parse_case_insensitively() {
        assert_eq!(parse_move(" B \n"), Some(Move::Answer(AnswerKey::B)));
        assert_eq!(parse_move("50/50"), Some(Move::Help(HelpType::FiftyFifty)));
        assert_eq!(
            parse_move("audience_help"),
            Some(Move::Help(HelpType::AudienceHelp))
        );
        assert_eq!(parse_move("Friend"), Some(Move::Help(HelpType::FriendCall)));
        assert_eq!(parse_move("stop"), Some(Move::TakeMoney));
        assert_eq!(parse_move("   "), None);
        assert!(!matches!(parse_move("ausience"), Some(Move::Answer(_))));
    }

    #[test]
    fn typos_are_never_submitted_as_answers() {
        for typo in ["ausience", "help", "fiftyfifty", "e", "ab"] {
            assert_eq!(parse_move(typo), Some(Move::Invalid(typo.into())));
        }
    }

    #[test]
    fn relative_sqlite_urls_become_absolute() {
        let url = normalize_sqlite_url("sqlite:game.db".into());
        assert!(url.starts_with("sqlite://"));
        assert!(url.ends_with("game.db"));
        assert_eq!(normalize_sqlite_url("sqlite::memory:".into()), "sqlite::memory:");
    }
}
