use std::fmt;

use chrono::{DateTime, Utc};
use millionaire_core::model::{QuestionDraft, User, levels};
use storage::repository::{Storage, StorageError};

/// One real question per level; extra copies per level are numbered variants.
const BANK: [(&str, &str, [&str; 3]); 15] = [
    ("How many legs does a spider have?", "Eight", ["Six", "Ten", "Four"]),
    ("Which colour do you get by mixing blue and yellow?", "Green", ["Purple", "Orange", "Brown"]),
    ("What is the capital of France?", "Paris", ["Lyon", "Marseille", "Nice"]),
    ("Which planet is known as the Red Planet?", "Mars", ["Venus", "Jupiter", "Mercury"]),
    ("How many minutes are in a day?", "1440", ["1240", "1400", "1600"]),
    ("Which gas do plants absorb from the air?", "Carbon dioxide", ["Oxygen", "Nitrogen", "Helium"]),
    ("Who painted the Mona Lisa?", "Leonardo da Vinci", ["Michelangelo", "Raphael", "Donatello"]),
    ("What is the chemical symbol for gold?", "Au", ["Ag", "Gd", "Go"]),
    ("In which year did the Berlin Wall fall?", "1989", ["1987", "1991", "1985"]),
    ("What is the largest ocean on Earth?", "Pacific", ["Atlantic", "Indian", "Arctic"]),
    ("Which element has atomic number 1?", "Hydrogen", ["Helium", "Lithium", "Oxygen"]),
    ("What is the smallest prime number greater than 90?", "97", ["91", "93", "99"]),
    ("Which composer wrote the opera 'The Magic Flute'?", "Mozart", ["Beethoven", "Haydn", "Wagner"]),
    ("What is the hardest natural mineral on the Mohs scale?", "Diamond", ["Corundum", "Topaz", "Quartz"]),
    ("Which mathematician proved Fermat's Last Theorem?", "Andrew Wiles", ["Pierre de Fermat", "Carl Gauss", "Leonhard Euler"]),
];

#[derive(Debug, Clone)]
struct Args {
    db_url: String,
    per_level: u32,
    user: Option<String>,
    now: Option<DateTime<Utc>>,
}

#[derive(Debug)]
enum ArgsError {
    MissingValue { flag: &'static str },
    UnknownArg(String),
    InvalidPerLevel { raw: String },
    InvalidDbUrl { raw: String },
    InvalidNow { raw: String },
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
            ArgsError::InvalidPerLevel { raw } => write!(f, "invalid --per-level value: {raw}"),
            ArgsError::InvalidDbUrl { raw } => write!(f, "invalid --db value: {raw}"),
            ArgsError::InvalidNow { raw } => {
                write!(f, "invalid --now value (expected RFC3339): {raw}")
            }
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

impl Args {
    fn parse() -> Result<Self, ArgsError> {
        let mut db_url = std::env::var("MILLIONAIRE_DB_URL")
            .unwrap_or_else(|_| "sqlite:millionaire.sqlite3?mode=rwc".into());
        let mut per_level = std::env::var("MILLIONAIRE_SEED_PER_LEVEL")
            .ok()
            .and_then(|value| value.parse::<u32>().ok())
            .unwrap_or(3);
        let mut user = std::env::var("MILLIONAIRE_USER").ok();
        let mut now: Option<DateTime<Utc>> = None;

        let mut args = std::env::args().skip(1);
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--db" => {
                    let value = require_value(&mut args, "--db")?;
                    if value.trim().is_empty() {
                        return Err(ArgsError::InvalidDbUrl { raw: value });
                    }
                    db_url = value;
                }
                "--per-level" => {
                    let value = require_value(&mut args, "--per-level")?;
                    per_level = value
                        .parse::<u32>()
                        .ok()
                        .filter(|n| *n > 0)
                        .ok_or_else(|| ArgsError::InvalidPerLevel { raw: value.clone() })?;
                }
                "--user" => {
                    user = Some(require_value(&mut args, "--user")?);
                }
                "--now" => {
                    let value = require_value(&mut args, "--now")?;
                    let parsed = DateTime::parse_from_rfc3339(&value)
                        .map_err(|_| ArgsError::InvalidNow { raw: value.clone() })?
                        .with_timezone(&Utc);
                    now = Some(parsed);
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
            per_level,
            user,
            now,
        })
    }
}

fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  cargo run -p storage --bin seed -- [options]");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --db <sqlite_url>         SQLite URL (default: sqlite:millionaire.sqlite3?mode=rwc)");
    eprintln!("  --per-level <n>           Questions to add per level (default: 3)");
    eprintln!("  --user <name>             Also register this player if missing");
    eprintln!("  --now <rfc3339>           Fixed current time for deterministic seeding");
    eprintln!("  -h, --help                Show this help");
    eprintln!();
    eprintln!("Environment (same as flags):");
    eprintln!("  MILLIONAIRE_DB_URL, MILLIONAIRE_SEED_PER_LEVEL, MILLIONAIRE_USER");
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse().map_err(|e| {
        eprintln!("{e}");
        print_usage();
        e
    })?;

    let storage = Storage::sqlite(&args.db_url).await?;
    let now = args.now.unwrap_or_else(Utc::now);

    for level in levels() {
        let (text, correct, wrong) = BANK[usize::from(level)];
        for n in 0..args.per_level {
            let text = if n == 0 {
                text.to_owned()
            } else {
                format!("{text} (variant {})", n + 1)
            };
            let question = QuestionDraft::new(level, text, correct, wrong).validate()?;
            storage.questions.insert_question(question).await?;
        }
    }

    if let Some(name) = args.user.as_deref() {
        let name = User::validate_name(name)?;
        match storage.users.create_user(&name, now).await {
            Ok(user) => println!("Registered player {} with id {}", user.name(), user.id()),
            Err(StorageError::Conflict) => println!("Player {name} already exists"),
            Err(err) => return Err(err.into()),
        }
    }

    let counts = storage.questions.count_by_level().await?;
    let total: u64 = counts.values().sum();
    println!(
        "Seeded {} questions per level; bank now holds {total} questions in {}",
        args.per_level, args.db_url
    );

    Ok(())
}

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        eprintln!("{err}");
        std::process::exit(2);
    }
}
