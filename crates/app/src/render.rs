use std::fmt::{self, Write};

use millionaire_core::model::{Game, GameStatus, User};
use services::GameView;

pub fn ladder(view: &GameView) -> Result<String, fmt::Error> {
    let mut out = String::new();
    for step in view.ladder.iter().rev() {
        let marker = if step.current {
            ">"
        } else if step.cleared {
            "*"
        } else {
            " "
        };
        let checkpoint = if step.checkpoint { " (checkpoint)" } else { "" };
        writeln!(
            out,
            "{marker} {:>2}  {:>9}{checkpoint}",
            step.level + 1,
            step.prize
        )?;
    }
    Ok(out)
}

pub fn question(view: &GameView) -> Result<String, fmt::Error> {
    let mut out = String::new();
    let Some(question) = &view.question else {
        return Ok(out);
    };
    writeln!(out, "Question {}: {}", question.level + 1, question.text)?;
    for option in &question.options {
        writeln!(out, "  {}) {}", option.key.as_upper(), option.text)?;
    }
    if let Some(votes) = &question.audience_help {
        let parts: Vec<String> = votes
            .iter()
            .map(|(key, pct)| format!("{}: {pct}%", key.as_upper()))
            .collect();
        writeln!(out, "Audience: {}", parts.join("  "))?;
    }
    if let Some(call) = &question.friend_call {
        writeln!(out, "Friend: {}", call.message)?;
    }
    let helps: Vec<&str> = view.remaining_help.iter().map(|h| h.as_str()).collect();
    if !helps.is_empty() {
        writeln!(out, "Help left: {}", helps.join(", "))?;
    }
    writeln!(
        out,
        "Time left: {}m {:02}s",
        view.time_left_secs / 60,
        view.time_left_secs % 60
    )?;
    Ok(out)
}

pub fn outcome(view: &GameView) -> Result<String, fmt::Error> {
    let mut out = String::new();
    let headline = match view.status {
        GameStatus::InProgress => return Ok(out),
        GameStatus::Won => "You won the top prize!",
        GameStatus::Failed => "Wrong answer.",
        GameStatus::Timeout => "Time is up.",
        GameStatus::CashedOut => "You took the money.",
    };
    writeln!(out, "{headline} Prize: {}", view.prize)?;
    if let Some(revealed) = &view.revealed {
        writeln!(
            out,
            "The answer to \"{}\" was {}) {}",
            revealed.text,
            revealed.correct_key.as_upper(),
            revealed.correct_answer
        )?;
    }
    Ok(out)
}

pub fn history_line(game: &Game) -> String {
    format!(
        "{}  {}  level {:>2}  {:>9}  {}",
        game.id(),
        game.created_at().format("%Y-%m-%d %H:%M"),
        game.current_level(),
        game.prize(),
        game.status()
    )
}

pub fn leaderboard_line(rank: usize, user: &User) -> String {
    format!("{rank:>3}. {:<24} {:>9}", user.name(), user.balance())
}
