use chrono::Duration;
use millionaire_core::help::HelpType;
use millionaire_core::ladder::LadderBuilder;
use millionaire_core::model::{GameDraft, GameStatus, QuestionDraft, UserId, levels};
use millionaire_core::rules::GameRules;
use millionaire_core::time::fixed_now;
use rand::SeedableRng;
use rand::rngs::StdRng;
use storage::repository::{
    GameRepository, Payout, QuestionRepository, StorageError, UserRepository,
};
use storage::sqlite::SqliteRepository;

async fn repo(name: &str) -> SqliteRepository {
    let url = format!("sqlite:file:{name}?mode=memory&cache=shared");
    let repo = SqliteRepository::connect(&url).await.expect("connect");
    repo.migrate().await.expect("migrate");
    repo
}

async fn seed_questions(repo: &SqliteRepository, per_level: u32) {
    for level in levels() {
        for n in 0..per_level {
            let q = QuestionDraft::new(level, format!("L{level} #{n}"), "right", ["w1", "w2", "w3"])
                .validate()
                .unwrap();
            repo.insert_question(q).await.unwrap();
        }
    }
}

async fn draft(repo: &SqliteRepository, user_id: UserId, seed: u64) -> GameDraft {
    let mut pool = Vec::new();
    for level in levels() {
        pool.extend(repo.candidates(level).await.unwrap());
    }
    let mut rng = StdRng::seed_from_u64(seed);
    LadderBuilder::new(&GameRules::standard())
        .build(user_id, &pool, fixed_now(), &mut rng)
        .unwrap()
}

#[tokio::test]
async fn question_bank_counts_and_candidates() {
    let repo = repo("memdb_questions").await;
    seed_questions(&repo, 2).await;

    let counts = repo.count_by_level().await.unwrap();
    assert_eq!(counts.len(), 15);
    assert!(counts.values().all(|n| *n == 2));

    let level_7 = repo.candidates(7).await.unwrap();
    assert_eq!(level_7.len(), 2);
    assert!(level_7.iter().all(|q| q.level() == 7));
    assert_eq!(level_7[0].correct_answer(), "right");
}

#[tokio::test]
async fn duplicate_user_name_conflicts() {
    let repo = repo("memdb_users").await;
    let ann = repo.create_user("ann", fixed_now()).await.unwrap();

    let err = repo.create_user("ann", fixed_now()).await.unwrap_err();
    assert!(matches!(err, StorageError::Conflict));

    let found = repo.find_user_by_name("ann").await.unwrap().unwrap();
    assert_eq!(found.id(), ann.id());
    assert_eq!(found.balance(), 0);
    assert!(repo.get_user(UserId::new(999)).await.unwrap().is_none());
}

#[tokio::test]
async fn game_round_trips_with_help_state() {
    let repo = repo("memdb_game_roundtrip").await;
    seed_questions(&repo, 3).await;
    let user = repo.create_user("bob", fixed_now()).await.unwrap();

    let stored = repo.insert_game(draft(&repo, user.id(), 4).await).await.unwrap();
    assert_eq!(stored.revision, 0);

    let mut game = stored.game.clone();
    let mut rng = StdRng::seed_from_u64(5);
    game.use_help(HelpType::FiftyFifty, &mut rng).unwrap();
    let key = game.current_game_question().unwrap().correct_answer_key();
    game.answer_current_question(key.as_str(), fixed_now() + Duration::minutes(1))
        .unwrap();

    let revision = repo.save_game(&game, stored.revision, None).await.unwrap();
    assert_eq!(revision, 1);

    let loaded = repo.get_game(game.id()).await.unwrap().unwrap();
    assert_eq!(loaded.revision, 1);
    assert_eq!(loaded.game, game);
    assert!(loaded.game.help_usage().fifty_fifty);
    assert!(
        loaded.game.game_questions()[0]
            .help_state()
            .fifty_fifty()
            .is_some()
    );
}

#[tokio::test]
async fn one_active_game_per_user() {
    let repo = repo("memdb_active").await;
    seed_questions(&repo, 1).await;
    let user = repo.create_user("cat", fixed_now()).await.unwrap();

    let first = repo.insert_game(draft(&repo, user.id(), 1).await).await.unwrap();
    let err = repo
        .insert_game(draft(&repo, user.id(), 2).await)
        .await
        .unwrap_err();
    assert!(matches!(err, StorageError::Conflict));
    assert_eq!(
        repo.active_game_for_user(user.id()).await.unwrap(),
        Some(first.game.id())
    );

    let mut game = first.game;
    game.take_money(fixed_now()).unwrap();
    repo.save_game(&game, first.revision, None).await.unwrap();
    assert_eq!(repo.active_game_for_user(user.id()).await.unwrap(), None);

    let second = repo.insert_game(draft(&repo, user.id(), 3).await).await.unwrap();
    let history = repo.games_for_user(user.id(), 10).await.unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].id(), second.game.id());
    assert_eq!(history[1].status(), GameStatus::CashedOut);
}

#[tokio::test]
async fn stale_or_finished_saves_conflict_and_payout_is_atomic() {
    let repo = repo("memdb_cas").await;
    seed_questions(&repo, 1).await;
    let user = repo.create_user("dan", fixed_now()).await.unwrap();
    let stored = repo.insert_game(draft(&repo, user.id(), 9).await).await.unwrap();

    let mut game = stored.game.clone();
    for _ in 0..3 {
        let key = game.current_game_question().unwrap().correct_answer_key();
        game.answer_current_question(key.as_str(), fixed_now()).unwrap();
    }
    let result = game.take_money(fixed_now()).unwrap();
    assert_eq!(result.prize, 300);

    let payout = Payout {
        user_id: user.id(),
        amount: result.prize,
    };
    repo.save_game(&game, stored.revision, Some(payout))
        .await
        .unwrap();

    // A second writer holding the old revision loses and credits nothing.
    let err = repo
        .save_game(&game, stored.revision, Some(payout))
        .await
        .unwrap_err();
    assert!(matches!(err, StorageError::Conflict));
    // The game is finished now, so even the current revision is rejected.
    let err = repo.save_game(&game, 1, Some(payout)).await.unwrap_err();
    assert!(matches!(err, StorageError::Conflict));

    let user = repo.get_user(user.id()).await.unwrap().unwrap();
    assert_eq!(user.balance(), 300);
    assert_eq!(repo.leaderboard(5).await.unwrap()[0].id(), user.id());
}

#[tokio::test]
async fn history_page_carries_each_games_snapshots() {
    let repo = repo("memdb_history_page").await;
    seed_questions(&repo, 2).await;
    let user = repo.create_user("fay", fixed_now()).await.unwrap();
    let other = repo.create_user("gus", fixed_now()).await.unwrap();
    let mut rng = StdRng::seed_from_u64(21);

    let mut saved = Vec::new();
    for (seed, help) in [
        (1, HelpType::AudienceHelp),
        (2, HelpType::FiftyFifty),
        (3, HelpType::FriendCall),
    ] {
        let stored = repo.insert_game(draft(&repo, user.id(), seed).await).await.unwrap();
        let mut game = stored.game;
        game.use_help(help, &mut rng).unwrap();
        game.take_money(fixed_now()).unwrap();
        repo.save_game(&game, stored.revision, None).await.unwrap();
        saved.push(game);
    }
    repo.insert_game(draft(&repo, other.id(), 4).await).await.unwrap();

    let history = repo.games_for_user(user.id(), 2).await.unwrap();

    assert_eq!(history.len(), 2);
    assert_eq!(history[0], saved[2]);
    assert_eq!(history[1], saved[1]);
    assert!(history.iter().all(|g| g.game_questions().len() == 15));
    assert!(history.iter().all(|g| g.user_id() == user.id()));
}
