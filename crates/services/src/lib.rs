#![forbid(unsafe_code)]

pub mod app_services;
pub mod error;
pub mod game_service;
pub mod game_view;
pub mod user_service;

pub use millionaire_core::Clock;

pub use app_services::AppServices;
pub use error::{AppServicesError, GameServiceError, UserServiceError};
pub use game_service::GameService;
pub use game_view::{GameView, OptionView, PrizeStep, QuestionView, RevealedQuestion};
pub use user_service::UserService;
