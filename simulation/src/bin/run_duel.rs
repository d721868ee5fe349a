use std::path::PathBuf;

use clap::Parser;
use engine::EngineConfig;
use simulation::{run_duel, DuelSettings, GameFile};
use strategies::{DefaultStrategy, InputStrategy, RandomStrategy};
use types::{GameType, Strategy};

#[derive(Parser, Debug)]
struct Params {
    #[arg(short, long, default_value = "quiz")]
    game: GameType,
    /// YAML game file with engine settings and questions.
    #[arg(short, long)]
    config: Option<PathBuf>,
    /// Truth-or-Dare rounds to play.
    #[arg(short, long, default_value_t = 4)]
    rounds: u32,
    /// Play the creator's side yourself.
    #[arg(short, long)]
    interactive: bool,
    /// Let the joiner pick moves at random.
    #[arg(long)]
    random: bool,
    #[arg(long)]
    delay_ms: Option<u64>,
    #[arg(long)]
    reaction_delay_ms: Option<u64>,
    #[arg(long)]
    store_root: Option<String>,
}

#[tokio::main]
async fn main() {
    env_logger::init();
    let args = Params::parse();
    log::info!("args: {args:?}");

    let file = match args.config.as_ref().map(GameFile::load).transpose() {
        Ok(file) => file.unwrap_or_default(),
        Err(err) => {
            log::error!("{err}");
            std::process::exit(2);
        }
    };
    let engine = EngineConfig::from_cli_or_env_or_yaml(
        args.reaction_delay_ms,
        args.store_root.clone(),
        Some(file.engine.clone()),
    );
    let settings = DuelSettings {
        game_type: args.game,
        engine,
        rounds: args.rounds,
        delay_ms: args.delay_ms,
    };

    let creator: Box<dyn Strategy> = if args.interactive {
        Box::new(InputStrategy::default())
    } else {
        Box::new(DefaultStrategy::default())
    };
    let joiner: Box<dyn Strategy> = if args.random {
        Box::new(RandomStrategy::default())
    } else {
        Box::new(DefaultStrategy::default())
    };

    match run_duel(&settings, file.catalog(), creator, joiner).await {
        Ok(summary) => println!("{summary}"),
        Err(err) => {
            log::error!("{err}");
            std::process::exit(1);
        }
    }
}
