use std::fmt;
use std::path::Path;

use env_logger::Env;
use log::debug;
use services::{
    AppConfig, AppServices, Clock, StudyContext, StudyEvent, StudyEventKind, StudyLoopService,
};
use storage::Snapshot;
use study_core::model::{
    Card, CardId, CardKind, Deck, DeckId, Difficulty, SettingsDraft, Theme,
};
use study_core::study::StudyState;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::TryRecvError;

#[derive(Debug)]
enum ArgsError {
    MissingValue { flag: &'static str },
    MissingArgument { command: &'static str, name: &'static str },
    UnknownArg(String),
    UnknownCommand(String),
    InvalidDbUrl { raw: String },
    InvalidSetting { key: String, value: String },
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::MissingArgument { command, name } => {
                write!(f, "{command} requires <{name}>")
            }
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
            ArgsError::UnknownCommand(cmd) => write!(f, "unknown subcommand: {cmd}"),
            ArgsError::InvalidDbUrl { raw } => write!(f, "invalid --db value: {raw}"),
            ArgsError::InvalidSetting { key, value } => {
                write!(f, "invalid value {value:?} for setting {key}")
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

fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  app [--db <sqlite_url>] [--api <url|off>] <command>");
    eprintln!();
    eprintln!("Commands:");
    eprintln!("  decks                  list remote and local decks");
    eprintln!("  seed                   store a sample deck locally");
    eprintln!("  generate <notes_file>  generate a deck from study notes");
    eprintln!("  study <deck_id>        study a deck interactively");
    eprintln!("  delete <deck_id>       remove a local deck");
    eprintln!("  stats                  show study statistics");
    eprintln!("  settings [<key> <value>]...");
    eprintln!("  export [path]          write all data as JSON");
    eprintln!("  import <path>          replace data from an export");
    eprintln!("  backup <path>          write a backup");
    eprintln!("  restore <path>         restore a backup");
    eprintln!("  clear                  delete all local data");
    eprintln!();
    eprintln!("Environment:");
    eprintln!("  STUDY_DB_URL, STUDY_API_URL, STUDY_ADVANCE_DELAY_MS, RUST_LOG");
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Command {
    Decks,
    Seed,
    Generate(String),
    Study(DeckId),
    Delete(DeckId),
    Stats,
    Settings(Vec<(String, String)>),
    Export(Option<String>),
    Import(String),
    Backup(String),
    Restore(String),
    Clear,
}

struct Args {
    db_url: Option<String>,
    api_url: Option<String>,
    command: Command,
}

impl Args {
    fn parse(args: impl IntoIterator<Item = String>) -> Result<Option<Self>, ArgsError> {
        let mut args = args.into_iter();
        let mut db_url = None;
        let mut api_url = None;
        let mut positional = Vec::new();

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--db" => {
                    let value = require_value(&mut args, "--db")?;
                    if value.trim().is_empty() {
                        return Err(ArgsError::InvalidDbUrl { raw: value });
                    }
                    db_url = Some(normalize_sqlite_url(&value));
                }
                "--api" => api_url = Some(require_value(&mut args, "--api")?),
                "--help" | "-h" => return Ok(None),
                flag if flag.starts_with("--") => return Err(ArgsError::UnknownArg(arg)),
                _ => positional.push(arg),
            }
        }

        let mut positional = positional.into_iter();
        let Some(name) = positional.next() else {
            return Ok(None);
        };
        let command = match name.as_str() {
            "decks" => Command::Decks,
            "seed" => Command::Seed,
            "generate" => Command::Generate(required(&mut positional, "generate", "notes_file")?),
            "study" => Command::Study(DeckId::new(required(&mut positional, "study", "deck_id")?)),
            "delete" => {
                Command::Delete(DeckId::new(required(&mut positional, "delete", "deck_id")?))
            }
            "stats" => Command::Stats,
            "settings" => {
                let rest: Vec<String> = positional.by_ref().collect();
                let pairs = rest
                    .chunks(2)
                    .map(|pair| match pair {
                        [key, value] => Ok((key.clone(), value.clone())),
                        [key] => Err(ArgsError::InvalidSetting {
                            key: key.clone(),
                            value: String::new(),
                        }),
                        _ => Err(ArgsError::UnknownArg(pair.join(" "))),
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                Command::Settings(pairs)
            }
            "export" => Command::Export(positional.next()),
            "import" => Command::Import(required(&mut positional, "import", "path")?),
            "backup" => Command::Backup(required(&mut positional, "backup", "path")?),
            "restore" => Command::Restore(required(&mut positional, "restore", "path")?),
            "clear" => Command::Clear,
            _ => return Err(ArgsError::UnknownCommand(name)),
        };
        if let Some(extra) = positional.next() {
            return Err(ArgsError::UnknownArg(extra));
        }

        Ok(Some(Self {
            db_url,
            api_url,
            command,
        }))
    }
}

fn required(
    args: &mut impl Iterator<Item = String>,
    command: &'static str,
    name: &'static str,
) -> Result<String, ArgsError> {
    args.next()
        .ok_or(ArgsError::MissingArgument { command, name })
}

/// Accept bare paths as well as `sqlite:` URLs.
fn normalize_sqlite_url(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.starts_with("sqlite:") {
        return trimmed.to_string();
    }
    format!("sqlite://{trimmed}?mode=rwc")
}

fn prepare_sqlite_dir(db_url: &str) -> std::io::Result<()> {
    let Some(path) = db_url.strip_prefix("sqlite://") else {
        return Ok(());
    };
    let path = path.split('?').next().unwrap_or(path);
    match Path::new(path).parent() {
        Some(parent) if !parent.as_os_str().is_empty() => std::fs::create_dir_all(parent),
        _ => Ok(()),
    }
}

//
// ─── COMMANDS ──────────────────────────────────────────────────────────────────
//

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let Some(args) = Args::parse(std::env::args().skip(1)).inspect_err(|_| print_usage())? else {
        print_usage();
        return Ok(());
    };

    let mut config = AppConfig::from_env()?;
    if let Some(db_url) = args.db_url {
        config = config.with_db_url(db_url)?;
    }
    if let Some(api_url) = &args.api_url {
        config = config.with_api_url(api_url)?;
    }
    debug!("database {}", config.db_url);

    prepare_sqlite_dir(&config.db_url)?;
    let services = AppServices::new_sqlite(&config, Clock::system()).await?;
    if !services.store().is_available() {
        eprintln!("warning: storage is unavailable, changes will not be saved");
    }

    match args.command {
        Command::Decks => list_decks(&services).await,
        Command::Seed => {
            let deck = sample_deck(services.store().clock())?;
            services.library().save_deck(&deck).await?;
            let profile = services.statistics().load_profile().await?;
            services.statistics().record_deck_created(&profile).await?;
            println!("seeded {} ({})", deck.title(), deck.id());
            Ok(())
        }
        Command::Generate(path) => {
            let notes = std::fs::read_to_string(&path)?;
            let deck = services.library().generate_deck(&notes).await?;
            println!("generated {} ({}) with {} cards", deck.title(), deck.id(), deck.len());
            Ok(())
        }
        Command::Study(id) => {
            let deck = services.library().open_deck(&id).await?;
            study(&services.study_loop(), deck).await
        }
        Command::Delete(id) => {
            services.library().delete_deck(&id).await?;
            println!("deleted {id}");
            Ok(())
        }
        Command::Stats => show_stats(&services).await,
        Command::Settings(pairs) => update_settings(&services, pairs).await,
        Command::Export(path) => {
            let snapshot = services.store().export_all().await;
            let json = serde_json::to_string_pretty(&snapshot)?;
            match path {
                Some(path) => std::fs::write(path, json)?,
                None => println!("{json}"),
            }
            Ok(())
        }
        Command::Import(path) => {
            let snapshot: Snapshot = serde_json::from_str(&std::fs::read_to_string(path)?)?;
            services.store().import_all(&snapshot).await?;
            println!("imported");
            Ok(())
        }
        Command::Backup(path) => {
            std::fs::write(path, services.store().backup().await?)?;
            println!("backup written");
            Ok(())
        }
        Command::Restore(path) => {
            services
                .store()
                .restore(&std::fs::read_to_string(path)?)
                .await?;
            println!("restored");
            Ok(())
        }
        Command::Clear => {
            services.store().clear_all().await?;
            println!("cleared");
            Ok(())
        }
    }
}

async fn list_decks(services: &AppServices) -> Result<(), Box<dyn std::error::Error>> {
    let listing = services.library().list_decks().await;
    if !listing.remote_available {
        eprintln!("remote decks unavailable, showing local decks only");
    }
    if listing.decks.is_empty() {
        println!("no decks yet; try `seed` or `generate`");
    }
    for deck in &listing.decks {
        println!(
            "{:<28} {:>3} cards {:>5.0}%  {}",
            deck.id(),
            deck.len(),
            deck.progress(),
            deck.title()
        );
    }
    Ok(())
}

async fn show_stats(services: &AppServices) -> Result<(), Box<dyn std::error::Error>> {
    let profile = services.statistics().profile().await;
    println!("sessions:        {}", profile.study_sessions);
    println!("cards studied:   {}", profile.total_cards);
    println!("decks created:   {}", profile.total_decks);
    println!("avg accuracy:    {}%", profile.average_accuracy);
    println!(
        "streak:          {} (longest {})",
        profile.current_streak, profile.longest_streak
    );

    let history = services.statistics().history().await;
    for record in history.iter().rev().take(5) {
        println!(
            "  {}  {}  {}/{} correct, {}%",
            record.timestamp.format("%Y-%m-%d %H:%M"),
            record.deck_id,
            record.data.cards_correct,
            record.data.cards_studied,
            record.data.accuracy
        );
    }
    let usage = services.store().usage().await;
    println!("storage:         {:.1} KB", usage.kilobytes());
    Ok(())
}

async fn update_settings(
    services: &AppServices,
    pairs: Vec<(String, String)>,
) -> Result<(), Box<dyn std::error::Error>> {
    let settings_service = services.settings();
    let settings = if pairs.is_empty() {
        settings_service.load().await
    } else {
        let mut draft = SettingsDraft::new();
        for (key, value) in pairs {
            let invalid = || ArgsError::InvalidSetting {
                key: key.clone(),
                value: value.clone(),
            };
            match key.as_str() {
                "theme" => {
                    draft.theme = Some(match value.as_str() {
                        "light" => Theme::Light,
                        "dark" => Theme::Dark,
                        _ => return Err(invalid().into()),
                    });
                }
                "language" => draft.language = Some(value.clone()),
                "cards-per-session" => {
                    draft.cards_per_session = Some(value.parse().map_err(|_| invalid())?);
                }
                "show-explanations" => {
                    draft.show_explanations = Some(value.parse().map_err(|_| invalid())?);
                }
                "default-difficulty" => {
                    draft.default_difficulty =
                        Some(parse_difficulty(&value).ok_or_else(invalid)?);
                }
                _ => return Err(ArgsError::UnknownArg(key.clone()).into()),
            }
        }
        settings_service.save(draft).await?
    };

    println!("theme:              {:?}", settings.theme());
    println!("language:           {}", settings.language());
    println!("cards per session:  {}", settings.cards_per_session());
    println!("show explanations:  {}", settings.show_explanations());
    println!("default difficulty: {}", settings.default_difficulty().as_str());
    Ok(())
}

fn parse_difficulty(raw: &str) -> Option<Difficulty> {
    match raw {
        "1" | "easy" => Some(Difficulty::Easy),
        "2" | "medium" => Some(Difficulty::Medium),
        "3" | "hard" => Some(Difficulty::Hard),
        _ => None,
    }
}

//
// ─── STUDY LOOP ────────────────────────────────────────────────────────────────
//

async fn study(
    loop_svc: &StudyLoopService,
    deck: Deck,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut events = loop_svc.subscribe();
    let mut ctx = loop_svc.start(deck).await;
    eprintln!("f flip, n next, p previous, 1/2/3 rate easy/medium/hard, r restart, q quit");
    drain_events(&mut events, &ctx);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let input = line.trim();
        let result = match input {
            "q" => break,
            "f" => loop_svc.toggle_flip(&mut ctx).await,
            "n" => loop_svc.next(&mut ctx).await,
            "p" => loop_svc.previous(&mut ctx).await,
            "r" => loop_svc.restart(&mut ctx).await,
            other => match parse_difficulty(other) {
                Some(difficulty) => loop_svc.rate(&mut ctx, difficulty).await,
                None => {
                    eprintln!("unknown input: {other}");
                    continue;
                }
            },
        };
        drain_events(&mut events, &ctx);

        match result {
            Ok(outcome) => {
                if let Some(report) = outcome.completion {
                    println!(
                        "streak {} day(s), {} session(s) total",
                        report.recorded.profile.current_streak,
                        report.recorded.profile.study_sessions
                    );
                    if !report.recorded.is_persisted() {
                        eprintln!("warning: statistics could not be saved");
                    }
                    eprintln!("r to study again, q to quit");
                }
            }
            Err(err) => eprintln!("{err}"),
        }
    }
    Ok(())
}

/// Render every pending study event for `ctx`, returning how many were shown.
fn drain_events(events: &mut broadcast::Receiver<StudyEvent>, ctx: &StudyContext) -> usize {
    let mut shown = 0;
    loop {
        match events.try_recv() {
            Ok(event) if event.deck_id == *ctx.deck_id() => {
                if show_event(&event, ctx) {
                    shown += 1;
                }
            }
            Ok(_) => {}
            Err(TryRecvError::Lagged(skipped)) => debug!("skipped {skipped} study events"),
            Err(_) => return shown,
        }
    }
}

fn show_event(event: &StudyEvent, ctx: &StudyContext) -> bool {
    match event.kind {
        StudyEventKind::Rated(difficulty) => println!("rated {}", difficulty.as_str()),
        StudyEventKind::Completed(summary) => println!(
            "deck complete: {} of {} cards rated, accuracy {}%",
            summary.rated_cards, summary.total_cards, summary.accuracy
        ),
        // only the latest state is on screen
        _ if event.state == ctx.state() => render(ctx),
        _ => return false,
    }
    true
}

fn render(ctx: &StudyContext) {
    let session = ctx.session();
    let (Some(deck), Some(card)) = (session.deck(), session.current_card()) else {
        return;
    };
    let Some(index) = ctx.state().index() else {
        return;
    };

    println!();
    println!(
        "[{}/{}] {}  ({}%)",
        index + 1,
        deck.len(),
        card.kind().label(),
        deck.progress().round()
    );
    println!("{}", card.question());
    if let StudyState::Flipped(_) = ctx.state() {
        if let Some(answer) = card.answer_text() {
            println!("-> {answer}");
        }
        if !card.explanation().is_empty() {
            println!("   {}", card.explanation());
        }
    } else {
        for (i, option) in card.options().iter().enumerate() {
            println!("  {}. {option}", i + 1);
        }
    }
}

fn sample_deck(clock: Clock) -> Result<Deck, study_core::Error> {
    let cards = vec![
        Card::new(
            CardId::generate(),
            CardKind::MultipleChoice,
            "Which organelle produces most of a cell's ATP?",
            vec![
                "Nucleus".to_string(),
                "Mitochondrion".to_string(),
                "Ribosome".to_string(),
                "Golgi apparatus".to_string(),
            ],
            Some(1),
            "Oxidative phosphorylation happens on the inner mitochondrial membrane.",
        )?,
        Card::new(
            CardId::generate(),
            CardKind::TrueFalse,
            "Plant cells have a cell wall.",
            vec!["True".to_string(), "False".to_string()],
            Some(0),
            "The wall is made mostly of cellulose.",
        )?,
        Card::new(
            CardId::generate(),
            CardKind::ShortAnswer,
            "What molecule carries genetic information?",
            Vec::new(),
            None,
            "DNA",
        )?,
    ];
    Ok(Deck::new(DeckId::generate(), "Cell Biology Basics", cards, clock.now())?)
}

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(Env::default().default_filter_or("warn")).init();

    if let Err(err) = run().await {
        eprintln!("{err}");
        std::process::exit(2);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(raw: &[&str]) -> Result<Option<Args>, ArgsError> {
        Args::parse(raw.iter().map(|s| (*s).to_string()))
    }

    #[test]
    fn no_command_prints_usage() {
        assert!(args(&[]).unwrap().is_none());
        assert!(args(&["--help"]).unwrap().is_none());
    }

    #[test]
    fn parses_flags_and_command() {
        let parsed = args(&["--db", "data/study.db", "--api", "off", "study", "deck_1"])
            .unwrap()
            .unwrap();
        assert_eq!(parsed.db_url.as_deref(), Some("sqlite://data/study.db?mode=rwc"));
        assert_eq!(parsed.api_url.as_deref(), Some("off"));
        assert_eq!(parsed.command, Command::Study(DeckId::new("deck_1")));
    }

    #[test]
    fn sqlite_urls_pass_through() {
        assert_eq!(normalize_sqlite_url("sqlite::memory:"), "sqlite::memory:");
        assert_eq!(
            normalize_sqlite_url(" sqlite://x.db "),
            "sqlite://x.db"
        );
    }

    #[test]
    fn missing_arguments_are_reported() {
        assert!(matches!(
            args(&["study"]),
            Err(ArgsError::MissingArgument { command: "study", .. })
        ));
        assert!(matches!(args(&["--db"]), Err(ArgsError::MissingValue { .. })));
        assert!(matches!(args(&["fly"]), Err(ArgsError::UnknownCommand(_))));
        assert!(matches!(args(&["clear", "now"]), Err(ArgsError::UnknownArg(_))));
    }

    #[test]
    fn settings_take_key_value_pairs() {
        let parsed = args(&["settings", "theme", "dark", "cards-per-session", "10"])
            .unwrap()
            .unwrap();
        assert_eq!(
            parsed.command,
            Command::Settings(vec![
                ("theme".to_string(), "dark".to_string()),
                ("cards-per-session".to_string(), "10".to_string()),
            ])
        );
        assert!(args(&["settings", "theme"]).is_err());
    }

    #[tokio::test]
    async fn study_screen_follows_service_events() {
        use services::{OfflineProvider, StatisticsEngine};
        use std::sync::Arc;
        use std::time::Duration;
        use storage::PersistentStore;
        use study_core::time::fixed_clock;

        let store = PersistentStore::in_memory(fixed_clock());
        let stats = StatisticsEngine::new(fixed_clock(), store.clone());
        let loop_svc =
            StudyLoopService::new(fixed_clock(), store, Arc::new(OfflineProvider), stats)
                .with_advance_delay(Duration::ZERO);
        let mut events = loop_svc.subscribe();

        let mut ctx = loop_svc.start(sample_deck(fixed_clock()).unwrap()).await;
        assert_eq!(drain_events(&mut events, &ctx), 1);

        loop_svc.rate(&mut ctx, Difficulty::Easy).await.unwrap();
        assert_eq!(drain_events(&mut events, &ctx), 2);
        assert_eq!(drain_events(&mut events, &ctx), 0);

        loop_svc.previous(&mut ctx).await.unwrap();
        loop_svc.toggle_flip(&mut ctx).await.unwrap();
        assert_eq!(drain_events(&mut events, &ctx), 1);
    }

    #[test]
    fn sample_deck_is_valid() {
        let deck = sample_deck(study_core::time::fixed_clock()).unwrap();
        assert_eq!(deck.len(), 3);
        assert_eq!(deck.progress(), 0.0);
    }
}
