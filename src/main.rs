use charvault::catalog::{CatalogClient, Character};
use charvault::config::Config;
use charvault::db::Database;
use charvault::feed::{character_detail, CharacterFeed};
use charvault::logging;
use charvault::paging::{LoadState, PagingSnapshot, PagingStream};
use charvault::query::QueryState;
use charvault::repository::CatalogRepository;
use clap::{Parser, Subcommand};
use color_eyre::{eyre::eyre, Result};
use futures::StreamExt;
use std::path::PathBuf;
use std::sync::Arc;

/// Concurrent id lookups for `show`
const LOOKUP_CONCURRENCY: usize = 4;

#[derive(Parser, Debug)]
#[command(name = "charvault")]
#[command(about = "Offline-first browser for a remote character catalog")]
#[command(version)]
struct Args {
  /// Path to config file (default: $XDG_CONFIG_HOME/charvault/config.yaml)
  #[arg(short, long)]
  config: Option<PathBuf>,

  /// Log at debug level
  #[arg(short, long)]
  verbose: bool,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// List the catalog from the cache, syncing pages as needed
  List {
    /// Extra pages to load past the initial window
    #[arg(short, long, default_value_t = 0)]
    pages: u32,
  },
  /// Search characters by name (network only, never cached)
  Search {
    name: String,
    /// Extra pages to load past the initial window
    #[arg(short, long, default_value_t = 0)]
    pages: u32,
  },
  /// Show characters by id, cache first
  Show {
    #[arg(required = true)]
    ids: Vec<i64>,
  },
  /// Reload the catalog from the first page
  Refresh,
  /// Delete every cached character
  Clear,
}

#[tokio::main]
async fn main() -> Result<()> {
  color_eyre::install()?;

  let args = Args::parse();
  let config = Config::load(args.config.as_deref())?;

  let log_dir = config
    .cache
    .path
    .as_deref()
    .and_then(|p| p.parent())
    .filter(|p| !p.as_os_str().is_empty())
    .map(PathBuf::from)
    .or_else(logging::default_log_dir);
  let _guard = match log_dir {
    Some(dir) => Some(logging::init(&dir, args.verbose)?),
    None => None,
  };

  let db = Database::open(config.cache.path.as_deref())?;
  let api = CatalogClient::new(&config.api)?;
  let repository = Arc::new(
    CatalogRepository::new(Arc::new(api), db, config.paging_config())
      .with_write_through(config.cache.write_through),
  );

  let result = run(args.command, Arc::clone(&repository)).await;
  repository.release_catalog();
  result
}

async fn run(command: Command, repository: Arc<CatalogRepository>) -> Result<()> {
  match command {
    Command::List { pages } => {
      let mut feed = CharacterFeed::new(repository);
      browse(feed.stream_mut(), pages).await
    }
    Command::Search { name, pages } => {
      let mut feed = CharacterFeed::with_query(repository, &name);
      browse(feed.stream_mut(), pages).await
    }
    Command::Show { ids } => show(&repository, ids).await,
    Command::Refresh => {
      let snapshot = settled(repository.refresh_catalog().await)?;
      report_errors(&snapshot);
      println!("{} characters cached", repository.cached_count().await?);
      Ok(())
    }
    Command::Clear => {
      repository.clear_cache().await?;
      println!("cache cleared");
      Ok(())
    }
  }
}

fn settled(snapshot: Option<PagingSnapshot<Character>>) -> Result<PagingSnapshot<Character>> {
  snapshot.ok_or_else(|| eyre!("paging stream stopped unexpectedly"))
}

async fn browse(stream: &mut PagingStream<Character>, pages: u32) -> Result<()> {
  let mut snapshot = settled(stream.ready().await)?;
  for _ in 0..pages {
    if snapshot.load_states.append.end_of_pagination_reached() {
      break;
    }
    snapshot = settled(stream.append_settled().await)?;
    if snapshot.load_states.append.is_error() {
      break;
    }
  }

  for character in snapshot.items.iter() {
    print_row(character);
  }
  report_errors(&snapshot);

  let footer = if snapshot.load_states.append.end_of_pagination_reached() {
    "end of catalog"
  } else {
    "more available"
  };
  println!("-- {} characters, {}", snapshot.len(), footer);
  Ok(())
}

async fn show(repository: &Arc<CatalogRepository>, ids: Vec<i64>) -> Result<()> {
  let details: Vec<(i64, QueryState<Option<Character>>)> = futures::stream::iter(ids)
    .map(|id| {
      let mut detail = character_detail(Arc::clone(repository), id);
      async move {
        detail.fetch();
        (id, detail.settle().await.clone())
      }
    })
    .buffered(LOOKUP_CONCURRENCY)
    .collect()
    .await;

  for (id, state) in details {
    match state {
      QueryState::Success(Some(c)) => {
        print_row(&c);
        println!("       {}", c.image);
      }
      QueryState::Success(None) => eprintln!("{:>5}  not found", id),
      QueryState::Error(e) => eprintln!("{:>5}  unavailable: {}", id, e),
      QueryState::Idle | QueryState::Loading => {}
    }
  }
  Ok(())
}

fn print_row(character: &Character) {
  println!(
    "{:>5}  {:<32} {:<8} {}",
    character.id, character.name, character.status, character.species
  );
}

fn report_errors(snapshot: &PagingSnapshot<Character>) {
  if let LoadState::Error(e) = &snapshot.load_states.refresh {
    eprintln!("refresh failed, showing cached data: {}", e);
  }
  if let LoadState::Error(e) = &snapshot.load_states.append {
    eprintln!("loading more failed: {}", e);
  }
}
