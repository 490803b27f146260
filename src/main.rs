use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result, anyhow};
use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

use anistream::catalog::{self, Category};
use anistream::parser::CatalogCard;
use anistream::player::{self, PlaybackHeaders};
use anistream::ui::{self, Spinner};
use anistream::{HttpClient, ResolvedMedia, Resolver, Settings};

#[derive(Parser)]
#[command(name = "anistream", version, about = "Resolve and play catalog videos")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Settings file (defaults to the user config directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Request timeout in seconds
    #[arg(long, global = true, allow_negative_numbers = true)]
    timeout: Option<i64>,

    /// Enable debug logging
    #[arg(long, global = true)]
    debug: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Resolve a content page into a playable URL
    Resolve {
        url: String,

        /// Preferred quality, e.g. 720 or 1080
        #[arg(short, long)]
        quality: Option<String>,

        /// Print the result as JSON
        #[arg(long)]
        json: bool,

        /// Play the result after resolving
        #[arg(short, long)]
        play: bool,

        /// Use VLC instead of mpv
        #[arg(long)]
        vlc: bool,
    },

    /// List a catalog category
    List {
        #[arg(value_enum)]
        category: CategoryArg,

        #[arg(short, long, default_value_t = 1)]
        page: u32,
    },

    /// Search the catalog
    Search { query: String },
}

#[derive(Clone, Copy, ValueEnum)]
enum CategoryArg {
    Hindi,
    English,
}

impl From<CategoryArg> for Category {
    fn from(arg: CategoryArg) -> Self {
        match arg {
            CategoryArg::Hindi => Category::HindiDubbed,
            CategoryArg::English => Category::EnglishSubbed,
        }
    }
}

#[derive(Serialize)]
struct ResolveOutput<'a> {
    #[serde(flatten)]
    media: &'a ResolvedMedia,
    player_url: String,
}

#[derive(Clone, Copy)]
struct PlayOptions {
    json: bool,
    play: bool,
    vlc: bool,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    let settings = Settings::load(cli.config.as_deref())
        .with_timeout_secs(cli.timeout)
        .with_debug(cli.debug);
    init_logging(settings.debug);

    let client = HttpClient::new(&settings).context("Failed to build HTTP client")?;

    match cli.command {
        Some(Commands::Resolve {
            url,
            quality,
            json,
            play,
            vlc,
        }) => {
            let settings = settings.with_quality(quality.as_deref());
            let resolver = Resolver::new(client, &settings);
            resolve_and_play(&resolver, &settings, &url, PlayOptions { json, play, vlc }).await
        }
        Some(Commands::List { category, page }) => {
            let entries = catalog::list_category(&client, &settings.base_url, category.into(), page).await?;
            print_entries(&entries);
            Ok(ExitCode::SUCCESS)
        }
        Some(Commands::Search { query }) => {
            let entries = catalog::search(&client, &settings.base_url, &query).await?;
            print_entries(&entries);
            Ok(ExitCode::SUCCESS)
        }
        None => interactive(client, &settings).await,
    }
}

fn init_logging(debug: bool) {
    let default = if debug { "anistream=debug,info" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

async fn resolve_and_play(
    resolver: &Resolver,
    settings: &Settings,
    url: &str,
    options: PlayOptions,
) -> Result<ExitCode> {
    let result = {
        let _spinner = Spinner::start("Getting video URL...");
        resolver.resolve(url, &settings.preferred_quality).await
    };

    // All network work is done before the player is touched.
    let media = match result {
        Ok(media) => media,
        Err(e) => {
            ui::notify(&format!("Could not extract video URL: {e}"));
            return Ok(ExitCode::FAILURE);
        }
    };

    let headers = PlaybackHeaders::new(settings.playback_referer());
    let player_url = player::with_header_section(&media.url, &headers);

    if options.json {
        let output = ResolveOutput {
            media: &media,
            player_url,
        };
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        println!("{player_url}");
    }

    if options.play {
        if options.vlc {
            player::play_with_vlc(&media, &headers)?;
        } else {
            player::play_with_mpv(&media, &headers)?;
        }
    }

    Ok(ExitCode::SUCCESS)
}

fn print_entries(entries: &[CatalogCard]) {
    if entries.is_empty() {
        ui::notify("No results found");
        return;
    }
    for entry in entries {
        println!("{}\t[{} | {}]\t{}", entry.title, entry.kind, entry.status, entry.url);
    }
}

async fn interactive(client: HttpClient, settings: &Settings) -> Result<ExitCode> {
    let mut menu: Vec<String> = Category::ALL.iter().map(ToString::to_string).collect();
    menu.push("Search".to_string());

    let Some(choice) = ui::select_from_list(&menu, "Browse:")? else {
        return Ok(ExitCode::SUCCESS);
    };
    let entry = match Category::ALL.get(choice) {
        Some(&category) => browse_category(&client, settings, category).await?,
        None => {
            let query = ui::prompt_input("Search: ")?;
            let results = catalog::search(&client, &settings.base_url, &query).await?;
            pick_entry(&results)?
        }
    };

    let Some(entry) = entry else {
        return Ok(ExitCode::SUCCESS);
    };

    println!("Selected: {}", entry.title);
    let resolver = Resolver::new(client, settings);
    let options = PlayOptions {
        json: false,
        play: true,
        vlc: false,
    };
    resolve_and_play(&resolver, settings, &entry.url, options).await
}

async fn browse_category(
    client: &HttpClient,
    settings: &Settings,
    category: Category,
) -> Result<Option<CatalogCard>> {
    let mut page = 1;
    loop {
        let entries = catalog::list_category(client, &settings.base_url, category, page).await?;
        if entries.is_empty() {
            ui::notify("No results found");
            return Ok(None);
        }

        let mut titles: Vec<String> = entries.iter().map(|e| e.title.clone()).collect();
        titles.push("Next Page >>".to_string());

        let Some(index) = ui::select_from_list(&titles, &format!("{category} - page {page}"))?
        else {
            return Ok(None);
        };
        match entries.get(index) {
            Some(entry) => return Ok(Some(entry.clone())),
            None => page += 1,
        }
    }
}

fn pick_entry(entries: &[CatalogCard]) -> Result<Option<CatalogCard>> {
    if entries.is_empty() {
        ui::notify("No results found");
        return Ok(None);
    }
    let titles: Vec<String> = entries.iter().map(|e| e.title.clone()).collect();
    match ui::select_from_list(&titles, "Select:")? {
        Some(index) => entries
            .get(index)
            .cloned()
            .map(Some)
            .ok_or_else(|| anyhow!("Invalid selection")),
        None => Ok(None),
    }
}
