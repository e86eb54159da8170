use anyhow::Context;
use clap::{Parser, Subcommand};
use std::{
    path::PathBuf,
    sync::{Arc, Mutex},
};

use crate::{
    auth::ProxyHeaderAuth,
    catalog::{
        CatalogCache,
        fs::DirSource,
        upload::{UploadedFile, store_upload},
    },
    config,
    domain::view::{SortMode, view},
    http::server::HttpServer,
    player::{Player, SharedCounts},
    storage::{
        db::i64_seconds_to_local_time,
        plays::{PlayCountStore, Storage},
    },
};

#[derive(Parser)]
#[command(name = "playdeck")]
#[command(version = "0.1")]
#[command(about = "Personal music streaming server")]
pub struct Cli {
    /// Path to the config TOML file
    #[arg(short, long, default_value = "config.toml")]
    pub config: PathBuf,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run http server hosting the library
    Serve,
    /// List tracks of the library
    List {
        /// Only tracks whose title contains this text
        #[arg(short, long, default_value = "")]
        filter: String,
        /// none, alpha or recent
        #[arg(short, long, default_value = "none")]
        sort: SortMode,
    },
    /// Show the most played tracks
    Top {
        #[arg(short, default_value_t = 5)]
        n: usize,
    },
    /// Show how often a track was played
    Plays { title: String },
    /// Add a track and its cover to the library
    Add {
        #[arg(short, long)]
        title: String,
        /// Audio file
        #[arg(short, long)]
        file: PathBuf,
        /// Cover image
        #[arg(short, long)]
        cover: PathBuf,
    },
}

fn catalog_for(library: &config::Library) -> Arc<CatalogCache> {
    Arc::new(CatalogCache::new(
        Box::new(DirSource::new(library)),
        library.default_cover.clone(),
    ))
}

/// Entrypoint for CLI
pub fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let cfg = config::Config::load(&cli.config)?;

    match cli.command {
        Commands::Serve => {
            println!("Starting HTTP server...");

            let storage = Storage::new(&cfg.database).context("Failed to initialize storage")?;
            let counts: SharedCounts = Arc::new(Mutex::new(storage));

            let catalog = catalog_for(&cfg.library);
            if let Err(err) = catalog.load() {
                log::error!("{err}");
                println!("Library could not be loaded, serving an empty catalog until reload");
            }

            let player = Player::new(catalog.clone(), counts.clone(), &cfg.playback);
            let auth = ProxyHeaderAuth::new(&cfg.auth);

            let http_server = HttpServer::new(
                catalog,
                counts,
                player,
                Box::new(auth),
                cfg.library,
                cfg.http,
            );

            println!(
                "HTTP server running at http://{}:{}",
                http_server.config.bind_addr, http_server.config.port
            );
            http_server.run();
        }

        Commands::List { filter, sort } => {
            let mut storage = Storage::new(&cfg.database).context("Failed to initialize storage")?;
            let catalog = catalog_for(&cfg.library).load()?;

            let shown = view(catalog.tracks(), &filter, sort);
            if shown.is_empty() {
                println!("No tracks found");
            }

            for track in shown {
                println!("{} ({} plays)", track.title, storage.get(&track.title)?);
                println!("  file:  {}", track.file_ref);
                println!("  cover: {}", track.cover_ref);
                println!("  id:    {}", track.id);
            }
        }

        Commands::Top { n } => {
            let mut storage = Storage::new(&cfg.database).context("Failed to initialize storage")?;

            for (rank, entry) in storage.top(n)?.iter().enumerate() {
                println!("{:>3}. {} ({} plays)", rank + 1, entry.title, entry.plays);
            }
        }

        Commands::Plays { title } => {
            let mut storage = Storage::new(&cfg.database).context("Failed to initialize storage")?;

            let plays = storage.get(&title)?;
            match storage.last_played_at(&title)? {
                Some(at) => println!(
                    "{title}: {plays} plays, last played {}",
                    i64_seconds_to_local_time(at)?
                ),
                None => println!("{title}: never played"),
            }
        }

        Commands::Add { title, file, cover } => {
            let music_data = std::fs::read(&file)
                .with_context(|| format!("Failed to read {}", file.to_string_lossy()))?;
            let cover_data = std::fs::read(&cover)
                .with_context(|| format!("Failed to read {}", cover.to_string_lossy()))?;

            let music_name = file.file_name().map(|n| n.to_string_lossy().to_string());
            let cover_name = cover.file_name().map(|n| n.to_string_lossy().to_string());

            let stored = store_upload(
                &cfg.library,
                &title,
                UploadedFile {
                    file_name: music_name.as_deref(),
                    data: &music_data,
                },
                UploadedFile {
                    file_name: cover_name.as_deref(),
                    data: &cover_data,
                },
            )?;

            println!(
                "Added '{}' at {}",
                stored.title,
                stored.music_path.to_string_lossy()
            );
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::{Cli, Commands};
    use crate::domain::view::SortMode;

    #[test]
    fn parses_list_with_sort() {
        let cli = Cli::parse_from(["playdeck", "list", "--sort", "recent", "-f", "song"]);
        match cli.command {
            Commands::List { filter, sort } => {
                assert_eq!(filter, "song");
                assert_eq!(sort, SortMode::Recent);
            }
            _ => panic!("expected list"),
        }
    }

    #[test]
    fn rejects_unknown_sort() {
        assert!(Cli::try_parse_from(["playdeck", "list", "--sort", "loud"]).is_err());
    }

    #[test]
    fn parses_top_with_default_size() {
        let cli = Cli::parse_from(["playdeck", "-c", "deck.toml", "top"]);
        assert_eq!(cli.config.to_string_lossy(), "deck.toml");
        assert!(matches!(cli.command, Commands::Top { n: 5 }));
    }
}
