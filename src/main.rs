use std::path::Path;

use anyhow::{bail, Context};

use bluelight_store::{Article, Config, DataManager};

const DEFAULT_RECENT: usize = 20;

fn main() -> anyhow::Result<()> {
    // Initialize logging (only show warnings and errors by default)
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = std::env::args().collect();
    let config = Config::load().context("loading configuration")?;

    let mut manager = DataManager::default();
    manager
        .try_initialize(&config.database)
        .context("initializing database")?;

    let result = match args.get(1).map(String::as_str) {
        Some("--init") | None => {
            println!(
                "Schema ready ({})",
                manager.dialect().unwrap_or("unknown dialect")
            );
            Ok(())
        }
        Some("--import") => match args.get(2) {
            Some(path) => import_articles(&manager, Path::new(path)),
            None => bail!("usage: bluelight-store --import <articles.json>"),
        },
        Some("--show") => match args.get(2) {
            Some(id) => show_article(&manager, id),
            None => bail!("usage: bluelight-store --show <article_id>"),
        },
        Some("--recent") => {
            let limit = match args.get(2) {
                Some(n) => n.parse().context("--recent expects a number")?,
                None => DEFAULT_RECENT,
            };
            list_recent(&manager, limit)
        }
        Some(other) => bail!("unknown argument {other}"),
    };

    manager.close();
    result
}

fn import_articles(manager: &DataManager, path: &Path) -> anyhow::Result<()> {
    let content =
        std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    let articles: Vec<Article> =
        serde_json::from_str(&content).with_context(|| format!("parsing {}", path.display()))?;

    let mut added = 0;
    let mut updated = 0;
    for article in &articles {
        if manager.has_article(&article.id)? {
            manager.update_article_content(article)?;
            updated += 1;
        } else {
            manager.add_article(article)?;
            added += 1;
        }

        if !article.locations.is_empty() {
            manager.update_location_links(article)?;
        }
        if !article.topics.is_empty() {
            manager.update_topic_links(article)?;
        }
    }

    println!("Imported {} articles ({} new, {} updated)", articles.len(), added, updated);
    Ok(())
}

fn show_article(manager: &DataManager, id: &str) -> anyhow::Result<()> {
    let Some(article) = manager.get_article(id, true)? else {
        bail!("article {id} not found");
    };

    println!("{}", article.title);
    println!("  id:       {}", article.id);
    println!("  url:      {}", article.url);
    if let Some(released) = article.release_time {
        println!("  released: {}", released.to_rfc3339());
    }
    println!("  fetched:  {}", article.fetch_time.to_rfc3339());
    println!("  hash:     {}", article.file_hash);

    let mut locations: Vec<&str> = article.locations.iter().map(|l| l.name.as_str()).collect();
    locations.sort_unstable();
    let mut topics: Vec<&str> = article.topics.iter().map(|t| t.name.as_str()).collect();
    topics.sort_unstable();
    println!("  locations: {}", locations.join(", "));
    println!("  topics:    {}", topics.join(", "));
    Ok(())
}

fn list_recent(manager: &DataManager, limit: usize) -> anyhow::Result<()> {
    for article in manager.get_articles(limit)? {
        println!(
            "{}  {}  {}",
            article.fetch_time.format("%Y-%m-%d %H:%M"),
            article.id,
            article.title
        );
    }
    Ok(())
}
