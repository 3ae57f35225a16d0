use std::sync::Arc;

use feed::profile::Profile;
use feed::storage::{FileStorage, default_storage_path};
use feed::store::ItemStore;
use feed::sync::canvas::{CanvasClient, DEFAULT_RELAY};
use feed::sync::classroom::ClassroomClient;
use feed::sync::load_assignments;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Set up logging to the systemd user journal (`journalctl --user -t feed -f`).
    // Wrapper filters: feed crate at info/debug (per flag), everything else at warn.
    {
        struct FilteredJournal {
            inner: systemd_journal_logger::JournalLog,
        }

        impl log::Log for FilteredJournal {
            fn enabled(&self, metadata: &log::Metadata) -> bool {
                if metadata.target().starts_with("feed") {
                    let max = if feed::debug_logging() {
                        log::LevelFilter::Debug
                    } else {
                        log::LevelFilter::Info
                    };
                    metadata.level() <= max
                } else {
                    metadata.level() <= log::LevelFilter::Warn
                }
            }
            fn log(&self, record: &log::Record) {
                if self.enabled(record.metadata()) {
                    self.inner.log(record);
                }
            }
            fn flush(&self) {
                self.inner.flush();
            }
        }

        let journal = systemd_journal_logger::JournalLog::new()
            .unwrap()
            .with_syslog_identifier("feed".to_string());

        let args: Vec<String> = std::env::args().collect();
        feed::set_debug_logging(args.iter().any(|a| a == "--debug"));

        log::set_boxed_logger(Box::new(FilteredJournal { inner: journal })).unwrap();
        // Global max must be Debug so feed debug logs can pass through when toggled
        log::set_max_level(log::LevelFilter::Debug);
    }

    let storage = Arc::new(FileStorage::open(default_storage_path()));
    let profile = Profile::load(storage);
    let store = ItemStore::new();

    // `--canvas-url <url>` persists a new calendar feed address before loading.
    {
        let args: Vec<String> = std::env::args().collect();
        if let Some(position) = args.iter().position(|a| a == "--canvas-url") {
            match args.get(position + 1) {
                Some(url) => profile.set_canvas_url(url),
                None => {
                    eprintln!("--canvas-url requires a value");
                    std::process::exit(2);
                }
            }
        }
    }

    // The Classroom session token comes from the environment; the sign-in
    // flow itself belongs to the auth layer, not this binary.
    let classroom = match std::env::var("FEED_CLASSROOM_TOKEN") {
        Ok(token) if !token.is_empty() => Some(ClassroomClient::new(&token)?),
        _ => None,
    };
    let canvas = CanvasClient::new(DEFAULT_RELAY)?;

    // Warm the cache so the load below can serve the feed from disk while it
    // revalidates in the background.
    let calendar_url = profile.canvas_url();
    if !calendar_url.is_empty() {
        canvas.precache_feed(&calendar_url).await;
    }

    let report = load_assignments(classroom.as_ref(), &canvas, &profile, &store).await;

    println!("=== {} ===\n", profile.name());

    let items = store.current();
    if items.is_empty() {
        println!("Nothing to do.");
    }
    for item in &items {
        println!(
            "[{}] {}  {}  {}",
            item.completed.label(),
            item.date.format("%Y-%m-%d %H:%M"),
            item.class_name,
            item.name
        );
        println!("      {}", item.url);
    }

    println!(
        "\n{} items loaded, {} skipped",
        report.inserted, report.skipped
    );
    for error in &report.errors {
        eprintln!("  {}", error);
    }

    Ok(())
}
