use std::path::PathBuf;

use clap::{Parser, Subcommand};
use comfy_table::{presets, Attribute, Cell, CellAlignment, Table};
use harmonia::client::card::{FilesPhase, FolderCard, TagsPhase};
use harmonia::client::filter::PageLocation;
use harmonia::client::session::Browser;
use harmonia::provider::UpstreamError;
use harmonia::Harmonia;
use indicatif::{ProgressBar, ProgressStyle};
use miette::Result;

#[actix_web::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let harmonia = Harmonia::new(&args.config).await?;
    harmonia::init_logging(harmonia.options());

    match args.command {
        Command::Serve => harmonia.serve().await?,
        Command::Tags(Tags::Get { folder_id }) => {
            let store = harmonia.open_store().await?;
            match store.get_record(&folder_id).await? {
                Some(record) => {
                    let mut table = Table::new();
                    table.load_preset(presets::NOTHING);
                    table.add_row(vec![header("Folder"), Cell::new(&record.folder_id)]);
                    table.add_row(vec![header("Tags"), Cell::new(record.tags.join(", "))]);
                    table.add_row(vec![
                        header("Updated"),
                        Cell::new(record.updated_at.format("%Y-%m-%d %H:%M:%S")),
                    ]);
                    println!("{table}");
                }
                None => println!("No tags."),
            }
        }
        Command::Tags(Tags::Set { folder_id, tags }) => {
            let store = harmonia.open_store().await?;
            let stored = store.set_tags(&folder_id, Some(tags)).await?;
            println!("{}", stored.join(", "));
        }
        Command::Tags(Tags::Clear { folder_id }) => {
            let store = harmonia.open_store().await?;
            store.set_tags(&folder_id, Some(vec![])).await?;
        }
        Command::Tags(Tags::All { remote }) => {
            let tags = if remote {
                harmonia.tag_client().all_tags().await?
            } else {
                harmonia.open_store().await?.all_tags().await?
            };
            tags.iter().for_each(|t| println!("{t}"));
        }
        Command::Folders(Folders {
            location,
            search,
            toggle,
            files,
        }) => {
            let mut browser = load(&harmonia, &location).await?;
            if let Some(search) = search {
                browser.library_mut().set_search(&search);
            }
            for tag in toggle {
                browser.toggle_filter(&tag);
            }
            print_folders(&browser, files);
            println!("\n{}", browser.library().location());
        }
        Command::Tag(Tag::Add { folder_id, tags }) => {
            let mut browser = load(&harmonia, "/").await?;
            for tag in tags {
                if !browser.add_tag(&folder_id, &tag) {
                    println!("Tag {tag:?} not added.");
                }
            }
            print_tags(browser, &folder_id).await;
        }
        Command::Tag(Tag::Remove { folder_id, index }) => {
            let mut browser = load(&harmonia, "/").await?;
            if !browser.remove_tag(&folder_id, index) {
                println!("No tag at position {index}.");
            }
            print_tags(browser, &folder_id).await;
        }
    }

    Ok(())
}

/// Load folders with their tags and files, showing progress.
async fn load(harmonia: &Harmonia, location: &str) -> Result<Browser, UpstreamError> {
    let mut browser = harmonia.browser(PageLocation::parse(location));

    let progress = ProgressBar::new(0);
    if let Ok(style) = ProgressStyle::with_template("{bar:40.green/yellow} {pos:>7}/{len:7}") {
        progress.set_style(style);
    }

    if let Err(e) = browser.load(&progress).await {
        progress.finish_and_clear();
        return Err(e);
    }
    Ok(browser)
}

fn header(name: &str) -> Cell {
    Cell::new(name)
        .add_attribute(Attribute::Bold)
        .set_alignment(CellAlignment::Right)
}

fn print_folders(browser: &Browser, files: bool) {
    let library = browser.library();

    if !library.vocabulary().is_empty() {
        let tags = library
            .vocabulary()
            .iter()
            .map(|t| {
                if library.filter().contains(t) {
                    format!("[{t}]")
                } else {
                    t.clone()
                }
            })
            .collect::<Vec<_>>();
        println!("Filter by tags: {}\n", tags.join(" "));
    }

    library
        .visible_folders()
        .for_each(|card| println!("{}\n", card_table(card, files)));
}

fn card_table(card: &FolderCard, files: bool) -> Table {
    let mut table = Table::new();
    table.load_preset(presets::NOTHING);

    table.add_row(vec![header("Folder"), Cell::new(&card.folder().name)]);
    table.add_row(vec![header("Link"), Cell::new(&card.folder().link)]);
    table.add_row(vec![header("ID"), Cell::new(card.id())]);

    let tags = match card.tags_phase() {
        TagsPhase::Loaded { error: Some(e) } => e.clone(),
        TagsPhase::Loaded { error: None } => card
            .tags()
            .iter()
            .enumerate()
            .map(|(i, t)| format!("{i}:{t}"))
            .collect::<Vec<_>>()
            .join(", "),
        _ => "Loading tags...".to_string(),
    };
    table.add_row(vec![header("Tags"), Cell::new(tags)]);

    if files {
        let files = match card.files_phase() {
            FilesPhase::Loaded(entries) if entries.is_empty() => "No files found".to_string(),
            FilesPhase::Loaded(entries) => entries
                .iter()
                .map(|e| e.name.as_str())
                .collect::<Vec<_>>()
                .join("\n"),
            FilesPhase::Failed { message, .. } => message.clone(),
            _ => "Loading files...".to_string(),
        };
        table.add_row(vec![header("Files"), Cell::new(files)]);
    }

    table
}

async fn print_tags(browser: Browser, folder_id: &str) {
    let library = browser.finish().await;
    match library.card(folder_id) {
        Some(card) => println!("{}", card_table(card, false)),
        None => eprintln!("Folder {folder_id} not found."),
    }
}

#[derive(Parser, Debug)]
struct Args {
    /// Custom location of configuration file.
    #[arg(short, long, id = "FILE")]
    config: Option<PathBuf>,

    #[clap(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Tags {
    /// Show stored tags of a folder.
    Get { folder_id: String },
    /// Replace stored tags of a folder.
    Set {
        folder_id: String,
        /// New tags (duplicates are dropped)
        tags: Vec<String>,
    },
    /// Remove all tags of a folder.
    Clear { folder_id: String },
    /// List every stored tag.
    All {
        /// Ask the tag service instead of the local database.
        #[arg(long)]
        remote: bool,
    },
}

#[derive(Parser, Debug)]
struct Folders {
    /// Page location whose query selects filter tags, e.g. "/?tags=jazz,live".
    #[arg(long, default_value = "/")]
    location: String,

    /// Show only folders whose name contains this text.
    #[arg(short, long)]
    search: Option<String>,

    /// Toggle a filter tag (can be used repeatedly)
    #[arg(short, long = "toggle", id = "TAG")]
    toggle: Vec<String>,

    /// List files of every folder.
    #[arg(long)]
    files: bool,
}

#[derive(Subcommand, Debug)]
enum Tag {
    /// Add tags to a folder.
    Add { folder_id: String, tags: Vec<String> },
    /// Remove the tag at a position (as shown by `folders`).
    Remove { folder_id: String, index: usize },
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the tag service.
    Serve,
    /// Work with the local tag database.
    #[clap(subcommand)]
    Tags(Tags),
    /// Browse folders of the shared link.
    Folders(Folders),
    /// Edit tags of a folder through the tag service.
    #[clap(subcommand)]
    Tag(Tag),
}
