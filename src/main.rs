use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use jotter::config::ensure_database_directory;
use jotter::query::{Page, PageRequest, Sort};
use jotter::{
    Config, Database, NewNote, Note, NoteFilter, NoteId, NoteService, QueryError, ServiceError,
    ShareToken, ShareTokenFilter,
};
use serde::Serialize;

/// jotter - notes with tags and share links
#[derive(Parser)]
#[command(name = "jotter")]
#[command(about = "A note-taking backend with paged, tag-aware listings")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Available commands
#[derive(Subcommand)]
enum Commands {
    /// Add a new note
    Add(AddCommand),
    /// List notes one page at a time
    List(ListCommand),
    /// Create a share link for a note
    Share(ShareCommand),
    /// List share links
    Shares(SharesCommand),
    /// Delete a note
    Delete(DeleteCommand),
}

#[derive(Parser)]
struct AddCommand {
    /// The note's title
    #[arg(value_name = "TITLE")]
    title: String,

    /// The note's content
    #[arg(value_name = "CONTENT", default_value = "")]
    content: String,

    /// Owning user
    #[arg(long, default_value = "me")]
    owner: String,

    /// Comma-separated tags to apply to the note
    #[arg(short, long, value_name = "TAGS")]
    tags: Option<String>,

    /// Display color
    #[arg(long)]
    color: Option<String>,

    /// Pin the note
    #[arg(long)]
    pinned: bool,
}

/// Paging options shared by listing commands.
#[derive(Args)]
struct PageArgs {
    /// Zero-based page index
    #[arg(long, default_value_t = 0)]
    page: usize,

    /// Page size (defaults to JOTTER_PAGE_SIZE)
    #[arg(long)]
    size: Option<usize>,

    /// Sort key as `field[,asc|desc]`; repeat for secondary keys
    #[arg(long = "sort", value_name = "FIELD[,DIR]")]
    sort: Vec<String>,

    /// Print the page as JSON
    #[arg(long)]
    json: bool,
}

#[derive(Parser)]
struct ListCommand {
    #[arg(long)]
    owner: Option<String>,

    /// Case-insensitive text to find in title or content
    #[arg(short, long)]
    search: Option<String>,

    /// Comma-separated tags; notes with any of them match
    #[arg(short, long)]
    tags: Option<String>,

    /// Comma-separated tags; notes with all of them match
    #[arg(long)]
    all_tags: Option<String>,

    #[arg(long)]
    color: Option<String>,

    /// Only pinned (true) or unpinned (false) notes
    #[arg(long)]
    pinned: Option<bool>,

    #[command(flatten)]
    paging: PageArgs,
}

#[derive(Parser)]
struct ShareCommand {
    /// ID of the note to share
    note_id: i64,

    #[arg(long, default_value = "me")]
    owner: String,

    /// Hours until the link expires; never expires when omitted
    #[arg(long)]
    ttl_hours: Option<i64>,
}

#[derive(Parser)]
struct SharesCommand {
    #[arg(long)]
    owner: Option<String>,

    /// Only links for this note
    #[arg(long)]
    note: Option<i64>,

    /// Text to find in the token or the note title
    #[arg(short, long)]
    search: Option<String>,

    #[command(flatten)]
    paging: PageArgs,
}

#[derive(Parser)]
struct DeleteCommand {
    note_id: i64,
}

fn main() {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    let result = Config::from_env().and_then(|config| {
        jotter::logging::init(&config.log_filter)?;
        run(&cli.command, &config)
    });

    if let Err(e) = result {
        // Determine exit code based on error type
        let exit_code = if is_user_error(&e) { 1 } else { 2 };
        eprintln!("Error: {e:#}");
        std::process::exit(exit_code);
    }
}

/// Determines if an error is a user error (vs internal error).
fn is_user_error(error: &anyhow::Error) -> bool {
    error.chain().any(|cause| {
        cause.downcast_ref::<ServiceError>().is_some_and(ServiceError::is_user_error)
            || cause.downcast_ref::<QueryError>().is_some_and(QueryError::is_user_error)
    })
}

fn run(command: &Commands, config: &Config) -> Result<()> {
    ensure_database_directory(&config.database_path)?;
    let db = Database::open(&config.database_path).context("Failed to open database")?;
    let service = NoteService::new(db)?.with_max_page_size(config.max_page_size);

    match command {
        Commands::Add(cmd) => execute_add(cmd, &service),
        Commands::List(cmd) => execute_list(cmd, config, &service),
        Commands::Share(cmd) => execute_share(cmd, &service),
        Commands::Shares(cmd) => execute_shares(cmd, config, &service),
        Commands::Delete(cmd) => {
            service.delete_note(NoteId::new(cmd.note_id))?;
            println!("Note {} deleted", cmd.note_id);
            Ok(())
        }
    }
}

fn execute_add(cmd: &AddCommand, service: &NoteService) -> Result<()> {
    let mut new_note = NewNote::new(&cmd.owner, &cmd.title, &cmd.content).pinned(cmd.pinned);
    if let Some(tags) = &cmd.tags {
        new_note = new_note.tags(parse_tags(tags));
    }
    if let Some(color) = &cmd.color {
        new_note = new_note.color(color);
    }

    let note = service.create_note(new_note).context("Failed to create note")?;

    print!("Note created (id: {})", note.id());
    if !note.tags().is_empty() {
        print!(" with tags: {}", note.tag_names().join(", "));
    }
    println!();
    Ok(())
}

fn execute_list(cmd: &ListCommand, config: &Config, service: &NoteService) -> Result<()> {
    let filter = NoteFilter {
        owner: cmd.owner.clone(),
        search: cmd.search.clone(),
        tags: cmd.tags.as_deref().map(parse_tags),
        all_tags: cmd.all_tags.as_deref().map(parse_tags),
        color: cmd.color.clone(),
        pinned: cmd.pinned,
    };
    let request = page_request(&cmd.paging, config)?;
    let page = service.list_notes(&filter, request)?;

    print_page(&page, cmd.paging.json, format_note)
}

fn execute_share(cmd: &ShareCommand, service: &NoteService) -> Result<()> {
    let ttl = cmd.ttl_hours.map(share_ttl).transpose()?;
    let token = service.create_share_token(NoteId::new(cmd.note_id), &cmd.owner, ttl)?;
    println!("{}", format_share_token(&token));
    Ok(())
}

/// Converts `--ttl-hours` to a duration, rejecting values too large to represent.
fn share_ttl(hours: i64) -> Result<time::Duration, ServiceError> {
    hours
        .checked_mul(3600)
        .map(time::Duration::seconds)
        .ok_or_else(|| ServiceError::Validation(format!("Share token lifetime of {hours} hours is too long")))
}

fn execute_shares(cmd: &SharesCommand, config: &Config, service: &NoteService) -> Result<()> {
    let filter = ShareTokenFilter {
        owner: cmd.owner.clone(),
        note: cmd.note.map(NoteId::new),
        search: cmd.search.clone(),
        active_at: None,
    };
    let request = page_request(&cmd.paging, config)?;
    let page = service.list_share_tokens(&filter, request)?;

    print_page(&page, cmd.paging.json, format_share_token)
}

fn page_request(args: &PageArgs, config: &Config) -> Result<PageRequest> {
    let size = args.size.unwrap_or(config.default_page_size);
    let sort = Sort::parse(&args.sort)?;
    Ok(PageRequest::of(args.page, size)?.with_sort(sort))
}

fn print_page<E: Serialize>(page: &Page<E>, json: bool, format: impl Fn(&E) -> String) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(page)?);
        return Ok(());
    }

    for entity in page.content() {
        println!("{}", format(entity));
    }
    println!(
        "page {} of {} ({} total)",
        page.request().page_index() + 1,
        page.total_pages().max(1),
        page.total_elements()
    );
    Ok(())
}

fn format_note(note: &Note) -> String {
    let mut line = format!("[{}] {}{}", note.id(), if note.is_pinned() { "* " } else { "" }, note.title());
    if let Some(color) = note.color() {
        line.push_str(&format!(" ({color})"));
    }
    if !note.tags().is_empty() {
        line.push_str(&format!(" #{}", note.tag_names().join(" #")));
    }
    line
}

fn format_share_token(token: &ShareToken) -> String {
    let expiry = token
        .expires_at()
        .map(|at| format!("expires {}", at.unix_timestamp()))
        .unwrap_or_else(|| "never expires".to_string());
    format!(
        "{} -> note {} \"{}\" ({expiry})",
        token.token(),
        token.note().id(),
        token.note().title()
    )
}

/// Parses comma-separated tags from a string.
///
/// Splits on commas, trims whitespace from each tag, and filters out empty strings.
fn parse_tags(input: &str) -> Vec<String> {
    input
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}
