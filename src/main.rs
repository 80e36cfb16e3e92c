//! Purpose: `prodcat` CLI entry point.
//! Role: Binary crate root; parses args, resolves the API base URL, runs commands.
//! Invariants: Tables and receipts go to stdout; diagnostics go to stderr.
//! Invariants: Non-interactive errors are emitted as a JSON envelope on stderr.
//! Invariants: Process exit code is derived from `api::to_exit_code`.
#![allow(clippy::result_large_err)]
use std::error::Error as StdError;
use std::io::{self, IsTerminal};
use std::net::SocketAddr;
use std::sync::Arc;

use clap::{CommandFactory, Parser, Subcommand, ValueEnum, error::ErrorKind as ClapErrorKind};
use clap_complete::aot::Shell;
use serde_json::{Map, Value, json};
use tracing_subscriber::EnvFilter;

mod color_json;
mod command_dispatch;
mod serve;
mod store;

use color_json::render_json;
use prodcat::api::{
    CatalogClient, CatalogView, CategoryFilter, Error, ErrorKind, FilterState, HttpTransport,
    ListStatus, Product, ProductForm, Statistics, Transport, to_exit_code,
};
use prodcat::core::money::{format_average, format_date, format_price};

const DEFAULT_API_URL: &str = "http://localhost:8080";
const API_URL_ENV: &str = "PRODCAT_API_URL";

#[derive(Copy, Clone, Debug)]
struct RunOutcome {
    exit_code: i32,
}

impl RunOutcome {
    fn ok() -> Self {
        Self { exit_code: 0 }
    }

    fn with_code(exit_code: i32) -> Self {
        Self { exit_code }
    }
}

fn main() {
    let exit_code = match run() {
        Ok(outcome) => outcome.exit_code,
        Err((err, color_mode)) => {
            emit_error(&err, color_mode);
            to_exit_code(err.kind())
        }
    };
    std::process::exit(exit_code);
}

fn run() -> Result<RunOutcome, (Error, ColorMode)> {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => match err.kind() {
            ClapErrorKind::DisplayHelp
            | ClapErrorKind::DisplayVersion
            | ClapErrorKind::DisplayHelpOnMissingArgumentOrSubcommand => {
                err.print().map_err(|io_err| {
                    (
                        Error::new(ErrorKind::Io)
                            .with_message("failed to write help")
                            .with_source(io_err),
                        ColorMode::Auto,
                    )
                })?;
                let exit_code = if matches!(
                    err.kind(),
                    ClapErrorKind::DisplayHelpOnMissingArgumentOrSubcommand
                ) {
                    2
                } else {
                    0
                };
                return Ok(RunOutcome::with_code(exit_code));
            }
            _ => {
                return Err((
                    Error::new(ErrorKind::Usage)
                        .with_message(clap_error_summary(&err))
                        .with_hint(clap_error_hint(&err)),
                    ColorMode::Auto,
                ));
            }
        },
    };

    let color_mode = cli.color;
    if !matches!(cli.command, Command::Serve { .. }) {
        init_client_tracing();
    }
    let api_url = resolve_api_url(cli.api_url, std::env::var(API_URL_ENV).ok());

    command_dispatch::dispatch_command(cli.command, &api_url, color_mode)
        .map_err(add_remote_hint)
        .map_err(|err| (err, color_mode))
}

#[derive(Parser)]
#[command(
    name = "prodcat",
    version,
    about = "Browse and edit a product catalogue over its REST API",
    after_help = r#"EXAMPLES
  $ prodcat serve --seed                       # Terminal 1: reference backend on :8080
  $ prodcat list --category calcados --desc    # Terminal 2: footwear, priciest first
  $ prodcat create --name "Boné azul" --price 49,90 --category acessorios
  $ prodcat update 3 --price 59,90
  $ prodcat delete 3
  $ prodcat list --deleted

CONFIGURATION
  The API base URL comes from --api-url, then $PRODCAT_API_URL, then http://localhost:8080."#,
    arg_required_else_help = true
)]
struct Cli {
    #[arg(long, global = true, help = "API base URL (default: $PRODCAT_API_URL or http://localhost:8080)")]
    api_url: Option<String>,
    #[arg(
        long,
        global = true,
        default_value = "auto",
        value_enum,
        help = "Colorize diagnostics and pretty JSON output: auto|always|never"
    )]
    color: ColorMode,

    #[command(subcommand)]
    command: Command,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum ColorMode {
    Auto,
    Always,
    Never,
}

impl ColorMode {
    fn use_color(self, is_tty: bool) -> bool {
        match self {
            ColorMode::Auto => is_tty,
            ColorMode::Always => true,
            ColorMode::Never => false,
        }
    }
}

#[derive(Subcommand)]
enum Command {
    #[command(
        about = "List products with statistics",
        after_help = r#"EXAMPLES
  $ prodcat list
  $ prodcat list --category roupas --desc
  $ prodcat list --deleted --json"#
    )]
    List {
        #[arg(long, help = "Category filter: todas|roupas|roupas_intimas|calcados|acessorios")]
        category: Option<String>,
        #[arg(long, help = "Sort by price, highest first")]
        desc: bool,
        #[arg(long, help = "Show soft-deleted products instead of active ones")]
        deleted: bool,
        #[arg(long, help = "Emit JSON instead of a table")]
        json: bool,
    },
    #[command(about = "Show product count and average price")]
    Stats {
        #[arg(long, help = "Category filter: todas|roupas|roupas_intimas|calcados|acessorios")]
        category: Option<String>,
        #[arg(long, help = "Emit JSON")]
        json: bool,
    },
    #[command(about = "Show one product by id")]
    Get {
        id: u64,
        #[arg(long, help = "Emit JSON")]
        json: bool,
    },
    #[command(
        about = "Create a product",
        after_help = r#"EXAMPLES
  $ prodcat create --name "Camiseta" --price 49,90 --category roupas"#
    )]
    Create {
        #[arg(long, help = "Product name (at least 3 characters)")]
        name: Option<String>,
        #[arg(long, help = "Price, e.g. 49,90 or R$ 1.234,56")]
        price: Option<String>,
        #[arg(long, help = "Category: roupas|roupas_intimas|calcados|acessorios")]
        category: Option<String>,
    },
    #[command(
        about = "Edit a product; omitted fields keep their current value",
        after_help = r#"EXAMPLES
  $ prodcat update 3 --price 59,90
  $ prodcat update 3 --name "Tênis de corrida" --category calcados"#
    )]
    Update {
        id: u64,
        #[arg(long, help = "New name")]
        name: Option<String>,
        #[arg(long, help = "New price")]
        price: Option<String>,
        #[arg(long, help = "New category")]
        category: Option<String>,
    },
    #[command(about = "Soft-delete a product")]
    Delete { id: u64 },
    #[command(
        about = "Run the in-memory reference backend",
        after_help = r#"EXAMPLES
  $ prodcat serve --seed
  $ RUST_LOG=debug prodcat serve --bind 127.0.0.1:9000"#
    )]
    Serve {
        #[arg(long, default_value = "127.0.0.1:8080", help = "Address to listen on")]
        bind: String,
        #[arg(long, help = "Start with a small demo catalogue")]
        seed: bool,
        #[arg(long = "cors-origin", help = "Allowed browser origin (repeatable)")]
        cors_origins: Vec<String>,
        #[arg(long, help = "Allow binding to a non-loopback address")]
        allow_non_loopback: bool,
    },
    #[command(
        arg_required_else_help = true,
        about = "Generate shell completions",
        after_help = r#"EXAMPLES
  $ prodcat completion bash > ~/.local/share/bash-completion/completions/prodcat
  $ prodcat completion zsh > ~/.zfunc/_prodcat"#
    )]
    Completion {
        #[arg(help = "Shell to generate completions for")]
        shell: Shell,
    },
}

fn resolve_api_url(flag: Option<String>, env: Option<String>) -> String {
    flag.into_iter()
        .chain(env)
        .map(|value| value.trim().to_string())
        .find(|value| !value.is_empty())
        .unwrap_or_else(|| DEFAULT_API_URL.to_string())
}

fn init_client_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(io::stderr)
        .with_target(false)
        .try_init();
}

fn open_transport(api_url: &str) -> Result<Arc<dyn Transport>, Error> {
    Ok(Arc::new(HttpTransport::new(api_url)?))
}

fn client(api_url: &str) -> Result<CatalogClient<HttpTransport>, Error> {
    Ok(CatalogClient::new(HttpTransport::new(api_url)?))
}

fn parse_filter(category: Option<&str>) -> Result<CategoryFilter, Error> {
    category.map_or(Ok(CategoryFilter::All), str::parse::<CategoryFilter>)
}

/// Apply CLI overrides on top of a form (empty for create, pre-filled for update).
fn form_with_overrides(
    base: ProductForm,
    name: Option<String>,
    price: Option<String>,
    category: Option<String>,
) -> ProductForm {
    ProductForm {
        name: name.unwrap_or(base.name),
        price: price.unwrap_or(base.price),
        category: category.unwrap_or(base.category),
    }
}

/// Run the catalog screen once for `filter` and wait for both fetches.
fn load_catalog(transport: Arc<dyn Transport>, filter: FilterState) -> CatalogView {
    let mut view = CatalogView::open(transport, filter);
    view.settle();
    view
}

fn product_json(product: &Product) -> Value {
    serde_json::to_value(product).unwrap_or(Value::Null)
}

fn statistics_json(stats: &Statistics) -> Value {
    json!({
        "qntProdutos": stats.active_count,
        "precoMedio": stats.average_price_minor,
    })
}

fn statistics_line(stats: &Statistics, filter: CategoryFilter) -> String {
    format!(
        "{}: {} products, average price R$ {}",
        filter.label(),
        stats.active_count,
        format_average(stats.average_price_minor)
    )
}

fn emit_catalog(view: &CatalogView, json: bool, color_mode: ColorMode) -> Result<(), Error> {
    let filter = *view.filter();
    let stats_error = view.statistics().error().map(str::to_string);
    let products: &[Product] = match view.status() {
        ListStatus::Ready(products) => products,
        ListStatus::Empty => &[],
        ListStatus::Failed(message) => {
            return Err(Error::new(ErrorKind::Remote)
                .with_message(format!("failed to load products: {message}")));
        }
        ListStatus::Loading => {
            return Err(Error::new(ErrorKind::Internal).with_message("product list still loading"));
        }
    };

    if json {
        let stats = match &stats_error {
            Some(message) => json!({ "error": message }),
            None => statistics_json(view.statistics().data()),
        };
        emit_json(
            json!({
                "filter": {
                    "categoria": filter.category.category().map(|c| c.wire_value()),
                    "sort": if filter.sort_descending { "desc" } else { "asc" },
                    "deleted": filter.show_deleted,
                },
                "statistics": stats,
                "products": products.iter().map(product_json).collect::<Vec<_>>(),
            }),
            color_mode,
        );
        return Ok(());
    }

    match &stats_error {
        Some(message) => {
            let use_color = color_mode.use_color(io::stderr().is_terminal());
            eprintln!(
                "{} statistics unavailable: {message}",
                colorize_label("warning:", use_color, AnsiColor::Yellow)
            );
        }
        None => println!("{}", statistics_line(view.statistics().data(), filter.category)),
    }
    if products.is_empty() {
        println!("No products found.");
        return Ok(());
    }
    println!("{}", product_table(products, filter.show_deleted));
    Ok(())
}

fn product_table(products: &[Product], deleted: bool) -> String {
    let date_header = if deleted { "DELETED" } else { "CREATED" };
    let rows = products
        .iter()
        .map(|product| {
            let date = if deleted {
                product.deleted_at.as_deref().unwrap_or_default()
            } else {
                product.created_at.as_str()
            };
            vec![
                product.id.to_string(),
                product.name.clone(),
                product.category.label().to_string(),
                format!("R$ {}", format_price(product.price_minor)),
                format_date(date),
            ]
        })
        .collect::<Vec<_>>();
    render_table(
        &[
            Column::left("ID"),
            Column::left("NAME"),
            Column::left("CATEGORY"),
            Column::right("PRICE"),
            Column::left(date_header),
        ],
        &rows,
    )
}

fn emit_product_human(product: &Product) {
    let mut lines = vec![
        format!("id:        {}", product.id),
        format!("name:      {}", product.name),
        format!("category:  {}", product.category.label()),
        format!("price:     R$ {}", format_price(product.price_minor)),
        format!("created:   {}", format_date(&product.created_at)),
        format!("updated:   {}", format_date(&product.updated_at)),
    ];
    if let Some(deleted_at) = &product.deleted_at {
        lines.push(format!("deleted:   {}", format_date(deleted_at)));
    }
    println!("{}", lines.join("\n"));
}

fn emit_receipt(action: &str, product: &Product, color_mode: ColorMode) {
    if io::stdout().is_terminal() {
        println!(
            "{action} product {} ({}, R$ {})",
            product.id,
            product.name,
            format_price(product.price_minor)
        );
    } else {
        emit_json(json!({ action: product_json(product) }), color_mode);
    }
}

#[derive(Clone, Copy)]
enum Align {
    Left,
    Right,
}

struct Column<'a> {
    header: &'a str,
    align: Align,
}

impl<'a> Column<'a> {
    fn left(header: &'a str) -> Self {
        Self {
            header,
            align: Align::Left,
        }
    }

    fn right(header: &'a str) -> Self {
        Self {
            header,
            align: Align::Right,
        }
    }
}

fn render_table(columns: &[Column<'_>], rows: &[Vec<String>]) -> String {
    if columns.is_empty() {
        return String::new();
    }
    let cleaned: Vec<Vec<String>> = rows
        .iter()
        .map(|row| {
            (0..columns.len())
                .map(|idx| sanitize_table_cell(row.get(idx).map(String::as_str).unwrap_or("")))
                .collect()
        })
        .collect();
    let widths: Vec<usize> = columns
        .iter()
        .enumerate()
        .map(|(idx, column)| {
            cleaned
                .iter()
                .map(|row| row[idx].chars().count())
                .chain([column.header.chars().count()])
                .max()
                .unwrap_or(0)
        })
        .collect();

    let header: Vec<String> = columns.iter().map(|column| column.header.to_string()).collect();
    std::iter::once(&header)
        .chain(cleaned.iter())
        .map(|cells| format_table_line(columns, cells, &widths))
        .collect::<Vec<_>>()
        .join("\n")
}

fn sanitize_table_cell(value: &str) -> String {
    value.replace('\n', "\\n").replace('\r', "\\r")
}

fn format_table_line(columns: &[Column<'_>], cells: &[String], widths: &[usize]) -> String {
    let mut line = String::new();
    for (idx, (column, width)) in columns.iter().zip(widths).enumerate() {
        if idx > 0 {
            line.push_str("  ");
        }
        let cell = cells.get(idx).map(String::as_str).unwrap_or("");
        let pad = " ".repeat(width.saturating_sub(cell.chars().count()));
        match column.align {
            Align::Left => {
                line.push_str(cell);
                if idx + 1 < columns.len() {
                    line.push_str(&pad);
                }
            }
            Align::Right => {
                line.push_str(&pad);
                line.push_str(cell);
            }
        }
    }
    line
}

fn emit_json(value: Value, color_mode: ColorMode) {
    let is_tty = io::stdout().is_terminal();
    let use_color = color_mode.use_color(is_tty);
    let text = if is_tty || use_color {
        render_json(&value, use_color)
    } else {
        serde_json::to_string(&value)
            .unwrap_or_else(|_| "{\"error\":\"json encode failed\"}".to_string())
    };
    println!("{text}");
}

#[derive(Copy, Clone, Debug)]
enum AnsiColor {
    Red,
    Yellow,
}

fn colorize_label(label: &str, enabled: bool, color: AnsiColor) -> String {
    if !enabled {
        return label.to_string();
    }
    let code = match color {
        AnsiColor::Red => "31",
        AnsiColor::Yellow => "33",
    };
    format!("\u{1b}[{code}m{label}\u{1b}[0m")
}

fn emit_error(err: &Error, color_mode: ColorMode) {
    let is_tty = io::stderr().is_terminal();
    if is_tty {
        eprintln!("{}", error_text(err, color_mode.use_color(is_tty)));
        return;
    }
    let json = serde_json::to_string(&error_json(err)).unwrap_or_else(|_| {
        "{\"error\":{\"kind\":\"Internal\",\"message\":\"json encode failed\"}}".to_string()
    });
    eprintln!("{json}");
}

fn error_message(err: &Error) -> String {
    if let Some(message) = err.message() {
        return message.to_string();
    }
    match err.kind() {
        ErrorKind::Internal => "internal error",
        ErrorKind::Usage => "usage error",
        ErrorKind::NotFound => "not found",
        ErrorKind::Validation => "invalid input",
        ErrorKind::Remote => "server error",
        ErrorKind::Io => "i/o error",
    }
    .to_string()
}

fn error_causes(err: &Error) -> Vec<String> {
    let mut causes = Vec::new();
    let mut cur = err.source();
    while let Some(source) = cur {
        causes.push(source.to_string());
        cur = source.source();
    }
    causes
}

fn error_json(err: &Error) -> Value {
    let mut inner = Map::new();
    inner.insert("kind".to_string(), json!(format!("{:?}", err.kind())));
    inner.insert("message".to_string(), json!(error_message(err)));
    if let Some(hint) = err.hint() {
        inner.insert("hint".to_string(), json!(hint));
    }
    if let Some(field) = err.field() {
        inner.insert("field".to_string(), json!(field));
    }
    if let Some(status) = err.status() {
        inner.insert("status".to_string(), json!(status));
    }
    let causes = error_causes(err);
    if !causes.is_empty() {
        inner.insert("causes".to_string(), json!(causes));
    }
    json!({ "error": inner })
}

fn error_text(err: &Error, use_color: bool) -> String {
    let mut lines = vec![format!(
        "{} {}",
        colorize_label("error:", use_color, AnsiColor::Red),
        error_message(err)
    )];
    let mut detail = |label: &str, value: String| {
        lines.push(format!(
            "{} {value}",
            colorize_label(label, use_color, AnsiColor::Yellow)
        ));
    };
    if let Some(field) = err.field() {
        detail("field:", field.to_string());
    }
    if let Some(status) = err.status() {
        detail("status:", status.to_string());
    }
    if let Some(hint) = err.hint() {
        detail("hint:", hint.to_string());
    }
    if let Some(cause) = error_causes(err).into_iter().next() {
        detail("caused by:", cause);
    }
    lines.join("\n")
}

fn add_remote_hint(err: Error) -> Error {
    if err.kind() == ErrorKind::Remote && err.hint().is_none() {
        return err.with_hint("The server failed to handle the request; check its logs.");
    }
    err
}

fn parse_bind(bind: &str) -> Result<SocketAddr, Error> {
    bind.parse().map_err(|_| {
        Error::new(ErrorKind::Usage)
            .with_message(format!("invalid bind address: {bind}"))
            .with_hint("Use a host:port value like 127.0.0.1:8080.")
    })
}

fn clap_error_summary(err: &clap::Error) -> String {
    err.to_string()
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .map(|line| line.strip_prefix("error:").unwrap_or(line).trim().to_string())
        .unwrap_or_else(|| "invalid arguments".to_string())
}

fn clap_error_hint(err: &clap::Error) -> String {
    let rendered = err.to_string();
    let subcommand = rendered
        .lines()
        .find_map(|line| line.trim().strip_prefix("Usage: "))
        .and_then(|usage| {
            let mut tokens = usage.split_whitespace();
            tokens.find(|token| *token == "prodcat")?;
            tokens.next().filter(|token| {
                !token.starts_with('-') && !token.starts_with('<') && !token.starts_with('[')
            })
        });
    match subcommand {
        Some(name) => format!("Try `prodcat {name} --help`."),
        None => "Try `prodcat --help`.".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::{
        Column, DEFAULT_API_URL, ProductForm, error_json, error_text, form_with_overrides,
        parse_filter, product_table, render_table, resolve_api_url,
    };
    use prodcat::api::{Category, CategoryFilter, Error, ErrorKind, Product};

    fn product(id: u64, name: &str, price: i64) -> Product {
        Product {
            id,
            name: name.to_string(),
            price_minor: price,
            category: Category::Footwear,
            created_at: "2025-03-04T10:00:00Z".to_string(),
            updated_at: "2025-03-04T10:00:00Z".to_string(),
            deleted_at: None,
        }
    }

    #[test]
    fn api_url_prefers_flag_then_env_then_default() {
        assert_eq!(
            resolve_api_url(Some("http://a:1".into()), Some("http://b:2".into())),
            "http://a:1"
        );
        assert_eq!(resolve_api_url(None, Some("http://b:2".into())), "http://b:2");
        assert_eq!(resolve_api_url(Some("  ".into()), None), DEFAULT_API_URL);
        assert_eq!(resolve_api_url(None, None), DEFAULT_API_URL);
    }

    #[test]
    fn filter_defaults_to_all() {
        assert_eq!(parse_filter(None).expect("all"), CategoryFilter::All);
        assert_eq!(
            parse_filter(Some("calcados")).expect("footwear"),
            CategoryFilter::Only(Category::Footwear)
        );
        assert_eq!(parse_filter(Some("todas")).expect("todas"), CategoryFilter::All);
        assert!(parse_filter(Some("chapeus")).is_err());
    }

    #[test]
    fn overrides_replace_only_given_fields() {
        let base = ProductForm::from_product(&product(3, "Bota", 12990));
        let form = form_with_overrides(base, None, Some("99,90".into()), None);
        assert_eq!(form.name, "Bota");
        assert_eq!(form.price, "99,90");
        assert_eq!(form.category, "calcados");
        let draft = form.validate().expect("valid");
        assert_eq!(draft.price_minor, 9990);
    }

    #[test]
    fn table_right_aligns_prices() {
        let table = product_table(&[product(1, "Tênis", 29990), product(12, "Bota", 990)], false);
        let lines: Vec<&str> = table.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("ID  NAME   CATEGORY"));
        assert!(lines[1].contains("R$ 299,90"));
        assert!(lines[2].contains("  R$ 9,90"));
        assert!(lines[1].ends_with("04/03/2025"));
    }

    #[test]
    fn table_escapes_newlines() {
        let rows = vec![vec!["a\nb".to_string()]];
        assert_eq!(render_table(&[Column::left("X")], &rows), "X\na\\nb");
    }

    #[test]
    fn error_rendering_includes_context() {
        let err = Error::new(ErrorKind::Validation)
            .with_message("name must be at least 3 characters")
            .with_field("name")
            .with_hint("Also fix price.");
        let value = error_json(&err);
        assert_eq!(value["error"]["kind"], "Validation");
        assert_eq!(value["error"]["field"], "name");
        let text = error_text(&err, false);
        assert!(text.starts_with("error: name must be at least 3 characters"));
        assert!(text.contains("hint: Also fix price."));
    }
}
