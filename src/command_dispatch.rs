//! Purpose: Hold top-level CLI command dispatch for `prodcat`.
//! Exports: `dispatch_command`.
//! Role: Keep `main.rs` focused on parse/bootstrap and delegate command execution.
//! Invariants: Writes are validated client-side before any request is sent.
//! Invariants: Helpers in `main.rs` own rendering; this module only sequences calls.

use super::*;

pub(super) fn dispatch_command(
    command: Command,
    api_url: &str,
    color_mode: ColorMode,
) -> Result<RunOutcome, Error> {
    match command {
        Command::Completion { shell } => {
            let mut cmd = Cli::command();
            clap_complete::aot::generate(shell, &mut cmd, "prodcat", &mut io::stdout());
            Ok(RunOutcome::ok())
        }
        Command::List {
            category,
            desc,
            deleted,
            json,
        } => {
            let filter = FilterState {
                category: parse_filter(category.as_deref())?,
                sort_descending: desc,
                show_deleted: deleted,
            };
            let view = load_catalog(open_transport(api_url)?, filter);
            emit_catalog(&view, json, color_mode)?;
            Ok(RunOutcome::ok())
        }
        Command::Stats { category, json } => {
            let filter = parse_filter(category.as_deref())?;
            let stats = client(api_url)?.statistics(filter)?;
            if json {
                emit_json(statistics_json(&stats), color_mode);
            } else {
                println!("{}", statistics_line(&stats, filter));
            }
            Ok(RunOutcome::ok())
        }
        Command::Get { id, json } => {
            let product = client(api_url)?.product(id)?;
            if json {
                emit_json(product_json(&product), color_mode);
            } else {
                emit_product_human(&product);
            }
            Ok(RunOutcome::ok())
        }
        Command::Create {
            name,
            price,
            category,
        } => {
            let form = form_with_overrides(ProductForm::default(), name, price, category);
            let draft = form.validate().map_err(|report| report.into_error())?;
            let product = client(api_url)?.create(&draft)?;
            emit_receipt("created", &product, color_mode);
            Ok(RunOutcome::ok())
        }
        Command::Update {
            id,
            name,
            price,
            category,
        } => {
            if name.is_none() && price.is_none() && category.is_none() {
                return Err(Error::new(ErrorKind::Usage)
                    .with_message("update needs at least one of --name, --price, --category")
                    .with_hint(format!("Try `prodcat update {id} --price 59,90`.")));
            }
            let client = client(api_url)?;
            let current = client.product(id)?;
            let form = form_with_overrides(ProductForm::from_product(&current), name, price, category);
            let draft = form.validate().map_err(|report| report.into_error())?;
            let product = client.update(id, &draft)?;
            emit_receipt("updated", &product, color_mode);
            Ok(RunOutcome::ok())
        }
        Command::Delete { id } => {
            let ack = client(api_url)?.delete(id)?;
            if io::stdout().is_terminal() {
                println!("{ack}");
            } else {
                emit_json(json!({ "deleted": { "id": id, "message": ack } }), color_mode);
            }
            Ok(RunOutcome::ok())
        }
        Command::Serve {
            bind,
            seed,
            cors_origins,
            allow_non_loopback,
        } => {
            let cors_origins = if cors_origins.is_empty() {
                serve::DEFAULT_CORS_ORIGINS
                    .iter()
                    .map(|origin| origin.to_string())
                    .collect()
            } else {
                cors_origins
            };
            let config = serve::ServeConfig {
                bind: parse_bind(&bind)?,
                seed,
                cors_origins,
                allow_non_loopback,
            };
            let runtime = tokio::runtime::Builder::new_multi_thread()
                .enable_all()
                .build()
                .map_err(|err| {
                    Error::new(ErrorKind::Internal)
                        .with_message("failed to start runtime")
                        .with_source(err)
                })?;
            runtime.block_on(serve::serve(config))?;
            Ok(RunOutcome::ok())
        }
    }
}
