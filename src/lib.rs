pub mod availability;
pub mod cli;
pub mod data;
pub mod dedup;
pub mod derive;
pub mod error;
pub mod expenses;
pub mod io_utils;
pub mod kpis;
pub mod pipeline;
pub mod project;
pub mod properties;
pub mod schema;
pub mod table;
pub mod validate;
pub mod workbook;

use std::{env, sync::OnceLock};

use anyhow::{Context, Result};
use clap::Parser;
use log::{LevelFilter, info};

use crate::{
    availability::DateWindow,
    cli::{Cli, Commands},
    io_utils::printable_delimiter,
    kpis::ExpenseFigures,
    pipeline::IngestOptions,
    properties::PropertyLookup,
    schema::Schema,
    workbook::SheetSelector,
};

static LOGGER: OnceLock<()> = OnceLock::new();

fn init_logging() {
    LOGGER.get_or_init(|| {
        let mut builder = env_logger::Builder::from_env(env_logger::Env::default());
        if env::var("RUST_LOG").is_err() {
            builder.filter_module("rental_ledger", LevelFilter::Info);
        }
        let _ = builder.format_timestamp_millis().try_init();
    });
}

pub fn run() -> Result<()> {
    init_logging();
    let cli = Cli::parse();
    match cli.command {
        Commands::Columns(args) => handle_columns(&args),
        Commands::Ingest(args) => handle_ingest(&args),
        Commands::Expenses(args) => handle_expenses(&args),
        Commands::Kpis(args) => handle_kpis(&args),
    }
}

fn handle_columns(args: &cli::ColumnsArgs) -> Result<()> {
    let schema = Schema::load(&args.schema)?;
    let headers: Vec<String> = ["position", "source", "canonical", "datatype", "required"]
        .iter()
        .map(|s| s.to_string())
        .collect();
    let rows: Vec<Vec<String>> = schema
        .columns
        .iter()
        .enumerate()
        .map(|(idx, spec)| {
            vec![
                spec.column.clone().unwrap_or_else(|| (idx + 1).to_string()),
                spec.source.clone(),
                spec.rename.clone(),
                spec.datatype.signature_token(),
                if spec.required { "yes" } else { "no" }.to_string(),
            ]
        })
        .collect();
    if args.table {
        table::print_table(&headers, &rows);
    } else {
        for row in &rows {
            println!("{}", row.join("\t"));
        }
    }
    Ok(())
}

fn handle_ingest(args: &cli::IngestArgs) -> Result<()> {
    let delimiter = args
        .output_delimiter
        .unwrap_or(io_utils::DEFAULT_CSV_DELIMITER);
    info!(
        "Ingesting '{}' with schema '{}' and output delimiter '{}'",
        args.input.display(),
        args.schema.display(),
        printable_delimiter(delimiter)
    );
    let schema = Schema::load(&args.schema)?;
    let options = IngestOptions {
        sheet: SheetSelector::parse(&args.sheet),
        header_row: args.header_row,
        encoding: io_utils::resolve_encoding(args.input_encoding.as_deref())?,
        on_error: args.on_error.into(),
        zero_division: args.zero_division.into(),
    };
    let frame = pipeline::run_batch(&args.input, &schema, &options)?;
    pipeline::write_frame(&args.output, &frame, delimiter)
        .with_context(|| format!("Writing canonical dataset to {:?}", args.output))?;
    Ok(())
}

fn handle_expenses(args: &cli::ExpensesArgs) -> Result<()> {
    let sheet = SheetSelector::parse(&args.sheet);
    let encoding = io_utils::resolve_encoding(args.input_encoding.as_deref())?;
    let frame = workbook::read_sheet(&args.input, &sheet, args.header_row, encoding)?;
    let ledger = expenses::clean_ledger(expenses::read_ledger(&frame)?);
    let netted = expenses::net_expenses(&ledger);
    expenses::write_netted(&args.output, &netted)
        .with_context(|| format!("Writing netted ledger to {:?}", args.output))?;

    let totals = expenses::totals(&netted);
    info!(
        "{} expense line(s): net {}, VAT {}, gross {}",
        netted.len(),
        data::format_amount(totals.net),
        data::format_amount(totals.vat),
        data::format_amount(totals.gross)
    );
    if args.table {
        let headers = vec!["sector".to_string(), "net".to_string()];
        let rows: Vec<Vec<String>> = expenses::sector_totals(&netted)
            .into_iter()
            .map(|(sector, net)| vec![sector, data::format_amount(net)])
            .collect();
        table::print_table(&headers, &rows);
    }
    Ok(())
}

fn handle_kpis(args: &cli::KpisArgs) -> Result<()> {
    let window = DateWindow::new(args.from, args.to)?;
    let stays = kpis::read_stays(&args.input)?;

    let available_nights = match &args.availability {
        Some(path) => {
            let frame =
                workbook::read_sheet(path, &SheetSelector::Index(0), 1, encoding_rs::UTF_8)?;
            availability::available_nights(&frame, window)
                .iter()
                .map(|p| p.nights)
                .sum()
        }
        None => 0,
    };
    let figures = match &args.expenses {
        Some(path) => Some(ExpenseFigures::from_expenses(&expenses::read_netted(path)?)),
        None => None,
    };
    let lookup = match &args.properties {
        Some(path) => {
            let frame =
                workbook::read_sheet(path, &SheetSelector::Index(0), 1, encoding_rs::UTF_8)?;
            Some(PropertyLookup::from_frame(&frame)?)
        }
        None => None,
    };

    let snapshot = kpis::compute(
        &stays,
        available_nights,
        figures.as_ref(),
        lookup.as_ref(),
        args.depreciation,
    );
    info!(
        "computed {} KPI(s) over {} stay(s)",
        snapshot.entries().len(),
        stays.len()
    );

    if let Some(output) = &args.output {
        snapshot
            .save(output)
            .with_context(|| format!("Writing KPI snapshot to {output:?}"))?;
    }
    if args.table || args.output.is_none() {
        let headers = vec!["kpi".to_string(), "value".to_string()];
        let rows: Vec<Vec<String>> = snapshot
            .entries()
            .iter()
            .map(|(name, value)| vec![name.clone(), data::format_amount(*value)])
            .collect();
        table::print_table(&headers, &rows);
    }
    Ok(())
}
