mod config;
mod db;
mod error;
mod models;
mod operations;

use chrono::Local;
use clap::Parser;
use config::AppConfig;
use error::{FinanceError, FinanceResult};
use models::budget::MonthKey;
use models::transaction::{NewTransaction, Transaction};
use operations::add::{add_transaction_to_db, parse_entry_line, AddOutcome};
use operations::edit::{apply_edits, edit_transaction_db, FieldEdits};
use operations::extract::{GeminiClient, ReceiptExtractor};
use rusqlite::Connection;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;

#[derive(Parser, Debug)]
#[command(name = "finsight", about = "Personal finance tracker with receipt scanning and budgets")]
struct Cli {
    /// SQLite file to use instead of DB_HOST/DB_NAME
    #[arg(long)]
    database: Option<PathBuf>,

    /// Load settings from this file instead of ./.env
    #[arg(long)]
    env_file: Option<PathBuf>,

    /// Disable receipt scanning even when GEMINI_API_KEY is set
    #[arg(long)]
    no_ai: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Add,
    Edit,
    Remove,
    List,
    Scan,
    Budget,
    Status,
    Alerts,
    Dashboard,
    Import,
    Seed,
    Tax,
    Help,
    Exit,
}

struct Session {
    conn: Connection,
    extractor: Option<ReceiptExtractor<GeminiClient>>,
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        log::error!("{}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> FinanceResult<()> {
    let mut config = AppConfig::from_env(cli.env_file.as_deref())?;
    if cli.database.is_some() {
        config.db.path_override = cli.database;
    }
    log::debug!("Resolved configuration: {:?}", config);

    let conn = db::connection::establish_connection(&config.db)?;
    let extractor = if cli.no_ai || !config.ai.is_enabled() {
        log::info!("Receipt scanning is disabled");
        None
    } else {
        match GeminiClient::new(&config.ai) {
            Ok(client) => Some(ReceiptExtractor::new(client)),
            Err(e) => {
                log::warn!("Receipt scanning unavailable: {}", e);
                None
            }
        }
    };
    let session = Session { conn, extractor };

    println!("Welcome to finsight!");
    print_help();

    loop {
        print!("> ");
        io::stdout().flush()?;

        let Some(input) = read_line()? else {
            println!();
            break;
        };
        let (command, args) = split_command(&input);
        if command.is_empty() {
            continue;
        }

        let Some(action) = parse_action(command) else {
            println!("Unknown command '{}'.", command);
            print_help();
            continue;
        };

        let result = match action {
            Action::Add => handle_add(&session, args),
            Action::Edit => handle_edit(&session, args),
            Action::Remove => handle_remove(&session, args),
            Action::List => handle_list(&session, args),
            Action::Scan => handle_scan(&session, args),
            Action::Budget => handle_budget(&session, args),
            Action::Status => handle_status(&session, args),
            Action::Alerts => handle_alerts(&session),
            Action::Dashboard => handle_dashboard(&session, args),
            Action::Import => handle_import(&session, args),
            Action::Seed => handle_seed(&session),
            Action::Tax => handle_tax(&session, args),
            Action::Help => {
                print_help();
                Ok(())
            }
            Action::Exit => {
                println!("Exiting the application.");
                break;
            }
        };

        if let Err(e) = result {
            println!("Error: {}", e);
        }
    }

    Ok(())
}

pub fn parse_action(input: &str) -> Option<Action> {
    match input.to_lowercase().as_str() {
        "add" => Some(Action::Add),
        "edit" => Some(Action::Edit),
        "remove" | "rm" => Some(Action::Remove),
        "list" | "ls" => Some(Action::List),
        "scan" => Some(Action::Scan),
        "budget" => Some(Action::Budget),
        "status" => Some(Action::Status),
        "alerts" => Some(Action::Alerts),
        "dashboard" => Some(Action::Dashboard),
        "import" => Some(Action::Import),
        "seed" => Some(Action::Seed),
        "tax" => Some(Action::Tax),
        "help" | "?" => Some(Action::Help),
        "exit" | "quit" => Some(Action::Exit),
        _ => None,
    }
}

fn split_command(input: &str) -> (&str, &str) {
    let input = input.trim();
    match input.split_once(char::is_whitespace) {
        Some((command, rest)) => (command, rest.trim()),
        None => (input, ""),
    }
}

fn print_help() {
    println!(
        "Commands:
  add                                  enter a transaction
  edit <id>                            change fields of a transaction
  remove <id>                          delete a transaction
  list [category=.. source=.. month=.. from=.. to=.. limit=..]
  scan <image>                         read a receipt and review it before saving
  budget set <category> <limit> [YYYY-MM]
  budget list [YYYY-MM]
  budget months                        months that have budgets
  budget delete <category> [YYYY-MM]
  status [YYYY-MM]                     spend against budgets
  alerts                               budget alerts, newest first
  dashboard [YYYY-MM]                  full screen overview
  import <file.csv>                    bulk import date,vendor,amount,category[,note]
  seed                                 add sample data to an empty store
  tax [YYYY] [out.json]                draft tax return from stored transactions
  help
  exit"
    );
}

/// `None` on end of input.
fn read_line() -> FinanceResult<Option<String>> {
    let mut input = String::new();
    let read = io::stdin().read_line(&mut input)?;
    if read == 0 {
        return Ok(None);
    }
    Ok(Some(input.trim().to_string()))
}

fn prompt(label: &str) -> FinanceResult<String> {
    print!("{}", label);
    io::stdout().flush()?;
    Ok(read_line()?.unwrap_or_default())
}

fn prompt_if_empty<'a>(args: &'a str, label: &str, owned: &'a mut String) -> FinanceResult<&'a str> {
    if !args.is_empty() {
        return Ok(args);
    }
    *owned = prompt(label)?;
    Ok(owned.as_str())
}

fn print_transaction(t: &Transaction) {
    println!(
        "{}  {}  {:<24} {:>10}  {:<14} {}{}",
        t.id,
        t.date,
        t.vendor,
        t.amount,
        t.category.as_str(),
        t.source_type,
        t.note.as_deref().map(|n| format!("  ({})", n)).unwrap_or_default()
    );
}

fn print_outcome(outcome: &AddOutcome) {
    println!("Transaction saved with id {}", outcome.id);
    if let Some(alert) = &outcome.alert {
        println!("Budget alert: {}", alert.message);
    }
}

/// Shows every field with its current value; an empty answer keeps it and
/// `-` clears the note.
fn prompt_field_edits(current: &NewTransaction) -> FinanceResult<FieldEdits> {
    let ask = |label: &str, value: &str| -> FinanceResult<Option<String>> {
        let answer = prompt(&format!("{} [{}]: ", label, value))?;
        Ok((!answer.is_empty()).then_some(answer))
    };

    let mut edits = FieldEdits {
        date: ask("Date", &current.date.to_string())?,
        vendor: ask("Vendor", &current.vendor)?,
        amount: ask("Amount", &current.amount.to_string())?,
        category: ask("Category", current.category.as_str())?,
        note: ask("Note", current.note.as_deref().unwrap_or(""))?,
    };
    if edits.note.as_deref() == Some("-") {
        edits.note = Some(String::new());
    }
    Ok(edits)
}

fn handle_add(session: &Session, args: &str) -> FinanceResult<()> {
    let mut owned = String::new();
    let input = prompt_if_empty(
        args,
        "Enter date(YYYY-MM-DD), vendor, amount, category[, note]:\n",
        &mut owned,
    )?;
    let transaction = parse_entry_line(input)?;
    let outcome = add_transaction_to_db(&session.conn, &transaction)?;
    print_outcome(&outcome);
    Ok(())
}

fn handle_edit(session: &Session, args: &str) -> FinanceResult<()> {
    let mut owned = String::new();
    let id = prompt_if_empty(args, "Transaction id to edit: ", &mut owned)?;
    let current = db::repository::get_transaction(&session.conn, id)?
        .ok_or_else(|| FinanceError::transaction_not_found(id))?;

    let edits = prompt_field_edits(&current.into())?;
    if edits.is_empty() {
        println!("Nothing changed.");
        return Ok(());
    }
    let updated = edit_transaction_db(&session.conn, id, &edits)?;
    println!(
        "Transaction {} updated: {} {} {} {}",
        id, updated.date, updated.vendor, updated.amount, updated.category
    );
    Ok(())
}

fn handle_remove(session: &Session, args: &str) -> FinanceResult<()> {
    let mut owned = String::new();
    let id = prompt_if_empty(args, "Transaction id to remove: ", &mut owned)?;
    operations::remove::remove_transaction_from_db(&session.conn, id)?;
    println!("Transaction removed successfully.");
    Ok(())
}

fn handle_list(session: &Session, args: &str) -> FinanceResult<()> {
    let transactions = operations::list::list_transactions_db(&session.conn, args)?;
    if transactions.is_empty() {
        println!("No transactions found.");
        return Ok(());
    }
    for transaction in &transactions {
        print_transaction(transaction);
    }
    println!("{} transaction(s)", transactions.len());
    Ok(())
}

fn handle_scan(session: &Session, args: &str) -> FinanceResult<()> {
    let Some(extractor) = &session.extractor else {
        return Err(FinanceError::Config(
            "Receipt scanning is disabled. Set GEMINI_API_KEY to enable it.".to_string(),
        ));
    };

    let mut owned = String::new();
    let path = prompt_if_empty(args, "Path to receipt image: ", &mut owned)?;
    let bytes = std::fs::read(Path::new(path))
        .map_err(|e| FinanceError::Io(format!("Failed to read '{}': {}", path, e)))?;

    println!("Reading receipt...");
    let fields = extractor.extract(&bytes)?;
    if fields.date.is_none() {
        println!("No date found on the receipt, today's date will be used.");
    }
    if !fields.items.is_empty() {
        println!("Items:");
        for item in &fields.items {
            match item.price {
                Some(price) => println!("  {:<30} {:>10}", item.name, price),
                None => println!("  {}", item.name),
            }
        }
    }

    println!("Review the extracted fields (enter keeps a value, '-' clears the note):");
    let extracted = fields.into_new_transaction(Local::now().date_naive());
    let edits = prompt_field_edits(&extracted)?;
    let reviewed = apply_edits(extracted, &edits)?;

    let confirm = prompt(&format!(
        "Save {} {} {} {}? (y/n): ",
        reviewed.date, reviewed.vendor, reviewed.amount, reviewed.category
    ))?;
    if !confirm.eq_ignore_ascii_case("y") {
        println!("Receipt discarded.");
        return Ok(());
    }

    let outcome = add_transaction_to_db(&session.conn, &reviewed)?;
    print_outcome(&outcome);
    Ok(())
}

fn handle_budget(session: &Session, args: &str) -> FinanceResult<()> {
    let (sub, rest) = split_command(args);
    let parts: Vec<&str> = rest.split_whitespace().collect();

    match sub.to_lowercase().as_str() {
        "set" => {
            let [category, limit, month @ ..] = parts.as_slice() else {
                return Err(FinanceError::Validation(
                    "Usage: budget set <category> <limit> [YYYY-MM]".to_string(),
                ));
            };
            let month = operations::budget::set_budget_db(
                &session.conn,
                category,
                month.first().copied().unwrap_or(""),
                limit,
            )?;
            println!("Budget for {} in {} set to {}", category, month, limit);
        }
        "list" | "" => {
            let (month, budgets) =
                operations::budget::list_budgets_db(&session.conn, parts.first().copied().unwrap_or(""))?;
            if budgets.is_empty() {
                println!("No budgets set for {}.", month);
            }
            for (category, limit) in &budgets {
                println!("{:<15} {:>10}", category.as_str(), limit);
            }
        }
        "months" => {
            let months = db::budget_repository::list_budget_months(&session.conn)?;
            if months.is_empty() {
                println!("No budgets set yet.");
            }
            for month in &months {
                println!("{}", month);
            }
        }
        "delete" => {
            let [category, month @ ..] = parts.as_slice() else {
                return Err(FinanceError::Validation(
                    "Usage: budget delete <category> [YYYY-MM]".to_string(),
                ));
            };
            operations::budget::delete_budget_db(&session.conn, category, month.first().copied().unwrap_or(""))?;
            println!("Budget deleted.");
        }
        other => {
            return Err(FinanceError::Validation(format!(
                "Unknown budget command '{}'. Use set, list, months or delete.",
                other
            )));
        }
    }
    Ok(())
}

fn parse_month_arg(args: &str) -> FinanceResult<MonthKey> {
    if args.is_empty() {
        Ok(MonthKey::current())
    } else {
        MonthKey::from_str(args)
    }
}

fn handle_status(session: &Session, args: &str) -> FinanceResult<()> {
    let month = parse_month_arg(args)?;
    let lines = operations::evaluate::evaluate(&session.conn, month)?;
    if lines.is_empty() {
        println!("No spending or budgets for {}.", month);
        return Ok(());
    }

    println!("Budget status for {}:", month);
    for (category, line) in &lines {
        let limit = line.limit.map(|l| l.to_string()).unwrap_or_else(|| "-".to_string());
        let utilization = line
            .utilization_percent()
            .map(|p| format!("{}%", p))
            .unwrap_or_default();
        let marker = if line.is_near_limit() { "  near limit" } else { "" };
        println!(
            "{:<15} spent {:>10}  limit {:>10}  {:<10} {}{}",
            category.as_str(),
            line.spent,
            limit,
            line.status.as_str(),
            utilization,
            marker
        );
    }
    Ok(())
}

fn handle_alerts(session: &Session) -> FinanceResult<()> {
    let alerts = db::alert_repository::get_all_alerts(&session.conn)?;
    if alerts.is_empty() {
        println!("No budget alerts.");
    }
    for alert in &alerts {
        println!(
            "#{:<4} {}  {}  {:<14} {}",
            alert.id,
            alert.created_at,
            alert.month,
            alert.category.as_str(),
            alert.message
        );
    }
    Ok(())
}

fn handle_dashboard(session: &Session, args: &str) -> FinanceResult<()> {
    let month = parse_month_arg(args)?;
    operations::dashboard::run_dashboard(&session.conn, month)
}

fn handle_import(session: &Session, args: &str) -> FinanceResult<()> {
    let mut owned = String::new();
    let path = prompt_if_empty(args, "Path to the CSV file: ", &mut owned)?;
    let count = operations::import::import_transactions_to_db(&session.conn, Path::new(path))?;
    println!("Successfully imported {} transactions.", count);
    Ok(())
}

fn handle_seed(session: &Session) -> FinanceResult<()> {
    let inserted = operations::seed::seed_sample_data(&session.conn, Local::now().date_naive())?;
    if inserted == 0 {
        println!("The store already has transactions, no sample data added.");
    } else {
        println!("Added {} sample transactions.", inserted);
    }
    Ok(())
}

/// Splits `tax` arguments into an optional four digit year and an output path.
fn parse_tax_args(args: &str) -> FinanceResult<(Option<i32>, PathBuf)> {
    let mut year = None;
    let mut output = None;
    for token in args.split_whitespace() {
        if token.len() == 4 && token.chars().all(|c| c.is_ascii_digit()) && year.is_none() {
            year = token.parse::<i32>().ok();
        } else if output.is_none() {
            output = Some(PathBuf::from(token));
        } else {
            return Err(FinanceError::Validation(
                "Usage: tax [YYYY] [output.json]".to_string(),
            ));
        }
    }
    Ok((year, output.unwrap_or_else(|| PathBuf::from(operations::tax::DEFAULT_OUTPUT))))
}

fn handle_tax(session: &Session, args: &str) -> FinanceResult<()> {
    let (year, output) = parse_tax_args(args)?;
    let tax_return = operations::tax::generate_tax_return_db(&session.conn, year)?;
    operations::tax::write_tax_return(&tax_return, &output)?;

    println!("Tax return for {}:", tax_return.period);
    println!("  Salary           {:>12}", tax_return.income_details.salary);
    println!("  Deduction 80D    {:>12}", tax_return.deduction.section_80d);
    println!("  Taxable income   {:>12}", tax_return.summary.taxable_income);
    println!("Saved to {}", output.display());
    Ok(())
}
