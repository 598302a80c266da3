use std::path::PathBuf;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use rust_decimal::Decimal;

use centime_core::{Category, MonthKey, StatementScope};
use centime_ingest::{normalize_rows, resolve, ParsingSchema, RuleSet};
use centime_reconcile::{summarize, AuditEntry, MutationOperation};
use centime_storage::{apply_mutation_batch, create_db, load_summaries, save_statement, DbPool, StatementSave, StorageError};

#[derive(Parser)]
#[command(name = "centime", about = "Statement normalization, categorization and reconciliation")]
struct Cli {
    /// SQLite database path.
    #[arg(long, default_value = "centime.db", global = true)]
    db: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Parse, categorize, reconcile and save one statement.
    Import {
        /// CSV statement file.
        #[arg(long)]
        file: PathBuf,
        /// Parsing schema (TOML).
        #[arg(long)]
        schema: PathBuf,
        /// Categorization rules (JSON array of rule objects).
        #[arg(long)]
        rules: Option<PathBuf>,
        #[arg(long)]
        user: String,
        #[arg(long)]
        bank: String,
        /// Statement month, YYYY-MM.
        #[arg(long)]
        month: MonthKey,
        /// Asserted net flow the categorized totals must reconcile against.
        #[arg(long)]
        net_flow: Decimal,
        #[arg(long)]
        profile: Option<String>,
    },
    /// Overwrite one category's stored total.
    Edit {
        #[arg(long)]
        user: String,
        #[arg(long)]
        bank: String,
        #[arg(long)]
        month: MonthKey,
        #[arg(long)]
        category: Category,
        #[arg(long)]
        amount: Decimal,
        #[arg(long)]
        note: Option<String>,
    },
    /// Move an amount between two categories, zero-sum.
    Transfer {
        #[arg(long)]
        user: String,
        #[arg(long)]
        bank: String,
        #[arg(long)]
        month: MonthKey,
        #[arg(long)]
        from: Category,
        #[arg(long)]
        to: Category,
        #[arg(long)]
        amount: Decimal,
        #[arg(long)]
        note: Option<String>,
    },
    /// Print the stored summary for one statement scope.
    Show {
        #[arg(long)]
        user: String,
        #[arg(long)]
        bank: String,
        #[arg(long)]
        month: MonthKey,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let pool = create_db(&cli.db)
        .await
        .with_context(|| format!("opening database {}", cli.db.display()))?;

    match cli.command {
        Command::Import { file, schema, rules, user, bank, month, net_flow, profile } => {
            import(&pool, file, schema, rules, user, bank, month, net_flow, profile).await
        }
        Command::Edit { user, bank, month, category, amount, note } => {
            let op = MutationOperation::Edit { category, new_amount: amount, note };
            mutate(&pool, user, bank, month, op).await
        }
        Command::Transfer { user, bank, month, from, to, amount, note } => {
            let op = MutationOperation::Transfer {
                from_category: from,
                to_category: to,
                transfer_amount: amount,
                note,
            };
            mutate(&pool, user, bank, month, op).await
        }
        Command::Show { user, bank, month } => {
            let scope = StatementScope::new(user, bank, month);
            let summaries = load_summaries(&pool, &scope).await?;
            if summaries.is_empty() {
                println!("no statement saved for {} / {} / {}", scope.user, scope.bank, scope.month);
                return Ok(());
            }
            let mut net = Decimal::ZERO;
            for s in &summaries {
                println!("{:<24} {:>12.2}  ({} txs)", s.category.to_string(), s.amount, s.transaction_count);
                net += s.amount;
            }
            println!("{:<24} {:>12.2}", "net", net);
            Ok(())
        }
    }
}

#[allow(clippy::too_many_arguments)]
async fn import(
    pool: &DbPool,
    file: PathBuf,
    schema_path: PathBuf,
    rules_path: Option<PathBuf>,
    user: String,
    bank: String,
    month: MonthKey,
    net_flow: Decimal,
    profile: Option<String>,
) -> anyhow::Result<()> {
    let schema_text = std::fs::read_to_string(&schema_path)
        .with_context(|| format!("reading schema {}", schema_path.display()))?;
    let schema: ParsingSchema =
        toml::from_str(&schema_text).context("parsing schema TOML")?;

    let rules = match rules_path {
        Some(path) => {
            let text = std::fs::read_to_string(&path)
                .with_context(|| format!("reading rules {}", path.display()))?;
            RuleSet::from_json(&text).context("parsing rules JSON")?
        }
        None => centime_storage::load_rule_set(pool, &user, &bank).await?,
    };

    let rows = read_table(&file)?;
    let column_count = rows.iter().map(Vec::len).max().unwrap_or(0);
    let resolved = resolve(&schema, column_count).map_err(|e| anyhow::anyhow!("{e}"))?;

    let batch = normalize_rows(&rows, &resolved).map_err(|e| anyhow::anyhow!("{e}"))?;
    if !batch.errors.is_empty() {
        println!("{} row(s) failed to parse:", batch.errors.len());
        for failure in batch.errors.iter().take(5) {
            println!("  row {}: {}", failure.row_index + 1, failure.error);
        }
    }

    let summary = summarize(&batch.transactions, &rules);
    let save = StatementSave {
        scope: StatementScope { user, bank, month, profile },
        summary,
        currency: schema.currency.clone(),
        asserted_net_flow: net_flow,
    };

    match save_statement(pool, &save).await {
        Ok(report) => {
            println!(
                "saved: {} transactions across {} categories, net {:.2} vs asserted {:.2}",
                batch.transactions.len(),
                save.summary.totals.len(),
                report.calculated,
                report.asserted
            );
            if report.advisory {
                println!(
                    "advisory: {:.1}% of activity is uncategorized",
                    report.other_ratio * Decimal::from(100)
                );
            }
            Ok(())
        }
        Err(StorageError::ReconciliationRejected(report)) => {
            println!("rejected:");
            println!("  calculated total : {:.2}", report.calculated);
            println!("  asserted net flow: {:.2}", report.asserted);
            println!(
                "  difference       : {:.2} ({:.2}%, threshold {:.2})",
                report.difference, report.percent_difference, report.threshold
            );
            println!("  other ratio      : {:.1}%", report.other_ratio * Decimal::from(100));
            for failure in &report.failures {
                println!("  gate failed      : {failure:?}");
            }
            bail!("statement not saved");
        }
        Err(e) => Err(e.into()),
    }
}

async fn mutate(
    pool: &DbPool,
    user: String,
    bank: String,
    month: MonthKey,
    op: MutationOperation,
) -> anyhow::Result<()> {
    let scope = StatementScope::new(user, bank, month);
    let outcome = apply_mutation_batch(pool, &scope, std::slice::from_ref(&op), "USD").await?;
    for entry in &outcome.audit {
        match entry {
            AuditEntry::Edit { category, old_amount, new_amount } => {
                match old_amount {
                    Some(old) => println!("{category}: {old:.2} -> {new_amount:.2}"),
                    None => println!("{category}: created at {new_amount:.2}"),
                }
            }
            AuditEntry::Transfer {
                from_category,
                to_category,
                from_old,
                from_new,
                to_old,
                to_new,
                source_kind,
            } => {
                println!("{from_category}: {from_old:.2} -> {from_new:.2}");
                println!(
                    "{to_category}: {:.2} -> {to_new:.2}",
                    to_old.unwrap_or(Decimal::ZERO)
                );
                println!("({source_kind})");
            }
        }
    }
    Ok(())
}

/// Reads the whole CSV file as raw rows, header included, so the schema's
/// `first_transaction_row` decides where data starts.
fn read_table(path: &PathBuf) -> anyhow::Result<Vec<Vec<String>>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_path(path)
        .with_context(|| format!("reading statement {}", path.display()))?;

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        rows.push(record.iter().map(str::to_string).collect());
    }
    if rows.is_empty() {
        bail!("statement file {} is empty", path.display());
    }
    Ok(rows)
}
