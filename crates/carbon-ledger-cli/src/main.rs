use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail, Context, Result};
use carbon_advisor::{ledger_context, Advisor, AdvisoryTask, GroqClient};
use carbon_ledger_core::reference::{self, Season};
use carbon_ledger_core::{
    by_category, by_month_and_scope, by_scope, format_amount, parse_calendar_date, summarize,
    total_emissions, DataQuality, EmissionEntry, ImportRow, Scope, VerificationStatus,
};
use carbon_ledger_store::Ledger;
use clap::{Args, Parser, Subcommand, ValueEnum};
use serde_json::{json, Value};
use time::Month;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

const CLI_CONTRACT_VERSION: &str = "cli.v1";
const VERBOSE_LOG_DIRECTIVES: &str =
    "carbon_ledger_cli=debug,carbon_ledger_store=debug,carbon_advisor=debug";

#[derive(Debug, Parser)]
#[command(name = "cl")]
#[command(about = "Bangladesh carbon accounting ledger")]
struct Cli {
    #[arg(long, default_value = "./data")]
    data_dir: PathBuf,

    #[arg(long, short, global = true, default_value_t = false)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    Ledger {
        #[command(subcommand)]
        command: Box<LedgerCommand>,
    },
    Report {
        #[command(subcommand)]
        command: Box<ReportCommand>,
    },
    Factors {
        #[command(subcommand)]
        command: Box<FactorsCommand>,
    },
    Advise {
        #[command(subcommand)]
        command: Box<AdviseCommand>,
    },
}

#[derive(Debug, Subcommand)]
enum LedgerCommand {
    Add(AddArgs),
    List,
    Delete(DeleteArgs),
    Import(ImportArgs),
}

#[derive(Debug, Args)]
struct AddArgs {
    #[arg(long)]
    date: String,
    #[arg(long, value_parser = parse_scope)]
    scope: Scope,
    #[arg(long)]
    category: String,
    #[arg(long)]
    activity: String,
    #[arg(long)]
    quantity: f64,
    #[arg(long)]
    unit: Option<String>,
    #[arg(long)]
    emission_factor: Option<f64>,
    #[arg(long, default_value = carbon_ledger_core::DEFAULT_BUSINESS_UNIT)]
    business_unit: String,
    #[arg(long, default_value = carbon_ledger_core::DEFAULT_PROJECT)]
    project: String,
    #[arg(long, default_value = carbon_ledger_core::DEFAULT_COUNTRY)]
    country: String,
    #[arg(long, default_value = "")]
    facility: String,
    #[arg(long, default_value = "")]
    responsible_person: String,
    #[arg(long, value_enum, default_value_t = DataQualityArg::Medium)]
    data_quality: DataQualityArg,
    #[arg(long, value_enum, default_value_t = VerificationArg::Unverified)]
    verification_status: VerificationArg,
    #[arg(long, default_value = "")]
    notes: String,
}

#[derive(Debug, Args)]
struct DeleteArgs {
    #[arg(long)]
    index: usize,
}

#[derive(Debug, Args)]
struct ImportArgs {
    #[arg(long = "in")]
    input: PathBuf,
}

#[derive(Debug, Subcommand)]
enum ReportCommand {
    Total,
    Scope,
    Category,
    Monthly,
    Summary,
}

#[derive(Debug, Subcommand)]
enum FactorsCommand {
    Lookup(FactorLookupArgs),
    Activities {
        #[arg(long)]
        category: String,
    },
    Categories {
        #[arg(long, value_parser = parse_scope)]
        scope: Scope,
    },
    Search {
        #[arg(long)]
        term: String,
    },
    Industries,
    Benchmark {
        #[arg(long)]
        industry: String,
        #[arg(long)]
        metric: String,
    },
    Recommendation {
        #[arg(long)]
        key: String,
    },
    Market {
        #[arg(long)]
        name: String,
    },
    Adjustment(AdjustmentArgs),
}

#[derive(Debug, Args)]
struct FactorLookupArgs {
    #[arg(long)]
    category: String,
    #[arg(long)]
    activity: String,
}

#[derive(Debug, Args)]
struct AdjustmentArgs {
    #[arg(long)]
    region: String,
    #[arg(long, value_parser = clap::value_parser!(u8).range(1..=12))]
    month: u8,
    #[arg(long)]
    factor_type: String,
}

#[derive(Debug, Subcommand)]
enum AdviseCommand {
    Classify {
        #[arg(long)]
        description: String,
    },
    Summary,
    Offset {
        #[arg(long)]
        location: String,
        #[arg(long)]
        industry: String,
    },
    Regulation {
        #[arg(long)]
        location: String,
        #[arg(long)]
        industry: String,
        #[arg(long = "market", required = true)]
        markets: Vec<String>,
    },
    Optimize,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum DataQualityArg {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum VerificationArg {
    Unverified,
    InternallyVerified,
    ThirdPartyVerified,
    Audited,
}

impl From<DataQualityArg> for DataQuality {
    fn from(value: DataQualityArg) -> Self {
        match value {
            DataQualityArg::Low => Self::Low,
            DataQualityArg::Medium => Self::Medium,
            DataQualityArg::High => Self::High,
        }
    }
}

impl From<VerificationArg> for VerificationStatus {
    fn from(value: VerificationArg) -> Self {
        match value {
            VerificationArg::Unverified => Self::Unverified,
            VerificationArg::InternallyVerified => Self::InternallyVerified,
            VerificationArg::ThirdPartyVerified => Self::ThirdPartyVerified,
            VerificationArg::Audited => Self::Audited,
        }
    }
}

fn parse_scope(raw: &str) -> Result<Scope, String> {
    Scope::parse(raw)
        .ok_or_else(|| format!("unknown scope `{raw}`, expected Scope 1, Scope 2 or Scope 3"))
}

fn with_contract_version(value: Value) -> Value {
    match value {
        Value::Object(mut object) => {
            object.insert(
                "contract_version".to_string(),
                Value::String(CLI_CONTRACT_VERSION.to_string()),
            );
            Value::Object(object)
        }
        other => json!({
            "contract_version": CLI_CONTRACT_VERSION,
            "payload": other
        }),
    }
}

fn emit_json(value: Value) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(&with_contract_version(value))?);
    Ok(())
}

fn init_logging(verbose: bool) {
    let default_directives = if verbose { VERBOSE_LOG_DIRECTIVES } else { "warn" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directives));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_logging(cli.verbose);
    tracing::debug!(data_dir = %cli.data_dir.display(), "starting cl");

    match cli.command {
        Command::Ledger { command } => {
            let mut ledger = Ledger::open(&cli.data_dir)?;
            run_ledger(*command, &mut ledger)
        }
        Command::Report { command } => {
            let ledger = Ledger::open(&cli.data_dir)?;
            run_report(&command, &ledger)
        }
        Command::Factors { command } => run_factors(*command),
        Command::Advise { command } => {
            let ledger = Ledger::open(&cli.data_dir)?;
            run_advise(*command, &ledger)
        }
    }
}

fn quarantine_note(ledger: &Ledger) -> Value {
    ledger
        .quarantined()
        .map_or(Value::Null, |path| Value::String(path.display().to_string()))
}

fn run_ledger(command: LedgerCommand, ledger: &mut Ledger) -> Result<()> {
    match command {
        LedgerCommand::Add(args) => run_ledger_add(args, ledger),
        LedgerCommand::List => run_ledger_list(ledger),
        LedgerCommand::Delete(args) => run_ledger_delete(&args, ledger),
        LedgerCommand::Import(args) => run_ledger_import(&args, ledger),
    }
}

fn run_ledger_add(args: AddArgs, ledger: &mut Ledger) -> Result<()> {
    let date = parse_calendar_date(&args.date)
        .ok_or_else(|| anyhow!("invalid --date `{}`: expected YYYY-MM-DD", args.date))?;

    let allowed = reference::categories(args.scope);
    if !allowed.contains(&args.category.as_str()) {
        bail!(
            "category `{}` does not belong to {}; expected one of: {}",
            args.category,
            args.scope,
            allowed.join(", ")
        );
    }

    let reference_factor = reference::lookup(&args.category, &args.activity);
    let unit = match (args.unit, reference_factor) {
        (Some(unit), _) => unit,
        (None, Some(factor)) => factor.unit.to_string(),
        (None, None) => bail!(
            "no reference unit for `{}` / `{}`; pass --unit",
            args.category,
            args.activity
        ),
    };
    let emission_factor = match (args.emission_factor, reference_factor) {
        (Some(factor), _) => factor,
        (None, Some(factor)) => factor.factor,
        (None, None) => bail!(
            "no reference emission factor for `{}` / `{}`; pass --emission-factor",
            args.category,
            args.activity
        ),
    };

    let mut entry = EmissionEntry::new(
        date,
        args.scope,
        args.category,
        args.activity,
        args.quantity,
        unit,
        emission_factor,
    );
    entry.business_unit = args.business_unit;
    entry.project = args.project;
    entry.country = args.country;
    entry.facility = args.facility;
    entry.responsible_person = args.responsible_person;
    entry.data_quality = args.data_quality.into();
    entry.verification_status = args.verification_status.into();
    entry.notes = args.notes;

    ledger.append(entry)?;
    let index = ledger.len() - 1;
    let record = ledger.get(index).ok_or_else(|| anyhow!("appended record is missing"))?;

    emit_json(json!({
        "index": index,
        "record": record,
        "emissions_display": format_amount(record.emissions_kg()),
        "count": ledger.len(),
    }))
}

fn run_ledger_list(ledger: &Ledger) -> Result<()> {
    emit_json(json!({
        "count": ledger.len(),
        "total_kgco2e": total_emissions(ledger.records()),
        "records": ledger.records(),
        "quarantined": quarantine_note(ledger),
    }))
}

fn run_ledger_delete(args: &DeleteArgs, ledger: &mut Ledger) -> Result<()> {
    let removed = ledger.delete_at(args.index)?;
    emit_json(json!({
        "index": args.index,
        "deleted": removed,
        "count": ledger.len(),
    }))
}

fn run_ledger_import(args: &ImportArgs, ledger: &mut Ledger) -> Result<()> {
    let rows = read_import_rows(&args.input)?;
    let imported = ledger.bulk_import(&rows)?;
    emit_json(json!({
        "source": args.input.display().to_string(),
        "imported": imported,
        "count": ledger.len(),
    }))
}

/// Rows come either as one JSON array or as NDJSON, one object per line.
fn read_import_rows(path: &Path) -> Result<Vec<ImportRow>> {
    let body = fs::read_to_string(path)
        .with_context(|| format!("failed to read import file {}", path.display()))?;

    if body.trim_start().starts_with('[') {
        return serde_json::from_str(&body)
            .with_context(|| format!("failed to parse JSON rows from {}", path.display()));
    }

    let mut rows = Vec::new();
    for (index, line) in body.lines().enumerate() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        let row = serde_json::from_str(trimmed).with_context(|| {
            format!("failed to parse NDJSON row {} from {}", index + 1, path.display())
        })?;
        rows.push(row);
    }

    Ok(rows)
}

fn run_report(command: &ReportCommand, ledger: &Ledger) -> Result<()> {
    let records = ledger.records();
    let payload = match command {
        ReportCommand::Total => {
            let total = total_emissions(records);
            json!({
                "total_kgco2e": total,
                "total_display": format_amount(total),
                "entry_count": records.len(),
            })
        }
        ReportCommand::Scope => json!({ "scopes": by_scope(records) }),
        ReportCommand::Category => json!({ "categories": by_category(records) }),
        ReportCommand::Monthly => json!({ "months": by_month_and_scope(records) }),
        ReportCommand::Summary => serde_json::to_value(summarize(records))?,
    };

    emit_json(payload)
}

fn run_factors(command: FactorsCommand) -> Result<()> {
    match command {
        FactorsCommand::Lookup(args) => {
            let factor = reference::lookup(&args.category, &args.activity).ok_or_else(|| {
                anyhow!("no emission factor for `{}` / `{}`", args.category, args.activity)
            })?;
            emit_json(json!({
                "category": args.category,
                "activity": factor.activity,
                "factor": factor.factor,
                "unit": factor.unit,
                "source": factor.source,
            }))
        }
        FactorsCommand::Activities { category } => {
            let activities = reference::activities(&category);
            emit_json(json!({ "category": category, "activities": activities }))
        }
        FactorsCommand::Categories { scope } => emit_json(json!({
            "scope": scope,
            "description": scope.description(),
            "categories": reference::categories(scope),
        })),
        FactorsCommand::Search { term } => {
            let matches = reference::search(&term);
            emit_json(json!({ "term": term, "matches": matches }))
        }
        FactorsCommand::Industries => emit_json(json!({ "industries": reference::industries() })),
        FactorsCommand::Benchmark { industry, metric } => {
            let value = reference::industry_benchmark(&industry, &metric)
                .ok_or_else(|| anyhow!("no benchmark `{metric}` for industry `{industry}`"))?;
            emit_json(json!({ "industry": industry, "metric": metric, "kgco2e": value }))
        }
        FactorsCommand::Recommendation { key } => {
            let recommendation = reference::recommendation(&key)
                .ok_or_else(|| anyhow!("no recommendation for `{key}`"))?;
            emit_json(serde_json::to_value(recommendation)?)
        }
        FactorsCommand::Market { name } => {
            let requirement = reference::export_requirements(&name)
                .ok_or_else(|| anyhow!("no export requirements recorded for `{name}`"))?;
            emit_json(serde_json::to_value(requirement)?)
        }
        FactorsCommand::Adjustment(args) => run_factors_adjustment(&args),
    }
}

fn run_factors_adjustment(args: &AdjustmentArgs) -> Result<()> {
    let month =
        Month::try_from(args.month).with_context(|| format!("invalid month {}", args.month))?;
    let season = Season::for_month(month);
    let regional = reference::regional_factor(&args.region, &args.factor_type);
    let seasonal = reference::seasonal_factor(season, &args.factor_type);

    emit_json(json!({
        "region": args.region,
        "month": args.month,
        "season": season,
        "factor_type": args.factor_type,
        "regional_factor": regional,
        "seasonal_factor": seasonal,
        "combined_factor": regional * seasonal,
    }))
}

fn run_advise(command: AdviseCommand, ledger: &Ledger) -> Result<()> {
    let task = match command {
        AdviseCommand::Classify { description } => AdvisoryTask::Classification { description },
        AdviseCommand::Summary => AdvisoryTask::ReportSummary {
            emissions_data: non_empty_context(ledger, "summary")?,
        },
        AdviseCommand::Offset { location, industry } => AdvisoryTask::OffsetAdvice {
            total_kgco2e: total_emissions(ledger.records()),
            location,
            industry,
        },
        AdviseCommand::Regulation { location, industry, markets } => {
            AdvisoryTask::RegulationCheck { location, industry, export_markets: markets }
        }
        AdviseCommand::Optimize => AdvisoryTask::Optimization {
            emissions_data: non_empty_context(ledger, "optimize")?,
        },
    };

    let advisor = Advisor::new(GroqClient::from_env()?);
    tracing::info!(
        kind = task.kind().as_str(),
        model = %advisor.generator().config().model,
        "requesting advice"
    );
    let advice = advisor.run(&task)?;
    emit_json(json!({
        "kind": task.kind(),
        "advice": advice,
    }))
}

fn non_empty_context(ledger: &Ledger, command: &str) -> Result<String> {
    if ledger.is_empty() {
        bail!("`advise {command}` needs at least one ledger record; add or import emissions first");
    }
    Ok(ledger_context(ledger.records()))
}
