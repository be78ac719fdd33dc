use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{anyhow, bail, Context, Result};
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand, ValueEnum};
use tracing::info;

use staffdesk::config::{config_path, load_config, AppConfig};
use staffdesk::domain::entities::employee::{Employee, EmployeeDraft};
use staffdesk::domain::entities::query::{FilterSpec, SortDirection};
use staffdesk::domain::entities::record::{Editable, Record};
use staffdesk::domain::entities::task::{Task, TaskDraft, TaskStatus, User};
use staffdesk::infra::export::csv::export_to_path;
use staffdesk::infra::import::csv::import_employees;
use staffdesk::infra::sqlite::queries::insert_user;
use staffdesk::infra::sqlite::repo::SqliteStore;
use staffdesk::ui::state::list_controller::{ListController, ListOptions};
use staffdesk::usecase::ports::remote::{ListParams, RemoteError, RemoteFetchAdapter};
use staffdesk::usecase::services::aggregator::{
    count_by_category, outstanding_tasks_per_employee, total, CategoryCount, LabeledValue,
};
use staffdesk::usecase::services::edit_service::EditService;
use staffdesk::usecase::services::query_service::QueryService;

const EMPLOYEE_COLUMNS: &[&str] = &[
    "id",
    "full_name",
    "email",
    "position",
    "department",
    "hire_date",
    "outstanding_tasks",
];
const TASK_COLUMNS: &[&str] = &["id", "title", "status_name", "assigned_to_name", "due_date"];
const BAR_WIDTH: f64 = 40.0;

/// Employee and task administration against a local store
#[derive(Parser, Debug)]
#[command(name = "staffdesk")]
#[command(about = "List, search, chart and export employees and tasks")]
struct Cli {
    /// Config file (defaults to the platform config directory)
    #[arg(long, env = "STAFFDESK_CONFIG", global = true)]
    config: Option<PathBuf>,

    /// SQLite database, overrides `db_path` from the config
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Show one page of employees
    Employees(ListArgs),
    /// Show one page of tasks
    Tasks(ListArgs),
    /// Show one record; an employee comes with their assigned tasks
    Show {
        #[arg(value_enum)]
        kind: KindArg,
        id: i64,
    },
    /// Add an employee
    AddEmployee(EmployeeArgs),
    /// Add a task
    AddTask(TaskArgs),
    /// Change fields of a record; an empty value clears the field
    Update {
        #[arg(value_enum)]
        kind: KindArg,
        id: i64,
        #[arg(long = "set", value_name = "FIELD=VALUE", required = true)]
        changes: Vec<String>,
    },
    /// Delete a record and show the refreshed page
    Delete {
        #[arg(value_enum)]
        kind: KindArg,
        id: i64,
        #[command(flatten)]
        list: ListArgs,
    },
    /// Create employees from a CSV file with a header row
    ImportEmployees { path: PathBuf },
    /// Write every record of a listing to CSV
    Export {
        #[arg(value_enum)]
        kind: ExportKind,
        path: PathBuf,
        /// Backend search applied before export
        #[arg(long, default_value = "")]
        search: String,
    },
    /// Print a text bar chart
    Chart {
        #[arg(value_enum)]
        chart: ChartKind,
    },
    /// Add a read-only user that tasks can reference as `assigned_by`
    AddUser {
        username: String,
        #[arg(long, default_value = "")]
        first_name: String,
        #[arg(long, default_value = "")]
        last_name: String,
    },
}

#[derive(Args, Debug, Clone, Default)]
struct ListArgs {
    /// Backend search, terms split on whitespace and commas
    #[arg(long, default_value = "")]
    search: String,

    /// Local substring filter over the searchable columns
    #[arg(long, default_value = "")]
    find: String,

    /// Exact match, `field=value`
    #[arg(long = "filter", value_name = "FIELD=VALUE")]
    filters: Vec<String>,

    /// Inclusive range, `field=from..to`; either bound may be empty
    #[arg(long = "range", value_name = "FIELD=FROM..TO")]
    ranges: Vec<String>,

    /// Sort column; repeat the same column to sort descending
    #[arg(long = "sort", value_name = "FIELD")]
    sorts: Vec<String>,

    /// Zero-based page
    #[arg(long, default_value_t = 0)]
    page: i64,

    #[arg(long)]
    page_size: Option<i64>,
}

#[derive(Args, Debug)]
struct EmployeeArgs {
    #[arg(long)]
    first_name: String,
    #[arg(long)]
    last_name: String,
    #[arg(long)]
    email: String,
    #[arg(long)]
    phone_number: Option<String>,
    /// YYYY-MM-DD
    #[arg(long)]
    hire_date: NaiveDate,
    #[arg(long)]
    position: String,
    #[arg(long)]
    department: String,
}

#[derive(Args, Debug)]
struct TaskArgs {
    #[arg(long)]
    title: String,
    #[arg(long)]
    description: Option<String>,
    /// Employee id
    #[arg(long)]
    assigned_to: Option<i64>,
    /// User id, see `add-user`
    #[arg(long)]
    assigned_by: Option<i64>,
    /// Status name or id
    #[arg(long)]
    status: Option<String>,
    /// YYYY-MM-DD
    #[arg(long)]
    due_date: Option<NaiveDate>,
}

#[derive(ValueEnum, Debug, Clone, Copy)]
enum KindArg {
    Employees,
    Tasks,
}

#[derive(ValueEnum, Debug, Clone, Copy)]
enum ExportKind {
    Employees,
    Tasks,
    Statuses,
    Users,
}

#[derive(ValueEnum, Debug, Clone, Copy)]
enum ChartKind {
    /// To-do plus in-progress tasks per employee
    Outstanding,
    /// Employees per department
    Departments,
    /// Tasks per status
    Statuses,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config_file = match &cli.config {
        Some(path) => path.clone(),
        None => config_path()?,
    };
    let config = load_config(&config_file)?;
    let db_path = match &cli.db {
        Some(path) => path.clone(),
        None => config.resolve_db_path()?,
    };
    let store = SqliteStore::open(&db_path)?;
    info!(db = %db_path.display(), "store ready");
    let remote: Arc<dyn RemoteFetchAdapter> = Arc::new(store);

    match cli.command {
        Command::Employees(args) => {
            let list = open_list::<Employee>(&remote, &config, &args).await?;
            print_page(&list, EMPLOYEE_COLUMNS);
        }
        Command::Tasks(args) => {
            let list = open_list::<Task>(&remote, &config, &args).await?;
            print_page(&list, TASK_COLUMNS);
        }
        Command::Show { kind, id } => {
            let queries = QueryService::new(Arc::clone(&remote));
            match kind {
                KindArg::Employees => {
                    let detail = queries.employee_detail(id).await.map_err(remote_failure)?;
                    print_record(&detail.employee);
                    println!();
                    print_table(&detail.tasks, TASK_COLUMNS);
                }
                KindArg::Tasks => {
                    let task = queries.get::<Task>(id).await.map_err(remote_failure)?;
                    print_record(&task);
                }
            }
        }
        Command::AddEmployee(args) => {
            let edits = EditService::new(Arc::clone(&remote));
            let draft = EmployeeDraft {
                first_name: args.first_name,
                last_name: args.last_name,
                email: args.email,
                phone_number: args.phone_number,
                hire_date: args.hire_date,
                position: args.position,
                department: args.department,
            };
            let employee = edits
                .create::<Employee>(&draft)
                .await
                .map_err(remote_failure)?;
            print_record(&employee);
        }
        Command::AddTask(args) => {
            let status = match &args.status {
                Some(status) => Some(resolve_status(&remote, &config, status).await?),
                None => None,
            };
            let edits = EditService::new(Arc::clone(&remote));
            let draft = TaskDraft {
                title: args.title,
                description: args.description,
                assigned_to: args.assigned_to,
                assigned_by: args.assigned_by,
                status,
                due_date: args.due_date,
            };
            let task = edits.create::<Task>(&draft).await.map_err(remote_failure)?;
            print_record(&task);
        }
        Command::Update { kind, id, changes } => {
            let changes = changes
                .iter()
                .map(|change| -> Result<(String, String)> {
                    let (field, value) = split_assignment(change)?;
                    Ok((field.to_string(), value.to_string()))
                })
                .collect::<Result<Vec<_>>>()?;
            match kind {
                KindArg::Employees => update_and_show::<Employee>(&remote, id, &changes).await?,
                KindArg::Tasks => update_and_show::<Task>(&remote, id, &changes).await?,
            }
        }
        Command::Delete { kind, id, list } => match kind {
            KindArg::Employees => {
                delete_and_show::<Employee>(&remote, &config, &list, id, EMPLOYEE_COLUMNS).await?
            }
            KindArg::Tasks => {
                delete_and_show::<Task>(&remote, &config, &list, id, TASK_COLUMNS).await?
            }
        },
        Command::ImportEmployees { path } => {
            let edits = EditService::new(Arc::clone(&remote));
            let report = import_employees(&edits, &path).await?;
            println!("created {} employees", report.created.len());
            for (line, message) in &report.rejected {
                println!("line {line}: {message}");
            }
        }
        Command::Export { kind, path, search } => {
            let queries = QueryService::new(Arc::clone(&remote));
            let params = ListParams {
                page: 1,
                page_size: config.fetch_batch_size,
                search,
                ordering: None,
            };
            let written = match kind {
                ExportKind::Employees => export_kind::<Employee>(&queries, &params, &path).await?,
                ExportKind::Tasks => export_kind::<Task>(&queries, &params, &path).await?,
                ExportKind::Statuses => export_kind::<TaskStatus>(&queries, &params, &path).await?,
                ExportKind::Users => export_kind::<User>(&queries, &params, &path).await?,
            };
            println!("wrote {written} rows to {}", path.display());
        }
        Command::Chart { chart } => {
            let queries = QueryService::new(Arc::clone(&remote));
            let params = ListParams {
                page: 1,
                page_size: config.fetch_batch_size,
                ..ListParams::default()
            };
            match chart {
                ChartKind::Outstanding => {
                    let employees = queries.fetch_source_set::<Employee>(&params).await?;
                    print_bars(&outstanding_tasks_per_employee(&employees));
                }
                ChartKind::Departments => {
                    let employees = queries.fetch_source_set::<Employee>(&params).await?;
                    print_bars(&as_values(count_by_category(&employees, "department")));
                }
                ChartKind::Statuses => {
                    let tasks = queries.fetch_source_set::<Task>(&params).await?;
                    print_bars(&as_values(count_by_category(&tasks, "status_name")));
                }
            }
        }
        Command::AddUser {
            username,
            first_name,
            last_name,
        } => {
            let id = insert_user(&db_path, &username, &first_name, &last_name)?;
            println!("user {username} has id {id}");
        }
    }

    Ok(())
}

async fn open_list<R: Record>(
    remote: &Arc<dyn RemoteFetchAdapter>,
    config: &AppConfig,
    args: &ListArgs,
) -> Result<ListController<R>> {
    let mut list = ListController::<R>::new(Arc::clone(remote), ListOptions::from_config::<R>(config));
    if !args.search.trim().is_empty() {
        list.set_remote_search(&args.search);
    }
    for field in &args.sorts {
        list.set_sort(field);
    }
    list.refresh().await?;
    apply_view_args(&mut list, args)?;
    Ok(list)
}

/// Local-only state: these never reach the backend.
fn apply_view_args<R: Record>(list: &mut ListController<R>, args: &ListArgs) -> Result<()> {
    if !args.find.is_empty() {
        list.on_search_input(&args.find);
    }
    for filter in &args.filters {
        let (field, value) = split_assignment(filter)?;
        list.set_filter(field, Some(FilterSpec::exact(value)));
    }
    for range in &args.ranges {
        let (field, bounds) = split_assignment(range)?;
        let (from, to) = bounds
            .split_once("..")
            .ok_or_else(|| anyhow!("range must look like field=from..to: {range}"))?;
        list.set_filter(field, Some(FilterSpec::range(bound(from), bound(to))));
    }
    if let Some(page_size) = args.page_size {
        list.set_page_size(page_size);
    }
    list.set_page(args.page);
    Ok(())
}

fn bound(text: &str) -> Option<&str> {
    Some(text.trim()).filter(|text| !text.is_empty())
}

fn split_assignment(text: &str) -> Result<(&str, &str)> {
    let (field, value) = text
        .split_once('=')
        .with_context(|| format!("expected field=value, got {text}"))?;
    let field = field.trim();
    if field.is_empty() {
        bail!("missing field name in {text}");
    }
    Ok((field, value))
}

async fn delete_and_show<R: Record>(
    remote: &Arc<dyn RemoteFetchAdapter>,
    config: &AppConfig,
    args: &ListArgs,
    id: i64,
    columns: &[&str],
) -> Result<()> {
    let mut list = open_list::<R>(remote, config, args).await?;
    if let Err(err) = list.delete_record(id).await {
        match err.detail() {
            Some(detail) => bail!("{err}\n{detail}"),
            None => bail!("{err} ({})", err.remote()),
        }
    }
    println!("deleted {} {id}", R::KIND.singular());
    print_page(&list, columns);
    Ok(())
}

/// Field errors go one per line under the status message.
fn remote_failure(err: RemoteError) -> anyhow::Error {
    match err.field_detail() {
        Some(detail) => anyhow!("{err}\n{detail}"),
        None => anyhow!(err),
    }
}

/// Accepts a status id or a status name, case-insensitively.
async fn resolve_status(
    remote: &Arc<dyn RemoteFetchAdapter>,
    config: &AppConfig,
    status: &str,
) -> Result<i64> {
    if let Ok(id) = status.trim().parse::<i64>() {
        return Ok(id);
    }
    let queries = QueryService::new(Arc::clone(remote));
    let params = ListParams {
        page: 1,
        page_size: config.fetch_batch_size,
        ..ListParams::default()
    };
    let statuses = queries.fetch_source_set::<TaskStatus>(&params).await?;
    statuses
        .iter()
        .find(|candidate| candidate.name.eq_ignore_ascii_case(status.trim()))
        .map(|found| found.id)
        .ok_or_else(|| {
            let known: Vec<&str> = statuses.iter().map(|s| s.name.as_str()).collect();
            anyhow!("unknown status {status:?}, expected one of: {}", known.join(", "))
        })
}

async fn update_and_show<R: Editable>(
    remote: &Arc<dyn RemoteFetchAdapter>,
    id: i64,
    changes: &[(String, String)],
) -> Result<()> {
    let edits = EditService::new(Arc::clone(remote));
    let record = edits
        .apply_changes::<R>(id, changes)
        .await
        .map_err(remote_failure)?;
    print_record(&record);
    Ok(())
}

async fn export_kind<R: Record>(
    queries: &QueryService,
    params: &ListParams,
    path: &std::path::Path,
) -> Result<usize> {
    let records = queries.fetch_source_set::<R>(params).await?;
    export_to_path(&records, path)
}

fn print_record<R: Record>(record: &R) {
    let width = R::FIELDS.iter().map(|field| field.len()).max().unwrap_or(0);
    for field in R::FIELDS {
        println!("{field:<width$}  {}", record.field(field).display());
    }
}

fn print_page<R: Record>(list: &ListController<R>, columns: &[&str]) {
    let view = list.get_derived_view();
    let state = list.pipeline().query_state();
    print_table(view.page_window(), columns);

    let pages = view.total_count().div_ceil(state.page_size()).max(1);
    let direction = match state.sort_direction() {
        SortDirection::Asc => "",
        SortDirection::Desc => "-",
    };
    println!(
        "page {} of {pages}, {} {} match, sorted by {direction}{}",
        state.page() + 1,
        view.total_count(),
        R::KIND.noun(),
        state.sort_key(),
    );
}

fn print_table<'a, R: Record>(records: impl IntoIterator<Item = &'a R>, columns: &[&str]) {
    let rows: Vec<Vec<String>> = records
        .into_iter()
        .map(|record| columns.iter().map(|column| record.field(column).display()).collect())
        .collect();

    let widths: Vec<usize> = columns
        .iter()
        .enumerate()
        .map(|(idx, column)| {
            rows.iter()
                .map(|row| row[idx].chars().count())
                .chain(std::iter::once(column.len()))
                .max()
                .unwrap_or(0)
        })
        .collect();
    let render = |cells: Vec<&str>| {
        cells
            .iter()
            .zip(&widths)
            .map(|(cell, &width)| format!("{cell:<width$}"))
            .collect::<Vec<_>>()
            .join("  ")
            .trim_end()
            .to_string()
    };

    println!("{}", render(columns.to_vec()));
    for row in &rows {
        println!("{}", render(row.iter().map(String::as_str).collect()));
    }
}

fn as_values(counts: Vec<CategoryCount>) -> Vec<LabeledValue> {
    counts
        .into_iter()
        .map(|count| LabeledValue {
            label: count.category,
            value: count.count as f64,
        })
        .collect()
}

fn print_bars(values: &[LabeledValue]) {
    if values.is_empty() {
        println!("(no data)");
        return;
    }
    let label_width = values.iter().map(|v| v.label.chars().count()).max().unwrap_or(0);
    let max = values.iter().map(|v| v.value).fold(0.0_f64, f64::max);
    for value in values {
        let len = if max > 0.0 {
            (value.value / max * BAR_WIDTH).round() as usize
        } else {
            0
        };
        println!(
            "{:<label_width$}  {} {}",
            value.label,
            "#".repeat(len),
            value.value
        );
    }
    println!("total {}", total(values));
}
