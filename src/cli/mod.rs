//! Command-line console for the Insight extraction API.
//!
//! Subcommands map one-to-one onto the data and auth providers:
//! - `login` / `logout` / `whoami` - session lifecycle
//! - `list` / `get` / `create` / `update` / `delete` - record access
//! - `dashboard` - date-range aggregate metrics

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use serde_json::Value;
use std::io::{BufRead, Write};
use std::path::PathBuf;

use crate::data::{ListParams, SortOrder};
use crate::resource::Resource;
use crate::Console;

/// CLI arguments structure
#[derive(Parser, Debug)]
#[command(name = "insight-admin")]
#[command(author, version, about = "Operator console for the Insight extraction API", long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "insight-admin.toml")]
    pub config: PathBuf,

    /// API URL to connect to (overrides the config file)
    #[arg(long, env = "INSIGHT_API_URL")]
    pub api_url: Option<String>,

    /// Override log level
    #[arg(short, long)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Log in and persist the session for subsequent commands
    Login {
        /// Username to authenticate as
        #[arg(short, long)]
        username: String,
        /// Password (prompted on stdin when omitted)
        #[arg(short, long)]
        password: Option<String>,
    },

    /// Clear the persisted session
    Logout,

    /// Show the identity behind the current session
    Whoami,

    /// List records of a resource (parameters, requests, users)
    List {
        /// Resource name
        resource: String,
        /// Page number (1-based)
        #[arg(long, default_value_t = 1)]
        page: u32,
        /// Records per page
        #[arg(long, default_value_t = 25)]
        per_page: u32,
        /// Field to sort by
        #[arg(long, default_value = "id")]
        sort_field: String,
        /// Sort direction: asc or desc
        #[arg(long, default_value = "asc")]
        sort_order: String,
        /// Filters as field=value, repeatable
        #[arg(long = "filter", value_name = "FIELD=VALUE")]
        filters: Vec<String>,
        /// Print raw JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Fetch a single record by id
    Get {
        /// Resource name
        resource: String,
        /// Record id
        id: String,
    },

    /// Create a record from a JSON payload
    Create {
        /// Resource name
        resource: String,
        /// Record as a JSON object
        data: String,
    },

    /// Replace a record with a JSON payload
    Update {
        /// Resource name
        resource: String,
        /// Record id
        id: String,
        /// Full replacement record as a JSON object
        data: String,
    },

    /// Delete a record by id
    Delete {
        /// Resource name
        resource: String,
        /// Record id
        id: String,
    },

    /// Show dashboard metrics, optionally bounded by a date range
    Dashboard {
        /// Start of the range (YYYY-MM-DD)
        #[arg(long)]
        start_date: Option<NaiveDate>,
        /// End of the range (YYYY-MM-DD)
        #[arg(long)]
        end_date: Option<NaiveDate>,
        /// Print raw JSON instead of the summary
        #[arg(long)]
        json: bool,
    },
}

/// Run a CLI command against an already-wired console.
pub async fn run_command(cli: &Cli, console: &Console) -> Result<()> {
    match &cli.command {
        Commands::Login { username, password } => cmd_login(console, username, password.as_deref()).await,
        Commands::Logout => cmd_logout(console),
        Commands::Whoami => cmd_whoami(console),
        Commands::List {
            resource,
            page,
            per_page,
            sort_field,
            sort_order,
            filters,
            json,
        } => {
            cmd_list(
                console, resource, *page, *per_page, sort_field, sort_order, filters, *json,
            )
            .await
        }
        Commands::Get { resource, id } => cmd_get(console, resource, id).await,
        Commands::Create { resource, data } => cmd_create(console, resource, data).await,
        Commands::Update { resource, id, data } => cmd_update(console, resource, id, data).await,
        Commands::Delete { resource, id } => cmd_delete(console, resource, id).await,
        Commands::Dashboard {
            start_date,
            end_date,
            json,
        } => cmd_dashboard(console, *start_date, *end_date, *json).await,
    }
}

async fn cmd_login(console: &Console, username: &str, password: Option<&str>) -> Result<()> {
    let password = match password {
        Some(password) => password.to_string(),
        None => prompt_password()?,
    };

    console.auth.login(username, &password).await?;
    println!("Logged in as {}.", username);
    Ok(())
}

fn cmd_logout(console: &Console) -> Result<()> {
    console.auth.logout();
    println!("Logged out.");
    Ok(())
}

fn cmd_whoami(console: &Console) -> Result<()> {
    let identity = console
        .auth
        .get_identity()
        .context("No active session. Run `insight-admin login` first.")?;
    println!("Username: {}", identity.id);
    println!("Role:     {}", identity.role);
    Ok(())
}

#[allow(clippy::too_many_arguments)]
async fn cmd_list(
    console: &Console,
    resource: &str,
    page: u32,
    per_page: u32,
    sort_field: &str,
    sort_order: &str,
    filters: &[String],
    json: bool,
) -> Result<()> {
    let resource: Resource = resource.parse()?;
    let mut params = ListParams {
        page,
        per_page,
        sort_field: sort_field.to_string(),
        sort_order: parse_sort_order(sort_order)?,
        ..ListParams::default()
    };
    for filter in filters {
        let Some((field, value)) = filter.split_once('=') else {
            bail!("Invalid filter `{filter}`: expected FIELD=VALUE");
        };
        params.filter.insert(field.to_string(), value.to_string());
    }

    let result = console.data.list(resource, &params).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&result.records)?);
    } else {
        print_records(&result.records);
    }
    println!();
    println!(
        "Page {} ({} of {} total records)",
        page,
        result.records.len(),
        result.total
    );
    Ok(())
}

async fn cmd_get(console: &Console, resource: &str, id: &str) -> Result<()> {
    let resource: Resource = resource.parse()?;
    let record = console.data.get_one(resource, id).await?;
    println!("{}", serde_json::to_string_pretty(&record)?);
    Ok(())
}

async fn cmd_create(console: &Console, resource: &str, data: &str) -> Result<()> {
    let resource: Resource = resource.parse()?;
    let data: Value = serde_json::from_str(data).context("Payload is not valid JSON")?;
    let record = console.data.create(resource, data).await?;
    println!("Created:");
    println!("{}", serde_json::to_string_pretty(&record)?);
    Ok(())
}

async fn cmd_update(console: &Console, resource: &str, id: &str, data: &str) -> Result<()> {
    let resource: Resource = resource.parse()?;
    let data: Value = serde_json::from_str(data).context("Payload is not valid JSON")?;
    let record = console.data.update(resource, id, data).await?;
    println!("Updated:");
    println!("{}", serde_json::to_string_pretty(&record)?);
    Ok(())
}

async fn cmd_delete(console: &Console, resource: &str, id: &str) -> Result<()> {
    let resource: Resource = resource.parse()?;
    // Fetch the record first so the confirmation shows what was removed.
    let previous = console.data.get_one(resource, id).await?;
    let removed = console.data.delete(resource, id, previous).await?;
    println!("Deleted:");
    println!("{}", serde_json::to_string_pretty(&removed)?);
    Ok(())
}

async fn cmd_dashboard(
    console: &Console,
    start_date: Option<NaiveDate>,
    end_date: Option<NaiveDate>,
    json: bool,
) -> Result<()> {
    let stats = console.data.get_dashboard(start_date, end_date).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&stats)?);
        return Ok(());
    }

    println!();
    println!("=== Dashboard ===");
    println!();
    println!("Total requests:      {}", stats.total_requests);
    println!("Successful requests: {}", stats.successful_requests);
    println!("Failed requests:     {}", stats.error_requests);
    println!("Success rate:        {:.1}%", stats.success_rate);
    println!();
    Ok(())
}

fn parse_sort_order(raw: &str) -> Result<SortOrder> {
    match raw.to_ascii_lowercase().as_str() {
        "asc" => Ok(SortOrder::Asc),
        "desc" => Ok(SortOrder::Desc),
        other => bail!("Invalid sort order `{other}`: expected asc or desc"),
    }
}

fn prompt_password() -> Result<String> {
    print!("Password: ");
    std::io::stdout().flush()?;
    let mut line = String::new();
    std::io::stdin()
        .lock()
        .read_line(&mut line)
        .context("Failed to read password from stdin")?;
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}

/// Print records as a table keyed by the columns of the first record.
/// Records are opaque, so the column set is whatever the backend sent.
fn print_records(records: &[Value]) {
    if records.is_empty() {
        println!("No records found.");
        return;
    }

    let columns = columns_for(records);
    println!();
    let header: Vec<String> = columns
        .iter()
        .map(|c| format!("{:<24}", truncate(&c.to_uppercase(), 24)))
        .collect();
    println!("{}", header.join("  "));
    println!("{}", "-".repeat(26 * columns.len()));

    for record in records {
        let row: Vec<String> = columns
            .iter()
            .map(|c| format!("{:<24}", truncate(&cell(record, c), 24)))
            .collect();
        println!("{}", row.join("  "));
    }
}

const MAX_COLUMNS: usize = 6;

fn columns_for(records: &[Value]) -> Vec<String> {
    let Some(first) = records.first().and_then(Value::as_object) else {
        return vec!["value".to_string()];
    };

    let mut columns: Vec<String> = Vec::new();
    if first.contains_key("id") {
        columns.push("id".to_string());
    }
    for key in first.keys() {
        if key != "id" && columns.len() < MAX_COLUMNS {
            columns.push(key.clone());
        }
    }
    columns
}

fn cell(record: &Value, column: &str) -> String {
    if column == "value" && !record.is_object() {
        return record.to_string();
    }
    match record.get(column) {
        None | Some(Value::Null) => "-".to_string(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let truncated: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{truncated}...")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn sort_order_parsing_is_case_insensitive() {
        assert_eq!(parse_sort_order("asc").unwrap(), SortOrder::Asc);
        assert_eq!(parse_sort_order("DESC").unwrap(), SortOrder::Desc);
        assert!(parse_sort_order("sideways").is_err());
    }

    #[test]
    fn columns_put_id_first() {
        let records = vec![json!({"name": "plate", "id": "1", "active": true})];
        let columns = columns_for(&records);
        assert_eq!(columns[0], "id");
        assert!(columns.contains(&"name".to_string()));
        assert!(columns.contains(&"active".to_string()));
    }

    #[test]
    fn cells_render_scalars_without_quotes() {
        let record = json!({"name": "plate", "active": true, "missing": null});
        assert_eq!(cell(&record, "name"), "plate");
        assert_eq!(cell(&record, "active"), "true");
        assert_eq!(cell(&record, "missing"), "-");
        assert_eq!(cell(&record, "absent"), "-");
    }

    #[test]
    fn truncate_keeps_short_strings_intact() {
        assert_eq!(truncate("short", 24), "short");
        assert_eq!(truncate("abcdefghij", 8), "abcde...");
    }
}
