#![forbid(unsafe_code)]
//! Command-line wallet talking to a RageChain node over HTTP

use clap::{Parser, Subcommand};
use colored::*;
use comfy_table::presets::UTF8_FULL;
use comfy_table::Color as TableColor;
use comfy_table::{Attribute, Cell, ContentArrangement, Table};
use indicatif::{ProgressBar, ProgressStyle};
use ragechain::transaction::{TransactionKind, VoteType, STAKING_POOL_ADDRESS};
use reqwest::Client;
use serde_json::{json, Value};
use std::time::Duration;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Base URL of the node
    #[arg(long, global = true, default_value = "http://127.0.0.1:5000")]
    node: String,
    /// Your wallet address
    #[arg(long, global = true)]
    address: Option<String>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Mine a block on the node
    Mine,
    /// Transfer coins to another address
    Send {
        #[arg(long)]
        to: String,
        #[arg(long)]
        amount: u64,
    },
    /// Lock coins in the staking pool
    Stake {
        #[arg(long)]
        amount: u64,
    },
    /// Release staked coins
    Unstake {
        #[arg(long)]
        amount: u64,
    },
    /// Report content, optionally backed by a stake
    Report {
        #[arg(long)]
        content: String,
        #[arg(long)]
        reason: String,
        #[arg(long, default_value_t = 0)]
        stake: u64,
    },
    /// Vote on a pending rage report
    Vote {
        #[arg(long)]
        report_id: String,
        /// approve or reject
        #[arg(long)]
        vote: String,
    },
    /// Show the balance of an address (defaults to --address)
    Balance { address: Option<String> },
    /// Show the staked balance of an address (defaults to --address)
    Staked { address: Option<String> },
    /// Print the node's chain
    Chain,
    /// List rage reports awaiting votes
    Reports,
    /// Count committed rage reports against some content
    RageIndex { content: String },
    /// Register peers with the node
    Register {
        #[arg(required = true)]
        nodes: Vec<String>,
    },
    /// Ask the node to resolve conflicts with its peers
    Resolve,
}

struct NodeClient {
    http: Client,
    base: String,
}

impl NodeClient {
    fn new(base: &str) -> Result<Self, Box<dyn std::error::Error>> {
        let http = Client::builder().timeout(Duration::from_secs(600)).build()?;
        Ok(Self {
            http,
            base: base.trim_end_matches('/').to_string(),
        })
    }

    async fn get(&self, path: &str) -> Result<Value, Box<dyn std::error::Error>> {
        let resp = self.http.get(format!("{}{}", self.base, path)).send().await?;
        Self::read(resp).await
    }

    async fn post(&self, path: &str, body: Value) -> Result<Value, Box<dyn std::error::Error>> {
        let resp = self
            .http
            .post(format!("{}{}", self.base, path))
            .json(&body)
            .send()
            .await?;
        Self::read(resp).await
    }

    async fn read(resp: reqwest::Response) -> Result<Value, Box<dyn std::error::Error>> {
        let status = resp.status();
        let body: Value = resp.json().await?;
        if !status.is_success() {
            let message = body["error"].as_str().unwrap_or("request failed");
            return Err(format!("node answered {}: {}", status, message).into());
        }
        Ok(body)
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    if let Err(e) = run(cli).await {
        eprintln!("{} {}", "❌".red(), e.to_string().red());
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let client = NodeClient::new(&cli.node)?;
    let me = cli.address.clone();
    let require_address = || me.clone().ok_or("this command needs --address");

    match cli.command {
        Commands::Mine => mine(&client).await,
        Commands::Send { to, amount } => {
            let body = value_tx(require_address()?, to, amount, TransactionKind::Transfer);
            submit(&client, body).await
        }
        Commands::Stake { amount } => {
            let body = value_tx(
                require_address()?,
                STAKING_POOL_ADDRESS.to_string(),
                amount,
                TransactionKind::Stake,
            );
            submit(&client, body).await
        }
        Commands::Unstake { amount } => {
            let body = value_tx(
                require_address()?,
                STAKING_POOL_ADDRESS.to_string(),
                amount,
                TransactionKind::Unstake,
            );
            submit(&client, body).await
        }
        Commands::Report {
            content,
            reason,
            stake,
        } => {
            let body = json!({
                "sender": require_address()?,
                "type": TransactionKind::RageReport.as_str(),
                "data": {"content": content, "reason_code": reason, "stake_amount": stake},
            });
            submit(&client, body).await
        }
        Commands::Vote { report_id, vote } => {
            let vote_type = VoteType::parse(&vote)
                .ok_or_else(|| format!("vote must be approve or reject, got '{}'", vote))?;
            let body = json!({
                "sender": require_address()?,
                "type": TransactionKind::VoteRageReport.as_str(),
                "data": {"report_id": report_id, "vote_type": vote_type.to_string()},
            });
            submit(&client, body).await
        }
        Commands::Balance { address } => {
            let address = address.map_or_else(require_address, Ok)?;
            let resp = client.get(&format!("/balance/{}", address)).await?;
            println!(
                "💰 {} {}",
                address.bright_yellow(),
                format!("{} RAGE", resp["balance"]).bright_green().bold()
            );
            Ok(())
        }
        Commands::Staked { address } => {
            let address = address.map_or_else(require_address, Ok)?;
            let resp = client.get(&format!("/staked_balance/{}", address)).await?;
            println!(
                "🔒 {} {}",
                address.bright_yellow(),
                format!("{} RAGE staked", resp["staked_balance"])
                    .bright_green()
                    .bold()
            );
            Ok(())
        }
        Commands::Chain => show_chain(&client).await,
        Commands::Reports => show_reports(&client).await,
        Commands::RageIndex { content } => {
            let resp = client.post("/rage_index", json!({"content": content})).await?;
            println!("🔥 Rage index: {}", resp["rage_index"].to_string().bright_red().bold());
            println!("   Content hash: {}", resp["content_hash"].as_str().unwrap_or("-").dimmed());
            Ok(())
        }
        Commands::Register { nodes } => {
            let resp = client.post("/nodes/register", json!({"nodes": nodes})).await?;
            println!("{}", "✅ Peers registered".bright_green());
            if let Some(peers) = resp["total_nodes"].as_array() {
                for peer in peers {
                    println!("   • {}", peer.as_str().unwrap_or("?").cyan());
                }
            }
            Ok(())
        }
        Commands::Resolve => {
            let resp = client.get("/nodes/resolve").await?;
            let length = resp["chain"].as_array().map_or(0, Vec::len);
            if resp["replaced"].as_bool().unwrap_or(false) {
                println!("{} (length {})", "🔄 Chain replaced by a longer peer chain".yellow(), length);
            } else {
                println!("{} (length {})", "✅ Our chain is authoritative".bright_green(), length);
            }
            Ok(())
        }
    }
}

fn value_tx(sender: String, recipient: String, amount: u64, kind: TransactionKind) -> Value {
    json!({
        "sender": sender,
        "recipient": recipient,
        "amount": amount,
        "type": kind.as_str(),
    })
}

async fn submit(client: &NodeClient, body: Value) -> Result<(), Box<dyn std::error::Error>> {
    let resp = client.post("/transactions/new", body).await?;
    println!("{} {}", "📨".bright_cyan(), resp["message"].as_str().unwrap_or("submitted"));
    if let Some(report_id) = resp["report_id"].as_str() {
        println!("   Report id: {}", report_id.bright_yellow());
    }
    Ok(())
}

async fn mine(client: &NodeClient) -> Result<(), Box<dyn std::error::Error>> {
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(ProgressStyle::default_spinner().template("{spinner:.cyan} {msg}")?);
    spinner.set_message("Searching for proof-of-work...");
    spinner.enable_steady_tick(Duration::from_millis(100));

    let result = client.get("/mine").await;
    spinner.finish_and_clear();
    let resp = result?;

    println!(
        "⛏️  {} #{}",
        "Block forged".bright_green().bold(),
        resp["index"]
    );
    println!("   Proof: {}", resp["proof"]);
    println!(
        "   Transactions: {}",
        resp["transactions"].as_array().map_or(0, Vec::len)
    );
    println!(
        "   Previous hash: {}",
        resp["previous_hash"].as_str().unwrap_or("-").dimmed()
    );
    Ok(())
}

fn header_cell(title: &str) -> Cell {
    Cell::new(title)
        .fg(TableColor::Cyan)
        .add_attribute(Attribute::Bold)
}

async fn show_chain(client: &NodeClient) -> Result<(), Box<dyn std::error::Error>> {
    let resp = client.get("/chain").await?;
    let blocks = resp["chain"].as_array().cloned().unwrap_or_default();

    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec![
            header_cell("Index"),
            header_cell("Time"),
            header_cell("Txs"),
            header_cell("Proof"),
            header_cell("Previous hash"),
        ]);

    for block in &blocks {
        let time = block["timestamp"]
            .as_f64()
            .and_then(|ts| chrono::DateTime::from_timestamp(ts as i64, 0))
            .map(|dt| dt.format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_default();
        table.add_row(vec![
            Cell::new(format!("#{}", block["index"])).fg(TableColor::White),
            Cell::new(time).fg(TableColor::Grey),
            Cell::new(block["transactions"].as_array().map_or(0, Vec::len)).fg(TableColor::Green),
            Cell::new(&block["proof"]).fg(TableColor::Yellow),
            Cell::new(short_hash(block["previous_hash"].as_str().unwrap_or("")))
                .fg(TableColor::Magenta),
        ]);
    }

    println!("{table}");
    println!("Length: {}", resp["length"].to_string().bright_cyan());
    Ok(())
}

async fn show_reports(client: &NodeClient) -> Result<(), Box<dyn std::error::Error>> {
    let resp = client.get("/pending_rage_reports").await?;
    let reports = resp["pending_reports"].as_array().cloned().unwrap_or_default();
    if reports.is_empty() {
        println!("{}", "No rage reports awaiting votes.".yellow());
        return Ok(());
    }

    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec![
            header_cell("Report"),
            header_cell("Reporter"),
            header_cell("Reason"),
            header_cell("Stake"),
            header_cell("Votes"),
        ]);

    for report in &reports {
        table.add_row(vec![
            Cell::new(report["report_id"].as_str().unwrap_or("")).fg(TableColor::White),
            Cell::new(report["reporter_address"].as_str().unwrap_or("")).fg(TableColor::Yellow),
            Cell::new(report["reason_code"].as_str().unwrap_or("")).fg(TableColor::Red),
            Cell::new(&report["stake_amount"]).fg(TableColor::Green),
            Cell::new(format_votes(&report["current_votes"])).fg(TableColor::Cyan),
        ]);
    }

    println!("{table}");
    Ok(())
}

fn short_hash(hash: &str) -> String {
    let chars: Vec<char> = hash.chars().collect();
    if chars.len() > 20 {
        let head: String = chars[..10].iter().collect();
        let tail: String = chars[chars.len() - 10..].iter().collect();
        format!("{}...{}", head, tail)
    } else {
        hash.to_string()
    }
}

/// One `voter: vote` line per voter, or `-` before the first vote.
fn format_votes(votes: &Value) -> String {
    let lines: Vec<String> = votes
        .as_object()
        .map(|votes| {
            votes
                .iter()
                .map(|(voter, vote)| format!("{}: {}", voter, vote.as_str().unwrap_or("?")))
                .collect()
        })
        .unwrap_or_default();
    if lines.is_empty() {
        "-".to_string()
    } else {
        lines.join("\n")
    }
}
