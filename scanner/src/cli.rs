// Standard library imports
use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

// Third party imports
use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing::info;

// Internal imports
use walletscan_blockchain::WalletFamily;
use walletscan_wallet::{BalanceItem, WalletResult};

use crate::job_manager::JobManager;

/// Khoảng cách giữa hai lần poll trong chế độ `check`
const POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Kiểm tra số dư ví EVM, Tron và Solana
#[derive(Debug, Parser)]
#[command(name = "walletscan", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Chạy HTTP API
    Serve(ServeArgs),
    /// Kiểm tra một lô địa chỉ rồi thoát
    Check(CheckArgs),
}

#[derive(Debug, Args)]
pub struct ServeArgs {
    /// Địa chỉ bind, mặc định theo cấu hình
    #[arg(long)]
    pub host: Option<String>,
    #[arg(long)]
    pub port: Option<u16>,
}

#[derive(Debug, Args)]
pub struct CheckArgs {
    /// File chứa địa chỉ, mỗi dòng một địa chỉ
    #[arg(short, long)]
    pub file: Option<PathBuf>,
    /// Ghi kết quả dạng JSON ra file
    #[arg(short, long)]
    pub output: Option<PathBuf>,
    /// Hiển thị cả ví không có số dư
    #[arg(long)]
    pub include_empty: bool,
    pub addresses: Vec<String>,
}

/// Gom địa chỉ từ file và tham số dòng lệnh, bỏ dòng trống
pub fn read_addresses(file: Option<&Path>, extra: &[String]) -> Result<Vec<String>> {
    let mut addresses = Vec::new();

    if let Some(path) = file {
        let content = fs::read_to_string(path)
            .with_context(|| format!("failed to read address file {}", path.display()))?;
        addresses.extend(
            content
                .lines()
                .map(str::trim)
                .filter(|l| !l.is_empty())
                .map(str::to_string),
        );
        info!("Loaded {} addresses from {}", addresses.len(), path.display());
    }

    addresses.extend(
        extra
            .iter()
            .map(|a| a.trim())
            .filter(|a| !a.is_empty())
            .map(str::to_string),
    );

    if addresses.is_empty() {
        bail!("no addresses provided");
    }
    Ok(addresses)
}

fn format_item(label: &str, item: &BalanceItem, precision: usize) -> String {
    format!(
        "  {}: {:.*}   {}",
        label,
        precision,
        item.balance,
        item.status.label()
    )
}

/// Định dạng một kết quả để in ra terminal
pub fn format_result(result: &WalletResult) -> String {
    let indicator = if result.positive { "[+]" } else { "[-]" };
    let precision = match result.family {
        WalletFamily::Trx => 6,
        _ => 8,
    };

    let mut lines = vec![format!("{} Address: {}", indicator, result.address)];
    if result.family == WalletFamily::Unknown {
        lines.push(format!("  {}: {:.8}   {}", result.family, 0.0, "error: unsupported type"));
    }
    for (name, item) in result.balances.native() {
        lines.push(format_item(name, item, precision));
    }
    for (chain, tokens) in result.balances.tokens() {
        for (symbol, item) in tokens {
            lines.push(format_item(&format!("{} ({})", chain, symbol), item, precision));
        }
    }
    lines.push("-".repeat(50));
    lines.join("\n")
}

/// Chạy một job qua job manager, in kết quả khi có và trả về toàn bộ kết quả
pub async fn run_check(
    jobs: &JobManager,
    addresses: Vec<String>,
    include_empty: bool,
    output: Option<&Path>,
) -> Result<Vec<WalletResult>> {
    let submitted = jobs.submit(addresses, include_empty);
    println!(
        "Checking {} addresses ({} valid)",
        submitted.total, submitted.valid
    );
    for invalid in &submitted.invalid {
        println!("[!] Invalid address: {:?}", invalid);
    }

    let mut results = Vec::new();
    loop {
        let poll = jobs.poll(&submitted.job_id, results.len())?;
        for result in &poll.new_results {
            println!("{}", format_result(result));
        }
        results.extend(poll.new_results);

        if poll.done {
            println!(
                "Done: {}/{} checked, {} shown, {} errors",
                poll.stats.checked, poll.stats.valid, poll.stats.positive_shown, poll.stats.errors_count
            );
            break;
        }
        tokio::time::sleep(POLL_INTERVAL).await;
    }

    let status = jobs.status(&submitted.job_id)?;
    for entry in &status.errors {
        println!(
            "[!] {}: {}",
            entry.address.as_deref().unwrap_or("job"),
            entry.error
        );
    }

    if let Some(path) = output {
        let json = serde_json::to_string_pretty(&results).context("failed to serialize results")?;
        fs::write(path, json)
            .with_context(|| format!("failed to write results to {}", path.display()))?;
        println!("Results saved to {}", path.display());
    }

    Ok(results)
}
