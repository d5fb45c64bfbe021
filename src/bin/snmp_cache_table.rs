//! snmp-cache-table: print one MIB table as JSON.

use std::process::ExitCode;

use clap::Parser;
use snmp_cache::SnmpCache;
use snmp_cache::cli::args::TableArgs;

#[tokio::main]
async fn main() -> ExitCode {
    let args = TableArgs::parse();
    args.init_tracing();

    match run(&args).await {
        Ok(json) => {
            println!("{}", json);
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(args: &TableArgs) -> Result<String, Box<dyn std::error::Error>> {
    let cache = SnmpCache::new(args.target.clone(), args.credential()?, args.cache_config()?).await?;
    let rows = cache
        .get_table(&args.mib, &args.table, !args.no_cache, args.max_age)
        .await?;

    let json = if args.pretty {
        serde_json::to_string_pretty(&rows)?
    } else {
        serde_json::to_string(&rows)?
    };
    Ok(json)
}
