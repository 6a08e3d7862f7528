mod config;

use std::process::ExitCode;

use clap::Parser;
use dotenv::dotenv;
use oneview_scraper_cli::{
    assemble::parse_record,
    export::{export_csv_file, export_xlsx_file},
    runner::BatchRunner,
    scraper::{Fetcher, PortalClient},
    Error, RollNumber,
};
use tracing_subscriber::EnvFilter;

use config::{Cli, Command};

#[tokio::main]
async fn main() -> ExitCode {
    dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    match execute(cli.command).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("❌ {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn execute(command: Command) -> Result<(), Error> {
    match command {
        Command::Run {
            stores,
            delay_ms,
            csv,
            portal,
        } => {
            let config = stores.runner_config(delay_ms);
            let client = PortalClient::new(portal.portal_config())?;
            let mut runner = BatchRunner::new(client, &config);

            let report = runner.run().await?;
            println!("✅ Queue drained: {}", report);

            if let Some(out) = csv {
                let written = export_csv_file(&config.results_path, &out)?;
                println!("✅ {} records exported to {}", written, out.display());
            }
            Ok(())
        }

        Command::Fetch { roll, portal } => {
            let roll: RollNumber = roll.parse()?;
            let client = PortalClient::new(portal.portal_config())?;
            let page = client.fetch(&roll).await?;
            let record = parse_record(&page)?;

            println!("{}", serde_json::to_string_pretty(&record)?);
            Ok(())
        }

        Command::Export { results, out, xlsx } => {
            let written = export_csv_file(&results, &out)?;
            if written == 0 {
                println!("⚠️ {} holds no records, nothing exported", results.display());
                return Ok(());
            }
            println!("✅ {} records exported to {}", written, out.display());

            if let Some(sheet) = xlsx {
                let rows = export_xlsx_file(&results, &sheet)?;
                println!("✅ result sheet with {} students written to {}", rows, sheet.display());
            }
            Ok(())
        }
    }
}
