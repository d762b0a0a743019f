use clap::Parser;
use smart_bus_tracker::sbt_config::{Cli, Settings};
use smart_bus_tracker::sbt_controllers::SBTControllers;
use smart_bus_tracker::sbt_scheduler::{Clock, SystemClock};

#[tokio::main(flavor = "current_thread")]
async fn main() {
    // Set up panic hook for better error messages
    std::panic::set_hook(Box::new(|panic_info| {
        eprintln!("\n{}", "═".repeat(70));
        eprintln!("❌ APPLICATION PANIC");
        eprintln!("{}", "═".repeat(70));
        eprintln!("\nThe tracker encountered an unexpected error:");
        eprintln!("{}", panic_info);
        eprintln!("\n💡 Troubleshooting:");
        eprintln!("  • Re-run with RUST_LOG=debug for more detail");
        eprintln!("  • Check the files passed with --routes-file / --stops-file");
        eprintln!("\n{}", "═".repeat(70));
    }));

    dotenvy::dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    let settings = match Settings::load(&cli, SystemClock.now_ms()) {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("\n✗ {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = SBTControllers::run(cli.command, settings).await {
        eprintln!("\n✗ {:#}", e);
        std::process::exit(1);
    }
}
