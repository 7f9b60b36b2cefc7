use std::sync::Arc;

use anyhow::Result;
use env_logger::Env;
use log::{error, info};
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;

use localzone::pipeline::{
    announcement_text, localized_text, set_confirmation_text, ONBOARDING, SET_USAGE,
};
use localzone::providers::{GeoNamesTimezoneLookup, NominatimGeocoder};
use localzone::{
    AliasTable, CallbackToken, Config, JsonPreferenceStore, Pipeline, PipelineError, TimeScanner,
    TimezoneResolver, UserId,
};

/// The console acts as a single chat user.
const CONSOLE_USER: UserId = 0;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    // Initialize logging with custom format
    env_logger::Builder::from_env(Env::default().default_filter_or("info"))
        .format(|buf, record| {
            use chrono::Local;
            use std::io::Write;
            writeln!(
                buf,
                "{} [{}] {}",
                Local::now().format("%Y-%m-%d %H:%M:%S"),
                record.level(),
                record.args()
            )
        })
        .init();

    info!("Starting localzone console");

    let config = Config::load()?;
    let pipeline = build_pipeline(&config)?;

    let mut rl = DefaultEditor::new()?;
    println!("localzone console. Type 'help' for commands.");

    loop {
        let readline = rl.readline(">> ");
        match readline {
            Ok(line) => {
                let _ = rl.add_history_entry(line.as_str());
                if let Err(err) = process_command(&pipeline, &line).await {
                    error!("Failed to process command: {:?}", err);
                }
            }
            Err(ReadlineError::Interrupted) => {
                println!("CTRL-C");
                break;
            }
            Err(ReadlineError::Eof) => {
                println!("CTRL-D");
                break;
            }
            Err(err) => {
                println!("Error: {:?}", err);
                break;
            }
        }
    }
    Ok(())
}

fn build_pipeline(config: &Config) -> Result<Pipeline> {
    let aliases = AliasTable::from_config(&config.aliases)?;
    let scanner = if config.scanner.boundary_guard {
        TimeScanner::new()
    } else {
        TimeScanner::without_boundary_guard()
    };

    let resolver = match &config.geocoding.geonames_username {
        Some(username) => {
            let geocoder = NominatimGeocoder::new(
                &config.geocoding.nominatim_url,
                &config.geocoding.user_agent,
                config.timeout(),
            )?;
            let lookup = GeoNamesTimezoneLookup::new(
                &config.geocoding.geonames_url,
                username,
                &config.geocoding.user_agent,
                config.timeout(),
            )?;
            TimezoneResolver::with_providers(aliases, Arc::new(geocoder), Arc::new(lookup))
        }
        None => {
            info!("no geonames_username configured; set commands use fast resolution only");
            TimezoneResolver::new(aliases)
        }
    };

    Ok(Pipeline::new(scanner, resolver, Arc::new(JsonPreferenceStore::new()?)))
}

async fn process_command(pipeline: &Pipeline, line: &str) -> Result<()> {
    let line = line.trim();
    let (command, rest) = match line.split_once(' ') {
        Some((c, r)) => (c, r.trim()),
        None => (line, ""),
    };

    match command {
        "scan" => {
            match pipeline.scan_message(rest) {
                Ok(instant) => {
                    println!("{}", announcement_text(&instant));
                    println!("callback token: {}", instant.callback_token());
                }
                Err(err) => {
                    // a group chat gets no reply in this case
                    println!("no announcement ({})", err);
                }
            }
            Ok(())
        }
        "set" => {
            match pipeline.set_timezone(CONSOLE_USER, rest).await {
                Ok(tz) => println!("{}", set_confirmation_text(tz)),
                Err(PipelineError::GeocodingUnavailable(err)) => {
                    println!("geocoding is unavailable right now ({})", err);
                }
                Err(_) => println!("{}", SET_USAGE),
            }
            Ok(())
        }
        "show" => {
            let token: CallbackToken = match rest.parse() {
                Ok(token) => token,
                Err(_) => {
                    println!("Usage: show <HH:MM>  (a callback token printed by 'scan')");
                    return Ok(());
                }
            };
            match pipeline.localize(&token, CONSOLE_USER).await {
                Ok(localized) => println!("{}", localized_text(&token, &localized)),
                Err(PipelineError::PreferenceNotSet(_)) => println!("{}", ONBOARDING),
                Err(err) => println!("could not localize ({})", err),
            }
            Ok(())
        }
        "help" => {
            println!("Available commands:");
            println!("  scan <message>  - Scan a message for a time expression and announce it");
            println!("  set <timezone>  - Save your timezone (e.g. set Europe/Berlin)");
            println!("  show <HH:MM>    - Localize a UTC callback token into your timezone");
            println!("  help            - Show this help");
            println!("  exit            - Exit the console");
            Ok(())
        }
        "exit" => {
            std::process::exit(0);
        }
        "" => Ok(()),
        _ => {
            println!("Unknown command. Type 'help' for available commands.");
            Ok(())
        }
    }
}
