use portico::http::RequestDescriptor;
use portico::{ApiConfig, Gateway, Module, Verb};

#[tokio::main]
async fn main() {
    systemd_journal_logger::JournalLog::new()
        .unwrap()
        .with_syslog_identifier("portico-api-check".to_string())
        .install()
        .unwrap();
    log::set_max_level(log::LevelFilter::Info);

    println!("=== Portico API check ===\n");

    let base_url = match std::env::var("PORTICO_URL") {
        Ok(url) if !url.trim().is_empty() => url,
        _ => {
            println!("PORTICO_URL not set.");
            return;
        }
    };
    let name = std::env::var("PORTICO_USER").unwrap_or_default();
    let password = std::env::var("PORTICO_PASSWORD").unwrap_or_default();
    if name.is_empty() || password.is_empty() {
        println!("PORTICO_USER / PORTICO_PASSWORD not set.");
        return;
    }

    println!("--- Backend: {} ---", base_url);

    let config = ApiConfig::new(base_url.trim()).with_credentials(&name, &password);
    let gateway = match Gateway::new(config) {
        Ok(g) => g,
        Err(e) => {
            println!("  Client error: {}", e);
            return;
        }
    };

    match gateway.login().await {
        Ok(info) => println!(
            "  Logged in: user {} (context {})",
            info.user_id.unwrap_or(-1),
            info.context_id.unwrap_or(-1)
        ),
        Err(e) => {
            println!("  Login failed: {}", e);
            return;
        }
    }

    // List the folder tree roots.
    let mut folders = RequestDescriptor::new(Module::Folders, "allVisible", Verb::Get)
        .columns(vec![1, 300, 301]);
    folders.append_columns = Some(true);
    match gateway.send(folders).await {
        Ok(result) => {
            let count = result.data.as_array().map(|a| a.len()).unwrap_or(0);
            println!("\n  Folders: {} visible", count);
            if let Some(warning) = result.warning {
                println!("  WARNING: {}", warning);
            }
        }
        Err(e) => println!("\n  Error listing folders: {}", e),
    }

    // List the inbox.
    let mut inbox = RequestDescriptor::new(Module::Mail, "all", Verb::Get)
        .param("folder", "default0/INBOX")
        .columns(vec![600, 603, 607, 610]);
    inbox.append_columns = Some(true);
    match gateway.send(inbox).await {
        Ok(result) => {
            let rows = result.data.as_array().cloned().unwrap_or_default();
            println!("\n  INBOX: {} messages", rows.len());
            for row in rows.iter().take(10) {
                println!(
                    "    [{}] {}",
                    row["from"].as_str().unwrap_or("?"),
                    row["subject"].as_str().unwrap_or("(no subject)")
                );
            }
            if rows.len() > 10 {
                println!("    ... and {} more", rows.len() - 10);
            }
        }
        Err(e) => println!("\n  Error listing INBOX: {}", e),
    }

    println!("\n=== Done ===");
}
