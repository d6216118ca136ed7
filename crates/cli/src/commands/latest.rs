//! `evoweb latest` — Print the last generated page.

use evoweb_storage::ContentCache;

pub async fn run(json: bool) -> Result<(), Box<dyn std::error::Error>> {
    let config = super::load_config()?;
    let store = evoweb_storage::build_from_config(&config.storage).await?;
    let cache = ContentCache::new(store);

    match cache.load_latest().await? {
        Some(content) if json => println!("{}", serde_json::to_string_pretty(&content)?),
        Some(content) => {
            eprintln!("generated {}", content.generated_at.to_rfc3339());
            println!("{}", content.html);
        }
        None => eprintln!("No page generated yet — run `evoweb generate` first"),
    }

    Ok(())
}
